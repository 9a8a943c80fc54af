//! Piecewise primitives
//!
//! Which branch applies is decided once, at construction, from the recorded
//! values; the node only remembers the branch that was taken. A NaN operand
//! poisons the result: its value is NaN and every operand's adjoint becomes NaN
//! after any sweep that passes over it, even with a zero upstream, rather than
//! silently picking a branch.

use crate::node::NodeKind;
use crate::tape::Tape;
use crate::var::Var;

impl Tape {
  fn poisoned<'t>(&'t self, operands: &[Var<'t>]) -> Var<'t> {
    self.record(f64::NAN, |inner| NodeKind::Poisoned {
      operands: inner.alloc_operands(operands),
    })
  }
}

impl<'t> Var<'t> {
  /// Larger of two variables; on a tie the gradient goes to `self`
  pub fn fmax(&self, other: &Self) -> Self {
    let (a, b) = (self.value(), other.value());
    if a.is_nan() || b.is_nan() {
      return self.tape().poisoned(&[*self, *other]);
    }
    if a >= b {
      self.unary(a, 1.0)
    } else {
      other.unary(b, 1.0)
    }
  }

  pub fn fmax_f64(&self, other: f64) -> Self {
    let a = self.value();
    if a.is_nan() || other.is_nan() {
      return self.tape().poisoned(&[*self]);
    }
    if a >= other {
      self.unary(a, 1.0)
    } else {
      self.tape().leaf(other)
    }
  }

  /// Smaller of two variables; on a tie the gradient goes to `self`
  pub fn fmin(&self, other: &Self) -> Self {
    let (a, b) = (self.value(), other.value());
    if a.is_nan() || b.is_nan() {
      return self.tape().poisoned(&[*self, *other]);
    }
    if a <= b {
      self.unary(a, 1.0)
    } else {
      other.unary(b, 1.0)
    }
  }

  pub fn fmin_f64(&self, other: f64) -> Self {
    let a = self.value();
    if a.is_nan() || other.is_nan() {
      return self.tape().poisoned(&[*self]);
    }
    if a <= other {
      self.unary(a, 1.0)
    } else {
      self.tape().leaf(other)
    }
  }

  /// Positive difference, `max(self - other, 0)`
  pub fn fdim(&self, other: &Self) -> Self {
    let (a, b) = (self.value(), other.value());
    if a.is_nan() || b.is_nan() {
      return self.tape().poisoned(&[*self, *other]);
    }
    if a > b {
      self.binary(other, a - b, 1.0, -1.0)
    } else {
      self.tape().leaf(0.0)
    }
  }

  pub fn fdim_f64(&self, other: f64) -> Self {
    let a = self.value();
    if a.is_nan() || other.is_nan() {
      return self.tape().poisoned(&[*self]);
    }
    if a > other {
      self.unary(a - other, 1.0)
    } else {
      self.tape().leaf(0.0)
    }
  }

  /// Absolute value, with a zero derivative at zero
  pub fn abs(&self) -> Self {
    let a = self.value();
    if a.is_nan() {
      return self.tape().poisoned(&[*self]);
    }
    let partial = if a > 0.0 {
      1.0
    } else if a < 0.0 {
      -1.0
    } else {
      0.0
    };
    self.unary(a.abs(), partial)
  }

  /// Flat almost everywhere; the node keeps the dependency with a zero partial
  fn flat(&self, value: f64) -> Self {
    if self.value().is_nan() {
      return self.tape().poisoned(&[*self]);
    }
    self.unary(value, 0.0)
  }

  pub fn floor(&self) -> Self {
    self.flat(self.value().floor())
  }

  pub fn ceil(&self) -> Self {
    self.flat(self.value().ceil())
  }

  /// Round half away from zero
  pub fn round(&self) -> Self {
    self.flat(self.value().round())
  }

  pub fn trunc(&self) -> Self {
    self.flat(self.value().trunc())
  }

  /// Heaviside step: 0 below zero, 1 from zero up
  pub fn step(&self) -> Self {
    let value = if self.value() < 0.0 { 0.0 } else { 1.0 };
    self.flat(value)
  }

  /// Restrict to `[lo, hi]`; outside the interval the result is a constant
  ///
  /// # Panics
  ///
  /// Panics if `lo > hi`, like [`f64::clamp`].
  pub fn clamp(&self, lo: f64, hi: f64) -> Self {
    assert!(lo <= hi, "clamp called with lo = {lo} > hi = {hi}");
    let a = self.value();
    if a.is_nan() {
      return self.tape().poisoned(&[*self]);
    }
    if a < lo {
      self.tape().leaf(lo)
    } else if a > hi {
      self.tape().leaf(hi)
    } else {
      self.unary(a, 1.0)
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::Tape;

  mod branches {
    use super::*;

    #[test]
    fn fmax() {
      let tape = Tape::new();
      let a = tape.var(2.0);
      let b = tape.var(5.0);
      let (value, partials) = a.fmax(&b).gradient(&[a, b]);
      assert_eq!(value, 5.0);
      assert_eq!(partials, vec![0.0, 1.0]);
    }

    #[test]
    fn fmax_tie_goes_to_first() {
      let tape = Tape::new();
      let a = tape.var(3.0);
      let b = tape.var(3.0);
      assert_eq!(a.fmax(&b).gradient(&[a, b]).1, vec![1.0, 0.0]);
      assert_eq!(b.fmax(&a).gradient(&[a, b]).1, vec![0.0, 1.0]);
      assert_eq!(a.fmin(&b).gradient(&[a, b]).1, vec![1.0, 0.0]);
    }

    #[test]
    fn fmax_f64() {
      let tape = Tape::new();
      let a = tape.var(2.0);
      let above = a.fmax_f64(1.0);
      let below = a.fmax_f64(4.0);
      assert_eq!(above.gradient(&[a]), (2.0, vec![1.0]));
      assert_eq!(below.gradient(&[a]), (4.0, vec![0.0]));
    }

    #[test]
    fn fmin() {
      let tape = Tape::new();
      let a = tape.var(2.0);
      let b = tape.var(5.0);
      let (value, partials) = a.fmin(&b).gradient(&[a, b]);
      assert_eq!(value, 2.0);
      assert_eq!(partials, vec![1.0, 0.0]);
      assert_eq!(b.fmin_f64(1.0).gradient(&[b]), (1.0, vec![0.0]));
    }

    #[test]
    fn fdim() {
      let tape = Tape::new();
      let a = tape.var(5.0);
      let b = tape.var(2.0);
      assert_eq!(a.fdim(&b).gradient(&[a, b]), (3.0, vec![1.0, -1.0]));
      assert_eq!(b.fdim(&a).gradient(&[a, b]), (0.0, vec![0.0, 0.0]));
      assert_eq!(a.fdim_f64(1.0).gradient(&[a]), (4.0, vec![1.0]));
    }

    #[test]
    fn abs() {
      let tape = Tape::new();
      let a = tape.var(-3.0);
      // df/da = a/|a| = -1 for a < 0
      assert_eq!(a.abs().gradient(&[a]), (3.0, vec![-1.0]));
      let zero = tape.var(0.0);
      assert_eq!(zero.abs().gradient(&[zero]), (0.0, vec![0.0]));
    }

    #[test]
    fn flat() {
      let tape = Tape::new();
      let a = tape.var(-2.5);
      assert_eq!(a.floor().gradient(&[a]), (-3.0, vec![0.0]));
      assert_eq!(a.ceil().gradient(&[a]), (-2.0, vec![0.0]));
      assert_eq!(a.round().gradient(&[a]), (-3.0, vec![0.0]));
      assert_eq!(a.trunc().gradient(&[a]), (-2.0, vec![0.0]));
      assert_eq!(a.step().gradient(&[a]), (0.0, vec![0.0]));
      let zero = tape.var(0.0);
      assert_eq!(zero.step().value(), 1.0);
    }

    #[test]
    fn clamp() {
      let tape = Tape::new();
      let a = tape.var(0.5);
      assert_eq!(a.clamp(0.0, 1.0).gradient(&[a]), (0.5, vec![1.0]));
      assert_eq!(a.clamp(1.0, 2.0).gradient(&[a]), (1.0, vec![0.0]));
      assert_eq!(a.clamp(-1.0, 0.0).gradient(&[a]), (0.0, vec![0.0]));
    }
  }

  mod nan {
    use super::*;

    #[test]
    fn scenario_max_of_nan() {
      let tape = Tape::new();
      let x = tape.var(f64::NAN);
      let y = tape.var(3.0);
      let (value, partials) = x.fmax(&y).gradient(&[x, y]);
      assert!(value.is_nan());
      assert!(partials[0].is_nan());
      assert!(partials[1].is_nan());
    }

    #[test]
    fn constant_nan_poisons() {
      let tape = Tape::new();
      let x = tape.var(1.0);
      let (value, partials) = x.fmin_f64(f64::NAN).gradient(&[x]);
      assert!(value.is_nan());
      assert!(partials[0].is_nan());
      assert_eq!(tape.stats().by_kind["poisoned"], 1);
    }

    #[test]
    fn poison_flows_downstream() {
      let tape = Tape::new();
      let x = tape.var(f64::NAN);
      let y = tape.var(1.0);
      let z = x.abs() * 2.0 + &y;
      let (value, partials) = z.gradient(&[x, y]);
      assert!(value.is_nan());
      assert!(partials[0].is_nan());
      assert_eq!(partials[1], 1.0);
    }

    #[test]
    fn every_primitive_poisons() {
      let tape = Tape::new();
      let x = tape.var(f64::NAN);
      for node in [x.floor(), x.ceil(), x.round(), x.trunc(), x.step(), x.clamp(0.0, 1.0)] {
        let (value, partials) = node.gradient(&[x]);
        assert!(value.is_nan());
        assert!(partials[0].is_nan());
      }
    }
  }
}
