//! Elementary functions on handles

use crate::node::{Elementary, ElementaryBinary};
use crate::var::Var;

macro_rules! elementary {
  ($($(#[$attr:meta])* $name:ident => $op:ident,)*) => {
    impl<'t> Var<'t> {
      $(
        $(#[$attr])*
        #[inline]
        pub fn $name(&self) -> Self {
          self.elementary(Elementary::$op)
        }
      )*
    }
  };
}

elementary! {
  sqrt => Sqrt,
  cbrt => Cbrt,
  /// `self * self` as a single node
  square => Square,
  exp => Exp,
  exp2 => Exp2,
  /// `e^self - 1`, accurate near zero
  exp_m1 => ExpM1,
  ln => Ln,
  /// `ln(1 + self)`, accurate near zero
  ln_1p => Ln1p,
  log2 => Log2,
  log10 => Log10,
  sin => Sin,
  cos => Cos,
  tan => Tan,
  asin => Asin,
  acos => Acos,
  atan => Atan,
  sinh => Sinh,
  cosh => Cosh,
  tanh => Tanh,
  asinh => Asinh,
  acosh => Acosh,
  atanh => Atanh,
  /// `1 / self`
  recip => Recip,
  /// Logistic sigmoid `1 / (1 + e^-self)`
  inv_logit => InvLogit,
  /// `ln(1 + e^self)` without overflow
  log1p_exp => Log1pExp,
}

impl<'t> Var<'t> {
  /// `self^other`, both variables
  #[inline]
  pub fn pow(&self, other: &Self) -> Self {
    self.elementary_binary(other, ElementaryBinary::Pow)
  }

  /// `self^exp` for a constant exponent
  #[inline]
  pub fn powf(&self, exp: f64) -> Self {
    let v = self.value();
    // x^0 is constant, don't let 0 * x^-1 turn into NaN at x = 0
    let partial = if exp == 0.0 { 0.0 } else { exp * v.powf(exp - 1.0) };
    self.unary(v.powf(exp), partial)
  }

  #[inline]
  pub fn powi(&self, n: i32) -> Self {
    let v = self.value();
    let partial = if n == 0 { 0.0 } else { n as f64 * v.powi(n - 1) };
    self.unary(v.powi(n), partial)
  }

  /// Logarithm with respect to a constant `base`
  #[inline]
  pub fn log(&self, base: f64) -> Self {
    let v = self.value();
    self.unary(v.log(base), 1.0 / (v * base.ln()))
  }

  /// Four quadrant arctangent of `self` (y) and `other` (x)
  #[inline]
  pub fn atan2(&self, other: &Self) -> Self {
    self.elementary_binary(other, ElementaryBinary::Atan2)
  }

  /// `sqrt(self^2 + other^2)` without intermediate overflow
  #[inline]
  pub fn hypot(&self, other: &Self) -> Self {
    self.elementary_binary(other, ElementaryBinary::Hypot)
  }

  /// `self * b + c` with a single rounding, recorded as one node
  pub fn fma(&self, b: &Self, c: &Self) -> Self {
    let (va, vb) = (self.value(), b.value());
    self
      .tape()
      .from_explicit_partials(va.mul_add(vb, c.value()), &[(*self, vb), (*b, va), (*c, 1.0)])
  }
}

#[cfg(test)]
mod tests {
  use std::f64::consts::{FRAC_PI_4, LN_10, LN_2};

  use crate::Tape;

  /// Value and derivative of `f` applied to a fresh variable at `a`
  fn unary<F>(a: f64, f: F) -> (f64, f64)
  where
    F: for<'t> Fn(&crate::Var<'t>) -> crate::Var<'t>,
  {
    let tape = Tape::new();
    let x = tape.var(a);
    let (value, partials) = f(&x).gradient(&[x]);
    (value, partials[0])
  }

  #[test]
  fn sqrt() {
    // df/da = 1/(2*sqrt(a))
    assert_eq!(unary(4.0, |x| x.sqrt()), (2.0, 0.25));
  }

  #[test]
  fn cbrt() {
    // df/da = 1/(3*cbrt(a^2))
    assert_eq!(unary(8.0, |x| x.cbrt()), (2.0, 1.0 / 12.0));
  }

  #[test]
  fn square() {
    // df/da = 2a
    assert_eq!(unary(3.0, |x| x.square()), (9.0, 6.0));
  }

  #[test]
  fn exp() {
    // df/da = exp(a)
    assert_eq!(unary(1.5, |x| x.exp()), (1.5f64.exp(), 1.5f64.exp()));
  }

  #[test]
  fn exp2() {
    // df/da = exp2(a) * ln(2)
    assert_eq!(unary(3.0, |x| x.exp2()), (8.0, 8.0 * LN_2));
  }

  #[test]
  fn exp_m1() {
    // df/da = exp(a)
    assert_eq!(unary(0.5, |x| x.exp_m1()), (0.5f64.exp_m1(), 0.5f64.exp_m1() + 1.0));
  }

  #[test]
  fn ln() {
    // df/da = 1/a
    assert_eq!(unary(2.0, |x| x.ln()), (2.0f64.ln(), 0.5));
  }

  #[test]
  fn ln_1p() {
    // df/da = 1/(1+a)
    assert_eq!(unary(1.0, |x| x.ln_1p()), (1.0f64.ln_1p(), 0.5));
  }

  #[test]
  fn log() {
    // df/da = 1/(a ln(b))
    assert_eq!(unary(8.0, |x| x.log(2.0)), (8.0f64.log(2.0), 1.0 / (8.0 * 2.0f64.ln())));
  }

  #[test]
  fn log2() {
    // df/da = 1/(a ln(2))
    assert_eq!(unary(4.0, |x| x.log2()), (2.0, 1.0 / (4.0 * LN_2)));
  }

  #[test]
  fn log10() {
    // df/da = 1/(a ln(10))
    assert_eq!(unary(100.0, |x| x.log10()), (2.0, 1.0 / (100.0 * LN_10)));
  }

  #[test]
  fn sin() {
    // df/da = cos(a)
    assert_eq!(unary(0.5, |x| x.sin()), (0.5f64.sin(), 0.5f64.cos()));
  }

  #[test]
  fn cos() {
    // df/da = -sin(a)
    assert_eq!(unary(0.5, |x| x.cos()), (0.5f64.cos(), -0.5f64.sin()));
  }

  #[test]
  fn tan() {
    // df/da = sec^2(a) = 1 + tan^2(a)
    let t = 0.5f64.tan();
    assert_eq!(unary(0.5, |x| x.tan()), (t, 1.0 + t * t));
  }

  #[test]
  fn asin() {
    // df/da = 1/sqrt(1-a^2)
    assert_eq!(unary(0.5, |x| x.asin()).1, 1.0 / 0.75f64.sqrt());
  }

  #[test]
  fn acos() {
    // df/da = -1/sqrt(1-a^2)
    assert_eq!(unary(0.5, |x| x.acos()).1, -1.0 / 0.75f64.sqrt());
  }

  #[test]
  fn atan() {
    // df/da = 1/(1+a^2)
    assert_eq!(unary(0.5, |x| x.atan()).1, 1.0 / 1.25);
  }

  #[test]
  fn sinh() {
    // df/da = cosh(a)
    assert_eq!(unary(0.5, |x| x.sinh()).1, 0.5f64.cosh());
  }

  #[test]
  fn cosh() {
    // df/da = sinh(a)
    assert_eq!(unary(0.5, |x| x.cosh()).1, 0.5f64.sinh());
  }

  #[test]
  fn tanh() {
    // df/da = 1 - tanh^2(a)
    let t = 0.5f64.tanh();
    assert_eq!(unary(0.5, |x| x.tanh()).1, 1.0 - t * t);
  }

  #[test]
  fn asinh() {
    // df/da = 1/sqrt(1+a^2)
    assert_eq!(unary(1.0, |x| x.asinh()).1, 1.0 / 2.0f64.sqrt());
  }

  #[test]
  fn acosh() {
    // df/da = 1/sqrt(a^2-1)
    assert_eq!(unary(2.0, |x| x.acosh()).1, 1.0 / 3.0f64.sqrt());
  }

  #[test]
  fn atanh() {
    // df/da = 1/(1-a^2)
    assert_eq!(unary(0.5, |x| x.atanh()).1, 1.0 / 0.75);
  }

  #[test]
  fn recip() {
    // df/da = -1/a^2
    assert_eq!(unary(4.0, |x| x.recip()), (0.25, -0.0625));
  }

  #[test]
  fn inv_logit() {
    // df/da = s(a) (1 - s(a))
    assert_eq!(unary(0.0, |x| x.inv_logit()), (0.5, 0.25));
  }

  #[test]
  fn log1p_exp() {
    // df/da = inv_logit(a)
    assert_eq!(unary(0.0, |x| x.log1p_exp()).1, 0.5);
  }

  #[test]
  fn powf() {
    // df/da = 3 * a^(3-1)
    assert_eq!(unary(2.0, |x| x.powf(3.0)), (8.0, 12.0));
    // constant exponent zero stays finite at zero
    assert_eq!(unary(0.0, |x| x.powf(0.0)), (1.0, 0.0));
  }

  #[test]
  fn powi() {
    // df/da = n * a^(n-1)
    assert_eq!(unary(2.0, |x| x.powi(3)), (8.0, 12.0));
    assert_eq!(unary(0.0, |x| x.powi(0)), (1.0, 0.0));
  }

  #[test]
  fn pow() {
    let tape = Tape::new();
    let a = tape.var(2.0);
    let b = tape.var(3.0);
    let (value, partials) = a.pow(&b).gradient(&[a, b]);
    assert_eq!(value, 8.0);
    // df/da = b * a^(b-1)
    // df/db = a^b * ln(a)
    assert_eq!(partials, vec![12.0, 8.0 * 2.0f64.ln()]);
  }

  #[test]
  fn atan2() {
    let tape = Tape::new();
    let y = tape.var(1.0);
    let x = tape.var(1.0);
    let (value, partials) = y.atan2(&x).gradient(&[y, x]);
    assert_eq!(value, FRAC_PI_4);
    // df/dy = x/(x^2+y^2), df/dx = -y/(x^2+y^2)
    assert_eq!(partials, vec![0.5, -0.5]);
  }

  #[test]
  fn hypot() {
    let tape = Tape::new();
    let a = tape.var(3.0);
    let b = tape.var(4.0);
    let (value, partials) = a.hypot(&b).gradient(&[a, b]);
    assert_eq!(value, 5.0);
    // df/da = a/h, df/db = b/h
    assert_eq!(partials, vec![0.6, 0.8]);
  }

  #[test]
  fn fma() {
    let tape = Tape::new();
    let a = tape.var(2.0);
    let b = tape.var(3.0);
    let c = tape.var(4.0);
    let (value, partials) = a.fma(&b, &c).gradient(&[a, b, c]);
    assert_eq!(value, 10.0);
    // df/da = b, df/db = a, df/dc = 1
    assert_eq!(partials, vec![3.0, 2.0, 1.0]);
    assert_eq!(tape.len(), 4);
  }
}
