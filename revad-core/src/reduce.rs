//! Collapsed reductions
//!
//! Each reduction records exactly one node no matter how many operands it
//! takes. The operand indices (and constant vectors) go into the arenas and
//! the backward step is a single loop over them, which keeps the tape small
//! and the sweep cache friendly compared to a chain of binary nodes.

use crate::error::{Error, Result};
use crate::node::NodeKind;
use crate::tape::Tape;
use crate::var::Var;

#[inline]
fn same_len(expected: usize, actual: usize) -> Result<()> {
  if expected == actual {
    Ok(())
  } else {
    Err(Error::LengthMismatch { expected, actual })
  }
}

#[inline]
fn at_least(operation: &'static str, required: usize, actual: usize) -> Result<()> {
  if actual >= required {
    Ok(())
  } else {
    Err(Error::TooFewOperands {
      operation,
      required,
      actual,
    })
  }
}

impl Tape {
  /// `Σ xs[i]`; the empty sum is 0
  pub fn sum<'t>(&'t self, xs: &[Var<'t>]) -> Var<'t> {
    let value = xs.iter().map(Var::value).sum();
    self.record(value, |inner| NodeKind::Sum {
      operands: inner.alloc_operands(xs),
    })
  }

  /// `Σ a[i] * b[i]` over two sequences of variables
  pub fn dot_product<'t>(&'t self, a: &[Var<'t>], b: &[Var<'t>]) -> Result<Var<'t>> {
    same_len(a.len(), b.len())?;
    let value = a.iter().zip(b).map(|(x, y)| x.value() * y.value()).sum();
    Ok(self.record(value, |inner| NodeKind::Dot {
      a: inner.alloc_operands(a),
      b: inner.alloc_operands(b),
    }))
  }

  /// `Σ a[i] * b[i]` with constant weights; the weights are copied into the
  /// tape's arena
  pub fn dot_product_const<'t>(&'t self, a: &[Var<'t>], b: &[f64]) -> Result<Var<'t>> {
    same_len(a.len(), b.len())?;
    let value = a.iter().zip(b).map(|(x, c)| x.value() * c).sum();
    Ok(self.record(value, |inner| NodeKind::DotConst {
      a: inner.alloc_operands(a),
      b: inner.alloc_scalars(b),
    }))
  }

  /// `Σ xs[i]^2`
  pub fn dot_self<'t>(&'t self, xs: &[Var<'t>]) -> Var<'t> {
    let value = xs.iter().map(|x| x.value() * x.value()).sum();
    self.record(value, |inner| NodeKind::DotSelf {
      operands: inner.alloc_operands(xs),
    })
  }

  /// `Σ (a[i] - b[i])^2`
  pub fn squared_distance<'t>(&'t self, a: &[Var<'t>], b: &[Var<'t>]) -> Result<Var<'t>> {
    same_len(a.len(), b.len())?;
    let value = a
      .iter()
      .zip(b)
      .map(|(x, y)| {
        let d = x.value() - y.value();
        d * d
      })
      .sum();
    Ok(self.record(value, |inner| NodeKind::SquaredDistance {
      a: inner.alloc_operands(a),
      b: inner.alloc_operands(b),
    }))
  }

  /// `ln Σ e^xs[i]`, shifted by the maximum so large operands don't overflow.
  ///
  /// With no operands, or only `-inf` ones, the result is a `-inf` constant. A
  /// NaN operand makes the value NaN, and so every operand's partial.
  pub fn log_sum_exp<'t>(&'t self, xs: &[Var<'t>]) -> Var<'t> {
    // f64::max drops NaN, catch it before folding
    let max = if xs.iter().any(|x| x.value().is_nan()) {
      f64::NAN
    } else {
      xs.iter().map(Var::value).fold(f64::NEG_INFINITY, f64::max)
    };
    if max == f64::NEG_INFINITY {
      return self.leaf(f64::NEG_INFINITY);
    }
    let value = if max.is_finite() {
      max + xs.iter().map(|x| (x.value() - max).exp()).sum::<f64>().ln()
    } else {
      max
    };
    self.record(value, |inner| NodeKind::LogSumExp {
      operands: inner.alloc_operands(xs),
    })
  }

  pub fn mean<'t>(&'t self, xs: &[Var<'t>]) -> Result<Var<'t>> {
    at_least("mean", 1, xs.len())?;
    let value = xs.iter().map(Var::value).sum::<f64>() / xs.len() as f64;
    Ok(self.record(value, |inner| NodeKind::Mean {
      operands: inner.alloc_operands(xs),
    }))
  }

  /// Sample variance, normalized by `n - 1`
  pub fn variance<'t>(&'t self, xs: &[Var<'t>]) -> Result<Var<'t>> {
    at_least("variance", 2, xs.len())?;
    let n = xs.len() as f64;
    let mean = xs.iter().map(Var::value).sum::<f64>() / n;
    let value = xs
      .iter()
      .map(|x| {
        let centered = x.value() - mean;
        centered * centered
      })
      .sum::<f64>()
      / (n - 1.0);
    Ok(self.record(value, |inner| NodeKind::Variance {
      operands: inner.alloc_operands(xs),
      mean,
    }))
  }
}
