//!
//! # revad-functional
//!
//! Derivative drivers over dense `nalgebra` vectors. Each one records the
//! function into its own nested scope of the given tape and recovers the scope
//! before returning, so they compose with whatever is already on the tape and
//! never leave anything behind, even when `f` returns an error.
//!

use lib_revad_core::{Error, Result, Tape, Var};
use nalgebra::{DMatrix, DVector};
use tracing::trace;

/// Step that works well for [`finite_diff_hessian`] and
/// [`hessian_times_vector`] on functions scaled around one
pub const HESSIAN_EPSILON: f64 = 1e-5;

/// Step that works well for [`finite_diff_gradient`] on functions scaled
/// around one
pub const FINITE_DIFF_EPSILON: f64 = 1e-6;

fn inputs<'t>(tape: &'t Tape, x: &DVector<f64>) -> Vec<Var<'t>> {
  x.iter().map(|&v| tape.var(v)).collect()
}

/// Value and gradient of a scalar function at `x`
pub fn gradient<'t, F>(tape: &'t Tape, f: F, x: &DVector<f64>) -> Result<(f64, DVector<f64>)>
where
  F: FnOnce(&[Var<'t>]) -> Result<Var<'t>>,
{
  trace!(dim = x.len(), "gradient");
  tape.with_nested(|| {
    let xs = inputs(tape, x);
    let fx = f(&xs)?;
    let (value, partials) = fx.gradient(&xs);
    Ok((value, DVector::from_vec(partials)))
  })
}

/// Values and Jacobian of a vector function at `x`.
///
/// Row `i` of the Jacobian holds the partials of output `i`, one backward sweep
/// per output.
pub fn jacobian<'t, F>(tape: &'t Tape, f: F, x: &DVector<f64>) -> Result<(DVector<f64>, DMatrix<f64>)>
where
  F: FnOnce(&[Var<'t>]) -> Result<Vec<Var<'t>>>,
{
  trace!(dim = x.len(), "jacobian");
  tape.with_nested(|| {
    let xs = inputs(tape, x);
    let outputs = f(&xs)?;
    let mut jac = DMatrix::zeros(outputs.len(), xs.len());
    for (i, output) in outputs.iter().enumerate() {
      let (_, row) = output.gradient(&xs);
      for (j, partial) in row.into_iter().enumerate() {
        jac[(i, j)] = partial;
      }
    }
    let values = DVector::from_iterator(outputs.len(), outputs.iter().map(Var::value));
    Ok((values, jac))
  })
}

/// Value and gradient of a scalar function at `x`, with the gradient dotted
/// into `v` (the unnormalized directional derivative along `v`).
///
/// Exact, one backward sweep.
pub fn gradient_dot_vector<'t, F>(
  tape: &'t Tape,
  f: F,
  x: &DVector<f64>,
  v: &DVector<f64>,
) -> Result<(f64, f64)>
where
  F: FnOnce(&[Var<'t>]) -> Result<Var<'t>>,
{
  if x.len() != v.len() {
    return Err(Error::LengthMismatch {
      expected: x.len(),
      actual: v.len(),
    });
  }
  trace!(dim = x.len(), "gradient_dot_vector");
  let (value, grad) = gradient(tape, f, x)?;
  Ok((value, grad.dot(v)))
}

/// Value of a scalar function at `x` and an approximation of its Hessian
/// times `v`.
///
/// The product is the centered difference of two reverse-mode gradients taken
/// `epsilon` along `v` either side of `x`, so it costs two sweeps regardless
/// of the dimension. Its error is `O(epsilon^2)` for smooth `f`.
pub fn hessian_times_vector<'t, F>(
  tape: &'t Tape,
  f: F,
  x: &DVector<f64>,
  v: &DVector<f64>,
  epsilon: f64,
) -> Result<(f64, DVector<f64>)>
where
  F: Fn(&[Var<'t>]) -> Result<Var<'t>>,
{
  if x.len() != v.len() {
    return Err(Error::LengthMismatch {
      expected: x.len(),
      actual: v.len(),
    });
  }
  trace!(dim = x.len(), epsilon, "hessian_times_vector");
  let value = tape.with_nested(|| f(&inputs(tape, x)).map(|fx| fx.value()))?;
  let (_, up) = gradient(tape, &f, &(x + v * epsilon))?;
  let (_, down) = gradient(tape, &f, &(x - v * epsilon))?;
  Ok((value, (up - down) / (2.0 * epsilon)))
}

/// Value, gradient and a finite-difference approximation of the Hessian of a
/// scalar function at `x`.
///
/// Value and gradient are exact. Column `i` of the Hessian is the centered
/// difference of two reverse-mode gradients taken `epsilon` either side of `x`
/// along axis `i`, with an error of `O(epsilon^2)` for smooth `f`; the result
/// is then symmetrized. `f` is recorded `2 * dim + 1` times, each in a scope
/// of its own.
pub fn finite_diff_hessian<'t, F>(
  tape: &'t Tape,
  f: F,
  x: &DVector<f64>,
  epsilon: f64,
) -> Result<(f64, DVector<f64>, DMatrix<f64>)>
where
  F: Fn(&[Var<'t>]) -> Result<Var<'t>>,
{
  trace!(dim = x.len(), epsilon, "finite_diff_hessian");
  let (value, grad) = gradient(tape, &f, x)?;

  let n = x.len();
  let mut hess = DMatrix::zeros(n, n);
  let mut shifted = x.clone();
  for i in 0..n {
    shifted[i] = x[i] + epsilon;
    let (_, up) = gradient(tape, &f, &shifted)?;
    shifted[i] = x[i] - epsilon;
    let (_, down) = gradient(tape, &f, &shifted)?;
    shifted[i] = x[i];
    hess.set_column(i, &((up - down) / (2.0 * epsilon)));
  }
  let hess = (&hess + hess.transpose()) * 0.5;
  Ok((value, grad, hess))
}

/// Value and centered finite-difference gradient of a plain `f64` function,
/// mostly for checking analytic gradients
pub fn finite_diff_gradient<F>(f: F, x: &DVector<f64>, epsilon: f64) -> (f64, DVector<f64>)
where
  F: Fn(&[f64]) -> f64,
{
  let value = f(x.as_slice());
  let mut shifted = x.clone_owned();
  let grad = DVector::from_fn(x.len(), |i, _| {
    shifted[i] = x[i] + epsilon;
    let up = f(shifted.as_slice());
    shifted[i] = x[i] - epsilon;
    let down = f(shifted.as_slice());
    shifted[i] = x[i];
    (up - down) / (2.0 * epsilon)
  });
  (value, grad)
}
