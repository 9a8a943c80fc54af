//! Nodes whose derivatives come from outside the built-in catalog
//!
//! Collaborators that already know their partials (a closed-form density, a
//! solver's sensitivities...) record them directly instead of spelling the
//! computation out operation by operation.

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::node::NodeKind;
use crate::tape::Tape;
use crate::var::Var;

/// A backward rule supplied by the caller.
///
/// `operands` holds the recorded forward values of the node's operands, in the
/// order they were passed at construction, and `grads` starts zeroed with the
/// same length. Write `upstream * ∂value/∂operand[i]` into `grads[i]`; the
/// engine takes care of accumulating it.
///
/// Implementors are owned by the tape and dropped when the scope they were
/// recorded in is recovered.
pub trait Pullback {
  fn pullback(&self, value: f64, upstream: f64, operands: &[f64], grads: &mut [f64]);
}

impl<F> Pullback for F
where
  F: Fn(f64, f64, &[f64], &mut [f64]),
{
  #[inline]
  fn pullback(&self, value: f64, upstream: f64, operands: &[f64], grads: &mut [f64]) {
    self(value, upstream, operands, grads)
  }
}

impl Tape {
  /// Record a node with `value` and one caller-supplied partial per operand.
  ///
  /// An operand may appear more than once; its partials simply add up.
  pub fn from_explicit_partials<'t>(&'t self, value: f64, terms: &[(Var<'t>, f64)]) -> Var<'t> {
    let (vars, partials): (SmallVec<[Var<'t>; 8]>, SmallVec<[f64; 8]>) = terms.iter().copied().unzip();
    self.record(value, |inner| NodeKind::Partials {
      operands: inner.alloc_operands(&vars),
      partials: inner.alloc_scalars(&partials),
    })
  }

  /// Same as [`Tape::from_explicit_partials`] with operands and partials given
  /// as parallel slices
  pub fn precomputed_gradients<'t>(
    &'t self,
    value: f64,
    operands: &[Var<'t>],
    gradients: &[f64],
  ) -> Result<Var<'t>> {
    if operands.len() != gradients.len() {
      return Err(Error::LengthMismatch {
        expected: operands.len(),
        actual: gradients.len(),
      });
    }
    Ok(self.record(value, |inner| NodeKind::Partials {
      operands: inner.alloc_operands(operands),
      partials: inner.alloc_scalars(gradients),
    }))
  }

  /// Record a node whose backward rule is `pullback`.
  ///
  /// This is the escape hatch for shapes the catalog doesn't cover. Prefer
  /// [`Tape::precomputed_gradients`] when the partials are known up front; a
  /// custom node costs an allocation and a virtual call per sweep.
  pub fn custom<'t, P>(&'t self, value: f64, operands: &[Var<'t>], pullback: P) -> Var<'t>
  where
    P: Pullback + 'static,
  {
    self.record(value, |inner| {
      let operands = inner.alloc_operands(operands);
      let slot = inner.push_owned(Box::new(pullback));
      NodeKind::Custom { slot, operands }
    })
  }
}
