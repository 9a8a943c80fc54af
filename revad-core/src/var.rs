use std::fmt;

use crate::node::{Elementary, ElementaryBinary, NodeIndex, NodeKind};
use crate::tape::Tape;

/// A handle to one node of a [`Tape`].
///
/// Handles are cheap to copy and freely aliased (fan-out is just using a
/// handle twice). They own nothing; the tape owns every node, and the borrow
/// of the tape keeps handles from outliving it.
#[derive(Clone, Copy)]
pub struct Var<'t> {
  value: f64,
  index: NodeIndex,
  tape: &'t Tape,
}

impl<'t> Var<'t> {
  #[inline(always)]
  pub(crate) fn new(value: f64, index: NodeIndex, tape: &'t Tape) -> Self {
    Self { value, index, tape }
  }

  /// Forward value recorded for this variable
  #[inline(always)]
  pub fn value(&self) -> f64 {
    self.value
  }

  /// Adjoint left behind by the most recent sweep of the active scope...
  ///
  /// For a node recorded below the active scope this is the contribution the
  /// nested sweep routed to it, not the adjoint stored on the node.
  pub fn adjoint(&self) -> f64 {
    self.tape.adjoint_of(self.index)
  }

  #[inline(always)]
  pub fn tape(&self) -> &'t Tape {
    self.tape
  }

  #[inline(always)]
  pub(crate) fn index(&self) -> NodeIndex {
    self.index
  }

  /// Value of `self` and its partials with respect to each of `inputs`
  pub fn gradient(&self, inputs: &[Var<'t>]) -> (f64, Vec<f64>) {
    self.tape.gradient(self, inputs)
  }

  /// Sweep from `self`, leaving adjoints readable through [`Var::adjoint`]
  pub fn grad(&self) {
    self.tape.grad(self);
  }

  /// Record a node with one operand and a precomputed partial
  #[inline]
  pub(crate) fn unary(&self, value: f64, partial: f64) -> Self {
    let operand = self.index;
    self.tape.record(value, |inner| NodeKind::Unary {
      operand: inner.live(operand),
      partial,
    })
  }

  /// Record a node with two operands and precomputed partials
  #[inline]
  pub(crate) fn binary(&self, other: &Self, value: f64, da: f64, db: f64) -> Self {
    assert!(self.tape.owns(other), "operands recorded on different tapes");
    let (a, b) = (self.index, other.index);
    self.tape.record(value, |inner| NodeKind::Binary {
      a: inner.live(a),
      b: inner.live(b),
      da,
      db,
    })
  }

  #[inline]
  pub(crate) fn elementary(&self, op: Elementary) -> Self {
    let operand = self.index;
    self.tape.record(op.forward(self.value), |inner| NodeKind::Elementary {
      op,
      operand: inner.live(operand),
    })
  }

  #[inline]
  pub(crate) fn elementary_binary(&self, other: &Self, op: ElementaryBinary) -> Self {
    assert!(self.tape.owns(other), "operands recorded on different tapes");
    let (a, b) = (self.index, other.index);
    self
      .tape
      .record(op.forward(self.value, other.value), |inner| NodeKind::ElementaryBinary {
        op,
        a: inner.live(a),
        b: inner.live(b),
      })
  }
}

impl fmt::Debug for Var<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Var")
      .field("value", &self.value)
      .field("index", &self.index)
      .finish()
  }
}

/// Forward value of a handle
#[inline(always)]
pub fn value_of(var: &Var<'_>) -> f64 {
  var.value()
}
