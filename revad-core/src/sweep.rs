//! The backward sweep
//!
//! A sweep zeroes the active scope, seeds the output with 1.0 and walks the
//! scope from the output down to the oldest node, running each node's
//! pullback once.
//! Creation order is already topological, so there is no graph traversal...

use rustc_hash::FxHashMap;

use crate::node::{Node, NodeIndex, NodeKind};
use crate::tape::{Tape, TapeInner};
use crate::var::Var;

/// The only write access a pullback gets to the adjoints of its operands.
///
/// `lower` holds every node created before the one being swept, which is
/// exactly the set a node may reference. Operands below the active scope are
/// routed to a side table instead, so a nested sweep leaves outer adjoints alone.
pub(crate) struct Adjoints<'a> {
  lower: &'a mut [Node],
  base: NodeIndex,
  outer: &'a mut FxHashMap<NodeIndex, f64>,
}

impl Adjoints<'_> {
  /// Recorded forward value of an operand
  #[inline(always)]
  pub(crate) fn value(&self, index: NodeIndex) -> f64 {
    self.lower[index].value
  }

  /// `adjoint[index] += delta`
  #[inline(always)]
  pub(crate) fn accumulate(&mut self, index: NodeIndex, delta: f64) {
    if index >= self.base {
      self.lower[index].adjoint += delta;
    } else {
      *self.outer.entry(index).or_insert(0.0) += delta;
    }
  }
}

impl TapeInner {
  /// This function is the hottest part of the program...
  fn sweep(&mut self, output: NodeIndex) {
    let base = self.active_base();
    self.live(output);
    assert!(
      output >= base,
      "output node {output} was recorded outside the active scope (starts at {base})"
    );
    self.zero_active();
    self.nodes[output].adjoint = 1.0;

    let TapeInner {
      nodes,
      storage,
      outer,
      ..
    } = self;

    // nodes newer than the output cannot reach it, start there
    for index in (base..=output).rev() {
      let (lower, upper) = nodes.split_at_mut(index);
      let node = &upper[0];
      // a zero adjoint contributes exactly zero, so the call is elided; this
      // keeps 0 * inf partials off inputs the output does not depend on.
      // poisoned nodes push NaN whatever their upstream and always run
      if node.adjoint == 0.0 && !matches!(node.kind, NodeKind::Poisoned { .. }) {
        continue;
      }
      let mut adjoints = Adjoints {
        lower,
        base,
        outer: &mut *outer,
      };
      node.pullback(&mut adjoints, storage);
    }
  }

  pub(crate) fn adjoint(&self, index: NodeIndex) -> f64 {
    self.live(index);
    if index >= self.active_base() {
      self.nodes[index].adjoint
    } else {
      self.outer.get(&index).copied().unwrap_or(0.0)
    }
  }
}

impl Tape {
  /// Run a backward sweep seeded at `output`, leaving the adjoints of the active
  /// scope in place
  pub fn grad(&self, output: &Var<'_>) {
    assert!(self.owns(output), "output recorded on a different tape");
    self.inner.borrow_mut().sweep(output.index());
  }

  /// Value of `output` together with its partial derivative with respect to
  /// each of `inputs`.
  ///
  /// Inputs the output does not depend on get exactly 0.0. A Jacobian is one
  /// call per output row; every call starts from zeroed adjoints.
  pub fn gradient(&self, output: &Var<'_>, inputs: &[Var<'_>]) -> (f64, Vec<f64>) {
    assert!(self.owns(output), "output recorded on a different tape");
    let mut inner = self.inner.borrow_mut();
    inner.sweep(output.index());
    let partials = inputs
      .iter()
      .map(|input| {
        assert!(self.owns(input), "input recorded on a different tape");
        inner.adjoint(input.index())
      })
      .collect();
    (output.value(), partials)
  }

  pub(crate) fn adjoint_of(&self, index: NodeIndex) -> f64 {
    self.inner.borrow().adjoint(index)
  }
}

/// Value of `output` and its partials with respect to `inputs`, see
/// [`Tape::gradient`]
#[inline]
pub fn gradient(output: &Var<'_>, inputs: &[Var<'_>]) -> (f64, Vec<f64>) {
  output.tape().gradient(output, inputs)
}
