//! Nested scopes
//!
//! A nested scope is a checkpoint of the tape and both arenas. Everything
//! recorded after it can be differentiated in isolation (sweeps stop at the
//! checkpoint) and reclaimed in one go. Scopes are strictly LIFO; restoring out
//! of order would leave live handles pointing at truncated nodes, so it panics.

use std::thread;

use tracing::trace;

use crate::arena::Mark;
use crate::node::NodeIndex;
use crate::tape::{Tape, TapeInner};

#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
  nodes: NodeIndex,
  operands: Mark,
  scalars: Mark,
  owned: usize,
}

impl Checkpoint {
  #[inline(always)]
  pub(crate) fn nodes(&self) -> NodeIndex {
    self.nodes
  }
}

impl TapeInner {
  fn checkpoint(&self) -> Checkpoint {
    Checkpoint {
      nodes: self.nodes.len(),
      operands: self.storage.operands.mark(),
      scalars: self.storage.scalars.mark(),
      owned: self.storage.owned.len(),
    }
  }

  fn restore(&mut self, checkpoint: Checkpoint) {
    self.nodes.truncate(checkpoint.nodes);
    self.storage.operands.truncate(checkpoint.operands);
    self.storage.scalars.truncate(checkpoint.scalars);
    // runs the destructors of custom pullbacks recorded in the scope
    self.storage.owned.truncate(checkpoint.owned);
    self.outer.clear();
  }
}

impl Tape {
  /// Open a nested scope.
  ///
  /// Prefer [`Tape::nested`] or [`Tape::with_nested`], which cannot forget the
  /// matching [`Tape::recover_memory_nested`].
  pub fn start_nested(&self) {
    let mut inner = self.inner.borrow_mut();
    let checkpoint = inner.checkpoint();
    inner.checkpoints.push(checkpoint);
    trace!(depth = inner.checkpoints.len(), nodes = checkpoint.nodes, "start nested scope");
  }

  /// Close the innermost nested scope, truncating everything recorded since
  /// it was opened
  ///
  /// # Panics
  ///
  /// Panics when no nested scope is open.
  pub fn recover_memory_nested(&self) {
    let mut inner = self.inner.borrow_mut();
    let checkpoint = match inner.checkpoints.pop() {
      Some(checkpoint) => checkpoint,
      None => panic!("recover_memory_nested called without a matching start_nested"),
    };
    trace!(
      depth = inner.checkpoints.len() + 1,
      reclaimed = inner.nodes.len() - checkpoint.nodes,
      "recover nested scope"
    );
    inner.restore(checkpoint);
  }

  /// Number of nested scopes currently open
  pub fn nesting_depth(&self) -> usize {
    self.inner.borrow().checkpoints.len()
  }

  /// Open a nested scope that is recovered when the returned guard drops, on
  /// every exit path including unwinding
  #[must_use = "the scope is recovered as soon as the guard is dropped"]
  pub fn nested(&self) -> Nested<'_> {
    self.start_nested();
    Nested {
      tape: self,
      depth: self.nesting_depth(),
    }
  }

  /// Run `f` inside a nested scope.
  ///
  /// The scope is recovered however `f` exits, so an `Err` from collaborator
  /// code leaves the tape exactly as it was before the call.
  ///
  /// Handles created inside `f` must not be returned from it. Using one panics
  /// only as long as the tape is shorter than it was inside the scope; after
  /// enough new nodes are recorded it aliases one of them and yields wrong
  /// values and gradients instead.
  pub fn with_nested<R, F>(&self, f: F) -> R
  where
    F: FnOnce() -> R,
  {
    let _scope = self.nested();
    f()
  }
}

/// Guard for a nested scope, see [`Tape::nested`]
#[derive(Debug)]
pub struct Nested<'t> {
  tape: &'t Tape,
  depth: usize,
}

impl Nested<'_> {
  /// Depth of the scope this guard owns (the outermost nested scope is 1)
  pub fn depth(&self) -> usize {
    self.depth
  }
}

impl Drop for Nested<'_> {
  fn drop(&mut self) {
    let open = self.tape.nesting_depth();
    if open != self.depth {
      // don't turn an unwinding panic into an abort...
      if thread::panicking() {
        return;
      }
      panic!(
        "nested scope {} closed while {} scopes are open",
        self.depth, open
      );
    }
    self.tape.recover_memory_nested();
  }
}
