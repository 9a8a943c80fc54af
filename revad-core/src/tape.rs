use std::cell::RefCell;
use std::fmt;
use std::ptr;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::arena::{Arena, Span};
use crate::config::ArenaConfig;
use crate::nested::Checkpoint;
use crate::node::{Node, NodeIndex, NodeKind};
use crate::partials::Pullback;
use crate::var::Var;

/// Everything nodes point into besides the node list itself
pub(crate) struct Storage {
  /// Operand index lists of multi-operand nodes
  pub(crate) operands: Arena<NodeIndex>,
  /// Constant vectors and explicit partials
  pub(crate) scalars: Arena<f64>,
  /// Custom pullbacks; unlike arena data these own resources and get dropped
  /// when their scope is truncated
  pub(crate) owned: Vec<Box<dyn Pullback>>,
}

impl Storage {
  fn new(config: ArenaConfig) -> Self {
    Self {
      operands: Arena::new(config),
      scalars: Arena::new(config),
      owned: Vec::new(),
    }
  }
}

pub(crate) struct TapeInner {
  pub(crate) nodes: Vec<Node>,
  pub(crate) storage: Storage,
  pub(crate) checkpoints: Vec<Checkpoint>,
  /// Adjoint contributions to nodes below the active scope, collected during a
  /// nested sweep so the outer nodes themselves are never written
  pub(crate) outer: FxHashMap<NodeIndex, f64>,
}

impl TapeInner {
  /// Panic on handles that outlived the scope their node was recorded in.
  ///
  /// Indices carry no generation, so this only catches a stale handle while its
  /// index is past the end of the tape. Once later nodes refill that range the
  /// handle silently refers to one of them.
  #[inline(always)]
  pub(crate) fn live(&self, index: NodeIndex) -> NodeIndex {
    assert!(
      index < self.nodes.len(),
      "handle refers to node {} but the tape only holds {} (was its scope recovered?)",
      index,
      self.nodes.len()
    );
    index
  }

  /// Copy the operand indices of `vars` into the arena
  pub(crate) fn alloc_operands(&mut self, vars: &[Var<'_>]) -> Span<NodeIndex> {
    for var in vars {
      self.live(var.index());
    }
    self.storage.operands.alloc_iter(vars.iter().map(Var::index))
  }

  #[inline]
  pub(crate) fn alloc_scalars(&mut self, values: &[f64]) -> Span<f64> {
    self.storage.scalars.alloc(values)
  }

  pub(crate) fn push_owned(&mut self, pullback: Box<dyn Pullback>) -> usize {
    self.storage.owned.push(pullback);
    self.storage.owned.len() - 1
  }

  /// First node of the innermost open scope
  #[inline]
  pub(crate) fn active_base(&self) -> NodeIndex {
    self.checkpoints.last().map_or(0, Checkpoint::nodes)
  }

  pub(crate) fn zero_active(&mut self) {
    let base = self.active_base();
    for node in &mut self.nodes[base..] {
      node.adjoint = 0.0;
    }
    self.outer.clear();
  }

  fn clear(&mut self) {
    self.nodes.clear();
    self.storage.operands.clear();
    self.storage.scalars.clear();
    self.storage.owned.clear();
    self.checkpoints.clear();
    self.outer.clear();
  }

  fn release(&mut self) {
    self.clear();
    self.nodes = Vec::new();
    self.storage.operands.release();
    self.storage.scalars.release();
    self.storage.owned = Vec::new();
    self.checkpoints = Vec::new();
    self.outer = FxHashMap::default();
  }

  fn stats(&self) -> TapeStats {
    let mut by_kind = FxHashMap::default();
    for node in &self.nodes {
      *by_kind.entry(node.kind.name()).or_insert(0) += 1;
    }
    TapeStats {
      nodes: self.nodes.len(),
      by_kind,
      operand_slots: self.storage.operands.len(),
      scalar_slots: self.storage.scalars.len(),
      arena_chunks: self.storage.operands.chunk_count() + self.storage.scalars.chunk_count(),
      owned: self.storage.owned.len(),
      nesting_depth: self.checkpoints.len(),
    }
  }
}

/// A `Tape` is the explicit context every computation records onto: an
/// append-only Wengert list of nodes, the arenas backing them, and a stack of
/// checkpoints for nested scopes.
///
/// Cool things to note:
/// - creation order is a valid reverse-topological order, so a sweep is just a
///   backwards walk, no graph traversal needed
/// - a tape is `!Sync`; handles borrow it, so they can never leave the thread
/// - [`Tape::recover_memory`] takes `&mut self`, so no handle can survive a
///   full reset
pub struct Tape {
  pub(crate) inner: RefCell<TapeInner>,
}

impl Tape {
  pub fn new() -> Self {
    Self::with_config(ArenaConfig::default())
  }

  pub fn with_config(config: ArenaConfig) -> Self {
    Self {
      inner: RefCell::new(TapeInner {
        nodes: Vec::new(),
        storage: Storage::new(config),
        checkpoints: Vec::new(),
        outer: FxHashMap::default(),
      }),
    }
  }

  /// Construct a new independent variable of a specific value
  #[inline]
  pub fn var(&self, value: f64) -> Var<'_> {
    self.record(value, |_| NodeKind::Leaf)
  }

  /// Same as [`Tape::var`]; a leaf whose gradient is never requested is simply
  /// a constant
  #[inline(always)]
  pub fn leaf(&self, value: f64) -> Var<'_> {
    self.var(value)
  }

  /// Number of nodes recorded, across every open scope
  pub fn len(&self) -> usize {
    self.inner.borrow().nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Reset the adjoint of every node in the active scope to zero...
  ///
  /// The gradient engine does this before every sweep; it is exposed for
  /// collaborators that drive [`Tape::grad`] and read adjoints themselves.
  pub fn zero_all_adjoints(&self) {
    self.inner.borrow_mut().zero_active();
  }

  pub fn stats(&self) -> TapeStats {
    self.inner.borrow().stats()
  }

  /// Throw away everything recorded so far, keeping the memory for reuse.
  ///
  /// This is the outermost reset, usually called once per iteration of a
  /// sampler or optimizer loop. Taking `&mut self` guarantees no handle into
  /// the tape is still alive.
  pub fn recover_memory(&mut self) {
    let inner = self.inner.get_mut();
    assert!(
      inner.checkpoints.is_empty(),
      "recover_memory called with {} nested scopes still open",
      inner.checkpoints.len()
    );
    debug!(stats = ?inner.stats(), "recovering tape memory");
    inner.clear();
  }

  /// [`Tape::recover_memory`], but the node list and every arena chunk go back
  /// to the system too.
  ///
  /// Useful after one unusually large computation whose peak memory should not
  /// stay pinned for the lifetime of the tape.
  pub fn free_memory(&mut self) {
    let inner = self.inner.get_mut();
    assert!(
      inner.checkpoints.is_empty(),
      "free_memory called with {} nested scopes still open",
      inner.checkpoints.len()
    );
    debug!(stats = ?inner.stats(), "freeing tape memory");
    inner.release();
  }

  /// Core primitive for recording a node: `build` validates operands and
  /// allocates whatever auxiliary data the node needs, then the node is
  /// appended and a handle to it returned
  #[inline]
  pub(crate) fn record<F>(&self, value: f64, build: F) -> Var<'_>
  where
    F: FnOnce(&mut TapeInner) -> NodeKind,
  {
    let mut inner = self.inner.borrow_mut();
    let kind = build(&mut inner);
    let index = inner.nodes.len();
    inner.nodes.push(Node::new(value, kind));
    Var::new(value, index, self)
  }

  #[inline(always)]
  pub(crate) fn owns(&self, var: &Var<'_>) -> bool {
    ptr::eq(self, var.tape())
  }
}

impl Default for Tape {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for Tape {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let inner = self.inner.borrow();
    f.debug_struct("Tape")
      .field("nodes", &inner.nodes.len())
      .field("nesting_depth", &inner.checkpoints.len())
      .finish()
  }
}

/// Snapshot of what a tape is holding on to
#[derive(Debug, Clone, Default)]
pub struct TapeStats {
  pub nodes: usize,
  /// Node count per node shape (`"exp"`, `"dot_product"`, ...)
  pub by_kind: FxHashMap<&'static str, usize>,
  pub operand_slots: usize,
  pub scalar_slots: usize,
  pub arena_chunks: usize,
  pub owned: usize,
  pub nesting_depth: usize,
}

thread_local! {
  static THREAD_TAPE: RefCell<Tape> = RefCell::new(Tape::new());
}

/// Run `f` against this thread's tape, creating it on first use.
///
/// Handles cannot escape `f`, and [`recover_thread_tape`] cannot run while `f`
/// does.
pub fn with_thread_tape<R, F>(f: F) -> R
where
  F: FnOnce(&Tape) -> R,
{
  THREAD_TAPE.with(|tape| f(&tape.borrow()))
}

/// [`Tape::recover_memory`] for this thread's tape
///
/// # Panics
///
/// Panics when called from inside [`with_thread_tape`].
pub fn recover_thread_tape() {
  THREAD_TAPE.with(|tape| tape.borrow_mut().recover_memory())
}
