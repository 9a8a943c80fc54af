//! Chunked bump allocation for the variable-length data nodes refer to (operand
//! index lists, constant vectors, explicit partials).
//!
//! There is no per-object deallocation; memory is reclaimed by truncating back
//! to a [`Mark`], and the chunks themselves are kept around for reuse until
//! [`Arena::release`]...

use std::fmt;
use std::marker::PhantomData;

use tracing::debug;

use crate::config::ArenaConfig;

/// A contiguous run of `T` living in an [`Arena`]
pub struct Span<T> {
  chunk: u32,
  start: u32,
  len: u32,
  phantom: PhantomData<fn() -> T>,
}

impl<T> Span<T> {
  #[inline(always)]
  pub const fn empty() -> Self {
    Self {
      chunk: 0,
      start: 0,
      len: 0,
      phantom: PhantomData,
    }
  }

  #[inline]
  fn new(chunk: usize, start: usize, len: usize) -> Self {
    // spans are packed into nodes, so keep them small... nobody records 4 billion
    // operands into a single node and survives the sweep anyway
    assert!(
      chunk <= u32::MAX as usize && start <= u32::MAX as usize && len <= u32::MAX as usize,
      "arena span out of range"
    );
    Self {
      chunk: chunk as u32,
      start: start as u32,
      len: len as u32,
      phantom: PhantomData,
    }
  }

  #[inline(always)]
  pub fn len(&self) -> usize {
    self.len as usize
  }

  #[inline(always)]
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }
}

// derive would demand T: Copy...
impl<T> Clone for Span<T> {
  #[inline(always)]
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for Span<T> {}

impl<T> fmt::Debug for Span<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Span")
      .field("chunk", &self.chunk)
      .field("start", &self.start)
      .field("len", &self.len)
      .finish()
  }
}

/// Position of the free cursor at some point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mark {
  chunk: usize,
  len: usize,
}

/// Bump allocator over a list of fixed-capacity chunks.
///
/// Chunks never reallocate once created, so a [`Span`] stays valid until the
/// arena is truncated past it. Allocation failure aborts through the global
/// allocator; there is nothing sensible to retry with half a gradient recorded.
pub struct Arena<T> {
  chunks: Vec<Vec<T>>,
  current: usize,
  config: ArenaConfig,
}

impl<T: Copy> Arena<T> {
  pub fn new(config: ArenaConfig) -> Self {
    Self {
      chunks: Vec::new(),
      current: 0,
      config: config.normalized(),
    }
  }

  /// Copy `items` into the arena
  #[inline]
  pub fn alloc(&mut self, items: &[T]) -> Span<T> {
    self.alloc_iter(items.iter().copied())
  }

  /// Bump-allocate room for `items` and move them in
  pub fn alloc_iter<I>(&mut self, items: I) -> Span<T>
  where
    I: IntoIterator,
    I::IntoIter: ExactSizeIterator<Item = T>,
  {
    let items = items.into_iter();
    let len = items.len();
    if len == 0 {
      return Span::empty();
    }
    let chunk = self.reserve(len);
    let buf = &mut self.chunks[chunk];
    let start = buf.len();
    buf.extend(items.take(len));
    assert_eq!(buf.len() - start, len, "iterator reported the wrong length");
    Span::new(chunk, start, len)
  }

  /// Read back a span allocated from this arena
  #[inline]
  pub fn get(&self, span: Span<T>) -> &[T] {
    if span.is_empty() {
      return &[];
    }
    let start = span.start as usize;
    &self.chunks[span.chunk as usize][start..start + span.len()]
  }

  #[inline]
  pub fn mark(&self) -> Mark {
    match self.chunks.get(self.current) {
      Some(buf) => Mark {
        chunk: self.current,
        len: buf.len(),
      },
      None => Mark::default(),
    }
  }

  /// Reset the free cursor to `mark`, keeping every chunk for reuse...
  ///
  /// Marks must be restored in LIFO order; truncating to a mark ahead of the
  /// cursor means a checkpoint was restored out of order.
  pub fn truncate(&mut self, mark: Mark) {
    if self.chunks.is_empty() {
      return;
    }
    assert!(
      mark.chunk < self.current || (mark.chunk == self.current && mark.len <= self.chunks[mark.chunk].len()),
      "arena truncated past its cursor"
    );
    for buf in &mut self.chunks[mark.chunk + 1..=self.current] {
      buf.clear();
    }
    self.chunks[mark.chunk].truncate(mark.len);
    self.current = mark.chunk;
  }

  #[inline]
  pub fn clear(&mut self) {
    self.truncate(Mark::default());
  }

  /// Empty the arena and hand every chunk back to the system
  pub fn release(&mut self) {
    debug!(chunks = self.chunks.len(), elements = self.capacity(), "releasing arena chunks");
    self.chunks = Vec::new();
    self.current = 0;
  }

  /// Number of elements currently handed out
  pub fn len(&self) -> usize {
    // everything after the cursor is empty
    self.chunks.iter().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Number of elements reserved from the system, used or not
  pub fn capacity(&self) -> usize {
    self.chunks.iter().map(Vec::capacity).sum()
  }

  pub fn chunk_count(&self) -> usize {
    self.chunks.len()
  }

  /// Find a chunk with room for `len` more elements, advancing (and growing)
  /// when the current one is exhausted
  fn reserve(&mut self, len: usize) -> usize {
    if let Some(buf) = self.chunks.get(self.current) {
      if buf.capacity() - buf.len() >= len {
        return self.current;
      }
    }

    let next = if self.chunks.is_empty() { 0 } else { self.current + 1 };
    let wanted = match next {
      0 => self.config.initial_elements::<T>(),
      _ => self.config.next_elements::<T>(self.chunks[self.current].capacity()),
    }
    .max(len);

    match self.chunks.get_mut(next) {
      // recycled from an earlier scope, and empty since the last truncate
      Some(buf) if buf.capacity() >= len => {}
      Some(buf) => {
        debug!(chunk = next, elements = wanted, "replacing undersized arena chunk");
        *buf = Vec::with_capacity(wanted);
      }
      None => {
        debug!(chunk = next, elements = wanted, "allocating arena chunk");
        self.chunks.push(Vec::with_capacity(wanted));
      }
    }
    self.current = next;
    next
  }
}

impl<T: Copy> Default for Arena<T> {
  fn default() -> Self {
    Self::new(ArenaConfig::default())
  }
}

impl<T> fmt::Debug for Arena<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Arena")
      .field("chunks", &self.chunks.len())
      .field("current", &self.current)
      .finish()
  }
}
