//! Sizing knobs for the arenas backing a [`Tape`](crate::Tape)

use std::mem;

/// First chunk of every arena, in bytes
pub const DEFAULT_INITIAL_CHUNK_BYTES: usize = 1 << 16;

/// Chunks stop growing once they reach this many bytes...
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 1 << 26;

pub const DEFAULT_GROWTH_FACTOR: usize = 2;

/// Chunk growth policy for the auxiliary-data arenas.
///
/// Chunks grow geometrically from `initial_chunk_bytes` by `growth_factor` until
/// they reach `max_chunk_bytes`; a single request larger than the cap still gets
/// a dedicated chunk of exactly the requested size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
  pub initial_chunk_bytes: usize,
  pub max_chunk_bytes: usize,
  pub growth_factor: usize,
}

impl ArenaConfig {
  /// Repair a config so every derived size is usable: non-zero sizes, a cap no
  /// smaller than the first chunk, and a growth factor of at least one
  pub fn normalized(self) -> Self {
    let initial_chunk_bytes = self.initial_chunk_bytes.max(1);
    Self {
      initial_chunk_bytes,
      max_chunk_bytes: self.max_chunk_bytes.max(initial_chunk_bytes),
      growth_factor: self.growth_factor.max(1),
    }
  }

  #[inline]
  pub(crate) fn initial_elements<T>(&self) -> usize {
    elements_of::<T>(self.initial_chunk_bytes)
  }

  #[inline]
  pub(crate) fn max_elements<T>(&self) -> usize {
    elements_of::<T>(self.max_chunk_bytes)
  }

  /// Capacity of the chunk following one of `previous` elements
  #[inline]
  pub(crate) fn next_elements<T>(&self, previous: usize) -> usize {
    previous
      .saturating_mul(self.growth_factor)
      .clamp(self.initial_elements::<T>(), self.max_elements::<T>())
  }
}

impl Default for ArenaConfig {
  fn default() -> Self {
    Self {
      initial_chunk_bytes: DEFAULT_INITIAL_CHUNK_BYTES,
      max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
      growth_factor: DEFAULT_GROWTH_FACTOR,
    }
  }
}

#[inline]
fn elements_of<T>(bytes: usize) -> usize {
  (bytes / mem::size_of::<T>().max(1)).max(1)
}
