use crate::block::{DSIZE, MIN_BLOCK};

/// Bytes requested from the region when no free block fits.
pub const CHUNK_SIZE: usize = 1 << 12;

/// Default ceiling for the convenience constructors.
pub const MAX_HEAP: usize = 20 * (1 << 20);

/// Tunables for a [`Heap`](crate::Heap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  /// Minimum extension size, also the size of the first free block.
  pub chunk_size: usize,
  /// Region size limit used by [`Heap::arena`](crate::Heap::arena) and
  /// [`Heap::mmap`](crate::Heap::mmap).
  pub max_heap: usize,
}

impl HeapConfig {
  pub const fn new() -> Self {
    Self {
      chunk_size: CHUNK_SIZE,
      max_heap: MAX_HEAP,
    }
  }

  #[must_use]
  pub const fn with_chunk_size(
    mut self,
    chunk_size: usize,
  ) -> Self {
    self.chunk_size = chunk_size;
    self
  }

  #[must_use]
  pub const fn with_max_heap(
    mut self,
    max_heap: usize,
  ) -> Self {
    self.max_heap = max_heap;
    self
  }

  /// Chunk size rounded up to the alignment unit, at least one minimum block.
  pub(crate) const fn effective_chunk_size(&self) -> usize {
    let rounded = self.chunk_size.saturating_add(DSIZE - 1) & !(DSIZE - 1);
    if rounded < MIN_BLOCK { MIN_BLOCK } else { rounded }
  }
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_config() {
    let config = HeapConfig::default();
    assert_eq!(config.chunk_size, CHUNK_SIZE);
    assert_eq!(config.max_heap, MAX_HEAP);
    assert_eq!(config.effective_chunk_size(), CHUNK_SIZE);
  }

  #[test]
  fn test_effective_chunk_size_is_usable() {
    assert_eq!(HeapConfig::new().with_chunk_size(0).effective_chunk_size(), MIN_BLOCK);
    assert_eq!(HeapConfig::new().with_chunk_size(1).effective_chunk_size(), MIN_BLOCK);
    assert_eq!(
      HeapConfig::new().with_chunk_size(MIN_BLOCK + 1).effective_chunk_size(),
      MIN_BLOCK + DSIZE
    );
  }
}
