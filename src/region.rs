//! The boundary between the allocator and whatever supplies raw memory.

use std::ops::Range;

/// Failure of the memory source.
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
  #[error("region exhausted: requested {requested} bytes, {available} available")]
  Exhausted { requested: usize, available: usize },
  #[error("failed to reserve region: {0}")]
  Map(#[from] std::io::Error),
}

/// A contiguous byte range that only grows at its tail.
///
/// This is the `sbrk`-style extension primitive the heap sits on. The heap
/// owns the region exclusively and addresses it by offset, so an
/// implementation may move its storage between calls as long as the bytes
/// in `0..break` are preserved.
pub trait Region {
  /// Appends `increment` bytes and returns the offset of the first new byte
  /// (the old break).
  fn sbrk(
    &mut self,
    increment: usize,
  ) -> Result<usize, RegionError>;

  /// The bytes in `0..break`.
  fn as_bytes(&self) -> &[u8];

  /// The bytes in `0..break`, mutably.
  fn as_bytes_mut(&mut self) -> &mut [u8];

  /// Current traversal range of the region.
  fn bounds(&self) -> Range<usize> {
    0..self.as_bytes().len()
  }
}
