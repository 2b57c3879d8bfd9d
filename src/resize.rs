//! Growing blocks in place, or moving them when that is impossible.
//!
//! Growth only ever looks right: at a free successor or at the heap end.
//! A free predecessor is never merged into, even though coalescing could;
//! such blocks are relocated instead. Shrinking never splits.

use crate::{
  block::{self, DSIZE, MIN_BLOCK},
  error::HeapError,
  heap::{BlockPtr, Heap},
  region::Region,
};

impl<R: Region> Heap<R> {
  /// Resizes `ptr` to hold at least `size` payload bytes.
  ///
  /// `resize(None, size)` allocates and `resize(ptr, 0)` frees and yields
  /// `Ok(None)`. The first `min(old, new)` payload bytes survive a move. On
  /// error the original block is untouched.
  pub fn resize(
    &mut self,
    ptr: impl Into<Option<BlockPtr>>,
    size: usize,
  ) -> Result<Option<BlockPtr>, HeapError> {
    let ptr = ptr.into();

    if size == 0 {
      self.free(ptr);
      return Ok(None);
    }

    let Some(ptr) = ptr else {
      return self.allocate(size);
    };

    let Some(needed) = size.checked_add(DSIZE) else {
      log::warn!("resize({:#x}, {size}) failed: size overflows the block layout", ptr.0);
      return Err(HeapError::SizeOverflow { requested: size });
    };

    let bytes = self.region.as_bytes();
    let old_size = block::size_of(bytes, ptr.0);

    if needed <= old_size {
      log::trace!("resize({:#x}, {size}): fits in {old_size}", ptr.0);
      return Ok(Some(ptr));
    }

    let next = block::next_block(bytes, ptr.0);
    let next_tag = block::header_tag(bytes, next);

    if !next_tag.is_allocated() {
      let combined = old_size + next_tag.size();

      if combined >= needed {
        let bytes = self.region.as_bytes_mut();
        self.free_list.remove(bytes, next);
        block::make_header_footer(bytes, ptr.0, combined, true);
        log::trace!("resize({:#x}, {size}): absorbed free successor", ptr.0);
        return Ok(Some(ptr));
      }

      if block::size_of(bytes, block::next_block(bytes, next)) == 0 {
        return self.grow_at_end(ptr, needed - combined);
      }
    } else if next_tag.size() == 0 {
      return self.grow_at_end(ptr, needed - old_size);
    }

    self.relocate(ptr, size)
  }

  /// Extends the heap by `shortfall` and folds everything past `ptr` into it.
  ///
  /// Only valid when `ptr` is the last block, possibly followed by one free
  /// block, which the extension coalesces with.
  fn grow_at_end(
    &mut self,
    ptr: BlockPtr,
    shortfall: usize,
  ) -> Result<Option<BlockPtr>, HeapError> {
    // The new block briefly sits on the free list, so it needs room for links.
    let tail = self
      .extend_heap(shortfall.max(MIN_BLOCK))
      .inspect_err(|err| log::warn!("resize({:#x}) failed: {err}", ptr.0))?;

    let bytes = self.region.as_bytes_mut();
    self.free_list.remove(bytes, tail);
    let size = block::size_of(bytes, ptr.0) + block::size_of(bytes, tail);
    block::make_header_footer(bytes, ptr.0, size, true);

    log::trace!("resize({:#x}): grew in place to {size} at heap end", ptr.0);
    Ok(Some(ptr))
  }

  /// Allocates a fresh block, copies the payload over and frees `ptr`.
  fn relocate(
    &mut self,
    ptr: BlockPtr,
    size: usize,
  ) -> Result<Option<BlockPtr>, HeapError> {
    let moved = self
      .allocate(size)
      .inspect_err(|err| log::warn!("resize({:#x}, {size}) failed: {err}", ptr.0))?;

    let Some(new) = moved else {
      return Ok(None);
    };

    let len = self.capacity(ptr).min(self.capacity(new));
    self
      .region
      .as_bytes_mut()
      .copy_within(ptr.0..ptr.0 + len, new.0);
    self.free(ptr);

    log::trace!("resize({:#x}, {size}): moved to {:#x}", ptr.0, new.0);
    Ok(Some(new))
  }
}

#[cfg(test)]
mod tests {
  use crate::{
    block::DSIZE,
    error::HeapError,
    heap::{
      BlockPtr, Heap,
      tests::{assert_consistent, captured_warnings, small_heap},
    },
    region::Region,
  };

  fn fill<R: Region>(
    heap: &mut Heap<R>,
    ptr: BlockPtr,
  ) {
    for (i, byte) in heap.payload_mut(ptr).iter_mut().enumerate() {
      *byte = (i % 251) as u8;
    }
  }

  fn assert_pattern<R: Region>(
    heap: &Heap<R>,
    ptr: BlockPtr,
    len: usize,
  ) {
    for (i, byte) in heap.payload(ptr)[..len].iter().enumerate() {
      assert_eq!(*byte, (i % 251) as u8, "byte {i} changed");
    }
  }

  #[test]
  fn test_resize_none_and_zero() {
    let mut heap = small_heap();
    let before: Vec<_> = heap.blocks().collect();

    assert_eq!(heap.resize(None, 0).unwrap(), None);
    assert_eq!(heap.blocks().collect::<Vec<_>>(), before);

    let a = heap.resize(None, 40).unwrap().unwrap();
    assert!(heap.capacity(a) >= 40);

    assert_eq!(heap.resize(a, 0).unwrap(), None);
    assert_eq!(heap.blocks().collect::<Vec<_>>(), before);
    assert_consistent(&heap);
  }

  #[test]
  fn test_shrink_keeps_block() {
    let mut heap = small_heap();
    let a = heap.allocate(100).unwrap().unwrap();
    fill(&mut heap, a);
    let before: Vec<_> = heap.blocks().collect();

    assert_eq!(heap.resize(a, 10).unwrap(), Some(a));
    assert_eq!(heap.resize(a, heap.capacity(a)).unwrap(), Some(a));
    assert_eq!(heap.blocks().collect::<Vec<_>>(), before);
    assert_pattern(&heap, a, 100);
  }

  #[test]
  fn test_grow_into_free_successor() {
    let mut heap = small_heap();
    let a = heap.allocate(32).unwrap().unwrap();
    fill(&mut heap, a);
    let end = heap.region().bounds().end;

    let grown = heap.resize(a, 100).unwrap().unwrap();

    assert_eq!(grown, a);
    assert!(heap.capacity(a) >= 100);
    assert_eq!(heap.region().bounds().end, end);
    assert_pattern(&heap, a, 32);
    assert_consistent(&heap);
  }

  #[test]
  fn test_grow_through_free_tail_extends_heap() {
    let mut heap = small_heap();
    let a = heap.allocate(32).unwrap().unwrap();
    fill(&mut heap, a);
    let end = heap.region().bounds().end;

    let grown = heap.resize(a, 400).unwrap().unwrap();

    assert_eq!(grown, a);
    assert!(heap.capacity(a) >= 400);
    assert!(heap.region().bounds().end > end);
    assert_eq!(heap.free_blocks().count(), 0);
    assert_pattern(&heap, a, 32);
    assert_consistent(&heap);
  }

  #[test]
  fn test_grow_last_block_extends_heap() {
    let mut heap = small_heap();
    // Takes the whole initial chunk, so the epilogue follows it.
    let a = heap.allocate(256 - DSIZE).unwrap().unwrap();
    fill(&mut heap, a);

    let grown = heap.resize(a, 300).unwrap().unwrap();

    assert_eq!(grown, a);
    assert!(heap.capacity(a) >= 300);
    assert_eq!(heap.blocks().count(), 1);
    assert_pattern(&heap, a, 256 - DSIZE);
    assert_consistent(&heap);
  }

  #[test]
  fn test_grow_relocates_behind_allocated_successor() {
    let mut heap = small_heap();
    let a = heap.allocate(32).unwrap().unwrap();
    let _b = heap.allocate(32).unwrap().unwrap();
    fill(&mut heap, a);

    let moved = heap.resize(a, 100).unwrap().unwrap();

    assert_ne!(moved, a);
    assert!(heap.capacity(moved) >= 100);
    assert_pattern(&heap, moved, 32);
    assert!(heap.free_blocks().any(|blk| blk.ptr == a));
    assert_consistent(&heap);
  }

  #[test]
  fn test_grow_never_merges_left() {
    let mut heap = small_heap();
    let a = heap.allocate(32).unwrap().unwrap();
    let b = heap.allocate(32).unwrap().unwrap();
    let _c = heap.allocate(32).unwrap().unwrap();
    fill(&mut heap, b);
    heap.free(a);

    // `a` plus `b` would hold 60 bytes, but growth only looks right.
    let moved = heap.resize(b, 60).unwrap().unwrap();

    assert_ne!(moved, a);
    assert_ne!(moved, b);
    assert_pattern(&heap, moved, 32);
    assert_consistent(&heap);
  }

  #[test]
  fn test_failed_resize_keeps_original() {
    let mut heap = small_heap();
    let a = heap.allocate(32).unwrap().unwrap();
    let b = heap.allocate(32).unwrap().unwrap();
    fill(&mut heap, a);
    fill(&mut heap, b);
    let before: Vec<_> = heap.blocks().collect();

    // Relocation path.
    let err = heap.resize(a, 8000).unwrap_err();
    assert!(matches!(err, HeapError::Exhausted { .. }));
    // Tail growth path: `b` is followed by the free remainder.
    let err = heap.resize(b, 8000).unwrap_err();
    assert!(matches!(err, HeapError::Exhausted { .. }));

    assert_eq!(heap.blocks().collect::<Vec<_>>(), before);
    assert_pattern(&heap, a, 32);
    assert_pattern(&heap, b, 32);
    assert_consistent(&heap);
  }

  #[test]
  fn test_resize_overflow_logs_warning() {
    let mut heap = small_heap();
    let a = heap.allocate(32).unwrap().unwrap();
    fill(&mut heap, a);

    let warnings = captured_warnings(|| {
      let err = heap.resize(a, usize::MAX).unwrap_err();
      assert!(matches!(err, HeapError::SizeOverflow { .. }));
    });
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].starts_with(&format!("resize({:#x}, {})", a.offset(), usize::MAX)));
    assert_pattern(&heap, a, 32);
    assert_consistent(&heap);
  }

  #[test]
  fn test_resize_sequence_preserves_contents() {
    let mut heap = Heap::arena(crate::HeapConfig::new().with_chunk_size(512)).unwrap();
    let mut ptr = heap.allocate(8).unwrap().unwrap();
    let _pin = heap.allocate(8).unwrap().unwrap();
    fill(&mut heap, ptr);
    let mut len = heap.capacity(ptr);

    for size in [24, 24, 90, 300, 64, 1200, 5000] {
      ptr = heap.resize(ptr, size).unwrap().unwrap();
      assert!(heap.capacity(ptr) >= size);
      assert_eq!(ptr.offset() % DSIZE, 0);
      assert_pattern(&heap, ptr, len.min(size));
      fill(&mut heap, ptr);
      len = heap.capacity(ptr);
      assert_consistent(&heap);
    }
  }
}
