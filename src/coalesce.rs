//! Freeing and boundary-tag coalescing.

use crate::{
  block,
  heap::{BlockPtr, Heap},
  region::Region,
};

impl<R: Region> Heap<R> {
  /// Returns a block to the heap, merging it with free neighbors.
  ///
  /// Freeing `None` does nothing. Freeing anything that is not a live block
  /// from this heap corrupts it.
  pub fn free(
    &mut self,
    ptr: impl Into<Option<BlockPtr>>,
  ) {
    let Some(BlockPtr(bp)) = ptr.into() else {
      return;
    };

    let bytes = self.region.as_bytes_mut();
    debug_assert!(block::is_allocated(bytes, bp), "free of a block that is not allocated: {bp:#x}");

    let size = block::size_of(bytes, bp);
    block::make_header_footer(bytes, bp, size, false);
    self.coalesce(bp);
  }

  /// Merges the free block at `bp` with whichever neighbors are free, puts
  /// the result on the free list and returns its offset.
  ///
  /// `bp` must not be on the free list yet. The sentinels always read as
  /// allocated, which bounds both neighbor checks.
  pub(crate) fn coalesce(
    &mut self,
    mut bp: usize,
  ) -> usize {
    let bytes = self.region.as_bytes_mut();
    let prev_alloc = block::prev_allocated(bytes, bp);
    let next = block::next_block(bytes, bp);
    let next_alloc = block::is_allocated(bytes, next);
    let mut size = block::size_of(bytes, bp);

    match (prev_alloc, next_alloc) {
      (true, true) => {},
      (true, false) => {
        size += block::size_of(bytes, next);
        self.free_list.remove(bytes, next);
        block::make_header_footer(bytes, bp, size, false);
      },
      (false, true) => {
        let prev = block::prev_block(bytes, bp);
        size += block::size_of(bytes, prev);
        self.free_list.remove(bytes, prev);
        bp = prev;
        block::make_header_footer(bytes, bp, size, false);
      },
      (false, false) => {
        let prev = block::prev_block(bytes, bp);
        size += block::size_of(bytes, prev) + block::size_of(bytes, next);
        self.free_list.remove(bytes, next);
        self.free_list.remove(bytes, prev);
        bp = prev;
        block::make_header_footer(bytes, bp, size, false);
      },
    }

    log::trace!("coalesce: prev_alloc={prev_alloc} next_alloc={next_alloc} -> {size} at {bp:#x}");
    self.free_list.insert_front(bytes, bp);
    bp
  }
}
