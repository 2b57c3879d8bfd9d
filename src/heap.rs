//! The heap context: region, free list and the allocation path.

use crate::{
  align,
  arena::ArenaRegion,
  block::{self, DSIZE, MIN_BLOCK, Tag, WSIZE},
  config::HeapConfig,
  error::HeapError,
  free_list::FreeList,
  region::Region,
};

/// Handle to an allocated block: the region offset of its first payload byte.
///
/// Offsets are always multiples of [`DSIZE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockPtr(pub(crate) usize);

impl BlockPtr {
  pub const fn offset(self) -> usize {
    self.0
  }
}

/// A boundary-tag heap with an explicit first-fit free list.
///
/// ```text
///   offset 0
///   ┌─────┬──────────────────┬─────────┬─────────┬─────┬──────────┐
///   │ pad │ prologue [16:a]  │ block 1 │ block 2 │ ... │ epilogue │
///   └─────┴──────────────────┴─────────┴─────────┴─────┴──────────┘
///                                                      [0:a] header only
/// ```
///
/// The prologue and epilogue are permanently allocated sentinels, so the
/// neighbor checks in coalescing never run off either end of the region.
///
/// A heap is single threaded and not reentrant; wrap it in a lock to share it.
pub struct Heap<R: Region> {
  pub(crate) region: R,
  pub(crate) free_list: FreeList,
  /// Payload offset of the prologue block.
  pub(crate) prologue: usize,
  pub(crate) config: HeapConfig,
}

impl<R: Region> Heap<R> {
  /// Lays out the sentinels in an empty `region` and adds the first free chunk.
  pub fn init(
    mut region: R,
    config: HeapConfig,
  ) -> Result<Self, HeapError> {
    let requested = 4 * WSIZE;
    let start = region
      .sbrk(requested)
      .map_err(|source| HeapError::Exhausted { requested, source })?;
    debug_assert_eq!(start % DSIZE, 0, "region must start empty and aligned");

    let bytes = region.as_bytes_mut();
    block::put(bytes, start, 0);
    block::put(bytes, start + WSIZE, Tag::pack(DSIZE, true).bits());
    block::put(bytes, start + 2 * WSIZE, Tag::pack(DSIZE, true).bits());
    block::put(bytes, start + 3 * WSIZE, Tag::pack(0, true).bits());

    let mut heap = Self {
      region,
      free_list: FreeList::new(),
      prologue: start + DSIZE,
      config,
    };

    heap.extend_heap(config.effective_chunk_size())?;
    log::debug!(
      "heap initialized: {} bytes, chunk size {}",
      heap.region.bounds().end,
      config.effective_chunk_size()
    );

    Ok(heap)
  }

  pub const fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub const fn region(&self) -> &R {
    &self.region
  }

  /// Allocates a block with at least `size` bytes of payload.
  ///
  /// A zero-sized request is a no-op and yields `Ok(None)`.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<Option<BlockPtr>, HeapError> {
    if size == 0 {
      return Ok(None);
    }

    let Some(asize) = align::adjusted_size(size) else {
      log::warn!("allocate({size}) failed: size overflows the block layout");
      return Err(HeapError::SizeOverflow { requested: size });
    };

    let bp = match self.find_fit(asize) {
      Some(bp) => bp,
      None => {
        let extend = asize.max(self.config.effective_chunk_size());
        self
          .extend_heap(extend)
          .inspect_err(|err| log::warn!("allocate({size}) failed: {err}"))?
      },
    };

    self.place(bp, asize);
    Ok(Some(BlockPtr(bp)))
  }

  /// Usable payload bytes of an allocated block.
  pub fn capacity(
    &self,
    ptr: BlockPtr,
  ) -> usize {
    block::size_of(self.region.as_bytes(), ptr.0) - DSIZE
  }

  pub fn payload(
    &self,
    ptr: BlockPtr,
  ) -> &[u8] {
    let len = self.capacity(ptr);
    &self.region.as_bytes()[ptr.0..ptr.0 + len]
  }

  pub fn payload_mut(
    &mut self,
    ptr: BlockPtr,
  ) -> &mut [u8] {
    let len = self.capacity(ptr);
    &mut self.region.as_bytes_mut()[ptr.0..ptr.0 + len]
  }

  /// Raw address of the payload. Valid until the next heap operation that
  /// may extend a region whose storage can move.
  pub fn as_mut_ptr(
    &mut self,
    ptr: BlockPtr,
  ) -> *mut u8 {
    self.region.as_bytes_mut()[ptr.0..].as_mut_ptr()
  }

  /// First fit over the free list, most recently freed first.
  fn find_fit(
    &self,
    asize: usize,
  ) -> Option<usize> {
    let bytes = self.region.as_bytes();
    let fit = self
      .free_list
      .iter(bytes)
      .find(|&bp| block::size_of(bytes, bp) >= asize);

    log::trace!("find_fit({asize}) -> {fit:?}");
    fit
  }

  /// Carves an `asize` block out of the free block at `bp`, splitting off the
  /// remainder when it can stand alone.
  pub(crate) fn place(
    &mut self,
    bp: usize,
    asize: usize,
  ) {
    let bytes = self.region.as_bytes_mut();
    let csize = block::size_of(bytes, bp);

    self.free_list.remove(bytes, bp);

    if csize - asize >= MIN_BLOCK {
      block::make_header_footer(bytes, bp, asize, true);
      let rest = block::next_block(bytes, bp);
      block::make_header_footer(bytes, rest, csize - asize, false);
      log::trace!("place: split {csize} at {bp:#x} into {asize} + {}", csize - asize);
      self.coalesce(rest);
    } else {
      block::make_header_footer(bytes, bp, csize, true);
      log::trace!("place: whole {csize} block at {bp:#x} for {asize}");
    }
  }

  /// Appends a free block of at least `bytes` bytes, coalesces it with a free
  /// tail block and returns the resulting free block.
  pub(crate) fn extend_heap(
    &mut self,
    bytes: usize,
  ) -> Result<usize, HeapError> {
    let size = bytes
      .checked_next_multiple_of(DSIZE)
      .ok_or(HeapError::SizeOverflow { requested: bytes })?;

    let bp = self
      .region
      .sbrk(size)
      .map_err(|source| HeapError::Exhausted { requested: size, source })?;

    // The old epilogue header becomes the new block's header.
    let region = self.region.as_bytes_mut();
    block::make_header_footer(region, bp, size, false);
    let epilogue = block::next_block(region, bp);
    block::put(region, block::header(epilogue), Tag::pack(0, true).bits());

    log::debug!("extended heap by {size} bytes to {}", region.len());
    Ok(self.coalesce(bp))
  }
}

impl Heap<ArenaRegion> {
  /// A heap over a `Vec`-backed region limited to `config.max_heap` bytes.
  pub fn arena(config: HeapConfig) -> Result<Self, HeapError> {
    Self::init(ArenaRegion::with_limit(config.max_heap), config)
  }
}

#[cfg(unix)]
impl Heap<crate::mmap::MmapRegion> {
  /// A heap over a private `mmap` reservation of `config.max_heap` bytes.
  pub fn mmap(config: HeapConfig) -> Result<Self, HeapError> {
    let region =
      crate::mmap::MmapRegion::new(config.max_heap).map_err(|source| HeapError::Exhausted {
        requested: config.max_heap,
        source,
      })?;
    Self::init(region, config)
  }
}
