//! Heap inspection and the consistency checker.
//!
//! Nothing here is called from allocate, free or resize. The checker is a
//! development aid: it reports what it finds and never repairs anything.

use crate::{
  block::{self, DSIZE, MIN_BLOCK, Tag, WSIZE},
  free_list,
  heap::{BlockPtr, Heap},
  region::Region,
};

/// One block as seen by a heap walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  pub ptr: BlockPtr,
  /// Total size, tags included.
  pub size: usize,
  pub allocated: bool,
}

/// Aggregate view of the heap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
  pub region_bytes: usize,
  pub allocated_blocks: usize,
  pub allocated_bytes: usize,
  pub free_blocks: usize,
  pub free_bytes: usize,
  pub largest_free: usize,
}

/// A broken heap invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
  #[error("bad prologue: header {header:?}, footer {footer:?}")]
  BadPrologue { header: Tag, footer: Tag },
  #[error("bad epilogue at {offset:#x}: {tag:?}")]
  BadEpilogue { offset: usize, tag: Tag },
  #[error("{offset:#x} is not doubleword aligned")]
  Misaligned { offset: usize },
  #[error("header {header:?} does not match footer {footer:?} at {offset:#x}")]
  TagMismatch {
    offset: usize,
    header: Tag,
    footer: Tag,
  },
  #[error("block at {offset:#x} is {size} bytes, below the minimum")]
  Undersized { offset: usize, size: usize },
  #[error("block at {offset:#x} with size {size} runs past the region end {end:#x}")]
  OutOfBounds { offset: usize, size: usize, end: usize },
  #[error("free blocks at {offset:#x} and {next:#x} are adjacent")]
  AdjacentFree { offset: usize, next: usize },
  #[error("free list entry {offset:#x} is not a free block")]
  NotFree { offset: usize },
  #[error("free list entry {offset:#x} links back to {found:?}, expected {expected:?}")]
  BrokenLink {
    offset: usize,
    expected: Option<usize>,
    found: Option<usize>,
  },
  #[error("free list has a cycle or stray entries past {offset:#x}")]
  Cycle { offset: usize },
  #[error("free list holds {listed} blocks, the heap walk found {walked}")]
  FreeCountMismatch { listed: usize, walked: usize },
}

/// Address-order walk from the first real block up to the epilogue.
pub struct Blocks<'a> {
  bytes: &'a [u8],
  bp: usize,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<Self::Item> {
    if self.bp > self.bytes.len() {
      return None;
    }
    let tag = block::header_tag(self.bytes, self.bp);
    if tag.size() == 0 || tag.size() > self.bytes.len() - self.bp {
      return None;
    }

    let info = BlockInfo {
      ptr: BlockPtr(self.bp),
      size: tag.size(),
      allocated: tag.is_allocated(),
    };
    self.bp += tag.size();
    Some(info)
  }
}

impl<R: Region> Heap<R> {
  /// Offset of the first real block. Fixed by the layout, so a corrupted
  /// prologue tag cannot send a walk astray.
  const fn first_block(&self) -> usize {
    self.prologue + DSIZE
  }

  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      bytes: self.region.as_bytes(),
      bp: self.first_block(),
    }
  }

  /// Free blocks in free-list order, most recently freed first.
  pub fn free_blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    let bytes = self.region.as_bytes();
    self.free_list.iter(bytes).map(move |bp| {
      let tag = block::header_tag(bytes, bp);
      BlockInfo {
        ptr: BlockPtr(bp),
        size: tag.size(),
        allocated: tag.is_allocated(),
      }
    })
  }

  pub fn stats(&self) -> HeapStats {
    let mut stats = HeapStats {
      region_bytes: self.region.bounds().len(),
      ..HeapStats::default()
    };

    for info in self.blocks() {
      if info.allocated {
        stats.allocated_blocks += 1;
        stats.allocated_bytes += info.size;
      } else {
        stats.free_blocks += 1;
        stats.free_bytes += info.size;
        stats.largest_free = stats.largest_free.max(info.size);
      }
    }

    stats
  }

  /// Walks the whole heap and its free list, logging every violation found.
  ///
  /// With `verbose`, every block is also logged at debug level.
  pub fn check(
    &self,
    verbose: bool,
  ) -> Vec<Violation> {
    let mut violations = Vec::new();
    let bytes = self.region.as_bytes();
    let end = self.region.bounds().end;

    if verbose {
      log::debug!("heap ({} bytes, prologue at {:#x}):", end, self.prologue);
    }

    let header = block::header_tag(bytes, self.prologue);
    let footer = Tag::from_bits(block::get(bytes, self.prologue));
    if header != Tag::pack(DSIZE, true) || footer != header {
      violations.push(Violation::BadPrologue { header, footer });
    }

    let walked = self.check_blocks(bytes, end, verbose, &mut violations);
    self.check_free_list(bytes, end, walked, &mut violations);

    for violation in &violations {
      log::error!("{violation}");
    }
    violations
  }

  /// Returns the number of free blocks seen.
  fn check_blocks(
    &self,
    bytes: &[u8],
    end: usize,
    verbose: bool,
    violations: &mut Vec<Violation>,
  ) -> usize {
    let mut free_seen = 0;
    let mut prev_free: Option<usize> = None;
    let mut bp = self.first_block();

    loop {
      if bp > end {
        violations.push(Violation::OutOfBounds {
          offset: bp,
          size: 0,
          end,
        });
        break;
      }

      let header = block::header_tag(bytes, bp);
      if header.size() == 0 {
        if verbose {
          log::debug!("{bp:#x}: end of heap");
        }
        if !header.is_allocated() || bp != end {
          violations.push(Violation::BadEpilogue {
            offset: bp,
            tag: header,
          });
        }
        break;
      }

      if header.size() > end - bp {
        violations.push(Violation::OutOfBounds {
          offset: bp,
          size: header.size(),
          end,
        });
        break;
      }

      let footer = block::footer_tag(bytes, bp);
      if verbose {
        log::debug!("{bp:#x}: header: {header:?} footer: {footer:?}");
      }

      if bp % DSIZE != 0 {
        violations.push(Violation::Misaligned { offset: bp });
      }
      if header != footer {
        violations.push(Violation::TagMismatch {
          offset: bp,
          header,
          footer,
        });
      }
      if header.size() < MIN_BLOCK {
        violations.push(Violation::Undersized {
          offset: bp,
          size: header.size(),
        });
      }

      if header.is_allocated() {
        prev_free = None;
      } else {
        free_seen += 1;
        if let Some(prev) = prev_free {
          violations.push(Violation::AdjacentFree {
            offset: prev,
            next: bp,
          });
        }
        prev_free = Some(bp);
      }

      bp += header.size();
    }

    free_seen
  }

  fn check_free_list(
    &self,
    bytes: &[u8],
    end: usize,
    walked: usize,
    violations: &mut Vec<Violation>,
  ) {
    // A list longer than the number of possible blocks must loop.
    let limit = end / MIN_BLOCK + 1;
    let mut listed = 0;
    let mut expected_prev = None;
    let mut current = self.free_list.head();

    while let Some(bp) = current {
      if listed == limit {
        violations.push(Violation::Cycle { offset: bp });
        return;
      }
      if bp < self.first_block() || bp > end.saturating_sub(2 * WSIZE) {
        violations.push(Violation::OutOfBounds {
          offset: bp,
          size: 0,
          end,
        });
        return;
      }
      if bp % DSIZE != 0 {
        violations.push(Violation::Misaligned { offset: bp });
        return;
      }
      if block::is_allocated(bytes, bp) {
        violations.push(Violation::NotFree { offset: bp });
      }

      let found = free_list::prev_free(bytes, bp);
      if found != expected_prev {
        violations.push(Violation::BrokenLink {
          offset: bp,
          expected: expected_prev,
          found,
        });
      }

      listed += 1;
      expected_prev = Some(bp);
      current = free_list::next_free(bytes, bp);
    }

    if listed != walked {
      violations.push(Violation::FreeCountMismatch { listed, walked });
    }
  }
}
