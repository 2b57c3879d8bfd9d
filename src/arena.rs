use std::{mem, slice};

use crate::{
  block::DSIZE,
  region::{Region, RegionError},
};

/// Storage unit; its alignment makes the arena base double-word aligned.
type Unit = u128;

const UNIT: usize = mem::size_of::<Unit>();

const _: () = assert!(mem::align_of::<Unit>() >= DSIZE);

/// A region backed by a heap-allocated buffer with a hard size limit.
///
/// Behaves like a simulated `sbrk`: every extension appends zeroed bytes, and
/// asking for more than `limit` in total fails without changing anything.
/// The buffer is stored as whole `u128` words, so the region base is aligned
/// like an `mmap` base and payload addresses are double-word aligned.
#[derive(Debug, Clone)]
pub struct ArenaRegion {
  words: Vec<Unit>,
  brk: usize,
  limit: usize,
}

impl ArenaRegion {
  pub fn with_limit(limit: usize) -> Self {
    Self {
      words: Vec::new(),
      brk: 0,
      limit,
    }
  }

  pub const fn limit(&self) -> usize {
    self.limit
  }
}

impl Region for ArenaRegion {
  fn sbrk(
    &mut self,
    increment: usize,
  ) -> Result<usize, RegionError> {
    let old_brk = self.brk;
    let available = self.limit - old_brk;

    if increment > available {
      return Err(RegionError::Exhausted {
        requested: increment,
        available,
      });
    }

    // Bytes past the break are never written, so the tail of the last word
    // is still zero.
    self.brk = old_brk + increment;
    self.words.resize(self.brk.div_ceil(UNIT), 0);
    Ok(old_brk)
  }

  fn as_bytes(&self) -> &[u8] {
    // `words` holds at least `brk` initialized bytes, and any bit pattern is
    // a valid `u8`.
    unsafe { slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.brk) }
  }

  fn as_bytes_mut(&mut self) -> &mut [u8] {
    unsafe { slice::from_raw_parts_mut(self.words.as_mut_ptr().cast::<u8>(), self.brk) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sbrk_returns_old_break() {
    let mut region = ArenaRegion::with_limit(64);

    assert_eq!(region.sbrk(16).unwrap(), 0);
    assert_eq!(region.sbrk(32).unwrap(), 16);
    assert_eq!(region.bounds(), 0..48);
    assert!(region.as_bytes().iter().all(|&b| b == 0));
  }

  #[test]
  fn test_sbrk_past_limit_fails() {
    let mut region = ArenaRegion::with_limit(64);
    region.sbrk(48).unwrap();

    let err = region.sbrk(32).unwrap_err();
    assert!(matches!(
      err,
      RegionError::Exhausted {
        requested: 32,
        available: 16
      }
    ));
    assert_eq!(region.bounds(), 0..48);

    assert_eq!(region.sbrk(16).unwrap(), 48);
  }

  #[test]
  fn test_base_is_double_word_aligned() {
    let mut region = ArenaRegion::with_limit(4096);
    region.sbrk(24).unwrap();
    assert_eq!(region.as_bytes().as_ptr() as usize % DSIZE, 0);

    // Growing past the current capacity moves the buffer; the base stays aligned.
    region.as_bytes_mut()[..24].fill(0xAB);
    assert_eq!(region.sbrk(2000).unwrap(), 24);
    assert_eq!(region.as_bytes().as_ptr() as usize % DSIZE, 0);
    assert!(region.as_bytes()[..24].iter().all(|&b| b == 0xAB));
    assert!(region.as_bytes()[24..].iter().all(|&b| b == 0));
  }

  #[test]
  fn test_arena_heap_addresses_are_aligned() {
    use crate::{config::HeapConfig, heap::Heap};

    let mut heap = Heap::arena(HeapConfig::new().with_max_heap(1 << 16)).unwrap();
    for size in [1, 24, 100, 5000] {
      let ptr = heap.allocate(size).unwrap().unwrap();
      assert_eq!(heap.as_mut_ptr(ptr) as usize % DSIZE, 0);
    }
  }
}
