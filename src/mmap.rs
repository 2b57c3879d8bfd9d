use std::{io, ptr::NonNull, slice};

use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, _SC_PAGESIZE, c_void};

use crate::region::{Region, RegionError};

/// A region carved out of one anonymous `mmap` reservation.
///
/// The whole capacity is mapped up front and a private break is advanced
/// inside it, so the region is contiguous, never moves, and is not shared
/// with the process heap the way the real `sbrk(2)` break is. The base is
/// page aligned, which makes every payload offset an aligned address too.
#[derive(Debug)]
pub struct MmapRegion {
  base: NonNull<u8>,
  brk: usize,
  capacity: usize,
}

fn page_size() -> usize {
  let size = unsafe { libc::sysconf(_SC_PAGESIZE) };
  usize::try_from(size).unwrap_or(4096)
}

impl MmapRegion {
  /// Reserves `capacity` bytes, rounded up to whole pages.
  pub fn new(capacity: usize) -> Result<Self, RegionError> {
    let page = page_size();
    let capacity = capacity.div_ceil(page).max(1) * page;

    let addr = unsafe {
      libc::mmap(
        std::ptr::null_mut(),
        capacity,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if addr == MAP_FAILED {
      return Err(RegionError::Map(io::Error::last_os_error()));
    }

    let base = NonNull::new(addr.cast::<u8>())
      .ok_or_else(|| RegionError::Map(io::Error::other("mmap returned null")))?;

    log::debug!("reserved {capacity} bytes at {base:p}");

    Ok(Self {
      base,
      brk: 0,
      capacity,
    })
  }

  pub const fn capacity(&self) -> usize {
    self.capacity
  }

  pub const fn base(&self) -> NonNull<u8> {
    self.base
  }
}

impl Region for MmapRegion {
  fn sbrk(
    &mut self,
    increment: usize,
  ) -> Result<usize, RegionError> {
    let available = self.capacity - self.brk;

    if increment > available {
      return Err(RegionError::Exhausted {
        requested: increment,
        available,
      });
    }

    let old_brk = self.brk;
    self.brk += increment;
    Ok(old_brk)
  }

  fn as_bytes(&self) -> &[u8] {
    // `0..brk` is mapped, initialized (anonymous pages are zeroed) and owned
    // by this value.
    unsafe { slice::from_raw_parts(self.base.as_ptr(), self.brk) }
  }

  fn as_bytes_mut(&mut self) -> &mut [u8] {
    unsafe { slice::from_raw_parts_mut(self.base.as_ptr(), self.brk) }
  }
}

impl Drop for MmapRegion {
  fn drop(&mut self) {
    unsafe {
      libc::munmap(self.base.as_ptr().cast::<c_void>(), self.capacity);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::block::DSIZE;

  #[test]
  fn test_mmap_region_grows_in_place() {
    let mut region = MmapRegion::new(10_000).unwrap();
    assert_eq!(region.capacity() % page_size(), 0);
    assert_eq!(region.base().as_ptr() as usize % DSIZE, 0);

    assert_eq!(region.sbrk(64).unwrap(), 0);
    region.as_bytes_mut()[63] = 0xAB;

    assert_eq!(region.sbrk(64).unwrap(), 64);
    assert_eq!(region.as_bytes()[63], 0xAB);
    assert_eq!(region.bounds(), 0..128);
  }

  #[test]
  fn test_mmap_region_exhaustion() {
    let mut region = MmapRegion::new(1).unwrap();
    let capacity = region.capacity();

    assert!(matches!(
      region.sbrk(capacity + 1),
      Err(RegionError::Exhausted { .. })
    ));
    assert_eq!(region.sbrk(capacity).unwrap(), 0);
    assert!(region.sbrk(1).is_err());
  }
}
