use crate::block::{DSIZE, MIN_BLOCK};

/// Rounds `value` up to the double-word alignment unit.
///
/// # Examples
///
/// ```rust
/// use tagalloc::{DSIZE, align};
///
/// assert_eq!(align!(1), DSIZE);
/// assert_eq!(align!(DSIZE), DSIZE);
/// assert_eq!(align!(DSIZE + 1), 2 * DSIZE);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::DSIZE - 1) & !($crate::DSIZE - 1)
  };
}

/// Block size needed to serve a `size`-byte request: header and footer
/// included, rounded to the alignment unit, never below [`MIN_BLOCK`].
///
/// Returns `None` when the rounding would overflow.
pub fn adjusted_size(size: usize) -> Option<usize> {
  if size <= DSIZE {
    return Some(MIN_BLOCK);
  }
  size
    .checked_add(2 * DSIZE - 1)
    .map(|padded| padded & !(DSIZE - 1))
}
