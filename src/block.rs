//! Boundary tags.
//!
//! Every block carries a one-word header and a one-word footer holding the
//! same [`Tag`]: the total block size (tags included) with the allocated flag
//! packed into the low bit. Sizes are multiples of [`DSIZE`], so the low bits
//! are always free for flags.
//!
//! ```text
//!        bp - WSIZE      bp                          bp + size - DSIZE
//!   ... ┌────────────┬──────────────────────────────┬────────────┐ ...
//!       │ header tag │ payload (size - DSIZE bytes) │ footer tag │
//!       └────────────┴──────────────────────────────┴────────────┘
//! ```
//!
//! All functions here work on byte offsets into the managed region, where
//! `bp` is the offset of the first payload byte.

use std::{fmt, mem};

/// Word size: one header or footer tag.
pub const WSIZE: usize = mem::size_of::<usize>();

/// Double-word size, the alignment unit of every payload.
pub const DSIZE: usize = 2 * WSIZE;

/// Smallest block that can hold a header, a footer and two free-list links.
pub const MIN_BLOCK: usize = 2 * DSIZE;

const SIZE_MASK: usize = !(DSIZE - 1);
const ALLOC_BIT: usize = 0x1;

/// A packed header/footer word.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Tag(usize);

impl Tag {
  pub const fn pack(
    size: usize,
    allocated: bool,
  ) -> Self {
    Self(size | allocated as usize)
  }

  pub(crate) const fn from_bits(bits: usize) -> Self {
    Self(bits)
  }

  pub const fn size(self) -> usize {
    self.0 & SIZE_MASK
  }

  pub const fn is_allocated(self) -> bool {
    self.0 & ALLOC_BIT != 0
  }

  pub const fn bits(self) -> usize {
    self.0
  }
}

impl fmt::Debug for Tag {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "[{}:{}]", self.size(), if self.is_allocated() { 'a' } else { 'f' })
  }
}

/// Reads the word at `off`.
pub(crate) fn get(
  bytes: &[u8],
  off: usize,
) -> usize {
  let mut word = [0u8; WSIZE];
  word.copy_from_slice(&bytes[off..off + WSIZE]);
  usize::from_ne_bytes(word)
}

/// Writes `val` as the word at `off`.
pub(crate) fn put(
  bytes: &mut [u8],
  off: usize,
  val: usize,
) {
  bytes[off..off + WSIZE].copy_from_slice(&val.to_ne_bytes());
}

pub(crate) const fn header(bp: usize) -> usize {
  bp - WSIZE
}

pub(crate) fn footer(
  bytes: &[u8],
  bp: usize,
) -> usize {
  bp + size_of(bytes, bp) - DSIZE
}

pub(crate) fn header_tag(
  bytes: &[u8],
  bp: usize,
) -> Tag {
  Tag(get(bytes, header(bp)))
}

pub(crate) fn footer_tag(
  bytes: &[u8],
  bp: usize,
) -> Tag {
  Tag(get(bytes, footer(bytes, bp)))
}

pub(crate) fn size_of(
  bytes: &[u8],
  bp: usize,
) -> usize {
  header_tag(bytes, bp).size()
}

pub(crate) fn is_allocated(
  bytes: &[u8],
  bp: usize,
) -> bool {
  header_tag(bytes, bp).is_allocated()
}

/// Writes matching header and footer tags for the block at `bp`.
///
/// The footer position is derived from `size`, not from the old header, so
/// this is also how a block is resized.
pub(crate) fn make_header_footer(
  bytes: &mut [u8],
  bp: usize,
  size: usize,
  allocated: bool,
) {
  let tag = Tag::pack(size, allocated);
  put(bytes, header(bp), tag.bits());
  put(bytes, bp + size - DSIZE, tag.bits());
}

pub(crate) fn next_block(
  bytes: &[u8],
  bp: usize,
) -> usize {
  bp + size_of(bytes, bp)
}

/// Steps back using the predecessor's footer.
///
/// Never call this on the prologue; the prologue is what keeps every real
/// block from walking past the region start.
pub(crate) fn prev_block(
  bytes: &[u8],
  bp: usize,
) -> usize {
  bp - Tag(get(bytes, bp - DSIZE)).size()
}

/// Allocation state of the predecessor, read straight from its footer.
pub(crate) fn prev_allocated(
  bytes: &[u8],
  bp: usize,
) -> bool {
  Tag(get(bytes, bp - DSIZE)).is_allocated()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_tag_packing() {
    let tag = Tag::pack(48, true);
    assert_eq!(tag.size(), 48);
    assert!(tag.is_allocated());

    let tag = Tag::pack(DSIZE, false);
    assert_eq!(tag.size(), DSIZE);
    assert!(!tag.is_allocated());

    assert_eq!(format!("{:?}", Tag::pack(32, false)), "[32:f]");
  }

  #[test]
  fn test_header_footer_neighbors() {
    let mut bytes = vec![0u8; 16 * WSIZE];

    // Two adjacent blocks: 4 and 6 words, the first payload at DSIZE.
    let first = DSIZE;
    make_header_footer(&mut bytes, first, 4 * WSIZE, true);
    let second = next_block(&bytes, first);
    make_header_footer(&mut bytes, second, 6 * WSIZE, false);

    assert_eq!(second, first + 4 * WSIZE);
    assert_eq!(size_of(&bytes, second), 6 * WSIZE);
    assert_eq!(header_tag(&bytes, second), footer_tag(&bytes, second));
    assert!(is_allocated(&bytes, first));
    assert!(!is_allocated(&bytes, second));
    assert_eq!(prev_block(&bytes, second), first);
    assert!(prev_allocated(&bytes, second));
  }

  #[test]
  fn test_word_roundtrip() {
    let mut bytes = vec![0u8; 4 * WSIZE];
    put(&mut bytes, WSIZE, usize::MAX - 7);
    assert_eq!(get(&bytes, WSIZE), usize::MAX - 7);
    assert_eq!(get(&bytes, 0), 0);
  }
}
