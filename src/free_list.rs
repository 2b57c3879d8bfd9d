//! Explicit free list.
//!
//! Free blocks are chained through two words overlaid on their own payload:
//!
//! ```text
//!   ┌────────┬───────────┬───────────┬─────────────┬────────┐
//!   │ header │ prev-free │ next-free │ (old bytes) │ footer │
//!   └────────┴───────────┴───────────┴─────────────┴────────┘
//!            ^ bp        ^ bp + WSIZE
//! ```
//!
//! Links are region offsets rather than pointers. Offset 0 is the alignment
//! padding word, which is never a payload, so it stands for "none". The list
//! is unordered and LIFO: insertion always happens at the head.

use crate::block::{self, WSIZE};

const NONE: usize = 0;

fn encode(link: Option<usize>) -> usize {
  link.unwrap_or(NONE)
}

fn decode(word: usize) -> Option<usize> {
  (word != NONE).then_some(word)
}

pub(crate) fn prev_free(
  bytes: &[u8],
  bp: usize,
) -> Option<usize> {
  decode(block::get(bytes, bp))
}

pub(crate) fn next_free(
  bytes: &[u8],
  bp: usize,
) -> Option<usize> {
  decode(block::get(bytes, bp + WSIZE))
}

fn set_prev_free(
  bytes: &mut [u8],
  bp: usize,
  link: Option<usize>,
) {
  block::put(bytes, bp, encode(link));
}

fn set_next_free(
  bytes: &mut [u8],
  bp: usize,
  link: Option<usize>,
) {
  block::put(bytes, bp + WSIZE, encode(link));
}

/// Head of the free list. The nodes themselves live in the region.
#[derive(Debug, Default)]
pub(crate) struct FreeList {
  head: Option<usize>,
}

impl FreeList {
  pub(crate) const fn new() -> Self {
    Self { head: None }
  }

  pub(crate) const fn head(&self) -> Option<usize> {
    self.head
  }

  /// Pushes `bp` as the new head.
  pub(crate) fn insert_front(
    &mut self,
    bytes: &mut [u8],
    bp: usize,
  ) {
    set_prev_free(bytes, bp, None);
    set_next_free(bytes, bp, self.head);
    if let Some(old_head) = self.head {
      set_prev_free(bytes, old_head, Some(bp));
    }
    self.head = Some(bp);
  }

  /// Unlinks `bp` from wherever it sits in the list.
  pub(crate) fn remove(
    &mut self,
    bytes: &mut [u8],
    bp: usize,
  ) {
    let prev = prev_free(bytes, bp);
    let next = next_free(bytes, bp);

    match prev {
      Some(prev) => set_next_free(bytes, prev, next),
      None => self.head = next,
    }
    if let Some(next) = next {
      set_prev_free(bytes, next, prev);
    }
  }

  /// Walks the list from the head.
  pub(crate) const fn iter<'a>(
    &self,
    bytes: &'a [u8],
  ) -> Iter<'a> {
    Iter {
      bytes,
      current: self.head,
    }
  }
}

pub(crate) struct Iter<'a> {
  bytes: &'a [u8],
  current: Option<usize>,
}

impl Iterator for Iter<'_> {
  type Item = usize;

  fn next(&mut self) -> Option<Self::Item> {
    let bp = self.current?;
    self.current = next_free(self.bytes, bp);
    Some(bp)
  }
}
