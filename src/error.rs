use crate::region::RegionError;

/// Why the heap could not produce a block.
///
/// Both variants are exhaustion: the heap is left exactly as it was.
#[derive(Debug, thiserror::Error)]
pub enum HeapError {
  #[error("out of memory: could not extend the heap by {requested} bytes")]
  Exhausted {
    requested: usize,
    #[source]
    source: RegionError,
  },
  #[error("a {requested}-byte request overflows the address space")]
  SizeOverflow { requested: usize },
}
