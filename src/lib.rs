//! # tagalloc - A Boundary-Tag Heap Allocator
//!
//! This crate manages one contiguous, growable region of raw memory and hands
//! out variable-sized blocks from it, with `allocate`, `free` and `resize`
//! operations in the spirit of `malloc`, `free` and `realloc`.
//!
//! ## Overview
//!
//! The region is cut into blocks that exactly tile it. Each block carries a
//! **boundary tag**: a header word and a footer word, both holding the block
//! size and an allocated bit. Free blocks also thread an explicit doubly
//! linked **free list** through their payload.
//!
//! ```text
//!   Managed Region:
//!
//!   ┌─────┬──────────┬───────────┬────────────┬───────────┬──────────┐
//!   │ pad │ prologue │ allocated │    free    │ allocated │ epilogue │
//!   │     │  [16:a]  │  [48:a]   │  [96:f]    │  [32:a]   │  [0:a]   │
//!   └─────┴──────────┴───────────┴────────────┴───────────┴──────────┘
//!                                      ▲
//!                    free list head ───┘       grows this way ──────►
//!
//!   Single Block:
//!   ┌────────┬──────────────────────────────────────────┬────────┐
//!   │ header │ payload                                  │ footer │
//!   │ size|a │ (free: prev-free, next-free, old bytes)  │ size|a │
//!   └────────┴──────────────────────────────────────────┴────────┘
//!            ▲
//!            └── BlockPtr (double-word aligned)
//! ```
//!
//! - **Allocation** is first fit over the free list, most recently freed
//!   block first. A block is split when the remainder can stand on its own.
//! - **Freeing** coalesces immediately with free neighbors on both sides, so
//!   two free blocks are never adjacent.
//! - **Resizing** grows in place into a free successor or at the heap end,
//!   and otherwise allocates, copies and frees.
//! - **Growth** goes through a [`Region`], the `sbrk`-style primitive that
//!   appends bytes to the tail. The region never shrinks.
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── align      - align! macro and request size adjustment
//!   ├── block      - boundary tags and neighbor arithmetic
//!   ├── free_list  - explicit LIFO free list (internal)
//!   ├── heap       - Heap: init, allocate, placement, heap extension
//!   ├── coalesce   - free and coalescing
//!   ├── resize     - grow in place or relocate
//!   ├── check      - consistency checker and heap walks
//!   ├── region     - Region trait (the memory source)
//!   ├── arena      - Vec-backed bounded region
//!   ├── mmap       - mmap-backed region (unix)
//!   ├── config     - HeapConfig
//!   └── error      - HeapError
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagalloc::{Heap, HeapConfig};
//!
//! let mut heap = Heap::arena(HeapConfig::default()).unwrap();
//!
//! let ptr = heap.allocate(24).unwrap().unwrap();
//! heap.payload_mut(ptr)[..5].copy_from_slice(b"hello");
//!
//! let ptr = heap.resize(ptr, 200).unwrap().unwrap();
//! assert_eq!(&heap.payload(ptr)[..5], b"hello");
//!
//! heap.free(ptr);
//! assert!(heap.check(false).is_empty());
//! ```
//!
//! ## Handles
//!
//! Blocks are addressed by [`BlockPtr`], the region offset of the payload.
//! Free-list links are offsets too, so the allocator itself is safe Rust over
//! a byte slice. [`Heap::as_mut_ptr`] gives the raw address when one is
//! needed; both [`ArenaRegion`] and [`MmapRegion`] start on an aligned base,
//! so those addresses are double-word aligned too.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no internal locking; wrap a heap in a mutex to
//!   share it.
//! - **No misuse detection**: freeing or resizing a block twice, or one that
//!   did not come from this heap, corrupts it. [`Heap::check`] can surface
//!   the damage afterwards.
//! - **No leftward growth**: `resize` never merges into a free predecessor.
//! - **Monotonic region**: memory is never handed back to the source.

pub mod align;
pub mod arena;
pub mod block;
pub mod check;
mod coalesce;
pub mod config;
pub mod error;
mod free_list;
pub mod heap;
#[cfg(unix)]
pub mod mmap;
pub mod region;
mod resize;

pub use arena::ArenaRegion;
pub use block::{DSIZE, MIN_BLOCK, Tag, WSIZE};
pub use check::{BlockInfo, HeapStats, Violation};
pub use config::HeapConfig;
pub use error::HeapError;
pub use heap::{BlockPtr, Heap};
#[cfg(unix)]
pub use mmap::MmapRegion;
pub use region::{Region, RegionError};
