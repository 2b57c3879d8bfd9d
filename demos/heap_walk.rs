use std::io::Read;

use log::{LevelFilter, Log, Metadata, Record};
use tagalloc::{BlockPtr, Heap, HeapConfig, MmapRegion};

/// Routes the allocator's log records to stderr.
struct StderrLogger;

impl Log for StderrLogger {
  fn enabled(
    &self,
    _metadata: &Metadata,
  ) -> bool {
    true
  }

  fn log(
    &self,
    record: &Record,
  ) {
    eprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
  }

  fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

/// With `--step`, waits for ENTER between steps so the heap can be inspected
/// from outside (`pmap`, `gdb`, ...).
fn pause(step: bool) {
  if step {
    println!("\n>>> Press ENTER to continue...");
    let _ = std::io::stdin().bytes().next();
  }
}

/// Prints every block in address order.
fn print_heap(
  label: &str,
  heap: &Heap<MmapRegion>,
) {
  let stats = heap.stats();
  println!(
    "\n[{label}] region = {} bytes, {} allocated / {} free blocks, largest free = {}",
    stats.region_bytes, stats.allocated_blocks, stats.free_blocks, stats.largest_free
  );
  for info in heap.blocks() {
    println!(
      "  {:#07x}  {:>6}  {}",
      info.ptr.offset(),
      info.size,
      if info.allocated { "allocated" } else { "free" }
    );
  }

  let violations = heap.check(false);
  if !violations.is_empty() {
    println!("  !! {} violation(s), see log", violations.len());
  }
}

fn allocate(
  heap: &mut Heap<MmapRegion>,
  size: usize,
) -> Option<BlockPtr> {
  match heap.allocate(size) {
    Ok(ptr) => ptr,
    Err(err) => {
      eprintln!("allocate({size}) failed: {err}");
      None
    },
  }
}

fn main() {
  let step = std::env::args().any(|arg| arg == "--step");
  let verbose = std::env::args().any(|arg| arg == "--verbose");

  if log::set_logger(&LOGGER).is_ok() {
    log::set_max_level(if verbose { LevelFilter::Trace } else { LevelFilter::Warn });
  }

  let mut heap = match Heap::mmap(HeapConfig::default().with_max_heap(1 << 20)) {
    Ok(heap) => heap,
    Err(err) => {
      eprintln!("failed to create heap: {err}");
      return;
    },
  };
  print_heap("init", &heap);
  pause(step);

  // --------------------------------------------------------------------
  // 1) Two small blocks, then a third to keep them off the tail.
  // --------------------------------------------------------------------
  let a = allocate(&mut heap, 4);
  let b = allocate(&mut heap, 12);
  let _pin = allocate(&mut heap, 8);
  if let Some(a) = a {
    heap.payload_mut(a)[..4].copy_from_slice(&0xDEAD_BEEF_u32.to_ne_bytes());
    println!("\n[1] a = {:#x}, address {:p}", a.offset(), heap.as_mut_ptr(a));
  }
  print_heap("1: a, b, pin", &heap);
  pause(step);

  // --------------------------------------------------------------------
  // 2) Free a and b: they coalesce into one free block.
  // --------------------------------------------------------------------
  heap.free(a);
  heap.free(b);
  print_heap("2: free a, b", &heap);
  pause(step);

  // --------------------------------------------------------------------
  // 3) A small request reuses the merged block instead of growing.
  // --------------------------------------------------------------------
  let c = allocate(&mut heap, 2);
  println!("\n[3] c == a? {}", c == a);
  print_heap("3: reuse", &heap);
  pause(step);

  // --------------------------------------------------------------------
  // 4) Grow c past its neighbors: in place if possible, moved otherwise.
  // --------------------------------------------------------------------
  if let Some(c) = c {
    heap.payload_mut(c)[..2].copy_from_slice(b"ok");
    match heap.resize(c, 600) {
      Ok(Some(moved)) => {
        println!(
          "\n[4] resized {:#x} -> {:#x}, prefix {:?}",
          c.offset(),
          moved.offset(),
          String::from_utf8_lossy(&heap.payload(moved)[..2])
        );
      },
      Ok(None) => {},
      Err(err) => eprintln!("resize failed: {err}"),
    }
  }
  print_heap("4: resize", &heap);
  pause(step);

  // --------------------------------------------------------------------
  // 5) A 64 KiB request extends the region.
  // --------------------------------------------------------------------
  let _big = allocate(&mut heap, 64 * 1024);
  print_heap("5: large allocation", &heap);

  println!("\n[6] Dropping the heap unmaps the whole region.");
}
