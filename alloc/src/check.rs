//! Self-check: a traversal-based invariant audit.
//!
//! Walks the implicit block sequence (`heap_first + 16` to `heap_last`)
//! and the explicit free list, reporting every violation of the
//! invariants in the crate's top-level documentation to the diagnostic
//! sink. Violations are reported, never acted upon — the allocator
//! keeps running on whatever state it finds.

use tagalloc_lib::{diag_error, diag_warn};

use crate::block::{ALIGN, MIN_BLOCK, WORD, footer_of, is_allocated, read_tag};
use crate::free_list::FreeList;

/// Tally produced by one audit pass. `implicit_free` and `list_free`
/// must reconcile (invariant 5 / testable property 2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub violations: usize,
    pub implicit_free: usize,
    pub list_free: usize,
    pub implicit_allocated: usize,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.violations == 0 && self.implicit_free == self.list_free
    }
}

/// Run the audit. `line` identifies the call site for diagnostic output
/// (mirrors `check(line)` in the design notes); pass `0` when there is
/// no meaningful caller line.
pub unsafe fn audit(
    free_list: &FreeList,
    heap_first: *mut u8,
    heap_last: *mut u8,
    line: i32,
    verbose: bool,
) -> AuditReport {
    let mut report = AuditReport::default();

    if heap_first.is_null() || heap_last.is_null() {
        diag_error!("check({line}): allocator not initialized");
        report.violations += 1;
        return report;
    }

    if heap_last < unsafe { heap_first.add(WORD) } {
        diag_error!("check({line}): heap_last precedes heap_first");
        report.violations += 1;
        return report;
    }

    let mut cursor = unsafe { heap_first.add(2 * WORD) };
    let mut prev_allocated_known = true;
    let mut prev_was_free = false;

    while cursor < heap_last {
        let tag = unsafe { read_tag(cursor) };
        let size = crate::block::tag_size(tag);
        let allocated = crate::block::tag_allocated(tag);

        if size < MIN_BLOCK {
            diag_error!("check({line}): block at {cursor:p} has size {size} < {MIN_BLOCK}");
            report.violations += 1;
            break;
        }
        if size % ALIGN != 0 {
            diag_error!("check({line}): block at {cursor:p} size {size} not a multiple of {ALIGN}");
            report.violations += 1;
        }

        let footer_tag = unsafe { read_tag(footer_of(cursor, size)) };
        if footer_tag != tag {
            diag_error!(
                "check({line}): block at {cursor:p} header {tag:#x} != footer {footer_tag:#x}"
            );
            report.violations += 1;
        }

        let offset = cursor as usize - heap_first as usize;
        if offset % ALIGN != 0 {
            diag_error!("check({line}): block at {cursor:p} misaligned relative to heap_first");
            report.violations += 1;
        }

        if allocated {
            report.implicit_allocated += 1;
        } else {
            report.implicit_free += 1;
            if prev_allocated_known && prev_was_free {
                diag_error!("check({line}): two adjacent free blocks at/around {cursor:p}");
                report.violations += 1;
            }
        }
        prev_was_free = !allocated;
        prev_allocated_known = true;

        cursor = unsafe { cursor.add(size) };
    }

    if cursor != heap_last && verbose {
        diag_warn!("check({line}): implicit traversal ended at {cursor:p}, expected {heap_last:p}");
    }

    // A free list can legitimately hold at most as many nodes as the
    // implicit traversal above found blocks total; bound the walk by
    // that count (derived independently of the list itself) so a
    // corrupt cyclic list is reported instead of looped over forever.
    let max_nodes = report.implicit_allocated + report.implicit_free;

    let mut current = free_list.head();
    let mut seen = 0usize;
    while !current.is_null() {
        if seen > max_nodes {
            diag_error!("check({line}): free list appears to contain a cycle");
            report.violations += 1;
            break;
        }
        seen += 1;

        if unsafe { is_allocated(current) } {
            diag_error!("check({line}): allocated block {current:p} present in free list");
            report.violations += 1;
        }

        let next = unsafe { FreeList::next_of(current) };
        if !next.is_null() && unsafe { FreeList::prev_of(next) } != current {
            diag_error!("check({line}): free list link broken after {current:p}");
            report.violations += 1;
        }
        current = next;
    }
    report.list_free = seen;

    if report.implicit_free != report.list_free {
        diag_error!(
            "check({line}): implicit free count {} != free list length {}",
            report.implicit_free,
            report.list_free
        );
        report.violations += 1;
    }

    if verbose {
        diag_warn!(
            "check({line}): {} blocks ({} allocated, {} free), {} violations",
            report.implicit_allocated + report.implicit_free,
            report.implicit_allocated,
            report.implicit_free,
            report.violations
        );
    }

    report
}
