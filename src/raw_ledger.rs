//! Allocation ledger for mirror trees.
//!
//! While [`track`] runs, every mirror allocation and release on the current
//! thread is recorded. Released memory is held back until the tracked scope ends
//! instead of being returned to the allocator, so a second release of the same
//! tree still reads intact nodes and is reported as invalid rather than
//! corrupting the heap.
//!
//! Releasing memory that was allocated before the scope started is also
//! reported as invalid, and that memory is left alone.

use std::alloc::Layout;
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct Ledger {
    live: HashMap<usize, Layout>,
    quarantine: Vec<(usize, Layout)>,
    allocations: usize,
    releases: usize,
    invalid_releases: usize,
}

impl Ledger {
    fn close(mut self) -> LedgerReport {
        for (addr, layout) in self.quarantine.drain(..) {
            // Safety: every quarantined entry was allocated with this layout
            // by the global allocator and has not been handed back to it.
            unsafe { std::alloc::dealloc(addr as *mut u8, layout) };
        }
        LedgerReport {
            allocations: self.allocations,
            releases: self.releases,
            outstanding: self.live.len(),
            invalid_releases: self.invalid_releases,
        }
    }
}

thread_local! {
    static LEDGER: RefCell<Option<Ledger>> = RefCell::new(None);
}

/// Counts collected by [`track`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerReport {
    pub allocations: usize,
    /// Releases of memory that was live
    pub releases: usize,
    /// Allocations never released
    pub outstanding: usize,
    /// Releases of memory that was already released or never tracked
    pub invalid_releases: usize,
}

impl LedgerReport {
    /// True when every allocation was released exactly once.
    pub fn is_balanced(&self) -> bool {
        self.outstanding == 0 && self.invalid_releases == 0 && self.allocations == self.releases
    }
}

pub(crate) fn record_alloc(ptr: *const u8, size: usize, align: usize) {
    let layout = match Layout::from_size_align(size, align) {
        Ok(layout) => layout,
        Err(_) => return,
    };
    LEDGER.with(|ledger| {
        if let Some(ledger) = ledger.borrow_mut().as_mut() {
            ledger.allocations += 1;
            ledger.live.insert(ptr as usize, layout);
        }
    });
}

/// Records a release. Returns true when the ledger took ownership of the
/// memory, in which case the caller must not free it.
pub(crate) fn record_release(ptr: *const u8) -> bool {
    LEDGER.with(|ledger| match ledger.borrow_mut().as_mut() {
        None => false,
        Some(ledger) => {
            let addr = ptr as usize;
            match ledger.live.remove(&addr) {
                Some(layout) => {
                    ledger.releases += 1;
                    ledger.quarantine.push((addr, layout));
                }
                None => ledger.invalid_releases += 1,
            }
            true
        }
    })
}

/// Restores the enclosing ledger when the tracked closure returns or unwinds.
struct Scope {
    previous: Option<Option<Ledger>>,
}

impl Scope {
    fn close(&mut self) -> Option<LedgerReport> {
        let previous = self.previous.take()?;
        let ledger = LEDGER.with(|ledger| ledger.replace(previous))?;
        Some(ledger.close())
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.close();
    }
}

/// Runs `f` with allocation tracking enabled on this thread.
///
/// Allocations still live when `f` returns are left allocated and counted as
/// outstanding.
pub fn track<R>(f: impl FnOnce() -> R) -> (R, LedgerReport) {
    let previous = LEDGER.with(|ledger| ledger.replace(Some(Ledger::default())));
    let mut scope = Scope { previous: Some(previous) };
    let result = f();
    let report = scope.close().unwrap_or_default();
    (result, report)
}
