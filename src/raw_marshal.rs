//! Allocation helpers shared by the copier and the releaser.
//!
//! Every mirror allocation goes through `alloc_node`, `copy_str` or `copy_arr`
//! and is given back through the matching `free_*` function, so the allocation
//! ledger sees both sides of every pair.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use log::warn;

#[cfg(any(test, feature = "alloc-ledger"))]
use crate::raw_ledger::{record_alloc, record_release};

#[cfg(not(any(test, feature = "alloc-ledger")))]
#[inline(always)]
fn record_alloc(_ptr: *const u8, _size: usize, _align: usize) {}

#[cfg(not(any(test, feature = "alloc-ledger")))]
#[inline(always)]
fn record_release(_ptr: *const u8) -> bool {
    false
}

/// Stack headroom kept around every recursive descent over a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Stack {
    pub red_zone: usize,
    pub size: usize,
}

impl Stack {
    pub(crate) const DEFAULT: Stack = Stack { red_zone: 32 * 1024, size: 1024 * 1024 };

    /// Runs `f`, first switching to a fresh segment of `size` bytes when less
    /// than `red_zone` bytes of stack remain.
    pub(crate) fn grow<R>(self, f: impl FnOnce() -> R) -> R {
        stacker::maybe_grow(self.red_zone, self.size, f)
    }
}

impl Default for Stack {
    fn default() -> Self {
        Stack::DEFAULT
    }
}

/// Moves a node onto the heap and returns the owning raw pointer.
pub(crate) fn alloc_node<T>(node: T) -> *mut T {
    let ptr = Box::into_raw(Box::new(node));
    record_alloc(ptr as *const u8, std::mem::size_of::<T>(), std::mem::align_of::<T>());
    ptr
}

/// Frees a node allocated by [`alloc_node`]. Null is a no-op.
///
/// # Safety
/// `ptr` must be null or come from `alloc_node::<T>` and not have been freed.
pub(crate) unsafe fn free_node<T>(ptr: *mut T) {
    if ptr.is_null() {
        return;
    }
    if record_release(ptr as *const u8) {
        return;
    }
    drop(Box::from_raw(ptr));
}

/// Duplicates `value` into fresh NUL-terminated storage.
///
/// Text is cut at its first interior NUL, which is where any C reader of the
/// buffer would stop anyway.
pub(crate) fn copy_str(value: Option<&str>) -> *mut c_char {
    let value = match value {
        Some(value) => value,
        None => return ptr::null_mut(),
    };

    let bytes = match value.bytes().position(|b| b == 0) {
        Some(nul) => {
            warn!("truncating text at interior NUL byte {} of {}", nul, value.len());
            &value.as_bytes()[..nul]
        }
        None => value.as_bytes(),
    };

    // Safety: `bytes` stops before the first NUL.
    let owned = unsafe { CString::from_vec_unchecked(bytes.to_vec()) };
    let ptr = owned.into_raw();
    record_alloc(ptr as *const u8, bytes.len() + 1, 1);
    ptr
}

/// Frees text produced by [`copy_str`]. Null is a no-op.
///
/// # Safety
/// `ptr` must be null or come from `copy_str` and not have been freed.
pub(crate) unsafe fn free_str(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    if record_release(ptr as *const u8) {
        return;
    }
    drop(CString::from_raw(ptr));
}

/// Reads text owned by a mirror node. Null reads as `None`.
///
/// # Safety
/// `ptr` must be null or point at a NUL-terminated buffer.
pub(crate) unsafe fn read_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().to_string())
    }
}

/// Copies a sequence of owned elements into a contiguous array of element
/// pointers. Returns the array and its length; absent input yields `(null, 0)`.
///
/// A present but empty sequence yields a dangling, non-null pointer with count 0
/// so the reader can tell it apart from an absent one.
pub(crate) fn copy_arr<S, D>(items: Option<&[S]>, mut copy: impl FnMut(&S) -> *mut D) -> (*mut *mut D, usize) {
    let items = match items {
        Some(items) => items,
        None => return (ptr::null_mut(), 0),
    };

    let elements: Box<[*mut D]> = items.iter().map(|item| copy(item)).collect();
    let count = elements.len();
    let ptr = Box::into_raw(elements) as *mut *mut D;
    if count > 0 {
        record_alloc(
            ptr as *const u8,
            std::mem::size_of::<*mut D>() * count,
            std::mem::align_of::<*mut D>(),
        );
    }
    (ptr, count)
}

/// Releases every element with `release`, then the array itself. Null is a
/// no-op.
///
/// # Safety
/// `ptr` and `count` must be a pair returned by [`copy_arr`] that has not been
/// freed, and `release` must be the inverse of the element copier.
pub(crate) unsafe fn free_arr<D>(ptr: *mut *mut D, count: usize, release: unsafe fn(*mut D)) {
    if ptr.is_null() {
        return;
    }
    for i in 0..count {
        release(*ptr.add(i));
    }
    if count > 0 && record_release(ptr as *const u8) {
        return;
    }
    drop(Box::from_raw(ptr::slice_from_raw_parts_mut(ptr, count)));
}

/// Views a mirror array as a slice. Null reads as `None`.
///
/// # Safety
/// `ptr` and `count` must describe a live array produced by [`copy_arr`].
pub(crate) unsafe fn read_arr<'a, D>(ptr: *const *mut D, count: usize) -> Option<&'a [*mut D]> {
    if ptr.is_null() {
        None
    } else {
        Some(std::slice::from_raw_parts(ptr, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw_ledger;

    #[test]
    fn test_copy_str_absent() {
        assert!(copy_str(None).is_null());
        unsafe { free_str(ptr::null_mut()) };
    }

    #[test]
    fn test_copy_str_round_trip() {
        let ((), report) = raw_ledger::track(|| unsafe {
            let ptr = copy_str(Some("users"));
            assert_eq!(read_str(ptr).as_deref(), Some("users"));
            free_str(ptr);
        });
        assert_eq!(report.allocations, 1);
        assert!(report.is_balanced());
    }

    #[test]
    fn test_copy_str_truncates_at_nul() {
        let ptr = copy_str(Some("ab\0cd"));
        unsafe {
            assert_eq!(read_str(ptr).as_deref(), Some("ab"));
            free_str(ptr);
        }
    }

    #[test]
    fn test_copy_arr_absent_and_empty() {
        let (absent, count) = copy_arr::<String, c_char>(None, |s| copy_str(Some(s.as_str())));
        assert!(absent.is_null());
        assert_eq!(count, 0);

        let empty: Vec<String> = vec![];
        let (present, count) = copy_arr(Some(&empty[..]), |s| copy_str(Some(s.as_str())));
        assert!(!present.is_null());
        assert_eq!(count, 0);
        unsafe {
            assert_eq!(read_arr(present, count).map(|s| s.len()), Some(0));
            free_arr(present, count, free_str);
        }
    }

    #[test]
    fn test_copy_arr_elements() {
        let names = vec!["a".to_string(), "bc".to_string()];
        let ((), report) = raw_ledger::track(|| unsafe {
            let (ptr, count) = copy_arr(Some(&names[..]), |s| copy_str(Some(s.as_str())));
            assert_eq!(count, 2);
            let read: Vec<_> = read_arr(ptr, count).unwrap().iter().map(|p| read_str(*p).unwrap()).collect();
            assert_eq!(read, names);
            free_arr(ptr, count, free_str);
        });
        assert_eq!(report.allocations, 3);
        assert_eq!(report.releases, 3);
        assert!(report.is_balanced());
    }
}
