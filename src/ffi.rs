//! C entry points. See `include/sql_mirror.h`.

use std::ffi::CStr;
use std::os::raw::c_char;

use crate::bindings_raw::SqlParserResult;
use crate::query::{parse, release_raw, MirrorResult};

/// Parses a NUL-terminated query and returns an owned mirror of the result.
///
/// Never returns null. A null or non-UTF-8 query yields an invalid result. The
/// caller must hand the result back to [`sql_mirror_release`] exactly once.
///
/// # Safety
/// `query` must be null or point at a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn sql_mirror_parse(query: *const c_char) -> *mut SqlParserResult {
    if query.is_null() {
        return MirrorResult::invalid("query is null", 1, 1).into_raw();
    }

    let bytes = CStr::from_ptr(query).to_bytes();
    let result = match std::str::from_utf8(bytes) {
        Ok(sql) => parse(sql),
        Err(err) => {
            // Locate the first bad byte within the valid prefix.
            let prefix = String::from_utf8_lossy(&bytes[..err.valid_up_to()]);
            let line = prefix.matches('\n').count() + 1;
            let column = prefix.rsplit('\n').next().map(|l| l.chars().count()).unwrap_or_default() + 1;
            MirrorResult::invalid(format!("query is not valid UTF-8: {err}"), line as i32, column as i32)
        }
    };
    result.into_raw()
}

/// Releases a result returned by [`sql_mirror_parse`]. Null is a no-op.
///
/// # Safety
/// `result` must be null or come from `sql_mirror_parse` and not have been
/// released yet.
#[no_mangle]
pub unsafe extern "C" fn sql_mirror_release(result: *mut SqlParserResult) {
    release_raw(result)
}
