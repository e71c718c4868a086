//! Tests for the C entry points and for handing mirrors across threads.

#![allow(non_snake_case)]
#![cfg(test)]

use std::ffi::CString;
use std::ptr;

use easy_parallel::Parallel;
use sql_mirror::ffi::{sql_mirror_parse, sql_mirror_release};
use sql_mirror::{parse, parse_to_ast, MirrorResult};

#[macro_use]
mod support;
use support::*;

// ============================================================================
// C entry points
// ============================================================================

/// Test that a query parsed through the C entry point mirrors like `parse`
#[test]
fn it_parses_through_the_c_entry_point() {
    let query = CString::new("SELECT a FROM t WHERE a > 1;").unwrap();
    let raw = unsafe { sql_mirror_parse(query.as_ptr()) };
    assert!(!raw.is_null());

    let result = unsafe { &*raw };
    assert!(result.isValid);
    assert_eq!(result.statementCount, 1);
    assert_eq!(text(child(select_of(result, 0).fromTable).unwrap().name), Some("t"));
    unsafe { count_nodes(result) };

    let owned = unsafe { MirrorResult::from_raw(raw) }.unwrap();
    assert_eq!(owned.to_ast().unwrap(), parse_to_ast("SELECT a FROM t WHERE a > 1;"));
    unsafe { sql_mirror_release(owned.into_raw()) };
}

/// Test that a null query yields an invalid result rather than a null pointer
#[test]
fn it_reports_a_null_query() {
    let raw = unsafe { sql_mirror_parse(ptr::null()) };
    let result = unsafe { &*raw };
    assert!(!result.isValid);
    assert!(result.statements.is_null());
    assert_eq!(result.statementCount, 0);
    assert_eq!(text(result.errorMsg), Some("query is null"));
    assert_eq!((result.errorLine, result.errorColumn), (1, 1));
    unsafe { sql_mirror_release(raw) };
}

/// Test that invalid UTF-8 is reported at the first bad byte
#[test]
fn it_reports_invalid_utf8() {
    let query = CString::new(b"SELECT 1;\nSELECT \xff".to_vec()).unwrap();
    let raw = unsafe { sql_mirror_parse(query.as_ptr()) };
    let result = unsafe { &*raw };
    assert!(!result.isValid);
    assert!(text(result.errorMsg).unwrap().starts_with("query is not valid UTF-8"));
    assert_eq!((result.errorLine, result.errorColumn), (2, 8));
    unsafe { sql_mirror_release(raw) };
}

/// Test that a syntax error comes back as data through the C entry point
#[test]
fn it_reports_syntax_errors_through_the_c_entry_point() {
    let query = CString::new("SELECT").unwrap();
    let raw = unsafe { sql_mirror_parse(query.as_ptr()) };
    let result = unsafe { &*raw };
    assert!(!result.isValid);
    assert!(result.statements.is_null());
    assert!(text(result.errorMsg).is_some());
    assert!(result.errorLine > 0 && result.errorColumn > 0);
    unsafe { sql_mirror_release(raw) };
}

/// Test that releasing null is a no-op
#[test]
fn it_ignores_null_on_release() {
    unsafe { sql_mirror_release(ptr::null_mut()) };
    assert!(unsafe { MirrorResult::from_raw(ptr::null_mut()) }.is_none());
}

// ============================================================================
// Threads
// ============================================================================

/// Test that independent parses can run at the same time
#[test]
fn it_parses_concurrently() {
    let queries: Vec<String> = (0..16).map(|i| format!("SELECT c{i} FROM t{i} WHERE c{i} > {i}")).collect();

    let counts = Parallel::new()
        .each(queries.iter(), |query| {
            let result = parse(query);
            assert!(result.is_valid());
            let nodes = unsafe { count_nodes(result.raw()) };
            assert_eq!(result.to_ast().unwrap(), parse_to_ast(query));
            nodes
        })
        .run();

    assert_eq!(counts.len(), queries.len());
    assert!(counts.windows(2).all(|pair| pair[0] == pair[1]));
}

/// Test that a mirror built on one thread can be read and released on another
#[test]
fn it_moves_mirrors_between_threads() {
    let results = Parallel::new().each(0..4, |i| parse(&format!("SELECT {i} FROM t"))).run();

    for (i, result) in results.into_iter().enumerate() {
        let select = select_of(result.raw(), 0);
        assert_eq!(items(select.selectList, select.selectListSize)[0].ival, i as i64);
        drop(result);
    }
}
