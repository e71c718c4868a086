#![allow(unused_macros, dead_code)]

use std::ffi::CStr;
use std::os::raw::c_char;

use sql_mirror::bindings_raw::*;

// Pretty diffs are opt-in so the plain output can be copied.
macro_rules! assert_eq {
    ($left:expr, $right:expr) => {
        if let Ok(_diff) = std::env::var("DIFF") {
            pretty_assertions::assert_eq!($left, $right);
        } else {
            std::assert_eq!($left, $right);
        }
    };
}

macro_rules! cast {
    ($target: expr, $pat: path) => {{
        if let $pat(a) = $target {
            a
        } else {
            panic!("mismatch variant when cast to {}", stringify!($pat));
        }
    }};
}

/// Verifies that reading the mirror back gives the same tree the lowering built,
/// and that every sequence in the mirror agrees with its count.
pub fn assert_round_trip(query: &str) {
    let expected = sql_mirror::parse_to_ast(query);
    assert!(expected.is_valid(), "query did not parse: {query}\n{:?}", expected.error());

    let result = sql_mirror::parse(query);
    let actual = result.to_ast().unwrap_or_else(|err| panic!("reading the mirror failed for {query}: {err}"));
    assert!(actual == expected, "mirror differs from the source tree for query: {query}\nmirror: {actual:#?}\nsource: {expected:#?}");

    let nodes = unsafe { count_nodes(result.raw()) };
    assert!(nodes >= result.statement_count(), "walked {nodes} nodes for query: {query}");
}

/// Reads a mirror string. Null reads as `None`.
pub fn text<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(ptr) }.to_str().expect("mirror text is not UTF-8"))
    }
}

/// Borrows the elements of a mirror sequence, checking that an absent sequence
/// has no count and that no element is null.
pub fn items<'a, T>(ptr: *mut *mut T, count: usize) -> Vec<&'a T> {
    if ptr.is_null() {
        std::assert_eq!(count, 0, "absent sequence reports {count} elements");
        return Vec::new();
    }
    unsafe { std::slice::from_raw_parts(ptr, count) }
        .iter()
        .map(|item| {
            assert!(!item.is_null(), "null element in a sequence of {count}");
            unsafe { &**item }
        })
        .collect()
}

/// Follows an owned child pointer.
pub fn child<'a, T>(ptr: *mut T) -> Option<&'a T> {
    unsafe { ptr.as_ref() }
}

pub fn select_of<'a>(result: &'a SqlParserResult, index: usize) -> &'a SqlSelectStatement {
    let statement = items(result.statements, result.statementCount)[index];
    std::assert_eq!(statement.type_, sql_mirror::ast::StatementType::Select.ordinal());
    unsafe { &*(statement as *const SqlStatement as *const SqlSelectStatement) }
}

// ============================================================================
// Count/sequence consistency walker
// ============================================================================

/// Walks every reachable node of a mirror and returns how many it visited.
/// Panics on a sequence whose pointer and count disagree.
///
/// # Safety
/// `result` must be a live mirror.
pub unsafe fn count_nodes(result: &SqlParserResult) -> usize {
    if result.isValid {
        assert!(!result.statements.is_null(), "valid result without a statement list");
    } else {
        assert!(!result.errorMsg.is_null(), "invalid result without a message");
        assert!(result.statements.is_null());
    }
    let mut nodes = 1;
    for statement in items(result.statements, result.statementCount) {
        nodes += walk_base(statement);
        if statement.type_ == sql_mirror::ast::StatementType::Select.ordinal() {
            nodes += walk_select_body(&*(statement as *const SqlStatement as *const SqlSelectStatement));
        }
    }
    nodes
}

unsafe fn walk_base(base: &SqlStatement) -> usize {
    1 + items(base.hints, base.hintCount).into_iter().map(|hint| walk_expr(hint)).sum::<usize>()
}

unsafe fn walk_select(select: &SqlSelectStatement) -> usize {
    walk_base(&select.base) + walk_select_body(select)
}

unsafe fn walk_select_body(select: &SqlSelectStatement) -> usize {
    let mut nodes = 0;
    nodes += child(select.fromTable).map_or(0, |table| walk_table(table));
    nodes += items(select.selectList, select.selectListSize).into_iter().map(|expr| walk_expr(expr)).sum::<usize>();
    nodes += child(select.whereClause).map_or(0, |expr| walk_expr(expr));
    if let Some(group_by) = child(select.groupBy) {
        nodes += 1 + items(group_by.columns, group_by.columnCount).into_iter().map(|expr| walk_expr(expr)).sum::<usize>();
        nodes += child(group_by.having).map_or(0, |expr| walk_expr(expr));
    }
    for operation in items(select.setOperations, select.setOperationCount) {
        nodes += 1 + walk_select(child(operation.nestedSelectStatement).expect("set operation without a select"));
        nodes += walk_order(operation.resultOrder, operation.resultOrderCount);
        nodes += child(operation.resultLimit).map_or(0, |limit| walk_limit(limit));
    }
    nodes += walk_order(select.order, select.orderCount);
    for with in items(select.withDescriptions, select.withDescriptionCount) {
        assert!(text(with.alias).is_some());
        nodes += 1 + walk_select(child(with.select).expect("with description without a select"));
    }
    nodes += child(select.limit).map_or(0, |limit| walk_limit(limit));
    nodes
}

unsafe fn walk_order(order: *mut *mut SqlOrderDescription, count: usize) -> usize {
    items(order, count)
        .into_iter()
        .map(|order| 1 + walk_expr(child(order.expr).expect("order description without an expression")))
        .sum()
}

unsafe fn walk_limit(limit: &SqlLimitDescription) -> usize {
    1 + child(limit.limit).map_or(0, |expr| walk_expr(expr)) + child(limit.offset).map_or(0, |expr| walk_expr(expr))
}

unsafe fn walk_table(table: &SqlTableRef) -> usize {
    let mut nodes = 1;
    if let Some(alias) = child(table.alias) {
        nodes += 1;
        for column in items(alias.columns, alias.columnCount) {
            let _ = text(column);
        }
    }
    nodes += child(table.select).map_or(0, |select| walk_select(select));
    nodes += items(table.list, table.listSize).into_iter().map(|table| walk_table(table)).sum::<usize>();
    if let Some(join) = child(table.join) {
        nodes += 1;
        nodes += walk_table(child(join.left).expect("join without a left side"));
        nodes += walk_table(child(join.right).expect("join without a right side"));
        nodes += child(join.condition).map_or(0, |expr| walk_expr(expr));
    }
    nodes
}

unsafe fn walk_expr(expr: &SqlExpr) -> usize {
    let mut nodes = 1;
    nodes += child(expr.expr).map_or(0, |expr| walk_expr(expr));
    nodes += child(expr.expr2).map_or(0, |expr| walk_expr(expr));
    nodes += items(expr.exprList, expr.exprListSize).into_iter().map(|expr| walk_expr(expr)).sum::<usize>();
    nodes += child(expr.select).map_or(0, |select| walk_select(select));
    nodes
}
