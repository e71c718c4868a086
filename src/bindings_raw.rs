//! C-compatible mirror tree.
//!
//! These structs match `include/sql_mirror.h` field for field. Every pointer is
//! either null or exclusively owned by its parent node, text is NUL-terminated,
//! and every sequence is a `(pointer, count)` pair whose pointer is null exactly
//! when the sequence is absent. Tag fields hold the ordinal of the matching
//! enumeration in [`crate::ast::kinds`].

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(clippy::all)]

use std::os::raw::{c_char, c_int, c_uint};

pub type ExprType = c_uint;
pub type DatetimeField = c_uint;
pub type OperatorType = c_uint;
pub type StatementType = c_uint;
pub type JoinType = c_uint;
pub type TableRefType = c_uint;
pub type OrderType = c_uint;
pub type SetType = c_uint;

#[repr(C)]
#[derive(Debug)]
pub struct SqlExpr {
    pub type_: ExprType,
    pub expr: *mut SqlExpr,
    pub expr2: *mut SqlExpr,
    pub exprList: *mut *mut SqlExpr,
    pub exprListSize: usize,
    pub select: *mut SqlSelectStatement,
    pub name: *mut c_char,
    pub table: *mut c_char,
    pub alias: *mut c_char,
    pub fval: f64,
    pub ival: i64,
    pub ival2: i64,
    pub datetimeField: DatetimeField,
    pub isBoolLiteral: bool,
    pub opType: OperatorType,
    pub distinct: bool,
}

#[repr(C)]
#[derive(Debug)]
pub struct SqlAlias {
    pub name: *mut c_char,
    pub columns: *mut *mut c_char,
    pub columnCount: usize,
}

#[repr(C)]
#[derive(Debug)]
pub struct SqlJoinDefinition {
    pub left: *mut SqlTableRef,
    pub right: *mut SqlTableRef,
    pub condition: *mut SqlExpr,
    pub type_: JoinType,
}

#[repr(C)]
#[derive(Debug)]
pub struct SqlTableRef {
    pub type_: TableRefType,
    pub schema: *mut c_char,
    pub name: *mut c_char,
    pub alias: *mut SqlAlias,
    pub select: *mut SqlSelectStatement,
    pub list: *mut *mut SqlTableRef,
    pub listSize: usize,
    pub join: *mut SqlJoinDefinition,
}

#[repr(C)]
#[derive(Debug)]
pub struct SqlGroupByDescription {
    pub columns: *mut *mut SqlExpr,
    pub columnCount: usize,
    pub having: *mut SqlExpr,
}

#[repr(C)]
#[derive(Debug)]
pub struct SqlOrderDescription {
    pub type_: OrderType,
    pub expr: *mut SqlExpr,
}

#[repr(C)]
#[derive(Debug)]
pub struct SqlWithDescription {
    pub alias: *mut c_char,
    pub select: *mut SqlSelectStatement,
}

#[repr(C)]
#[derive(Debug)]
pub struct SqlLimitDescription {
    pub limit: *mut SqlExpr,
    pub offset: *mut SqlExpr,
}

#[repr(C)]
#[derive(Debug)]
pub struct SqlSetOperation {
    pub setType: SetType,
    pub isAll: bool,
    pub nestedSelectStatement: *mut SqlSelectStatement,
    pub resultOrder: *mut *mut SqlOrderDescription,
    pub resultOrderCount: usize,
    pub resultLimit: *mut SqlLimitDescription,
}

/// Fields shared by every statement. A statement pointer whose `type_` is
/// `kStmtSelect` always points at a full [`SqlSelectStatement`], which starts
/// with this struct.
#[repr(C)]
#[derive(Debug)]
pub struct SqlStatement {
    pub type_: StatementType,
    pub stringLength: usize,
    pub hints: *mut *mut SqlExpr,
    pub hintCount: usize,
}

#[repr(C)]
#[derive(Debug)]
pub struct SqlSelectStatement {
    pub base: SqlStatement,
    pub fromTable: *mut SqlTableRef,
    pub selectDistinct: bool,
    pub selectList: *mut *mut SqlExpr,
    pub selectListSize: usize,
    pub whereClause: *mut SqlExpr,
    pub groupBy: *mut SqlGroupByDescription,
    pub setOperations: *mut *mut SqlSetOperation,
    pub setOperationCount: usize,
    pub order: *mut *mut SqlOrderDescription,
    pub orderCount: usize,
    pub withDescriptions: *mut *mut SqlWithDescription,
    pub withDescriptionCount: usize,
    pub limit: *mut SqlLimitDescription,
}

#[repr(C)]
#[derive(Debug)]
pub struct SqlParserResult {
    pub isValid: bool,
    pub errorMsg: *mut c_char,
    pub errorLine: c_int,
    pub errorColumn: c_int,
    pub statements: *mut *mut SqlStatement,
    pub statementCount: usize,
}
