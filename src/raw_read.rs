//! Reads a mirror tree back into an owned source tree.
//!
//! The reader checks what it can check without trusting the mirror blindly:
//! required children must be non-null and every tag must be a known ordinal.

use std::os::raw::c_uint;

use crate::ast::*;
use crate::bindings_raw::{
    SqlAlias, SqlExpr, SqlGroupByDescription, SqlJoinDefinition, SqlLimitDescription, SqlOrderDescription,
    SqlParserResult, SqlSelectStatement, SqlSetOperation, SqlStatement, SqlTableRef, SqlWithDescription,
};
use crate::raw_dispatch;
use crate::raw_marshal::{read_arr, read_str, Stack};
use crate::{Error, Result};

/// Rebuilds the source tree a mirror was copied from.
///
/// # Safety
/// `ptr` must be null or a live result produced by this crate.
pub unsafe fn read_parse_result(ptr: *const SqlParserResult) -> Result<ParseResult> {
    if ptr.is_null() {
        return Err(Error::InvalidPointer);
    }
    let result = &*ptr;

    if result.isValid {
        let statements = read_list(result.statements, result.statementCount, raw_dispatch::read_statement)?
            .ok_or(Error::InvalidPointer)?;
        Ok(ParseResult::Valid(statements))
    } else {
        Ok(ParseResult::Invalid(SyntaxError {
            message: read_str(result.errorMsg).unwrap_or_default(),
            line: result.errorLine,
            column: result.errorColumn,
        }))
    }
}

/// Reads every element of a mirror list. Null elements are rejected.
unsafe fn read_list<D, T>(
    ptr: *const *mut D,
    count: usize,
    read: unsafe fn(*const D) -> Result<Option<T>>,
) -> Result<Option<Vec<T>>> {
    let elements = match read_arr(ptr, count) {
        Some(elements) => elements,
        None => return Ok(None),
    };
    let mut items = Vec::with_capacity(count);
    for element in elements {
        items.push(read(*element as *const D)?.ok_or(Error::InvalidPointer)?);
    }
    Ok(Some(items))
}

unsafe fn read_text(ptr: *const std::os::raw::c_char) -> Result<Option<String>> {
    Ok(read_str(ptr))
}

fn tag<T: TryFrom<u32, Error = Error>>(value: c_uint) -> Result<T> {
    T::try_from(value)
}

pub(crate) unsafe fn read_base(base: &SqlStatement) -> Result<StatementBase> {
    Ok(StatementBase {
        kind: tag(base.type_)?,
        string_length: base.stringLength,
        hints: read_list(base.hints, base.hintCount, read_expr)?,
    })
}

pub(crate) unsafe fn read_select(ptr: *const SqlSelectStatement) -> Result<Option<SelectStatement>> {
    if ptr.is_null() {
        return Ok(None);
    }

    Stack::DEFAULT.grow(|| {
        let select = &*ptr;
        Ok(Some(SelectStatement {
            base: read_base(&select.base)?,
            from_table: read_table_ref(select.fromTable)?.map(Box::new),
            select_distinct: select.selectDistinct,
            select_list: read_list(select.selectList, select.selectListSize, read_expr)?,
            where_clause: read_expr(select.whereClause)?.map(Box::new),
            group_by: read_group_by(select.groupBy)?,
            set_operations: read_list(select.setOperations, select.setOperationCount, read_set_operation)?,
            order: read_list(select.order, select.orderCount, read_order)?,
            with_descriptions: read_list(select.withDescriptions, select.withDescriptionCount, read_with)?,
            limit: read_limit(select.limit)?,
        }))
    })
}

unsafe fn read_expr(ptr: *const SqlExpr) -> Result<Option<Expr>> {
    if ptr.is_null() {
        return Ok(None);
    }

    Stack::DEFAULT.grow(|| {
        let expr = &*ptr;
        Ok(Some(Expr {
            kind: tag(expr.type_)?,
            expr: read_expr(expr.expr)?.map(Box::new),
            expr2: read_expr(expr.expr2)?.map(Box::new),
            expr_list: read_list(expr.exprList, expr.exprListSize, read_expr)?,
            select: read_select(expr.select)?.map(Box::new),
            name: read_str(expr.name),
            table: read_str(expr.table),
            alias: read_str(expr.alias),
            fval: expr.fval,
            ival: expr.ival,
            ival2: expr.ival2,
            datetime_field: tag(expr.datetimeField)?,
            is_bool_literal: expr.isBoolLiteral,
            op_type: tag(expr.opType)?,
            distinct: expr.distinct,
        }))
    })
}

unsafe fn read_table_ref(ptr: *const SqlTableRef) -> Result<Option<TableRef>> {
    if ptr.is_null() {
        return Ok(None);
    }

    Stack::DEFAULT.grow(|| {
        let table = &*ptr;
        Ok(Some(TableRef {
            kind: tag(table.type_)?,
            schema: read_str(table.schema),
            name: read_str(table.name),
            alias: read_alias(table.alias)?,
            select: read_select(table.select)?.map(Box::new),
            list: read_list(table.list, table.listSize, read_table_ref)?,
            join: read_join(table.join)?.map(Box::new),
        }))
    })
}

unsafe fn read_alias(ptr: *const SqlAlias) -> Result<Option<Alias>> {
    if ptr.is_null() {
        return Ok(None);
    }
    let alias = &*ptr;
    Ok(Some(Alias {
        name: read_str(alias.name).ok_or(Error::InvalidPointer)?,
        columns: read_list(alias.columns, alias.columnCount, read_text)?,
    }))
}

unsafe fn read_join(ptr: *const SqlJoinDefinition) -> Result<Option<JoinDefinition>> {
    if ptr.is_null() {
        return Ok(None);
    }
    let join = &*ptr;
    Ok(Some(JoinDefinition {
        left: Box::new(read_table_ref(join.left)?.ok_or(Error::InvalidPointer)?),
        right: Box::new(read_table_ref(join.right)?.ok_or(Error::InvalidPointer)?),
        condition: read_expr(join.condition)?.map(Box::new),
        kind: tag(join.type_)?,
    }))
}

unsafe fn read_group_by(ptr: *const SqlGroupByDescription) -> Result<Option<GroupByDescription>> {
    if ptr.is_null() {
        return Ok(None);
    }
    let group_by = &*ptr;
    Ok(Some(GroupByDescription {
        columns: read_list(group_by.columns, group_by.columnCount, read_expr)?,
        having: read_expr(group_by.having)?.map(Box::new),
    }))
}

unsafe fn read_order(ptr: *const SqlOrderDescription) -> Result<Option<OrderDescription>> {
    if ptr.is_null() {
        return Ok(None);
    }
    let order = &*ptr;
    Ok(Some(OrderDescription {
        kind: tag(order.type_)?,
        expr: Box::new(read_expr(order.expr)?.ok_or(Error::InvalidPointer)?),
    }))
}

unsafe fn read_with(ptr: *const SqlWithDescription) -> Result<Option<WithDescription>> {
    if ptr.is_null() {
        return Ok(None);
    }
    let with = &*ptr;
    Ok(Some(WithDescription {
        alias: read_str(with.alias).ok_or(Error::InvalidPointer)?,
        select: Box::new(read_select(with.select)?.ok_or(Error::InvalidPointer)?),
    }))
}

unsafe fn read_limit(ptr: *const SqlLimitDescription) -> Result<Option<LimitDescription>> {
    if ptr.is_null() {
        return Ok(None);
    }
    let limit = &*ptr;
    Ok(Some(LimitDescription {
        limit: read_expr(limit.limit)?.map(Box::new),
        offset: read_expr(limit.offset)?.map(Box::new),
    }))
}

unsafe fn read_set_operation(ptr: *const SqlSetOperation) -> Result<Option<SetOperation>> {
    if ptr.is_null() {
        return Ok(None);
    }
    let op = &*ptr;
    Ok(Some(SetOperation {
        kind: tag(op.setType)?,
        is_all: op.isAll,
        nested_select: Box::new(read_select(op.nestedSelectStatement)?.ok_or(Error::InvalidPointer)?),
        result_order: read_list(op.resultOrder, op.resultOrderCount, read_order)?,
        result_limit: read_limit(op.resultLimit)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw_copy::Copier;
    use crate::raw_release::release_parse_result;

    #[test]
    fn test_read_null_result() {
        assert_eq!(unsafe { read_parse_result(std::ptr::null()) }, Err(Error::InvalidPointer));
    }

    #[test]
    fn test_read_preserves_absent_and_empty_lists() {
        let select = SelectStatement {
            select_list: Some(vec![]),
            order: None,
            group_by: Some(GroupByDescription { columns: Some(vec![]), having: None }),
            from_table: Some(Box::new(TableRef::named(None, "t").with_alias(Some(Alias::new("x"))))),
            ..SelectStatement::new()
        };
        let result = ParseResult::Valid(vec![Statement::Select(Box::new(select))]);

        unsafe {
            let mirror = Copier::default().copy_parse_result(&result);
            assert_eq!(read_parse_result(mirror), Ok(result));
            release_parse_result(mirror);
        }
    }

    #[test]
    fn test_read_rejects_bad_operator_tag() {
        let result = ParseResult::Valid(vec![Statement::Select(Box::new(SelectStatement {
            where_clause: Some(Box::new(Expr::binary(OperatorType::Less, Expr::literal_int(1), Expr::literal_int(2)))),
            ..SelectStatement::new()
        }))]);

        unsafe {
            let mirror = Copier::default().copy_parse_result(&result);
            let select = *(*mirror).statements as *mut SqlSelectStatement;
            (*(*select).whereClause).opType = 99;
            assert_eq!(read_parse_result(mirror), Err(Error::InvalidTag { kind: "OperatorType", value: 99 }));
            release_parse_result(mirror);
        }
    }

    #[test]
    fn test_read_invalid_result() {
        let result = ParseResult::Invalid(SyntaxError { message: "Expected an expression".into(), line: 2, column: 5 });
        unsafe {
            let mirror = Copier::default().copy_parse_result(&result);
            assert!((*mirror).statements.is_null());
            assert_eq!((*mirror).statementCount, 0);
            assert_eq!(read_parse_result(mirror), Ok(result));
            release_parse_result(mirror);
        }
    }
}
