//! Deep release of a mirror tree.
//!
//! Each `release_*` function undoes exactly what the matching copier built:
//! children, lists and strings first, then the node itself. Null is a no-op.
//!
//! # Safety
//! Every function here must be given null or a node produced by the copier
//! that has not been released yet. Releasing twice is undefined.

use crate::bindings_raw::*;
use crate::raw_dispatch;
use crate::raw_marshal::{free_arr, free_node, free_str, Stack};

pub(crate) unsafe fn release_parse_result(ptr: *mut SqlParserResult) {
    if ptr.is_null() {
        return;
    }
    let result = &*ptr;
    free_str(result.errorMsg);
    free_arr(result.statements, result.statementCount, raw_dispatch::release_statement);
    free_node(ptr);
}

/// Releases what a statement base owns, leaving the base itself in place.
pub(crate) unsafe fn release_base(base: &SqlStatement) {
    free_arr(base.hints, base.hintCount, release_expr);
}

pub(crate) unsafe fn release_select(ptr: *mut SqlSelectStatement) {
    if ptr.is_null() {
        return;
    }

    Stack::DEFAULT.grow(|| {
        let select = &*ptr;
        release_base(&select.base);
        release_table_ref(select.fromTable);
        free_arr(select.selectList, select.selectListSize, release_expr);
        release_expr(select.whereClause);
        release_group_by(select.groupBy);
        free_arr(select.setOperations, select.setOperationCount, release_set_operation);
        free_arr(select.order, select.orderCount, release_order);
        free_arr(select.withDescriptions, select.withDescriptionCount, release_with);
        release_limit(select.limit);
        free_node(ptr);
    })
}

pub(crate) unsafe fn release_expr(ptr: *mut SqlExpr) {
    if ptr.is_null() {
        return;
    }

    Stack::DEFAULT.grow(|| {
        let expr = &*ptr;
        release_expr(expr.expr);
        release_expr(expr.expr2);
        free_arr(expr.exprList, expr.exprListSize, release_expr);
        release_select(expr.select);
        free_str(expr.name);
        free_str(expr.table);
        free_str(expr.alias);
        free_node(ptr);
    })
}

pub(crate) unsafe fn release_table_ref(ptr: *mut SqlTableRef) {
    if ptr.is_null() {
        return;
    }

    Stack::DEFAULT.grow(|| {
        let table = &*ptr;
        free_arr(table.list, table.listSize, release_table_ref);
        free_str(table.schema);
        free_str(table.name);
        release_alias(table.alias);
        release_select(table.select);
        release_join(table.join);
        free_node(ptr);
    })
}

unsafe fn release_alias(ptr: *mut SqlAlias) {
    if ptr.is_null() {
        return;
    }
    let alias = &*ptr;
    free_arr(alias.columns, alias.columnCount, free_str);
    free_str(alias.name);
    free_node(ptr);
}

unsafe fn release_join(ptr: *mut SqlJoinDefinition) {
    if ptr.is_null() {
        return;
    }
    let join = &*ptr;
    release_table_ref(join.left);
    release_table_ref(join.right);
    release_expr(join.condition);
    free_node(ptr);
}

unsafe fn release_group_by(ptr: *mut SqlGroupByDescription) {
    if ptr.is_null() {
        return;
    }
    let group_by = &*ptr;
    free_arr(group_by.columns, group_by.columnCount, release_expr);
    release_expr(group_by.having);
    free_node(ptr);
}

unsafe fn release_order(ptr: *mut SqlOrderDescription) {
    if ptr.is_null() {
        return;
    }
    release_expr((*ptr).expr);
    free_node(ptr);
}

unsafe fn release_with(ptr: *mut SqlWithDescription) {
    if ptr.is_null() {
        return;
    }
    let with = &*ptr;
    free_str(with.alias);
    release_select(with.select);
    free_node(ptr);
}

unsafe fn release_limit(ptr: *mut SqlLimitDescription) {
    if ptr.is_null() {
        return;
    }
    let limit = &*ptr;
    release_expr(limit.limit);
    release_expr(limit.offset);
    free_node(ptr);
}

unsafe fn release_set_operation(ptr: *mut SqlSetOperation) {
    if ptr.is_null() {
        return;
    }
    let op = &*ptr;
    release_select(op.nestedSelectStatement);
    free_arr(op.resultOrder, op.resultOrderCount, release_order);
    release_limit(op.resultLimit);
    free_node(ptr);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::ast::{JoinType, OperatorType, OrderType, SetType, StatementType};
    use crate::raw_copy::Copier;
    use crate::raw_ledger;

    fn nested_select(depth: usize) -> SelectStatement {
        let mut select = SelectStatement { select_list: Some(vec![Expr::literal_int(depth as i64)]), ..SelectStatement::new() };
        if depth > 0 {
            select.where_clause = Some(Box::new(Expr::exists(nested_select(depth - 1))));
            select.from_table = Some(Box::new(TableRef::subquery(nested_select(0)).with_alias(Some(Alias {
                name: "s".into(),
                columns: Some(vec!["a".into(), "b".into()]),
            }))));
        }
        select
    }

    #[test]
    fn test_release_every_node_kind() {
        let select = SelectStatement {
            base: StatementBase { hints: Some(vec![Expr::hint("fast", Some(vec![]))]), ..StatementBase::new(StatementType::Select) },
            from_table: Some(Box::new(TableRef::join(JoinDefinition {
                left: Box::new(TableRef::named(Some("s".into()), "a")),
                right: Box::new(TableRef::cross_product(vec![TableRef::named(None, "b"), TableRef::named(None, "c")])),
                condition: Some(Box::new(Expr::binary(
                    OperatorType::Equals,
                    Expr::column_ref("x", Some("a".into())),
                    Expr::column_ref("x", Some("b".into())),
                ))),
                kind: JoinType::Left,
            }))),
            group_by: Some(GroupByDescription {
                columns: Some(vec![Expr::column_ref("x", None)]),
                having: Some(Box::new(Expr::function_ref("count", vec![Expr::star(None)], false))),
            }),
            set_operations: Some(vec![SetOperation {
                kind: SetType::Except,
                is_all: true,
                nested_select: Box::new(nested_select(1)),
                result_order: Some(vec![OrderDescription { kind: OrderType::Desc, expr: Box::new(Expr::literal_int(1)) }]),
                result_limit: Some(LimitDescription { limit: Some(Box::new(Expr::parameter(0))), offset: None }),
            }]),
            with_descriptions: Some(vec![WithDescription { alias: "w".into(), select: Box::new(nested_select(2)) }]),
            ..SelectStatement::new()
        };

        let ((), report) = raw_ledger::track(|| unsafe {
            let mirror = Copier::default().copy_select(Some(&select));
            release_select(mirror);
        });
        assert!(report.allocations > 30, "{report:?}");
        assert!(report.is_balanced(), "{report:?}");
    }

    #[test]
    fn test_release_null_is_noop() {
        let ((), report) = raw_ledger::track(|| unsafe {
            release_parse_result(std::ptr::null_mut());
            release_select(std::ptr::null_mut());
            release_expr(std::ptr::null_mut());
            release_table_ref(std::ptr::null_mut());
        });
        assert_eq!(report, raw_ledger::LedgerReport::default());
    }

    #[test]
    fn test_release_deeply_nested_subqueries() {
        let select = nested_select(500);
        let ((), report) = raw_ledger::track(|| unsafe {
            release_select(Copier::default().copy_select(Some(&select)));
        });
        assert!(report.is_balanced(), "{report:?}");
    }
}
