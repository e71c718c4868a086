//! Deep copy of a source tree into a mirror tree.
//!
//! Each `copy_*` function takes a possibly absent source node and returns null
//! or a freshly allocated mirror node that owns copies of every child, list and
//! string below it. Tags are written as ordinals of [`crate::ast::kinds`].
//! Nothing here reads or changes the source tree beyond borrowing it.

use std::ptr;

use crate::ast::*;
use crate::bindings_raw::*;
use crate::raw_dispatch;
use crate::raw_marshal::{alloc_node, copy_arr, copy_str, Stack};

/// Deep copier. Holds the stack policy applied at every recursive node.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Copier {
    stack: Stack,
}

impl Copier {
    pub(crate) fn new(stack: Stack) -> Self {
        Copier { stack }
    }

    pub(crate) fn copy_parse_result(&self, result: &ParseResult) -> *mut SqlParserResult {
        match result {
            ParseResult::Valid(statements) => {
                let (statements, statement_count) =
                    copy_arr(Some(statements.as_slice()), |statement| raw_dispatch::copy_statement(self, statement));
                alloc_node(SqlParserResult {
                    isValid: true,
                    errorMsg: ptr::null_mut(),
                    errorLine: 0,
                    errorColumn: 0,
                    statements,
                    statementCount: statement_count,
                })
            }
            ParseResult::Invalid(error) => alloc_node(SqlParserResult {
                isValid: false,
                errorMsg: copy_str(Some(error.message.as_str())),
                errorLine: error.line,
                errorColumn: error.column,
                statements: ptr::null_mut(),
                statementCount: 0,
            }),
        }
    }

    /// Copies only the fields every statement shares.
    pub(crate) fn copy_base(&self, base: &StatementBase) -> SqlStatement {
        let (hints, hint_count) = self.copy_exprs(base.hints.as_deref());
        SqlStatement { type_: base.kind.ordinal(), stringLength: base.string_length, hints, hintCount: hint_count }
    }

    pub(crate) fn copy_select(&self, select: Option<&SelectStatement>) -> *mut SqlSelectStatement {
        let select = match select {
            Some(select) => select,
            None => return ptr::null_mut(),
        };

        self.stack.grow(|| {
            let (select_list, select_list_size) = self.copy_exprs(select.select_list.as_deref());
            let (set_operations, set_operation_count) =
                copy_arr(select.set_operations.as_deref(), |op| self.copy_set_operation(op));
            let (order, order_count) = self.copy_order_list(select.order.as_deref());
            let (with_descriptions, with_description_count) =
                copy_arr(select.with_descriptions.as_deref(), |with| self.copy_with(with));

            alloc_node(SqlSelectStatement {
                base: self.copy_base(&select.base),
                fromTable: self.copy_table_ref(select.from_table.as_deref()),
                selectDistinct: select.select_distinct,
                selectList: select_list,
                selectListSize: select_list_size,
                whereClause: self.copy_expr(select.where_clause.as_deref()),
                groupBy: self.copy_group_by(select.group_by.as_ref()),
                setOperations: set_operations,
                setOperationCount: set_operation_count,
                order,
                orderCount: order_count,
                withDescriptions: with_descriptions,
                withDescriptionCount: with_description_count,
                limit: self.copy_limit(select.limit.as_ref()),
            })
        })
    }

    pub(crate) fn copy_expr(&self, expr: Option<&Expr>) -> *mut SqlExpr {
        let expr = match expr {
            Some(expr) => expr,
            None => return ptr::null_mut(),
        };

        self.stack.grow(|| {
            let (expr_list, expr_list_size) = self.copy_exprs(expr.expr_list.as_deref());
            alloc_node(SqlExpr {
                type_: expr.kind.ordinal(),
                expr: self.copy_expr(expr.expr.as_deref()),
                expr2: self.copy_expr(expr.expr2.as_deref()),
                exprList: expr_list,
                exprListSize: expr_list_size,
                select: self.copy_select(expr.select.as_deref()),
                name: copy_str(expr.name.as_deref()),
                table: copy_str(expr.table.as_deref()),
                alias: copy_str(expr.alias.as_deref()),
                fval: expr.fval,
                ival: expr.ival,
                ival2: expr.ival2,
                datetimeField: expr.datetime_field.ordinal(),
                isBoolLiteral: expr.is_bool_literal,
                opType: expr.op_type.ordinal(),
                distinct: expr.distinct,
            })
        })
    }

    fn copy_exprs(&self, exprs: Option<&[Expr]>) -> (*mut *mut SqlExpr, usize) {
        copy_arr(exprs, |expr| self.copy_expr(Some(expr)))
    }

    pub(crate) fn copy_table_ref(&self, table: Option<&TableRef>) -> *mut SqlTableRef {
        let table = match table {
            Some(table) => table,
            None => return ptr::null_mut(),
        };

        self.stack.grow(|| {
            let (list, list_size) = copy_arr(table.list.as_deref(), |child| self.copy_table_ref(Some(child)));
            alloc_node(SqlTableRef {
                type_: table.kind.ordinal(),
                schema: copy_str(table.schema.as_deref()),
                name: copy_str(table.name.as_deref()),
                alias: self.copy_alias(table.alias.as_ref()),
                select: self.copy_select(table.select.as_deref()),
                list,
                listSize: list_size,
                join: self.copy_join(table.join.as_deref()),
            })
        })
    }

    fn copy_alias(&self, alias: Option<&Alias>) -> *mut SqlAlias {
        let alias = match alias {
            Some(alias) => alias,
            None => return ptr::null_mut(),
        };

        let (columns, column_count) = copy_arr(alias.columns.as_deref(), |column| copy_str(Some(column.as_str())));
        alloc_node(SqlAlias { name: copy_str(Some(alias.name.as_str())), columns, columnCount: column_count })
    }

    fn copy_join(&self, join: Option<&JoinDefinition>) -> *mut SqlJoinDefinition {
        let join = match join {
            Some(join) => join,
            None => return ptr::null_mut(),
        };

        alloc_node(SqlJoinDefinition {
            left: self.copy_table_ref(Some(&*join.left)),
            right: self.copy_table_ref(Some(&*join.right)),
            condition: self.copy_expr(join.condition.as_deref()),
            type_: join.kind.ordinal(),
        })
    }

    fn copy_group_by(&self, group_by: Option<&GroupByDescription>) -> *mut SqlGroupByDescription {
        let group_by = match group_by {
            Some(group_by) => group_by,
            None => return ptr::null_mut(),
        };

        let (columns, column_count) = self.copy_exprs(group_by.columns.as_deref());
        alloc_node(SqlGroupByDescription {
            columns,
            columnCount: column_count,
            having: self.copy_expr(group_by.having.as_deref()),
        })
    }

    fn copy_order(&self, order: &OrderDescription) -> *mut SqlOrderDescription {
        alloc_node(SqlOrderDescription { type_: order.kind.ordinal(), expr: self.copy_expr(Some(&*order.expr)) })
    }

    fn copy_order_list(&self, order: Option<&[OrderDescription]>) -> (*mut *mut SqlOrderDescription, usize) {
        copy_arr(order, |item| self.copy_order(item))
    }

    fn copy_with(&self, with: &WithDescription) -> *mut SqlWithDescription {
        alloc_node(SqlWithDescription { alias: copy_str(Some(with.alias.as_str())), select: self.copy_select(Some(&*with.select)) })
    }

    fn copy_limit(&self, limit: Option<&LimitDescription>) -> *mut SqlLimitDescription {
        let limit = match limit {
            Some(limit) => limit,
            None => return ptr::null_mut(),
        };

        alloc_node(SqlLimitDescription {
            limit: self.copy_expr(limit.limit.as_deref()),
            offset: self.copy_expr(limit.offset.as_deref()),
        })
    }

    fn copy_set_operation(&self, op: &SetOperation) -> *mut SqlSetOperation {
        let (result_order, result_order_count) = self.copy_order_list(op.result_order.as_deref());
        alloc_node(SqlSetOperation {
            setType: op.kind.ordinal(),
            isAll: op.is_all,
            nestedSelectStatement: self.copy_select(Some(&*op.nested_select)),
            resultOrder: result_order,
            resultOrderCount: result_order_count,
            resultLimit: self.copy_limit(op.result_limit.as_ref()),
        })
    }
}
