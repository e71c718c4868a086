//! Lowering from the `sqlparser` AST to the source tree.

use itertools::Itertools;
use sqlparser::ast as sql;

use crate::ast::kinds::*;
use crate::ast::nodes::*;
use crate::raw_marshal::Stack;
use crate::{Error, Result};

fn unsupported<T>(what: impl std::fmt::Display) -> Result<T> {
    Err(Error::Unsupported(what.to_string()))
}

/// Lowers one `sqlparser` statement at a time. Parameter positions count from
/// zero within each statement.
pub(crate) struct Lowering {
    stack: Stack,
    parameters: i64,
}

impl Lowering {
    pub(crate) fn new(stack: Stack) -> Self {
        Lowering { stack, parameters: 0 }
    }

    pub(crate) fn lower_statement(&mut self, statement: &sql::Statement) -> Result<Statement> {
        self.parameters = 0;
        let kind = match statement {
            sql::Statement::Query(query) => return Ok(Statement::Select(Box::new(self.lower_query(query)?))),
            sql::Statement::Insert { .. } => StatementType::Insert,
            sql::Statement::Update { .. } => StatementType::Update,
            sql::Statement::Delete { .. } => StatementType::Delete,
            sql::Statement::CreateTable { .. }
            | sql::Statement::CreateView { .. }
            | sql::Statement::CreateIndex { .. }
            | sql::Statement::CreateVirtualTable { .. }
            | sql::Statement::CreateSchema { .. }
            | sql::Statement::CreateDatabase { .. }
            | sql::Statement::CreateFunction { .. }
            | sql::Statement::CreateSequence { .. }
            | sql::Statement::CreateRole { .. } => StatementType::Create,
            sql::Statement::Drop { .. } | sql::Statement::DropFunction { .. } | sql::Statement::Deallocate { .. } => {
                StatementType::Drop
            }
            sql::Statement::Prepare { .. } => StatementType::Prepare,
            sql::Statement::Execute { .. } => StatementType::Execute,
            sql::Statement::Copy { to: true, .. } => StatementType::Export,
            sql::Statement::Copy { to: false, .. } => StatementType::Import,
            sql::Statement::AlterTable { operations, .. }
                if !operations.is_empty()
                    && operations.iter().all(|op| matches!(op, sql::AlterTableOperation::RenameTable { .. })) =>
            {
                StatementType::Rename
            }
            sql::Statement::AlterTable { .. }
            | sql::Statement::AlterIndex { .. }
            | sql::Statement::AlterView { .. }
            | sql::Statement::AlterRole { .. } => StatementType::Alter,
            sql::Statement::ShowTables { .. }
            | sql::Statement::ShowColumns { .. }
            | sql::Statement::ShowVariable { .. }
            | sql::Statement::ShowVariables { .. }
            | sql::Statement::ShowCreate { .. }
            | sql::Statement::ShowFunctions { .. }
            | sql::Statement::ShowCollation { .. } => StatementType::Show,
            sql::Statement::StartTransaction { .. }
            | sql::Statement::SetTransaction { .. }
            | sql::Statement::Commit { .. }
            | sql::Statement::Rollback { .. }
            | sql::Statement::Savepoint { .. } => StatementType::Transaction,
            other => {
                let text = other.to_string();
                let keyword = text.split_whitespace().next().unwrap_or_default().to_uppercase();
                return unsupported(format!("{keyword} statement"));
            }
        };
        Ok(Statement::from_base(StatementBase::new(kind)))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    fn lower_query(&mut self, query: &sql::Query) -> Result<SelectStatement> {
        if query.fetch.is_some() {
            return unsupported("FETCH");
        }

        // Lowered in text order so parameters are numbered by position.
        let mut with_descriptions = None;
        if let Some(with) = &query.with {
            if with.recursive {
                return unsupported("WITH RECURSIVE");
            }
            let mut descriptions = Vec::with_capacity(with.cte_tables.len());
            for cte in &with.cte_tables {
                if !cte.alias.columns.is_empty() {
                    return unsupported("column list on a common table expression");
                }
                descriptions.push(WithDescription {
                    alias: cte.alias.name.value.clone(),
                    select: Box::new(self.lower_query(&cte.query)?),
                });
            }
            with_descriptions = Some(descriptions);
        }

        let mut select = self.lower_set_expr(&query.body)?;
        if with_descriptions.is_some() {
            if select.with_descriptions.is_some() {
                return unsupported("nested WITH");
            }
            select.with_descriptions = with_descriptions;
        }

        let order = if query.order_by.is_empty() {
            None
        } else {
            Some(query.order_by.iter().map(|item| self.lower_order(item)).collect::<Result<Vec<_>>>()?)
        };
        let limit = if query.limit.is_none() && query.offset.is_none() {
            None
        } else {
            Some(LimitDescription {
                limit: self.lower_opt_expr(query.limit.as_ref())?,
                offset: self.lower_opt_expr(query.offset.as_ref().map(|offset| &offset.value))?,
            })
        };

        // ORDER BY and LIMIT of a compound query belong to its last set operation.
        let compound = is_compound(&query.body);
        let (order_slot, limit_slot) = match select.set_operations.as_mut().and_then(|ops| ops.last_mut()) {
            Some(last) if compound => (&mut last.result_order, &mut last.result_limit),
            _ => (&mut select.order, &mut select.limit),
        };
        if order.is_some() {
            if order_slot.is_some() {
                return unsupported("nested ORDER BY");
            }
            *order_slot = order;
        }
        if limit.is_some() {
            if limit_slot.is_some() {
                return unsupported("nested LIMIT");
            }
            *limit_slot = limit;
        }

        Ok(select)
    }

    fn lower_set_expr(&mut self, body: &sql::SetExpr) -> Result<SelectStatement> {
        match body {
            sql::SetExpr::Select(select) => self.lower_select(select),
            sql::SetExpr::Query(query) => self.lower_query(query),
            sql::SetExpr::SetOperation { op, set_quantifier, left, right } => {
                let kind = match op {
                    sql::SetOperator::Union => SetType::Union,
                    sql::SetOperator::Intersect => SetType::Intersect,
                    sql::SetOperator::Except => SetType::Except,
                };
                let is_all = match set_quantifier {
                    sql::SetQuantifier::All => true,
                    sql::SetQuantifier::Distinct | sql::SetQuantifier::None => false,
                    other => return unsupported(format!("set quantifier {other}")),
                };

                let mut select = self.lower_set_expr(left)?;
                let nested = self.lower_set_expr(right)?;
                select.set_operations.get_or_insert_with(Vec::new).push(SetOperation {
                    kind,
                    is_all,
                    nested_select: Box::new(nested),
                    result_order: None,
                    result_limit: None,
                });
                Ok(select)
            }
            sql::SetExpr::Values(_) => unsupported("VALUES"),
            other => unsupported(format!("query body `{other}`")),
        }
    }

    fn lower_select(&mut self, select: &sql::Select) -> Result<SelectStatement> {
        if select.top.is_some() {
            return unsupported("TOP");
        }
        if select.into.is_some() {
            return unsupported("SELECT INTO");
        }
        if !select.lateral_views.is_empty() {
            return unsupported("LATERAL VIEW");
        }
        if !select.cluster_by.is_empty() || !select.distribute_by.is_empty() || !select.sort_by.is_empty() {
            return unsupported("CLUSTER BY, DISTRIBUTE BY or SORT BY");
        }
        if !select.named_window.is_empty() {
            return unsupported("WINDOW");
        }
        if select.qualify.is_some() {
            return unsupported("QUALIFY");
        }

        let select_distinct = match &select.distinct {
            None => false,
            Some(sql::Distinct::Distinct) => true,
            Some(sql::Distinct::On(_)) => return unsupported("DISTINCT ON"),
        };

        let mut select_list = Vec::with_capacity(select.projection.len());
        for item in &select.projection {
            select_list.push(self.lower_select_item(item)?);
        }

        let from_table = match select.from.as_slice() {
            [] => None,
            [table] => Some(Box::new(self.lower_table_with_joins(table)?)),
            tables => {
                let list = tables.iter().map(|table| self.lower_table_with_joins(table)).collect::<Result<Vec<_>>>()?;
                Some(Box::new(TableRef::cross_product(list)))
            }
        };

        let where_clause = self.lower_opt_expr(select.selection.as_ref())?;

        let group_columns = match &select.group_by {
            sql::GroupByExpr::All => return unsupported("GROUP BY ALL"),
            sql::GroupByExpr::Expressions(exprs) if exprs.is_empty() => None,
            sql::GroupByExpr::Expressions(exprs) => Some(self.lower_exprs(exprs)?),
        };
        let having = self.lower_opt_expr(select.having.as_ref())?;
        let group_by = if group_columns.is_none() && having.is_none() {
            None
        } else {
            Some(GroupByDescription { columns: group_columns, having })
        };

        Ok(SelectStatement {
            from_table,
            select_distinct,
            select_list: Some(select_list),
            where_clause,
            group_by,
            ..SelectStatement::new()
        })
    }

    fn lower_select_item(&mut self, item: &sql::SelectItem) -> Result<Expr> {
        match item {
            sql::SelectItem::UnnamedExpr(expr) => self.lower_expr(expr),
            sql::SelectItem::ExprWithAlias { expr, alias } => Ok(self.lower_expr(expr)?.with_alias(alias.value.clone())),
            sql::SelectItem::QualifiedWildcard(name, ..) => Ok(Expr::star(last_part(name))),
            sql::SelectItem::Wildcard(..) => Ok(Expr::star(None)),
        }
    }

    fn lower_order(&mut self, item: &sql::OrderByExpr) -> Result<OrderDescription> {
        if item.nulls_first.is_some() {
            return unsupported("NULLS FIRST / NULLS LAST");
        }
        let kind = match item.asc {
            Some(false) => OrderType::Desc,
            _ => OrderType::Asc,
        };
        Ok(OrderDescription { kind, expr: Box::new(self.lower_expr(&item.expr)?) })
    }

    // ========================================================================
    // Table references
    // ========================================================================

    fn lower_table_with_joins(&mut self, table: &sql::TableWithJoins) -> Result<TableRef> {
        let mut left = self.lower_table_factor(&table.relation)?;
        for join in &table.joins {
            let (kind, constraint) = match &join.join_operator {
                sql::JoinOperator::Inner(constraint) => (JoinType::Inner, Some(constraint)),
                sql::JoinOperator::LeftOuter(constraint) => (JoinType::Left, Some(constraint)),
                sql::JoinOperator::RightOuter(constraint) => (JoinType::Right, Some(constraint)),
                sql::JoinOperator::FullOuter(constraint) => (JoinType::Full, Some(constraint)),
                sql::JoinOperator::CrossJoin => (JoinType::Cross, None),
                _ => return unsupported("join operator"),
            };
            let right = self.lower_table_factor(&join.relation)?;
            let (kind, condition) = match constraint {
                Some(sql::JoinConstraint::On(expr)) => (kind, Some(Box::new(self.lower_expr(expr)?))),
                Some(sql::JoinConstraint::Natural) => (JoinType::Natural, None),
                Some(sql::JoinConstraint::Using(_)) => return unsupported("JOIN ... USING"),
                Some(sql::JoinConstraint::None) | None => (kind, None),
            };
            left = TableRef::join(JoinDefinition { left: Box::new(left), right: Box::new(right), condition, kind });
        }
        Ok(left)
    }

    fn lower_table_factor(&mut self, factor: &sql::TableFactor) -> Result<TableRef> {
        match factor {
            sql::TableFactor::Table { name, alias, .. } => {
                let (schema, table) = match name.0.as_slice() {
                    [table] => (None, table),
                    [schema, table] => (Some(schema.value.clone()), table),
                    _ => return unsupported(format!("table name `{name}`")),
                };
                Ok(TableRef::named(schema, table.value.clone()).with_alias(lower_alias(alias.as_ref())))
            }
            sql::TableFactor::Derived { lateral, subquery, alias, .. } => {
                if *lateral {
                    return unsupported("LATERAL");
                }
                let select = self.stack.grow(|| self.lower_query(subquery))?;
                Ok(TableRef::subquery(select).with_alias(lower_alias(alias.as_ref())))
            }
            sql::TableFactor::NestedJoin { table_with_joins, alias, .. } => {
                let table = self.lower_table_with_joins(table_with_joins)?;
                match lower_alias(alias.as_ref()) {
                    Some(alias) => Ok(table.with_alias(Some(alias))),
                    None => Ok(table),
                }
            }
            other => unsupported(format!("table reference `{other}`")),
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn lower_opt_expr(&mut self, expr: Option<&sql::Expr>) -> Result<Option<Box<Expr>>> {
        match expr {
            Some(expr) => Ok(Some(Box::new(self.lower_expr(expr)?))),
            None => Ok(None),
        }
    }

    fn lower_exprs(&mut self, exprs: &[sql::Expr]) -> Result<Vec<Expr>> {
        exprs.iter().map(|expr| self.lower_expr(expr)).collect()
    }

    fn lower_subquery(&mut self, query: &sql::Query) -> Result<SelectStatement> {
        self.stack.grow(|| self.lower_query(query))
    }

    pub(crate) fn lower_expr(&mut self, expr: &sql::Expr) -> Result<Expr> {
        self.stack.grow(|| self.lower_expr_inner(expr))
    }

    fn lower_expr_inner(&mut self, expr: &sql::Expr) -> Result<Expr> {
        let lowered = match expr {
            sql::Expr::Identifier(ident) => Expr::column_ref(ident.value.clone(), None),
            sql::Expr::CompoundIdentifier(idents) => match idents.as_slice() {
                [] => return unsupported("empty identifier"),
                [column] => Expr::column_ref(column.value.clone(), None),
                [.., table, column] => Expr::column_ref(column.value.clone(), Some(table.value.clone())),
            },
            sql::Expr::Wildcard => Expr::star(None),
            sql::Expr::QualifiedWildcard(name) => Expr::star(last_part(name)),
            sql::Expr::Value(value) => self.lower_value(value)?,
            sql::Expr::Nested(inner) => self.lower_expr(inner)?,
            sql::Expr::BinaryOp { left, op, right } => {
                Expr::binary(binary_operator(op)?, self.lower_expr(left)?, self.lower_expr(right)?)
            }
            sql::Expr::UnaryOp { op, expr } => match op {
                sql::UnaryOperator::Not => Expr::unary(OperatorType::Not, self.lower_expr(expr)?),
                sql::UnaryOperator::Minus => Expr::unary(OperatorType::UnaryMinus, self.lower_expr(expr)?),
                sql::UnaryOperator::Plus => self.lower_expr(expr)?,
                other => return unsupported(format!("operator {other}")),
            },
            sql::Expr::IsNull(inner) => Expr::unary(OperatorType::IsNull, self.lower_expr(inner)?),
            sql::Expr::IsNotNull(inner) => negate(Expr::unary(OperatorType::IsNull, self.lower_expr(inner)?), true),
            sql::Expr::Like { negated, expr, pattern, escape_char, .. } => {
                if escape_char.is_some() {
                    return unsupported("LIKE ... ESCAPE");
                }
                let op = if *negated { OperatorType::NotLike } else { OperatorType::Like };
                Expr::binary(op, self.lower_expr(expr)?, self.lower_expr(pattern)?)
            }
            sql::Expr::ILike { negated, expr, pattern, escape_char, .. } => {
                if escape_char.is_some() {
                    return unsupported("ILIKE ... ESCAPE");
                }
                let ilike = Expr::binary(OperatorType::ILike, self.lower_expr(expr)?, self.lower_expr(pattern)?);
                negate(ilike, *negated)
            }
            sql::Expr::Between { expr, negated, low, high } => {
                let between = Expr::between(self.lower_expr(expr)?, self.lower_expr(low)?, self.lower_expr(high)?);
                negate(between, *negated)
            }
            sql::Expr::InList { expr, list, negated } => {
                let in_list = Expr::in_list(self.lower_expr(expr)?, self.lower_exprs(list)?);
                negate(in_list, *negated)
            }
            sql::Expr::InSubquery { expr, subquery, negated } => {
                let lhs = self.lower_expr(expr)?;
                let in_select = Expr::in_select(lhs, self.lower_subquery(subquery)?);
                negate(in_select, *negated)
            }
            sql::Expr::Exists { subquery, negated } => negate(Expr::exists(self.lower_subquery(subquery)?), *negated),
            sql::Expr::Subquery(query) => Expr::subquery(self.lower_subquery(query)?),
            sql::Expr::Function(function) => self.lower_function(function)?,
            sql::Expr::Case { operand, conditions, results, else_result } => {
                let operand = match operand {
                    Some(operand) => Some(self.lower_expr(operand)?),
                    None => None,
                };
                let mut whens = Vec::with_capacity(conditions.len());
                for (condition, result) in conditions.iter().zip(results) {
                    whens.push(Expr::case_when(self.lower_expr(condition)?, self.lower_expr(result)?));
                }
                let else_result = match else_result {
                    Some(else_result) => Some(self.lower_expr(else_result)?),
                    None => None,
                };
                Expr::case(operand, whens, else_result)
            }
            sql::Expr::Extract { field, expr, .. } => Expr::extract(datetime_field(field)?, self.lower_expr(expr)?),
            sql::Expr::Interval(interval) => {
                if interval.leading_precision.is_some()
                    || interval.last_field.is_some()
                    || interval.fractional_seconds_precision.is_some()
                {
                    return unsupported("INTERVAL qualifier");
                }
                let field = match &interval.leading_field {
                    Some(field) => datetime_field(field)?,
                    None => return unsupported("INTERVAL without a unit"),
                };
                Expr { expr: Some(Box::new(self.lower_expr(&interval.value)?)), ..Expr::datetime_field(field) }
            }
            sql::Expr::Array(array) => Expr::array(self.lower_exprs(&array.elem)?),
            sql::Expr::ArrayIndex { obj, indexes } => {
                let mut lowered = self.lower_expr(obj)?;
                for index in indexes {
                    lowered = Expr::array_index(lowered, array_subscript(index)?);
                }
                lowered
            }
            other => return unsupported(format!("expression `{other}`")),
        };
        Ok(lowered)
    }

    fn lower_value(&mut self, value: &sql::Value) -> Result<Expr> {
        let lowered = match value {
            sql::Value::Number(text, _) => number_literal(text)?,
            sql::Value::SingleQuotedString(text)
            | sql::Value::DoubleQuotedString(text)
            | sql::Value::EscapedStringLiteral(text)
            | sql::Value::NationalStringLiteral(text) => Expr::literal_string(text.clone()),
            sql::Value::Boolean(value) => Expr::literal_bool(*value),
            sql::Value::Null => Expr::literal_null(),
            sql::Value::Placeholder(_) => {
                let index = self.parameters;
                self.parameters += 1;
                Expr::parameter(index)
            }
            other => return unsupported(format!("literal {other}")),
        };
        Ok(lowered)
    }

    fn lower_function(&mut self, function: &sql::Function) -> Result<Expr> {
        if function.over.is_some() {
            return unsupported("window function");
        }

        let mut args = Vec::with_capacity(function.args.len());
        for arg in &function.args {
            let arg = match arg {
                sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Expr(expr)) => self.lower_expr(expr)?,
                sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Wildcard) => Expr::star(None),
                sql::FunctionArg::Unnamed(sql::FunctionArgExpr::QualifiedWildcard(name)) => Expr::star(last_part(name)),
                sql::FunctionArg::Named { .. } => return unsupported("named function argument"),
            };
            args.push(arg);
        }

        let name = function.name.0.iter().map(|ident| ident.value.as_str()).join(".");
        Ok(Expr::function_ref(name, args, function.distinct))
    }
}

/// True when the body is a set operation, possibly wrapped in parentheses.
fn is_compound(body: &sql::SetExpr) -> bool {
    match body {
        sql::SetExpr::SetOperation { .. } => true,
        sql::SetExpr::Query(query) => is_compound(&query.body),
        _ => false,
    }
}

fn last_part(name: &sql::ObjectName) -> Option<String> {
    name.0.last().map(|ident| ident.value.clone())
}

fn lower_alias(alias: Option<&sql::TableAlias>) -> Option<Alias> {
    alias.map(|alias| Alias {
        name: alias.name.value.clone(),
        columns: if alias.columns.is_empty() {
            None
        } else {
            Some(alias.columns.iter().map(|column| column.value.clone()).collect())
        },
    })
}

/// Wraps `expr` in a NOT operator when `negated` is set.
fn negate(expr: Expr, negated: bool) -> Expr {
    if negated {
        Expr::unary(OperatorType::Not, expr)
    } else {
        expr
    }
}

fn number_literal(text: &str) -> Result<Expr> {
    if let Ok(value) = text.parse::<i64>() {
        return Ok(Expr::literal_int(value));
    }
    match text.parse::<f64>() {
        Ok(value) => Ok(Expr::literal_float(value)),
        Err(_) => unsupported(format!("numeric literal {text}")),
    }
}

fn array_subscript(index: &sql::Expr) -> Result<i64> {
    match index {
        sql::Expr::Value(sql::Value::Number(text, _)) => match text.parse::<i64>() {
            Ok(index) => Ok(index),
            Err(_) => unsupported(format!("array subscript {text}")),
        },
        other => unsupported(format!("array subscript `{other}`")),
    }
}

fn binary_operator(op: &sql::BinaryOperator) -> Result<OperatorType> {
    let op_type = match op {
        sql::BinaryOperator::Plus => OperatorType::Plus,
        sql::BinaryOperator::Minus => OperatorType::Minus,
        sql::BinaryOperator::Multiply => OperatorType::Asterisk,
        sql::BinaryOperator::Divide => OperatorType::Slash,
        sql::BinaryOperator::Modulo => OperatorType::Percentage,
        sql::BinaryOperator::BitwiseXor | sql::BinaryOperator::PGExp => OperatorType::Caret,
        sql::BinaryOperator::Eq => OperatorType::Equals,
        sql::BinaryOperator::NotEq => OperatorType::NotEquals,
        sql::BinaryOperator::Lt => OperatorType::Less,
        sql::BinaryOperator::LtEq => OperatorType::LessEq,
        sql::BinaryOperator::Gt => OperatorType::Greater,
        sql::BinaryOperator::GtEq => OperatorType::GreaterEq,
        sql::BinaryOperator::And => OperatorType::And,
        sql::BinaryOperator::Or => OperatorType::Or,
        sql::BinaryOperator::StringConcat => OperatorType::Concat,
        other => return unsupported(format!("operator {other}")),
    };
    Ok(op_type)
}

fn datetime_field(field: &sql::DateTimeField) -> Result<DatetimeField> {
    let field = match field {
        sql::DateTimeField::Second => DatetimeField::Second,
        sql::DateTimeField::Minute => DatetimeField::Minute,
        sql::DateTimeField::Hour => DatetimeField::Hour,
        sql::DateTimeField::Day => DatetimeField::Day,
        sql::DateTimeField::Month => DatetimeField::Month,
        sql::DateTimeField::Year => DatetimeField::Year,
        other => return unsupported(format!("datetime field {other}")),
    };
    Ok(field)
}
