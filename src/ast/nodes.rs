//! Owned source tree for parsed SQL.
//!
//! These types are what the lowering produces and what the copier reads. Every
//! optional child is an `Option`, and sequences keep the difference between
//! absent (`None`) and present-but-empty (`Some(vec![])`).

use serde::{Deserialize, Serialize};

use crate::ast::kinds::*;

/// Top-level parse result.
///
/// Exactly one of the statement list or the syntax error is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParseResult {
    Valid(Vec<Statement>),
    Invalid(SyntaxError),
}

impl ParseResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ParseResult::Valid(_))
    }

    /// Statements of a valid result, empty for an invalid one.
    pub fn statements(&self) -> &[Statement] {
        match self {
            ParseResult::Valid(statements) => statements,
            ParseResult::Invalid(_) => &[],
        }
    }

    pub fn error(&self) -> Option<&SyntaxError> {
        match self {
            ParseResult::Valid(_) => None,
            ParseResult::Invalid(error) => Some(error),
        }
    }

    /// Takes the statements, turning a syntax error into [`crate::Error::Parse`].
    pub fn into_statements(self) -> crate::Result<Vec<Statement>> {
        match self {
            ParseResult::Valid(statements) => Ok(statements),
            ParseResult::Invalid(error) => Err(crate::Error::Parse(format!(
                "{} at line {}, column {}",
                error.message, error.line, error.column
            ))),
        }
    }

    /// Serializes the tree to pretty-printed JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Error descriptor of an invalid parse. Line and column are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxError {
    pub message: String,
    pub line: i32,
    pub column: i32,
}

// ============================================================================
// Statements
// ============================================================================

/// Fields shared by every statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatementBase {
    pub kind: StatementType,
    /// Length in characters of the statement's source text
    pub string_length: usize,
    pub hints: Option<Vec<Expr>>,
}

impl StatementBase {
    pub fn new(kind: StatementType) -> Self {
        StatementBase { kind, string_length: 0, hints: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Select(Box<SelectStatement>),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    /// Any other statement kind, carried through its base fields only.
    Other(StatementBase),
}

impl Statement {
    /// Builds the variant matching `base.kind`, with an empty payload.
    pub fn from_base(base: StatementBase) -> Self {
        match base.kind {
            StatementType::Select => Statement::Select(Box::new(SelectStatement { base, ..SelectStatement::new() })),
            StatementType::Insert => Statement::Insert(InsertStatement { base }),
            StatementType::Update => Statement::Update(UpdateStatement { base }),
            StatementType::Delete => Statement::Delete(DeleteStatement { base }),
            _ => Statement::Other(base),
        }
    }

    pub fn base(&self) -> &StatementBase {
        match self {
            Statement::Select(s) => &s.base,
            Statement::Insert(s) => &s.base,
            Statement::Update(s) => &s.base,
            Statement::Delete(s) => &s.base,
            Statement::Other(base) => base,
        }
    }

    pub fn base_mut(&mut self) -> &mut StatementBase {
        match self {
            Statement::Select(s) => &mut s.base,
            Statement::Insert(s) => &mut s.base,
            Statement::Update(s) => &mut s.base,
            Statement::Delete(s) => &mut s.base,
            Statement::Other(base) => base,
        }
    }

    pub fn kind(&self) -> StatementType {
        self.base().kind
    }

    pub fn as_select(&self) -> Option<&SelectStatement> {
        match self {
            Statement::Select(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectStatement {
    pub base: StatementBase,
    pub from_table: Option<Box<TableRef>>,
    pub select_distinct: bool,
    pub select_list: Option<Vec<Expr>>,
    pub where_clause: Option<Box<Expr>>,
    pub group_by: Option<GroupByDescription>,
    pub set_operations: Option<Vec<SetOperation>>,
    pub order: Option<Vec<OrderDescription>>,
    pub with_descriptions: Option<Vec<WithDescription>>,
    pub limit: Option<LimitDescription>,
}

impl SelectStatement {
    pub fn new() -> Self {
        SelectStatement {
            base: StatementBase::new(StatementType::Select),
            from_table: None,
            select_distinct: false,
            select_list: None,
            where_clause: None,
            group_by: None,
            set_operations: None,
            order: None,
            with_descriptions: None,
            limit: None,
        }
    }
}

impl Default for SelectStatement {
    fn default() -> Self {
        Self::new()
    }
}

// The statement bodies below are not modelled; only the base is carried.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertStatement {
    pub base: StatementBase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStatement {
    pub base: StatementBase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteStatement {
    pub base: StatementBase,
}

// ============================================================================
// Clauses
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupByDescription {
    pub columns: Option<Vec<Expr>>,
    pub having: Option<Box<Expr>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDescription {
    pub kind: OrderType,
    pub expr: Box<Expr>,
}

/// Common table expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithDescription {
    pub alias: String,
    pub select: Box<SelectStatement>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LimitDescription {
    pub limit: Option<Box<Expr>>,
    pub offset: Option<Box<Expr>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetOperation {
    pub kind: SetType,
    pub is_all: bool,
    pub nested_select: Box<SelectStatement>,
    pub result_order: Option<Vec<OrderDescription>>,
    pub result_limit: Option<LimitDescription>,
}

// ============================================================================
// Table references
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub columns: Option<Vec<String>>,
}

impl Alias {
    pub fn new(name: impl Into<String>) -> Self {
        Alias { name: name.into(), columns: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinDefinition {
    pub left: Box<TableRef>,
    pub right: Box<TableRef>,
    pub condition: Option<Box<Expr>>,
    pub kind: JoinType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRef {
    pub kind: TableRefType,
    pub schema: Option<String>,
    pub name: Option<String>,
    pub alias: Option<Alias>,
    pub select: Option<Box<SelectStatement>>,
    pub list: Option<Vec<TableRef>>,
    pub join: Option<Box<JoinDefinition>>,
}

impl TableRef {
    pub fn new(kind: TableRefType) -> Self {
        TableRef { kind, schema: None, name: None, alias: None, select: None, list: None, join: None }
    }

    pub fn named(schema: Option<String>, name: impl Into<String>) -> Self {
        TableRef { schema, name: Some(name.into()), ..TableRef::new(TableRefType::Name) }
    }

    pub fn subquery(select: SelectStatement) -> Self {
        TableRef { select: Some(Box::new(select)), ..TableRef::new(TableRefType::Select) }
    }

    pub fn join(join: JoinDefinition) -> Self {
        TableRef { join: Some(Box::new(join)), ..TableRef::new(TableRefType::Join) }
    }

    pub fn cross_product(list: Vec<TableRef>) -> Self {
        TableRef { list: Some(list), ..TableRef::new(TableRefType::CrossProduct) }
    }

    pub fn with_alias(mut self, alias: Option<Alias>) -> Self {
        self.alias = alias;
        self
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// Expression node. `kind` decides which of the other fields are meaningful;
/// the rest stay zero or absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprType,
    pub expr: Option<Box<Expr>>,
    pub expr2: Option<Box<Expr>>,
    pub expr_list: Option<Vec<Expr>>,
    pub select: Option<Box<SelectStatement>>,
    pub name: Option<String>,
    pub table: Option<String>,
    pub alias: Option<String>,
    pub fval: f64,
    pub ival: i64,
    pub ival2: i64,
    pub datetime_field: DatetimeField,
    pub is_bool_literal: bool,
    pub op_type: OperatorType,
    pub distinct: bool,
}

impl Expr {
    pub fn new(kind: ExprType) -> Self {
        Expr {
            kind,
            expr: None,
            expr2: None,
            expr_list: None,
            select: None,
            name: None,
            table: None,
            alias: None,
            fval: 0.0,
            ival: 0,
            ival2: 0,
            datetime_field: DatetimeField::None,
            is_bool_literal: false,
            op_type: OperatorType::None,
            distinct: false,
        }
    }

    pub fn literal_float(value: f64) -> Self {
        Expr { fval: value, ..Expr::new(ExprType::LiteralFloat) }
    }

    pub fn literal_string(value: impl Into<String>) -> Self {
        Expr { name: Some(value.into()), ..Expr::new(ExprType::LiteralString) }
    }

    pub fn literal_int(value: i64) -> Self {
        Expr { ival: value, ..Expr::new(ExprType::LiteralInt) }
    }

    /// TRUE and FALSE are int literals flagged as booleans.
    pub fn literal_bool(value: bool) -> Self {
        Expr { is_bool_literal: true, ..Expr::literal_int(value as i64) }
    }

    pub fn literal_null() -> Self {
        Expr::new(ExprType::LiteralNull)
    }

    pub fn star(table: Option<String>) -> Self {
        Expr { table, ..Expr::new(ExprType::Star) }
    }

    /// Placeholder; `index` is its 0-based position in the statement.
    pub fn parameter(index: i64) -> Self {
        Expr { ival: index, ..Expr::new(ExprType::Parameter) }
    }

    pub fn column_ref(name: impl Into<String>, table: Option<String>) -> Self {
        Expr { name: Some(name.into()), table, ..Expr::new(ExprType::ColumnRef) }
    }

    pub fn function_ref(name: impl Into<String>, args: Vec<Expr>, distinct: bool) -> Self {
        Expr { name: Some(name.into()), expr_list: Some(args), distinct, ..Expr::new(ExprType::FunctionRef) }
    }

    fn operator(op_type: OperatorType) -> Self {
        Expr { op_type, ..Expr::new(ExprType::Operator) }
    }

    pub fn unary(op_type: OperatorType, expr: Expr) -> Self {
        Expr { expr: Some(Box::new(expr)), ..Expr::operator(op_type) }
    }

    pub fn binary(op_type: OperatorType, left: Expr, right: Expr) -> Self {
        Expr { expr: Some(Box::new(left)), expr2: Some(Box::new(right)), ..Expr::operator(op_type) }
    }

    pub fn between(expr: Expr, low: Expr, high: Expr) -> Self {
        Expr { expr: Some(Box::new(expr)), expr_list: Some(vec![low, high]), ..Expr::operator(OperatorType::Between) }
    }

    pub fn in_list(expr: Expr, list: Vec<Expr>) -> Self {
        Expr { expr: Some(Box::new(expr)), expr_list: Some(list), ..Expr::operator(OperatorType::In) }
    }

    /// `expr IN (subquery)`: the right-hand side is a subquery expression.
    pub fn in_select(expr: Expr, select: SelectStatement) -> Self {
        Expr::binary(OperatorType::In, expr, Expr::subquery(select))
    }

    pub fn exists(select: SelectStatement) -> Self {
        Expr { select: Some(Box::new(select)), ..Expr::operator(OperatorType::Exists) }
    }

    pub fn case(operand: Option<Expr>, whens: Vec<Expr>, else_result: Option<Expr>) -> Self {
        Expr {
            expr: operand.map(Box::new),
            expr2: else_result.map(Box::new),
            expr_list: Some(whens),
            ..Expr::operator(OperatorType::Case)
        }
    }

    pub fn case_when(when: Expr, then: Expr) -> Self {
        Expr::binary(OperatorType::CaseListElement, when, then)
    }

    pub fn subquery(select: SelectStatement) -> Self {
        Expr { select: Some(Box::new(select)), ..Expr::new(ExprType::Select) }
    }

    pub fn array(items: Vec<Expr>) -> Self {
        Expr { expr_list: Some(items), ..Expr::new(ExprType::Array) }
    }

    pub fn array_index(expr: Expr, index: i64) -> Self {
        Expr { expr: Some(Box::new(expr)), ival: index, ..Expr::new(ExprType::ArrayIndex) }
    }

    pub fn extract(field: DatetimeField, expr: Expr) -> Self {
        Expr {
            name: Some("EXTRACT".to_string()),
            expr: Some(Box::new(expr)),
            datetime_field: field,
            ..Expr::new(ExprType::FunctionRef)
        }
    }

    pub fn datetime_field(field: DatetimeField) -> Self {
        Expr { datetime_field: field, ..Expr::new(ExprType::DatetimeField) }
    }

    pub fn hint(name: impl Into<String>, args: Option<Vec<Expr>>) -> Self {
        Expr { name: Some(name.into()), expr_list: args, ..Expr::new(ExprType::Hint) }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn is_operator(&self, op_type: OperatorType) -> bool {
        self.kind == ExprType::Operator && self.op_type == op_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_base_picks_variant() {
        let select = Statement::from_base(StatementBase::new(StatementType::Select));
        assert_eq!(select.as_select(), Some(&SelectStatement::new()));

        let insert = Statement::from_base(StatementBase { string_length: 12, ..StatementBase::new(StatementType::Insert) });
        assert!(matches!(insert, Statement::Insert(_)));
        assert_eq!(insert.base().string_length, 12);

        let drop = Statement::from_base(StatementBase::new(StatementType::Drop));
        assert_eq!(drop, Statement::Other(StatementBase::new(StatementType::Drop)));
    }

    #[test]
    fn test_constructors_leave_inactive_fields_empty() {
        let in_select = Expr::in_select(Expr::column_ref("x", None), SelectStatement::new());
        assert!(in_select.is_operator(OperatorType::In));
        assert!(in_select.expr_list.is_none());
        assert!(in_select.select.is_none());
        assert_eq!(in_select.expr2.as_ref().map(|e| e.kind), Some(ExprType::Select));

        let flag = Expr::literal_bool(true);
        assert_eq!(flag.kind, ExprType::LiteralInt);
        assert_eq!(flag.ival, 1);
        assert!(flag.is_bool_literal);
    }

    #[test]
    fn test_invalid_result_has_no_statements() {
        let result = ParseResult::Invalid(SyntaxError { message: "boom".into(), line: 1, column: 7 });
        assert!(!result.is_valid());
        assert!(result.statements().is_empty());
        assert_eq!(result.error().map(|e| e.column), Some(7));
        assert_eq!(result.into_statements(), Err(crate::Error::Parse("boom at line 1, column 7".into())));
    }

    #[test]
    fn test_to_json() {
        let result = ParseResult::Valid(vec![Statement::from_base(StatementBase::new(StatementType::Show))]);
        let json = result.to_json().unwrap();
        assert!(json.contains("\"Show\""));
        let back: ParseResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
