use std::fmt;
use std::ptr::NonNull;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::{Parser, ParserError};

use crate::ast::convert::Lowering;
use crate::ast::{ParseResult, SyntaxError};
use crate::bindings_raw::SqlParserResult;
use crate::raw_copy::Copier;
use crate::raw_marshal::Stack;
use crate::raw_read::read_parse_result;
use crate::raw_release::release_parse_result;
use crate::split::split;
use crate::Result;

/// Tuning for a parse call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Maximum nesting depth the SQL parser accepts
    pub recursion_limit: usize,
    /// Remaining stack, in bytes, below which a recursive step moves to a new segment
    pub stack_red_zone: usize,
    /// Size, in bytes, of each new stack segment
    pub stack_size: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions { recursion_limit: 50, stack_red_zone: Stack::DEFAULT.red_zone, stack_size: Stack::DEFAULT.size }
    }
}

impl ParseOptions {
    /// Reads options from JSON. Missing fields keep their defaults.
    ///
    /// # Example
    ///
    /// ```rust
    /// let options = sql_mirror::ParseOptions::from_json(r#"{ "recursion_limit": 200 }"#).unwrap();
    /// assert_eq!(options.recursion_limit, 200);
    /// assert_eq!(options.stack_size, sql_mirror::ParseOptions::default().stack_size);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn stack(&self) -> Stack {
        Stack { red_zone: self.stack_red_zone, size: self.stack_size }
    }
}

/// Owned mirror of one parse call.
///
/// The tree behind it is laid out as `include/sql_mirror.h` describes and is
/// released when the handle drops. [`MirrorResult::into_raw`] hands the tree to
/// a foreign owner, who must give it back through [`release_raw`].
pub struct MirrorResult {
    raw: NonNull<SqlParserResult>,
}

// The handle owns its tree exclusively and nothing in the tree is shared.
unsafe impl Send for MirrorResult {}

impl MirrorResult {
    fn from_ast(result: &ParseResult, stack: Stack) -> Self {
        let raw = Copier::new(stack).copy_parse_result(result);
        // Safety: the copier returns a fresh heap allocation, never null.
        MirrorResult { raw: unsafe { NonNull::new_unchecked(raw) } }
    }

    /// Builds an invalid result carrying only an error descriptor.
    pub(crate) fn invalid(message: impl Into<String>, line: i32, column: i32) -> Self {
        let result = ParseResult::Invalid(SyntaxError { message: message.into(), line, column });
        MirrorResult::from_ast(&result, Stack::DEFAULT)
    }

    pub fn is_valid(&self) -> bool {
        self.raw().isValid
    }

    pub fn statement_count(&self) -> usize {
        self.raw().statementCount
    }

    /// Borrow the mirror tree.
    pub fn raw(&self) -> &SqlParserResult {
        // Safety: `raw` is live for as long as the handle is.
        unsafe { self.raw.as_ref() }
    }

    pub fn as_ptr(&self) -> *const SqlParserResult {
        self.raw.as_ptr()
    }

    /// Gives up ownership of the tree without releasing it.
    pub fn into_raw(self) -> *mut SqlParserResult {
        let raw = self.raw.as_ptr();
        std::mem::forget(self);
        raw
    }

    /// Takes back ownership of a tree returned by [`MirrorResult::into_raw`].
    ///
    /// # Safety
    /// `ptr` must be null or come from `into_raw` and not have been released.
    pub unsafe fn from_raw(ptr: *mut SqlParserResult) -> Option<Self> {
        NonNull::new(ptr).map(|raw| MirrorResult { raw })
    }

    /// Reads the mirror back into an owned source tree.
    pub fn to_ast(&self) -> Result<ParseResult> {
        // Safety: the handle owns a live tree built by the copier.
        unsafe { read_parse_result(self.raw.as_ptr()) }
    }
}

impl Drop for MirrorResult {
    fn drop(&mut self) {
        // Safety: the handle is the tree's only owner.
        unsafe { release_parse_result(self.raw.as_ptr()) }
    }
}

impl fmt::Debug for MirrorResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorResult").field("raw", self.raw()).finish()
    }
}

/// Parses the given SQL and returns an owned mirror of the result.
///
/// This never fails: invalid SQL yields a result whose `isValid` is false and
/// which carries the error message and location.
///
/// # Example
///
/// ```rust
/// let result = sql_mirror::parse("SELECT a FROM t WHERE a > 1;");
/// assert!(result.is_valid());
/// assert_eq!(result.statement_count(), 1);
/// ```
pub fn parse(sql: &str) -> MirrorResult {
    parse_with_options(sql, &ParseOptions::default())
}

pub fn parse_with_options(sql: &str, options: &ParseOptions) -> MirrorResult {
    let ast = parse_to_ast_with_options(sql, options);
    let result = MirrorResult::from_ast(&ast, options.stack());
    debug!("mirrored parse result: valid={}, statements={}", result.is_valid(), result.statement_count());
    result
}

/// Releases a mirror. Equivalent to dropping it.
pub fn release(result: MirrorResult) {
    drop(result)
}

/// Releases a tree handed out by [`MirrorResult::into_raw`] or the C entry
/// point. Null is a no-op.
///
/// # Safety
/// `ptr` must not be used again afterwards. Releasing the same tree twice is
/// undefined behaviour.
pub unsafe fn release_raw(ptr: *mut SqlParserResult) {
    release_parse_result(ptr)
}

/// Parses the given SQL into an owned source tree without building a mirror.
///
/// # Example
///
/// ```rust
/// use sql_mirror::ast::{ParseResult, Statement, TableRef};
///
/// let result = sql_mirror::parse_to_ast("SELECT * FROM users");
/// let ParseResult::Valid(statements) = result else { panic!() };
/// let Statement::Select(select) = &statements[0] else { panic!() };
/// assert_eq!(select.from_table.as_deref(), Some(&TableRef::named(None, "users")));
/// ```
pub fn parse_to_ast(sql: &str) -> ParseResult {
    parse_to_ast_with_options(sql, &ParseOptions::default())
}

pub fn parse_to_ast_with_options(sql: &str, options: &ParseOptions) -> ParseResult {
    debug!("parsing {} bytes of SQL", sql.len());
    let dialect = GenericDialect {};
    let parsed = options.stack().grow(|| {
        Parser::new(&dialect)
            .with_recursion_limit(options.recursion_limit)
            .try_with_sql(sql)
            .and_then(|mut parser| parser.parse_statements())
    });
    let statements = match parsed {
        Ok(statements) => statements,
        Err(err) => return ParseResult::Invalid(parser_error(sql, &err)),
    };

    let spans = match split(sql) {
        Ok(spans) if spans.len() == statements.len() => spans,
        Ok(spans) => {
            warn!("found {} statement spans for {} statements, lengths are left at zero", spans.len(), statements.len());
            Vec::new()
        }
        Err(err) => {
            warn!("{}, lengths are left at zero", err);
            Vec::new()
        }
    };

    let mut lowering = Lowering::new(options.stack());
    let mut lowered = Vec::with_capacity(statements.len());
    for (i, statement) in statements.iter().enumerate() {
        let span = spans.get(i);
        match lowering.lower_statement(statement) {
            Ok(mut statement) => {
                statement.base_mut().string_length = span.map(|span| span.len).unwrap_or_default();
                lowered.push(statement);
            }
            Err(err) => {
                let (line, column) = span.map(|span| (span.line as i32, span.column as i32)).unwrap_or((1, 1));
                return ParseResult::Invalid(SyntaxError { message: err.to_string(), line, column });
            }
        }
    }
    ParseResult::Valid(lowered)
}

/// Builds the error descriptor for a tokenizer or parser failure. Errors that
/// carry no location point just past the end of the input.
fn parser_error(sql: &str, err: &ParserError) -> SyntaxError {
    let message = err.to_string();
    let (line, column) = error_location(&message).unwrap_or_else(|| end_of_input(sql));
    SyntaxError { message, line, column }
}

/// `Line: L, Column: C` as sqlparser appends it to tokenizer and parser errors.
static ERROR_LOCATION: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"Line: (\d+), Column:? (\d+)").ok());

fn error_location(message: &str) -> Option<(i32, i32)> {
    let captures = ERROR_LOCATION.as_ref()?.captures(message)?;
    let line = captures.get(1)?.as_str().parse().ok()?;
    let column = captures.get(2)?.as_str().parse().ok()?;
    Some((line, column))
}

fn end_of_input(sql: &str) -> (i32, i32) {
    let line = sql.matches('\n').count() + 1;
    let last_line = sql.rsplit('\n').next().unwrap_or_default();
    (line as i32, last_line.chars().count() as i32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::raw_ledger;

    #[test]
    fn test_error_location_from_message() {
        assert!(ERROR_LOCATION.is_some());
        assert_eq!(error_location("sql parser error: Expected ), found: x at Line: 2, Column 14"), Some((2, 14)));
        assert_eq!(error_location("Unterminated string literal at Line: 1, Column: 8"), Some((1, 8)));
        assert_eq!(error_location("sql parser error: Expected an expression:, found: EOF"), None);
    }

    #[test]
    fn test_end_of_input() {
        assert_eq!(end_of_input("SELECT"), (1, 7));
        assert_eq!(end_of_input("SELECT\n  a +"), (2, 6));
        assert_eq!(end_of_input(""), (1, 1));
    }

    #[test]
    fn test_parse_incomplete_select() {
        let result = parse("SELECT");
        assert!(!result.is_valid());
        assert_eq!(result.statement_count(), 0);
        assert!(result.raw().statements.is_null());
        let ast = result.to_ast().unwrap();
        let error = ast.error().unwrap();
        assert!(!error.message.is_empty());
        assert!(error.line > 0 && error.column > 0);
    }

    #[test]
    fn test_parse_empty_input() {
        let result = parse("");
        assert!(result.is_valid());
        assert_eq!(result.statement_count(), 0);
        assert!(!result.raw().statements.is_null());
        assert_eq!(result.to_ast(), Ok(ParseResult::Valid(vec![])));
    }

    #[test]
    fn test_unsupported_statement_location() {
        let result = parse_to_ast("SELECT 1;\n  EXPLAIN SELECT 2");
        assert_eq!(
            result,
            ParseResult::Invalid(SyntaxError {
                message: "Unsupported construct: EXPLAIN statement".into(),
                line: 2,
                column: 3,
            })
        );
    }

    #[test]
    fn test_string_length_from_span() {
        let result = parse_to_ast("  SELECT a FROM t;  DROP TABLE t ; ");
        let lengths: Vec<_> = result.statements().iter().map(|s| s.base().string_length).collect();
        assert_eq!(lengths, vec![15, 12]);
        assert_eq!(result.statements()[1].kind(), StatementType::Drop);
    }

    #[test]
    fn test_recursion_limit() {
        let sql = format!("SELECT {}1{}", "(".repeat(20), ")".repeat(20));
        let options = ParseOptions { recursion_limit: 5, ..ParseOptions::default() };
        assert!(!parse_with_options(&sql, &options).is_valid());
        assert!(parse(&sql).is_valid());
    }

    #[test]
    fn test_options_from_json() {
        let options = ParseOptions::from_json(r#"{"stack_size": 4194304}"#).unwrap();
        assert_eq!(options, ParseOptions { stack_size: 4 * 1024 * 1024, ..ParseOptions::default() });
        assert!(matches!(ParseOptions::from_json("{"), Err(crate::Error::InvalidJson(_))));
    }

    #[test]
    fn test_into_raw_and_release_raw() {
        let ((), report) = raw_ledger::track(|| {
            let raw = parse("SELECT a FROM t").into_raw();
            let result = unsafe { MirrorResult::from_raw(raw) }.unwrap();
            assert!(result.is_valid());
            unsafe { release_raw(result.into_raw()) };
        });
        assert!(report.is_balanced(), "{report:?}");
    }
}
