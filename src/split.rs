//! Splits query text into per-statement spans.

use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Location, Token, Tokenizer};

use crate::{Error, Result};

/// Source span of one statement. Offsets and lengths count characters, line and
/// column are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementSpan {
    pub start: usize,
    pub len: usize,
    pub line: u64,
    pub column: u64,
}

impl StatementSpan {
    /// The statement's text within `sql`.
    pub fn text<'a>(&self, sql: &'a str) -> &'a str {
        let mut chars = sql.char_indices().map(|(i, _)| i).chain(std::iter::once(sql.len()));
        let begin = chars.nth(self.start).unwrap_or(sql.len());
        let end = if self.len == 0 { Some(begin) } else { chars.nth(self.len - 1) };
        &sql[begin..end.unwrap_or(sql.len())]
    }
}

/// Character offset of the first character of every line.
struct LineIndex {
    starts: Vec<usize>,
    total: usize,
}

impl LineIndex {
    fn new(sql: &str) -> Self {
        let mut starts = vec![0];
        let mut total = 0;
        for c in sql.chars() {
            total += 1;
            if c == '\n' {
                starts.push(total);
            }
        }
        LineIndex { starts, total }
    }

    fn offset(&self, location: &Location) -> usize {
        let line = (location.line as usize).saturating_sub(1);
        let column = (location.column as usize).saturating_sub(1);
        match self.starts.get(line) {
            Some(start) => (start + column).min(self.total),
            None => self.total,
        }
    }
}

/// Returns the span of every non-empty statement in `sql`, in order. Leading
/// and trailing whitespace and comments are not part of a span.
///
/// # Example
///
/// ```rust
/// let spans = sql_mirror::split("SELECT 1; SELECT 2").unwrap();
/// assert_eq!(spans.len(), 2);
/// assert_eq!(spans[1].start, 10);
/// ```
pub fn split(sql: &str) -> Result<Vec<StatementSpan>> {
    let dialect = GenericDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .tokenize_with_location()
        .map_err(|err| Error::Split(err.to_string()))?;
    let index = LineIndex::new(sql);
    let offset_of = |i: usize| tokens.get(i).map(|t| index.offset(&t.location)).unwrap_or(index.total);

    let mut spans = Vec::new();
    // (first significant token, end offset of the last one)
    let mut current: Option<(usize, usize)> = None;

    let mut close = |current: Option<(usize, usize)>| {
        if let Some((first, end)) = current {
            let start = offset_of(first);
            let location = &tokens[first].location;
            spans.push(StatementSpan { start, len: end - start, line: location.line, column: location.column });
        }
    };

    for (i, token) in tokens.iter().enumerate() {
        match token.token {
            Token::SemiColon => close(current.take()),
            Token::Whitespace(_) | Token::EOF => {}
            _ => {
                let end = offset_of(i + 1);
                current = Some(match current {
                    Some((first, _)) => (first, end),
                    None => (i, end),
                });
            }
        }
    }
    close(current);

    Ok(spans)
}
