//! Owned source tree for parsed SQL.
//!
//! This is the tree the lowering builds from `sqlparser`'s AST and the copier
//! reads to build a mirror. It is also what [`crate::MirrorResult::to_ast`]
//! rebuilds from a mirror, so the two can be compared directly.
//!
//! # Example
//!
//! ```rust
//! use sql_mirror::ast::{OperatorType, Statement};
//!
//! let result = sql_mirror::parse_to_ast("SELECT a FROM t WHERE a > 1");
//! for statement in result.statements() {
//!     if let Statement::Select(select) = statement {
//!         let condition = select.where_clause.as_deref().unwrap();
//!         assert!(condition.is_operator(OperatorType::Greater));
//!     }
//! }
//! ```

pub(crate) mod convert;
mod kinds;
mod nodes;

pub use kinds::*;
pub use nodes::*;
