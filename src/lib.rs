//! Parses SQL and hands back an independently owned, C-compatible mirror of the
//! parse tree.
//!
//! The SQL itself is parsed by `sqlparser`. Its AST is lowered into the owned
//! tree in [`ast`], deep-copied into the `#[repr(C)]` structs in
//! [`bindings_raw`], and dropped. The mirror shares nothing with the parser and
//! lives until it is released.
//!
//! # Example
//!
//! ```rust
//! let result = sql_mirror::parse("SELECT a FROM t WHERE a > 1;");
//! assert!(result.is_valid());
//!
//! let ast = result.to_ast().unwrap();
//! assert_eq!(ast, sql_mirror::parse_to_ast("SELECT a FROM t WHERE a > 1;"));
//!
//! sql_mirror::release(result);
//! ```

pub mod ast;
pub mod bindings_raw;
mod error;
pub mod ffi;
mod query;
mod raw_copy;
mod raw_dispatch;
#[cfg(any(test, feature = "alloc-ledger"))]
pub mod raw_ledger;
mod raw_marshal;
mod raw_read;
mod raw_release;
mod split;

pub use error::*;
pub use query::*;
pub use raw_read::read_parse_result;
pub use split::*;
