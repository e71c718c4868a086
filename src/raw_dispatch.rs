//! Per-statement routing between the copier, the releaser and the reader.
//!
//! Only SELECT has a specialised routine. Every other kind, including tags
//! this crate does not know, goes through the base-only routine.

use std::borrow::Cow;
use std::os::raw::c_uint;

use log::trace;

use crate::ast::{SelectStatement, Statement, StatementType};
use crate::bindings_raw::{SqlSelectStatement, SqlStatement};
use crate::raw_copy::Copier;
use crate::raw_marshal::{alloc_node, free_node};
use crate::raw_read;
use crate::raw_release::{release_base, release_select};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatementRoutine {
    /// The statement pointer addresses a full `SqlSelectStatement`.
    Select,
    /// The statement pointer addresses a bare `SqlStatement`.
    BaseOnly,
}

impl StatementRoutine {
    pub(crate) fn for_kind(kind: StatementType) -> Self {
        match kind {
            StatementType::Select => StatementRoutine::Select,
            other => {
                trace!("statement kind {:?} is mirrored through its base only", other);
                StatementRoutine::BaseOnly
            }
        }
    }

    pub(crate) fn for_tag(tag: c_uint) -> Self {
        match StatementType::from_ordinal(tag) {
            Some(kind) => Self::for_kind(kind),
            None => {
                trace!("unknown statement tag {}, using the base-only routine", tag);
                StatementRoutine::BaseOnly
            }
        }
    }
}

/// Copies one statement. A SELECT-tagged statement always becomes a full
/// select node, with an empty payload when the source carries none.
pub(crate) fn copy_statement(copier: &Copier, statement: &Statement) -> *mut SqlStatement {
    match StatementRoutine::for_kind(statement.kind()) {
        StatementRoutine::Select => {
            let select = match statement {
                Statement::Select(select) => Cow::Borrowed(&**select),
                other => Cow::Owned(SelectStatement { base: other.base().clone(), ..SelectStatement::new() }),
            };
            copier.copy_select(Some(&*select)) as *mut SqlStatement
        }
        StatementRoutine::BaseOnly => alloc_node(copier.copy_base(statement.base())),
    }
}

/// # Safety
/// `ptr` must be null or a live statement produced by [`copy_statement`].
pub(crate) unsafe fn release_statement(ptr: *mut SqlStatement) {
    if ptr.is_null() {
        return;
    }
    match StatementRoutine::for_tag((*ptr).type_) {
        StatementRoutine::Select => release_select(ptr as *mut SqlSelectStatement),
        StatementRoutine::BaseOnly => {
            release_base(&*ptr);
            free_node(ptr);
        }
    }
}

/// # Safety
/// `ptr` must be null or a live statement produced by [`copy_statement`].
pub(crate) unsafe fn read_statement(ptr: *const SqlStatement) -> Result<Option<Statement>> {
    if ptr.is_null() {
        return Ok(None);
    }
    let statement = match StatementRoutine::for_tag((*ptr).type_) {
        StatementRoutine::Select => {
            raw_read::read_select(ptr as *const SqlSelectStatement)?.map(|select| Statement::Select(Box::new(select)))
        }
        StatementRoutine::BaseOnly => Some(Statement::from_base(raw_read::read_base(&*ptr)?)),
    };
    Ok(statement)
}
