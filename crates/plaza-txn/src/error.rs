//! # Workflow Error Types
//!
//! One error type spanning both error sources a workflow can hit: domain
//! rules (plaza-core) and storage (plaza-db). Callers match on the source
//! to map HTTP statuses.

use plaza_core::CoreError;
use plaza_db::DbError;
use thiserror::Error;

/// Errors from sale and return workflows.
#[derive(Debug, Error)]
pub enum TxnError {
    /// Domain rule violation (not found, over-return, bad transition, ...).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failure or storage-level guard refusal.
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Result type for workflow operations.
pub type TxnResult<T> = Result<T, TxnError>;
