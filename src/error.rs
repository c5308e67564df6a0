//! Error handling for the catalogue core.
//!
//! Component boundaries (planner, executor, gatekeeper) surface
//! `CatalogueError` values carrying the stable machine-readable codes that
//! compliance consumers key on. Store implementations wrap their internal
//! failures in `StoreError` and are translated at the boundary.

use thiserror::Error;

/// Main error type for the catalogue pipeline.
///
/// Every variant maps to exactly one stable code via [`CatalogueError::code`].
#[derive(Error, Debug)]
pub enum CatalogueError {
    #[error("validation failed for {subject}: {reason}")]
    Validation { subject: String, reason: String },

    #[error("slug conflict for '{slug}': {reason}")]
    SlugConflict { slug: String, reason: String },

    #[error("unsupported data type '{value}' for field '{field}'")]
    UnsupportedType { field: String, value: String },

    #[error("schema update failed: {message}")]
    DdlFailure { message: String },

    #[error("schema update already in flight for scope '{scope}'")]
    ScopeConflict { scope: String },

    #[error("write to '{table}' refused: {reason}")]
    RlsViolation { table: String, reason: String },

    #[error("unexpected failure: {message}")]
    Unknown { message: String },
}

impl CatalogueError {
    /// Stable code string, shared across all components and audit payloads.
    pub fn code(&self) -> &'static str {
        match self {
            CatalogueError::Validation { .. } => "VALIDATION_ERROR",
            CatalogueError::SlugConflict { .. } => "CONFLICT_SLUG",
            CatalogueError::UnsupportedType { .. } => "UNSUPPORTED_TYPE",
            CatalogueError::DdlFailure { .. } => "DDL_FAILURE",
            CatalogueError::ScopeConflict { .. } => "DDL_FAILURE",
            CatalogueError::RlsViolation { .. } => "RLS_VIOLATION",
            CatalogueError::Unknown { .. } => "UNKNOWN_ERROR",
        }
    }

    pub fn validation(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        CatalogueError::Validation {
            subject: subject.into(),
            reason: reason.into(),
        }
    }
}

/// Store-level failure. Never crosses a component boundary directly.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("schema action failed on '{table}': {message}")]
    Schema { table: String, message: String },

    #[error("rule set version {version} already exists for scope '{scope}'")]
    VersionConflict { scope: String, version: i64 },

    #[error("row insert failed on '{table}': {message}")]
    Insert { table: String, message: String },

    #[error("audit append failed: {message}")]
    Audit { message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CatalogueResult<T> = Result<T, CatalogueError>;
pub type StoreResult<T> = Result<T, StoreError>;
