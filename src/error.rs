use thiserror::Error;

/// Errors surfaced by the ledger, the record stores and the catalogs.
///
/// `Validation` and `Lookup` are always raised before anything is written,
/// so a caller receiving either one can retry without cleaning up.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("lookup error: {0}")]
    Lookup(String),

    #[error("external service error: {0}")]
    ExternalService(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("parse error: {0}")]
    Parse(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        LedgerError::Validation(msg.into())
    }

    pub fn lookup(msg: impl Into<String>) -> Self {
        LedgerError::Lookup(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
