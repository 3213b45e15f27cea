use crate::diagnostics::Diagnostic;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a ledger store operation. Problems inside ledger text are
/// reported as diagnostics instead.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read source file {path}: {source}")]
    ReadSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot replace {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid month {0:?}, expected YYYYMM")]
    InvalidMonth(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transaction does not parse: {}", first_message(.0))]
    InvalidTransaction(Vec<Diagnostic>),

    #[error("transaction id {0} already exists")]
    DuplicateId(String),

    #[error(transparent)]
    Balance(#[from] BalanceError),
}

/// A running total that no longer fits a [`rust_decimal::Decimal`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalanceError {
    #[error("balance of {account} in {commodity} overflows at {datetime}")]
    Overflow {
        account: String,
        commodity: String,
        datetime: String,
    },
}

fn first_message(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .find(|d| d.is_error())
        .map(|d| d.to_string())
        .unwrap_or_default()
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> StoreError {
        let path = path.into();
        move |source| StoreError::Io { path, source }
    }
}
