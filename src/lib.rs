//! Rust library for parsing, validating and maintaining plain-text double-entry
//! `.transactions` ledgers.
//!
//! Supported elements:
//!
//! * Blank lines and comment directives (lines starting with ``;``)
//!
//! * Transaction headers with format:
//!
//!   ```ignore
//!   DATETIME [*|!] [PAYEE] [NARRATION] ; TAG(, TAG)*
//!   ```
//!
//!   ``DATETIME`` is ``YYYY-MM-DD``, optionally followed by ``THH:MM:SS``, 1 to 6
//!   fraction digits and ``Z`` or ``±HH:MM``. Payee and narration are quoted
//!   strings, or unquoted words separated from each other by two spaces.
//!
//! * Transaction postings, indented by exactly four spaces:
//!
//!   ```ignore
//!       ACCOUNT AMOUNT COMMODITY [{ COST } | {{ COST }}] [@ PRICE | @@ PRICE] [; TAG(, TAG)*]
//!   ```
//!
//!   ``COST`` is ``[AMOUNT COMMODITY,] FIELD(, FIELD)*``, every field being
//!   ``key:value`` or a positional amount, number, datetime, quoted note, path
//!   or identifier.
//!
//! * Tags ``key:value`` or bare tokens. ``txn:ID`` identifies a transaction and
//!   must be unique.
//!
//! Amounts are exact decimals; balances never go through floating point.

pub mod api;
pub mod ast;
pub mod balance;
pub mod diagnostics;
mod error;
pub mod lexer;
pub mod semantic;
mod serializer;
pub mod store;

mod common;
mod model;

pub use common::*;
pub use diagnostics::{Diagnostic, Severity};
pub use error::{BalanceError, StoreError};
pub use model::*;
pub use semantic::ParseResult;
pub use serializer::*;

use semantic::TxnIndex;
use std::fs;
use std::path::Path;

/// Parses and validates ledger source.
///
/// # Examples
///
/// ```rust
/// let result = txn_ledger::parse(r#"2026-01-15 * "Binance" "Buy SOL" ; txn:01J2N9R9
///     assets:exchange:binance:sol    10.000000 SOL {{ 230.00 USD }}
///     assets:cash:usd              -230.00 USD
/// "#);
/// assert!(result.ok);
/// assert_eq!(result.ledger.transactions[0].payee.as_deref(), Some("Binance"));
/// ```
pub fn parse(input: &str) -> ParseResult {
    let (ledger, diagnostics) = semantic::parse_source(input, "", &mut TxnIndex::new());
    ParseResult::from_ledger(ledger, diagnostics)
}

/// Reads and parses one `.transactions` file.
pub fn parse_file(path: impl AsRef<Path>) -> Result<ParseResult, StoreError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| StoreError::ReadSource {
        path: path.to_path_buf(),
        source,
    })?;
    let (ledger, diagnostics) =
        semantic::parse_source(&text, &path.display().to_string(), &mut TxnIndex::new());
    Ok(ParseResult::from_ledger(ledger, diagnostics))
}
