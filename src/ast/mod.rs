mod model;
pub use self::model::*;

mod parser;
pub use self::parser::parse_tokens;

use crate::diagnostics::Diagnostic;
use crate::lexer::tokenize;

/// Parses `.transactions` source to a syntax tree.
///
/// Malformed lines are reported as diagnostics and skipped; the rest of the
/// file is still parsed.
///
/// # Examples
///
/// ```rust
/// let (file, diagnostics) = txn_ledger::ast::parse(r#"2026-01-15 * "Binance" "Buy SOL" ; txn:01J2N9R9
///     assets:exchange:binance:sol    10.000000 SOL {{ 230.00 USD }}
///     assets:cash:usd              -230.00 USD
/// "#);
/// assert!(diagnostics.is_empty());
/// assert_eq!(file.transactions().count(), 1);
/// ```
pub fn parse(input: &str) -> (File, Vec<Diagnostic>) {
    parse_tokens(tokenize(input))
}
