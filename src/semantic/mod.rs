mod from_ast;
pub use self::from_ast::*;

mod index;
pub use self::index::*;

use crate::ast;
use crate::balance::{compute_balances, AccountBalance};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::model::{Ledger, Transaction};

///
/// Outcome of parsing and validating ledger text.
///
/// Whatever did build is always returned, next to the diagnostics. `ok` is
/// `false` exactly when one of the diagnostics is an error.
///
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct ParseResult {
    pub ok: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub ledger: Ledger,
    pub balances: Vec<AccountBalance>,
}

impl ParseResult {
    pub fn new(ledger: Ledger, diagnostics: Vec<Diagnostic>, balances: Vec<AccountBalance>) -> Self {
        ParseResult {
            ok: !diagnostics.iter().any(Diagnostic::is_error),
            diagnostics,
            ledger,
            balances,
        }
    }

    /// Balances are folded over `ledger` alone. An overflowing total becomes
    /// an error diagnostic and leaves `balances` empty.
    pub fn from_ledger(ledger: Ledger, mut diagnostics: Vec<Diagnostic>) -> Self {
        let balances = match compute_balances(&ledger.transactions) {
            Ok(balances) => balances,
            Err(e) => {
                diagnostics.push(Diagnostic::error(1, 1, e.to_string()));
                Vec::new()
            }
        };
        ParseResult::new(ledger, diagnostics, balances)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }
}

/// Parses and validates `text`, labelled `source`, against `index`.
///
/// Grammar and semantic diagnostics are merged in position order.
pub fn parse_source(text: &str, source: &str, index: &mut TxnIndex) -> (Ledger, Vec<Diagnostic>) {
    let (file, grammar) = ast::parse(text);
    let (ledger, semantic) = Builder::new(source, index).build(&file);

    let mut diagnostics = Diagnostics::new();
    diagnostics.extend(grammar);
    diagnostics.extend(semantic);

    log::debug!(
        "parsed {}: {} transactions, {} diagnostics",
        if source.is_empty() { "<text>" } else { source },
        ledger.transactions.len(),
        diagnostics.len()
    );

    (ledger, diagnostics.into_sorted())
}

/// Transactions of a source file that can be copied as they are.
#[derive(Debug, Clone, Default)]
pub struct CleanTransactions {
    pub transactions: Vec<Transaction>,
    /// Transactions left out because one of their lines has an error.
    pub rejected: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parses `text` for copying into another ledger.
///
/// `txn:` ids are not checked. A transaction is kept only when no error
/// diagnostic falls between its header and its last line, so a posting that
/// failed to build never disappears from a copy unnoticed.
pub fn parse_clean_transactions(text: &str, source: &str) -> CleanTransactions {
    let (file, grammar) = ast::parse(text);
    let mut index = TxnIndex::new();
    let (built, semantic) = Builder::new(source, &mut index)
        .without_ids()
        .build_nodes(&file);

    let mut diagnostics = Diagnostics::new();
    diagnostics.extend(grammar);
    diagnostics.extend(semantic);
    let diagnostics = diagnostics.into_sorted();

    let total = file.transactions().count();
    let transactions: Vec<Transaction> = built
        .into_iter()
        .filter(|(node, _)| {
            !diagnostics
                .iter()
                .any(|d| d.is_error() && d.line >= node.line && d.line <= node.end_line)
        })
        .map(|(_, transaction)| transaction)
        .collect();

    CleanTransactions {
        rejected: total - transactions.len(),
        transactions,
        diagnostics,
    }
}
