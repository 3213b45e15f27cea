//! Operation-level contract for front ends.
//!
//! Every response is plain data with a `serde` representation (camelCase
//! keys, decimals as strings), independent of any transport.

use crate::balance::AccountBalance;
use crate::diagnostics::Diagnostic;
use crate::error::StoreError;
use crate::model::*;
use crate::semantic::ParseResult;
use crate::serializer::{Serializer, SerializerSettings};
use crate::store::{ImportOutcome, ImportStats, LedgerStore, ManualTransactionInput, YearMonth};
use chrono::Local;
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingView {
    pub account: String,
    pub amount: Decimal,
    pub commodity: String,
    /// Cost, price and tag text of the posting, as it would be written.
    pub remainder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub datetime: String,
    pub status: Option<char>,
    pub payee: Option<String>,
    pub narration: Option<String>,
    /// Tags as written after `;`, e.g. `txn:01J2N9R9, src:binance:order:999`.
    pub meta: String,
    pub postings: Vec<PostingView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResponse {
    pub ok: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub transactions: Vec<TransactionView>,
    pub balances: Vec<AccountBalance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub stats: ImportStats,
    pub parse: ParseResponse,
}

fn join<T: Serializer>(items: &[T], separator: &str, settings: &SerializerSettings) -> String {
    items
        .iter()
        .map(|item| item.to_string_pretty(settings))
        .collect::<Vec<_>>()
        .join(separator)
}

impl From<&Posting> for PostingView {
    fn from(posting: &Posting) -> Self {
        let settings = SerializerSettings::default();
        let mut parts = Vec::new();
        if let Some(ref cost) = posting.cost {
            parts.push(cost.to_string_pretty(&settings));
        }
        if let Some(ref price) = posting.price {
            parts.push(price.to_string_pretty(&settings));
        }
        if !posting.meta.is_empty() {
            parts.push(format!("; {}", join(&posting.meta, ", ", &settings)));
        }

        PostingView {
            account: posting.account.clone(),
            amount: posting.amount.quantity,
            commodity: posting.amount.commodity.clone(),
            remainder: if parts.is_empty() {
                None
            } else {
                Some(parts.join(" "))
            },
        }
    }
}

impl From<&Transaction> for TransactionView {
    fn from(transaction: &Transaction) -> Self {
        TransactionView {
            date: transaction.datetime.display_date(),
            datetime: transaction.datetime.to_string(),
            status: transaction.status.map(|status| status.as_char()),
            payee: transaction.payee.clone(),
            narration: transaction.narration.clone(),
            meta: join(&transaction.meta, ", ", &SerializerSettings::default()),
            postings: transaction.postings.iter().map(PostingView::from).collect(),
        }
    }
}

impl From<ParseResult> for ParseResponse {
    fn from(result: ParseResult) -> Self {
        ParseResponse {
            ok: result.ok,
            diagnostics: result.diagnostics,
            transactions: result
                .ledger
                .transactions
                .iter()
                .map(TransactionView::from)
                .collect(),
            balances: result.balances,
        }
    }
}

impl From<ImportOutcome> for ImportResponse {
    fn from(outcome: ImportOutcome) -> Self {
        ImportResponse {
            stats: outcome.stats,
            parse: outcome.parse.into(),
        }
    }
}

/// Parses one `.transactions` file on its own.
pub fn parse(path: impl AsRef<Path>) -> Result<ParseResponse, StoreError> {
    Ok(crate::parse_file(path)?.into())
}

pub fn load_generated_ledger(
    store: &LedgerStore,
    current: YearMonth,
) -> Result<ParseResponse, StoreError> {
    Ok(store.load(current)?.into())
}

pub fn import_generated_sources<P>(
    store: &LedgerStore,
    current: YearMonth,
    paths: &[P],
) -> Result<ImportResponse, StoreError>
where
    P: AsRef<Path>,
{
    Ok(store.import_sources(paths, current)?.into())
}

pub fn add_manual_to_generated_ledger(
    store: &LedgerStore,
    current: YearMonth,
    input: &ManualTransactionInput,
) -> Result<ParseResponse, StoreError> {
    Ok(store.add_manual(input, current)?.into())
}

/// The opening transaction, if any, is dated today.
pub fn add_account_to_generated_ledger(
    store: &LedgerStore,
    current: YearMonth,
    account_name: &str,
    currency: Option<&str>,
    opening_balance: Option<&str>,
) -> Result<ParseResponse, StoreError> {
    let today = Local::now().date_naive();
    Ok(store
        .add_account(account_name, currency, opening_balance, today, current)?
        .into())
}

pub fn rotate_generated_ledger(store: &LedgerStore, current: YearMonth) -> Result<(), StoreError> {
    store.rotate(current)?;
    Ok(())
}
