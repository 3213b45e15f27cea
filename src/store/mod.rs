//! Append-only ledger store.
//!
//! A store directory holds one active file for the current month and one
//! archive per rotated-out month:
//!
//! ```text
//! <dir>/ledger.transactions
//! <dir>/archive/ledger-YYYYMM.transactions
//! ```
//!
//! Operations on one [`LedgerStore`] are serialized by an internal lock, and
//! every file change is a temporary file renamed over the target.

mod files;
mod manual;
mod month;

pub use self::manual::{ManualPostingInput, ManualTransactionInput};
pub use self::month::{month_directive, recorded_month, YearMonth};

use self::files::{append_block, normalize_blank_lines, read_optional, write_atomic};
use crate::ast;
use crate::balance::compute_balances;
use crate::common::*;
use crate::error::StoreError;
use crate::lexer::{classify, TokenKind};
use crate::model::*;
use crate::semantic::{parse_clean_transactions, parse_source, ParseResult, TxnIndex};
use crate::serializer::{Serializer, SerializerSettings};
use chrono::NaiveDate;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[non_exhaustive]
pub struct StoreSettings {
    ledger_file: String,
    archive_dir: String,
    opening_account: String,
    default_commodity: String,
}

impl StoreSettings {
    pub fn with_ledger_file(mut self, name: &str) -> Self {
        self.ledger_file = name.to_string();
        self
    }

    pub fn with_archive_dir(mut self, name: &str) -> Self {
        self.archive_dir = name.to_string();
        self
    }

    /// Equity account that balances opening transactions.
    pub fn with_opening_account(mut self, account: &str) -> Self {
        self.opening_account = account.to_string();
        self
    }

    /// Commodity of opening balances declared without a currency.
    pub fn with_default_commodity(mut self, commodity: &str) -> Self {
        self.default_commodity = commodity.to_string();
        self
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            ledger_file: "ledger.transactions".to_string(),
            archive_dir: "archive".to_string(),
            opening_account: "equity:opening-balances".to_string(),
            default_commodity: "USD".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStats {
    pub imported: usize,
    pub skipped_duplicates: usize,
    /// Source transactions left out because some of their lines have errors.
    pub rejected: usize,
    /// Transactions moved to an archive by the rotation that ran first.
    pub archived: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub stats: ImportStats,
    pub parse: ParseResult,
}

/// Everything currently on disk, parsed against one shared id index.
struct Corpus {
    history: Vec<Transaction>,
    active_text: String,
    active: ParseResult,
    index: TxnIndex,
}

pub struct LedgerStore {
    dir: PathBuf,
    settings: StoreSettings,
    lock: Mutex<()>,
}

impl LedgerStore {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        LedgerStore::with_settings(dir, StoreSettings::default())
    }

    pub fn with_settings(dir: impl Into<PathBuf>, settings: StoreSettings) -> Self {
        LedgerStore {
            dir: dir.into(),
            settings,
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.dir.join(&self.settings.ledger_file)
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.dir.join(&self.settings.archive_dir)
    }

    pub fn archive_path(&self, month: YearMonth) -> PathBuf {
        self.archive_dir()
            .join(format!("ledger-{}.transactions", month))
    }

    /// Existing archives, oldest first.
    pub fn archives(&self) -> Result<Vec<(YearMonth, PathBuf)>, StoreError> {
        let dir = self.archive_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(dir)(e)),
        };

        let mut archives = Vec::new();
        for entry in entries {
            let entry = entry.map_err(StoreError::io(&dir))?;
            let name = entry.file_name();
            let month = name
                .to_str()
                .and_then(|name| name.strip_prefix("ledger-"))
                .and_then(|name| name.strip_suffix(".transactions"))
                .and_then(|month| month.parse::<YearMonth>().ok());
            if let Some(month) = month {
                archives.push((month, entry.path()));
            }
        }
        archives.sort();
        Ok(archives)
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn label(&self, path: &Path) -> String {
        path.strip_prefix(&self.dir)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    /// Moves the active file into the archive of its own month when that month
    /// is not `current`, leaving an empty active file. Returns the number of
    /// transactions archived.
    pub fn rotate(&self, current: YearMonth) -> Result<usize, StoreError> {
        let _guard = self.guard();
        self.rotate_locked(current)
    }

    fn rotate_locked(&self, current: YearMonth) -> Result<usize, StoreError> {
        let ledger = self.ledger_path();
        let contents = match read_optional(&ledger)? {
            Some(contents) if !contents.trim().is_empty() => contents,
            _ => return Ok(0),
        };

        let month = match recorded_month(&contents) {
            Some(month) => month,
            None => {
                debug!("{}: no month recorded, not rotating", ledger.display());
                return Ok(0);
            }
        };
        if month == current {
            return Ok(0);
        }

        let archive = self.archive_path(month);
        match read_optional(&archive)? {
            None => write_atomic(&archive, &contents)?,
            // Already there when an earlier rotation stopped before truncating.
            Some(existing) if existing.ends_with(&contents) => {}
            Some(mut existing) => {
                if !existing.ends_with('\n') {
                    existing.push('\n');
                }
                existing.push('\n');
                existing.push_str(&contents);
                write_atomic(&archive, &existing)?;
            }
        }
        write_atomic(&ledger, "")?;

        let (file, _) = ast::parse(&contents);
        let archived = file.transactions().count();
        info!(
            "rotated {} transactions of {} into {}",
            archived,
            month,
            archive.display()
        );
        Ok(archived)
    }

    /// Rotates, then parses the active file.
    pub fn load(&self, current: YearMonth) -> Result<ParseResult, StoreError> {
        let _guard = self.guard();
        self.rotate_locked(current)?;
        Ok(self.corpus()?.active)
    }

    fn corpus(&self) -> Result<Corpus, StoreError> {
        let mut index = TxnIndex::new();
        let mut history = Vec::new();

        for (_, path) in self.archives()? {
            let text = fs::read_to_string(&path).map_err(StoreError::io(&path))?;
            let label = self.label(&path);
            let (ledger, diagnostics) = parse_source(&text, &label, &mut index);
            if diagnostics.iter().any(|d| d.is_error()) {
                warn!("{}: {} diagnostics", label, diagnostics.len());
            }
            history.extend(ledger.transactions);
        }

        let ledger_path = self.ledger_path();
        let active_text = read_optional(&ledger_path)?.unwrap_or_default();
        let (ledger, diagnostics) =
            parse_source(&active_text, &self.label(&ledger_path), &mut index);
        let balances = compute_balances(history.iter().chain(ledger.transactions.iter()))?;

        Ok(Corpus {
            history,
            active_text,
            active: ParseResult::new(ledger, diagnostics, balances),
            index,
        })
    }

    fn append_blocks(&self, corpus: &Corpus, blocks: &[String], current: YearMonth) -> Result<(), StoreError> {
        let mut text = if corpus.active_text.trim().is_empty() {
            month_directive(current)
        } else {
            normalize_blank_lines(&corpus.active_text)
        };
        for block in blocks {
            append_block(&mut text, block);
        }
        write_atomic(&self.ledger_path(), &text)
    }

    /// Imports the transactions of `paths`, in order, skipping ids already
    /// known and transactions with errors. Source files are only read. When
    /// one of them cannot be read, nothing is written, rotation included.
    pub fn import_sources<P>(&self, paths: &[P], current: YearMonth) -> Result<ImportOutcome, StoreError>
    where
        P: AsRef<Path>,
    {
        let _guard = self.guard();

        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let text = fs::read_to_string(path).map_err(|source| StoreError::ReadSource {
                path: path.to_path_buf(),
                source,
            })?;
            sources.push((path, text));
        }

        let archived = self.rotate_locked(current)?;
        let corpus = self.corpus()?;
        let settings = SerializerSettings::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut blocks = Vec::new();
        let mut stats = ImportStats {
            archived,
            ..ImportStats::default()
        };

        for (path, text) in &sources {
            let label = path.display().to_string();
            let clean = parse_clean_transactions(text, &label);
            if clean.rejected > 0 {
                warn!(
                    "{}: left out {} transactions with errors ({} diagnostics)",
                    label,
                    clean.rejected,
                    clean.diagnostics.len()
                );
            }
            stats.rejected += clean.rejected;

            let mut occurrences: HashMap<String, usize> = HashMap::new();
            for mut transaction in clean.transactions {
                let id = match transaction.id() {
                    Some(id) => id.to_string(),
                    None => {
                        let block = transaction.to_string_pretty(&settings);
                        let occurrence = occurrences.entry(block.clone()).or_default();
                        *occurrence += 1;
                        let id = content_id(&block, *occurrence);
                        transaction.meta.push(Tag::pair(TXN_TAG, id.as_str()));
                        id
                    }
                };

                if corpus.index.contains(&id) || !seen.insert(id) {
                    stats.skipped_duplicates += 1;
                    continue;
                }
                blocks.push(transaction.to_string_pretty(&settings));
                stats.imported += 1;
            }
        }

        if !blocks.is_empty() {
            self.append_blocks(&corpus, &blocks, current)?;
        }
        info!(
            "imported {} transactions, skipped {} duplicates, rejected {}",
            stats.imported, stats.skipped_duplicates, stats.rejected
        );

        Ok(ImportOutcome {
            stats,
            parse: self.corpus()?.active,
        })
    }

    /// Appends a transaction entered by hand after checking that it parses.
    pub fn add_manual(
        &self,
        input: &ManualTransactionInput,
        current: YearMonth,
    ) -> Result<ParseResult, StoreError> {
        let _guard = self.guard();
        self.rotate_locked(current)?;
        let corpus = self.corpus()?;

        let id = match input.txn_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::now_v7().to_string(),
        };
        if corpus.index.contains(&id) {
            return Err(StoreError::DuplicateId(id));
        }

        let block = manual::render(input, &id)?;
        let (ledger, diagnostics) = parse_source(&block, "manual input", &mut TxnIndex::new());
        if diagnostics.iter().any(|d| d.is_error()) {
            return Err(StoreError::InvalidTransaction(diagnostics));
        }
        let parsed = match ledger.transactions.as_slice() {
            [parsed] => parsed,
            _ => {
                return Err(StoreError::InvalidInput(
                    "input must describe exactly one transaction".to_string(),
                ))
            }
        };
        if parsed.id() != Some(id.as_str()) {
            return Err(StoreError::InvalidInput(
                "tags must not carry their own txn: id".to_string(),
            ));
        }
        if parsed.postings.len() != input.postings.len() {
            return Err(StoreError::InvalidInput(format!(
                "expected {} postings, read {}",
                input.postings.len(),
                parsed.postings.len()
            )));
        }

        self.append_blocks(&corpus, &[block], current)?;
        info!("appended manual transaction {}", id);
        Ok(self.corpus()?.active)
    }

    /// Declares `account` through an opening transaction dated `on`, balanced
    /// against the opening equity account. Without an opening balance nothing
    /// is written. `on` may lie in another month than `current`; the
    /// transaction still goes to the active file.
    pub fn add_account(
        &self,
        account: &str,
        currency: Option<&str>,
        opening_balance: Option<&str>,
        on: NaiveDate,
        current: YearMonth,
    ) -> Result<ParseResult, StoreError> {
        let _guard = self.guard();
        self.rotate_locked(current)?;

        let account = account.trim();
        if classify(account) != TokenKind::PathLike {
            return Err(StoreError::InvalidInput(format!(
                "invalid account path: {}",
                account
            )));
        }
        let commodity = currency
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(self.settings.default_commodity.as_str());
        if classify(commodity) != TokenKind::Ident {
            return Err(StoreError::InvalidInput(format!(
                "invalid commodity: {}",
                commodity
            )));
        }

        let corpus = self.corpus()?;
        let balance = match opening_balance.map(str::trim).filter(|b| !b.is_empty()) {
            Some(balance) => balance,
            None => return Ok(corpus.active),
        };
        let quantity = Decimal::from_str(balance)
            .map_err(|_| StoreError::InvalidInput(format!("invalid amount: {}", balance)))?;

        let transaction = Transaction {
            datetime: LedgerDateTime::from_date(on),
            status: Some(TransactionStatus::Cleared),
            payee: Some("Opening balance".to_string()),
            narration: Some(account.to_string()),
            meta: vec![
                Tag::pair(TXN_TAG, Uuid::now_v7().to_string()),
                Tag::pair("kind", "opening"),
            ],
            postings: vec![
                Posting {
                    account: account.to_string(),
                    amount: Amount::new(quantity, commodity),
                    cost: None,
                    price: None,
                    meta: vec![],
                },
                Posting {
                    account: self.settings.opening_account.clone(),
                    amount: Amount::new(-quantity, commodity),
                    cost: None,
                    price: None,
                    meta: vec![],
                },
            ],
        };

        let block = transaction.to_string_pretty(&SerializerSettings::default());
        self.append_blocks(&corpus, &[block], current)?;
        info!("opened {} with {} {}", account, quantity, commodity);
        Ok(self.corpus()?.active)
    }

    /// Every transaction on disk, archives first, in file order.
    pub fn history(&self) -> Result<Vec<Transaction>, StoreError> {
        let _guard = self.guard();
        let corpus = self.corpus()?;
        let mut transactions = corpus.history;
        transactions.extend(corpus.active.ledger.transactions);
        Ok(transactions)
    }
}

/// `h` + 16 hex digits of the SHA-256 of a rendered transaction and the
/// number of times the same block already occurred in its source.
fn content_id(block: &str, occurrence: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(block.as_bytes());
    hasher.update(occurrence.to_string().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
    format!("h{}", hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_id_is_stable() {
        let block = "2026-01-01 \"a\" ; src:bank\n    x:y 1 USD\n    x:z -1 USD\n";
        let id = content_id(block, 1);
        assert_eq!(id.len(), 17);
        assert!(id.starts_with('h'));
        assert_eq!(id, content_id(block, 1));
        assert_ne!(id, content_id(block, 2));
    }
}
