use crate::common::*;
use rust_decimal::Decimal;

///
/// Validated ledger: transactions in document order.
///
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Ledger {
    pub transactions: Vec<Transaction>,
}

///
/// Transaction.
///
/// A transaction without a `txn:` tag is still kept (a diagnostic is reported
/// for it), in which case [`Transaction::id`] returns `None`.
///
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Transaction {
    pub datetime: LedgerDateTime,
    pub status: Option<TransactionStatus>,
    pub payee: Option<String>,
    pub narration: Option<String>,
    pub meta: Vec<Tag>,
    pub postings: Vec<Posting>,
}

impl Transaction {
    pub fn id(&self) -> Option<&str> {
        self.meta.iter().find_map(Tag::txn_id)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Posting {
    pub account: String,
    pub amount: Amount,
    pub cost: Option<CostAnnotation>,
    pub price: Option<PriceAnnotation>,
    pub meta: Vec<Tag>,
}

impl Posting {
    /// First segment of the account path, e.g. `assets`.
    pub fn account_group(&self) -> &str {
        account_group(&self.account)
    }
}

pub fn account_group(account: &str) -> &str {
    account.split(':').next().unwrap_or(account)
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CostKind {
    /// `{ … }`
    PerUnit,
    /// `{{ … }}`
    Total,
}

///
/// Lot annotation. Kept for round-trips; never valued by the balance engine.
///
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CostAnnotation {
    pub kind: CostKind,
    pub amount: Option<Amount>,
    pub fields: Vec<LotField>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum LotField {
    KeyValue { key: String, value: LotValue },
    Positional(LotValue),
}

impl LotField {
    pub fn value(&self) -> &LotValue {
        match self {
            LotField::KeyValue { value, .. } => value,
            LotField::Positional(value) => value,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum LotValue {
    Amount(Amount),
    Number(Decimal),
    DateTime(LedgerDateTime),
    Text(String),
    Path(String),
    Ident(String),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PriceKind {
    /// `@`
    PerUnit,
    /// `@@`
    Total,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PriceAnnotation {
    pub kind: PriceKind,
    pub amount: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn transaction_id_test() {
        let transaction = Transaction {
            datetime: LedgerDateTime::from_date(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()),
            status: None,
            payee: None,
            narration: None,
            meta: vec![
                Tag::pair("src", "binance:order:999"),
                Tag::pair("txn", "01J2N9R9"),
            ],
            postings: vec![],
        };
        assert_eq!(transaction.id(), Some("01J2N9R9"));
    }

    #[test]
    fn account_group_test() {
        assert_eq!(account_group("assets:CBA:smartaccess"), "assets");
        assert_eq!(account_group("equity"), "equity");
    }
}
