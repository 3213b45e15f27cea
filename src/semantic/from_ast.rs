use super::index::{Location, TxnIndex};
use crate::ast;
use crate::common::*;
use crate::diagnostics::Diagnostics;
use crate::model::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

///
/// Lowers a syntax tree to the domain model.
///
/// Rules checked here: every transaction carries a unique `txn:` id, every
/// posting has an amount and a commodity, every number (lot fields included)
/// fits an exact decimal, every running (account, commodity) total of the
/// file stays in range, and every transaction keeps at least one posting.
///
pub struct Builder<'i> {
    source: String,
    index: &'i mut TxnIndex,
    diagnostics: Diagnostics,
    totals: HashMap<(String, String), Decimal>,
    check_ids: bool,
}

impl<'i> Builder<'i> {
    /// `source` labels locations recorded in `index`.
    pub fn new(source: &str, index: &'i mut TxnIndex) -> Self {
        Builder {
            source: source.to_string(),
            index,
            diagnostics: Diagnostics::new(),
            totals: HashMap::new(),
            check_ids: true,
        }
    }

    /// Skips the `txn:` rules, for text whose ids are assigned afterwards.
    pub fn without_ids(mut self) -> Self {
        self.check_ids = false;
        self
    }

    pub fn build(self, file: &ast::File) -> (Ledger, Diagnostics) {
        let (built, diagnostics) = self.build_nodes(file);
        let transactions = built.into_iter().map(|(_, transaction)| transaction).collect();
        (Ledger { transactions }, diagnostics)
    }

    /// Like [`Builder::build`], pairing each transaction with its syntax node.
    pub fn build_nodes<'f>(
        mut self,
        file: &'f ast::File,
    ) -> (Vec<(&'f ast::Transaction, Transaction)>, Diagnostics) {
        let built = file
            .transactions()
            .filter_map(|node| self.transaction(node).map(|transaction| (node, transaction)))
            .collect();
        (built, self.diagnostics)
    }

    fn transaction(&mut self, value: &ast::Transaction) -> Option<Transaction> {
        if value.postings.is_empty() {
            self.diagnostics
                .error(value.line, value.column, "transaction missing postings");
            return None;
        }

        let postings: Vec<Posting> = value
            .postings
            .iter()
            .filter_map(|posting| self.posting(posting))
            .collect();
        if postings.is_empty() {
            return None;
        }
        if postings.len() == 1 {
            self.diagnostics
                .info(value.line, value.column, "transaction has a single posting");
        }

        let meta = value.meta.as_deref().unwrap_or_default();
        match meta.iter().find(|tag| tag.value.txn_id().is_some()) {
            _ if !self.check_ids => {}
            Some(tag) => {
                let id = tag.value.txn_id().unwrap_or_default();
                let location = Location::new(self.source.as_str(), tag.line, tag.column);
                if let Some(first) = self.index.insert(id, location) {
                    self.diagnostics.error(
                        tag.line,
                        tag.column,
                        format!("duplicate transaction id {} (first seen at {})", id, first),
                    );
                }
            }
            None => {
                self.diagnostics
                    .error(value.line, value.column, "missing transaction id");
            }
        }

        Some(Transaction {
            datetime: value.datetime,
            status: value.status,
            payee: value.payee.clone(),
            narration: value.narration.clone(),
            meta: meta.iter().map(|tag| tag.value.clone()).collect(),
            postings,
        })
    }

    fn posting(&mut self, value: &ast::Posting) -> Option<Posting> {
        let (quantity, line, column) = match value.amount {
            Some(ref quantity) => (self.decimal(quantity)?, quantity.line, quantity.column),
            None => {
                self.diagnostics
                    .error(value.line, value.missing_at, "missing amount");
                return None;
            }
        };

        let commodity = match value.commodity {
            Some(ref commodity) => commodity.value.clone(),
            None => {
                self.diagnostics
                    .error(value.line, value.missing_at, "missing commodity");
                return None;
            }
        };

        let cost = match value.cost {
            Some(ref cost) => Some(self.cost(cost)?),
            None => None,
        };

        let price = match value.price {
            Some(ref price) => Some(PriceAnnotation {
                kind: if price.total {
                    PriceKind::Total
                } else {
                    PriceKind::PerUnit
                },
                amount: self.amount(&price.amount)?,
            }),
            None => None,
        };

        let slot = (value.account.clone(), commodity.clone());
        let total = self.totals.get(&slot).copied().unwrap_or_default();
        match total.checked_add(quantity) {
            Some(total) => {
                self.totals.insert(slot, total);
            }
            None => {
                self.diagnostics.error(
                    line,
                    column,
                    format!("balance overflow: {} in {}", value.account, commodity),
                );
                return None;
            }
        }

        Some(Posting {
            account: value.account.clone(),
            amount: Amount::new(quantity, commodity),
            cost,
            price,
            meta: value.meta.iter().map(|tag| tag.value.clone()).collect(),
        })
    }

    fn cost(&mut self, value: &ast::CostSpec) -> Option<CostAnnotation> {
        let amount = match value.amount {
            Some(ref amount) => Some(self.amount(amount)?),
            None => None,
        };

        let mut fields = Vec::with_capacity(value.fields.len());
        for field in &value.fields {
            let lot_value = self.lot_value(&field.value)?;
            fields.push(match field.key {
                Some(ref key) => LotField::KeyValue {
                    key: key.clone(),
                    value: lot_value,
                },
                None => LotField::Positional(lot_value),
            });
        }

        Some(CostAnnotation {
            kind: if value.total {
                CostKind::Total
            } else {
                CostKind::PerUnit
            },
            amount,
            fields,
        })
    }

    fn lot_value(&mut self, value: &ast::LotValueSpec) -> Option<LotValue> {
        let lot_value = match value {
            ast::LotValueSpec::Amount(amount) => LotValue::Amount(self.amount(amount)?),
            ast::LotValueSpec::Number(number) => LotValue::Number(self.decimal(number)?),
            ast::LotValueSpec::DateTime(datetime) => LotValue::DateTime(*datetime),
            ast::LotValueSpec::Quoted(text) => LotValue::Text(text.clone()),
            ast::LotValueSpec::Path(path) => LotValue::Path(path.clone()),
            ast::LotValueSpec::Ident(ident) => LotValue::Ident(ident.clone()),
        };
        Some(lot_value)
    }

    fn amount(&mut self, value: &ast::AmountSpec) -> Option<Amount> {
        let quantity = self.decimal(&value.quantity)?;
        Some(Amount::new(quantity, value.commodity.as_str()))
    }

    fn decimal(&mut self, value: &ast::Located<String>) -> Option<Decimal> {
        match Decimal::from_str(&value.value) {
            Ok(decimal) => Some(decimal),
            Err(_) => {
                self.diagnostics.error(
                    value.line,
                    value.column,
                    format!("invalid number: {}", value.value),
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn build(input: &str) -> (Ledger, Vec<String>) {
        let (file, _) = ast::parse(input);
        let mut index = TxnIndex::new();
        let (ledger, diagnostics) = Builder::new("test.transactions", &mut index).build(&file);
        let messages = diagnostics
            .into_sorted()
            .into_iter()
            .map(|d| d.to_string())
            .collect();
        (ledger, messages)
    }

    #[test]
    fn from_ast_test() {
        let (ledger, messages) = build(
            r#"2026-01-15 * "Binance" "Buy SOL" ; txn:01J2N9R9, src:binance:order:999
    assets:exchange:binance:sol    10.000000 SOL {{ 230.00 USD, fee:0.10 USD, 2026-01-15T10:00:00Z, venue:binance, note:"maker fee" }}
    assets:cash:usd              -230.10 USD @ 1 USD
"#,
        );
        assert_eq!(messages, Vec::<String>::new());
        assert_eq!(
            ledger,
            Ledger {
                transactions: vec![Transaction {
                    datetime: LedgerDateTime::from_date(
                        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
                    ),
                    status: Some(TransactionStatus::Cleared),
                    payee: Some("Binance".to_string()),
                    narration: Some("Buy SOL".to_string()),
                    meta: vec![
                        Tag::pair("txn", "01J2N9R9"),
                        Tag::pair("src", "binance:order:999"),
                    ],
                    postings: vec![
                        Posting {
                            account: "assets:exchange:binance:sol".to_string(),
                            amount: Amount::new(Decimal::new(10_000_000, 6), "SOL"),
                            cost: Some(CostAnnotation {
                                kind: CostKind::Total,
                                amount: Some(Amount::new(Decimal::new(23000, 2), "USD")),
                                fields: vec![
                                    LotField::KeyValue {
                                        key: "fee".to_string(),
                                        value: LotValue::Amount(Amount::new(
                                            Decimal::new(10, 2),
                                            "USD"
                                        )),
                                    },
                                    LotField::Positional(LotValue::DateTime(
                                        "2026-01-15T10:00:00Z".parse().unwrap()
                                    )),
                                    LotField::KeyValue {
                                        key: "venue".to_string(),
                                        value: LotValue::Ident("binance".to_string()),
                                    },
                                    LotField::KeyValue {
                                        key: "note".to_string(),
                                        value: LotValue::Text("maker fee".to_string()),
                                    },
                                ],
                            }),
                            price: None,
                            meta: vec![],
                        },
                        Posting {
                            account: "assets:cash:usd".to_string(),
                            amount: Amount::new(Decimal::new(-23010, 2), "USD"),
                            cost: None,
                            price: Some(PriceAnnotation {
                                kind: PriceKind::PerUnit,
                                amount: Amount::new(Decimal::new(1, 0), "USD"),
                            }),
                            meta: vec![],
                        },
                    ],
                }]
            }
        );
    }

    #[test]
    fn missing_amount_and_commodity() {
        let (ledger, messages) = build(
            r#"2026-01-15 * "Binance" "Buy SOL" ; txn:01J2N9R9
    assets:exchange:binance:sol
    assets:cash:usd -230.10
    assets:cash:eur -1 EUR
    assets:cash:usd 230.10 USD
"#,
        );
        assert_eq!(
            messages,
            vec![
                "line 2, column 33: error: missing amount",
                "line 3, column 29: error: missing commodity",
            ]
        );
        assert_eq!(ledger.transactions[0].postings.len(), 2);
    }

    #[test]
    fn transaction_id_rules() {
        let (ledger, messages) = build(
            r#"2026-01-01 "A" ; src:bank
    assets:cash 1 USD
    equity:open -1 USD

2026-01-02 "B" ; txn:x1
    assets:cash 1 USD
    equity:open -1 USD

2026-01-03 "C" ; note:dup, txn:x1
    assets:cash 1 USD

2026-01-04 "D" ; txn:x2
"#,
        );
        assert_eq!(
            messages,
            vec![
                "line 1, column 1: error: missing transaction id",
                "line 9, column 1: info: transaction has a single posting",
                "line 9, column 28: error: duplicate transaction id x1 (first seen at test.transactions line 5, column 18)",
                "line 12, column 1: error: transaction missing postings",
            ]
        );
        assert_eq!(ledger.transactions.len(), 3);
        assert_eq!(ledger.transactions[0].id(), None);
        assert_eq!(ledger.transactions[2].id(), Some("x1"));
    }

    #[test]
    fn seeded_index_detects_duplicates_across_files() {
        let mut index = TxnIndex::new();
        index.insert("x1", Location::new("archive/ledger-202512.transactions", 3, 20));

        let (file, _) = ast::parse("2026-01-02 \"B\" ; txn:x1\n    assets:cash 1 USD\n    equity:open -1 USD\n");
        let (_, diagnostics) = Builder::new("ledger.transactions", &mut index).build(&file);
        assert!(diagnostics.has_errors());
        assert_eq!(
            diagnostics.iter().next().map(|d| d.message.clone()),
            Some(
                "duplicate transaction id x1 (first seen at archive/ledger-202512.transactions line 3, column 20)"
                    .to_string()
            )
        );
    }

    #[test]
    fn empty_transaction_id_is_missing() {
        let (ledger, messages) = build("2026-01-05 \"E\" ; txn:\n    a:b 1 USD\n    a:c -1 USD\n");
        assert_eq!(messages, vec!["line 1, column 1: error: missing transaction id"]);
        assert_eq!(ledger.transactions.len(), 1);
        assert_eq!(ledger.transactions[0].id(), None);
    }

    #[test]
    fn without_ids_skips_id_rules() {
        let (file, _) = ast::parse("2026-01-05 \"E\" ; src:x\n    a:b 1 USD\n    a:c -1 USD\n");
        let mut index = TxnIndex::new();
        let (built, diagnostics) = Builder::new("", &mut index).without_ids().build_nodes(&file);
        assert!(diagnostics.is_empty());
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].0.line, 1);
        assert!(index.is_empty());
    }
}
