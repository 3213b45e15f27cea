//! Folds transactions into per-account, per-commodity totals.
//!
//! Sums use exact decimal addition. Cost and price annotations never take part
//! in the fold; commodities are never converted into each other.

use crate::common::*;
use crate::error::BalanceError;
use crate::model::*;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct CommodityTotal {
    pub commodity: String,
    pub amount: Decimal,
}

///
/// Totals of one account, one entry per commodity in the order the commodities
/// were first posted to it.
///
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct AccountBalance {
    pub account: String,
    pub totals: Vec<CommodityTotal>,
}

impl AccountBalance {
    pub fn total(&self, commodity: &str) -> Option<Decimal> {
        self.totals
            .iter()
            .find(|total| total.commodity == commodity)
            .map(|total| total.amount)
    }
}

/// Balance of an (account, commodity) slot right after one posting.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct RunningBalance {
    pub datetime: LedgerDateTime,
    pub account: String,
    pub commodity: String,
    pub change: Decimal,
    pub balance: Decimal,
}

#[derive(Default)]
struct Accumulator {
    balances: Vec<AccountBalance>,
    accounts: HashMap<String, usize>,
}

impl Accumulator {
    /// Adds `amount` to its slot and returns the new slot total.
    fn add(
        &mut self,
        account: &str,
        amount: &Amount,
        datetime: &LedgerDateTime,
    ) -> Result<Decimal, BalanceError> {
        let position = match self.accounts.get(account) {
            Some(&position) => position,
            None => {
                self.balances.push(AccountBalance {
                    account: account.to_string(),
                    totals: Vec::new(),
                });
                let position = self.balances.len() - 1;
                self.accounts.insert(account.to_string(), position);
                position
            }
        };

        let totals = &mut self.balances[position].totals;
        match totals
            .iter_mut()
            .find(|total| total.commodity == amount.commodity)
        {
            Some(total) => {
                total.amount = total.amount.checked_add(amount.quantity).ok_or_else(|| {
                    BalanceError::Overflow {
                        account: account.to_string(),
                        commodity: amount.commodity.clone(),
                        datetime: datetime.to_string(),
                    }
                })?;
                Ok(total.amount)
            }
            None => {
                totals.push(CommodityTotal {
                    commodity: amount.commodity.clone(),
                    amount: amount.quantity,
                });
                Ok(amount.quantity)
            }
        }
    }

    fn add_transaction(&mut self, transaction: &Transaction) -> Result<(), BalanceError> {
        for posting in &transaction.postings {
            self.add(&posting.account, &posting.amount, &transaction.datetime)?;
        }
        Ok(())
    }
}

/// Folds `transactions` in order into one balance per account.
///
/// Fails when a running total leaves the range of [`Decimal`].
pub fn compute_balances<'a, I>(transactions: I) -> Result<Vec<AccountBalance>, BalanceError>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut accumulator = Accumulator::default();
    for transaction in transactions {
        accumulator.add_transaction(transaction)?;
    }
    Ok(accumulator.balances)
}

/// Balance after every posting, in file order.
pub fn running_balances<'a, I>(transactions: I) -> Result<Vec<RunningBalance>, BalanceError>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut accumulator = Accumulator::default();
    let mut running = Vec::new();
    for transaction in transactions {
        for posting in &transaction.postings {
            let balance =
                accumulator.add(&posting.account, &posting.amount, &transaction.datetime)?;
            running.push(RunningBalance {
                datetime: transaction.datetime,
                account: posting.account.clone(),
                commodity: posting.amount.commodity.clone(),
                change: posting.amount.quantity,
                balance,
            });
        }
    }
    Ok(running)
}

/// Balances over the transactions dated on or before `date`.
pub fn balances_as_of<'a, I>(
    transactions: I,
    date: NaiveDate,
) -> Result<Vec<AccountBalance>, BalanceError>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    compute_balances(
        transactions
            .into_iter()
            .filter(|transaction| transaction.datetime.date <= date),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic;
    use std::str::FromStr;

    fn ledger(input: &str) -> Ledger {
        let (ledger, diagnostics) = semantic::parse_source(input, "", &mut semantic::TxnIndex::new());
        assert_eq!(diagnostics, vec![]);
        ledger
    }

    fn dec(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    const INPUT: &str = r#"2026-01-15 * "Binance" "Buy SOL" ; txn:a
    assets:exchange:binance:sol    10.000000 SOL {{ 230.00 USD }}
    assets:cash:usd              -230.10 USD
    expenses:fees:trading           0.10 USD

2026-01-20 * "Kraken" "Sell" ; txn:b
    assets:exchange:binance:sol    -2.5 SOL @ 240.00 USD
    assets:cash:usd               600.00 USD
    income:trading               -600.00 USD
"#;

    #[test]
    fn compute_balances_test() {
        let ledger = ledger(INPUT);
        assert_eq!(
            compute_balances(&ledger.transactions).unwrap(),
            vec![
                AccountBalance {
                    account: "assets:exchange:binance:sol".to_string(),
                    totals: vec![CommodityTotal {
                        commodity: "SOL".to_string(),
                        amount: dec("7.500000"),
                    }],
                },
                AccountBalance {
                    account: "assets:cash:usd".to_string(),
                    totals: vec![CommodityTotal {
                        commodity: "USD".to_string(),
                        amount: dec("369.90"),
                    }],
                },
                AccountBalance {
                    account: "expenses:fees:trading".to_string(),
                    totals: vec![CommodityTotal {
                        commodity: "USD".to_string(),
                        amount: dec("0.10"),
                    }],
                },
                AccountBalance {
                    account: "income:trading".to_string(),
                    totals: vec![CommodityTotal {
                        commodity: "USD".to_string(),
                        amount: dec("-600.00"),
                    }],
                },
            ]
        );
    }

    #[test]
    fn sums_are_exact() {
        let ledger = ledger(
            "2026-01-01 \"x\" ; txn:a\n    assets:cash:usd -230.10 USD\n    assets:cash:usd 0.10 USD\n",
        );
        let balances = compute_balances(&ledger.transactions).unwrap();
        assert_eq!(balances[0].total("USD"), Some(dec("-230.00")));
        assert_eq!(balances[0].total("USD").map(|d| d.to_string()), Some("-230.00".to_string()));
    }

    #[test]
    fn commodities_keep_first_seen_order() {
        let ledger = ledger(
            "2026-01-01 \"x\" ; txn:a\n    assets:wallet 1 BTC\n    assets:wallet 5 USD\n    assets:wallet -0.5 BTC\n",
        );
        let balances = compute_balances(&ledger.transactions).unwrap();
        assert_eq!(balances.len(), 1);
        let commodities: Vec<&str> = balances[0]
            .totals
            .iter()
            .map(|t| t.commodity.as_str())
            .collect();
        assert_eq!(commodities, vec!["BTC", "USD"]);
        assert_eq!(balances[0].total("BTC"), Some(dec("0.5")));
    }

    #[test]
    fn running_and_as_of() {
        let ledger = ledger(INPUT);

        let running = running_balances(&ledger.transactions).unwrap();
        assert_eq!(running.len(), 6);
        assert_eq!(running[1].account, "assets:cash:usd");
        assert_eq!(running[1].balance, dec("-230.10"));
        assert_eq!(running[4].change, dec("600.00"));
        assert_eq!(running[4].balance, dec("369.90"));

        let as_of = balances_as_of(
            &ledger.transactions,
            NaiveDate::from_ymd_opt(2026, 1, 16).unwrap(),
        )
        .unwrap();
        assert_eq!(as_of.len(), 3);
        assert_eq!(as_of[0].total("SOL"), Some(dec("10.000000")));
    }

    #[test]
    fn overflow_is_an_error() {
        let first = ledger(
            "2026-01-01 \"x\" ; txn:a\n    assets:big 79228162514264337593543950335 USD\n    equity:a -79228162514264337593543950335 USD\n",
        );
        let second = ledger(
            "2026-01-02 \"y\" ; txn:b\n    assets:big 1 USD\n    equity:b -1 USD\n",
        );
        let all = first.transactions.iter().chain(second.transactions.iter());
        assert_eq!(
            compute_balances(all),
            Err(BalanceError::Overflow {
                account: "assets:big".to_string(),
                commodity: "USD".to_string(),
                datetime: "2026-01-02".to_string(),
            })
        );

        let all = first.transactions.iter().chain(second.transactions.iter());
        assert!(running_balances(all).is_err());
    }
}
