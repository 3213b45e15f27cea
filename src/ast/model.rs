use crate::common::*;

///
/// Concrete syntax tree of one `.transactions` file.
///
/// Numbers are kept as written; turning them into exact decimals (and
/// reporting the ones that do not fit) is the semantic stage's job.
///
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct File {
    pub items: Vec<Item>,
}

impl File {
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.items.iter().filter_map(|item| match item {
            Item::Transaction(transaction) => Some(transaction),
            _ => None,
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Item {
    EmptyLine,
    Directive(String),
    Transaction(Transaction),
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Located<T> {
    pub value: T,
    pub line: usize,
    pub column: usize,
}

impl<T> Located<T> {
    pub fn new(value: T, line: usize, column: usize) -> Self {
        Located {
            value,
            line,
            column,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Transaction {
    pub line: usize,
    pub column: usize,
    /// Last line read while this transaction was open, dropped postings included.
    pub end_line: usize,
    pub datetime: LedgerDateTime,
    pub status: Option<TransactionStatus>,
    pub payee: Option<String>,
    pub narration: Option<String>,
    /// `None` when the header has no `;` metadata comment at all.
    pub meta: Option<Vec<Located<Tag>>>,
    pub postings: Vec<Posting>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Posting {
    pub line: usize,
    pub account: String,
    pub amount: Option<Located<String>>,
    pub commodity: Option<Located<String>>,
    /// Where the first missing piece (amount or commodity) was expected.
    pub missing_at: usize,
    pub cost: Option<CostSpec>,
    pub price: Option<PriceSpec>,
    pub meta: Vec<Located<Tag>>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct AmountSpec {
    pub quantity: Located<String>,
    pub commodity: String,
}

/// `{ … }` or, when `total` is set, `{{ … }}`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CostSpec {
    pub total: bool,
    pub amount: Option<AmountSpec>,
    pub fields: Vec<LotFieldSpec>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct LotFieldSpec {
    pub key: Option<String>,
    pub value: LotValueSpec,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum LotValueSpec {
    Amount(AmountSpec),
    Number(Located<String>),
    DateTime(LedgerDateTime),
    Quoted(String),
    Path(String),
    Ident(String),
}

/// `@ amount` or, when `total` is set, `@@ amount`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PriceSpec {
    pub total: bool,
    pub amount: AmountSpec,
}
