use crate::common::*;
use crate::model::*;
use std::io;

#[non_exhaustive]
pub struct SerializerSettings {
    indent: String,
    account_width: usize,
}

impl SerializerSettings {
    pub fn with_indent(mut self, indent: &str) -> Self {
        self.indent = indent.to_string();
        self
    }

    /// Pads account names to `width` columns so amounts line up.
    pub fn with_account_width(mut self, width: usize) -> Self {
        self.account_width = width;
        self
    }
}

impl Default for SerializerSettings {
    fn default() -> Self {
        Self {
            indent: "    ".to_string(),
            account_width: 0,
        }
    }
}

pub trait Serializer {
    fn write<W>(&self, writer: &mut W, settings: &SerializerSettings) -> Result<(), io::Error>
    where
        W: io::Write;

    fn to_string_pretty(&self, settings: &SerializerSettings) -> String {
        let mut res = Vec::new();
        match self.write(&mut res, settings) {
            Ok(()) => String::from_utf8_lossy(&res).into_owned(),
            Err(_) => String::new(),
        }
    }
}

fn is_path_text(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ':'))
}

fn write_quoted<W>(writer: &mut W, text: &str) -> Result<(), io::Error>
where
    W: io::Write,
{
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    write!(writer, "\"{}\"", escaped)
}

fn write_tags<W>(writer: &mut W, tags: &[Tag], settings: &SerializerSettings) -> Result<(), io::Error>
where
    W: io::Write,
{
    for (i, tag) in tags.iter().enumerate() {
        write!(writer, "{}", if i == 0 { " " } else { ", " })?;
        tag.write(writer, settings)?;
    }
    Ok(())
}

impl Serializer for Ledger {
    fn write<W>(&self, writer: &mut W, settings: &SerializerSettings) -> Result<(), io::Error>
    where
        W: io::Write,
    {
        for (i, transaction) in self.transactions.iter().enumerate() {
            if i > 0 {
                writeln!(writer)?;
            }
            transaction.write(writer, settings)?;
            writeln!(writer)?;
        }
        Ok(())
    }
}

impl Serializer for Transaction {
    fn write<W>(&self, writer: &mut W, settings: &SerializerSettings) -> Result<(), io::Error>
    where
        W: io::Write,
    {
        write!(writer, "{}", self.datetime)?;

        if let Some(ref status) = self.status {
            write!(writer, " ")?;
            status.write(writer, settings)?;
        }

        // A narration alone would read back as the payee.
        match (&self.payee, &self.narration) {
            (Some(payee), narration) => {
                write!(writer, " ")?;
                write_quoted(writer, payee)?;
                if let Some(narration) = narration {
                    write!(writer, " ")?;
                    write_quoted(writer, narration)?;
                }
            }
            (None, Some(narration)) => {
                write!(writer, " \"\" ")?;
                write_quoted(writer, narration)?;
            }
            (None, None) => {}
        }

        write!(writer, " ;")?;
        write_tags(writer, &self.meta, settings)?;

        for posting in &self.postings {
            write!(writer, "\n{}", settings.indent)?;
            posting.write(writer, settings)?;
        }

        Ok(())
    }
}

impl Serializer for TransactionStatus {
    fn write<W>(&self, writer: &mut W, _settings: &SerializerSettings) -> Result<(), io::Error>
    where
        W: io::Write,
    {
        write!(writer, "{}", self.as_char())
    }
}

impl Serializer for Posting {
    fn write<W>(&self, writer: &mut W, settings: &SerializerSettings) -> Result<(), io::Error>
    where
        W: io::Write,
    {
        write!(
            writer,
            "{:<width$} ",
            self.account,
            width = settings.account_width
        )?;
        self.amount.write(writer, settings)?;

        if let Some(ref cost) = self.cost {
            write!(writer, " ")?;
            cost.write(writer, settings)?;
        }

        if let Some(ref price) = self.price {
            write!(writer, " ")?;
            price.write(writer, settings)?;
        }

        if !self.meta.is_empty() {
            write!(writer, " ;")?;
            write_tags(writer, &self.meta, settings)?;
        }

        Ok(())
    }
}

impl Serializer for Amount {
    fn write<W>(&self, writer: &mut W, _settings: &SerializerSettings) -> Result<(), io::Error>
    where
        W: io::Write,
    {
        write!(writer, "{} {}", self.quantity, self.commodity)
    }
}

impl Serializer for CostAnnotation {
    fn write<W>(&self, writer: &mut W, settings: &SerializerSettings) -> Result<(), io::Error>
    where
        W: io::Write,
    {
        let (open, close) = match self.kind {
            CostKind::PerUnit => ("{", "}"),
            CostKind::Total => ("{{", "}}"),
        };
        write!(writer, "{}", open)?;

        let mut first = true;
        if let Some(ref amount) = self.amount {
            write!(writer, " ")?;
            amount.write(writer, settings)?;
            first = false;
        }
        for field in &self.fields {
            write!(writer, "{}", if first { " " } else { ", " })?;
            field.write(writer, settings)?;
            first = false;
        }

        write!(writer, " {}", close)
    }
}

impl Serializer for LotField {
    fn write<W>(&self, writer: &mut W, settings: &SerializerSettings) -> Result<(), io::Error>
    where
        W: io::Write,
    {
        match self {
            LotField::KeyValue { key, value } => {
                // `key:value` only when the value survives being glued to its key.
                let glued = match value {
                    LotValue::Amount(amount) => is_path_text(&amount.quantity.to_string()),
                    LotValue::Number(_) => true,
                    LotValue::Path(text) | LotValue::Ident(text) => is_path_text(text),
                    LotValue::Text(_) | LotValue::DateTime(_) => false,
                };
                write!(writer, "{}:{}", key, if glued { "" } else { " " })?;
                value.write(writer, settings)
            }
            LotField::Positional(value) => value.write(writer, settings),
        }
    }
}

impl Serializer for LotValue {
    fn write<W>(&self, writer: &mut W, settings: &SerializerSettings) -> Result<(), io::Error>
    where
        W: io::Write,
    {
        match self {
            LotValue::Amount(amount) => amount.write(writer, settings),
            LotValue::Number(number) => write!(writer, "{}", number),
            LotValue::DateTime(datetime) => write!(writer, "{}", datetime),
            LotValue::Text(text) => write_quoted(writer, text),
            LotValue::Path(text) | LotValue::Ident(text) => write!(writer, "{}", text),
        }
    }
}

impl Serializer for PriceAnnotation {
    fn write<W>(&self, writer: &mut W, settings: &SerializerSettings) -> Result<(), io::Error>
    where
        W: io::Write,
    {
        match self.kind {
            PriceKind::PerUnit => write!(writer, "@ ")?,
            PriceKind::Total => write!(writer, "@@ ")?,
        }
        self.amount.write(writer, settings)
    }
}

impl Serializer for Tag {
    fn write<W>(&self, writer: &mut W, _settings: &SerializerSettings) -> Result<(), io::Error>
    where
        W: io::Write,
    {
        match self {
            Tag::Pair { key, value } if is_path_text(value) => write!(writer, "{}:{}", key, value),
            Tag::Pair { key, value } => {
                write!(writer, "{}:", key)?;
                write_quoted(writer, value)
            }
            Tag::Bare(text) => write!(writer, "{}", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::{parse_source, TxnIndex};

    fn ledger(input: &str) -> Ledger {
        let (ledger, diagnostics) = parse_source(input, "", &mut TxnIndex::new());
        assert_eq!(diagnostics, vec![]);
        ledger
    }

    #[test]
    fn serialize_ledger_test() {
        let input = r#"2026-01-15 * "Binance" "Buy SOL" ; txn:01J2N9R9, src:binance:order:999
    assets:exchange:binance:sol    10.000000 SOL {{ 230.00 USD, fee:0.10 USD, fee_to:expenses:fees:trading, venue:binance, note:"maker fee" }}
    assets:cash:usd              -230.10 USD

2026-01-20T09:30:00.250-03:00 ! Kraken ; txn:k1,   memo:"Sell; partial"
    assets:kraken:btc  -0.5 BTC { 2026-01-02T09:30:00+05:30, "lot \"a\"", at: 2026-01-02 } @@ 21000 USD ; kind:trade
    assets:cash:usd 21000 USD
"#;
        let ledger = ledger(input);
        let expected = r#"2026-01-15 * "Binance" "Buy SOL" ; txn:01J2N9R9, src:binance:order:999
    assets:exchange:binance:sol 10.000000 SOL {{ 230.00 USD, fee:0.10 USD, fee_to:expenses:fees:trading, venue:binance, note: "maker fee" }}
    assets:cash:usd -230.10 USD

2026-01-20T09:30:00.250-03:00 ! "Kraken" ; txn:k1, memo:"Sell; partial"
    assets:kraken:btc -0.5 BTC { 2026-01-02T09:30:00+05:30, "lot \"a\"", at: 2026-01-02 } @@ 21000 USD ; kind:trade
    assets:cash:usd 21000 USD
"#;
        let output = ledger.to_string_pretty(&SerializerSettings::default());
        assert_eq!(output, expected);

        // Rendering is stable: the output reads back to the same model.
        assert_eq!(self::ledger(&output), ledger);
    }

    #[test]
    fn serialize_with_account_width() {
        let ledger = ledger("2026-01-01 \"Opening\" ; txn:o1\n    assets:cash 1.0 AUD\n    equity:opening-balances -1.0 AUD\n");
        assert_eq!(
            ledger.transactions[0].postings[0]
                .to_string_pretty(&SerializerSettings::default().with_account_width(24)),
            "assets:cash              1.0 AUD"
        );
    }

    #[test]
    fn serialize_narration_without_payee() {
        let transaction = Transaction {
            datetime: "2026-01-01".parse().unwrap(),
            status: None,
            payee: None,
            narration: Some("only narration".to_string()),
            meta: vec![],
            postings: vec![],
        };
        assert_eq!(
            transaction.to_string_pretty(&SerializerSettings::default()),
            "2026-01-01 \"\" \"only narration\" ;"
        );
    }
}
