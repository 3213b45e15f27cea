use crate::common::{LedgerDateTime, TransactionStatus, TXN_TAG};
use crate::error::StoreError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualPostingInput {
    pub account: String,
    /// Signed decimal as typed, e.g. `-230.10`.
    pub amount: String,
    pub commodity: String,
    /// Cost, price or tag text appended to the posting line as is.
    #[serde(default)]
    pub remainder: Option<String>,
}

///
/// Transaction entered by hand.
///
/// `datetime` is `YYYY-MM-DD` or any datetime the grammar accepts. When
/// `txn_id` is absent a time-ordered id is generated.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualTransactionInput {
    pub datetime: String,
    #[serde(default)]
    pub status: Option<char>,
    pub payee: String,
    pub narration: String,
    #[serde(default)]
    pub txn_id: Option<String>,
    /// Extra header tags, e.g. `src:manual, kind:transfer`.
    #[serde(default)]
    pub tags: Option<String>,
    pub postings: Vec<ManualPostingInput>,
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

fn single_line(field: &str, value: &str) -> Result<(), StoreError> {
    if value.contains(|c: char| c == '\n' || c == '\r') {
        return Err(StoreError::InvalidInput(format!(
            "{} must not contain line breaks",
            field
        )));
    }
    Ok(())
}

fn check_lines(input: &ManualTransactionInput, id: &str) -> Result<(), StoreError> {
    single_line("datetime", &input.datetime)?;
    single_line("payee", &input.payee)?;
    single_line("narration", &input.narration)?;
    single_line("txnId", id)?;
    single_line("tags", input.tags.as_deref().unwrap_or_default())?;
    for posting in &input.postings {
        single_line("account", &posting.account)?;
        single_line("amount", &posting.amount)?;
        single_line("commodity", &posting.commodity)?;
        single_line("remainder", posting.remainder.as_deref().unwrap_or_default())?;
    }
    Ok(())
}

/// Renders `input` as one transaction block carrying `txn:<id>`.
pub(crate) fn render(input: &ManualTransactionInput, id: &str) -> Result<String, StoreError> {
    check_lines(input, id)?;
    let datetime = input.datetime.trim();
    datetime
        .parse::<LedgerDateTime>()
        .map_err(StoreError::InvalidInput)?;

    if input.postings.is_empty() {
        return Err(StoreError::InvalidInput(
            "transaction needs at least one posting".to_string(),
        ));
    }

    let mut header = datetime.to_string();
    if let Some(status) = input.status {
        let status = TransactionStatus::from_char(status).ok_or_else(|| {
            StoreError::InvalidInput(format!("invalid status {:?}, expected '*' or '!'", status))
        })?;
        header.push(' ');
        header.push(status.as_char());
    }
    header.push(' ');
    header.push_str(&quote(&input.payee));
    header.push(' ');
    header.push_str(&quote(&input.narration));
    header.push_str(" ; ");
    if let Some(tags) = input.tags.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        header.push_str(tags.trim_end_matches(','));
        header.push_str(", ");
    }
    header.push_str(TXN_TAG);
    header.push(':');
    header.push_str(id);

    let mut block = header;
    for posting in &input.postings {
        block.push_str("\n    ");
        block.push_str(posting.account.trim());
        block.push(' ');
        block.push_str(posting.amount.trim());
        block.push(' ');
        block.push_str(posting.commodity.trim());
        if let Some(remainder) = posting.remainder.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            block.push(' ');
            block.push_str(remainder);
        }
    }
    block.push('\n');
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ManualTransactionInput {
        ManualTransactionInput {
            datetime: "2026-01-15".to_string(),
            status: Some('*'),
            payee: "Corner \"shop\"".to_string(),
            narration: "Groceries".to_string(),
            txn_id: None,
            tags: Some("src:manual".to_string()),
            postings: vec![
                ManualPostingInput {
                    account: "expenses:food".to_string(),
                    amount: "12.50".to_string(),
                    commodity: "EUR".to_string(),
                    remainder: None,
                },
                ManualPostingInput {
                    account: "assets:cash:eur".to_string(),
                    amount: "-12.50".to_string(),
                    commodity: "EUR".to_string(),
                    remainder: Some("; receipt:r42".to_string()),
                },
            ],
        }
    }

    #[test]
    fn render_test() {
        assert_eq!(
            render(&input(), "abc").unwrap(),
            "2026-01-15 * \"Corner \\\"shop\\\"\" \"Groceries\" ; src:manual, txn:abc\n    expenses:food 12.50 EUR\n    assets:cash:eur -12.50 EUR ; receipt:r42\n"
        );
    }

    #[test]
    fn render_rejects_bad_input() {
        let mut bad = input();
        bad.datetime = "2026-02-30".to_string();
        assert!(matches!(render(&bad, "abc"), Err(StoreError::InvalidInput(_))));

        let mut bad = input();
        bad.status = Some('x');
        assert!(matches!(render(&bad, "abc"), Err(StoreError::InvalidInput(_))));

        let mut bad = input();
        bad.postings.clear();
        assert!(matches!(render(&bad, "abc"), Err(StoreError::InvalidInput(_))));
    }

    #[test]
    fn render_rejects_line_breaks() {
        let mut bad = input();
        bad.postings[0].commodity =
            "EUR\n    a:c -1 EUR\n\n2026-01-01 \"other\" ; txn:other\n    x:y 1000 EUR".to_string();
        match render(&bad, "abc") {
            Err(StoreError::InvalidInput(message)) => {
                assert_eq!(message, "commodity must not contain line breaks")
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let mut bad = input();
        bad.tags = Some("src:manual\r\n".to_string());
        assert!(matches!(render(&bad, "abc"), Err(StoreError::InvalidInput(_))));

        let mut bad = input();
        bad.payee = "two\nlines".to_string();
        assert!(matches!(render(&bad, "abc"), Err(StoreError::InvalidInput(_))));
    }

    #[test]
    fn deserialize_input() {
        let input: ManualTransactionInput = serde_json::from_str(
            r#"{"datetime":"2026-01-15","payee":"A","narration":"B","postings":[{"account":"a:b","amount":"1","commodity":"USD"}]}"#,
        )
        .unwrap();
        assert_eq!(input.status, None);
        assert_eq!(input.txn_id, None);
        assert_eq!(input.postings[0].remainder, None);
    }
}
