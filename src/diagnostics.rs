use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Info,
}

///
/// A problem found in ledger source text. Positions are 1-based.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn error(line: usize, column: usize, message: impl Into<String>) -> Self {
        Diagnostic {
            line,
            column,
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn info(line: usize, column: usize, message: impl Into<String>) -> Self {
        Diagnostic {
            line,
            column,
            message: message.into(),
            severity: Severity::Info,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Info => "info",
        };
        write!(
            f,
            "line {}, column {}: {}: {}",
            self.line, self.column, severity, self.message
        )
    }
}

/// Collects diagnostics from the grammar and semantic stages.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn error(&mut self, line: usize, column: usize, message: impl Into<String>) {
        self.push(Diagnostic::error(line, column, message));
    }

    pub fn info(&mut self, line: usize, column: usize, message: impl Into<String>) {
        self.push(Diagnostic::info(line, column, message));
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = Diagnostic>) {
        self.items.extend(other);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    /// Returns the diagnostics ordered by position; the sort is stable so
    /// messages reported for the same spot keep their emission order.
    pub fn into_sorted(mut self) -> Vec<Diagnostic> {
        self.items.sort_by_key(|d| (d.line, d.column));
        self.items
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_does_not_count_as_error() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.info(3, 1, "transaction has a single posting");
        assert!(!diagnostics.has_errors());

        diagnostics.error(2, 5, "missing amount");
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn sorted_by_position() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error(4, 1, "b");
        diagnostics.error(2, 9, "a");
        diagnostics.error(4, 1, "c");
        let messages: Vec<String> = diagnostics
            .into_sorted()
            .into_iter()
            .map(|d| d.message)
            .collect();
        assert_eq!(messages, vec!["a", "b", "c"]);
    }

    #[test]
    fn display_diagnostic() {
        assert_eq!(
            format!("{}", Diagnostic::error(7, 12, "missing commodity")),
            "line 7, column 12: error: missing commodity"
        );
    }
}
