use crate::common::LedgerDateTime;
use crate::error::StoreError;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Contents of `path`, or `None` when it does not exist.
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path)(e)),
    }
}

/// Replaces `path` with `contents` through a temporary file in the same
/// directory, so readers see either the old or the new file.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(StoreError::io(dir))?;

    let mut file = NamedTempFile::new_in(dir).map_err(StoreError::io(dir))?;
    file.write_all(contents.as_bytes())
        .map_err(StoreError::io(path))?;
    file.as_file().sync_all().map_err(StoreError::io(path))?;
    file.persist(path).map_err(|e| StoreError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

fn is_header(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .map_or(false, |first| first.parse::<LedgerDateTime>().is_ok())
}

/// One blank line between transaction blocks, no blank-line runs, a single
/// trailing newline. Line endings become `\n`.
pub(crate) fn normalize_blank_lines(contents: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut after_posting = false;

    for line in contents.lines() {
        let blank = line.trim().is_empty();
        if blank {
            if lines.last().map_or(false, |last| !last.trim().is_empty()) {
                lines.push("");
            }
            after_posting = false;
            continue;
        }

        if after_posting && is_header(line) {
            lines.push("");
        }
        after_posting = line.starts_with("    ") && !line.trim_start().starts_with(';');
        lines.push(line);
    }

    while lines.last() == Some(&"") {
        lines.pop();
    }

    let mut out = lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Appends `block` after `existing`, separated by one blank line.
pub(crate) fn append_block(existing: &mut String, block: &str) {
    if !existing.is_empty() {
        if !existing.ends_with('\n') {
            existing.push('\n');
        }
        if !existing.ends_with("\n\n") {
            existing.push('\n');
        }
    }
    existing.push_str(block);
    if !existing.ends_with('\n') {
        existing.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn normalize_blank_lines_test() {
        let input = "; month:202601\n2026-01-01 \"a\" ; txn:a\n    x:y 1 USD\n    x:z -1 USD\n2026-01-02 \"b\" ; txn:b\n    x:y 1 USD\r\n\r\n\r\n\n2026-01-03 \"c\" ; txn:c\n    x:y 1 USD\n\n\n";
        assert_eq!(
            normalize_blank_lines(input),
            "; month:202601\n2026-01-01 \"a\" ; txn:a\n    x:y 1 USD\n    x:z -1 USD\n\n2026-01-02 \"b\" ; txn:b\n    x:y 1 USD\n\n2026-01-03 \"c\" ; txn:c\n    x:y 1 USD\n"
        );
        assert_eq!(normalize_blank_lines("\n\n"), "");
    }

    #[test]
    fn append_block_test() {
        let mut text = String::new();
        append_block(&mut text, "2026-01-01 \"a\" ; txn:a\n    x:y 1 USD");
        append_block(&mut text, "2026-01-02 \"b\" ; txn:b\n    x:y 1 USD\n");
        assert_eq!(
            text,
            "2026-01-01 \"a\" ; txn:a\n    x:y 1 USD\n\n2026-01-02 \"b\" ; txn:b\n    x:y 1 USD\n"
        );
    }

    #[test]
    fn write_atomic_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ledger.transactions");
        assert_eq!(read_optional(&path).unwrap(), None);

        write_atomic(&path, "first\n").unwrap();
        write_atomic(&path, "second\n").unwrap();
        assert_eq!(read_optional(&path).unwrap(), Some("second\n".to_string()));
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
