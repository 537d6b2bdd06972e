//! CSV serialization with per-category flattening.
//!
//! Each category flattens independently: a list of uniform map-like
//! records becomes one row per record, a single map becomes one row, and
//! scalar leaves become a one-row key/value table. Per-category files are
//! bundled into one zip archive. Output targets spreadsheet tools: a
//! semicolon delimiter, a UTF-8 byte-order mark, and sanitized cells.

use crate::storage::StorageError;
use regex::Regex;
use sentra_types::DataCategory;
use serde_json::Value;
use std::io::Write;
use std::sync::OnceLock;
use zip::write::FileOptions;
use zip::ZipWriter;

const DELIMITER: char = ';';
const BOM: &str = "\u{FEFF}";
const MAX_CELL_LEN: usize = 500;

/// Flatten one category value into rows, header first.
pub fn flatten_category(value: &Value) -> Vec<Vec<String>> {
    match value {
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
            // Uniform record list: union of keys in first-seen order.
            let mut headers: Vec<String> = Vec::new();
            for item in items {
                if let Some(obj) = item.as_object() {
                    for key in obj.keys() {
                        if !headers.iter().any(|h| h == key) {
                            headers.push(key.clone());
                        }
                    }
                }
            }
            let mut rows = Vec::with_capacity(items.len() + 1);
            rows.push(headers.clone());
            for item in items {
                let obj = item.as_object().expect("checked above");
                rows.push(
                    headers
                        .iter()
                        .map(|h| cell_text(obj.get(h).unwrap_or(&Value::Null)))
                        .collect(),
                );
            }
            rows
        }
        Value::Array(items) => {
            // Mixed or scalar list: index it.
            let mut rows = Vec::with_capacity(items.len() + 1);
            rows.push(vec!["index".to_string(), "value".to_string()]);
            for (i, item) in items.iter().enumerate() {
                rows.push(vec![i.to_string(), cell_text(item)]);
            }
            rows
        }
        Value::Object(map) => {
            let headers: Vec<String> = map.keys().cloned().collect();
            let row: Vec<String> = map.values().map(cell_text).collect();
            vec![headers, row]
        }
        other => vec![
            vec!["key".to_string(), "value".to_string()],
            vec!["value".to_string(), cell_text(other)],
        ],
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => sanitize_cell(s),
        nested => sanitize_cell(&nested.to_string()),
    }
}

/// Sanitize a cell for spreadsheet output: strip HTML, drop control
/// characters, fold common typographic punctuation to ASCII, cap length.
pub fn sanitize_cell(raw: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("static pattern"));

    let stripped = tags.replace_all(raw, "");
    let mut out = String::with_capacity(stripped.len());
    for c in stripped.chars() {
        match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' => out.push('"'),
            '\u{2013}' | '\u{2014}' | '\u{2212}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' => out.push(' '),
            c if c.is_control() => out.push(' '),
            c => out.push(c),
        }
    }

    let trimmed = out.trim();
    if trimmed.chars().count() > MAX_CELL_LEN {
        let mut capped: String = trimmed.chars().take(MAX_CELL_LEN).collect();
        capped.push_str("...");
        capped
    } else {
        trimmed.to_string()
    }
}

/// Render rows into CSV text (BOM, semicolon delimiter).
pub(crate) fn write_csv(rows: &[Vec<String>]) -> String {
    let mut out = String::from(BOM);
    for row in rows {
        let line: Vec<String> = row.iter().map(|cell| quote(cell)).collect();
        out.push_str(&line.join(&DELIMITER.to_string()));
        out.push_str("\r\n");
    }
    out
}

fn quote(cell: &str) -> String {
    if cell.contains(DELIMITER) || cell.contains('"') || cell.contains('\n') || cell.contains('\r')
    {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// Bundle per-category CSV files into one zip archive.
pub(crate) fn build_csv_archive(
    categories: &[(DataCategory, Value)],
) -> Result<Vec<u8>, StorageError> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut archive = ZipWriter::new(&mut buffer);
        let options = FileOptions::default();
        for (category, value) in categories {
            let rows = flatten_category(value);
            let csv = write_csv(&rows);
            archive
                .start_file(format!("{}.csv", category), options)
                .map_err(zip_err)?;
            archive.write_all(csv.as_bytes())?;
        }
        archive.finish().map_err(zip_err)?;
    }
    Ok(buffer.into_inner())
}

fn zip_err(e: zip::result::ZipError) -> StorageError {
    StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_uniform_record_list_row_count() {
        let value = json!([
            {"id": 1, "name": "a"},
            {"id": 2, "name": "b"},
            {"id": 3, "name": "c"},
        ]);
        let rows = flatten_category(&value);
        // Header plus exactly one row per record.
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], vec!["id", "name"]);
        assert_eq!(rows[2], vec!["2", "b"]);
    }

    #[test]
    fn test_union_headers_for_ragged_records() {
        let value = json!([
            {"id": 1},
            {"id": 2, "extra": "x"},
        ]);
        let rows = flatten_category(&value);
        assert_eq!(rows[0], vec!["id", "extra"]);
        assert_eq!(rows[1], vec!["1", ""]);
        assert_eq!(rows[2], vec!["2", "x"]);
    }

    #[test]
    fn test_single_map_is_one_row() {
        let rows = flatten_category(&json!({"email": "a@b.c", "name": "Mira"}));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_scalar_leaf_is_key_value_table() {
        let rows = flatten_category(&json!("just text"));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["key", "value"]);
        assert_eq!(rows[1], vec!["value", "just text"]);
    }

    #[test]
    fn test_sanitize_strips_html_and_folds_punctuation() {
        assert_eq!(
            sanitize_cell("<b>bold</b> \u{201C}quote\u{201D} \u{2014} done\u{2026}"),
            "bold \"quote\" - done..."
        );
    }

    #[test]
    fn test_sanitize_drops_control_chars() {
        assert_eq!(sanitize_cell("a\x00b\nc"), "a b c");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let out = sanitize_cell(&"x".repeat(2000));
        assert_eq!(out.chars().count(), MAX_CELL_LEN + 3);
    }

    #[test]
    fn test_csv_has_bom_and_semicolons() {
        let csv = write_csv(&[
            vec!["a".to_string(), "b".to_string()],
            vec!["1".to_string(), "with;delimiter".to_string()],
        ]);
        assert!(csv.starts_with(BOM));
        assert!(csv.contains("a;b"));
        assert!(csv.contains("\"with;delimiter\""));
    }

    #[test]
    fn test_archive_contains_one_file_per_category() {
        let bytes = build_csv_archive(&[
            (DataCategory::Profile, json!({"name": "Mira"})),
            (DataCategory::Consents, json!([{"type": "analytics"}])),
        ])
        .unwrap();

        let mut archive =
            zip::ZipArchive::new(std::io::Cursor::new(bytes)).expect("valid archive");
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"profile.csv".to_string()));
        assert!(names.contains(&"consents.csv".to_string()));
    }
}
