//! CSV encoding for export rows.

use super::ExportRow;

/// Byte-order mark so spreadsheet tools detect UTF-8.
pub const UTF8_BOM: &str = "\u{FEFF}";

pub const CSV_HEADER: &str =
    "Level,ID,Task Name,Start Date,End Date,Duration,Progress,Priority,Status,Parent,Notes";

/// Quote a field when it contains a delimiter, quote or line break.
pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Encode rows as CSV: BOM, header, then one line per row.
pub fn to_csv(rows: &[ExportRow]) -> String {
    let mut out = String::with_capacity(UTF8_BOM.len() + CSV_HEADER.len() + rows.len() * 96);
    out.push_str(UTF8_BOM);
    out.push_str(CSV_HEADER);
    out.push('\n');

    for row in rows {
        let fields = [
            row.level.to_string(),
            escape_field(row.id.as_str()),
            escape_field(&row.name),
            row.start_date.clone(),
            row.end_date.clone(),
            row.duration.to_string(),
            format!("{}%", row.progress_percent),
            escape_field(&row.priority),
            row.status.clone(),
            escape_field(&row.parent_name),
            escape_field(&row.notes),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("Pour, slab"), "\"Pour, slab\"");
        assert_eq!(escape_field("6\" pipe"), "\"6\"\" pipe\"");
        assert_eq!(escape_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn test_empty_export_has_bom_and_header() {
        let csv = to_csv(&[]);
        assert!(csv.starts_with('\u{FEFF}'));
        assert_eq!(csv.trim_start_matches('\u{FEFF}'), format!("{CSV_HEADER}\n"));
    }
}
