//! Cell coercion helpers.
//!
//! Every cell coming back from a worksheet is plain text. Each field type has
//! exactly one parse function here and, where the text form is not the value
//! itself, a matching format function.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use super::ValidationError;

/// Delimiter used when splitting a tag cell.
pub const TAG_DELIMITER: char = ',';

/// Separator used when joining tags back into a single cell.
pub const TAG_SEPARATOR: &str = ", ";

/// Date-only format found in older todo sheets.
const LEGACY_DATE_FORMAT: &str = "%d/%m/%Y";

/// Return the trimmed cell at `idx`, or an empty string for a short row.
///
/// The spreadsheet service omits trailing empty cells, so short rows are
/// normal and must read as blank rather than fail.
pub fn cell(raw: &[String], idx: usize) -> &str {
    raw.get(idx).map(|s| s.trim()).unwrap_or("")
}

/// True when every cell of the row is empty or whitespace.
pub fn is_blank(raw: &[String]) -> bool {
    raw.iter().all(|c| c.trim().is_empty())
}

pub fn required_text(
    raw: &[String],
    idx: usize,
    field: &'static str,
) -> Result<String, ValidationError> {
    let value = cell(raw, idx);
    if value.is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    Ok(value.to_string())
}

pub fn optional_text(raw: &[String], idx: usize) -> String {
    cell(raw, idx).to_string()
}

/// Parse a yes/no style flag. Empty reads as `false`.
pub fn flag(value: &str, field: &'static str) -> Result<bool, ValidationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => Ok(true),
        "no" | "n" | "false" | "0" | "" => Ok(false),
        _ => Err(ValidationError::InvalidValue {
            field,
            value: value.to_string(),
            expected: "Yes or No",
        }),
    }
}

pub fn format_flag(value: bool) -> String {
    let text = if value { "Yes" } else { "No" };
    text.to_string()
}

/// Split a tag cell into distinct tags, keeping first-seen order.
pub fn tags(value: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in value.split(TAG_DELIMITER).map(str::trim) {
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

pub fn format_tags(tags: &[String]) -> String {
    tags.join(TAG_SEPARATOR)
}

/// Parse an RFC 3339 timestamp, falling back to the legacy `dd/mm/YYYY` form.
pub fn timestamp(value: &str, field: &'static str) -> Result<DateTime<Utc>, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, LEGACY_DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ValidationError::InvalidValue {
            field,
            value: value.to_string(),
            expected: "an RFC 3339 timestamp or dd/mm/YYYY date",
        })
}

pub fn optional_timestamp(
    value: &str,
    field: &'static str,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        timestamp(value, field).map(Some)
    }
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_cell_short_row_reads_empty() {
        let raw = row(&["a"]);
        assert_eq!(cell(&raw, 0), "a");
        assert_eq!(cell(&raw, 3), "");
    }

    #[test]
    fn test_required_text_rejects_whitespace() {
        let raw = row(&["   "]);
        assert_eq!(
            required_text(&raw, 0, "title"),
            Err(ValidationError::MissingField { field: "title" })
        );
    }

    #[test]
    fn test_blank_row() {
        assert!(is_blank(&row(&["", "  "])));
        assert!(is_blank(&[]));
        assert!(!is_blank(&row(&["", "x"])));
    }

    #[test]
    fn test_flag_values() {
        assert!(flag("Yes", "used").unwrap());
        assert!(flag("true", "used").unwrap());
        assert!(!flag("", "used").unwrap());
        assert!(!flag("No", "used").unwrap());
        assert!(flag("maybe", "used").is_err());
    }

    #[test]
    fn test_tags_dedup_and_order() {
        assert_eq!(tags("rust, cli,,rust , web"), vec!["rust", "cli", "web"]);
        assert!(tags("  ").is_empty());
        assert_eq!(format_tags(&tags("a,b")), "a, b");
    }

    #[test]
    fn test_timestamp_rfc3339() {
        let ts = timestamp("2025-03-15T10:30:00Z", "created_at").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 3, 15, 10, 30, 0).unwrap());
        assert_eq!(format_timestamp(&ts), "2025-03-15T10:30:00Z");
    }

    #[test]
    fn test_timestamp_offset_normalized_to_utc() {
        let ts = timestamp("2025-03-15T12:30:00+02:00", "created_at").unwrap();
        assert_eq!(format_timestamp(&ts), "2025-03-15T10:30:00Z");
    }

    #[test]
    fn test_timestamp_legacy_date() {
        let ts = timestamp("15/03/2025", "created_at").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_timestamp_invalid() {
        assert!(matches!(
            timestamp("yesterday", "created_at"),
            Err(ValidationError::InvalidValue { field: "created_at", .. })
        ));
        assert_eq!(optional_timestamp("", "completed_at"), Ok(None));
    }
}
