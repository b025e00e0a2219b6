//! Export of a review listing as CSV or JSON

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::review::{Column, RawRow, Review};
use crate::time::FILE_STAMP_FORMAT;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }
}

/// `reviews_YYYYMMDD_HHMMSS.<ext>`
pub fn export_file_name(format: ExportFormat, now: NaiveDateTime) -> String {
    format!("reviews_{}.{}", now.format(FILE_STAMP_FORMAT), format.extension())
}

/// One exported JSON record; row identity is not exported
#[derive(Debug, Serialize)]
struct ExportRecord<'a> {
    timestamp: NaiveDateTime,
    rating: u8,
    review: &'a str,
    ai_response: &'a str,
    ai_summary: &'a str,
    recommended_actions: &'a str,
}

impl<'a> From<&'a Review> for ExportRecord<'a> {
    fn from(r: &'a Review) -> Self {
        Self {
            timestamp: r.timestamp,
            rating: r.rating.value(),
            review: &r.review,
            ai_response: &r.ai_response,
            ai_summary: &r.ai_summary,
            recommended_actions: &r.recommended_actions,
        }
    }
}

/// Header row plus one row per review, in store column order
pub fn to_csv(reviews: &[Review]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(Column::ALL.iter().map(|c| c.name()))?;
    for review in reviews {
        let raw = RawRow::from(review);
        writer.write_record(Column::ALL.iter().map(|c| raw.get(*c)))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Internal(format!("CSV export flush failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| Error::Internal(format!("CSV export not UTF-8: {}", e)))
}

/// Pretty-printed array of records with ISO-8601 timestamps
pub fn to_json(reviews: &[Review]) -> Result<String> {
    let records: Vec<ExportRecord<'_>> = reviews.iter().map(ExportRecord::from).collect();
    serde_json::to_string_pretty(&records)
        .map_err(|e| Error::Internal(format!("JSON export failed: {}", e)))
}

pub fn render(format: ExportFormat, reviews: &[Review]) -> Result<String> {
    match format {
        ExportFormat::Csv => to_csv(reviews),
        ExportFormat::Json => to_json(reviews),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::{Rating, RowId};
    use crate::time::parse_timestamp;

    fn sample() -> Review {
        Review {
            id: RowId(3),
            timestamp: parse_timestamp("2024-02-29 23:59:01").unwrap(),
            rating: Rating::new(2).unwrap(),
            review: "Box arrived crushed, contents fine".into(),
            ai_response: "Sorry about the packaging.".into(),
            ai_summary: "Damaged packaging".into(),
            recommended_actions: "• Contact customer immediately\n• Investigate issue".into(),
        }
    }

    #[test]
    fn test_file_name() {
        let now = parse_timestamp("2024-07-04 08:09:10").unwrap();
        assert_eq!(export_file_name(ExportFormat::Csv, now), "reviews_20240704_080910.csv");
        assert_eq!(export_file_name(ExportFormat::Json, now), "reviews_20240704_080910.json");
    }

    #[test]
    fn test_csv_quotes_embedded_commas_and_newlines() {
        let csv = to_csv(&[sample()]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("timestamp,rating,review,ai_response,ai_summary,recommended_actions")
        );
        assert!(csv.contains("2024-02-29 23:59:01,2,\"Box arrived crushed, contents fine\""));
        assert!(csv.contains("\"• Contact customer immediately\n• Investigate issue\""));
    }

    #[test]
    fn test_json_records() {
        let json = to_json(&[sample()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let record = &value[0];
        assert_eq!(record["timestamp"], "2024-02-29T23:59:01");
        assert_eq!(record["rating"], 2);
        assert_eq!(record["ai_summary"], "Damaged packaging");
        assert!(record.get("id").is_none());
    }

    #[test]
    fn test_empty_exports() {
        assert_eq!(to_json(&[]).unwrap(), "[]");
        assert_eq!(
            to_csv(&[]).unwrap(),
            "timestamp,rating,review,ai_response,ai_summary,recommended_actions\n"
        );
    }
}
