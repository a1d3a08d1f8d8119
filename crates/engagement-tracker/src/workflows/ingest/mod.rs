//! CSV ingestion for analytics exports.
//!
//! Header cells are mapped to column roles through a fixed alias table, so exports that
//! name their columns differently ("Retweets" vs "Reposts") parse the same way. Account
//! overview exports, which carry one row per day instead of one row per post, are detected
//! from their indicator columns and turned into synthetic summary records. A malformed row
//! never fails the upload: it is reported as a [`ParseError`] and the remaining rows are
//! still parsed.

mod mapping;
mod normalizer;
mod parser;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::workflows::engagement::{EngagementRecord, OwnerId};
use normalizer::{is_blank_row, normalize_header, RowNumbering};
use parser::RowParser;

pub use mapping::{ColumnRole, ExportLayout};

/// Whole-file failures; no records or row errors are produced alongside them.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read analytics export: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV file must be UTF-8 encoded (invalid byte at offset {offset})")]
    Encoding { offset: usize },
    #[error("CSV file is empty")]
    EmptyInput,
    #[error("unrecognized CSV format: missing essential columns {}", role_list(.missing))]
    UnrecognizedFormat { missing: Vec<ColumnRole> },
    #[error("invalid CSV header: {0}")]
    Csv(#[from] csv::Error),
}

fn role_list(roles: &[ColumnRole]) -> String {
    roles
        .iter()
        .map(|role| role.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Row-level problem collected during ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    /// 1-based CSV row; the header is row 1 and empty lines count as rows.
    pub row: u64,
    pub message: String,
    /// Raw cells for every resolved column role; empty when the row could not be read.
    pub data: BTreeMap<ColumnRole, String>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {}: {}", self.row, self.message)
    }
}

/// Parsed export: unscored records and row errors, both in input order.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub layout: ExportLayout,
    pub records: Vec<EngagementRecord>,
    pub errors: Vec<ParseError>,
}

pub struct CsvEngagementImporter;

impl CsvEngagementImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        owner_id: &OwnerId,
    ) -> Result<IngestOutcome, IngestError> {
        let raw = std::fs::read(path)?;
        Self::from_bytes(&raw, owner_id)
    }

    /// Parse raw upload bytes for `owner_id`. Records come back with a score of 0; scoring
    /// against the owner's weights is a separate step.
    pub fn from_bytes(raw: &[u8], owner_id: &OwnerId) -> Result<IngestOutcome, IngestError> {
        let text = std::str::from_utf8(raw).map_err(|err| IngestError::Encoding {
            offset: err.valid_up_to(),
        })?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());
        let mut rows = reader.records();

        let header = match rows.next() {
            Some(record) => record?,
            None => return Err(IngestError::EmptyInput),
        };
        let mut numbering = RowNumbering::default();
        numbering.consumed(&header);
        let header: Vec<String> = header.iter().map(normalize_header).collect();

        let (mapping, layout) = mapping::resolve_layout(&header)
            .map_err(|missing| IngestError::UnrecognizedFormat { missing })?;
        debug!(?layout, columns = header.len(), "detected export layout");

        let row_parser = RowParser::new(&mapping, layout, owner_id);
        let mut records = Vec::new();
        let mut errors = Vec::new();

        for (ordinal, row) in rows.enumerate() {
            // header is row 1 and data rows follow it
            let fallback_row = ordinal as u64 + 2;
            let row = match row {
                Ok(row) => row,
                Err(err) => {
                    errors.push(ParseError {
                        row: numbering.row_number(err.position(), fallback_row),
                        message: err.to_string(),
                        data: BTreeMap::new(),
                    });
                    continue;
                }
            };

            let row_number = numbering.row_number(row.position(), fallback_row);
            numbering.consumed(&row);
            if is_blank_row(&row) {
                continue;
            }

            match row_parser.parse_row(&row, row_number) {
                Ok(record) => records.push(record),
                Err(error) => errors.push(error),
            }
        }

        Ok(IngestOutcome {
            layout,
            records,
            errors,
        })
    }
}

/// Shorthand for [`CsvEngagementImporter::from_bytes`].
pub fn ingest(raw: &[u8], owner_id: &OwnerId) -> Result<IngestOutcome, IngestError> {
    CsvEngagementImporter::from_bytes(raw, owner_id)
}

/// Reference export offered to owners as a template.
pub const SAMPLE_CSV: &str = "Tweet ID,Tweet text,Posted date,Likes,Retweets,Replies,Mentions
1234567890123456789,This is a sample tweet,2024-01-15 14:30:00,42,12,8,3
9876543210987654321,Another sample tweet with engagement,2024-01-14 10:15:00,128,45,23,7
5556667778889990000,Third sample tweet,2024-01-13 16:45:00,67,18,12,2
";

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn owner() -> OwnerId {
        OwnerId("owner-1".to_string())
    }

    fn ingest(csv: &str) -> IngestOutcome {
        CsvEngagementImporter::from_bytes(csv.as_bytes(), &owner()).expect("ingest succeeds")
    }

    #[test]
    fn parse_count_handles_export_number_formats() {
        assert_eq!(parser::parse_count_for_tests("1,234"), 1234);
        assert_eq!(parser::parse_count_for_tests("2.5K"), 2500);
        assert_eq!(parser::parse_count_for_tests("1.2M"), 1_200_000);
        assert_eq!(parser::parse_count_for_tests(" 42 "), 42);
        assert_eq!(parser::parse_count_for_tests("12.7"), 12);
        assert_eq!(parser::parse_count_for_tests("1e3"), 1000);
        assert_eq!(parser::parse_count_for_tests(""), 0);
        assert_eq!(parser::parse_count_for_tests("abc"), 0);
        assert_eq!(parser::parse_count_for_tests("-5"), 0);
        assert_eq!(parser::parse_count_for_tests("NaN"), 0);
    }

    #[test]
    fn parse_posted_at_tries_formats_in_order() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        let midnight = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        assert_eq!(
            parser::parse_posted_at_for_tests("2024-01-15 14:30:00"),
            Some(expected)
        );
        assert_eq!(
            parser::parse_posted_at_for_tests("2024-01-15T14:30:00"),
            Some(expected)
        );
        assert_eq!(
            parser::parse_posted_at_for_tests("2024-01-15T14:30:00Z"),
            Some(expected)
        );
        assert_eq!(
            parser::parse_posted_at_for_tests("2024-01-15T14:30:00.000Z"),
            Some(expected)
        );
        assert_eq!(
            parser::parse_posted_at_for_tests("2024-01-15T16:30:00+02:00"),
            Some(expected)
        );
        assert_eq!(
            parser::parse_posted_at_for_tests("2024-01-15"),
            Some(midnight)
        );
        assert_eq!(
            parser::parse_posted_at_for_tests("01/15/2024"),
            Some(midnight)
        );
        assert_eq!(
            parser::parse_posted_at_for_tests("15/01/2024"),
            Some(midnight)
        );
        assert!(parser::parse_posted_at_for_tests("  ").is_none());
        assert!(parser::parse_posted_at_for_tests("yesterday").is_none());
    }

    #[test]
    fn ambiguous_slash_dates_prefer_month_first() {
        let parsed = parser::parse_posted_at_for_tests("02/03/2024").expect("parses");
        assert_eq!(parsed.date(), NaiveDate::from_ymd_opt(2024, 2, 3).unwrap());
    }

    #[test]
    fn minimal_header_yields_unscored_record() {
        let outcome = ingest("Tweet ID,Likes,Retweets,Replies\n1,5,2,1\n");

        assert_eq!(outcome.layout, ExportLayout::PerPost);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert_eq!(record.post_id.0, "1");
        assert_eq!(record.counts.likes, 5);
        assert_eq!(record.counts.retweets, 2);
        assert_eq!(record.counts.replies, 1);
        assert_eq!(record.counts.mentions, 0);
        assert_eq!(record.engagement_score, 0);
        assert!(record.text.is_none());
        assert!(record.posted_at.is_none());
    }

    #[test]
    fn blank_rows_are_skipped_without_errors() {
        let outcome = ingest("Tweet ID,Likes,Retweets,Replies\n1,5,2,1\n , , , \n2,1,1,1\n");
        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn empty_identifier_is_a_row_error() {
        let outcome = ingest("Tweet ID,Likes,Retweets,Replies\n1,5,2,1\n  ,3,3,3\n3,1,0,0\n");

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.errors.len(), 1);
        let error = &outcome.errors[0];
        assert_eq!(error.row, 3);
        assert_eq!(error.message, "identifier cannot be empty");
        assert_eq!(error.data.get(&ColumnRole::LikeCount).map(String::as_str), Some("3"));
        assert_eq!(error.to_string(), "Row 3: identifier cannot be empty");
    }

    #[test]
    fn short_row_missing_identifier_cell_is_a_row_error() {
        let outcome = ingest("Likes,Retweets,Replies,Tweet ID\n1,2,3\n4,5,6,p-2\n");

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].message.contains("Tweet ID"));
        assert_eq!(
            outcome.errors[0].data.get(&ColumnRole::PostId).map(String::as_str),
            Some("")
        );
    }

    #[test]
    fn unparseable_fields_degrade_to_defaults() {
        let outcome = ingest(
            "Tweet ID,Posted date,Likes,Retweets,Replies,Mentions\n9,someday,lots,1.5K,,n/a\n",
        );

        assert!(outcome.errors.is_empty());
        let record = &outcome.records[0];
        assert_eq!(record.counts.likes, 0);
        assert_eq!(record.counts.retweets, 1500);
        assert_eq!(record.counts.replies, 0);
        assert_eq!(record.counts.mentions, 0);
        assert!(record.posted_at.is_none());
    }

    #[test]
    fn text_and_posted_date_are_captured() {
        let outcome = ingest(SAMPLE_CSV);

        assert_eq!(outcome.records.len(), 3);
        let first = &outcome.records[0];
        assert_eq!(first.text.as_deref(), Some("This is a sample tweet"));
        assert_eq!(first.counts.mentions, 3);
        assert_eq!(
            first.posted_at,
            NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(14, 30, 0)
        );
    }

    #[test]
    fn account_overview_rows_become_daily_summaries() {
        let outcome = ingest(
            "Date,Impressions,Likes,Engagements,Replies,Reposts\n\
2024-03-01,1200,40,55,6,9\n\
2024-03-02,900,1.1K,20,2,3\n",
        );

        assert_eq!(outcome.layout, ExportLayout::Aggregate);
        assert_eq!(outcome.records.len(), 2);
        let first = &outcome.records[0];
        assert_eq!(first.post_id.0, "daily_summary_2_owner-1");
        assert_eq!(
            first.text.as_deref(),
            Some("Daily summary for 2024-03-01: 40 likes, 6 replies, 9 reposts")
        );
        assert_eq!(first.counts.mentions, 0);
        assert_eq!(outcome.records[1].counts.likes, 1100);
        assert_eq!(outcome.records[1].post_id.0, "daily_summary_3_owner-1");
    }

    #[test]
    fn multi_line_text_keeps_row_numbers_per_record() {
        let outcome = ingest(
            "Tweet ID,Tweet text,Likes,Retweets,Replies\n\
1,\"line one\nline two\nline three\",5,2,1\n\
  ,bad,1,1,1\n",
        );

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(
            outcome.records[0].text.as_deref(),
            Some("line one\nline two\nline three")
        );
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].row, 3);
    }

    #[test]
    fn multi_line_cells_do_not_shift_daily_summary_ids() {
        let outcome = ingest(
            "Date,Impressions,Likes,Notes\n\
2024-03-01,1200,40,\"launch day\nsecond note\"\n\
2024-03-02,900,12,quiet\n",
        );

        assert_eq!(outcome.layout, ExportLayout::Aggregate);
        let ids: Vec<&str> = outcome.records.iter().map(|r| r.post_id.0.as_str()).collect();
        assert_eq!(
            ids,
            vec!["daily_summary_2_owner-1", "daily_summary_3_owner-1"]
        );
    }

    #[test]
    fn empty_lines_still_count_as_rows() {
        let outcome = ingest("Tweet ID,Likes,Retweets,Replies\n1,5,2,1\n\n  ,3,3,3\n");

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].row, 4);
    }

    #[test]
    fn aliased_headers_parse_like_canonical_headers() {
        let rows = "\
101,first post,2024-01-15 14:30:00,42,12,8,3\n\
102,second post,2024-01-14,1.2K,\"1,050\",0,7\n";
        let canonical = ingest(&format!(
            "Tweet ID,Tweet text,Posted date,Likes,Retweets,Replies,Mentions\n{rows}"
        ));
        let aliased = ingest(&format!(
            "id,content,created_at,likes_count,Reposts,reply_count,mentions\n{rows}"
        ));

        assert!(canonical.errors.is_empty());
        assert!(aliased.errors.is_empty());
        assert_eq!(aliased.layout, ExportLayout::PerPost);
        assert_eq!(aliased.records.len(), 2);
        for (alias, canon) in aliased.records.iter().zip(&canonical.records) {
            assert_eq!(alias.post_id, canon.post_id);
            assert_eq!(alias.text, canon.text);
            assert_eq!(alias.posted_at, canon.posted_at);
            assert_eq!(alias.counts, canon.counts);
        }
        assert_eq!(aliased.records[1].counts.likes, 1200);
        assert_eq!(aliased.records[1].counts.retweets, 1050);
    }

    #[test]
    fn account_overview_without_dates_names_rows_by_number() {
        let outcome = ingest("Impressions,Likes\n100,4\n");
        assert_eq!(
            outcome.records[0].text.as_deref(),
            Some("Daily summary for Day 2: 4 likes, 0 replies, 0 reposts")
        );
        assert!(outcome.records[0].posted_at.is_none());
    }

    #[test]
    fn byte_order_mark_does_not_hide_the_first_column() {
        let outcome = ingest("\u{feff}Tweet ID,Likes,Retweets,Replies\n1,5,2,1\n");
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn non_utf8_input_is_rejected() {
        let error = CsvEngagementImporter::from_bytes(b"Tweet ID,Likes\n\xff\xfe,1\n", &owner())
            .expect_err("encoding error");
        assert!(matches!(error, IngestError::Encoding { offset: 15 }));
    }

    #[test]
    fn empty_input_is_rejected() {
        let error =
            CsvEngagementImporter::from_bytes(b"", &owner()).expect_err("empty input error");
        assert!(matches!(error, IngestError::EmptyInput));
    }

    #[test]
    fn unknown_header_is_rejected_with_missing_roles() {
        let error = CsvEngagementImporter::from_bytes(b"Name,Score\nx,1\n", &owner())
            .expect_err("unrecognized format");
        match error {
            IngestError::UnrecognizedFormat { missing } => {
                assert_eq!(missing.len(), 4);
                assert_eq!(missing[0], ColumnRole::PostId);
            }
            other => panic!("expected unrecognized format, got {other:?}"),
        }
    }

    #[test]
    fn importer_from_path_propagates_io_errors() {
        let error = CsvEngagementImporter::from_path("./does-not-exist.csv", &owner())
            .expect_err("expected io error");

        match error {
            IngestError::Io(_) => {}
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
