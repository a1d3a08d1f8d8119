use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;

use super::mapping::{ColumnMapping, ColumnRole, ExportLayout};
use super::ParseError;
use crate::workflows::engagement::{EngagementCounts, EngagementRecord, OwnerId, PostId};

enum PostedAtFormat {
    DateTime(&'static str),
    Date(&'static str),
}

/// Accepted posted-date formats, tried in order; the first successful parse wins.
/// `%.f` also accepts timestamps without fractional seconds.
const POSTED_AT_FORMATS: &[PostedAtFormat] = &[
    PostedAtFormat::DateTime("%Y-%m-%d %H:%M:%S"),
    PostedAtFormat::Date("%Y-%m-%d"),
    PostedAtFormat::Date("%m/%d/%Y"),
    PostedAtFormat::Date("%d/%m/%Y"),
    PostedAtFormat::DateTime("%Y-%m-%dT%H:%M:%S%.f"),
    PostedAtFormat::DateTime("%Y-%m-%dT%H:%M:%S%.fZ"),
];

pub(crate) fn parse_posted_at(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in POSTED_AT_FORMATS {
        let parsed = match format {
            PostedAtFormat::DateTime(pattern) => {
                NaiveDateTime::parse_from_str(trimmed, pattern).ok()
            }
            PostedAtFormat::Date(pattern) => NaiveDate::parse_from_str(trimmed, pattern)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0)),
        };
        if parsed.is_some() {
            return parsed;
        }
    }

    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.naive_utc())
}

/// Tolerant count parsing: blanks, garbage and negatives become 0, thousands separators are
/// ignored and a trailing `K`/`M` scales the value.
pub(crate) fn parse_count(value: &str) -> u64 {
    let cleaned: String = value.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return 0;
    }

    let (digits, multiplier) = if let Some(rest) = cleaned.strip_suffix('K') {
        (rest, 1_000)
    } else if let Some(rest) = cleaned.strip_suffix('M') {
        (rest, 1_000_000)
    } else {
        (cleaned.as_str(), 1)
    };

    scale_decimal(digits, multiplier)
        .or_else(|| scale_float(digits, multiplier))
        .unwrap_or(0)
}

/// Exact `digits * multiplier` for plain decimal strings, truncating leftover fraction.
fn scale_decimal(digits: &str, multiplier: u64) -> Option<u64> {
    let digits = digits.strip_prefix('+').unwrap_or(digits);
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    let numeric = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !numeric(whole) || !numeric(fraction) {
        return None;
    }

    let whole_value: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut total = whole_value.checked_mul(multiplier)?;

    let mut place = multiplier;
    for digit in fraction.bytes() {
        place /= 10;
        if place == 0 {
            break;
        }
        total = total.checked_add(u64::from(digit - b'0') * place)?;
    }

    Some(total)
}

// exponent notation such as "1e3"
fn scale_float(digits: &str, multiplier: u64) -> Option<u64> {
    let parsed: f64 = digits.parse().ok()?;
    if !parsed.is_finite() || parsed < 0.0 {
        return None;
    }
    Some((parsed * multiplier as f64).trunc() as u64)
}

/// Turns data rows into unscored records according to a resolved header.
pub(crate) struct RowParser<'a> {
    mapping: &'a ColumnMapping,
    layout: ExportLayout,
    owner_id: &'a OwnerId,
}

impl<'a> RowParser<'a> {
    pub(crate) fn new(
        mapping: &'a ColumnMapping,
        layout: ExportLayout,
        owner_id: &'a OwnerId,
    ) -> Self {
        Self {
            mapping,
            layout,
            owner_id,
        }
    }

    pub(crate) fn parse_row(
        &self,
        row: &StringRecord,
        row_number: u64,
    ) -> Result<EngagementRecord, ParseError> {
        let result = match self.layout {
            ExportLayout::PerPost => self.parse_post_row(row),
            ExportLayout::Aggregate => Ok(self.parse_summary_row(row, row_number)),
        };

        result.map_err(|message| ParseError {
            row: row_number,
            message,
            data: self.row_data(row),
        })
    }

    fn parse_post_row(&self, row: &StringRecord) -> Result<EngagementRecord, String> {
        let post_id = match self.mapping.get(ColumnRole::PostId) {
            Some(column) => row.get(column.index).map(str::trim).ok_or_else(|| {
                format!(
                    "row has no value for column '{}' (position {})",
                    column.header,
                    column.index + 1
                )
            })?,
            None => return Err("identifier column is not mapped".to_string()),
        };
        if post_id.is_empty() {
            return Err("identifier cannot be empty".to_string());
        }

        let text = self
            .cell(row, ColumnRole::Text)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(EngagementRecord::unscored(
            self.owner_id.clone(),
            PostId(post_id.to_string()),
            text,
            self.counts(row),
            self.posted_at(row),
        ))
    }

    fn parse_summary_row(&self, row: &StringRecord, row_number: u64) -> EngagementRecord {
        let counts = self.counts(row);
        let day = match self.cell(row, ColumnRole::PostedAt).map(str::trim) {
            Some(value) => value.to_string(),
            None => format!("Day {row_number}"),
        };
        let text = format!(
            "Daily summary for {day}: {} likes, {} replies, {} reposts",
            counts.likes, counts.replies, counts.retweets
        );

        EngagementRecord::unscored(
            self.owner_id.clone(),
            PostId(format!("daily_summary_{row_number}_{}", self.owner_id)),
            Some(text),
            counts,
            self.posted_at(row),
        )
    }

    fn counts(&self, row: &StringRecord) -> EngagementCounts {
        let count = |role| self.cell(row, role).map(parse_count).unwrap_or(0);
        EngagementCounts::new(
            count(ColumnRole::LikeCount),
            count(ColumnRole::RetweetCount),
            count(ColumnRole::ReplyCount),
            count(ColumnRole::MentionCount),
        )
    }

    fn posted_at(&self, row: &StringRecord) -> Option<NaiveDateTime> {
        self.cell(row, ColumnRole::PostedAt).and_then(parse_posted_at)
    }

    fn cell<'r>(&self, row: &'r StringRecord, role: ColumnRole) -> Option<&'r str> {
        self.mapping
            .get(role)
            .and_then(|column| row.get(column.index))
    }

    fn row_data(&self, row: &StringRecord) -> BTreeMap<ColumnRole, String> {
        self.mapping
            .iter()
            .map(|(role, column)| {
                let value = row.get(column.index).unwrap_or_default().to_string();
                (role, value)
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) fn parse_count_for_tests(value: &str) -> u64 {
    parse_count(value)
}

#[cfg(test)]
pub(crate) fn parse_posted_at_for_tests(value: &str) -> Option<NaiveDateTime> {
    parse_posted_at(value)
}
