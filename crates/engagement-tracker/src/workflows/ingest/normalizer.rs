use csv::{Position, StringRecord};

pub(crate) fn normalize_header(value: &str) -> String {
    value.replace(['\u{feff}', '\u{200b}'], "").trim().to_string()
}

pub(crate) fn is_blank_row(record: &StringRecord) -> bool {
    record.iter().all(|cell| cell.trim().is_empty())
}

/// Maps reader positions to spreadsheet row numbers.
///
/// The reader reports the physical line a record starts on. Quoted cells may span several
/// lines, so the line breaks inside earlier records are subtracted again. Empty lines keep
/// counting as rows.
#[derive(Debug, Default)]
pub(crate) struct RowNumbering {
    embedded_breaks: u64,
}

impl RowNumbering {
    pub(crate) fn row_number(&self, position: Option<&Position>, fallback: u64) -> u64 {
        position
            .map(|position| position.line().saturating_sub(self.embedded_breaks))
            .unwrap_or(fallback)
    }

    pub(crate) fn consumed(&mut self, record: &StringRecord) {
        let breaks: usize = record.iter().map(|cell| cell.matches('\n').count()).sum();
        self.embedded_breaks += breaks as u64;
    }
}
