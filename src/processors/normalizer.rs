use crate::error::{Result, SyncError};
use crate::models::{CanonicalField, CanonicalRecord, ColumnDictionary, RawTable};
use crate::utils::constants::MISSING_VALUE_SENTINEL;
use chrono::NaiveTime;

/// Maps either source's raw table onto canonical records.
#[derive(Debug, Clone)]
pub struct SchemaNormalizer {
    live: ColumnDictionary,
    archive: ColumnDictionary,
}

impl SchemaNormalizer {
    pub fn new(live: ColumnDictionary) -> Self {
        Self {
            live,
            archive: ColumnDictionary::bulk_archive(),
        }
    }

    /// Normalize the station table tool's export.
    pub fn normalize_live_table(&self, table: &RawTable) -> Result<Vec<CanonicalRecord>> {
        normalize_table(&self.live, table)
    }

    /// Normalize one station table read out of a bulk archive.
    pub fn normalize_archive_table(&self, table: &RawTable) -> Result<Vec<CanonicalRecord>> {
        normalize_table(&self.archive, table)
    }
}

impl Default for SchemaNormalizer {
    fn default() -> Self {
        Self::new(ColumnDictionary::live_table())
    }
}

/// Select the dictionary's columns, rename them and convert every value.
/// Dates are parsed with the dictionary's own formats only. Row numbers in
/// errors are 1-based over data rows.
pub fn normalize_table(dict: &ColumnDictionary, table: &RawTable) -> Result<Vec<CanonicalRecord>> {
    let columns = dict.locate(&table.headers)?;
    let mut records = Vec::with_capacity(table.rows.len());

    for (idx, row) in table.rows.iter().enumerate() {
        let row_number = idx + 1;
        let cell = |field: CanonicalField| cell_for(&columns, row, field);

        let raw_date = cell(CanonicalField::Date);
        let date = dict.parse_date(raw_date).ok_or_else(|| SyncError::Normalization {
            column: CanonicalField::Date.header().to_string(),
            value: raw_date.to_string(),
            row: row_number,
        })?;

        let raw_hour = cell(CanonicalField::Hour);
        let hour = convert_hour(raw_hour).ok_or_else(|| SyncError::Normalization {
            column: CanonicalField::Hour.header().to_string(),
            value: raw_hour.to_string(),
            row: row_number,
        })?;

        let mut record = CanonicalRecord::new(date, hour);
        for field in CanonicalField::MEASUREMENTS {
            let raw = cell(field);
            let value = normalize_measurement(raw).map_err(|_| SyncError::Normalization {
                column: field.header().to_string(),
                value: raw.to_string(),
                row: row_number,
            })?;
            record.set_measurement(field, value);
        }
        records.push(record);
    }

    Ok(records)
}

fn cell_for<'a>(columns: &[(CanonicalField, usize)], row: &'a [String], field: CanonicalField) -> &'a str {
    columns
        .iter()
        .find(|(f, _)| *f == field)
        .and_then(|(_, col)| row.get(*col))
        .map(String::as_str)
        .unwrap_or("")
}

/// Accepts `HHMM`, `HHMM UTC`, `HH:MM`, `HH:MM:SS` and unpadded hour-minute
/// integers such as `100` for 01:00.
pub fn convert_hour(value: &str) -> Option<NaiveTime> {
    let mut value = value.trim();
    let suffix_at = value.len().saturating_sub(3);
    if value
        .get(suffix_at..)
        .is_some_and(|suffix| suffix.eq_ignore_ascii_case("utc"))
    {
        value = value[..suffix_at].trim_end();
    }
    if value.is_empty() {
        return None;
    }

    if value.contains(':') {
        return NaiveTime::parse_from_str(value, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
            .ok();
    }

    if value.len() > 4 || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let padded = format!("{:0>4}", value);
    let hour: u32 = padded[..2].parse().ok()?;
    let minute: u32 = padded[2..].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Canonical text for a measurement cell: `None` for blanks and the missing
/// sentinel, decimal point instead of comma, and a leading zero before a
/// bare fraction. Non-numeric text is an error.
pub fn normalize_measurement(value: &str) -> std::result::Result<Option<String>, String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("null") || value == "-" {
        return Ok(None);
    }

    let mut text = value.replace(',', ".");
    if let Some(rest) = text.strip_prefix("-.") {
        text = format!("-0.{}", rest);
    } else if text.starts_with('.') {
        text = format!("0{}", text);
    }

    let number: f64 = text.parse().map_err(|_| value.to_string())?;
    if !number.is_finite() {
        return Err(value.to_string());
    }
    if number == MISSING_VALUE_SENTINEL {
        return Ok(None);
    }
    Ok(Some(text))
}
