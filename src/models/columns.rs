use crate::error::{Result, SyncError};
use crate::models::record::DATE_FORMAT;
use crate::models::CanonicalField;
use crate::utils::constants::{ARCHIVE_DATE_FORMATS, LIVE_DATE_FORMAT};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Header must equal the dictionary entry.
    #[default]
    Exact,
    /// Header must start with the dictionary entry, ignoring case.
    Prefix,
}

/// Maps every canonical field to the column a source uses for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ColumnDictionary {
    #[validate(length(min = 1))]
    pub date: String,
    #[validate(length(min = 1))]
    pub hour: String,
    #[validate(length(min = 1))]
    pub rain: String,
    #[validate(length(min = 1))]
    pub pressure: String,
    #[validate(length(min = 1))]
    pub radiation: String,
    #[validate(length(min = 1))]
    pub temperature: String,
    #[validate(length(min = 1))]
    pub humidity: String,
    #[serde(default)]
    pub match_mode: MatchMode,
    /// `chrono` formats for the date column, tried in order. Each must be
    /// unambiguous for the source it describes.
    #[serde(default = "default_live_date_formats")]
    #[validate(length(min = 1))]
    pub date_formats: Vec<String>,
}

fn default_live_date_formats() -> Vec<String> {
    vec![LIVE_DATE_FORMAT.to_string()]
}

impl ColumnDictionary {
    /// Column names of the station table tool's CSV export.
    pub fn live_table() -> Self {
        Self {
            date: "Data".to_string(),
            hour: "Hora (UTC)".to_string(),
            rain: "Chuva (mm)".to_string(),
            pressure: "Pressao Ins. (hPa)".to_string(),
            radiation: "Radiacao (KJ/m²)".to_string(),
            temperature: "Temp. Ins. (C)".to_string(),
            humidity: "Umi. Ins. (%)".to_string(),
            match_mode: MatchMode::Exact,
            date_formats: default_live_date_formats(),
        }
    }

    /// Header prefixes of the yearly bulk archive CSVs; the exact wording and
    /// unit suffixes change between years.
    pub fn bulk_archive() -> Self {
        Self {
            date: "Data".to_string(),
            hour: "Hora".to_string(),
            rain: "PRECIPITAÇÃO TOTAL".to_string(),
            pressure: "PRESSAO ATMOSFERICA AO NIVEL DA ESTACAO".to_string(),
            radiation: "RADIACAO GLOBAL".to_string(),
            temperature: "TEMPERATURA DO AR - BULBO SECO".to_string(),
            humidity: "UMIDADE RELATIVA DO AR, HORARIA".to_string(),
            match_mode: MatchMode::Prefix,
            date_formats: ARCHIVE_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Identity mapping over the canonical headers.
    pub fn canonical() -> Self {
        Self {
            date: CanonicalField::Date.header().to_string(),
            hour: CanonicalField::Hour.header().to_string(),
            rain: CanonicalField::Rain.header().to_string(),
            pressure: CanonicalField::Pressure.header().to_string(),
            radiation: CanonicalField::Radiation.header().to_string(),
            temperature: CanonicalField::Temperature.header().to_string(),
            humidity: CanonicalField::Humidity.header().to_string(),
            match_mode: MatchMode::Exact,
            date_formats: vec![DATE_FORMAT.to_string()],
        }
    }

    pub fn column_for(&self, field: CanonicalField) -> &str {
        match field {
            CanonicalField::Date => &self.date,
            CanonicalField::Hour => &self.hour,
            CanonicalField::Rain => &self.rain,
            CanonicalField::Pressure => &self.pressure,
            CanonicalField::Radiation => &self.radiation,
            CanonicalField::Temperature => &self.temperature,
            CanonicalField::Humidity => &self.humidity,
        }
    }

    fn matches(&self, entry: &str, header: &str) -> bool {
        let header = header.trim().trim_start_matches('\u{feff}');
        match self.match_mode {
            MatchMode::Exact => header == entry,
            MatchMode::Prefix => header.to_lowercase().starts_with(&entry.to_lowercase()),
        }
    }

    /// Parse a date cell with the first format that accepts it.
    pub fn parse_date(&self, value: &str) -> Option<NaiveDate> {
        let value = value.trim();
        self.date_formats
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
    }

    /// Resolve the column index of every canonical field in `headers`.
    /// The first matching header wins.
    pub fn locate(&self, headers: &[String]) -> Result<Vec<(CanonicalField, usize)>> {
        CanonicalField::ALL
            .iter()
            .map(|field| {
                let entry = self.column_for(*field);
                headers
                    .iter()
                    .position(|h| self.matches(entry, h))
                    .map(|idx| (*field, idx))
                    .ok_or_else(|| SyncError::MissingColumn(entry.to_string()))
            })
            .collect()
    }
}

impl Default for ColumnDictionary {
    fn default() -> Self {
        Self::live_table()
    }
}
