use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const HOUR_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalField {
    Date,
    Hour,
    Rain,
    Pressure,
    Radiation,
    Temperature,
    Humidity,
}

impl CanonicalField {
    /// Columns in the order they are written to a station series.
    pub const ALL: [CanonicalField; 7] = [
        CanonicalField::Date,
        CanonicalField::Hour,
        CanonicalField::Rain,
        CanonicalField::Pressure,
        CanonicalField::Radiation,
        CanonicalField::Temperature,
        CanonicalField::Humidity,
    ];

    pub const MEASUREMENTS: [CanonicalField; 5] = [
        CanonicalField::Rain,
        CanonicalField::Pressure,
        CanonicalField::Radiation,
        CanonicalField::Temperature,
        CanonicalField::Humidity,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            CanonicalField::Date => "Date",
            CanonicalField::Hour => "Hour",
            CanonicalField::Rain => "Rain",
            CanonicalField::Pressure => "Pressure",
            CanonicalField::Radiation => "Radiation",
            CanonicalField::Temperature => "Temperature",
            CanonicalField::Humidity => "Humidity",
        }
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.header())
    }
}

/// One hourly observation in the canonical shape shared by every source.
///
/// Measurements stay textual: sources disagree on decimal separators and
/// missing-value sentinels, and the normalizer only canonicalizes the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    #[serde(rename = "Date", with = "date_format")]
    pub date: NaiveDate,

    #[serde(rename = "Hour", with = "hour_format")]
    pub hour: NaiveTime,

    #[serde(rename = "Rain")]
    pub rain: Option<String>,

    #[serde(rename = "Pressure")]
    pub pressure: Option<String>,

    #[serde(rename = "Radiation")]
    pub radiation: Option<String>,

    #[serde(rename = "Temperature")]
    pub temperature: Option<String>,

    #[serde(rename = "Humidity")]
    pub humidity: Option<String>,
}

impl CanonicalRecord {
    pub fn new(date: NaiveDate, hour: NaiveTime) -> Self {
        Self {
            date,
            hour,
            rain: None,
            pressure: None,
            radiation: None,
            temperature: None,
            humidity: None,
        }
    }

    pub fn with_measurement(mut self, field: CanonicalField, value: Option<String>) -> Self {
        self.set_measurement(field, value);
        self
    }

    pub fn set_measurement(&mut self, field: CanonicalField, value: Option<String>) {
        match field {
            CanonicalField::Rain => self.rain = value,
            CanonicalField::Pressure => self.pressure = value,
            CanonicalField::Radiation => self.radiation = value,
            CanonicalField::Temperature => self.temperature = value,
            CanonicalField::Humidity => self.humidity = value,
            CanonicalField::Date | CanonicalField::Hour => {}
        }
    }

    pub fn measurement(&self, field: CanonicalField) -> Option<&str> {
        match field {
            CanonicalField::Rain => self.rain.as_deref(),
            CanonicalField::Pressure => self.pressure.as_deref(),
            CanonicalField::Radiation => self.radiation.as_deref(),
            CanonicalField::Temperature => self.temperature.as_deref(),
            CanonicalField::Humidity => self.humidity.as_deref(),
            CanonicalField::Date | CanonicalField::Hour => None,
        }
    }

    /// Sort key for the (Date, Hour) ordering of a series.
    pub fn timestamp(&self) -> (NaiveDate, NaiveTime) {
        (self.date, self.hour)
    }

    /// Cells in `CanonicalField::ALL` order, as written to disk.
    pub fn to_cells(&self) -> Vec<String> {
        CanonicalField::ALL
            .iter()
            .map(|field| match field {
                CanonicalField::Date => self.date.format(DATE_FORMAT).to_string(),
                CanonicalField::Hour => self.hour.format(HOUR_FORMAT).to_string(),
                other => self.measurement(*other).unwrap_or_default().to_string(),
            })
            .collect()
    }
}

mod date_format {
    use super::DATE_FORMAT;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(serde::de::Error::custom)
    }
}

mod hour_format {
    use super::HOUR_FORMAT;
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hour: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hour.format(HOUR_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.trim();
        NaiveTime::parse_from_str(s, HOUR_FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_cells_follow_header_order() {
        let record = CanonicalRecord::new(
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
        )
        .with_measurement(CanonicalField::Temperature, Some("23.4".to_string()))
        .with_measurement(CanonicalField::Rain, Some("0.2".to_string()));

        assert_eq!(
            record.to_cells(),
            vec!["2024-05-02", "13:00", "0.2", "", "", "23.4", ""]
        );
    }

    #[test]
    fn test_date_and_hour_are_not_measurements() {
        let mut record = CanonicalRecord::new(
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        );
        record.set_measurement(CanonicalField::Date, Some("ignored".to_string()));

        assert_eq!(record.measurement(CanonicalField::Date), None);
    }
}
