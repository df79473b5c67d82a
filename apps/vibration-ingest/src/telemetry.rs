use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;

const FIELD_COUNT: usize = 4;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed record ({fields} fields, expected 4): {raw:?}")]
    MalformedRecord { raw: String, fields: usize },
    #[error("invalid value {value:?} in record {raw:?}")]
    InvalidValue { raw: String, value: String },
    #[error("invalid timestamp {timestamp:?} in record {raw:?}")]
    InvalidTimestamp { raw: String, timestamp: String },
}

impl ParseError {
    pub fn raw(&self) -> &str {
        match self {
            ParseError::MalformedRecord { raw, .. }
            | ParseError::InvalidValue { raw, .. }
            | ParseError::InvalidTimestamp { raw, .. } => raw,
        }
    }
}

/// One accepted sensor reading. Serializes as the `sensor_id,timestamp,value,unit` mapping,
/// with the timestamp exactly as the sensor sent it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    #[serde(rename = "sensor_id")]
    source_id: String,
    #[serde(rename = "timestamp")]
    timestamp_text: String,
    value: f64,
    unit: String,
    #[serde(skip)]
    timestamp: DateTime<FixedOffset>,
}

impl Record {
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    pub fn timestamp_text(&self) -> &str {
        &self.timestamp_text
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }
}

/// Parses one `SENSOR_ID,TIMESTAMP,VALUE,UNIT` line. Only the line as a whole is trimmed:
/// the value may carry surrounding spaces, the timestamp may not, and the id and unit keep theirs.
pub fn parse_record(raw: &str) -> Result<Record, ParseError> {
    let line = raw.trim();
    if line.is_empty() {
        return Err(ParseError::MalformedRecord {
            raw: raw.to_string(),
            fields: 0,
        });
    }

    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() != FIELD_COUNT {
        return Err(ParseError::MalformedRecord {
            raw: raw.to_string(),
            fields: parts.len(),
        });
    }

    let value_text = parts[2].trim();
    let value = value_text
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::InvalidValue {
            raw: raw.to_string(),
            value: value_text.to_string(),
        })?;

    let timestamp_text = parts[1];
    let timestamp = Some(timestamp_text)
        .filter(|text| text.trim() == *text)
        .and_then(parse_timestamp)
        .ok_or_else(|| ParseError::InvalidTimestamp {
            raw: raw.to_string(),
            timestamp: timestamp_text.to_string(),
        })?;

    Ok(Record {
        source_id: parts[0].to_string(),
        timestamp_text: timestamp_text.to_string(),
        value,
        unit: parts[3].to_string(),
        timestamp,
    })
}

/// ISO-8601-ish timestamps. A trailing `Z` means UTC; no offset at all is also read as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(naive) = text.strip_suffix('Z').or_else(|| text.strip_suffix('z')) {
        return parse_naive(naive).map(|dt| dt.and_utc().fixed_offset());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }

    parse_naive(text).map(|dt| dt.and_utc().fixed_offset())
}

fn parse_naive(text: &str) -> Option<NaiveDateTime> {
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
