use crate::ingest::StatisticsSnapshot;
use crate::telemetry::Record;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const CSV_HEADER: [&str; 4] = ["sensor_id", "timestamp", "value", "unit"];

/// Header plus one row per record, in the order given. Returns the number of rows written.
pub fn write_history_csv(path: &Path, records: &[Record]) -> Result<usize, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(records.len())
}

/// What a report generator gets: the history as sensor mappings plus a stats snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ReportPayload {
    pub sensor_id: Option<String>,
    pub unit: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub records: Vec<Record>,
    pub stats: StatisticsSnapshot,
    pub chart_path: Option<PathBuf>,
}

pub trait ReportSink {
    fn export(&self, payload: &ReportPayload) -> Result<()>;
}

/// Writes the payload as pretty JSON, for renderers that live outside this process.
#[derive(Debug, Clone)]
pub struct JsonReportSink {
    path: PathBuf,
}

impl JsonReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for JsonReportSink {
    fn export(&self, payload: &ReportPayload) -> Result<()> {
        let file = File::create(&self.path)
            .with_context(|| format!("failed to create {}", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, payload).context("failed to encode report")?;
        writer.flush().context("failed to flush report")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::parse_record;
    use tempfile::TempDir;

    fn records() -> Vec<Record> {
        [
            "SW420_GRUPO_10,2025-11-04T15:30:45.123,2450,ADC",
            "SW420_GRUPO_10,2025-11-04T15:30:46.123,6100.5,ADC",
            "SW420_GRUPO_10,2025-11-04T15:30:47Z,12,ADC",
        ]
        .iter()
        .map(|raw| parse_record(raw).unwrap())
        .collect()
    }

    #[test]
    fn csv_has_header_and_one_row_per_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.csv");
        let rows = write_history_csv(&path, &records()).unwrap();
        assert_eq!(rows, 3);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                "sensor_id,timestamp,value,unit",
                "SW420_GRUPO_10,2025-11-04T15:30:45.123,2450.0,ADC",
                "SW420_GRUPO_10,2025-11-04T15:30:46.123,6100.5,ADC",
                "SW420_GRUPO_10,2025-11-04T15:30:47Z,12.0,ADC",
            ]
        );
    }

    #[test]
    fn empty_history_still_writes_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");
        write_history_csv(&path, &[]).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "sensor_id,timestamp,value,unit\n"
        );
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("history.csv");
        assert!(write_history_csv(&path, &records()).is_err());
    }

    #[test]
    fn json_sink_writes_payload() {
        let dir = TempDir::new().unwrap();
        let sink = JsonReportSink::new(dir.path().join("report.json"));
        let payload = ReportPayload {
            sensor_id: Some("SW420_GRUPO_10".to_string()),
            unit: Some("ADC".to_string()),
            generated_at: Utc::now(),
            records: records(),
            stats: StatisticsSnapshot::default(),
            chart_path: None,
        };
        sink.export(&payload).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(sink.path()).unwrap()).unwrap();
        assert_eq!(written["sensor_id"], "SW420_GRUPO_10");
        assert_eq!(written["records"].as_array().unwrap().len(), 3);
        assert_eq!(written["records"][1]["value"], 6100.5);
        assert_eq!(written["stats"]["total_count"], 0);
    }
}
