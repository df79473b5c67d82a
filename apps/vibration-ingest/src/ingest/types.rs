use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::net::SocketAddr;

/// Point-in-time copy of the running statistics.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StatisticsSnapshot {
    pub total_count: u64,
    pub min_value: f64,
    pub max_value: f64,
    pub average_value: f64,
    pub threshold_crossings: u64,
    pub last_timestamp: Option<DateTime<FixedOffset>>,
}

impl StatisticsSnapshot {
    /// No reading accepted yet; min/max/average carry no meaning.
    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SourceBinding {
    pub source_id: String,
    pub peer: SocketAddr,
    pub bound_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Normal,
    Alert,
}

impl AlertLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Normal => "normal",
            AlertLevel::Alert => "alert",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AlertEvent {
    pub source_id: String,
    pub timestamp: DateTime<FixedOffset>,
    pub value: f64,
    pub threshold: f64,
}
