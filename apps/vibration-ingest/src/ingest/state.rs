use super::history::HistoryRing;
use super::rolling::Aggregator;
use super::types::{AlertEvent, AlertLevel, SourceBinding, StatisticsSnapshot};
use crate::telemetry::Record;
use chrono::Utc;
use std::net::SocketAddr;

pub(in crate::ingest) const MAX_ALERT_EVENTS: usize = 50;

/// Everything the receive loop mutates. Lives behind a single lock so readers copy a
/// consistent view: stats and history always describe the same set of accepted records.
#[derive(Debug)]
pub(in crate::ingest) struct IngestState {
    pub(in crate::ingest) aggregator: Aggregator,
    pub(in crate::ingest) history: HistoryRing<Record>,
    pub(in crate::ingest) alerts: HistoryRing<AlertEvent>,
    pub(in crate::ingest) binding: Option<SourceBinding>,
}

/// What `accept` changed, for the caller to notify outside the lock.
pub(in crate::ingest) struct Accepted {
    pub(in crate::ingest) stats: StatisticsSnapshot,
    pub(in crate::ingest) level: AlertLevel,
    pub(in crate::ingest) new_binding: Option<SourceBinding>,
}

impl IngestState {
    pub(in crate::ingest) fn new(max_history: usize, threshold: f64) -> Self {
        Self {
            aggregator: Aggregator::new(threshold),
            history: HistoryRing::new(max_history),
            alerts: HistoryRing::new(MAX_ALERT_EVENTS),
            binding: None,
        }
    }

    pub(in crate::ingest) fn accept(&mut self, record: &Record, peer: SocketAddr) -> Accepted {
        let new_binding = if self.binding.is_none() {
            let binding = SourceBinding {
                source_id: record.source_id().to_string(),
                peer,
                bound_at: Utc::now(),
            };
            self.binding = Some(binding.clone());
            Some(binding)
        } else {
            None
        };

        let level = self.aggregator.classify(record.value());
        if level == AlertLevel::Alert {
            self.alerts.push(AlertEvent {
                source_id: record.source_id().to_string(),
                timestamp: record.timestamp(),
                value: record.value(),
                threshold: self.aggregator.threshold(),
            });
        }
        let stats = self.aggregator.observe(record.value(), record.timestamp());
        self.history.push(record.clone());

        Accepted {
            stats,
            level,
            new_binding,
        }
    }

    pub(in crate::ingest) fn reset(&mut self) {
        self.aggregator.reset();
        self.history.clear();
        self.alerts.clear();
        self.binding = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::parse_record;

    fn peer() -> SocketAddr {
        "192.168.42.20:40000".parse().unwrap()
    }

    #[test]
    fn first_record_binds_the_source() {
        let mut state = IngestState::new(10, 5000.0);
        let first = parse_record("SW420_A,2025-11-04T15:30:45,10,ADC").unwrap();
        let second = parse_record("SW420_B,2025-11-04T15:30:46,20,ADC").unwrap();

        let accepted = state.accept(&first, peer());
        assert_eq!(accepted.new_binding.as_ref().map(|b| b.source_id.as_str()), Some("SW420_A"));

        let other_peer: SocketAddr = "10.0.0.9:1".parse().unwrap();
        let accepted = state.accept(&second, other_peer);
        assert!(accepted.new_binding.is_none());
        let binding = state.binding.as_ref().unwrap();
        assert_eq!(binding.source_id, "SW420_A");
        assert_eq!(binding.peer, peer());
        assert_eq!(state.aggregator.count(), 2);
    }

    #[test]
    fn alerts_are_logged_and_bounded() {
        let mut state = IngestState::new(10, 100.0);
        for i in 0..(MAX_ALERT_EVENTS + 5) {
            let raw = format!("S1,2025-11-04T15:30:45,{},ADC", 200 + i);
            let accepted = state.accept(&parse_record(&raw).unwrap(), peer());
            assert_eq!(accepted.level, AlertLevel::Alert);
        }
        state.accept(&parse_record("S1,2025-11-04T15:30:45,5,ADC").unwrap(), peer());

        assert_eq!(state.alerts.len(), MAX_ALERT_EVENTS);
        assert_eq!(state.alerts.to_vec()[0].value, 205.0);
        assert_eq!(state.aggregator.snapshot().threshold_crossings, (MAX_ALERT_EVENTS + 5) as u64);
    }

    #[test]
    fn reset_unbinds_and_clears() {
        let mut state = IngestState::new(10, 1.0);
        state.accept(&parse_record("S1,2025-11-04T15:30:45,5,ADC").unwrap(), peer());
        state.reset();
        assert!(state.binding.is_none());
        assert!(state.history.is_empty());
        assert!(state.alerts.is_empty());
        assert!(state.aggregator.snapshot().is_empty());
    }
}
