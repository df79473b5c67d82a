use super::types::{AlertLevel, StatisticsSnapshot};
use chrono::{DateTime, FixedOffset};

pub const DEFAULT_ALERT_THRESHOLD: f64 = 5000.0;

/// Running count/min/max/sum plus the number of readings above the alert threshold.
/// Fixed-size state, O(1) per update.
#[derive(Debug, Clone)]
pub struct Aggregator {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    threshold_crossings: u64,
    threshold: f64,
    last_timestamp: Option<DateTime<FixedOffset>>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_THRESHOLD)
    }
}

impl Aggregator {
    pub fn new(threshold: f64) -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: 0.0,
            threshold_crossings: 0,
            threshold,
            last_timestamp: None,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Only affects later updates; crossings already counted stay counted.
    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    pub fn classify(&self, value: f64) -> AlertLevel {
        if value > self.threshold {
            AlertLevel::Alert
        } else {
            AlertLevel::Normal
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn update(&mut self, value: f64) -> StatisticsSnapshot {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
        if self.classify(value) == AlertLevel::Alert {
            self.threshold_crossings += 1;
        }
        self.snapshot()
    }

    /// `update` plus tracking of the reading's timestamp for `last_timestamp`.
    pub fn observe(&mut self, value: f64, timestamp: DateTime<FixedOffset>) -> StatisticsSnapshot {
        self.last_timestamp = Some(timestamp);
        self.update(value)
    }

    /// Zeroes the accumulators. The threshold is configuration, not state, and survives.
    pub fn reset(&mut self) {
        *self = Self::new(self.threshold);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        if self.count == 0 {
            return StatisticsSnapshot::default();
        }
        StatisticsSnapshot {
            total_count: self.count,
            min_value: self.min,
            max_value: self.max,
            average_value: round2(self.sum / self.count as f64),
            threshold_crossings: self.threshold_crossings,
            last_timestamp: self.last_timestamp,
        }
    }
}

fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        // No fractional cents left at this magnitude.
        return value;
    }
    scaled.round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_readings_against_default_threshold() {
        let mut agg = Aggregator::default();
        for value in [100.0, 6000.0, 200.0] {
            agg.update(value);
        }
        let stats = agg.snapshot();
        assert_eq!(stats.total_count, 3);
        assert_eq!(stats.threshold_crossings, 1);
        assert_eq!(stats.min_value, 100.0);
        assert_eq!(stats.max_value, 6000.0);
        assert_eq!(stats.average_value, 2100.00);
    }

    #[test]
    fn empty_snapshot_reports_nothing() {
        let agg = Aggregator::default();
        let stats = agg.snapshot();
        assert!(stats.is_empty());
        assert_eq!(stats.last_timestamp, None);
    }

    #[test]
    fn snapshot_is_idempotent() {
        let mut agg = Aggregator::default();
        agg.update(12.5);
        agg.update(7.25);
        assert_eq!(agg.snapshot(), agg.snapshot());
    }

    #[test]
    fn tracks_min_max_and_average_for_any_sequence() {
        let values = [-3.5, -10.0, -0.25, -7.0];
        let mut agg = Aggregator::default();
        for value in values {
            agg.update(value);
        }
        let stats = agg.snapshot();
        assert_eq!(stats.total_count, values.len() as u64);
        assert_eq!(stats.min_value, -10.0);
        assert_eq!(stats.max_value, -0.25);
        let expected = values.iter().sum::<f64>() / values.len() as f64;
        assert!((stats.average_value - expected).abs() < 0.01);
    }

    #[test]
    fn average_is_rounded_but_sum_keeps_precision() {
        let mut agg = Aggregator::default();
        agg.update(1.0);
        agg.update(1.0);
        agg.update(2.0);
        assert_eq!(agg.snapshot().average_value, 1.33);

        agg.update(2.0);
        assert_eq!(agg.snapshot().average_value, 1.5);
    }

    #[test]
    fn huge_average_stays_finite() {
        let mut agg = Aggregator::default();
        agg.update(1e307);
        let stats = agg.snapshot();
        assert_eq!(stats.average_value, 1e307);
        assert_eq!(stats.max_value, 1e307);

        agg.update(-1e307);
        assert_eq!(agg.snapshot().average_value, 0.0);
    }

    #[test]
    fn threshold_change_is_not_retroactive() {
        let mut agg = Aggregator::new(100.0);
        agg.update(150.0);
        agg.update(50.0);
        agg.set_threshold(40.0);
        agg.update(45.0);
        agg.set_threshold(1000.0);
        agg.update(500.0);
        assert_eq!(agg.snapshot().threshold_crossings, 2);
    }

    #[test]
    fn value_equal_to_threshold_is_normal() {
        let agg = Aggregator::new(5000.0);
        assert_eq!(agg.classify(5000.0), AlertLevel::Normal);
        assert_eq!(agg.classify(5000.5), AlertLevel::Alert);
    }

    #[test]
    fn reset_clears_state_and_keeps_threshold() {
        let mut agg = Aggregator::new(10.0);
        agg.update(20.0);
        agg.reset();
        assert_eq!(agg.count(), 0);
        assert!(agg.snapshot().is_empty());
        assert_eq!(agg.threshold(), 10.0);

        agg.update(5.0);
        let stats = agg.snapshot();
        assert_eq!((stats.min_value, stats.max_value), (5.0, 5.0));
        assert_eq!(stats.threshold_crossings, 0);
    }

    #[test]
    fn observe_tracks_last_timestamp() {
        let ts = crate::telemetry::parse_timestamp("2025-11-04T15:30:45Z").unwrap();
        let mut agg = Aggregator::default();
        let stats = agg.observe(3.0, ts);
        assert_eq!(stats.last_timestamp, Some(ts));
    }
}
