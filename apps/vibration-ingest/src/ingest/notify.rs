use super::types::{AlertLevel, SourceBinding, StatisticsSnapshot};
use crate::telemetry::Record;

pub type DataCallback = Box<dyn Fn(&Record, &StatisticsSnapshot, AlertLevel) + Send + Sync>;
pub type ErrorCallback = Box<dyn Fn(&str) + Send + Sync>;
pub type ConnectCallback = Box<dyn Fn(&SourceBinding) + Send + Sync>;

/// Consumer callbacks. Every slot is optional and is invoked synchronously on the receive
/// thread, so a slow callback holds up the next datagram. The data slot gets the alert level
/// the reading was counted under, not a fresh comparison against the current threshold.
#[derive(Default)]
pub struct Notifier {
    on_data: Option<DataCallback>,
    on_error: Option<ErrorCallback>,
    on_connect: Option<ConnectCallback>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_data(
        mut self,
        callback: impl Fn(&Record, &StatisticsSnapshot, AlertLevel) + Send + Sync + 'static,
    ) -> Self {
        self.on_data = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    pub fn on_connect(mut self, callback: impl Fn(&SourceBinding) + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Box::new(callback));
        self
    }

    pub(in crate::ingest) fn data(&self, record: &Record, stats: &StatisticsSnapshot, level: AlertLevel) {
        if let Some(callback) = &self.on_data {
            callback(record, stats, level);
        }
    }

    pub(in crate::ingest) fn error(&self, message: &str) {
        if let Some(callback) = &self.on_error {
            callback(message);
        }
    }

    pub(in crate::ingest) fn connected(&self, binding: &SourceBinding) {
        if let Some(callback) = &self.on_connect {
            callback(binding);
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("on_data", &self.on_data.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_connect", &self.on_connect.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn empty_slots_are_silent() {
        let notifier = Notifier::new();
        notifier.error("ignored");
        assert_eq!(
            format!("{notifier:?}"),
            "Notifier { on_data: false, on_error: false, on_connect: false }"
        );
    }

    #[test]
    fn error_slot_receives_messages() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let notifier = Notifier::new().on_error(move |msg| sink.lock().unwrap().push(msg.to_string()));
        notifier.error("bad datagram");
        assert_eq!(*seen.lock().unwrap(), vec!["bad datagram".to_string()]);
    }
}
