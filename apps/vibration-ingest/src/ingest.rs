mod history;
mod notify;
mod receiver;
mod rolling;
mod state;
mod types;


pub use history::{HistoryRing, DEFAULT_MAX_HISTORY};
pub use notify::{ConnectCallback, DataCallback, ErrorCallback, Notifier};
pub use rolling::{Aggregator, DEFAULT_ALERT_THRESHOLD};
pub use types::{AlertEvent, AlertLevel, SourceBinding, StatisticsSnapshot};

use crate::config::ServerConfig;
use crate::error::{IngestError, IngestResult};
use crate::export::{self, ReportPayload, ReportSink};
use crate::telemetry::Record;
use chrono::Utc;
use receiver::Receiver;
use state::IngestState;
use std::net::{SocketAddr, UdpSocket};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

const STOP_TIMEOUT: Duration = Duration::from_secs(2);

pub(in crate::ingest) fn lock_state(state: &Mutex<IngestState>) -> MutexGuard<'_, IngestState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Cloneable read side of the server. Every accessor copies under the state lock, so it is
/// safe to call from any thread (including from inside a callback) while ingestion runs.
#[derive(Clone)]
pub struct IngestHandle {
    state: Arc<Mutex<IngestState>>,
    notifier: Arc<RwLock<Arc<Notifier>>>,
}

impl IngestHandle {
    fn new(config: &ServerConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(IngestState::new(
                config.max_history,
                config.alert_threshold,
            ))),
            notifier: Arc::new(RwLock::new(Arc::new(Notifier::new()))),
        }
    }

    fn current_notifier(&self) -> Arc<Notifier> {
        self.notifier
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn stats(&self) -> StatisticsSnapshot {
        lock_state(&self.state).aggregator.snapshot()
    }

    pub fn history(&self) -> Vec<Record> {
        lock_state(&self.state).history.to_vec()
    }

    pub fn history_len(&self) -> usize {
        lock_state(&self.state).history.len()
    }

    pub fn latest(&self) -> Option<Record> {
        lock_state(&self.state).history.latest().cloned()
    }

    pub fn source(&self) -> Option<SourceBinding> {
        lock_state(&self.state).binding.clone()
    }

    pub fn alert_events(&self) -> Vec<AlertEvent> {
        lock_state(&self.state).alerts.to_vec()
    }

    pub fn threshold(&self) -> f64 {
        lock_state(&self.state).aggregator.threshold()
    }

    pub fn set_threshold(&self, threshold: f64) {
        lock_state(&self.state).aggregator.set_threshold(threshold);
        tracing::info!(threshold, "alert threshold updated");
    }

    /// Stream restart: zeroes the statistics, drops the history and forgets the bound source.
    pub fn reset(&self) {
        lock_state(&self.state).reset();
        tracing::info!("ingest state reset");
    }

    /// Writes the current history to `path`. Failures go to the error callback.
    pub fn export_history_csv(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let records = self.history();
        match export::write_history_csv(path, &records) {
            Ok(rows) => {
                tracing::info!(path = %path.display(), rows, "history exported");
                true
            }
            Err(source) => {
                self.report(IngestError::Export {
                    path: path.to_path_buf(),
                    source,
                });
                false
            }
        }
    }

    pub fn report_payload(&self, chart_path: Option<&Path>) -> ReportPayload {
        let (records, stats, binding) = {
            let state = lock_state(&self.state);
            (
                state.history.to_vec(),
                state.aggregator.snapshot(),
                state.binding.clone(),
            )
        };
        let sensor_id = binding
            .map(|b| b.source_id)
            .or_else(|| records.first().map(|r| r.source_id().to_string()));
        let unit = records.last().map(|r| r.unit().to_string());
        ReportPayload {
            sensor_id,
            unit,
            generated_at: Utc::now(),
            records,
            stats,
            chart_path: chart_path.map(Path::to_path_buf),
        }
    }

    /// Hands history and stats to a report collaborator. Failures go to the error callback.
    pub fn export_report(&self, sink: &dyn ReportSink, chart_path: Option<&Path>) -> bool {
        let payload = self.report_payload(chart_path);
        match sink.export(&payload) {
            Ok(()) => {
                tracing::info!(records = payload.records.len(), "report exported");
                true
            }
            Err(err) => {
                self.report(IngestError::Report(format!("{err:#}")));
                false
            }
        }
    }

    fn report(&self, err: IngestError) {
        let message = err.to_string();
        tracing::error!(error = %message, "export failed");
        self.current_notifier().error(&message);
    }
}

struct Worker {
    running: Arc<AtomicBool>,
    control: UdpSocket,
    thread: JoinHandle<()>,
    done_rx: mpsc::Receiver<()>,
    local_addr: SocketAddr,
}

/// UDP ingest server for one sensor stream.
pub struct IngestServer {
    config: ServerConfig,
    status: ServerState,
    handle: IngestHandle,
    worker: Option<Worker>,
}

impl IngestServer {
    pub fn new(config: ServerConfig) -> Self {
        let handle = IngestHandle::new(&config);
        Self {
            config,
            status: ServerState::Stopped,
            handle,
            worker: None,
        }
    }

    /// Replaces the callbacks. The receive loop picks them up on the next `start()`.
    pub fn set_notifier(&mut self, notifier: Notifier) {
        *self
            .handle
            .notifier
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(notifier);
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> ServerState {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == ServerState::Running
    }

    pub fn handle(&self) -> IngestHandle {
        self.handle.clone()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.worker.as_ref().map(|worker| worker.local_addr)
    }

    /// Binds the socket and spawns the receive thread. Bind failures are returned, never
    /// retried. A no-op when already running.
    pub fn start(&mut self) -> IngestResult<()> {
        if self.worker.is_some() {
            return Ok(());
        }

        self.status = ServerState::Starting;
        match self.launch() {
            Ok(worker) => {
                tracing::info!(
                    address = %worker.local_addr,
                    max_history = self.config.max_history,
                    threshold = self.handle.threshold(),
                    "UDP server listening"
                );
                self.worker = Some(worker);
                self.status = ServerState::Running;
                Ok(())
            }
            Err(err) => {
                self.status = ServerState::Stopped;
                tracing::error!(error = %err, "failed to start UDP server");
                self.handle.current_notifier().error(&err.to_string());
                Err(err)
            }
        }
    }

    fn launch(&mut self) -> IngestResult<Worker> {
        let socket = receiver::bind_socket(&self.config.bind_address, self.config.port)?;
        let bind_err = |source| IngestError::Bind {
            address: self.config.bind_addr(),
            source,
        };
        let local_addr = socket.local_addr().map_err(bind_err)?;
        let control = socket.try_clone().map_err(bind_err)?;

        {
            let mut state = lock_state(&self.handle.state);
            let threshold = state.aggregator.threshold();
            *state = IngestState::new(self.config.max_history, threshold);
        }

        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = mpsc::channel();
        let thread = Receiver {
            socket,
            state: self.handle.state.clone(),
            notifier: self.handle.current_notifier(),
            running: running.clone(),
        }
        .spawn(done_tx)?;

        Ok(Worker {
            running,
            control,
            thread,
            done_rx,
            local_addr,
        })
    }

    /// Signals the receive thread, shuts the socket down, then waits up to two seconds for the
    /// thread to exit. A no-op when already stopped.
    ///
    /// A thread still busy after the wait (a slow callback) is detached. It reads no further
    /// datagrams, but the callback it is running may still finish after this returns, and the
    /// port is released only once that thread drops its socket.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.status = ServerState::Stopping;
        worker.running.store(false, Ordering::Release);
        receiver::interrupt(&worker.control);
        receiver::wake(worker.local_addr);

        match worker.done_rx.recv_timeout(STOP_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.thread.join().is_err() {
                    tracing::warn!("UDP receive thread panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    timeout_ms = STOP_TIMEOUT.as_millis() as u64,
                    "UDP receive thread did not stop in time; detaching"
                );
            }
        }

        self.status = ServerState::Stopped;
        tracing::info!("UDP server stopped");
    }

    pub fn stats(&self) -> StatisticsSnapshot {
        self.handle.stats()
    }

    pub fn history(&self) -> Vec<Record> {
        self.handle.history()
    }

    pub fn source(&self) -> Option<SourceBinding> {
        self.handle.source()
    }

    pub fn set_threshold(&self, threshold: f64) {
        self.handle.set_threshold(threshold);
    }

    pub fn export_history_csv(&self, path: impl AsRef<Path>) -> bool {
        self.handle.export_history_csv(path)
    }
}

impl Drop for IngestServer {
    fn drop(&mut self) {
        self.stop();
    }
}
