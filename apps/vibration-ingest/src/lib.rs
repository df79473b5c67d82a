pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod telemetry;

pub use config::ServerConfig;
pub use error::{IngestError, IngestResult};
pub use ingest::{IngestHandle, IngestServer, Notifier, ServerState, StatisticsSnapshot};
pub use telemetry::{parse_record, ParseError, Record};
