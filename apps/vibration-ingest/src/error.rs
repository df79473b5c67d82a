use crate::telemetry::ParseError;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to bind UDP socket on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid bind address {address}")]
    InvalidAddress { address: String },
    #[error("failed to spawn receive thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("datagram from {peer} is not valid UTF-8: {source}")]
    Decode {
        peer: SocketAddr,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("error receiving data: {0}")]
    Transport(#[source] std::io::Error),
    #[error("failed to export CSV to {}: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to export report: {0}")]
    Report(String),
}

pub type IngestResult<T> = Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_names_the_address() {
        let err = IngestError::Bind {
            address: "10.0.0.1:5000".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::AddrNotAvailable),
        };
        assert!(err.to_string().contains("10.0.0.1:5000"));
    }
}
