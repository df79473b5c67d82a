use crate::ingest::{DEFAULT_ALERT_THRESHOLD, DEFAULT_MAX_HISTORY};
use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

/// Inputs the ingest core needs. Loading them is the caller's business.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub max_history: usize,
    pub alert_threshold: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            max_history: DEFAULT_MAX_HISTORY,
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Binary configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub export_csv: Option<PathBuf>,
    pub report_json: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let bind_address = env_string("VIBRATION_UDP_BIND", Some(DEFAULT_BIND_ADDRESS.to_string()))?;
        let port = env_u64("VIBRATION_UDP_PORT", Some(DEFAULT_PORT as u64))?;
        let port = u16::try_from(port).context("VIBRATION_UDP_PORT out of range")?;
        let max_history = env_u64("VIBRATION_MAX_HISTORY", Some(DEFAULT_MAX_HISTORY as u64))?;
        if max_history == 0 {
            return Err(anyhow!("VIBRATION_MAX_HISTORY must be at least 1"));
        }
        let alert_threshold = env_f64("VIBRATION_ALERT_THRESHOLD", Some(DEFAULT_ALERT_THRESHOLD))?;

        let export_csv = env_optional("VIBRATION_EXPORT_CSV").map(PathBuf::from);
        let report_json = env_optional("VIBRATION_REPORT_JSON").map(PathBuf::from);

        Ok(Self {
            server: ServerConfig {
                bind_address,
                port,
                max_history: max_history as usize,
                alert_threshold,
            },
            export_csv,
            report_json,
        })
    }
}

fn env_string(key: &str, default: Option<String>) -> Result<String> {
    match env::var(key) {
        Ok(value) => Ok(value.trim().to_string()),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_u64(key: &str, default: Option<u64>) -> Result<u64> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid {key}")),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_f64(key: &str, default: Option<f64>) -> Result<f64> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| anyhow!("invalid {key}: {value:?}")),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_sensor_setup() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:5000");
        assert_eq!(config.max_history, 300);
        assert_eq!(config.alert_threshold, 5000.0);
    }

    #[test]
    fn env_helpers_parse_and_reject() {
        env::set_var("VIBRATION_TEST_U64", " 42 ");
        assert_eq!(env_u64("VIBRATION_TEST_U64", None).unwrap(), 42);
        env::set_var("VIBRATION_TEST_U64", "forty-two");
        assert!(env_u64("VIBRATION_TEST_U64", Some(1)).is_err());
        env::remove_var("VIBRATION_TEST_U64");
        assert_eq!(env_u64("VIBRATION_TEST_U64", Some(7)).unwrap(), 7);
        assert!(env_u64("VIBRATION_TEST_U64", None).is_err());

        env::set_var("VIBRATION_TEST_F64", "NaN");
        assert!(env_f64("VIBRATION_TEST_F64", Some(1.0)).is_err());
        env::set_var("VIBRATION_TEST_F64", "4500.5");
        assert_eq!(env_f64("VIBRATION_TEST_F64", None).unwrap(), 4500.5);
        env::remove_var("VIBRATION_TEST_F64");

        env::set_var("VIBRATION_TEST_OPT", "   ");
        assert_eq!(env_optional("VIBRATION_TEST_OPT"), None);
        env::remove_var("VIBRATION_TEST_OPT");
    }
}
