//! Scan configuration from environment variables.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Rows returned per default cursor round trip.
pub const DEFAULT_FETCH_SIZE: usize = 1000;

/// Attempts the locality connector makes before giving up on a split.
pub const DEFAULT_MAX_CONNECT_ATTEMPTS: usize = 10;

/// Sentinel some engines expect as fetch size to stream row by row.
pub const STREAMING_FETCH_SENTINEL: i64 = i32::MIN as i64;

/// How many rows the server hands back per network round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSize {
    Rows(usize),
    /// One row per round trip, for scans too large to buffer at all.
    Streaming,
}

impl FetchSize {
    pub fn rows_per_fetch(self) -> usize {
        match self {
            FetchSize::Rows(n) => n,
            FetchSize::Streaming => 1,
        }
    }
}

impl Default for FetchSize {
    fn default() -> Self {
        FetchSize::Rows(DEFAULT_FETCH_SIZE)
    }
}

impl fmt::Display for FetchSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchSize::Rows(n) => write!(f, "{}", n),
            FetchSize::Streaming => write!(f, "streaming"),
        }
    }
}

impl FromStr for FetchSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("streaming") {
            return Ok(FetchSize::Streaming);
        }
        let n: i64 = s
            .parse()
            .with_context(|| format!("Invalid fetch size '{}'", s))?;
        match n {
            STREAMING_FETCH_SENTINEL => Ok(FetchSize::Streaming),
            n if n > 0 => Ok(FetchSize::Rows(n as usize)),
            n => anyhow::bail!("Fetch size must be positive, got {}", n),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub fetch_size: FetchSize,
    pub max_connect_attempts: usize,
    /// This worker's address, compared against chunk host addresses.
    pub local_address: Option<String>,
    /// Expose every replica of a chunk instead of one host per chunk.
    pub replication: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            fetch_size: FetchSize::default(),
            max_connect_attempts: DEFAULT_MAX_CONNECT_ATTEMPTS,
            local_address: None,
            replication: false,
        }
    }
}

impl ScanConfig {
    pub fn from_env() -> Result<Self> {
        let max_connect_attempts: usize = std::env::var("SHARDSCAN_MAX_CONNECT_ATTEMPTS")
            .unwrap_or_else(|_| DEFAULT_MAX_CONNECT_ATTEMPTS.to_string())
            .parse()
            .context("Invalid SHARDSCAN_MAX_CONNECT_ATTEMPTS")?;
        if max_connect_attempts == 0 {
            anyhow::bail!("SHARDSCAN_MAX_CONNECT_ATTEMPTS must be at least 1");
        }

        Ok(Self {
            fetch_size: std::env::var("SHARDSCAN_FETCH_SIZE")
                .unwrap_or_else(|_| DEFAULT_FETCH_SIZE.to_string())
                .parse()
                .context("Invalid SHARDSCAN_FETCH_SIZE")?,
            max_connect_attempts,
            local_address: std::env::var("SHARDSCAN_LOCAL_ADDRESS")
                .or_else(|_| std::env::var("HOSTNAME"))
                .ok()
                .filter(|a| !a.trim().is_empty()),
            replication: std::env::var("SHARDSCAN_REPLICATION")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("Invalid SHARDSCAN_REPLICATION")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid races.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [
            "SHARDSCAN_FETCH_SIZE",
            "SHARDSCAN_MAX_CONNECT_ATTEMPTS",
            "SHARDSCAN_LOCAL_ADDRESS",
            "SHARDSCAN_REPLICATION",
            "HOSTNAME",
        ] {
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    fn from_env_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        let config = ScanConfig::from_env().unwrap();
        assert_eq!(config.fetch_size, FetchSize::Rows(1000));
        assert_eq!(config.max_connect_attempts, 10);
        assert_eq!(config.local_address, None);
        assert!(!config.replication);

        clear_env();
    }

    #[test]
    fn from_env_with_all_vars() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        unsafe {
            std::env::set_var("SHARDSCAN_FETCH_SIZE", "250");
            std::env::set_var("SHARDSCAN_MAX_CONNECT_ATTEMPTS", "3");
            std::env::set_var("SHARDSCAN_LOCAL_ADDRESS", "10.0.0.7");
            std::env::set_var("SHARDSCAN_REPLICATION", "true");
        }

        let config = ScanConfig::from_env().unwrap();
        assert_eq!(config.fetch_size, FetchSize::Rows(250));
        assert_eq!(config.max_connect_attempts, 3);
        assert_eq!(config.local_address, Some("10.0.0.7".to_string()));
        assert!(config.replication);

        clear_env();
    }

    #[test]
    fn local_address_falls_back_to_hostname() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        unsafe { std::env::set_var("HOSTNAME", "worker-3") };
        let config = ScanConfig::from_env().unwrap();
        assert_eq!(config.local_address, Some("worker-3".to_string()));

        clear_env();
    }

    #[test]
    fn zero_attempts_rejected() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        unsafe { std::env::set_var("SHARDSCAN_MAX_CONNECT_ATTEMPTS", "0") };
        assert!(ScanConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    fn invalid_fetch_size_rejected() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        unsafe { std::env::set_var("SHARDSCAN_FETCH_SIZE", "lots") };
        assert!(ScanConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    fn fetch_size_parsing() {
        assert_eq!("500".parse::<FetchSize>().unwrap(), FetchSize::Rows(500));
        assert_eq!("streaming".parse::<FetchSize>().unwrap(), FetchSize::Streaming);
        assert_eq!("-2147483648".parse::<FetchSize>().unwrap(), FetchSize::Streaming);
        assert!("0".parse::<FetchSize>().is_err());
        assert!("-5".parse::<FetchSize>().is_err());
        assert_eq!(FetchSize::Streaming.rows_per_fetch(), 1);
        assert_eq!(FetchSize::default().to_string(), "1000");
    }
}
