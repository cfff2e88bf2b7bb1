//! Configuration for a stream session.
//!
//! The embedding UI supplies these values; `Default` also consults
//! environment variables so the demo binary can run without any wiring.

use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::{Result, StreamError};

/// Which inbound columns to retain per message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnFilter {
    /// Wildcard: keep every numeric field the message carries.
    All,
    /// Keep exactly these columns; a listed column absent from a message
    /// is a schema error.
    Only(Vec<String>),
}

impl FromStr for ColumnFilter {
    type Err = StreamError;

    /// Parse a comma-separated column list; `*` or an empty string means
    /// "all columns".
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(ColumnFilter::All);
        }
        let cols: Vec<String> = s
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if cols.is_empty() {
            return Err(StreamError::InvalidConfig(format!(
                "column list '{}' contains no column names",
                s
            )));
        }
        Ok(ColumnFilter::Only(cols))
    }
}

/// What to do when a single inbound message fails to normalize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BadRecordPolicy {
    /// End the whole session on the first bad message (the historical
    /// behavior of the viewer this core was extracted from).
    #[default]
    AbortSession,
    /// Log the bad message at warn level and keep receiving.
    SkipAndLog,
}

/// Configuration for one stream session.
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// Websocket base URL, e.g. `ws://localhost:80`
    pub base_url: String,
    /// Stream identifier, appended to the base URL as a path segment
    pub stream_key: String,
    /// Optional HTTP Basic credentials sent during the handshake
    pub username: Option<String>,
    pub password: Option<String>,
    /// Column allow-list applied by the normalizer
    pub columns: ColumnFilter,
    /// Maximum retained points in the rolling buffer
    pub max_points: usize,
    /// Minimum interval between successive frame materializations
    pub redraw_interval: Duration,
    /// Bounded wait per receive; also the worst-case stop latency
    pub recv_timeout: Duration,
    /// Bound on the websocket handshake; elapsing counts as a refused
    /// connection rather than waiting out the OS TCP timeout
    pub connect_timeout: Duration,
    /// Per-message failure policy
    pub bad_record: BadRecordPolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        let base_url = std::env::var("STREAMLENS_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "ws://localhost:80".to_string());
        let stream_key = std::env::var("STREAMLENS_STREAM_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "*".to_string());
        let columns = std::env::var("STREAMLENS_COLUMNS")
            .ok()
            .and_then(|v| v.parse::<ColumnFilter>().ok())
            .unwrap_or(ColumnFilter::All);
        let max_points = std::env::var("STREAMLENS_MAX_POINTS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(10_000);
        let connect_timeout_ms = std::env::var("STREAMLENS_CONNECT_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10_000);
        Self {
            base_url,
            stream_key,
            username: std::env::var("STREAMLENS_USERNAME")
                .ok()
                .filter(|s| !s.is_empty()),
            password: std::env::var("STREAMLENS_PASSWORD")
                .ok()
                .filter(|s| !s.is_empty()),
            columns,
            max_points,
            redraw_interval: Duration::from_millis(250),
            recv_timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            bad_record: BadRecordPolicy::default(),
        }
    }
}

impl StreamConfig {
    /// Join base URL and stream key into the connect endpoint.
    pub fn endpoint(&self) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.stream_key
        );
        Url::parse(&joined)
            .map_err(|e| StreamError::InvalidConfig(format!("bad stream URL '{}': {}", joined, e)))
    }

    /// Basic auth credentials, if both halves are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            (Some(u), None) => Some((u.as_str(), "")),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_and_empty_parse_to_all() {
        assert_eq!("*".parse::<ColumnFilter>().unwrap(), ColumnFilter::All);
        assert_eq!("".parse::<ColumnFilter>().unwrap(), ColumnFilter::All);
    }

    #[test]
    fn comma_list_parses_to_only() {
        let f = "temperature_c, cpu_usage_percent".parse::<ColumnFilter>().unwrap();
        assert_eq!(
            f,
            ColumnFilter::Only(vec![
                "temperature_c".to_string(),
                "cpu_usage_percent".to_string()
            ])
        );
    }

    #[test]
    fn endpoint_joins_base_and_key() {
        let cfg = StreamConfig {
            base_url: "ws://localhost:8080/".to_string(),
            stream_key: "sensors".to_string(),
            ..StreamConfig::default()
        };
        assert_eq!(cfg.endpoint().unwrap().as_str(), "ws://localhost:8080/sensors");
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let cfg = StreamConfig {
            base_url: "not a url".to_string(),
            stream_key: "x".to_string(),
            ..StreamConfig::default()
        };
        assert!(matches!(cfg.endpoint(), Err(StreamError::InvalidConfig(_))));
    }
}
