// streamlens core library
// Live-stream ingest, rolling buffer and redraw throttle

pub mod buffer;
pub mod client;
pub mod config;
pub mod record;
pub mod session;
pub mod throttle;

// Export core types
pub use buffer::{ChartFrame, RollingBuffer};
pub use client::{RecvOutcome, StreamConnector, StreamTransport, WsConnector};
pub use config::{BadRecordPolicy, ColumnFilter, StreamConfig};
pub use record::{normalize, Record};
pub use session::{ConnectionState, SessionController, SessionState, SessionUpdate};
pub use throttle::RedrawThrottle;

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("schema error: column '{0}' missing from message")]
    Schema(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("session already running")]
    AlreadyRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StreamError>;
