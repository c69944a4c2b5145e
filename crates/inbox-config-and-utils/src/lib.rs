//! Core configuration, paths, and logging for the inbox client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_API_URL, DEFAULT_HEARTBEAT_INTERVAL_SECS, DEFAULT_LOG_LEVEL,
    DEFAULT_REALTIME_URL, DEFAULT_REQUEST_TIMEOUT_SECS,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, init_logging_for_service, parse_level, LogFormat};
pub use paths::Paths;
