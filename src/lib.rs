//! Client library for shipping structured log records to a remote
//! collector.
//!
//! A [`Client`] owns one logical session: load a [`SessionConfig`],
//! [`connect`](Client::connect), [`write`](Client::write) records, and
//! [`disconnect`](Client::disconnect). Records are filtered against the
//! session's severity and verbosity thresholds, serialised, and forwarded
//! by a background worker; when the session is unavailable they are
//! silently dropped rather than failing the caller.
//!
//! ```no_run
//! use logwire::{Client, Level, LogRecord, SessionConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::builder()
//!     .with_endpoint("collector.internal", 8777)
//!     .with_access_token("s3cret")
//!     .with_level(Level::Info)
//!     .build()?;
//! let client = Client::new(config);
//! let info = client.connect()?;
//! println!("connected as {} (server {})", info.client_id, info.server_version);
//!
//! client.set_thread_name("main");
//! client.logger("app").info("service started");
//! client.write(LogRecord::new("app", Level::Warning, "low disk space"));
//!
//! client.disconnect();
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod dispatch;
mod filter;
pub mod global;
mod level;
mod log_record;
mod logger;
mod rate_limited_warner;
mod session;
mod thread_registry;
mod transport;
mod wire;

pub use client::{Client, ConnectionError};
pub use config::{
    ConfigError, DEFAULT_CAPACITY, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_FRAME_SIZE,
    DEFAULT_WRITE_TIMEOUT, MAX_VERBOSE_LEVEL, SessionConfig, SessionConfigBuilder,
};
pub use filter::ThresholdFilter;
pub use level::Level;
pub use log_record::LogRecord;
pub use logger::Logger;
pub use session::{SessionInfo, SessionState};
pub use transport::{
    Connection, Dialer, SocketDialer, SocketTransport, TcpTransport, TlsOptions, UnixTransport,
};
