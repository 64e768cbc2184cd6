//! Configuration loading and validation.
//!
//! A [`SessionConfig`] is parsed from a JSON descriptor (file or string)
//! or assembled programmatically through [`SessionConfigBuilder`]. The
//! descriptor is flat: `url` and `access_token` are required, everything
//! else tunes thresholds and transport behaviour. Validation failures are
//! reported with field-level detail through [`ConfigError`].

use std::fs;
use std::io;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::level::Level;
use crate::transport::TlsOptions;

/// Default bounded queue capacity for the dispatch worker.
pub const DEFAULT_CAPACITY: usize = 1024;
/// Default connection timeout applied when establishing the session.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default write timeout applied to transport writes.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
/// Default maximum frame size (in bytes) accepted by the dispatcher.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1 << 20; // 1 MiB
/// Highest verbosity level a record may carry.
pub const MAX_VERBOSE_LEVEL: u8 = 9;

/// Errors that may occur while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the unreadable file.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The descriptor is not valid JSON.
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
    /// A required field was absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    /// The endpoint descriptor is not in `<host>:<port>` form.
    #[error("url must be in <host>:<port> form, got {0:?}")]
    InvalidUrl(String),
    /// The severity threshold is not a recognised level name.
    #[error("unknown level name: {0:?}")]
    InvalidLevel(String),
    /// A field holds a value outside its accepted range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Immutable session configuration consumed by the connection manager.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Collector hostname or IP address.
    pub host: String,
    /// Collector TCP port.
    pub port: u16,
    /// Credential presented during the handshake.
    pub access_token: String,
    /// Application identifier stamped onto every forwarded record.
    pub application_id: Option<String>,
    /// Client identity to resume; the collector assigns one when absent.
    pub client_id: Option<String>,
    /// Minimum severity forwarded to the collector.
    pub level: Level,
    /// Highest verbosity level forwarded for verbose records.
    pub max_verbose_level: u8,
    /// TLS options; plain TCP when absent.
    pub tls: Option<TlsOptions>,
    /// Dispatch queue capacity.
    pub capacity: usize,
    /// Timeout for establishing the session.
    pub connect_timeout: Duration,
    /// Timeout for individual transport writes.
    pub write_timeout: Duration,
    /// Upper bound on a single serialised frame.
    pub max_frame_size: usize,
}

impl SessionConfig {
    /// Start building a configuration programmatically.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }

    /// Load a configuration from a JSON file at `path`.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse a configuration from an inline JSON descriptor.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(json)?;
        raw.into_builder()?.build()
    }
}

/// Builder for [`SessionConfig`].
///
/// Required fields are the endpoint and the access token; everything else
/// falls back to the crate defaults.
#[derive(Clone, Debug, Default)]
pub struct SessionConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    access_token: Option<String>,
    application_id: Option<String>,
    client_id: Option<String>,
    level: Option<Level>,
    max_verbose_level: Option<u8>,
    tls: Option<TlsOptions>,
    capacity: Option<usize>,
    connect_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    max_frame_size: Option<usize>,
}

impl SessionConfigBuilder {
    /// Create a builder with no values set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the collector endpoint.
    pub fn with_endpoint(mut self, host: &str, port: u16) -> Self {
        self.host = Some(host.to_owned());
        self.port = Some(port);
        self
    }

    /// Set the endpoint from a `<host>:<port>` descriptor.
    pub fn with_url(mut self, url: &str) -> Result<Self, ConfigError> {
        let (host, port) = parse_url(url)?;
        self.host = Some(host);
        self.port = Some(port);
        Ok(self)
    }

    /// Set the access token presented during the handshake.
    pub fn with_access_token(mut self, token: &str) -> Self {
        self.access_token = Some(token.to_owned());
        self
    }

    /// Set the application identifier attached to forwarded records.
    pub fn with_application_id(mut self, id: &str) -> Self {
        self.application_id = Some(id.to_owned());
        self
    }

    /// Set the client identity to resume.
    pub fn with_client_id(mut self, id: &str) -> Self {
        self.client_id = Some(id.to_owned());
        self
    }

    /// Set the minimum severity forwarded to the collector.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Set the highest verbosity level forwarded.
    pub fn with_max_verbose_level(mut self, max: u8) -> Self {
        self.max_verbose_level = Some(max);
        self
    }

    /// Enable TLS towards the collector.
    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Override the dispatch queue capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Override the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Override the write timeout.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Override the maximum serialised frame size.
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = Some(size);
        self
    }

    /// Validate the collected values and produce a [`SessionConfig`].
    pub fn build(self) -> Result<SessionConfig, ConfigError> {
        let host = self.host.ok_or(ConfigError::MissingField("url"))?;
        let port = self.port.ok_or(ConfigError::MissingField("url"))?;
        let access_token = self
            .access_token
            .ok_or(ConfigError::MissingField("access_token"))?;
        let capacity = self.capacity.unwrap_or(DEFAULT_CAPACITY);
        if capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "capacity",
                reason: "must be greater than zero".into(),
            });
        }
        let max_frame_size = self.max_frame_size.unwrap_or(DEFAULT_MAX_FRAME_SIZE);
        if max_frame_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_frame_size",
                reason: "must be greater than zero".into(),
            });
        }
        let max_verbose_level = self.max_verbose_level.unwrap_or(MAX_VERBOSE_LEVEL);
        if max_verbose_level > MAX_VERBOSE_LEVEL {
            return Err(ConfigError::InvalidValue {
                field: "max_verbose_level",
                reason: format!("must be at most {MAX_VERBOSE_LEVEL}"),
            });
        }
        Ok(SessionConfig {
            host,
            port,
            access_token,
            application_id: self.application_id,
            client_id: self.client_id,
            level: self.level.unwrap_or_default(),
            max_verbose_level,
            tls: self.tls,
            capacity,
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            write_timeout: self.write_timeout.unwrap_or(DEFAULT_WRITE_TIMEOUT),
            max_frame_size,
        })
    }
}

fn parse_url(url: &str) -> Result<(String, u16), ConfigError> {
    let (host, port) = url
        .rsplit_once(':')
        .ok_or_else(|| ConfigError::InvalidUrl(url.to_owned()))?;
    if host.is_empty() {
        return Err(ConfigError::InvalidUrl(url.to_owned()));
    }
    let port: u16 = port
        .parse()
        .map_err(|_| ConfigError::InvalidUrl(url.to_owned()))?;
    Ok((host.to_owned(), port))
}

/// Raw descriptor shape accepted from JSON. Unknown keys are ignored so
/// collector-side settings can live in the same file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    url: Option<String>,
    access_token: Option<String>,
    application_id: Option<String>,
    client_id: Option<String>,
    level: Option<String>,
    max_verbose_level: Option<u8>,
    tls: Option<RawTls>,
    connect_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    capacity: Option<usize>,
    max_frame_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawTls {
    domain: String,
    #[serde(default)]
    insecure_skip_verify: bool,
}

impl RawConfig {
    fn into_builder(self) -> Result<SessionConfigBuilder, ConfigError> {
        let mut builder = SessionConfigBuilder::new();
        if let Some(url) = self.url {
            builder = builder.with_url(&url)?;
        }
        if let Some(token) = self.access_token {
            builder = builder.with_access_token(&token);
        }
        if let Some(app) = self.application_id {
            builder = builder.with_application_id(&app);
        }
        if let Some(id) = self.client_id {
            builder = builder.with_client_id(&id);
        }
        if let Some(level) = self.level {
            let parsed = level
                .parse::<Level>()
                .map_err(|()| ConfigError::InvalidLevel(level))?;
            builder = builder.with_level(parsed);
        }
        if let Some(max) = self.max_verbose_level {
            builder = builder.with_max_verbose_level(max);
        }
        if let Some(tls) = self.tls {
            builder = builder.with_tls(TlsOptions {
                domain: tls.domain,
                insecure_skip_verify: tls.insecure_skip_verify,
            });
        }
        if let Some(ms) = self.connect_timeout_ms {
            builder = builder.with_connect_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.write_timeout_ms {
            builder = builder.with_write_timeout(Duration::from_millis(ms));
        }
        if let Some(capacity) = self.capacity {
            builder = builder.with_capacity(capacity);
        }
        if let Some(size) = self.max_frame_size {
            builder = builder.with_max_frame_size(size);
        }
        Ok(builder)
    }
}
