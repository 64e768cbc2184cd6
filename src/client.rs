//! Client facade tying the components together.
//!
//! A [`Client`] owns one logical session to the collector: the immutable
//! configuration, the shared session state, the threshold filter, the
//! thread identity registry, and (while connected) the dispatch worker.
//! Connection management calls may block on the network; `write` never
//! does.

use std::io;
use std::sync::Arc;

use log::debug;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::config::{ConfigError, SessionConfig};
use crate::dispatch::{DispatchConfig, Dispatcher};
use crate::filter::ThresholdFilter;
use crate::log_record::LogRecord;
use crate::logger::Logger;
use crate::session::{Session, SessionInfo, SessionState};
use crate::thread_registry::ThreadRegistry;
use crate::transport::{Connection, Dialer, SocketDialer, SocketTransport, TcpTransport};
use crate::wire::{
    HandshakeRequest, PROTOCOL_VERSION, decode_handshake_response, read_frame,
    serialise_handshake, write_frame,
};

/// Errors surfaced by `connect` and `reconnect`.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The collector endpoint could not be reached, or the handshake
    /// failed at the transport level.
    #[error("unable to reach collector: {0}")]
    Io(#[from] io::Error),
    /// The collector refused the presented credentials.
    #[error("collector rejected credentials: {0}")]
    AuthRejected(String),
    /// The collector replied with something this client cannot parse,
    /// typically a protocol revision mismatch.
    #[error("handshake protocol error: {0}")]
    Protocol(String),
}

/// Remote logging client owning one logical session.
pub struct Client {
    config: SessionConfig,
    dialer: Box<dyn Dialer>,
    session: Arc<Session>,
    filter: ThresholdFilter,
    threads: ThreadRegistry,
    // Serialises connect/reconnect/disconnect against each other. The
    // dispatcher lock is held only for installs, takes, and enqueues, so
    // `write` cannot be held up by an in-flight handshake.
    ops: Mutex<()>,
    dispatcher: RwLock<Option<Dispatcher>>,
}

impl Client {
    /// Create a client dialling the endpoint named by `config`.
    pub fn new(config: SessionConfig) -> Self {
        let dialer = SocketDialer::new(SocketTransport::Tcp(TcpTransport {
            host: config.host.clone(),
            port: config.port,
            tls: config.tls.clone(),
        }));
        Self::with_dialer(config, Box::new(dialer))
    }

    /// Create a client with a custom transport factory.
    pub fn with_dialer(config: SessionConfig, dialer: Box<dyn Dialer>) -> Self {
        let filter = ThresholdFilter::new(&config);
        Self {
            config,
            dialer,
            session: Arc::new(Session::new()),
            filter,
            threads: ThreadRegistry::new(),
            ops: Mutex::new(()),
            dispatcher: RwLock::new(None),
        }
    }

    /// Load the configuration from a JSON file and create a client.
    pub fn from_config_file(path: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(SessionConfig::from_file(path)?))
    }

    /// Parse an inline JSON descriptor and create a client.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(SessionConfig::from_json(json)?))
    }

    /// Establish the session: dial, handshake, start the dispatch worker.
    ///
    /// Blocks the calling thread for the duration of the handshake. On
    /// failure the session is left in the `Failed` state; a later
    /// [`reconnect`](Self::reconnect) may recover it. Calling `connect`
    /// while already connected tears the existing session down first.
    pub fn connect(&self) -> Result<SessionInfo, ConnectionError> {
        let _ops = self.ops.lock();
        self.session.set_state(SessionState::Connecting);
        self.session.clear_info();
        let previous = self.dispatcher.write().take();
        if let Some(dispatcher) = previous {
            dispatcher.shutdown();
        }
        match self.establish() {
            Ok((conn, info)) => {
                self.session.set_info(info.clone());
                let dispatcher = Dispatcher::spawn(
                    conn,
                    Arc::clone(&self.session),
                    DispatchConfig::from(&self.config),
                );
                *self.dispatcher.write() = Some(dispatcher);
                self.session.set_state(SessionState::Connected);
                debug!(
                    "logwire: connected as {} (server {})",
                    info.client_id, info.server_version
                );
                Ok(info)
            }
            Err(err) => {
                self.session.set_state(SessionState::Failed);
                Err(err)
            }
        }
    }

    /// Re-establish the session using the configuration this client was
    /// created with. Same failure semantics as [`connect`](Self::connect).
    pub fn reconnect(&self) -> Result<SessionInfo, ConnectionError> {
        self.connect()
    }

    /// Tear the session down, flushing queued records first.
    ///
    /// Idempotent: calling this while already disconnected is a no-op.
    pub fn disconnect(&self) {
        let _ops = self.ops.lock();
        self.session.set_state(SessionState::Disconnected);
        self.session.clear_info();
        let taken = self.dispatcher.write().take();
        if let Some(dispatcher) = taken {
            dispatcher.shutdown();
        }
    }

    /// Dispatch `record` to the collector.
    ///
    /// Fire and forget: the record is silently discarded when the session
    /// is not connected, the record does not pass the configured
    /// thresholds, or the dispatch queue is full. Never blocks and never
    /// returns an error.
    pub fn write(&self, mut record: LogRecord) {
        if !self.session.is_connected() {
            return;
        }
        if !self.filter.should_forward(&record) {
            return;
        }
        // Resolve the thread label on the calling thread; the worker has
        // no access to the caller's identity.
        record.thread = Some(self.threads.resolve(record.thread.as_deref()));
        if let Some(dispatcher) = &*self.dispatcher.read() {
            dispatcher.enqueue(record);
        }
    }

    /// Associate `name` with the calling thread for subsequent records.
    pub fn set_thread_name(&self, name: &str) {
        self.threads.set_current(name);
    }

    /// Block until previously queued records were written, bounded by the
    /// configured write timeout. Returns `false` when not connected or
    /// the worker did not acknowledge in time.
    pub fn flush(&self) -> bool {
        match &*self.dispatcher.read() {
            Some(dispatcher) => dispatcher.flush(),
            None => false,
        }
    }

    /// Current session lifecycle state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Identity from the most recent successful handshake, while the
    /// session holds one.
    pub fn session_info(&self) -> Option<SessionInfo> {
        self.session.info()
    }

    /// The configuration this client was created with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// A convenience handle writing records for `logger_id`.
    pub fn logger<'a>(&'a self, logger_id: &str) -> Logger<'a> {
        Logger::new(self, logger_id)
    }

    fn establish(&self) -> Result<(Box<dyn Connection>, SessionInfo), ConnectionError> {
        let mut conn = self.dialer.dial(self.config.connect_timeout)?;
        conn.set_read_timeout(Some(self.config.connect_timeout))?;
        conn.set_write_timeout(self.config.connect_timeout)?;

        let request = HandshakeRequest {
            client_id: self.config.client_id.as_deref(),
            access_token: &self.config.access_token,
            application_id: self.config.application_id.as_deref(),
            protocol_version: PROTOCOL_VERSION,
        };
        let payload = serialise_handshake(&request)?;
        write_frame(conn.as_mut(), &payload, self.config.max_frame_size)?;

        let reply = read_frame(conn.as_mut(), self.config.max_frame_size)?;
        let response = decode_handshake_response(&reply)
            .map_err(|err| ConnectionError::Protocol(err.to_string()))?;
        if !response.accepted {
            let reason = response
                .message
                .unwrap_or_else(|| "access token rejected".to_owned());
            return Err(ConnectionError::AuthRejected(reason));
        }

        // Steady state is write-only; reads would otherwise time out.
        conn.set_read_timeout(None)?;
        Ok((
            conn,
            SessionInfo {
                client_id: response.client_id,
                server_version: response.server_version,
            },
        ))
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &format_args!("{}:{}", self.config.host, self.config.port))
            .field("state", &self.state())
            .finish()
    }
}
