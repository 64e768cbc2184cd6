//! Log dispatch over a single-writer worker thread.
//!
//! The dispatcher owns a bounded command channel feeding a worker thread
//! that holds the collector connection. All transport writes happen on
//! that thread, which is what serialises concurrent `write` callers.
//! Enqueueing never blocks; when the queue is full the record is dropped
//! and the drop is reported through the rate limited warner.

mod worker;

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Sender, TrySendError, bounded};
use log::warn;

use crate::config::SessionConfig;
use crate::log_record::LogRecord;
use crate::rate_limited_warner::{DEFAULT_WARN_INTERVAL, RateLimitedWarner};
use crate::session::Session;
use crate::transport::Connection;

use worker::worker_loop;

/// Commands processed by the worker thread.
pub(crate) enum Command {
    Record(LogRecord),
    Flush(Sender<()>),
    Shutdown(Sender<()>),
}

/// Tuning the worker needs from the session configuration.
#[derive(Clone, Debug)]
pub(crate) struct DispatchConfig {
    pub capacity: usize,
    pub write_timeout: Duration,
    pub max_frame_size: usize,
    pub application_id: Option<String>,
    pub warn_interval: Duration,
}

impl From<&SessionConfig> for DispatchConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            capacity: config.capacity,
            write_timeout: config.write_timeout,
            max_frame_size: config.max_frame_size,
            application_id: config.application_id.clone(),
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}

/// Handle to a running dispatch worker.
pub(crate) struct Dispatcher {
    tx: Option<Sender<Command>>,
    handle: Option<JoinHandle<()>>,
    warner: Arc<RateLimitedWarner>,
    flush_timeout: Duration,
}

impl Dispatcher {
    /// Spawn a worker owning `conn`. The worker runs until shutdown and
    /// marks `session` as failed if the transport breaks.
    pub(crate) fn spawn(
        conn: Box<dyn Connection>,
        session: Arc<Session>,
        config: DispatchConfig,
    ) -> Self {
        let warner = Arc::new(RateLimitedWarner::new(config.warn_interval));
        let flush_timeout = config.write_timeout;
        let (tx, rx) = bounded(config.capacity);
        let worker_warner = Arc::clone(&warner);
        let handle =
            std::thread::spawn(move || worker_loop(rx, conn, session, config, worker_warner));
        Self {
            tx: Some(tx),
            handle: Some(handle),
            warner,
            flush_timeout,
        }
    }

    /// Queue `record` for transmission. Never blocks; drops silently when
    /// the queue is full or the worker is gone.
    pub(crate) fn enqueue(&self, record: LogRecord) {
        let Some(tx) = &self.tx else {
            self.warner.record_drop();
            return;
        };
        match tx.try_send(Command::Record(record)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.warner.record_drop();
                self.warner.warn_if_due(|count| {
                    warn!("logwire: dispatch queue full; dropped {count} records");
                });
            }
            Err(TrySendError::Disconnected(_)) => {
                self.warner.record_drop();
                self.warner.warn_if_due(|count| {
                    warn!("logwire: dispatch worker gone; dropped {count} records");
                });
            }
        }
    }

    /// Block until previously queued records were written, bounded by the
    /// flush timeout. Returns `false` when the worker did not acknowledge
    /// in time.
    pub(crate) fn flush(&self) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        self.warner.flush(|count| {
            warn!("logwire: dropped {count} records in the last interval");
        });
        let (ack_tx, ack_rx) = bounded(1);
        if tx
            .send_timeout(Command::Flush(ack_tx), self.flush_timeout)
            .is_err()
        {
            return false;
        }
        ack_rx.recv_timeout(self.flush_timeout).is_ok()
    }

    /// Drain queued records, stop the worker, and wait for it to exit.
    pub(crate) fn shutdown(mut self) {
        self.request_shutdown();
        self.join_worker();
    }

    fn request_shutdown(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        let (ack_tx, ack_rx) = bounded(1);
        if tx.send(Command::Shutdown(ack_tx)).is_ok() {
            let _ = ack_rx.recv_timeout(self.flush_timeout);
        }
    }

    fn join_worker(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.join().is_err() {
            warn!("logwire: dispatch worker panicked");
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.request_shutdown();
        self.join_worker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use crate::session::SessionState;
    use parking_lot::Mutex;
    use rstest::rstest;
    use std::io;
    use std::time::Duration;

    /// In-memory connection capturing every write, optionally failing.
    struct StubConnection {
        written: Arc<Mutex<Vec<u8>>>,
        fail_writes: bool,
    }

    impl Connection for StubConnection {
        fn set_write_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
            Ok(())
        }

        fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }

        fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stub failure"));
            }
            self.written.lock().extend_from_slice(buf);
            Ok(())
        }

        fn read_exact(&mut self, _buf: &mut [u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "write only"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn dispatch_config() -> DispatchConfig {
        DispatchConfig {
            capacity: 16,
            write_timeout: Duration::from_millis(500),
            max_frame_size: 1 << 16,
            application_id: None,
            warn_interval: Duration::from_secs(5),
        }
    }

    fn connected_session() -> Arc<Session> {
        let session = Arc::new(Session::new());
        session.set_state(SessionState::Connected);
        session
    }

    #[rstest]
    fn forwards_framed_records() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let conn = Box::new(StubConnection {
            written: Arc::clone(&written),
            fail_writes: false,
        });
        let dispatcher = Dispatcher::spawn(conn, connected_session(), dispatch_config());
        dispatcher.enqueue(LogRecord::new("app", Level::Info, "one").with_thread("t"));
        assert!(dispatcher.flush());
        let bytes = written.lock().clone();
        assert!(bytes.len() > 4, "frame with header expected");
        let len = u32::from_be_bytes(bytes[..4].try_into().expect("header")) as usize;
        assert_eq!(bytes.len(), 4 + len);
        dispatcher.shutdown();
    }

    #[rstest]
    fn write_failure_fails_the_session() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let conn = Box::new(StubConnection {
            written,
            fail_writes: true,
        });
        let session = connected_session();
        let dispatcher = Dispatcher::spawn(conn, Arc::clone(&session), dispatch_config());
        dispatcher.enqueue(LogRecord::new("app", Level::Info, "doomed").with_thread("t"));
        dispatcher.flush();
        assert_eq!(session.state(), SessionState::Failed);
        // Further records are swallowed without touching the dead link.
        dispatcher.enqueue(LogRecord::new("app", Level::Info, "after").with_thread("t"));
        dispatcher.shutdown();
    }

    #[rstest]
    fn shutdown_drains_queued_records() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let conn = Box::new(StubConnection {
            written: Arc::clone(&written),
            fail_writes: false,
        });
        let dispatcher = Dispatcher::spawn(conn, connected_session(), dispatch_config());
        for i in 0..5 {
            dispatcher.enqueue(
                LogRecord::new("app", Level::Info, &format!("m{i}")).with_thread("t"),
            );
        }
        dispatcher.shutdown();
        let bytes = written.lock().clone();
        let mut frames = 0;
        let mut offset = 0;
        while offset + 4 <= bytes.len() {
            let len = u32::from_be_bytes(bytes[offset..offset + 4].try_into().expect("header"));
            offset += 4 + len as usize;
            frames += 1;
        }
        assert_eq!(frames, 5);
    }

    #[rstest]
    fn oversized_record_is_dropped_not_fatal() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let conn = Box::new(StubConnection {
            written: Arc::clone(&written),
            fail_writes: false,
        });
        let mut config = dispatch_config();
        config.max_frame_size = 8;
        let session = connected_session();
        let dispatcher = Dispatcher::spawn(conn, Arc::clone(&session), config);
        dispatcher.enqueue(
            LogRecord::new("app", Level::Info, "far too large for eight bytes")
                .with_thread("t"),
        );
        assert!(dispatcher.flush());
        assert!(written.lock().is_empty());
        assert_eq!(session.state(), SessionState::Connected);
        dispatcher.shutdown();
    }
}
