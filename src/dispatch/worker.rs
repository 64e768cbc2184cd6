//! Worker thread driving transport I/O.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use log::warn;

use crate::log_record::LogRecord;
use crate::rate_limited_warner::RateLimitedWarner;
use crate::session::{Session, SessionState};
use crate::transport::Connection;
use crate::wire::{frame_payload, serialise_record};

use super::{Command, DispatchConfig};

pub(super) fn worker_loop(
    rx: Receiver<Command>,
    mut conn: Box<dyn Connection>,
    session: Arc<Session>,
    config: DispatchConfig,
    warner: Arc<RateLimitedWarner>,
) {
    if let Err(err) = conn.set_write_timeout(config.write_timeout) {
        warn!("logwire: failed to set write timeout: {err}");
    }
    // The connection is consumed on the first fatal write error; records
    // arriving afterwards are counted as drops until shutdown.
    let mut link: Option<Box<dyn Connection>> = Some(conn);
    while let Ok(cmd) = rx.recv() {
        match cmd {
            Command::Record(record) => {
                handle_record(&mut link, &record, &session, &config, &warner);
            }
            Command::Flush(ack) => {
                if let Some(active) = link.as_deref_mut()
                    && let Err(err) = active.flush()
                {
                    warn!("logwire: flush failed: {err}");
                }
                let _ = ack.send(());
            }
            Command::Shutdown(ack) => {
                drain_remaining(&rx, &mut link, &session, &config, &warner);
                let _ = ack.send(());
                break;
            }
        }
    }
}

/// Serialise and transmit one record, downgrading the session on fatal
/// transport errors.
fn handle_record(
    link: &mut Option<Box<dyn Connection>>,
    record: &LogRecord,
    session: &Session,
    config: &DispatchConfig,
    warner: &RateLimitedWarner,
) {
    let Some(active) = link.as_deref_mut() else {
        warner.record_drop();
        warner.warn_if_due(|count| {
            warn!("logwire: no active connection; dropped {count} records");
        });
        return;
    };
    let payload = match serialise_record(record, config.application_id.as_deref()) {
        Ok(payload) => payload,
        Err(err) => {
            warn!("logwire: serialisation error: {err}");
            warner.record_drop();
            return;
        }
    };
    let Some(frame) = frame_payload(&payload, config.max_frame_size) else {
        warner.record_drop();
        warner.warn_if_due(|count| {
            warn!(
                "logwire: dropped {count} records exceeding the {} byte frame limit",
                config.max_frame_size
            );
        });
        return;
    };
    match active.write_all(&frame).and_then(|()| active.flush()) {
        Ok(()) => {}
        Err(err) => {
            warn!("logwire: transport write failed, failing session: {err}");
            session.set_state(SessionState::Failed);
            *link = None;
            warner.record_drop();
        }
    }
}

/// Consume whatever is still queued so shutdown loses nothing that could
/// be written.
fn drain_remaining(
    rx: &Receiver<Command>,
    link: &mut Option<Box<dyn Connection>>,
    session: &Session,
    config: &DispatchConfig,
    warner: &RateLimitedWarner,
) {
    while let Ok(cmd) = rx.try_recv() {
        match cmd {
            Command::Record(record) => handle_record(link, &record, session, config, warner),
            Command::Flush(ack) | Command::Shutdown(ack) => {
                let _ = ack.send(());
            }
        }
    }
    if let Some(active) = link.as_deref_mut()
        && let Err(err) = active.flush()
    {
        warn!("logwire: final flush failed: {err}");
    }
}
