//! Wire encoding for the collector protocol.
//!
//! Every payload is MessagePack encoded as a named map and framed with a
//! big-endian `u32` length prefix. The connect exchange is one request
//! frame followed by one response frame; after that the stream carries
//! record frames only.

use std::io;
use std::time::UNIX_EPOCH;

use rmp_serde::Serializer;
use serde::{Deserialize, Serialize};

use crate::log_record::LogRecord;
use crate::transport::Connection;

/// Length prefix size in bytes.
pub(crate) const FRAME_HEADER_LEN: usize = 4;
/// Protocol revision spoken by this client.
pub(crate) const PROTOCOL_VERSION: u32 = 1;

/// Handshake request sent immediately after the transport is established.
#[derive(Debug, Serialize)]
pub(crate) struct HandshakeRequest<'a> {
    pub client_id: Option<&'a str>,
    pub access_token: &'a str,
    pub application_id: Option<&'a str>,
    pub protocol_version: u32,
}

/// Handshake response from the collector.
#[derive(Debug, Deserialize)]
pub(crate) struct HandshakeResponse {
    pub accepted: bool,
    pub client_id: String,
    pub server_version: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Borrowing view of a [`LogRecord`] in its wire shape.
#[derive(Serialize)]
struct WireRecord<'a> {
    logger: &'a str,
    level: String,
    vlevel: u8,
    msg: &'a str,
    datetime: u64,
    file: &'a str,
    line: u32,
    func: &'a str,
    thread: &'a str,
    app: Option<&'a str>,
}

impl<'a> WireRecord<'a> {
    fn new(record: &'a LogRecord, application_id: Option<&'a str>) -> Self {
        let datetime = record
            .timestamp
            .duration_since(UNIX_EPOCH)
            .map(|dur| dur.as_millis().min(u128::from(u64::MAX)) as u64)
            .unwrap_or_default();
        Self {
            logger: &record.logger,
            level: record.level.to_string(),
            vlevel: record.verbose_level,
            msg: &record.message,
            datetime,
            file: &record.file,
            line: record.line,
            func: &record.function,
            thread: record.thread.as_deref().unwrap_or(""),
            app: application_id,
        }
    }
}

fn to_msgpack<T: Serialize>(value: &T) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(128);
    value
        .serialize(&mut Serializer::new(&mut buf).with_struct_map())
        .map_err(io::Error::other)?;
    Ok(buf)
}

/// Serialise a record into a MessagePack payload.
pub(crate) fn serialise_record(
    record: &LogRecord,
    application_id: Option<&str>,
) -> io::Result<Vec<u8>> {
    to_msgpack(&WireRecord::new(record, application_id))
}

/// Serialise a handshake request into a MessagePack payload.
pub(crate) fn serialise_handshake(request: &HandshakeRequest<'_>) -> io::Result<Vec<u8>> {
    to_msgpack(request)
}

/// Decode the collector's handshake response payload.
pub(crate) fn decode_handshake_response(payload: &[u8]) -> io::Result<HandshakeResponse> {
    rmp_serde::from_slice(payload).map_err(|err| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("malformed handshake response: {err}"),
        )
    })
}

/// Frame the payload with a big-endian length prefix.
///
/// Returns `None` when the payload exceeds `max_size`.
pub(crate) fn frame_payload(payload: &[u8], max_size: usize) -> Option<Vec<u8>> {
    if payload.len() > max_size {
        return None;
    }
    let len = u32::try_from(payload.len()).ok()?;
    let mut framed = Vec::with_capacity(payload.len() + FRAME_HEADER_LEN);
    framed.extend(len.to_be_bytes());
    framed.extend_from_slice(payload);
    Some(framed)
}

/// Write one framed payload to `conn`.
pub(crate) fn write_frame(
    conn: &mut dyn Connection,
    payload: &[u8],
    max_size: usize,
) -> io::Result<()> {
    let frame = frame_payload(payload, max_size).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "frame exceeds size limit")
    })?;
    conn.write_all(&frame)?;
    conn.flush()
}

/// Read one framed payload from `conn`.
pub(crate) fn read_frame(conn: &mut dyn Connection, max_size: usize) -> io::Result<Vec<u8>> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    conn.read_exact(&mut header)?;
    let len = u32::from_be_bytes(header) as usize;
    if len > max_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("incoming frame of {len} bytes exceeds limit of {max_size}"),
        ));
    }
    let mut payload = vec![0u8; len];
    conn.read_exact(&mut payload)?;
    Ok(payload)
}
