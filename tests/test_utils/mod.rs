//! Shared helpers for integration tests: a stub collector speaking the
//! wire protocol over a real TCP socket, plus an in-memory transport for
//! counting exactly what the client writes.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use logwire::{Connection, Dialer, SessionConfig, SessionConfigBuilder};

/// Wire shape of a forwarded record, mirrored for decoding.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct CapturedRecord {
    pub logger: String,
    pub level: String,
    pub vlevel: u8,
    pub msg: String,
    pub datetime: u64,
    pub file: String,
    pub line: u32,
    pub func: String,
    pub thread: String,
    pub app: Option<String>,
}

/// Wire shape of the client's handshake request, mirrored for decoding.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct CapturedHandshake {
    pub client_id: Option<String>,
    pub access_token: String,
    pub application_id: Option<String>,
    pub protocol_version: u32,
}

/// Handshake response the stub collector sends back.
#[derive(Clone, Debug, Serialize)]
pub struct HandshakeReply {
    pub accepted: bool,
    pub client_id: String,
    pub server_version: String,
    pub message: Option<String>,
}

impl HandshakeReply {
    pub fn accepting(client_id: &str) -> Self {
        Self {
            accepted: true,
            client_id: client_id.to_owned(),
            server_version: "stub-2.0".to_owned(),
            message: None,
        }
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            accepted: false,
            client_id: String::new(),
            server_version: String::new(),
            message: Some(reason.to_owned()),
        }
    }
}

/// Running stub collector and the channels it reports through.
pub struct StubCollector {
    pub addr: SocketAddr,
    pub handshakes: mpsc::Receiver<CapturedHandshake>,
    pub records: mpsc::Receiver<CapturedRecord>,
}

/// Spawn a collector accepting sequential sessions, answering each
/// handshake with `reply` and decoding record frames until the peer
/// hangs up.
pub fn spawn_collector(reply: HandshakeReply) -> StubCollector {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind stub collector");
    let addr = listener.local_addr().expect("listener address");
    let (handshake_tx, handshake_rx) = mpsc::channel();
    let (record_tx, record_rx) = mpsc::channel();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let Some(payload) = read_frame(&mut stream) else {
                continue;
            };
            let Ok(handshake) = rmp_serde::from_slice::<CapturedHandshake>(&payload) else {
                continue;
            };
            if handshake_tx.send(handshake).is_err() {
                return;
            }
            let encoded = rmp_serde::to_vec_named(&reply).expect("encode reply");
            if write_frame(&mut stream, &encoded).is_err() || !reply.accepted {
                continue;
            }
            while let Some(payload) = read_frame(&mut stream) {
                let Ok(record) = rmp_serde::from_slice::<CapturedRecord>(&payload) else {
                    break;
                };
                if record_tx.send(record).is_err() {
                    return;
                }
            }
        }
    });
    StubCollector {
        addr,
        handshakes: handshake_rx,
        records: record_rx,
    }
}

fn read_frame(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).ok()?;
    let len = u32::from_be_bytes(header) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).ok()?;
    Some(payload)
}

fn write_frame(stream: &mut TcpStream, payload: &[u8]) -> std::io::Result<()> {
    let len = u32::try_from(payload.len()).expect("payload fits u32");
    stream.write_all(&len.to_be_bytes())?;
    stream.write_all(payload)?;
    stream.flush()
}

/// Configuration pointed at `addr` with test-friendly timeouts.
pub fn config_for(addr: SocketAddr) -> SessionConfigBuilder {
    SessionConfig::builder()
        .with_endpoint("127.0.0.1", addr.port())
        .with_access_token("test-token")
        .with_connect_timeout(Duration::from_secs(1))
        .with_write_timeout(Duration::from_secs(1))
}

/// In-memory connection: reads serve a pre-scripted handshake reply,
/// writes accumulate into a shared buffer.
pub struct ScriptedConnection {
    response: Vec<u8>,
    cursor: usize,
    written: Arc<Mutex<Vec<u8>>>,
}

impl Connection for ScriptedConnection {
    fn set_write_timeout(&mut self, _timeout: Duration) -> std::io::Result<()> {
        Ok(())
    }

    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> std::io::Result<()> {
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.written.lock().extend_from_slice(buf);
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        let remaining = &self.response[self.cursor..];
        if remaining.len() < buf.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "scripted response exhausted",
            ));
        }
        buf.copy_from_slice(&remaining[..buf.len()]);
        self.cursor += buf.len();
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// [`Dialer`] handing out [`ScriptedConnection`]s that share one capture
/// buffer.
pub struct ScriptedDialer {
    reply: HandshakeReply,
    pub written: Arc<Mutex<Vec<u8>>>,
}

impl ScriptedDialer {
    pub fn new(reply: HandshakeReply) -> Self {
        Self {
            reply,
            written: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Dialer for ScriptedDialer {
    fn dial(&self, _connect_timeout: Duration) -> std::io::Result<Box<dyn Connection>> {
        let payload = rmp_serde::to_vec_named(&self.reply).expect("encode reply");
        let mut response = Vec::with_capacity(payload.len() + 4);
        let len = u32::try_from(payload.len()).expect("payload fits u32");
        response.extend(len.to_be_bytes());
        response.extend_from_slice(&payload);
        Ok(Box::new(ScriptedConnection {
            response,
            cursor: 0,
            written: Arc::clone(&self.written),
        }))
    }
}

/// Decode the record frames in a capture buffer, skipping the leading
/// handshake request frame.
pub fn captured_records(written: &[u8]) -> Vec<CapturedRecord> {
    let mut records = Vec::new();
    let mut offset = 0;
    let mut first = true;
    while offset + 4 <= written.len() {
        let len =
            u32::from_be_bytes(written[offset..offset + 4].try_into().expect("header")) as usize;
        let payload = &written[offset + 4..offset + 4 + len];
        if !first {
            records.push(rmp_serde::from_slice(payload).expect("decode record"));
        }
        first = false;
        offset += 4 + len;
    }
    records
}
