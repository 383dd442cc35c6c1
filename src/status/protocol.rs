// src/status/protocol.rs
//! Server List Ping: the handshake/status/ping exchange a Minecraft server
//! answers without a login.
//!
//! Every frame is `VarInt length ‖ VarInt packet id ‖ payload`. The client
//! sends a handshake with next-state 1 and an empty status request, reads the
//! JSON status document, then optionally measures latency with a ping.

use async_trait::async_trait;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::io::{self, Cursor, Read};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::models::server::Player;

/// Protocol number sent in the handshake. Servers answer status requests
/// for any value.
const HANDSHAKE_PROTOCOL_VERSION: i32 = 47;
const NEXT_STATE_STATUS: i32 = 1;
const PACKET_HANDSHAKE: i32 = 0x00;
const PACKET_STATUS: i32 = 0x00;
const PACKET_PING: i32 = 0x01;
const MAX_FRAME_LEN: usize = 2 * 1024 * 1024;
const MAX_VARINT_BYTES: usize = 5;

#[derive(Debug)]
pub enum QueryError {
    Connect(io::Error),
    Io(io::Error),
    Timeout(Duration),
    Protocol(String),
    Json(serde_json::Error),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "failed to connect: {}", e),
            Self::Io(e) => write!(f, "connection error: {}", e),
            Self::Timeout(budget) => write!(f, "timed out after {:?}", budget),
            Self::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Self::Json(e) => write!(f, "invalid status document: {}", e),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<io::Error> for QueryError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// What a server reported, with all text already cleaned of formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolResponse {
    pub motd: String,
    pub version_name: String,
    pub protocol: i32,
    pub online_players: Option<i64>,
    pub max_players: Option<i64>,
    pub sample: Vec<Player>,
    pub favicon: Option<String>,
    pub latency: Option<Duration>,
}

#[async_trait]
pub trait StatusProtocol: Send + Sync {
    async fn query(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<ProtocolResponse, QueryError>;
}

pub struct ServerListPing;

#[async_trait]
impl StatusProtocol for ServerListPing {
    async fn query(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<ProtocolResponse, QueryError> {
        let deadline = Instant::now() + timeout;
        let (mut stream, mut response) =
            match tokio::time::timeout_at(deadline, request_status(host, port)).await {
                Ok(result) => result?,
                Err(_) => return Err(QueryError::Timeout(timeout)),
            };

        // Latency is informational only; a server that drops or ignores the
        // ping after a valid status document still counts as online. The ping
        // gets half of what is left so it ends well inside the budget.
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining / 2, ping(&mut stream)).await {
            Ok(Ok(latency)) => response.latency = Some(latency),
            Ok(Err(e)) => debug!("Ping {}:{} failed: {}", host, port, e),
            Err(_) => debug!("Ping {}:{} got no pong within {:?}", host, port, remaining / 2),
        }

        Ok(response)
    }
}

async fn request_status(
    host: &str,
    port: u16,
) -> Result<(TcpStream, ProtocolResponse), QueryError> {
    let mut stream = TcpStream::connect((host, port))
        .await
        .map_err(QueryError::Connect)?;
    stream.set_nodelay(true).ok();

    stream.write_all(&handshake_frame(host, port)?).await?;
    stream.write_all(&frame(PACKET_STATUS, &[])?).await?;

    let (id, payload) = read_frame(&mut stream).await?;
    if id != PACKET_STATUS {
        return Err(QueryError::Protocol(format!(
            "expected status response, got packet 0x{:02x}",
            id
        )));
    }
    let document = read_string(&mut Cursor::new(payload.as_slice()))?;
    let response = parse_status(&document)?;
    Ok((stream, response))
}

async fn ping(stream: &mut TcpStream) -> Result<Duration, QueryError> {
    let token: i64 = rand::random();
    let mut payload: Vec<u8> = Vec::with_capacity(8);
    WriteBytesExt::write_i64::<BigEndian>(&mut payload, token)?;

    let started = Instant::now();
    stream.write_all(&frame(PACKET_PING, &payload)?).await?;
    let (id, pong) = read_frame(stream).await?;
    let latency = started.elapsed();

    if id != PACKET_PING {
        return Err(QueryError::Protocol(format!("expected pong, got packet 0x{:02x}", id)));
    }
    let echoed = ReadBytesExt::read_i64::<BigEndian>(&mut Cursor::new(pong.as_slice()))?;
    if echoed != token {
        return Err(QueryError::Protocol("pong payload mismatch".to_string()));
    }
    Ok(latency)
}

pub(crate) fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7f == 0 {
            buf.push(value as u8);
            return;
        }
        buf.push((value & 0x7f) as u8 | 0x80);
        value >>= 7;
    }
}

pub(crate) fn read_varint(reader: &mut impl Read) -> Result<i32, QueryError> {
    let mut value: u32 = 0;
    for i in 0..MAX_VARINT_BYTES {
        let byte = reader.read_u8()?;
        value |= ((byte & 0x7f) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(QueryError::Protocol("VarInt is too long".to_string()))
}

async fn read_varint_async<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32, QueryError> {
    let mut value: u32 = 0;
    for i in 0..MAX_VARINT_BYTES {
        let byte = reader.read_u8().await?;
        value |= ((byte & 0x7f) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(QueryError::Protocol("VarInt is too long".to_string()))
}

fn write_string(buf: &mut Vec<u8>, value: &str) -> Result<(), QueryError> {
    let len = i32::try_from(value.len())
        .map_err(|_| QueryError::Protocol("string too long".to_string()))?;
    write_varint(buf, len);
    buf.extend_from_slice(value.as_bytes());
    Ok(())
}

fn read_string(reader: &mut Cursor<&[u8]>) -> Result<String, QueryError> {
    let len = read_varint(reader)?;
    let len = usize::try_from(len)
        .map_err(|_| QueryError::Protocol(format!("negative string length {}", len)))?;
    let remaining = reader.get_ref().len() - reader.position() as usize;
    if len > remaining {
        return Err(QueryError::Protocol(format!(
            "string length {} exceeds frame ({} bytes left)",
            len, remaining
        )));
    }
    let mut bytes = vec![0u8; len];
    Read::read_exact(reader, &mut bytes)?;
    String::from_utf8(bytes).map_err(|e| QueryError::Protocol(e.to_string()))
}

pub(crate) fn frame(packet_id: i32, payload: &[u8]) -> Result<Vec<u8>, QueryError> {
    let mut body = Vec::with_capacity(payload.len() + 1);
    write_varint(&mut body, packet_id);
    body.extend_from_slice(payload);

    let len = i32::try_from(body.len())
        .map_err(|_| QueryError::Protocol("frame too long".to_string()))?;
    let mut out = Vec::with_capacity(body.len() + MAX_VARINT_BYTES);
    write_varint(&mut out, len);
    out.extend_from_slice(&body);
    Ok(out)
}

fn handshake_frame(host: &str, port: u16) -> Result<Vec<u8>, QueryError> {
    let mut payload = Vec::new();
    write_varint(&mut payload, HANDSHAKE_PROTOCOL_VERSION);
    write_string(&mut payload, host)?;
    WriteBytesExt::write_u16::<BigEndian>(&mut payload, port)?;
    write_varint(&mut payload, NEXT_STATE_STATUS);
    frame(PACKET_HANDSHAKE, &payload)
}

/// Reads one frame and splits it into packet id and payload.
pub(crate) async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<(i32, Vec<u8>), QueryError> {
    let len = read_varint_async(reader).await?;
    let len = usize::try_from(len)
        .map_err(|_| QueryError::Protocol(format!("negative frame length {}", len)))?;
    if len == 0 || len > MAX_FRAME_LEN {
        return Err(QueryError::Protocol(format!("frame length {} out of range", len)));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    let mut cursor = Cursor::new(body.as_slice());
    let id = read_varint(&mut cursor)?;
    let offset = cursor.position() as usize;
    Ok((id, body[offset..].to_vec()))
}

#[derive(Deserialize, Default)]
struct StatusDocument {
    #[serde(default)]
    version: VersionInfo,
    #[serde(default)]
    players: PlayersInfo,
    #[serde(default)]
    description: Value,
    favicon: Option<String>,
}

#[derive(Deserialize, Default)]
struct VersionInfo {
    #[serde(default)]
    name: String,
    #[serde(default)]
    protocol: i32,
}

#[derive(Deserialize, Default)]
struct PlayersInfo {
    max: Option<i64>,
    online: Option<i64>,
    sample: Option<Vec<SamplePlayer>>,
}

#[derive(Deserialize)]
struct SamplePlayer {
    #[serde(default)]
    name: String,
    #[serde(default)]
    id: String,
}

pub(crate) fn parse_status(document: &str) -> Result<ProtocolResponse, QueryError> {
    let status: StatusDocument = serde_json::from_str(document).map_err(QueryError::Json)?;

    let sample = status
        .players
        .sample
        .unwrap_or_default()
        .into_iter()
        .map(|p| Player::new(strip_formatting(&p.name), Some(p.id)))
        .collect();

    Ok(ProtocolResponse {
        motd: strip_formatting(&flatten_chat(&status.description)),
        version_name: strip_formatting(&status.version.name),
        protocol: status.version.protocol,
        online_players: status.players.online,
        max_players: status.players.max,
        sample,
        favicon: status.favicon.filter(|f| !f.is_empty()),
        latency: None,
    })
}

/// Concatenates the visible text of a chat component: a plain string, an
/// object with `text`/`translate` and `extra` children, or an array.
pub(crate) fn flatten_chat(component: &Value) -> String {
    let mut out = String::new();
    append_chat(component, &mut out);
    out
}

fn append_chat(component: &Value, out: &mut String) {
    match component {
        Value::String(text) => out.push_str(text),
        Value::Array(parts) => parts.iter().for_each(|part| append_chat(part, out)),
        Value::Object(map) => {
            match map.get("text").or_else(|| map.get("translate")) {
                Some(Value::String(text)) => out.push_str(text),
                Some(other @ (Value::Number(_) | Value::Bool(_))) => out.push_str(&other.to_string()),
                _ => {}
            }
            if let Some(extra) = map.get("extra") {
                append_chat(extra, out);
            }
        }
        _ => {}
    }
}

/// Removes `§x` formatting codes.
pub(crate) fn strip_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '§' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}
