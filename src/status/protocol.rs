//! Packet encoding and decoding for the Minecraft status mechanisms.
//!
//! Two wire formats live here, both pure functions over byte buffers so the
//! network client stays a thin transport layer:
//!
//! - **Server list ping** (TCP): length-prefixed packets using protocol
//!   varints. A handshake with next state `1` is followed by a status request,
//!   the server answers a JSON document.
//! - **Query** (UDP, GameSpy4): a handshake returns a challenge token, then a
//!   full stat request returns a key/value section and the player list.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use log::trace;
use serde::Deserialize;

use crate::status::{QueryError, QueryResult, ServerAddress};

/// Protocol version advertised in the handshake, the server answers anyway.
pub const HANDSHAKE_PROTOCOL_VERSION: i32 = 47;

/// Largest packet accepted from a server (3 byte varint).
pub const MAX_PACKET_LENGTH: usize = 2_097_151;

const QUERY_MAGIC: [u8; 2] = [0xFE, 0xFD];
const QUERY_TYPE_HANDSHAKE: u8 = 0x09;
const QUERY_TYPE_STAT: u8 = 0x00;
const SESSION_ID_MASK: i32 = 0x0F0F_0F0F;
/// `splitnum\0\x80\0`
const STAT_HEADER_PADDING: usize = 11;
/// `\x01player_\0\0`
const PLAYER_SECTION_PADDING: usize = 10;

/// Masks a random value into a valid query session id.
pub fn session_id(seed: i32) -> i32 {
    seed & SESSION_ID_MASK
}

/// Appends `value` as a protocol varint.
pub fn put_varint(buf: &mut BytesMut, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7F == 0 {
            buf.put_u8(value as u8);
            return;
        }
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
}

/// Reads a protocol varint, at most 5 bytes.
pub fn get_varint(buf: &mut impl Buf) -> Result<i32, QueryError> {
    let mut value: u32 = 0;
    for position in 0..5 {
        if !buf.has_remaining() {
            return Err(QueryError::Protocol("truncated varint".to_owned()));
        }
        let byte = buf.get_u8();
        value |= ((byte & 0x7F) as u32) << (7 * position);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(QueryError::Protocol("varint is too long".to_owned()))
}

fn put_string(buf: &mut BytesMut, value: &str) {
    put_varint(buf, value.len() as i32);
    buf.put_slice(value.as_bytes());
}

/// Prefixes a packet body with its varint length.
fn frame(body: BytesMut) -> Bytes {
    let mut framed = BytesMut::with_capacity(body.len() + 5);
    put_varint(&mut framed, body.len() as i32);
    framed.extend_from_slice(&body);
    framed.freeze()
}

/// Encodes the handshake packet switching the connection to the status state.
pub fn encode_handshake(address: &ServerAddress) -> Bytes {
    let mut body = BytesMut::new();
    put_varint(&mut body, 0x00);
    put_varint(&mut body, HANDSHAKE_PROTOCOL_VERSION);
    put_string(&mut body, &address.host);
    body.put_u16(address.port);
    put_varint(&mut body, 1);
    frame(body)
}

/// Encodes the empty status request packet.
pub fn encode_status_request() -> Bytes {
    let mut body = BytesMut::new();
    put_varint(&mut body, 0x00);
    frame(body)
}

/// Status document sent by the server, only the used fields are kept.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    version: Option<StatusVersion>,
    players: Option<StatusPlayers>,
}

#[derive(Debug, Deserialize)]
struct StatusVersion {
    name: String,
}

#[derive(Debug, Deserialize)]
struct StatusPlayers {
    max: u32,
    online: u32,
    /// Absent or `null` when nobody is online or the server hides players
    sample: Option<Vec<SamplePlayer>>,
}

#[derive(Debug, Deserialize)]
struct SamplePlayer {
    name: String,
}

/// Decodes a status response packet, without its length prefix.
pub fn decode_status_response(mut packet: Bytes) -> Result<QueryResult, QueryError> {
    let packet_id = get_varint(&mut packet)?;
    if packet_id != 0x00 {
        return Err(QueryError::Protocol(format!(
            "unexpected packet id {packet_id:#04x}"
        )));
    }

    let length = get_varint(&mut packet)?;
    let length = usize::try_from(length)
        .map_err(|_| QueryError::Protocol(format!("negative string length {length}")))?;
    if packet.remaining() < length {
        return Err(QueryError::Protocol("truncated status document".to_owned()));
    }

    let json = packet.split_to(length);
    trace!("status document {}", String::from_utf8_lossy(&json));

    let response: StatusResponse = serde_json::from_slice(&json)
        .map_err(|e| QueryError::Protocol(format!("invalid status document: {e}")))?;
    let players = response
        .players
        .ok_or_else(|| QueryError::Protocol("status document has no players".to_owned()))?;

    Ok(QueryResult {
        online: true,
        current_players: players.online,
        max_players: players.max,
        sample_names: players
            .sample
            .unwrap_or_default()
            .into_iter()
            .map(|player| player.name)
            .collect(),
        version: response.version.map(|version| version.name),
    })
}

fn put_query_header(buf: &mut BytesMut, query_type: u8, session_id: i32) {
    buf.put_slice(&QUERY_MAGIC);
    buf.put_u8(query_type);
    buf.put_i32(session_id);
}

/// Encodes the query handshake requesting a challenge token.
pub fn encode_query_handshake(session_id: i32) -> Bytes {
    let mut buf = BytesMut::with_capacity(7);
    put_query_header(&mut buf, QUERY_TYPE_HANDSHAKE, session_id);
    buf.freeze()
}

/// Encodes the full stat request.
///
/// The 4 trailing zero bytes select the full stat over the basic one.
pub fn encode_full_stat_request(session_id: i32, challenge: i32) -> Bytes {
    let mut buf = BytesMut::with_capacity(15);
    put_query_header(&mut buf, QUERY_TYPE_STAT, session_id);
    buf.put_i32(challenge);
    buf.put_slice(&[0, 0, 0, 0]);
    buf.freeze()
}

fn check_query_header(
    buf: &mut &[u8],
    query_type: u8,
    session_id: i32,
) -> Result<(), QueryError> {
    if buf.remaining() < 5 {
        return Err(QueryError::Protocol("truncated query header".to_owned()));
    }
    let received_type = buf.get_u8();
    let received_session = buf.get_i32();
    if received_type != query_type || received_session != session_id {
        return Err(QueryError::Protocol(format!(
            "unexpected query answer type={received_type:#04x} session={received_session:#x}"
        )));
    }
    Ok(())
}

/// Reads a NUL-terminated string and consumes the terminator.
fn get_cstring(buf: &mut &[u8]) -> Result<String, QueryError> {
    let Some(end) = buf.iter().position(|byte| *byte == 0) else {
        return Err(QueryError::Protocol("unterminated string".to_owned()));
    };
    let value = String::from_utf8_lossy(&buf[..end]).into_owned();
    buf.advance(end + 1);
    Ok(value)
}

fn skip(buf: &mut &[u8], count: usize) -> Result<(), QueryError> {
    if buf.remaining() < count {
        return Err(QueryError::Protocol("truncated padding".to_owned()));
    }
    buf.advance(count);
    Ok(())
}

/// Decodes the handshake answer into the challenge token.
pub fn decode_challenge(datagram: &[u8], session_id: i32) -> Result<i32, QueryError> {
    let mut buf = datagram;
    check_query_header(&mut buf, QUERY_TYPE_HANDSHAKE, session_id)?;

    let token = get_cstring(&mut buf)?;
    token
        .trim()
        .parse::<i32>()
        .map_err(|_| QueryError::Protocol(format!("invalid challenge token `{token}`")))
}

/// Decodes the full stat answer.
pub fn decode_full_stat(datagram: &[u8], session_id: i32) -> Result<QueryResult, QueryError> {
    let mut buf = datagram;
    check_query_header(&mut buf, QUERY_TYPE_STAT, session_id)?;
    skip(&mut buf, STAT_HEADER_PADDING)?;

    let mut current_players = None;
    let mut max_players = None;
    let mut version = None;
    loop {
        let key = get_cstring(&mut buf)?;
        if key.is_empty() {
            break;
        }
        let value = get_cstring(&mut buf)?;
        trace!("query field {}={}", key, value);
        match key.as_str() {
            "numplayers" => current_players = value.parse::<u32>().ok(),
            "maxplayers" => max_players = value.parse::<u32>().ok(),
            "version" => version = Some(value),
            _ => {}
        }
    }

    skip(&mut buf, PLAYER_SECTION_PADDING)?;

    let mut sample_names = Vec::new();
    while buf.has_remaining() {
        let name = get_cstring(&mut buf)?;
        if name.is_empty() {
            break;
        }
        sample_names.push(name);
    }

    Ok(QueryResult {
        online: true,
        current_players: current_players.unwrap_or(sample_names.len() as u32),
        max_players: max_players
            .ok_or_else(|| QueryError::Protocol("missing maxplayers".to_owned()))?,
        sample_names,
        version,
    })
}
