//! Network client for Minecraft server status queries.
//!
//! This module provides the [`MinecraftStatusClient`] struct issuing both
//! status mechanisms against a remote server. Every exchange is bounded by the
//! client timeout, no retry is performed.

use std::{io, net::SocketAddr, time::Duration};

use bytes::{BufMut, Bytes, BytesMut};
use log::{debug, info};
use mockall::automock;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    net::{TcpStream, UdpSocket, lookup_host},
    time,
};

use crate::status::{
    QueryError, QueryMode, QueryResult, ServerAddress,
    protocol::{
        MAX_PACKET_LENGTH, decode_challenge, decode_full_stat, decode_status_response,
        encode_full_stat_request, encode_handshake, encode_query_handshake,
        encode_status_request, get_varint, session_id,
    },
};

/// Timeout applied to a whole query exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Largest UDP datagram a query answer can use.
const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Trait for querying a Minecraft server.
///
/// This trait abstracts the network operations for easier testing with mocks.
#[automock]
pub trait StatusRequester {
    /// Queries the server at `address` with the given mechanism.
    async fn query(
        &self,
        address: &ServerAddress,
        mode: QueryMode,
    ) -> Result<QueryResult, QueryError>;
}

/// Minecraft status client speaking the query and server list ping protocols.
///
/// # Examples
///
/// ```no_run
/// # use mcqbot::status::{MinecraftStatusClient, QueryMode, ServerAddress, StatusRequester};
/// # async fn example() {
/// let client = MinecraftStatusClient::new();
/// let address = ServerAddress::new("play.example.com", 25565);
/// match client.query(&address, QueryMode::Full).await {
///     Ok(result) => println!("players: {:?}", result.sample_names),
///     Err(e) => println!("query failed: {e}"),
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MinecraftStatusClient {
    /// Upper bound for one query exchange
    timeout: Duration,
}

impl Default for MinecraftStatusClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MinecraftStatusClient {
    /// Create a new [`MinecraftStatusClient`] using [`DEFAULT_TIMEOUT`].
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a new [`MinecraftStatusClient`] with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        MinecraftStatusClient { timeout }
    }

    /// Server list ping over TCP.
    ///
    /// Sends the handshake and the status request, then reads a single
    /// length-prefixed status response.
    async fn ping(&self, address: &ServerAddress) -> Result<QueryResult, QueryError> {
        debug!("status ping {}", address);

        let mut stream = TcpStream::connect((address.host.as_str(), address.port)).await?;
        stream.write_all(&encode_handshake(address)).await?;
        stream.write_all(&encode_status_request()).await?;
        stream.flush().await?;

        let length = read_varint(&mut stream).await?;
        let length = usize::try_from(length)
            .ok()
            .filter(|length| *length > 0 && *length <= MAX_PACKET_LENGTH)
            .ok_or_else(|| QueryError::Protocol(format!("invalid packet length {length}")))?;

        let mut packet = vec![0u8; length];
        stream.read_exact(&mut packet).await?;

        decode_status_response(Bytes::from(packet))
    }

    /// Full stat query over UDP.
    ///
    /// Requests a challenge token first, then the full stat with that token.
    async fn full_query(&self, address: &ServerAddress) -> Result<QueryResult, QueryError> {
        debug!("full query {}", address);

        let target = resolve(address).await?;
        let local: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await?;

        let session_id = session_id(rand::random());
        let mut datagram = vec![0u8; MAX_DATAGRAM_SIZE];

        socket.send(&encode_query_handshake(session_id)).await?;
        let received = socket.recv(&mut datagram).await?;
        let challenge = decode_challenge(&datagram[..received], session_id)?;
        debug!("received challenge token {} from {}", challenge, address);

        socket
            .send(&encode_full_stat_request(session_id, challenge))
            .await?;
        let received = socket.recv(&mut datagram).await?;

        decode_full_stat(&datagram[..received], session_id)
    }
}

impl StatusRequester for MinecraftStatusClient {
    async fn query(
        &self,
        address: &ServerAddress,
        mode: QueryMode,
    ) -> Result<QueryResult, QueryError> {
        info!("query {} with {:?} mode", address, mode);

        let exchange = async {
            match mode {
                QueryMode::Full => self.full_query(address).await,
                QueryMode::Status => self.ping(address).await,
            }
        };

        let result = match time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(QueryError::Timeout),
        };

        debug!("query {} result {:?}", address, result);
        result
    }
}

/// Resolves the host with the system resolver, first address wins.
async fn resolve(address: &ServerAddress) -> Result<SocketAddr, QueryError> {
    lookup_host((address.host.as_str(), address.port))
        .await?
        .next()
        .ok_or_else(|| {
            QueryError::Unreachable(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address found for {}", address.host),
            ))
        })
}

/// Reads a varint from a stream, byte by byte.
async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32, QueryError> {
    let mut raw = BytesMut::with_capacity(5);
    loop {
        let byte = reader.read_u8().await?;
        raw.put_u8(byte);
        if byte & 0x80 == 0 || raw.len() == 5 {
            break;
        }
    }
    get_varint(&mut raw.freeze())
}
