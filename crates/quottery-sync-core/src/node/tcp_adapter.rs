//! Direct binding to a node's peer port.
//!
//! Every packet starts with an 8-byte header:
//!
//! ```text
//! 0      3      4          8
//! | size | type |  dejavu  | payload ...
//! ```
//!
//! `size` is a 24-bit little-endian length that includes the header. The
//! node echoes the request's `dejavu` on its answer; packets carrying any
//! other value are unrelated gossip and are skipped.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::error::NodeError;
use crate::types::TickInfo;

use super::{NodeTransport, QueryType, QUOTTERY_CONTRACT_INDEX};

pub(super) const HEADER_SIZE: usize = 8;
const MAX_PACKET_SIZE: usize = 0x00FF_FFFF;
/// Unrelated packets tolerated before giving up on an answer.
const MAX_SKIPPED_PACKETS: usize = 64;

pub(super) const REQUEST_CURRENT_TICK_INFO: u8 = 27;
pub(super) const RESPOND_CURRENT_TICK_INFO: u8 = 28;
pub(super) const REQUEST_CONTRACT_FUNCTION: u8 = 42;
pub(super) const RESPOND_CONTRACT_FUNCTION: u8 = 43;

const TICK_INFO_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct PacketHeader {
    pub(super) size: usize,
    pub(super) kind: u8,
    pub(super) dejavu: u32,
}

pub(super) fn encode_packet(kind: u8, dejavu: u32, payload: &[u8]) -> Result<Vec<u8>, NodeError> {
    let size = HEADER_SIZE + payload.len();
    if size > MAX_PACKET_SIZE {
        return Err(NodeError::InvalidResponse(format!(
            "request of {size} bytes exceeds the packet size limit"
        )));
    }
    let mut packet = Vec::with_capacity(size);
    packet.extend_from_slice(&(size as u32).to_le_bytes()[..3]);
    packet.push(kind);
    packet.extend_from_slice(&dejavu.to_le_bytes());
    packet.extend_from_slice(payload);
    Ok(packet)
}

pub(super) fn decode_header(raw: [u8; HEADER_SIZE]) -> Result<PacketHeader, NodeError> {
    let size = u32::from_le_bytes([raw[0], raw[1], raw[2], 0]) as usize;
    if size < HEADER_SIZE {
        return Err(NodeError::InvalidResponse(format!(
            "packet size {size} is smaller than its header"
        )));
    }
    Ok(PacketHeader {
        size,
        kind: raw[3],
        dejavu: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
    })
}

pub(super) async fn read_packet<R>(reader: &mut R) -> Result<(PacketHeader, Vec<u8>), NodeError>
where
    R: AsyncRead + Unpin,
{
    let mut raw = [0u8; HEADER_SIZE];
    reader.read_exact(&mut raw).await?;
    let header = decode_header(raw)?;
    let mut payload = vec![0u8; header.size - HEADER_SIZE];
    reader.read_exact(&mut payload).await?;
    Ok((header, payload))
}

fn contract_request(query: QueryType, input: &[u8]) -> Result<Vec<u8>, NodeError> {
    let input_size = u16::try_from(input.len()).map_err(|_| {
        NodeError::InvalidResponse(format!("{query} input of {} bytes is too large", input.len()))
    })?;
    let mut payload = Vec::with_capacity(8 + input.len());
    payload.extend_from_slice(&QUOTTERY_CONTRACT_INDEX.to_le_bytes());
    payload.extend_from_slice(&query.input_type().to_le_bytes());
    payload.extend_from_slice(&input_size.to_le_bytes());
    payload.extend_from_slice(input);
    Ok(payload)
}

pub(super) fn decode_tick_info(payload: &[u8]) -> Result<TickInfo, NodeError> {
    if payload.len() < TICK_INFO_SIZE {
        return Err(NodeError::InvalidResponse(format!(
            "tick info payload has {} bytes, expected {TICK_INFO_SIZE}",
            payload.len()
        )));
    }
    let u16_at = |o: usize| u16::from_le_bytes([payload[o], payload[o + 1]]);
    let u32_at =
        |o: usize| u32::from_le_bytes([payload[o], payload[o + 1], payload[o + 2], payload[o + 3]]);
    Ok(TickInfo {
        tick_duration: u16_at(0),
        epoch: u16_at(2),
        tick: u32_at(4),
        aligned_votes: u16_at(8),
        misaligned_votes: u16_at(10),
        initial_tick: u32_at(12),
    })
}

/// Opens one connection per request, which is how the node's own tooling
/// talks to it.
pub struct TcpTransport {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Duration::from_secs(30),
        }
    }

    async fn exchange(&self, kind: u8, payload: &[u8], expect: u8) -> Result<Vec<u8>, NodeError> {
        let dejavu = rand::thread_rng().gen_range(1..=u32::MAX);
        let packet = encode_packet(kind, dejavu, payload)?;

        let fut = async {
            let mut stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
            stream.set_nodelay(true)?;
            stream.write_all(&packet).await?;

            for _ in 0..MAX_SKIPPED_PACKETS {
                let (header, body) = read_packet(&mut stream).await?;
                trace!(
                    packet.kind = header.kind,
                    packet.size = header.size,
                    "tcp packet"
                );
                if header.dejavu != dejavu {
                    continue;
                }
                if header.kind != expect {
                    return Err(NodeError::InvalidResponse(format!(
                        "expected packet type {expect}, got {}",
                        header.kind
                    )));
                }
                return Ok(body);
            }
            Err(NodeError::InvalidResponse(format!(
                "no answer after {MAX_SKIPPED_PACKETS} unrelated packets"
            )))
        };

        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| {
                NodeError::Socket(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("{}:{} did not answer in time", self.host, self.port),
                ))
            })?
    }
}

#[async_trait]
impl NodeTransport for TcpTransport {
    async fn query(&self, query: QueryType, input: &[u8]) -> Result<Vec<u8>, NodeError> {
        debug!(
            rpc.input_type = query.input_type(),
            rpc.input_size = input.len(),
            node = %format_args!("{}:{}", self.host, self.port),
            "tcp call {query}"
        );
        let payload = contract_request(query, input)?;
        let body = self
            .exchange(REQUEST_CONTRACT_FUNCTION, &payload, RESPOND_CONTRACT_FUNCTION)
            .await?;
        debug!(rpc.input_type = query.input_type(), body_len = body.len(), "tcp response");
        Ok(body)
    }

    async fn tick_info(&self) -> Result<TickInfo, NodeError> {
        let body = self
            .exchange(REQUEST_CURRENT_TICK_INFO, &[], RESPOND_CURRENT_TICK_INFO)
            .await?;
        decode_tick_info(&body)
    }
}
