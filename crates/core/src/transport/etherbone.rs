// CsrBridge - FPGA Register Bridge Client
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Etherbone over TCP, as spoken by the LiteX bridge server (`litex_server`).
//!
//! Packet layout (all fields big-endian):
//!
//! ```text
//! header   : magic 0x4E6F | version<<4 | addr_size<<4 | port_size | 4 pad bytes
//! record   : flags | byte_enable | wcount | rcount
//! writes   : base_addr, wcount data words
//! reads    : base_ret_addr, rcount addresses
//! ```
//!
//! The server answers a read record with a write record carrying the values.
//! Writes are not acknowledged on the wire; a write returns once the packet is
//! flushed to the socket.

use crate::{word_address, Transport, TransportError};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

pub const ETHERBONE_MAGIC: u16 = 0x4e6f;
pub const ETHERBONE_VERSION: u8 = 1;
pub const DEFAULT_PORT: u16 = 1234;

const HEADER_LEN: usize = 8;
const RECORD_HEADER_LEN: usize = 4;
// 32-bit addresses, 32-bit ports.
const ADDR_PORT_SIZE: u8 = 0x44;
const BYTE_ENABLE: u8 = 0x0f;
const MAX_RECORD_WORDS: usize = 255;

fn push_header(packet: &mut Vec<u8>) {
    packet.extend_from_slice(&ETHERBONE_MAGIC.to_be_bytes());
    packet.push(ETHERBONE_VERSION << 4);
    packet.push(ADDR_PORT_SIZE);
    packet.extend_from_slice(&[0; 4]);
}

/// Encode a write of `values` to consecutive words starting at `base`.
pub fn encode_write(base: u32, values: &[u32]) -> Vec<u8> {
    debug_assert!(values.len() <= MAX_RECORD_WORDS);
    let mut packet = Vec::with_capacity(HEADER_LEN + RECORD_HEADER_LEN + 4 * (values.len() + 1));
    push_header(&mut packet);
    packet.extend_from_slice(&[0, BYTE_ENABLE, values.len() as u8, 0]);
    packet.extend_from_slice(&base.to_be_bytes());
    for value in values {
        packet.extend_from_slice(&value.to_be_bytes());
    }
    packet
}

/// Encode a read of the given word addresses.
pub fn encode_read(addresses: &[u32]) -> Vec<u8> {
    debug_assert!(addresses.len() <= MAX_RECORD_WORDS);
    let mut packet =
        Vec::with_capacity(HEADER_LEN + RECORD_HEADER_LEN + 4 * (addresses.len() + 1));
    push_header(&mut packet);
    packet.extend_from_slice(&[0, BYTE_ENABLE, 0, addresses.len() as u8]);
    // base_ret_addr is unused by the bridge server.
    packet.extend_from_slice(&0u32.to_be_bytes());
    for address in addresses {
        packet.extend_from_slice(&address.to_be_bytes());
    }
    packet
}

/// Size in bytes of the reply to a read of `count` words.
pub fn reply_len(count: usize) -> usize {
    HEADER_LEN + RECORD_HEADER_LEN + 4 + 4 * count
}

/// Decode the reply to a read of `count` words.
pub fn decode_read_reply(packet: &[u8], count: usize) -> Result<Vec<u32>, TransportError> {
    if packet.len() != reply_len(count) {
        return Err(TransportError::Malformed(format!(
            "reply is {} bytes, expected {}",
            packet.len(),
            reply_len(count)
        )));
    }
    let magic = u16::from_be_bytes([packet[0], packet[1]]);
    if magic != ETHERBONE_MAGIC {
        return Err(TransportError::Malformed(format!(
            "bad magic {:#06x}",
            magic
        )));
    }
    let wcount = packet[HEADER_LEN + 2] as usize;
    if wcount != count {
        return Err(TransportError::Malformed(format!(
            "reply carries {} words, expected {}",
            wcount, count
        )));
    }

    let data = &packet[HEADER_LEN + RECORD_HEADER_LEN + 4..];
    Ok(data
        .chunks_exact(4)
        .map(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]]))
        .collect())
}

/// Etherbone client over a TCP connection to the bridge server.
#[derive(Debug)]
pub struct EtherboneTransport {
    stream: TcpStream,
    peer: SocketAddr,
}

impl EtherboneTransport {
    /// Connect to a bridge server. `timeout` bounds the connect and each
    /// socket read/write; `None` blocks indefinitely.
    pub fn connect<A: ToSocketAddrs>(
        addr: A,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let mut last_err = None;
        for peer in addr.to_socket_addrs()? {
            let attempt = match timeout {
                Some(t) => TcpStream::connect_timeout(&peer, t),
                None => TcpStream::connect(peer),
            };
            match attempt {
                Ok(stream) => {
                    stream.set_read_timeout(timeout)?;
                    stream.set_write_timeout(timeout)?;
                    stream.set_nodelay(true)?;
                    tracing::info!("Connected to Etherbone bridge at {}", peer);
                    return Ok(Self { stream, peer });
                }
                Err(e) => {
                    tracing::debug!("Connect to {} failed: {}", peer, e);
                    last_err = Some(e);
                }
            }
        }
        Err(match last_err {
            Some(e) => TransportError::Io(e),
            None => TransportError::Disconnected,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn send(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(packet).map_err(map_io)?;
        self.stream.flush().map_err(map_io)
    }

    fn read_words(&mut self, addresses: &[u32]) -> Result<Vec<u32>, TransportError> {
        self.send(&encode_read(addresses))?;
        let mut reply = vec![0u8; reply_len(addresses.len())];
        self.stream.read_exact(&mut reply).map_err(map_io)?;
        decode_read_reply(&reply, addresses.len())
    }
}

fn map_io(e: std::io::Error) -> TransportError {
    match e.kind() {
        std::io::ErrorKind::UnexpectedEof
        | std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::BrokenPipe => TransportError::Disconnected,
        _ => TransportError::Io(e),
    }
}

impl Transport for EtherboneTransport {
    fn read(&mut self, address: u32, byte_count: usize) -> Result<Vec<u8>, TransportError> {
        let addresses: Vec<u32> = (0..byte_count).map(|i| word_address(address, i)).collect();
        let mut bytes = Vec::with_capacity(byte_count);
        for chunk in addresses.chunks(MAX_RECORD_WORDS) {
            let words = self.read_words(chunk)?;
            // One significant byte per CSR word.
            bytes.extend(words.iter().map(|w| (w & 0xff) as u8));
        }
        tracing::trace!("eb read {:#010x} -> {:02x?}", address, bytes);
        Ok(bytes)
    }

    fn write(&mut self, address: u32, bytes: &[u8]) -> Result<(), TransportError> {
        for (n, chunk) in bytes.chunks(MAX_RECORD_WORDS).enumerate() {
            let base = word_address(address, n * MAX_RECORD_WORDS);
            let values: Vec<u32> = chunk.iter().map(|b| *b as u32).collect();
            self.send(&encode_write(base, &values))?;
        }
        tracing::trace!("eb write {:#010x} <- {:02x?}", address, bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_packet_layout() {
        let packet = encode_write(0x8200_1000, &[0x12, 0x34]);
        assert_eq!(
            packet,
            vec![
                0x4e, 0x6f, 0x10, 0x44, 0, 0, 0, 0, // header
                0x00, 0x0f, 2, 0, // record: two writes
                0x82, 0x00, 0x10, 0x00, // base_addr
                0, 0, 0, 0x12, //
                0, 0, 0, 0x34,
            ]
        );
    }

    #[test]
    fn test_read_packet_layout() {
        let packet = encode_read(&[0x8200_1804, 0x8200_1808]);
        assert_eq!(&packet[..8], &[0x4e, 0x6f, 0x10, 0x44, 0, 0, 0, 0]);
        assert_eq!(&packet[8..12], &[0x00, 0x0f, 0, 2]);
        assert_eq!(&packet[16..20], &[0x82, 0x00, 0x18, 0x04]);
        assert_eq!(&packet[20..24], &[0x82, 0x00, 0x18, 0x08]);
    }

    #[test]
    fn test_decode_reply() {
        let mut reply = encode_write(0, &[0xab, 0x1cd]);
        assert_eq!(decode_read_reply(&reply, 2).unwrap(), vec![0xab, 0x1cd]);

        reply[0] = 0;
        assert!(matches!(
            decode_read_reply(&reply, 2),
            Err(TransportError::Malformed(_))
        ));
        assert!(matches!(
            decode_read_reply(&reply[..reply.len() - 4], 2),
            Err(TransportError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_reply_rejects_word_count_mismatch() {
        // Right length for one word, but the record announces none.
        let mut reply = encode_write(0, &[1]);
        reply[HEADER_LEN + 2] = 0;
        assert!(decode_read_reply(&reply, 1).is_err());
    }
}
