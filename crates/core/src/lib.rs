// CsrBridge - FPGA Register Bridge Client
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bus;
pub mod link;
pub mod map;
pub mod peripherals;
pub mod transport;

pub use bus::{Bus, BusConfig, GpioSpec};
pub use link::{CancelToken, Link, PollPolicy};
pub use map::{Access, EntryKind, RegisterMap};

use std::time::Duration;

/// Distance in bus bytes between two consecutive CSR words.
///
/// Each CSR word carries a single significant byte, so byte `i` of an
/// n-byte register lives at `address + WORD_STRIDE * i`.
pub const WORD_STRIDE: u32 = 4;

/// Failures raised by a [`Transport`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error on bridge link: {0}")]
    Io(#[from] std::io::Error),
    #[error("Short read at {address:#010x}: expected {expected} bytes, got {got}")]
    ShortRead {
        address: u32,
        expected: usize,
        got: usize,
    },
    #[error("Malformed bridge response: {0}")]
    Malformed(String),
    #[error("Bridge link disconnected")]
    Disconnected,
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("No {kind} entry named '{name}' in register map")]
    NotFound { kind: EntryKind, name: String },
    #[error("Cannot read register map {path:?}: {source}")]
    MapUnreadable {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("Register map line {line}: {reason} (record: '{record}')")]
    Parse {
        line: usize,
        record: String,
        reason: String,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Timed out after {waited:?} polling '{register}'")]
    Timeout { register: String, waited: Duration },
    #[error("Poll on '{register}' cancelled")]
    Cancelled { register: String },
}

impl BridgeError {
    pub(crate) fn not_found(kind: EntryKind, name: &str) -> Self {
        Self::NotFound {
            kind,
            name: name.to_string(),
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Byte-addressed access to a remote bus.
///
/// Multi-byte values are most-significant byte first on both read and write.
/// Calls are synchronous: they return once the remote end acknowledged the
/// access or the link failed.
pub trait Transport: Send {
    fn read(&mut self, address: u32, byte_count: usize) -> Result<Vec<u8>, TransportError>;
    fn write(&mut self, address: u32, bytes: &[u8]) -> Result<(), TransportError>;

    fn read_u8(&mut self, address: u32) -> Result<u8, TransportError> {
        let bytes = self.read(address, 1)?;
        bytes.first().copied().ok_or(TransportError::ShortRead {
            address,
            expected: 1,
            got: 0,
        })
    }

    /// A bare integer is written as a single byte.
    fn write_u8(&mut self, address: u32, value: u8) -> Result<(), TransportError> {
        self.write(address, &[value])
    }

    fn read_u32_be(&mut self, address: u32) -> Result<u32, TransportError> {
        let bytes = self.read(address, 4)?;
        let word: [u8; 4] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| TransportError::ShortRead {
                address,
                expected: 4,
                got: bytes.len(),
            })?;
        Ok(u32::from_be_bytes(word))
    }

    fn write_u32_be(&mut self, address: u32, value: u32) -> Result<(), TransportError> {
        self.write(address, &value.to_be_bytes())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, address: u32, byte_count: usize) -> Result<Vec<u8>, TransportError> {
        (**self).read(address, byte_count)
    }

    fn write(&mut self, address: u32, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write(address, bytes)
    }
}

/// Address of byte `index` of a register starting at `base`.
pub fn word_address(base: u32, index: usize) -> u32 {
    base.wrapping_add(WORD_STRIDE.wrapping_mul(index as u32))
}
