// CsrBridge - FPGA Register Bridge Client
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{word_address, Transport, TransportError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// One access observed by a [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    Read { address: u32, len: usize },
    Write { address: u32, data: Vec<u8> },
}

#[derive(Debug, Default)]
struct MemoryState {
    words: HashMap<u32, u8>,
    scripted: HashMap<u32, VecDeque<Vec<u8>>>,
    journal: Vec<BusOp>,
    disconnected: bool,
}

/// In-process stand-in for a remote SoC.
///
/// Every CSR word holds one byte; writes are echoed back on read unless a
/// scripted response is queued for the read address. Clones share state, so
/// a handle kept by the caller can inspect the journal after the transport
/// was moved into a [`crate::Link`].
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set register contents without recording an access.
    pub fn preload(&self, address: u32, bytes: &[u8]) {
        let mut state = self.state();
        for (i, byte) in bytes.iter().enumerate() {
            state.words.insert(word_address(address, i), *byte);
        }
    }

    /// Read register contents without recording an access.
    pub fn peek(&self, address: u32, len: usize) -> Vec<u8> {
        let state = self.state();
        (0..len)
            .map(|i| {
                state
                    .words
                    .get(&word_address(address, i))
                    .copied()
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Queue a response for the next read starting at `address`.
    pub fn script_read(&self, address: u32, bytes: &[u8]) {
        self.state()
            .scripted
            .entry(address)
            .or_default()
            .push_back(bytes.to_vec());
    }

    pub fn journal(&self) -> Vec<BusOp> {
        self.state().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.state().journal.clear();
    }

    /// Make every following access fail as if the link dropped.
    pub fn disconnect(&self) {
        self.state().disconnected = true;
    }
}

impl Transport for MemoryTransport {
    fn read(&mut self, address: u32, byte_count: usize) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state();
        if state.disconnected {
            return Err(TransportError::Disconnected);
        }
        state.journal.push(BusOp::Read {
            address,
            len: byte_count,
        });

        if let Some(bytes) = state.scripted.get_mut(&address).and_then(VecDeque::pop_front) {
            return Ok(bytes);
        }

        Ok((0..byte_count)
            .map(|i| {
                state
                    .words
                    .get(&word_address(address, i))
                    .copied()
                    .unwrap_or(0)
            })
            .collect())
    }

    fn write(&mut self, address: u32, bytes: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state();
        if state.disconnected {
            return Err(TransportError::Disconnected);
        }
        state.journal.push(BusOp::Write {
            address,
            data: bytes.to_vec(),
        });
        for (i, byte) in bytes.iter().enumerate() {
            state.words.insert(word_address(address, i), *byte);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_echo_back_on_read() {
        let mut mem = MemoryTransport::new();
        mem.write_u32_be(0x8200_1000, 0x0001_c200).unwrap();
        assert_eq!(mem.read_u32_be(0x8200_1000).unwrap(), 0x0001_c200);
        // Bytes land on consecutive CSR words.
        assert_eq!(mem.peek(0x8200_1004, 1), vec![0x01]);
    }

    #[test]
    fn test_scripted_reads_take_precedence_once() {
        let mut mem = MemoryTransport::new();
        mem.preload(0x10, &[7]);
        mem.script_read(0x10, &[1]);
        mem.script_read(0x10, &[2]);
        assert_eq!(mem.read_u8(0x10).unwrap(), 1);
        assert_eq!(mem.read_u8(0x10).unwrap(), 2);
        assert_eq!(mem.read_u8(0x10).unwrap(), 7);
    }

    #[test]
    fn test_journal_is_shared_between_clones() {
        let handle = MemoryTransport::new();
        let mut moved = handle.clone();
        moved.write_u8(0x20, 5).unwrap();
        moved.read(0x20, 1).unwrap();
        assert_eq!(
            handle.journal(),
            vec![
                BusOp::Write {
                    address: 0x20,
                    data: vec![5]
                },
                BusOp::Read {
                    address: 0x20,
                    len: 1
                },
            ]
        );
        handle.clear_journal();
        assert!(handle.journal().is_empty());
    }

    #[test]
    fn test_disconnect_fails_accesses() {
        let handle = MemoryTransport::new();
        let mut moved = handle.clone();
        handle.disconnect();
        assert!(matches!(moved.read(0, 1), Err(TransportError::Disconnected)));
        assert!(matches!(moved.write_u8(0, 1), Err(TransportError::Disconnected)));
    }
}
