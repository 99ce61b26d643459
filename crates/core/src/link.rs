// CsrBridge - FPGA Register Bridge Client
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{BridgeError, BridgeResult, Transport, TransportError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Cooperative cancellation flag for blocking polls.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How long a blocking status poll may spin.
///
/// The default waits indefinitely with no cancellation.
#[derive(Debug, Clone, Default)]
pub struct PollPolicy {
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl PollPolicy {
    pub fn forever() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            cancel: None,
        }
    }

    pub fn cancel_on(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Exclusive access to the transport for the lifetime of one transaction.
pub struct Tx<'a> {
    transport: &'a mut Box<dyn Transport>,
}

impl Tx<'_> {
    pub fn read(&mut self, address: u32, byte_count: usize) -> BridgeResult<Vec<u8>> {
        let bytes = self.transport.read(address, byte_count)?;
        if bytes.len() != byte_count {
            return Err(TransportError::ShortRead {
                address,
                expected: byte_count,
                got: bytes.len(),
            }
            .into());
        }
        tracing::debug!("read  {:#010x} [{}] -> {:02x?}", address, byte_count, bytes);
        Ok(bytes)
    }

    pub fn write(&mut self, address: u32, bytes: &[u8]) -> BridgeResult<()> {
        tracing::debug!("write {:#010x} <- {:02x?}", address, bytes);
        self.transport.write(address, bytes)?;
        Ok(())
    }

    pub fn read_u8(&mut self, address: u32) -> BridgeResult<u8> {
        Ok(self.read(address, 1)?[0])
    }

    pub fn write_u8(&mut self, address: u32, value: u8) -> BridgeResult<()> {
        self.write(address, &[value])
    }

    pub fn read_u32(&mut self, address: u32) -> BridgeResult<u32> {
        let bytes = self.read(address, 4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn write_u32(&mut self, address: u32, value: u32) -> BridgeResult<()> {
        self.write(address, &value.to_be_bytes())
    }

    /// Read-modify-write that ORs `mask` into a one-byte register.
    /// Bits already set stay set.
    pub fn set_bits(&mut self, address: u32, mask: u8) -> BridgeResult<()> {
        let current = self.read_u8(address)?;
        self.write_u8(address, current | mask)
    }
}

/// Shared, serialized handle to one bridge transport.
///
/// Every driver on a bus holds a clone. Each access takes the lock for its
/// duration; [`Link::transaction`] keeps it across a sequence so that no other
/// caller can interleave.
#[derive(Clone)]
pub struct Link {
    inner: Arc<Mutex<Box<dyn Transport>>>,
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

impl Link {
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(transport))),
        }
    }

    pub fn transaction<R>(&self, f: impl FnOnce(&mut Tx<'_>) -> BridgeResult<R>) -> BridgeResult<R> {
        // Poisoning only means another caller panicked mid-sequence.
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut tx = Tx {
            transport: &mut guard,
        };
        f(&mut tx)
    }

    pub fn read(&self, address: u32, byte_count: usize) -> BridgeResult<Vec<u8>> {
        self.transaction(|tx| tx.read(address, byte_count))
    }

    pub fn write(&self, address: u32, bytes: &[u8]) -> BridgeResult<()> {
        self.transaction(|tx| tx.write(address, bytes))
    }

    pub fn read_u8(&self, address: u32) -> BridgeResult<u8> {
        self.transaction(|tx| tx.read_u8(address))
    }

    pub fn write_u8(&self, address: u32, value: u8) -> BridgeResult<()> {
        self.transaction(|tx| tx.write_u8(address, value))
    }

    pub fn read_u32(&self, address: u32) -> BridgeResult<u32> {
        self.transaction(|tx| tx.read_u32(address))
    }

    pub fn write_u32(&self, address: u32, value: u32) -> BridgeResult<()> {
        self.transaction(|tx| tx.write_u32(address, value))
    }

    pub fn set_bits(&self, address: u32, mask: u8) -> BridgeResult<()> {
        self.transaction(|tx| tx.set_bits(address, mask))
    }

    /// Spin on a one-byte status register until it reads zero.
    ///
    /// The lock is released between iterations. Cancellation is checked
    /// before every read and the deadline after every non-zero read.
    pub fn poll_until_clear(
        &self,
        register: &str,
        address: u32,
        policy: &PollPolicy,
    ) -> BridgeResult<()> {
        let start = Instant::now();
        let mut iterations: u64 = 0;

        loop {
            if policy.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return Err(BridgeError::Cancelled {
                    register: register.to_string(),
                });
            }

            let status = self.read_u8(address)?;
            iterations += 1;
            if status == 0 {
                tracing::trace!("'{}' clear after {} polls", register, iterations);
                return Ok(());
            }

            if let Some(limit) = policy.timeout {
                let waited = start.elapsed();
                if waited >= limit {
                    tracing::warn!(
                        "Gave up on '{}' after {} polls ({:?})",
                        register,
                        iterations,
                        waited
                    );
                    return Err(BridgeError::Timeout {
                        register: register.to_string(),
                        waited,
                    });
                }
            }
        }
    }
}
