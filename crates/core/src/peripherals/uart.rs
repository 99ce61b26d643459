// CsrBridge - FPGA Register Bridge Client
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::resolve;
use crate::{BridgeResult, Link, PollPolicy, RegisterMap};

bitflags::bitflags! {
    /// UART event sources, as laid out in `ev_status`/`ev_pending`/`ev_enable`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UartEvents: u8 {
        const TX = 1 << 0;
        const RX = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy)]
struct UartRegisters {
    rxtx: u32,
    txfull: u32,
    rxempty: u32,
    ev_status: u32,
    ev_pending: u32,
    ev_enable: u32,
    tuning_word: u32,
}

/// Host-side driver for the SoC UART reached through the bridge.
///
/// All state lives on the device; the driver only caches addresses.
#[derive(Debug)]
pub struct Uart {
    link: Link,
    prefix: String,
    regs: UartRegisters,
    poll: PollPolicy,
}

impl Uart {
    /// Resolves `<prefix>_*` registers, acknowledges stale TX/RX events and
    /// enables both sources.
    pub fn new(link: Link, map: &RegisterMap, prefix: &str) -> BridgeResult<Self> {
        let uart = Self::attach(link, map, prefix)?;
        let regs = uart.regs;
        let all = UartEvents::all().bits();
        uart.link.transaction(|tx| {
            tx.write_u8(regs.ev_pending, all)?;
            tx.write_u8(regs.ev_enable, all)
        })?;
        Ok(uart)
    }

    /// Resolves the registers only; pending and enabled events are left as
    /// the device has them.
    pub fn attach(link: Link, map: &RegisterMap, prefix: &str) -> BridgeResult<Self> {
        let reg = |suffix: &str| resolve(map, &format!("{}_{}", prefix, suffix));
        let regs = UartRegisters {
            rxtx: reg("rxtx")?,
            txfull: reg("txfull")?,
            rxempty: reg("rxempty")?,
            ev_status: reg("ev_status")?,
            ev_pending: reg("ev_pending")?,
            ev_enable: reg("ev_enable")?,
            tuning_word: reg("phy_tuning_word")?,
        };

        Ok(Self {
            link,
            prefix: prefix.to_string(),
            regs,
            poll: PollPolicy::default(),
        })
    }

    pub fn set_poll_policy(&mut self, poll: PollPolicy) {
        self.poll = poll;
    }

    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll
    }

    /// Write the PHY tuning word. The value is forwarded as-is.
    pub fn set_baud(&self, tuning_word: u32) -> BridgeResult<()> {
        if tuning_word == 0 {
            tracing::warn!("{}: tuning word 0 will stall the PHY", self.prefix);
        }
        self.link.write_u32(self.regs.tuning_word, tuning_word)
    }

    pub fn baud(&self) -> BridgeResult<u32> {
        self.link.read_u32(self.regs.tuning_word)
    }

    /// Receive one byte.
    ///
    /// Blocking mode spins on `rxempty` under the poll policy and always
    /// yields a byte. Non-blocking mode checks `rxempty` exactly once.
    pub fn read(&self, blocking: bool) -> BridgeResult<Option<u8>> {
        let rxempty = format!("{}_rxempty", self.prefix);
        if blocking {
            self.link
                .poll_until_clear(&rxempty, self.regs.rxempty, &self.poll)?;
        } else if self.link.read_u8(self.regs.rxempty)? != 0 {
            return Ok(None);
        }

        let regs = self.regs;
        let byte = self.link.transaction(|tx| {
            let byte = tx.read_u8(regs.rxtx)?;
            tx.set_bits(regs.ev_pending, UartEvents::RX.bits())?;
            Ok(byte)
        })?;
        tracing::debug!("{} rx {:#04x}", self.prefix, byte);
        Ok(Some(byte))
    }

    /// Transmit one byte. Returns `false` without writing when a
    /// non-blocking send finds the TX FIFO full.
    pub fn write(&self, byte: u8, blocking: bool) -> BridgeResult<bool> {
        let txfull = format!("{}_txfull", self.prefix);
        if blocking {
            self.link
                .poll_until_clear(&txfull, self.regs.txfull, &self.poll)?;
        } else if self.link.read_u8(self.regs.txfull)? != 0 {
            return Ok(false);
        }

        let regs = self.regs;
        self.link.transaction(|tx| {
            tx.write_u8(regs.rxtx, byte)?;
            tx.set_bits(regs.ev_pending, UartEvents::TX.bits())
        })?;
        tracing::debug!("{} tx {:#04x}", self.prefix, byte);
        Ok(true)
    }

    pub fn write_all(&self, bytes: &[u8]) -> BridgeResult<()> {
        for &byte in bytes {
            self.write(byte, true)?;
        }
        Ok(())
    }

    pub fn pending_events(&self) -> BridgeResult<UartEvents> {
        let raw = self.link.read_u8(self.regs.ev_pending)?;
        Ok(UartEvents::from_bits_truncate(raw))
    }

    pub fn event_status(&self) -> BridgeResult<UartEvents> {
        let raw = self.link.read_u8(self.regs.ev_status)?;
        Ok(UartEvents::from_bits_truncate(raw))
    }
}
