// CsrBridge - FPGA Register Bridge Client
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::resolve;
use crate::{BridgeResult, Link, RegisterMap};

/// SoC controller block: soft reset, scratch word and bus error counter.
#[derive(Debug)]
pub struct Ctrl {
    link: Link,
    reset: u32,
    scratch: u32,
    bus_errors: u32,
}

impl Ctrl {
    pub fn new(link: Link, map: &RegisterMap, prefix: &str) -> BridgeResult<Self> {
        Ok(Self {
            reset: resolve(map, &format!("{}_reset", prefix))?,
            scratch: resolve(map, &format!("{}_scratch", prefix))?,
            bus_errors: resolve(map, &format!("{}_bus_errors", prefix))?,
            link,
        })
    }

    /// Reinitializes the remote peripherals. Resolved addresses stay valid.
    pub fn reset(&self) -> BridgeResult<()> {
        tracing::info!("Resetting SoC");
        self.link.write_u8(self.reset, 1)
    }

    pub fn scratch(&self) -> BridgeResult<u32> {
        self.link.read_u32(self.scratch)
    }

    pub fn set_scratch(&self, value: u32) -> BridgeResult<()> {
        self.link.write_u32(self.scratch, value)
    }

    pub fn bus_errors(&self) -> BridgeResult<u32> {
        self.link.read_u32(self.bus_errors)
    }
}
