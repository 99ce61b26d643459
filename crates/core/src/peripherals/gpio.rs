// CsrBridge - FPGA Register Bridge Client
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::resolve;
use crate::{BridgeResult, Link, RegisterMap};

/// Pass-through access to a single GPIO-style register.
#[derive(Debug)]
pub struct Gpio {
    link: Link,
    name: String,
    address: u32,
    size: usize,
}

impl Gpio {
    pub fn new(link: Link, map: &RegisterMap, register: &str, size: usize) -> BridgeResult<Self> {
        Ok(Self {
            address: resolve(map, register)?,
            link,
            name: register.to_string(),
            size,
        })
    }

    pub fn with_default_size(link: Link, map: &RegisterMap, register: &str) -> BridgeResult<Self> {
        Self::new(link, map, register, 1)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn read(&self) -> BridgeResult<Vec<u8>> {
        self.link.read(self.address, self.size)
    }

    pub fn write(&self, bytes: &[u8]) -> BridgeResult<()> {
        self.link.write(self.address, bytes)
    }

    pub fn write_u8(&self, value: u8) -> BridgeResult<()> {
        self.link.write_u8(self.address, value)
    }
}
