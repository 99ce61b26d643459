// CsrBridge - FPGA Register Bridge Client
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::map::Entry;
use crate::{Access, BridgeResult, Link, RegisterMap};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DumpLine {
    Csr {
        name: String,
        address: u32,
        width: usize,
        access: Access,
        value: Vec<u8>,
    },
    Memory {
        name: String,
        address: u32,
        length: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        flags: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DumpReport {
    pub lines: Vec<DumpLine>,
}

impl DumpReport {
    pub fn csr_value(&self, name: &str) -> Option<&[u8]> {
        self.lines.iter().find_map(|line| match line {
            DumpLine::Csr {
                name: n, value, ..
            } if n == name => Some(value.as_slice()),
            _ => None,
        })
    }
}

impl fmt::Display for DumpReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            match line {
                DumpLine::Csr {
                    name,
                    address,
                    width,
                    access,
                    value,
                } => {
                    let hex: Vec<String> = value.iter().map(|b| format!("{:02x}", b)).collect();
                    writeln!(
                        f,
                        "csr {:>30}  {:#010x}  {:>8}  {}  =  {}",
                        name,
                        address,
                        width,
                        access,
                        hex.join(" ")
                    )?;
                }
                DumpLine::Memory {
                    name,
                    address,
                    length,
                    flags,
                } => {
                    write!(f, "mem {:>30}  {:#010x}  {:>8}", name, address, length)?;
                    match flags {
                        Some(flags) => writeln!(f, "  {}", flags)?,
                        None => writeln!(f)?,
                    }
                }
            }
        }
        Ok(())
    }
}

/// Read every CSR in declaration order. Memory regions are listed, never read.
pub fn dump(map: &RegisterMap, link: &Link) -> BridgeResult<DumpReport> {
    let mut report = DumpReport::default();
    for entry in map.entries() {
        match entry {
            Entry::CsrRegister(reg) => {
                let value = link.read(reg.address, reg.word_count)?;
                report.lines.push(DumpLine::Csr {
                    name: reg.name.clone(),
                    address: reg.address,
                    width: reg.word_count,
                    access: reg.access,
                    value,
                });
            }
            Entry::MemoryRegion {
                name,
                address,
                length,
                flags,
            } => report.lines.push(DumpLine::Memory {
                name: name.clone(),
                address: *address,
                length: *length,
                flags: flags.clone(),
            }),
            Entry::CsrBase { .. } | Entry::Constant { .. } => {}
        }
    }
    Ok(report)
}
