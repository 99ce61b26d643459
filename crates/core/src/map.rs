// CsrBridge - FPGA Register Bridge Client
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Parsed view of a CSV register map (`csr.csv`) as emitted by the SoC
//! build. Only the CSR and memory-region subset is interpreted; constants
//! are carried opaquely.

use crate::{BridgeError, BridgeResult, WORD_STRIDE};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    CsrBase,
    CsrRegister,
    Constant,
    MemoryRegion,
}

impl EntryKind {
    pub fn token(&self) -> &'static str {
        match self {
            Self::CsrBase => "csr_base",
            Self::CsrRegister => "csr_register",
            Self::Constant => "constant",
            Self::MemoryRegion => "memory_region",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for EntryKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "csr_base" => Ok(Self::CsrBase),
            "csr_register" => Ok(Self::CsrRegister),
            "constant" => Ok(Self::Constant),
            "memory_region" => Ok(Self::MemoryRegion),
            other => Err(format!("unknown record kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Access {
    #[serde(rename = "ro")]
    ReadOnly,
    #[serde(rename = "rw")]
    ReadWrite,
}

impl Access {
    pub fn token(&self) -> &'static str {
        match self {
            Self::ReadOnly => "ro",
            Self::ReadWrite => "rw",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Access {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ro" => Ok(Self::ReadOnly),
            "rw" => Ok(Self::ReadWrite),
            other => Err(format!("invalid access flag '{}' (expected ro or rw)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrRegister {
    pub name: String,
    pub address: u32,
    /// Width in bus words; one byte per word on the wire.
    pub word_count: usize,
    pub access: Access,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    CsrBase {
        name: String,
        address: u32,
    },
    CsrRegister(CsrRegister),
    Constant {
        name: String,
        value: String,
    },
    MemoryRegion {
        name: String,
        address: u32,
        length: u64,
        flags: Option<String>,
    },
}

impl Entry {
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::CsrBase { .. } => EntryKind::CsrBase,
            Self::CsrRegister(_) => EntryKind::CsrRegister,
            Self::Constant { .. } => EntryKind::Constant,
            Self::MemoryRegion { .. } => EntryKind::MemoryRegion,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::CsrBase { name, .. }
            | Self::Constant { name, .. }
            | Self::MemoryRegion { name, .. } => name,
            Self::CsrRegister(reg) => &reg.name,
        }
    }

    /// Bus address, if the entry has one. Constants do not.
    pub fn address(&self) -> Option<u32> {
        match self {
            Self::CsrBase { address, .. } | Self::MemoryRegion { address, .. } => Some(*address),
            Self::CsrRegister(reg) => Some(reg.address),
            Self::Constant { .. } => None,
        }
    }
}

/// Immutable lookup table built once from the textual map.
#[derive(Debug, Clone, Default)]
pub struct RegisterMap {
    entries: Vec<Entry>,
    index: HashMap<(EntryKind, String), usize>,
}

impl RegisterMap {
    pub fn from_file<P: AsRef<Path>>(path: P) -> BridgeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| BridgeError::MapUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parses the whole document. The first malformed record fails the parse.
    pub fn parse(text: &str) -> BridgeResult<Self> {
        let mut map = Self::default();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let record = raw.trim_end_matches('\r');
            if record.trim().is_empty() || record.starts_with('#') {
                continue;
            }

            let entry = parse_record(record).map_err(|reason| BridgeError::Parse {
                line,
                record: record.to_string(),
                reason,
            })?;

            let key = (entry.kind(), entry.name().to_string());
            if map.index.contains_key(&key) {
                return Err(BridgeError::Parse {
                    line,
                    record: record.to_string(),
                    reason: format!("duplicate {} entry '{}'", key.0, key.1),
                });
            }
            map.index.insert(key, map.entries.len());
            map.entries.push(entry);
        }

        tracing::debug!("Parsed register map with {} entries", map.entries.len());
        Ok(map)
    }

    pub fn get(&self, kind: EntryKind, name: &str) -> Option<&Entry> {
        self.index
            .get(&(kind, name.to_string()))
            .map(|&i| &self.entries[i])
    }

    /// Exact, case-sensitive resolution of `(kind, name)` to a bus address.
    pub fn lookup(&self, kind: EntryKind, name: &str) -> BridgeResult<u32> {
        self.get(kind, name)
            .and_then(Entry::address)
            .ok_or_else(|| BridgeError::not_found(kind, name))
    }

    pub fn register(&self, name: &str) -> BridgeResult<&CsrRegister> {
        match self.get(EntryKind::CsrRegister, name) {
            Some(Entry::CsrRegister(reg)) => Ok(reg),
            _ => Err(BridgeError::not_found(EntryKind::CsrRegister, name)),
        }
    }

    pub fn constant(&self, name: &str) -> Option<&str> {
        match self.get(EntryKind::Constant, name) {
            Some(Entry::Constant { value, .. }) => Some(value),
            _ => None,
        }
    }

    /// All entries in declaration order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn registers(&self) -> impl Iterator<Item = &CsrRegister> {
        self.entries.iter().filter_map(|e| match e {
            Entry::CsrRegister(reg) => Some(reg),
            _ => None,
        })
    }

    pub fn memory_regions(&self) -> impl Iterator<Item = &Entry> {
        self.entries
            .iter()
            .filter(|e| e.kind() == EntryKind::MemoryRegion)
    }

    pub fn constants(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Constant { name, value } => Some((name.as_str(), value.as_str())),
            _ => None,
        })
    }

    /// Registers belonging to the block `base_name`, in declaration order.
    pub fn peripheral_registers<'a>(
        &'a self,
        base_name: &str,
    ) -> impl Iterator<Item = &'a CsrRegister> + 'a {
        let prefix = format!("{}_", base_name);
        self.registers()
            .filter(move |reg| reg.name.starts_with(&prefix))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_record(record: &str) -> Result<Entry, String> {
    let fields: Vec<&str> = record.split(',').collect();
    let kind: EntryKind = fields[0].parse()?;

    let (required, optional) = match kind {
        EntryKind::CsrBase => (3, 0),
        EntryKind::CsrRegister => (5, 0),
        EntryKind::Constant => (3, 0),
        EntryKind::MemoryRegion => (4, 1),
    };

    if fields.len() < required {
        return Err(format!(
            "{} record needs {} fields, found {}",
            kind,
            required,
            fields.len()
        ));
    }
    // The generator pads every record to the same column count.
    if let Some(extra) = fields[required + optional.min(fields.len() - required)..]
        .iter()
        .find(|f| !f.is_empty())
    {
        return Err(format!("unexpected trailing field '{}'", extra));
    }

    let name = fields[1];
    if name.is_empty() {
        return Err("empty name".to_string());
    }
    let name = name.to_string();

    let entry = match kind {
        EntryKind::CsrBase => Entry::CsrBase {
            name,
            address: parse_address(fields[2])?,
        },
        EntryKind::CsrRegister => {
            let address = parse_address(fields[2])?;
            let word_count = parse_decimal(fields[3], "word count")?;
            if word_count == 0 {
                return Err("word count must be at least 1".to_string());
            }
            // Last word must still be a 32-bit bus address.
            (word_count - 1)
                .checked_mul(WORD_STRIDE as u64)
                .and_then(|span| u32::try_from(span).ok())
                .and_then(|span| address.checked_add(span))
                .ok_or_else(|| {
                    format!(
                        "{} words at {:#010x} run past the 32-bit address space",
                        word_count, address
                    )
                })?;
            Entry::CsrRegister(CsrRegister {
                name,
                address,
                word_count: word_count as usize,
                access: fields[4].parse()?,
            })
        }
        EntryKind::Constant => Entry::Constant {
            name,
            value: fields[2].to_string(),
        },
        EntryKind::MemoryRegion => {
            let address = parse_address(fields[2])?;
            let length = parse_decimal(fields[3], "length")?;
            let end = u64::from(address).checked_add(length);
            if end.map_or(true, |end| end > 1 << 32) {
                return Err(format!(
                    "region of {} bytes at {:#010x} runs past the 32-bit address space",
                    length, address
                ));
            }
            Entry::MemoryRegion {
                name,
                address,
                length,
                flags: fields
                    .get(4)
                    .filter(|f| !f.is_empty())
                    .map(|f| f.to_string()),
            }
        }
    };
    Ok(entry)
}

fn parse_address(field: &str) -> Result<u32, String> {
    let hex = field
        .strip_prefix("0x")
        .ok_or_else(|| format!("address '{}' lacks 0x prefix", field))?;
    // from_str_radix alone would let a sign through.
    if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("invalid address '{}': not a hex number", field));
    }
    u32::from_str_radix(hex, 16).map_err(|e| format!("invalid address '{}': {}", field, e))
}

fn parse_decimal(field: &str, what: &str) -> Result<u64, String> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid {} '{}': not a decimal number", what, field));
    }
    field
        .parse::<u64>()
        .map_err(|e| format!("invalid {} '{}': {}", what, field, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: &str = "\
csr_base,uart,0x82001800,,
csr_register,uart_rxtx,0x82001800,1,rw
csr_register,uart_txfull,0x82001804,1,ro
csr_register,uart_phy_tuning_word,0x8200181c,4,rw
constant,config_clock_frequency,50000000,,
constant,config_cpu_type,None,,
memory_region,sram,0x10000000,4096,
memory_region,csr,0x82000000,65536,io
";

    #[test]
    fn test_lookup_returns_encoded_address() {
        let map = RegisterMap::parse(MAP).unwrap();
        assert_eq!(map.len(), 8);
        assert_eq!(map.lookup(EntryKind::CsrBase, "uart").unwrap(), 0x82001800);
        assert_eq!(
            map.lookup(EntryKind::CsrRegister, "uart_phy_tuning_word")
                .unwrap(),
            0x8200181c
        );
        assert_eq!(
            map.lookup(EntryKind::MemoryRegion, "sram").unwrap(),
            0x10000000
        );
    }

    #[test]
    fn test_lookup_is_kind_and_case_sensitive() {
        let map = RegisterMap::parse(MAP).unwrap();
        // "uart" exists as a base, not as a register.
        assert!(matches!(
            map.lookup(EntryKind::CsrRegister, "uart"),
            Err(BridgeError::NotFound {
                kind: EntryKind::CsrRegister,
                ..
            })
        ));
        assert!(map.lookup(EntryKind::CsrRegister, "UART_RXTX").is_err());
        assert!(map.lookup(EntryKind::Constant, "config_clock_frequency").is_err());
    }

    #[test]
    fn test_register_details() {
        let map = RegisterMap::parse(MAP).unwrap();
        let reg = map.register("uart_phy_tuning_word").unwrap();
        assert_eq!(reg.word_count, 4);
        assert_eq!(reg.access, Access::ReadWrite);
        assert_eq!(map.register("uart_txfull").unwrap().access, Access::ReadOnly);
        assert_eq!(map.constant("config_cpu_type"), Some("None"));
        assert_eq!(map.constant("config_clock_frequency"), Some("50000000"));
    }

    #[test]
    fn test_memory_region_flags_are_optional() {
        let map = RegisterMap::parse(MAP).unwrap();
        let regions: Vec<_> = map.memory_regions().collect();
        assert_eq!(regions.len(), 2);
        assert!(matches!(regions[0], Entry::MemoryRegion { flags: None, length: 4096, .. }));
        assert!(matches!(
            regions[1],
            Entry::MemoryRegion { flags: Some(f), .. } if f == "io"
        ));
    }

    #[test]
    fn test_peripheral_registers_in_declaration_order() {
        let map = RegisterMap::parse(MAP).unwrap();
        let names: Vec<_> = map
            .peripheral_registers("uart")
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, ["uart_rxtx", "uart_txfull", "uart_phy_tuning_word"]);
    }

    #[test]
    fn test_skips_comments_blank_lines_and_crlf() {
        let map = RegisterMap::parse("# generated\r\n\r\ncsr_base,ctrl,0x82000000,,\r\n").unwrap();
        assert_eq!(map.lookup(EntryKind::CsrBase, "ctrl").unwrap(), 0x82000000);
    }

    #[test]
    fn test_malformed_records_fail_with_line_number() {
        let cases = [
            ("csr_register,uart_rxtx,0x82001800,1", "needs 5 fields"),
            ("csr_register,uart_rxtx,82001800,1,rw", "lacks 0x prefix"),
            ("csr_register,uart_rxtx,0x8200zz00,1,rw", "invalid address"),
            ("csr_register,uart_rxtx,0x182001800,1,rw", "invalid address"),
            ("csr_register,uart_rxtx,0x82001800,0,rw", "at least 1"),
            ("csr_register,uart_rxtx,0x82001800,one,rw", "invalid word count"),
            ("csr_register,uart_rxtx,0x82001800,1,wo", "invalid access flag"),
            ("csr_base,uart,0x82001800,junk,", "unexpected trailing field"),
            ("memory_region,rom,0x00000000,32k,", "invalid length"),
            ("csr_register,uart_rxtx,0xfffffffc,4,rw", "past the 32-bit address space"),
            ("csr_register,uart_rxtx,0x0,4294967297,rw", "past the 32-bit address space"),
            ("memory_region,rom,0xffff0000,65537,", "past the 32-bit address space"),
            ("memory_region,rom,0x10,18446744073709551615,", "past the 32-bit address space"),
            ("csr_register,uart_rxtx,0x+10,1,rw", "invalid address"),
            ("csr_register,uart_rxtx,0x,1,rw", "invalid address"),
            ("csr_register,uart_rxtx,0x82001800,+1,rw", "invalid word count"),
            ("memory_region,rom,0x00000000,+16,", "invalid length"),
            ("pin,led0,A1", "unknown record kind"),
        ];

        for (record, expected) in cases {
            let text = format!("csr_base,ctrl,0x82000000,,\n{}\n", record);
            match RegisterMap::parse(&text) {
                Err(BridgeError::Parse { line, reason, .. }) => {
                    assert_eq!(line, 2, "record: {}", record);
                    assert!(reason.contains(expected), "{}: {}", record, reason);
                }
                other => panic!("expected parse error for '{}', got {:?}", record, other),
            }
        }
    }

    #[test]
    fn test_ranges_ending_at_top_of_address_space_accepted() {
        let map = RegisterMap::parse(
            "csr_register,last,0xfffffff0,4,ro\nmemory_region,top,0xffff0000,65536,\n",
        )
        .unwrap();
        assert_eq!(map.register("last").unwrap().word_count, 4);
    }

    #[test]
    fn test_unreadable_file_is_not_a_parse_error() {
        let err = RegisterMap::from_file("/nonexistent/csr.csv").unwrap_err();
        assert!(matches!(err, BridgeError::MapUnreadable { .. }), "{:?}", err);
        assert!(err.to_string().contains("/nonexistent/csr.csv"));
    }

    #[test]
    fn test_duplicate_kind_and_name_rejected() {
        let text = "csr_base,uart,0x82001800,,\ncsr_base,uart,0x82002000,,\n";
        let err = RegisterMap::parse(text).unwrap_err();
        assert!(err.to_string().contains("duplicate"));

        // Same name under a different kind is fine.
        let text = "csr_base,uart,0x82001800,,\nmemory_region,uart,0x90000000,16,\n";
        assert!(RegisterMap::parse(text).is_ok());
    }
}
