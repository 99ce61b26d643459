// CsrBridge - FPGA Register Bridge Client
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod ctrl;
pub mod gpio;
pub mod timer;
pub mod uart;

use crate::{BridgeResult, EntryKind, RegisterMap};

/// Drivers resolve every register up front so a missing one fails construction.
pub(crate) fn resolve(map: &RegisterMap, name: &str) -> BridgeResult<u32> {
    map.lookup(EntryKind::CsrRegister, name)
}
