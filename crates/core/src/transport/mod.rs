// CsrBridge - FPGA Register Bridge Client
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod etherbone;
pub mod memory;

pub use etherbone::EtherboneTransport;
pub use memory::{BusOp, MemoryTransport};
