// CsrBridge - FPGA Register Bridge Client
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::resolve;
use crate::{BridgeResult, Link, RegisterMap};

/// Zero-crossing event bit in the timer's event registers.
const TIMER_EV_ZERO: u8 = 1 << 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    Disabled,
    Enabled { period: u32 },
}

#[derive(Debug, Clone, Copy)]
struct TimerRegisters {
    en: u32,
    load: u32,
    reload: u32,
    update_value: u32,
    value: u32,
    ev_status: u32,
    ev_pending: u32,
    ev_enable: u32,
}

impl TimerRegisters {
    fn resolve(map: &RegisterMap, index: u8) -> BridgeResult<Self> {
        let reg = |suffix: &str| resolve(map, &format!("timer{}_{}", index, suffix));
        Ok(Self {
            en: reg("en")?,
            load: reg("load")?,
            reload: reg("reload")?,
            update_value: reg("update_value")?,
            value: reg("value")?,
            ev_status: reg("ev_status")?,
            ev_pending: reg("ev_pending")?,
            ev_enable: reg("ev_enable")?,
        })
    }
}

/// Host-side driver for a down-counting timer with auto-reload (`timer<N>`).
#[derive(Debug)]
pub struct Timer {
    link: Link,
    index: u8,
    regs: TimerRegisters,
    state: TimerState,
}

impl Timer {
    /// Resolves every `timer<index>_*` register and leaves the counter disabled.
    pub fn new(link: Link, map: &RegisterMap, index: u8) -> BridgeResult<Self> {
        let mut timer = Self {
            link,
            index,
            regs: TimerRegisters::resolve(map, index)?,
            state: TimerState::Disabled,
        };
        timer.disable()?;
        Ok(timer)
    }

    /// Resolves the registers without writing to the device. The state is
    /// taken from `en` and `reload` as they currently read.
    pub fn attach(link: Link, map: &RegisterMap, index: u8) -> BridgeResult<Self> {
        let regs = TimerRegisters::resolve(map, index)?;
        let state = link.transaction(|tx| {
            if tx.read_u8(regs.en)? == 0 {
                Ok(TimerState::Disabled)
            } else {
                Ok(TimerState::Enabled {
                    period: tx.read_u32(regs.reload)?,
                })
            }
        })?;
        tracing::debug!("timer{} attached, {:?}", index, state);
        Ok(Self {
            link,
            index,
            regs,
            state,
        })
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Load `period` into both load and reload, then start counting.
    /// Re-enabling replaces the period.
    pub fn enable(&mut self, period: u32) -> BridgeResult<()> {
        let regs = self.regs;
        self.link.transaction(|tx| {
            tx.write_u32(regs.load, period)?;
            tx.write_u32(regs.reload, period)?;
            tx.write_u8(regs.en, 1)
        })?;
        tracing::debug!("timer{} enabled, period {}", self.index, period);
        self.state = TimerState::Enabled { period };
        Ok(())
    }

    pub fn disable(&mut self) -> BridgeResult<()> {
        self.link.write_u8(self.regs.en, 0)?;
        tracing::debug!("timer{} disabled", self.index);
        self.state = TimerState::Disabled;
        Ok(())
    }

    /// Latch the live counter into the readable `value` register.
    pub fn latch(&self) -> BridgeResult<()> {
        self.link.write_u8(self.regs.update_value, 1)
    }

    /// Latch and read the counter. Every call goes to the device.
    pub fn sample(&self) -> BridgeResult<u32> {
        let regs = self.regs;
        self.link.transaction(|tx| {
            tx.write_u8(regs.update_value, 1)?;
            tx.read_u32(regs.value)
        })
    }

    pub fn event_status(&self) -> BridgeResult<bool> {
        Ok(self.link.read_u8(self.regs.ev_status)? & TIMER_EV_ZERO != 0)
    }

    pub fn event_pending(&self) -> BridgeResult<bool> {
        Ok(self.link.read_u8(self.regs.ev_pending)? & TIMER_EV_ZERO != 0)
    }

    pub fn acknowledge_event(&self) -> BridgeResult<()> {
        self.link.set_bits(self.regs.ev_pending, TIMER_EV_ZERO)
    }

    pub fn set_event_enabled(&self, enabled: bool) -> BridgeResult<()> {
        let value = if enabled { TIMER_EV_ZERO } else { 0 };
        self.link.write_u8(self.regs.ev_enable, value)
    }
}
