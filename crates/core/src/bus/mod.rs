// CsrBridge - FPGA Register Bridge Client
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod dump;

pub use dump::{DumpLine, DumpReport};

use crate::peripherals::ctrl::Ctrl;
use crate::peripherals::gpio::Gpio;
use crate::peripherals::timer::Timer;
use crate::peripherals::uart::Uart;
use crate::{BridgeResult, Link, PollPolicy, RegisterMap};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpioSpec {
    pub id: String,
    pub register: String,
    pub size: usize,
}

impl GpioSpec {
    pub fn new(id: &str, register: &str, size: usize) -> Self {
        Self {
            id: id.to_string(),
            register: register.to_string(),
            size,
        }
    }
}

/// Which drivers a [`Bus`] builds.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Prefix of the controller block (`<control>_reset`, ...).
    pub control: String,
    pub timers: Vec<u8>,
    /// Prefix of the UART registers; `None` leaves the UART out.
    pub uart: Option<String>,
    pub gpio: Vec<GpioSpec>,
    pub poll: PollPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            control: "ctrl".to_string(),
            timers: vec![0],
            uart: Some("uart".to_string()),
            gpio: vec![
                GpioSpec::new("leds", "cas_leds_out", 1),
                GpioSpec::new("gpio_in", "gpio_in", 1),
                GpioSpec::new("gpio_out", "gpio_out", 1),
            ],
            poll: PollPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Init {
    Reset,
    Observe,
}

/// All drivers sharing one register map and one link.
#[derive(Debug)]
pub struct Bus {
    map: Arc<RegisterMap>,
    link: Link,
    ctrl: Ctrl,
    timers: Vec<Timer>,
    uart: Option<Uart>,
    gpio: Vec<(String, Gpio)>,
}

impl Bus {
    /// Builds the control block, timers, UART and GPIOs in that order.
    /// Any register missing from the map aborts construction.
    pub fn new(map: impl Into<Arc<RegisterMap>>, link: Link, config: &BusConfig) -> BridgeResult<Self> {
        Self::build(map.into(), link, config, Init::Reset)
    }

    /// Same resolution as [`Bus::new`], but no driver writes to the device:
    /// timers keep running and UART events stay pending.
    pub fn attach(
        map: impl Into<Arc<RegisterMap>>,
        link: Link,
        config: &BusConfig,
    ) -> BridgeResult<Self> {
        Self::build(map.into(), link, config, Init::Observe)
    }

    fn build(map: Arc<RegisterMap>, link: Link, config: &BusConfig, init: Init) -> BridgeResult<Self> {
        let ctrl = Ctrl::new(link.clone(), &map, &config.control)?;

        let timers = config
            .timers
            .iter()
            .map(|&index| match init {
                Init::Reset => Timer::new(link.clone(), &map, index),
                Init::Observe => Timer::attach(link.clone(), &map, index),
            })
            .collect::<BridgeResult<Vec<_>>>()?;

        let uart = match &config.uart {
            Some(prefix) => {
                let mut uart = match init {
                    Init::Reset => Uart::new(link.clone(), &map, prefix)?,
                    Init::Observe => Uart::attach(link.clone(), &map, prefix)?,
                };
                uart.set_poll_policy(config.poll.clone());
                Some(uart)
            }
            None => None,
        };

        let gpio = config
            .gpio
            .iter()
            .map(|spec| {
                Gpio::new(link.clone(), &map, &spec.register, spec.size)
                    .map(|g| (spec.id.clone(), g))
            })
            .collect::<BridgeResult<Vec<_>>>()?;

        tracing::info!(
            "Bus ready: {} timer(s), uart: {}, {} gpio(s)",
            timers.len(),
            uart.is_some(),
            gpio.len()
        );

        Ok(Self {
            map,
            link,
            ctrl,
            timers,
            uart,
            gpio,
        })
    }

    pub fn map(&self) -> &RegisterMap {
        &self.map
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn ctrl(&self) -> &Ctrl {
        &self.ctrl
    }

    pub fn timer(&self, index: u8) -> Option<&Timer> {
        self.timers.iter().find(|t| t.index() == index)
    }

    pub fn timer_mut(&mut self, index: u8) -> Option<&mut Timer> {
        self.timers.iter_mut().find(|t| t.index() == index)
    }

    pub fn timers(&self) -> &[Timer] {
        &self.timers
    }

    pub fn uart(&self) -> Option<&Uart> {
        self.uart.as_ref()
    }

    pub fn uart_mut(&mut self) -> Option<&mut Uart> {
        self.uart.as_mut()
    }

    pub fn gpio(&self, id: &str) -> Option<&Gpio> {
        self.gpio.iter().find(|(gid, _)| gid == id).map(|(_, g)| g)
    }

    pub fn gpio_ids(&self) -> impl Iterator<Item = &str> {
        self.gpio.iter().map(|(id, _)| id.as_str())
    }

    pub fn reset(&self) -> BridgeResult<()> {
        self.ctrl.reset()
    }

    /// Refresh every timer's readable value register.
    pub fn latch_timers(&self) -> BridgeResult<()> {
        for timer in &self.timers {
            timer.latch()?;
        }
        Ok(())
    }

    pub fn dump(&self) -> BridgeResult<DumpReport> {
        dump::dump(&self.map, &self.link)
    }
}
