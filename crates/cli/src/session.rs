// CsrBridge - FPGA Register Bridge Client
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use csrbridge_config::{BridgeManifest, TransportConfig};
use csrbridge_core::transport::{EtherboneTransport, MemoryTransport};
use csrbridge_core::{Bus, BusConfig, EntryKind, GpioSpec, Link, PollPolicy, RegisterMap};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    Initialize,
    Attach,
}

/// Where the register map and the device come from, before anything is opened.
#[derive(Debug)]
pub struct SessionPlan {
    pub map_path: PathBuf,
    pub transport: TransportConfig,
    pub bus: BusConfig,
    pub baud: Option<u32>,
}

/// Connection flags used when no manifest is given.
#[derive(Debug, Clone)]
pub struct Overrides {
    pub map: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub sim: bool,
    pub poll_timeout_ms: Option<u64>,
}

impl SessionPlan {
    pub fn from_manifest(manifest: &BridgeManifest, overrides: &Overrides) -> Self {
        let transport = if overrides.sim {
            TransportConfig::Memory
        } else {
            manifest.transport.clone()
        };
        let timeout = overrides
            .poll_timeout_ms
            .map(Duration::from_millis)
            .or(manifest.poll.timeout());

        Self {
            map_path: manifest.register_map_path(),
            transport,
            bus: BusConfig {
                control: manifest.control.clone(),
                timers: manifest.timers.iter().map(|t| t.index).collect(),
                uart: manifest.uart.as_ref().map(|u| u.prefix.clone()),
                gpio: manifest
                    .gpio
                    .iter()
                    .map(|g| GpioSpec::new(&g.id, &g.register, g.size))
                    .collect(),
                poll: poll_policy(timeout),
            },
            baud: manifest.uart.as_ref().and_then(|u| u.baud),
        }
    }

    pub fn from_flags(overrides: &Overrides) -> Result<Self> {
        let map_path = overrides
            .map
            .clone()
            .context("Either --manifest or --map is required")?;
        let transport = if overrides.sim {
            TransportConfig::Memory
        } else {
            TransportConfig::Etherbone {
                host: overrides.host.clone(),
                port: overrides.port,
                timeout_ms: None,
            }
        };
        Ok(Self {
            map_path,
            transport,
            bus: BusConfig {
                poll: poll_policy(overrides.poll_timeout_ms.map(Duration::from_millis)),
                ..BusConfig::default()
            },
            baud: None,
        })
    }

    pub fn load_map(&self) -> Result<RegisterMap> {
        RegisterMap::from_file(&self.map_path)
            .with_context(|| format!("Failed to load register map {:?}", self.map_path))
    }

    pub fn open_link(&self, map: &RegisterMap) -> Result<Link> {
        match &self.transport {
            TransportConfig::Etherbone {
                host,
                port,
                timeout_ms,
            } => {
                let eb = EtherboneTransport::connect(
                    (host.as_str(), *port),
                    timeout_ms.map(Duration::from_millis),
                )
                .with_context(|| {
                    format!(
                        "Cannot reach bridge at {}:{} (is litex_server running?)",
                        host, port
                    )
                })?;
                Ok(Link::new(eb))
            }
            TransportConfig::Memory => Ok(Link::new(idle_device(map, &self.bus))),
        }
    }

    /// Open the link and build every configured driver.
    ///
    /// `Startup::Initialize` puts the drivers into their reset state and
    /// programs the configured baud; `Startup::Attach` only reads.
    pub fn connect(&self, map: RegisterMap, startup: Startup) -> Result<Bus> {
        let link = self.open_link(&map)?;
        let bus = match startup {
            Startup::Initialize => Bus::new(map, link, &self.bus),
            Startup::Attach => Bus::attach(map, link, &self.bus),
        }
        .context("Failed to bind drivers to register map")?;

        if let Startup::Initialize = startup {
            self.program_baud(&bus)?;
        }
        Ok(bus)
    }

    pub fn program_baud(&self, bus: &Bus) -> Result<()> {
        if let (Some(baud), Some(uart)) = (self.baud, bus.uart()) {
            uart.set_baud(baud).context("Failed to program UART tuning word")?;
        }
        Ok(())
    }
}

fn poll_policy(timeout: Option<Duration>) -> PollPolicy {
    match timeout {
        Some(t) => PollPolicy::with_timeout(t),
        None => PollPolicy::forever(),
    }
}

/// Device model for `--sim`: an idle UART with nothing received and room to send.
fn idle_device(map: &RegisterMap, bus: &BusConfig) -> MemoryTransport {
    let mem = MemoryTransport::new();
    if let Some(prefix) = &bus.uart {
        if let Ok(addr) = map.lookup(EntryKind::CsrRegister, &format!("{}_rxempty", prefix)) {
            mem.preload(addr, &[1]);
        }
    }
    tracing::info!("Using in-process device model");
    mem
}
