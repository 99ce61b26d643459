// CsrBridge - FPGA Register Bridge Client
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    1234
}

fn default_control() -> String {
    "ctrl".to_string()
}

fn default_timers() -> Vec<TimerConfig> {
    vec![TimerConfig { index: 0 }]
}

fn default_uart() -> Option<UartConfig> {
    Some(UartConfig::default())
}

fn default_uart_prefix() -> String {
    "uart".to_string()
}

fn default_gpio_size() -> usize {
    1
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Etherbone over TCP to a LiteX bridge server.
    Etherbone {
        #[serde(default = "default_host")]
        host: String,
        #[serde(default = "default_port")]
        port: u16,
        /// Socket connect/read/write timeout.
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    /// In-process device model, for dry runs without hardware.
    Memory,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Etherbone {
            host: default_host(),
            port: default_port(),
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct PollConfig {
    /// Upper bound for blocking status polls; absent means wait forever.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl PollConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TimerConfig {
    pub index: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UartConfig {
    #[serde(default = "default_uart_prefix")]
    pub prefix: String,
    /// Tuning word written at startup, if any.
    #[serde(default)]
    pub baud: Option<u32>,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            prefix: default_uart_prefix(),
            baud: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GpioConfig {
    pub id: String,
    pub register: String,
    #[serde(default = "default_gpio_size")]
    pub size: usize,
}

/// Describes one SoC reachable over a bridge: where its register map lives,
/// how to reach it, and which peripherals to drive.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BridgeManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    /// Path to the CSV register map, relative to the manifest file.
    pub register_map: PathBuf,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default = "default_control")]
    pub control: String,
    #[serde(default = "default_timers")]
    pub timers: Vec<TimerConfig>,
    #[serde(default = "default_uart")]
    pub uart: Option<UartConfig>,
    #[serde(default)]
    pub gpio: Vec<GpioConfig>,

    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl BridgeManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to open bridge manifest at {:?}", path))?;
        let mut manifest = Self::from_yaml(&content)
            .with_context(|| format!("Invalid bridge manifest {:?}", path))?;
        manifest.base_dir = path.parent().map(Path::to_path_buf);
        Ok(manifest)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let manifest: Self =
            serde_yaml::from_str(yaml).context("Failed to parse Bridge Manifest YAML")?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.register_map.as_os_str().is_empty() {
            anyhow::bail!("'register_map' path cannot be empty");
        }

        if let TransportConfig::Etherbone { host, port, .. } = &self.transport {
            if host.trim().is_empty() {
                anyhow::bail!("Etherbone 'host' cannot be empty");
            }
            if *port == 0 {
                anyhow::bail!("Etherbone 'port' must be non-zero");
            }
        }

        let mut seen = HashSet::new();
        for timer in &self.timers {
            if !seen.insert(timer.index) {
                anyhow::bail!("Timer index {} listed twice", timer.index);
            }
        }

        let mut ids = HashSet::new();
        for gpio in &self.gpio {
            if !ids.insert(gpio.id.as_str()) {
                anyhow::bail!("Duplicate GPIO id '{}'", gpio.id);
            }
            if gpio.size == 0 {
                anyhow::bail!("GPIO '{}' size must be at least 1 byte", gpio.id);
            }
        }

        if self.gpio.is_empty() {
            tracing::debug!("Manifest '{}' declares no GPIOs", self.name);
        }

        Ok(())
    }

    /// Register map location, resolved against the manifest's directory.
    pub fn register_map_path(&self) -> PathBuf {
        match &self.base_dir {
            Some(dir) if self.register_map.is_relative() => dir.join(&self.register_map),
            _ => self.register_map.clone(),
        }
    }
}

/// Parse `0x`-prefixed hex or plain decimal, as accepted on the command line.
pub fn parse_u32(s: &str) -> Result<u32> {
    let trimmed = s.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16).with_context(|| format!("Invalid hex value '{}'", s))
    } else {
        trimmed
            .parse::<u32>()
            .with_context(|| format!("Invalid value '{}'", s))
    }
}
