// CsrBridge - FPGA Register Bridge Client
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

mod chase;
mod session;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use csrbridge_config::{parse_u32, BridgeManifest};
use csrbridge_core::map::Entry;
use csrbridge_core::{Bus, RegisterMap};
use session::{Overrides, SessionPlan, Startup};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

const EXIT_OK: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

fn parse_u32_arg(s: &str) -> Result<u32, String> {
    parse_u32(s).map_err(|e| format!("{:#}", e))
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "CsrBridge - drive SoC peripherals over a CSR bridge",
    long_about = None
)]
struct Cli {
    /// Path to the bridge manifest (YAML)
    #[arg(short, long, global = true)]
    manifest: Option<PathBuf>,

    /// Path to the CSV register map (when no manifest is given)
    #[arg(long, global = true)]
    map: Option<PathBuf>,

    /// Bridge server host (when no manifest is given)
    #[arg(long, global = true, default_value = "127.0.0.1")]
    host: String,

    /// Bridge server port (when no manifest is given)
    #[arg(long, global = true, default_value_t = 1234)]
    port: u16,

    /// Use the in-process device model instead of a bridge connection
    #[arg(long, global = true)]
    sim: bool,

    /// Give up on blocking UART polls after this many milliseconds
    #[arg(long, global = true)]
    poll_timeout_ms: Option<u64>,

    /// Enable per-access tracing
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the parsed register map without touching the device.
    Map,

    /// Read every CSR and list memory regions.
    Dump {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
        /// Latch timer values before reading
        #[arg(long)]
        latch: bool,
    },

    /// Pulse the SoC controller reset.
    Reset,

    /// Timer control.
    Timer(TimerArgs),

    /// UART access through the bridge.
    Uart(UartArgs),

    /// Raw GPIO register access.
    Gpio(GpioArgs),

    /// Walk a bit across the LEDs, echoing UART input.
    Chase {
        /// GPIO id of the LED bank
        #[arg(long, default_value = "leds")]
        leds: String,
        /// Timer index used for pacing
        #[arg(long, default_value_t = 0)]
        timer: u8,
        /// Timer period in clock cycles
        #[arg(long, value_parser = parse_u32_arg, default_value_t = chase::DEFAULT_PERIOD)]
        period: u32,
        /// Stop after this many steps (default: run forever)
        #[arg(long)]
        steps: Option<u64>,
        /// Print a register dump at start and every 100 steps
        #[arg(long)]
        dump: bool,
    },
}

#[derive(Args, Debug)]
struct TimerArgs {
    /// Timer index
    #[arg(short, long, default_value_t = 0)]
    index: u8,

    #[command(subcommand)]
    command: TimerCommands,
}

#[derive(Subcommand, Debug)]
enum TimerCommands {
    /// Load a period and start counting, then print samples.
    Enable {
        #[arg(value_parser = parse_u32_arg)]
        period: u32,
        /// Number of samples to print after enabling
        #[arg(long, default_value_t = 1)]
        samples: u32,
    },
    /// Stop the counter.
    Disable,
    /// Latch and print the counter value.
    Sample {
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
}

#[derive(Args, Debug)]
struct UartArgs {
    #[command(subcommand)]
    command: UartCommands,
}

#[derive(Subcommand, Debug)]
enum UartCommands {
    /// Receive bytes and write them to stdout.
    Read {
        /// Return immediately when nothing is waiting
        #[arg(long)]
        nonblocking: bool,
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Send text.
    Write { text: String },
    /// Print the PHY tuning word, or set it.
    Baud {
        #[arg(value_parser = parse_u32_arg)]
        tuning_word: Option<u32>,
    },
}

#[derive(Args, Debug)]
struct GpioArgs {
    #[command(subcommand)]
    command: GpioCommands,
}

#[derive(Subcommand, Debug)]
enum GpioCommands {
    /// Print the register bytes.
    Read { id: String },
    /// Write a value, big-endian over the register width.
    Write {
        id: String,
        #[arg(value_parser = parse_u32_arg)]
        value: u32,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing with appropriate level based on --trace flag
    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let plan = match build_plan(&cli) {
        Ok(plan) => plan,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let map = match plan.load_map() {
        Ok(map) => map,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if let Commands::Map = cli.command {
        return match print_map(&map, &mut out) {
            Ok(()) => ExitCode::from(EXIT_OK),
            Err(e) => {
                error!("{:#}", e);
                ExitCode::from(EXIT_RUNTIME_ERROR)
            }
        };
    }

    // Only the demo loop resets the drivers; everything else observes.
    let startup = match cli.command {
        Commands::Chase { .. } => Startup::Initialize,
        _ => Startup::Attach,
    };
    let mut bus = match plan.connect(map, startup) {
        Ok(bus) => bus,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };

    match run_command(&cli.command, &plan, &mut bus, &mut out) {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn build_plan(cli: &Cli) -> Result<SessionPlan> {
    let overrides = Overrides {
        map: cli.map.clone(),
        host: cli.host.clone(),
        port: cli.port,
        sim: cli.sim,
        poll_timeout_ms: cli.poll_timeout_ms,
    };
    match &cli.manifest {
        Some(path) => {
            let manifest = BridgeManifest::from_file(path)?;
            let mut plan = SessionPlan::from_manifest(&manifest, &overrides);
            if let Some(map) = &cli.map {
                plan.map_path = map.clone();
            }
            Ok(plan)
        }
        None => SessionPlan::from_flags(&overrides),
    }
}

fn print_map(map: &RegisterMap, out: &mut impl Write) -> Result<()> {
    for entry in map.entries() {
        match entry {
            Entry::CsrBase { name, address } => {
                writeln!(out, "base {:>30}  {:#010x}", name, address)?
            }
            Entry::CsrRegister(reg) => writeln!(
                out,
                "csr  {:>30}  {:#010x}  {:>8}  {}",
                reg.name, reg.address, reg.word_count, reg.access
            )?,
            Entry::Constant { name, value } => writeln!(out, "const {:>29}  {}", name, value)?,
            Entry::MemoryRegion {
                name,
                address,
                length,
                flags,
            } => writeln!(
                out,
                "mem  {:>30}  {:#010x}  {:>8}  {}",
                name,
                address,
                length,
                flags.as_deref().unwrap_or("")
            )?,
        }
    }
    Ok(())
}

fn run_command(
    command: &Commands,
    plan: &SessionPlan,
    bus: &mut Bus,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Commands::Map => print_map(bus.map(), out)?,
        Commands::Dump { json, latch } => {
            if *latch {
                bus.latch_timers()?;
            }
            let report = bus.dump()?;
            if *json {
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            } else {
                write!(out, "{}", report)?;
            }
        }
        Commands::Reset => bus.reset()?,
        Commands::Timer(args) => run_timer(args, bus, out)?,
        Commands::Uart(args) => {
            if !matches!(args.command, UartCommands::Baud { .. }) {
                plan.program_baud(bus)?;
            }
            run_uart(args, bus, out)?
        }
        Commands::Gpio(args) => run_gpio(args, bus, out)?,
        Commands::Chase {
            leds,
            timer,
            period,
            steps,
            dump,
        } => {
            let opts = chase::ChaseOptions {
                leds: leds.clone(),
                timer: *timer,
                period: *period,
                steps: *steps,
                dump: *dump,
            };
            let done = chase::run(bus, &opts, out)?;
            tracing::info!("Chase finished after {} steps", done);
        }
    }
    Ok(())
}

fn run_timer(args: &TimerArgs, bus: &mut Bus, out: &mut impl Write) -> Result<()> {
    let timer = bus
        .timer_mut(args.index)
        .with_context(|| format!("timer{} is not configured", args.index))?;
    match &args.command {
        TimerCommands::Enable { period, samples } => {
            timer.enable(*period)?;
            for _ in 0..*samples {
                writeln!(out, "{}", timer.sample()?)?;
            }
        }
        TimerCommands::Disable => timer.disable()?,
        TimerCommands::Sample { count } => {
            for _ in 0..*count {
                writeln!(out, "{}", timer.sample()?)?;
            }
        }
    }
    Ok(())
}

fn run_uart(args: &UartArgs, bus: &Bus, out: &mut impl Write) -> Result<()> {
    let uart = bus.uart().context("UART is not configured")?;
    match &args.command {
        UartCommands::Read { nonblocking, count } => {
            for _ in 0..*count {
                match uart.read(!*nonblocking)? {
                    Some(byte) => out.write_all(&[byte])?,
                    None => break,
                }
            }
            out.flush()?;
        }
        UartCommands::Write { text } => uart.write_all(text.as_bytes())?,
        UartCommands::Baud { tuning_word } => match tuning_word {
            Some(word) => uart.set_baud(*word)?,
            None => writeln!(out, "{}", uart.baud()?)?,
        },
    }
    Ok(())
}

fn run_gpio(args: &GpioArgs, bus: &Bus, out: &mut impl Write) -> Result<()> {
    let id = match &args.command {
        GpioCommands::Read { id } | GpioCommands::Write { id, .. } => id,
    };
    let gpio = bus
        .gpio(id)
        .with_context(|| format!("GPIO '{}' is not configured", id))?;

    match &args.command {
        GpioCommands::Read { .. } => {
            let hex: Vec<String> = gpio.read()?.iter().map(|b| format!("{:02x}", b)).collect();
            writeln!(out, "{}", hex.join(" "))?;
        }
        GpioCommands::Write { value, .. } => gpio.write(&value_bytes(*value, gpio.size())?)?,
    }
    Ok(())
}

/// Big-endian bytes of `value`, zero-extended to `size`. Values wider than
/// the register are rejected.
fn value_bytes(value: u32, size: usize) -> Result<Vec<u8>> {
    let be = value.to_be_bytes();
    if size >= be.len() {
        let mut bytes = vec![0; size - be.len()];
        bytes.extend_from_slice(&be);
        return Ok(bytes);
    }
    let (dropped, kept) = be.split_at(be.len() - size);
    if dropped.iter().any(|&b| b != 0) {
        anyhow::bail!("Value {:#x} does not fit in a {}-byte register", value, size);
    }
    Ok(kept.to_vec())
}
