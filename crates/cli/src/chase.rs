// CsrBridge - FPGA Register Bridge Client
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! LED chaser: walks a single cleared bit across an 8-LED bank, paced by a
//! hardware timer, echoing anything the SoC UART receives.

use anyhow::{Context, Result};
use csrbridge_core::Bus;
use std::io::Write;

pub const DEFAULT_PERIOD: u32 = 65536 * 200;
const DUMP_EVERY: u64 = 100;
const LED_COUNT: u8 = 8;

pub struct ChaseOptions {
    pub leds: String,
    pub timer: u8,
    pub period: u32,
    pub steps: Option<u64>,
    pub dump: bool,
}

/// Active-low pattern for LED `position`.
pub fn pattern(position: u8) -> u8 {
    (1u8 << position) ^ 0xff
}

/// Next position and direction, bouncing at both ends.
pub fn advance(position: u8, dir: i8) -> (u8, i8) {
    let dir = if position == 0 || position == LED_COUNT - 1 {
        -dir
    } else {
        dir
    };
    ((position as i8 + dir) as u8, dir)
}

pub fn run(bus: &mut Bus, opts: &ChaseOptions, out: &mut impl Write) -> Result<u64> {
    bus.reset()?;
    bus.timer_mut(opts.timer)
        .with_context(|| format!("timer{} is not configured", opts.timer))?
        .enable(opts.period)?;

    if opts.dump {
        bus.latch_timers()?;
        write!(out, "{}", bus.dump()?)?;
    }

    let leds = bus
        .gpio(&opts.leds)
        .with_context(|| format!("GPIO '{}' is not configured", opts.leds))?;
    let timer = bus
        .timer(opts.timer)
        .with_context(|| format!("timer{} is not configured", opts.timer))?;
    let uart = bus.uart();

    tracing::info!("Chase loop starting");
    // Starts at the low end moving "down" so the first bounce turns it upward.
    let (mut position, mut dir) = (0u8, -1i8);
    let mut step: u64 = 0;

    while opts.steps.map_or(true, |limit| step < limit) {
        leds.write_u8(pattern(position))?;

        // Down-counter: wait for the reload, or for a received byte.
        let start = timer.sample()?;
        while timer.sample()? < start {
            if let Some(uart) = uart {
                if let Some(byte) = uart.read(false)? {
                    out.write_all(&[byte])?;
                    out.flush()?;
                    break;
                }
            }
        }

        (position, dir) = advance(position, dir);
        step += 1;

        if opts.dump && step % DUMP_EVERY == 0 {
            bus.latch_timers()?;
            write!(out, "{}", bus.dump()?)?;
        }
    }

    Ok(step)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_clears_one_bit() {
        assert_eq!(pattern(0), 0xfe);
        assert_eq!(pattern(7), 0x7f);
    }

    #[test]
    fn test_advance_bounces() {
        let mut state = (0u8, -1i8);
        let mut seen = Vec::new();
        for _ in 0..16 {
            seen.push(state.0);
            state = advance(state.0, state.1);
        }
        assert_eq!(seen, [0, 1, 2, 3, 4, 5, 6, 7, 6, 5, 4, 3, 2, 1, 0, 1]);
    }
}
