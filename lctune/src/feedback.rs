//! Closed-loop RX tuning-code tracking.
//!
//! Once a channel is calibrated, every received frame yields an estimate of
//! the intermediate frequency: the number of zero crossings counted over a
//! fixed window. The controller keeps a short window of recent estimates per
//! channel and, when the average drifts out of the nominal band, nudges the
//! channel's RX tuning code by a single fine code and starts the window
//! over. One step per detection keeps the loop from oscillating; flushing
//! the window makes the next judgment use only post-correction samples.

use crate::channel::{Channel, ChannelMode, ChannelRegistry, NUM_CHANNELS};
use crate::tuning::TuningCode;

/// Nominal IF count: 500 zero crossings per window is an IF of 2.5 MHz.
pub const NOMINAL_IF_COUNT: u32 = 500;

/// Width of the band around [`NOMINAL_IF_COUNT`] that is considered on
/// frequency. 25 counts is about 100 kHz, roughly one fine code.
pub const MAX_IF_OFFSET: u32 = 25;

/// Number of IF estimates kept per channel.
pub const NUM_IF_ESTIMATES_TO_AVERAGE: usize = 10;

/// Minimum number of IF estimates before a correction is considered.
pub const MIN_IF_ESTIMATES_TO_AVERAGE: usize = NUM_IF_ESTIMATES_TO_AVERAGE / 3;

/// Correction direction. The receive chain mixes the local oscillator from
/// below the carrier, so a high IF count means the oscillator sits too high
/// and the fine code steps down. Flip for a high-side injection topology.
pub const HIGH_IF_STEPS_FINE_DOWN: bool = true;

/// Ring of the most recent IF estimates for one channel.
#[derive(Debug, Clone, Copy)]
struct IfEstimateWindow {
    estimates: [u32; NUM_IF_ESTIMATES_TO_AVERAGE],
    head: usize,
    full: bool,
}

impl Default for IfEstimateWindow {
    fn default() -> Self {
        Self {
            estimates: [0; NUM_IF_ESTIMATES_TO_AVERAGE],
            head: 0,
            full: false,
        }
    }
}

impl IfEstimateWindow {
    fn push(&mut self, estimate: u32) {
        self.estimates[self.head] = estimate;
        self.head = (self.head + 1) % NUM_IF_ESTIMATES_TO_AVERAGE;
        if self.head == 0 {
            self.full = true;
        }
    }

    fn len(&self) -> usize {
        if self.full {
            NUM_IF_ESTIMATES_TO_AVERAGE
        } else {
            self.head
        }
    }

    fn average(&self) -> u32 {
        let len = self.len();
        let sum: u32 = self.estimates[..len].iter().sum();
        sum / len as u32
    }

    fn reset(&mut self) {
        self.head = 0;
        self.full = false;
    }
}

/// The per-channel feedback controller.
#[derive(Debug, Default, Clone)]
pub struct TuningFeedback {
    windows: [IfEstimateWindow; NUM_CHANNELS],
}

impl TuningFeedback {
    /// Create a controller with empty windows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one IF estimate for a received frame on `channel`.
    ///
    /// Returns the corrected RX tuning code when the averaged estimate left
    /// the nominal band and a single fine-code step was applied to the
    /// registry. A zero estimate is invalid and ignored.
    pub fn adjust_rx(
        &mut self,
        channel: Channel,
        if_estimate: u32,
        registry: &mut ChannelRegistry,
    ) -> Option<TuningCode> {
        if if_estimate == 0 {
            return None;
        }

        let window = &mut self.windows[channel.index()];
        window.push(if_estimate);

        if window.len() < MIN_IF_ESTIMATES_TO_AVERAGE {
            return None;
        }

        let average = window.average();
        let code = registry.get_tuning_code(channel, ChannelMode::Rx);
        let corrected = if average > NOMINAL_IF_COUNT + MAX_IF_OFFSET {
            if HIGH_IF_STEPS_FINE_DOWN {
                code.decrement_fine(1)
            } else {
                code.increment_fine(1)
            }
        } else if average < NOMINAL_IF_COUNT - MAX_IF_OFFSET {
            if HIGH_IF_STEPS_FINE_DOWN {
                code.increment_fine(1)
            } else {
                code.decrement_fine(1)
            }
        } else {
            return None;
        };

        // Judge the next correction on fresh samples either way.
        window.reset();

        match corrected {
            Ok(corrected) => {
                registry.set_tuning_code(channel, ChannelMode::Rx, corrected);
                Some(corrected)
            }
            Err(_) => {
                // The code sits at the edge of the coarse range; leave it.
                warn!("rx feedback step out of range on channel {}", u8::from(channel));
                None
            }
        }
    }

    /// Drop the collected estimates for `channel`. Called when the channel
    /// is (re)calibrated, so stale pre-calibration samples never vote.
    pub fn reset_channel(&mut self, channel: Channel) {
        self.windows[channel.index()].reset();
    }
}
