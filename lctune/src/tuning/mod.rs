//! Tuning-code arithmetic.
//!
//! The LC oscillator is tuned by three 5-bit fields, coarse, mid and fine,
//! each covering a successively smaller frequency step. The fields do not
//! form a base-32 numeral system: the ranges of two adjacent mid codes (or
//! coarse codes) overlap, so a carry out of one field lands partway into the
//! next range instead of at its start. The overlap widths were measured on
//! real dies and are captured by the constants below.
//!
//! All operations are checked: walking the coarse field past either end of
//! its range, or a step too large to resolve with a single overlap carry,
//! yields an [`Error`] instead of wrapping.

pub mod sweep;

use crate::config;

/// Minimum value of each tuning-code field.
pub const TUNING_MIN_CODE: u8 = 0;
/// Maximum value of each tuning-code field.
pub const TUNING_MAX_CODE: u8 = 31;

/// Fine codes skipped when the fine field carries into the mid field.
/// Empirical: the first fine code of mid `m + 1` sits about 9 fine codes
/// below the last fine code of mid `m`.
pub const FINE_CODES_PER_MID_TRANSITION: u8 = 9;

/// Mid codes skipped when the mid field carries into the coarse field.
pub const MID_CODES_PER_COARSE_TRANSITION: u8 = config::MID_CODES_PER_COARSE_TRANSITION;

/// Mid codes between two neighboring 802.15.4 channels at equal coarse.
pub const MID_CODES_BETWEEN_CHANNELS: u8 = config::MID_CODES_BETWEEN_CHANNELS;

/// Mid codes between the RX and TX codes of one channel (RX above TX).
pub const MID_CODES_BETWEEN_RX_AND_TX: u8 = 1;

/// Errors of the checked tuning-code arithmetic.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The coarse field would move past [`TUNING_MAX_CODE`].
    CoarseOverflow,
    /// The coarse field would move below [`TUNING_MIN_CODE`].
    CoarseUnderflow,
    /// The step cannot be resolved with a single overlap carry.
    StepTooLarge,
}

/// A type alias for `Result<T, tuning::Error>`.
pub type Result<T> = core::result::Result<T, Error>;

/// An oscillator setting: the coarse, mid and fine codes, each in
/// `[TUNING_MIN_CODE, TUNING_MAX_CODE]`. Ordered lexicographically.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TuningCode {
    /// Coarse code.
    pub coarse: u8,
    /// Mid code.
    pub mid: u8,
    /// Fine code.
    pub fine: u8,
}

impl TuningCode {
    /// Create a tuning code. Fields above [`TUNING_MAX_CODE`] are rejected.
    pub const fn new(coarse: u8, mid: u8, fine: u8) -> Option<Self> {
        if coarse > TUNING_MAX_CODE || mid > TUNING_MAX_CODE || fine > TUNING_MAX_CODE {
            return None;
        }
        Some(Self { coarse, mid, fine })
    }

    /// Create a tuning code without range checking.
    pub const fn new_unchecked(coarse: u8, mid: u8, fine: u8) -> Self {
        Self { coarse, mid, fine }
    }

    /// Advance by `n` fine codes, carrying across the mid overlap.
    pub fn increment_fine(self, n: u8) -> Result<Self> {
        if self.fine as u16 + n as u16 > TUNING_MAX_CODE as u16 {
            let fine = checked_field(
                self.fine as i16 + FINE_CODES_PER_MID_TRANSITION as i16 + n as i16
                    - TUNING_MAX_CODE as i16
                    - 1,
            )?;
            let mut code = self.increment_mid(1)?;
            code.fine = fine;
            Ok(code)
        } else {
            Ok(Self {
                fine: self.fine + n,
                ..self
            })
        }
    }

    /// Step back by `n` fine codes, borrowing across the mid overlap.
    pub fn decrement_fine(self, n: u8) -> Result<Self> {
        if self.fine < TUNING_MIN_CODE + n {
            let fine = checked_field(
                self.fine as i16 + TUNING_MAX_CODE as i16 + 1
                    - FINE_CODES_PER_MID_TRANSITION as i16
                    - n as i16,
            )?;
            let mut code = self.decrement_mid(1)?;
            code.fine = fine;
            Ok(code)
        } else {
            Ok(Self {
                fine: self.fine - n,
                ..self
            })
        }
    }

    /// Advance by `n` mid codes, carrying across the coarse overlap.
    pub fn increment_mid(self, n: u8) -> Result<Self> {
        if self.mid as u16 + n as u16 > TUNING_MAX_CODE as u16 {
            if self.coarse >= TUNING_MAX_CODE {
                return Err(Error::CoarseOverflow);
            }
            let mid = checked_field(
                self.mid as i16 + MID_CODES_PER_COARSE_TRANSITION as i16 + n as i16
                    - TUNING_MAX_CODE as i16
                    - 1,
            )?;
            Ok(Self {
                coarse: self.coarse + 1,
                mid,
                ..self
            })
        } else {
            Ok(Self {
                mid: self.mid + n,
                ..self
            })
        }
    }

    /// Step back by `n` mid codes, borrowing across the coarse overlap.
    pub fn decrement_mid(self, n: u8) -> Result<Self> {
        if self.mid < TUNING_MIN_CODE + n {
            if self.coarse <= TUNING_MIN_CODE {
                return Err(Error::CoarseUnderflow);
            }
            let mid = checked_field(
                self.mid as i16 + TUNING_MAX_CODE as i16 + 1
                    - MID_CODES_PER_COARSE_TRANSITION as i16
                    - n as i16,
            )?;
            Ok(Self {
                coarse: self.coarse - 1,
                mid,
                ..self
            })
        } else {
            Ok(Self {
                mid: self.mid - n,
                ..self
            })
        }
    }

    /// Re-express the code across the coarse boundary when the mid code sits
    /// within `threshold` codes of either end of its range. A no-op outside
    /// the threshold band.
    pub fn rollover_mid(self, threshold: u8) -> Result<Self> {
        if self.mid as u16 + threshold as u16 > TUNING_MAX_CODE as u16 {
            if self.coarse >= TUNING_MAX_CODE {
                return Err(Error::CoarseOverflow);
            }
            let mid = checked_field(self.mid as i16 - MID_CODES_PER_COARSE_TRANSITION as i16)?;
            Ok(Self {
                coarse: self.coarse + 1,
                mid,
                ..self
            })
        } else if self.mid < TUNING_MIN_CODE + threshold {
            if self.coarse <= TUNING_MIN_CODE {
                return Err(Error::CoarseUnderflow);
            }
            let mid = checked_field(self.mid as i16 + MID_CODES_PER_COARSE_TRANSITION as i16)?;
            Ok(Self {
                coarse: self.coarse - 1,
                mid,
                ..self
            })
        } else {
            Ok(self)
        }
    }

    /// Estimate the code of the next lower channel at the same frequency
    /// offset.
    pub fn estimate_previous_channel(self) -> Result<Self> {
        self.decrement_mid(MID_CODES_BETWEEN_CHANNELS)
    }

    /// Estimate the code of the next higher channel at the same frequency
    /// offset.
    pub fn estimate_next_channel(self) -> Result<Self> {
        self.increment_mid(MID_CODES_BETWEEN_CHANNELS)
    }

    /// Estimate the TX code for this channel from its RX code.
    pub fn estimate_tx_from_rx(self) -> Result<Self> {
        self.decrement_mid(MID_CODES_BETWEEN_RX_AND_TX)
    }

    /// Estimate the RX code for this channel from its TX code.
    pub fn estimate_rx_from_tx(self) -> Result<Self> {
        self.increment_mid(MID_CODES_BETWEEN_RX_AND_TX)
    }

    /// Whether all three fields are within range.
    pub const fn is_valid(&self) -> bool {
        self.coarse <= TUNING_MAX_CODE && self.mid <= TUNING_MAX_CODE && self.fine <= TUNING_MAX_CODE
    }
}

fn checked_field(value: i16) -> Result<u8> {
    if (TUNING_MIN_CODE as i16..=TUNING_MAX_CODE as i16).contains(&value) {
        Ok(value as u8)
    } else {
        Err(Error::StepTooLarge)
    }
}

impl core::fmt::Display for TuningCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:02}.{:02}.{:02}", self.coarse, self.mid, self.fine)
    }
}
