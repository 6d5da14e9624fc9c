//! Bounded enumeration of tuning codes.
//!
//! A sweep walks every code inside a box of the 3-D code space, fine codes
//! first. Two refinements bias the order towards the empirically likely
//! region:
//!
//! - When the coarse range is a single plane, the mid code starts at the
//!   center of its range rather than at the bottom.
//! - When, additionally, the mid range is a window around that center, the
//!   mid code is stepped outward in a ping-pong pattern (center, center + 1,
//!   center - 1, center + 2, ...), falling back to the center once the
//!   pattern leaves the window.
//!
//! The stepper is total: it wraps within its configuration, and progress is
//! bounded by [`SweepConfig::is_end_of_sweep`].

use super::{TuningCode, TUNING_MAX_CODE};

/// An inclusive code range, `start <= end`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepRange {
    /// First code of the range.
    pub start: u8,
    /// Last code of the range (inclusive).
    pub end: u8,
}

impl SweepRange {
    /// Create a range covering `[start, end]`.
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    /// Create a range holding the single code `value`.
    pub const fn single(value: u8) -> Self {
        Self {
            start: value,
            end: value,
        }
    }

    const fn is_valid(&self) -> bool {
        self.start <= self.end && self.end <= TUNING_MAX_CODE
    }

    const fn is_single(&self) -> bool {
        self.start == self.end
    }

    const fn center(&self) -> u8 {
        (self.start + self.end) / 2
    }
}

/// The sweep configuration was rejected: a range is inverted or leaves
/// `[TUNING_MIN_CODE, TUNING_MAX_CODE]`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSweepConfig;

/// One [`SweepRange`] per tuning-code field.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepConfig {
    /// Range of the coarse code.
    pub coarse: SweepRange,
    /// Range of the mid code.
    pub mid: SweepRange,
    /// Range of the fine code.
    pub fine: SweepRange,
}

impl SweepConfig {
    /// Create a sweep configuration from the three field ranges.
    pub const fn new(coarse: SweepRange, mid: SweepRange, fine: SweepRange) -> Self {
        Self { coarse, mid, fine }
    }

    /// Reject inverted or out-of-range field ranges.
    pub fn validate(&self) -> Result<(), InvalidSweepConfig> {
        if self.coarse.is_valid() && self.mid.is_valid() && self.fine.is_valid() {
            Ok(())
        } else {
            Err(InvalidSweepConfig)
        }
    }

    /// Position a code at the start of the sweep.
    ///
    /// With a single coarse plane the mid code starts at the center of its
    /// range, scanning outward from the empirically best mid code.
    pub fn first_code(&self) -> TuningCode {
        TuningCode {
            coarse: self.coarse.start,
            mid: if self.coarse.is_single() {
                self.mid.center()
            } else {
                self.mid.start
            },
            fine: self.fine.start,
        }
    }

    /// Advance by one fine code, rolling into the next mid code past the end
    /// of the fine range.
    pub fn advance_fine(&self, code: TuningCode) -> TuningCode {
        let mut code = code;
        code.fine += 1;
        if code.fine > self.fine.end {
            code = self.advance_mid(code);
        }
        code
    }

    /// Advance by one mid code, restarting the fine range.
    pub fn advance_mid(&self, code: TuningCode) -> TuningCode {
        let mut code = code;
        code.fine = self.fine.start;

        if self.coarse.is_single() && !self.mid.is_single() {
            code.mid = self.ping_pong_mid(code.mid);
            return code;
        }

        code.mid += 1;
        if code.mid > self.mid.end {
            code.mid = self.mid.start;
            code.coarse += 1;
            if code.coarse > self.coarse.end {
                code.coarse = self.coarse.start;
            }
        }
        code
    }

    /// Next mid code of the outward ping-pong schedule around the range
    /// center, falling back to the center outside the window.
    fn ping_pong_mid(&self, mid: u8) -> u8 {
        let center = self.mid.center() as i16;
        let mid = mid as i16;
        let next = if mid >= center {
            if mid == center {
                center + 1
            } else {
                center - (mid - center)
            }
        } else {
            center + (center - mid) + 1
        };
        if next < self.mid.start as i16 || next > self.mid.end as i16 {
            center as u8
        } else {
            next as u8
        }
    }

    /// Whether the code has reached the last code of the sweep.
    pub fn is_end_of_sweep(&self, code: &TuningCode) -> bool {
        code.coarse > self.coarse.end
            || (code.coarse == self.coarse.end
                && (code.mid > self.mid.end
                    || (code.mid == self.mid.end && code.fine >= self.fine.end)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(coarse: (u8, u8), mid: (u8, u8), fine: (u8, u8)) -> SweepConfig {
        SweepConfig::new(
            SweepRange::new(coarse.0, coarse.1),
            SweepRange::new(mid.0, mid.1),
            SweepRange::new(fine.0, fine.1),
        )
    }

    #[test]
    fn validation() {
        assert!(config((0, 31), (0, 31), (0, 31)).validate().is_ok());
        assert!(config((5, 4), (0, 31), (0, 31)).validate().is_err());
        assert!(config((0, 31), (0, 32), (0, 31)).validate().is_err());
        assert!(config((0, 31), (0, 31), (40, 41)).validate().is_err());
    }

    #[test]
    fn first_code_starts_low() {
        let cfg = config((2, 4), (3, 7), (1, 9));
        assert_eq!(cfg.first_code(), TuningCode::new_unchecked(2, 3, 1));
        assert!(!cfg.is_end_of_sweep(&cfg.first_code()));
    }

    #[test]
    fn first_code_centers_mid_on_a_single_coarse_plane() {
        let cfg = config((22, 22), (14, 16), (0, 24));
        assert_eq!(cfg.first_code(), TuningCode::new_unchecked(22, 15, 0));
        assert!(!cfg.is_end_of_sweep(&cfg.first_code()));
    }

    #[test]
    fn fine_codes_walk_in_order() {
        let cfg = config((22, 22), (15, 15), (3, 7));
        let mut code = cfg.first_code();
        let mut fines = vec![code.fine];
        while !cfg.is_end_of_sweep(&code) {
            code = cfg.advance_fine(code);
            fines.push(code.fine);
        }
        assert_eq!(fines, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn full_box_is_visited_exactly_once() {
        // With more than one coarse plane the sweep is a plain row-major
        // walk over the box.
        let cfg = config((2, 3), (1, 2), (0, 3));
        let mut code = cfg.first_code();
        let mut seen = vec![code];
        while !cfg.is_end_of_sweep(&code) {
            code = cfg.advance_fine(code);
            seen.push(code);
        }

        assert_eq!(seen.len(), 2 * 2 * 4);
        let mut expected = vec![];
        for coarse in 2..=3 {
            for mid in 1..=2 {
                for fine in 0..=3 {
                    expected.push(TuningCode::new_unchecked(coarse, mid, fine));
                }
            }
        }
        assert_eq!(seen, expected);
    }

    #[test]
    fn mid_ping_pongs_around_the_center() {
        let cfg = config((22, 22), (13, 17), (0, 1));
        let mut code = cfg.first_code();
        let mut mids = vec![code.mid];
        for _ in 0..5 {
            code = cfg.advance_mid(code);
            mids.push(code.mid);
        }
        assert_eq!(mids, vec![15, 16, 14, 17, 13, 15]);
    }

    #[test]
    fn ping_pong_recovers_from_a_code_outside_the_window() {
        let cfg = config((22, 22), (14, 16), (0, 24));
        // A feedback correction may have dragged the mid code outside the
        // window; the next step recenters.
        assert_eq!(cfg.ping_pong_mid(19), 15);
        assert_eq!(cfg.ping_pong_mid(11), 15);
    }

    #[test]
    fn wraps_to_the_start_after_the_last_code() {
        let cfg = config((2, 3), (1, 2), (0, 3));
        let last = TuningCode::new_unchecked(3, 2, 3);
        assert!(cfg.is_end_of_sweep(&last));
        assert_eq!(cfg.advance_fine(last), cfg.first_code());
    }
}
