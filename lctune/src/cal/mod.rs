//! Channel calibration.
//!
//! Calibration discovers, per 802.15.4 channel and direction, the tuning
//! code that puts the crystal-free oscillator on frequency. It runs in two
//! phases:
//!
//! 1. An initial RX sweep walks the code space on one channel until a frame
//!    from the peer is received ([`engine::ChannelCal`]).
//! 2. The discovered code is extrapolated to every other channel and to the
//!    transmit direction, and each estimate is confirmed or corrected by
//!    observing successes and failures reported by the MAC.
//!
//! [`subsystem::TuningSubsystem`] binds the engine to a radio, a timer and
//! a UART on the mote. [`coordinator::Coordinator`] is the other end of the
//! protocol, run on a frequency-stable peer.

pub mod coordinator;
pub mod engine;
pub mod subsystem;

pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorState};
pub use engine::{CalState, ChannelCal, INITIAL_CHANNEL};
pub use subsystem::TuningSubsystem;

/// Mid codes at or above this threshold sit close to a coarse rollover, so
/// the reception pattern may pause while the sweep crosses the overlap; the
/// next listen window is stretched to [`crate::config::CAL_RX_LONG_TIMEOUT`].
pub const MID_CODE_ROLLOVER_THRESHOLD: u8 = 24;
