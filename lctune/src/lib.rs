//! Frequency calibration for crystal-free IEEE 802.15.4 radios.
//!
//! A crystal-free transceiver selects its local oscillator frequency through
//! a three-field tuning code whose mapping to physical frequency drifts with
//! temperature and varies per die. This crate discovers the per-channel,
//! per-direction tuning codes at runtime by sweeping the code space while
//! cooperating with a peer over the radio, and then tracks the codes with a
//! closed feedback loop on the received intermediate frequency.
//!
//! The building blocks, bottom up:
//! - [`tuning`]: arithmetic on tuning codes, including the empirical overlap
//!   carries between the fine, mid and coarse fields, and the bounded sweep
//!   iterator.
//! - [`channel`]: the per-channel tuning-code registry.
//! - [`wire`]: readers and writers for the calibration packets.
//! - [`cal`]: the calibration engine run on the mote, the peer-side
//!   coordinator, and the [`cal::TuningSubsystem`] that wires either of them
//!   to a radio, a timer and a UART.
//! - [`feedback`]: the post-calibration RX tuning-code controller.
//!
//! The crate is `no_std`; the hardware seams are the traits in [`phy`].

#![no_std]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

#[macro_use]
pub(crate) mod utils;

pub mod cal;
pub mod channel;
pub mod config;
pub mod feedback;
pub mod phy;
pub mod sync;
pub mod time;
pub mod tuning;
pub mod wire;
