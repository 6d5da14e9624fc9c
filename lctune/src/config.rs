//! Compile-time configuration.
//!
//! The values in this module are board tunables: the empirical oscillator
//! constants that differ between characterized dies, the channel calibration
//! knobs, and the protocol timeouts. Outside of tests they are generated by
//! `build.rs` and can be overridden one by one through `LCTUNE_*` environment
//! variables, e.g. `LCTUNE_CAL_INITIAL_CHANNEL=20`.

pub use customizable::*;


#[cfg(not(test))]
mod customizable {
    #![allow(unused)]
    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}
