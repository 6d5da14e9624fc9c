//! ISR to main-loop signalling.
//!
//! Interrupt handlers record what happened by setting bits in an
//! [`EventFlags`] word; the foreground loop drains the word with a single
//! atomic fetch-and-clear and dispatches on the returned [`Events`]. The
//! word is the only state shared across the interrupt boundary, so no
//! critical section is needed around it.

use core::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;

bitflags! {
    /// Pending radio and timer events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Events: u32 {
        /// The radio started receiving or transmitting a frame.
        const START_FRAME = 1 << 0;
        /// The radio finished receiving or transmitting a frame.
        const END_FRAME = 1 << 1;
        /// The timer compare fired.
        const TIMER = 1 << 2;
    }
}

/// An atomic event bitset shared between interrupt handlers and the
/// foreground loop.
#[derive(Debug, Default)]
pub struct EventFlags(AtomicU32);

impl EventFlags {
    /// Create an empty flag word.
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Mark events as pending. Safe to call from interrupt context.
    pub fn set(&self, events: Events) {
        self.0.fetch_or(events.bits(), Ordering::SeqCst);
    }

    /// Take all pending events, leaving the word empty.
    pub fn fetch_clear(&self) -> Events {
        Events::from_bits_truncate(self.0.swap(0, Ordering::SeqCst))
    }

    /// Read the pending events without clearing them.
    pub fn peek(&self) -> Events {
        Events::from_bits_truncate(self.0.load(Ordering::SeqCst))
    }
}
