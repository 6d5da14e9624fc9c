//! The one-shot compare timer.

use crate::time::Instant;

/// A single compare channel on the free-running 32 kHz counter.
///
/// The comparison is absolute: the callback registered by the board support
/// glue fires when the counter passes the compare value, and the glue
/// forwards it as a timer event. Setting a new compare value supersedes the
/// previous one.
pub trait Timer {
    /// Read the free-running counter.
    fn read_counter(&self) -> Instant;

    /// Arm the compare at an absolute counter value.
    fn set_compare(&mut self, at: Instant);

    /// Enable the compare interrupt.
    fn enable(&mut self);

    /// Disable the compare interrupt, cancelling an armed compare.
    fn disable(&mut self);
}
