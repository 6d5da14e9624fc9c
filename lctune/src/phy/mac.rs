//! Queries into the MAC layer.

/// The slice of the 802.15.4e MAC the calibration subsystem observes.
///
/// The MAC owns synchronization and the slotframe schedule; calibration only
/// needs to know whether the mote is still synchronized to the network, and
/// whether a dedicated transmit cell exists so that TX statistics are
/// meaningful.
pub trait Mac {
    /// Whether the mote is synchronized to the network.
    fn is_synched(&self) -> bool;

    /// Whether a negotiated transmit cell to the time parent exists.
    fn has_negotiated_tx_cell(&self) -> bool;
}
