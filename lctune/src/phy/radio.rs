//! The radio command surface.

use crate::channel::{Channel, ChannelMode};
use crate::tuning::TuningCode;

/// Metadata of a received frame.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Length of the frame in bytes, CRC included.
    pub length: u8,
    /// Received signal strength indicator in dBm.
    pub rssi: i8,
    /// Link quality indicator.
    pub lqi: u8,
    /// Whether the hardware CRC check passed.
    pub crc_ok: bool,
}

/// An 802.15.4 transceiver as seen by the calibration subsystem.
///
/// Commands take effect immediately; frame completion is reported through
/// the start-frame and end-frame interrupts, which the board support glue
/// forwards as events. The driver is assumed reliable: commands do not
/// return errors.
pub trait Radio {
    /// Power the RF circuitry up.
    fn rf_on(&mut self);

    /// Power the RF circuitry down, aborting any reception in progress.
    fn rf_off(&mut self);

    /// Point the local oscillator at a raw tuning code.
    fn tune(&mut self, code: TuningCode);

    /// Point the local oscillator at a calibrated channel. Only meaningful
    /// once a code for the channel and mode has been published.
    fn set_frequency(&mut self, channel: Channel, mode: ChannelMode);

    /// Prepare the receive path.
    fn rx_enable(&mut self);

    /// Start listening.
    fn rx_now(&mut self);

    /// Prepare the transmit path.
    fn tx_enable(&mut self);

    /// Start transmitting the loaded packet.
    fn tx_now(&mut self);

    /// Load a packet into the transmit buffer.
    fn load_packet(&mut self, bytes: &[u8]);

    /// Copy the last received frame into `buffer` and return its metadata.
    fn read_received_frame(&mut self, buffer: &mut [u8]) -> FrameInfo;
}
