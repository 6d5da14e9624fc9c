//! Diagnostic traces over UART.
//!
//! The calibration protocol is observed from the host through short text
//! lines. Each line is formatted into a fresh, zeroed buffer before it is
//! handed to the driver, so a short message can never carry bytes left over
//! from a longer one.
//!
//! Line formats:
//! - `RX 17 23.15.10` - the code now being tried for a channel and mode.
//! - `RX 17 *` - the channel and mode finished calibration.
//! - `~17 23.15.09` - a feedback correction to an RX code.
//! - `+17 23 15 10` - peer side, a code received from the mote (`-` on a
//!   failed CRC).
//! - `Channel 17` - peer side, the channel now being worked on.

use core::fmt::Write;

use heapless::String;

use crate::channel::{Channel, ChannelMode};
use crate::tuning::TuningCode;

/// Longest trace line, bytes.
const UART_MAX_LENGTH: usize = 64;

/// A transmit-only byte UART.
pub trait Uart {
    /// Queue bytes for transmission.
    fn tx_send(&mut self, bytes: &[u8]);
}

fn mode_letter(mode: ChannelMode) -> char {
    match mode {
        ChannelMode::Tx => 'T',
        ChannelMode::Rx => 'R',
    }
}

fn send(uart: &mut impl Uart, line: String<UART_MAX_LENGTH>) {
    uart.tx_send(line.as_bytes());
}

/// Trace the code now being tried for a channel and mode.
pub(crate) fn trace_tuning_code(
    uart: &mut impl Uart,
    channel: Channel,
    mode: ChannelMode,
    code: TuningCode,
) {
    let mut line = String::new();
    if write!(line, "{}X {} {}\n", mode_letter(mode), channel, code).is_ok() {
        send(uart, line);
    }
}

/// Trace that a channel and mode finished calibration.
pub(crate) fn trace_calibrated(uart: &mut impl Uart, channel: Channel, mode: ChannelMode) {
    let mut line = String::new();
    if write!(line, "{}X {} *\n", mode_letter(mode), channel).is_ok() {
        send(uart, line);
    }
}

/// Trace a feedback correction to an RX code.
pub(crate) fn trace_feedback(uart: &mut impl Uart, channel: Channel, code: TuningCode) {
    let mut line = String::new();
    if write!(line, "~{} {}\n", channel, code).is_ok() {
        send(uart, line);
    }
}

/// Trace a code received from the mote, with the CRC verdict.
pub(crate) fn trace_received_code(
    uart: &mut impl Uart,
    crc_ok: bool,
    channel: Channel,
    code: TuningCode,
) {
    let mut line = String::new();
    let marker = if crc_ok { '+' } else { '-' };
    if write!(
        line,
        "{}{} {:02} {:02} {:02}\n",
        marker, channel, code.coarse, code.mid, code.fine
    )
    .is_ok()
    {
        send(uart, line);
    }
}

/// Trace the channel the peer is now working on.
pub(crate) fn trace_channel(uart: &mut impl Uart, channel: Channel) {
    let mut line = String::new();
    if write!(line, "Channel {}\n", channel).is_ok() {
        send(uart, line);
    }
}

/// Trace a free-form message.
pub(crate) fn trace_message(uart: &mut impl Uart, message: &str) {
    uart.tx_send(message.as_bytes());
}

/// Trace a received sensor report with its RSSI.
pub(crate) fn trace_sensor_report(
    uart: &mut impl Uart,
    report: &crate::wire::SensorReportRepr,
    rssi: i8,
) {
    let mut line = String::new();
    if write!(
        line,
        "{:03} {:02} {}",
        report.sequence_number, report.channel, report.tuning_code
    )
    .is_err()
    {
        return;
    }
    for output in report.outputs.iter() {
        if write!(line, " {:04}", output).is_err() {
            return;
        }
    }
    if write!(line, " {}\n", rssi).is_ok() {
        send(uart, line);
    }
}
