//! The peer-side calibration coordinator.
//!
//! The coordinator runs on a frequency-stable peer and walks the mote
//! through calibration in two steps:
//!
//! 1. On each channel of the configured range it listens for the mote's
//!    calibration reports and records the tuning codes they carry. When the
//!    inter-packet timeout expires, the recorded fine codes are averaged per
//!    `(coarse, mid)` pair and the coordinator moves to the next channel.
//! 2. It then transmits the averaged codes back, channel by channel, waiting
//!    after each transmission for an acknowledgment from the mote. An
//!    acknowledgment carrying the change-channel command advances the
//!    channel; after the last channel the coordinator switches to a
//!    telemetry mode and prints sensor reports over UART.
//!
//! Like the mote subsystem, the coordinator is a flag-polled foreground loop
//! around `isr_*` handlers and [`Coordinator::poll`].

use heapless::Vec;

use super::MID_CODE_ROLLOVER_THRESHOLD;
use crate::channel::{Channel, ChannelMode, NUM_CHANNELS};
use crate::config;
use crate::phy::uart::{
    trace_channel, trace_message, trace_received_code, trace_sensor_report,
};
use crate::phy::{FrameBuffer, FrameInfo, Radio, Timer, Uart};
use crate::sync::{EventFlags, Events};
use crate::time::Instant;
use crate::tuning::TuningCode;
use crate::wire::{
    CalibrationReport, CalibrationReportRepr, CodeAssignment, CodeAssignmentRepr, Command,
    SensorReport, SensorReportRepr, MAX_ASSIGNED_CODES,
};

/// Maximum number of recorded codes per channel. Overflow drops the oldest
/// recording.
pub const MAX_RECORDED_CODES: usize = 128;

const _: () = assert!(config::COORD_CHANNEL_START <= config::COORD_CHANNEL_END);

const CHANNEL_START: Channel = match Channel::new(config::COORD_CHANNEL_START) {
    Some(channel) => channel,
    None => panic!("COORD_CHANNEL_START out of range"),
};

const CHANNEL_END: Channel = match Channel::new(config::COORD_CHANNEL_END) {
    Some(channel) => channel,
    None => panic!("COORD_CHANNEL_END out of range"),
};

const TELEMETRY_CHANNEL: Channel = match Channel::new(config::COORD_TELEMETRY_CHANNEL) {
    Some(channel) => channel,
    None => panic!("COORD_TELEMETRY_CHANNEL out of range"),
};

/// Coordinator progress.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Poison value; never entered during normal operation.
    Invalid,
    /// About to listen for calibration reports on the current channel.
    Rx,
    /// Listening for calibration reports.
    RxIdle,
    /// A calibration report is waiting to be recorded.
    RxReceived,
    /// About to transmit an assignment packet.
    Tx,
    /// About to listen for an acknowledgment.
    RxAck,
    /// Listening for an acknowledgment.
    RxAckIdle,
    /// An acknowledgment is waiting to be handled.
    RxAckReceived,
    /// About to listen for telemetry.
    TelemetryRx,
    /// Listening for telemetry.
    TelemetryRxIdle,
    /// A sensor report is waiting to be printed.
    TelemetryRxReceived,
}

/// The channel range the coordinator covers and the channel it listens on
/// afterwards.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// First channel of the calibrated range.
    pub channel_start: Channel,
    /// Last channel of the calibrated range (inclusive).
    pub channel_end: Channel,
    /// Channel of the post-calibration telemetry mode.
    pub telemetry_channel: Channel,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            channel_start: CHANNEL_START,
            channel_end: CHANNEL_END,
            telemetry_channel: TELEMETRY_CHANNEL,
        }
    }
}

/// The base-station side of the calibration protocol.
pub struct Coordinator<'f, R: Radio, T: Timer, U: Uart> {
    radio: R,
    timer: T,
    uart: U,
    flags: &'f EventFlags,
    config: CoordinatorConfig,
    state: CoordinatorState,
    channel: Channel,
    recorded: Vec<TuningCode, MAX_RECORDED_CODES>,
    assigned: [Vec<TuningCode, MAX_ASSIGNED_CODES>; NUM_CHANNELS],
    sequence_number: u8,
    rx_frame: FrameBuffer,
    rx_info: FrameInfo,
    tx_frame: FrameBuffer,
}

impl<'f, R, T, U> Coordinator<'f, R, T, U>
where
    R: Radio,
    T: Timer,
    U: Uart,
{
    /// Create a coordinator around the board's drivers.
    pub fn new(radio: R, timer: T, uart: U, flags: &'f EventFlags, config: CoordinatorConfig) -> Self {
        Self {
            radio,
            timer,
            uart,
            flags,
            config,
            state: CoordinatorState::Invalid,
            channel: config.channel_start,
            recorded: Vec::new(),
            assigned: Default::default(),
            sequence_number: 0,
            rx_frame: FrameBuffer::default(),
            rx_info: FrameInfo::default(),
            tx_frame: FrameBuffer::default(),
        }
    }

    /// Begin step 1: listen for calibration reports on the first channel.
    pub fn start_calibration(&mut self) {
        self.radio.rf_on();
        self.channel = self.config.channel_start;
        self.recorded.clear();
        for codes in self.assigned.iter_mut() {
            codes.clear();
        }
        self.state = CoordinatorState::Rx;
    }

    /// Skip straight to the telemetry mode.
    pub fn start_telemetry(&mut self) {
        self.radio.rf_on();
        self.state = CoordinatorState::TelemetryRx;
    }

    /// Current state.
    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// The channel currently being worked on.
    pub fn current_channel(&self) -> Channel {
        self.channel
    }

    /// The averaged codes collected for `channel` during step 1.
    pub fn assigned_codes(&self, channel: Channel) -> &[TuningCode] {
        &self.assigned[channel.index()]
    }

    /// Start-of-frame interrupt. Call from the radio ISR.
    pub fn isr_start_frame(&mut self, _timestamp: Instant) {
        self.flags.set(Events::START_FRAME);
    }

    /// End-of-frame interrupt. Call from the radio ISR.
    pub fn isr_end_frame(&mut self, _timestamp: Instant) {
        self.flags.set(Events::END_FRAME);

        if self.state == CoordinatorState::Tx {
            // Our own transmission completed.
            self.state = CoordinatorState::RxAck;
            return;
        }

        let (minimum_length, received) = match self.state {
            CoordinatorState::RxIdle => (
                CalibrationReport::<&[u8]>::LENGTH,
                CoordinatorState::RxReceived,
            ),
            CoordinatorState::RxAckIdle => (
                CalibrationReport::<&[u8]>::LENGTH,
                CoordinatorState::RxAckReceived,
            ),
            CoordinatorState::TelemetryRxIdle => (
                SensorReport::<&[u8]>::LENGTH,
                CoordinatorState::TelemetryRxReceived,
            ),
            _ => return,
        };

        let info = self.radio.read_received_frame(&mut self.rx_frame.buffer);
        if info.crc_ok && info.length as usize >= minimum_length {
            self.rx_frame.dirty = true;
            self.rx_info = info;
            self.state = received;
        }
    }

    /// Timer compare interrupt. Call from the timer ISR.
    pub fn isr_timer(&mut self) {
        self.flags.set(Events::TIMER);
    }

    /// Dispatch pending events and state-machine work. Returns whether any
    /// work was done.
    pub fn poll(&mut self) -> bool {
        let events = self.flags.fetch_clear();
        let mut handled = !events.is_empty();

        if events.contains(Events::TIMER) {
            self.window_expired();
        }

        match self.state {
            CoordinatorState::Rx => {
                self.open_report_window();
                handled = true;
            }
            CoordinatorState::RxReceived => {
                self.record_report();
                handled = true;
            }
            CoordinatorState::Tx => {
                self.transmit_assignment();
                handled = true;
            }
            CoordinatorState::RxAck => {
                self.open_ack_window();
                handled = true;
            }
            CoordinatorState::RxAckReceived => {
                self.handle_ack();
                handled = true;
            }
            CoordinatorState::TelemetryRx => {
                self.open_telemetry_window();
                handled = true;
            }
            CoordinatorState::TelemetryRxReceived => {
                self.print_sensor_report();
                handled = true;
            }
            _ => {}
        }

        handled
    }

    fn arm_window(&mut self, timeout: crate::time::Duration) {
        let now = self.timer.read_counter();
        self.timer.set_compare(now + timeout);
        self.timer.enable();
    }

    fn window_expired(&mut self) {
        match self.state {
            CoordinatorState::RxIdle => {
                // No more reports on this channel: condense what was heard
                // and move on.
                self.assigned[self.channel.index()] = average_recorded(&self.recorded);
                if self.channel == self.config.channel_end {
                    // Step 1 is done; start assigning from the first channel.
                    self.channel = self.config.channel_start;
                    self.state = CoordinatorState::Tx;
                } else if let Some(next) = self.channel.next() {
                    self.channel = next;
                    self.recorded.clear();
                    self.state = CoordinatorState::Rx;
                }
            }
            CoordinatorState::RxAckIdle => {
                // No acknowledgment: transmit again.
                self.state = CoordinatorState::Tx;
            }
            _ => {}
        }
    }

    /// Listen for calibration reports on the current channel. The first
    /// packet of a channel gets the long window.
    fn open_report_window(&mut self) {
        trace_channel(&mut self.uart, self.channel);
        self.radio.set_frequency(self.channel, ChannelMode::Rx);
        self.radio.rx_enable();
        self.radio.rx_now();
        self.arm_window(config::CAL_RX_LONG_TIMEOUT);
        self.state = CoordinatorState::RxIdle;
    }

    /// Record the code carried by a received calibration report and rearm
    /// the inter-packet window.
    fn record_report(&mut self) {
        self.rx_frame.dirty = false;
        let Ok(reader) = CalibrationReport::new(&self.rx_frame.buffer[..]) else {
            self.state = CoordinatorState::RxIdle;
            return;
        };
        let report = CalibrationReportRepr::parse(&reader);

        // A mid code near the top of the range means the mote's sweep is
        // about to cross a coarse boundary, where packets pause for longer.
        if report.tuning_code.mid >= MID_CODE_ROLLOVER_THRESHOLD {
            self.arm_window(config::CAL_RX_LONG_TIMEOUT);
        } else {
            self.arm_window(config::CAL_RX_TIMEOUT);
        }

        if report.tuning_code != TuningCode::default() {
            if self.recorded.is_full() {
                self.recorded.remove(0);
            }
            // Cannot fail: a slot was just freed.
            self.recorded.push(report.tuning_code).ok();
        }
        trace_received_code(
            &mut self.uart,
            self.rx_info.crc_ok,
            self.channel,
            report.tuning_code,
        );

        self.state = CoordinatorState::RxIdle;
    }

    /// Transmit the averaged codes for the current channel.
    fn transmit_assignment(&mut self) {
        let repr = CodeAssignmentRepr {
            sequence_number: self.sequence_number,
            channel: self.channel.into(),
            tuning_codes: self.assigned[self.channel.index()].clone(),
        };
        self.sequence_number = self.sequence_number.wrapping_add(1);

        let length = repr.buffer_len();
        let mut writer = CodeAssignment::new_unchecked(&mut self.tx_frame.buffer[..]);
        repr.emit(&mut writer);

        self.radio.set_frequency(self.channel, ChannelMode::Tx);
        self.radio.load_packet(&self.tx_frame.buffer[..length]);
        self.radio.tx_enable();
        self.radio.tx_now();

        self.arm_window(config::CAL_TX_TIMEOUT);
        self.state = CoordinatorState::RxAck;
    }

    /// Listen for the mote's acknowledgment on the current channel.
    fn open_ack_window(&mut self) {
        self.radio.set_frequency(self.channel, ChannelMode::Rx);
        self.radio.rx_enable();
        self.radio.rx_now();
        self.state = CoordinatorState::RxAckIdle;
    }

    /// Handle a received acknowledgment: a matching change-channel command
    /// advances the channel, anything else resumes listening.
    fn handle_ack(&mut self) {
        self.rx_frame.dirty = false;
        let Ok(reader) = CalibrationReport::new(&self.rx_frame.buffer[..]) else {
            self.state = CoordinatorState::RxAckIdle;
            return;
        };
        let ack = CalibrationReportRepr::parse(&reader);

        if ack.channel == u8::from(self.channel) && ack.command == Command::ChangeChannel {
            if self.channel == self.config.channel_end {
                trace_message(&mut self.uart, "Channel calibration done.\n");
                self.state = CoordinatorState::TelemetryRx;
            } else if let Some(next) = self.channel.next() {
                self.channel = next;
                trace_channel(&mut self.uart, self.channel);
                self.state = CoordinatorState::RxAck;
            }
        } else {
            self.state = CoordinatorState::RxAckIdle;
        }
    }

    /// Switch to the telemetry channel and listen for sensor reports.
    fn open_telemetry_window(&mut self) {
        trace_message(&mut self.uart, "Starting telemetry RX.\n");
        self.channel = self.config.telemetry_channel;
        self.radio.set_frequency(self.channel, ChannelMode::Rx);
        self.radio.rx_enable();
        self.radio.rx_now();
        self.state = CoordinatorState::TelemetryRxIdle;
    }

    /// Print a received sensor report over UART.
    fn print_sensor_report(&mut self) {
        self.rx_frame.dirty = false;
        if let Ok(reader) = SensorReport::new(&self.rx_frame.buffer[..]) {
            let report = SensorReportRepr::parse(&reader);
            trace_sensor_report(&mut self.uart, &report, self.rx_info.rssi);
        }
        self.state = CoordinatorState::TelemetryRxIdle;
    }
}

/// Average the recorded codes: each maximal run of identical `(coarse, mid)`
/// pairs becomes one code whose fine code is the mean of the run's first and
/// last fine codes. At most [`MAX_ASSIGNED_CODES`] codes are produced.
fn average_recorded(recorded: &[TuningCode]) -> Vec<TuningCode, MAX_ASSIGNED_CODES> {
    let mut averaged = Vec::new();
    let mut index = 0;
    while index < recorded.len() {
        let first = recorded[index];
        let mut last = first;
        while index + 1 < recorded.len()
            && recorded[index + 1].coarse == first.coarse
            && recorded[index + 1].mid == first.mid
        {
            index += 1;
            last = recorded[index];
        }
        let code = TuningCode {
            coarse: first.coarse,
            mid: first.mid,
            fine: (first.fine + last.fine) / 2,
        };
        if averaged.push(code).is_err() {
            break;
        }
        index += 1;
    }
    averaged
}
