//! The mote-side tuning subsystem.
//!
//! One [`TuningSubsystem`] exists per mote, owned by the board bootstrap. It
//! binds the calibration engine, the tuning-code registry and the feedback
//! controller to the radio, timer and UART drivers.
//!
//! The execution model is a flag-polled foreground loop: interrupt handlers
//! call the `isr_*` methods, which do word-sized bookkeeping, snapshot the
//! received frame and set bits in the shared [`EventFlags`]; the foreground
//! loop calls [`TuningSubsystem::poll`] until it returns `false` and then
//! sleeps until the next interrupt. The bootstrap must keep the `isr_*`
//! methods and `poll` mutually exclusive (on a single core, interrupt
//! preemption of the foreground loop provides exactly that, as the handlers
//! run to completion).

use super::engine::{CalState, ChannelCal, INITIAL_CHANNEL};
use super::MID_CODE_ROLLOVER_THRESHOLD;
use crate::channel::{Channel, ChannelMode, ChannelRegistry};
use crate::config;
use crate::feedback::TuningFeedback;
use crate::phy::uart::{trace_calibrated, trace_feedback, trace_tuning_code};
use crate::phy::{FrameBuffer, FrameInfo, Mac, Radio, Timer, Uart};
use crate::sync::{EventFlags, Events};
use crate::time::Instant;
use crate::tuning::sweep::{InvalidSweepConfig, SweepConfig};
use crate::tuning::TuningCode;

/// Interrupt counters, for debugging over a probe.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Clone, Copy)]
pub struct EventStats {
    /// Start-of-frame interrupts seen.
    pub num_start_frames: u32,
    /// End-of-frame interrupts seen.
    pub num_end_frames: u32,
    /// Timer compare interrupts seen.
    pub num_timers: u32,
}

/// The per-mote tuning subsystem: calibration engine, code registry and
/// feedback controller behind one facade.
pub struct TuningSubsystem<'f, R: Radio, T: Timer, U: Uart> {
    radio: R,
    timer: T,
    uart: U,
    flags: &'f EventFlags,
    registry: ChannelRegistry,
    cal: ChannelCal,
    feedback: TuningFeedback,
    rx_frame: FrameBuffer,
    rx_info: FrameInfo,
    stats: EventStats,
}

impl<'f, R, T, U> TuningSubsystem<'f, R, T, U>
where
    R: Radio,
    T: Timer,
    U: Uart,
{
    /// Create the subsystem around the board's drivers and the flag word
    /// shared with the interrupt handlers.
    pub fn new(radio: R, timer: T, uart: U, flags: &'f EventFlags) -> Self {
        Self {
            radio,
            timer,
            uart,
            flags,
            registry: ChannelRegistry::new(),
            cal: ChannelCal::new(),
            feedback: TuningFeedback::new(),
            rx_frame: FrameBuffer::default(),
            rx_info: FrameInfo::default(),
            stats: EventStats::default(),
        }
    }

    /// Start calibrating with the board's default initial sweep.
    pub fn start_calibration(&mut self) -> Result<(), InvalidSweepConfig> {
        self.start_calibration_with(ChannelCal::default_initial_sweep())
    }

    /// Start calibrating with a caller-provided initial sweep.
    pub fn start_calibration_with(&mut self, sweep: SweepConfig) -> Result<(), InvalidSweepConfig> {
        self.cal.init_initial_rx_sweep(sweep)?;
        self.radio.rf_on();
        Ok(())
    }

    /// Start-of-frame interrupt. Call from the radio ISR.
    pub fn isr_start_frame(&mut self, _timestamp: Instant) {
        self.stats.num_start_frames = self.stats.num_start_frames.wrapping_add(1);
        self.flags.set(Events::START_FRAME);
    }

    /// End-of-frame interrupt. Call from the radio ISR.
    ///
    /// During a listen window the frame is copied out of the radio here, so
    /// the driver can reuse its hardware buffer immediately. Frames with a
    /// failed CRC are dropped; the running window timer keeps the sweep
    /// moving.
    pub fn isr_end_frame(&mut self, _timestamp: Instant) {
        self.stats.num_end_frames = self.stats.num_end_frames.wrapping_add(1);
        self.flags.set(Events::END_FRAME);

        if self.cal.state() == CalState::InitialRxIdle {
            let info = self.radio.read_received_frame(&mut self.rx_frame.buffer);
            if info.crc_ok && info.length > 0 {
                self.rx_frame.dirty = true;
                self.rx_info = info;
                self.cal.initial_frame_received();
            }
        }
    }

    /// Timer compare interrupt. Call from the timer ISR.
    pub fn isr_timer(&mut self) {
        self.stats.num_timers = self.stats.num_timers.wrapping_add(1);
        self.flags.set(Events::TIMER);
    }

    /// Dispatch pending events and state-machine work. Returns whether any
    /// work was done; the foreground loop sleeps when it returns `false`.
    pub fn poll(&mut self) -> bool {
        let events = self.flags.fetch_clear();
        let mut handled = !events.is_empty();

        if events.contains(Events::TIMER) {
            self.listen_window_expired();
        }

        match self.cal.state() {
            CalState::InitialRx => {
                self.open_listen_window();
                handled = true;
            }
            CalState::InitialRxReceived => {
                self.record_initial_discovery();
                handled = true;
            }
            _ => {}
        }

        handled
    }

    /// Tune to the engine's current code and listen, with the window timer
    /// armed.
    fn open_listen_window(&mut self) {
        let code = self.cal.begin_initial_window();
        self.retune(code);
        self.arm_listen_window(code);
    }

    fn retune(&mut self, code: TuningCode) {
        self.radio.rf_off();
        self.radio.tune(code);
        self.radio.rx_enable();
        self.radio.rx_now();
    }

    fn arm_listen_window(&mut self, code: TuningCode) {
        // Close to a coarse rollover the next code jumps across the overlap,
        // so give the peer more time before moving on.
        let timeout = if code.mid >= MID_CODE_ROLLOVER_THRESHOLD {
            config::CAL_RX_LONG_TIMEOUT
        } else {
            config::CAL_RX_TIMEOUT
        };
        let now = self.timer.read_counter();
        self.timer.set_compare(now + timeout);
        self.timer.enable();
    }

    /// The listen window expired without a usable frame: move to the next
    /// code and reopen.
    fn listen_window_expired(&mut self) {
        let Some(code) = self.cal.initial_timeout() else {
            return;
        };
        trace_tuning_code(&mut self.uart, INITIAL_CHANNEL, ChannelMode::Rx, code);
        self.retune(code);
        self.arm_listen_window(code);
    }

    /// A frame was captured during a listen window: the current code is the
    /// discovery. Latch it and extrapolate to the remaining channels.
    fn record_initial_discovery(&mut self) {
        self.timer.disable();
        self.rx_frame.dirty = false;
        self.cal.finish_initial_rx_sweep(&mut self.registry);
        trace_calibrated(&mut self.uart, INITIAL_CHANNEL, ChannelMode::Rx);
        self.feedback.reset_channel(INITIAL_CHANNEL);

        if self.cal.init_remaining_sweeps(&mut self.registry).is_err() {
            // The discovery extrapolated outside the code space; calibration
            // cannot continue with this data.
            error!("remaining sweeps could not be seeded");
            self.cal.poison();
        }
    }

    /// The MAC received a frame on `channel` (an enhanced beacon or an
    /// acknowledged exchange).
    pub fn rx_success(&mut self, channel: Channel) {
        if self.cal.rx_success(channel, &mut self.registry) {
            trace_calibrated(&mut self.uart, channel, ChannelMode::Rx);
            self.feedback.reset_channel(channel);
        }
    }

    /// The MAC missed an expected frame on `channel`.
    pub fn rx_failure(&mut self, channel: Channel) {
        if let Some(code) = self.cal.rx_failure(channel, &mut self.registry) {
            trace_tuning_code(&mut self.uart, channel, ChannelMode::Rx, code);
        }
    }

    /// The MAC got an acknowledgment for a transmission on `channel`.
    pub fn tx_success(&mut self, channel: Channel) {
        if self.cal.tx_success(channel, &mut self.registry) {
            trace_calibrated(&mut self.uart, channel, ChannelMode::Tx);
        }
    }

    /// A transmission on `channel` went unacknowledged.
    pub fn tx_failure(&mut self, channel: Channel) {
        if let Some(code) = self.cal.tx_failure(channel, &mut self.registry) {
            trace_tuning_code(&mut self.uart, channel, ChannelMode::Tx, code);
        }
    }

    /// Feed the IF estimate of a received frame into the feedback loop.
    /// Ignored until the channel's RX code is calibrated.
    pub fn frame_received(&mut self, channel: Channel, if_estimate: u32) {
        if !self.cal.rx_calibrated(channel) {
            return;
        }
        if let Some(code) = self
            .feedback
            .adjust_rx(channel, if_estimate, &mut self.registry)
        {
            trace_feedback(&mut self.uart, channel, code);
        }
    }

    /// Restart calibration when the MAC lost synchronization after the mote
    /// was fully calibrated, which means the codes have drifted beyond what
    /// feedback can absorb.
    pub fn maintain(&mut self, mac: &impl Mac) -> Result<(), InvalidSweepConfig> {
        if self.cal.state() == CalState::Feedback && !mac.is_synched() {
            info!("mac lost sync, restarting calibration");
            return self.start_calibration();
        }
        Ok(())
    }

    /// The authoritative tuning code for a channel and direction.
    pub fn tuning_code(&self, channel: Channel, mode: ChannelMode) -> TuningCode {
        self.registry.get_tuning_code(channel, mode)
    }

    /// The calibration engine state.
    pub fn state(&self) -> CalState {
        self.cal.state()
    }

    /// Calibration progress queries, forwarded from the engine.
    pub fn calibration(&self) -> &ChannelCal {
        &self.cal
    }

    /// The tuning-code registry.
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Metadata of the last captured frame.
    pub fn last_frame_info(&self) -> FrameInfo {
        self.rx_info
    }

    /// Interrupt counters.
    pub fn stats(&self) -> EventStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::boxed::Box;
    use crate::phy::mac::tests::TestMac;
    use crate::phy::radio::tests::{TestRadio, TestRadioEvent};
    use crate::phy::timer::tests::TestTimer;
    use crate::phy::uart::tests::TestUart;
    use crate::tuning::sweep::SweepRange;

    fn sweep(coarse: (u8, u8), mid: (u8, u8), fine: (u8, u8)) -> SweepConfig {
        SweepConfig::new(
            SweepRange::new(coarse.0, coarse.1),
            SweepRange::new(mid.0, mid.1),
            SweepRange::new(fine.0, fine.1),
        )
    }

    struct Harness {
        radio: TestRadio,
        timer: TestTimer,
        uart: TestUart,
        flags: &'static EventFlags,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                radio: TestRadio::default(),
                timer: TestTimer::default(),
                uart: TestUart::default(),
                // Tests leak one word each; the ISR contract wants 'static.
                flags: Box::leak(Box::new(EventFlags::new())),
            }
        }

        fn subsystem(&self) -> TuningSubsystem<'static, TestRadio, TestTimer, TestUart> {
            TuningSubsystem::new(
                self.radio.clone(),
                self.timer.clone(),
                self.uart.clone(),
                self.flags,
            )
        }
    }

    /// Let the armed window expire and deliver the timer interrupt.
    fn expire_window(
        harness: &mut Harness,
        subsystem: &mut TuningSubsystem<'static, TestRadio, TestTimer, TestUart>,
    ) {
        let remaining = harness.timer.armed_for().expect("window timer not armed");
        assert!(harness.timer.advance(remaining));
        subsystem.isr_timer();
        assert!(subsystem.poll());
    }

    #[test]
    fn initial_sweep_tunes_and_arms_the_window() {
        let harness = Harness::new();
        let mut subsystem = harness.subsystem();

        subsystem
            .start_calibration_with(sweep((22, 22), (15, 15), (0, 31)))
            .unwrap();
        harness.radio.inner(|inner| {
            inner.assert_nxt.extend([
                TestRadioEvent::RfOff,
                TestRadioEvent::Tune(TuningCode::new_unchecked(22, 15, 0)),
                TestRadioEvent::RxEnable,
                TestRadioEvent::RxNow,
            ]);
        });
        assert!(subsystem.poll());
        harness.radio.assert_consumed();
        assert_eq!(subsystem.state(), CalState::InitialRxIdle);
        assert_eq!(harness.timer.armed_for(), Some(config::CAL_RX_TIMEOUT));
    }

    #[test]
    fn each_timeout_advances_and_retunes() {
        let mut harness = Harness::new();
        let mut subsystem = harness.subsystem();
        subsystem
            .start_calibration_with(sweep((22, 22), (15, 15), (0, 31)))
            .unwrap();
        subsystem.poll();

        for fine in 1..=3u8 {
            harness.radio.inner(|inner| {
                inner.assert_nxt.extend([
                    TestRadioEvent::RfOff,
                    TestRadioEvent::Tune(TuningCode::new_unchecked(22, 15, fine)),
                    TestRadioEvent::RxEnable,
                    TestRadioEvent::RxNow,
                ]);
            });
            expire_window(&mut harness, &mut subsystem);
            harness.radio.assert_consumed();
        }
        assert_eq!(
            harness.uart.take_text(),
            "RX 17 22.15.01\nRX 17 22.15.02\nRX 17 22.15.03\n"
        );
    }

    #[test]
    fn a_valid_frame_finishes_the_sweep() {
        let mut harness = Harness::new();
        let mut subsystem = harness.subsystem();
        subsystem
            .start_calibration_with(sweep((22, 22), (15, 15), (0, 31)))
            .unwrap();
        subsystem.poll();
        for _ in 0..3 {
            expire_window(&mut harness, &mut subsystem);
        }
        harness.uart.take_text();

        harness.radio.receive_frame(&[0u8; 12], true);
        subsystem.isr_end_frame(harness.timer.read_counter());
        assert_eq!(subsystem.state(), CalState::InitialRxReceived);
        assert!(subsystem.poll());

        assert_eq!(subsystem.state(), CalState::RemainingRx);
        assert_eq!(
            subsystem.tuning_code(INITIAL_CHANNEL, ChannelMode::Rx),
            TuningCode::new_unchecked(22, 15, 3)
        );
        assert!(subsystem.calibration().rx_calibrated(INITIAL_CHANNEL));
        // The window timer is cancelled.
        assert_eq!(harness.timer.armed_for(), None);
        assert_eq!(harness.uart.take_text(), "RX 17 *\n");
    }

    #[test]
    fn a_corrupt_frame_does_not_stop_the_sweep() {
        let mut harness = Harness::new();
        let mut subsystem = harness.subsystem();
        subsystem
            .start_calibration_with(sweep((22, 22), (15, 15), (0, 31)))
            .unwrap();
        subsystem.poll();

        harness.radio.receive_frame(&[0u8; 12], false);
        subsystem.isr_end_frame(harness.timer.read_counter());
        assert_eq!(subsystem.state(), CalState::InitialRxIdle);
        // The window expires as if nothing was heard.
        expire_window(&mut harness, &mut subsystem);
        assert_eq!(
            subsystem.calibration().tuning_code(INITIAL_CHANNEL, ChannelMode::Rx),
            TuningCode::new_unchecked(22, 15, 1)
        );
    }

    #[test]
    fn windows_near_a_coarse_rollover_are_long() {
        let harness = Harness::new();
        let mut subsystem = harness.subsystem();
        // Pinned mid code at the rollover threshold.
        subsystem
            .start_calibration_with(sweep((22, 22), (24, 24), (0, 31)))
            .unwrap();
        subsystem.poll();
        assert_eq!(harness.timer.armed_for(), Some(config::CAL_RX_LONG_TIMEOUT));
    }

    #[test]
    fn feedback_is_gated_on_calibration() {
        let mut harness = Harness::new();
        let mut subsystem = harness.subsystem();
        subsystem
            .start_calibration_with(sweep((22, 22), (15, 15), (0, 31)))
            .unwrap();
        subsystem.poll();

        let channel = Channel::new(18).unwrap();
        // Not calibrated: estimates are dropped on the floor.
        for _ in 0..10 {
            subsystem.frame_received(channel, 600);
        }
        assert_eq!(harness.uart.take_text(), "");

        // Finish the sweep, confirm channel 18, then feedback applies.
        harness.radio.receive_frame(&[0u8; 12], true);
        subsystem.isr_end_frame(harness.timer.read_counter());
        subsystem.poll();
        subsystem.rx_success(channel);
        harness.uart.take_text();

        let before = subsystem.tuning_code(channel, ChannelMode::Rx);
        for _ in 0..3 {
            subsystem.frame_received(channel, 600);
        }
        let after = subsystem.tuning_code(channel, ChannelMode::Rx);
        assert_eq!(after, before.decrement_fine(1).unwrap());
        assert_eq!(
            harness.uart.take_text(),
            format!("~18 {}\n", after)
        );
    }

    #[test]
    fn mac_desync_restarts_calibration() {
        let mut harness = Harness::new();
        let mut subsystem = harness.subsystem();
        subsystem
            .start_calibration_with(sweep((22, 22), (15, 15), (0, 31)))
            .unwrap();
        subsystem.poll();
        harness.radio.receive_frame(&[0u8; 12], true);
        subsystem.isr_end_frame(harness.timer.read_counter());
        subsystem.poll();

        // Confirm everything to reach the feedback state.
        for index in 0..crate::channel::NUM_CHANNELS {
            let channel = Channel::from_index(index).unwrap();
            subsystem.rx_success(channel);
            subsystem.tx_success(channel);
        }
        assert_eq!(subsystem.state(), CalState::Feedback);

        let mut mac = TestMac::default();
        mac.synched = true;
        subsystem.maintain(&mac).unwrap();
        assert_eq!(subsystem.state(), CalState::Feedback);

        mac.synched = false;
        subsystem.maintain(&mac).unwrap();
        assert_eq!(subsystem.state(), CalState::InitialRx);
    }

    #[test]
    fn isr_counters_accumulate() {
        let harness = Harness::new();
        let mut subsystem = harness.subsystem();
        subsystem.isr_start_frame(harness.timer.read_counter());
        subsystem.isr_end_frame(harness.timer.read_counter());
        subsystem.isr_end_frame(harness.timer.read_counter());
        subsystem.isr_timer();
        let stats = subsystem.stats();
        assert_eq!(stats.num_start_frames, 1);
        assert_eq!(stats.num_end_frames, 2);
        assert_eq!(stats.num_timers, 1);
        // Undispatched events are pending in the shared word.
        assert_eq!(
            harness.flags.peek(),
            Events::START_FRAME | Events::END_FRAME | Events::TIMER
        );
        let _ = subsystem.poll();
        assert!(harness.flags.peek().is_empty());
    }

    #[test]
    fn poll_reports_idle_when_nothing_is_pending() {
        let harness = Harness::new();
        let mut subsystem = harness.subsystem();
        assert!(!subsystem.poll());
    }
}
