//! The mote-side calibration engine.
//!
//! The engine tracks per-channel, per-direction calibration progress. It is
//! pure bookkeeping: radio, timer and UART side effects stay in
//! [`super::subsystem::TuningSubsystem`], which makes the state machine
//! directly drivable from tests.

use crate::channel::{Channel, ChannelMode, ChannelRegistry, NUM_CHANNELS};
use crate::config;
use crate::tuning::sweep::{InvalidSweepConfig, SweepConfig, SweepRange};
use crate::tuning::{TuningCode, TUNING_MAX_CODE, TUNING_MIN_CODE};

/// The channel the initial RX sweep listens on. Validated at compile time.
pub const INITIAL_CHANNEL: Channel = match Channel::new(config::CAL_INITIAL_CHANNEL) {
    Some(channel) => channel,
    None => panic!("CAL_INITIAL_CHANNEL out of range"),
};

/// Fine codes left unused at the top of a sweep window: receiving with a
/// short guard time shifts the working RX code up by a few fine codes.
const SWEEP_FINE_MARGIN: u8 = 7;

/// Calibration progress, tracking the discovery of the RX tuning codes.
/// Each channel's TX code is confirmed independently once its RX code is
/// known.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalState {
    /// Poison value; entered only if calibration data became inconsistent.
    Invalid,
    /// Not started.
    Init,
    /// The initial RX sweep is set up but no listen window is open.
    InitialRx,
    /// Listening for a frame on the current tuning code.
    InitialRxIdle,
    /// A frame with a valid CRC arrived; the main loop has yet to record it.
    InitialRxReceived,
    /// The initial RX sweep found a code.
    RxDone,
    /// Confirming the extrapolated RX codes of the remaining channels.
    RemainingRx,
    /// All RX codes confirmed; confirming TX codes.
    TxCal,
    /// Fully calibrated; the feedback controller owns the RX codes.
    Feedback,
}

#[derive(Debug, Default, Clone, Copy)]
struct ChannelModeInfo {
    calibrated: bool,
    tuning_code: TuningCode,
    sweep_config: SweepConfig,
    num_failures: u8,
}

#[derive(Debug, Default, Clone, Copy)]
struct ChannelInfo {
    rx: ChannelModeInfo,
    tx: ChannelModeInfo,
}

/// The calibration engine state.
#[derive(Debug, Clone)]
pub struct ChannelCal {
    infos: [ChannelInfo; NUM_CHANNELS],
    state: CalState,
    num_rx_calibrated: u8,
    num_tx_calibrated: u8,
    num_tx_failures: u16,
}

impl Default for ChannelCal {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelCal {
    /// Create an engine that has not started calibrating.
    pub fn new() -> Self {
        Self {
            infos: [ChannelInfo::default(); NUM_CHANNELS],
            state: CalState::Init,
            num_rx_calibrated: 0,
            num_tx_calibrated: 0,
            num_tx_failures: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> CalState {
        self.state
    }

    /// The sweep of the initial RX phase as configured for this board: the
    /// characterized coarse range, the pinned mid code, and the fine range
    /// less its guard margin.
    pub fn default_initial_sweep() -> SweepConfig {
        SweepConfig::new(
            SweepRange::new(config::CAL_SWEEP_COARSE_START, config::CAL_SWEEP_COARSE_END),
            SweepRange::single(config::CAL_SWEEP_MID_CODE),
            SweepRange::new(TUNING_MIN_CODE, TUNING_MAX_CODE - SWEEP_FINE_MARGIN),
        )
    }

    /// Number of channels calibration is expected to cover.
    fn num_target_channels(&self) -> u8 {
        if config::CAL_ALL_CHANNELS {
            NUM_CHANNELS as u8
        } else {
            1
        }
    }

    /// Set up the initial RX sweep over `sweep`. Fails without touching any
    /// state if the configuration is invalid.
    pub fn init_initial_rx_sweep(&mut self, sweep: SweepConfig) -> Result<(), InvalidSweepConfig> {
        sweep.validate()?;

        let info = &mut self.infos[INITIAL_CHANNEL.index()].rx;
        *info = ChannelModeInfo {
            calibrated: false,
            tuning_code: sweep.first_code(),
            sweep_config: sweep,
            num_failures: 0,
        };

        self.num_rx_calibrated = 0;
        self.num_tx_calibrated = 0;
        self.num_tx_failures = 0;
        self.state = CalState::InitialRx;
        info!("initial rx sweep armed");
        Ok(())
    }

    /// Open a listen window on the current code. Returns the code to tune
    /// the radio to.
    pub fn begin_initial_window(&mut self) -> TuningCode {
        self.state = CalState::InitialRxIdle;
        self.infos[INITIAL_CHANNEL.index()].rx.tuning_code
    }

    /// The listen window expired without a frame. Returns the next code to
    /// try, or `None` once the sweep is no longer running (completion or
    /// cancellation).
    pub fn initial_timeout(&mut self) -> Option<TuningCode> {
        if self.state != CalState::InitialRxIdle {
            return None;
        }
        let info = &mut self.infos[INITIAL_CHANNEL.index()].rx;
        if info.calibrated {
            return None;
        }
        info.tuning_code = info.sweep_config.advance_fine(info.tuning_code);
        Some(info.tuning_code)
    }

    /// A CRC-valid frame arrived during a listen window. Returns whether the
    /// engine accepted it (it is dropped outside a window).
    pub fn initial_frame_received(&mut self) -> bool {
        if self.state == CalState::InitialRxIdle {
            self.state = CalState::InitialRxReceived;
            true
        } else {
            false
        }
    }

    /// Record the code the frame was received on and close the initial
    /// sweep.
    pub fn finish_initial_rx_sweep(&mut self, registry: &mut ChannelRegistry) {
        self.state = CalState::RxDone;
        self.rx_success(INITIAL_CHANNEL, registry);
        info!("initial rx sweep finished");
    }

    /// Abandon the initial sweep. The calibrated latch makes a late timer
    /// callback return without touching the code.
    pub fn cancel_initial_sweep(&mut self) {
        self.infos[INITIAL_CHANNEL.index()].rx.calibrated = true;
    }

    /// Whether the initial RX sweep has finished.
    pub fn initial_rx_calibrated(&self) -> bool {
        self.infos[INITIAL_CHANNEL.index()].rx.calibrated
    }

    /// Build the confirmation state for one channel and direction around a
    /// code estimate: the sweep is pinned to the estimate's coarse plane
    /// (after re-expressing it across a nearby coarse boundary) and covers a
    /// window of `1 + num_additional_mid_codes` mid codes on each side.
    fn init_channel_mode_info(
        estimate: TuningCode,
        num_additional_mid_codes: u8,
    ) -> Result<ChannelModeInfo, InvalidSweepConfig> {
        let threshold = 1 + num_additional_mid_codes;
        let rolled = estimate
            .rollover_mid(threshold)
            .map_err(|_| InvalidSweepConfig)?;

        let mid_start = (rolled.mid as i16 - threshold as i16).max(TUNING_MIN_CODE as i16) as u8;
        let mid_end = (rolled.mid as i16 + threshold as i16).min(TUNING_MAX_CODE as i16) as u8;
        let sweep = SweepConfig::new(
            SweepRange::single(rolled.coarse),
            SweepRange::new(mid_start, mid_end),
            SweepRange::new(TUNING_MIN_CODE, TUNING_MAX_CODE - SWEEP_FINE_MARGIN),
        );
        sweep.validate()?;

        Ok(ChannelModeInfo {
            calibrated: false,
            tuning_code: rolled,
            sweep_config: sweep,
            num_failures: 0,
        })
    }

    fn seed_channel(
        &mut self,
        channel: Channel,
        mode: ChannelMode,
        estimate: TuningCode,
        reference_coarse: u8,
        registry: &mut ChannelRegistry,
    ) -> Result<(), InvalidSweepConfig> {
        let extra = ((reference_coarse as i16 - estimate.coarse as i16).abs() >= 2) as u8;
        let info = Self::init_channel_mode_info(estimate, extra)?;
        match mode {
            ChannelMode::Rx => self.infos[channel.index()].rx = info,
            ChannelMode::Tx => self.infos[channel.index()].tx = info,
        }
        registry.set_tuning_code(channel, mode, info.tuning_code);
        Ok(())
    }

    /// Extrapolate the discovered code outward to every channel and to the
    /// transmit direction, and narrow the initial channel's own window
    /// around the discovery. Runs after [`Self::finish_initial_rx_sweep`].
    pub fn init_remaining_sweeps(
        &mut self,
        registry: &mut ChannelRegistry,
    ) -> Result<(), InvalidSweepConfig> {
        let index = INITIAL_CHANNEL.index();
        let discovered = self.infos[index].rx.tuning_code;

        // Narrow the initial channel's RX sweep around the discovery.
        self.infos[index].rx = Self::init_channel_mode_info(discovered, 0)?;
        self.infos[index].rx.calibrated = true;
        let initial_rx = self.infos[index].rx.tuning_code;
        registry.set_tuning_code(INITIAL_CHANNEL, ChannelMode::Rx, initial_rx);

        // Seed the initial channel's TX code from its RX code.
        let initial_tx = initial_rx
            .estimate_tx_from_rx()
            .map_err(|_| InvalidSweepConfig)?;
        self.infos[index].tx = Self::init_channel_mode_info(initial_tx, 0)?;
        registry.set_tuning_code(
            INITIAL_CHANNEL,
            ChannelMode::Tx,
            self.infos[index].tx.tuning_code,
        );

        if config::CAL_ALL_CHANNELS {
            // Step outward, one channel at a time, so each estimate builds
            // on its direct neighbor.
            let mut last = INITIAL_CHANNEL;
            while let Some(channel) = last.prev() {
                let rx = self.infos[last.index()].rx.tuning_code;
                let rx = rx.estimate_previous_channel().map_err(|_| InvalidSweepConfig)?;
                self.seed_channel(channel, ChannelMode::Rx, rx, initial_rx.coarse, registry)?;

                let tx = self.infos[last.index()].tx.tuning_code;
                let tx = tx.estimate_previous_channel().map_err(|_| InvalidSweepConfig)?;
                self.seed_channel(channel, ChannelMode::Tx, tx, initial_tx.coarse, registry)?;

                last = channel;
            }

            let mut last = INITIAL_CHANNEL;
            while let Some(channel) = last.next() {
                let rx = self.infos[last.index()].rx.tuning_code;
                let rx = rx.estimate_next_channel().map_err(|_| InvalidSweepConfig)?;
                self.seed_channel(channel, ChannelMode::Rx, rx, initial_rx.coarse, registry)?;

                let tx = self.infos[last.index()].tx.tuning_code;
                let tx = tx.estimate_next_channel().map_err(|_| InvalidSweepConfig)?;
                self.seed_channel(channel, ChannelMode::Tx, tx, initial_tx.coarse, registry)?;

                last = channel;
            }
        }

        self.state = if self.all_rx_calibrated() {
            CalState::TxCal
        } else {
            CalState::RemainingRx
        };
        Ok(())
    }

    fn info(&self, channel: Channel, mode: ChannelMode) -> &ChannelModeInfo {
        match mode {
            ChannelMode::Rx => &self.infos[channel.index()].rx,
            ChannelMode::Tx => &self.infos[channel.index()].tx,
        }
    }

    fn info_mut(&mut self, channel: Channel, mode: ChannelMode) -> &mut ChannelModeInfo {
        match mode {
            ChannelMode::Rx => &mut self.infos[channel.index()].rx,
            ChannelMode::Tx => &mut self.infos[channel.index()].tx,
        }
    }

    fn advance_on_failure(
        &mut self,
        channel: Channel,
        mode: ChannelMode,
        registry: &mut ChannelRegistry,
    ) -> Option<TuningCode> {
        let info = self.info_mut(channel, mode);
        if info.calibrated {
            return None;
        }
        info.num_failures += 1;
        if info.num_failures < config::CAL_MAX_NUM_FAILURES {
            return None;
        }
        info.tuning_code = info.sweep_config.advance_fine(info.tuning_code);
        info.num_failures = 0;
        let code = info.tuning_code;
        registry.set_tuning_code(channel, mode, code);
        Some(code)
    }

    /// A reception on `channel` failed (a beacon was missed). After
    /// [`crate::config::CAL_MAX_NUM_FAILURES`] consecutive misses the sweep
    /// moves to the next code, which is returned.
    pub fn rx_failure(
        &mut self,
        channel: Channel,
        registry: &mut ChannelRegistry,
    ) -> Option<TuningCode> {
        self.advance_on_failure(channel, ChannelMode::Rx, registry)
    }

    /// A reception on `channel` succeeded: the current RX code is confirmed
    /// and latched. Seeds the channel's TX code on the first success.
    /// Returns whether the channel is newly calibrated.
    pub fn rx_success(&mut self, channel: Channel, registry: &mut ChannelRegistry) -> bool {
        let index = channel.index();
        self.infos[index].rx.num_failures = 0;

        let newly = !self.infos[index].rx.calibrated;
        if newly {
            self.num_rx_calibrated += 1;

            if !self.infos[index].tx.calibrated {
                match self.infos[index]
                    .rx
                    .tuning_code
                    .estimate_tx_from_rx()
                    .map_err(|_| InvalidSweepConfig)
                    .and_then(|tx| Self::init_channel_mode_info(tx, 0))
                {
                    Ok(info) => {
                        self.infos[index].tx = info;
                        registry.set_tuning_code(channel, ChannelMode::Tx, info.tuning_code);
                    }
                    Err(_) => {
                        warn!("tx seed failed for channel {}", u8::from(channel));
                    }
                }
            }
        }
        self.infos[index].rx.calibrated = true;
        registry.set_tuning_code(channel, ChannelMode::Rx, self.infos[index].rx.tuning_code);

        if self.state == CalState::RemainingRx && self.all_rx_calibrated() {
            self.state = CalState::TxCal;
            info!("all rx channels calibrated");
        }
        newly
    }

    /// A transmission on `channel` was not acknowledged.
    pub fn tx_failure(
        &mut self,
        channel: Channel,
        registry: &mut ChannelRegistry,
    ) -> Option<TuningCode> {
        self.num_tx_failures += 1;
        self.advance_on_failure(channel, ChannelMode::Tx, registry)
    }

    /// A transmission on `channel` was acknowledged: the current TX code is
    /// confirmed and latched. Returns whether the channel is newly
    /// calibrated.
    pub fn tx_success(&mut self, channel: Channel, registry: &mut ChannelRegistry) -> bool {
        self.num_tx_failures = 0;

        let index = channel.index();
        self.infos[index].tx.num_failures = 0;
        let newly = !self.infos[index].tx.calibrated;
        if newly {
            self.num_tx_calibrated += 1;
        }
        self.infos[index].tx.calibrated = true;
        registry.set_tuning_code(channel, ChannelMode::Tx, self.infos[index].tx.tuning_code);

        if self.state == CalState::TxCal && self.all_tx_calibrated() {
            self.state = CalState::Feedback;
            info!("all tx channels calibrated");
        }
        newly
    }

    /// Whether the RX code of `channel` has been confirmed.
    pub fn rx_calibrated(&self, channel: Channel) -> bool {
        self.info(channel, ChannelMode::Rx).calibrated
    }

    /// Whether the TX code of `channel` has been confirmed.
    pub fn tx_calibrated(&self, channel: Channel) -> bool {
        self.info(channel, ChannelMode::Tx).calibrated
    }

    /// Whether every targeted channel has a confirmed RX code.
    pub fn all_rx_calibrated(&self) -> bool {
        self.num_rx_calibrated >= self.num_target_channels()
    }

    /// Whether every targeted channel has a confirmed TX code.
    pub fn all_tx_calibrated(&self) -> bool {
        self.num_tx_calibrated >= self.num_target_channels()
    }

    /// The code currently tried (or confirmed) for a channel and direction.
    pub fn tuning_code(&self, channel: Channel, mode: ChannelMode) -> TuningCode {
        self.info(channel, mode).tuning_code
    }

    /// The sweep window of a channel and direction.
    pub fn sweep_config(&self, channel: Channel, mode: ChannelMode) -> SweepConfig {
        self.info(channel, mode).sweep_config
    }

    /// Consecutive unacknowledged transmissions, across channels.
    pub fn num_tx_failures(&self) -> u16 {
        self.num_tx_failures
    }

    /// Reset the consecutive transmission failure counter.
    pub fn reset_num_tx_failures(&mut self) {
        self.num_tx_failures = 0;
    }

    pub(crate) fn poison(&mut self) {
        self.state = CalState::Invalid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(n: u8) -> Channel {
        Channel::new(n).unwrap()
    }

    fn code(coarse: u8, mid: u8, fine: u8) -> TuningCode {
        TuningCode::new_unchecked(coarse, mid, fine)
    }

    fn sweep(coarse: (u8, u8), mid: (u8, u8), fine: (u8, u8)) -> SweepConfig {
        SweepConfig::new(
            SweepRange::new(coarse.0, coarse.1),
            SweepRange::new(mid.0, mid.1),
            SweepRange::new(fine.0, fine.1),
        )
    }

    /// Drive the engine through its initial sweep: `timeouts` empty windows,
    /// then a received frame.
    fn run_initial_sweep(
        engine: &mut ChannelCal,
        registry: &mut ChannelRegistry,
        config: SweepConfig,
        timeouts: usize,
    ) {
        engine.init_initial_rx_sweep(config).unwrap();
        assert_eq!(engine.state(), CalState::InitialRx);
        engine.begin_initial_window();
        for _ in 0..timeouts {
            assert!(engine.initial_timeout().is_some());
        }
        assert!(engine.initial_frame_received());
        assert_eq!(engine.state(), CalState::InitialRxReceived);
        engine.finish_initial_rx_sweep(registry);
        assert_eq!(engine.state(), CalState::RxDone);
        engine.init_remaining_sweeps(registry).unwrap();
    }

    #[test]
    fn invalid_sweep_config_is_rejected_without_state_change() {
        let mut engine = ChannelCal::new();
        assert!(engine
            .init_initial_rx_sweep(sweep((5, 4), (15, 15), (0, 31)))
            .is_err());
        assert_eq!(engine.state(), CalState::Init);
    }

    #[test]
    fn frame_after_three_timeouts_lands_on_the_third_fine_code() {
        let mut engine = ChannelCal::new();
        let mut registry = ChannelRegistry::new();
        run_initial_sweep(
            &mut engine,
            &mut registry,
            sweep((22, 22), (15, 15), (0, 31)),
            3,
        );

        assert_eq!(
            engine.tuning_code(INITIAL_CHANNEL, ChannelMode::Rx),
            code(22, 15, 3)
        );
        assert!(engine.rx_calibrated(INITIAL_CHANNEL));
        assert_eq!(engine.state(), CalState::RemainingRx);
        assert_eq!(
            registry.get_tuning_code(INITIAL_CHANNEL, ChannelMode::Rx),
            code(22, 15, 3)
        );
    }

    #[test]
    fn empty_air_walks_the_whole_sweep() {
        let mut engine = ChannelCal::new();
        let config = sweep((22, 23), (3, 4), (0, 2));
        engine.init_initial_rx_sweep(config).unwrap();

        let mut seen = vec![engine.begin_initial_window()];
        // |sweep| - 1 timeouts visit every remaining code exactly once.
        for _ in 0..(2 * 2 * 3 - 1) {
            seen.push(engine.initial_timeout().unwrap());
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 2 * 2 * 3);
        assert!(config.is_end_of_sweep(seen.last().unwrap()));
    }

    #[test]
    fn timeout_after_the_frame_does_not_advance_the_code() {
        let mut engine = ChannelCal::new();
        engine
            .init_initial_rx_sweep(sweep((22, 22), (15, 15), (0, 31)))
            .unwrap();
        engine.begin_initial_window();
        assert!(engine.initial_frame_received());
        // The window produced a frame; a racing timer callback is a no-op.
        assert_eq!(engine.initial_timeout(), None);
    }

    #[test]
    fn cancellation_silences_the_timer() {
        let mut engine = ChannelCal::new();
        engine
            .init_initial_rx_sweep(sweep((22, 22), (15, 15), (0, 31)))
            .unwrap();
        engine.begin_initial_window();
        engine.cancel_initial_sweep();
        assert_eq!(engine.initial_timeout(), None);
    }

    #[test]
    fn frames_outside_a_window_are_ignored() {
        let mut engine = ChannelCal::new();
        assert!(!engine.initial_frame_received());
        engine
            .init_initial_rx_sweep(sweep((22, 22), (15, 15), (0, 31)))
            .unwrap();
        // InitialRx, but no window open yet.
        assert!(!engine.initial_frame_received());
    }

    #[test]
    fn remaining_sweeps_extrapolate_neighbors_and_tx() {
        let mut engine = ChannelCal::new();
        let mut registry = ChannelRegistry::new();
        // Discover channel 17 at (23, 15, 10).
        run_initial_sweep(
            &mut engine,
            &mut registry,
            sweep((23, 23), (15, 15), (0, 15)),
            10,
        );

        assert_eq!(
            engine.tuning_code(channel(18), ChannelMode::Rx),
            code(23, 20, 10)
        );
        assert_eq!(
            engine.tuning_code(channel(16), ChannelMode::Rx),
            code(23, 10, 10)
        );
        assert_eq!(
            engine.tuning_code(channel(17), ChannelMode::Tx),
            code(23, 14, 10)
        );
        // Estimates are published.
        assert_eq!(
            registry.get_tuning_code(channel(18), ChannelMode::Rx),
            code(23, 20, 10)
        );
        // Only the initial channel is calibrated so far.
        assert!(engine.rx_calibrated(channel(17)));
        assert!(!engine.rx_calibrated(channel(18)));
        assert!(!engine.tx_calibrated(channel(17)));
    }

    #[test]
    fn remaining_sweeps_pin_the_confirmation_window() {
        let mut engine = ChannelCal::new();
        let mut registry = ChannelRegistry::new();
        run_initial_sweep(
            &mut engine,
            &mut registry,
            sweep((23, 23), (15, 15), (0, 15)),
            10,
        );

        let config = engine.sweep_config(channel(18), ChannelMode::Rx);
        assert_eq!(config.coarse, SweepRange::single(23));
        assert_eq!(config.mid, SweepRange::new(19, 21));
        assert_eq!(config.fine, SweepRange::new(0, 24));
    }

    #[test]
    fn repeated_rx_failures_advance_by_one_sweep_step() {
        let mut engine = ChannelCal::new();
        let mut registry = ChannelRegistry::new();
        run_initial_sweep(
            &mut engine,
            &mut registry,
            sweep((23, 23), (15, 15), (0, 15)),
            10,
        );

        let target = channel(18);
        let before = engine.tuning_code(target, ChannelMode::Rx);
        let expected = engine
            .sweep_config(target, ChannelMode::Rx)
            .advance_fine(before);

        // One failure short of the threshold changes nothing.
        assert_eq!(engine.rx_failure(target, &mut registry), None);
        assert_eq!(engine.tuning_code(target, ChannelMode::Rx), before);
        // The threshold advances by exactly one step and resets the count.
        assert_eq!(engine.rx_failure(target, &mut registry), Some(expected));
        assert_eq!(engine.rx_failure(target, &mut registry), None);
        assert_eq!(
            registry.get_tuning_code(target, ChannelMode::Rx),
            expected
        );
    }

    #[test]
    fn rx_success_latches_and_stops_failure_advances() {
        let mut engine = ChannelCal::new();
        let mut registry = ChannelRegistry::new();
        run_initial_sweep(
            &mut engine,
            &mut registry,
            sweep((23, 23), (15, 15), (0, 15)),
            10,
        );

        let target = channel(18);
        assert!(engine.rx_success(target, &mut registry));
        // A second success is not "newly calibrated".
        assert!(!engine.rx_success(target, &mut registry));
        // Failures after the latch never move the code.
        let confirmed = engine.tuning_code(target, ChannelMode::Rx);
        for _ in 0..10 {
            assert_eq!(engine.rx_failure(target, &mut registry), None);
        }
        assert_eq!(engine.tuning_code(target, ChannelMode::Rx), confirmed);
    }

    #[test]
    fn rx_success_seeds_tx_once() {
        let mut engine = ChannelCal::new();
        let mut registry = ChannelRegistry::new();
        run_initial_sweep(
            &mut engine,
            &mut registry,
            sweep((23, 23), (15, 15), (0, 15)),
            10,
        );

        let target = channel(18);
        // Pretend the RX sweep drifted before the success.
        engine.rx_failure(target, &mut registry);
        engine.rx_failure(target, &mut registry);
        let rx = engine.tuning_code(target, ChannelMode::Rx);
        engine.rx_success(target, &mut registry);
        assert_eq!(
            engine.tuning_code(target, ChannelMode::Tx),
            rx.estimate_tx_from_rx().unwrap()
        );
    }

    #[test]
    fn full_confirmation_reaches_feedback() {
        let mut engine = ChannelCal::new();
        let mut registry = ChannelRegistry::new();
        run_initial_sweep(
            &mut engine,
            &mut registry,
            sweep((23, 23), (15, 15), (0, 15)),
            10,
        );
        assert_eq!(engine.state(), CalState::RemainingRx);

        for index in 0..NUM_CHANNELS {
            engine.rx_success(Channel::from_index(index).unwrap(), &mut registry);
        }
        assert!(engine.all_rx_calibrated());
        assert_eq!(engine.state(), CalState::TxCal);

        for index in 0..NUM_CHANNELS {
            engine.tx_success(Channel::from_index(index).unwrap(), &mut registry);
        }
        assert!(engine.all_tx_calibrated());
        assert_eq!(engine.state(), CalState::Feedback);
    }

    #[test]
    fn tx_failures_count_until_a_success() {
        let mut engine = ChannelCal::new();
        let mut registry = ChannelRegistry::new();
        run_initial_sweep(
            &mut engine,
            &mut registry,
            sweep((23, 23), (15, 15), (0, 15)),
            10,
        );

        let target = channel(19);
        engine.tx_failure(target, &mut registry);
        engine.tx_failure(target, &mut registry);
        engine.tx_failure(channel(20), &mut registry);
        assert_eq!(engine.num_tx_failures(), 3);
        engine.tx_success(target, &mut registry);
        assert_eq!(engine.num_tx_failures(), 0);
    }

    #[test]
    fn discovery_near_a_rollover_recenters_the_window() {
        let mut engine = ChannelCal::new();
        let mut registry = ChannelRegistry::new();
        // Mid code 31 is within one code of the top of the range, so the
        // narrowed window re-expresses the code on the next coarse plane.
        run_initial_sweep(
            &mut engine,
            &mut registry,
            sweep((23, 23), (31, 31), (0, 4)),
            2,
        );

        let rolled = code(23, 31, 2).rollover_mid(1).unwrap();
        assert_eq!(
            engine.tuning_code(INITIAL_CHANNEL, ChannelMode::Rx),
            rolled
        );
        let config = engine.sweep_config(INITIAL_CHANNEL, ChannelMode::Rx);
        assert_eq!(config.coarse, SweepRange::single(rolled.coarse));
        assert_eq!(
            config.mid,
            SweepRange::new(rolled.mid - 1, rolled.mid + 1)
        );
    }
}
