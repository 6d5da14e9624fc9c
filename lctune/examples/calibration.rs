//! Host-side simulation of a full calibration run.
//!
//! A simulated peer beacons on the initial channel; the mote only hears it
//! once its swept oscillator code lands on the right setting. The run walks
//! through the initial sweep, the per-channel confirmation driven by MAC
//! events, and a few feedback corrections, printing the UART traces to
//! stdout.
//!
//! Run with: `cargo run --example calibration --features std`

use std::cell::RefCell;
use std::rc::Rc;

use lctune::cal::{CalState, TuningSubsystem, INITIAL_CHANNEL};
use lctune::channel::{Channel, ChannelMode, NUM_CHANNELS};
use lctune::phy::{FrameInfo, Radio, Timer, Uart};
use lctune::sync::EventFlags;
use lctune::time::Instant;
use lctune::tuning::TuningCode;

#[derive(Default)]
struct SimRadioInner {
    tuned: Option<TuningCode>,
    listening: bool,
    pending: Option<Vec<u8>>,
}

#[derive(Clone, Default)]
struct SimRadio {
    inner: Rc<RefCell<SimRadioInner>>,
}

impl SimRadio {
    fn tuned(&self) -> Option<TuningCode> {
        self.inner.borrow().tuned
    }

    fn listening(&self) -> bool {
        self.inner.borrow().listening
    }

    fn deliver(&self, bytes: &[u8]) {
        self.inner.borrow_mut().pending = Some(bytes.to_vec());
    }
}

impl Radio for SimRadio {
    fn rf_on(&mut self) {}

    fn rf_off(&mut self) {
        self.inner.borrow_mut().listening = false;
    }

    fn tune(&mut self, code: TuningCode) {
        self.inner.borrow_mut().tuned = Some(code);
    }

    fn set_frequency(&mut self, _channel: Channel, _mode: ChannelMode) {}

    fn rx_enable(&mut self) {}

    fn rx_now(&mut self) {
        self.inner.borrow_mut().listening = true;
    }

    fn tx_enable(&mut self) {}

    fn tx_now(&mut self) {}

    fn load_packet(&mut self, _bytes: &[u8]) {}

    fn read_received_frame(&mut self, buffer: &mut [u8]) -> FrameInfo {
        match self.inner.borrow_mut().pending.take() {
            Some(bytes) => {
                buffer[..bytes.len()].copy_from_slice(&bytes);
                FrameInfo {
                    length: bytes.len() as u8,
                    rssi: -72,
                    lqi: 104,
                    crc_ok: true,
                }
            }
            None => FrameInfo::default(),
        }
    }
}

#[derive(Default)]
struct SimTimerInner {
    now: u32,
    compare: Option<u32>,
    enabled: bool,
}

#[derive(Clone, Default)]
struct SimTimer {
    inner: Rc<RefCell<SimTimerInner>>,
}

impl SimTimer {
    fn now(&self) -> Instant {
        Instant::from_ticks(self.inner.borrow().now)
    }

    /// Jump to the armed compare value. Returns whether one was armed.
    fn expire(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        if !inner.enabled {
            return false;
        }
        match inner.compare.take() {
            Some(compare) => {
                inner.now = compare;
                true
            }
            None => false,
        }
    }
}

impl Timer for SimTimer {
    fn read_counter(&self) -> Instant {
        self.now()
    }

    fn set_compare(&mut self, at: Instant) {
        self.inner.borrow_mut().compare = Some(at.as_ticks());
    }

    fn enable(&mut self) {
        self.inner.borrow_mut().enabled = true;
    }

    fn disable(&mut self) {
        let mut inner = self.inner.borrow_mut();
        inner.enabled = false;
        inner.compare = None;
    }
}

struct StdoutUart;

impl Uart for StdoutUart {
    fn tx_send(&mut self, bytes: &[u8]) {
        print!("{}", String::from_utf8_lossy(bytes));
    }
}

static FLAGS: EventFlags = EventFlags::new();

fn main() {
    let radio = SimRadio::default();
    let timer = SimTimer::default();
    let mut mote = TuningSubsystem::new(radio.clone(), timer.clone(), StdoutUart, &FLAGS);

    // The code the simulated die actually needs for the initial channel.
    let audible = TuningCode::new_unchecked(23, 29, 7);

    println!("--- initial rx sweep on channel {INITIAL_CHANNEL} ---");
    mote.start_calibration().expect("default sweep is valid");

    let mut windows = 0;
    while mote.state() != CalState::RemainingRx {
        while mote.poll() {}
        if radio.listening() && radio.tuned() == Some(audible) {
            // The peer's beacon is heard on this window.
            radio.deliver(&[0u8; 12]);
            mote.isr_end_frame(timer.now());
        } else if timer.expire() {
            mote.isr_timer();
            windows += 1;
        }
    }
    println!(
        "heard the peer after {windows} empty windows at {}",
        mote.tuning_code(INITIAL_CHANNEL, ChannelMode::Rx)
    );

    println!("--- confirming the extrapolated codes ---");
    for index in 0..NUM_CHANNELS {
        let channel = Channel::from_index(index).unwrap();
        // Every other channel misses a couple of beacons before locking on.
        if index % 2 == 0 {
            mote.rx_failure(channel);
            mote.rx_failure(channel);
        }
        mote.rx_success(channel);
        mote.tx_success(channel);
    }
    assert_eq!(mote.state(), CalState::Feedback);

    println!("--- feedback: IF runs high on channel {INITIAL_CHANNEL} ---");
    for _ in 0..3 {
        mote.frame_received(INITIAL_CHANNEL, 540);
    }

    println!("--- calibrated codes ---");
    for index in 0..NUM_CHANNELS {
        let channel = Channel::from_index(index).unwrap();
        println!(
            "channel {channel}: rx {} tx {}",
            mote.tuning_code(channel, ChannelMode::Rx),
            mote.tuning_code(channel, ChannelMode::Tx),
        );
    }
}
