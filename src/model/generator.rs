//! Autonomous value sources: a one-shot constant, a periodic source-driven
//! generator, a sampled time function, an event counter and a running
//! accumulator.

use crate::message::{InputPort, Message};
use crate::source::Source;

/// Emits `value` once, at the very first internal transition, then never
/// fires again.
#[derive(Debug, Clone)]
pub struct Constant {
    value: f64,
    fired: bool,
}

impl Constant {
    pub fn new(value: f64) -> Self {
        Self { value, fired: false }
    }

    pub fn initialize(&mut self, _t: f64) -> f64 {
        0.0
    }

    pub fn delta_int(&mut self, _t: f64) -> f64 {
        self.fired = true;
        f64::INFINITY
    }

    pub fn delta_ext(&mut self, _t: f64, _e: f64, _inputs: &[InputPort]) -> f64 {
        if self.fired {
            f64::INFINITY
        } else {
            0.0
        }
    }

    pub fn lambda(&self) -> Message {
        Message::one(self.value)
    }

    pub fn output_observation(&self, _t: f64, _e: f64) -> (f64, f64) {
        (self.value, 0.0)
    }

    pub(crate) fn archive_params(&self) -> [f64; 1] {
        [self.value]
    }
}

/// Periodically draws and emits a value, with both the emitted value and
/// the inter-arrival time itself drawn from their own [`Source`] (so a
/// generator can have jittered timing, not just a jittered value). The next
/// value is pre-drawn one cycle ahead so `lambda` always has something to
/// emit the instant `sigma` elapses.
#[derive(Debug, Clone)]
pub struct Generator {
    value_source: Source,
    ta_source: Source,
    current: f64,
    next_ta: f64,
}

impl Generator {
    /// General constructor: draws both series independently.
    pub fn new(value_source: Source, ta_source: Source) -> Self {
        Self { value_source, ta_source, current: 0.0, next_ta: 0.0 }
    }

    /// Convenience constructor for a fixed inter-arrival time: wraps
    /// `period` as a one-value constant `ta_source`.
    pub fn periodic(value_source: Source, period: f64) -> Self {
        Self::new(value_source, Source::Constant { values: vec![period.max(f64::MIN_POSITIVE)], position: 0 })
    }

    fn draw_value(&mut self) {
        let mut chunk = [0.0];
        if self.value_source.dispatch(&mut chunk).is_ok() {
            self.current = chunk[0];
        }
    }

    fn draw_ta(&mut self) -> f64 {
        let mut chunk = [0.0];
        if self.ta_source.dispatch(&mut chunk).is_ok() {
            chunk[0].max(f64::MIN_POSITIVE)
        } else {
            f64::INFINITY
        }
    }

    pub fn initialize(&mut self, _t: f64) -> f64 {
        let _ = self.value_source.prepare();
        let _ = self.ta_source.prepare();
        self.draw_value();
        self.next_ta = self.draw_ta();
        self.next_ta
    }

    pub fn delta_int(&mut self, _t: f64) -> f64 {
        self.draw_value();
        self.next_ta = self.draw_ta();
        self.next_ta
    }

    pub fn delta_ext(&mut self, _t: f64, e: f64, _inputs: &[InputPort]) -> f64 {
        (self.next_ta - e).max(0.0)
    }

    pub fn lambda(&self) -> Message {
        Message::one(self.current)
    }

    pub fn output_observation(&self, _t: f64, _e: f64) -> (f64, f64) {
        (self.current, 0.0)
    }

    /// `[next_ta]`: best-effort only, since neither source's full
    /// configuration (table contents, distribution, rng state) is captured
    /// by the binary archive's fixed-width parameter record. A reloaded
    /// generator is wired to fresh constant sources.
    pub(crate) fn archive_params(&self) -> [f64; 1] {
        [self.next_ta]
    }
}

/// The waveform sampled by a [`TimeFunction`].
#[derive(Debug, Clone)]
pub enum Waveform {
    /// `amplitude * sin(2*pi*frequency*t + phase)`.
    Sine { amplitude: f64, frequency: f64, phase: f64 },
    /// `slope * t + intercept`.
    Linear { slope: f64, intercept: f64 },
}

impl Waveform {
    fn value_at(&self, t: f64) -> f64 {
        match self {
            Waveform::Sine { amplitude, frequency, phase } => {
                amplitude * (2.0 * std::f64::consts::PI * frequency * t + phase).sin()
            }
            Waveform::Linear { slope, intercept } => slope * t + intercept,
        }
    }

    /// `[tag, p0, p1, p2]`: `tag` 0 is `Sine{amplitude,frequency,phase}`, 1
    /// is `Linear{slope,intercept,_}`.
    pub(crate) fn archive_params(&self) -> [f64; 4] {
        match self {
            Waveform::Sine { amplitude, frequency, phase } => [0.0, *amplitude, *frequency, *phase],
            Waveform::Linear { slope, intercept } => [1.0, *slope, *intercept, 0.0],
        }
    }

    pub(crate) fn from_archive_params(params: [f64; 4]) -> Self {
        match params[0] as u8 {
            1 => Waveform::Linear { slope: params[1], intercept: params[2] },
            _ => Waveform::Sine { amplitude: params[1], frequency: params[2], phase: params[3] },
        }
    }
}

/// Samples a closed-form [`Waveform`] at a fixed period `dt`, since a pure
/// DEVS model can only emit discrete events.
#[derive(Debug, Clone)]
pub struct TimeFunction {
    waveform: Waveform,
    dt: f64,
    current: f64,
}

impl TimeFunction {
    pub fn new(waveform: Waveform, dt: f64) -> Self {
        Self { waveform, dt: dt.max(f64::MIN_POSITIVE), current: 0.0 }
    }

    pub fn initialize(&mut self, t: f64) -> f64 {
        self.current = self.waveform.value_at(t);
        0.0
    }

    pub fn delta_int(&mut self, t: f64) -> f64 {
        self.current = self.waveform.value_at(t);
        self.dt
    }

    pub fn delta_ext(&mut self, _t: f64, _e: f64, _inputs: &[InputPort]) -> f64 {
        self.dt
    }

    pub fn lambda(&self) -> Message {
        Message::one(self.current)
    }

    pub fn output_observation(&self, t: f64, e: f64) -> (f64, f64) {
        (self.waveform.value_at(t + e), 0.0)
    }

    pub(crate) fn archive_params(&self) -> [f64; 5] {
        let w = self.waveform.archive_params();
        [w[0], w[1], w[2], w[3], self.dt]
    }

    pub(crate) fn from_archive_params(params: &[f64]) -> Self {
        let waveform = Waveform::from_archive_params([params[0], params[1], params[2], params[3]]);
        Self::new(waveform, params[4])
    }
}

/// Counts external events arriving on its single input port.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    count: u64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn delta_ext(&mut self, _t: f64, _e: f64, inputs: &[InputPort]) -> f64 {
        if let Some(port) = inputs.first() {
            self.count += port.messages().len() as u64;
        }
        0.0
    }

    pub fn delta_int(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn lambda(&self) -> Message {
        Message::one(self.count as f64)
    }

    pub fn output_observation(&self, _t: f64, _e: f64) -> (f64, f64) {
        (self.count as f64, 0.0)
    }

    /// Current count, mostly for test assertions.
    pub fn value(&self) -> u64 {
        self.count
    }
}

/// Maintains a running sum of every value received, emitting the new total
/// on each arrival.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    total: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn delta_ext(&mut self, _t: f64, _e: f64, inputs: &[InputPort]) -> f64 {
        if let Some(port) = inputs.first() {
            for msg in port.messages() {
                self.total += msg.get(0);
            }
        }
        0.0
    }

    pub fn delta_int(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn lambda(&self) -> Message {
        Message::one(self.total)
    }

    pub fn output_observation(&self, _t: f64, _e: f64) -> (f64, f64) {
        (self.total, 0.0)
    }
}
