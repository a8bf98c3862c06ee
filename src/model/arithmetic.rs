//! Static-function models: sum, weighted sum, multiplier, power, and the
//! comparator pair cross/filter.
//!
//! All of these share the same transition shape: `delta_ext` recomputes the
//! function of the current inputs and schedules `sigma = 0` so the result is
//! published on the very next step; `delta_int` resets `sigma` to infinity
//! (nothing more to do until another input arrives); `lambda` emits the
//! cached result. None of them have autonomous behavior, so `initialize`
//! always returns infinity.

use crate::message::{InputPort, Message};

fn latest(port: &InputPort) -> f64 {
    port.messages().last().map(|m| m.get(0)).unwrap_or(0.0)
}

/// Sums an arbitrary number of input ports.
#[derive(Debug, Clone, Default)]
pub struct Sum {
    inputs: Vec<f64>,
    output: f64,
}

impl Sum {
    /// Creates a sum model with `arity` input ports.
    pub fn new(arity: usize) -> Self {
        Self { inputs: vec![0.0; arity], output: 0.0 }
    }

    pub fn initialize(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn delta_ext(&mut self, _t: f64, _e: f64, inputs: &[InputPort]) -> f64 {
        for (slot, port) in self.inputs.iter_mut().zip(inputs) {
            if !port.is_empty() {
                *slot = latest(port);
            }
        }
        self.output = self.inputs.iter().sum();
        0.0
    }

    pub fn delta_int(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn lambda(&self) -> Message {
        Message::one(self.output)
    }

    pub fn output_observation(&self, _t: f64, _e: f64) -> (f64, f64) {
        (self.output, 0.0)
    }
}

/// Like [`Sum`] but scales each input by a fixed coefficient first.
#[derive(Debug, Clone)]
pub struct WeightedSum {
    weights: Vec<f64>,
    inputs: Vec<f64>,
    output: f64,
}

impl WeightedSum {
    pub fn new(weights: Vec<f64>) -> Self {
        let n = weights.len();
        Self { weights, inputs: vec![0.0; n], output: 0.0 }
    }

    pub fn initialize(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn delta_ext(&mut self, _t: f64, _e: f64, inputs: &[InputPort]) -> f64 {
        for (slot, port) in self.inputs.iter_mut().zip(inputs) {
            if !port.is_empty() {
                *slot = latest(port);
            }
        }
        self.output = self.inputs.iter().zip(&self.weights).map(|(x, w)| x * w).sum();
        0.0
    }

    pub fn delta_int(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn lambda(&self) -> Message {
        Message::one(self.output)
    }

    pub fn output_observation(&self, _t: f64, _e: f64) -> (f64, f64) {
        (self.output, 0.0)
    }

    pub(crate) fn archive_params(&self) -> &[f64] {
        &self.weights
    }
}

/// Multiplies an arbitrary number of input ports.
#[derive(Debug, Clone)]
pub struct Multiplier {
    inputs: Vec<f64>,
    output: f64,
}

impl Multiplier {
    pub fn new(arity: usize) -> Self {
        Self { inputs: vec![1.0; arity], output: 1.0 }
    }

    pub fn initialize(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn delta_ext(&mut self, _t: f64, _e: f64, inputs: &[InputPort]) -> f64 {
        for (slot, port) in self.inputs.iter_mut().zip(inputs) {
            if !port.is_empty() {
                *slot = latest(port);
            }
        }
        self.output = self.inputs.iter().product();
        0.0
    }

    pub fn delta_int(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn lambda(&self) -> Message {
        Message::one(self.output)
    }

    pub fn output_observation(&self, _t: f64, _e: f64) -> (f64, f64) {
        (self.output, 0.0)
    }
}

/// Raises its single input to a fixed exponent.
#[derive(Debug, Clone)]
pub struct Power {
    exponent: f64,
    input: f64,
    output: f64,
}

impl Power {
    pub fn new(exponent: f64) -> Self {
        Self { exponent, input: 0.0, output: 0.0 }
    }

    pub fn initialize(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn delta_ext(&mut self, _t: f64, _e: f64, inputs: &[InputPort]) -> f64 {
        if let Some(port) = inputs.first() {
            if !port.is_empty() {
                self.input = latest(port);
            }
        }
        self.output = self.input.powf(self.exponent);
        0.0
    }

    pub fn delta_int(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn lambda(&self) -> Message {
        Message::one(self.output)
    }

    pub fn output_observation(&self, _t: f64, _e: f64) -> (f64, f64) {
        (self.output, 0.0)
    }

    pub(crate) fn archive_params(&self) -> [f64; 1] {
        [self.exponent]
    }
}

/// Zero-crossing detector: watches `signal - threshold` (port 0 minus port
/// 1) and fires once when its sign flips, emitting `+1.0` on an
/// upward crossing and `-1.0` on a downward one.
#[derive(Debug, Clone)]
pub struct Cross {
    signal: f64,
    threshold: f64,
    last_sign: f64,
    pending: Option<f64>,
}

impl Cross {
    pub fn new(initial_signal: f64, initial_threshold: f64) -> Self {
        Self {
            signal: initial_signal,
            threshold: initial_threshold,
            last_sign: (initial_signal - initial_threshold).signum(),
            pending: None,
        }
    }

    pub fn initialize(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn delta_ext(&mut self, _t: f64, _e: f64, inputs: &[InputPort]) -> f64 {
        if let Some(port) = inputs.first() {
            if !port.is_empty() {
                self.signal = latest(port);
            }
        }
        if let Some(port) = inputs.get(1) {
            if !port.is_empty() {
                self.threshold = latest(port);
            }
        }
        let sign = (self.signal - self.threshold).signum();
        if sign != 0.0 && sign != self.last_sign && self.last_sign != 0.0 {
            self.pending = Some(sign);
            self.last_sign = sign;
            0.0
        } else {
            self.last_sign = sign;
            f64::INFINITY
        }
    }

    pub fn delta_int(&mut self, _t: f64) -> f64 {
        self.pending = None;
        f64::INFINITY
    }

    pub fn lambda(&self) -> Message {
        Message::one(self.pending.unwrap_or(0.0))
    }

    pub fn output_observation(&self, _t: f64, _e: f64) -> (f64, f64) {
        (self.signal - self.threshold, 0.0)
    }

    pub(crate) fn archive_params(&self) -> [f64; 2] {
        [self.signal, self.threshold]
    }
}

/// Which bound, if any, the tracked signal currently violates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Violation {
    #[default]
    None,
    Up,
    Down,
}

/// Clips its single input to `[lower_threshold, upper_threshold]`. Emits
/// the clipped value only when the raw signal crosses one of the
/// thresholds, carrying a reset direction (`+1.0` upward, `-1.0` downward)
/// as its second value; staying within bounds, or staying clipped against
/// the same bound, produces no further events.
#[derive(Debug, Clone)]
pub struct Filter {
    lower_threshold: f64,
    upper_threshold: f64,
    current: f64,
    violation: Violation,
    pending: Option<(f64, f64)>,
}

impl Filter {
    pub fn new(lower_threshold: f64, upper_threshold: f64) -> Self {
        let (lower_threshold, upper_threshold) = if lower_threshold <= upper_threshold {
            (lower_threshold, upper_threshold)
        } else {
            (upper_threshold, lower_threshold)
        };
        Self {
            lower_threshold,
            upper_threshold,
            current: 0.0,
            violation: Violation::None,
            pending: None,
        }
    }

    fn clipped(&self) -> f64 {
        self.current.clamp(self.lower_threshold, self.upper_threshold)
    }

    pub fn initialize(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn delta_ext(&mut self, _t: f64, _e: f64, inputs: &[InputPort]) -> f64 {
        if let Some(port) = inputs.first() {
            if !port.is_empty() {
                self.current = latest(port);
            }
        }
        let violation = if self.current > self.upper_threshold {
            Violation::Up
        } else if self.current < self.lower_threshold {
            Violation::Down
        } else {
            Violation::None
        };
        if violation != self.violation && violation != Violation::None {
            let direction = if violation == Violation::Up { 1.0 } else { -1.0 };
            self.pending = Some((self.clipped(), direction));
            self.violation = violation;
            0.0
        } else {
            self.violation = violation;
            f64::INFINITY
        }
    }

    pub fn delta_int(&mut self, _t: f64) -> f64 {
        self.pending = None;
        f64::INFINITY
    }

    pub fn lambda(&self) -> Message {
        let (value, direction) = self.pending.unwrap_or((self.clipped(), 0.0));
        Message::two(value, direction)
    }

    pub fn output_observation(&self, _t: f64, _e: f64) -> (f64, f64) {
        (self.clipped(), self.current)
    }

    pub(crate) fn archive_params(&self) -> [f64; 2] {
        [self.lower_threshold, self.upper_threshold]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port_with(value: f64) -> InputPort {
        let mut port = InputPort::default();
        port.send(Message::one(value));
        port
    }

    #[test]
    fn sum_adds_latest_values_on_all_ports() {
        let mut sum = Sum::new(2);
        let inputs = [port_with(2.0), port_with(3.0)];
        let sigma = sum.delta_ext(0.0, 0.0, &inputs);
        assert_eq!(sigma, 0.0);
        assert_eq!(sum.lambda().get(0), 5.0);
    }

    #[test]
    fn weighted_sum_scales_before_adding() {
        let mut wsum = WeightedSum::new(vec![2.0, -1.0]);
        let inputs = [port_with(3.0), port_with(4.0)];
        wsum.delta_ext(0.0, 0.0, &inputs);
        assert_eq!(wsum.lambda().get(0), 2.0);
    }

    #[test]
    fn multiplier_multiplies_all_ports() {
        let mut mul = Multiplier::new(3);
        let inputs = [port_with(2.0), port_with(3.0), port_with(4.0)];
        mul.delta_ext(0.0, 0.0, &inputs);
        assert_eq!(mul.lambda().get(0), 24.0);
    }

    #[test]
    fn power_raises_to_exponent() {
        let mut pow = Power::new(3.0);
        let inputs = [port_with(2.0)];
        pow.delta_ext(0.0, 0.0, &inputs);
        assert_eq!(pow.lambda().get(0), 8.0);
    }

    #[test]
    fn cross_fires_only_on_sign_flip() {
        let mut cross = Cross::new(-1.0, 0.0);
        let inputs_same_side = [port_with(-0.5), InputPort::default()];
        let sigma = cross.delta_ext(0.0, 0.0, &inputs_same_side);
        assert!(sigma.is_infinite());

        let inputs_cross = [port_with(0.5), InputPort::default()];
        let sigma = cross.delta_ext(1.0, 0.0, &inputs_cross);
        assert_eq!(sigma, 0.0);
        assert_eq!(cross.lambda().get(0), 1.0);
    }

    #[test]
    fn filter_clips_to_bounds_and_emits_only_on_threshold_violation() {
        let mut filter = Filter::new(0.0, 1.0);

        // Within bounds: no event.
        let sigma = filter.delta_ext(0.0, 0.0, &[port_with(0.5)]);
        assert!(sigma.is_infinite());

        // Crosses the upper threshold: clipped value emitted with an
        // upward reset direction.
        let sigma = filter.delta_ext(1.0, 0.0, &[port_with(2.0)]);
        assert_eq!(sigma, 0.0);
        assert_eq!(filter.lambda().get(0), 1.0);
        assert_eq!(filter.lambda().get(1), 1.0);
        filter.delta_int(1.0);

        // Still above the upper threshold: already in that violation, no
        // further event.
        let sigma = filter.delta_ext(2.0, 0.0, &[port_with(3.0)]);
        assert!(sigma.is_infinite());

        // Crosses the lower threshold: downward reset.
        let sigma = filter.delta_ext(3.0, 0.0, &[port_with(-1.0)]);
        assert_eq!(sigma, 0.0);
        assert_eq!(filter.lambda().get(0), 0.0);
        assert_eq!(filter.lambda().get(1), -1.0);
    }
}
