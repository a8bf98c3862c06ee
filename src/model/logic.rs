//! Logical gates: AND, OR and NOT over boolean-as-`f64` signals (`0.0` is
//! false, anything else is true), with the same "recompute on input, fire
//! next step" shape as the arithmetic models.

use crate::message::{InputPort, Message};

fn as_bool(x: f64) -> bool {
    x != 0.0
}

fn as_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn latest(port: &InputPort) -> Option<f64> {
    port.messages().last().map(|m| m.get(0))
}

/// N-ary logical AND.
#[derive(Debug, Clone)]
pub struct LogicalAnd {
    inputs: Vec<bool>,
    output: bool,
}

impl LogicalAnd {
    pub fn new(arity: usize) -> Self {
        Self { inputs: vec![false; arity], output: false }
    }

    pub fn initialize(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn delta_ext(&mut self, _t: f64, _e: f64, inputs: &[InputPort]) -> f64 {
        for (slot, port) in self.inputs.iter_mut().zip(inputs) {
            if let Some(value) = latest(port) {
                *slot = as_bool(value);
            }
        }
        self.output = self.inputs.iter().all(|&b| b);
        0.0
    }

    pub fn delta_int(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn lambda(&self) -> Message {
        Message::one(as_f64(self.output))
    }

    pub fn output_observation(&self, _t: f64, _e: f64) -> (f64, f64) {
        (as_f64(self.output), 0.0)
    }
}

/// N-ary logical OR.
#[derive(Debug, Clone)]
pub struct LogicalOr {
    inputs: Vec<bool>,
    output: bool,
}

impl LogicalOr {
    pub fn new(arity: usize) -> Self {
        Self { inputs: vec![false; arity], output: false }
    }

    pub fn initialize(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn delta_ext(&mut self, _t: f64, _e: f64, inputs: &[InputPort]) -> f64 {
        for (slot, port) in self.inputs.iter_mut().zip(inputs) {
            if let Some(value) = latest(port) {
                *slot = as_bool(value);
            }
        }
        self.output = self.inputs.iter().any(|&b| b);
        0.0
    }

    pub fn delta_int(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn lambda(&self) -> Message {
        Message::one(as_f64(self.output))
    }

    pub fn output_observation(&self, _t: f64, _e: f64) -> (f64, f64) {
        (as_f64(self.output), 0.0)
    }
}

/// Unary logical NOT.
#[derive(Debug, Clone, Default)]
pub struct LogicalInvert {
    input: bool,
}

impl LogicalInvert {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn delta_ext(&mut self, _t: f64, _e: f64, inputs: &[InputPort]) -> f64 {
        if let Some(port) = inputs.first() {
            if let Some(value) = latest(port) {
                self.input = as_bool(value);
            }
        }
        0.0
    }

    pub fn delta_int(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn lambda(&self) -> Message {
        Message::one(as_f64(!self.input))
    }

    pub fn output_observation(&self, _t: f64, _e: f64) -> (f64, f64) {
        (as_f64(!self.input), 0.0)
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
    fn and_is_true_only_when_all_inputs_are_true() {
        let mut gate = LogicalAnd::new(2);
        let inputs = [port_with(1.0), port_with(0.0)];
        gate.delta_ext(0.0, 0.0, &inputs);
        assert_eq!(gate.lambda().get(0), 0.0);

        let inputs = [port_with(1.0), port_with(1.0)];
        gate.delta_ext(1.0, 0.0, &inputs);
        assert_eq!(gate.lambda().get(0), 1.0);
    }

    #[test]
    fn or_is_true_when_any_input_is_true() {
        let mut gate = LogicalOr::new(2);
        let inputs = [port_with(0.0), port_with(1.0)];
        gate.delta_ext(0.0, 0.0, &inputs);
        assert_eq!(gate.lambda().get(0), 1.0);
    }

    #[test]
    fn invert_negates_its_single_input() {
        let mut gate = LogicalInvert::new();
        let inputs = [port_with(0.0)];
        gate.delta_ext(0.0, 0.0, &inputs);
        assert_eq!(gate.lambda().get(0), 1.0);
    }
}
