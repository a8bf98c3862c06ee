//! Wraps a [`Hsm`] as an atomic model: external events drive `dispatch`,
//! and any messages the handlers queued during that dispatch are emitted on
//! the next `lambda`.
//!
//! Handlers are plain function pointers rather than closures, so a wrapper
//! built from them is a concrete, `Clone`-free type that fits inside the
//! closed [`super::ModelKind`] union without boxing or dynamic dispatch.
//!
//! Input port 0 carries ordinary external events (`message.get(0)` cast to
//! the event code); input port 1, if connected, carries parameter updates
//! that must be applied before any event on port 0 in the same bag — this
//! mirrors how an embedded simulation re-applies a pending parameter change
//! before re-running `init` when both arrive together.

use crate::hsm::{Hsm, HsmEvent, Response, StateId};
use crate::message::{InputPort, Message};

/// Event code reserved for port-1 parameter-update messages.
pub const PARAM_UPDATE_EVENT: i32 = -1;

/// Mutable context threaded through every state handler.
#[derive(Debug, Default)]
pub struct HsmContext {
    /// Most recent event-carried values, indexed the same way as the
    /// triggering message.
    pub inputs: [f64; 3],
    /// Messages queued by a handler for emission on the next `lambda`.
    pub outputs: Vec<Message>,
    /// Scratch local state available to every handler (registers, counters).
    pub locals: [f64; 4],
}

/// A state handler: reads/writes the shared [`HsmContext`] and returns
/// whether/how the event was handled.
pub type HsmHandler = fn(&mut HsmContext, HsmEvent) -> Response;

/// An atomic model whose behavior is a hierarchical state machine.
pub struct HsmWrapper {
    hsm: Hsm<HsmContext, HsmHandler>,
    context: HsmContext,
    started: bool,
}

impl HsmWrapper {
    /// Wraps an already-built [`Hsm`].
    pub fn new(hsm: Hsm<HsmContext, HsmHandler>) -> Self {
        Self { hsm, context: HsmContext::default(), started: false }
    }

    pub fn initialize(&mut self, _t: f64) -> f64 {
        if !self.started {
            self.hsm.start(&mut self.context);
            self.started = true;
        }
        f64::INFINITY
    }

    fn dispatch_event(&mut self, code: i32, value: f64) -> bool {
        self.context.inputs[0] = value;
        self.hsm.dispatch(&mut self.context, code)
    }

    pub fn delta_ext(&mut self, _t: f64, _e: f64, inputs: &[InputPort]) -> f64 {
        self.context.outputs.clear();

        if let Some(update_port) = inputs.get(1) {
            if let Some(message) = update_port.messages().last() {
                self.dispatch_event(PARAM_UPDATE_EVENT, message.get(0));
            }
        }
        if let Some(event_port) = inputs.first() {
            if let Some(message) = event_port.messages().last() {
                let code = message.get(0) as i32;
                self.dispatch_event(code, message.get(0));
            }
        }

        if self.context.outputs.is_empty() {
            f64::INFINITY
        } else {
            0.0
        }
    }

    pub fn delta_int(&mut self, _t: f64) -> f64 {
        self.context.outputs.clear();
        f64::INFINITY
    }

    pub fn lambda(&self) -> Message {
        self.context.outputs.last().copied().unwrap_or_default()
    }

    pub fn output_observation(&self, _t: f64, _e: f64) -> (f64, f64) {
        (self.hsm.current_state().0 as f64, 0.0)
    }

    /// Current leaf state, for tests and debugging tools.
    pub fn current_state(&self) -> StateId {
        self.hsm.current_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hsm::{Hsm, HsmEvent, Response, StateId};

    const ROOT: StateId = StateId(2);
    const IDLE: StateId = StateId(0);
    const RUNNING: StateId = StateId(1);

    fn root(_cx: &mut HsmContext, _event: HsmEvent) -> Response {
        Response::Unhandled
    }

    fn idle(cx: &mut HsmContext, event: HsmEvent) -> Response {
        match event {
            HsmEvent::External(1) => {
                cx.outputs.push(Message::one(1.0));
                Response::Transition(RUNNING)
            }
            _ => Response::Unhandled,
        }
    }

    fn running(cx: &mut HsmContext, event: HsmEvent) -> Response {
        match event {
            HsmEvent::External(0) => {
                cx.outputs.push(Message::one(0.0));
                Response::Transition(IDLE)
            }
            HsmEvent::External(code) if code == super::PARAM_UPDATE_EVENT => Response::Handled,
            _ => Response::Unhandled,
        }
    }

    fn build() -> HsmWrapper {
        let mut hsm: Hsm<HsmContext, HsmHandler> = Hsm::new();
        hsm.set_state(ROOT, root as HsmHandler, crate::hsm::INVALID_STATE, IDLE);
        hsm.set_state(IDLE, idle as HsmHandler, ROOT, crate::hsm::INVALID_STATE);
        hsm.set_state(RUNNING, running as HsmHandler, ROOT, crate::hsm::INVALID_STATE);
        HsmWrapper::new(hsm)
    }

    #[test]
    fn event_on_port_zero_drives_a_transition_and_emits_output() {
        let mut model = build();
        model.initialize(0.0);
        assert_eq!(model.current_state(), StateId(0));

        let mut port = InputPort::default();
        port.send(Message::one(1.0));
        let sigma = model.delta_ext(0.0, 0.0, &[port, InputPort::default()]);
        assert_eq!(sigma, 0.0);
        assert_eq!(model.current_state(), StateId(1));
        assert_eq!(model.lambda().get(0), 1.0);
    }

    #[test]
    fn param_update_is_applied_before_the_event_in_the_same_bag() {
        let mut model = build();
        model.initialize(0.0);

        let mut port = InputPort::default();
        port.send(Message::one(1.0));
        model.delta_ext(0.0, 0.0, &[port, InputPort::default()]);
        assert_eq!(model.current_state(), StateId(1));

        let mut event_port = InputPort::default();
        event_port.send(Message::one(0.0));
        let mut update_port = InputPort::default();
        update_port.send(Message::one(9.0));
        model.delta_ext(1.0, 0.0, &[event_port, update_port]);
        // "running" handles the update silently, then the real event moves
        // it back to "idle" — both applied in the order they were queued.
        assert_eq!(model.current_state(), StateId(0));
    }
}
