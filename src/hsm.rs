//! Hierarchical state machine, reusable by any atomic model that needs
//! nested states with guarded transitions (see [`crate::model::hsm`]).
//!
//! Ported from the original `HSM` template: up to 254 states, each with a
//! handler, a super-state and an optional default sub-state. `dispatch`
//! walks from the current state outward looking for a handler that accepts
//! the event; `transition` walks up to the least common ancestor of the
//! current and target states (invoking exit handlers), then down to the
//! target (invoking entry handlers), descending into default sub-states
//! afterward.
//!
//! Handlers may not call [`Hsm::transition`] or [`Hsm::dispatch`] directly;
//! instead a handler requests a transition via the [`Response`] it returns,
//! and the machine applies it once the handler returns. This mirrors the
//! "no dispatch from within a handler" contract: violating it from Rust
//! code is simply impossible, since handlers never see a `&mut Hsm`.

/// Maximum number of states a single [`Hsm`] can hold.
pub const MAX_STATES: usize = 254;
/// Sentinel meaning "no state" (invalid super-state, invalid sub-state, or
/// machine not yet started).
pub const INVALID_STATE: StateId = StateId(255);

/// Handle to one state in an [`Hsm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateId(pub u8);

/// The three kinds of event an [`Hsm`] handler can receive. External events
/// additionally carry a user-defined numeric payload (`id`), mirroring the
/// original's "event.id" slot; enter/exit events carry none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HsmEvent {
    /// Delivered once when a state is entered, innermost state last.
    Enter,
    /// Delivered once when a state is exited, innermost state first.
    Exit,
    /// An external event dispatched by [`Hsm::dispatch`].
    External(i32),
}

/// What a state handler asks the machine to do after processing an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// The event was not handled by this state; try the super-state.
    Unhandled,
    /// The event was handled, no transition requested.
    Handled,
    /// The event was handled and the machine should transition to `target`.
    Transition(StateId),
}

struct State<C, H: Fn(&mut C, HsmEvent) -> Response> {
    handler: Option<H>,
    super_id: StateId,
    sub_id: StateId,
    _marker: std::marker::PhantomData<fn(&mut C)>,
}

impl<C, H: Fn(&mut C, HsmEvent) -> Response> Default for State<C, H> {
    fn default() -> Self {
        Self {
            handler: None,
            super_id: INVALID_STATE,
            sub_id: INVALID_STATE,
            _marker: std::marker::PhantomData,
        }
    }
}

/// A hierarchical state machine over handlers `H: Fn(&mut C, HsmEvent) ->
/// Response`, where `C` is caller-defined per-machine context (e.g. the
/// owning model's scratch state) threaded through every handler call.
pub struct Hsm<C, H: Fn(&mut C, HsmEvent) -> Response> {
    states: Vec<State<C, H>>,
    top_state: StateId,
    current_state: StateId,
    source_state: StateId,
}

impl<C, H: Fn(&mut C, HsmEvent) -> Response> Hsm<C, H> {
    /// Creates an empty machine with no states registered.
    pub fn new() -> Self {
        Self {
            states: (0..MAX_STATES).map(|_| State::default()).collect(),
            top_state: INVALID_STATE,
            current_state: INVALID_STATE,
            source_state: INVALID_STATE,
        }
    }

    /// Registers (or overwrites) the handler for `id`. `super_id ==
    /// INVALID_STATE` marks `id` as the (unique) top state. `sub_id`, if
    /// not `INVALID_STATE`, is entered automatically whenever `id` becomes
    /// current.
    pub fn set_state(&mut self, id: StateId, handler: H, super_id: StateId, sub_id: StateId) {
        if super_id == INVALID_STATE {
            self.top_state = id;
        }
        self.states[id.0 as usize] = State {
            handler: Some(handler),
            super_id,
            sub_id,
            _marker: std::marker::PhantomData,
        };
    }

    /// Current (innermost) state, or [`INVALID_STATE`] before [`Hsm::start`].
    pub fn current_state(&self) -> StateId {
        self.current_state
    }

    /// Whether `id` is the current state or one of its ancestors.
    pub fn is_in_state(&self, id: StateId) -> bool {
        let mut sid = self.current_state;
        while sid != INVALID_STATE {
            if sid == id {
                return true;
            }
            sid = self.states[sid.0 as usize].super_id;
        }
        false
    }

    fn depth(&self, mut sid: StateId) -> usize {
        let mut depth = 0;
        while sid != INVALID_STATE {
            depth += 1;
            sid = self.states[sid.0 as usize].super_id;
        }
        depth
    }

    /// Least common ancestor of `a` and `b`, or `INVALID_STATE` if none
    /// (disjoint trees, which a well-formed single-top machine never has).
    fn least_common_ancestor(&self, a: StateId, b: StateId) -> StateId {
        let mut sid = a;
        loop {
            let mut t = b;
            loop {
                if sid == t {
                    return sid;
                }
                if t == INVALID_STATE {
                    break;
                }
                t = self.states[t.0 as usize].super_id;
            }
            if sid == INVALID_STATE {
                return INVALID_STATE;
            }
            sid = self.states[sid.0 as usize].super_id;
        }
    }

    /// Enters the top state (and its default sub-state chain), invoking
    /// `Enter` handlers from outermost to innermost.
    pub fn start(&mut self, cx: &mut C) {
        debug_assert!(self.top_state != INVALID_STATE, "no top state registered");
        self.current_state = self.top_state;
        self.invoke(self.top_state, cx, HsmEvent::Enter);
        self.descend_defaults(cx);
    }

    fn descend_defaults(&mut self, cx: &mut C) {
        loop {
            let sub = self.states[self.current_state.0 as usize].sub_id;
            if sub == INVALID_STATE {
                break;
            }
            self.enter_path(self.current_state, sub, cx);
            self.current_state = sub;
        }
    }

    fn enter_path(&mut self, from_exclusive: StateId, to: StateId, cx: &mut C) {
        let mut path = Vec::new();
        let mut sid = to;
        while sid != from_exclusive {
            path.push(sid);
            sid = self.states[sid.0 as usize].super_id;
        }
        for sid in path.into_iter().rev() {
            self.invoke(sid, cx, HsmEvent::Enter);
        }
    }

    fn invoke(&self, sid: StateId, cx: &mut C, event: HsmEvent) -> Response {
        match &self.states[sid.0 as usize].handler {
            Some(handler) => handler(cx, event),
            None => Response::Unhandled,
        }
    }

    /// Dispatches `event`, walking from the current state outward until a
    /// handler accepts it. Returns `true` if some state handled it. Any
    /// [`Response::Transition`] is applied automatically once the
    /// dispatching state returns.
    pub fn dispatch(&mut self, cx: &mut C, event: i32) -> bool {
        let mut sid = self.current_state;
        let mut handled = false;
        let mut requested_transition = None;

        while sid != INVALID_STATE {
            self.source_state = sid;
            match self.invoke(sid, cx, HsmEvent::External(event)) {
                Response::Unhandled => {
                    sid = self.states[sid.0 as usize].super_id;
                }
                Response::Handled => {
                    handled = true;
                    break;
                }
                Response::Transition(target) => {
                    handled = true;
                    requested_transition = Some(target);
                    break;
                }
            }
        }
        if let Some(target) = requested_transition {
            self.transition(target, cx);
        }
        self.source_state = INVALID_STATE;
        handled
    }

    /// Applies a transition to `target`, invoking exit handlers up to the
    /// least common ancestor of the current and target states, then entry
    /// handlers back down, and finally descending into `target`'s default
    /// sub-state chain if any.
    ///
    /// *HSM LCA property*: the number of exit invocations equals
    /// `depth(current) - depth(lca)` and the number of entry invocations
    /// equals `depth(target) - depth(lca)`.
    pub fn transition(&mut self, target: StateId, cx: &mut C) {
        // If a super-state (above `current_state`) is the one that handled
        // the event and requested this transition, exit everything between
        // the current leaf and that source state first, then continue
        // exiting up to the common ancestor of the *source* state and the
        // target — mirroring the original's two-phase exit walk.
        let source = if self.source_state != INVALID_STATE {
            self.source_state
        } else {
            self.current_state
        };

        let mut sid = self.current_state;
        while sid != source {
            self.invoke(sid, cx, HsmEvent::Exit);
            sid = self.states[sid.0 as usize].super_id;
        }

        let lca = self.least_common_ancestor(source, target);
        while sid != lca {
            self.invoke(sid, cx, HsmEvent::Exit);
            sid = self.states[sid.0 as usize].super_id;
        }

        self.enter_path(lca, target, cx);
        self.current_state = target;
        self.descend_defaults(cx);
    }

    /// Number of hops from `current_state` up to its common ancestor with
    /// `other`, exposed for tests validating the LCA property.
    pub fn exit_count_to(&self, other: StateId) -> usize {
        let lca = self.least_common_ancestor(self.current_state, other);
        self.depth(self.current_state) - self.depth(lca)
    }
}

impl<C, H: Fn(&mut C, HsmEvent) -> Response> Default for Hsm<C, H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    type Log = RefCell<Vec<&'static str>>;
    type BoxedHandler = Box<dyn Fn(&mut Log, HsmEvent) -> Response>;

    fn handler(name: &'static str) -> BoxedHandler {
        Box::new(move |log: &mut Log, event| {
            if let HsmEvent::Enter = event {
                log.borrow_mut().push(name);
            }
            Response::Handled
        })
    }

    // Three-level tree: A (top) > B > C, and A > E, B > D.
    fn build_tree() -> (Hsm<Log, BoxedHandler>, [StateId; 5]) {
        let a = StateId(0);
        let b = StateId(1);
        let c = StateId(2);
        let d = StateId(3);
        let e = StateId(4);

        let mut hsm: Hsm<Log, BoxedHandler> = Hsm::new();
        hsm.set_state(a, handler("A"), INVALID_STATE, b);
        hsm.set_state(b, handler("B"), a, c);
        hsm.set_state(c, handler("C"), b, INVALID_STATE);
        hsm.set_state(d, handler("D"), b, INVALID_STATE);
        hsm.set_state(e, handler("E"), a, INVALID_STATE);
        (hsm, [a, b, c, d, e])
    }

    #[test]
    fn start_enters_top_then_defaults() {
        let (mut hsm, [a, b, c, ..]) = build_tree();
        let mut log: Log = RefCell::new(Vec::new());
        hsm.start(&mut log);
        assert_eq!(*log.get_mut(), vec!["A", "B", "C"]);
        assert_eq!(hsm.current_state(), c);
        assert!(hsm.is_in_state(a));
        assert!(hsm.is_in_state(b));
    }

    #[test]
    fn sibling_transition_under_same_parent_exits_and_enters_once() {
        let (mut hsm, [a, b, _c, d, _e]) = build_tree();
        let mut log: Log = RefCell::new(Vec::new());
        hsm.start(&mut log);
        log.get_mut().clear();

        assert_eq!(hsm.exit_count_to(d), 1); // exit C only
        hsm.transition(d, &mut log);
        assert_eq!(hsm.current_state(), d);
        assert!(hsm.is_in_state(b));
        assert!(hsm.is_in_state(a));
        assert_eq!(*log.get_mut(), vec!["D"]);
    }

    #[test]
    fn cross_branch_transition_exits_two_enters_with_default_descent() {
        let (mut hsm, [a, b, _c, _d, e]) = build_tree();
        let mut log: Log = RefCell::new(Vec::new());
        hsm.start(&mut log);
        log.get_mut().clear();

        assert_eq!(hsm.exit_count_to(e), 2); // exit C, exit B
        hsm.transition(e, &mut log);
        assert_eq!(hsm.current_state(), e);
        assert!(hsm.is_in_state(a));
        assert!(!hsm.is_in_state(b));
        assert_eq!(*log.get_mut(), vec!["E"]);
    }

    #[test]
    fn dispatch_bubbles_up_to_first_handling_ancestor() {
        let a = StateId(0);
        let b = StateId(1);
        let mut hsm: Hsm<Log, BoxedHandler> = Hsm::new();
        hsm.set_state(
            a,
            Box::new(|_log: &mut Log, _event| Response::Handled),
            INVALID_STATE,
            INVALID_STATE,
        );
        hsm.set_state(
            b,
            Box::new(|_log: &mut Log, event| match event {
                HsmEvent::External(_) => Response::Unhandled,
                _ => Response::Handled,
            }),
            a,
            INVALID_STATE,
        );
        let mut log: Log = RefCell::new(Vec::new());
        hsm.start(&mut log);
        assert!(hsm.dispatch(&mut log, 1));
    }

    #[test]
    fn unhandled_event_bubbles_to_the_top_and_returns_false() {
        let a = StateId(0);
        let mut hsm: Hsm<Log, BoxedHandler> = Hsm::new();
        hsm.set_state(
            a,
            Box::new(|_log: &mut Log, _event| Response::Unhandled),
            INVALID_STATE,
            INVALID_STATE,
        );
        let mut log: Log = RefCell::new(Vec::new());
        hsm.start(&mut log);
        assert!(!hsm.dispatch(&mut log, 1));
    }

    #[test]
    fn transition_request_from_dispatch_is_applied_after_handler_returns() {
        let a = StateId(0);
        let b = StateId(1);
        let mut hsm: Hsm<Log, BoxedHandler> = Hsm::new();
        hsm.set_state(a, handler("A"), INVALID_STATE, INVALID_STATE);
        hsm.set_state(
            b,
            Box::new(|_log: &mut Log, event| match event {
                HsmEvent::External(_) => Response::Transition(StateId(0)),
                _ => Response::Handled,
            }),
            INVALID_STATE,
            INVALID_STATE,
        );
        hsm.current_state = b;
        let mut log: Log = RefCell::new(Vec::new());
        assert!(hsm.dispatch(&mut log, 42));
        assert_eq!(hsm.current_state(), a);
    }
}
