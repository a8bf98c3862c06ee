//! Black-box scenarios exercised through the public `SimInit`/`Simulation`
//! surface, plus the DOT and JSON interchange layers. Each test builds a
//! topology the way an external caller would, never reaching into crate
//! internals.

use qdevs::dot::{parse_dot_buffer, write_dot_buffer, DotEdge, DotGraph, DotNode};
use qdevs::hsm::{Hsm, HsmEvent, Response, StateId, INVALID_STATE};
use qdevs::json::{from_json, to_json, PrettyOption};
use qdevs::model::arithmetic::{Cross, WeightedSum};
use qdevs::model::generator::{Constant, Counter, Generator};
use qdevs::model::hsm_wrapper::{HsmContext, HsmHandler, HsmWrapper};
use qdevs::model::qss::QssIntegrator;
use qdevs::model::{ModelKind, ModelRecord};
use qdevs::simulation::SimInit;
use qdevs::source::Source;

/// A generator with a fixed inter-arrival time of `1.0` feeding a counter:
/// running until `t = 30` should count exactly 30 arrivals, one at every
/// integer tick from 1 through 30 (not 31 — the generator must not also
/// fire at `t = 0`).
#[test]
fn counter_under_generator_reaches_exact_count_after_thirty_ticks() {
    let mut sim = SimInit::new();
    let value_source = Source::Constant { values: vec![1.0], position: 0 };
    let generator = sim.add_model(ModelRecord::new(ModelKind::Generator(Generator::periodic(value_source, 1.0)), 0, 1));
    let counter = sim.add_model(ModelRecord::new(ModelKind::Counter(Counter::new()), 1, 1));
    sim.connect(generator, 0, counter, 0).unwrap();

    let mut running = sim.init(0.0).unwrap();
    running.run_until(30.0).unwrap();

    let ModelKind::Counter(counter) = &running.model(counter).unwrap().kind else {
        panic!("expected counter model");
    };
    assert_eq!(counter.value(), 30);
}

/// A harmonic oscillator (`ẍ = −x`) realized as a chain of three level-3
/// QSS integrators — `x` (position), `v` (velocity, `x' = v`) and `a`
/// (acceleration, `v' = a`, `a' = −v`) — cross-coupled through a negating
/// [`WeightedSum`]. Each integrator is seeded with the exact analytic
/// Taylor coefficients of `cos t`/`-sin t`/`-cos t` at `t = 0`: a fresh
/// integrator otherwise assumes every derivative starts at zero, which
/// deadlocks a closed loop that depends on itself for its first nonzero
/// slope. Simulated time must never go backwards, and once resampled onto
/// a fixed time step the position trace must track `cos t` within the
/// configured quantum's tolerance.
#[test]
fn qss3_chain_tracks_cosine_within_tolerance() {
    let dq = 1e-4;
    let mut sim = SimInit::new();

    let mut x_state = QssIntegrator::new(3, 1.0, dq);
    x_state.seed_derivatives(&[0.0, -0.5, 0.0]);
    let x = sim.add_model(ModelRecord::new(ModelKind::Qss(x_state), 1, 1));

    let mut v_state = QssIntegrator::new(3, 0.0, dq);
    v_state.seed_derivatives(&[-1.0, 0.0, 1.0 / 6.0]);
    let v = sim.add_model(ModelRecord::new(ModelKind::Qss(v_state), 1, 1));

    let mut a_state = QssIntegrator::new(3, -1.0, dq);
    a_state.seed_derivatives(&[0.0, 0.5, 0.0]);
    let a = sim.add_model(ModelRecord::new(ModelKind::Qss(a_state), 1, 1));

    let negate_v = sim.add_model(ModelRecord::new(ModelKind::WeightedSum(WeightedSum::new(vec![-1.0])), 1, 1));

    sim.connect(v, 0, x, 0).unwrap(); // x' = v
    sim.connect(a, 0, v, 0).unwrap(); // v' = a
    sim.connect(v, 0, negate_v, 0).unwrap();
    sim.connect(negate_v, 0, a, 0).unwrap(); // a' = -v

    let time_step = 0.01;
    let observer = sim.observe(x, 256, 2200, time_step).unwrap();

    let mut running = sim.init(0.0).unwrap();

    let mut last_time = running.time();
    for _ in 0..500_000 {
        match running.step().unwrap() {
            Some(t) => {
                assert!(t >= last_time, "simulated time must never move backwards");
                last_time = t;
                if t >= 20.0 {
                    break;
                }
            }
            None => break,
        }
    }

    let view = running.observer(observer).unwrap().read_only_linearized();
    let mut max_error = 0.0_f64;
    let mut checked = 0;
    for sample in view.samples() {
        if sample.t > 20.0 {
            continue;
        }
        max_error = max_error.max((sample.x - sample.t.cos()).abs());
        checked += 1;
    }
    assert!(checked > 1000, "expected a dense linearized trajectory, got {checked} samples");
    assert!(max_error <= 5e-3, "max |x(t) - cos t| = {max_error} exceeds tolerance");
}

/// A leaky integrator (`v' = -v + I`) wired to a zero-crossing detector and
/// a counter: with a constant input current above the firing threshold the
/// membrane potential rises monotonically from rest and crosses the
/// threshold exactly once, so the spike counter should read exactly `1`
/// once the system has settled.
#[test]
fn leaky_integrate_and_fire_neuron_fires_exactly_once() {
    let mut sim = SimInit::new();

    let membrane = sim.add_model(ModelRecord::new(ModelKind::Qss(QssIntegrator::new(1, 0.0, 0.01)), 1, 1));
    let leak_and_input = sim.add_model(ModelRecord::new(ModelKind::WeightedSum(WeightedSum::new(vec![-1.0, 1.0])), 2, 1));
    let input_current = sim.add_model(ModelRecord::new(ModelKind::Constant(Constant::new(2.0)), 0, 1));
    let threshold = sim.add_model(ModelRecord::new(ModelKind::Cross(Cross::new(0.0, 1.0)), 1, 1));
    let spikes = sim.add_model(ModelRecord::new(ModelKind::Counter(Counter::new()), 1, 0));

    sim.connect(membrane, 0, leak_and_input, 0).unwrap();
    sim.connect(input_current, 0, leak_and_input, 1).unwrap();
    sim.connect(leak_and_input, 0, membrane, 0).unwrap();
    sim.connect(membrane, 0, threshold, 0).unwrap();
    sim.connect(threshold, 0, spikes, 0).unwrap();

    let mut running = sim.init(0.0).unwrap();
    running.run_until(10.0).unwrap();

    let ModelKind::Counter(spike_counter) = &running.model(spikes).unwrap().kind else {
        panic!("expected counter model");
    };
    assert_eq!(spike_counter.value(), 1);
}

/// A DOT graph with node attributes and an edge chain survives a
/// write-then-parse round trip with every attribute preserved.
#[test]
fn dot_round_trip_preserves_node_attributes_and_edges() {
    let mut graph = DotGraph::default();
    graph.nodes.push(DotNode {
        name: "source".to_string(),
        id: Some("src-1".to_string()),
        area: Some(2.5),
        pos: Some((0.0, 1.0)),
    });
    graph.nodes.push(DotNode {
        name: "sink".to_string(),
        id: None,
        area: None,
        pos: Some((4.0, 1.0)),
    });
    graph.edges.push(DotEdge { from: "source".to_string(), to: "sink".to_string() });

    let text = write_dot_buffer(&graph);
    let parsed = parse_dot_buffer(&text).unwrap();

    assert_eq!(parsed.nodes.len(), 2);
    let src = parsed.nodes.iter().find(|n| n.name == "source").unwrap();
    assert_eq!(src.id.as_deref(), Some("src-1"));
    assert_eq!(src.area, Some(2.5));
    assert_eq!(src.pos, Some((0.0, 1.0)));
    assert_eq!(parsed.edges.len(), 1);
    assert_eq!(parsed.edges[0].from, "source");
    assert_eq!(parsed.edges[0].to, "sink");
}

/// Connecting the same `(model, port)` pair twice through the public
/// `SimInit` API is rejected the second time, not silently duplicated.
#[test]
fn duplicate_connection_is_rejected_at_the_public_api() {
    let mut sim = SimInit::new();
    let source = sim.add_model(ModelRecord::new(ModelKind::Constant(Constant::new(1.0)), 0, 1));
    let sink = sim.add_model(ModelRecord::new(ModelKind::Counter(Counter::new()), 1, 1));
    sim.connect(source, 0, sink, 0).unwrap();
    assert!(sim.connect(source, 0, sink, 0).is_err());
    assert_eq!(sim.connections().len(), 1);
}

/// A three-level hierarchical state machine, wrapped as an atomic model
/// inside a full simulation: an external event crossing branches exits up
/// to the least common ancestor and re-enters through its default child.
#[test]
fn hierarchical_state_machine_enter_exit_path_through_full_simulation() {
    const ROOT: StateId = StateId(0);
    const LEFT: StateId = StateId(1);
    const LEFT_CHILD: StateId = StateId(2);
    const RIGHT: StateId = StateId(3);
    const RIGHT_CHILD: StateId = StateId(4);

    fn root(_cx: &mut HsmContext, _event: HsmEvent) -> Response {
        Response::Unhandled
    }
    fn left(_cx: &mut HsmContext, _event: HsmEvent) -> Response {
        Response::Unhandled
    }
    fn left_child(cx: &mut HsmContext, event: HsmEvent) -> Response {
        match event {
            HsmEvent::External(1) => {
                cx.outputs.push(qdevs::message::Message::one(1.0));
                Response::Transition(RIGHT_CHILD)
            }
            _ => Response::Unhandled,
        }
    }
    fn right(_cx: &mut HsmContext, _event: HsmEvent) -> Response {
        Response::Unhandled
    }
    fn right_child(_cx: &mut HsmContext, _event: HsmEvent) -> Response {
        Response::Unhandled
    }

    let mut hsm: Hsm<HsmContext, HsmHandler> = Hsm::new();
    hsm.set_state(ROOT, root as HsmHandler, INVALID_STATE, LEFT);
    hsm.set_state(LEFT, left as HsmHandler, ROOT, LEFT_CHILD);
    hsm.set_state(LEFT_CHILD, left_child as HsmHandler, LEFT, INVALID_STATE);
    hsm.set_state(RIGHT, right as HsmHandler, ROOT, RIGHT_CHILD);
    hsm.set_state(RIGHT_CHILD, right_child as HsmHandler, RIGHT, INVALID_STATE);

    let mut sim = SimInit::new();
    let wrapper = sim.add_model(ModelRecord::new(ModelKind::HsmWrapper(HsmWrapper::new(hsm)), 2, 1));
    let event_source = sim.add_model(ModelRecord::new(ModelKind::Constant(Constant::new(1.0)), 0, 1));
    sim.connect(event_source, 0, wrapper, 0).unwrap();

    let mut running = sim.init(0.0).unwrap();
    running.run_until(1.0).unwrap();

    let ModelKind::HsmWrapper(hsm_model) = &running.model(wrapper).unwrap().kind else {
        panic!("expected hsm wrapper model");
    };
    assert_eq!(hsm_model.current_state(), RIGHT_CHILD);
}

/// Building a small component through [`SimInit`], exporting it to JSON and
/// reloading it reconstructs the same models, connections and source.
#[test]
fn json_export_then_import_reconstructs_the_same_topology() {
    let mut sim = SimInit::new();
    let source = sim.add_model(ModelRecord::new(ModelKind::Constant(Constant::new(5.0)), 0, 1));
    let sink = sim.add_model(ModelRecord::new(ModelKind::Counter(Counter::new()), 1, 1));
    sim.connect(source, 0, sink, 0).unwrap();

    let text = to_json(&sim, PrettyOption::Indent2).unwrap();
    let loaded = from_json(&text).unwrap();

    assert_eq!(loaded.sim_init.model_ids().len(), 2);
    assert_eq!(loaded.sim_init.connections().len(), 1);

    let compact = to_json(&sim, PrettyOption::Off).unwrap();
    assert!(!compact.contains('\n'));
}
