//! The atomic model library: every built-in model is a variant of the
//! closed [`ModelKind`] union, dispatched through a handful of free
//! functions rather than through a trait object. A simulation that needs a
//! model kind this crate doesn't provide is expected to add a variant here,
//! not to reach for `Box<dyn Trait>` — closing the union keeps every
//! model's behavior visible from one place and lets the driver store models
//! inline in its [`crate::arena::Arena`] without an allocation per model.

pub mod arithmetic;
pub mod generator;
pub mod hsm_wrapper;
pub mod logic;
pub mod qss;
pub mod queue;

use crate::arena::Id;
use crate::heap::HeapSlot;
use crate::message::{InputPort, Message, OutputPort};
use crate::observer::ObserverId;

/// Handle to a model stored in the simulation's arena.
pub type ModelId = Id<ModelRecord>;

/// Every built-in atomic model, tagged by kind. Shared bookkeeping (time of
/// last event, next-event time, ports) lives on [`ModelRecord`]; this enum
/// holds only the kind-specific state and transition logic.
pub enum ModelKind {
    Qss(qss::QssIntegrator),
    Sum(arithmetic::Sum),
    WeightedSum(arithmetic::WeightedSum),
    Multiplier(arithmetic::Multiplier),
    Power(arithmetic::Power),
    Cross(arithmetic::Cross),
    Filter(arithmetic::Filter),
    LogicalAnd(logic::LogicalAnd),
    LogicalOr(logic::LogicalOr),
    LogicalInvert(logic::LogicalInvert),
    Constant(generator::Constant),
    Generator(generator::Generator),
    TimeFunction(generator::TimeFunction),
    Counter(generator::Counter),
    Accumulator(generator::Accumulator),
    FifoQueue(queue::FifoQueue),
    DynamicQueue(queue::DynamicQueue),
    PriorityQueue(queue::PriorityQueue),
    HsmWrapper(hsm_wrapper::HsmWrapper),
}

impl ModelKind {
    /// Runs the model's `initialize`, returning the resulting `sigma`.
    pub fn initialize(&mut self, t: f64) -> f64 {
        match self {
            ModelKind::Qss(m) => m.initialize(t),
            ModelKind::Sum(m) => m.initialize(t),
            ModelKind::WeightedSum(m) => m.initialize(t),
            ModelKind::Multiplier(m) => m.initialize(t),
            ModelKind::Power(m) => m.initialize(t),
            ModelKind::Cross(m) => m.initialize(t),
            ModelKind::Filter(m) => m.initialize(t),
            ModelKind::LogicalAnd(m) => m.initialize(t),
            ModelKind::LogicalOr(m) => m.initialize(t),
            ModelKind::LogicalInvert(m) => m.initialize(t),
            ModelKind::Constant(m) => m.initialize(t),
            ModelKind::Generator(m) => m.initialize(t),
            ModelKind::TimeFunction(m) => m.initialize(t),
            ModelKind::Counter(m) => m.initialize(t),
            ModelKind::Accumulator(m) => m.initialize(t),
            ModelKind::FifoQueue(m) => m.initialize(t),
            ModelKind::DynamicQueue(m) => m.initialize(t),
            ModelKind::PriorityQueue(m) => m.initialize(t),
            ModelKind::HsmWrapper(m) => m.initialize(t),
        }
    }

    /// Runs the model's `delta_int`, returning the resulting `sigma`.
    pub fn delta_int(&mut self, t: f64) -> f64 {
        match self {
            ModelKind::Qss(m) => m.delta_int(t),
            ModelKind::Sum(m) => m.delta_int(t),
            ModelKind::WeightedSum(m) => m.delta_int(t),
            ModelKind::Multiplier(m) => m.delta_int(t),
            ModelKind::Power(m) => m.delta_int(t),
            ModelKind::Cross(m) => m.delta_int(t),
            ModelKind::Filter(m) => m.delta_int(t),
            ModelKind::LogicalAnd(m) => m.delta_int(t),
            ModelKind::LogicalOr(m) => m.delta_int(t),
            ModelKind::LogicalInvert(m) => m.delta_int(t),
            ModelKind::Constant(m) => m.delta_int(t),
            ModelKind::Generator(m) => m.delta_int(t),
            ModelKind::TimeFunction(m) => m.delta_int(t),
            ModelKind::Counter(m) => m.delta_int(t),
            ModelKind::Accumulator(m) => m.delta_int(t),
            ModelKind::FifoQueue(m) => m.delta_int(t),
            ModelKind::DynamicQueue(m) => m.delta_int(t),
            ModelKind::PriorityQueue(m) => m.delta_int(t),
            ModelKind::HsmWrapper(m) => m.delta_int(t),
        }
    }

    /// Runs the model's `delta_ext`, returning the resulting `sigma`.
    pub fn delta_ext(&mut self, t: f64, e: f64, inputs: &[InputPort]) -> f64 {
        match self {
            ModelKind::Qss(m) => m.delta_ext(t, e, inputs),
            ModelKind::Sum(m) => m.delta_ext(t, e, inputs),
            ModelKind::WeightedSum(m) => m.delta_ext(t, e, inputs),
            ModelKind::Multiplier(m) => m.delta_ext(t, e, inputs),
            ModelKind::Power(m) => m.delta_ext(t, e, inputs),
            ModelKind::Cross(m) => m.delta_ext(t, e, inputs),
            ModelKind::Filter(m) => m.delta_ext(t, e, inputs),
            ModelKind::LogicalAnd(m) => m.delta_ext(t, e, inputs),
            ModelKind::LogicalOr(m) => m.delta_ext(t, e, inputs),
            ModelKind::LogicalInvert(m) => m.delta_ext(t, e, inputs),
            ModelKind::Constant(m) => m.delta_ext(t, e, inputs),
            ModelKind::Generator(m) => m.delta_ext(t, e, inputs),
            ModelKind::TimeFunction(m) => m.delta_ext(t, e, inputs),
            ModelKind::Counter(m) => m.delta_ext(t, e, inputs),
            ModelKind::Accumulator(m) => m.delta_ext(t, e, inputs),
            ModelKind::FifoQueue(m) => m.delta_ext(t, e, inputs),
            ModelKind::DynamicQueue(m) => m.delta_ext(t, e, inputs),
            ModelKind::PriorityQueue(m) => m.delta_ext(t, e, inputs),
            ModelKind::HsmWrapper(m) => m.delta_ext(t, e, inputs),
        }
    }

    /// Runs the model's `delta_con`. Every kind here uses the default
    /// confluent contract (`delta_int` then `delta_ext` with `e = 0`)
    /// except the HSM wrapper, which applies both queued events through a
    /// single `dispatch` pass in [`hsm_wrapper::HsmWrapper::delta_ext`]
    /// (parameter update before event), so its `delta_ext` alone already
    /// implements the confluent behavior.
    pub fn delta_con(&mut self, t: f64, inputs: &[InputPort]) -> f64 {
        match self {
            ModelKind::HsmWrapper(m) => m.delta_ext(t, 0.0, inputs),
            other => {
                other.delta_int(t);
                other.delta_ext(t, 0.0, inputs)
            }
        }
    }

    /// Message emitted on the model's (sole, by convention) output port
    /// just before `delta_int` runs.
    pub fn lambda(&self) -> Message {
        match self {
            ModelKind::Qss(m) => m.lambda(),
            ModelKind::Sum(m) => m.lambda(),
            ModelKind::WeightedSum(m) => m.lambda(),
            ModelKind::Multiplier(m) => m.lambda(),
            ModelKind::Power(m) => m.lambda(),
            ModelKind::Cross(m) => m.lambda(),
            ModelKind::Filter(m) => m.lambda(),
            ModelKind::LogicalAnd(m) => m.lambda(),
            ModelKind::LogicalOr(m) => m.lambda(),
            ModelKind::LogicalInvert(m) => m.lambda(),
            ModelKind::Constant(m) => m.lambda(),
            ModelKind::Generator(m) => m.lambda(),
            ModelKind::TimeFunction(m) => m.lambda(),
            ModelKind::Counter(m) => m.lambda(),
            ModelKind::Accumulator(m) => m.lambda(),
            ModelKind::FifoQueue(m) => m.lambda(),
            ModelKind::DynamicQueue(m) => m.lambda(),
            ModelKind::PriorityQueue(m) => m.lambda(),
            ModelKind::HsmWrapper(m) => m.lambda(),
        }
    }

    /// `(x, y)` pair sampled by the observer pipeline.
    pub fn output_observation(&self, t: f64, e: f64) -> (f64, f64) {
        match self {
            ModelKind::Qss(m) => m.output_observation(t, e),
            ModelKind::Sum(m) => m.output_observation(t, e),
            ModelKind::WeightedSum(m) => m.output_observation(t, e),
            ModelKind::Multiplier(m) => m.output_observation(t, e),
            ModelKind::Power(m) => m.output_observation(t, e),
            ModelKind::Cross(m) => m.output_observation(t, e),
            ModelKind::Filter(m) => m.output_observation(t, e),
            ModelKind::LogicalAnd(m) => m.output_observation(t, e),
            ModelKind::LogicalOr(m) => m.output_observation(t, e),
            ModelKind::LogicalInvert(m) => m.output_observation(t, e),
            ModelKind::Constant(m) => m.output_observation(t, e),
            ModelKind::Generator(m) => m.output_observation(t, e),
            ModelKind::TimeFunction(m) => m.output_observation(t, e),
            ModelKind::Counter(m) => m.output_observation(t, e),
            ModelKind::Accumulator(m) => m.output_observation(t, e),
            ModelKind::FifoQueue(m) => m.output_observation(t, e),
            ModelKind::DynamicQueue(m) => m.output_observation(t, e),
            ModelKind::PriorityQueue(m) => m.output_observation(t, e),
            ModelKind::HsmWrapper(m) => m.output_observation(t, e),
        }
    }

    /// A short, stable name for diagnostics, archiving and DOT export.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ModelKind::Qss(_) => "qss",
            ModelKind::Sum(_) => "sum",
            ModelKind::WeightedSum(_) => "wsum",
            ModelKind::Multiplier(_) => "multiplier",
            ModelKind::Power(_) => "power",
            ModelKind::Cross(_) => "cross",
            ModelKind::Filter(_) => "filter",
            ModelKind::LogicalAnd(_) => "logical_and",
            ModelKind::LogicalOr(_) => "logical_or",
            ModelKind::LogicalInvert(_) => "logical_invert",
            ModelKind::Constant(_) => "constant",
            ModelKind::Generator(_) => "generator",
            ModelKind::TimeFunction(_) => "time_func",
            ModelKind::Counter(_) => "counter",
            ModelKind::Accumulator(_) => "accumulator",
            ModelKind::FifoQueue(_) => "queue_fifo",
            ModelKind::DynamicQueue(_) => "queue_dynamic",
            ModelKind::PriorityQueue(_) => "queue_priority",
            ModelKind::HsmWrapper(_) => "hsm_wrapper",
        }
    }

    /// Stable wire tag used by the binary archiver. Order is append-only:
    /// existing tags must never be renumbered once an archive exists with
    /// them in it.
    pub fn archive_tag(&self) -> u8 {
        match self {
            ModelKind::Qss(_) => 0,
            ModelKind::Sum(_) => 1,
            ModelKind::WeightedSum(_) => 2,
            ModelKind::Multiplier(_) => 3,
            ModelKind::Power(_) => 4,
            ModelKind::Cross(_) => 5,
            ModelKind::Filter(_) => 6,
            ModelKind::LogicalAnd(_) => 7,
            ModelKind::LogicalOr(_) => 8,
            ModelKind::LogicalInvert(_) => 9,
            ModelKind::Constant(_) => 10,
            ModelKind::Generator(_) => 11,
            ModelKind::TimeFunction(_) => 12,
            ModelKind::Counter(_) => 13,
            ModelKind::Accumulator(_) => 14,
            ModelKind::FifoQueue(_) => 15,
            ModelKind::DynamicQueue(_) => 16,
            ModelKind::PriorityQueue(_) => 17,
            ModelKind::HsmWrapper(_) => 18,
        }
    }

    /// Parameters needed to rebuild an equivalent, freshly-initialized model
    /// of this kind (not a full mid-run state snapshot: queues' pending
    /// jobs, counters' running totals and similar in-flight state reset to
    /// their construction-time defaults on reload). `input_count` is the
    /// model's current input arity, needed by the variadic kinds (`Sum`,
    /// `Multiplier`, the logical gates) since they don't carry their own
    /// arity in any field.
    pub fn archive_params(&self) -> Vec<f64> {
        match self {
            ModelKind::Qss(m) => m.archive_params().to_vec(),
            ModelKind::Sum(_) => Vec::new(),
            ModelKind::WeightedSum(m) => m.archive_params().to_vec(),
            ModelKind::Multiplier(_) => Vec::new(),
            ModelKind::Power(m) => m.archive_params().to_vec(),
            ModelKind::Cross(m) => m.archive_params().to_vec(),
            ModelKind::Filter(m) => m.archive_params().to_vec(),
            ModelKind::LogicalAnd(_) => Vec::new(),
            ModelKind::LogicalOr(_) => Vec::new(),
            ModelKind::LogicalInvert(_) => Vec::new(),
            ModelKind::Constant(m) => m.archive_params().to_vec(),
            ModelKind::Generator(m) => m.archive_params().to_vec(),
            ModelKind::TimeFunction(m) => m.archive_params().to_vec(),
            ModelKind::Counter(_) => Vec::new(),
            ModelKind::Accumulator(_) => Vec::new(),
            ModelKind::FifoQueue(m) => m.archive_params().to_vec(),
            ModelKind::DynamicQueue(_) => Vec::new(),
            ModelKind::PriorityQueue(m) => m.archive_params().to_vec(),
            ModelKind::HsmWrapper(_) => Vec::new(),
        }
    }

    /// Resolves a [`kind_name`](Self::kind_name) back to the numeric tag
    /// [`archive_tag`](Self::archive_tag) assigns it. Used by formats (JSON)
    /// that store the kind as a name rather than a raw byte.
    pub fn tag_for_kind_name(name: &str) -> Option<u8> {
        Some(match name {
            "qss" => 0,
            "sum" => 1,
            "wsum" => 2,
            "multiplier" => 3,
            "power" => 4,
            "cross" => 5,
            "filter" => 6,
            "logical_and" => 7,
            "logical_or" => 8,
            "logical_invert" => 9,
            "constant" => 10,
            "generator" => 11,
            "time_func" => 12,
            "counter" => 13,
            "accumulator" => 14,
            "queue_fifo" => 15,
            "queue_dynamic" => 16,
            "queue_priority" => 17,
            "hsm_wrapper" => 18,
            _ => return None,
        })
    }

    /// Rebuilds a model kind from an [`archive_tag`](Self::archive_tag), its
    /// [`archive_params`](Self::archive_params) and its port arities.
    /// `HsmWrapper` cannot be rebuilt this way (its handlers are function
    /// pointers with no stable wire identity) and always errors.
    pub fn from_archive(
        tag: u8,
        input_count: usize,
        params: &[f64],
    ) -> std::result::Result<Self, crate::error::IoError> {
        let fmt_err = |msg: &str| crate::error::IoError::Format(msg.to_string());
        Ok(match tag {
            0 => {
                if params.len() < 3 {
                    return Err(fmt_err("qss archive record missing level/dq/x0"));
                }
                ModelKind::Qss(qss::QssIntegrator::new(params[0] as u8, params[2], params[1]))
            }
            1 => ModelKind::Sum(arithmetic::Sum::new(input_count)),
            2 => ModelKind::WeightedSum(arithmetic::WeightedSum::new(params.to_vec())),
            3 => ModelKind::Multiplier(arithmetic::Multiplier::new(input_count)),
            4 => {
                let exponent = *params.first().ok_or_else(|| fmt_err("power archive record missing exponent"))?;
                ModelKind::Power(arithmetic::Power::new(exponent))
            }
            5 => {
                if params.len() < 2 {
                    return Err(fmt_err("cross archive record missing signal/threshold"));
                }
                ModelKind::Cross(arithmetic::Cross::new(params[0], params[1]))
            }
            6 => {
                if params.len() < 2 {
                    return Err(fmt_err("filter archive record missing lower/upper threshold"));
                }
                ModelKind::Filter(arithmetic::Filter::new(params[0], params[1]))
            }
            7 => ModelKind::LogicalAnd(logic::LogicalAnd::new(input_count)),
            8 => ModelKind::LogicalOr(logic::LogicalOr::new(input_count)),
            9 => ModelKind::LogicalInvert(logic::LogicalInvert::new()),
            10 => {
                let value = *params.first().ok_or_else(|| fmt_err("constant archive record missing value"))?;
                ModelKind::Constant(generator::Constant::new(value))
            }
            11 => {
                let next_ta = *params.first().ok_or_else(|| fmt_err("generator archive record missing next_ta"))?;
                let value_source = crate::source::Source::Constant { values: vec![0.0], position: 0 };
                ModelKind::Generator(generator::Generator::periodic(value_source, next_ta))
            }
            12 => {
                if params.len() < 5 {
                    return Err(fmt_err("time_func archive record missing waveform/dt"));
                }
                ModelKind::TimeFunction(generator::TimeFunction::from_archive_params(params))
            }
            13 => ModelKind::Counter(generator::Counter::new()),
            14 => ModelKind::Accumulator(generator::Accumulator::new()),
            15 => {
                let service_time = *params.first().ok_or_else(|| fmt_err("queue_fifo archive record missing service_time"))?;
                ModelKind::FifoQueue(queue::FifoQueue::new(service_time))
            }
            16 => {
                let source = crate::source::Source::Constant { values: vec![0.0], position: 0 };
                ModelKind::DynamicQueue(queue::DynamicQueue::new(source))
            }
            17 => {
                let service_time = *params
                    .first()
                    .ok_or_else(|| fmt_err("queue_priority archive record missing service_time"))?;
                ModelKind::PriorityQueue(queue::PriorityQueue::new(service_time))
            }
            18 => return Err(fmt_err("hsm_wrapper models cannot be rebuilt from an archive")),
            other => return Err(fmt_err(&format!("unknown model kind tag {other}"))),
        })
    }
}

/// An instantiated model: the kind-specific state plus everything the
/// simulation driver needs to schedule and route messages for it.
pub struct ModelRecord {
    /// Simulated time of the model's last transition.
    pub t_last: f64,
    /// Time until the next internal transition (`time_advance`).
    pub sigma: f64,
    /// Input ports, indexed by port number.
    pub inputs: Vec<InputPort>,
    /// Output ports, indexed by port number.
    pub outputs: Vec<OutputPort<ModelId>>,
    /// Observer attached to this model, if any.
    pub observer: Option<ObserverId>,
    /// This model's slot in the scheduler's time heap, once initialized.
    pub heap_slot: Option<HeapSlot>,
    /// The model's behavior.
    pub kind: ModelKind,
}

impl ModelRecord {
    /// Creates a model record with `input_count`/`output_count` empty
    /// ports and no observer or heap slot yet.
    pub fn new(kind: ModelKind, input_count: usize, output_count: usize) -> Self {
        Self {
            t_last: 0.0,
            sigma: f64::INFINITY,
            inputs: (0..input_count).map(|_| InputPort::default()).collect(),
            outputs: (0..output_count).map(|_| OutputPort::default()).collect(),
            observer: None,
            heap_slot: None,
            kind,
        }
    }

    /// Clears every input port's queue, run at the end of a bag.
    pub fn clear_inputs(&mut self) {
        for port in &mut self.inputs {
            port.clear();
        }
    }

    /// Whether any input port currently holds a pending message.
    pub fn has_pending_input(&self) -> bool {
        self.inputs.iter().any(|p| !p.is_empty())
    }
}
