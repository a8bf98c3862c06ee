//! The simulation driver: a flat model builder ([`SimInit`]) and the
//! stepping engine it hands off to ([`Simulation`]).
//!
//! `SimInit` accumulates models, connections, observers and sources, then
//! [`SimInit::init`] consumes it and calls every model's `initialize`,
//! seeding the scheduler's time heap. From there [`Simulation::step`] drains
//! one bag at a time: collect every model imminent at the earliest
//! scheduled time, call `lambda` on each and route its message, classify
//! every touched model as imminent/influenced/confluent, call the matching
//! transition, reschedule it, and sample its observer.

use crate::arena::Arena;
use crate::error::{Result, SimulationError, TopologyError};
use crate::heap::TimeHeap;
use crate::message::{ConnectionTarget, Message, MessagePool};
use crate::model::{ModelId, ModelRecord};
use crate::observer::{Observation, Observer, ObserverId};
use crate::source::{Source, SourceId};

/// Accumulates models, connections, observers and sources before the
/// simulation starts running.
#[derive(Default)]
pub struct SimInit {
    models: Arena<ModelRecord>,
    observers: Arena<Observer>,
    sources: Arena<Source>,
}

impl SimInit {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a model with `input_count`/`output_count` ports, returning its
    /// handle.
    pub fn add_model(&mut self, record: ModelRecord) -> ModelId {
        self.models
            .alloc(record)
            .expect("model arena has unbounded capacity")
    }

    /// Connects `from`'s output port `out_port` to `to`'s input port
    /// `in_port`. Idempotent: connecting the same pair twice is a no-op.
    /// Fails if either model or port index does not exist.
    pub fn connect(&mut self, from: ModelId, out_port: u8, to: ModelId, in_port: u8) -> Result<()> {
        let to_record = self
            .models
            .get(to)
            .ok_or(SimulationError::Topology(TopologyError::UnknownModel(to.index())))?;
        if in_port as usize >= to_record.inputs.len() {
            return Err(SimulationError::Topology(TopologyError::UnknownModelPort {
                model: to.index(),
                port: in_port,
            }));
        }

        let from_record = self
            .models
            .get_mut(from)
            .ok_or(SimulationError::Topology(TopologyError::UnknownModel(from.index())))?;
        let port = from_record
            .outputs
            .get_mut(out_port as usize)
            .ok_or(SimulationError::Topology(TopologyError::UnknownModelPort {
                model: from.index(),
                port: out_port,
            }))?;

        if !port.connect(ConnectionTarget { model: to, port: in_port }) {
            return Err(SimulationError::Topology(TopologyError::ModelConnectAlreadyExist));
        }
        Ok(())
    }

    /// Attaches an observer to `model`, returning its handle.
    pub fn observe(&mut self, model: ModelId, raw_capacity: usize, linearized_capacity: usize, time_step: f64) -> Result<ObserverId> {
        let observer_id = self
            .observers
            .alloc(Observer::new(raw_capacity, linearized_capacity, time_step))
            .expect("observer arena has unbounded capacity");
        let record = self
            .models
            .get_mut(model)
            .ok_or(SimulationError::Topology(TopologyError::UnknownModel(model.index())))?;
        record.observer = Some(observer_id);
        Ok(observer_id)
    }

    /// Registers a source in the shared registry, returning its handle.
    pub fn add_source(&mut self, source: Source) -> SourceId {
        self.sources
            .alloc(source)
            .expect("source arena has unbounded capacity")
    }

    /// Read-only access to a registered source, e.g. for JSON export.
    pub fn source(&self, id: SourceId) -> Option<&Source> {
        self.sources.get(id)
    }

    /// Every live source id, in arena order.
    pub fn source_ids(&self) -> Vec<SourceId> {
        self.sources.iter().map(|(id, _)| id).collect()
    }

    /// Read-only access to a model, e.g. for the binary archiver or a DOT
    /// exporter walking every model before the simulation starts.
    pub fn model(&self, id: ModelId) -> Option<&ModelRecord> {
        self.models.get(id)
    }

    /// Every live model id, in arena order. The binary archiver and DOT
    /// exporter both need a stable enumeration order to assign external
    /// indices.
    pub fn model_ids(&self) -> Vec<ModelId> {
        self.models.iter().map(|(id, _)| id).collect()
    }

    /// Every `(src_model, src_port, dst_model, dst_port)` connection
    /// currently wired, in model/port order.
    pub fn connections(&self) -> Vec<(ModelId, u8, ModelId, u8)> {
        let mut out = Vec::new();
        for (id, record) in self.models.iter() {
            for (port_index, port) in record.outputs.iter().enumerate() {
                for target in port.targets() {
                    out.push((id, port_index as u8, target.model, target.port));
                }
            }
        }
        out
    }

    /// Consumes the builder, runs every model's `initialize`, and returns a
    /// ready-to-step [`Simulation`] starting at `start_time`.
    pub fn init(mut self, start_time: f64) -> Result<Simulation> {
        let mut heap = TimeHeap::new();

        let ids: Vec<ModelId> = self.models.iter().map(|(id, _)| id).collect();
        for id in ids {
            let record = self.models.get_mut(id).unwrap();
            record.t_last = start_time;
            record.sigma = record.kind.initialize(start_time);
            let slot = heap.push(id, start_time + record.sigma);
            record.heap_slot = Some(slot);
        }

        Ok(Simulation {
            models: self.models,
            observers: self.observers,
            sources: self.sources,
            heap,
            pool: MessagePool::new(),
            time: start_time,
        })
    }
}

/// The running simulation.
pub struct Simulation {
    models: Arena<ModelRecord>,
    observers: Arena<Observer>,
    sources: Arena<Source>,
    heap: TimeHeap<ModelId>,
    pool: MessagePool,
    time: f64,
}

impl Simulation {
    /// Current simulated time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Read-only access to a model, e.g. to inspect its observation.
    pub fn model(&self, id: ModelId) -> Option<&ModelRecord> {
        self.models.get(id)
    }

    /// Every live model id, in arena order.
    pub fn model_ids(&self) -> Vec<ModelId> {
        self.models.iter().map(|(id, _)| id).collect()
    }

    /// Read-only access to an observer.
    pub fn observer(&self, id: ObserverId) -> Option<&Observer> {
        self.observers.get(id)
    }

    /// Read-only access to a registered source.
    pub fn source(&self, id: SourceId) -> Option<&Source> {
        self.sources.get(id)
    }

    /// Processes exactly one bag (every model imminent at the earliest
    /// scheduled time), returning the new simulated time, or `None` if no
    /// model has a finite `sigma` left.
    pub fn step(&mut self) -> Result<Option<f64>> {
        let Some((_, t)) = self.heap.peek_min() else {
            return Ok(None);
        };
        self.time = t;

        let mut imminent = Vec::new();
        while let Some((_, next_t)) = self.heap.peek_min() {
            if next_t > t {
                break;
            }
            let (id, _) = self.heap.pop_min().unwrap();
            imminent.push(id);
        }

        let mut routed: Vec<(ModelId, u8, Message)> = Vec::new();
        for &id in &imminent {
            let record = self.models.get(id).expect("imminent model vanished");
            let message = record.kind.lambda();
            for port in &record.outputs {
                for target in port.targets() {
                    routed.push((target.model, target.port, message));
                }
            }
        }
        for (model, port, message) in routed {
            if let Some(record) = self.models.get_mut(model) {
                if let Some(input) = record.inputs.get_mut(port as usize) {
                    input.send(message);
                }
            }
        }

        let mut influenced: Vec<ModelId> = self
            .models
            .iter()
            .filter(|(_, record)| record.has_pending_input())
            .map(|(id, _)| id)
            .collect();
        for &id in &imminent {
            if !influenced.contains(&id) {
                influenced.push(id);
            }
        }

        for id in influenced {
            let Some(record) = self.models.get_mut(id) else { continue };
            let is_imminent = imminent.contains(&id);
            let has_input = record.has_pending_input();

            let inputs = std::mem::take(&mut record.inputs);
            let new_sigma = if is_imminent && has_input {
                record.kind.delta_con(t, &inputs)
            } else if is_imminent {
                record.kind.delta_int(t)
            } else {
                let e = t - record.t_last;
                record.kind.delta_ext(t, e, &inputs)
            };
            record.inputs = inputs;
            record.clear_inputs();
            record.t_last = t;
            record.sigma = new_sigma;

            let (x, y) = record.kind.output_observation(t, 0.0);
            let observer_id = record.observer;
            let slot = record.heap_slot;

            if let Some(slot) = slot {
                self.heap.update(slot, t + new_sigma);
            } else {
                record.heap_slot = Some(self.heap.push(id, t + new_sigma));
            }

            if let Some(observer_id) = observer_id {
                if let Some(observer) = self.observers.get_mut(observer_id) {
                    observer.push(Observation { t, x, y });
                }
            }
        }

        self.pool.clear();
        Ok(Some(t))
    }

    /// Steps repeatedly until the next scheduled event would be at or past
    /// `t_end`, or no event remains.
    pub fn run_until(&mut self, t_end: f64) -> Result<()> {
        loop {
            let Some((_, next_t)) = self.heap.peek_min() else {
                break;
            };
            if next_t > t_end {
                break;
            }
            self.step()?;
        }
        Ok(())
    }

    /// Runs for `duration` simulated time units from the current time.
    pub fn run_for(&mut self, duration: f64) -> Result<()> {
        self.run_until(self.time + duration)
    }

    /// Drops the running state, releasing all models, observers and
    /// sources. Present mostly for symmetry with `SimInit::init` and to
    /// give call sites an explicit point to stop at.
    pub fn finalize(self) {}
}
