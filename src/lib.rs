//! A Quantized State System (QSS) simulation kernel for hybrid
//! continuous/discrete-event models.
//!
//! This crate implements a DEVS-style atomic model contract —
//! `initialize`, `time_advance`, `lambda`, `delta_int`, `delta_ext`,
//! `delta_con` — over a closed library of built-in model kinds (QSS
//! integrators, arithmetic and logic blocks, generators, queues, and a
//! hierarchical state machine wrapper). Models live in a generational arena
//! ([`arena::Arena`]), are scheduled by a binary min-heap
//! ([`heap::TimeHeap`]), and exchange up-to-three-scalar messages through a
//! per-bag pool ([`message::MessagePool`]) routed along explicit
//! `(model, port)` connections.
//!
//! # A practical overview
//!
//! Building and running a simulation has three steps:
//!
//! 1. assemble a [`simulation::SimInit`] by adding models
//!    ([`simulation::SimInit::add_model`]) and wiring their ports
//!    ([`simulation::SimInit::connect`]),
//! 2. call [`simulation::SimInit::init`] to run every model's `initialize`
//!    and seed the scheduler, yielding a [`simulation::Simulation`],
//! 3. drive it forward with [`simulation::Simulation::step`],
//!    [`simulation::Simulation::run_until`] or
//!    [`simulation::Simulation::run_for`], reading back results from any
//!    attached [`observer::Observer`].
//!
//! ```
//! use qdevs::model::generator::{Constant, Counter};
//! use qdevs::model::{ModelKind, ModelRecord};
//! use qdevs::simulation::SimInit;
//!
//! let mut builder = SimInit::new();
//! let source = builder.add_model(ModelRecord::new(ModelKind::Constant(Constant::new(1.0)), 0, 1));
//! let sink = builder.add_model(ModelRecord::new(ModelKind::Counter(Counter::new()), 1, 1));
//! builder.connect(source, 0, sink, 0).unwrap();
//!
//! let mut sim = builder.init(0.0).unwrap();
//! sim.run_until(10.0).unwrap();
//! ```
//!
//! # Model authoring
//!
//! Every built-in model is a variant of the closed [`model::ModelKind`]
//! union rather than an implementation of an open trait: the simulation
//! driver dispatches to a kind through a handful of free functions
//! (`initialize`, `delta_int`, `delta_ext`, `delta_con`, `lambda`,
//! `output_observation`) defined once in [`model`], instead of through
//! dynamic dispatch over a trait object. Adding a new model kind means
//! adding a variant and a match arm, not implementing an interface; the set
//! of kinds this crate supports is visible from one file.
//!
//! Every model parameter that can be non-finite (a quantum, a sigma) is
//! routed through [`correct`] before use, so a misconfigured model degrades
//! to a documented default rather than propagating NaN through the engine.
//!
//! # Numeric core
//!
//! [`model::qss`] implements QSS1 through QSS3 as Taylor-coefficient
//! integrators that re-quantize against a fixed quantum `dQ`; the time to
//! the next quantization event is found by bisecting the (generic, low
//! degree) difference polynomial between the tracked and quantized
//! trajectories rather than by solving a level-specific closed form.
//!
//! # Determinism
//!
//! Stochastic models draw from [`source::Source::Random`], backed by
//! [`source::Philox64`], a counter-based generator: replaying the same
//! `(seed, index, step)` triple reproduces the exact same stream, which is
//! what makes a simulation run reproducible across machines and makes the
//! "did this random draw change" question answerable without capturing the
//! whole stream.

pub mod arena;
pub mod archiver;
pub mod config;
pub mod correct;
pub mod dot;
pub mod error;
pub mod heap;
pub mod hsm;
pub mod json;
pub mod message;
pub mod model;
pub mod observer;
pub mod simulation;
pub mod source;

pub use error::{Result, SimulationError};
