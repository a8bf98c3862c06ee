//! Crate-wide error taxonomy.
//!
//! Every fallible operation in the kernel returns a [`SimulationError`]. The
//! variants mirror the six error families of the model: allocation,
//! topology, numerics, io, source and embedded-simulation failures. Recovery
//! is always possible: returning an error never leaves the engine in an
//! inconsistent state, it only aborts the current step or builder call.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type returned by fallible kernel operations.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// An arena, pool or message list ran out of capacity.
    #[error("allocation failure: {0}")]
    Allocation(#[from] AllocationError),

    /// The model graph could not be built or amended as requested.
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    /// A parameter was non-finite and could not be silently corrected.
    #[error("numeric error: {0}")]
    Numerics(#[from] NumericsError),

    /// A serialization or file operation failed.
    #[error("io error: {0}")]
    Io(#[from] IoError),

    /// A source stream misbehaved.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// A nested (embedded) simulation failed.
    #[error("embedded simulation error: {0}")]
    Embedded(#[from] EmbeddedError),
}

/// Allocation-family failures.
#[derive(Debug, Error)]
pub enum AllocationError {
    /// The model arena has exhausted its capacity.
    #[error("model arena is full (capacity {capacity})")]
    ArenaFull {
        /// Capacity of the arena that overflowed.
        capacity: usize,
    },
    /// The per-bag message pool ran out of slots.
    #[error("not enough memory in the message list allocator")]
    NotEnoughMemoryMessageListAllocator,
}

/// Topology-family failures, raised while assembling or amending the model
/// graph.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// `connect` was called twice for the same `(src, port, dst, port)` pair.
    #[error("connection already exists")]
    ModelConnectAlreadyExist,
    /// A connection referenced a port index outside the model's port count.
    #[error("unknown port {port} on model {model:?}")]
    UnknownModelPort {
        /// Offending model handle, displayed via its debug id.
        model: u32,
        /// Out-of-range port index.
        port: u8,
    },
    /// A connection or lookup referenced a model id that does not exist.
    #[error("unknown model {0:?}")]
    UnknownModel(u32),
}

/// Numerics-family failures.
#[derive(Debug, Error)]
pub enum NumericsError {
    /// A quantum (`dQ`) was non-finite, non-positive or subnormal and could
    /// not be corrected automatically.
    #[error("invalid quantum: {0}")]
    InvalidQuantum(f64),
}

/// Io-family failures (archiver, JSON, DOT, configuration).
#[derive(Debug, Error)]
pub enum IoError {
    /// The underlying file could not be opened.
    #[error("could not open {path}: {source}")]
    Open {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// Read failure on an already-open stream.
    #[error("read error: {0}")]
    Read(#[source] std::io::Error),
    /// Write failure on an already-open stream.
    #[error("write error: {0}")]
    Write(#[source] std::io::Error),
    /// The payload did not match the expected wire format.
    #[error("format error: {0}")]
    Format(String),
    /// The binary archiver header was missing or did not match the expected
    /// magic/version.
    #[error("header error: {0}")]
    Header(String),
    /// JSON (de)serialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Source-family failures.
#[derive(Debug, Error)]
pub enum SourceError {
    /// A source's `prepare()` step failed.
    #[error("source failed to prepare")]
    PrepareFailure,
    /// A source ran out of values and has no way to refill.
    #[error("source exhausted")]
    Exhausted,
    /// A connection or lookup referenced a source id that does not exist.
    #[error("unknown source {0:?}")]
    UnknownSource(u32),
}

/// Embedded-simulation failures (nested `simulation_wrapper` models).
#[derive(Debug, Error)]
pub enum EmbeddedError {
    /// The nested engine failed during source preparation.
    #[error("embedded simulation source error")]
    Source,
    /// The nested engine failed during `initialize`.
    #[error("embedded simulation initialization error")]
    Initialization,
    /// The nested engine failed while running.
    #[error("embedded simulation run error")]
    Run,
    /// The nested engine failed during `finalize`.
    #[error("embedded simulation finalization error")]
    Finalization,
    /// The nested simulation handle could not be resolved.
    #[error("embedded simulation search error")]
    Search,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SimulationError>;
