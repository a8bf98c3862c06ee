//! Observer pipeline: raw event-driven samples plus a fixed-step linearized
//! resampling, suitable for plotting.
//!
//! Each observer owns two ring buffers: an append-only `raw` ring fed
//! directly by the model's transitions, and a `linearized` ring produced by
//! linearly interpolating between consecutive raw samples at a configured
//! `time_step`. Both rings are single-producer (the simulation driver) /
//! multi-reader: a reader acquires a `version` snapshot via
//! [`Observer::read_only`] and the producer bumps that counter whenever a
//! write truncates the buffer, so a reader can detect (and retry past) a
//! concurrent overwrite rather than observing a torn read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::arena::Id;

/// Handle to an [`Observer`] stored in the simulation's arena.
pub type ObserverId = Id<Observer>;

/// One `(t, x, y)` observation. `y` is used by two-output models (e.g. QSS
/// integrators reporting both `x` and `dx/dt`); single-output models leave
/// it at `0.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Simulated time of the sample.
    pub t: f64,
    /// Primary observed value.
    pub x: f64,
    /// Secondary observed value.
    pub y: f64,
}

/// A fixed-capacity ring buffer of [`Observation`]s.
#[derive(Debug, Default)]
struct Ring {
    buffer: Vec<Observation>,
    capacity: usize,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    fn push(&mut self, obs: Observation) -> bool {
        let truncated = self.buffer.len() == self.capacity;
        if truncated {
            self.buffer.remove(0);
        }
        self.buffer.push(obs);
        truncated
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Read-only, version-stamped view of an observer's samples.
///
/// Acquired via [`Observer::read_only`] or [`Observer::try_read_only`]; the
/// guard is released automatically when it is dropped and can never outlive
/// the observer it was taken from, since it borrows it.
pub struct ReadOnlyView<'a> {
    samples: std::sync::RwLockReadGuard<'a, Vec<Observation>>,
    /// Version of the ring at the time this view was acquired. Compare
    /// against [`Observer::version`] after use to detect a concurrent
    /// truncation.
    pub version: u64,
}

impl<'a> ReadOnlyView<'a> {
    /// The observations visible through this view, in non-decreasing `t`
    /// order.
    pub fn samples(&self) -> &[Observation] {
        &self.samples
    }
}

/// An observer bound to one model, collecting both raw and linearized
/// samples.
pub struct Observer {
    raw: RwLock<Ring>,
    linearized: RwLock<Ring>,
    version: AtomicU64,
    time_step: f64,
    last_linearized_t: Option<f64>,
    pending_raw: Option<Observation>,
}

impl Observer {
    /// Creates an observer with the given raw/linearized ring capacities
    /// and resampling `time_step`.
    pub fn new(raw_capacity: usize, linearized_capacity: usize, time_step: f64) -> Self {
        Self {
            raw: RwLock::new(Ring::new(raw_capacity)),
            linearized: RwLock::new(Ring::new(linearized_capacity)),
            version: AtomicU64::new(0),
            time_step: time_step.max(f64::MIN_POSITIVE),
            last_linearized_t: None,
            pending_raw: None,
        }
    }

    /// Current version counter, bumped on every truncating write.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Pushes a new raw sample and resamples the linearized ring with
    /// however many fixed `time_step` points now fall between the previous
    /// raw sample and this one.
    pub fn push(&mut self, obs: Observation) {
        {
            let mut raw = self.raw.write().unwrap();
            if raw.push(obs) {
                self.version.fetch_add(1, Ordering::AcqRel);
            }
        }

        if let Some(prev) = self.pending_raw {
            self.resample_between(prev, obs);
        } else {
            self.last_linearized_t = Some(obs.t);
            self.push_linearized(obs);
        }
        self.pending_raw = Some(obs);
    }

    fn resample_between(&mut self, prev: Observation, next: Observation) {
        let mut t = self.last_linearized_t.unwrap_or(prev.t) + self.time_step;
        while t < next.t {
            let span = next.t - prev.t;
            let frac = if span > 0.0 { (t - prev.t) / span } else { 0.0 };
            let sample = Observation {
                t,
                x: prev.x + (next.x - prev.x) * frac,
                y: prev.y + (next.y - prev.y) * frac,
            };
            self.push_linearized(sample);
            t += self.time_step;
        }
        self.push_linearized(next);
        self.last_linearized_t = Some(next.t);
    }

    fn push_linearized(&mut self, obs: Observation) {
        let mut linearized = self.linearized.write().unwrap();
        if linearized.push(obs) {
            self.version.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Blocking read-only view of the raw ring.
    pub fn read_only(&self) -> ReadOnlyView<'_> {
        ReadOnlyView {
            samples: self.raw.read().unwrap(),
            version: self.version(),
        }
    }

    /// Non-blocking variant of [`Observer::read_only`]; returns `None` if
    /// the raw ring's lock is currently held by the writer.
    pub fn try_read_only(&self) -> Option<ReadOnlyView<'_>> {
        let samples = self.raw.try_read().ok()?;
        Some(ReadOnlyView {
            samples,
            version: self.version(),
        })
    }

    /// Read-only view of the linearized ring.
    pub fn read_only_linearized(&self) -> ReadOnlyView<'_> {
        ReadOnlyView {
            samples: self.linearized.read().unwrap(),
            version: self.version(),
        }
    }

    /// Clears both rings, used on simulation restart.
    pub fn clear(&mut self) {
        self.raw.write().unwrap().clear();
        self.linearized.write().unwrap().clear();
        self.last_linearized_t = None;
        self.pending_raw = None;
        self.version.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_samples_are_monotone_in_time() {
        let mut obs = Observer::new(16, 16, 0.1);
        obs.push(Observation { t: 0.0, x: 0.0, y: 0.0 });
        obs.push(Observation { t: 1.0, x: 1.0, y: 0.0 });
        obs.push(Observation { t: 2.0, x: 2.0, y: 0.0 });
        let view = obs.read_only();
        let times: Vec<f64> = view.samples().iter().map(|o| o.t).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn linearized_buffer_interpolates_between_raw_samples() {
        let mut obs = Observer::new(16, 64, 0.5);
        obs.push(Observation { t: 0.0, x: 0.0, y: 0.0 });
        obs.push(Observation { t: 2.0, x: 4.0, y: 0.0 });
        let view = obs.read_only_linearized();
        let samples = view.samples();
        let at_one = samples.iter().find(|s| (s.t - 1.0).abs() < 1e-9).unwrap();
        assert!((at_one.x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn ring_truncation_bumps_version() {
        let mut obs = Observer::new(2, 2, 1.0);
        let v0 = obs.version();
        obs.push(Observation { t: 0.0, x: 0.0, y: 0.0 });
        obs.push(Observation { t: 1.0, x: 1.0, y: 0.0 });
        obs.push(Observation { t: 2.0, x: 2.0, y: 0.0 });
        assert!(obs.version() > v0);
    }

    #[test]
    fn clear_empties_both_rings() {
        let mut obs = Observer::new(8, 8, 1.0);
        obs.push(Observation { t: 0.0, x: 1.0, y: 0.0 });
        obs.clear();
        assert!(obs.read_only().samples().is_empty());
        assert!(obs.read_only_linearized().samples().is_empty());
    }
}
