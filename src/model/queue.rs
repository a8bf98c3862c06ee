//! Single-server queueing models: FIFO, a source-driven "dynamic" queue
//! with randomized service time, and a priority queue.
//!
//! All three share the same shape: an arrival either starts the server (if
//! it was idle) or is buffered; `delta_int` releases the head of the
//! line and, if more work remains, restarts the server for the next item.

use crate::message::{InputPort, Message};
use crate::source::Source;

/// A single-server FIFO queue with a fixed service time.
#[derive(Debug, Clone, Default)]
pub struct FifoQueue {
    service_time: f64,
    pending: std::collections::VecDeque<Message>,
    in_service: Option<Message>,
    /// Simulated time the job currently in service started, so an arrival
    /// that finds the server busy can return the *remaining* service time
    /// instead of clobbering the already-scheduled departure.
    service_start: Option<f64>,
}

impl FifoQueue {
    pub fn new(service_time: f64) -> Self {
        Self {
            service_time: service_time.max(0.0),
            pending: std::collections::VecDeque::new(),
            in_service: None,
            service_start: None,
        }
    }

    pub fn initialize(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn delta_ext(&mut self, t: f64, _e: f64, inputs: &[InputPort]) -> f64 {
        if let Some(port) = inputs.first() {
            for &message in port.messages() {
                self.pending.push_back(message);
            }
        }
        match self.service_start {
            None => self.start_next(t),
            Some(start) => (self.service_time - (t - start)).max(0.0),
        }
    }

    fn start_next(&mut self, t: f64) -> f64 {
        match self.pending.pop_front() {
            Some(message) => {
                self.in_service = Some(message);
                self.service_start = Some(t);
                self.service_time
            }
            None => {
                self.service_start = None;
                f64::INFINITY
            }
        }
    }

    pub fn delta_int(&mut self, t: f64) -> f64 {
        self.in_service = None;
        self.start_next(t)
    }

    pub fn lambda(&self) -> Message {
        self.in_service.unwrap_or_default()
    }

    pub fn output_observation(&self, _t: f64, _e: f64) -> (f64, f64) {
        (self.pending.len() as f64, 0.0)
    }

    /// Number of jobs waiting (excludes the one currently in service).
    pub fn queue_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn archive_params(&self) -> [f64; 1] {
        [self.service_time]
    }
}

/// A FIFO queue whose service time is redrawn from a [`Source`] for every
/// job, modeling e.g. an M/G/1 station.
#[derive(Debug, Clone)]
pub struct DynamicQueue {
    source: Source,
    pending: std::collections::VecDeque<Message>,
    in_service: Option<Message>,
    /// Start time and drawn duration of the job currently in service, used
    /// to compute the remaining service time for an arrival that finds the
    /// server busy.
    service_start: Option<(f64, f64)>,
}

impl DynamicQueue {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            pending: std::collections::VecDeque::new(),
            in_service: None,
            service_start: None,
        }
    }

    pub fn initialize(&mut self, _t: f64) -> f64 {
        let _ = self.source.prepare();
        f64::INFINITY
    }

    fn draw_service_time(&mut self) -> f64 {
        let mut chunk = [0.0];
        if self.source.dispatch(&mut chunk).is_ok() {
            chunk[0].max(0.0)
        } else {
            0.0
        }
    }

    pub fn delta_ext(&mut self, t: f64, _e: f64, inputs: &[InputPort]) -> f64 {
        if let Some(port) = inputs.first() {
            for &message in port.messages() {
                self.pending.push_back(message);
            }
        }
        match self.service_start {
            None => self.start_next(t),
            Some((start, duration)) => (duration - (t - start)).max(0.0),
        }
    }

    fn start_next(&mut self, t: f64) -> f64 {
        match self.pending.pop_front() {
            Some(message) => {
                self.in_service = Some(message);
                let duration = self.draw_service_time();
                self.service_start = Some((t, duration));
                duration
            }
            None => {
                self.service_start = None;
                f64::INFINITY
            }
        }
    }

    pub fn delta_int(&mut self, t: f64) -> f64 {
        self.in_service = None;
        self.start_next(t)
    }

    pub fn lambda(&self) -> Message {
        self.in_service.unwrap_or_default()
    }

    pub fn output_observation(&self, _t: f64, _e: f64) -> (f64, f64) {
        (self.pending.len() as f64, 0.0)
    }
}

/// A single-server queue that always services the highest-priority pending
/// job next. Priority is carried as the message's second value
/// (`message.get(1)`); ties resolve FIFO.
#[derive(Debug, Clone, Default)]
pub struct PriorityQueue {
    service_time: f64,
    pending: Vec<Message>,
    in_service: Option<Message>,
    /// Start time of the job currently in service, used to compute the
    /// remaining service time for an arrival that finds the server busy.
    service_start: Option<f64>,
}

impl PriorityQueue {
    pub fn new(service_time: f64) -> Self {
        Self { service_time: service_time.max(0.0), pending: Vec::new(), in_service: None, service_start: None }
    }

    pub fn initialize(&mut self, _t: f64) -> f64 {
        f64::INFINITY
    }

    pub fn delta_ext(&mut self, t: f64, _e: f64, inputs: &[InputPort]) -> f64 {
        if let Some(port) = inputs.first() {
            for &message in port.messages() {
                self.pending.push(message);
            }
        }
        match self.service_start {
            None => self.start_next(t),
            Some(start) => (self.service_time - (t - start)).max(0.0),
        }
    }

    fn start_next(&mut self, t: f64) -> f64 {
        if self.pending.is_empty() {
            self.service_start = None;
            return f64::INFINITY;
        }
        let best = self
            .pending
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.get(1).partial_cmp(&b.get(1)).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(index, _)| index)
            .unwrap();
        self.in_service = Some(self.pending.remove(best));
        self.service_start = Some(t);
        self.service_time
    }

    pub fn delta_int(&mut self, t: f64) -> f64 {
        self.in_service = None;
        self.start_next(t)
    }

    pub fn lambda(&self) -> Message {
        self.in_service.unwrap_or_default()
    }

    pub fn output_observation(&self, _t: f64, _e: f64) -> (f64, f64) {
        (self.pending.len() as f64, 0.0)
    }

    pub(crate) fn archive_params(&self) -> [f64; 1] {
        [self.service_time]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port_with_all(values: &[f64]) -> InputPort {
        let mut port = InputPort::default();
        for &v in values {
            port.send(Message::one(v));
        }
        port
    }

    #[test]
    fn fifo_queue_serves_in_arrival_order() {
        let mut queue = FifoQueue::new(1.0);
        queue.initialize(0.0);
        let sigma = queue.delta_ext(0.0, 0.0, &[port_with_all(&[10.0, 20.0])]);
        assert_eq!(sigma, 1.0);
        assert_eq!(queue.lambda().get(0), 10.0);
        let sigma = queue.delta_int(1.0);
        assert_eq!(sigma, 1.0);
        assert_eq!(queue.lambda().get(0), 20.0);
    }

    #[test]
    fn fifo_queue_returns_remaining_service_time_on_arrival_while_busy() {
        let mut queue = FifoQueue::new(5.0);
        queue.initialize(0.0);
        queue.delta_ext(0.0, 0.0, &[port_with_all(&[1.0])]);
        let sigma = queue.delta_ext(2.0, 0.0, &[port_with_all(&[2.0])]);
        assert_eq!(sigma, 3.0);
        assert_eq!(queue.queue_len(), 1);
    }

    #[test]
    fn dynamic_queue_draws_a_service_time_per_job() {
        let source = Source::Constant { values: vec![2.0, 4.0], position: 0 };
        let mut queue = DynamicQueue::new(source);
        queue.initialize(0.0);
        let sigma = queue.delta_ext(0.0, 0.0, &[port_with_all(&[1.0, 2.0])]);
        assert_eq!(sigma, 2.0);
        let sigma = queue.delta_int(2.0);
        assert_eq!(sigma, 4.0);
    }

    #[test]
    fn priority_queue_serves_highest_priority_first() {
        let mut queue = PriorityQueue::new(1.0);
        queue.initialize(0.0);
        let mut port = InputPort::default();
        port.send(Message::two(100.0, 1.0)); // low priority
        port.send(Message::two(200.0, 5.0)); // high priority
        queue.delta_ext(0.0, 0.0, &[port]);
        assert_eq!(queue.lambda().get(0), 200.0);
    }
}
