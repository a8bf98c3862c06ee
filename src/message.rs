//! Message values and the per-bag message pool.
//!
//! A [`Message`] carries up to three scalar values plus the index of the
//! port it arrived on. Messages are allocated from a per-step [`MessagePool`]
//! backed by a [`slab::Slab`] and cleared wholesale at the end of every bag,
//! the crate's analogue of the monotonic memory resource described in the
//! original design: allocation cost during a bag is bounded and reclaiming
//! the whole pool is `O(1)` regardless of how many messages were sent.

use slab::Slab;

use crate::error::AllocationError;

/// Maximum number of scalar values a single message can carry.
pub const MAX_MESSAGE_VALUES: usize = 3;

/// A message of up to three scalar values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Message {
    values: [f64; MAX_MESSAGE_VALUES],
    len: u8,
}

impl Message {
    /// Builds a single-value message.
    pub fn one(x: f64) -> Self {
        Self {
            values: [x, 0.0, 0.0],
            len: 1,
        }
    }

    /// Builds a two-value message.
    pub fn two(x: f64, y: f64) -> Self {
        Self {
            values: [x, y, 0.0],
            len: 2,
        }
    }

    /// Builds a three-value message.
    pub fn three(x: f64, y: f64, z: f64) -> Self {
        Self {
            values: [x, y, z],
            len: 3,
        }
    }

    /// Number of meaningful values in this message (1 to 3).
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether this message carries no value at all (never produced by the
    /// constructors above, but meaningful for a default-initialized slot).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads value at `index`, or `0.0` if the message carries fewer values.
    pub fn get(&self, index: usize) -> f64 {
        self.values.get(index).copied().unwrap_or(0.0)
    }

    /// All meaningful values as a slice.
    pub fn values(&self) -> &[f64] {
        &self.values[..self.len as usize]
    }
}

impl Default for Message {
    fn default() -> Self {
        Self {
            values: [0.0; MAX_MESSAGE_VALUES],
            len: 0,
        }
    }
}

/// Opaque handle to a message stored in a [`MessagePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHandle(usize);

/// A bag-scoped pool of messages.
///
/// `alloc` never fails until `capacity` is exceeded; `clear` drops every
/// message in `O(1)` (the slab's backing storage is reused, not freed).
pub struct MessagePool {
    slab: Slab<Message>,
    capacity: usize,
}

impl MessagePool {
    /// Creates a pool with no hard capacity limit.
    pub fn new() -> Self {
        Self::with_capacity(usize::MAX)
    }

    /// Creates a pool that refuses to grow past `capacity` live messages.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slab: Slab::new(),
            capacity,
        }
    }

    /// Stores `message`, returning a handle to it.
    pub fn alloc(&mut self, message: Message) -> Result<MessageHandle, AllocationError> {
        if self.slab.len() >= self.capacity {
            return Err(AllocationError::NotEnoughMemoryMessageListAllocator);
        }
        Ok(MessageHandle(self.slab.insert(message)))
    }

    /// Reads back a previously allocated message.
    pub fn get(&self, handle: MessageHandle) -> Option<&Message> {
        self.slab.get(handle.0)
    }

    /// Clears the whole pool at once (end of bag).
    pub fn clear(&mut self) {
        self.slab.clear();
    }

    /// Number of messages currently held.
    pub fn len(&self) -> usize {
        self.slab.len()
    }

    /// Whether the pool holds no messages.
    pub fn is_empty(&self) -> bool {
        self.slab.is_empty()
    }
}

impl Default for MessagePool {
    fn default() -> Self {
        Self::new()
    }
}

/// A `(target model, target port)` pair, the unit of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionTarget<M> {
    /// Destination model.
    pub model: M,
    /// Destination input port index.
    pub port: u8,
}

/// A single output port: the set of `(model, port)` targets it broadcasts
/// to. No back-references are kept; removing a model requires scanning
/// every output port of every remaining model.
#[derive(Debug, Clone, Default)]
pub struct OutputPort<M> {
    targets: Vec<ConnectionTarget<M>>,
}

impl<M: PartialEq + Copy> OutputPort<M> {
    /// Adds `target` unless it is already connected.
    ///
    /// Returns `false` (and leaves the port unchanged) if the pair was
    /// already present, matching the "connection idempotence" property: a
    /// duplicate `connect` leaves exactly one edge.
    pub fn connect(&mut self, target: ConnectionTarget<M>) -> bool {
        if self.targets.contains(&target) {
            return false;
        }
        self.targets.push(target);
        true
    }

    /// All current targets of this port.
    pub fn targets(&self) -> &[ConnectionTarget<M>] {
        &self.targets
    }

    /// Removes every target pointing at `model`, used when `model` is torn
    /// down.
    pub fn disconnect_model(&mut self, model: M) {
        self.targets.retain(|t| t.model != model);
    }
}

/// A single input port: the FIFO queue of messages pending for this bag.
#[derive(Debug, Clone, Default)]
pub struct InputPort {
    queue: Vec<Message>,
}

impl InputPort {
    /// Appends `message` to the queue.
    pub fn send(&mut self, message: Message) {
        self.queue.push(message);
    }

    /// Read-only view of the pending messages, in arrival order.
    pub fn messages(&self) -> &[Message] {
        &self.queue
    }

    /// Whether any message is pending on this port.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drops all pending messages (end of bag).
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_values_are_padded_with_zero() {
        let m = Message::one(1.5);
        assert_eq!(m.len(), 1);
        assert_eq!(m.get(0), 1.5);
        assert_eq!(m.get(1), 0.0);
    }

    #[test]
    fn pool_clear_resets_len() {
        let mut pool = MessagePool::new();
        pool.alloc(Message::one(1.0)).unwrap();
        pool.alloc(Message::one(2.0)).unwrap();
        assert_eq!(pool.len(), 2);
        pool.clear();
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn pool_enforces_capacity() {
        let mut pool = MessagePool::with_capacity(1);
        pool.alloc(Message::one(1.0)).unwrap();
        assert!(matches!(
            pool.alloc(Message::one(2.0)),
            Err(AllocationError::NotEnoughMemoryMessageListAllocator)
        ));
    }

    #[test]
    fn duplicate_connect_is_idempotent() {
        let mut port: OutputPort<u32> = OutputPort::default();
        let target = ConnectionTarget { model: 7, port: 0 };
        assert!(port.connect(target));
        assert!(!port.connect(target));
        assert_eq!(port.targets().len(), 1);
    }

    #[test]
    fn disconnect_model_removes_all_its_targets() {
        let mut port: OutputPort<u32> = OutputPort::default();
        port.connect(ConnectionTarget { model: 1, port: 0 });
        port.connect(ConnectionTarget { model: 2, port: 0 });
        port.connect(ConnectionTarget { model: 1, port: 1 });
        port.disconnect_model(1);
        assert_eq!(port.targets().len(), 1);
        assert_eq!(port.targets()[0].model, 2);
    }

    #[test]
    fn input_port_queue_is_fifo_and_clears() {
        let mut input = InputPort::default();
        input.send(Message::one(1.0));
        input.send(Message::one(2.0));
        assert_eq!(input.messages().len(), 2);
        assert_eq!(input.messages()[0].get(0), 1.0);
        input.clear();
        assert!(input.is_empty());
    }
}
