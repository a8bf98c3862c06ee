//! Deterministic and pseudo-random scalar streams.
//!
//! A [`Source`] yields the inter-arrival times and values consumed by
//! stochastic models (generators, dynamic queues). Four kinds are
//! supported: a constant table, a text or binary file-backed stream, and a
//! random stream driven by [`Philox64`], a counter-based PRNG that can be
//! rewound deterministically by resetting its `(index, step)` counter.

use rand::distributions::Distribution;
use rand::SeedableRng;
use rand_core::{Error as RngCoreError, RngCore};
use rand_distr::{Exp, Normal, Uniform};

use crate::arena::Id;
use crate::error::SourceError;

/// Handle to a [`Source`] held in the simulation's source registry.
///
/// Most sources are owned directly by the model that consumes them (a
/// [`crate::model::generator::Generator`] or
/// [`crate::model::queue::DynamicQueue`]); the registry exists for sources
/// an embedding application wants to inspect, replay, or rewind
/// independently of any one model.
pub type SourceId = Id<Source>;

/// Philox-4x64, truncated to the two-word variant used by this kernel
/// (Salmon et al., *Random123*). Ten rounds of a Feistel-like mix produce
/// two 64-bit words from a `(seed, index, step)` counter; `index` typically
/// identifies the consuming model and `step` the draw number, so replaying
/// `(seed, index, step)` reproduces the exact same values.
#[derive(Debug, Clone)]
pub struct Philox64 {
    key: u64,
    counter: [u64; 2],
    buffer: [u64; 2],
    buffer_pos: usize,
}

const PHILOX_M0: u64 = 0xD2B7_4407_B1CA_DAC9;
const PHILOX_W0: u64 = 0x9E37_79B9_7F4A_7C15;
const ROUNDS: u32 = 10;

fn mulhilo(a: u64, b: u64) -> (u64, u64) {
    let product = (a as u128) * (b as u128);
    (product as u64, (product >> 64) as u64)
}

impl Philox64 {
    /// Creates a generator keyed by `seed`, counter-seeded with `(index,
    /// step)`. `index` is typically the producing model's arena index.
    pub fn new(seed: u64, index: u64, step: u64) -> Self {
        Self {
            key: seed,
            counter: [index, step],
            buffer: [0, 0],
            buffer_pos: 2, // forces a refill on first use
        }
    }

    /// Deterministically rewinds/advances the stream to `(index, step)`.
    pub fn set_state(&mut self, index: u64, step: u64) {
        self.counter = [index, step];
        self.buffer_pos = 2;
    }

    /// Skips `z` draws ahead.
    pub fn discard(&mut self, z: u64) {
        self.counter[1] = self.counter[1].wrapping_add(z);
        self.buffer_pos = 2;
    }

    fn refill(&mut self) {
        let mut ctr0 = self.counter[0];
        let mut ctr1 = self.counter[1];
        let mut key0 = self.key;

        for _ in 0..ROUNDS {
            let (lo, hi) = mulhilo(PHILOX_M0, ctr0);
            ctr0 = hi ^ key0 ^ ctr1;
            ctr1 = lo;
            key0 = key0.wrapping_add(PHILOX_W0);
        }

        self.buffer = [ctr0, ctr1];
        self.counter[1] = self.counter[1].wrapping_add(1);
        self.buffer_pos = 0;
    }

    fn next_word(&mut self) -> u64 {
        if self.buffer_pos >= 2 {
            self.refill();
        }
        let word = self.buffer[self.buffer_pos];
        self.buffer_pos += 1;
        word
    }
}

impl RngCore for Philox64 {
    fn next_u32(&mut self) -> u32 {
        self.next_word() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_word()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        rand_core::impls::fill_bytes_via_next(self, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), RngCoreError> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Distribution of a [`Source::Random`] stream.
#[derive(Debug, Clone)]
pub enum RandomDistribution {
    /// Uniform distribution over `[low, high)`.
    Uniform {
        /// Inclusive lower bound.
        low: f64,
        /// Exclusive upper bound.
        high: f64,
    },
    /// Gaussian distribution.
    Normal {
        /// Mean.
        mean: f64,
        /// Standard deviation.
        std_dev: f64,
    },
    /// Exponential distribution, useful for inter-arrival times.
    Exponential {
        /// Rate parameter (`lambda`).
        rate: f64,
    },
}

/// A scalar stream feeding stochastic models.
#[derive(Debug, Clone)]
pub enum Source {
    /// A fixed, repeating table of values.
    Constant {
        /// The table to cycle through.
        values: Vec<f64>,
        /// Current read position.
        position: usize,
    },
    /// A stream backed by an in-memory copy of a text file (one value per
    /// line). The builder is responsible for having read the file; this
    /// kernel treats file sources as opaque pre-loaded tables, keeping file
    /// I/O at the edge of the engine.
    TextFile {
        /// Parsed lines.
        values: Vec<f64>,
        /// Current read position.
        position: usize,
    },
    /// Same as `TextFile` but sourced from a binary payload of
    /// little-endian `f64`s.
    BinaryFile {
        /// Parsed values.
        values: Vec<f64>,
        /// Current read position.
        position: usize,
    },
    /// A pseudo-random stream.
    Random {
        /// The generator, seeded once and advanced on every draw.
        rng: Philox64,
        /// The distribution drawn from.
        distribution: RandomDistribution,
    },
}

impl Source {
    /// Fills all internal state (no-op for the non-random kinds; resets the
    /// random kind's buffer) so the stream starts from its documented
    /// initial contents.
    pub fn prepare(&mut self) -> Result<(), SourceError> {
        match self {
            Source::Constant { position, .. }
            | Source::TextFile { position, .. }
            | Source::BinaryFile { position, .. } => {
                *position = 0;
                Ok(())
            }
            Source::Random { .. } => Ok(()),
        }
    }

    /// Refills `chunk` with up to `chunk.len()` values, returning the
    /// number actually written. Returns [`SourceError::Exhausted`] if a
    /// table-backed source has no more values and `chunk` could not be
    /// filled at all.
    pub fn dispatch(&mut self, chunk: &mut [f64]) -> Result<usize, SourceError> {
        match self {
            Source::Constant { values, position }
            | Source::TextFile { values, position }
            | Source::BinaryFile { values, position } => {
                if values.is_empty() {
                    return Err(SourceError::Exhausted);
                }
                for slot in chunk.iter_mut() {
                    *slot = values[*position % values.len()];
                    *position += 1;
                }
                Ok(chunk.len())
            }
            Source::Random { rng, distribution } => {
                for slot in chunk.iter_mut() {
                    *slot = match distribution {
                        RandomDistribution::Uniform { low, high } => {
                            Uniform::new(*low, *high).sample(rng)
                        }
                        RandomDistribution::Normal { mean, std_dev } => {
                            Normal::new(*mean, *std_dev)
                                .expect("non-finite normal parameters")
                                .sample(rng)
                        }
                        RandomDistribution::Exponential { rate } => {
                            Exp::new(*rate).expect("non-positive exponential rate").sample(rng)
                        }
                    };
                }
                Ok(chunk.len())
            }
        }
    }

    /// Builds a `Random` source from a seed and model-specific index, as
    /// used when the builder wires up a generator or a dynamic queue.
    pub fn random(seed: u64, index: u64, distribution: RandomDistribution) -> Self {
        Source::Random {
            rng: Philox64::new(seed, index, 0),
            distribution,
        }
    }
}
