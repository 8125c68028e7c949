//! Pure, seekable pseudo-random numbers.
//!
//! Descriptors are a function of `(seed, schema, stream, steps)` and nothing
//! else. Instead of a stateful generator, [`PcgRng`] computes the PCG state
//! `steps + 1` positions after the seed directly, using LCG jump-ahead in
//! `O(log steps)`, and applies the RXS-M-XS output permutation. Every call
//! is independent, so the generator is `Copy` and shared freely between
//! threads.
//!
//! Streams separate independent sequences: each stream has its own odd LCG
//! increment, derived from an integer tuple with [`stream_key`].

const MULTIPLIER: u64 = 6_364_136_223_846_793_005;
const GOLDEN: u64 = 0x9e37_79b9_7f4a_7c15;

/// Seekable PCG-RXS-M-XS generator keyed by seed and schema fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcgRng {
    key: u64,
}

impl PcgRng {
    pub fn new(seed: u64, schema_fingerprint: u64) -> Self {
        Self {
            key: seed ^ schema_fingerprint,
        }
    }

    /// The `steps`-th number of `stream`.
    ///
    /// Pure: the same `(steps, stream)` always returns the same value. For
    /// a fixed stream, distinct `steps` below 2^64 return distinct values.
    pub fn random_number(&self, steps: u64, stream: u64) -> u64 {
        let increment = (stream << 1) | 1;
        let state = advance(advance(self.key, steps, increment), 1, increment);
        rxs_m_xs(state)
    }

    /// `random_number(steps, stream) % bound`, or 0 when `bound` is 0.
    pub fn bounded(&self, steps: u64, stream: u64, bound: u64) -> u64 {
        if bound == 0 {
            0
        } else {
            self.random_number(steps, stream) % bound
        }
    }
}

/// Folds an integer tuple into a stream id.
pub fn stream_key(parts: &[u64]) -> u64 {
    parts
        .iter()
        .fold(parts.len() as u64, |acc, &part| {
            rxs_m_xs(acc.wrapping_mul(GOLDEN) ^ part)
        })
}

/// Advances an LCG state by `delta` steps (Brown, "Random Number
/// Generation with Arbitrary Strides").
fn advance(state: u64, mut delta: u64, increment: u64) -> u64 {
    let mut acc_mult: u64 = 1;
    let mut acc_plus: u64 = 0;
    let mut cur_mult = MULTIPLIER;
    let mut cur_plus = increment;
    while delta > 0 {
        if delta & 1 == 1 {
            acc_mult = acc_mult.wrapping_mul(cur_mult);
            acc_plus = acc_plus.wrapping_mul(cur_mult).wrapping_add(cur_plus);
        }
        cur_plus = cur_mult.wrapping_add(1).wrapping_mul(cur_plus);
        cur_mult = cur_mult.wrapping_mul(cur_mult);
        delta >>= 1;
    }
    acc_mult.wrapping_mul(state).wrapping_add(acc_plus)
}

/// PCG RXS-M-XS output permutation. A bijection on `u64`.
fn rxs_m_xs(state: u64) -> u64 {
    let word = ((state >> ((state >> 59) + 5)) ^ state).wrapping_mul(12_605_985_483_714_917_081);
    (word >> 43) ^ word
}
