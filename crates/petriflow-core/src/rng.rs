//! Deterministic random number generator
//!
//! Uses a simple xorshift64 algorithm for reproducibility across platforms.
//! The same seed produces the same sojourn times, bursts and noise paths on
//! every machine, which keeps simulation runs replayable after a reset.

use serde::{Deserialize, Serialize};

/// A deterministic random number generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    /// Create a new RNG with the given seed
    ///
    /// The seed is scrambled first so that small seeds do not start with a
    /// run of tiny outputs.
    pub fn new(seed: u64) -> Self {
        let state = splitmix64(seed);
        // xorshift requires a non-zero state
        let state = if state == 0 { 1 } else { state };
        Self { state }
    }

    /// Get the current state
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Generate the next raw u64 value
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Generate a random f64 in range [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        // top 53 bits keep the result strictly below 1.0
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generate a random f64 in the open interval (0, 1)
    pub fn next_open01(&mut self) -> f64 {
        loop {
            let u = self.next_f64();
            if u > 0.0 {
                return u;
            }
        }
    }

    /// Generate a random f64 in range [min, max)
    pub fn range_f64(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_f64() * (max - min)
    }

    /// Generate a random u32 in range [min, max]
    pub fn range_u32(&mut self, min: u32, max: u32) -> u32 {
        if max <= min {
            return min;
        }
        let span = (max - min) as u64 + 1;
        min + (self.next_u64() % span) as u32
    }

    /// Pick a uniformly distributed index below `len`
    pub fn index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            None
        } else {
            Some((self.next_u64() % len as u64) as usize)
        }
    }

    /// Sample an exponential distribution with the given rate
    ///
    /// Returns a strictly positive value. Non-positive rates never fire and
    /// yield infinity.
    pub fn exponential(&mut self, rate: f64) -> f64 {
        if !(rate > 0.0) {
            return f64::INFINITY;
        }
        -self.next_open01().ln() / rate
    }

    /// Sample a standard normal variate (Box-Muller)
    pub fn standard_normal(&mut self) -> f64 {
        let u1 = self.next_open01();
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

impl Default for SimRng {
    fn default() -> Self {
        Self::new(12345)
    }
}

/// Derive a child seed from a base seed and two salts (splitmix64 finalizer)
pub fn mix_seed(seed: u64, a: u64, b: u64) -> u64 {
    splitmix64(
        seed.wrapping_add(a.wrapping_mul(0x9E37_79B9_7F4A_7C15))
            .wrapping_add(b.wrapping_mul(0xBF58_476D_1CE4_E5B9)),
    )
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// FNV-1a hash of a string, stable across runs and platforms
pub fn hash_str(text: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
    text.bytes().fold(FNV_OFFSET, |h, b| {
        (h ^ b as u64).wrapping_mul(FNV_PRIME)
    })
}
