// Injected random source for companion decision-making.
//
// Every random choice the task core makes (exploration-versus-patrol bias,
// waypoint sampling, occasional wandering while resting) draws from a
// `&mut dyn RandomSource` handed in by the caller for that tick. Nothing in
// the core owns a free-standing generator, so tests can replay an exact
// decision sequence by seeding `GameRng`, or pin individual rolls with
// `ScriptedRng`.
//
// `GameRng` is xoshiro256++ (Blackman & Vigna, 2019) expanded from a single
// `u64` seed with SplitMix64. The derived helpers (`next_f64`, `range_*`,
// `chance`, `weighted_index`) are provided methods on the trait so that any
// source, including a scripted one, yields the same derived values for the
// same raw `u64` stream.
//
// **Critical constraint: determinism.** No OS entropy, no system time, and
// no floating-point arithmetic inside the raw generator. The trait stays
// object-safe (no generic methods) so the core can take `dyn RandomSource`.

use serde::{Deserialize, Serialize};

/// A stream of random `u64`s plus the derived draws the core needs.
pub trait RandomSource {
    /// Next raw 64-bit value.
    fn next_u64(&mut self) -> u64;

    /// Uniform `f64` in [0, 1), built from the upper 53 bits.
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform integer in `[low, high)`. Rejection sampling avoids modulo
    /// bias. Returns `low` when the range is empty.
    fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        if low >= high {
            return low;
        }
        let range = high - low;
        if range.is_power_of_two() {
            return low + (self.next_u64() & (range - 1));
        }
        let threshold = range.wrapping_neg() % range;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % range);
            }
        }
    }

    /// Uniform `usize` in `[low, high)`.
    fn range_usize(&mut self, low: usize, high: usize) -> usize {
        self.range_u64(low as u64, high as u64) as usize
    }

    /// Uniform `i32` in `[low, high]`, inclusive on both ends.
    fn range_i32_inclusive(&mut self, low: i32, high: i32) -> i32 {
        if low >= high {
            return low;
        }
        let span = (high as i64 - low as i64 + 1) as u64;
        (low as i64 + self.range_u64(0, span) as i64) as i32
    }

    /// `true` with probability `p`. `p <= 0` never fires, `p >= 1` always does.
    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Pick an index with probability proportional to its weight. Negative
    /// and NaN weights count as zero. `None` if no weight is positive.
    fn weighted_index(&mut self, weights: &[f64]) -> Option<usize> {
        let clean = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
        let total: f64 = weights.iter().copied().map(clean).sum();
        if total <= 0.0 {
            return None;
        }
        let mut roll = self.next_f64() * total;
        let mut last_positive = None;
        for (i, &w) in weights.iter().enumerate() {
            let w = clean(w);
            if w <= 0.0 {
                continue;
            }
            if roll < w {
                return Some(i);
            }
            roll -= w;
            last_positive = Some(i);
        }
        // Rounding can leave a sliver past the final bucket.
        last_positive
    }
}

// ---------------------------------------------------------------------------
// GameRng: xoshiro256++
// ---------------------------------------------------------------------------

/// Seeded xoshiro256++ generator. Serializable so a debugging snapshot can
/// capture and resume the exact stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameRng {
    s: [u64; 4],
}

impl GameRng {
    /// Expand a `u64` seed into the 256-bit state via SplitMix64. Equal
    /// seeds give equal streams.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Derive an independent child stream, e.g. one per companion, without
    /// disturbing the parent beyond a single draw.
    pub fn fork(&mut self) -> Self {
        Self::new(self.step())
    }

    fn step(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }
}

impl RandomSource for GameRng {
    fn next_u64(&mut self) -> u64 {
        self.step()
    }
}

/// SplitMix64, used only to seed xoshiro256++.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

// ---------------------------------------------------------------------------
// ScriptedRng: fixed roll sequences for tests
// ---------------------------------------------------------------------------

/// Replays a fixed cycle of raw values. Built from unit floats so a test can
/// say "the next `chance()` rolls 0.05" and know exactly which branch fires.
#[derive(Clone, Debug)]
pub struct ScriptedRng {
    values: Vec<u64>,
    cursor: usize,
}

impl ScriptedRng {
    /// Cycle through raw `u64`s. An empty script yields zeros.
    pub fn from_raw(values: Vec<u64>) -> Self {
        Self { values, cursor: 0 }
    }

    /// Cycle through values chosen so that `next_f64()` returns each of
    /// `rolls` in turn (clamped into [0, 1)).
    pub fn from_unit_floats(rolls: &[f64]) -> Self {
        let scale = (1u64 << 53) as f64;
        let values = rolls
            .iter()
            .map(|&f| {
                let f = f.clamp(0.0, 1.0 - f64::EPSILON);
                ((f * scale) as u64) << 11
            })
            .collect();
        Self::from_raw(values)
    }
}

impl RandomSource for ScriptedRng {
    fn next_u64(&mut self) -> u64 {
        if self.values.is_empty() {
            return 0;
        }
        let v = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        v
    }
}
