//! Cosmetic perturbation of served snapshots.
//!
//! Applied to a copy of the snapshot after it leaves the store; the stored
//! value is never modified.

use std::sync::Mutex;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{Number, Value};

/// Pure transform applied to a snapshot value before it is encoded.
pub trait SnapshotTransform: Send + Sync {
    fn apply(&self, value: &Value) -> Value;
}

/// Adds bounded uniform noise to every numeric leaf.
///
/// Floats move by up to `bound` in either direction. Integers move by up to
/// `floor(bound)` and stay integers. Keys, strings, booleans and nulls are
/// left untouched.
pub struct Jitter {
    bound: f64,
    rng: Mutex<ChaCha8Rng>,
}

impl Jitter {
    pub fn new(bound: f64) -> Self {
        Self::from_rng(bound, ChaCha8Rng::from_entropy())
    }

    /// Deterministic sequence of outputs for a given seed.
    pub fn seeded(bound: f64, seed: u64) -> Self {
        Self::from_rng(bound, ChaCha8Rng::seed_from_u64(seed))
    }

    fn from_rng(bound: f64, rng: ChaCha8Rng) -> Self {
        Self {
            bound: bound.abs(),
            rng: Mutex::new(rng),
        }
    }

    /// Fork a per-call generator so the shared lock is not held while walking.
    fn fork(&self) -> ChaCha8Rng {
        let mut shared = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        ChaCha8Rng::seed_from_u64(shared.r#gen())
    }

    fn walk(&self, value: &Value, rng: &mut ChaCha8Rng) -> Value {
        match value {
            Value::Number(n) => Value::Number(self.perturb_number(n, rng)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.walk(v, rng)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.walk(v, rng)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn perturb_number(&self, n: &Number, rng: &mut ChaCha8Rng) -> Number {
        let int_bound = self.bound.floor() as i64;
        if let Some(i) = n.as_i64() {
            let offset = rng.gen_range(-int_bound..=int_bound);
            return Number::from(i.saturating_add(offset));
        }
        if let Some(u) = n.as_u64() {
            let offset = rng.gen_range(-int_bound..=int_bound) as i128;
            let shifted = (u as i128 + offset).clamp(0, u64::MAX as i128) as u64;
            return Number::from(shifted);
        }
        match n.as_f64() {
            Some(f) => {
                // Scaling a unit sample keeps huge bounds from overflowing the range.
                let delta = self.bound * rng.gen_range(-1.0..=1.0);
                Number::from_f64(f + delta).unwrap_or_else(|| n.clone())
            }
            None => n.clone(),
        }
    }
}

impl SnapshotTransform for Jitter {
    fn apply(&self, value: &Value) -> Value {
        let mut rng = self.fork();
        self.walk(value, &mut rng)
    }
}
