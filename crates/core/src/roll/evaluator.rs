use rand::rngs::ThreadRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::parser::RollRequest;

/// Source of die faces. Implementations return a value in `1..=sides`.
pub trait DieSource {
    fn roll_die(&mut self, sides: u32) -> u32;
}

/// Adapts any `rand` generator into a uniform die source.
#[derive(Debug)]
pub struct RngDieSource<R> {
    rng: R,
}

impl<R: Rng> RngDieSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngDieSource<ThreadRng> {
    pub fn thread() -> Self {
        Self::new(rand::thread_rng())
    }
}

impl<R: Rng> DieSource for RngDieSource<R> {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.rng.gen_range(1..=sides.max(1))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOutcome {
    pub results: Vec<u32>,
    pub sum: i64,
    /// Weighted: a critical hit counts twice.
    pub hits: u32,
    pub hits_critical: u32,
    /// Weighted: a critical miss counts twice.
    pub misses: u32,
    pub misses_critical: u32,
}

pub fn evaluate<D>(request: &RollRequest, dice: &mut D) -> RollOutcome
where
    D: DieSource + ?Sized,
{
    let mut outcome = RollOutcome {
        results: Vec::with_capacity(request.count as usize),
        ..RollOutcome::default()
    };

    for _ in 0..request.count {
        let value = dice.roll_die(request.sides);
        outcome.results.push(value);
        outcome.sum += i64::from(value);

        let Some(threshold) = request.hit_threshold else {
            continue;
        };

        if value >= threshold {
            if value == request.sides {
                outcome.hits += 2;
                outcome.hits_critical += 1;
            } else {
                outcome.hits += 1;
            }
        } else if value == 1 {
            outcome.misses += 2;
            outcome.misses_critical += 1;
        } else {
            outcome.misses += 1;
        }
    }

    if let Some(modifier) = request.modifier {
        outcome.sum = modifier.apply(outcome.sum);
    }

    outcome
}

/// Replays a fixed list of faces, cycling when exhausted.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct ScriptedDice {
    faces: Vec<u32>,
    next: usize,
}

#[cfg(test)]
impl ScriptedDice {
    pub(crate) fn new(faces: impl Into<Vec<u32>>) -> Self {
        Self { faces: faces.into(), next: 0 }
    }

    pub(crate) fn draws(&self) -> usize {
        self.next
    }
}

#[cfg(test)]
impl DieSource for ScriptedDice {
    fn roll_die(&mut self, _sides: u32) -> u32 {
        let face = self.faces[self.next % self.faces.len()];
        self.next += 1;
        face
    }
}
