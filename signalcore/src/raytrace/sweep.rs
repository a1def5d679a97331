//! Last request wins cancellation of sweeps, per antenna.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use tracing::debug;

use super::RayTrajectory;

#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    Completed(Vec<RayTrajectory>),
    /// A newer sweep for the same antenna was started before this one finished.
    Superseded,
}

impl SweepOutcome {
    pub fn completed(self) -> Option<Vec<RayTrajectory>> {
        match self {
            SweepOutcome::Completed(trajectories) => Some(trajectories),
            SweepOutcome::Superseded => None,
        }
    }
}

/// Generation counter per antenna id.
#[derive(Debug, Default)]
pub struct SweepRegistry {
    generations: Mutex<HashMap<String, Arc<AtomicU64>>>,
}

impl SweepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a sweep for `antenna_id`, superseding any sweep already running for it.
    pub fn begin(&self, antenna_id: &str) -> SweepToken {
        let counter = self.counter(antenna_id);
        let generation = counter.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(antenna = antenna_id, generation, "sweep started");

        SweepToken { counter, generation }
    }

    /// Supersedes the running sweep for `antenna_id` without starting another.
    pub fn cancel(&self, antenna_id: &str) {
        let generations = self.generations.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(counter) = generations.get(antenna_id) {
            counter.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Cancels and forgets an antenna, e.g. when it has been removed.
    pub fn forget(&self, antenna_id: &str) {
        let mut generations = self.generations.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(counter) = generations.remove(antenna_id) {
            counter.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn counter(&self, antenna_id: &str) -> Arc<AtomicU64> {
        let mut generations = self.generations.lock().unwrap_or_else(PoisonError::into_inner);
        generations
            .entry(antenna_id.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .clone()
    }
}

/// Held by a running sweep. Becomes superseded once a newer sweep starts for the
/// same antenna or the antenna is cancelled.
#[derive(Debug, Clone)]
pub struct SweepToken {
    counter: Arc<AtomicU64>,
    generation: u64,
}

impl SweepToken {
    /// A token nothing can supersede.
    pub fn detached() -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(1)),
            generation: 1,
        }
    }

    pub fn is_superseded(&self) -> bool {
        self.counter.load(Ordering::Acquire) != self.generation
    }
}
