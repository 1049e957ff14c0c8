use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::system::System;
use crate::time::Priority;

use super::{derive_priorities, globalize_deadlines, normalize_priorities, Assigner};

/// Proportional Deadline: each flow's deadline is distributed over its
/// tasks in proportion to their WCET, so the local deadlines of a flow
/// sum exactly to the flow deadline. Priorities are then derived from
/// the deadlines.
#[derive(Clone, Debug, Default)]
pub struct ProportionalDeadline {
    pub normalize: bool,
    pub globalize: bool,
}

impl ProportionalDeadline {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The bare PD deadline distribution, without priority derivation. Also
/// used to seed the iterative deadline-redistribution assigner.
pub(crate) fn proportional_deadlines(system: &mut System) {
    for flow in system.flow_ids() {
        let tasks = system[flow].tasks().to_vec();
        let total_wcet: f64 = tasks.iter().map(|&t| system[t].wcet).sum();
        let deadline = system[flow].deadline;
        for t in tasks {
            system[t].deadline = system[t].wcet * deadline / total_wcet;
        }
    }
}

impl Assigner for ProportionalDeadline {
    fn assign(&self, system: &mut System) {
        proportional_deadlines(system);
        if self.globalize {
            globalize_deadlines(system);
        }
        derive_priorities(system);
        if self.normalize {
            normalize_priorities(system);
        }
    }
}

/// Equal Slack: walking each flow backwards, the remaining end-to-end
/// margin is split evenly over the tasks still ahead of the cursor.
#[derive(Clone, Debug, Default)]
pub struct EqualSlack;

impl Assigner for EqualSlack {
    fn assign(&self, system: &mut System) {
        for flow in system.flow_ids() {
            let tasks = system[flow].tasks().to_vec();
            let deadline = system[flow].deadline;
            let n = tasks.len();
            let mut consumed = 0.0;
            for (j, &t) in tasks.iter().enumerate().rev() {
                consumed += system[t].wcet;
                system[t].deadline =
                    system[t].wcet + (deadline - consumed) / (n - j) as f64;
            }
        }
        derive_priorities(system);
    }
}

/// Equal Flexibility: like [EqualSlack], but the remaining margin is
/// split in proportion to each task's share of the WCET still ahead of
/// the cursor.
#[derive(Clone, Debug, Default)]
pub struct EqualFlexibility;

impl Assigner for EqualFlexibility {
    fn assign(&self, system: &mut System) {
        for flow in system.flow_ids() {
            let tasks = system[flow].tasks().to_vec();
            let deadline = system[flow].deadline;
            let mut consumed = 0.0;
            for &t in tasks.iter().rev() {
                consumed += system[t].wcet;
                system[t].deadline =
                    system[t].wcet + (deadline - consumed) * (system[t].wcet / consumed);
            }
        }
        derive_priorities(system);
    }
}

/// Assign the priorities `1..=N` to a seeded random permutation of the
/// tasks.
#[derive(Clone, Debug)]
pub struct RandomPriorities {
    pub seed: u64,
    pub normalize: bool,
}

impl Default for RandomPriorities {
    fn default() -> Self {
        RandomPriorities {
            seed: 42,
            normalize: false,
        }
    }
}

impl Assigner for RandomPriorities {
    fn assign(&self, system: &mut System) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut tasks: Vec<_> = system.task_ids().collect();
        tasks.shuffle(&mut rng);
        for (i, &t) in tasks.iter().enumerate() {
            system[t].priority = (i + 1) as Priority;
        }
        if self.normalize {
            normalize_priorities(system);
        }
    }
}

/// Leave the assignment untouched, save for the optional priority
/// normalization.
#[derive(Clone, Debug, Default)]
pub struct Passthrough {
    pub normalize: bool,
}

impl Assigner for Passthrough {
    fn assign(&self, system: &mut System) {
        if self.normalize {
            normalize_priorities(system);
        }
    }
}
