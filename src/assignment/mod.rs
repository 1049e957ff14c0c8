/*! Assignment of priorities, local deadlines, and mappings.

An [Assigner] seeds or rewrites the scheduling parameters of a system:
task priorities, local deadlines, and (for the optimizer-driven paths)
task-to-processor mappings. Assigners never touch response times.

[Snapshot] captures the complete mutable assignment state as a compact
vector of `(priority, deadline, processor)` tuples, which is what the
optimizer's transactional cost evaluation and HOPA's best-so-far
bookkeeping restore from.
*/

use auto_impl::auto_impl;
use ordered_float::OrderedFloat;

use crate::system::{ProcId, System};
use crate::time::{Priority, Time};

mod heuristics;
mod hopa;

pub use heuristics::{
    EqualFlexibility, EqualSlack, Passthrough, ProportionalDeadline, RandomPriorities,
};
pub use hopa::Hopa;

/// Mutates the assignment (priorities, deadlines, mapping) of a system.
#[auto_impl(&, Box, Rc)]
pub trait Assigner {
    fn assign(&self, system: &mut System);
}

/// Derive priorities from local deadlines: on each processor, tasks are
/// sorted by descending deadline and numbered `1..=k` in that order, so
/// the largest deadline gets the lowest priority (deadline-monotonic up
/// to the tie order of the stable sort).
///
/// Returns whether any priority changed.
pub fn derive_priorities(system: &mut System) -> bool {
    let mut changed = false;
    for proc in system.proc_ids() {
        let mut tasks: Vec<_> = system.tasks_on(proc).collect();
        tasks.sort_by_key(|&t| std::cmp::Reverse(OrderedFloat(system[t].deadline)));
        for (i, &t) in tasks.iter().enumerate() {
            let priority = (i + 1) as Priority;
            if !changed && system[t].priority != priority {
                changed = true;
            }
            system[t].priority = priority;
        }
    }
    changed
}

/// Scale every priority into `(0, 1]` by dividing by the global maximum.
pub fn normalize_priorities(system: &mut System) {
    let max = system
        .task_ids()
        .map(|t| OrderedFloat(system[t].priority))
        .max()
        .map(|m| m.0)
        .unwrap_or(1.0);
    for t in system.task_ids() {
        system[t].priority /= max;
    }
}

/// Turn per-task local deadlines into cumulative (global) deadlines
/// along each flow.
pub fn globalize_deadlines(system: &mut System) {
    for flow in system.flow_ids() {
        let tasks = system[flow].tasks().to_vec();
        for pair in tasks.windows(2) {
            let carried = system[pair[0]].deadline;
            system[pair[1]].deadline += carried;
        }
    }
}

/// A backup of the complete mutable assignment state, in task arena
/// order.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    entries: Vec<(Priority, Time, ProcId)>,
}

impl Snapshot {
    pub fn capture(system: &System) -> Self {
        Snapshot {
            entries: system
                .task_ids()
                .map(|t| {
                    let task = &system[t];
                    (task.priority, task.deadline, task.processor)
                })
                .collect(),
        }
    }

    /// Write the captured tuples back. The system must have the same
    /// task population the snapshot was taken from.
    pub fn restore(&self, system: &mut System) {
        for (t, &(priority, deadline, processor)) in system.task_ids().zip(&self.entries) {
            let task = &mut system[t];
            task.priority = priority;
            task.deadline = deadline;
            task.processor = processor;
        }
    }
}
