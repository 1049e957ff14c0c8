/*! Shared interface and plumbing for the holistic analyses.

An [Analysis] computes worst-case response times for every task of a
system; it mutates nothing but `wcrt`. Divergence inside an analysis is
represented by the [LimitExceeded] error, which never escapes an
[Analysis::apply] call: each analysis catches it and applies one of two
recovery modes (clear all response times, or flood the affected flow
with the diverged bound so downstream consumers still see finite
values).
*/

use auto_impl::auto_impl;
use thiserror::Error;

use crate::system::{System, TaskId};
use crate::time::Time;

/// A response-time analysis. Mutates only the tasks' `wcrt` fields.
#[auto_impl(&, Box, Rc)]
pub trait Analysis {
    fn apply(&self, system: &mut System);
}

/// Raised (internally) when a provisional response time exceeds the
/// divergence limit `limit_factor * flow deadline`.
#[derive(Debug, Error, Copy, Clone, PartialEq)]
#[error(
    "provisional response time for {task} (r={response_time}) reached the divergence limit {limit}"
)]
pub struct LimitExceeded {
    pub task: TaskId,
    pub response_time: Time,
    pub limit: Time,
}

pub(crate) type StepResult<T> = Result<T, LimitExceeded>;

/// Seed every task's WCRT with the cumulative WCET along its flow. This
/// is the lower bound the fixed points grow from: the first task starts
/// at its own WCET, every later task at its WCET plus the predecessor's
/// seed.
pub fn init_wcrt(system: &mut System) {
    for task in system.task_ids() {
        let base = system
            .predecessor(task)
            .and_then(|p| system[p].wcrt)
            .unwrap_or(0.0);
        system[task].wcrt = Some(base + system[task].wcet);
    }
}

/// Clear every task's WCRT back to unknown.
pub fn reset_wcrt(system: &mut System) {
    for task in system.task_ids() {
        system[task].wcrt = None;
    }
}

/// The interference set under fixed-priority scheduling: every other
/// task on the same processor whose priority is greater than *or equal
/// to* the given task's. Counting equal priorities is a conservative
/// tie-break: a task at the same level may be dispatched first.
pub fn higher_priority(system: &System, task: TaskId) -> Vec<TaskId> {
    let proc = system[task].processor;
    let prio = system[task].priority;
    system
        .tasks_on(proc)
        .filter(|&t| t != task && system[t].priority >= prio)
        .collect()
}

/// Write a diverged response-time bound into a task and every task after
/// it in its flow. The flow ends up unschedulable but with finite
/// response times, which the gradient-based optimizers rely on.
pub fn propagate_overrun(system: &mut System, task: TaskId, bound: Time) {
    let successors = system.downstream(task).to_vec();
    system[task].wcrt = Some(bound);
    for succ in successors {
        system[succ].wcrt = Some(bound);
    }
}
