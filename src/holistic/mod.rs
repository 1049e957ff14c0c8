/*! Holistic response-time analyses.

A holistic analysis iterates per-processor (or per-task) response-time
fixed points to a *global* fixed point: each task's release jitter is the
worst-case response time of its predecessor in the flow, so response
times computed on one processor feed back into the analysis of the next,
until the whole system stabilizes.

Three kernels are provided, one per local scheduling policy:

- [HolisticFixedPriority] for systems whose processors all dispatch by
  fixed priorities,
- [HolisticGlobalEdf] for EDF processors with a global clock reference,
- [HolisticLocalEdf] for EDF processors with local clock references.

All three share the divergence discipline of [crate::analysis]: a
provisional response time beyond `limit_factor` times the flow deadline
aborts the run, either clearing all response times (`reset`) or flooding
the affected flow with the diverged bound.
*/

mod fixed_priority;
mod global_edf;
mod local_edf;

pub use fixed_priority::HolisticFixedPriority;
pub use global_edf::HolisticGlobalEdf;
pub use local_edf::HolisticLocalEdf;

use ordered_float::OrderedFloat;

use crate::system::{ProcId, System, TaskId};
use crate::time::Time;

/// Bound for the EDF busy-period iterations, which have no natural
/// response-time check of their own: the longest flow deadline served by
/// the processor, scaled by the divergence factor. Also picks the task
/// the overrun is attributed to. `None` on an idle processor.
fn divergence_cap(system: &System, proc: ProcId, limit_factor: f64) -> Option<(TaskId, Time)> {
    let task = system
        .tasks_on(proc)
        .max_by_key(|&t| OrderedFloat(system[system[t].flow()].deadline))?;
    let limit = limit_factor * system[system[task].flow()].deadline;
    Some((task, limit))
}

#[cfg(test)]
mod tests;
