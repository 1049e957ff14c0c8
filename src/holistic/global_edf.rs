use itertools::Itertools;
use log::{debug, warn};
use ordered_float::OrderedFloat;

use crate::analysis::{
    init_wcrt, propagate_overrun, reset_wcrt, Analysis, LimitExceeded, StepResult,
};
use crate::system::{ProcId, Scheduler, System, TaskId};
use crate::time::{is_close, Time};

use super::divergence_cap;

/// Holistic analysis for EDF processors with a global clock reference.
///
/// Per processor, the analysis bounds the longest level-0 busy period,
/// derives the set of candidate absolute deadlines Ψ, and runs a
/// response-time fixed point for every activation window that contains a
/// candidate. Processors are re-analyzed until no response time changes,
/// so jitter propagated along the flows reaches a fixed point.
#[derive(Clone, Debug)]
pub struct HolisticGlobalEdf {
    pub limit_factor: f64,
    pub reset: bool,
    pub verbose: bool,
}

impl Default for HolisticGlobalEdf {
    fn default() -> Self {
        HolisticGlobalEdf {
            limit_factor: 10.0,
            reset: true,
            verbose: false,
        }
    }
}

fn activations(length: Time, jitter: Time, period: Time) -> u32 {
    ((length + jitter) / period).ceil() as u32
}

impl HolisticGlobalEdf {
    pub fn new() -> Self {
        Self::default()
    }

    fn run(&self, system: &mut System) -> StepResult<()> {
        loop {
            let mut changed = false;
            for proc in system.proc_ids() {
                changed |= self.proc_analysis(system, proc)?;
            }
            if !changed {
                return Ok(());
            }
        }
    }

    fn proc_analysis(&self, system: &mut System, proc: ProcId) -> StepResult<bool> {
        let length = self.busy_period(system, proc)?;
        let mut changed = false;
        for task in system.tasks_on(proc).collect::<Vec<_>>() {
            changed |= self.task_analysis(system, task, length)?;
        }
        Ok(changed)
    }

    /// Longest level-0 busy period of the processor, iterated from 0.
    /// The trivial fixed point at 0 is reachable when every local task
    /// has zero jitter; the candidate set is then empty and the
    /// initialization values stand.
    fn busy_period(&self, system: &System, proc: ProcId) -> StepResult<Time> {
        let demand: Vec<(Time, Time, Time)> = system
            .tasks_on(proc)
            .map(|t| (system.jitter(t), system.period(t), system[t].wcet))
            .collect();
        let cap = divergence_cap(system, proc, self.limit_factor);

        let mut l_prev = 0.0;
        loop {
            let length: Time = demand
                .iter()
                .map(|&(j, t, c)| ((l_prev + j) / t).ceil() * c)
                .sum();
            if is_close(length, l_prev) {
                return Ok(length);
            }
            if let Some((task, limit)) = cap {
                if length > limit {
                    return Err(LimitExceeded {
                        task,
                        response_time: length,
                        limit,
                    });
                }
            }
            l_prev = length;
        }
    }

    /// The candidate absolute deadlines within the busy period, relative
    /// to its start.
    fn candidate_deadlines(&self, system: &System, proc: ProcId, length: Time) -> Vec<Time> {
        system
            .tasks_on(proc)
            .flat_map(|t| {
                let jitter = system.jitter(t);
                let period = system.period(t);
                let deadline = system[t].deadline;
                (1..=activations(length, jitter, period))
                    .map(move |p| (p as f64 - 1.0) * period - jitter + deadline)
            })
            .sorted_by_key(|&psi| OrderedFloat(psi))
            .dedup()
            .collect()
    }

    fn task_analysis(&self, system: &mut System, task: TaskId, length: Time) -> StepResult<bool> {
        let proc = system[task].processor;
        let all_psi = self.candidate_deadlines(system, proc, length);

        let flow = system[task].flow();
        let limit = system[flow].deadline * self.limit_factor;
        let period = system[flow].period;
        let jitter = system.jitter(task);
        let deadline = system[task].deadline;

        let mut max_r: Time = 0.0;
        for p in 1..=activations(length, jitter, period) {
            let pf = p as f64;
            // candidates whose deadline falls in the p-th activation window
            let lo = (pf - 1.0) * period - jitter + deadline;
            let hi = pf * period - jitter + deadline;
            for &psi in all_psi.iter().filter(|&&psi| lo <= psi && psi < hi) {
                let activation = psi - (pf - 1.0) * period + jitter - deadline;
                let r = self.response_at(system, task, activation, pf);
                if r > max_r {
                    max_r = r;
                }
                if r > limit {
                    return Err(LimitExceeded {
                        task,
                        response_time: r,
                        limit,
                    });
                }
            }
        }

        if max_r > system[task].wcrt.unwrap_or(0.0) {
            if self.verbose {
                debug!("{} wcrt={:.3}", system[task].name, max_r);
            }
            system[task].wcrt = Some(max_r);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Window response-time fixed point for the p-th activation released
    /// at `activation` within the busy period.
    fn response_at(&self, system: &System, task: TaskId, activation: Time, pf: f64) -> Time {
        let period = system.period(task);
        let jitter = system.jitter(task);
        let wcet = system[task].wcet;
        let deadline_activation =
            activation - jitter + (pf - 1.0) * period + system[task].deadline;

        let others: Vec<(Time, Time, Time, Time)> = system
            .tasks_on(system[task].processor)
            .filter(|&t| t != task)
            .map(|t| {
                (
                    system.jitter(t),
                    system.period(t),
                    system[t].deadline,
                    system[t].wcet,
                )
            })
            .collect();

        let mut wa_prev = 0.0;
        let wa = loop {
            let wa: Time = pf * wcet
                + others
                    .iter()
                    .map(|&o| interference(o, wa_prev, deadline_activation))
                    .sum::<Time>();
            if is_close(wa, wa_prev) {
                break wa;
            }
            wa_prev = wa;
        };
        wa - activation + jitter - (pf - 1.0) * period
    }
}

/// Workload of an interfering task within a window of length `w`, capped
/// by the number of its jobs whose absolute deadline is at most `deadline`.
fn interference(
    (jitter, period, own_deadline, wcet): (Time, Time, Time, Time),
    w: Time,
    deadline: Time,
) -> Time {
    let by_window = ((w + jitter) / period).ceil();
    let by_deadline = ((jitter + deadline - own_deadline) / period).floor() + 1.0;
    let jobs = by_window.min(by_deadline);
    if jobs > 0.0 {
        jobs * wcet
    } else {
        0.0
    }
}

impl Analysis for HolisticGlobalEdf {
    fn apply(&self, system: &mut System) {
        if !system.uses_scheduler(Scheduler::Edf) {
            warn!("system has non-EDF processors; clearing response times");
            reset_wcrt(system);
            return;
        }

        init_wcrt(system);
        if let Err(overrun) = self.run(system) {
            if self.verbose {
                debug!("{}", overrun);
            }
            if self.reset {
                reset_wcrt(system);
            } else {
                propagate_overrun(system, overrun.task, overrun.response_time);
            }
        }
    }
}
