use itertools::Itertools;
use log::{debug, warn};
use ordered_float::OrderedFloat;

use crate::analysis::{
    init_wcrt, propagate_overrun, reset_wcrt, Analysis, LimitExceeded, StepResult,
};
use crate::system::{Scheduler, System, TaskId};
use crate::time::{is_close, Time};

use super::divergence_cap;

/// Holistic analysis for EDF processors with local clock references
/// (after Rivas et al., "Optimized Deadline Assignment and
/// Schedulability Analysis for Distributed Real-Time Systems with Local
/// EDF Scheduling").
///
/// The structure mirrors [super::HolisticGlobalEdf], but the busy period
/// and the candidate-deadline set Ψ are built around the task under
/// analysis: Ψ combines the interference deadlines of co-located tasks
/// with the task's own activation deadlines.
#[derive(Clone, Debug)]
pub struct HolisticLocalEdf {
    pub limit_factor: f64,
    pub reset: bool,
    pub verbose: bool,
}

impl Default for HolisticLocalEdf {
    fn default() -> Self {
        HolisticLocalEdf {
            limit_factor: 10.0,
            reset: true,
            verbose: false,
        }
    }
}

impl HolisticLocalEdf {
    pub fn new() -> Self {
        Self::default()
    }

    fn run(&self, system: &mut System) -> StepResult<()> {
        loop {
            let mut changed = false;
            for task in system.task_ids() {
                changed |= self.task_analysis(system, task)?;
            }
            if !changed {
                return Ok(());
            }
        }
    }

    /// Busy period centered on the task under analysis: its own demand
    /// is counted without jitter, co-located tasks contribute with
    /// theirs. Iterated from the task's WCET.
    fn busy_period(&self, system: &System, task: TaskId) -> StepResult<Time> {
        let period = system.period(task);
        let wcet = system[task].wcet;
        let others: Vec<(Time, Time, Time)> = system
            .tasks_on(system[task].processor)
            .filter(|&t| t != task)
            .map(|t| (system.jitter(t), system.period(t), system[t].wcet))
            .collect();
        let cap = divergence_cap(system, system[task].processor, self.limit_factor);

        let mut l_prev = wcet;
        loop {
            let own = (l_prev / period).ceil() * wcet;
            let length: Time = own
                + others
                    .iter()
                    .map(|&(j, t, c)| ((l_prev + j) / t).ceil() * c)
                    .sum::<Time>();
            if is_close(length, l_prev) {
                return Ok(length);
            }
            if let Some((guard, limit)) = cap {
                if length > limit {
                    return Err(LimitExceeded {
                        task: guard,
                        response_time: length,
                        limit,
                    });
                }
            }
            l_prev = length;
        }
    }

    /// The full candidate set Ψ for the task: scheduling deadlines of
    /// co-located tasks that fall inside the busy period, their relative
    /// deadlines, and the task's own activation deadlines.
    fn candidate_deadlines(&self, system: &System, task: TaskId, length: Time) -> Vec<Time> {
        let period = system.period(task);
        let deadline = system[task].deadline;

        let interference = system
            .tasks_on(system[task].processor)
            .filter(|&t| t != task)
            .flat_map(|t| {
                let jitter = system.jitter(t);
                let t_period = system.period(t);
                let t_deadline = system[t].deadline;
                let releases = ((length + jitter) / t_period).ceil() as u32;
                (1..=releases)
                    .map(move |p| (p as f64 - 1.0) * t_period - jitter)
                    .filter(|&offset| offset >= 0.0)
                    .map(move |offset| offset + t_deadline)
                    .chain(std::iter::once(t_deadline))
            });

        let own = (1..=(length / period).ceil() as u32)
            .map(|p| (p as f64 - 1.0) * period + deadline);

        interference
            .chain(own)
            .sorted_by_key(|&psi| OrderedFloat(psi))
            .dedup()
            .collect()
    }

    fn task_analysis(&self, system: &mut System, task: TaskId) -> StepResult<bool> {
        let length = self.busy_period(system, task)?;
        let all_psi = self.candidate_deadlines(system, task, length);

        let flow = system[task].flow();
        let limit = system[flow].deadline * self.limit_factor;
        let period = system[flow].period;
        let jitter = system.jitter(task);
        let deadline = system[task].deadline;

        let mut max_r: Time = 0.0;
        for p in 1..=(length / period).ceil() as u32 {
            let pf = p as f64;
            let lo = (pf - 1.0) * period + deadline;
            let hi = pf * period + deadline;
            for &psi in all_psi.iter().filter(|&&psi| lo <= psi && psi < hi) {
                let w = self.window(system, task, psi, pf);
                let r = w - psi + deadline + jitter;
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

    /// Workload fixed point for the p-th activation against candidate
    /// deadline `psi`, iterated from the task's own demand.
    fn window(&self, system: &System, task: TaskId, psi: Time, pf: f64) -> Time {
        let wcet = system[task].wcet;
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

        let mut w_prev = pf * wcet;
        loop {
            let w: Time = pf * wcet
                + others
                    .iter()
                    .map(|&o| interference(o, w_prev, psi))
                    .sum::<Time>();
            if is_close(w, w_prev) {
                return w;
            }
            w_prev = w;
        }
    }
}

/// Workload of an interfering task within a window of length `w`, capped
/// by the jobs whose scheduling deadline is at most `deadline`. Jobs with
/// a later relative deadline than the window contribute nothing.
fn interference(
    (jitter, period, own_deadline, wcet): (Time, Time, Time, Time),
    w: Time,
    deadline: Time,
) -> Time {
    let by_window = ((w + jitter) / period).ceil();
    let by_deadline = if deadline < own_deadline {
        0.0
    } else {
        ((jitter + deadline - own_deadline) / period).floor() + 1.0
    };
    let jobs = by_window.min(by_deadline);
    if jobs > 0.0 {
        jobs * wcet
    } else {
        0.0
    }
}

impl Analysis for HolisticLocalEdf {
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
