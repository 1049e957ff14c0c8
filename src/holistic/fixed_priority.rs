use log::debug;

use crate::analysis::{
    higher_priority, init_wcrt, propagate_overrun, reset_wcrt, Analysis, LimitExceeded, StepResult,
};
use crate::system::{System, TaskId};
use crate::time::Time;

/// Holistic analysis for systems scheduled under fixed priorities
/// (Tindell-style busy-period iteration with jitter propagation along
/// the flows).
///
/// The analysis is monotone: response times only grow, starting from the
/// cumulative-WCET seed, until the vector of response times reaches a
/// fixed point.
#[derive(Clone, Debug)]
pub struct HolisticFixedPriority {
    /// Divergence limit, as a multiple of each flow's deadline.
    pub limit_factor: f64,
    /// On divergence, clear every response time instead of flooding the
    /// affected flow with the diverged bound.
    pub reset: bool,
    /// Emit a debug record per inner iteration.
    pub verbose: bool,
}

impl Default for HolisticFixedPriority {
    fn default() -> Self {
        HolisticFixedPriority {
            limit_factor: 10.0,
            reset: false,
            verbose: false,
        }
    }
}

impl HolisticFixedPriority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Busy-period iteration for one task, updating its WCRT in place.
    fn task_step(&self, system: &mut System, task: TaskId) -> StepResult<()> {
        // Interferer parameters are stable within this step: jitters only
        // change between outer passes.
        let interference: Vec<(Time, Time, Time)> = higher_priority(system, task)
            .into_iter()
            .map(|t| (system.jitter(t), system.period(t), system[t].wcet))
            .collect();

        let flow = system[task].flow();
        let limit = system[flow].deadline * self.limit_factor;
        let wcet = system[task].wcet;
        let period = system[flow].period;
        let jitter = system.jitter(task);

        let mut p = 1u32;
        loop {
            let pf = p as f64;
            let mut w = pf * wcet;
            let mut w_prev = 0.0;
            while w != w_prev {
                w_prev = w;
                w = pf * wcet
                    + interference
                        .iter()
                        .map(|&(j, t, c)| ((j + w_prev) / t).ceil() * c)
                        .sum::<Time>();
                let r = w - (pf - 1.0) * period + jitter;

                if self.verbose {
                    debug!(
                        "{} p={} w={:.3} wprev={:.3} r={:.3} wcrt={:.3}",
                        system[task].name,
                        p,
                        w,
                        w_prev,
                        r,
                        system[task].wcrt.unwrap_or(0.0)
                    );
                }
                if r > system[task].wcrt.unwrap_or(0.0) {
                    system[task].wcrt = Some(r);
                }
                if r > limit {
                    return Err(LimitExceeded {
                        task,
                        response_time: r,
                        limit,
                    });
                }
            }

            if w <= pf * period {
                // the level-p busy period ended within p activations
                break;
            }
            p += 1;
        }
        Ok(())
    }
}

impl Analysis for HolisticFixedPriority {
    fn apply(&self, system: &mut System) {
        init_wcrt(system);

        let snapshot =
            |s: &System| -> Vec<Option<Time>> { s.task_ids().map(|t| s[t].wcrt).collect() };

        let mut previous = vec![None; system.task_count()];
        let mut current = snapshot(system);

        // Jitter convergence: repeat the per-task busy-period iteration
        // until a full pass leaves every response time unchanged.
        while current != previous {
            previous = current;
            for task in system.task_ids() {
                if let Err(overrun) = self.task_step(system, task) {
                    if self.verbose {
                        debug!("{}", overrun);
                    }
                    if self.reset {
                        reset_wcrt(system);
                    } else {
                        let bound = system[task].wcrt.unwrap_or(overrun.response_time);
                        propagate_overrun(system, task, bound);
                    }
                    return;
                }
            }
            current = snapshot(system);
        }
    }
}
