use log::debug;

use crate::analysis::Analysis;
use crate::system::System;

use super::heuristics::proportional_deadlines;
use super::{derive_priorities, globalize_deadlines, normalize_priorities, Assigner, Snapshot};

/// Iterative deadline redistribution (heuristic optimized priority
/// assignment).
///
/// Starting from the proportional-deadline seed, each iteration derives
/// priorities from the current local deadlines, analyzes the system, and
/// shifts deadline budget away from tasks that overrun theirs, scaled by
/// the `(ka, kr)` pair currently in effect. The assignment with the best
/// system slack seen anywhere in the schedule is kept and reinstalled at
/// the end, followed by a final validating analysis.
pub struct Hopa<A> {
    pub analysis: A,
    /// Iterations per `(ka, kr)` pair.
    pub iterations: u32,
    /// Schedule of `(ka, kr)` scaling pairs; each pair restarts from the
    /// best assignment found so far.
    pub k_pairs: Vec<(f64, f64)>,
    /// Consecutive iterations without a priority change before giving up.
    pub patience: i32,
    /// Extra iterations to keep optimizing after the system first
    /// becomes schedulable.
    pub over_iterations: u32,
    pub normalize: bool,
    pub globalize: bool,
    pub verbose: bool,
}

impl<A> Hopa<A> {
    pub fn new(analysis: A) -> Self {
        Hopa {
            analysis,
            iterations: 40,
            k_pairs: Self::default_k_pairs(),
            patience: 40,
            over_iterations: 0,
            normalize: false,
            globalize: false,
            verbose: false,
        }
    }

    pub fn default_k_pairs() -> Vec<(f64, f64)> {
        vec![(2.0, 2.0), (1.8, 1.8), (3.0, 3.0), (1.5, 1.5)]
    }
}

/// Per-entity deadline-overrun excesses for one HOPA iteration. Kept in
/// side arrays indexed by arena position; the model itself carries no
/// excess state.
struct Excess {
    task: Vec<f64>,
    proc: Vec<f64>,
    flow_max: Vec<f64>,
    proc_max: f64,
}

impl Excess {
    fn measure(system: &System) -> Self {
        let task: Vec<f64> = system
            .task_ids()
            .map(|t| {
                let deadline = system[t].deadline;
                let wcrt = system[t].wcrt.unwrap_or(f64::MAX);
                let flow = system[t].flow();
                let flow_wcrt = system.flow_wcrt(flow).unwrap_or(f64::MAX);
                // a global deadline (beyond the period) absorbs the jitter
                let overrun = if deadline <= system.period(t) {
                    wcrt - deadline
                } else {
                    wcrt + system.jitter(t) - deadline
                };
                overrun * flow_wcrt / system[flow].deadline
            })
            .collect();

        let proc: Vec<f64> = system
            .proc_ids()
            .map(|p| {
                system
                    .tasks_on(p)
                    .map(|t| task[usize::from(t)])
                    .sum::<f64>()
            })
            .collect();

        let flow_max: Vec<f64> = system
            .flow_ids()
            .map(|f| {
                system[f]
                    .tasks()
                    .iter()
                    .map(|&t| task[usize::from(t)].abs())
                    .fold(0.0, f64::max)
            })
            .collect();

        let proc_max = proc.iter().map(|e| e.abs()).fold(0.0, f64::max);

        Excess {
            task,
            proc,
            flow_max,
            proc_max,
        }
    }
}

impl<A: Analysis> Hopa<A> {
    /// Rescale every task's local deadline by its own and its
    /// processor's excess, then renormalize so each flow's deadlines sum
    /// to the flow deadline again.
    fn update_local_deadlines(&self, system: &mut System, ka: f64, kr: f64) {
        let excess = Excess::measure(system);

        for (i, t) in system.task_ids().enumerate() {
            let proc_excess = excess.proc[usize::from(system[t].processor)];
            let flow_excess = excess.flow_max[usize::from(system[t].flow())];
            let by_proc = if kr * excess.proc_max != 0.0 {
                1.0 + proc_excess / (kr * excess.proc_max)
            } else {
                f64::MAX
            };
            let by_task = if ka * flow_excess != 0.0 {
                1.0 + excess.task[i] / (ka * flow_excess)
            } else {
                f64::MAX
            };
            system[t].deadline = system[t].deadline * by_proc * by_task;
        }

        for flow in system.flow_ids() {
            let tasks = system[flow].tasks().to_vec();
            let total: f64 = tasks.iter().map(|&t| system[t].deadline).sum();
            let deadline = system[flow].deadline;
            for t in tasks {
                system[t].deadline = system[t].deadline * deadline / total;
            }
        }
    }
}

/// Unknown response times poison the excess arithmetic; clamp them to
/// the largest finite value so ratios stay meaningful.
fn clamp_unknown_wcrts(system: &mut System) {
    for t in system.task_ids() {
        if system[t].wcrt.is_none() {
            system[t].wcrt = Some(f64::MAX);
        }
    }
}

impl<A: Analysis> Assigner for Hopa<A> {
    fn assign(&self, system: &mut System) {
        let mut patience = if self.patience >= 0 { self.patience } else { 100 };
        let mut over = self.over_iterations as i64;
        let mut optimizing = false;
        let mut best_slack = f64::NEG_INFINITY;
        let mut stop = false;

        proportional_deadlines(system);
        if self.globalize {
            globalize_deadlines(system);
        }
        let mut best = Snapshot::capture(system);

        for &(ka, kr) in &self.k_pairs {
            // every k-pair starts over from the best assignment so far
            best.restore(system);

            for i in 0..self.iterations {
                let changed = derive_priorities(system);
                patience = if changed { self.patience } else { patience - 1 };

                self.analysis.apply(system);
                clamp_unknown_wcrts(system);

                let slack = system.slack();
                if slack > best_slack {
                    best_slack = slack;
                    best = Snapshot::capture(system);
                }

                let schedulable = system.is_schedulable();
                if self.verbose {
                    debug!(
                        "iteration={} ka={} kr={} slack={:.4} {}",
                        i,
                        ka,
                        kr,
                        slack,
                        if schedulable {
                            "SCHEDULABLE"
                        } else {
                            "NOT SCHEDULABLE"
                        }
                    );
                }

                if schedulable && over > 0 {
                    optimizing = true;
                }
                if optimizing {
                    over -= 1;
                }
                if patience <= 0 || (!optimizing && schedulable) || (optimizing && over < 0) {
                    stop = true;
                    break;
                }

                self.update_local_deadlines(system, ka, kr);
                if self.globalize {
                    globalize_deadlines(system);
                }
            }

            if stop {
                break;
            }
        }

        best.restore(system);
        self.analysis.apply(system);
        if self.verbose {
            debug!(
                "returning best assignment: slack={:.4} {}",
                system.slack(),
                if system.is_schedulable() {
                    "SCHEDULABLE"
                } else {
                    "NOT SCHEDULABLE"
                }
            );
        }
        if self.normalize {
            normalize_priorities(system);
        }
    }
}
