use ordered_float::OrderedFloat;

use crate::system::{ProcId, System};

use super::ParameterHandler;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn max_deadline(system: &System) -> f64 {
    system
        .task_ids()
        .map(|t| OrderedFloat(system[t].deadline))
        .max()
        .map(|m| m.0)
        .unwrap_or(0.0)
}

/// Parameterizes local deadlines: `x_i = sigmoid(deadline_i / max
/// deadline)` on extraction, `deadline_i = x_i * max deadline` on
/// insertion. The asymmetry is deliberate; it is what makes the
/// insert/extract round-trip act as a normalization.
#[derive(Clone, Debug, Default)]
pub struct DeadlineExtractor;

impl ParameterHandler for DeadlineExtractor {
    fn extract(&self, system: &System) -> Vec<f64> {
        let max_d = max_deadline(system);
        system
            .task_ids()
            .map(|t| sigmoid(system[t].deadline / max_d))
            .collect()
    }

    fn insert(&self, system: &mut System, x: &[f64]) {
        debug_assert_eq!(x.len(), system.task_count());
        let max_d = max_deadline(system);
        for (t, &v) in system.task_ids().zip(x) {
            system[t].deadline = v * max_d;
        }
    }
}

/// Parameterizes priorities: `x_i = sigmoid(priority_i)` on extraction,
/// `priority_i = x_i` on insertion.
#[derive(Clone, Debug, Default)]
pub struct PriorityExtractor;

impl ParameterHandler for PriorityExtractor {
    fn extract(&self, system: &System) -> Vec<f64> {
        system
            .task_ids()
            .map(|t| sigmoid(system[t].priority))
            .collect()
    }

    fn insert(&self, system: &mut System, x: &[f64]) {
        debug_assert_eq!(x.len(), system.task_count());
        for (t, &v) in system.task_ids().zip(x) {
            system[t].priority = v;
        }
    }
}

/// The one-hot-biased mapping block: one row of `|procs|` values per
/// task, 0.55 on the task's current processor and 0.45 elsewhere.
fn mapping_vector(system: &System) -> Vec<f64> {
    let mut m = Vec::with_capacity(system.task_count() * system.proc_count());
    for t in system.task_ids() {
        for proc in system.proc_ids() {
            m.push(if system[t].processor == proc { 0.55 } else { 0.45 });
        }
    }
    m
}

/// Decode the mapping block: each task moves to the processor whose
/// entry in the task's row is largest (first such entry on ties).
fn apply_mapping(system: &mut System, rows: &[f64]) {
    let procs: Vec<ProcId> = system.proc_ids().collect();
    let width = procs.len();
    for (i, t) in system.task_ids().enumerate() {
        let row = &rows[i * width..(i + 1) * width];
        let mut best = 0;
        for (j, &v) in row.iter().enumerate() {
            if v > row[best] {
                best = j;
            }
        }
        system[t].processor = procs[best];
    }
}

/// Concatenates a mapping block with a priority block, so the optimizer
/// searches mappings and priorities jointly.
#[derive(Clone, Debug, Default)]
pub struct MappingPriorityExtractor {
    inner: PriorityExtractor,
}

impl ParameterHandler for MappingPriorityExtractor {
    fn extract(&self, system: &System) -> Vec<f64> {
        let mut x = mapping_vector(system);
        x.extend(self.inner.extract(system));
        x
    }

    fn insert(&self, system: &mut System, x: &[f64]) {
        let tasks = system.task_count();
        let mapping = tasks * system.proc_count();
        debug_assert_eq!(x.len(), mapping + tasks);
        apply_mapping(system, &x[..mapping]);
        self.inner.insert(system, &x[mapping..]);
    }
}

/// Concatenates a mapping block with a deadline block.
#[derive(Clone, Debug, Default)]
pub struct MappingDeadlineExtractor {
    inner: DeadlineExtractor,
}

impl ParameterHandler for MappingDeadlineExtractor {
    fn extract(&self, system: &System) -> Vec<f64> {
        let mut x = mapping_vector(system);
        x.extend(self.inner.extract(system));
        x
    }

    fn insert(&self, system: &mut System, x: &[f64]) {
        let tasks = system.task_count();
        let mapping = tasks * system.proc_count();
        debug_assert_eq!(x.len(), mapping + tasks);
        apply_mapping(system, &x[..mapping]);
        self.inner.insert(system, &x[mapping..]);
    }
}
