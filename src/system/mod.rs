/*! The system model: linear flows of tasks mapped onto processors.

A [System] owns three arenas (processors, flows, tasks). Cross-references
between entities are plain copyable ids ([ProcId], [FlowId], [TaskId]) that
index into the owning system, so no entity co-owns another and snapshots of
the mutable assignment state stay cheap.

Task arena order is flow order: tasks are appended as their flow is added,
which fixes the deterministic iteration order used by the analyses, the
assignment snapshots, and the optimizer's parameter handlers.
*/

use std::ops::{Index, IndexMut};

use derive_more::{Display, Into};
use num::integer::lcm;
use thiserror::Error;

use crate::time::{Priority, Time};

/// Handle to a [Processor] within a [System]. Converts into the arena
/// index it wraps.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, Into)]
#[display(fmt = "proc[{}]", _0)]
pub struct ProcId(usize);

/// Handle to a [Flow] within a [System]. Converts into the arena index
/// it wraps.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, Into)]
#[display(fmt = "flow[{}]", _0)]
pub struct FlowId(usize);

/// Handle to a [Task] within a [System]. Converts into the arena index
/// it wraps.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, Into)]
#[display(fmt = "task[{}]", _0)]
pub struct TaskId(usize);

/// The local scheduling policy of a processor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scheduler {
    FixedPriority,
    Edf,
}

/// A scheduling resource (CPU or network segment).
#[derive(Clone, Debug)]
pub struct Processor {
    pub name: String,
    pub scheduler: Scheduler,
    /// For EDF processors: whether deadlines are interpreted in a local
    /// clock reference (EDF-L) rather than a global one.
    pub local: bool,
}

impl Processor {
    pub fn new(name: &str, scheduler: Scheduler, local: bool) -> Self {
        Processor {
            name: name.to_string(),
            scheduler,
            local,
        }
    }

    pub fn fixed_priority(name: &str) -> Self {
        Self::new(name, Scheduler::FixedPriority, true)
    }

    pub fn local_edf(name: &str) -> Self {
        Self::new(name, Scheduler::Edf, true)
    }

    pub fn global_edf(name: &str) -> Self {
        Self::new(name, Scheduler::Edf, false)
    }
}

/// A linearly ordered chain of tasks released together, sharing a period
/// and an end-to-end deadline.
#[derive(Clone, Debug)]
pub struct Flow {
    pub name: String,
    pub period: Time,
    pub deadline: Time,
    tasks: Vec<TaskId>,
}

impl Flow {
    /// The flow's tasks in activation order.
    pub fn tasks(&self) -> &[TaskId] {
        &self.tasks
    }
}

/// Discriminates what a chain element models. The analyses treat every
/// kind as a processor-consuming activity; the discriminant is preserved
/// for downstream consumers that branch on it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TaskKind {
    Activity,
    Offset,
    Delay,
}

/// One step of a flow, mapped onto a processor.
#[derive(Clone, Debug)]
pub struct Task {
    pub name: String,
    pub kind: TaskKind,
    /// Worst-case execution time (strictly positive).
    pub wcet: Time,
    /// Best-case execution time (non-negative).
    pub bcet: Time,
    /// Higher value = dispatched sooner. Ties are allowed.
    pub priority: Priority,
    /// Local (per-task) relative deadline, as distributed by an assigner.
    pub deadline: Time,
    /// Worst-case response time; `None` until an analysis has run, or
    /// after an analysis cleared it on divergence.
    pub wcrt: Option<Time>,
    pub processor: ProcId,
    flow: FlowId,
    slot: usize,
}

impl Task {
    /// The flow this task belongs to.
    pub fn flow(&self) -> FlowId {
        self.flow
    }
}

/// Construction-time validation failures. These are fatal: a system that
/// fails to build is rejected outright.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("flow {flow} has no tasks")]
    EmptyFlow { flow: String },
    #[error("task {task} references unknown processor {processor}")]
    UnknownProcessor { task: String, processor: String },
    #[error("task {task} must have a strictly positive worst-case execution time")]
    InvalidWcet { task: String },
    #[error("task {task} must have a non-negative best-case execution time")]
    InvalidBcet { task: String },
}

/// Blueprint for a task, consumed by [System::add_flow]. The processor is
/// referenced by name and resolved against the system on insertion.
#[derive(Clone, Debug)]
pub struct TaskDef {
    name: String,
    kind: TaskKind,
    wcet: Time,
    bcet: Time,
    priority: Priority,
    deadline: Time,
    processor: String,
}

impl TaskDef {
    pub fn new(name: &str, wcet: Time, processor: &str) -> Self {
        TaskDef {
            name: name.to_string(),
            kind: TaskKind::Activity,
            wcet,
            bcet: 0.0,
            priority: 1.0,
            deadline: 0.0,
            processor: processor.to_string(),
        }
    }

    pub fn kind(mut self, kind: TaskKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn deadline(mut self, deadline: Time) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn bcet(mut self, bcet: Time) -> Self {
        self.bcet = bcet;
        self
    }
}

/// Blueprint for a flow and its chain of tasks.
#[derive(Clone, Debug)]
pub struct FlowDef {
    name: String,
    period: Time,
    deadline: Time,
    tasks: Vec<TaskDef>,
}

impl FlowDef {
    pub fn new(name: &str, period: Time, deadline: Time) -> Self {
        FlowDef {
            name: name.to_string(),
            period,
            deadline,
            tasks: Vec::new(),
        }
    }

    /// Append a task to the chain (activation order).
    pub fn task(mut self, task: TaskDef) -> Self {
        self.tasks.push(task);
        self
    }
}

/// A complete system under analysis.
#[derive(Clone, Debug, Default)]
pub struct System {
    processors: Vec<Processor>,
    flows: Vec<Flow>,
    tasks: Vec<Task>,
}

impl System {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a complete system in one call, validating every flow.
    pub fn build(processors: Vec<Processor>, flows: Vec<FlowDef>) -> Result<System, ModelError> {
        let mut system = System::new();
        for p in processors {
            system.add_processor(p);
        }
        for f in flows {
            system.add_flow(f)?;
        }
        Ok(system)
    }

    pub fn add_processor(&mut self, processor: Processor) -> ProcId {
        let id = ProcId(self.processors.len());
        self.processors.push(processor);
        id
    }

    /// Add a flow, resolving and validating every task blueprint. On any
    /// structural error the system is left unchanged.
    pub fn add_flow(&mut self, def: FlowDef) -> Result<FlowId, ModelError> {
        if def.tasks.is_empty() {
            return Err(ModelError::EmptyFlow { flow: def.name });
        }
        let mut resolved = Vec::with_capacity(def.tasks.len());
        for td in &def.tasks {
            if td.wcet <= 0.0 {
                return Err(ModelError::InvalidWcet {
                    task: td.name.clone(),
                });
            }
            if td.bcet < 0.0 {
                return Err(ModelError::InvalidBcet {
                    task: td.name.clone(),
                });
            }
            let proc = self
                .processor(&td.processor)
                .ok_or_else(|| ModelError::UnknownProcessor {
                    task: td.name.clone(),
                    processor: td.processor.clone(),
                })?;
            resolved.push(proc);
        }

        let flow_id = FlowId(self.flows.len());
        let mut task_ids = Vec::with_capacity(def.tasks.len());
        for (slot, (td, proc)) in def.tasks.into_iter().zip(resolved).enumerate() {
            let id = TaskId(self.tasks.len());
            self.tasks.push(Task {
                name: td.name,
                kind: td.kind,
                wcet: td.wcet,
                bcet: td.bcet,
                priority: td.priority,
                deadline: td.deadline,
                wcrt: None,
                processor: proc,
                flow: flow_id,
                slot,
            });
            task_ids.push(id);
        }
        self.flows.push(Flow {
            name: def.name,
            period: def.period,
            deadline: def.deadline,
            tasks: task_ids,
        });
        Ok(flow_id)
    }

    pub fn proc_ids(&self) -> impl Iterator<Item = ProcId> {
        (0..self.processors.len()).map(ProcId)
    }

    pub fn flow_ids(&self) -> impl Iterator<Item = FlowId> {
        (0..self.flows.len()).map(FlowId)
    }

    /// All tasks, in flow order.
    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> {
        (0..self.tasks.len()).map(TaskId)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn proc_count(&self) -> usize {
        self.processors.len()
    }

    /// The tasks currently mapped onto the given processor, in flow order.
    pub fn tasks_on(&self, proc: ProcId) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks
            .iter()
            .enumerate()
            .filter(move |(_, t)| t.processor == proc)
            .map(|(i, _)| TaskId(i))
    }

    /// The task's direct predecessor in its flow, if any.
    pub fn predecessor(&self, task: TaskId) -> Option<TaskId> {
        let t = &self[task];
        if t.slot == 0 {
            None
        } else {
            Some(self.flows[t.flow.0].tasks[t.slot - 1])
        }
    }

    /// All tasks after `task` in its flow, in activation order.
    pub fn downstream(&self, task: TaskId) -> &[TaskId] {
        let t = &self[task];
        &self.flows[t.flow.0].tasks[t.slot + 1..]
    }

    /// Release jitter: the worst-case response time of the predecessor,
    /// or 0 for the first task of a flow (and while the predecessor's
    /// response time is still unknown).
    pub fn jitter(&self, task: TaskId) -> Time {
        self.predecessor(task)
            .and_then(|p| self[p].wcrt)
            .unwrap_or(0.0)
    }

    /// The period the task inherits from its flow.
    pub fn period(&self, task: TaskId) -> Time {
        self.flows[self[task].flow.0].period
    }

    pub fn utilization(&self, proc: ProcId) -> f64 {
        self.tasks_on(proc)
            .map(|t| self[t].wcet / self.period(t))
            .sum()
    }

    pub fn max_utilization(&self) -> f64 {
        self.proc_ids()
            .map(|p| self.utilization(p))
            .fold(0.0, f64::max)
    }

    /// End-to-end worst-case response time of a flow: the WCRT of its
    /// last task.
    pub fn flow_wcrt(&self, flow: FlowId) -> Option<Time> {
        let last = *self[flow].tasks.last()?;
        self[last].wcrt
    }

    /// Normalized deadline margin of a flow, `(D - wcrt) / D`. Negative
    /// infinity while the flow's response time is unknown.
    pub fn flow_slack(&self, flow: FlowId) -> f64 {
        match self.flow_wcrt(flow) {
            Some(wcrt) => (self[flow].deadline - wcrt) / self[flow].deadline,
            None => f64::NEG_INFINITY,
        }
    }

    pub fn flow_is_schedulable(&self, flow: FlowId) -> bool {
        match self.flow_wcrt(flow) {
            Some(wcrt) => wcrt <= self[flow].deadline,
            None => false,
        }
    }

    pub fn is_schedulable(&self) -> bool {
        self.flow_ids().all(|f| self.flow_is_schedulable(f))
    }

    /// The minimum slack over all flows.
    pub fn slack(&self) -> f64 {
        self.flow_ids()
            .map(|f| self.flow_slack(f))
            .fold(f64::INFINITY, f64::min)
    }

    /// Mean end-to-end WCRT over all flows; `None` unless every flow has
    /// a known response time.
    pub fn avg_flow_wcrt(&self) -> Option<Time> {
        if self.flows.is_empty() {
            return None;
        }
        let mut sum = 0.0;
        for f in self.flow_ids() {
            sum += self.flow_wcrt(f)?;
        }
        Some(sum / self.flows.len() as f64)
    }

    /// Least common multiple of the flow periods. Periods are rounded to
    /// integers first; generated systems carry integral periods.
    pub fn hyperperiod(&self) -> Time {
        self.flows
            .iter()
            .map(|f| f.period.round() as u64)
            .fold(1, lcm) as Time
    }

    /// True iff every processor uses the given scheduling policy.
    pub fn uses_scheduler(&self, scheduler: Scheduler) -> bool {
        self.processors.iter().all(|p| p.scheduler == scheduler)
    }

    pub fn processor(&self, name: &str) -> Option<ProcId> {
        self.processors
            .iter()
            .position(|p| p.name == name)
            .map(ProcId)
    }

    pub fn flow(&self, name: &str) -> Option<FlowId> {
        self.flows.iter().position(|f| f.name == name).map(FlowId)
    }

    pub fn task(&self, name: &str) -> Option<TaskId> {
        self.tasks.iter().position(|t| t.name == name).map(TaskId)
    }
}

impl Index<ProcId> for System {
    type Output = Processor;
    fn index(&self, id: ProcId) -> &Processor {
        &self.processors[id.0]
    }
}

impl Index<FlowId> for System {
    type Output = Flow;
    fn index(&self, id: FlowId) -> &Flow {
        &self.flows[id.0]
    }
}

impl Index<TaskId> for System {
    type Output = Task;
    fn index(&self, id: TaskId) -> &Task {
        &self.tasks[id.0]
    }
}

impl IndexMut<TaskId> for System {
    fn index_mut(&mut self, id: TaskId) -> &mut Task {
        &mut self.tasks[id.0]
    }
}

#[cfg(test)]
mod tests;
