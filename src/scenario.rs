/*! Scenario glue: seed a system with an assigner, optionally run the
gradient-descent optimizer, then validate with a final analysis.

Everything here is plain configuration data, so an embedding can
describe a whole evaluation declaratively and hand systems to
[Scenario::run] one after another. The configs build the concrete
analysis/assigner/optimizer stacks from the rest of the crate.
*/

use crate::analysis::Analysis;
use crate::assignment::{
    Assigner, EqualFlexibility, EqualSlack, Hopa, Passthrough, ProportionalDeadline,
    RandomPriorities,
};
use crate::gradient::{
    DeadlineExtractor, FiniteDifferenceGradient, FixedIterationsStop, GradientDescentOptimizer,
    InverseSlackCost, MappingDeadlineExtractor, MappingPriorityExtractor, NoisyAdam,
    ParameterHandler, PriorityExtractor, StopFunction, ThresholdStop,
};
use crate::holistic::{HolisticFixedPriority, HolisticGlobalEdf, HolisticLocalEdf};
use crate::system::System;
use crate::time::Time;

/// Which analysis kernel to run, with its options.
#[derive(Clone, Debug)]
pub enum AnalysisConfig {
    HolisticFixedPriority(HolisticFixedPriority),
    HolisticGlobalEdf(HolisticGlobalEdf),
    HolisticLocalEdf(HolisticLocalEdf),
}

impl AnalysisConfig {
    pub fn build(&self) -> Box<dyn Analysis> {
        match self {
            AnalysisConfig::HolisticFixedPriority(a) => Box::new(a.clone()),
            AnalysisConfig::HolisticGlobalEdf(a) => Box::new(a.clone()),
            AnalysisConfig::HolisticLocalEdf(a) => Box::new(a.clone()),
        }
    }
}

/// Run the configured analysis; mutates only response times.
pub fn apply_analysis(system: &mut System, config: &AnalysisConfig) {
    config.build().apply(system);
}

/// Options for the iterative deadline-redistribution assigner.
#[derive(Clone, Debug)]
pub struct HopaConfig {
    pub analysis: AnalysisConfig,
    pub iterations: u32,
    pub k_pairs: Vec<(f64, f64)>,
    pub patience: i32,
    pub over_iterations: u32,
    pub normalize: bool,
    pub globalize: bool,
    pub verbose: bool,
}

impl HopaConfig {
    pub fn new(analysis: AnalysisConfig) -> Self {
        HopaConfig {
            analysis,
            iterations: 40,
            k_pairs: Hopa::<Box<dyn Analysis>>::default_k_pairs(),
            patience: 40,
            over_iterations: 0,
            normalize: false,
            globalize: false,
            verbose: false,
        }
    }

    fn build(&self) -> Hopa<Box<dyn Analysis>> {
        Hopa {
            analysis: self.analysis.build(),
            iterations: self.iterations,
            k_pairs: self.k_pairs.clone(),
            patience: self.patience,
            over_iterations: self.over_iterations,
            normalize: self.normalize,
            globalize: self.globalize,
            verbose: self.verbose,
        }
    }
}

/// Which assigner seeds the system, with its options.
#[derive(Clone, Debug)]
pub enum AssignerConfig {
    ProportionalDeadline(ProportionalDeadline),
    EqualSlack(EqualSlack),
    EqualFlexibility(EqualFlexibility),
    Random(RandomPriorities),
    Passthrough(Passthrough),
    Hopa(HopaConfig),
}

/// Run the configured assigner; mutates priorities, deadlines, and (for
/// HOPA) response times through its internal analyses.
pub fn apply_assigner(system: &mut System, config: &AssignerConfig) {
    match config {
        AssignerConfig::ProportionalDeadline(a) => a.assign(system),
        AssignerConfig::EqualSlack(a) => a.assign(system),
        AssignerConfig::EqualFlexibility(a) => a.assign(system),
        AssignerConfig::Random(a) => a.assign(system),
        AssignerConfig::Passthrough(a) => a.assign(system),
        AssignerConfig::Hopa(c) => c.build().assign(system),
    }
}

/// Which parameterization the optimizer searches over.
#[derive(Clone, Copy, Debug)]
pub enum HandlerConfig {
    Deadline,
    Priority,
    MappingPriority,
    MappingDeadline,
}

impl HandlerConfig {
    fn build(&self) -> Box<dyn ParameterHandler> {
        match self {
            HandlerConfig::Deadline => Box::new(DeadlineExtractor),
            HandlerConfig::Priority => Box::new(PriorityExtractor),
            HandlerConfig::MappingPriority => Box::new(MappingPriorityExtractor::default()),
            HandlerConfig::MappingDeadline => Box::new(MappingDeadlineExtractor::default()),
        }
    }
}

/// Termination rule for the optimizer.
#[derive(Clone, Copy, Debug)]
pub enum StopConfig {
    Threshold { limit: u32, threshold: f64 },
    FixedIterations { iterations: u32 },
}

impl StopConfig {
    fn build(&self) -> Box<dyn StopFunction> {
        match *self {
            StopConfig::Threshold { limit, threshold } => {
                Box::new(ThresholdStop::new(limit, threshold))
            }
            StopConfig::FixedIterations { iterations } => {
                Box::new(FixedIterationsStop::new(iterations))
            }
        }
    }
}

/// The full gradient-descent stack: parameter handler, invslack cost
/// over the given analysis, finite-difference gradient, noisy Adam, and
/// a stop rule.
#[derive(Clone, Debug)]
pub struct OptimizerSetup {
    pub handler: HandlerConfig,
    pub analysis: AnalysisConfig,
    pub lr: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    pub gamma: f64,
    pub seed: u64,
    pub boosted_moments: bool,
    /// Scaling of the adaptive finite-difference step.
    pub step_factor: f64,
    pub stop: StopConfig,
    pub verbose: bool,
}

impl OptimizerSetup {
    pub fn new(handler: HandlerConfig, analysis: AnalysisConfig) -> Self {
        OptimizerSetup {
            handler,
            analysis,
            lr: 3.0,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 0.1,
            gamma: 1.2,
            seed: 1,
            boosted_moments: false,
            step_factor: 1.5,
            stop: StopConfig::Threshold {
                limit: 100,
                threshold: 0.0,
            },
            verbose: false,
        }
    }

    /// Assemble the stack, run it, and install the best solution.
    /// Returns the solution vector.
    pub fn run(&self, system: &mut System) -> Vec<f64> {
        let cost = InverseSlackCost::new(self.handler.build(), self.analysis.build());
        let probe_cost = InverseSlackCost::new(self.handler.build(), self.analysis.build());
        let mut gradient = FiniteDifferenceGradient::new(probe_cost);
        gradient.factor = self.step_factor;
        let update = NoisyAdam::new(
            self.lr,
            self.beta1,
            self.beta2,
            self.epsilon,
            self.gamma,
            self.seed,
        )
        .boosted_moments(self.boosted_moments);

        let mut optimizer = GradientDescentOptimizer::new(
            self.handler.build(),
            cost,
            gradient,
            update,
            self.stop.build(),
        );
        optimizer.verbose = self.verbose;
        optimizer.optimize(system)
    }
}

/// The schedulability verdict of a scenario run, with the per-task
/// response times in task order.
#[derive(Clone, Debug, PartialEq)]
pub struct Verdict {
    pub schedulable: bool,
    pub wcrts: Vec<Option<Time>>,
}

/// Aggregate figures of a system in its current analysis state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SystemMetrics {
    pub slack: f64,
    pub avg_flow_wcrt: Option<Time>,
    pub max_utilization: f64,
    pub hyperperiod: Time,
}

pub fn system_metrics(system: &System) -> SystemMetrics {
    SystemMetrics {
        slack: system.slack(),
        avg_flow_wcrt: system.avg_flow_wcrt(),
        max_utilization: system.max_utilization(),
        hyperperiod: system.hyperperiod(),
    }
}

/// A complete evaluation procedure: assign, optionally optimize,
/// validate.
#[derive(Clone, Debug)]
pub struct Scenario {
    pub assigner: AssignerConfig,
    pub optimizer: Option<OptimizerSetup>,
    pub analysis: AnalysisConfig,
}

impl Scenario {
    pub fn run(&self, system: &mut System) -> Verdict {
        apply_assigner(system, &self.assigner);
        if let Some(optimizer) = &self.optimizer {
            optimizer.run(system);
        }
        apply_analysis(system, &self.analysis);
        Verdict {
            schedulable: system.is_schedulable(),
            wcrts: system.task_ids().map(|t| system[t].wcrt).collect(),
        }
    }
}
