use crate::analysis::Analysis;
use crate::assignment::Snapshot;
use crate::system::System;

use super::{CostFunction, ParameterHandler};

/// Worst normalized deadline overrun over all flows,
/// `max (wcrt - D) / D`: negative exactly when the candidate assignment
/// is schedulable, with the magnitude of the margin.
///
/// Evaluation is transactional: the current assignment is snapshotted,
/// the candidate inserted and analyzed, and the snapshot restored, so
/// the cost is pure with respect to the system's assignment state.
pub struct InverseSlackCost<PH, A> {
    pub handler: PH,
    pub analysis: A,
}

impl<PH, A> InverseSlackCost<PH, A> {
    pub fn new(handler: PH, analysis: A) -> Self {
        InverseSlackCost { handler, analysis }
    }
}

impl<PH: ParameterHandler, A: Analysis> CostFunction for InverseSlackCost<PH, A> {
    fn compute(&self, system: &mut System, x: &[f64]) -> f64 {
        let snapshot = Snapshot::capture(system);
        self.handler.insert(system, x);
        self.analysis.apply(system);
        let cost = system
            .flow_ids()
            .map(|f| {
                let deadline = system[f].deadline;
                let wcrt = system.flow_wcrt(f).unwrap_or(f64::INFINITY);
                (wcrt - deadline) / deadline
            })
            .fold(f64::NEG_INFINITY, f64::max);
        snapshot.restore(system);
        cost
    }
}
