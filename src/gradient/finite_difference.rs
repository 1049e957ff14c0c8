use crate::system::System;

use super::{CostFunction, GradientFunction};

/// Sequential symmetric finite differences: each partial derivative is
/// `(cost(x + d e_i) - cost(x - d e_i)) / 2d`, for 2n cost evaluations
/// per gradient.
///
/// The common step `d` adapts to the vector: the mean separation of
/// adjacent components, scaled by `factor`.
pub struct FiniteDifferenceGradient<C> {
    pub cost: C,
    pub factor: f64,
}

impl<C> FiniteDifferenceGradient<C> {
    pub fn new(cost: C) -> Self {
        FiniteDifferenceGradient { cost, factor: 1.5 }
    }

    fn step(&self, x: &[f64]) -> f64 {
        if x.len() < 2 {
            // mean separation is undefined for a single parameter
            return self.factor * x.first().map(|v| v.abs()).unwrap_or(1.0);
        }
        let total: f64 = x.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
        self.factor * total / (x.len() - 1) as f64
    }
}

impl<C: CostFunction> GradientFunction for FiniteDifferenceGradient<C> {
    fn compute(&self, system: &mut System, x: &[f64]) -> Vec<f64> {
        let delta = self.step(x);
        let mut probe = x.to_vec();
        let mut gradient = Vec::with_capacity(x.len());
        for i in 0..x.len() {
            probe[i] = x[i] + delta;
            let above = self.cost.compute(system, &probe);
            probe[i] = x[i] - delta;
            let below = self.cost.compute(system, &probe);
            probe[i] = x[i];
            gradient.push((above - below) / (2.0 * delta));
        }
        gradient
    }
}
