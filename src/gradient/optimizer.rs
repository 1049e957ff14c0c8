use log::debug;

use crate::system::System;

use super::{CostFunction, GradientFunction, ParameterHandler, StopFunction, UpdateFunction};

/// What an iteration [callback][GradientDescentOptimizer::callback]
/// observes.
pub struct IterationRecord<'a> {
    pub iteration: u32,
    pub x: &'a [f64],
    pub cost: f64,
    pub best_cost: f64,
    pub reference_cost: Option<f64>,
}

/// The assembled minimizer. Construct with the five roles, optionally
/// attach a secondary cost (logged alongside the real one) and a
/// per-iteration callback, then [optimize][Self::optimize].
pub struct GradientDescentOptimizer<PH, C, G, U, S> {
    pub handler: PH,
    pub cost: C,
    pub gradient: G,
    pub update: U,
    pub stop: S,
    pub reference_cost: Option<Box<dyn CostFunction>>,
    pub callback: Option<Box<dyn FnMut(&IterationRecord)>>,
    pub verbose: bool,
}

impl<PH, C, G, U, S> GradientDescentOptimizer<PH, C, G, U, S>
where
    PH: ParameterHandler,
    C: CostFunction,
    G: GradientFunction,
    U: UpdateFunction,
    S: StopFunction,
{
    pub fn new(handler: PH, cost: C, gradient: G, update: U, stop: S) -> Self {
        GradientDescentOptimizer {
            handler,
            cost,
            gradient,
            update,
            stop,
            reference_cost: None,
            callback: None,
            verbose: false,
        }
    }

    /// Run the descent to termination and install the best solution into
    /// the system. Returns the solution vector.
    pub fn optimize(&mut self, system: &mut System) -> Vec<f64> {
        let mut iteration: u32 = 1;
        let mut x = self.handler.extract(system);
        let mut best = f64::INFINITY;
        let mut best_x = x.clone();

        loop {
            let cost = self.cost.compute(system, &x);
            if cost < best {
                best = cost;
                best_x = x.clone();
            }

            let reference_cost = self
                .reference_cost
                .as_ref()
                .map(|rc| rc.compute(system, &x));

            if self.verbose {
                match reference_cost {
                    Some(r) => debug!(
                        "iteration={}: cost={:.3} best={:.3} ref={:.3}",
                        iteration, cost, best, r
                    ),
                    None => debug!("iteration={}: cost={:.3} best={:.3}", iteration, cost, best),
                }
            }
            if let Some(callback) = self.callback.as_mut() {
                callback(&IterationRecord {
                    iteration,
                    x: &x,
                    cost,
                    best_cost: best,
                    reference_cost,
                });
            }

            if self.stop.should_stop(&x, cost, iteration) {
                break;
            }

            let gradient = self.gradient.compute(system, &x);
            let step = self.update.update(&x, gradient, iteration);
            for (xi, si) in x.iter_mut().zip(step) {
                *xi += si;
            }
            iteration += 1;

            // insert then re-extract, so x picks up the handler's
            // normalization before the next evaluation
            self.handler.insert(system, &x);
            x = self.handler.extract(system);
        }

        let solution = self.stop.solution().unwrap_or(best_x.as_slice()).to_vec();
        self.handler.insert(system, &solution);
        if self.verbose {
            debug!(
                "returning solution with cost={:.3}",
                self.stop.solution_cost()
            );
        }
        solution
    }
}
