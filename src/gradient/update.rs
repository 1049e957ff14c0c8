use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use super::UpdateFunction;

/// Adds zero-mean Gaussian noise to the gradient, with a standard
/// deviation `lr / (1 + t + n)^gamma` that decays both with the
/// iteration count and with the problem size: larger systems need less
/// noise.
pub struct GradientNoise {
    pub lr: f64,
    pub gamma: f64,
    rng: StdRng,
}

impl GradientNoise {
    pub fn new(lr: f64, gamma: f64, seed: u64) -> Self {
        GradientNoise {
            lr,
            gamma,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl UpdateFunction for GradientNoise {
    fn update(&mut self, _x: &[f64], mut gradient: Vec<f64>, iteration: u32) -> Vec<f64> {
        let std = self.lr / (1.0 + iteration as f64 + gradient.len() as f64).powf(self.gamma);
        for g in &mut gradient {
            let z: f64 = self.rng.sample(StandardNormal);
            *g += std * z;
        }
        gradient
    }
}

/// The Adam update rule with bias-corrected moment estimates.
///
/// `boosted_moments` switches the gradient weight in the moment
/// accumulators from the textbook `(1 - beta)` to `(1 + beta)`, which
/// overweights recent gradients; both variants are kept so their
/// optimization behavior can be compared.
pub struct Adam {
    pub lr: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    pub boosted_moments: bool,
    m: Vec<f64>,
    v: Vec<f64>,
}

impl Default for Adam {
    fn default() -> Self {
        Adam {
            lr: 3.0,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 0.1,
            boosted_moments: false,
            m: Vec::new(),
            v: Vec::new(),
        }
    }
}

impl Adam {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UpdateFunction for Adam {
    fn update(&mut self, _x: &[f64], gradient: Vec<f64>, iteration: u32) -> Vec<f64> {
        let n = gradient.len();
        if self.m.len() != n {
            self.m = vec![0.0; n];
            self.v = vec![0.0; n];
        }

        let (w1, w2) = if self.boosted_moments {
            (1.0 + self.beta1, 1.0 + self.beta2)
        } else {
            (1.0 - self.beta1, 1.0 - self.beta2)
        };
        let t = iteration as i32;

        let mut step = Vec::with_capacity(n);
        for (i, g) in gradient.into_iter().enumerate() {
            self.m[i] = self.beta1 * self.m[i] + w1 * g;
            self.v[i] = self.beta2 * self.v[i] + w2 * g * g;
            let m_hat = self.m[i] / (1.0 - self.beta1.powi(t));
            let v_hat = self.v[i] / (1.0 - self.beta2.powi(t));
            step.push(-self.lr * m_hat / (v_hat.sqrt() + self.epsilon));
        }
        step
    }
}

/// [GradientNoise] feeding [Adam]: the default update rule of the
/// gradient-descent assigners.
pub struct NoisyAdam {
    noise: GradientNoise,
    adam: Adam,
}

impl Default for NoisyAdam {
    fn default() -> Self {
        NoisyAdam {
            noise: GradientNoise::new(3.0, 1.2, 1),
            adam: Adam::default(),
        }
    }
}

impl NoisyAdam {
    pub fn new(lr: f64, beta1: f64, beta2: f64, epsilon: f64, gamma: f64, seed: u64) -> Self {
        NoisyAdam {
            noise: GradientNoise::new(lr, gamma, seed),
            adam: Adam {
                lr,
                beta1,
                beta2,
                epsilon,
                ..Adam::default()
            },
        }
    }

    /// Switch the wrapped [Adam] to the overweighted moment variant.
    pub fn boosted_moments(mut self, on: bool) -> Self {
        self.adam.boosted_moments = on;
        self
    }
}

impl UpdateFunction for NoisyAdam {
    fn update(&mut self, x: &[f64], gradient: Vec<f64>, iteration: u32) -> Vec<f64> {
        let noisy = self.noise.update(x, gradient, iteration);
        self.adam.update(x, noisy, iteration)
    }
}
