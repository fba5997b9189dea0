//! AdamW optimizer (Adam with decoupled weight decay)

use std::collections::BTreeMap;

use ndarray::ArrayD;

use super::Optimizer;
use crate::model::ParameterStore;

/// AdamW optimizer
///
/// Weight decay is applied to the parameters directly instead of being added
/// to the gradient:
///
/// θ_t = (1 - lr * λ) * θ_{t-1} - lr_t * m_t / (√v_t + ε)
///
/// Moments are keyed by parameter name, so frozen parameters never allocate
/// state.
#[derive(Debug, Clone)]
pub struct AdamW {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,
    t: u64,
    m: BTreeMap<String, ArrayD<f32>>,
    v: BTreeMap<String, ArrayD<f32>>,
}

impl AdamW {
    /// Create a new AdamW optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32, weight_decay: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            weight_decay,
            t: 0,
            m: BTreeMap::new(),
            v: BTreeMap::new(),
        }
    }

    /// AdamW with betas (0.9, 0.999), epsilon 1e-8 and no weight decay
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8, 0.0)
    }

    /// Steps taken so far
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.t
    }

    /// First moment of a parameter
    #[must_use]
    pub fn first_moment(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.m.get(name)
    }

    /// Second moment of a parameter
    #[must_use]
    pub fn second_moment(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.v.get(name)
    }

    /// Weight decay coefficient
    #[must_use]
    pub fn weight_decay(&self) -> f32 {
        self.weight_decay
    }
}

impl Optimizer for AdamW {
    fn step(&mut self, params: &mut ParameterStore) {
        self.t += 1;

        // Bias correction folded into the step size
        let lr_t = self.lr
            * ((1.0 - self.beta2.powi(self.t as i32)).sqrt()
                / (1.0 - self.beta1.powi(self.t as i32)));
        let weight_decay_factor = 1.0 - self.lr * self.weight_decay;

        for (name, param) in params.iter_mut() {
            if !param.requires_grad() {
                continue;
            }
            let Some(grad) = param.grad().cloned() else {
                continue;
            };

            // m_t = β1 * m_{t-1} + (1 - β1) * g
            let m_t = match self.m.get(name) {
                Some(m) => m * self.beta1 + &grad * (1.0 - self.beta1),
                None => &grad * (1.0 - self.beta1),
            };
            // v_t = β2 * v_{t-1} + (1 - β2) * g²
            let grad_sq = &grad * &grad;
            let v_t = match self.v.get(name) {
                Some(v) => v * self.beta2 + &grad_sq * (1.0 - self.beta2),
                None => &grad_sq * (1.0 - self.beta2),
            };

            let adaptive_update = &m_t / &(v_t.mapv(f32::sqrt) + self.epsilon) * lr_t;
            let data = param.data_mut();
            data.mapv_inplace(|w| w * weight_decay_factor);
            *data -= &adaptive_update;

            self.m.insert(name.to_string(), m_t);
            self.v.insert(name.to_string(), v_t);
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
