//! Gradient clipping

use crate::model::ParameterStore;

/// Clip gradients by global norm
///
/// global_norm = sqrt(sum of squared gradient entries over all trainable
/// parameters). When it exceeds `max_norm`, every gradient is scaled by
/// `max_norm / global_norm`.
///
/// Returns the global norm before clipping.
pub fn clip_grad_norm(params: &mut ParameterStore, max_norm: f32) -> f32 {
    let total_norm_sq: f32 = params
        .trainable()
        .filter_map(|(_, p)| p.grad())
        .map(|grad| grad.iter().map(|&g| g * g).sum::<f32>())
        .sum();
    let global_norm = total_norm_sq.sqrt();

    if global_norm > max_norm {
        let clip_coef = max_norm / global_norm;
        for param in params.trainable_mut() {
            if let Some(grad) = param.grad() {
                let clipped = grad * clip_coef;
                param.set_grad(clipped);
            }
        }
    }

    global_norm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Parameter;
    use approx::assert_abs_diff_eq;
    use ndarray::{ArrayD, IxDyn};
    use proptest::prelude::*;

    fn store(grads: &[(&str, Vec<f32>)]) -> ParameterStore {
        let mut params = ParameterStore::new();
        for (name, grad) in grads {
            let shape = IxDyn(&[grad.len()]);
            let mut p = Parameter::new(ArrayD::zeros(shape.clone()), true);
            p.set_grad(ArrayD::from_shape_vec(shape, grad.clone()).unwrap());
            params.insert(*name, p);
        }
        params
    }

    #[test]
    fn test_clip_scales_down() {
        let mut params = store(&[("a", vec![3.0]), ("b", vec![4.0])]);
        let norm = clip_grad_norm(&mut params, 1.0);

        assert_abs_diff_eq!(norm, 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(params.get("a").unwrap().grad().unwrap()[0], 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(params.get("b").unwrap().grad().unwrap()[0], 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_no_clip_below_max() {
        let mut params = store(&[("a", vec![0.3, 0.4])]);
        let norm = clip_grad_norm(&mut params, 1.0);
        assert_abs_diff_eq!(norm, 0.5, epsilon = 1e-6);
        assert_eq!(params.get("a").unwrap().grad().unwrap().as_slice().unwrap(), &[0.3, 0.4]);
    }

    proptest! {
        #[test]
        fn prop_clipped_norm_bounded(
            grads in proptest::collection::vec(-100.0f32..100.0, 1..32),
            max_norm in 0.1f32..10.0,
        ) {
            let mut params = store(&[("g", grads)]);
            clip_grad_norm(&mut params, max_norm);
            let after = clip_grad_norm(&mut params, f32::MAX);
            prop_assert!(after <= max_norm * 1.001);
        }
    }
}
