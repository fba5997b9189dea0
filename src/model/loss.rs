//! Shifted next-token cross-entropy

use ndarray::{Array3, ArrayView2, ArrayView3};

use crate::error::{Error, Result};

/// Mean cross-entropy of `logits[b, t]` predicting `labels[b, t + 1]`,
/// skipping targets equal to `ignore_index`.
///
/// Returns the loss and `d(loss)/d(logits)`. A batch without any target
/// yields a zero loss and zero gradient.
///
/// # Errors
/// Returns error when shapes disagree or a target lies outside the vocabulary.
pub fn causal_lm_loss(
    logits: ArrayView3<'_, f32>,
    labels: ArrayView2<'_, i64>,
    ignore_index: i64,
) -> Result<(f32, Array3<f32>)> {
    let (batch, len, vocab) = logits.dim();
    if labels.dim() != (batch, len) {
        return Err(Error::ShapeMismatch {
            expected: vec![batch, len],
            got: labels.shape().to_vec(),
        });
    }

    let mut grad = Array3::<f32>::zeros((batch, len, vocab));
    let mut total = 0.0_f64;
    let mut count = 0usize;

    for b in 0..batch {
        for t in 0..len.saturating_sub(1) {
            let target = labels[[b, t + 1]];
            if target == ignore_index {
                continue;
            }
            let target = usize::try_from(target)
                .ok()
                .filter(|&id| id < vocab)
                .ok_or_else(|| {
                    Error::InvalidExample(format!("label {target} outside vocabulary of {vocab}"))
                })?;

            let row = logits.slice(ndarray::s![b, t, ..]);
            let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            let sum_exp: f32 = row.iter().map(|&v| (v - max).exp()).sum();
            let log_sum_exp = max + sum_exp.ln();

            total += f64::from(log_sum_exp - row[target]);
            count += 1;

            let mut grad_row = grad.slice_mut(ndarray::s![b, t, ..]);
            for (g, &v) in grad_row.iter_mut().zip(row.iter()) {
                *g = (v - log_sum_exp).exp();
            }
            grad_row[target] -= 1.0;
        }
    }

    if count == 0 {
        tracing::warn!("batch has no target tokens; loss is zero");
        return Ok((0.0, grad));
    }

    let inv = 1.0 / count as f32;
    grad.mapv_inplace(|g| g * inv);
    Ok(((total / count as f64) as f32, grad))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr2, Array3};

    #[test]
    fn test_uniform_logits() {
        let logits = Array3::<f32>::zeros((1, 3, 4));
        let labels = arr2(&[[-100_i64, 2, 1]]);
        let (loss, grad) = causal_lm_loss(logits.view(), labels.view(), -100).unwrap();

        assert_abs_diff_eq!(loss, 4.0_f32.ln(), epsilon = 1e-6);
        // two targets: each row gets (0.25 - onehot) / 2
        assert_abs_diff_eq!(grad[[0, 0, 2]], (0.25 - 1.0) / 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(grad[[0, 0, 0]], 0.125, epsilon = 1e-6);
        assert_abs_diff_eq!(grad[[0, 2, 0]], 0.0);
    }

    #[test]
    fn test_shift_ignores_first_label() {
        let mut logits = Array3::<f32>::zeros((1, 2, 3));
        logits[[0, 0, 1]] = 10.0;
        // label at t=0 is never a target
        let labels = arr2(&[[0_i64, 1]]);
        let (loss, _) = causal_lm_loss(logits.view(), labels.view(), -100).unwrap();
        assert!(loss < 1e-3);
    }

    #[test]
    fn test_gradient_rows_sum_to_zero() {
        let logits = Array3::from_shape_fn((2, 3, 5), |(b, t, v)| (b + 2 * t + 3 * v) as f32 * 0.1);
        let labels = arr2(&[[-100_i64, 4, 0], [-100, -100, 3]]);
        let (_, grad) = causal_lm_loss(logits.view(), labels.view(), -100).unwrap();
        for b in 0..2 {
            for t in 0..3 {
                let sum: f32 = grad.slice(ndarray::s![b, t, ..]).sum();
                assert_abs_diff_eq!(sum, 0.0, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_all_ignored() {
        let logits = Array3::<f32>::ones((1, 3, 2));
        let labels = arr2(&[[-100_i64, -100, -100]]);
        let (loss, grad) = causal_lm_loss(logits.view(), labels.view(), -100).unwrap();
        assert_eq!(loss, 0.0);
        assert!(grad.iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_label_out_of_vocab() {
        let logits = Array3::<f32>::zeros((1, 2, 3));
        let labels = arr2(&[[0_i64, 7]]);
        assert!(matches!(
            causal_lm_loss(logits.view(), labels.view(), -100),
            Err(Error::InvalidExample(_))
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let logits = Array3::<f32>::zeros((1, 2, 3));
        let labels = arr2(&[[0_i64, 1, 2]]);
        assert!(causal_lm_loss(logits.view(), labels.view(), -100).is_err());
    }
}
