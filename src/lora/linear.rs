//! Linear layer with an optional low-rank update
//!
//! `y = x W^T + b + scale * dropout(x) A^T B^T`, with `W`, `b` frozen and
//! `A`, `B` trainable.

use ndarray::{Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::Rng;

use super::registry::{lora_a_name, lora_b_name, AdapterRegistry};
use crate::error::{Error, Result};
use crate::model::ParameterStore;

/// Activations kept from the forward pass for the backward pass
#[derive(Debug, Clone)]
pub struct LinearCache {
    input: Array2<f32>,
    adapter: Option<AdapterCache>,
}

#[derive(Debug, Clone)]
struct AdapterCache {
    /// Adapter input after dropout
    dropped: Array2<f32>,
    /// Dropout keep mask already divided by `1 - p`
    keep: Option<Array2<f32>>,
    /// `dropped A^T`
    down: Array2<f32>,
    scale: f32,
}

/// Apply the linear layer `name` to `input` (`N x in`).
///
/// Dropout on the adapter input is drawn from `rng` when one is given
/// (training mode).
///
/// # Errors
/// Returns error when a weight is missing or shapes disagree.
pub fn linear_forward(
    params: &ParameterStore,
    adapters: &AdapterRegistry,
    name: &str,
    input: Array2<f32>,
    rng: Option<&mut StdRng>,
) -> Result<(Array2<f32>, LinearCache)> {
    let weight = params.matrix(&format!("{name}.weight"))?;
    if input.ncols() != weight.ncols() {
        return Err(Error::ShapeMismatch {
            expected: vec![input.nrows(), weight.ncols()],
            got: input.shape().to_vec(),
        });
    }

    let mut output = input.dot(&weight.t());
    let bias_name = format!("{name}.bias");
    if params.contains(&bias_name) {
        output += &params.vector(&bias_name)?;
    }

    let adapter = match adapters.get(name) {
        Some(settings) => {
            let lora_a = params.matrix(&lora_a_name(name))?;
            let lora_b = params.matrix(&lora_b_name(name))?;

            let keep = match rng {
                Some(rng) if settings.dropout > 0.0 => {
                    let p = settings.dropout;
                    let kept = 1.0 / (1.0 - p);
                    Some(Array2::from_shape_fn(input.dim(), |_| {
                        if rng.gen::<f32>() < p {
                            0.0
                        } else {
                            kept
                        }
                    }))
                }
                _ => None,
            };
            let dropped = match &keep {
                Some(mask) => &input * mask,
                None => input.clone(),
            };

            let down = dropped.dot(&lora_a.t());
            output.scaled_add(settings.scale, &down.dot(&lora_b.t()));
            Some(AdapterCache { dropped, keep, down, scale: settings.scale })
        }
        None => None,
    };

    Ok((output, LinearCache { input, adapter }))
}

/// Back-propagate `grad_output` (`N x out`) through layer `name`.
///
/// Gradients are accumulated into every trainable parameter of the layer;
/// the gradient with respect to the input is returned.
///
/// # Errors
/// Returns error when a weight is missing.
pub fn linear_backward(
    params: &mut ParameterStore,
    name: &str,
    cache: &LinearCache,
    grad_output: ArrayView2<'_, f32>,
) -> Result<Array2<f32>> {
    let weight_name = format!("{name}.weight");
    let mut grad_input = grad_output.dot(&params.matrix(&weight_name)?);

    let weight = params.require_mut(&weight_name)?;
    if weight.requires_grad() {
        weight.accumulate_grad(&grad_output.t().dot(&cache.input).into_dyn());
    }
    if let Some(bias) = params.get_mut(&format!("{name}.bias")) {
        if bias.requires_grad() {
            bias.accumulate_grad(&grad_output.sum_axis(Axis(0)).into_dyn());
        }
    }

    if let Some(adapter) = &cache.adapter {
        let (a_name, b_name) = (lora_a_name(name), lora_b_name(name));
        let scaled = grad_output.mapv(|g| g * adapter.scale);

        let grad_down = scaled.dot(&params.matrix(&b_name)?);
        let mut grad_dropped = grad_down.dot(&params.matrix(&a_name)?);
        let grad_b = scaled.t().dot(&adapter.down);
        let grad_a = grad_down.t().dot(&adapter.dropped);

        let lora_b = params.require_mut(&b_name)?;
        if lora_b.requires_grad() {
            lora_b.accumulate_grad(&grad_b.into_dyn());
        }
        let lora_a = params.require_mut(&a_name)?;
        if lora_a.requires_grad() {
            lora_a.accumulate_grad(&grad_a.into_dyn());
        }

        if let Some(keep) = &adapter.keep {
            grad_dropped *= keep;
        }
        grad_input += &grad_dropped;
    }

    Ok(grad_input)
}
