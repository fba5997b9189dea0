//! Adapter injection and the PEFT model wrapper

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::config::LoraConfig;
use super::registry::{lora_a_name, lora_b_name, AdapterRegistry, LoraSettings};
use crate::error::{Error, Result};
use crate::model::{
    CausalLm, CausalLmOutput, HeadWrapper, LinearSpec, ModelConfig, ModelInputs, OutputHead,
    Parameter, ParameterStore,
};

/// Prefix PEFT adds in front of the wrapped model's parameter names
pub const PEFT_PREFIX: &str = "base_model.model.";

/// Freeze every base weight and attach a fresh `A`/`B` pair to each targeted
/// linear layer.
///
/// `A` is drawn from `U(-1/sqrt(in), 1/sqrt(in))`, `B` starts at zero so the
/// adapted model initially equals the base model. Returns the adapted layer
/// names.
///
/// # Errors
/// Returns error for an invalid config or when no layer matches the targets.
pub fn inject_adapters(
    model: &mut dyn CausalLm,
    config: &LoraConfig,
    seed: u64,
) -> Result<Vec<String>> {
    config.validate()?;

    let targets: Vec<LinearSpec> =
        model.linear_layers().into_iter().filter(|l| config.should_apply(&l.name)).collect();
    if targets.is_empty() {
        return Err(Error::ConfigError(format!(
            "no linear layer matches target modules {:?}",
            config.target_modules
        )));
    }

    model.parameters_mut().freeze_all();

    let mut rng = StdRng::seed_from_u64(seed);
    let trainable = !config.inference_mode;
    let settings =
        LoraSettings { rank: config.r, scale: config.scale(), dropout: config.lora_dropout };

    let mut names = Vec::with_capacity(targets.len());
    for spec in targets {
        let bound = 1.0 / (spec.in_features as f32).sqrt();
        let lora_a =
            Array2::from_shape_fn((config.r, spec.in_features), |_| rng.gen_range(-bound..bound));
        let lora_b = Array2::<f32>::zeros((spec.out_features, config.r));

        let params = model.parameters_mut();
        params.insert(lora_a_name(&spec.name), Parameter::new(lora_a.into_dyn(), trainable));
        params.insert(lora_b_name(&spec.name), Parameter::new(lora_b.into_dyn(), trainable));
        model.adapters_mut().insert(spec.name.clone(), settings);

        tracing::debug!(layer = %spec.name, rank = config.r, "injected LoRA adapter");
        names.push(spec.name);
    }
    Ok(names)
}

/// Trainable versus total parameter counts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainableSummary {
    pub trainable: usize,
    pub total: usize,
}

impl TrainableSummary {
    /// Count the parameters of `model`
    pub fn of(model: &dyn CausalLm) -> Self {
        let params = model.parameters();
        Self { trainable: params.num_trainable(), total: params.num_parameters() }
    }

    /// Trainable share in percent
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * self.trainable as f64 / self.total as f64
        }
    }
}

/// A base model with LoRA adapters injected
pub struct PeftModel<M> {
    base_model: M,
    peft_config: LoraConfig,
    prefix: String,
}

/// Wrap `model` with LoRA adapters described by `config`
///
/// # Errors
/// See [`inject_adapters`].
pub fn get_peft_model<M: CausalLm>(mut model: M, config: LoraConfig, seed: u64) -> Result<PeftModel<M>> {
    let adapted = inject_adapters(&mut model, &config, seed)?;
    tracing::info!(
        layers = adapted.len(),
        r = config.r,
        lora_alpha = config.lora_alpha,
        lora_dropout = config.lora_dropout,
        task_type = %config.task_type,
        "LoRA adapters attached"
    );
    let prefix = format!("{PEFT_PREFIX}{}", model.parameter_prefix());
    Ok(PeftModel { base_model: model, peft_config: config, prefix })
}

impl<M: CausalLm> PeftModel<M> {
    /// Adapter configuration
    pub fn peft_config(&self) -> &LoraConfig {
        &self.peft_config
    }

    /// Wrapped model
    pub fn base_model(&self) -> &M {
        &self.base_model
    }

    /// Mutable wrapped model
    pub fn base_model_mut(&mut self) -> &mut M {
        &mut self.base_model
    }

    /// Unwrap, keeping the injected adapter weights in place
    pub fn into_base_model(self) -> M {
        self.base_model
    }

    /// Parameter counts
    pub fn trainable_summary(&self) -> TrainableSummary {
        TrainableSummary::of(self)
    }

    /// Log `trainable params || all params || trainable%`
    pub fn print_trainable_parameters(&self) {
        let summary = self.trainable_summary();
        tracing::info!(
            "trainable params: {} || all params: {} || trainable%: {:.4}",
            summary.trainable,
            summary.total,
            summary.percent()
        );
    }
}

impl<M: CausalLm> CausalLm for PeftModel<M> {
    fn config(&self) -> &ModelConfig {
        self.base_model.config()
    }

    fn config_mut(&mut self) -> &mut ModelConfig {
        self.base_model.config_mut()
    }

    fn parameters(&self) -> &ParameterStore {
        self.base_model.parameters()
    }

    fn parameters_mut(&mut self) -> &mut ParameterStore {
        self.base_model.parameters_mut()
    }

    fn parameter_prefix(&self) -> &str {
        &self.prefix
    }

    fn linear_layers(&self) -> Vec<LinearSpec> {
        self.base_model.linear_layers()
    }

    fn adapters(&self) -> &AdapterRegistry {
        self.base_model.adapters()
    }

    fn adapters_mut(&mut self) -> &mut AdapterRegistry {
        self.base_model.adapters_mut()
    }

    fn wrap_output_head(&mut self, wrap: HeadWrapper) {
        self.base_model.wrap_output_head(wrap);
    }

    fn output_head(&self) -> &dyn OutputHead {
        self.base_model.output_head()
    }

    fn set_training(&mut self, training: bool) {
        self.base_model.set_training(training);
    }

    fn is_training(&self) -> bool {
        self.base_model.is_training()
    }

    fn forward(&mut self, inputs: &ModelInputs<'_>) -> Result<CausalLmOutput> {
        self.base_model.forward(inputs)
    }

    fn backward(&mut self, scale: f32) -> Result<()> {
        self.base_model.backward(scale)
    }
}

impl<M: CausalLm> std::fmt::Debug for PeftModel<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeftModel")
            .field("peft_config", &self.peft_config)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GlmForCausalLm;

    fn tiny_model(layers: usize) -> GlmForCausalLm {
        let mut config = ModelConfig::tiny(16, 8);
        config.num_layers = layers;
        GlmForCausalLm::init(config, 0).unwrap()
    }

    #[test]
    fn test_only_adapters_trainable() {
        let model = get_peft_model(tiny_model(2), LoraConfig::new(4), 1).unwrap();
        let trainable: Vec<&str> = model.parameters().trainable().map(|(n, _)| n).collect();

        assert_eq!(trainable.len(), 4);
        assert!(trainable.iter().all(|n| n.contains(".lora_A.") || n.contains(".lora_B.")));
        assert_eq!(model.adapters().len(), 2);
    }

    #[test]
    fn test_adapter_shapes_and_init() {
        let model = get_peft_model(tiny_model(1), LoraConfig::new(4), 1).unwrap();
        let layer = "transformer.layers.0.attention.query_key_value";
        let a = model.parameters().require(&lora_a_name(layer)).unwrap();
        let b = model.parameters().require(&lora_b_name(layer)).unwrap();

        assert_eq!(a.shape(), &[4, 8]);
        assert_eq!(b.shape(), &[8, 4]);
        assert!(b.data().iter().all(|&v| v == 0.0));
        let bound = 1.0 / 8.0_f32.sqrt();
        assert!(a.data().iter().all(|&v| v.abs() <= bound));
        assert!(a.data().iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_settings_registered() {
        let config = LoraConfig::new(8).with_alpha(32.0).with_dropout(0.1);
        let model = get_peft_model(tiny_model(1), config, 0).unwrap();
        let (_, settings) = model.adapters().iter().next().unwrap();

        assert_eq!(settings.rank, 8);
        assert_eq!(settings.scale, 4.0);
        assert_eq!(settings.dropout, 0.1);
    }

    #[test]
    fn test_prefix() {
        let model = get_peft_model(tiny_model(1), LoraConfig::new(2), 0).unwrap();
        assert_eq!(model.parameter_prefix(), "base_model.model.");
    }

    #[test]
    fn test_layer_filter() {
        let config = LoraConfig::new(2).target_layers(&[1]);
        let model = get_peft_model(tiny_model(3), config, 0).unwrap();
        let names: Vec<&str> = model.adapters().iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["transformer.layers.1.attention.query_key_value"]);
    }

    #[test]
    fn test_no_matching_target() {
        let config = LoraConfig::new(2).target_modules(&["q_proj"]);
        assert!(matches!(
            get_peft_model(tiny_model(1), config, 0),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_inference_mode_freezes_adapters() {
        let config = LoraConfig::new(2).with_inference_mode(true);
        let model = get_peft_model(tiny_model(1), config, 0).unwrap();
        assert_eq!(model.trainable_summary().trainable, 0);
    }

    #[test]
    fn test_summary_percent() {
        let model = get_peft_model(tiny_model(1), LoraConfig::new(2), 0).unwrap();
        let summary = model.trainable_summary();
        // A: 2x8, B: 8x2
        assert_eq!(summary.trainable, 32);
        assert!(summary.percent() > 0.0 && summary.percent() < 100.0);
    }

    #[test]
    fn test_base_model_shares_parameters() {
        let mut model = get_peft_model(tiny_model(1), LoraConfig::new(2), 0).unwrap();
        model.base_model_mut().set_training(false);
        assert!(!model.is_training());

        let count = model.parameters().len();
        let base = model.into_base_model();
        assert_eq!(base.parameters().len(), count);
        assert!(base.parameters().iter().any(|(n, _)| n.ends_with(".lora_A.weight")));
    }
}
