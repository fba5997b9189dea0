//! Compact GLM causal language model
//!
//! Word embeddings plus two position tables (token position and block
//! position), followed by `num_layers` residual blocks. Each block pools the
//! hidden states over the positions its attention mask allows, evenly
//! weighted, and projects the result through `query_key_value`. An `lm_head`
//! maps the final hidden states to vocabulary logits.
//!
//! Parameter names follow the ChatGLM checkpoint layout so adapters and
//! saved state dicts line up with it.

use std::path::Path;

use ndarray::{s, Array2, Array3, ArrayD, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::config::ModelConfig;
use super::head::{LmHead, OutputHead};
use super::loss::causal_lm_loss;
use super::params::{Parameter, ParameterStore};
use super::precision::Precision;
use super::traits::{CausalLm, CausalLmOutput, HeadWrapper, LinearSpec, ModelInputs};
use super::weights::{load_model_weights, write_safetensors, StateDict};
use crate::error::{Error, Result};
use crate::lora::{linear_backward, linear_forward, AdapterRegistry, LinearCache};

/// Word embedding table `(V, H)`
pub const WORD_EMBEDDINGS: &str = "transformer.word_embeddings.weight";
/// Token position table `(max_sequence_length, H)`
pub const POSITION_EMBEDDINGS: &str = "transformer.position_embeddings.weight";
/// Block position table `(max_sequence_length, H)`, 2D encoding only
pub const BLOCK_POSITION_EMBEDDINGS: &str = "transformer.block_position_embeddings.weight";
/// Output head `(V, H)`
pub const LM_HEAD: &str = "lm_head.weight";

/// Module name of the fused attention projection of layer `layer`
pub fn query_key_value(layer: usize) -> String {
    format!("transformer.layers.{layer}.attention.query_key_value")
}

/// Activations of one example kept for the backward pass
struct ExampleCache {
    token_ids: Vec<usize>,
    positions: Vec<Vec<usize>>,
    pooling: Array2<f32>,
    layers: Vec<LinearCache>,
    hidden: Array2<f32>,
}

struct ForwardCache {
    examples: Vec<ExampleCache>,
    grad_logits: Array3<f32>,
}

/// GLM language model over a [`ParameterStore`]
pub struct GlmForCausalLm {
    config: ModelConfig,
    params: ParameterStore,
    adapters: AdapterRegistry,
    lm_head: Box<dyn OutputHead>,
    training: bool,
    rng: StdRng,
    cache: Option<ForwardCache>,
}

impl GlmForCausalLm {
    /// Assemble a model from loaded weights
    ///
    /// # Errors
    /// Returns error when a required weight is missing or mis-shaped.
    pub fn new(config: ModelConfig, params: ParameterStore) -> Result<Self> {
        config.validate()?;
        let (vocab, hidden, max_len) =
            (config.vocab_size, config.hidden_size, config.max_sequence_length);

        let mut expected = vec![
            (WORD_EMBEDDINGS.to_string(), vec![vocab, hidden]),
            (POSITION_EMBEDDINGS.to_string(), vec![max_len, hidden]),
            (LM_HEAD.to_string(), vec![vocab, hidden]),
        ];
        if config.position_encoding_2d {
            expected.push((BLOCK_POSITION_EMBEDDINGS.to_string(), vec![max_len, hidden]));
        }
        for layer in 0..config.num_layers {
            let name = query_key_value(layer);
            expected.push((format!("{name}.weight"), vec![hidden, hidden]));
            if let Some(bias) = params.get(&format!("{name}.bias")) {
                if bias.shape() != [hidden] {
                    return Err(Error::ShapeMismatch {
                        expected: vec![hidden],
                        got: bias.shape().to_vec(),
                    });
                }
            }
        }
        for (name, shape) in expected {
            let param = params.require(&name)?;
            if param.shape() != shape.as_slice() {
                return Err(Error::ShapeMismatch { expected: shape, got: param.shape().to_vec() });
            }
        }

        let lm_head: Box<dyn OutputHead> = Box::new(LmHead::new(LM_HEAD, config.torch_dtype));
        Ok(Self {
            config,
            params,
            adapters: AdapterRegistry::new(),
            lm_head,
            training: true,
            rng: StdRng::seed_from_u64(0),
            cache: None,
        })
    }

    /// Randomly initialized model (weights `U(-0.1, 0.1)`, biases zero)
    ///
    /// # Errors
    /// Returns error for an invalid config.
    pub fn init(config: ModelConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let (vocab, hidden, max_len) =
            (config.vocab_size, config.hidden_size, config.max_sequence_length);

        let mut shapes = vec![
            (WORD_EMBEDDINGS.to_string(), vec![vocab, hidden]),
            (POSITION_EMBEDDINGS.to_string(), vec![max_len, hidden]),
            (LM_HEAD.to_string(), vec![vocab, hidden]),
        ];
        if config.position_encoding_2d {
            shapes.push((BLOCK_POSITION_EMBEDDINGS.to_string(), vec![max_len, hidden]));
        }
        for layer in 0..config.num_layers {
            shapes.push((format!("{}.weight", query_key_value(layer)), vec![hidden, hidden]));
        }

        let mut params = ParameterStore::new();
        for (name, shape) in shapes {
            let data = ArrayD::from_shape_fn(shape, |_| rng.gen_range(-0.1..0.1));
            params.insert(name, Parameter::new(data, true));
        }
        for layer in 0..config.num_layers {
            params.insert(
                format!("{}.bias", query_key_value(layer)),
                Parameter::new(ArrayD::zeros(vec![hidden]), true),
            );
        }

        let mut model = Self::new(config, params)?;
        model.rng = StdRng::seed_from_u64(seed.wrapping_add(1));
        Ok(model)
    }

    /// Load `config.json` and every `*.safetensors` file from `model_dir`
    ///
    /// # Errors
    /// Returns error when the config or weights cannot be read.
    pub fn from_pretrained(model_dir: &Path) -> Result<Self> {
        Self::from_pretrained_with_dtype(model_dir, None)
    }

    /// [`GlmForCausalLm::from_pretrained`] with the compute precision of
    /// `config.json` replaced by `dtype`
    ///
    /// # Errors
    /// Returns error when the config or weights cannot be read.
    pub fn from_pretrained_with_dtype(model_dir: &Path, dtype: Option<Precision>) -> Result<Self> {
        let mut config = ModelConfig::from_model_dir(model_dir)?;
        if let Some(dtype) = dtype {
            config.torch_dtype = dtype;
        }
        let weights = load_model_weights(model_dir)?;

        let mut params = ParameterStore::new();
        for (name, data) in weights {
            params.insert(name, Parameter::new(data, true));
        }
        let model = Self::new(config, params)?;
        tracing::info!(
            path = %model_dir.display(),
            layers = model.config.num_layers,
            parameters = model.params.num_parameters(),
            "loaded pretrained model"
        );
        Ok(model)
    }

    /// Write `config.json` and `model.safetensors` into `model_dir`
    ///
    /// # Errors
    /// Returns error on write failure.
    pub fn save_pretrained(&self, model_dir: &Path) -> Result<()> {
        self.config.save(model_dir)?;
        let state: StateDict =
            self.params.iter().map(|(name, p)| (name.to_string(), p.data().clone())).collect();
        write_safetensors(&model_dir.join("model.safetensors"), &state)
    }

    /// Seed the dropout generator
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn token_ids(&self, row: ndarray::ArrayView1<'_, i64>) -> Result<Vec<usize>> {
        row.iter()
            .map(|&id| {
                usize::try_from(id).ok().filter(|&id| id < self.config.vocab_size).ok_or_else(|| {
                    Error::InvalidExample(format!(
                        "token id {id} outside vocabulary of {}",
                        self.config.vocab_size
                    ))
                })
            })
            .collect()
    }

    fn positions(&self, inputs: &ModelInputs<'_>, b: usize, len: usize) -> Result<Vec<Vec<usize>>> {
        let rows = if self.config.position_encoding_2d { 2 } else { 1 };
        let max_len = self.config.max_sequence_length;
        let Some(position_ids) = inputs.position_ids else {
            if len > max_len {
                return Err(Error::InvalidExample(format!(
                    "sequence of {len} tokens exceeds max_sequence_length {max_len}"
                )));
            }
            let mut positions = vec![(0..len).collect::<Vec<_>>()];
            if rows == 2 {
                positions.push(vec![0; len]);
            }
            return Ok(positions);
        };

        if position_ids.len_of(Axis(1)) < rows {
            return Err(Error::ShapeMismatch {
                expected: vec![inputs.input_ids.nrows(), rows, len],
                got: position_ids.shape().to_vec(),
            });
        }
        (0..rows)
            .map(|r| {
                position_ids
                    .slice(s![b, r, ..])
                    .iter()
                    .map(|&p| {
                        usize::try_from(p).ok().filter(|&p| p < max_len).ok_or_else(|| {
                            Error::InvalidExample(format!(
                                "position id {p} outside 0..{max_len}"
                            ))
                        })
                    })
                    .collect::<Result<Vec<usize>>>()
            })
            .collect()
    }

    /// Row-normalized matrix averaging each position over what it may see
    fn pooling(inputs: &ModelInputs<'_>, b: usize, len: usize) -> Array2<f32> {
        let mut pooling = Array2::<f32>::zeros((len, len));
        for i in 0..len {
            let allowed: Vec<usize> = match inputs.attention_mask {
                Some(mask) => (0..len).filter(|&j| !mask[[b, 0, i, j]]).collect(),
                None => (0..=i).collect(),
            };
            if allowed.is_empty() {
                continue;
            }
            let weight = 1.0 / allowed.len() as f32;
            for j in allowed {
                pooling[[i, j]] = weight;
            }
        }
        pooling
    }

    fn embed(&self, token_ids: &[usize], positions: &[Vec<usize>]) -> Result<Array2<f32>> {
        let words = self.params.matrix(WORD_EMBEDDINGS)?;
        let tables = [POSITION_EMBEDDINGS, BLOCK_POSITION_EMBEDDINGS];

        let mut hidden = Array2::<f32>::zeros((token_ids.len(), self.config.hidden_size));
        for (t, &id) in token_ids.iter().enumerate() {
            hidden.row_mut(t).assign(&words.row(id));
        }
        for (table, rows) in tables.iter().zip(positions) {
            let table = self.params.matrix(table)?;
            for (t, &p) in rows.iter().enumerate() {
                let mut row = hidden.row_mut(t);
                row += &table.row(p);
            }
        }
        Ok(hidden)
    }

    fn check_shapes(&self, inputs: &ModelInputs<'_>) -> Result<()> {
        let (batch, len) = inputs.input_ids.dim();
        if len == 0 {
            return Err(Error::InvalidExample("empty input sequence".into()));
        }
        if let Some(mask) = inputs.attention_mask {
            if mask.dim() != (batch, 1, len, len) {
                return Err(Error::ShapeMismatch {
                    expected: vec![batch, 1, len, len],
                    got: mask.shape().to_vec(),
                });
            }
        }
        if let Some(positions) = inputs.position_ids {
            if positions.len_of(Axis(0)) != batch || positions.len_of(Axis(2)) != len {
                return Err(Error::ShapeMismatch {
                    expected: vec![batch, 2, len],
                    got: positions.shape().to_vec(),
                });
            }
        }
        Ok(())
    }

    fn accumulate_embedding_grads(&mut self, example: &ExampleCache, grad: ArrayView2<'_, f32>) -> Result<()> {
        let mut tables = vec![(WORD_EMBEDDINGS, example.token_ids.as_slice())];
        tables.push((POSITION_EMBEDDINGS, example.positions[0].as_slice()));
        if let Some(block) = example.positions.get(1) {
            tables.push((BLOCK_POSITION_EMBEDDINGS, block.as_slice()));
        }

        for (name, rows) in tables {
            let param = self.params.require_mut(name)?;
            if !param.requires_grad() {
                continue;
            }
            let mut table_grad = ArrayD::<f32>::zeros(param.shape());
            for (t, &row) in rows.iter().enumerate() {
                let mut target = table_grad.index_axis_mut(Axis(0), row);
                target += &grad.row(t);
            }
            param.accumulate_grad(&table_grad);
        }
        Ok(())
    }
}

impl CausalLm for GlmForCausalLm {
    fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut ModelConfig {
        &mut self.config
    }

    fn parameters(&self) -> &ParameterStore {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut ParameterStore {
        &mut self.params
    }

    fn linear_layers(&self) -> Vec<LinearSpec> {
        let hidden = self.config.hidden_size;
        (0..self.config.num_layers)
            .map(|layer| LinearSpec::new(query_key_value(layer), hidden, hidden))
            .collect()
    }

    fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    fn adapters_mut(&mut self) -> &mut AdapterRegistry {
        &mut self.adapters
    }

    fn wrap_output_head(&mut self, wrap: HeadWrapper) {
        let head = std::mem::replace(
            &mut self.lm_head,
            Box::new(LmHead::new(LM_HEAD, self.config.torch_dtype)),
        );
        self.lm_head = wrap(head);
    }

    fn output_head(&self) -> &dyn OutputHead {
        self.lm_head.as_ref()
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn forward(&mut self, inputs: &ModelInputs<'_>) -> Result<CausalLmOutput> {
        self.check_shapes(inputs)?;
        let (batch, len) = inputs.input_ids.dim();

        let mut logits = Array3::<f32>::zeros((batch, len, self.config.vocab_size));
        let mut examples = Vec::with_capacity(batch);
        for b in 0..batch {
            let token_ids = self.token_ids(inputs.input_ids.row(b))?;
            let positions = self.positions(inputs, b, len)?;
            let pooling = Self::pooling(inputs, b, len);

            let mut hidden = self.embed(&token_ids, &positions)?;
            let mut layers = Vec::with_capacity(self.config.num_layers);
            for layer in 0..self.config.num_layers {
                let context = pooling.dot(&hidden);
                let rng = if self.training { Some(&mut self.rng) } else { None };
                let (out, cache) = linear_forward(
                    &self.params,
                    &self.adapters,
                    &query_key_value(layer),
                    context,
                    rng,
                )?;
                hidden += &out;
                layers.push(cache);
            }

            let example_logits = self.lm_head.forward(&self.params, hidden.view())?.into_f32();
            logits.slice_mut(s![b, .., ..]).assign(&example_logits);
            examples.push(ExampleCache { token_ids, positions, pooling, layers, hidden });
        }

        self.cache = None;
        let loss = match inputs.labels {
            Some(labels) => {
                let (loss, grad_logits) =
                    causal_lm_loss(logits.view(), labels, inputs.ignore_index)?;
                self.cache = Some(ForwardCache { examples, grad_logits });
                Some(loss)
            }
            None => None,
        };
        Ok(CausalLmOutput { loss, logits })
    }

    fn backward(&mut self, scale: f32) -> Result<()> {
        let cache = self
            .cache
            .take()
            .ok_or_else(|| Error::Model("backward called without a forward pass with labels".into()))?;

        for (b, example) in cache.examples.iter().enumerate() {
            let grad_logits = cache.grad_logits.slice(s![b, .., ..]).mapv(|g| g * scale);
            let mut grad_hidden =
                self.lm_head.backward(&mut self.params, example.hidden.view(), grad_logits.view())?;

            for layer in (0..self.config.num_layers).rev() {
                let grad_context = linear_backward(
                    &mut self.params,
                    &query_key_value(layer),
                    &example.layers[layer],
                    grad_hidden.view(),
                )?;
                grad_hidden += &example.pooling.t().dot(&grad_context);
            }
            self.accumulate_embedding_grads(example, grad_hidden.view())?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for GlmForCausalLm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlmForCausalLm")
            .field("config", &self.config)
            .field("parameters", &self.params.len())
            .field("adapters", &self.adapters.len())
            .field("training", &self.training)
            .finish_non_exhaustive()
    }
}
