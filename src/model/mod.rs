//! Causal language model: parameters, output head, GLM forward/backward,
//! configuration and weight I/O

mod assembly;
mod config;
mod device;
mod glm;
mod head;
mod loss;
mod params;
mod precision;
mod traits;
mod weights;

pub use assembly::{load_pretrained, prepare_for_training};
pub use config::{
    load_special_tokens, ModelConfig, SpecialTokens, CHATGLM_BOS_TOKEN_ID, CHATGLM_EOS_TOKEN_ID,
    CHATGLM_GMASK_TOKEN_ID, CHATGLM_MASK_TOKEN_ID, CHATGLM_PAD_TOKEN_ID,
};
pub use device::{parse_local_rank, ComputeDevice, LOCAL_RANK_ENV};
pub use glm::{
    query_key_value, GlmForCausalLm, BLOCK_POSITION_EMBEDDINGS, LM_HEAD, POSITION_EMBEDDINGS,
    WORD_EMBEDDINGS,
};
pub use head::{CastOutputToFloat, HeadOutput, LmHead, OutputHead};
pub use loss::causal_lm_loss;
pub use params::{Parameter, ParameterStore};
pub use precision::Precision;
pub use traits::{CausalLm, CausalLmOutput, HeadWrapper, LinearSpec, ModelInputs};
pub use weights::{
    find_safetensors_files, load_model_weights, read_safetensors, tensor_to_array,
    write_safetensors, StateDict,
};
