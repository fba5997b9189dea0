//! LoRA (Low-Rank Adaptation)
//!
//! Base weights are frozen; each targeted linear layer gains a trainable
//! pair `A` (rank x in) and `B` (out x rank) whose product, scaled by
//! `alpha / rank`, is added to the layer output.

mod config;
mod linear;
mod peft;
mod peft_config;
mod registry;

pub use config::{
    LoraConfig, TaskType, CHATGLM_TARGET_MODULE, DEFAULT_LORA_ALPHA, DEFAULT_LORA_DROPOUT,
    DEFAULT_LORA_RANK,
};
pub use linear::{linear_backward, linear_forward, LinearCache};
pub use peft::{get_peft_model, inject_adapters, PeftModel, TrainableSummary, PEFT_PREFIX};
pub use peft_config::{PeftAdapterConfig, ADAPTER_CONFIG_NAME};
pub use registry::{lora_a_name, lora_b_name, AdapterRegistry, LoraSettings};
