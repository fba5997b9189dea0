//! Which linear layers carry an adapter, and with what settings

use std::collections::BTreeMap;

/// Runtime settings of one injected adapter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoraSettings {
    /// Rank of the update
    pub rank: usize,
    /// `alpha / rank`
    pub scale: f32,
    /// Dropout probability on the adapter input
    pub dropout: f32,
}

/// Adapted layers keyed by module name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterRegistry {
    layers: BTreeMap<String, LoraSettings>,
}

impl AdapterRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter on `layer`
    pub fn insert(&mut self, layer: impl Into<String>, settings: LoraSettings) {
        self.layers.insert(layer.into(), settings);
    }

    /// Settings for `layer`, if adapted
    pub fn get(&self, layer: &str) -> Option<&LoraSettings> {
        self.layers.get(layer)
    }

    /// Whether `layer` is adapted
    pub fn contains(&self, layer: &str) -> bool {
        self.layers.contains_key(layer)
    }

    /// Adapted layers in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LoraSettings)> {
        self.layers.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of adapted layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Parameter name of the down-projection `A` (rank x in)
pub fn lora_a_name(layer: &str) -> String {
    format!("{layer}.lora_A.weight")
}

/// Parameter name of the up-projection `B` (out x rank)
pub fn lora_b_name(layer: &str) -> String {
    format!("{layer}.lora_B.weight")
}
