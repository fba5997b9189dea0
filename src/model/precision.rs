//! Compute precision of model weights and activations

use std::fmt;

use serde::{Deserialize, Serialize};

/// Floating-point precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Precision {
    /// 32-bit floating point
    #[default]
    #[serde(rename = "float32")]
    Fp32,
    /// IEEE half precision
    #[serde(rename = "float16")]
    Fp16,
    /// Brain floating point
    #[serde(rename = "bfloat16")]
    Bf16,
}

impl Precision {
    /// Size in bytes
    pub fn size_bytes(&self) -> usize {
        match self {
            Precision::Fp32 => 4,
            Precision::Fp16 | Precision::Bf16 => 2,
        }
    }

    /// `torch_dtype` name
    pub fn name(&self) -> &'static str {
        match self {
            Precision::Fp32 => "float32",
            Precision::Fp16 => "float16",
            Precision::Bf16 => "bfloat16",
        }
    }

    /// Whether this is a reduced precision type
    pub fn is_reduced(&self) -> bool {
        matches!(self, Precision::Fp16 | Precision::Bf16)
    }

    /// Round an f32 to the nearest value representable in this precision
    pub fn round(&self, value: f32) -> f32 {
        match self {
            Precision::Fp32 => value,
            Precision::Fp16 => half::f16::from_f32(value).to_f32(),
            Precision::Bf16 => half::bf16::from_f32(value).to_f32(),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_exact_values() {
        for p in [Precision::Fp32, Precision::Fp16, Precision::Bf16] {
            assert_eq!(p.round(1.5), 1.5);
            assert_eq!(p.round(-2.0), -2.0);
        }
    }

    #[test]
    fn test_half_loses_precision() {
        let x = 1.000_1_f32;
        assert_eq!(Precision::Fp32.round(x), x);
        assert_ne!(Precision::Fp16.round(x), x);
        assert_ne!(Precision::Bf16.round(x), x);
    }

    #[test]
    fn test_torch_dtype_names() {
        let p: Precision = serde_json::from_str("\"float16\"").unwrap();
        assert_eq!(p, Precision::Fp16);
        assert_eq!(Precision::Bf16.to_string(), "bfloat16");
        assert_eq!(Precision::Fp16.size_bytes(), 2);
        assert!(Precision::Bf16.is_reduced());
        assert!(!Precision::Fp32.is_reduced());
    }
}
