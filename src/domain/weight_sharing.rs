// ============================================================
// Layer 3 — Weight Sharing Mode
// ============================================================
// The output projector maps the decoder's last hidden state
// (d_model wide) to one logit per vocabulary entry. It can
// reuse the embedding table E (vocab × d_model) or own its
// weights. The configuration surface is an integer:
//
//   0      → TiedWithBias   logits = h·Eᵀ + b
//   1      → TiedNoBias     logits = h·Eᵀ
//   2      → Independent    logits = h·W + b   (own W, b)
//   other  → InnerProduct   logits = h·Eᵀ
//
// TiedNoBias and InnerProduct compute the same function; they
// are kept apart because they are different user choices and
// are reported separately in the logs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightSharing {
    TiedWithBias,
    TiedNoBias,
    Independent,
    InnerProduct,
}

impl WeightSharing {
    /// Decode the integer configuration value.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::TiedWithBias,
            1 => Self::TiedNoBias,
            2 => Self::Independent,
            _ => Self::InnerProduct,
        }
    }

    /// True when the projector reads the embedding table instead of
    /// owning a weight matrix.
    pub fn is_tied(&self) -> bool {
        !matches!(self, Self::Independent)
    }
}

impl From<i64> for WeightSharing {
    fn from(code: i64) -> Self {
        Self::from_code(code)
    }
}

impl std::fmt::Display for WeightSharing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::TiedWithBias => "tied+bias",
            Self::TiedNoBias   => "tied",
            Self::Independent  => "independent",
            Self::InnerProduct => "inner-product",
        };
        f.write_str(name)
    }
}
