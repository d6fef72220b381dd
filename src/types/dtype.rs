//! Supported element kinds.

use serde::Deserialize;
use strum_macros::Display;

/// Element kinds an observation variable can hold.
///
/// This is a closed set: every store payload, source variable and reduction
/// is defined over these kinds only.
#[derive(Clone, Copy, Debug, Deserialize, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// [i32]
    Int32,
    /// [f32]
    Float32,
    /// [f64] (converted to [f32] at the store boundary)
    Float64,
    /// [String]
    Text,
    /// [time::OffsetDateTime]
    DateTime,
}

impl DType {
    /// Human readable name used in conversion diagnostics.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Text => "text",
            Self::DateTime => "datetime",
        }
    }
}
