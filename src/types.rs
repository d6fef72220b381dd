//! Type system for observation data.

mod dtype;
mod missing;

pub use dtype::DType;
pub use missing::{convert_numeric, MissingValue, NumericElement, MISSING_DATETIME};
