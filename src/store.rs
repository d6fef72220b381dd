//! Typed key-value observation store.
//!
//! Retained observation data lives here, keyed by (group, variable), e.g.
//! ("ObsValue", "air_temperature"). Each entry is an n-dimensional array of
//! one of the supported element kinds. Loads may request a different numeric
//! kind than the one stored; the store converts, remapping missing sentinels,
//! and logs a warning through the run-scoped [ConversionWarnings] context.

use std::sync::atomic::{AtomicU32, Ordering};

use hashbrown::HashMap;
use ndarray::ArrayD;
use time::OffsetDateTime;
use tracing::warn;

use crate::error::ObsDistError;
use crate::types::{convert_numeric, DType};

/// Array payload of one stored variable.
///
/// Doubles are converted to single precision on ingest, so the stored kinds
/// are a subset of [DType].
#[derive(Clone, Debug, PartialEq)]
pub enum VarData {
    /// Integer data
    Int(ArrayD<i32>),
    /// Single precision data
    Float(ArrayD<f32>),
    /// Text data
    Text(ArrayD<String>),
    /// Datetime data
    DateTime(ArrayD<OffsetDateTime>),
}

impl VarData {
    /// The element kind of this payload.
    pub fn dtype(&self) -> DType {
        match self {
            Self::Int(_) => DType::Int32,
            Self::Float(_) => DType::Float32,
            Self::Text(_) => DType::Text,
            Self::DateTime(_) => DType::DateTime,
        }
    }

    /// Shape of the payload array.
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Int(data) => data.shape(),
            Self::Float(data) => data.shape(),
            Self::Text(data) => data.shape(),
            Self::DateTime(data) => data.shape(),
        }
    }
}

/// Run-scoped cap on type-mismatch warnings.
///
/// Loading a variable with a kind that differs from the stored kind is legal
/// but suspicious, and a run can hit thousands of such loads. The context
/// threads through every call that may warn and limits emission to one
/// warning per observation space instance.
#[derive(Debug, Default)]
pub struct ConversionWarnings {
    emitted: AtomicU32,
}

impl ConversionWarnings {
    /// Return a fresh context with the full warning budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log a type-mismatch warning unless the budget is spent.
    pub fn warn_mismatch(&self, group: &str, name: &str, stored: DType, requested: DType) {
        if self.emitted.fetch_add(1, Ordering::Relaxed) == 0 {
            warn!(
                group,
                name,
                stored = stored.type_name(),
                requested = requested.type_name(),
                "variable kind differs from stored kind, converting (missing \
                 sentinels are remapped); further mismatch warnings suppressed",
            );
        }
    }

    /// Number of mismatches seen so far (not the number of warnings logged).
    pub fn count(&self) -> u32 {
        self.emitted.load(Ordering::Relaxed)
    }
}

/// Typed key-value observation store.
#[derive(Debug, Default)]
pub struct ObsStore {
    vars: HashMap<(String, String), VarData>,
}

impl ObsStore {
    /// Return an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the (group, variable) combination exists.
    pub fn has(&self, group: &str, name: &str) -> bool {
        self.vars.contains_key(&(group.to_string(), name.to_string()))
    }

    /// Store a variable, replacing any previous payload.
    pub fn store(&mut self, group: &str, name: &str, data: VarData) {
        self.vars
            .insert((group.to_string(), name.to_string()), data);
    }

    /// Runtime element kind of a stored variable.
    pub fn dtype(&self, group: &str, name: &str) -> Result<DType, ObsDistError> {
        self.get(group, name).map(VarData::dtype)
    }

    /// Borrow the raw payload of a stored variable.
    pub fn get(&self, group: &str, name: &str) -> Result<&VarData, ObsDistError> {
        self.vars
            .get(&(group.to_string(), name.to_string()))
            .ok_or_else(|| ObsDistError::VariableNotFound {
                group: group.to_string(),
                name: name.to_string(),
            })
    }

    /// Load a variable as integers, converting from float with a warning.
    pub fn load_int(
        &self,
        group: &str,
        name: &str,
        warnings: &ConversionWarnings,
    ) -> Result<ArrayD<i32>, ObsDistError> {
        match self.get(group, name)? {
            VarData::Int(data) => Ok(data.clone()),
            VarData::Float(data) => {
                warnings.warn_mismatch(group, name, DType::Float32, DType::Int32);
                Ok(convert_numeric(data))
            }
            other => Err(ObsDistError::UnsupportedConversion {
                from: other.dtype().type_name(),
                to: DType::Int32.type_name(),
            }),
        }
    }

    /// Load a variable as single precision floats, converting from int with a
    /// warning.
    pub fn load_float(
        &self,
        group: &str,
        name: &str,
        warnings: &ConversionWarnings,
    ) -> Result<ArrayD<f32>, ObsDistError> {
        match self.get(group, name)? {
            VarData::Float(data) => Ok(data.clone()),
            VarData::Int(data) => {
                warnings.warn_mismatch(group, name, DType::Int32, DType::Float32);
                Ok(convert_numeric(data))
            }
            other => Err(ObsDistError::UnsupportedConversion {
                from: other.dtype().type_name(),
                to: DType::Float32.type_name(),
            }),
        }
    }

    /// Load a variable as double precision.
    ///
    /// Doubles are stored single precision, so this is a deliberate widening
    /// conversion and does not warn.
    pub fn load_double(
        &self,
        group: &str,
        name: &str,
        warnings: &ConversionWarnings,
    ) -> Result<ArrayD<f64>, ObsDistError> {
        Ok(convert_numeric(&self.load_float(group, name, warnings)?))
    }

    /// Load a text variable. No conversions exist for text.
    pub fn load_text(&self, group: &str, name: &str) -> Result<ArrayD<String>, ObsDistError> {
        match self.get(group, name)? {
            VarData::Text(data) => Ok(data.clone()),
            other => Err(ObsDistError::UnsupportedConversion {
                from: other.dtype().type_name(),
                to: DType::Text.type_name(),
            }),
        }
    }

    /// Load a datetime variable. No conversions exist for datetimes.
    pub fn load_datetime(
        &self,
        group: &str,
        name: &str,
    ) -> Result<ArrayD<OffsetDateTime>, ObsDistError> {
        match self.get(group, name)? {
            VarData::DateTime(data) => Ok(data.clone()),
            other => Err(ObsDistError::UnsupportedConversion {
                from: other.dtype().type_name(),
                to: DType::DateTime.type_name(),
            }),
        }
    }

    /// Iterate over all stored (group, name, payload) entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &VarData)> {
        self.vars
            .iter()
            .map(|((group, name), data)| (group.as_str(), name.as_str(), data))
    }

    /// Number of stored variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the store holds no variables.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::arr1;

    use crate::types::MissingValue;

    fn store_with_float() -> ObsStore {
        let mut store = ObsStore::new();
        store.store(
            "ObsValue",
            "air_temperature",
            VarData::Float(arr1(&[250.0_f32, f32::MIN, 300.0]).into_dyn()),
        );
        store
    }

    #[test]
    fn has_and_dtype() {
        let store = store_with_float();
        assert!(store.has("ObsValue", "air_temperature"));
        assert!(!store.has("ObsValue", "humidity"));
        assert_eq!(
            DType::Float32,
            store.dtype("ObsValue", "air_temperature").unwrap()
        );
    }

    #[test]
    fn absent_variable_is_fatal() {
        let store = store_with_float();
        let result = store.load_float("ObsValue", "humidity", &ConversionWarnings::new());
        assert!(matches!(
            result,
            Err(ObsDistError::VariableNotFound { .. })
        ));
    }

    #[test]
    fn load_matching_kind_does_not_warn() {
        let store = store_with_float();
        let warnings = ConversionWarnings::new();
        let data = store
            .load_float("ObsValue", "air_temperature", &warnings)
            .unwrap();
        assert_eq!(250.0, data[0]);
        assert_eq!(0, warnings.count());
    }

    #[test]
    fn load_int_from_float_warns_and_remaps_sentinel() {
        let store = store_with_float();
        let warnings = ConversionWarnings::new();
        let data = store
            .load_int("ObsValue", "air_temperature", &warnings)
            .unwrap();
        assert_eq!(250, data[0]);
        assert!(data[1].is_missing());
        assert_eq!(1, warnings.count());
    }

    #[test]
    fn warning_cap_counts_every_mismatch() {
        let store = store_with_float();
        let warnings = ConversionWarnings::new();
        for _ in 0..3 {
            store
                .load_int("ObsValue", "air_temperature", &warnings)
                .unwrap();
        }
        // Three mismatches observed; only the first emitted a log line.
        assert_eq!(3, warnings.count());
    }

    #[test]
    fn load_double_widens_silently() {
        let store = store_with_float();
        let warnings = ConversionWarnings::new();
        let data = store
            .load_double("ObsValue", "air_temperature", &warnings)
            .unwrap();
        assert_eq!(300.0, data[2]);
        assert!(data[1].is_missing());
        assert_eq!(0, warnings.count());
    }

    #[test]
    fn text_to_numeric_is_fatal() {
        let mut store = ObsStore::new();
        store.store(
            "MetaData",
            "station_id",
            VarData::Text(arr1(&["x".to_string()]).into_dyn()),
        );
        let result = store.load_float("MetaData", "station_id", &ConversionWarnings::new());
        assert!(matches!(
            result,
            Err(ObsDistError::UnsupportedConversion { .. })
        ));
    }
}
