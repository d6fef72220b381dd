//! Array sources and sinks.
//!
//! An [ArraySource] supplies the global variables an observation space is
//! built from; an [ArraySink] receives retained variables on save. The
//! in-memory implementations back the test suite and any caller that already
//! holds its data as arrays. File backends implement the same traits.

use hashbrown::HashMap;
use ndarray::{Array1, ArrayD, Axis};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::ObsDistError;
use crate::store::VarData;
use crate::types::DType;

/// A read-only supplier of global (pre-partition) variables.
pub trait ArraySource {
    /// Number of global locations, the leading dimension of every
    /// per-location variable.
    fn gnlocs(&self) -> usize;

    /// Every (group, name, kind) this source can supply, in unspecified
    /// order.
    fn variables(&self) -> Vec<(String, String, DType)>;

    /// Read one variable's full global payload.
    fn read(&self, group: &str, name: &str) -> Result<VarData, ObsDistError>;
}

/// A writable receiver of retained variables.
pub trait ArraySink {
    /// Write one variable's local payload.
    fn write(&mut self, group: &str, name: &str, data: &VarData) -> Result<(), ObsDistError>;
}

/// An [ArraySource] over arrays already in memory.
#[derive(Debug, Default)]
pub struct MemorySource {
    gnlocs: usize,
    vars: HashMap<(String, String), VarData>,
}

impl MemorySource {
    /// Return an empty source over `gnlocs` global locations.
    pub fn new(gnlocs: usize) -> Self {
        MemorySource {
            gnlocs,
            vars: HashMap::new(),
        }
    }

    /// Add a variable, replacing any previous payload under the same key.
    pub fn insert(&mut self, group: &str, name: &str, data: VarData) -> &mut Self {
        self.vars
            .insert((group.to_string(), name.to_string()), data);
        self
    }
}

impl ArraySource for MemorySource {
    fn gnlocs(&self) -> usize {
        self.gnlocs
    }

    fn variables(&self) -> Vec<(String, String, DType)> {
        self.vars
            .iter()
            .map(|((group, name), data)| (group.clone(), name.clone(), data.dtype()))
            .collect()
    }

    fn read(&self, group: &str, name: &str) -> Result<VarData, ObsDistError> {
        self.vars
            .get(&(group.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ObsDistError::VariableNotFound {
                group: group.to_string(),
                name: name.to_string(),
            })
    }
}

/// An [ArraySink] that collects written variables in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    vars: HashMap<(String, String), VarData>,
}

impl MemorySink {
    /// Return an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow a written variable, if present.
    pub fn get(&self, group: &str, name: &str) -> Option<&VarData> {
        self.vars.get(&(group.to_string(), name.to_string()))
    }

    /// Number of written variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl ArraySink for MemorySink {
    fn write(&mut self, group: &str, name: &str, data: &VarData) -> Result<(), ObsDistError> {
        self.vars
            .insert((group.to_string(), name.to_string()), data.clone());
        Ok(())
    }
}

/// Decode a fixed-width character array into strings.
///
/// Sources that store text as 2-D byte arrays of shape (n, width) pad each
/// row with NULs or spaces; decoding trims the padding. Invalid UTF-8 bytes
/// are replaced rather than propagated.
pub fn decode_fixed_width(chars: &ArrayD<u8>) -> Result<ArrayD<String>, ObsDistError> {
    if chars.ndim() != 2 {
        return Err(ObsDistError::InvalidConfig {
            reason: format!(
                "fixed-width character data must be 2-D, got {} dimensions",
                chars.ndim()
            ),
        });
    }
    let decoded: Vec<String> = chars
        .axis_iter(Axis(0))
        .map(|row| {
            let bytes: Vec<u8> = row.iter().copied().collect();
            String::from_utf8_lossy(&bytes)
                .trim_end_matches(['\0', ' '])
                .to_string()
        })
        .collect();
    Ok(Array1::from(decoded).into_dyn())
}

/// Parse an array of RFC 3339 timestamps.
///
/// Sources commonly ship datetimes as text ("2018-04-15T06:00:00Z"); the
/// observation space parses them on ingest so window filtering works on real
/// timestamps. An unparseable value is fatal.
pub fn parse_datetimes(text: &ArrayD<String>) -> Result<ArrayD<OffsetDateTime>, ObsDistError> {
    let parsed = text
        .iter()
        .map(|value| {
            OffsetDateTime::parse(value, &Rfc3339).map_err(|_| ObsDistError::InvalidDateTime {
                value: value.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    ArrayD::from_shape_vec(text.raw_dim(), parsed).map_err(|err| ObsDistError::InvalidConfig {
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::{arr1, arr2};
    use time::macros::datetime;

    #[test]
    fn memory_source_round_trip() {
        let mut source = MemorySource::new(3);
        source.insert(
            "ObsValue",
            "air_temperature",
            VarData::Float(arr1(&[1.0_f32, 2.0, 3.0]).into_dyn()),
        );
        assert_eq!(3, source.gnlocs());
        assert_eq!(
            vec![(
                "ObsValue".to_string(),
                "air_temperature".to_string(),
                DType::Float32
            )],
            source.variables()
        );
        let data = source.read("ObsValue", "air_temperature").unwrap();
        assert_eq!(DType::Float32, data.dtype());
    }

    #[test]
    fn absent_variable_is_fatal() {
        let source = MemorySource::new(1);
        assert!(matches!(
            source.read("ObsValue", "humidity"),
            Err(ObsDistError::VariableNotFound { .. })
        ));
    }

    #[test]
    fn sink_collects_writes() {
        let mut sink = MemorySink::new();
        let data = VarData::Int(arr1(&[1, 2]).into_dyn());
        sink.write("PreQC", "air_temperature", &data).unwrap();
        assert_eq!(1, sink.len());
        assert_eq!(Some(&data), sink.get("PreQC", "air_temperature"));
    }

    #[test]
    fn fixed_width_decoding_trims_padding() {
        let chars = arr2(&[
            [b'9', b'4', b'9', b'8', b'0', b'\0'],
            [b'5', b'4', b'8', b' ', b' ', b' '],
        ])
        .into_dyn();
        let decoded = decode_fixed_width(&chars).unwrap();
        assert_eq!("94980", decoded[0]);
        assert_eq!("548", decoded[1]);
    }

    #[test]
    fn fixed_width_decoding_requires_two_dimensions() {
        let chars = arr1(&[b'x']).into_dyn();
        assert!(matches!(
            decode_fixed_width(&chars),
            Err(ObsDistError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn datetime_parsing() {
        let text = arr1(&["2018-04-15T06:00:00Z".to_string()]).into_dyn();
        let parsed = parse_datetimes(&text).unwrap();
        assert_eq!(datetime!(2018-04-15 06:00 UTC), parsed[0]);
    }

    #[test]
    fn bad_datetime_is_fatal() {
        let text = arr1(&["yesterday".to_string()]).into_dyn();
        assert!(matches!(
            parse_datetimes(&text),
            Err(ObsDistError::InvalidDateTime { .. })
        ));
    }
}
