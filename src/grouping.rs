//! Grouping engine.
//!
//! Maps raw per-location values of a grouping key variable to canonical
//! record numbers. Distinct key values are numbered 0..k-1 in sorted value
//! order, independent of the order in which they appear in the data, so two
//! processes computing record numbers from the same input always reach the
//! same mapping.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use ndarray::ArrayD;

use crate::store::VarData;

/// Default record numbering: each location is its own record, which
/// effectively disables grouping.
pub fn default_records(gnlocs: usize) -> Vec<usize> {
    (0..gnlocs).collect()
}

/// Assign record numbers from key values of an ordered kind.
///
/// Two passes: collect the sorted set of distinct values, then translate
/// every key to its position in that set.
pub fn records_from_keys<K: Ord + Clone>(keys: &[K]) -> Vec<usize> {
    let mut value_to_record: BTreeMap<K, usize> = BTreeMap::new();
    for key in keys {
        value_to_record.insert(key.clone(), 0);
    }
    for (record, (_, slot)) in value_to_record.iter_mut().enumerate() {
        *slot = record;
    }
    keys.iter().map(|key| value_to_record[key]).collect()
}

/// Float key with a total order, so float-valued grouping keys can use the
/// same sorted-distinct numbering as integer and text keys.
#[derive(Clone, Copy, Debug, PartialEq)]
struct TotalF32(f32);

impl Eq for TotalF32 {}

impl PartialOrd for TotalF32 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TotalF32 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Assign record numbers from a grouping key variable.
///
/// Supported key kinds: integer, float and text. The key array must be
/// one-dimensional with one entry per global location; text keys decoded
/// from fixed-width characters must be decoded before this call.
pub fn records_from_var(keys: &VarData) -> Result<Vec<usize>, crate::error::ObsDistError> {
    match keys {
        VarData::Int(values) => Ok(records_from_keys(&to_vec(values))),
        VarData::Float(values) => {
            let wrapped: Vec<TotalF32> = values.iter().map(|v| TotalF32(*v)).collect();
            Ok(records_from_keys(&wrapped))
        }
        VarData::Text(values) => Ok(records_from_keys(&to_vec(values))),
        other => Err(crate::error::ObsDistError::UnsupportedConversion {
            from: other.dtype().type_name(),
            to: "record numbers",
        }),
    }
}

fn to_vec<A: Clone>(array: &ArrayD<A>) -> Vec<A> {
    array.iter().cloned().collect()
}
