//! Record index: per-record location lists with optional in-record sorting.
//!
//! The index maps each retained record number to the local location indices
//! belonging to it, in record-number order. When a sort variable is
//! configured, the locations within each record are reordered by its value,
//! ascending or descending; ties keep their original relative order so the
//! traversal is reproducible.

use std::collections::BTreeMap;

use crate::config::SortOrder;
use crate::error::ObsDistError;

/// Locations of each retained record, keyed by record number.
#[derive(Debug, Default)]
pub struct RecordIndex {
    groups: BTreeMap<usize, Vec<usize>>,
}

impl RecordIndex {
    /// Build the index from the per-location record numbers, keeping
    /// locations within each record in encounter order.
    pub fn build(recnums: &[usize]) -> Self {
        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (loc, &recnum) in recnums.iter().enumerate() {
            groups.entry(recnum).or_default().push(loc);
        }
        RecordIndex { groups }
    }

    /// Build the index and sort each record's locations by its sort key.
    ///
    /// `keys` holds one sort key per location, parallel to `recnums`. The
    /// sort is stable, so equal keys preserve encounter order in either
    /// direction.
    pub fn build_sorted(
        recnums: &[usize],
        keys: &[f32],
        order: SortOrder,
    ) -> Result<Self, ObsDistError> {
        if keys.len() != recnums.len() {
            return Err(ObsDistError::VectorNotPerLocation {
                len: keys.len(),
                nlocs: recnums.len(),
            });
        }
        let mut index = Self::build(recnums);
        for locations in index.groups.values_mut() {
            match order {
                SortOrder::Ascending => {
                    locations.sort_by(|&a, &b| keys[a].total_cmp(&keys[b]));
                }
                SortOrder::Descending => {
                    locations.sort_by(|&a, &b| keys[b].total_cmp(&keys[a]));
                }
            }
        }
        Ok(index)
    }

    /// Number of records in the index.
    pub fn nrecs(&self) -> usize {
        self.groups.len()
    }

    /// Locations of one record, in the configured traversal order.
    pub fn locations(&self, recnum: usize) -> Result<&[usize], ObsDistError> {
        self.groups
            .get(&recnum)
            .map(Vec::as_slice)
            .ok_or(ObsDistError::RecordNotFound { recnum })
    }

    /// Whether the record exists in the index.
    pub fn has(&self, recnum: usize) -> bool {
        self.groups.contains_key(&recnum)
    }

    /// Iterate over (record number, locations) in record-number order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[usize])> {
        self.groups
            .iter()
            .map(|(&recnum, locations)| (recnum, locations.as_slice()))
    }
}
