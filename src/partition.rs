//! Local partition of the global location set.
//!
//! The partition evaluator scans all global locations in original order and
//! retains those whose record satisfies a distribution strategy's membership
//! predicate. The result is a pair of parallel arrays: the retained global
//! location indices and their record numbers. The distributed re-indexer
//! then projects any per-location array onto the retained indices.

use hashbrown::HashSet;
use ndarray::{ArrayD, Axis};

use crate::error::ObsDistError;

/// Ordered set of locations retained on one process.
///
/// `index` holds retained global location indices in increasing original
/// order; `recnums` holds the record number of each retained location.
/// The two arrays always have equal length (the local `nlocs`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocalPartition {
    index: Vec<usize>,
    recnums: Vec<usize>,
    nrecs: usize,
}

impl LocalPartition {
    /// Evaluate a membership predicate over all global locations.
    ///
    /// `records` maps every global location to its record number; `keep` is
    /// the strategy's record membership predicate, evaluated once per
    /// location in original order.
    pub fn build<F>(records: &[usize], mut keep: F) -> Self
    where
        F: FnMut(usize) -> bool,
    {
        let mut index = Vec::new();
        let mut recnums = Vec::new();
        for (loc, &recnum) in records.iter().enumerate() {
            if keep(recnum) {
                index.push(loc);
                recnums.push(recnum);
            }
        }
        let mut partition = LocalPartition {
            index,
            recnums,
            nrecs: 0,
        };
        partition.recount_records();
        partition
    }

    /// Number of retained locations on this process.
    pub fn nlocs(&self) -> usize {
        self.index.len()
    }

    /// Number of distinct records among retained locations.
    pub fn nrecs(&self) -> usize {
        self.nrecs
    }

    /// Retained global location indices, in increasing original order.
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    /// Record number of each retained location, parallel to [Self::index].
    pub fn recnums(&self) -> &[usize] {
        &self.recnums
    }

    /// Drop retained locations whose flag is false, rebuilding the index and
    /// record arrays in place and recomputing the local counts.
    ///
    /// Used by the timing-window filter, which runs strictly after
    /// partitioning so that grouping decisions see complete record
    /// membership.
    pub fn retain(&mut self, keep: &[bool]) -> Result<(), ObsDistError> {
        if keep.len() != self.index.len() {
            return Err(ObsDistError::WindowFlagsLength {
                len: keep.len(),
                nlocs: self.index.len(),
            });
        }
        let mut slot = 0;
        for pos in 0..self.index.len() {
            if keep[pos] {
                self.index[slot] = self.index[pos];
                self.recnums[slot] = self.recnums[pos];
                slot += 1;
            }
        }
        self.index.truncate(slot);
        self.recnums.truncate(slot);
        self.recount_records();
        Ok(())
    }

    /// Project a raw array onto the retained locations.
    ///
    /// Arrays whose leading dimension equals the global location count are
    /// per-location data: their retained rows are selected in local order,
    /// preserving trailing dimensions. Anything else (scalars, fixed-shape
    /// metadata) passes through unchanged.
    pub fn project<A: Clone>(&self, full: &ArrayD<A>, gnlocs: usize) -> ArrayD<A> {
        if full.shape().first() == Some(&gnlocs) {
            full.select(Axis(0), &self.index)
        } else {
            full.clone()
        }
    }

    fn recount_records(&mut self) {
        let distinct: HashSet<usize> = self.recnums.iter().copied().collect();
        self.nrecs = distinct.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::{arr1, arr2};

    #[test]
    fn build_retains_in_original_order() {
        // Records 0 and 2 are kept; record 1 is not.
        let records = vec![0, 1, 2, 0, 1, 2];
        let partition = LocalPartition::build(&records, |recnum| recnum != 1);
        assert_eq!(&[0, 2, 3, 5], partition.index());
        assert_eq!(&[0, 2, 0, 2], partition.recnums());
        assert_eq!(4, partition.nlocs());
        assert_eq!(2, partition.nrecs());
    }

    #[test]
    fn retain_rebuilds_counts() {
        let records = vec![0, 0, 1, 2];
        let mut partition = LocalPartition::build(&records, |_| true);
        partition.retain(&[true, false, false, true]).unwrap();
        assert_eq!(&[0, 3], partition.index());
        assert_eq!(&[0, 2], partition.recnums());
        assert_eq!(2, partition.nlocs());
        assert_eq!(2, partition.nrecs());
    }

    #[test]
    fn retain_length_mismatch_is_fatal() {
        let mut partition = LocalPartition::build(&[0, 1], |_| true);
        assert!(matches!(
            partition.retain(&[true]),
            Err(ObsDistError::WindowFlagsLength { .. })
        ));
    }

    #[test]
    fn project_selects_leading_dimension() {
        let partition = LocalPartition::build(&[0, 1, 2, 3], |recnum| recnum % 2 == 1);
        let full = arr1(&[10.0_f32, 11.0, 12.0, 13.0]).into_dyn();
        let local = partition.project(&full, 4);
        assert_eq!(vec![11.0, 13.0], local.iter().copied().collect::<Vec<_>>());
    }

    #[test]
    fn project_preserves_trailing_dimensions() {
        let partition = LocalPartition::build(&[0, 1, 2], |recnum| recnum != 1);
        let full = arr2(&[[1, 2], [3, 4], [5, 6]]).into_dyn();
        let local = partition.project(&full, 3);
        assert_eq!(vec![2, 2], local.shape().to_vec());
        assert_eq!(vec![1, 2, 5, 6], local.iter().copied().collect::<Vec<_>>());
    }

    #[test]
    fn project_passes_through_fixed_shape() {
        let partition = LocalPartition::build(&[0, 1, 2], |recnum| recnum == 0);
        // Leading dimension is not the global location count.
        let full = arr1(&[7, 8]).into_dyn();
        let local = partition.project(&full, 3);
        assert_eq!(full, local);
    }

    #[test]
    fn project_strings() {
        let partition = LocalPartition::build(&[0, 1, 2], |recnum| recnum != 0);
        let full = arr1(&["a".to_string(), "b".to_string(), "c".to_string()]).into_dyn();
        let local = partition.project(&full, 3);
        assert_eq!(
            vec!["b".to_string(), "c".to_string()],
            local.iter().cloned().collect::<Vec<_>>()
        );
    }
}
