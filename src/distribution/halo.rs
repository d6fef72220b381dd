//! Geometry-based halo distribution.
//!
//! Each rank owns a circular region of the 2-D point plane. A record belongs
//! to a rank's halo when any of its locations lies within the region, so
//! records near region boundaries are duplicated on several ranks. Patch
//! ownership of the duplicated locations is settled collectively at finalise
//! time (lowest rank wins).

use hashbrown::HashSet;

use super::Point2;

/// Distribution retaining records within a radius of a per-rank centre.
#[derive(Debug)]
pub struct Halo {
    center: Point2,
    radius: f64,
    my_records: HashSet<usize>,
}

impl Halo {
    /// Factory name of this strategy.
    pub const NAME: &'static str = "halo";

    /// Return a new Halo for the region around `center`.
    pub fn new(center: Point2, radius: f64) -> Self {
        Halo {
            center,
            radius,
            my_records: HashSet::new(),
        }
    }

    /// Register one (record, location, position) triple.
    ///
    /// Must be called for every candidate pair before [Self::is_my_record]
    /// is trusted: membership is decided from the registered positions, and
    /// one in-range location pulls the record's entire halo onto this rank.
    pub fn assign_record(&mut self, recnum: usize, _locnum: usize, point: Point2) {
        if self.center.distance(&point) <= self.radius {
            self.my_records.insert(recnum);
        }
    }

    /// Membership by registered region overlap.
    pub fn is_my_record(&self, recnum: usize) -> bool {
        self.my_records.contains(&recnum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_with_one_location_in_range_is_kept() {
        let mut dist = Halo::new(Point2::new(0.0, 0.0), 10.0);
        dist.assign_record(5, 0, Point2::new(20.0, 0.0));
        assert!(!dist.is_my_record(5));
        // A second location of the same record falls inside the region.
        dist.assign_record(5, 1, Point2::new(3.0, 4.0));
        assert!(dist.is_my_record(5));
    }

    #[test]
    fn boundary_is_inclusive() {
        let mut dist = Halo::new(Point2::new(0.0, 0.0), 5.0);
        dist.assign_record(0, 0, Point2::new(3.0, 4.0));
        assert!(dist.is_my_record(0));
    }

    #[test]
    fn unassigned_record_is_not_mine() {
        let dist = Halo::new(Point2::new(0.0, 0.0), 5.0);
        assert!(!dist.is_my_record(7));
    }
}
