//! Round-robin distribution.
//!
//! Records are dealt out cyclically by record number, so processes hold
//! disjoint halos and every location is its own patch owner.

/// Distribution assigning record `r` to rank `r % size`.
#[derive(Debug)]
pub struct RoundRobin {
    rank: usize,
    size: usize,
}

impl RoundRobin {
    /// Factory name of this strategy.
    pub const NAME: &'static str = "round-robin";

    /// Return a new RoundRobin for the calling rank.
    pub fn new(rank: usize, size: usize) -> Self {
        RoundRobin { rank, size }
    }

    /// Membership by record number modulo process count.
    pub fn is_my_record(&self, recnum: usize) -> bool {
        recnum % self.size == self.rank
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deal_is_cyclic() {
        let dist = RoundRobin::new(1, 3);
        assert!(!dist.is_my_record(0));
        assert!(dist.is_my_record(1));
        assert!(!dist.is_my_record(2));
        assert!(dist.is_my_record(4));
    }

    #[test]
    fn ranks_are_disjoint_and_cover() {
        let size = 4;
        for recnum in 0..20 {
            let owners = (0..size)
                .filter(|&rank| RoundRobin::new(rank, size).is_my_record(recnum))
                .count();
            assert_eq!(1, owners);
        }
    }
}
