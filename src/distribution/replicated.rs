//! Fully replicated distribution.
//!
//! Every process's halo is the full global location set, so no data movement
//! is ever needed: reductions are computed directly from local data with no
//! collective combination. Rank 0 is the sole patch owner by convention;
//! tests rely on this exact choice, so it is fixed rather than configurable.

/// Distribution placing a copy of every observation on every process.
#[derive(Debug, Default)]
pub struct Replicated;

impl Replicated {
    /// Factory name of this strategy.
    pub const NAME: &'static str = "replicated";

    /// Every record is resident on every process.
    pub fn is_my_record(&self, _recnum: usize) -> bool {
        true
    }
}
