//! Distribution strategies and dedup-aware collective operations.
//!
//! A [Distribution] decides which records a process retains and provides the
//! collective statistics that stay correct when a location is resident on
//! more than one process. Strategies form a closed set selected by name at
//! construction:
//!
//! * [replicated](replicated::Replicated): every process holds everything;
//! * [round-robin](round_robin::RoundRobin): records dealt cyclically, no
//!   overlap;
//! * [halo](halo::Halo): geometric regions with overlapping margins.
//!
//! Construction evaluates the membership predicate over all global
//! locations; the caller then applies the timing-window trim (if any) and
//! invokes [Distribution::finalize] exactly once. After finalisation the
//! partition is immutable and the collective operations become available.
//!
//! Collective-call discipline: `finalize`, `dot_product`,
//! `global_num_non_missing_obs`, `all_reduce_in_place` and `all_gather_v`
//! must be invoked by every rank the same number of times, in the same
//! order, with shape-compatible arguments. A rank that stops participating
//! stalls the others indefinitely.

pub mod halo;
pub mod replicated;
pub mod round_robin;

use hashbrown::HashMap;
use tracing::debug;

use crate::comm::{CommElement, CommValue, Communicator, ReduceOp};
use crate::config::DistributionConfig;
use crate::error::ObsDistError;
use crate::grouping;
use crate::partition::LocalPartition;
use crate::types::{MissingValue, NumericElement};

use halo::Halo;
use replicated::Replicated;
use round_robin::RoundRobin;

/// A position in the 2-D geometry plane, as (longitude, latitude).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point2 {
    /// First coordinate
    pub lon: f64,
    /// Second coordinate
    pub lat: f64,
}

impl Point2 {
    /// Return a new Point2.
    pub fn new(lon: f64, lat: f64) -> Self {
        Point2 { lon, lat }
    }

    /// Euclidean distance in the coordinate plane.
    pub fn distance(&self, other: &Point2) -> f64 {
        let dlon = self.lon - other.lon;
        let dlat = self.lat - other.lat;
        (dlon * dlon + dlat * dlat).sqrt()
    }
}

/// Closed set of strategy variants.
enum Strategy {
    Replicated(Replicated),
    RoundRobin(RoundRobin),
    Halo(Halo),
}

impl Strategy {
    fn name(&self) -> &'static str {
        match self {
            Strategy::Replicated(_) => Replicated::NAME,
            Strategy::RoundRobin(_) => RoundRobin::NAME,
            Strategy::Halo(_) => Halo::NAME,
        }
    }

    fn is_my_record(&self, recnum: usize) -> bool {
        match self {
            Strategy::Replicated(dist) => dist.is_my_record(recnum),
            Strategy::RoundRobin(dist) => dist.is_my_record(recnum),
            Strategy::Halo(dist) => dist.is_my_record(recnum),
        }
    }
}

/// A finalisable partition of the global location set with dedup-aware
/// collective operations.
pub struct Distribution {
    comm: Communicator,
    gnlocs: usize,
    strategy: Strategy,
    partition: LocalPartition,
    patch: Vec<bool>,
    unique_index: Vec<usize>,
    finalized: bool,
}

/// Create a distribution by factory name and evaluate its partition.
///
/// `records` maps every global location to its record number; `None` makes
/// each location its own record. Geometry (one point per global location) is
/// required by geometry-aware strategies and ignored by the others.
///
/// An unrecognised strategy name is fatal.
pub fn create_distribution(
    config: &DistributionConfig,
    comm: Communicator,
    gnlocs: usize,
    records: Option<Vec<usize>>,
    geometry: Option<&[Point2]>,
) -> Result<Distribution, ObsDistError> {
    let records = records.unwrap_or_else(|| grouping::default_records(gnlocs));
    if records.len() != gnlocs {
        return Err(ObsDistError::InvalidConfig {
            reason: format!(
                "record numbers cover {} locations, expected {}",
                records.len(),
                gnlocs
            ),
        });
    }

    let strategy = match config.name.as_str() {
        Replicated::NAME => Strategy::Replicated(Replicated),
        RoundRobin::NAME => Strategy::RoundRobin(RoundRobin::new(comm.rank(), comm.size())),
        Halo::NAME => {
            let params = config.halo.as_ref().ok_or_else(|| ObsDistError::InvalidConfig {
                reason: "halo distribution requires a halo parameter block".to_string(),
            })?;
            if params.centers.len() != comm.size() {
                return Err(ObsDistError::InvalidConfig {
                    reason: format!(
                        "halo has {} centres for {} ranks",
                        params.centers.len(),
                        comm.size()
                    ),
                });
            }
            let geometry = geometry.ok_or(ObsDistError::MissingGeometry { name: Halo::NAME })?;
            if geometry.len() != gnlocs {
                return Err(ObsDistError::MissingGeometry { name: Halo::NAME });
            }
            let (lon, lat) = params.centers[comm.rank()];
            let mut dist = Halo::new(Point2::new(lon, lat), params.radius);
            for (loc, point) in geometry.iter().enumerate() {
                dist.assign_record(records[loc], loc, *point);
            }
            Strategy::Halo(dist)
        }
        other => {
            return Err(ObsDistError::UnknownDistribution {
                name: other.to_string(),
            })
        }
    };

    let partition = LocalPartition::build(&records, |recnum| strategy.is_my_record(recnum));
    debug!(
        name = strategy.name(),
        rank = comm.rank(),
        gnlocs,
        nlocs = partition.nlocs(),
        nrecs = partition.nrecs(),
        "distribution constructed",
    );

    Ok(Distribution {
        comm,
        gnlocs,
        strategy,
        partition,
        patch: Vec::new(),
        unique_index: Vec::new(),
        finalized: false,
    })
}

impl Distribution {
    /// Strategy identifier, as registered with the factory.
    pub fn name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Global location count this distribution partitions.
    pub fn gnlocs(&self) -> usize {
        self.gnlocs
    }

    /// Number of retained locations on this process.
    pub fn nlocs(&self) -> usize {
        self.partition.nlocs()
    }

    /// Number of distinct records among retained locations.
    pub fn nrecs(&self) -> usize {
        self.partition.nrecs()
    }

    /// Retained global location indices, in increasing original order.
    pub fn index(&self) -> &[usize] {
        self.partition.index()
    }

    /// Record number of each retained location, parallel to [Self::index].
    pub fn recnum(&self) -> &[usize] {
        self.partition.recnums()
    }

    /// The local partition.
    pub fn partition(&self) -> &LocalPartition {
        &self.partition
    }

    /// Strategy membership predicate for one record.
    pub fn is_my_record(&self, recnum: usize) -> bool {
        self.strategy.is_my_record(recnum)
    }

    /// Drop retained locations whose flag is false (the timing-window trim).
    /// Only legal before finalisation.
    pub fn retain(&mut self, keep: &[bool]) -> Result<(), ObsDistError> {
        if self.finalized {
            return Err(ObsDistError::AlreadyFinalized);
        }
        self.partition.retain(keep)
    }

    /// Compute patch ownership and the global unique location index.
    ///
    /// Must be called exactly once, after any timing-window trim and before
    /// any collective operation. Collective for every strategy except
    /// `replicated` (whose patch assignment needs no global information).
    pub fn finalize(&mut self) -> Result<(), ObsDistError> {
        if self.finalized {
            return Err(ObsDistError::AlreadyFinalized);
        }
        let nlocs = self.partition.nlocs();
        match &self.strategy {
            Strategy::Replicated(_) => {
                // Full data is resident everywhere; rank 0 owns all of it.
                self.patch = vec![self.comm.rank() == 0; nlocs];
                self.unique_index = (0..nlocs).collect();
            }
            Strategy::RoundRobin(_) => {
                // Disjoint halos: every retained location is patch.
                self.patch = vec![true; nlocs];
                self.unique_index = self.compute_unique_index();
            }
            Strategy::Halo(_) => {
                // Overlapping halos: lowest rank claiming a location owns it.
                let mut owner = vec![usize::MAX; self.gnlocs];
                for &loc in self.partition.index() {
                    owner[loc] = self.comm.rank();
                }
                self.comm.all_reduce(&mut owner, ReduceOp::Min);
                self.patch = self
                    .partition
                    .index()
                    .iter()
                    .map(|&loc| owner[loc] == self.comm.rank())
                    .collect();
                self.unique_index = self.compute_unique_index();
            }
        }
        self.finalized = true;
        debug!(
            name = self.strategy.name(),
            rank = self.comm.rank(),
            npatch = self.patch.iter().filter(|&&p| p).count(),
            "distribution finalised",
        );
        Ok(())
    }

    /// Map patch-owned locations to their positions in gathered output.
    ///
    /// Gathers every rank's patch-owned global location indices in rank
    /// order; a local location's unique index is the position of its global
    /// location in that concatenation, whichever rank owns it.
    fn compute_unique_index(&self) -> Vec<usize> {
        let patch_globals: Vec<usize> = self
            .partition
            .index()
            .iter()
            .zip(&self.patch)
            .filter(|(_, &is_patch)| is_patch)
            .map(|(&loc, _)| loc)
            .collect();
        let all_patch = self.comm.all_gather_v(&patch_globals);
        let positions: HashMap<usize, usize> = all_patch
            .iter()
            .enumerate()
            .map(|(pos, &loc)| (loc, pos))
            .collect();
        self.partition
            .index()
            .iter()
            .map(|loc| {
                *positions
                    .get(loc)
                    .expect("halo location without a patch owner")
            })
            .collect()
    }

    /// Fill one patch flag per retained location.
    ///
    /// For a global location resident in the halos of several processes,
    /// exactly one of them reports true.
    pub fn patch_obs(&self, out: &mut [bool]) -> Result<(), ObsDistError> {
        self.check_finalized()?;
        if out.len() != self.patch.len() {
            return Err(ObsDistError::VectorNotPerLocation {
                len: out.len(),
                nlocs: self.patch.len(),
            });
        }
        out.copy_from_slice(&self.patch);
        Ok(())
    }

    /// Global dot product of two per-location vectors.
    ///
    /// Entries where either value equals the missing sentinel are excluded.
    /// Vectors may interleave several variables (`v[iloc * nvars + ivar]`);
    /// duplicated locations contribute exactly once globally, through their
    /// patch owner. Length mismatch is fatal.
    pub fn dot_product<T: NumericElement>(&self, v1: &[T], v2: &[T]) -> Result<f64, ObsDistError> {
        self.check_finalized()?;
        if v1.len() != v2.len() {
            return Err(ObsDistError::DotProductLength {
                left: v1.len(),
                right: v2.len(),
            });
        }
        let nvars = self.vars_per_location(v1.len())?;
        let local_only = matches!(self.strategy, Strategy::Replicated(_));
        let mut zz = 0.0_f64;
        for (jj, (a, b)) in v1.iter().zip(v2).enumerate() {
            if !local_only && !self.patch[jj / nvars] {
                continue;
            }
            if a.is_missing() || b.is_missing() {
                continue;
            }
            zz += as_f64(*a) * as_f64(*b);
        }
        if !local_only {
            self.comm.all_reduce_scalar(&mut zz, ReduceOp::Sum);
        }
        Ok(zz)
    }

    /// Global count of entries not equal to the missing sentinel, with each
    /// unique global location counted at most once.
    pub fn global_num_non_missing_obs<T>(&self, v: &[T]) -> Result<usize, ObsDistError>
    where
        T: MissingValue + Clone,
    {
        self.check_finalized()?;
        let nvars = self.vars_per_location(v.len())?;
        let local_only = matches!(self.strategy, Strategy::Replicated(_));
        let mut nobs = 0_usize;
        for (jj, value) in v.iter().enumerate() {
            if !local_only && !self.patch[jj / nvars] {
                continue;
            }
            if !value.is_missing() {
                nobs += 1;
            }
        }
        if !local_only {
            self.comm.all_reduce_scalar(&mut nobs, ReduceOp::Sum);
        }
        Ok(nobs)
    }

    /// Combine a per-process vector into one vector known to all processes.
    pub fn all_reduce_in_place<T: CommElement>(&self, x: &mut [T], op: ReduceOp) {
        self.comm.all_reduce(x, op);
    }

    /// Combine a per-process scalar into one value known to all processes.
    pub fn all_reduce_scalar_in_place<T: CommElement>(&self, x: &mut T, op: ReduceOp) {
        self.comm.all_reduce_scalar(x, op);
    }

    /// Concatenate per-process vectors, rank-ordered, with duplicated
    /// locations included exactly once (the patch owner's entry). Every
    /// process receives identical output.
    pub fn all_gather_v<T: CommValue>(&self, x: &[T]) -> Result<Vec<T>, ObsDistError> {
        self.check_finalized()?;
        if x.len() != self.partition.nlocs() {
            return Err(ObsDistError::VectorNotPerLocation {
                len: x.len(),
                nlocs: self.partition.nlocs(),
            });
        }
        match self.strategy {
            // Already globally complete and identical on every rank.
            Strategy::Replicated(_) => Ok(x.to_vec()),
            _ => {
                let patch_entries: Vec<T> = x
                    .iter()
                    .zip(&self.patch)
                    .filter(|(_, &is_patch)| is_patch)
                    .map(|(value, _)| value.clone())
                    .collect();
                Ok(self.comm.all_gather_v(&patch_entries))
            }
        }
    }

    /// Position of a local location's unique entry in [Self::all_gather_v]
    /// output.
    ///
    /// Composing `all_gather_v(x)` with this index recovers, for every local
    /// location, the value this process (or the duplicate's patch owner)
    /// supplied.
    pub fn global_unique_consecutive_location_index(
        &self,
        loc: usize,
    ) -> Result<usize, ObsDistError> {
        self.check_finalized()?;
        Ok(self.unique_index[loc])
    }

    fn check_finalized(&self) -> Result<(), ObsDistError> {
        if self.finalized {
            Ok(())
        } else {
            Err(ObsDistError::NotFinalized)
        }
    }

    /// Number of interleaved variables in a per-location vector.
    fn vars_per_location(&self, len: usize) -> Result<usize, ObsDistError> {
        let nlocs = self.partition.nlocs();
        if nlocs == 0 {
            return Ok(1);
        }
        if len % nlocs != 0 {
            return Err(ObsDistError::VectorNotPerLocation { len, nlocs });
        }
        Ok(len / nlocs)
    }
}

fn as_f64<T: NumericElement>(value: T) -> f64 {
    value
        .to_f64()
        .expect("numeric element representable as f64")
}
