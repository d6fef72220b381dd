//! Distributed observation space partitioning.
//!
//! This crate partitions a set of geolocated, timestamped observations
//! across the ranks of a communicator. Observations are grouped into records
//! that move between ranks as a unit, filtered to an assimilation timing
//! window, and stored locally with a re-indexed view of the surviving
//! locations. Collective statistics (dot products, non-missing counts,
//! gathers) remain correct when a location is resident on more than one
//! rank, by reducing only over each location's patch owner.
//!
//! The entry point is [obsspace::ObsSpace], built from an
//! [source::ArraySource] and an [config::ObsSpaceConfig]. Distribution
//! strategies live in [distribution]; the communicator abstraction in
//! [comm].

pub mod comm;
pub mod config;
pub mod distribution;
pub mod error;
pub mod grouping;
pub mod obsspace;
pub mod partition;
pub mod recidx;
pub mod source;
pub mod store;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod types;
