//! Error handling.

use thiserror::Error;

/// Observation distribution error type
///
/// This type encapsulates the various errors that may occur. All of these are
/// fatal to the run: no operation in this crate is retried.
#[derive(Debug, Error)]
pub enum ObsDistError {
    /// Requested distribution name is not registered with the factory
    #[error("unknown distribution name {name}")]
    UnknownDistribution { name: String },

    /// Malformed configuration (bad sort order, halo parameters, ...)
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Vector length mismatch in a dot product
    #[error("dot product vector lengths differ ({left} != {right})")]
    DotProductLength { left: usize, right: usize },

    /// A per-location vector whose length is not a multiple of nlocs
    #[error("vector of length {len} is not a multiple of nlocs ({nlocs})")]
    VectorNotPerLocation { len: usize, nlocs: usize },

    /// Unsupported conversion between stored element kinds
    #[error("unsupported conversion from {from} to {to}")]
    UnsupportedConversion {
        from: &'static str,
        to: &'static str,
    },

    /// Requested record id is absent from the sorted record index
    #[error("record number {recnum} does not exist in the record index")]
    RecordNotFound { recnum: usize },

    /// Requested variable is absent from the observation store
    #[error("variable {name} @ {group} not found")]
    VariableNotFound { group: String, name: String },

    /// A geometry-aware distribution was requested without location geometry
    #[error("distribution {name} requires longitude/latitude geometry")]
    MissingGeometry { name: &'static str },

    /// Datetime metadata stored as text failed to parse
    #[error("cannot parse datetime value {value:?}")]
    InvalidDateTime { value: String },

    /// A retained-location flag vector of the wrong length
    #[error("timing window flags have length {len}, expected nlocs ({nlocs})")]
    WindowFlagsLength { len: usize, nlocs: usize },

    /// The partition was mutated after finalisation
    #[error("partition is already finalised")]
    AlreadyFinalized,

    /// A collective operation was invoked before finalisation
    #[error("distribution must be finalised before collective operations")]
    NotFinalized,
}
