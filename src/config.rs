//! Configuration for an observation space.
//!
//! Configuration is deserialised with serde (typically from JSON) and
//! validated before use. Validation failures are fatal: a malformed
//! configuration aborts construction of the observation space.

use serde::Deserialize;
use time::OffsetDateTime;
use validator::{Validate, ValidationError};

use crate::error::ObsDistError;

/// Order applied by the sorted-group index builder.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest sort key first
    #[default]
    Ascending,
    /// Largest sort key first
    Descending,
}

/// Parameters of the geometry-aware halo distribution.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct HaloConfig {
    /// Region centre per rank, as (longitude, latitude) pairs. Must hold one
    /// entry per rank of the communicator the distribution is created with.
    #[validate(length(min = 1, message = "halo centres must not be empty"))]
    pub centers: Vec<(f64, f64)>,
    /// Halo radius around each centre, in the units of the centre plane.
    #[validate(range(min = 0.0, message = "halo radius must not be negative"))]
    pub radius: f64,
}

/// Distribution strategy selection.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_distribution_config"))]
pub struct DistributionConfig {
    /// Strategy name for the factory lookup: "replicated", "round-robin" or
    /// "halo".
    pub name: String,
    /// Halo parameters; required iff `name` is "halo".
    #[validate]
    #[serde(default)]
    pub halo: Option<HaloConfig>,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        DistributionConfig {
            name: "round-robin".to_string(),
            halo: None,
        }
    }
}

fn validate_distribution_config(config: &DistributionConfig) -> Result<(), ValidationError> {
    if config.name == "halo" && config.halo.is_none() {
        return Err(ValidationError::new(
            "halo distribution requires a halo parameter block",
        ));
    }
    Ok(())
}

/// Record grouping and per-record traversal order.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupingConfig {
    /// Metadata variable whose distinct values define records. Empty disables
    /// grouping: each location becomes its own record.
    #[serde(default)]
    pub group_variable: Option<String>,
    /// Metadata variable supplying the numeric per-record sort key. Empty
    /// disables the sorted-group index.
    #[serde(default)]
    pub sort_variable: Option<String>,
    /// Sort direction for the sorted-group index.
    #[serde(default)]
    pub sort_order: SortOrder,
}

/// Top level observation space configuration.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ObsSpaceConfig {
    /// Observation space name, used in diagnostics.
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    /// Distribution strategy. Defaults to round-robin.
    #[validate]
    #[serde(default)]
    pub distribution: DistributionConfig,
    /// Record grouping and sorting.
    #[serde(default)]
    pub obsgrouping: GroupingConfig,
}

impl ObsSpaceConfig {
    /// Deserialise and validate a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ObsDistError> {
        let config: ObsSpaceConfig =
            serde_json::from_str(text).map_err(|err| ObsDistError::InvalidConfig {
                reason: err.to_string(),
            })?;
        config.validate().map_err(|err| ObsDistError::InvalidConfig {
            reason: err.to_string(),
        })?;
        Ok(config)
    }
}

/// Half-open timing window over observation times.
///
/// An observation at time `t` is retained iff `start < t <= end`: the window
/// start is exclusive and the end inclusive. An inverted window (start after
/// end) is rejected at construction and deserialisation.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(try_from = "RawTimeWindow")]
pub struct TimeWindow {
    start: OffsetDateTime,
    end: OffsetDateTime,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTimeWindow {
    #[serde(with = "time::serde::rfc3339")]
    start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    end: OffsetDateTime,
}

impl TryFrom<RawTimeWindow> for TimeWindow {
    type Error = ObsDistError;

    fn try_from(raw: RawTimeWindow) -> Result<Self, Self::Error> {
        TimeWindow::new(raw.start, raw.end)
    }
}

impl TimeWindow {
    /// Return a new TimeWindow. Fails if `start` is after `end`.
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> Result<Self, ObsDistError> {
        if start > end {
            return Err(ObsDistError::InvalidConfig {
                reason: format!("timing window start {start} is after end {end}"),
            });
        }
        Ok(TimeWindow { start, end })
    }

    /// Window start (exclusive).
    pub fn start(&self) -> OffsetDateTime {
        self.start
    }

    /// Window end (inclusive).
    pub fn end(&self) -> OffsetDateTime {
        self.end
    }

    /// Whether `t` falls inside the window.
    pub fn contains(&self, t: OffsetDateTime) -> bool {
        self.start < t && t <= self.end
    }
}
