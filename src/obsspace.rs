//! The distributed observation space.
//!
//! An [ObsSpace] owns one process's share of a set of observations: the
//! partition decided by its distribution, the retained variable data, and
//! the record index used for per-record traversal. Construction runs the
//! full pipeline in order:
//!
//! 1. read the global location count and (optionally) the grouping variable,
//! 2. derive record numbers,
//! 3. create the distribution and evaluate record membership,
//! 4. apply the timing window to the retained locations,
//! 5. finalise the distribution (patch ownership, unique index),
//! 6. ingest every source variable, trimmed to the local partition,
//! 7. build the record index, sorted if configured.
//!
//! Steps 3 and 5 contain collectives, so every rank of the communicator must
//! construct the observation space together, from identical configuration.

use hashbrown::HashMap;
use tracing::{debug, info, warn};

use crate::comm::Communicator;
use crate::config::{ObsSpaceConfig, TimeWindow};
use crate::distribution::{create_distribution, Distribution, Point2};
use crate::error::ObsDistError;
use crate::grouping;
use crate::recidx::RecordIndex;
use crate::source::{parse_datetimes, ArraySink, ArraySource};
use crate::store::{ConversionWarnings, ObsStore, VarData};
use crate::types::{convert_numeric, DType};

use ndarray::ArrayD;
use time::OffsetDateTime;

/// One process's share of a distributed set of observations.
pub struct ObsSpace {
    name: String,
    window: TimeWindow,
    dist: Distribution,
    store: ObsStore,
    warnings: ConversionWarnings,
    recidx: RecordIndex,
    nvars: usize,
}

impl ObsSpace {
    /// Build an observation space from a source of global variables.
    ///
    /// Collective: every rank of `comm` must call this together with the
    /// same configuration and window.
    pub fn from_source(
        config: &ObsSpaceConfig,
        window: TimeWindow,
        comm: Communicator,
        source: &dyn ArraySource,
    ) -> Result<Self, ObsDistError> {
        let gnlocs = source.gnlocs();
        info!(
            name = config.name.as_str(),
            distribution = config.distribution.name.as_str(),
            rank = comm.rank(),
            size = comm.size(),
            gnlocs,
            "constructing observation space",
        );

        let records = match &config.obsgrouping.group_variable {
            Some(group_var) => {
                let keys = source.read("MetaData", group_var)?;
                Some(grouping::records_from_var(&keys)?)
            }
            None => None,
        };

        let geometry = if config.distribution.name == "halo" {
            let lon = read_coordinate(source, "longitude")?;
            let lat = read_coordinate(source, "latitude")?;
            Some(
                lon.iter()
                    .zip(&lat)
                    .map(|(&x, &y)| Point2::new(x, y))
                    .collect::<Vec<_>>(),
            )
        } else {
            None
        };

        let mut dist =
            create_distribution(&config.distribution, comm, gnlocs, records, geometry.as_deref())?;

        // Window filtering happens after partitioning so every rank trims
        // the same global locations.
        let datetimes = read_datetimes(source)?;
        if datetimes.len() != gnlocs {
            return Err(ObsDistError::InvalidConfig {
                reason: format!(
                    "datetime variable has {} entries for {} global locations",
                    datetimes.len(),
                    gnlocs
                ),
            });
        }
        let keep: Vec<bool> = dist
            .index()
            .iter()
            .map(|&loc| window.contains(datetimes[loc]))
            .collect();
        let outside = keep.iter().filter(|&&flag| !flag).count();
        if outside > 0 {
            warn!(
                name = config.name.as_str(),
                outside, "locations outside the timing window were discarded",
            );
        }
        dist.retain(&keep)?;
        dist.finalize()?;

        let mut store = ObsStore::new();
        let mut nvars = 0;
        for (group, name, _) in source.variables() {
            let full = source.read(&group, &name)?;
            let local = ingest(&dist, &group, &name, full, gnlocs)?;
            if group == "ObsValue" {
                nvars += 1;
            }
            store.store(&group, &name, local);
        }

        let warnings = ConversionWarnings::new();
        let recidx = match &config.obsgrouping.sort_variable {
            Some(sort_var) => {
                let keys: Vec<f32> = if sort_var == "datetime" {
                    let times = store.load_datetime("MetaData", "datetime")?;
                    datetime_sort_keys(&times, dist.recnum())
                } else {
                    store
                        .load_float("MetaData", sort_var, &warnings)?
                        .iter()
                        .copied()
                        .collect()
                };
                RecordIndex::build_sorted(dist.recnum(), &keys, config.obsgrouping.sort_order)?
            }
            None => RecordIndex::build(dist.recnum()),
        };

        debug!(
            name = config.name.as_str(),
            nlocs = dist.nlocs(),
            nrecs = dist.nrecs(),
            nvars,
            "observation space ready",
        );

        Ok(ObsSpace {
            name: config.name.clone(),
            window,
            dist,
            store,
            warnings,
            recidx,
            nvars,
        })
    }

    /// Observation space name from the configuration.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The timing window this space was filtered to.
    pub fn window(&self) -> TimeWindow {
        self.window
    }

    /// Number of global locations before partitioning and windowing.
    pub fn gnlocs(&self) -> usize {
        self.dist.gnlocs()
    }

    /// Number of locations retained on this process.
    pub fn nlocs(&self) -> usize {
        self.dist.nlocs()
    }

    /// Number of distinct records retained on this process.
    pub fn nrecs(&self) -> usize {
        self.dist.nrecs()
    }

    /// Number of simulated variables (the ObsValue group).
    pub fn nvars(&self) -> usize {
        self.nvars
    }

    /// Retained global location indices, in increasing original order.
    pub fn index(&self) -> &[usize] {
        self.dist.index()
    }

    /// Record number of each retained location, parallel to [Self::index].
    pub fn recnum(&self) -> &[usize] {
        self.dist.recnum()
    }

    /// The distribution, for collective statistics over this space.
    pub fn distribution(&self) -> &Distribution {
        &self.dist
    }

    /// The record index, for per-record traversal.
    pub fn recidx(&self) -> &RecordIndex {
        &self.recidx
    }

    /// Whether the (group, variable) combination is held locally.
    pub fn has(&self, group: &str, name: &str) -> bool {
        self.store.has(group, name)
    }

    /// Runtime element kind of a stored variable.
    pub fn dtype(&self, group: &str, name: &str) -> Result<DType, ObsDistError> {
        self.store.dtype(group, name)
    }

    /// Load a variable as integers.
    pub fn get_int(&self, group: &str, name: &str) -> Result<ArrayD<i32>, ObsDistError> {
        self.store.load_int(group, name, &self.warnings)
    }

    /// Load a variable as single precision floats.
    pub fn get_float(&self, group: &str, name: &str) -> Result<ArrayD<f32>, ObsDistError> {
        self.store.load_float(group, name, &self.warnings)
    }

    /// Load a variable as double precision floats.
    pub fn get_double(&self, group: &str, name: &str) -> Result<ArrayD<f64>, ObsDistError> {
        self.store.load_double(group, name, &self.warnings)
    }

    /// Load a text variable.
    pub fn get_text(&self, group: &str, name: &str) -> Result<ArrayD<String>, ObsDistError> {
        self.store.load_text(group, name)
    }

    /// Load a datetime variable.
    pub fn get_datetime(
        &self,
        group: &str,
        name: &str,
    ) -> Result<ArrayD<OffsetDateTime>, ObsDistError> {
        self.store.load_datetime(group, name)
    }

    /// Store an integer variable over the local partition.
    pub fn put_int(&mut self, group: &str, name: &str, data: ArrayD<i32>) {
        self.store.store(group, name, VarData::Int(data));
    }

    /// Store a single precision variable over the local partition.
    pub fn put_float(&mut self, group: &str, name: &str, data: ArrayD<f32>) {
        self.store.store(group, name, VarData::Float(data));
    }

    /// Store a double precision variable over the local partition.
    ///
    /// Doubles are narrowed to single precision at the store boundary, with
    /// missing sentinels remapped.
    pub fn put_double(&mut self, group: &str, name: &str, data: ArrayD<f64>) {
        self.store
            .store(group, name, VarData::Float(convert_numeric(&data)));
    }

    /// Store a text variable over the local partition.
    pub fn put_text(&mut self, group: &str, name: &str, data: ArrayD<String>) {
        self.store.store(group, name, VarData::Text(data));
    }

    /// Store a datetime variable over the local partition.
    pub fn put_datetime(&mut self, group: &str, name: &str, data: ArrayD<OffsetDateTime>) {
        self.store.store(group, name, VarData::DateTime(data));
    }

    /// Write every retained variable to a sink.
    pub fn save(&self, sink: &mut dyn ArraySink) -> Result<(), ObsDistError> {
        for (group, name, data) in self.store.iter() {
            sink.write(group, name, data)?;
        }
        Ok(())
    }
}

/// Trim one global variable to the local partition and apply the ingest
/// policy: datetime text is parsed, PreQC floats become integers, everything
/// else keeps its kind.
fn ingest(
    dist: &Distribution,
    group: &str,
    name: &str,
    full: VarData,
    gnlocs: usize,
) -> Result<VarData, ObsDistError> {
    let partition = dist.partition();
    let local = match full {
        VarData::Int(data) => VarData::Int(partition.project(&data, gnlocs)),
        VarData::Float(data) => {
            let local = partition.project(&data, gnlocs);
            if group == "PreQC" {
                // QC marks are integer flags; sources sometimes ship them as
                // floats.
                VarData::Int(convert_numeric(&local))
            } else {
                VarData::Float(local)
            }
        }
        VarData::Text(data) => {
            if group == "MetaData" && name == "datetime" {
                let parsed = parse_datetimes(&data)?;
                VarData::DateTime(partition.project(&parsed, gnlocs))
            } else {
                VarData::Text(partition.project(&data, gnlocs))
            }
        }
        VarData::DateTime(data) => VarData::DateTime(partition.project(&data, gnlocs)),
    };
    Ok(local)
}

/// Sort keys for a datetime sort variable: the seconds offset of each
/// location's time from the first observation of its record, in encounter
/// order.
fn datetime_sort_keys(times: &ArrayD<OffsetDateTime>, recnums: &[usize]) -> Vec<f32> {
    let mut first: HashMap<usize, OffsetDateTime> = HashMap::new();
    recnums
        .iter()
        .zip(times)
        .map(|(&recnum, &t)| {
            let start = *first.entry(recnum).or_insert(t);
            (t - start).as_seconds_f32()
        })
        .collect()
}

/// Read a geometry coordinate as double precision.
fn read_coordinate(source: &dyn ArraySource, name: &str) -> Result<Vec<f64>, ObsDistError> {
    match source.read("MetaData", name)? {
        VarData::Float(data) => Ok(data.iter().map(|&value| value as f64).collect()),
        VarData::Int(data) => Ok(data.iter().map(|&value| value as f64).collect()),
        other => Err(ObsDistError::UnsupportedConversion {
            from: other.dtype().type_name(),
            to: DType::Float64.type_name(),
        }),
    }
}

/// Read the per-location observation times, parsing from text if the source
/// stores them that way.
fn read_datetimes(source: &dyn ArraySource) -> Result<ArrayD<OffsetDateTime>, ObsDistError> {
    match source.read("MetaData", "datetime")? {
        VarData::DateTime(data) => Ok(data),
        VarData::Text(data) => parse_datetimes(&data),
        other => Err(ObsDistError::UnsupportedConversion {
            from: other.dtype().type_name(),
            to: DType::DateTime.type_name(),
        }),
    }
}
