//! Utilities shared between test cases.

use ndarray::arr1;
use time::macros::datetime;

use crate::config::{ObsSpaceConfig, TimeWindow};
use crate::source::MemorySource;
use crate::store::VarData;

/// Six radiosonde observations from two stations, with one missing value and
/// three locations outside the [sample_window].
///
/// Station A occupies locations 0, 2 and 4; station B locations 1, 3 and 5.
/// The window retains global locations 2, 3 and 4.
pub fn sample_source() -> MemorySource {
    let mut source = MemorySource::new(6);
    source.insert(
        "MetaData",
        "datetime",
        VarData::Text(
            arr1(&[
                "2018-04-14T21:00:00Z".to_string(),
                "2018-04-15T00:00:00Z".to_string(),
                "2018-04-15T01:00:00Z".to_string(),
                "2018-04-15T02:00:00Z".to_string(),
                "2018-04-15T06:00:00Z".to_string(),
                "2018-04-15T09:00:00Z".to_string(),
            ])
            .into_dyn(),
        ),
    );
    source.insert(
        "MetaData",
        "station_id",
        VarData::Text(
            arr1(&[
                "A".to_string(),
                "B".to_string(),
                "A".to_string(),
                "B".to_string(),
                "A".to_string(),
                "B".to_string(),
            ])
            .into_dyn(),
        ),
    );
    source.insert(
        "MetaData",
        "longitude",
        VarData::Float(arr1(&[0.0_f32, 1.0, 2.0, 3.0, 4.0, 5.0]).into_dyn()),
    );
    source.insert(
        "MetaData",
        "latitude",
        VarData::Float(arr1(&[0.0_f32; 6]).into_dyn()),
    );
    source.insert(
        "MetaData",
        "air_pressure",
        VarData::Float(arr1(&[1000.0_f32, 950.0, 900.0, 800.0, 1000.0, 700.0]).into_dyn()),
    );
    source.insert(
        "ObsValue",
        "air_temperature",
        VarData::Float(arr1(&[270.0_f32, 271.0, 272.0, f32::MIN, 274.0, 275.0]).into_dyn()),
    );
    source.insert(
        "PreQC",
        "air_temperature",
        VarData::Float(arr1(&[0.0_f32, 0.0, 0.0, 1.0, 0.0, 0.0]).into_dyn()),
    );
    source
}

/// Six hour assimilation window matching [sample_source]: start exclusive at
/// midnight, end inclusive at 06:00.
pub fn sample_window() -> TimeWindow {
    TimeWindow::new(
        datetime!(2018-04-15 00:00 UTC),
        datetime!(2018-04-15 06:00 UTC),
    )
    .expect("sample window is valid")
}

/// Configuration grouping by station and sorting each record by descending
/// pressure, for the named distribution strategy.
pub fn sample_config(distribution: &str) -> ObsSpaceConfig {
    let distribution = match distribution {
        "halo" => {
            r#"{
                "name": "halo",
                "halo": {"centers": [[0.0, 0.0], [5.0, 0.0]], "radius": 10.0}
            }"#
            .to_string()
        }
        name => format!(r#"{{"name": "{name}"}}"#),
    };
    ObsSpaceConfig::from_json(&format!(
        r#"{{
            "name": "sondes",
            "distribution": {distribution},
            "obsgrouping": {{
                "group_variable": "station_id",
                "sort_variable": "air_pressure",
                "sort_order": "descending"
            }}
        }}"#
    ))
    .expect("sample configuration is valid")
}
