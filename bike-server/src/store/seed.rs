//! Bulk station source.
//!
//! Seed files are JSON arrays of station records. Both the JCDecaux feed
//! shape (`last_update` in Unix milliseconds, no `id`) and the extended
//! shape written by this service (`id`, `last_update_utc`,
//! `last_update_local`) are accepted.

use std::path::Path;

use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::Deserialize;

use crate::domain::{DEFAULT_STATUS, Position, Station};

use super::error::StoreError;

/// One record as it appears in a seed file.
#[derive(Debug, Deserialize)]
struct SeedRecord {
    #[serde(default)]
    id: Option<String>,
    number: i32,
    #[serde(default)]
    contract_name: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    position: Option<Position>,
    #[serde(default)]
    banking: bool,
    #[serde(default)]
    bonus: bool,
    #[serde(default)]
    bike_stands: i32,
    #[serde(default)]
    available_bike_stands: i32,
    #[serde(default)]
    available_bikes: i32,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    last_update: Option<i64>,
    #[serde(default)]
    last_update_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    last_update_local: Option<DateTime<FixedOffset>>,
}

impl SeedRecord {
    fn into_station(self, loaded_at: DateTime<Utc>) -> Station {
        let utc = self
            .last_update_utc
            .or_else(|| self.last_update.and_then(DateTime::from_timestamp_millis))
            .unwrap_or(loaded_at);
        let local = self
            .last_update_local
            .unwrap_or_else(|| utc.with_timezone(&Local).fixed_offset());

        let mut station = Station {
            id: self.id.unwrap_or_default(),
            number: self.number,
            contract_name: self.contract_name,
            name: self.name,
            address: self.address,
            position: self.position,
            banking: self.banking,
            bonus: self.bonus,
            bike_stands: self.bike_stands,
            available_bike_stands: self.available_bike_stands,
            available_bikes: self.available_bikes,
            status: self.status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            last_update_utc: utc,
            last_update_local: local,
        };
        station.ensure_id();
        station
    }
}

/// Parse a seed document.
///
/// `path` is only used to label errors.
pub fn parse_stations(json: &str, path: &Path) -> Result<Vec<Station>, StoreError> {
    let records: Vec<SeedRecord> =
        serde_json::from_str(json).map_err(|e| StoreError::SeedFormat {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let loaded_at = Utc::now();
    Ok(records
        .into_iter()
        .map(|r| r.into_station(loaded_at))
        .collect())
}

/// Read and parse a seed file.
pub fn load_stations(path: impl AsRef<Path>) -> Result<Vec<Station>, StoreError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| StoreError::SeedIo {
        path: path.to_path_buf(),
        source,
    })?;
    parse_stations(&json, path)
}
