//! Bike station records.

use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Status given to stations that arrive without one.
pub const DEFAULT_STATUS: &str = "OPEN";

/// Geographic position of a station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

/// A bike-share station as held by the stores.
///
/// `id` is the canonical storage key and `number` the human-facing one.
/// Both timestamps describe the same instant: once in UTC and once in the
/// local offset of the process that last wrote the record.
///
/// # Examples
///
/// ```
/// use bike_server::domain::Station;
///
/// let mut station = Station::new(42, "Smithfield North");
/// assert!(station.id.is_empty());
///
/// station.ensure_id();
/// assert_eq!(station.id, "42");
/// assert_eq!(station.status, "OPEN");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    #[serde(default)]
    pub id: String,
    pub number: i32,
    #[serde(default)]
    pub contract_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub banking: bool,
    #[serde(default)]
    pub bonus: bool,
    #[serde(default)]
    pub bike_stands: i32,
    #[serde(default)]
    pub available_bike_stands: i32,
    #[serde(default)]
    pub available_bikes: i32,
    #[serde(default = "default_status")]
    pub status: String,
    pub last_update_utc: DateTime<Utc>,
    pub last_update_local: DateTime<FixedOffset>,
}

fn default_status() -> String {
    DEFAULT_STATUS.to_string()
}

impl Station {
    /// Create an empty open station with the given number and name.
    ///
    /// Capacity and availability start at zero and the timestamps at the
    /// Unix epoch; stores restamp them on write.
    pub fn new(number: i32, name: impl Into<String>) -> Self {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        Self {
            id: String::new(),
            number,
            contract_name: String::new(),
            name: name.into(),
            address: String::new(),
            position: None,
            banking: false,
            bonus: false,
            bike_stands: 0,
            available_bike_stands: 0,
            available_bikes: 0,
            status: default_status(),
            last_update_utc: epoch,
            last_update_local: epoch.fixed_offset(),
        }
    }

    /// Set the address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set capacity and availability together.
    ///
    /// Free stands are derived from the other two so that
    /// `available_bikes + available_bike_stands == bike_stands`.
    pub fn with_availability(mut self, bike_stands: i32, available_bikes: i32) -> Self {
        self.bike_stands = bike_stands;
        self.available_bikes = available_bikes;
        self.available_bike_stands = (bike_stands - available_bikes).max(0);
        self
    }

    /// Set the status string.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Default an empty (or blank) `id` from `number`.
    pub fn ensure_id(&mut self) {
        if self.id.trim().is_empty() {
            self.id = self.number.to_string();
        }
    }

    /// Record `now` as the last update, in UTC and in local time.
    pub fn stamp(&mut self, now: DateTime<Utc>) {
        self.last_update_utc = now;
        self.last_update_local = now.with_timezone(&Local).fixed_offset();
    }

    /// Fraction of the capacity currently holding bikes.
    ///
    /// Zero when the station has no capacity.
    pub fn occupancy(&self) -> f64 {
        if self.bike_stands > 0 {
            f64::from(self.available_bikes) / f64::from(self.bike_stands)
        } else {
            0.0
        }
    }

    /// Status upper-cased for aggregation; blank statuses become `UNKNOWN`.
    pub fn canonical_status(&self) -> String {
        let status = self.status.trim();
        if status.is_empty() {
            "UNKNOWN".to_string()
        } else {
            status.to_uppercase()
        }
    }

    /// Check the record can be written to a store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.bike_stands < 0 {
            return Err(ValidationError::NegativeBikeStands(self.bike_stands));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ensure_id_defaults_from_number() {
        let mut station = Station::new(7, "Dame Street");
        station.ensure_id();
        assert_eq!(station.id, "7");
    }

    #[test]
    fn ensure_id_keeps_existing() {
        let mut station = Station::new(7, "Dame Street");
        station.id = "station-7".into();
        station.ensure_id();
        assert_eq!(station.id, "station-7");
    }

    #[test]
    fn ensure_id_replaces_blank() {
        let mut station = Station::new(9, "Blank");
        station.id = "   ".into();
        station.ensure_id();
        assert_eq!(station.id, "9");
    }

    #[test]
    fn stamp_writes_same_instant_twice() {
        let now = Utc.with_ymd_and_hms(2025, 11, 3, 9, 30, 0).unwrap();
        let mut station = Station::new(1, "Parnell Square");
        station.stamp(now);

        assert_eq!(station.last_update_utc, now);
        assert_eq!(station.last_update_local.with_timezone(&Utc), now);
    }

    #[test]
    fn occupancy_is_zero_without_capacity() {
        let station = Station::new(1, "Empty").with_availability(0, 0);
        assert_eq!(station.occupancy(), 0.0);
    }

    #[test]
    fn occupancy_is_ratio_of_bikes_to_stands() {
        let station = Station::new(1, "Half").with_availability(10, 6);
        assert!((station.occupancy() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn with_availability_derives_free_stands() {
        let station = Station::new(1, "X").with_availability(20, 5);
        assert_eq!(station.available_bike_stands, 15);
    }

    #[test]
    fn canonical_status() {
        assert_eq!(Station::new(1, "a").with_status("open").canonical_status(), "OPEN");
        assert_eq!(Station::new(1, "a").with_status(" Closed ").canonical_status(), "CLOSED");
        assert_eq!(Station::new(1, "a").with_status("").canonical_status(), "UNKNOWN");
    }

    #[test]
    fn validate_rejects_negative_capacity() {
        let station = Station::new(1, "Bad").with_availability(-1, 0);
        assert_eq!(
            station.validate(),
            Err(ValidationError::NegativeBikeStands(-1))
        );
        assert!(Station::new(2, "Ok").validate().is_ok());
    }

    #[test]
    fn deserialize_applies_defaults() {
        let json = r#"{
            "number": 5,
            "name": "Charlemont Place",
            "last_update_utc": "2025-11-03T09:30:00Z",
            "last_update_local": "2025-11-03T09:30:00+00:00"
        }"#;
        let station: Station = serde_json::from_str(json).unwrap();
        assert_eq!(station.status, "OPEN");
        assert!(station.id.is_empty());
        assert!(station.position.is_none());
    }
}
