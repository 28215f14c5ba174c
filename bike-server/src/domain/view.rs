//! Projected station records returned to callers.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use super::station::Station;

/// Output shape of a station, with derived fields computed at read time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationView {
    pub id: String,
    pub number: i32,
    pub contract_name: String,
    pub name: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    pub bike_stands: i32,
    pub available_bike_stands: i32,
    pub available_bikes: i32,
    pub status: String,
    pub last_update_utc: DateTime<Utc>,
    pub last_update_local: DateTime<FixedOffset>,
    /// `available_bikes / bike_stands`, or 0 without capacity.
    pub occupancy: f64,
}

impl From<&Station> for StationView {
    fn from(s: &Station) -> Self {
        let position = s.position.unwrap_or_default();
        Self {
            id: s.id.clone(),
            number: s.number,
            contract_name: s.contract_name.clone(),
            name: s.name.clone(),
            address: s.address.clone(),
            lat: position.lat,
            lng: position.lng,
            bike_stands: s.bike_stands,
            available_bike_stands: s.available_bike_stands,
            available_bikes: s.available_bikes,
            status: s.status.clone(),
            last_update_utc: s.last_update_utc,
            last_update_local: s.last_update_local,
            occupancy: s.occupancy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Position;

    #[test]
    fn projection_copies_fields_and_computes_occupancy() {
        let mut station = Station::new(3, "Heuston Bridge").with_availability(40, 10);
        station.position = Some(Position {
            lat: 53.347,
            lng: -6.292,
        });
        station.ensure_id();

        let view = StationView::from(&station);
        assert_eq!(view.id, "3");
        assert_eq!(view.number, 3);
        assert_eq!(view.lat, 53.347);
        assert_eq!(view.available_bike_stands, 30);
        assert!((view.occupancy - 0.25).abs() < 1e-9);
    }

    #[test]
    fn missing_position_projects_to_origin() {
        let view = StationView::from(&Station::new(1, "Nowhere"));
        assert_eq!((view.lat, view.lng), (0.0, 0.0));
    }

    #[test]
    fn serializes_camel_case() {
        let view = StationView::from(&Station::new(1, "A").with_availability(10, 5));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["availableBikes"], 5);
        assert_eq!(json["bikeStands"], 10);
        assert_eq!(json["occupancy"], 0.5);
    }
}
