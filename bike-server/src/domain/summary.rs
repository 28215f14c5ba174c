//! Fleet-wide aggregates.

use std::collections::BTreeMap;

use serde::Serialize;

use super::station::Station;

/// Totals across every station in a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_stations: usize,
    pub total_bike_stands: i64,
    pub total_available_bikes: i64,
    /// Station counts keyed by upper-cased status.
    pub counts_by_status: BTreeMap<String, usize>,
}

impl Summary {
    /// Aggregate a snapshot.
    pub fn from_stations(stations: &[Station]) -> Self {
        let mut summary = Self {
            total_stations: stations.len(),
            ..Self::default()
        };

        for s in stations {
            summary.total_bike_stands += i64::from(s.bike_stands);
            summary.total_available_bikes += i64::from(s.available_bikes);
            *summary
                .counts_by_status
                .entry(s.canonical_status())
                .or_insert(0) += 1;
        }

        summary
    }
}
