//! Domain types for the bike station service.
//!
//! This module contains the station record as stored, the projection
//! returned to callers, and fleet aggregates. Derived values such as
//! occupancy are always computed from the raw fields, never stored.

mod error;
mod station;
mod summary;
mod view;

pub use error::ValidationError;
pub use station::{DEFAULT_STATUS, Position, Station};
pub use summary::Summary;
pub use view::StationView;
