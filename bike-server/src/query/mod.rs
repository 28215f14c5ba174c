//! Station query pipeline.
//!
//! A query runs over one point-in-time snapshot from a store:
//! filter by status, then minimum bikes, then free text; project each row
//! (computing occupancy); sort; count; page.

mod engine;
mod params;

pub use engine::{QueryPage, run_query};
pub use params::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE, QueryParams, SortDir, SortKey};
