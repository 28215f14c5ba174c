//! Filter, project, sort and page a station snapshot.

use std::cmp::Ordering;

use serde::Serialize;

use super::params::{QueryParams, SortDir, SortKey};
use crate::domain::{Station, StationView};

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPage {
    pub items: Vec<StationView>,
    /// Rows that matched the filters, before paging.
    pub total: usize,
}

/// Run a query over a snapshot of stations.
///
/// The snapshot is consumed; its iteration order decides how ties are
/// ordered after sorting.
pub fn run_query(stations: Vec<Station>, params: &QueryParams) -> QueryPage {
    let params = params.clone().normalized();

    let mut views: Vec<StationView> = stations
        .iter()
        .filter(|s| match &params.status {
            Some(status) => eq_ignore_case(&s.status, status),
            None => true,
        })
        .filter(|s| match params.min_bikes {
            Some(min) => s.available_bikes >= min,
            None => true,
        })
        .filter(|s| match &params.q {
            Some(q) => {
                let q = q.to_lowercase();
                s.name.to_lowercase().contains(&q) || s.address.to_lowercase().contains(&q)
            }
            None => true,
        })
        .map(StationView::from)
        .collect();

    sort_views(&mut views, params.sort, params.dir);

    let total = views.len();
    let page_size = params.page_size as usize;
    let offset = (params.page as usize - 1).saturating_mul(page_size);
    let items = views.into_iter().skip(offset).take(page_size).collect();

    QueryPage { items, total }
}

/// Stable sort. Sorting by number is always ascending.
fn sort_views(views: &mut [StationView], sort: SortKey, dir: SortDir) {
    match (sort, dir) {
        (SortKey::Number, _) | (_, SortDir::Asc) => views.sort_by(|a, b| compare(sort, a, b)),
        (_, SortDir::Desc) => views.sort_by(|a, b| compare(sort, b, a)),
    }
}

fn compare(sort: SortKey, a: &StationView, b: &StationView) -> Ordering {
    match sort {
        SortKey::Number => a.number.cmp(&b.number),
        SortKey::Name => cmp_ignore_case(&a.name, &b.name),
        SortKey::AvailableBikes => a.available_bikes.cmp(&b.available_bikes),
        SortKey::Occupancy => a.occupancy.total_cmp(&b.occupancy),
    }
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    cmp_ignore_case(a, b) == Ordering::Equal
}
