//! Query parameters.

use std::str::FromStr;

/// Smallest page size a caller can ask for.
pub const MIN_PAGE_SIZE: u32 = 1;
/// Largest page size a caller can ask for.
pub const MAX_PAGE_SIZE: u32 = 200;
/// Page size when none is given.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Sort order for query results.
///
/// Parsing never fails: unrecognised keys sort by station number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortKey {
    #[default]
    Number,
    Name,
    AvailableBikes,
    Occupancy,
}

impl FromStr for SortKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "name" => SortKey::Name,
            "availablebikes" => SortKey::AvailableBikes,
            "occupancy" => SortKey::Occupancy,
            _ => SortKey::Number,
        })
    }
}

/// Sort direction.
///
/// Blank or `asc` (any case) is ascending; any other value is descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDir {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(if s.is_empty() || s.eq_ignore_ascii_case("asc") {
            SortDir::Asc
        } else {
            SortDir::Desc
        })
    }
}

/// Filter, sort and paging options for a station query.
///
/// Also serves as the result cache key, so two requests that normalize to
/// the same parameters share a cached page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryParams {
    /// Case-insensitive exact status match.
    pub status: Option<String>,
    /// Keep stations with at least this many available bikes.
    pub min_bikes: Option<i32>,
    /// Case-insensitive substring of name or address.
    pub q: Option<String>,
    pub sort: SortKey,
    pub dir: SortDir,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            status: None,
            min_bikes: None,
            q: None,
            sort: SortKey::Number,
            dir: SortDir::Asc,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl QueryParams {
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_min_bikes(mut self, min_bikes: i32) -> Self {
        self.min_bikes = Some(min_bikes);
        self
    }

    pub fn with_search(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    pub fn with_sort(mut self, sort: SortKey, dir: SortDir) -> Self {
        self.sort = sort;
        self.dir = dir;
        self
    }

    pub fn with_page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    /// Canonical form: blank filters dropped, search text trimmed, page
    /// clamped to at least 1 and page size to `[1, 200]`.
    pub fn normalized(self) -> Self {
        fn non_blank(s: Option<String>) -> Option<String> {
            s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }

        Self {
            status: non_blank(self.status),
            min_bikes: self.min_bikes,
            q: non_blank(self.q),
            sort: self.sort,
            dir: self.dir,
            page: self.page.max(1),
            page_size: self.page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE),
        }
    }
}
