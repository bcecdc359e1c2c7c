use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;

/// Normalized page/limit pair. Construct with [`PageRequest::normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Clamp raw request values: a page below 1 becomes 1, a missing or
    /// non-positive limit becomes the default, and a limit above the maximum
    /// is capped.
    #[must_use]
    pub fn normalize(page: Option<i64>, limit: Option<i64>, cfg: &PaginationConfig) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let limit = match limit {
            Some(l) if l >= 1 => l.min(i64::from(cfg.max_limit)),
            _ => i64::from(cfg.default_limit),
        };
        Self {
            page: u32::try_from(page).unwrap_or(u32::MAX),
            limit: u32::try_from(limit).unwrap_or(cfg.max_limit),
        }
    }

    #[must_use]
    pub fn offset(self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::normalize(None, None, &PaginationConfig::default())
    }
}

/// One page of results plus the totals needed to page further.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total: u64, req: PageRequest) -> Self {
        let limit = u64::from(req.limit.max(1));
        Self {
            items,
            total,
            page: req.page,
            limit: req.limit,
            total_pages: total.div_ceil(limit),
        }
    }
}
