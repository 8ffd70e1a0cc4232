//! Query Builder pagination operations

use serde::{Deserialize, Serialize};

use super::builder::QueryBuilder;

impl QueryBuilder {
    /// Add LIMIT clause
    pub fn limit(mut self, count: i64) -> Self {
        self.limit_count = Some(count);
        self
    }

    /// Add OFFSET clause
    pub fn offset(mut self, count: i64) -> Self {
        self.offset_value = Some(count);
        self
    }

    /// Limit and offset for a 1-based page
    pub fn for_page(mut self, page: i64, per_page: i64) -> Self {
        let page = page.max(1);
        let per_page = per_page.max(1);
        self.limit_count = Some(per_page);
        self.offset_value = Some((page - 1).saturating_mul(per_page));
        self
    }
}

/// Metadata of a single page of results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub total: i64,
    pub per_page: i64,
    pub last_page: i64,
    pub page: i64,
}

impl PaginationMeta {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let per_page = per_page.max(1);
        let total = total.max(0);
        let remainder = if total % per_page == 0 { 0 } else { 1 };
        let last_page = (total / per_page + remainder).max(1);
        Self {
            total,
            per_page,
            last_page,
            page: page.max(1),
        }
    }

    pub fn has_more_pages(&self) -> bool {
        self.page < self.last_page
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
