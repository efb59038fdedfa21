//! Pagination envelope: `{ data, meta: { total, offset, limit } }`.

use serde::{Deserialize, Serialize};

/// Default and maximum page sizes.
pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Query-string paging parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl PageParams {
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Paging metadata echoed back with every list response.
#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
}

/// The list envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, offset: i64, limit: i64) -> Self {
        Self {
            data,
            meta: PageMeta { total, offset, limit },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_clamped() {
        let params = PageParams {
            offset: Some(-5),
            limit: Some(10_000),
        };
        assert_eq!(params.offset(), 0);
        assert_eq!(params.limit(), MAX_LIMIT);
    }

    #[test]
    fn test_defaults() {
        let params = PageParams {
            offset: None,
            limit: None,
        };
        assert_eq!(params.offset(), 0);
        assert_eq!(params.limit(), DEFAULT_LIMIT);
    }
}
