//! Page-number pagination for list endpoints.
//!
//! Clients send `?page=<n>&limit=<size>`; the response wraps the items as
//! `{count, next, previous, results}`. Links are relative and carry over every
//! other query parameter (filters) unchanged.

use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub limit: i64,
}

impl PageWindow {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl PageQuery {
    pub fn window(&self, cfg: &PaginationConfig) -> AppResult<PageWindow> {
        let page = self.page.unwrap_or(1);
        if page < 1 {
            return Err(AppError::NotFound("Invalid page".to_string()));
        }
        let limit = self.limit.unwrap_or(cfg.page_size).clamp(1, cfg.max_page_size);
        Ok(PageWindow { page, limit })
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Wraps one page of `results` out of `count` total items.
    ///
    /// `path` and `raw_query` come from the request URI and are used to build
    /// the neighbour links.
    pub fn new(results: Vec<T>, count: i64, window: PageWindow, path: &str, raw_query: Option<&str>) -> Self {
        let has_next = window.offset() + (results.len() as i64) < count;
        let next = has_next.then(|| page_link(path, raw_query, window.page + 1));
        let previous = (window.page > 1).then(|| page_link(path, raw_query, window.page - 1));
        Self { count, next, previous, results }
    }
}

/// Rejects pages past the end, except page 1 of an empty list.
pub fn ensure_page_in_range(window: PageWindow, count: i64) -> AppResult<()> {
    if window.page > 1 && window.offset() >= count {
        return Err(AppError::NotFound("Invalid page".to_string()));
    }
    Ok(())
}

fn page_link(path: &str, raw_query: Option<&str>, page: i64) -> String {
    let page_pair = format!("page={}", page);
    let mut pairs: Vec<&str> = raw_query
        .unwrap_or("")
        .split('&')
        .filter(|p| !p.is_empty() && *p != "page" && !p.starts_with("page="))
        .collect();
    pairs.push(&page_pair);
    format!("{}?{}", path, pairs.join("&"))
}
