use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::role::Role;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// Full name of the authenticated user.
    pub sub: String,
    /// Multi-valued role set; a user may hold several roles at once.
    pub roles: Vec<Role>,
    pub exp: usize,
    pub jti: String,
    pub token_type: TokenType,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}

/// Pagination envelope shared by every list endpoint.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub docs: Vec<T>,
    #[schema(example = 42)]
    pub total_docs: i64,
    #[schema(example = 10)]
    pub limit: u64,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 5)]
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl<T> Page<T> {
    pub fn new(docs: Vec<T>, total_docs: i64, page: u64, limit: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            (total_docs as u64).div_ceil(limit)
        };
        Self {
            docs,
            total_docs,
            limit,
            page,
            total_pages,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

/// Normalizes raw `page`/`limit` query values: 1-based page, limit capped at 100.
pub fn page_params(page: Option<u64>, limit: Option<u64>) -> (u64, u64, u64) {
    let limit = limit.unwrap_or(10).clamp(1, 100);
    let page = page.unwrap_or(1).max(1);
    let offset = (page - 1) * limit;
    (page, limit, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_math() {
        let p = Page::new(vec![1, 2, 3], 25, 2, 10);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next_page);
        assert!(p.has_prev_page);

        let first = Page::<i32>::new(vec![], 5, 1, 10);
        assert_eq!(first.total_pages, 1);
        assert!(!first.has_next_page);
        assert!(!first.has_prev_page);

        let empty = Page::<i32>::new(vec![], 0, 1, 10);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next_page);
    }

    #[test]
    fn page_params_clamp() {
        assert_eq!(page_params(None, None), (1, 10, 0));
        assert_eq!(page_params(Some(0), Some(500)), (1, 100, 0));
        assert_eq!(page_params(Some(3), Some(20)), (3, 20, 40));
    }
}
