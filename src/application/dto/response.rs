//! Response DTOs
//!
//! Envelopes for list endpoints that carry paging state next to the items.
//! Single resources are returned as the service view types directly.

use serde::{Deserialize, Serialize};

use crate::application::services::PostQueryDto;
use crate::domain::{Post, PostSort};

/// One page of forum posts
#[derive(Debug, Serialize, Deserialize)]
pub struct PostListResponse {
    pub posts: Vec<Post>,
    pub sort: PostSort,
    pub page: i64,
    pub per_page: i32,
    /// A full page suggests there may be another one
    pub has_more: bool,
}

impl PostListResponse {
    pub fn new(posts: Vec<Post>, query: &PostQueryDto) -> Self {
        let per_page = query.per_page();
        Self {
            has_more: posts.len() as i64 >= per_page as i64,
            posts,
            sort: query.sort,
            page: query.page.unwrap_or(1).max(1),
            per_page,
        }
    }
}

/// Acknowledgement for deletes that have no body to return
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub id: String,
    pub deleted: bool,
}

impl DeletedResponse {
    pub fn new(id: i64) -> Self {
        Self {
            id: id.to_string(),
            deleted: true,
        }
    }
}
