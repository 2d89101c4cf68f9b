//! Repository traits describing persistence adapters.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::filter::PostFilter;
use crate::application::pagination::PageRequest;
use crate::domain::entities::{CategoryRecord, CommentRecord, PostRecord, TagRecord};
use crate::domain::posts::MonthCount;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Number of posts matching `filter`.
    async fn count_posts(&self, filter: &PostFilter) -> Result<u64, RepoError>;

    /// One page of posts matching `filter`, in the filter's sort order.
    async fn list_posts(
        &self,
        filter: &PostFilter,
        page: PageRequest,
    ) -> Result<Vec<PostRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;

    /// Atomically add one view and return the new total.
    async fn increment_views(&self, id: Uuid) -> Result<u64, RepoError>;

    /// Posts per creation month, newest month first.
    async fn list_month_counts(&self) -> Result<Vec<MonthCount>, RepoError>;

    async fn list_recent(&self, limit: u32) -> Result<Vec<PostRecord>, RepoError>;
}

#[async_trait]
pub trait TaxonomyRepo: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError>;
    async fn list_tags(&self) -> Result<Vec<TagRecord>, RepoError>;
    async fn list_categories_with_counts(&self) -> Result<Vec<CategoryWithCount>, RepoError>;
    async fn list_tags_with_counts(&self) -> Result<Vec<TagWithCount>, RepoError>;
    async fn find_category(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError>;
    async fn list_tags_for_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Comments on a post, newest first.
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentRecord>, RepoError>;

    /// Comment totals keyed by post id; posts without comments are absent.
    async fn count_for_posts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, u64>, RepoError>;

    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateCategoryParams {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct CreateTagParams {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub title: String,
    pub body_markdown: String,
    pub excerpt: String,
    pub author: String,
    pub category_id: Uuid,
    pub tag_ids: Vec<Uuid>,
    pub views: u64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: Uuid,
    pub name: String,
    pub email: String,
    pub url: Option<String>,
    pub text: String,
    pub created_at: OffsetDateTime,
}

/// Writes used when loading content from an archive. Comments go through
/// [`CommentsRepo::create_comment`].
#[async_trait]
pub trait ContentWriteRepo: CommentsRepo {
    async fn create_category(
        &self,
        params: CreateCategoryParams,
    ) -> Result<CategoryRecord, RepoError>;

    async fn create_tag(&self, params: CreateTagParams) -> Result<TagRecord, RepoError>;

    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryWithCount {
    pub id: Uuid,
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagWithCount {
    pub id: Uuid,
    pub name: String,
    pub count: u64,
}
