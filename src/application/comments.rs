use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{CommentsRepo, CreateCommentParams, PostsRepo, RepoError};
use crate::domain::comments::NewComment;
use crate::domain::entities::CommentRecord;
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum CommentError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct CommentService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl CommentService {
    pub fn new(posts: Arc<dyn PostsRepo>, comments: Arc<dyn CommentsRepo>) -> Self {
        Self { posts, comments }
    }

    /// Validate and store a reader comment on `post_id`.
    pub async fn submit(
        &self,
        post_id: Uuid,
        comment: NewComment,
    ) -> Result<CommentRecord, CommentError> {
        let valid = comment.validate()?;

        if self.posts.find_by_id(post_id).await?.is_none() {
            return Err(DomainError::not_found("post").into());
        }

        let record = self
            .comments
            .create_comment(CreateCommentParams {
                post_id,
                name: valid.name,
                email: valid.email,
                url: valid.url,
                text: valid.text,
                created_at: OffsetDateTime::now_utc(),
            })
            .await
            .map_err(|err| match err {
                RepoError::NotFound => CommentError::Domain(DomainError::not_found("post")),
                other => CommentError::Repo(other),
            })?;

        counter!("quire_comments_created_total").increment(1);
        info!(
            target = "quire::application::comments",
            post_id = %post_id,
            comment_id = %record.id,
            "comment created"
        );

        Ok(record)
    }
}
