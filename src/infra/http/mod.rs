//! JSON HTTP surface over the listing and comment services.

mod error;
mod middleware;
mod public;

pub use error::{ApiError, EMPTY_QUERY_MESSAGE, codes};
pub use public::build_router;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::comments::CommentService;
use crate::application::error::ErrorReport;
use crate::application::listing::ListingService;
use crate::infra::db::PostgresRepositories;

#[derive(Clone)]
pub struct HttpState {
    pub listing: Arc<ListingService>,
    pub comments: Arc<CommentService>,
    /// Absent when serving from the in-memory store.
    pub db: Option<Arc<PostgresRepositories>>,
}

impl HttpState {
    pub fn new(listing: ListingService, comments: CommentService) -> Self {
        Self {
            listing: Arc::new(listing),
            comments: Arc::new(comments),
            db: None,
        }
    }

    /// Report database reachability on `/_health`.
    pub fn with_database(mut self, db: PostgresRepositories) -> Self {
        self.db = Some(Arc::new(db));
        self
    }
}

fn db_health_response(result: Result<(), sqlx::Error>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
