use std::error::Error as StdError;

use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::{application::archive::ArchiveError, infra::error::InfraError};

/// Diagnostic chain attached to error responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Process-level failure reported by the binary before exiting.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("import failed")]
    Archive(#[from] ArchiveError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_collects_source_chain() {
        let inner = std::io::Error::other("disk on fire");
        let outer = InfraError::from(inner);

        let report = ErrorReport::from_error("tests", StatusCode::INTERNAL_SERVER_ERROR, &outer);

        assert_eq!(report.messages.len(), 2);
        assert_eq!(report.messages[0], "io error: disk on fire");
        assert_eq!(report.messages[1], "disk on fire");
    }

    #[test]
    fn report_attaches_to_response_extensions() {
        let mut response = Response::new(axum::body::Body::empty());
        ErrorReport::from_message("tests", StatusCode::BAD_REQUEST, "nope").attach(&mut response);

        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.status, StatusCode::BAD_REQUEST);
        assert_eq!(report.messages, vec!["nope".to_string()]);
    }
}
