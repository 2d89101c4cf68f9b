use std::net::SocketAddr;

use sqlx::migrate::MigrateError;
use thiserror::Error;

use crate::config::LoadError;

/// Failures while bringing up the process: configuration, storage, listener
/// and logging.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error("configuration error: {message}")]
    Configuration { message: String },
    #[error("failed to connect to postgres")]
    Connect(#[source] sqlx::Error),
    #[error("failed to apply migrations")]
    Migrate(#[from] MigrateError),
    #[error("failed to bind `{addr}`")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

impl InfraError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
