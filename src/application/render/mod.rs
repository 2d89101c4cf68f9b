//! Markdown rendering for post bodies.
//!
//! The pipeline is pure: markdown in, sanitised HTML plus excerpt and table of
//! contents out. Persisting or caching results is the caller's business.

mod service;
mod types;

pub use service::{ComrakRenderService, render_service};
pub use types::{RenderError, RenderOutput, RenderRequest, RenderService, TocEntry};
