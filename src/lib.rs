//! Quire: a personal-blog content server.
//!
//! The interesting part lives in [`application::filter`] and
//! [`application::pagination`]: turning a requested view into a storage
//! filter, and turning a result count into a numbered navigation window.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
