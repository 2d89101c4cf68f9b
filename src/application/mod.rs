//! Application services: the filtering and pagination core plus the services
//! that drive it against storage.

pub mod archive;
pub mod comments;
pub mod error;
pub mod filter;
pub mod listing;
pub mod pagination;
pub mod render;
pub mod repos;
