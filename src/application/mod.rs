//! Application services layer.

pub mod error;
pub mod listings;
pub mod repos;
