//! Listing publication and retrieval.
//!
//! Listings are published through a two-step saga (attachment to the blob
//! store, then listing and file rows to Postgres, with the attachment removed
//! again if the second step fails) and read back through a cache-aside path
//! that marks which listings belong to the requester.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
