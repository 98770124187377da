//! Route handlers, grouped by concern.

pub mod cache;
pub mod download;
pub mod health;
pub mod jobs;
