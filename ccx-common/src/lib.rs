//! # CCX Common Library
//!
//! Shared code for the country currency cache:
//! - Database initialization and persisted models
//! - Configuration loading
//! - Common error type
//! - Timestamp utilities

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
