//! # Shield Common Library
//!
//! Shared code for the Shield survey publication jobs:
//! - Error types
//! - Configuration loading and layered resolution
//! - Submission date handling

pub mod config;
pub mod dates;
pub mod error;

pub use dates::{DateRange, SubmissionDate, LATEST_SENTINEL};
pub use error::{Error, PublishFailureDetail, Result};
