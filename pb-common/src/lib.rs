//! # PureBreath Common Library
//!
//! Shared code for the PureBreath services including:
//! - Analysis record model and wire types
//! - Client-side audio file validation
//! - Configuration loading
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod models;
pub mod time;
pub mod validation;

pub use error::{Error, Result};
pub use models::Prediction;
