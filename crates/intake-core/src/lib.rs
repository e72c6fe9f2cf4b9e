//! # intake-core
//!
//! Core types, traits, and abstractions for the client intake portal.
//!
//! This crate provides:
//! - Domain models (documents, analyses, QA blocks, clients, profiles)
//! - Repository, blob store, generation and notification traits
//! - Error types
//! - Shared defaults and structured logging field names

pub mod defaults;
pub mod error;
pub mod file_safety;
pub mod logging;
pub mod models;
pub mod traits;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
