//! HTTP handlers, one module per resource.

pub mod clients;
pub mod documents;
pub mod health;
pub mod share;
