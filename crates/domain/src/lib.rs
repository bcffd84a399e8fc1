//! Domain layer for the template service.
//!
//! This crate contains:
//! - Template models (schemas, overrides, invalidation events)
//! - The resolution algorithm and store abstraction
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;
