//! Persistence layer for the template service.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - The template repository and the `TemplateStore` adapter

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
pub mod store;

pub use store::PgTemplateStore;
