//! Orchestration layer for the template service.
//!
//! Wires the store, resolver, cache, and invalidation coordinator together
//! and exposes the write operations and the cached read path.

pub mod app;
pub mod config;
pub mod services;
pub mod telemetry;

pub use app::Application;
pub use config::Config;
pub use services::TemplateService;
