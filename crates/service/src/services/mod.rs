//! Service-layer orchestration.

pub mod templates;

pub use templates::TemplateService;
