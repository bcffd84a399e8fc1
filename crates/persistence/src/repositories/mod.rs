//! Repository implementations for database operations.

pub mod template;

pub use template::TemplateRepository;
