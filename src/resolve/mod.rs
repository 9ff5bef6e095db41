pub mod models;
pub mod templates;

pub use models::{AmbiguousMappingError, ModelMapping, ModelMappingError, UnknownModelError};
pub use templates::TemplateMapping;
