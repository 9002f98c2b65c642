//! Configuration: per-task resolution against the registry, and the
//! process-wide pipeline settings.

mod resolver;
mod settings;

pub use resolver::{ConfigOrigin, ConfigResolver, ResolvedConfig};
pub use settings::PipelineSettings;
