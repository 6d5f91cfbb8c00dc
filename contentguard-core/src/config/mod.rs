pub mod pipeline_config;

pub use pipeline_config::{load_config, load_from_env, BoundaryConfig, ConfigError, PipelineConfig};
