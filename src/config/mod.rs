//! Operator configuration, loaded from YAML.

mod collection_config;

pub use collection_config::{load_or_default, CollectionConfig};
