//! Combiners: views merged from several parsers.

pub mod ps;

use crate::core::{ComponentRegistry, ConfigError};

pub use ps::Ps;

pub fn register(registry: &mut ComponentRegistry) -> Result<(), ConfigError> {
    registry.register(ps::component())
}
