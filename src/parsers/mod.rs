//! Parsers: typed views over a single datasource.

pub mod greenboot_status;
pub mod ps;

use crate::core::{ComponentRegistry, ConfigError, FilterRegistry};

pub use greenboot_status::GreenbootStatus;
pub use ps::{Process, PsAuxww, PsEoCmd, PsTable};

/// Register every parser and the filters they declare.
pub fn register(registry: &mut ComponentRegistry, filters: &FilterRegistry) -> Result<(), ConfigError> {
    registry.register(ps::ps_eo_cmd())?;
    registry.register(ps::ps_auxww())?;
    registry.register(greenboot_status::component())?;
    greenboot_status::register_filters(filters);
    Ok(())
}
