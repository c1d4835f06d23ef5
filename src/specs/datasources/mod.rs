//! Datasources computed from other components rather than read directly.

pub mod package_provides;
