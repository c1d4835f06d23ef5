//! Datasource specifications and the default catalog.
//!
//! A spec is a datasource component that knows how to gather one piece of
//! host data. Most are built from the factory helpers; computed datasources
//! live under [`datasources`].

pub mod datasources;
pub mod factory;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::constants::{COMMANDS_DIR, DATASOURCES_DIR};
use crate::context::mangle_command;
use crate::core::{ComponentId, ComponentRegistry, ConfigError, FilterRegistry, RecordBoundary, Value};

pub use factory::{glob_file, simple_command, simple_file, SpecOptions};

/// Component names of the default catalog.
pub mod names {
    pub const PS_EO_CMD: &str = "ps_eo_cmd";
    pub const PS_AUXWW: &str = "ps_auxww";
    pub const PACKAGE_PROVIDES_COMMAND: &str = "package_provides_command";
    pub const GREENBOOT_STATUS: &str = "greenboot_status";
    pub const HOSTNAME: &str = "hostname";
    pub const REDHAT_RELEASE: &str = "redhat_release";
    pub const LD_SO_CONF_D: &str = "ld_so_conf_d";
}

/// Where a datasource's content came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Origin {
    Command { command: String },
    File { path: PathBuf },
    Computed,
}

/// Collected content of a datasource together with its place in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasourceProvider {
    name: ComponentId,
    content: Vec<String>,
    relative_path: PathBuf,
    exit_code: Option<i32>,
    origin: Origin,
}

impl DatasourceProvider {
    /// Output of `command`, stored under `insights_commands/<mangled>`.
    pub fn command(name: impl Into<ComponentId>, command: &str, exit_code: i32, content: Vec<String>) -> Self {
        Self {
            name: name.into(),
            content,
            relative_path: Path::new(COMMANDS_DIR).join(mangle_command(command)),
            exit_code: Some(exit_code),
            origin: Origin::Command {
                command: command.to_string(),
            },
        }
    }

    /// Content of a host file, stored under its host path.
    pub fn file(name: impl Into<ComponentId>, path: &Path, content: Vec<String>) -> Self {
        Self {
            name: name.into(),
            content,
            relative_path: path.strip_prefix("/").unwrap_or(path).to_path_buf(),
            exit_code: None,
            origin: Origin::File {
                path: path.to_path_buf(),
            },
        }
    }

    /// Content derived from other components, stored under `insights_datasources/<name>`.
    pub fn computed(name: impl Into<ComponentId>, content: Vec<String>) -> Self {
        let name = name.into();
        let relative_path = Path::new(DATASOURCES_DIR).join(name.as_str());
        Self {
            name,
            content,
            relative_path,
            exit_code: None,
            origin: Origin::Computed,
        }
    }

    pub fn name(&self) -> &ComponentId {
        &self.name
    }

    pub fn content(&self) -> &[String] {
        &self.content
    }

    /// Content as written to the archive: newline-terminated lines.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        for line in &self.content {
            out.push_str(line);
            out.push('\n');
        }
        out.into_bytes()
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }
}

/// Providers held in a broker value: a single provider or a list of them.
pub fn providers_of(value: &Value) -> Vec<&DatasourceProvider> {
    if let Some(provider) = value.downcast_ref::<DatasourceProvider>() {
        vec![provider]
    } else if let Some(list) = value.downcast_ref::<Vec<DatasourceProvider>>() {
        list.iter().collect()
    } else {
        Vec::new()
    }
}

/// Register the default catalog: datasources, parsers and combiners, plus
/// the filters those parsers declare.
pub fn register_defaults(registry: &mut ComponentRegistry, filters: &FilterRegistry) -> Result<(), ConfigError> {
    registry.register(simple_command(
        names::PS_EO_CMD,
        "ps -eo pid,ppid,nlwp,args",
        SpecOptions::default().describe("process table with thread counts"),
    ))?;
    registry.register(simple_command(
        names::PS_AUXWW,
        "ps auxww",
        SpecOptions::default().describe("process table with resource usage"),
    ))?;
    registry.register(simple_command(
        names::HOSTNAME,
        "hostname -f",
        SpecOptions::default().describe("fully qualified host name"),
    ))?;
    registry.register(simple_command(
        names::GREENBOOT_STATUS,
        "/usr/libexec/greenboot/greenboot-status",
        SpecOptions::default()
            .filterable()
            .boundary(RecordBoundary::Line)
            .describe("greenboot health check journal"),
    ))?;
    registry.register(simple_file(
        names::REDHAT_RELEASE,
        "/etc/redhat-release",
        SpecOptions::default().describe("distribution release string"),
    ))?;
    registry.register(glob_file(
        names::LD_SO_CONF_D,
        "/etc/ld.so.conf.d/*.conf",
        SpecOptions::default().describe("dynamic linker search path drop-ins"),
    ))?;

    crate::parsers::register(registry, filters)?;
    crate::combiners::register(registry)?;

    registry.register(datasources::package_provides::component())?;
    Ok(())
}
