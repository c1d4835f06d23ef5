use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::collectors::Source;
use crate::config::CollectionConfig;

/// Command-line arguments for diag-collector.
///
/// The tool is organized as `diag-collector advisor <action>`; running it
/// without an action is a usage error.
#[derive(Parser, Debug)]
#[clap(name = "diag-collector", version, about = "Host diagnostic data collector")]
pub struct Args {
    /// Verbose logging
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect and inspect host diagnostics
    Advisor {
        #[clap(subcommand)]
        action: Option<AdvisorCommand>,
    },
}

#[derive(Subcommand, Debug)]
pub enum AdvisorCommand {
    /// Run the collection and write an archive
    Collect(CollectArgs),

    /// List the registered specs with their dependencies
    ListSpecs,
}

/// Options for `advisor collect`. Flags override the configuration file.
#[derive(ClapArgs, Debug, Default)]
pub struct CollectArgs {
    /// Path to configuration YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Replay a previously written archive directory instead of the live host
    #[clap(long, conflicts_with = "root")]
    pub archive: Option<PathBuf>,

    /// Resolve host files under this directory (default: /)
    #[clap(long)]
    pub root: Option<PathBuf>,

    /// Directory the archive is written into
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Display name stored in the archive
    #[clap(long)]
    pub display_name: Option<String>,

    /// Ansible host name stored in the archive
    #[clap(long)]
    pub ansible_host: Option<String>,

    /// Per-command timeout in seconds (0 uses the ceiling)
    #[clap(short, long)]
    pub timeout: Option<u64>,

    /// Only evaluate these components (comma-separated)
    #[clap(long, value_delimiter = ',')]
    pub targets: Vec<String>,

    /// Skip these components (comma-separated)
    #[clap(long, value_delimiter = ',')]
    pub skip: Vec<String>,

    /// Evaluate independent components concurrently
    #[clap(long)]
    pub parallel: bool,

    /// Pack the archive into a zip file
    #[clap(long)]
    pub compress: bool,

    /// Keep credentials in recorded failure messages
    #[clap(long)]
    pub no_scrub: bool,
}

impl CollectArgs {
    /// Overlay the flags that were given onto `config`.
    pub fn apply_to(&self, config: &mut CollectionConfig) {
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(display_name) = &self.display_name {
            config.display_name = Some(display_name.clone());
        }
        if let Some(ansible_host) = &self.ansible_host {
            config.ansible_host = Some(ansible_host.clone());
        }
        if let Some(timeout) = self.timeout {
            config.command_timeout_secs = timeout;
        }
        if !self.targets.is_empty() {
            config.targets = self.targets.clone();
        }
        for name in &self.skip {
            if !config.skip_specs.contains(name) {
                config.skip_specs.push(name.clone());
            }
        }
        config.parallel |= self.parallel;
        config.compress |= self.compress;
        if self.no_scrub {
            config.scrub = false;
        }
    }

    pub fn source(&self) -> Source {
        match (&self.archive, &self.root) {
            (Some(archive), _) => Source::Replay {
                archive: archive.clone(),
            },
            (None, Some(root)) => Source::Host { root: root.clone() },
            (None, None) => Source::default(),
        }
    }
}
