use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};

use crate::archive::ArchiveWriter;
use crate::config::CollectionConfig;
use crate::context::{ExecutionContext, HostContext, ReplayContext};
use crate::core::{AbortHandle, Broker, ComponentRegistry, ConfigError, Evaluator, FilterRegistry};
use crate::models::{ComponentRecord, OutcomeCounts};
use crate::specs::{names, providers_of, register_defaults};
use crate::utils::compress::compress_archive;

/// Where collected data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// The live host, with host paths resolved under `root`
    Host { root: PathBuf },
    /// A previously written archive directory
    Replay { archive: PathBuf },
}

impl Default for Source {
    fn default() -> Self {
        Source::Host { root: PathBuf::from("/") }
    }
}

/// What a finished collection produced.
#[derive(Debug)]
pub struct CollectionReport {
    pub archive_dir: PathBuf,
    pub zip_path: Option<PathBuf>,
    pub counts: OutcomeCounts,
    pub records: Vec<ComponentRecord>,
}

/// Build the default catalog against `filters` and check the graph.
pub fn build_registry(filters: &FilterRegistry) -> Result<ComponentRegistry, ConfigError> {
    let mut registry = ComponentRegistry::new();
    register_defaults(&mut registry, filters)?;
    registry.validate()?;
    Ok(registry)
}

/// Context for `source`. The host context uses the configured timeout.
pub fn open_context(source: &Source, config: &CollectionConfig) -> Result<Box<dyn ExecutionContext>> {
    match source {
        Source::Host { root } => Ok(Box::new(
            HostContext::new()
                .with_root(root.clone())
                .with_timeout(config.command_timeout()),
        )),
        Source::Replay { archive } => {
            let context = ReplayContext::open(archive)
                .with_context(|| format!("Failed to open archive {}", archive.display()))?;
            Ok(Box::new(context))
        }
    }
}

/// Run one full collection: evaluate the catalog, write the archive and
/// optionally compress it.
///
/// Configuration problems come back as [`ConfigError`] inside the
/// `anyhow::Error` and nothing is written. Component failures never fail
/// the run; they are recorded in the archive metadata.
pub fn collect(
    config: &CollectionConfig,
    context: &dyn ExecutionContext,
    filters: &FilterRegistry,
    abort: AbortHandle,
) -> Result<CollectionReport> {
    let registry = build_registry(filters)?;
    config.validate(&registry)?;
    config.apply_filters(filters);

    let evaluator = Evaluator::new(&registry, filters)
        .parallel(config.parallel)
        .with_abort(abort.clone());
    let broker = evaluator.run_with(config.seed_broker(), &config.targets(), context)?;

    if abort.is_aborted() {
        warn!("Collection interrupted; writing what was collected");
    }

    let host = collection_hostname(&broker)?;
    let mut writer = ArchiveWriter::create(&config.output_dir, &host)?;
    let written = writer.add_broker(&broker)?;
    info!("Archived output of {} datasources", written);

    if let Some(display_name) = &config.display_name {
        writer.set_display_name(display_name)?;
    }
    if let Some(ansible_host) = &config.ansible_host {
        writer.set_ansible_host(ansible_host)?;
    }

    let records = ComponentRecord::from_broker(&registry, &broker, config.scrub);
    let counts = OutcomeCounts::from_records(&records);
    let archive_dir = writer.finish(&records, context.name())?;

    let zip_path = if config.compress {
        Some(compress_archive(&archive_dir)?)
    } else {
        None
    };

    Ok(CollectionReport {
        archive_dir,
        zip_path,
        counts,
        records,
    })
}

/// Host name for the archive: what the `hostname` datasource collected,
/// falling back to the name of the machine running the collection.
fn collection_hostname(broker: &Broker) -> Result<String> {
    let collected = broker
        .get(names::HOSTNAME)
        .and_then(|value| providers_of(value).into_iter().next())
        .and_then(|provider| provider.content().first())
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty());

    match collected {
        Some(host) => Ok(host),
        None => hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .map_err(|e| anyhow!("Failed to get hostname: {}", e)),
    }
}

/// One line per registered component for `advisor list-specs`.
pub fn list_specs(registry: &ComponentRegistry, filters: &FilterRegistry) -> Vec<String> {
    let mut lines: Vec<String> = registry
        .iter()
        .map(|component| {
            let mut line = format!("{:<28} {:<10}", component.id().as_str(), component.kind().to_string());
            if !component.required_deps().is_empty() {
                line.push_str(&format!(" requires: {}", join_ids(component.required_deps())));
            }
            if !component.optional_deps().is_empty() {
                line.push_str(&format!(" optional: {}", join_ids(component.optional_deps())));
            }
            if component.is_filterable() {
                line.push_str(&format!(
                    " filters: {}",
                    filters.get_filters(component.id().as_str()).len()
                ));
            }
            if let Some(description) = component.description() {
                line.push_str(&format!("  # {}", description));
            }
            line.trim_end().to_string()
        })
        .collect();
    lines.sort();
    lines
}

fn join_ids(ids: &[crate::core::ComponentId]) -> String {
    ids.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", ")
}
