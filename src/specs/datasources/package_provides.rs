//! `package_provides_command`: which package owns each interesting running command.
//!
//! The commands of interest are given as filters: a running process is
//! considered when the base name of its executable equals one of them.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::combiners::ps::{Ps, PS};
use crate::context::ExecutionContext;
use crate::core::{value, Component, ComponentError, ComponentResult};
use crate::specs::{names, DatasourceProvider};

/// Resolve the package owning `path`, following symlinks first.
///
/// Any failure along the way means "no package".
pub fn get_package(ctx: &dyn ExecutionContext, path: &str) -> Option<String> {
    let resolved = first_line_of(ctx, &format!("/usr/bin/readlink -e {}", path))?;
    first_line_of(ctx, &format!("/usr/bin/rpm -qf {}", resolved))
}

fn first_line_of(ctx: &dyn ExecutionContext, command: &str) -> Option<String> {
    match ctx.run_command(command, None) {
        Ok(out) if out.success() => out.first_line().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string),
        Ok(out) => {
            debug!("'{}' exited with {}", command, out.exit_code);
            None
        }
        Err(e) => {
            debug!("'{}' failed: {}", command, e);
            None
        }
    }
}

/// Absolute path of a command as it was started.
fn locate(ctx: &dyn ExecutionContext, executable: &str) -> Option<String> {
    if executable.starts_with('/') {
        Some(executable.to_string())
    } else {
        first_line_of(ctx, &format!("/usr/bin/which {}", executable))
    }
}

/// Build the `<command> <package>` listing for running commands matching `filters`.
pub fn cmd_and_pkg(ps: &Ps, filters: &BTreeSet<String>, ctx: &dyn ExecutionContext) -> ComponentResult<DatasourceProvider> {
    if filters.is_empty() {
        return Err(ComponentError::skip("no commands of interest"));
    }

    let candidates: BTreeSet<&str> = ps
        .processes()
        .filter(|p| filters.contains(&p.command_name))
        .map(|p| p.executable())
        .collect();

    let mut owners: BTreeMap<String, String> = BTreeMap::new();
    for executable in candidates {
        let Some(path) = locate(ctx, executable) else {
            continue;
        };
        if owners.contains_key(&path) {
            continue;
        }
        if let Some(package) = get_package(ctx, &path) {
            owners.insert(path, package);
        }
    }

    if owners.is_empty() {
        return Err(ComponentError::skip("no running command is owned by a package"));
    }

    let lines = owners
        .into_iter()
        .map(|(cmd, pkg)| format!("{} {}", cmd, pkg))
        .collect();
    Ok(DatasourceProvider::computed(names::PACKAGE_PROVIDES_COMMAND, lines))
}

pub fn component() -> Component {
    Component::datasource(names::PACKAGE_PROVIDES_COMMAND, |inputs, ctx| {
        let ps = inputs.require::<Ps>(PS)?;
        Ok(value(cmd_and_pkg(ps, inputs.filters(), ctx)?))
    })
    .requires([PS])
    .filterable()
    .describe("package owning each running command named in the filters")
}
