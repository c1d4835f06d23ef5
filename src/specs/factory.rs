//! Builders for the common kinds of datasource.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;

use super::DatasourceProvider;
use crate::core::{apply_filters, value, Component, ComponentError, ComponentId, Inputs, RecordBoundary};

/// Knobs shared by the factory builders.
#[derive(Debug, Clone, Default)]
pub struct SpecOptions {
    filterable: bool,
    keep_rc: bool,
    timeout: Option<Duration>,
    boundary: RecordBoundary,
    description: Option<String>,
}

impl SpecOptions {
    /// Content is subject to the filter registry; no filters means no run.
    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    /// Keep the output of commands that exit non-zero.
    pub fn keep_rc(mut self) -> Self {
        self.keep_rc = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn boundary(mut self, boundary: RecordBoundary) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn finish(&self, mut component: Component) -> Component {
        if self.filterable {
            component = component.filterable();
        }
        if let Some(description) = &self.description {
            component = component.describe(description.clone());
        }
        component
    }

    fn select(&self, inputs: &Inputs<'_>, lines: Vec<String>) -> Vec<String> {
        if self.filterable {
            apply_filters(&lines, inputs.filters(), self.boundary)
        } else {
            lines
        }
    }
}

fn text_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes).lines().map(str::to_string).collect()
}

/// Datasource capturing the output of one command.
pub fn simple_command(name: impl Into<ComponentId>, command: &str, options: SpecOptions) -> Component {
    let name = name.into();
    let id = name.clone();
    let command = command.to_string();
    let opts = options.clone();

    let component = Component::datasource(name, move |inputs, ctx| {
        let output = ctx.run_command(&command, opts.timeout)?;
        if !output.success() && !opts.keep_rc {
            return Err(ComponentError::CommandFailed {
                command: command.clone(),
                exit_code: output.exit_code,
            });
        }

        let lines = opts.select(inputs, output.lines);
        if lines.is_empty() {
            return Err(ComponentError::skip(format!("empty output from '{}'", command)));
        }
        Ok(value(DatasourceProvider::command(&id, &command, output.exit_code, lines)))
    });
    options.finish(component)
}

/// Datasource reading one host file.
pub fn simple_file(name: impl Into<ComponentId>, path: impl Into<PathBuf>, options: SpecOptions) -> Component {
    let name = name.into();
    let id = name.clone();
    let path = path.into();
    let opts = options.clone();

    let component = Component::datasource(name, move |inputs, ctx| {
        let lines = opts.select(inputs, text_lines(&ctx.read_file(&path)?));
        if lines.is_empty() {
            return Err(ComponentError::skip(format!("empty content in {}", path.display())));
        }
        Ok(value(DatasourceProvider::file(&id, &path, lines)))
    });
    options.finish(component)
}

/// Datasource reading every host file matching a glob. The value is a
/// `Vec<DatasourceProvider>`, one per file, in path order.
pub fn glob_file(name: impl Into<ComponentId>, pattern: &str, options: SpecOptions) -> Component {
    let name = name.into();
    let id = name.clone();
    let pattern = pattern.to_string();
    let opts = options.clone();

    let component = Component::datasource(name, move |inputs, ctx| {
        let mut providers = Vec::new();
        for path in ctx.glob(&pattern)? {
            let bytes = match ctx.read_file(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.is_skip() => {
                    debug!("{}: {} vanished before it could be read", id, path.display());
                    continue;
                }
                Err(e) => return Err(e),
            };
            let lines = opts.select(inputs, text_lines(&bytes));
            if !lines.is_empty() {
                providers.push(DatasourceProvider::file(&id, Path::new(&path), lines));
            }
        }

        if providers.is_empty() {
            return Err(ComponentError::skip(format!("no files matched {}", pattern)));
        }
        Ok(value(providers))
    });
    options.finish(component)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CommandOutput, MockExecutionContext};
    use crate::core::{Broker, ComponentRegistry, Evaluator, FilterRegistry, Outcome, Targets};
    use mockall::predicate::eq;

    fn run_one(component: Component, filters: &FilterRegistry, ctx: &MockExecutionContext) -> Broker {
        let id = component.id().clone();
        let mut registry = ComponentRegistry::new();
        registry.register(component).unwrap();
        Evaluator::new(&registry, filters)
            .run(&Targets::Named(vec![id]), ctx)
            .unwrap()
    }

    fn mock() -> MockExecutionContext {
        let mut ctx = MockExecutionContext::new();
        ctx.expect_name().return_const("mock");
        ctx
    }

    #[test]
    fn test_simple_command_filters_output() {
        let mut ctx = mock();
        ctx.expect_run_command()
            .with(eq("rpm -qa"), eq(None))
            .times(1)
            .returning(|_, _| {
                Ok(CommandOutput::new(
                    0,
                    vec!["httpd: ok".to_string(), "nginx: ok".to_string()],
                ))
            });

        let filters = FilterRegistry::new();
        filters.add_filter("httpd_pkg", ["httpd"]);
        let broker = run_one(
            simple_command("httpd_pkg", "rpm -qa", SpecOptions::default().filterable()),
            &filters,
            &ctx,
        );

        let provider = broker.get_as::<DatasourceProvider>("httpd_pkg").unwrap();
        assert_eq!(provider.content(), &["httpd: ok".to_string()]);
        assert_eq!(provider.relative_path(), Path::new("insights_commands/rpm_-qa"));
    }

    #[test]
    fn test_nonzero_exit_fails_unless_keep_rc() {
        let mut ctx = mock();
        ctx.expect_run_command()
            .returning(|_, _| Ok(CommandOutput::new(2, vec!["partial".to_string()])));

        let filters = FilterRegistry::new();
        let broker = run_one(simple_command("strict", "lvs", SpecOptions::default()), &filters, &ctx);
        assert!(matches!(
            broker.outcome("strict"),
            Some(Outcome::Failed(ComponentError::CommandFailed { exit_code: 2, .. }))
        ));

        let broker = run_one(
            simple_command("lenient", "lvs", SpecOptions::default().keep_rc()),
            &filters,
            &ctx,
        );
        let provider = broker.get_as::<DatasourceProvider>("lenient").unwrap();
        assert_eq!(provider.exit_code(), Some(2));
    }

    #[test]
    fn test_timeout_is_passed_through() {
        let mut ctx = mock();
        ctx.expect_run_command()
            .with(eq("sosreport --list"), eq(Some(Duration::from_secs(7))))
            .times(1)
            .returning(|_, _| Ok(CommandOutput::new(0, vec!["plugin".to_string()])));

        let filters = FilterRegistry::new();
        let broker = run_one(
            simple_command(
                "sos_list",
                "sosreport --list",
                SpecOptions::default().timeout(Duration::from_secs(7)),
            ),
            &filters,
            &ctx,
        );
        assert!(broker.contains("sos_list"));
    }

    #[test]
    fn test_simple_file_missing_is_skipped() {
        let mut ctx = mock();
        ctx.expect_read_file().returning(|p| {
            Err(ComponentError::FileNotFound {
                path: p.to_path_buf(),
            })
        });

        let filters = FilterRegistry::new();
        let broker = run_one(
            simple_file("redhat_release", "/etc/redhat-release", SpecOptions::default()),
            &filters,
            &ctx,
        );
        assert!(broker.outcome("redhat_release").unwrap().is_skipped());
    }

    #[test]
    fn test_glob_file_reads_each_match() {
        let mut ctx = mock();
        ctx.expect_glob().returning(|_| {
            Ok(vec![
                PathBuf::from("/etc/ld.so.conf.d/a.conf"),
                PathBuf::from("/etc/ld.so.conf.d/gone.conf"),
                PathBuf::from("/etc/ld.so.conf.d/b.conf"),
            ])
        });
        ctx.expect_read_file().returning(|p| {
            if p.ends_with("gone.conf") {
                Err(ComponentError::FileNotFound {
                    path: p.to_path_buf(),
                })
            } else {
                Ok(format!("# {}\n/opt/lib\n", p.display()).into_bytes())
            }
        });

        let filters = FilterRegistry::new();
        let broker = run_one(
            glob_file("ld_so_conf_d", "/etc/ld.so.conf.d/*.conf", SpecOptions::default()),
            &filters,
            &ctx,
        );

        let providers = broker.get_as::<Vec<DatasourceProvider>>("ld_so_conf_d").unwrap();
        let paths: Vec<&Path> = providers.iter().map(|p| p.relative_path()).collect();
        assert_eq!(
            paths,
            vec![
                Path::new("etc/ld.so.conf.d/a.conf"),
                Path::new("etc/ld.so.conf.d/b.conf"),
            ]
        );
    }

    #[test]
    fn test_glob_without_matches_is_skipped() {
        let mut ctx = mock();
        ctx.expect_glob().returning(|_| Ok(Vec::new()));

        let filters = FilterRegistry::new();
        let broker = run_one(
            glob_file("ld_so_conf_d", "/etc/ld.so.conf.d/*.conf", SpecOptions::default()),
            &filters,
            &ctx,
        );
        assert!(broker.outcome("ld_so_conf_d").unwrap().is_skipped());
    }
}
