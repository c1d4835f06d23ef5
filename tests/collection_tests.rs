//! Full collection runs: archive layout, metadata and replay.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use zip::ZipArchive;

use diag_collector::collectors::{collect, open_context, Source};
use diag_collector::config::CollectionConfig;
use diag_collector::context::{glob_under, CommandOutput, ExecutionContext, ReplayContext};
use diag_collector::core::{AbortHandle, ComponentError, ComponentKind, ComponentResult, FilterRegistry};
use diag_collector::models::ComponentRecord;

const PS_AUXWW: &str = "\
USER PID %CPU %MEM VSZ RSS TTY STAT START TIME COMMAND
root 1 0.0 0.1 1 1 ? Ss 10:00 0:01 /usr/lib/systemd/systemd
apache 812 0.0 0.1 1 1 ? S 10:00 0:00 /usr/sbin/httpd -DFOREGROUND";

const PS_EO_CMD: &str = "\
PID PPID NLWP COMMAND
1 0 1 /usr/lib/systemd/systemd
812 1 5 /usr/sbin/httpd -DFOREGROUND";

/// A host whose commands answer from a table and whose files live under a temp dir.
struct FakeHost {
    root: PathBuf,
    commands: HashMap<String, CommandOutput>,
}

impl FakeHost {
    fn new(root: &Path) -> Self {
        let mut commands = HashMap::new();
        for (command, output) in [
            ("hostname -f", "web-01.example.com"),
            ("ps auxww", PS_AUXWW),
            ("ps -eo pid,ppid,nlwp,args", PS_EO_CMD),
            ("/usr/bin/readlink -e /usr/sbin/httpd", "/usr/sbin/httpd"),
            ("/usr/bin/rpm -qf /usr/sbin/httpd", "httpd-2.4.57-5.el9.x86_64"),
        ] {
            let lines = output.lines().map(str::to_string).collect();
            commands.insert(command.to_string(), CommandOutput::new(0, lines));
        }

        fs::create_dir_all(root.join("etc/ld.so.conf.d")).unwrap();
        fs::write(root.join("etc/redhat-release"), "Red Hat Enterprise Linux release 9.4 (Plow)\n").unwrap();
        fs::write(root.join("etc/ld.so.conf.d/httpd.conf"), "/usr/lib64/httpd\n").unwrap();

        Self {
            root: root.to_path_buf(),
            commands,
        }
    }
}

impl ExecutionContext for FakeHost {
    fn run_command(&self, command: &str, _timeout: Option<Duration>) -> ComponentResult<CommandOutput> {
        self.commands
            .get(command)
            .cloned()
            .ok_or_else(|| ComponentError::CommandNotFound {
                command: command.to_string(),
            })
    }

    fn read_file(&self, path: &Path) -> ComponentResult<Vec<u8>> {
        let full = self.root.join(path.strip_prefix("/").unwrap_or(path));
        fs::read(full).map_err(|_| ComponentError::FileNotFound {
            path: path.to_path_buf(),
        })
    }

    fn glob(&self, pattern: &str) -> ComponentResult<Vec<PathBuf>> {
        glob_under(&self.root, pattern)
    }

    fn name(&self) -> &'static str {
        "host"
    }
}

fn config(output: &Path) -> CollectionConfig {
    let mut config = CollectionConfig {
        output_dir: output.to_path_buf(),
        display_name: Some("web frontend".into()),
        ansible_host: Some("web-01".into()),
        ..CollectionConfig::default()
    };
    config
        .filters
        .insert("package_provides_command".into(), vec!["httpd".into()]);
    config
}

fn read_records(archive: &Path) -> Vec<ComponentRecord> {
    fs::read_to_string(archive.join("meta_data/collection.jsonl"))
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_archive_layout() {
    let host_root = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let host = FakeHost::new(host_root.path());

    let filters = FilterRegistry::new();
    let report = collect(&config(output.path()), &host, &filters, AbortHandle::new()).unwrap();
    let archive = &report.archive_dir;

    for relative in [
        "insights_commands/ps_auxww",
        "insights_commands/ps_-eo_pid_ppid_nlwp_args",
        "insights_commands/hostname_-f",
        "insights_datasources/package_provides_command",
        "etc/redhat-release",
        "etc/ld.so.conf.d/httpd.conf",
        "display_name",
        "ansible_host",
        "collection_summary.json",
    ] {
        assert!(archive.join(relative).is_file(), "missing {}", relative);
    }
    assert_eq!(
        fs::read_to_string(archive.join("insights_datasources/package_provides_command")).unwrap(),
        "/usr/sbin/httpd httpd-2.4.57-5.el9.x86_64\n"
    );

    let records = read_records(archive);
    assert_eq!(records.len(), report.records.len());
    let ps = records.iter().find(|r| r.name == "ps_auxww").unwrap();
    assert_eq!(ps.kind, ComponentKind::Datasource);
    assert_eq!(ps.outcome, "success");
    assert_eq!(ps.exit_status, Some(0));
    assert_eq!(ps.paths, vec!["insights_commands/ps_auxww"]);
    assert!(ps.timestamp.is_some());

    let greenboot = records.iter().find(|r| r.name == "greenboot_status").unwrap();
    assert_eq!(greenboot.outcome, "skipped");

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(archive.join("collection_summary.json")).unwrap()).unwrap();
    assert_eq!(summary["hostname"], "web-01.example.com");
    assert_eq!(summary["counts"]["success"].as_u64().unwrap() as usize, report.counts.success);
}

#[test]
fn test_replay_round_trip() {
    let host_root = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let host = FakeHost::new(host_root.path());

    let filters = FilterRegistry::new();
    let first = collect(&config(output.path()), &host, &filters, AbortHandle::new()).unwrap();

    let replay_output = TempDir::new().unwrap();
    let mut replay_config = config(replay_output.path());
    replay_config.display_name = None;
    replay_config.ansible_host = None;
    let context = open_context(
        &Source::Replay {
            archive: output.path().to_path_buf(),
        },
        &replay_config,
    )
    .unwrap();
    assert_eq!(context.name(), "replay");

    let filters = FilterRegistry::new();
    let second = collect(&replay_config, context.as_ref(), &filters, AbortHandle::new()).unwrap();

    for relative in [
        "insights_commands/ps_auxww",
        "insights_commands/hostname_-f",
        "etc/redhat-release",
        "etc/ld.so.conf.d/httpd.conf",
    ] {
        assert_eq!(
            fs::read(first.archive_dir.join(relative)).unwrap(),
            fs::read(second.archive_dir.join(relative)).unwrap(),
            "{} differs after replay",
            relative
        );
    }

    let replay = ReplayContext::open(&first.archive_dir).unwrap();
    assert!(replay.run_command("uptime", None).unwrap_err().is_skip());
}

#[test]
fn test_blacklisted_spec_is_not_collected() {
    let host_root = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let host = FakeHost::new(host_root.path());

    let mut config = config(output.path());
    config.skip_specs = vec!["ps_auxww".into()];

    let filters = FilterRegistry::new();
    let report = collect(&config, &host, &filters, AbortHandle::new()).unwrap();

    let ps = report.records.iter().find(|r| r.name == "ps_auxww").unwrap();
    assert_eq!(ps.outcome, "skipped");
    assert_eq!(ps.reason.as_deref(), Some("blacklisted by configuration"));
    assert!(!report.archive_dir.join("insights_commands/ps_auxww").exists());

    // Ps still runs from the other listing.
    let combined = report.records.iter().find(|r| r.name == "Ps").unwrap();
    assert_eq!(combined.outcome, "success");
}

#[test]
fn test_compressed_archive() {
    let host_root = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let host = FakeHost::new(host_root.path());

    let mut config = config(output.path());
    config.compress = true;

    let filters = FilterRegistry::new();
    let report = collect(&config, &host, &filters, AbortHandle::new()).unwrap();
    let zip_path = report.zip_path.unwrap();

    let dir_name = report.archive_dir.file_name().unwrap().to_string_lossy().into_owned();
    let mut archive = ZipArchive::new(fs::File::open(zip_path).unwrap()).unwrap();
    assert!(archive
        .by_name(&format!("{}/meta_data/collection.jsonl", dir_name))
        .is_ok());
    assert!(archive
        .by_name(&format!("{}/insights_commands/ps_auxww", dir_name))
        .is_ok());
}
