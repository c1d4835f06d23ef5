//! Process table parsers for `ps -eo pid,ppid,nlwp,args` and `ps auxww`.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

use crate::core::{value, Component, ComponentError, ComponentResult, Inputs};
use crate::specs::{names, DatasourceProvider};

pub const PS_EO_CMD: &str = "PsEoCmd";
pub const PS_AUXWW: &str = "PsAuxww";

/// One row of a process listing. Columns a listing does not carry are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Process {
    pub pid: u32,
    pub ppid: Option<u32>,
    pub nlwp: Option<u32>,
    pub user: Option<String>,
    pub cpu_percent: Option<f32>,
    pub mem_percent: Option<f32>,
    /// Full command line as listed
    pub command: String,
    /// Base name of the executable
    pub command_name: String,
}

impl Process {
    /// The executable as it appears on the command line.
    pub fn executable(&self) -> &str {
        self.command.split_whitespace().next().unwrap_or("")
    }
}

/// Rows of a `ps` listing in output order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PsTable {
    rows: Vec<Process>,
}

impl PsTable {
    /// Parse a listing whose first non-empty line is the column header and
    /// whose last column is the command line.
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> ComponentResult<Self> {
        let mut lines = lines.iter().map(AsRef::<str>::as_ref).filter(|l| !l.trim().is_empty());

        let header: Vec<String> = match lines.next() {
            Some(h) => h.split_whitespace().map(str::to_uppercase).collect(),
            None => return Err(ComponentError::skip("empty process listing")),
        };
        let last = header.last().map(String::as_str);
        if !matches!(last, Some("COMMAND") | Some("ARGS") | Some("CMD")) || !header.iter().any(|h| h == "PID") {
            return Err(ComponentError::Other(anyhow::anyhow!(
                "unrecognized ps header: {}",
                header.join(" ")
            )));
        }

        let rows: Vec<Process> = lines
            .filter_map(|line| split_columns(line, header.len()))
            .filter_map(|cols| row_from(&header, cols))
            .collect();

        if rows.is_empty() {
            return Err(ComponentError::skip("no processes in listing"));
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[Process] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn running(&self, command_name: &str) -> bool {
        self.rows.iter().any(|r| r.command_name == command_name)
    }
}

/// Split `line` into `columns` fields; the last field takes the rest of the line.
pub fn split_columns(line: &str, columns: usize) -> Option<Vec<&str>> {
    if columns == 0 {
        return None;
    }
    let mut fields = Vec::with_capacity(columns);
    let mut rest = line.trim_start();
    while fields.len() + 1 < columns {
        let end = rest.find(char::is_whitespace)?;
        fields.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    let rest = rest.trim_end();
    if rest.is_empty() {
        return None;
    }
    fields.push(rest);
    Some(fields)
}

fn row_from(header: &[String], cols: Vec<&str>) -> Option<Process> {
    let by_name: HashMap<&str, &str> = header.iter().map(String::as_str).zip(cols.iter().copied()).collect();
    let command = cols.last()?.to_string();
    let executable = command.split_whitespace().next().unwrap_or("");
    let command_name = Path::new(executable)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| executable.to_string());

    Some(Process {
        pid: by_name.get("PID")?.parse().ok()?,
        ppid: by_name.get("PPID").and_then(|v| v.parse().ok()),
        nlwp: by_name.get("NLWP").and_then(|v| v.parse().ok()),
        user: by_name.get("USER").map(|v| v.to_string()),
        cpu_percent: by_name.get("%CPU").and_then(|v| v.parse().ok()),
        mem_percent: by_name.get("%MEM").and_then(|v| v.parse().ok()),
        command,
        command_name,
    })
}

/// Parsed `ps -eo pid,ppid,nlwp,args`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PsEoCmd(pub PsTable);

/// Parsed `ps auxww`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PsAuxww(pub PsTable);

fn table_from(inputs: &Inputs<'_>, datasource: &str) -> ComponentResult<PsTable> {
    PsTable::parse(inputs.require::<DatasourceProvider>(datasource)?.content())
}

pub fn ps_eo_cmd() -> Component {
    Component::parser(PS_EO_CMD, |inputs, _| Ok(value(PsEoCmd(table_from(inputs, names::PS_EO_CMD)?))))
        .requires([names::PS_EO_CMD])
        .describe("process table from ps -eo")
}

pub fn ps_auxww() -> Component {
    Component::parser(PS_AUXWW, |inputs, _| Ok(value(PsAuxww(table_from(inputs, names::PS_AUXWW)?))))
        .requires([names::PS_AUXWW])
        .describe("process table from ps auxww")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PS_EO: &str = "
   PID  PPID NLWP COMMAND
     1     0    1 /usr/lib/systemd/systemd --switched-root --system --deserialize 22
     2     0    1 [kthreadd]
   988     2    1 /usr/sbin/httpd -DFOREGROUND
 28219     2    1 java TestSleepMethod1
";

    const PS_AUX: &str = "
USER       PID %CPU %MEM    VSZ   RSS TTY      STAT START   TIME COMMAND
root         1  0.0  0.1 193892  6860 ?        Ss   Jan01   0:12 /usr/lib/systemd/systemd --switched-root
apache     988  0.3  1.2 224000 12000 ?        S    Jan01   1:02 /usr/sbin/httpd -DFOREGROUND
";

    fn lines(s: &str) -> Vec<&str> {
        s.lines().collect()
    }

    #[test]
    fn test_parse_eo_cmd() {
        let table = PsTable::parse(&lines(PS_EO)).unwrap();
        assert_eq!(table.len(), 4);

        let httpd = &table.rows()[2];
        assert_eq!(httpd.pid, 988);
        assert_eq!(httpd.ppid, Some(2));
        assert_eq!(httpd.nlwp, Some(1));
        assert_eq!(httpd.command, "/usr/sbin/httpd -DFOREGROUND");
        assert_eq!(httpd.command_name, "httpd");
        assert_eq!(httpd.executable(), "/usr/sbin/httpd");
        assert!(httpd.user.is_none());

        assert_eq!(table.rows()[1].command_name, "[kthreadd]");
        assert!(table.running("java"));
    }

    #[test]
    fn test_parse_auxww() {
        let table = PsTable::parse(&lines(PS_AUX)).unwrap();
        let httpd = &table.rows()[1];
        assert_eq!(httpd.user.as_deref(), Some("apache"));
        assert_eq!(httpd.cpu_percent, Some(0.3));
        assert_eq!(httpd.command, "/usr/sbin/httpd -DFOREGROUND");
        assert!(httpd.ppid.is_none());
    }

    #[test]
    fn test_garbage_rows_are_dropped() {
        let listing = vec!["PID COMMAND", "abc /bin/false", "42 /bin/true"];
        let table = PsTable::parse(&listing).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].pid, 42);
    }

    #[test]
    fn test_bad_header_and_empty_listing() {
        assert!(matches!(
            PsTable::parse(&vec!["total 0", "x y"]),
            Err(ComponentError::Other(_))
        ));
        assert!(PsTable::parse::<&str>(&[]).unwrap_err().is_skip());
        assert!(PsTable::parse(&vec!["PID COMMAND"]).unwrap_err().is_skip());
    }

    #[test]
    fn test_split_columns() {
        assert_eq!(
            split_columns("  1  0 /bin/sh -c true  ", 3),
            Some(vec!["1", "0", "/bin/sh -c true"])
        );
        assert_eq!(split_columns("1", 3), None);
    }
}
