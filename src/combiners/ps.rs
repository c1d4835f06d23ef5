//! Combined process table.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::{value, Component, ComponentError, ComponentResult};
use crate::parsers::ps::{Process, PsAuxww, PsEoCmd, PS_AUXWW, PS_EO_CMD};

pub const PS: &str = "Ps";

/// Every process seen by any of the `ps` parsers, keyed by PID.
///
/// `ps -eo` rows win; `ps auxww` fills in the columns they lack and adds
/// processes only it saw.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Ps {
    processes: BTreeMap<u32, Process>,
}

impl Ps {
    pub fn new(eo_cmd: Option<&PsEoCmd>, auxww: Option<&PsAuxww>) -> ComponentResult<Self> {
        if eo_cmd.is_none() && auxww.is_none() {
            return Err(ComponentError::skip("no process listing available"));
        }

        let mut processes: BTreeMap<u32, Process> = BTreeMap::new();
        if let Some(PsEoCmd(table)) = eo_cmd {
            for row in table.rows() {
                processes.entry(row.pid).or_insert_with(|| row.clone());
            }
        }
        if let Some(PsAuxww(table)) = auxww {
            for row in table.rows() {
                match processes.get_mut(&row.pid) {
                    Some(existing) => {
                        existing.user = existing.user.take().or_else(|| row.user.clone());
                        existing.cpu_percent = existing.cpu_percent.or(row.cpu_percent);
                        existing.mem_percent = existing.mem_percent.or(row.mem_percent);
                    }
                    None => {
                        processes.insert(row.pid, row.clone());
                    }
                }
            }
        }
        Ok(Self { processes })
    }

    pub fn get(&self, pid: u32) -> Option<&Process> {
        self.processes.get(&pid)
    }

    pub fn pids(&self) -> impl Iterator<Item = u32> + '_ {
        self.processes.keys().copied()
    }

    /// Processes in PID order.
    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.processes.values()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn running(&self, command_name: &str) -> bool {
        self.processes.values().any(|p| p.command_name == command_name)
    }
}

pub fn component() -> Component {
    Component::combiner(PS, |inputs, _| {
        Ok(value(Ps::new(
            inputs.get::<PsEoCmd>(PS_EO_CMD),
            inputs.get::<PsAuxww>(PS_AUXWW),
        )?))
    })
    .optional([PS_EO_CMD, PS_AUXWW])
    .describe("process table merged from every ps listing")
}
