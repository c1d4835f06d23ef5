//! Parser for `/usr/libexec/greenboot/greenboot-status`.

use serde::Serialize;

use crate::core::{value, Component, ComponentResult, FilterRegistry, Inputs};
use crate::specs::{names, DatasourceProvider};

pub const GREENBOOT_STATUS: &str = "GreenbootStatus";

const GREEN: &str = "Boot Status is GREEN";
const RED: &str = "Boot Status is RED";
const FALLBACK: &str = "FALLBACK BOOT DETECTED";
const NOLOGS: &str = "WARNING: No greenboot logs were found!";

/// Health verdicts found in the filtered greenboot journal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GreenbootStatus {
    pub green: bool,
    pub red: bool,
    pub fallback: bool,
    pub nologs: bool,
    pub lines: Vec<String>,
}

impl GreenbootStatus {
    pub fn parse(lines: &[String]) -> Self {
        let scan = |token: &str| lines.iter().any(|l| l.contains(token));
        Self {
            green: scan(GREEN),
            red: scan(RED),
            fallback: scan(FALLBACK),
            nologs: scan(NOLOGS),
            lines: lines.to_vec(),
        }
    }
}

/// The only lines of greenboot output this parser needs.
pub fn register_filters(filters: &FilterRegistry) {
    filters.add_filter(names::GREENBOOT_STATUS, [GREEN, RED, FALLBACK, NOLOGS]);
}

fn parse(inputs: &Inputs<'_>) -> ComponentResult<GreenbootStatus> {
    let raw = inputs.require::<DatasourceProvider>(names::GREENBOOT_STATUS)?;
    Ok(GreenbootStatus::parse(raw.content()))
}

pub fn component() -> Component {
    Component::parser(GREENBOOT_STATUS, |inputs, _| Ok(value(parse(inputs)?)))
        .requires([names::GREENBOOT_STATUS])
        .describe("greenboot boot health verdicts")
}
