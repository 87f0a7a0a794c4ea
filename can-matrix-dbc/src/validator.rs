//! Matrix validator
//!
//! Checks a matrix before generation and reports what the converter would
//! skip or guess. The validator reads the table and role map only; it never
//! changes them and never builds the message graph.

use crate::assembler::{parse_count, parse_message_id, parse_number, MAX_SIGNAL_LENGTH};
use crate::config::{ConverterConfig, DEFAULT_DLC};
use crate::layout;
use crate::model::dlc_to_bytes;
use crate::roles::{ColumnRole, ColumnRoleMap, REQUIRED_ROLES};
use crate::table::{MatrixRow, MatrixTable};
use crate::types::{ByteOrder, Diagnostic, ValueType};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

type LazyRegex = once_cell::sync::Lazy<Regex>;

/// Findings of one validation run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl ValidationReport {
    /// True when no error was found (warnings allowed)
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, row: Option<usize>, message: impl Into<String>) {
        self.errors.push(Diagnostic::error(row, message));
    }

    fn warning(&mut self, row: Option<usize>, message: impl Into<String>) {
        self.warnings.push(Diagnostic::warning(row, message));
    }
}

/// Check whether a name is usable as a DBC identifier
pub fn is_c_identifier(name: &str) -> bool {
    static RE: LazyRegex = LazyRegex::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());
    RE.is_match(name)
}

/// Validate a matrix against its role map
pub fn validate(table: &MatrixTable, roles: &ColumnRoleMap, config: &ConverterConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    for role in REQUIRED_ROLES {
        if roles.column(*role).is_none() {
            report.error(None, format!("required column for {} not found", role));
        }
    }
    for role in roles.missing_roles() {
        if !REQUIRED_ROLES.contains(&role) {
            report.warning(None, format!("no column for {}, defaults will be used", role));
        }
    }
    if roles.node_columns().is_empty() {
        report.warning(None, "no node columns detected, all messages go to the default bus");
    }

    let mut seen: HashMap<u32, usize> = HashMap::new();
    // (message id, payload bits) of the message the following signal rows belong to
    let mut current: Option<(u32, u32)> = None;

    for row in table.rows() {
        let cell = |role: ColumnRole| row.cell_opt(roles.column(role));

        if let Some(id_text) = cell(ColumnRole::MessageId) {
            current = check_message_row(&mut report, row, roles, config, id_text, &mut seen);
            continue;
        }

        if let Some(name) = cell(ColumnRole::SignalName) {
            match current {
                Some((id, capacity)) => check_signal_row(&mut report, row, roles, name, id, capacity),
                None => report.warning(
                    Some(row.number),
                    format!("signal {:?} appears before any message header", name),
                ),
            }
        }
    }

    log::info!(
        "Validation finished: {} errors, {} warnings",
        report.errors.len(),
        report.warnings.len()
    );
    report
}

fn check_message_row(
    report: &mut ValidationReport,
    row: MatrixRow<'_>,
    roles: &ColumnRoleMap,
    config: &ConverterConfig,
    id_text: &str,
    seen: &mut HashMap<u32, usize>,
) -> Option<(u32, u32)> {
    let Some(id) = parse_message_id(id_text) else {
        report.error(Some(row.number), format!("message id {:?} cannot be parsed", id_text));
        return None;
    };

    match seen.get(&id) {
        Some(first) => report.warning(
            Some(row.number),
            format!("message id 0x{:X} repeats the header of row {}", id, first),
        ),
        None => {
            seen.insert(id, row.number);
        }
    }

    if let Some(name) = row.cell_opt(roles.column(ColumnRole::MessageName)) {
        if !is_c_identifier(name) {
            report.warning(Some(row.number), format!("message name {:?} is not a valid identifier", name));
        }
    }

    let dlc = match row.cell_opt(roles.column(ColumnRole::Dlc)) {
        None => DEFAULT_DLC,
        Some(text) => match parse_count(text) {
            None => {
                report.error(Some(row.number), format!("DLC {:?} is not numeric", text));
                return None;
            }
            Some(value) if value > u32::from(config.max_dlc()) => {
                report.warning(
                    Some(row.number),
                    format!("DLC {} exceeds {}, {} will be used", value, config.max_dlc(), DEFAULT_DLC),
                );
                DEFAULT_DLC
            }
            Some(value) => value as u8,
        },
    };

    Some((id, u32::from(dlc_to_bytes(dlc)) * 8))
}

fn check_signal_row(
    report: &mut ValidationReport,
    row: MatrixRow<'_>,
    roles: &ColumnRoleMap,
    name: &str,
    id: u32,
    capacity: u32,
) {
    let at = Some(row.number);
    let cell = |role: ColumnRole| row.cell_opt(roles.column(role));

    if !is_c_identifier(name) {
        report.warning(at, format!("signal name {:?} is not a valid identifier", name));
    }

    let position = |role: ColumnRole, default: u32, report: &mut ValidationReport| match cell(role) {
        None => Some(default),
        Some(text) => {
            let value = parse_count(text);
            if value.is_none() {
                report.error(at, format!("{} {:?} of signal {} must be a non-negative integer", role, text, name));
            }
            value
        }
    };

    let start_byte = position(ColumnRole::StartByte, 0, report);
    let start_bit = position(ColumnRole::StartBit, 0, report);
    let length = position(ColumnRole::SignalLength, 8, report);

    if let Some(length) = length {
        if length == 0 || length > MAX_SIGNAL_LENGTH {
            report.error(at, format!("signal {} length {} outside 1-{}", name, length, MAX_SIGNAL_LENGTH));
        }
    }

    for role in [ColumnRole::Factor, ColumnRole::Offset, ColumnRole::Min, ColumnRole::Max] {
        if let Some(text) = cell(role) {
            if parse_number(text).is_none() {
                report.error(at, format!("{} {:?} of signal {} is not numeric", role, text, name));
            }
        }
    }

    let byte_order = match cell(ColumnRole::ByteOrder) {
        None => ByteOrder::default(),
        Some(text) => ByteOrder::from_cell(text).unwrap_or_else(|| {
            report.warning(at, format!("byte order {:?} not recognised, Motorola assumed", text));
            ByteOrder::Motorola
        }),
    };
    if let Some(text) = cell(ColumnRole::ValueType) {
        if ValueType::from_cell(text).is_none() {
            report.warning(at, format!("value type {:?} not recognised, unsigned assumed", text));
        }
    }

    if let (Some(start_byte), Some(start_bit), Some(length)) = (start_byte, start_bit, length) {
        let Some(start) = layout::absolute_start_bit(start_byte, start_bit, byte_order) else {
            report.error(at, format!("start position of signal {} overflows", name));
            return;
        };
        if !layout::fits_in_payload(start, length, capacity) {
            report.warning(
                at,
                format!(
                    "signal {} ({}|{}) extends beyond the {}-bit payload of message 0x{:X}",
                    name, start, length, capacity, id
                ),
            );
        }
    }
}
