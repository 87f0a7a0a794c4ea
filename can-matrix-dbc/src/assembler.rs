//! Row assembler - message/signal grouping
//!
//! A matrix lists a message header row (with a message ID) followed by one
//! row per signal (message ID left empty). The assembler walks the rows in
//! order with an explicit two-state machine:
//!
//! | state                | row                                  | action                          | next state           |
//! |----------------------|--------------------------------------|---------------------------------|----------------------|
//! | any                  | valid message ID                     | open (or reuse) message         | `InMessage(id)`      |
//! | any                  | non-empty but invalid ID / DLC       | skip message, report            | `NoCurrentMessage`   |
//! | `InMessage(id)`      | empty ID, signal name                | append signal to message `id`   | `InMessage(id)`      |
//! | `NoCurrentMessage`   | empty ID, signal name                | ignore, report                  | `NoCurrentMessage`   |
//! | any                  | neither                              | ignore                          | unchanged            |

use crate::config::{ConverterConfig, DEFAULT_DLC};
use crate::encoder::sanitize::to_identifier;
use crate::layout;
use crate::model::{MatrixModel, Message, Signal};
use crate::nodes::Node;
use crate::roles::{ColumnRole, ColumnRoleMap};
use crate::table::{MatrixRow, MatrixTable};
use crate::types::{ByteOrder, Diagnostic, NodeRef, ValueType};

/// Highest 29-bit CAN identifier
pub const MAX_CAN_ID: u32 = 0x1FFF_FFFF;

/// Longest signal a DBC file can describe
pub const MAX_SIGNAL_LENGTH: u32 = 64;

/// Defaults substituted for unmapped columns or empty cells
pub const DEFAULT_START_BIT: u32 = 0;
pub const DEFAULT_SIGNAL_LENGTH: u32 = 8;
pub const DEFAULT_FACTOR: f64 = 1.0;
pub const DEFAULT_OFFSET: f64 = 0.0;

/// Assembler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    NoCurrentMessage,
    InMessage(u32),
}

/// Result of assembling a matrix
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub model: MatrixModel,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a message ID cell: decimal, or hexadecimal with a `0x` prefix
pub fn parse_message_id(text: &str) -> Option<u32> {
    let text = text.trim();
    let id = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => text.parse::<u32>().ok()?,
    };
    (id <= MAX_CAN_ID).then_some(id)
}

/// Parse a numeric cell into a finite number (hex accepted with `0x`)
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok().map(|v| v as f64);
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a non-negative integral cell ("8", "8.0")
pub fn parse_count(text: &str) -> Option<u32> {
    let value = parse_number(text)?;
    if value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return None;
    }
    Some(value as u32)
}

/// Walks matrix rows and builds the message/signal graph
pub struct RowAssembler<'a> {
    roles: &'a ColumnRoleMap,
    nodes: &'a [Node],
    config: &'a ConverterConfig,
    state: AssemblerState,
    model: MatrixModel,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> RowAssembler<'a> {
    /// Create an assembler over resolved roles and retained nodes
    pub fn new(roles: &'a ColumnRoleMap, nodes: &'a [Node], config: &'a ConverterConfig) -> Self {
        Self {
            roles,
            nodes,
            config,
            state: AssemblerState::NoCurrentMessage,
            model: MatrixModel::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Current state of the machine
    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Feed every row of a table and finish
    pub fn assemble(mut self, table: &MatrixTable) -> Assembly {
        for row in table.rows() {
            self.step(row);
        }
        self.finish()
    }

    /// Apply one transition
    pub fn step(&mut self, row: MatrixRow<'_>) {
        let id_cell = row.cell_opt(self.roles.column(ColumnRole::MessageId));
        let signal_cell = row.cell_opt(self.roles.column(ColumnRole::SignalName));

        if let Some(id_text) = id_cell {
            self.state = match self.open_message(row, id_text) {
                Some(id) => AssemblerState::InMessage(id),
                None => AssemblerState::NoCurrentMessage,
            };
            return;
        }

        match (self.state, signal_cell) {
            (AssemblerState::InMessage(id), Some(name)) => self.append_signal(row, id, name),
            (AssemblerState::NoCurrentMessage, Some(name)) => {
                self.warn(row.number, format!("signal {:?} has no message header, ignored", name));
            }
            _ => log::trace!("Row {} ignored", row.number),
        }
    }

    /// Finish traversal; an open message needs no closing action
    pub fn finish(self) -> Assembly {
        let stats = self.model.stats();
        log::info!(
            "Assembled {} messages with {} signals",
            stats.num_messages,
            stats.num_signals
        );
        Assembly {
            model: self.model,
            diagnostics: self.diagnostics,
        }
    }

    fn warn(&mut self, row: usize, message: String) {
        log::warn!("Row {}: {}", row, message);
        self.diagnostics.push(Diagnostic::warning(Some(row), message));
    }

    /// Handle a header row; returns the message ID on success
    fn open_message(&mut self, row: MatrixRow<'_>, id_text: &str) -> Option<u32> {
        let Some(id) = parse_message_id(id_text) else {
            self.warn(row.number, format!("unparsable message id {:?}, message skipped", id_text));
            return None;
        };

        let dlc = match row.cell_opt(self.roles.column(ColumnRole::Dlc)) {
            None => DEFAULT_DLC,
            Some(text) => match parse_count(text) {
                None => {
                    self.warn(
                        row.number,
                        format!("non-numeric DLC {:?} for message 0x{:X}, message skipped", text, id),
                    );
                    return None;
                }
                Some(value) if value > u32::from(self.config.max_dlc()) => {
                    self.warn(
                        row.number,
                        format!(
                            "DLC {} of message 0x{:X} exceeds {}, using {}",
                            value,
                            id,
                            self.config.max_dlc(),
                            DEFAULT_DLC
                        ),
                    );
                    DEFAULT_DLC
                }
                Some(value) => value as u8,
            },
        };

        let fallback = format!("MSG_0x{:X}", id);
        let name = match row.cell_opt(self.roles.column(ColumnRole::MessageName)) {
            None => fallback,
            Some(text) => match to_identifier(text) {
                Some(name) => name,
                None => {
                    self.warn(
                        row.number,
                        format!("message name {:?} has no usable characters, using {}", text, fallback),
                    );
                    fallback
                }
            },
        };

        let sender = self.resolve_sender(row, id);

        let (message, inserted) = self.model.open_message(Message {
            id,
            name,
            dlc,
            sender: sender.clone(),
            signals: Vec::new(),
            row: row.number,
        });

        if inserted {
            log::debug!("Message 0x{:X} {} opened at row {}", id, message.name, row.number);
        } else {
            log::debug!("Message 0x{:X} header repeated at row {}", id, row.number);
            if message.sender.is_unspecified() && !sender.is_unspecified() {
                message.sender = sender;
            }
        }

        Some(id)
    }

    /// First node (column order) whose cell reads the Tx marker
    fn resolve_sender(&mut self, row: MatrixRow<'_>, id: u32) -> NodeRef {
        let senders: Vec<&Node> = self
            .nodes
            .iter()
            .filter(|node| row.cell(node.column).is_some_and(|c| self.config.is_tx(c)))
            .collect();

        match senders.as_slice() {
            [] => NodeRef::Unspecified,
            [only] => NodeRef::named(only.name.clone()),
            [first, ..] => {
                let first = NodeRef::named(first.name.clone());
                self.warn(
                    row.number,
                    format!("message 0x{:X} has several Tx nodes, using {}", id, first),
                );
                first
            }
        }
    }

    fn append_signal(&mut self, row: MatrixRow<'_>, id: u32, name: &str) {
        let ident = match to_identifier(name) {
            Some(ident) => ident,
            None => {
                let fallback = format!("SIG_ROW{}", row.number);
                self.warn(
                    row.number,
                    format!("signal name {:?} has no usable characters, using {}", name, fallback),
                );
                fallback
            }
        };

        let signal = match self.build_signal(row, &ident) {
            Ok(signal) => signal,
            Err(reason) => {
                self.warn(row.number, format!("signal {:?} skipped: {}", name, reason));
                return;
            }
        };

        let Some(message) = self.model.get_mut(id) else {
            return;
        };

        let fits = layout::fits_in_payload(signal.start_bit, signal.length, message.bit_capacity());
        let capacity = message.bit_capacity();
        log::trace!("Signal {} -> message 0x{:X}", signal.name, id);
        message.signals.push(signal);

        if !fits {
            self.warn(
                row.number,
                format!(
                    "signal {:?} exceeds the {}-bit payload of message 0x{:X}",
                    name, capacity, id
                ),
            );
        }
    }

    /// Build a signal from its row, substituting defaults for empty cells
    fn build_signal(&self, row: MatrixRow<'_>, name: &str) -> std::result::Result<Signal, String> {
        let cell = |role: ColumnRole| row.cell_opt(self.roles.column(role));

        let count = |role: ColumnRole, default: u32| -> std::result::Result<u32, String> {
            match cell(role) {
                None => Ok(default),
                Some(text) => parse_count(text)
                    .ok_or_else(|| format!("{} {:?} is not a non-negative integer", role, text)),
            }
        };

        let number = |role: ColumnRole, default: f64| -> std::result::Result<f64, String> {
            match cell(role) {
                None => Ok(default),
                Some(text) => {
                    parse_number(text).ok_or_else(|| format!("{} {:?} is not a number", role, text))
                }
            }
        };

        let byte_order = match cell(ColumnRole::ByteOrder) {
            None => ByteOrder::default(),
            Some(text) => ByteOrder::from_cell(text).unwrap_or_else(|| {
                log::debug!("Row {}: unknown byte order {:?}, using Motorola", row.number, text);
                ByteOrder::Motorola
            }),
        };

        let value_type = match cell(ColumnRole::ValueType) {
            None => ValueType::default(),
            Some(text) => ValueType::from_cell(text).unwrap_or_else(|| {
                log::debug!("Row {}: unknown value type {:?}, using Unsigned", row.number, text);
                ValueType::Unsigned
            }),
        };

        let start_byte = count(ColumnRole::StartByte, 0)?;
        let bit_in_byte = count(ColumnRole::StartBit, DEFAULT_START_BIT)?;
        let length = count(ColumnRole::SignalLength, DEFAULT_SIGNAL_LENGTH)?;
        if length == 0 || length > MAX_SIGNAL_LENGTH {
            return Err(format!("length {} outside 1-{}", length, MAX_SIGNAL_LENGTH));
        }

        let start_bit = layout::absolute_start_bit(start_byte, bit_in_byte, byte_order)
            .ok_or_else(|| format!("start position {}/{} overflows", start_byte, bit_in_byte))?;

        let receivers: Vec<NodeRef> = self
            .nodes
            .iter()
            .filter(|node| row.cell(node.column).is_some_and(|c| self.config.is_rx(c)))
            .map(|node| NodeRef::named(node.name.clone()))
            .collect();

        Ok(Signal {
            name: name.to_string(),
            start_bit,
            length,
            byte_order,
            value_type,
            factor: number(ColumnRole::Factor, DEFAULT_FACTOR)?,
            offset: number(ColumnRole::Offset, DEFAULT_OFFSET)?,
            min: number(ColumnRole::Min, 0.0)?,
            max: number(ColumnRole::Max, 0.0)?,
            unit: cell(ColumnRole::Unit).unwrap_or_default().replace('"', ""),
            receivers: if receivers.is_empty() {
                vec![NodeRef::Unspecified]
            } else {
                receivers
            },
            row: row.number,
        })
    }
}

/// Assemble the message/signal graph of a matrix
pub fn assemble(
    table: &MatrixTable,
    roles: &ColumnRoleMap,
    nodes: &[Node],
    config: &ConverterConfig,
) -> Assembly {
    RowAssembler::new(roles, nodes, config).assemble(table)
}
