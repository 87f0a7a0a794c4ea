//! Message and signal model
//!
//! The object graph built from one matrix: messages in extraction order, each
//! owning its signals. The graph lives for a single conversion run.

use crate::types::{ByteOrder, NodeRef, ValueType};
use serde::Serialize;
use std::collections::HashMap;

/// A CAN message extracted from a header row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// CAN message ID (decimal form is used in DBC text)
    pub id: u32,
    /// Message name
    pub name: String,
    /// Data length code
    pub dlc: u8,
    /// Transmitting node, or the default marker
    pub sender: NodeRef,
    /// Signals in row order
    pub signals: Vec<Signal>,
    /// Spreadsheet row of the first header row
    pub row: usize,
}

impl Message {
    /// Bit capacity of the payload (DLC bytes, 64 bytes at most)
    pub fn bit_capacity(&self) -> u32 {
        u32::from(dlc_to_bytes(self.dlc)) * 8
    }

    /// Check whether any node of the given set sends or receives this message
    pub fn references_any(&self, nodes: &[String]) -> bool {
        let sender_hit = self
            .sender
            .name()
            .is_some_and(|name| nodes.iter().any(|n| n == name));
        sender_hit
            || self.signals.iter().any(|signal| {
                signal
                    .receivers
                    .iter()
                    .filter_map(NodeRef::name)
                    .any(|name| nodes.iter().any(|n| n == name))
            })
    }

    /// Check whether the message names any real node at all
    pub fn has_node_reference(&self) -> bool {
        !self.sender.is_unspecified()
            || self
                .signals
                .iter()
                .any(|signal| signal.receivers.iter().any(|r| !r.is_unspecified()))
    }
}

/// A signal extracted from a signal row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    /// Signal name
    pub name: String,
    /// Absolute start bit in Intel numbering
    pub start_bit: u32,
    /// Length in bits (1-64)
    pub length: u32,
    /// Byte order declared in the matrix (metadata only)
    pub byte_order: ByteOrder,
    /// Value type (signed/unsigned)
    pub value_type: ValueType,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Minimum physical value
    pub min: f64,
    /// Maximum physical value
    pub max: f64,
    /// Engineering unit, empty when not given
    pub unit: String,
    /// Receiving nodes; `[Unspecified]` when none were marked
    pub receivers: Vec<NodeRef>,
    /// Spreadsheet row of the signal
    pub row: usize,
}

/// Payload size in bytes for a DLC (CAN-FD codes 9-15 map to 12..64 bytes)
pub fn dlc_to_bytes(dlc: u8) -> u8 {
    match dlc {
        0..=8 => dlc,
        9 => 12,
        10 => 16,
        11 => 20,
        12 => 24,
        13 => 32,
        14 => 48,
        _ => 64,
    }
}

/// All messages extracted from one matrix
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatrixModel {
    /// Messages in extraction order
    messages: Vec<Message>,
    /// Message index by CAN ID
    #[serde(skip)]
    index: HashMap<u32, usize>,
}

impl MatrixModel {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message, or return the existing one with the same ID
    ///
    /// Returns the message and whether it was newly inserted.
    pub fn open_message(&mut self, message: Message) -> (&mut Message, bool) {
        match self.index.get(&message.id) {
            Some(&idx) => (&mut self.messages[idx], false),
            None => {
                let idx = self.messages.len();
                self.index.insert(message.id, idx);
                self.messages.push(message);
                (&mut self.messages[idx], true)
            }
        }
    }

    /// Get a message by CAN ID
    pub fn get(&self, id: u32) -> Option<&Message> {
        self.index.get(&id).map(|&idx| &self.messages[idx])
    }

    /// Get a mutable message by CAN ID
    pub fn get_mut(&mut self, id: u32) -> Option<&mut Message> {
        match self.index.get(&id) {
            Some(&idx) => self.messages.get_mut(idx),
            None => None,
        }
    }

    /// Messages in extraction order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Model statistics
    pub fn stats(&self) -> ModelStats {
        ModelStats {
            num_messages: self.messages.len(),
            num_signals: self.messages.iter().map(|m| m.signals.len()).sum(),
        }
    }
}

/// Model statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelStats {
    /// Total number of messages
    pub num_messages: usize,
    /// Total number of signals
    pub num_signals: usize,
}
