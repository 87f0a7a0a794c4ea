//! Core types for the CAN matrix converter library
//!
//! This module defines the fundamental types shared by every stage of the
//! pipeline: the error type, signal encoding enums, the node reference used for
//! senders and receivers, and the diagnostics collected while a matrix is
//! converted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Result type for converter operations
pub type Result<T> = std::result::Result<T, ConverterError>;

/// Name written for a sender or receiver when no real node is known
pub const DEFAULT_NODE_NAME: &str = "Vector__XXX";

/// Errors that abort a conversion run or the generation of one bus
#[derive(Debug, thiserror::Error)]
pub enum ConverterError {
    #[error("Matrix has no header row")]
    MissingHeader,

    #[error("Matrix has no data rows")]
    NoRows,

    #[error("Unknown bus: {0}")]
    UnknownBus(String),

    #[error("No data for bus {0}")]
    EmptyBus(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to write {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Byte order declared for a signal in the matrix
///
/// Carried as metadata only: the bit layout is always computed in the Intel
/// numbering and every `SG_` line is written with `@1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    Intel,
    /// Big-endian (Motorola format)
    #[default]
    Motorola,
}

impl ByteOrder {
    /// Interpret a byte order cell ("Intel", "Motorola MSB", "little endian", ...)
    ///
    /// Returns `None` for text that names neither convention.
    pub fn from_cell(text: &str) -> Option<Self> {
        let lower = text.trim().to_lowercase();
        if lower.contains("intel") || lower.contains("little") {
            Some(ByteOrder::Intel)
        } else if lower.contains("motorola") || lower.contains("big") {
            Some(ByteOrder::Motorola)
        } else {
            None
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteOrder::Intel => write!(f, "Intel"),
            ByteOrder::Motorola => write!(f, "Motorola"),
        }
    }
}

/// Signedness of a signal's raw value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValueType {
    /// Signed integer
    Signed,
    /// Unsigned integer
    #[default]
    Unsigned,
}

impl ValueType {
    /// Interpret a value type cell ("Unsigned", "Signed", "无符号", ...)
    pub fn from_cell(text: &str) -> Option<Self> {
        let lower = text.trim().to_lowercase();
        // "unsigned" contains "signed", so it has to be tested first
        if lower.contains("unsigned") || lower.contains("无符号") {
            Some(ValueType::Unsigned)
        } else if lower.contains("signed") || lower.contains("有符号") {
            Some(ValueType::Signed)
        } else {
            None
        }
    }

    /// DBC sign character: `+` for unsigned, `-` for signed
    pub fn sign_char(&self) -> char {
        match self {
            ValueType::Unsigned => '+',
            ValueType::Signed => '-',
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Signed => write!(f, "Signed"),
            ValueType::Unsigned => write!(f, "Unsigned"),
        }
    }
}

/// Reference to a sender or receiver node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum NodeRef {
    /// No specific node is known (`Vector__XXX` in DBC text)
    #[default]
    Unspecified,
    /// A node named by its indicator column label
    Named(String),
}

impl NodeRef {
    /// Create a reference to a named node
    pub fn named(name: impl Into<String>) -> Self {
        NodeRef::Named(name.into())
    }

    /// Node name, `None` for the default marker
    pub fn name(&self) -> Option<&str> {
        match self {
            NodeRef::Named(name) => Some(name),
            NodeRef::Unspecified => None,
        }
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, NodeRef::Unspecified)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Named(name) => write!(f, "{}", name),
            NodeRef::Unspecified => write!(f, "{}", DEFAULT_NODE_NAME),
        }
    }
}

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A recoverable problem found while converting a matrix
///
/// Row-level issues and role-inference gaps are never fatal; they are reported
/// here and processing continues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Spreadsheet row number (header = row 1), if the issue belongs to a row
    pub row: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(row: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            row,
            message: message.into(),
        }
    }

    pub fn error(row: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            row,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "row {}: {}", row, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}
