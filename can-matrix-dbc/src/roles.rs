//! Column role resolution
//!
//! Matrix authors label their columns freely ("Msg ID\n报文标识符",
//! "Message Id", "报文ID", ...). The resolver looks at every header label once
//! and assigns it a semantic role using ordered keyword tables, so the rest of
//! the pipeline only ever asks "which column holds the start bit?".

use crate::config::ConverterConfig;
use crate::nodes::is_node_column;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Semantic role of a matrix column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ColumnRole {
    MessageId,
    MessageName,
    Dlc,
    SignalName,
    StartByte,
    StartBit,
    SignalLength,
    ByteOrder,
    ValueType,
    Factor,
    Offset,
    Min,
    Max,
    Unit,
    /// Tx/Rx indicator column of one node; the node is named by the label
    NodeIndicator,
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnRole::MessageId => "message id",
            ColumnRole::MessageName => "message name",
            ColumnRole::Dlc => "DLC",
            ColumnRole::SignalName => "signal name",
            ColumnRole::StartByte => "start byte",
            ColumnRole::StartBit => "start bit",
            ColumnRole::SignalLength => "signal length",
            ColumnRole::ByteOrder => "byte order",
            ColumnRole::ValueType => "value type",
            ColumnRole::Factor => "factor",
            ColumnRole::Offset => "offset",
            ColumnRole::Min => "min",
            ColumnRole::Max => "max",
            ColumnRole::Unit => "unit",
            ColumnRole::NodeIndicator => "node indicator",
        };
        write!(f, "{}", name)
    }
}

/// Keyword patterns per role, tested in declaration order
///
/// A label matches a pattern when it contains every token of the pattern
/// (after lower-casing and collapsing whitespace). ASCII tokens must stand as
/// whole words, so `min` does not match `ADMIN_P`. The first role with a
/// matching pattern wins. New synonyms or locales are added here.
pub const ROLE_KEYWORDS: &[(ColumnRole, &[&[&str]])] = &[
    (
        ColumnRole::MessageId,
        &[&["msg", "id"], &["message", "id"], &["frame", "id"], &["报文标识符"], &["报文id"]],
    ),
    (
        ColumnRole::MessageName,
        &[&["msg", "name"], &["message", "name"], &["frame", "name"], &["报文名称"]],
    ),
    (
        ColumnRole::Dlc,
        &[&["msg", "length"], &["message", "length"], &["dlc"], &["报文长度"]],
    ),
    (
        ColumnRole::SignalName,
        &[&["signal", "name"], &["signal", "名称"], &["信号名称"]],
    ),
    (ColumnRole::StartByte, &[&["start byte"], &["起始字节"]]),
    (ColumnRole::StartBit, &[&["start bit"], &["起始位"]]),
    (
        ColumnRole::SignalLength,
        &[&["bit length"], &["signal length"], &["信号长度"]],
    ),
    (ColumnRole::ByteOrder, &[&["byte order"], &["排列格式"], &["字节序"]]),
    (
        ColumnRole::ValueType,
        &[&["date type"], &["data type"], &["value type"], &["数据类型"]],
    ),
    (ColumnRole::Factor, &[&["factor"], &["resolution"], &["比例因子"]]),
    (ColumnRole::Offset, &[&["offset"], &["偏移量"]]),
    (ColumnRole::Min, &[&["min"], &["最小值"]]),
    (ColumnRole::Max, &[&["max"], &["最大值"]]),
    (ColumnRole::Unit, &[&["unit"], &["单位"]]),
];

/// Roles without which no message or signal can be extracted
pub const REQUIRED_ROLES: &[ColumnRole] = &[ColumnRole::MessageId, ColumnRole::SignalName];

/// A node indicator column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeColumn {
    /// Full column label, which is also the node name
    pub label: String,
    /// Column index in the matrix
    pub index: usize,
}

/// Immutable mapping from matrix columns to semantic roles
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnRoleMap {
    /// Keyword roles: at most one column each
    columns: HashMap<ColumnRole, usize>,
    /// Role per raw label, node indicators included
    labels: HashMap<String, ColumnRole>,
    /// Node indicator columns in source order
    node_columns: Vec<NodeColumn>,
    /// Labels that matched no role
    unmapped: Vec<String>,
}

impl ColumnRoleMap {
    /// Column index for a keyword role
    pub fn column(&self, role: ColumnRole) -> Option<usize> {
        self.columns.get(&role).copied()
    }

    /// Role assigned to a raw label
    pub fn role_of(&self, label: &str) -> Option<ColumnRole> {
        self.labels.get(label).copied()
    }

    /// Node indicator columns in source order
    pub fn node_columns(&self) -> &[NodeColumn] {
        &self.node_columns
    }

    /// Labels ignored by every later stage
    pub fn unmapped(&self) -> &[String] {
        &self.unmapped
    }

    /// Required roles that no column provides
    pub fn missing_required(&self) -> Vec<ColumnRole> {
        REQUIRED_ROLES
            .iter()
            .copied()
            .filter(|role| !self.columns.contains_key(role))
            .collect()
    }

    /// Keyword roles that no column provides
    pub fn missing_roles(&self) -> Vec<ColumnRole> {
        ROLE_KEYWORDS
            .iter()
            .map(|(role, _)| *role)
            .filter(|role| !self.columns.contains_key(role))
            .collect()
    }
}

/// Lower-case a label and collapse every whitespace run (line breaks included)
fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Whether `token` occurs in `label` as a word
///
/// An ASCII token may not touch an ASCII letter or digit on either side.
/// Other tokens (Chinese keywords) match anywhere.
fn contains_word(label: &str, token: &str) -> bool {
    if !token.is_ascii() {
        return label.contains(token);
    }

    label.match_indices(token).any(|(start, _)| {
        let before = label[..start].chars().next_back();
        let after = label[start + token.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_alphanumeric()) && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}

/// Keyword role for a single label, if any
pub fn match_role(label: &str) -> Option<ColumnRole> {
    let normalized = normalize_label(label);
    if normalized.is_empty() {
        return None;
    }

    ROLE_KEYWORDS
        .iter()
        .find(|(_, patterns)| {
            patterns
                .iter()
                .any(|tokens| tokens.iter().all(|token| contains_word(&normalized, token)))
        })
        .map(|(role, _)| *role)
}

/// Assign a role to every header label
///
/// Keyword roles are tried first; labels without a keyword match are tested
/// against the structural node column rule. When two labels match the same
/// keyword role the first one keeps it and the later one is left unmapped.
pub fn resolve(headers: &[String], config: &ConverterConfig) -> ColumnRoleMap {
    let mut map = ColumnRoleMap::default();

    for (index, label) in headers.iter().enumerate() {
        if label.is_empty() || map.labels.contains_key(label) {
            continue;
        }

        if let Some(role) = match_role(label) {
            if let Some(&first) = map.columns.get(&role) {
                log::debug!(
                    "Column {:?} also matches {} (already column {}), ignored",
                    label,
                    role,
                    first
                );
                map.unmapped.push(label.clone());
                continue;
            }
            log::debug!("Column {:?} -> {}", label, role);
            map.columns.insert(role, index);
            map.labels.insert(label.clone(), role);
        } else if is_node_column(label, config) {
            log::debug!("Column {:?} -> node indicator", label);
            map.labels.insert(label.clone(), ColumnRole::NodeIndicator);
            map.node_columns.push(NodeColumn {
                label: label.clone(),
                index,
            });
        } else {
            log::trace!("Column {:?} left unmapped", label);
            map.unmapped.push(label.clone());
        }
    }

    map
}
