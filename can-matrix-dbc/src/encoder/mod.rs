//! DBC encoder
//!
//! Renders the nodes and messages of one bus into DBC text. Section order is
//! fixed: `VERSION`, `NS_`, `BS_`, `BU_`, the `BO_`/`SG_` blocks, attribute
//! definitions and assignments, then one `VAL_` line per signal. The output is
//! reduced to ASCII with LF line endings.

pub mod format;
pub mod sanitize;

pub use format::format_number;
pub use sanitize::to_ascii;

use crate::model::Message;
use crate::types::{NodeRef, DEFAULT_NODE_NAME};
use std::fmt;

/// Keywords declared in the `NS_` block of every file
pub const NS_KEYWORDS: &[&str] = &[
    "NS_DESC_",
    "CM_",
    "BA_DEF_",
    "BA_",
    "VAL_",
    "CAT_DEF_",
    "CAT_",
    "FILTER",
    "BA_DEF_DEF_",
    "EV_DATA_",
    "ENVVAR_DATA_",
    "SGTYPE_",
    "SGTYPE_VAL_",
    "BA_DEF_SGTYPE_",
    "BA_SGTYPE_",
    "SIG_TYPE_REF_",
    "VAL_TABLE_",
    "SIG_GROUP_",
    "SIG_VALTYPE_",
    "SIGTYPE_VALTYPE_",
    "BO_TX_BU_",
    "BA_DEF_REL_",
    "BA_REL_",
    "BA_DEF_DEF_REL_",
    "BU_SG_REL_",
    "BU_EV_REL_",
    "BU_BO_REL_",
    "SG_MUL_VAL_",
];

/// Attribute definitions, defaults and network attributes shared by every file
pub const ATTRIBUTE_DEFINITIONS: &str = include_str!("../../assets/attribute_definitions.dbc");

/// Literal `GenMsgSendType` value assigned to every message
pub const MSG_SEND_TYPE: u32 = 0;

/// Literal `GenMsgCycleTime` value assigned to every message
pub const MSG_CYCLE_TIME: u32 = 100;

/// Literal `GenSigStartValue` value assigned to every signal
pub const SIG_START_VALUE: u32 = 0;

/// `@1` layout marker; start bits are always in Intel numbering
const LAYOUT_MARKER: char = '1';

/// One bus worth of DBC content
///
/// `Display` produces the raw text; [`encode`] adds the ASCII pass.
#[derive(Debug, Clone, Copy)]
pub struct DbcDocument<'a> {
    /// Node names for the `BU_` line
    pub nodes: &'a [String],
    /// Messages in extraction order
    pub messages: &'a [Message],
}

impl<'a> DbcDocument<'a> {
    pub fn new(nodes: &'a [String], messages: &'a [Message]) -> Self {
        Self { nodes, messages }
    }

    fn write_header(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VERSION \"\"\n\n\n")?;

        writeln!(f, "NS_ :")?;
        for keyword in NS_KEYWORDS {
            writeln!(f, " {}", keyword)?;
        }
        writeln!(f)?;

        write!(f, "BS_:\n\n")
    }

    fn write_nodes(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BU_:")?;
        for node in self.nodes {
            write!(f, " {}", node)?;
        }
        if !self.nodes.iter().any(|n| n == DEFAULT_NODE_NAME) {
            write!(f, " {}", DEFAULT_NODE_NAME)?;
        }
        write!(f, "\n\n\n")
    }

    fn write_messages(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for message in self.messages {
            writeln!(
                f,
                "BO_ {} {}: {} {}",
                message.id, message.name, message.dlc, message.sender
            )?;

            for signal in &message.signals {
                write!(
                    f,
                    " SG_ {} : {}|{}@{}{} ({},{}) [{}|{}] \"{}\" ",
                    signal.name,
                    signal.start_bit,
                    signal.length,
                    LAYOUT_MARKER,
                    signal.value_type.sign_char(),
                    format_number(signal.factor),
                    format_number(signal.offset),
                    format_number(signal.min),
                    format_number(signal.max),
                    signal.unit,
                )?;
                write_receivers(f, &signal.receivers)?;
                writeln!(f)?;
            }
            writeln!(f)?;
        }
        writeln!(f)
    }

    fn write_attributes(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ATTRIBUTE_DEFINITIONS)?;
        writeln!(f)?;

        for message in self.messages {
            writeln!(f, "BA_ \"GenMsgSendType\" BO_ {} {};", message.id, MSG_SEND_TYPE)?;
            writeln!(f, "BA_ \"GenMsgCycleTime\" BO_ {} {};", message.id, MSG_CYCLE_TIME)?;
            for signal in &message.signals {
                writeln!(
                    f,
                    "BA_ \"GenSigStartValue\" SG_ {} {} {};",
                    message.id, signal.name, SIG_START_VALUE
                )?;
            }
        }
        writeln!(f)
    }

    fn write_value_tables(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for message in self.messages {
            for signal in &message.signals {
                writeln!(f, "VAL_ {} {} ;", message.id, signal.name)?;
            }
        }
        writeln!(f)
    }
}

fn write_receivers(f: &mut fmt::Formatter<'_>, receivers: &[NodeRef]) -> fmt::Result {
    if receivers.is_empty() {
        return write!(f, "{}", NodeRef::Unspecified);
    }
    for (i, receiver) in receivers.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", receiver)?;
    }
    Ok(())
}

impl fmt::Display for DbcDocument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_header(f)?;
        self.write_nodes(f)?;
        self.write_messages(f)?;
        self.write_attributes(f)?;
        self.write_value_tables(f)
    }
}

/// Encode one bus into ASCII DBC text
pub fn encode(nodes: &[String], messages: &[Message]) -> String {
    to_ascii(&DbcDocument::new(nodes, messages).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Signal;
    use crate::types::{ByteOrder, ValueType};

    fn engine_status() -> Message {
        Message {
            id: 256,
            name: "EngineStatus".to_string(),
            dlc: 8,
            sender: NodeRef::Unspecified,
            signals: vec![Signal {
                name: "EngineSpeed".to_string(),
                start_bit: 0,
                length: 16,
                byte_order: ByteOrder::Motorola,
                value_type: ValueType::Unsigned,
                factor: 0.1,
                offset: 0.0,
                min: 0.0,
                max: 0.0,
                unit: String::new(),
                receivers: vec![NodeRef::Unspecified],
                row: 3,
            }],
            row: 2,
        }
    }

    #[test]
    fn test_message_and_signal_lines() {
        let text = encode(&[], &[engine_status()]);

        assert!(text.contains("BO_ 256 EngineStatus: 8 Vector__XXX\n"));
        assert!(text.contains(" SG_ EngineSpeed : 0|16@1+ (0.1,0) [0|0] \"\" Vector__XXX\n"));
        assert!(text.contains("BA_ \"GenMsgSendType\" BO_ 256 0;"));
        assert!(text.contains("BA_ \"GenMsgCycleTime\" BO_ 256 100;"));
        assert!(text.contains("BA_ \"GenSigStartValue\" SG_ 256 EngineSpeed 0;"));
        assert!(text.contains("VAL_ 256 EngineSpeed ;"));
    }

    #[test]
    fn test_section_order() {
        let text = encode(&["VCU_P".to_string()], &[engine_status()]);
        let positions: Vec<usize> = ["VERSION \"\"", "NS_ :", "BS_:", "BU_:", "BO_ ", "BA_DEF_ ", "BA_ \"GenMsg", "VAL_ "]
            .iter()
            .map(|marker| text.find(marker).unwrap())
            .collect();

        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
        assert!(text.starts_with("VERSION \"\"\n\n\nNS_ :\n NS_DESC_\n"));
    }

    #[test]
    fn test_node_list_gets_default_marker_once() {
        let text = encode(&["VCU_P".to_string(), "BMS_P".to_string()], &[]);
        assert!(text.contains("BU_: VCU_P BMS_P Vector__XXX\n"));

        let text = encode(&["Vector__XXX".to_string()], &[]);
        assert!(text.contains("BU_: Vector__XXX\n"));
    }

    #[test]
    fn test_namespace_block_is_fixed() {
        let text = encode(&[], &[]);
        for keyword in NS_KEYWORDS {
            assert!(text.contains(&format!("\n {}\n", keyword)));
        }
        assert_eq!(NS_KEYWORDS.len(), 28);
        assert!(text.contains("BA_ \"DBName\" \"Generated_DBC_File\";"));
    }

    #[test]
    fn test_signed_signal_and_receivers() {
        let mut message = engine_status();
        message.sender = NodeRef::named("VCU_P");
        message.signals[0].value_type = ValueType::Signed;
        message.signals[0].offset = -40.0;
        message.signals[0].unit = "Ω".to_string();
        message.signals[0].receivers = vec![NodeRef::named("BMS_P"), NodeRef::named("TBOX_P")];

        let text = encode(&[], &[message]);
        assert!(text.contains("BO_ 256 EngineStatus: 8 VCU_P\n"));
        assert!(text.contains("@1- (0.1,-40) [0|0] \"Ohm\" BMS_P TBOX_P\n"));
    }

    #[test]
    fn test_output_is_ascii_and_repeatable() {
        let mut message = engine_status();
        message.name = "引擎EngineStatus".to_string();
        let first = encode(&[], &[message.clone()]);
        let second = encode(&[], &[message]);

        assert!(first.is_ascii());
        assert!(!first.contains('\r'));
        assert_eq!(first, second);
    }
}
