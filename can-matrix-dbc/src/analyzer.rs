//! Regex-based DBC syntax analyzer
//!
//! Re-reads generated DBC text line by line and reports the required sections,
//! the declared nodes, every `BO_`/`SG_` definition and the `SG_` lines that do
//! not follow the grammar. Only the subset of DBC the encoder produces is
//! understood.

use regex::Regex;
use serde::Serialize;

type LazyRegex = once_cell::sync::Lazy<Regex>;

/// Sections every generated file must contain
pub const REQUIRED_SECTIONS: &[&str] = &["VERSION", "NS_", "BS_", "BU_"];

/// A parsed `BO_` line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedMessage {
    pub id: u32,
    pub name: String,
    pub dlc: u32,
    pub sender: String,
    /// 1-based line number
    pub line: usize,
}

/// A parsed `SG_` line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedSignal {
    /// ID of the enclosing `BO_`
    pub message_id: u32,
    pub name: String,
    pub start_bit: u32,
    pub length: u32,
    /// `@1` (Intel) when true, `@0` (Motorola) otherwise
    pub little_endian: bool,
    pub signed: bool,
    pub factor: f64,
    pub offset: f64,
    pub min: f64,
    pub max: f64,
    pub unit: String,
    pub receivers: Vec<String>,
    pub line: usize,
}

/// A line that looks like a definition but does not parse
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MalformedLine {
    pub line: usize,
    pub text: String,
    pub reason: String,
}

/// Result of analyzing one DBC text
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyntaxReport {
    /// Required sections that were not found
    pub missing_sections: Vec<String>,
    /// Node names of the `BU_` line
    pub nodes: Vec<String>,
    pub messages: Vec<ParsedMessage>,
    pub signals: Vec<ParsedSignal>,
    pub malformed: Vec<MalformedLine>,
}

impl SyntaxReport {
    /// True when every section is present and no line is malformed
    pub fn is_valid(&self) -> bool {
        self.missing_sections.is_empty() && self.malformed.is_empty()
    }

    /// Signals of one message, in file order
    pub fn signals_of(&self, message_id: u32) -> impl Iterator<Item = &ParsedSignal> {
        self.signals.iter().filter(move |s| s.message_id == message_id)
    }
}

/// Parse a `BO_` line
pub fn parse_message_line(line: &str) -> Option<(u32, String, u32, String)> {
    static RE: LazyRegex = LazyRegex::new(|| {
        Regex::new(r"^BO_ (?P<id>\d+) (?P<name>\w+) ?: (?P<dlc>\d+) (?P<sender>\w+)\s*$").unwrap()
    });

    let cap = RE.captures(line)?;
    Some((
        cap["id"].parse().ok()?,
        cap["name"].to_string(),
        cap["dlc"].parse().ok()?,
        cap["sender"].to_string(),
    ))
}

/// Parse an `SG_` line; the message ID is filled in by the caller
pub fn parse_signal_line(line: &str, message_id: u32, line_no: usize) -> Option<ParsedSignal> {
    static RE: LazyRegex = LazyRegex::new(|| {
        let num = r"[-+]?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?";
        Regex::new(&format!(
            r#"^\s*SG_ (?P<name>\w+)\s*(?:m\d+|M)?\s*:\s*(?P<start>\d+)\|(?P<len>\d+)@(?P<order>[01])(?P<sign>[+-])\s*\((?P<factor>{n}),(?P<offset>{n})\)\s*\[(?P<min>{n})\|(?P<max>{n})\]\s*"(?P<unit>[^"]*)"\s*(?P<receivers>.*)$"#,
            n = num
        ))
        .unwrap()
    });

    let cap = RE.captures(line)?;
    Some(ParsedSignal {
        message_id,
        name: cap["name"].to_string(),
        start_bit: cap["start"].parse().ok()?,
        length: cap["len"].parse().ok()?,
        little_endian: &cap["order"] == "1",
        signed: &cap["sign"] == "-",
        factor: cap["factor"].parse().ok()?,
        offset: cap["offset"].parse().ok()?,
        min: cap["min"].parse().ok()?,
        max: cap["max"].parse().ok()?,
        unit: cap["unit"].to_string(),
        receivers: cap["receivers"]
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect(),
        line: line_no,
    })
}

/// Analyze DBC text
pub fn analyze(text: &str) -> SyntaxReport {
    let mut report = SyntaxReport::default();
    let mut found = [false; 4];
    let mut current_message: Option<u32> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = raw.trim_start();

        let keyword = trimmed.split([' ', ':']).next().unwrap_or_default();
        if let Some(slot) = REQUIRED_SECTIONS.iter().position(|section| *section == keyword) {
            found[slot] = true;
        }

        if let Some(nodes) = trimmed.strip_prefix("BU_:") {
            report.nodes = nodes.split_whitespace().map(str::to_string).collect();
        } else if trimmed.starts_with("BO_ ") {
            match parse_message_line(trimmed) {
                Some((id, name, dlc, sender)) => {
                    current_message = Some(id);
                    report.messages.push(ParsedMessage {
                        id,
                        name,
                        dlc,
                        sender,
                        line: line_no,
                    });
                }
                None => {
                    current_message = None;
                    report.malformed.push(MalformedLine {
                        line: line_no,
                        text: raw.to_string(),
                        reason: "BO_ line does not match the message grammar".to_string(),
                    });
                }
            }
        } else if trimmed.starts_with("SG_ ") {
            let parsed = current_message.and_then(|id| parse_signal_line(raw, id, line_no));
            match (current_message, parsed) {
                (_, Some(signal)) => report.signals.push(signal),
                (None, None) => report.malformed.push(MalformedLine {
                    line: line_no,
                    text: raw.to_string(),
                    reason: "SG_ line outside of a message".to_string(),
                }),
                (Some(_), None) => report.malformed.push(MalformedLine {
                    line: line_no,
                    text: raw.to_string(),
                    reason: "SG_ line does not match the signal grammar".to_string(),
                }),
            }
        } else if trimmed.is_empty() {
            current_message = None;
        }
    }

    report.missing_sections = REQUIRED_SECTIONS
        .iter()
        .zip(found)
        .filter(|(_, present)| !present)
        .map(|(section, _)| section.to_string())
        .collect();

    log::debug!(
        "Analyzed DBC text: {} messages, {} signals, {} malformed lines",
        report.messages.len(),
        report.signals.len(),
        report.malformed.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "VERSION \"\"\n\n\nNS_ :\n NS_DESC_\n CM_\n\nBS_:\n\nBU_: VCU_P BMS_P Vector__XXX\n\n\nBO_ 256 EngineStatus: 8 VCU_P\n SG_ EngineSpeed : 0|16@1+ (0.1,0) [0|6553.5] \"rpm\" BMS_P\n SG_ EngineTemp : 16|8@1- (1,-40) [-40|215] \"degC\" BMS_P Vector__XXX\n\n";

    #[test]
    fn test_parse_message_line() {
        let (id, name, dlc, sender) = parse_message_line("BO_ 256 EngineStatus: 8 Vector__XXX").unwrap();
        assert_eq!(id, 256);
        assert_eq!(name, "EngineStatus");
        assert_eq!(dlc, 8);
        assert_eq!(sender, "Vector__XXX");
        assert!(parse_message_line("BO_ x EngineStatus: 8 A").is_none());
    }

    #[test]
    fn test_parse_signal_line() {
        let signal = parse_signal_line(
            r#" SG_ EngineTemp : 16|8@1- (1,-40) [-40|215] "degC" BMS_P Vector__XXX"#,
            256,
            14,
        )
        .unwrap();

        assert_eq!(signal.start_bit, 16);
        assert_eq!(signal.length, 8);
        assert!(signal.little_endian);
        assert!(signal.signed);
        assert_eq!(signal.offset, -40.0);
        assert_eq!(signal.min, -40.0);
        assert_eq!(signal.unit, "degC");
        assert_eq!(signal.receivers, vec!["BMS_P", "Vector__XXX"]);
    }

    #[test]
    fn test_analyze_sample() {
        let report = analyze(SAMPLE);

        assert!(report.is_valid());
        assert_eq!(report.nodes, vec!["VCU_P", "BMS_P", "Vector__XXX"]);
        assert_eq!(report.messages.len(), 1);
        assert_eq!(report.signals_of(256).count(), 2);
        assert_eq!(report.signals[0].factor, 0.1);
        assert_eq!(report.signals[0].max, 6553.5);
    }

    #[test]
    fn test_malformed_and_missing() {
        let text = "BO_ 1 Msg: 8 Vector__XXX\n SG_ Broken : 0|8@2+ (1,0) [0|0] \"\" A\n\n SG_ Orphan : 0|8@1+ (1,0) [0|0] \"\" A\n";
        let report = analyze(text);

        assert!(!report.is_valid());
        assert_eq!(report.malformed.len(), 2);
        assert_eq!(report.malformed[0].line, 2);
        assert_eq!(report.malformed[1].line, 4);
        assert_eq!(report.missing_sections, vec!["VERSION", "NS_", "BS_", "BU_"]);
    }
}
