//! Main converter API
//!
//! The `Converter` is the entry point of the library. It runs the pipeline
//! (resolve roles, classify nodes and buses, assemble rows) over a matrix and
//! returns a [`Conversion`] from which one DBC artifact per bus is rendered
//! and written. Failures while generating one bus never affect the others.

use crate::assembler;
use crate::config::ConverterConfig;
use crate::encoder;
use crate::model::{MatrixModel, Message, ModelStats};
use crate::nodes::{self, Bus, BusPartition};
use crate::roles::{self, ColumnRoleMap};
use crate::table::MatrixTable;
use crate::types::{ConverterError, Diagnostic, NodeRef, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// File extension of generated artifacts
pub const DBC_EXTENSION: &str = "dbc";

/// The converter - entry point for all conversion operations
#[derive(Debug, Clone, Default)]
pub struct Converter {
    config: ConverterConfig,
}

impl Converter {
    /// Create a converter, rejecting unusable configurations
    ///
    /// # Example
    /// ```
    /// use can_matrix_dbc::{Converter, ConverterConfig, MatrixTable};
    ///
    /// let table = MatrixTable::new(
    ///     vec!["Msg ID", "Msg Name", "Signal Name", "Bit Length"],
    ///     vec![
    ///         vec!["0x100", "EngineStatus", "", ""],
    ///         vec!["", "", "EngineSpeed", "16"],
    ///     ],
    /// )
    /// .unwrap();
    ///
    /// let converter = Converter::new(ConverterConfig::new()).unwrap();
    /// let conversion = converter.convert(&table);
    /// let rendered = conversion.render_all();
    /// assert_eq!(rendered.len(), 1);
    /// ```
    pub fn new(config: ConverterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Run role resolution, bus classification and row assembly
    pub fn convert(&self, table: &MatrixTable) -> Conversion {
        log::info!(
            "Converting matrix: {} columns, {} data rows",
            table.headers().len(),
            table.row_count()
        );

        let roles = roles::resolve(table.headers(), &self.config);
        let mut diagnostics = Vec::new();
        for role in roles.missing_required() {
            let message = format!("no column provides the {} role, dependent fields are not extracted", role);
            log::warn!("{}", message);
            diagnostics.push(Diagnostic::warning(None, message));
        }

        let partition = nodes::classify(table, &roles);
        let assembly = assembler::assemble(table, &roles, &partition.nodes, &self.config);
        diagnostics.extend(assembly.diagnostics);

        if !partition.is_default() {
            for message in assembly.model.messages() {
                if !message.has_node_reference() {
                    let text = format!(
                        "message 0x{:X} {} has no Tx/Rx node, not assigned to any bus",
                        message.id, message.name
                    );
                    log::warn!("{}", text);
                    diagnostics.push(Diagnostic::warning(Some(message.row), text));
                }
            }
        }

        Conversion {
            config: self.config.clone(),
            roles,
            partition,
            model: assembly.model,
            diagnostics,
        }
    }

    /// Convert and write every artifact next to `base`
    pub fn convert_to_files(&self, table: &MatrixTable, base: &Path) -> (Conversion, Vec<Result<BusArtifact>>) {
        let conversion = self.convert(table);
        let artifacts = conversion.write_all(base);
        (conversion, artifacts)
    }
}

/// DBC text of one bus
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedBus {
    pub bus: String,
    pub text: String,
    pub num_messages: usize,
    pub num_signals: usize,
}

/// An artifact written to disk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusArtifact {
    pub bus: String,
    pub path: PathBuf,
    pub num_messages: usize,
    pub num_signals: usize,
}

/// Outcome of running the pipeline over one matrix
#[derive(Debug, Clone)]
pub struct Conversion {
    config: ConverterConfig,
    pub roles: ColumnRoleMap,
    pub partition: BusPartition,
    pub model: MatrixModel,
    pub diagnostics: Vec<Diagnostic>,
}

impl Conversion {
    /// Model statistics
    pub fn stats(&self) -> ModelStats {
        self.model.stats()
    }

    /// Buses selected for generation (all, or the one named by the bus filter)
    pub fn selected_buses(&self) -> Result<Vec<&Bus>> {
        match self.config.bus_filter.as_deref() {
            None => Ok(self.partition.buses.iter().collect()),
            Some(query) => self
                .partition
                .find_bus(query)
                .map(|bus| vec![bus])
                .ok_or_else(|| ConverterError::UnknownBus(query.to_string())),
        }
    }

    /// Messages of one bus, with off-bus nodes rewritten to the default marker
    ///
    /// Applies the node filter when one is configured.
    pub fn bus_messages(&self, bus: &Bus) -> Vec<Message> {
        let node_filter = self.config.node_filter.as_deref();
        if let Some(node) = node_filter {
            if !bus.has_node(node) {
                log::debug!("Node {} is not on bus {}", node, bus.name);
                return Vec::new();
            }
        }

        self.model
            .messages()
            .iter()
            .filter(|message| bus.is_default() || message.references_any(&bus.nodes))
            .filter_map(|message| {
                let message = match node_filter {
                    Some(node) => filter_for_node(message, node)?,
                    None => message.clone(),
                };
                Some(localize(message, bus))
            })
            .collect()
    }

    /// Node list of the `BU_` line for a bus
    pub fn bus_node_list(&self, bus: &Bus) -> Vec<String> {
        let mut nodes = bus.nodes.clone();
        if let Some(controller) = self.config.controller_name.as_deref() {
            let controller = controller.trim();
            if !controller.is_empty() && !nodes.iter().any(|n| n == controller) {
                nodes.push(controller.to_string());
            }
        }
        nodes
    }

    /// Render the DBC text of one bus
    pub fn render_bus(&self, bus: &Bus) -> Result<RenderedBus> {
        let messages = self.bus_messages(bus);
        if !messages.iter().any(|m| !m.signals.is_empty()) {
            return Err(ConverterError::EmptyBus(bus.name.clone()));
        }

        let nodes = self.bus_node_list(bus);
        let text = encoder::encode(&nodes, &messages);
        log::debug!("Rendered bus {}: {} bytes", bus.name, text.len());

        Ok(RenderedBus {
            bus: bus.name.clone(),
            text,
            num_messages: messages.len(),
            num_signals: messages.iter().map(|m| m.signals.len()).sum(),
        })
    }

    /// Render every selected bus, one result per bus
    pub fn render_all(&self) -> Vec<Result<RenderedBus>> {
        match self.selected_buses() {
            Ok(buses) => buses.into_iter().map(|bus| self.render_bus(bus)).collect(),
            Err(e) => vec![Err(e)],
        }
    }

    /// Render and write every selected bus next to `base`
    pub fn write_all(&self, base: &Path) -> Vec<Result<BusArtifact>> {
        self.render_all()
            .into_iter()
            .map(|rendered| {
                let rendered = rendered?;
                let path = artifact_path(base, &rendered.bus);
                write_artifact(&path, &rendered.text)?;
                log::info!(
                    "Wrote {} ({} messages, {} signals)",
                    path.display(),
                    rendered.num_messages,
                    rendered.num_signals
                );
                Ok(BusArtifact {
                    bus: rendered.bus,
                    path,
                    num_messages: rendered.num_messages,
                    num_signals: rendered.num_signals,
                })
            })
            .collect()
    }
}

/// Keep what concerns one node: every signal when it sends the message,
/// otherwise only the signals it receives
fn filter_for_node(message: &Message, node: &str) -> Option<Message> {
    let is_sender = message.sender.name() == Some(node);
    let signals: Vec<_> = message
        .signals
        .iter()
        .filter(|signal| is_sender || signal.receivers.iter().any(|r| r.name() == Some(node)))
        .cloned()
        .collect();

    if signals.is_empty() {
        return None;
    }
    Some(Message {
        signals,
        ..message.clone()
    })
}

/// Rewrite senders and receivers that are not nodes of `bus`
fn localize(mut message: Message, bus: &Bus) -> Message {
    let on_bus = |node: &NodeRef| node.name().is_some_and(|name| bus.has_node(name));

    if !on_bus(&message.sender) {
        message.sender = NodeRef::Unspecified;
    }

    for signal in &mut message.signals {
        let mut receivers: Vec<NodeRef> = Vec::new();
        for receiver in signal.receivers.iter().filter(|r| on_bus(*r)) {
            if !receivers.contains(receiver) {
                receivers.push(receiver.clone());
            }
        }
        if receivers.is_empty() {
            receivers.push(NodeRef::Unspecified);
        }
        signal.receivers = receivers;
    }

    message
}

/// Base path with the `.dbc` extension enforced
pub fn dbc_base_path(base: &Path) -> PathBuf {
    let has_extension = base
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(DBC_EXTENSION));

    if has_extension {
        base.to_path_buf()
    } else {
        let mut name = base.as_os_str().to_os_string();
        name.push(".");
        name.push(DBC_EXTENSION);
        PathBuf::from(name)
    }
}

/// Artifact path for a bus: `<dir>/<stem>_<bus>.dbc`
pub fn artifact_path(base: &Path, bus: &str) -> PathBuf {
    let base = dbc_base_path(base);
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    base.with_file_name(format!("{}_{}.{}", stem, bus, DBC_EXTENSION))
}

/// Write one artifact, creating parent directories as needed
pub fn write_artifact(path: &Path, text: &str) -> Result<()> {
    let write_error = |source: std::io::Error| ConverterError::WriteError {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
    }

    let file = File::create(path).map_err(write_error)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(text.as_bytes()).map_err(write_error)?;
    writer.flush().map_err(write_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bus_table() -> MatrixTable {
        MatrixTable::new(
            vec!["Msg ID", "Msg Name", "Signal Name", "Bit Length", "VCU_P", "BMS_P", "VCU_E"],
            vec![
                vec!["0x100", "EngineStatus", "", "", "Tx", "", ""],
                vec!["", "", "EngineSpeed", "16", "", "Rx", "Rx"],
                vec!["", "", "EngineTemp", "8", "", "Rx", ""],
                vec!["0x200", "BodyStatus", "", "", "", "", "Tx"],
                vec!["", "", "DoorOpen", "1", "", "", ""],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_converter_rejects_bad_config() {
        assert!(Converter::new(ConverterConfig::new().with_markers("X", "x")).is_err());
    }

    #[test]
    fn test_bus_affinity_and_localization() {
        let conversion = Converter::default().convert(&two_bus_table());
        let pcan = conversion.partition.find_bus("P").unwrap();
        let ecan = conversion.partition.find_bus("E").unwrap();

        let p_messages = conversion.bus_messages(pcan);
        assert_eq!(p_messages.len(), 1);
        assert_eq!(p_messages[0].sender, NodeRef::named("VCU_P"));
        assert_eq!(p_messages[0].signals[0].receivers, vec![NodeRef::named("BMS_P")]);

        let e_messages = conversion.bus_messages(ecan);
        assert_eq!(e_messages.len(), 2);
        assert_eq!(e_messages[0].sender, NodeRef::Unspecified);
        assert_eq!(e_messages[0].signals[0].receivers, vec![NodeRef::named("VCU_E")]);
        assert_eq!(e_messages[0].signals[1].receivers, vec![NodeRef::Unspecified]);
        assert_eq!(e_messages[1].sender, NodeRef::named("VCU_E"));
    }

    #[test]
    fn test_node_filter() {
        let converter = Converter::new(ConverterConfig::new().with_node_filter("BMS_P")).unwrap();
        let conversion = converter.convert(&two_bus_table());

        let pcan = conversion.partition.find_bus("PCAN").unwrap();
        let messages = conversion.bus_messages(pcan);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].signals.len(), 2);

        let ecan = conversion.partition.find_bus("ECAN").unwrap();
        assert!(matches!(conversion.render_bus(ecan), Err(ConverterError::EmptyBus(_))));
    }

    #[test]
    fn test_node_filter_keeps_only_received_signals() {
        let converter = Converter::new(ConverterConfig::new().with_node_filter("VCU_E")).unwrap();
        let conversion = converter.convert(&two_bus_table());

        let ecan = conversion.partition.find_bus("E").unwrap();
        let messages = conversion.bus_messages(ecan);
        assert_eq!(messages.len(), 2);
        let names: Vec<&str> = messages[0].signals.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["EngineSpeed"]);
        assert_eq!(messages[1].signals.len(), 1);
    }

    #[test]
    fn test_bus_filter() {
        let converter = Converter::new(ConverterConfig::new().with_bus_filter("ecan")).unwrap();
        let rendered = converter.convert(&two_bus_table()).render_all();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].as_ref().unwrap().bus, "ECAN");

        let converter = Converter::new(ConverterConfig::new().with_bus_filter("Z")).unwrap();
        let rendered = converter.convert(&two_bus_table()).render_all();
        assert!(matches!(rendered[0], Err(ConverterError::UnknownBus(_))));
    }

    #[test]
    fn test_controller_in_node_list() {
        let converter = Converter::new(ConverterConfig::new().with_controller_name("GW")).unwrap();
        let conversion = converter.convert(&two_bus_table());
        let pcan = conversion.partition.find_bus("P").unwrap();

        assert_eq!(conversion.bus_node_list(pcan), vec!["VCU_P", "BMS_P", "GW"]);
        let rendered = conversion.render_bus(pcan).unwrap();
        assert!(rendered.text.contains("BU_: VCU_P BMS_P GW Vector__XXX\n"));
    }

    #[test]
    fn test_messages_without_nodes_are_reported() {
        let table = MatrixTable::new(
            vec!["Msg ID", "Signal Name", "VCU_P"],
            vec![
                vec!["0x1", "", "Tx"],
                vec!["", "A", ""],
                vec!["0x2", "", ""],
                vec!["", "B", ""],
            ],
        )
        .unwrap();
        let conversion = Converter::default().convert(&table);

        assert_eq!(conversion.diagnostics.len(), 1);
        assert_eq!(conversion.diagnostics[0].row, Some(4));
        let pcan = conversion.partition.find_bus("P").unwrap();
        assert_eq!(conversion.bus_messages(pcan).len(), 1);
    }

    #[test]
    fn test_artifact_paths() {
        assert_eq!(
            artifact_path(Path::new("out/matrix.dbc"), "PCAN"),
            PathBuf::from("out/matrix_PCAN.dbc")
        );
        assert_eq!(
            artifact_path(Path::new("out/matrix"), "CAN"),
            PathBuf::from("out/matrix_CAN.dbc")
        );
        assert_eq!(dbc_base_path(Path::new("a.DBC")), PathBuf::from("a.DBC"));
        assert_eq!(dbc_base_path(Path::new("a.txt")), PathBuf::from("a.txt.dbc"));
    }

    #[test]
    fn test_write_all_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("nested").join("vehicle");

        let artifacts = Converter::default().convert(&two_bus_table()).write_all(&base);
        assert_eq!(artifacts.len(), 2);
        for artifact in artifacts {
            let artifact = artifact.unwrap();
            assert!(artifact.path.exists());
        }
        assert!(dir.path().join("nested").join("vehicle_PCAN.dbc").exists());
        assert!(dir.path().join("nested").join("vehicle_ECAN.dbc").exists());
    }

    #[test]
    fn test_write_failure_is_isolated_per_bus() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the PCAN artifact should go makes that write fail
        fs::create_dir_all(dir.path().join("vehicle_PCAN.dbc")).unwrap();

        let artifacts = Converter::default()
            .convert(&two_bus_table())
            .write_all(&dir.path().join("vehicle.dbc"));
        assert!(matches!(artifacts[0], Err(ConverterError::WriteError { .. })));
        assert!(artifacts[1].is_ok());
    }
}
