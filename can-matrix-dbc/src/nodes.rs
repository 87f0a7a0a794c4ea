//! Node and bus classification
//!
//! Node indicator columns are recognised by their shape: `<Prefix>_<SUFFIX>`
//! where the suffix is upper-case letters. The suffix names the logical CAN
//! bus the node sits on (`VCU_P` -> PCAN, `VCU_E` -> ECAN), so one matrix can
//! describe several buses and produce one DBC file for each.

use crate::config::ConverterConfig;
use crate::roles::ColumnRoleMap;
use crate::table::MatrixTable;
use serde::Serialize;

/// Bus names for the common single-letter suffixes
///
/// Any other suffix `X` falls back to `XCAN`.
pub const KNOWN_BUS_LETTERS: &[(&str, &str)] = &[
    ("P", "PCAN"),
    ("E", "ECAN"),
    ("C", "CCAN"),
    ("T", "TCAN"),
    ("B", "BCAN"),
];

/// Name of the bus used when the matrix has no active node columns
pub const DEFAULT_BUS_NAME: &str = "CAN";

/// Check whether a column label has the node indicator shape
///
/// The label needs an underscore, an all upper-case alphabetic suffix after
/// the last underscore, a non-empty prefix that does not start with the
/// configuration prefix, and must not end with the configuration suffix.
pub fn is_node_column(label: &str, config: &ConverterConfig) -> bool {
    let Some((prefix, suffix)) = label.rsplit_once('_') else {
        return false;
    };

    if prefix.is_empty() || suffix.is_empty() {
        return false;
    }
    if !suffix.chars().all(|c| c.is_ascii_uppercase()) {
        return false;
    }
    if !config.config_prefix.is_empty() && prefix.starts_with(config.config_prefix.as_str()) {
        return false;
    }
    if !config.config_suffix.is_empty() && label.ends_with(config.config_suffix.as_str()) {
        return false;
    }
    true
}

/// Bus suffix of a node column label (text after the last underscore)
pub fn bus_suffix(label: &str) -> &str {
    label.rsplit_once('_').map(|(_, suffix)| suffix).unwrap_or("")
}

/// Bus name for a suffix: lookup table first, `<suffix>CAN` otherwise
pub fn bus_name(suffix: &str) -> String {
    KNOWN_BUS_LETTERS
        .iter()
        .find(|(letter, _)| *letter == suffix)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| {
            log::debug!("Unrecognised bus suffix {:?}, using {}CAN", suffix, suffix);
            format!("{}CAN", suffix)
        })
}

/// A network participant derived from a node indicator column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    /// Full column label, used verbatim as the DBC node name
    pub name: String,
    /// Bus suffix the node belongs to ("P", "E", ...)
    pub bus_suffix: String,
    /// Column index of the node's Tx/Rx indicators
    pub column: usize,
}

/// A logical CAN bus and the nodes on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bus {
    /// Bus name used in artifact file names ("PCAN")
    pub name: String,
    /// Suffix letter(s) shared by the bus's nodes; empty for the default bus
    pub suffix: String,
    /// Names of the nodes on this bus, in column order
    pub nodes: Vec<String>,
}

impl Bus {
    /// The single bus used when no node column carries data
    pub fn default_bus() -> Self {
        Self {
            name: DEFAULT_BUS_NAME.to_string(),
            suffix: String::new(),
            nodes: Vec::new(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.suffix.is_empty()
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.iter().any(|n| n == name)
    }

    /// Check whether a user query ("P", "pcan") names this bus
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        self.name.eq_ignore_ascii_case(query)
            || (!self.suffix.is_empty() && self.suffix.eq_ignore_ascii_case(query))
    }
}

/// Retained nodes grouped into buses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusPartition {
    /// Nodes with at least one Tx/Rx cell, in column order
    pub nodes: Vec<Node>,
    /// Node columns without any data, excluded from every artifact
    pub inert: Vec<String>,
    /// Buses in order of first appearance
    pub buses: Vec<Bus>,
}

impl BusPartition {
    /// Find a bus by letter or name
    pub fn find_bus(&self, query: &str) -> Option<&Bus> {
        self.buses.iter().find(|bus| bus.matches(query))
    }

    /// Find a retained node by name
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.name == name)
    }

    /// True when only the default bus exists
    pub fn is_default(&self) -> bool {
        self.buses.len() == 1 && self.buses[0].is_default()
    }
}

/// Derive nodes and buses from the node indicator columns
///
/// A node column whose cells are all empty is inert and dropped. When no node
/// is retained, the partition holds the default bus only.
pub fn classify(table: &MatrixTable, roles: &ColumnRoleMap) -> BusPartition {
    let mut nodes = Vec::new();
    let mut inert = Vec::new();
    let mut buses: Vec<Bus> = Vec::new();

    for column in roles.node_columns() {
        if !table.column_has_data(column.index) {
            log::debug!("Node column {:?} has no data, excluded", column.label);
            inert.push(column.label.clone());
            continue;
        }

        let suffix = bus_suffix(&column.label).to_string();
        match buses.iter_mut().find(|bus| bus.suffix == suffix) {
            Some(bus) => bus.nodes.push(column.label.clone()),
            None => buses.push(Bus {
                name: bus_name(&suffix),
                suffix: suffix.clone(),
                nodes: vec![column.label.clone()],
            }),
        }

        nodes.push(Node {
            name: column.label.clone(),
            bus_suffix: suffix,
            column: column.index,
        });
    }

    if buses.is_empty() {
        log::info!("No active node columns, using the default {} bus", DEFAULT_BUS_NAME);
        buses.push(Bus::default_bus());
    } else {
        log::info!(
            "Detected buses: {}",
            buses
                .iter()
                .map(|bus| format!("{} ({})", bus.name, bus.nodes.join(", ")))
                .collect::<Vec<_>>()
                .join("; ")
        );
    }

    BusPartition {
        nodes,
        inert,
        buses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles;

    #[test]
    fn test_node_column_shape() {
        let config = ConverterConfig::new();

        assert!(is_node_column("VCU_P", &config));
        assert!(is_node_column("ABC_DEF_P", &config));
        assert!(is_node_column("OTHER_NODE", &config));
        assert!(!is_node_column("LV1_EV", &config));
        assert!(!is_node_column("LV2_P", &config));
        assert!(!is_node_column("BMS_EV", &config));
        assert!(!is_node_column("VCU_p", &config));
        assert!(!is_node_column("VCU_P1", &config));
        assert!(!is_node_column("_P", &config));
        assert!(!is_node_column("VCU", &config));
    }

    #[test]
    fn test_bus_names() {
        assert_eq!(bus_suffix("VCU_P"), "P");
        assert_eq!(bus_name("P"), "PCAN");
        assert_eq!(bus_name("B"), "BCAN");
        assert_eq!(bus_name(bus_suffix("OTHER_NODE")), "NODECAN");
        assert_eq!(bus_name(bus_suffix("ABC_DEF_P")), "PCAN");
    }

    #[test]
    fn test_classify_groups_by_suffix_and_drops_inert_nodes() {
        let table = MatrixTable::new(
            vec!["Msg ID", "Signal Name", "VCU_P", "BMS_P", "VCU_E", "TBOX_C"],
            vec![
                vec!["0x100", "", "Tx", "", "", ""],
                vec!["", "Speed", "", "Rx", "Rx", ""],
            ],
        )
        .unwrap();
        let config = ConverterConfig::new();
        let role_map = roles::resolve(table.headers(), &config);
        let partition = classify(&table, &role_map);

        assert_eq!(partition.nodes.len(), 3);
        assert_eq!(partition.inert, vec!["TBOX_C".to_string()]);
        assert_eq!(partition.buses.len(), 2);
        assert_eq!(partition.buses[0].name, "PCAN");
        assert_eq!(partition.buses[0].nodes, vec!["VCU_P", "BMS_P"]);
        assert_eq!(partition.buses[1].name, "ECAN");
        assert!(partition.find_bus("p").is_some());
        assert!(partition.find_bus("ECAN").is_some());
        assert!(partition.find_bus("C").is_none());
        assert!(!partition.is_default());
    }

    #[test]
    fn test_classify_without_nodes_uses_default_bus() {
        let table = MatrixTable::new(vec!["Msg ID", "Signal Name"], vec![vec!["0x100", ""]]).unwrap();
        let config = ConverterConfig::new();
        let role_map = roles::resolve(table.headers(), &config);
        let partition = classify(&table, &role_map);

        assert!(partition.is_default());
        assert_eq!(partition.buses[0].name, "CAN");
        assert!(partition.find_bus("can").is_some());
    }
}
