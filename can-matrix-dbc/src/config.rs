//! Converter configuration types
//!
//! This module defines the options that shape one conversion run: the DLC
//! range, bus and node filters, and the marker values used to recognise node
//! columns and Tx/Rx cells. Spreadsheet access and file naming policies live in
//! the application layer (can-matrix-cli).

use crate::types::{ConverterError, Result};
use serde::{Deserialize, Serialize};

/// Highest DLC accepted for classic CAN frames
pub const CLASSIC_MAX_DLC: u8 = 8;

/// Highest DLC accepted for CAN-FD frames
pub const CAN_FD_MAX_DLC: u8 = 15;

/// DLC used when the cell is empty or out of range
pub const DEFAULT_DLC: u8 = 8;

/// Configuration for the converter library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Accept the CAN-FD DLC range (0-15) instead of classic CAN (0-8)
    #[serde(default)]
    pub can_fd: bool,

    /// Optional: only generate this bus (letter "P" or name "PCAN")
    #[serde(default)]
    pub bus_filter: Option<String>,

    /// Optional: only emit messages sent or received by this node
    #[serde(default)]
    pub node_filter: Option<String>,

    /// Optional: controller declared in every node list
    #[serde(default)]
    pub controller_name: Option<String>,

    /// Cell value marking the transmitting node (default: "Tx")
    #[serde(default = "default_tx_marker")]
    pub tx_marker: String,

    /// Cell value marking a receiving node (default: "Rx")
    #[serde(default = "default_rx_marker")]
    pub rx_marker: String,

    /// Node column prefixes starting with this marker are configuration columns
    #[serde(default = "default_config_prefix")]
    pub config_prefix: String,

    /// Node column labels ending with this marker are configuration columns
    #[serde(default = "default_config_suffix")]
    pub config_suffix: String,
}

fn default_tx_marker() -> String {
    "Tx".to_string()
}

fn default_rx_marker() -> String {
    "Rx".to_string()
}

fn default_config_prefix() -> String {
    "LV".to_string()
}

fn default_config_suffix() -> String {
    "EV".to_string()
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            can_fd: false,
            bus_filter: None,
            node_filter: None,
            controller_name: None,
            tx_marker: default_tx_marker(),
            rx_marker: default_rx_marker(),
            config_prefix: default_config_prefix(),
            config_suffix: default_config_suffix(),
        }
    }
}

impl ConverterConfig {
    /// Create a new converter configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: enable or disable the CAN-FD DLC range
    pub fn with_can_fd(mut self, enabled: bool) -> Self {
        self.can_fd = enabled;
        self
    }

    /// Builder method: restrict generation to one bus
    pub fn with_bus_filter(mut self, bus: impl Into<String>) -> Self {
        self.bus_filter = Some(bus.into());
        self
    }

    /// Builder method: restrict generation to one node
    pub fn with_node_filter(mut self, node: impl Into<String>) -> Self {
        self.node_filter = Some(node.into());
        self
    }

    /// Builder method: declare a controller in every node list
    pub fn with_controller_name(mut self, name: impl Into<String>) -> Self {
        self.controller_name = Some(name.into());
        self
    }

    /// Builder method: override the Tx/Rx cell markers
    pub fn with_markers(mut self, tx: impl Into<String>, rx: impl Into<String>) -> Self {
        self.tx_marker = tx.into();
        self.rx_marker = rx.into();
        self
    }

    /// Largest DLC accepted under this configuration
    pub fn max_dlc(&self) -> u8 {
        if self.can_fd {
            CAN_FD_MAX_DLC
        } else {
            CLASSIC_MAX_DLC
        }
    }

    /// Check if a cell reads the transmit marker
    pub fn is_tx(&self, cell: &str) -> bool {
        cell.trim().eq_ignore_ascii_case(&self.tx_marker)
    }

    /// Check if a cell reads the receive marker
    pub fn is_rx(&self, cell: &str) -> bool {
        cell.trim().eq_ignore_ascii_case(&self.rx_marker)
    }

    /// Reject configurations that would make every cell ambiguous
    pub fn validate(&self) -> Result<()> {
        if self.tx_marker.trim().is_empty() || self.rx_marker.trim().is_empty() {
            return Err(ConverterError::InvalidConfig(
                "Tx/Rx markers must not be empty".to_string(),
            ));
        }
        if self.tx_marker.trim().eq_ignore_ascii_case(self.rx_marker.trim()) {
            return Err(ConverterError::InvalidConfig(format!(
                "Tx and Rx markers are identical: {:?}",
                self.tx_marker
            )));
        }
        Ok(())
    }
}
