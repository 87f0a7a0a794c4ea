//! CAN Matrix to DBC Library
//!
//! A stateless, reusable library that converts a CAN communication matrix
//! (a table of message header rows and signal rows) into DBC files, one per
//! logical CAN bus.
//!
//! # Architecture
//!
//! The pipeline runs start to finish for every conversion:
//! - Column roles are inferred from free-form header labels
//! - Node indicator columns are classified into buses by their suffix
//! - Rows are grouped into messages and signals by a two-state machine
//! - Each bus is encoded to ASCII DBC text and written to its own file
//!
//! The library does NOT:
//! - Read spreadsheet files (the matrix arrives as a `MatrixTable`)
//! - Print anything (it logs through `log` and returns diagnostics)
//!
//! Spreadsheet access, configuration files and run summaries are in the
//! application layer (can-matrix-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use can_matrix_dbc::{Converter, ConverterConfig, MatrixTable};
//! use std::path::Path;
//!
//! let table = MatrixTable::new(
//!     vec!["Msg ID", "Msg Name", "Signal Name", "Start Byte", "Bit Length", "VCU_P", "BMS_P"],
//!     vec![
//!         vec!["0x100", "EngineStatus", "", "", "", "Tx", ""],
//!         vec!["", "", "EngineSpeed", "0", "16", "", "Rx"],
//!     ],
//! )
//! .unwrap();
//!
//! let converter = Converter::new(ConverterConfig::new().with_can_fd(true)).unwrap();
//! let conversion = converter.convert(&table);
//!
//! for artifact in conversion.write_all(Path::new("out/vehicle.dbc")) {
//!     match artifact {
//!         Ok(artifact) => println!("Wrote {}", artifact.path.display()),
//!         Err(e) => eprintln!("Bus failed: {}", e),
//!     }
//! }
//! ```

// Public modules
pub mod analyzer;
pub mod assembler;
pub mod config;
pub mod converter;
pub mod encoder;
pub mod layout;
pub mod model;
pub mod nodes;
pub mod roles;
pub mod table;
pub mod types;
pub mod validator;

// Re-export main types for convenience
pub use analyzer::{analyze, SyntaxReport};
pub use config::ConverterConfig;
pub use converter::{BusArtifact, Conversion, Converter, RenderedBus};
pub use model::{MatrixModel, Message, ModelStats, Signal};
pub use nodes::{Bus, BusPartition, Node};
pub use roles::{ColumnRole, ColumnRoleMap};
pub use table::MatrixTable;
pub use types::{
    ByteOrder, ConverterError, Diagnostic, NodeRef, Result, Severity, ValueType,
};
pub use validator::{validate, ValidationReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
