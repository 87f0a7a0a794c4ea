//! Run summary
//!
//! A JSON record of one conversion: when it ran, what was read, which buses
//! were detected and what happened to each artifact.

use anyhow::{Context, Result};
use can_matrix_dbc::{BusArtifact, Conversion, ConverterError, Diagnostic, ModelStats, ValidationReport};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// RFC 3339 timestamp
    pub generated_at: String,
    pub tool_version: String,
    pub input: PathBuf,
    pub sheet: String,
    pub stats: ModelStats,
    pub buses: Vec<BusSummary>,
    pub artifacts: Vec<ArtifactOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BusSummary {
    pub name: String,
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ArtifactOutcome {
    Written {
        bus: String,
        path: PathBuf,
        num_messages: usize,
        num_signals: usize,
    },
    Failed {
        error: String,
    },
}

impl From<&Result<BusArtifact, ConverterError>> for ArtifactOutcome {
    fn from(result: &Result<BusArtifact, ConverterError>) -> Self {
        match result {
            Ok(artifact) => ArtifactOutcome::Written {
                bus: artifact.bus.clone(),
                path: artifact.path.clone(),
                num_messages: artifact.num_messages,
                num_signals: artifact.num_signals,
            },
            Err(e) => ArtifactOutcome::Failed { error: e.to_string() },
        }
    }
}

impl RunSummary {
    pub fn new(
        input: &Path,
        sheet: &str,
        conversion: &Conversion,
        artifacts: &[Result<BusArtifact, ConverterError>],
        validation: Option<ValidationReport>,
    ) -> Self {
        Self {
            generated_at: chrono::Local::now().to_rfc3339(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            input: input.to_path_buf(),
            sheet: sheet.to_string(),
            stats: conversion.stats(),
            buses: conversion
                .partition
                .buses
                .iter()
                .map(|bus| BusSummary {
                    name: bus.name.clone(),
                    nodes: bus.nodes.clone(),
                })
                .collect(),
            artifacts: artifacts.iter().map(ArtifactOutcome::from).collect(),
            validation,
            diagnostics: conversion.diagnostics.clone(),
        }
    }

    pub fn written_count(&self) -> usize {
        self.artifacts
            .iter()
            .filter(|a| matches!(a, ArtifactOutcome::Written { .. }))
            .count()
    }
}

/// Write the summary as pretty-printed JSON
pub fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
    }

    let file = File::create(path).with_context(|| format!("Failed to create summary {:?}", path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summary)
        .with_context(|| format!("Failed to write summary {:?}", path))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write summary {:?}", path))?;

    log::info!("Run summary written to {:?}", path);
    Ok(())
}
