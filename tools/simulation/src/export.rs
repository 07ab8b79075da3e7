//! Report export
//!
//! Serializes run reports and replay results to JSON for external
//! consumption.

use crate::replay::ReplayValidation;
use crate::runner::RunReport;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Combined export of one simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationExport {
    pub version: String,
    pub chaincode_version: String,
    pub report: RunReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay: Option<ReplayValidation>,
}

pub fn build_export(report: &RunReport, replay: Option<ReplayValidation>) -> SimulationExport {
    SimulationExport {
        version: crate::VERSION.to_string(),
        chaincode_version: instruction::CHAINCODE_VERSION.to_string(),
        report: report.clone(),
        replay,
    }
}

pub fn export_json(export: &SimulationExport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(export)
}

pub fn write_to_file(export: &SimulationExport, path: &Path) -> std::io::Result<()> {
    let json = export_json(export)?;
    std::fs::write(path, json)
}
