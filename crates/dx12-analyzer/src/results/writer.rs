//! Artifact output
//!
//! Output files are optional by-products: a file that cannot be written is
//! reported as a [`Warning::Output`] and the run continues.

use super::shader::{PipelineResult, ShaderResult};
use super::stats::format_stats;
use crate::config::{Config, ShaderStage, non_empty};
use crate::error::{ExtractionReport, Warning};
use std::path::Path;

/// Writes `contents` to `path`, recording a warning on failure
///
/// # Returns
/// `true` if the file was written
pub fn write_artifact(path: &Path, contents: impl AsRef<[u8]>, report: &mut ExtractionReport) -> bool {
    match std::fs::write(path, contents) {
        Ok(()) => {
            tracing::debug!("Wrote {}", path.display());
            true
        }
        Err(e) => {
            report.push(Warning::Output {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
            false
        }
    }
}

/// Writes the disassembly of `result` to `path`
///
/// A result without disassembly produces no file; the missing extraction has
/// already been reported.
pub fn write_disassembly(path: &Path, result: &ShaderResult, report: &mut ExtractionReport) -> bool {
    match &result.disassembly {
        Some(text) => write_artifact(path, text.as_bytes(), report),
        None => false,
    }
}

/// Writes the statistics block of `result` to `path`
pub fn write_stats(path: &Path, result: &ShaderResult, thread_group: Option<[u32; 3]>, report: &mut ExtractionReport) -> bool {
    write_artifact(path, format_stats(result, thread_group), report)
}

/// Writes the per-stage disassembly and statistics files requested by `config`
///
/// # Arguments
/// * `config` - The configuration naming the output files
/// * `result` - The pipeline result
/// * `report` - Collects failures
pub fn write_pipeline_outputs(config: &Config, result: &PipelineResult, report: &mut ExtractionReport) {
    let thread_group = match result {
        PipelineResult::Compute(compute) => Some(compute.thread_group),
        PipelineResult::Graphics(_) => None,
    };

    for stage in ShaderStage::ALL {
        let stage_config = config.stage(stage);
        let isa = non_empty(&stage_config.isa);
        let stats = non_empty(&stage_config.stats);
        if isa.is_none() && stats.is_none() {
            continue;
        }

        let Some(shader) = result.stage(stage) else {
            report.push(Warning::Extraction {
                item: format!("{stage} shader"),
                artifact: "results",
                reason: "the driver reported no shader for this stage".to_string(),
            });
            continue;
        };

        if let Some(path) = isa {
            write_disassembly(path, shader, report);
        }
        if let Some(path) = stats {
            write_stats(path, shader, thread_group.filter(|_| stage == ShaderStage::Compute), report);
        }
    }
}
