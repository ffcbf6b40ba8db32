//! Ray tracing compilation
//!
//! Loads the state description, builds and materializes the subobject graph,
//! creates the state object and extracts the per-shader and per-pipeline artifacts.
//!
//! In shader mode the driver compiles one export in isolation and no pipeline
//! binary exists. In pipeline mode the driver decides how many pipelines to
//! generate; each is either Unified (one shader implements the whole pipeline, its
//! binary can be extracted) or Indirect (several cooperating shaders, whose
//! pipeline binary is not extracted).

use super::graph::StateObjectGraph;
use super::naming::OutputNames;
use super::state_desc::{LibraryResolver, RayTracingStateDesc, load_mapping};
use crate::backend::{AnalyzerSession, GeneratedPipeline, StateObjectHandle, StateObjectMode, raygen_name};
use crate::config::{Config, RayTracingMode, non_empty};
use crate::error::{Error, ExtractionReport, Result, Warning};
use crate::frontend::compiler::ShaderCompiler;
use crate::results::writer::{write_artifact, write_stats};
use crate::results::{OutputMetadata, RayTracingPipelineMetadata, RayTracingShaderMetadata, ShaderResult};

/// Result of one shader of a generated pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RayTracingShaderResult {
    /// Export name
    pub export_name: String,
    /// Statistics and disassembly; `None` when the statistics could not be retrieved
    pub result: Option<ShaderResult>,
}

/// Result of one generated pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RayTracingPipelineResult {
    /// Raygeneration shader name (Unified) or 1-based index (Indirect)
    pub name: String,
    /// Whether one physical shader implements the whole pipeline
    pub unified: bool,
    /// Shaders of the pipeline
    pub shaders: Vec<RayTracingShaderResult>,
}

/// Output of a ray tracing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RayTracingOutput {
    /// Generated pipelines, in driver order
    pub pipelines: Vec<RayTracingPipelineResult>,
    /// Artifact listing, also written to the metadata file when one is configured
    pub metadata: OutputMetadata,
}

/// Loads the state description of `config` and attaches the library bytecode
pub fn load_state_description(config: &Config, compiler: &dyn ShaderCompiler) -> Result<RayTracingStateDesc> {
    let mut desc = if let Some(path) = non_empty(&config.dxr_state_desc) {
        tracing::debug!("Loading ray tracing state description {}", path.display());
        RayTracingStateDesc::from_file(path)?
    } else if let Some(path) = non_empty(&config.dxr_hlsl) {
        RayTracingStateDesc::from_single_hlsl(path)
    } else {
        return Err(Error::StateDescription("neither a state description nor an HLSL file was given".to_string()));
    };

    let mapping = load_mapping(&config.dxr_hlsl_mapping)?;
    desc.attach_binaries(&LibraryResolver {
        compiler,
        mapping: mapping.as_ref(),
        shader_model: config.dxr_shader_model.as_deref().unwrap_or_default(),
        defines: &config.defines,
        include_dirs: &config.include_dirs,
    })?;
    Ok(desc)
}

/// Compiles a ray tracing state object and writes its artifacts
///
/// # Arguments
/// * `session` - The analyzer session
/// * `config` - The validated configuration
/// * `mode` - Shader or pipeline mode
/// * `compiler` - Front-end compiler for HLSL libraries
/// * `report` - Collects per-item failures
pub fn compile_ray_tracing(session: &mut AnalyzerSession, config: &Config, mode: RayTracingMode, compiler: &dyn ShaderCompiler, report: &mut ExtractionReport) -> Result<RayTracingOutput> {
    let desc = load_state_description(config, compiler)?;
    let state_object = StateObjectGraph::build(&desc)?.materialize();
    // Library bytecode now lives in the materialized description
    drop(desc);

    let state_mode = match mode {
        RayTracingMode::Shader => StateObjectMode::Shader {
            export: config.dxr_export.clone().unwrap_or_default(),
        },
        RayTracingMode::Pipeline => StateObjectMode::Pipeline,
    };
    let output = session.create_state_object(&state_object, &state_mode)?;

    let mut names = OutputNames::default();
    let pipelines = match &state_mode {
        StateObjectMode::Shader { export } => vec![shader_mode(session, config, output.handle, export, &mut names, report)],
        StateObjectMode::Pipeline => pipeline_mode(session, config, output.handle, &output.pipelines, &mut names, report),
    };

    let (pipelines, metadata): (Vec<_>, Vec<_>) = pipelines.into_iter().unzip();
    let metadata = OutputMetadata { mode, pipelines: metadata };

    if let Some(path) = non_empty(&config.output_metadata) {
        match metadata.to_json() {
            Ok(json) => {
                write_artifact(path, json, report);
            }
            Err(e) => report.push(Warning::Output {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }

    Ok(RayTracingOutput { pipelines, metadata })
}

fn shader_mode(
    session: &AnalyzerSession,
    config: &Config,
    handle: StateObjectHandle,
    export: &str,
    names: &mut OutputNames,
    report: &mut ExtractionReport,
) -> (RayTracingPipelineResult, RayTracingPipelineMetadata) {
    if non_empty(&config.dxr_binary).is_some() {
        report.push(Warning::Unsupported {
            message: format!("pipeline binary extraction is not supported in shader mode; no binary is written for '{export}'"),
        });
    }

    let (shader, shader_metadata) = extract_shader(session, config, handle, 0, export, export, names, report);
    (
        RayTracingPipelineResult {
            name: export.to_string(),
            unified: false,
            shaders: vec![shader],
        },
        RayTracingPipelineMetadata {
            pipeline_name: export.to_string(),
            is_unified: false,
            pipeline_binary: None,
            shaders: vec![shader_metadata],
        },
    )
}

fn pipeline_mode(
    session: &AnalyzerSession,
    config: &Config,
    handle: StateObjectHandle,
    pipelines: &[GeneratedPipeline],
    names: &mut OutputNames,
    report: &mut ExtractionReport,
) -> Vec<(RayTracingPipelineResult, RayTracingPipelineMetadata)> {
    let binary_template = non_empty(&config.dxr_binary);
    let binary_count = match binary_template {
        Some(_) if pipelines.iter().any(|pipeline| pipeline.unified) => session.pipeline_binary_count(handle, report),
        _ => None,
    };
    let multiple = pipelines.len() > 1;

    let mut results = Vec::with_capacity(pipelines.len());
    for (index, pipeline) in pipelines.iter().enumerate() {
        let number = index + 1;
        let name = match (pipeline.unified, raygen_name(pipeline)) {
            (true, Some(raygen)) => raygen.to_string(),
            _ => number.to_string(),
        };

        let mut shaders = Vec::with_capacity(pipeline.shaders.len());
        let mut shader_metadata = Vec::with_capacity(pipeline.shaders.len());
        for export in &pipeline.shaders {
            let suffix = if multiple { format!("pipeline{number}_{export}") } else { export.clone() };
            let (shader, metadata) = extract_shader(session, config, handle, index, export, &suffix, names, report);
            shaders.push(shader);
            shader_metadata.push(metadata);
        }

        let pipeline_binary = binary_template.and_then(|template| {
            if !pipeline.unified {
                report.push(Warning::Unsupported {
                    message: format!("pipeline binary extraction is not supported for indirect pipelines; skipping pipeline {number}"),
                });
                return None;
            }
            let count = binary_count?;
            if index >= count {
                report.push(Warning::Extraction {
                    item: format!("pipeline {number}"),
                    artifact: "binary",
                    reason: format!("the driver holds only {count} pipeline binaries"),
                });
                return None;
            }
            let binary = session.extract_pipeline_binary(handle, index, report)?;
            let path = names.claim(template, &name, &format!("pipeline {number}"), report)?;
            write_artifact(&path, &binary, report).then_some(path)
        });

        results.push((
            RayTracingPipelineResult {
                name: name.clone(),
                unified: pipeline.unified,
                shaders,
            },
            RayTracingPipelineMetadata {
                pipeline_name: name,
                is_unified: pipeline.unified,
                pipeline_binary,
                shaders: shader_metadata,
            },
        ));
    }
    results
}

/// Extracts and writes the artifacts of one shader
fn extract_shader(
    session: &AnalyzerSession,
    config: &Config,
    handle: StateObjectHandle,
    pipeline: usize,
    export: &str,
    suffix: &str,
    names: &mut OutputNames,
    report: &mut ExtractionReport,
) -> (RayTracingShaderResult, RayTracingShaderMetadata) {
    let artifacts = session.extract_ray_tracing_shader(handle, pipeline, export, report);
    let result = artifacts.to_result();
    let item = format!("shader '{export}'");

    let isa_file = match (non_empty(&config.dxr_isa), &artifacts.disassembly) {
        (Some(template), Some(text)) => names.claim(template, suffix, &item, report).filter(|path| write_artifact(path, text.as_bytes(), report)),
        _ => None,
    };

    let stats_file = match (non_empty(&config.dxr_stats), &result) {
        (Some(template), Some(result)) => names.claim(template, suffix, &item, report).filter(|path| write_stats(path, result, None, report)),
        _ => None,
    };

    (
        RayTracingShaderResult {
            export_name: export.to_string(),
            result,
        },
        RayTracingShaderMetadata {
            export_name: export.to_string(),
            isa_file,
            stats_file,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriverLoadMode;
    use crate::results::stats::parse_stats;
    use crate::testing::{MockAnalyzer, MockCompiler, MockLoader};
    use std::path::Path;

    fn indirect(shaders: &[&str]) -> GeneratedPipeline {
        GeneratedPipeline {
            unified: false,
            raygen: None,
            shaders: shaders.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn unified(raygen: &str, shaders: &[&str]) -> GeneratedPipeline {
        GeneratedPipeline {
            unified: true,
            raygen: Some(raygen.to_string()),
            shaders: shaders.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn config(dir: &Path) -> Config {
        Config {
            dxr_mode: Some("pipeline".to_string()),
            dxr_hlsl: Some(dir.join("rt.hlsl")),
            dxr_isa: Some(dir.join("isa_*.txt")),
            dxr_stats: Some(dir.join("stats_*.txt")),
            dxr_binary: Some(dir.join("binary_*.bin")),
            output_metadata: Some(dir.join("metadata.json")),
            ..Default::default()
        }
    }

    fn run(analyzer: MockAnalyzer, config: &Config, mode: RayTracingMode) -> (RayTracingOutput, ExtractionReport) {
        let mut session = AnalyzerSession::open(&MockLoader::new(analyzer), DriverLoadMode::Online, "amdxc64.dll").unwrap();
        let mut report = ExtractionReport::default();
        let output = compile_ray_tracing(&mut session, config, mode, &MockCompiler::default(), &mut report).unwrap();
        (output, report)
    }

    #[test]
    fn test_indirect_pipeline_skips_binary() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = MockAnalyzer {
            generated: vec![indirect(&["RayGen", "ClosestHit", "Miss"])],
            ..Default::default()
        };
        let (output, report) = run(analyzer, &config(dir.path()), RayTracingMode::Pipeline);

        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(&report.warnings[0], Warning::Unsupported { message } if message.contains("pipeline 1")));

        let pipeline = &output.pipelines[0];
        assert_eq!(pipeline.name, "1");
        assert!(!pipeline.unified);
        assert_eq!(pipeline.shaders.len(), 3);
        assert!(pipeline.shaders.iter().all(|shader| shader.result.is_some()));

        for export in ["RayGen", "ClosestHit", "Miss"] {
            assert!(dir.path().join(format!("isa_{export}.txt")).exists());
            let stats = std::fs::read_to_string(dir.path().join(format!("stats_{export}.txt"))).unwrap();
            assert_eq!(parse_stats(&stats).len(), 12);
        }
        assert!(!dir.path().join("binary_1.bin").exists());
        assert!(output.metadata.pipelines[0].pipeline_binary.is_none());
    }

    #[test]
    fn test_unified_pipelines_write_binaries() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = MockAnalyzer {
            generated: vec![unified("RayGenA", &["RayGenA", "Miss"]), unified("RayGenB", &["RayGenB", "Miss"])],
            pipeline_binaries: vec![vec![0xA], vec![0xB]],
            ..Default::default()
        };
        let (output, report) = run(analyzer, &config(dir.path()), RayTracingMode::Pipeline);

        assert!(report.is_clean());
        assert_eq!(output.pipelines[0].name, "RayGenA");
        assert_eq!(std::fs::read(dir.path().join("binary_RayGenB.bin")).unwrap(), vec![0xB]);
        assert!(dir.path().join("isa_pipeline2_Miss.txt").exists());
        assert_eq!(output.metadata.pipelines[1].pipeline_binary, Some(dir.path().join("binary_RayGenB.bin")));

        let written = OutputMetadata::read_file(dir.path().join("metadata.json")).unwrap();
        assert_eq!(written, output.metadata);
    }

    #[test]
    fn test_missing_pipeline_binary_index() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = MockAnalyzer {
            generated: vec![unified("RayGenA", &["RayGenA"]), unified("RayGenB", &["RayGenB"])],
            pipeline_binaries: vec![vec![0xA]],
            ..Default::default()
        };
        let (output, report) = run(analyzer, &config(dir.path()), RayTracingMode::Pipeline);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].to_string().contains("pipeline 2"));
        assert!(output.metadata.pipelines[0].pipeline_binary.is_some());
    }

    #[test]
    fn test_shader_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.dxr_mode = Some("shader".to_string());
        config.dxr_export = Some("ClosestHit".to_string());

        let (output, report) = run(MockAnalyzer::default(), &config, RayTracingMode::Shader);

        assert!(matches!(&report.warnings[..], [Warning::Unsupported { .. }]));
        assert_eq!(output.metadata.mode, RayTracingMode::Shader);
        assert_eq!(output.metadata.pipelines.len(), 1);
        assert_eq!(output.metadata.pipelines[0].pipeline_name, "ClosestHit");
        assert!(!output.metadata.pipelines[0].is_unified);
        assert_eq!(output.metadata.pipelines[0].shaders[0].isa_file, Some(dir.path().join("isa_ClosestHit.txt")));
    }

    #[test]
    fn test_template_without_wildcard() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.dxr_isa = Some(dir.path().join("isa.txt"));
        config.dxr_binary = None;

        let analyzer = MockAnalyzer {
            generated: vec![indirect(&["RayGen", "Miss"])],
            ..Default::default()
        };
        let (output, report) = run(analyzer, &config, RayTracingMode::Pipeline);

        assert!(!dir.path().join("isa.txt").exists());
        assert_eq!(report.warnings.iter().filter(|w| matches!(w, Warning::Template { .. })).count(), 2);
        assert!(output.metadata.pipelines[0].shaders.iter().all(|shader| shader.isa_file.is_none() && shader.stats_file.is_some()));
    }

    #[test]
    fn test_failed_shader_stats_keep_disassembly() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = MockAnalyzer {
            generated: vec![indirect(&["RayGen", "Miss"])],
            failing_exports: vec!["Miss".to_string()],
            ..Default::default()
        };
        let mut config = config(dir.path());
        config.dxr_binary = None;
        let (output, report) = run(analyzer, &config, RayTracingMode::Pipeline);

        assert_eq!(report.warnings.len(), 1);
        let miss = &output.metadata.pipelines[0].shaders[1];
        assert!(miss.isa_file.is_some());
        assert!(miss.stats_file.is_none());
        assert!(output.pipelines[0].shaders[1].result.is_none());
    }

    #[test]
    fn test_colliding_file_names_keep_first_shader() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = MockAnalyzer {
            generated: vec![indirect(&["a?b", "a_b"])],
            ..Default::default()
        };
        let mut config = config(dir.path());
        config.dxr_binary = None;
        let (output, report) = run(analyzer, &config, RayTracingMode::Pipeline);

        let collisions: Vec<_> = report.warnings.iter().filter(|w| matches!(w, Warning::NameCollision { item, .. } if item == "shader 'a_b'")).collect();
        assert_eq!(collisions.len(), 2);
        assert!(std::fs::read_to_string(dir.path().join("isa_a_b.txt")).unwrap().contains("; a?b"));

        let shaders = &output.metadata.pipelines[0].shaders;
        assert_eq!(shaders[0].isa_file, Some(dir.path().join("isa_a_b.txt")));
        assert!(shaders[1].isa_file.is_none());
        assert!(shaders[1].stats_file.is_none());
        assert!(output.pipelines[0].shaders[1].result.is_some());
    }
}
