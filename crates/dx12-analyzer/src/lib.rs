//! DX12 shader and pipeline analyzer
//!
//! This crate compiles compute, graphics and ray tracing shaders into complete
//! pipeline objects through a vendor driver's shader analyzer extension, and
//! extracts the compiled code for offline analysis: ISA disassembly, per-stage
//! register and memory statistics, and raw pipeline binaries.
//!
//! A run goes through the same steps for every pipeline kind:
//!
//! 1. [`validate::validate_config`] checks the [`Config`] before any device work
//! 2. [`frontend`] compiles the stages and resolves the root signature, or
//!    [`dxr`] builds the ray tracing subobject graph
//! 3. [`backend`] creates the pipeline or state object and pulls back the artifacts
//! 4. [`results`] writes the requested output files
//!
//! The HLSL compiler and the driver module are external collaborators reached
//! through the [`ShaderCompiler`] and [`DriverLoader`] traits, implemented for
//! the `dxc` executable by [`DxcCompiler`] and for the system dynamic loader by
//! [`DynamicLibraryLoader`].

pub mod backend;
pub mod config;
pub mod dxr;
pub mod error;
pub mod frontend;
pub mod results;
pub mod validate;

#[cfg(test)]
mod testing;

pub use backend::{AnalyzerSession, ArtifactRequest, DriverLoader, DynamicLibraryLoader};
pub use config::{Config, RayTracingMode, ShaderStage};
pub use dxr::RayTracingOutput;
pub use error::{Error, ExtractionReport, Result, Warning};
pub use frontend::{DxcCompiler, PipelineAssembler, ShaderCompiler};
pub use results::{OutputMetadata, PipelineResult};
pub use validate::PipelineKind;

use config::non_empty;
use results::writer::{write_artifact, write_pipeline_outputs};

/// What a run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutput {
    /// Supported target GPUs
    Targets(Vec<String>),
    /// Compute or graphics pipeline results
    Pipeline(PipelineResult),
    /// Ray tracing pipelines and their metadata
    RayTracing(RayTracingOutput),
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    /// Kind of work the configuration described
    pub kind: PipelineKind,
    /// What was produced
    pub output: AnalysisOutput,
    /// Items that could not be extracted or written
    pub report: ExtractionReport,
}

/// Runs analyzer invocations against a compiler and a driver
pub struct Analyzer<'a> {
    compiler: &'a dyn ShaderCompiler,
    loader: &'a dyn DriverLoader,
}

impl<'a> Analyzer<'a> {
    /// Creates an analyzer
    ///
    /// # Arguments
    /// * `compiler` - Front-end HLSL compiler
    /// * `loader` - Vendor driver module loader
    pub fn new(compiler: &'a dyn ShaderCompiler, loader: &'a dyn DriverLoader) -> Self {
        Self { compiler, loader }
    }

    /// Runs one invocation
    ///
    /// The configuration is validated before the driver is loaded. Fatal errors
    /// abort the run; per-item extraction and output failures are collected in the
    /// returned report.
    ///
    /// # Arguments
    /// * `config` - The invocation configuration
    pub fn run(&self, config: &Config) -> Result<Analysis> {
        let mut config = config.clone();
        let kind = validate::validate_config(&mut config)?;
        tracing::debug!("Validated configuration: {kind:?}");

        let mut session = AnalyzerSession::open(self.loader, config.driver_load, config.driver_module_name())?;
        let mut report = ExtractionReport::default();

        let output = match kind {
            PipelineKind::ListTargets => AnalysisOutput::Targets(session.list_targets()?),
            PipelineKind::Compute | PipelineKind::Graphics => {
                select_target(&mut session, &config)?;
                AnalysisOutput::Pipeline(self.run_pipeline(&mut session, &config, kind, &mut report)?)
            }
            PipelineKind::RayTracing(mode) => {
                select_target(&mut session, &config)?;
                AnalysisOutput::RayTracing(dxr::compile_ray_tracing(&mut session, &config, mode, self.compiler, &mut report)?)
            }
        };

        if !report.is_clean() {
            tracing::info!("Finished with {} warning(s)", report.warnings.len());
        }
        Ok(Analysis { kind, output, report })
    }

    fn run_pipeline(&self, session: &mut AnalyzerSession, config: &Config, kind: PipelineKind, report: &mut ExtractionReport) -> Result<PipelineResult> {
        let (handle, mut result) = PipelineAssembler::new(config, self.compiler).assemble(session, kind, report)?;

        let request = ArtifactRequest {
            disassembly: ShaderStage::ALL.into_iter().filter(|stage| non_empty(&config.stage(*stage).isa).is_some()).collect(),
            binary: non_empty(&config.pipeline_binary).is_some(),
        };
        if !request.disassembly.is_empty() || request.binary {
            let binary = session.extract_pipeline_artifacts(handle, &mut result, &request, report);
            if let (Some(binary), Some(path)) = (binary, non_empty(&config.pipeline_binary)) {
                write_artifact(path, binary, report);
            }
        }

        write_pipeline_outputs(config, &result, report);
        Ok(result)
    }
}

fn select_target(session: &mut AnalyzerSession, config: &Config) -> Result<()> {
    match config.target_gpu.as_deref().filter(|target| !target.is_empty()) {
        Some(target) => session.select_target(target),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::stats::parse_stats;
    use crate::testing::{MockAnalyzer, MockCompiler, MockLoader};
    use crate::validate::ConfigError;

    fn run(config: &Config, compiler: &MockCompiler, analyzer: MockAnalyzer) -> Result<Analysis> {
        let loader = MockLoader::new(analyzer);
        Analyzer::new(compiler, &loader).run(config)
    }

    fn compute_config(dir: &std::path::Path) -> Config {
        let yaml = format!(
            r#"
compute:
  hlsl: shader.hlsl
  entry: CSMain
  stats: {}
"#,
            dir.join("out.txt").display()
        );
        Config::from_yaml(&yaml).unwrap()
    }

    #[test]
    fn test_compute_statistics_only() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = MockCompiler {
            root_signature_attribute: true,
            ..Default::default()
        };
        let analysis = run(&compute_config(dir.path()), &compiler, MockAnalyzer::default()).unwrap();

        assert_eq!(analysis.kind, PipelineKind::Compute);
        assert!(analysis.report.is_clean());

        let fields = parse_stats(&std::fs::read_to_string(dir.path().join("out.txt")).unwrap());
        let names: Vec<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names.len(), 13);
        assert_eq!(&names[10..], &["computeWorkGroupSize0", "computeWorkGroupSize1", "computeWorkGroupSize2"]);
        assert_eq!(fields[10].1, "64");

        // Only the statistics file was requested
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = MockCompiler {
            root_signature_attribute: true,
            ..Default::default()
        };
        let mut config = compute_config(dir.path());
        config.compute.isa = Some(dir.path().join("isa.txt"));

        let first = run(&config, &compiler, MockAnalyzer::default()).unwrap();
        let first_stats = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        let second = run(&config, &compiler, MockAnalyzer::default()).unwrap();
        let second_stats = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();

        assert_eq!(first.output, second.output);
        assert_eq!(first_stats, second_stats);
        assert_eq!(std::fs::read_to_string(dir.path().join("isa.txt")).unwrap(), "cs code");
    }

    #[test]
    fn test_graphics_without_root_signature() {
        let config = Config::from_yaml("vertex:\n  hlsl: vs.hlsl\n  entry: main\n").unwrap();
        let error = run(&config, &MockCompiler::default(), MockAnalyzer::default()).unwrap_err();
        assert!(matches!(error, Error::RootSignature(ref message) if message.contains("vertex")));
    }

    #[test]
    fn test_graphics_outputs_and_pipeline_binary() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            r#"
vertex:
  hlsl: triangle.hlsl
  entry: VSMain
  isa: {dir}/vs.txt
pixel:
  hlsl: triangle.hlsl
  entry: PSMain
  stats: {dir}/ps_stats.txt
rs_macro: RootSig
pipeline_binary: {dir}/pipeline.bin
"#,
            dir = dir.path().display()
        );
        let config = Config::from_yaml(&yaml).unwrap();
        let compiler = MockCompiler::default();
        let analysis = run(&config, &compiler, MockAnalyzer::default()).unwrap();

        assert!(analysis.report.is_clean());
        assert_eq!(compiler.root_signature_macros(), vec![("RootSig".to_string(), "rootsig_1_1".to_string())]);
        assert_eq!(std::fs::read_to_string(dir.path().join("vs.txt")).unwrap(), "vs code");
        assert_eq!(std::fs::read(dir.path().join("pipeline.bin")).unwrap(), vec![0xde, 0xad]);
        assert_eq!(parse_stats(&std::fs::read_to_string(dir.path().join("ps_stats.txt")).unwrap()).len(), 10);
    }

    #[test]
    fn test_invalid_configuration_stops_before_driver() {
        let config = Config::from_yaml("compute:\n  hlsl: a.hlsl\n  binary: a.bin\n").unwrap();
        let loader = MockLoader {
            online_available: false,
            ..MockLoader::new(MockAnalyzer::default())
        };
        let error = Analyzer::new(&MockCompiler::default(), &loader).run(&config).unwrap_err();
        assert!(matches!(error, Error::Configuration(ConfigError::ConflictingInputs(ShaderStage::Compute))));
    }

    #[test]
    fn test_driver_init_failure() {
        let config = Config::from_yaml("list_targets: true\n").unwrap();
        let loader = MockLoader {
            online_available: false,
            ..MockLoader::new(MockAnalyzer::default())
        };
        let error = Analyzer::new(&MockCompiler::default(), &loader).run(&config).unwrap_err();
        assert!(matches!(error, Error::DriverInit(_)));
    }

    #[test]
    fn test_list_targets() {
        let config = Config::from_yaml("list_targets: true\n").unwrap();
        let analysis = run(&config, &MockCompiler::default(), MockAnalyzer::default()).unwrap();
        assert_eq!(analysis.output, AnalysisOutput::Targets(vec!["gfx1030".to_string(), "gfx1100".to_string()]));
    }

    #[test]
    fn test_ray_tracing_run_writes_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            r#"
target_gpu: gfx1100
dxr_mode: Pipeline
dxr_hlsl: {dir}/rt.hlsl
dxr_stats: {dir}/stats_*.txt
output_metadata: {dir}/metadata.json
"#,
            dir = dir.path().display()
        );
        let config = Config::from_yaml(&yaml).unwrap();
        let analyzer = MockAnalyzer {
            generated: vec![backend::GeneratedPipeline {
                unified: true,
                raygen: Some("RayGen".to_string()),
                shaders: vec!["RayGen".to_string()],
            }],
            ..Default::default()
        };
        let log = analyzer.log.clone();
        let analysis = run(&config, &MockCompiler::default(), analyzer).unwrap();

        assert_eq!(analysis.kind, PipelineKind::RayTracing(RayTracingMode::Pipeline));
        assert!(log.borrow().contains(&"set_target_gpu gfx1100".to_string()));
        let metadata = OutputMetadata::read_file(dir.path().join("metadata.json")).unwrap();
        assert_eq!(metadata.pipelines[0].pipeline_name, "RayGen");
        assert!(metadata.pipelines[0].is_unified);
        assert_eq!(metadata.pipelines[0].shaders[0].stats_file, Some(dir.path().join("stats_RayGen.txt")));
    }
}
