//! Shader stage compilation
//!
//! Turns a stage's input (HLSL source or precompiled bytecode) into bytecode and
//! writes the optional bytecode and bytecode-disassembly side files. The HLSL
//! compiler itself is an external collaborator reached through [`ShaderCompiler`].

use crate::config::{ShaderStage, StageConfig, non_empty};
use crate::error::{Error, ExtractionReport, Result, Warning};
use crate::results::writer::write_artifact;
use std::path::{Path, PathBuf};

/// Ordered list of directories searched for `#include` targets
///
/// The directory of the shader being compiled always comes first, followed by the
/// configured include directories in order. The first match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeSearchPath {
    dirs: Vec<PathBuf>,
}

impl IncludeSearchPath {
    /// Creates the search path for `shader`
    ///
    /// # Arguments
    /// * `shader` - The file being compiled
    /// * `include_dirs` - Additional include directories, searched after the shader's own directory
    pub fn new(shader: &Path, include_dirs: &[PathBuf]) -> Self {
        let own_dir = shader.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new(".")).to_path_buf();

        let mut dirs = vec![own_dir];
        for dir in include_dirs {
            if !dirs.contains(dir) {
                dirs.push(dir.clone());
            }
        }
        Self { dirs }
    }

    /// Directories in search order
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Resolves `include` against the search path
    ///
    /// # Returns
    /// The first existing candidate, or `None` if no directory holds the file
    pub fn resolve(&self, include: &str) -> Option<PathBuf> {
        self.dirs.iter().map(|dir| dir.join(include)).find(|candidate| candidate.is_file())
    }
}

/// A request to compile one shader entry point or library
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    /// HLSL source file
    pub source: &'a Path,
    /// Entry point; empty for libraries
    pub entry: &'a str,
    /// Target profile, e.g. `vs_6_0` or `lib_6_3`
    pub target: &'a str,
    /// Preprocessor defines
    pub defines: &'a [String],
    /// Include search path
    pub includes: &'a IncludeSearchPath,
}

/// A request to compile a root signature defined by a macro
#[derive(Debug, Clone, Copy)]
pub struct RootSignatureRequest<'a> {
    /// HLSL file that defines the macro
    pub source: &'a Path,
    /// Macro name
    pub macro_name: &'a str,
    /// Root signature version, e.g. `rootsig_1_1`
    pub version: &'a str,
    /// Preprocessor defines
    pub defines: &'a [String],
    /// Include search path
    pub includes: &'a IncludeSearchPath,
}

/// Front-end HLSL compiler
///
/// Errors are the compiler's diagnostic output.
pub trait ShaderCompiler {
    /// Compiles an entry point or library to bytecode
    fn compile(&self, request: &CompileRequest<'_>) -> Result<Vec<u8>, String>;

    /// Compiles the root signature held in a macro to a serialized blob
    fn compile_root_signature(&self, request: &RootSignatureRequest<'_>) -> Result<Vec<u8>, String>;

    /// Disassembles front-end bytecode
    fn disassemble(&self, bytecode: &[u8]) -> Result<String, String>;
}

/// Bytecode of one compiled stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStage {
    /// Stage the bytecode belongs to
    pub stage: ShaderStage,
    /// DXBC or DXIL container
    pub bytecode: Vec<u8>,
}

impl CompiledStage {
    /// Length of the bytecode in bytes
    pub fn len(&self) -> usize {
        self.bytecode.len()
    }

    /// Returns true if the bytecode is empty
    pub fn is_empty(&self) -> bool {
        self.bytecode.is_empty()
    }
}

/// Compiles or loads shader stages with shared defines and include directories
pub struct StageCompiler<'a> {
    compiler: &'a dyn ShaderCompiler,
    defines: &'a [String],
    include_dirs: &'a [PathBuf],
}

impl<'a> StageCompiler<'a> {
    /// Creates a stage compiler
    pub fn new(compiler: &'a dyn ShaderCompiler, defines: &'a [String], include_dirs: &'a [PathBuf]) -> Self {
        Self { compiler, defines, include_dirs }
    }

    /// Produces the bytecode of one stage
    ///
    /// A binary input is read as is; an HLSL input is compiled with the stage's
    /// entry point and target profile. The requested bytecode dump and bytecode
    /// disassembly are written afterwards; failures there are recorded in `report`
    /// and do not fail the stage.
    ///
    /// # Arguments
    /// * `stage` - The stage being compiled
    /// * `config` - The stage's settings
    /// * `report` - Collects non-fatal dump failures
    ///
    /// # Returns
    /// The stage bytecode
    pub fn compile_stage(&self, stage: ShaderStage, config: &StageConfig, report: &mut ExtractionReport) -> Result<CompiledStage> {
        let bytecode = if let Some(binary) = config.binary_path() {
            tracing::debug!("Reading {stage} shader binary from {}", binary.display());
            std::fs::read(binary).map_err(|e| Error::io(binary, e))?
        } else if let Some(source) = config.hlsl_path() {
            let target = config.target_profile(stage);
            tracing::debug!("Compiling {stage} shader {} (entry '{}', target {target})", source.display(), config.entry);
            let includes = IncludeSearchPath::new(source, self.include_dirs);
            self.compiler
                .compile(&CompileRequest {
                    source,
                    entry: &config.entry,
                    target: &target,
                    defines: self.defines,
                    includes: &includes,
                })
                .map_err(|message| Error::Compilation { stage: stage.name().to_string(), message })?
        } else {
            return Err(Error::Compilation {
                stage: stage.name().to_string(),
                message: "no HLSL source or binary input".to_string(),
            });
        };

        let compiled = CompiledStage { stage, bytecode };
        self.dump(&compiled, config, report);
        Ok(compiled)
    }

    /// Writes the bytecode and bytecode disassembly side files of `compiled`
    fn dump(&self, compiled: &CompiledStage, config: &StageConfig, report: &mut ExtractionReport) {
        if let Some(path) = non_empty(&config.bytecode_out) {
            write_artifact(path, &compiled.bytecode, report);
        }

        if let Some(path) = non_empty(&config.bytecode_isa) {
            match self.compiler.disassemble(&compiled.bytecode) {
                Ok(text) => {
                    write_artifact(path, text.as_bytes(), report);
                }
                Err(reason) => report.push(Warning::Extraction {
                    item: format!("{} shader", compiled.stage),
                    artifact: "bytecode disassembly",
                    reason,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCompiler;

    #[test]
    fn test_include_search_order() {
        let dir = tempfile::tempdir().unwrap();
        let shader_dir = dir.path().join("shaders");
        let extra_a = dir.path().join("a");
        let extra_b = dir.path().join("b");
        for d in [&shader_dir, &extra_a, &extra_b] {
            std::fs::create_dir_all(d).unwrap();
        }
        std::fs::write(shader_dir.join("common.hlsli"), "// local").unwrap();
        std::fs::write(extra_a.join("common.hlsli"), "// a").unwrap();
        std::fs::write(extra_a.join("only_a.hlsli"), "// a").unwrap();
        std::fs::write(extra_b.join("only_a.hlsli"), "// b").unwrap();

        let search = IncludeSearchPath::new(&shader_dir.join("main.hlsl"), &[extra_a.clone(), extra_b.clone()]);
        assert_eq!(search.dirs(), &[shader_dir.clone(), extra_a.clone(), extra_b]);
        assert_eq!(search.resolve("common.hlsli"), Some(shader_dir.join("common.hlsli")));
        assert_eq!(search.resolve("only_a.hlsli"), Some(extra_a.join("only_a.hlsli")));
        assert_eq!(search.resolve("missing.hlsli"), None);
    }

    #[test]
    fn test_bare_file_name_searches_current_dir() {
        let search = IncludeSearchPath::new(Path::new("shader.hlsl"), &[]);
        assert_eq!(search.dirs(), &[PathBuf::from(".")]);
    }

    #[test]
    fn test_binary_input_is_read_directly() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("vs.bin");
        std::fs::write(&binary, [1u8, 2, 3]).unwrap();

        let compiler = MockCompiler::default();
        let stage_compiler = StageCompiler::new(&compiler, &[], &[]);
        let config = StageConfig {
            binary: Some(binary),
            ..Default::default()
        };

        let mut report = ExtractionReport::default();
        let compiled = stage_compiler.compile_stage(ShaderStage::Vertex, &config, &mut report).unwrap();
        assert_eq!(compiled.bytecode, vec![1, 2, 3]);
        assert!(compiler.compiled_targets().is_empty());
    }

    #[test]
    fn test_compile_failure_names_stage() {
        let compiler = MockCompiler {
            fail_compile: Some("error X3000: syntax error".to_string()),
            ..Default::default()
        };
        let stage_compiler = StageCompiler::new(&compiler, &[], &[]);
        let config = StageConfig {
            hlsl: Some(PathBuf::from("broken.hlsl")),
            entry: "PSMain".to_string(),
            ..Default::default()
        };

        let mut report = ExtractionReport::default();
        let error = stage_compiler.compile_stage(ShaderStage::Pixel, &config, &mut report).unwrap_err();
        assert!(matches!(&error, Error::Compilation { stage, .. } if stage == "pixel"));
        assert!(error.to_string().contains("X3000"));
    }

    #[test]
    fn test_dumps_are_written_and_failures_are_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = MockCompiler::default();
        let stage_compiler = StageCompiler::new(&compiler, &[], &[]);
        let config = StageConfig {
            hlsl: Some(dir.path().join("shader.hlsl")),
            entry: "CSMain".to_string(),
            bytecode_out: Some(dir.path().join("cs.dxil")),
            bytecode_isa: Some(dir.path().join("missing_dir").join("cs.txt")),
            ..Default::default()
        };

        let mut report = ExtractionReport::default();
        let compiled = stage_compiler.compile_stage(ShaderStage::Compute, &config, &mut report).unwrap();
        assert_eq!(std::fs::read(dir.path().join("cs.dxil")).unwrap(), compiled.bytecode);
        assert_eq!(compiler.compiled_targets(), vec!["cs_6_0".to_string()]);
        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(report.warnings[0], Warning::Output { .. }));
    }
}
