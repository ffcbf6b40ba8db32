//! Root signature resolution
//!
//! A pipeline's root signature comes from exactly one of three sources, chosen in
//! priority order:
//!
//! 1. a macro in an HLSL file, compiled by the front-end compiler
//! 2. a serialized root signature file
//! 3. the `RTS0` chunk embedded in one of the compiled stages
//!
//! Selection is a pure function of the configuration ([`RootSignaturePlan::select`]).
//! Once a source is selected no lower priority source is tried, even if the
//! selected one fails.

use super::compiler::{CompiledStage, IncludeSearchPath, RootSignatureRequest, ShaderCompiler};
use super::dxbc::{ROOT_SIGNATURE_FOURCC, find_chunk, parse_root_signature};
use crate::config::{Config, ShaderStage, non_empty};
use crate::error::{Error, Result};
use std::path::PathBuf;

/// The root signature source selected for a configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootSignaturePlan {
    /// Compile the root signature from a macro
    Macro {
        /// Macro name
        name: String,
        /// File defining the macro; `None` when it could not be determined
        source: Option<PathBuf>,
        /// Root signature version
        version: String,
    },
    /// Read a serialized root signature file
    Serialized(PathBuf),
    /// Look for a root signature embedded in the stage bytecode
    Embedded,
}

impl RootSignaturePlan {
    /// Selects the root signature source for `config`
    pub fn select(config: &Config) -> Self {
        if let Some(name) = config.rs_macro.as_deref().filter(|name| !name.is_empty()) {
            return Self::Macro {
                name: name.to_string(),
                source: non_empty(&config.rs_macro_file).map(|p| p.to_path_buf()),
                version: config.root_signature_version().to_string(),
            };
        }

        if let Some(path) = non_empty(&config.rs_serialized) {
            return Self::Serialized(path.to_path_buf());
        }

        Self::Embedded
    }
}

/// Where a resolved root signature came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootSignatureSource {
    /// Compiled from a macro
    Macro,
    /// Read from a serialized file
    Serialized,
    /// Embedded in the bytecode of this stage
    Embedded(ShaderStage),
}

/// A root signature blob ready to be registered with the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRootSignature {
    /// Source the blob came from
    pub source: RootSignatureSource,
    /// Serialized root signature, or a shader container embedding one
    pub blob: Vec<u8>,
}

/// Resolves the root signature of a compute or graphics pipeline
///
/// # Arguments
/// * `config` - The validated configuration
/// * `stages` - The compiled stages of the pipeline
/// * `compiler` - Front-end compiler used for the macro path
///
/// # Returns
/// The resolved root signature, or [`Error::RootSignature`] if the selected source
/// yields none
pub fn resolve_root_signature(config: &Config, stages: &[CompiledStage], compiler: &dyn ShaderCompiler) -> Result<ResolvedRootSignature> {
    match RootSignaturePlan::select(config) {
        RootSignaturePlan::Macro { name, source, version } => {
            let Some(source) = source else {
                return Err(Error::RootSignature(format!(
                    "root signature macro '{name}' was specified, but the file defining it could not be determined because the shader stages use different HLSL files; specify the root signature source file explicitly"
                )));
            };

            tracing::debug!("Compiling root signature macro '{name}' from {} ({version})", source.display());
            let includes = IncludeSearchPath::new(&source, &config.include_dirs);
            let blob = compiler
                .compile_root_signature(&RootSignatureRequest {
                    source: &source,
                    macro_name: &name,
                    version: &version,
                    defines: &config.defines,
                    includes: &includes,
                })
                .map_err(|message| Error::RootSignature(format!("failed to compile root signature macro '{name}' from '{}': {message}", source.display())))?;

            Ok(ResolvedRootSignature { source: RootSignatureSource::Macro, blob })
        }
        RootSignaturePlan::Serialized(path) => {
            tracing::debug!("Reading serialized root signature from {}", path.display());
            let blob = std::fs::read(&path).map_err(|e| Error::RootSignature(format!("failed to read serialized root signature '{}': {e}", path.display())))?;

            Ok(ResolvedRootSignature { source: RootSignatureSource::Serialized, blob })
        }
        RootSignaturePlan::Embedded => resolve_embedded(stages),
    }
}

/// Order in which stages are searched for an embedded root signature
fn embedded_search_order(stages: &[CompiledStage]) -> Vec<ShaderStage> {
    let has = |stage: ShaderStage| stages.iter().any(|compiled| compiled.stage == stage);
    if has(ShaderStage::Compute) {
        vec![ShaderStage::Compute]
    } else {
        ShaderStage::GRAPHICS.into_iter().filter(|stage| has(*stage)).collect()
    }
}

fn resolve_embedded(stages: &[CompiledStage]) -> Result<ResolvedRootSignature> {
    let order = embedded_search_order(stages);

    for stage in &order {
        let Some(compiled) = stages.iter().find(|compiled| compiled.stage == *stage) else {
            continue;
        };

        match find_chunk(&compiled.bytecode, ROOT_SIGNATURE_FOURCC) {
            Ok(Some(rts0)) => match parse_root_signature(rts0) {
                Ok(header) => {
                    tracing::debug!("Using root signature 1.{} embedded in the {stage} shader", header.version - 1);
                    return Ok(ResolvedRootSignature {
                        source: RootSignatureSource::Embedded(*stage),
                        blob: compiled.bytecode.clone(),
                    });
                }
                Err(e) => tracing::debug!("Root signature embedded in the {stage} shader is malformed: {e}"),
            },
            Ok(None) => tracing::debug!("No root signature embedded in the {stage} shader"),
            Err(e) => tracing::debug!("Could not read the {stage} shader container: {e}"),
        }
    }

    let searched = if order.is_empty() {
        "any".to_string()
    } else {
        order.iter().map(|stage| stage.name()).collect::<Vec<_>>().join(", ")
    };
    Err(Error::RootSignature(format!(
        "no root signature was found in the {searched} shader bytecode; the [RootSignature()] attribute is expected on the shader entry point. \
         Alternatively, provide the root signature through a root signature macro and its HLSL source file, or through a serialized root signature file"
    )))
}
