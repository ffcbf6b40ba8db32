//! Ray tracing state description
//!
//! Declarative description of a ray tracing state object, read from JSON:
//!
//! ```json
//! {
//!   "libraries": [
//!     { "source_type": "hlsl", "path": "rt.hlsl", "exports": [{ "name": "RayGen" }, { "name": "Hit", "rename": "ClosestHit" }] }
//!   ],
//!   "hit_groups": [{ "name": "HitGroup", "closest_hit": "ClosestHit" }],
//!   "local_root_signatures": [{ "file": "local_rs.bin", "exports": ["HitGroup"] }],
//!   "global_root_signatures": [{ "file": "global_rs.bin" }],
//!   "shader_configs": [{ "max_payload_size": 16, "max_attribute_size": 8 }],
//!   "pipeline_config": { "max_recursion_depth": 1 }
//! }
//! ```
//!
//! The description is parsed once, gets the library bytecode attached, and is then
//! turned into a subobject graph (see [`super::graph`]).

use crate::config::non_empty;
use crate::error::{Error, Result};
use crate::frontend::compiler::{CompileRequest, IncludeSearchPath, ShaderCompiler};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Default shader model for HLSL libraries
pub const DEFAULT_LIBRARY_SHADER_MODEL: &str = "6_3";

/// How a DXIL library is provided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LibrarySourceType {
    /// Precompiled DXIL library
    Binary,
    /// HLSL source compiled as a library
    Hlsl,
}

/// A shader exported by a library
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExportDesc {
    /// Name of the function in the library
    pub name: String,
    /// Name the function is exported under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
}

impl ExportDesc {
    /// The name other subobjects refer to this export by
    pub fn exported_name(&self) -> &str {
        self.rename.as_deref().filter(|r| !r.is_empty()).unwrap_or(&self.name)
    }
}

/// DXIL library node
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DxilLibraryDesc {
    /// Source type
    pub source_type: LibrarySourceType,
    /// Library file
    pub path: PathBuf,
    /// Exports; empty exports every shader of the library
    #[serde(default)]
    pub exports: Vec<ExportDesc>,
    /// Library bytecode, attached by [`RayTracingStateDesc::attach_binaries`]
    #[serde(skip)]
    pub binary: Vec<u8>,
}

/// Hit group primitive type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HitGroupType {
    /// Triangle geometry
    #[default]
    Triangles,
    /// Procedural geometry with an intersection shader
    ProceduralPrimitive,
}

/// Hit group node
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HitGroupDesc {
    /// Hit group export name
    pub name: String,
    /// Primitive type
    #[serde(default, rename = "type")]
    pub kind: HitGroupType,
    /// Any hit shader export
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any_hit: Option<String>,
    /// Closest hit shader export
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closest_hit: Option<String>,
    /// Intersection shader export
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intersection: Option<String>,
}

impl HitGroupDesc {
    /// Shader exports the hit group references
    pub fn shaders(&self) -> impl Iterator<Item = &str> {
        [&self.any_hit, &self.closest_hit, &self.intersection].into_iter().filter_map(|s| s.as_deref()).filter(|s| !s.is_empty())
    }
}

/// Local or global root signature node
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RootSignatureAssociationDesc {
    /// Serialized root signature file
    pub file: PathBuf,
    /// Exports the root signature applies to
    #[serde(default)]
    pub exports: Vec<String>,
}

/// Shader config node
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShaderConfigDesc {
    /// Maximum ray payload size, in bytes
    pub max_payload_size: u32,
    /// Maximum intersection attribute size, in bytes
    pub max_attribute_size: u32,
    /// Exports the config applies to
    #[serde(default)]
    pub exports: Vec<String>,
}

/// Pipeline config node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PipelineConfigDesc {
    /// Maximum trace recursion depth
    pub max_recursion_depth: u32,
}

/// Ray tracing state description
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RayTracingStateDesc {
    /// DXIL libraries
    #[serde(default)]
    pub libraries: Vec<DxilLibraryDesc>,
    /// Hit groups
    #[serde(default)]
    pub hit_groups: Vec<HitGroupDesc>,
    /// Local root signatures
    #[serde(default)]
    pub local_root_signatures: Vec<RootSignatureAssociationDesc>,
    /// Global root signatures
    #[serde(default)]
    pub global_root_signatures: Vec<RootSignatureAssociationDesc>,
    /// Shader configs
    #[serde(default)]
    pub shader_configs: Vec<ShaderConfigDesc>,
    /// The pipeline config; only absent for a single HLSL file, which declares its own
    #[serde(default)]
    pub pipeline_config: Option<PipelineConfigDesc>,
}

/// Map from HLSL library sources to precompiled DXIL libraries (YAML)
///
/// ```yaml
/// shaders/rt.hlsl: build/rt.dxil
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct HlslMapping {
    entries: BTreeMap<PathBuf, PathBuf>,
}

impl HlslMapping {
    /// Parses a mapping from YAML content
    pub fn from_yaml(yaml_content: &str) -> Result<Self, serde_norway::Error> {
        serde_norway::from_str(yaml_content)
    }

    /// Parses a mapping file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_yaml(&content)?)
    }

    /// Compiled library for `source`, if mapped
    pub fn get(&self, source: &Path) -> Option<&Path> {
        self.entries.get(source).map(PathBuf::as_path)
    }
}

/// Settings used to resolve library bytecode
#[derive(Clone, Copy)]
pub struct LibraryResolver<'a> {
    /// Front-end compiler for HLSL libraries
    pub compiler: &'a dyn ShaderCompiler,
    /// Precompiled replacements for HLSL libraries
    pub mapping: Option<&'a HlslMapping>,
    /// Library shader model, e.g. `6_3`
    pub shader_model: &'a str,
    /// Preprocessor defines
    pub defines: &'a [String],
    /// Include directories
    pub include_dirs: &'a [PathBuf],
}

impl RayTracingStateDesc {
    /// Parses and validates a description from JSON content
    ///
    /// # Arguments
    /// * `json` - JSON string containing the description
    pub fn from_json(json: &str) -> Result<Self> {
        let desc: Self = serde_json::from_str(json).map_err(|e| Error::StateDescription(e.to_string()))?;
        desc.validate(true)?;
        Ok(desc)
    }

    /// Parses and validates a description file
    ///
    /// Relative library and root signature paths are resolved against the
    /// directory of the description file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut desc = Self::from_json(&content).map_err(|e| match e {
            Error::StateDescription(message) => Error::StateDescription(format!("{}: {message}", path.display())),
            other => other,
        })?;

        if let Some(base) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            desc.resolve_paths(base);
        }
        Ok(desc)
    }

    /// A description of a single HLSL library that exports every shader
    ///
    /// Hit groups, configs and root signatures are expected to be declared in the
    /// HLSL source itself.
    pub fn from_single_hlsl(path: &Path) -> Self {
        Self {
            libraries: vec![DxilLibraryDesc {
                source_type: LibrarySourceType::Hlsl,
                path: path.to_path_buf(),
                exports: Vec::new(),
                binary: Vec::new(),
            }],
            ..Default::default()
        }
    }

    /// Checks names and references
    ///
    /// # Arguments
    /// * `require_pipeline_config` - Whether the description must carry its pipeline config
    pub fn validate(&self, require_pipeline_config: bool) -> Result<()> {
        if self.libraries.is_empty() {
            return Err(Error::StateDescription("at least one library is required".to_string()));
        }
        if require_pipeline_config && self.pipeline_config.is_none() {
            return Err(Error::StateDescription("exactly one pipeline config is required".to_string()));
        }

        let mut names = HashSet::new();
        for library in &self.libraries {
            if library.path.as_os_str().is_empty() {
                return Err(Error::StateDescription("library path cannot be empty".to_string()));
            }
            for export in &library.exports {
                if export.name.is_empty() {
                    return Err(Error::StateDescription(format!("export of library '{}' has an empty name", library.path.display())));
                }
                if !names.insert(export.exported_name().to_string()) {
                    return Err(Error::StateDescription(format!("duplicate export '{}'", export.exported_name())));
                }
            }
        }

        // A library without an export list exports everything, so references cannot be checked
        let exports_known = self.libraries.iter().all(|library| !library.exports.is_empty());

        for hit_group in &self.hit_groups {
            if hit_group.name.is_empty() {
                return Err(Error::StateDescription("hit group name cannot be empty".to_string()));
            }
            if hit_group.shaders().next().is_none() {
                return Err(Error::StateDescription(format!("hit group '{}' references no shader", hit_group.name)));
            }
            if hit_group.kind == HitGroupType::Triangles && hit_group.intersection.as_deref().is_some_and(|s| !s.is_empty()) {
                return Err(Error::StateDescription(format!("triangle hit group '{}' cannot have an intersection shader", hit_group.name)));
            }
            if exports_known {
                if let Some(missing) = hit_group.shaders().find(|shader| !names.contains(*shader)) {
                    return Err(Error::StateDescription(format!("hit group '{}' references unknown export '{missing}'", hit_group.name)));
                }
            }
            if !names.insert(hit_group.name.clone()) {
                return Err(Error::StateDescription(format!("duplicate export '{}'", hit_group.name)));
            }
        }

        let associations = self
            .local_root_signatures
            .iter()
            .map(|rs| (&rs.exports, "root signature"))
            .chain(self.global_root_signatures.iter().map(|rs| (&rs.exports, "root signature")))
            .chain(self.shader_configs.iter().map(|config| (&config.exports, "shader config")));
        for (exports, what) in associations {
            if let Some(missing) = exports.iter().find(|export| export.is_empty() || (exports_known && !names.contains(export.as_str()))) {
                return Err(Error::StateDescription(format!("{what} is associated with unknown export '{missing}'")));
            }
        }

        for rs in self.local_root_signatures.iter().chain(&self.global_root_signatures) {
            if rs.file.as_os_str().is_empty() {
                return Err(Error::StateDescription("root signature file cannot be empty".to_string()));
            }
        }

        Ok(())
    }

    /// Resolves relative file paths against `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        self.libraries.iter_mut().for_each(|library| resolve(&mut library.path));
        self.local_root_signatures.iter_mut().chain(self.global_root_signatures.iter_mut()).for_each(|rs| resolve(&mut rs.file));
    }

    /// Attaches the bytecode of every library
    ///
    /// Binary libraries are read as is. HLSL libraries are replaced by their mapped
    /// precompiled library when the mapping has one, and compiled otherwise.
    pub fn attach_binaries(&mut self, resolver: &LibraryResolver<'_>) -> Result<()> {
        let target = format!("lib_{}", if resolver.shader_model.is_empty() { DEFAULT_LIBRARY_SHADER_MODEL } else { resolver.shader_model });

        for library in &mut self.libraries {
            let path = library.path.as_path();
            library.binary = match library.source_type {
                LibrarySourceType::Binary => std::fs::read(path).map_err(|e| Error::io(path, e))?,
                LibrarySourceType::Hlsl => match resolver.mapping.and_then(|mapping| mapping.get(path)) {
                    Some(compiled) => {
                        tracing::debug!("Using {} for library {}", compiled.display(), path.display());
                        std::fs::read(compiled).map_err(|e| Error::io(compiled, e))?
                    }
                    None => {
                        tracing::debug!("Compiling library {} ({target})", path.display());
                        let includes = IncludeSearchPath::new(path, resolver.include_dirs);
                        resolver
                            .compiler
                            .compile(&CompileRequest {
                                source: path,
                                entry: "",
                                target: &target,
                                defines: resolver.defines,
                                includes: &includes,
                            })
                            .map_err(|message| Error::Compilation {
                                stage: format!("library '{}'", path.display()),
                                message,
                            })?
                    }
                },
            };
        }
        Ok(())
    }
}

/// Loads the HLSL mapping file named by `path`, if any
pub fn load_mapping(path: &Option<PathBuf>) -> Result<Option<HlslMapping>> {
    let Some(path) = non_empty(path) else {
        return Ok(None);
    };
    HlslMapping::from_file(path)
        .map(Some)
        .map_err(|e| Error::StateDescription(format!("failed to load HLSL mapping '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCompiler;

    const DESC: &str = r#"{
        "libraries": [
            { "source_type": "hlsl", "path": "rt.hlsl", "exports": [{ "name": "RayGen" }, { "name": "Hit", "rename": "ClosestHit" }, { "name": "Miss" }] }
        ],
        "hit_groups": [{ "name": "HitGroup", "closest_hit": "ClosestHit" }],
        "local_root_signatures": [{ "file": "local_rs.bin", "exports": ["HitGroup"] }],
        "global_root_signatures": [{ "file": "global_rs.bin" }],
        "shader_configs": [{ "max_payload_size": 16, "max_attribute_size": 8, "exports": ["RayGen", "Miss", "HitGroup"] }],
        "pipeline_config": { "max_recursion_depth": 1 }
    }"#;

    #[test]
    fn test_parse_description() {
        let desc = RayTracingStateDesc::from_json(DESC).unwrap();
        assert_eq!(desc.libraries[0].source_type, LibrarySourceType::Hlsl);
        assert_eq!(desc.libraries[0].exports[1].exported_name(), "ClosestHit");
        assert_eq!(desc.hit_groups[0].kind, HitGroupType::Triangles);
        assert_eq!(desc.hit_groups[0].shaders().collect::<Vec<_>>(), vec!["ClosestHit"]);
        assert_eq!(desc.pipeline_config, Some(PipelineConfigDesc { max_recursion_depth: 1 }));
    }

    #[test]
    fn test_validation_errors() {
        let mut desc = RayTracingStateDesc::from_json(DESC).unwrap();
        desc.hit_groups[0].closest_hit = Some("Hit".to_string());
        assert!(desc.validate(true).unwrap_err().to_string().contains("unknown export 'Hit'"));

        let mut desc = RayTracingStateDesc::from_json(DESC).unwrap();
        desc.pipeline_config = None;
        assert!(desc.validate(true).is_err());
        assert!(desc.validate(false).is_ok());

        let mut desc = RayTracingStateDesc::from_json(DESC).unwrap();
        desc.hit_groups[0].name = "RayGen".to_string();
        assert!(desc.validate(true).unwrap_err().to_string().contains("duplicate export"));

        let mut desc = RayTracingStateDesc::from_json(DESC).unwrap();
        desc.shader_configs[0].exports.push("Nothing".to_string());
        assert!(desc.validate(true).is_err());

        assert!(RayTracingStateDesc::from_json(r#"{ "libraries": [], "pipeline_config": { "max_recursion_depth": 1 } }"#).is_err());
        assert!(RayTracingStateDesc::from_json(r#"{ "librarys": [] }"#).is_err());
    }

    #[test]
    fn test_single_hlsl_exports_everything() {
        let desc = RayTracingStateDesc::from_single_hlsl(Path::new("all.hlsl"));
        assert!(desc.validate(false).is_ok());
        assert!(desc.libraries[0].exports.is_empty());
    }

    #[test]
    fn test_file_paths_are_relative_to_description() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, DESC).unwrap();

        let desc = RayTracingStateDesc::from_file(&path).unwrap();
        assert_eq!(desc.libraries[0].path, dir.path().join("rt.hlsl"));
        assert_eq!(desc.global_root_signatures[0].file, dir.path().join("global_rs.bin"));
    }

    #[test]
    fn test_attach_binaries() {
        let dir = tempfile::tempdir().unwrap();
        let precompiled = dir.path().join("mapped.dxil");
        std::fs::write(&precompiled, [4u8, 2]).unwrap();
        let binary = dir.path().join("lib.dxil");
        std::fs::write(&binary, [1u8]).unwrap();

        let mut desc = RayTracingStateDesc::from_single_hlsl(Path::new("mapped.hlsl"));
        desc.libraries.push(DxilLibraryDesc {
            source_type: LibrarySourceType::Binary,
            path: binary,
            exports: Vec::new(),
            binary: Vec::new(),
        });
        desc.libraries.push(DxilLibraryDesc {
            source_type: LibrarySourceType::Hlsl,
            path: PathBuf::from("compiled.hlsl"),
            exports: Vec::new(),
            binary: Vec::new(),
        });

        let mapping = HlslMapping::from_yaml(&format!("mapped.hlsl: {}\n", precompiled.display())).unwrap();
        let compiler = MockCompiler::default();
        let resolver = LibraryResolver {
            compiler: &compiler,
            mapping: Some(&mapping),
            shader_model: "",
            defines: &[],
            include_dirs: &[],
        };
        desc.attach_binaries(&resolver).unwrap();

        assert_eq!(desc.libraries[0].binary, vec![4, 2]);
        assert_eq!(desc.libraries[1].binary, vec![1]);
        assert!(!desc.libraries[2].binary.is_empty());
        assert_eq!(compiler.compiled_targets(), vec!["lib_6_3".to_string()]);
    }

    #[test]
    fn test_library_compile_failure() {
        let compiler = MockCompiler {
            fail_compile: Some("unresolved external".to_string()),
            ..Default::default()
        };
        let resolver = LibraryResolver {
            compiler: &compiler,
            mapping: None,
            shader_model: "6_5",
            defines: &[],
            include_dirs: &[],
        };
        let mut desc = RayTracingStateDesc::from_single_hlsl(Path::new("rt.hlsl"));
        let error = desc.attach_binaries(&resolver).unwrap_err();
        assert!(matches!(error, Error::Compilation { ref stage, .. } if stage.contains("rt.hlsl")));
    }
}
