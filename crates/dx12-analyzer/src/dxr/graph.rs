//! State object subobject graph
//!
//! A [`StateObjectGraph`] is a list of typed nodes plus a list of `(node, export)`
//! association edges. [`StateObjectGraph::build`] fills it from a
//! [`RayTracingStateDesc`]; [`StateObjectGraph::materialize`] flattens it into the
//! subobject list handed to the driver, where every associated node is followed by
//! an exports-association subobject pointing back at it.

use super::state_desc::{ExportDesc, HitGroupDesc, RayTracingStateDesc};
use crate::error::{Error, Result};
use crate::frontend::dxbc::{DXBC_MAGIC, ROOT_SIGNATURE_FOURCC, find_chunk, parse_root_signature};
use std::path::Path;

/// Index of a node in a [`StateObjectGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// A subobject of a ray tracing state object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subobject {
    /// DXIL library with its exports; no exports means every shader is exported
    DxilLibrary {
        /// Library bytecode
        bytecode: Vec<u8>,
        /// Exports and renames
        exports: Vec<ExportDesc>,
    },
    /// Hit group
    HitGroup(HitGroupDesc),
    /// Payload and attribute size limits
    ShaderConfig {
        /// Maximum payload size, in bytes
        max_payload_size: u32,
        /// Maximum attribute size, in bytes
        max_attribute_size: u32,
    },
    /// Local root signature
    LocalRootSignature {
        /// Serialized root signature
        blob: Vec<u8>,
    },
    /// Global root signature
    GlobalRootSignature {
        /// Serialized root signature
        blob: Vec<u8>,
    },
    /// Recursion limit of the whole state object
    PipelineConfig {
        /// Maximum trace recursion depth
        max_recursion_depth: u32,
    },
    /// Associates the subobject at `subobject` with `exports`; only present in materialized descriptions
    ExportsAssociation {
        /// Index of the associated subobject in [`StateObjectDesc::subobjects`]
        subobject: usize,
        /// Export names
        exports: Vec<String>,
    },
}

impl Subobject {
    /// Short kind name used in messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DxilLibrary { .. } => "DXIL library",
            Self::HitGroup(_) => "hit group",
            Self::ShaderConfig { .. } => "shader config",
            Self::LocalRootSignature { .. } => "local root signature",
            Self::GlobalRootSignature { .. } => "global root signature",
            Self::PipelineConfig { .. } => "pipeline config",
            Self::ExportsAssociation { .. } => "exports association",
        }
    }
}

/// Flat state object description handed to the driver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateObjectDesc {
    /// Subobjects; associations refer to earlier entries by index
    pub subobjects: Vec<Subobject>,
}

impl StateObjectDesc {
    /// Number of subobjects of the given kind
    pub fn count(&self, kind: &str) -> usize {
        self.subobjects.iter().filter(|subobject| subobject.kind() == kind).count()
    }
}

/// Typed node list plus export association edges
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateObjectGraph {
    nodes: Vec<Subobject>,
    associations: Vec<(NodeId, String)>,
}

impl StateObjectGraph {
    /// Builds the graph of a description whose library bytecode is attached
    ///
    /// Root signature files are read here; a missing or malformed file is fatal.
    pub fn build(desc: &RayTracingStateDesc) -> Result<Self> {
        let mut graph = Self::default();

        for library in &desc.libraries {
            if library.binary.is_empty() {
                return Err(Error::StateDescription(format!("library '{}' has no bytecode", library.path.display())));
            }
            graph.add_node(Subobject::DxilLibrary {
                bytecode: library.binary.clone(),
                exports: library.exports.clone(),
            });
        }

        for hit_group in &desc.hit_groups {
            graph.add_node(Subobject::HitGroup(hit_group.clone()));
        }

        for config in &desc.shader_configs {
            let node = graph.add_node(Subobject::ShaderConfig {
                max_payload_size: config.max_payload_size,
                max_attribute_size: config.max_attribute_size,
            });
            graph.associate_all(node, &config.exports);
        }

        for rs in &desc.local_root_signatures {
            let node = graph.add_node(Subobject::LocalRootSignature { blob: read_root_signature(&rs.file)? });
            graph.associate_all(node, &rs.exports);
        }

        for rs in &desc.global_root_signatures {
            let node = graph.add_node(Subobject::GlobalRootSignature { blob: read_root_signature(&rs.file)? });
            graph.associate_all(node, &rs.exports);
        }

        if let Some(config) = desc.pipeline_config {
            graph.add_node(Subobject::PipelineConfig {
                max_recursion_depth: config.max_recursion_depth,
            });
        }

        tracing::debug!("Built state object graph with {} nodes and {} associations", graph.nodes.len(), graph.associations.len());
        Ok(graph)
    }

    /// Appends a node
    pub fn add_node(&mut self, node: Subobject) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Associates `node` with `export`
    pub fn associate(&mut self, node: NodeId, export: impl Into<String>) {
        self.associations.push((node, export.into()));
    }

    fn associate_all(&mut self, node: NodeId, exports: &[String]) {
        for export in exports {
            self.associate(node, export.clone());
        }
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> &[Subobject] {
        &self.nodes
    }

    /// Flattens the graph into the driver description
    ///
    /// Every node becomes one subobject, and every node with at least one edge is
    /// followed by a single association subobject listing its exports in edge order.
    pub fn materialize(&self) -> StateObjectDesc {
        let mut subobjects = Vec::with_capacity(self.nodes.len() * 2);

        for (index, node) in self.nodes.iter().enumerate() {
            subobjects.push(node.clone());
            let subobject = subobjects.len() - 1;

            let exports: Vec<String> = self.associations.iter().filter(|(id, _)| id.0 == index).map(|(_, export)| export.clone()).collect();
            if !exports.is_empty() {
                subobjects.push(Subobject::ExportsAssociation { subobject, exports });
            }
        }

        StateObjectDesc { subobjects }
    }
}

/// Reads a serialized root signature file and checks its header
///
/// Both a bare serialized root signature and a container with an `RTS0` chunk
/// are accepted.
fn read_root_signature(path: &Path) -> Result<Vec<u8>> {
    let blob = std::fs::read(path).map_err(|e| Error::StateDescription(format!("failed to read root signature '{}': {e}", path.display())))?;

    let invalid = |reason: String| Error::StateDescription(format!("invalid root signature '{}': {reason}", path.display()));
    let data = if blob.starts_with(&DXBC_MAGIC) {
        find_chunk(&blob, ROOT_SIGNATURE_FOURCC)
            .map_err(|e| invalid(e.to_string()))?
            .ok_or_else(|| invalid("the container has no root signature chunk".to_string()))?
    } else {
        blob.as_slice()
    };
    parse_root_signature(data).map_err(|e| invalid(e.to_string()))?;

    Ok(blob)
}
