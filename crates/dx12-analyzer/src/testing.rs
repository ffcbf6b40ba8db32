//! Scripted stand-ins for the HLSL compiler and the driver extension

use crate::backend::{
    ArtifactTarget, ComputePipelineDesc, ComputePipelineOutput, DriverLoader, DriverModule, ExtensionFactory, GeneratedPipeline, GraphicsPipelineDesc, GraphicsPipelineOutput, PipelineHandle,
    RootSignatureHandle, ShaderAnalyzer, StateObjectHandle, StateObjectMode, StateObjectOutput,
};
use crate::config::ShaderStage;
use crate::dxr::graph::StateObjectDesc;
use crate::error::DriverStatus;
use crate::frontend::compiler::{CompileRequest, RootSignatureRequest, ShaderCompiler};
use crate::frontend::dxbc::{ROOT_SIGNATURE_FOURCC, build_container, empty_root_signature};
use crate::results::{RayTracingStats, RegisterUsage, ShaderStats};
use std::cell::RefCell;
use std::rc::Rc;

/// HLSL compiler producing small containers
#[derive(Debug, Default)]
pub struct MockCompiler {
    /// Fail every compilation with this message
    pub fail_compile: Option<String>,
    /// Fail every root signature compilation with this message
    pub fail_root_signature: Option<String>,
    /// Embed a root signature in every compiled shader, as `[RootSignature()]` does
    pub root_signature_attribute: bool,
    pub(crate) compiled: RefCell<Vec<String>>,
    pub(crate) root_signatures: RefCell<Vec<(String, String)>>,
}

impl MockCompiler {
    /// Target profiles compiled so far
    pub fn compiled_targets(&self) -> Vec<String> {
        self.compiled.borrow().clone()
    }

    /// `(macro, version)` of every root signature compiled so far
    pub fn root_signature_macros(&self) -> Vec<(String, String)> {
        self.root_signatures.borrow().clone()
    }
}

impl ShaderCompiler for MockCompiler {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<Vec<u8>, String> {
        if let Some(message) = &self.fail_compile {
            return Err(message.clone());
        }
        self.compiled.borrow_mut().push(request.target.to_string());

        let program = format!("{}:{}", request.target, request.entry).into_bytes();
        let mut chunks = vec![(*b"DXIL", program)];
        if self.root_signature_attribute {
            chunks.push((ROOT_SIGNATURE_FOURCC, empty_root_signature(2)));
        }
        Ok(build_container(&chunks))
    }

    fn compile_root_signature(&self, request: &RootSignatureRequest<'_>) -> Result<Vec<u8>, String> {
        if let Some(message) = &self.fail_root_signature {
            return Err(message.clone());
        }
        self.root_signatures.borrow_mut().push((request.macro_name.to_string(), request.version.to_string()));
        Ok(empty_root_signature(2))
    }

    fn disassemble(&self, bytecode: &[u8]) -> Result<String, String> {
        Ok(format!("; {} bytes of bytecode\n", bytecode.len()))
    }
}

/// Driver analyzer with scripted results
///
/// Every clone shares the same call log.
#[derive(Debug, Clone)]
pub struct MockAnalyzer {
    /// Supported targets
    pub gpus: Vec<String>,
    /// Fail root signature creation
    pub fail_root_signature: Option<DriverStatus>,
    /// Fail compute and graphics pipeline creation
    pub fail_pipeline: Option<DriverStatus>,
    /// Statistics of the compute shader
    pub compute_stats: ShaderStats,
    /// Thread group of the compute shader
    pub thread_group: [u32; 3],
    /// Physical shaders of a graphics pipeline
    pub graphics_shaders: Vec<ShaderStats>,
    /// Pipeline disassembly document; `None` fails the query
    pub pipeline_disassembly: Option<String>,
    /// Pipeline binary; `None` fails the query
    pub pipeline_binary: Option<Vec<u8>>,
    /// Pipelines generated in pipeline mode
    pub generated: Vec<GeneratedPipeline>,
    /// Pipelines reported in shader mode; `None` reports one pipeline holding the export
    pub shader_mode_pipelines: Option<Vec<GeneratedPipeline>>,
    /// Per-index ray tracing pipeline binaries
    pub pipeline_binaries: Vec<Vec<u8>>,
    /// Ray tracing exports whose statistics query fails
    pub failing_exports: Vec<String>,
    /// Calls made so far
    pub log: Rc<RefCell<Vec<String>>>,
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self {
            gpus: vec!["gfx1030".to_string(), "gfx1100".to_string()],
            fail_root_signature: None,
            fail_pipeline: None,
            compute_stats: stats(ShaderStage::Compute.mask_bit(), 24),
            thread_group: [64, 1, 1],
            graphics_shaders: vec![stats(ShaderStage::Vertex.mask_bit(), 16), stats(ShaderStage::Pixel.mask_bit(), 8)],
            pipeline_disassembly: Some("<Disassembly><VS><![CDATA[vs code\n]]></VS><PS><![CDATA[ps code\n]]></PS><CS><![CDATA[cs code\n]]></CS></Disassembly>".to_string()),
            pipeline_binary: Some(vec![0xde, 0xad]),
            generated: Vec::new(),
            shader_mode_pipelines: None,
            pipeline_binaries: Vec::new(),
            failing_exports: Vec::new(),
            log: Rc::default(),
        }
    }
}

/// Plausible statistics for one physical shader
pub fn stats(stage_mask: u32, used_vgprs: u32) -> ShaderStats {
    ShaderStats {
        stage_mask,
        vgprs: RegisterUsage { used: used_vgprs, available: 256, physical: 1536 },
        sgprs: RegisterUsage { used: 16, available: 106, physical: 800 },
        lds_size_bytes: 65536,
        lds_usage_bytes: 0,
        scratch_bytes: 0,
        isa_size_bytes: 256,
    }
}

impl MockAnalyzer {
    fn record(&self, call: String) {
        self.log.borrow_mut().push(call);
    }
}

fn fill(data: &[u8], buffer: Option<&mut [u8]>) -> Result<usize, DriverStatus> {
    if let Some(buffer) = buffer {
        if buffer.len() < data.len() {
            return Err(DriverStatus::new(-1, "buffer too small"));
        }
        buffer[..data.len()].copy_from_slice(data);
    }
    Ok(data.len())
}

impl ShaderAnalyzer for MockAnalyzer {
    fn list_gpus(&self, buffer: Option<&mut [u8]>) -> Result<usize, DriverStatus> {
        let mut list = self.gpus.join("\0");
        list.push('\0');
        fill(list.as_bytes(), buffer)
    }

    fn set_target_gpu(&mut self, name: &str) -> Result<(), DriverStatus> {
        self.record(format!("set_target_gpu {name}"));
        Ok(())
    }

    fn create_root_signature(&mut self, blob: &[u8]) -> Result<RootSignatureHandle, DriverStatus> {
        if let Some(status) = &self.fail_root_signature {
            return Err(status.clone());
        }
        self.record(format!("create_root_signature {}", blob.len()));
        Ok(RootSignatureHandle(1))
    }

    fn create_compute_pipeline(&mut self, desc: &ComputePipelineDesc<'_>) -> Result<ComputePipelineOutput, DriverStatus> {
        if let Some(status) = &self.fail_pipeline {
            return Err(status.clone());
        }
        self.record(format!("create_compute_pipeline {}", desc.shader.len()));
        Ok(ComputePipelineOutput {
            handle: PipelineHandle(1),
            stats: self.compute_stats,
            thread_group: self.thread_group,
        })
    }

    fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc<'_>) -> Result<GraphicsPipelineOutput, DriverStatus> {
        if let Some(status) = &self.fail_pipeline {
            return Err(status.clone());
        }
        let stages: Vec<&str> = desc.stages.iter().map(|stage| stage.stage.tag()).collect();
        self.record(format!("create_graphics_pipeline {}", stages.join(",")));
        Ok(GraphicsPipelineOutput {
            handle: PipelineHandle(2),
            shaders: self.graphics_shaders.clone(),
        })
    }

    fn create_state_object(&mut self, desc: &StateObjectDesc, mode: &StateObjectMode) -> Result<StateObjectOutput, DriverStatus> {
        self.record(format!("create_state_object {}", desc.subobjects.len()));
        let pipelines = match mode {
            StateObjectMode::Shader { export } => self.shader_mode_pipelines.clone().unwrap_or_else(|| {
                vec![GeneratedPipeline {
                    unified: false,
                    raygen: None,
                    shaders: vec![export.clone()],
                }]
            }),
            StateObjectMode::Pipeline => self.generated.clone(),
        };
        Ok(StateObjectOutput { handle: StateObjectHandle(3), pipelines })
    }

    fn ray_tracing_shader_stats(&self, _handle: StateObjectHandle, _pipeline: usize, export: &str) -> Result<(ShaderStats, RayTracingStats), DriverStatus> {
        if self.failing_exports.iter().any(|failing| failing == export) {
            return Err(DriverStatus::new(-1, format!("no statistics for {export}")));
        }
        let used = 8 + export.len() as u32;
        Ok((stats(0, used), RayTracingStats { stack_size_bytes: 16, inlined: false }))
    }

    fn disassembly(&self, target: ArtifactTarget<'_>, buffer: Option<&mut [u8]>) -> Result<usize, DriverStatus> {
        match target {
            ArtifactTarget::Pipeline(_) => match &self.pipeline_disassembly {
                Some(document) => fill(document.as_bytes(), buffer),
                None => Err(DriverStatus::new(-1, "disassembly unavailable")),
            },
            ArtifactTarget::RayTracingShader { export, .. } => {
                let document = format!("<Disassembly><![CDATA[; {export}\ns_endpgm\n]]></Disassembly>");
                fill(document.as_bytes(), buffer)
            }
        }
    }

    fn binary(&self, _handle: PipelineHandle, buffer: Option<&mut [u8]>) -> Result<usize, DriverStatus> {
        match &self.pipeline_binary {
            Some(binary) => fill(binary, buffer),
            None => Err(DriverStatus::new(-1, "binary unavailable")),
        }
    }

    fn pipeline_binary_count(&self, _handle: StateObjectHandle) -> Result<usize, DriverStatus> {
        Ok(self.pipeline_binaries.len())
    }

    fn pipeline_binary(&self, _handle: StateObjectHandle, index: usize, buffer: Option<&mut [u8]>) -> Result<usize, DriverStatus> {
        match self.pipeline_binaries.get(index) {
            Some(binary) => fill(binary, buffer),
            None => Err(DriverStatus::new(-1, format!("no pipeline binary {index}"))),
        }
    }
}

/// Module loader handing out [`MockAnalyzer`] clones
pub struct MockLoader {
    /// Analyzer handed out by every module
    pub analyzer: MockAnalyzer,
    /// Whether [`DriverLoader::load_module`] succeeds
    pub online_available: bool,
    /// Whether [`DriverLoader::find_loaded_module`] succeeds
    pub injected_available: bool,
    /// Fail extension factory creation
    pub fail_factory: bool,
}

impl MockLoader {
    /// A loader for which every lookup succeeds
    pub fn new(analyzer: MockAnalyzer) -> Self {
        Self {
            analyzer,
            online_available: true,
            injected_available: true,
            fail_factory: false,
        }
    }

    fn module(&self, available: bool, name: &str) -> Result<Box<dyn DriverModule>, String> {
        if !available {
            return Err(format!("module {name} not found"));
        }
        Ok(Box::new(MockModule {
            analyzer: self.analyzer.clone(),
            fail_factory: self.fail_factory,
        }))
    }
}

impl DriverLoader for MockLoader {
    fn load_module(&self, name: &str) -> Result<Box<dyn DriverModule>, String> {
        self.module(self.online_available, name)
    }

    fn find_loaded_module(&self, name: &str) -> Result<Box<dyn DriverModule>, String> {
        self.module(self.injected_available, name)
    }
}

struct MockModule {
    analyzer: MockAnalyzer,
    fail_factory: bool,
}

impl DriverModule for MockModule {
    fn create_extension_factory(&self) -> Result<Box<dyn ExtensionFactory>, DriverStatus> {
        if self.fail_factory {
            return Err(DriverStatus::new(-2147467259, "E_FAIL"));
        }
        Ok(Box::new(MockFactory { analyzer: self.analyzer.clone() }))
    }
}

struct MockFactory {
    analyzer: MockAnalyzer,
}

impl ExtensionFactory for MockFactory {
    fn create_shader_analyzer(&self) -> Result<Box<dyn ShaderAnalyzer>, DriverStatus> {
        Ok(Box::new(self.analyzer.clone()))
    }
}
