//! Shader inputs, root signatures and pipeline assembly

pub mod assembler;
pub mod compiler;
pub mod dxbc;
pub mod dxc;
pub mod pipeline_state;
pub mod root_signature;

pub use assembler::PipelineAssembler;
pub use compiler::{CompileRequest, CompiledStage, IncludeSearchPath, RootSignatureRequest, ShaderCompiler, StageCompiler};
pub use dxc::DxcCompiler;
pub use pipeline_state::PipelineStateDesc;
pub use root_signature::{ResolvedRootSignature, RootSignaturePlan, RootSignatureSource, resolve_root_signature};
