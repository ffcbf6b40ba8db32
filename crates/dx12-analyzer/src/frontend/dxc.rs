//! HLSL compiler adapter running the `dxc` executable
//!
//! Every request runs one compiler process in a scratch directory. Bytecode is
//! read back from the `-Fo` output file, disassembly from standard output, and a
//! failed compile returns the compiler's diagnostics.

use super::compiler::{CompileRequest, IncludeSearchPath, RootSignatureRequest, ShaderCompiler};
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Environment variable overriding the compiler executable
pub const COMPILER_ENV: &str = "DX12_ANALYZER_DXC";

/// Executable used when [`COMPILER_ENV`] is not set
pub const DEFAULT_COMPILER: &str = "dxc";

/// [`ShaderCompiler`] backed by the DirectX shader compiler command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DxcCompiler {
    executable: PathBuf,
}

impl DxcCompiler {
    /// Creates an adapter for `executable`
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self { executable: executable.into() }
    }

    /// Creates an adapter for the executable named by [`COMPILER_ENV`], or `dxc` on the search path
    pub fn from_env() -> Self {
        Self::new(std::env::var_os(COMPILER_ENV).unwrap_or_else(|| OsString::from(DEFAULT_COMPILER)))
    }

    /// Path of the compiler executable
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Runs the compiler with `args`
    ///
    /// # Returns
    /// Standard output, or the diagnostics of a failed run
    fn run(&self, args: &[OsString]) -> Result<Vec<u8>, String> {
        let program = display(self.executable.as_os_str());
        let joined = args.iter().map(|arg| display(arg)).collect::<Vec<_>>().join(" ");
        tracing::debug!("Running {program} {joined}");

        let output = Command::new(&self.executable).args(args).output().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => format!("missing required command: {program}"),
            _ => format!("failed to run {program}: {e}"),
        })?;

        if output.status.success() {
            return Ok(output.stdout);
        }
        let diagnostics = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if diagnostics.is_empty() {
            Err(format!("{program} exited with {}", output.status))
        } else {
            Err(diagnostics)
        }
    }

    /// Runs the compiler and reads the file it wrote to `output`
    fn run_to_file(&self, args: &[OsString], output: &Path) -> Result<Vec<u8>, String> {
        self.run(args)?;
        std::fs::read(output).map_err(|e| format!("failed to read compiler output '{}': {e}", output.display()))
    }
}

impl ShaderCompiler for DxcCompiler {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<Vec<u8>, String> {
        let scratch = scratch_dir()?;
        let output = scratch.path().join("shader.bin");
        self.run_to_file(&compile_args(request, &output), &output)
    }

    fn compile_root_signature(&self, request: &RootSignatureRequest<'_>) -> Result<Vec<u8>, String> {
        let scratch = scratch_dir()?;
        let output = scratch.path().join("rootsig.bin");
        self.run_to_file(&root_signature_args(request, &output), &output)
    }

    fn disassemble(&self, bytecode: &[u8]) -> Result<String, String> {
        let scratch = scratch_dir()?;
        let input = scratch.path().join("shader.bin");
        std::fs::write(&input, bytecode).map_err(|e| format!("failed to write '{}': {e}", input.display()))?;

        let stdout = self.run(&[OsString::from("-dumpbin"), input.into_os_string()])?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

/// Arguments compiling an entry point, or a library when the entry is empty
pub fn compile_args(request: &CompileRequest<'_>, output: &Path) -> Vec<OsString> {
    let mut args = Vec::new();
    push_option(&mut args, "-T", request.target);
    if !request.entry.is_empty() {
        push_option(&mut args, "-E", request.entry);
    }
    push_common(&mut args, request.defines, request.includes, output);
    args.push(request.source.as_os_str().to_os_string());
    args
}

/// Arguments compiling the root signature held in a macro
pub fn root_signature_args(request: &RootSignatureRequest<'_>, output: &Path) -> Vec<OsString> {
    let mut args = Vec::new();
    push_option(&mut args, "-T", request.version);
    push_option(&mut args, "-E", request.macro_name);
    push_common(&mut args, request.defines, request.includes, output);
    args.push(request.source.as_os_str().to_os_string());
    args
}

fn push_common(args: &mut Vec<OsString>, defines: &[String], includes: &IncludeSearchPath, output: &Path) {
    for define in defines {
        push_option(args, "-D", define);
    }
    // The compiler searches -I directories in command-line order
    for dir in includes.dirs() {
        push_option(args, "-I", dir);
    }
    push_option(args, "-Fo", output);
}

fn push_option(args: &mut Vec<OsString>, flag: &str, value: impl AsRef<OsStr>) {
    args.push(OsString::from(flag));
    args.push(value.as_ref().to_os_string());
}

fn scratch_dir() -> Result<tempfile::TempDir, String> {
    tempfile::Builder::new()
        .prefix("dx12-analyzer")
        .tempdir()
        .map_err(|e| format!("failed to create a scratch directory: {e}"))
}

fn display(value: &OsStr) -> String {
    value.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|arg| display(arg)).collect()
    }

    #[test]
    fn test_compile_args_keep_include_order() {
        let includes = IncludeSearchPath::new(Path::new("shaders/tri.hlsl"), &[PathBuf::from("common"), PathBuf::from("shaders"), PathBuf::from("extra")]);
        let defines = vec!["USE_FOG=1".to_string()];
        let request = CompileRequest {
            source: Path::new("shaders/tri.hlsl"),
            entry: "PSMain",
            target: "ps_6_0",
            defines: &defines,
            includes: &includes,
        };

        let args = strings(&compile_args(&request, Path::new("out.bin")));
        assert_eq!(
            args,
            ["-T", "ps_6_0", "-E", "PSMain", "-D", "USE_FOG=1", "-I", "shaders", "-I", "common", "-I", "extra", "-Fo", "out.bin", "shaders/tri.hlsl"]
        );
    }

    #[test]
    fn test_library_has_no_entry_point() {
        let includes = IncludeSearchPath::new(Path::new("rt.hlsl"), &[]);
        let request = CompileRequest {
            source: Path::new("rt.hlsl"),
            entry: "",
            target: "lib_6_3",
            defines: &[],
            includes: &includes,
        };

        let args = strings(&compile_args(&request, Path::new("lib.bin")));
        assert_eq!(args, ["-T", "lib_6_3", "-I", ".", "-Fo", "lib.bin", "rt.hlsl"]);
    }

    #[test]
    fn test_root_signature_args() {
        let includes = IncludeSearchPath::new(Path::new("rs.hlsl"), &[]);
        let request = RootSignatureRequest {
            source: Path::new("rs.hlsl"),
            macro_name: "RootSig",
            version: "rootsig_1_1",
            defines: &[],
            includes: &includes,
        };

        let args = strings(&root_signature_args(&request, Path::new("rs.bin")));
        assert_eq!(&args[..4], ["-T", "rootsig_1_1", "-E", "RootSig"]);
        assert_eq!(args.last().map(String::as_str), Some("rs.hlsl"));
    }

    #[test]
    fn test_missing_executable() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = DxcCompiler::new(dir.path().join("no-such-dxc"));

        let error = compiler.disassemble(&[0x44, 0x58, 0x42, 0x43]).unwrap_err();
        assert!(error.starts_with("missing required command"), "{error}");
    }
}
