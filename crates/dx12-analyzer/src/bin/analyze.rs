//! Analyzer run tool
//!
//! Loads a YAML configuration and runs it against the `dxc` compiler and the vendor
//! driver module. Prints the supported targets, the statistics of every compiled
//! stage, or the ray tracing output metadata, followed by any warnings.
//! Set `DX12_ANALYZER_DXC` to use a compiler other than the `dxc` on the search path.

use dx12_analyzer::backend::DynamicLibraryLoader;
use dx12_analyzer::frontend::DxcCompiler;
use dx12_analyzer::results::stats::format_stats;
use dx12_analyzer::{AnalysisOutput, Analyzer, Config, PipelineResult, ShaderStage};
use std::{env, path::Path, process};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 && args.len() != 3 {
        eprintln!("Usage: {} <config.yaml> [--verbose]", args[0]);
        eprintln!("Compiles the configured pipeline through the driver and prints its statistics");
        process::exit(1);
    }

    let verbose = args.get(2).is_some_and(|arg| arg == "--verbose");
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let subscriber = tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: could not install the log subscriber: {e}");
    }

    let config_path = &args[1];
    if !Path::new(config_path).exists() {
        eprintln!("Error: configuration file '{config_path}' not found");
        process::exit(1);
    }
    let config = match Config::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration '{config_path}': {e}");
            process::exit(1);
        }
    };

    let compiler = DxcCompiler::from_env();
    tracing::debug!("Using HLSL compiler {}", compiler.executable().display());
    let analysis = match Analyzer::new(&compiler, &DynamicLibraryLoader).run(&config) {
        Ok(analysis) => analysis,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    match &analysis.output {
        AnalysisOutput::Targets(targets) => {
            for target in targets {
                println!("{target}");
            }
        }
        AnalysisOutput::Pipeline(result) => print_pipeline(result),
        AnalysisOutput::RayTracing(output) => match output.metadata.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing output metadata: {e}");
                process::exit(1);
            }
        },
    }

    for warning in &analysis.report.warnings {
        eprintln!("Warning: {warning}");
    }
}

fn print_pipeline(result: &PipelineResult) {
    let thread_group = match result {
        PipelineResult::Compute(compute) => Some(compute.thread_group),
        PipelineResult::Graphics(_) => None,
    };
    for stage in ShaderStage::ALL {
        if let Some(shader) = result.stage(stage) {
            println!("{stage} shader");
            print!("{}", format_stats(shader, thread_group));
        }
    }
}
