//! Output metadata dumping tool
//!
//! Reads the metadata file written by a ray tracing run and prints every generated
//! pipeline with the artifact files of its shaders.

use dx12_analyzer::OutputMetadata;
use std::{env, path::Path, process};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage: {} <metadata.json>", args[0]);
        eprintln!("Lists the pipelines and shader artifacts recorded in an output metadata file");
        process::exit(1);
    }

    let subscriber = tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).with_writer(std::io::stderr).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: could not install the log subscriber: {e}");
    }

    let metadata_path = &args[1];
    let metadata = match OutputMetadata::read_file(metadata_path) {
        Ok(metadata) => metadata,
        Err(e) => {
            eprintln!("Error reading metadata '{metadata_path}': {e}");
            process::exit(1);
        }
    };
    tracing::info!("{} pipeline(s), {} shader(s)", metadata.pipelines.len(), metadata.shader_count());

    println!("Mode: {:?}", metadata.mode);
    for pipeline in &metadata.pipelines {
        let kind = if pipeline.is_unified { "unified" } else { "indirect" };
        println!("Pipeline {} ({kind})", pipeline.pipeline_name);
        if let Some(binary) = &pipeline.pipeline_binary {
            println!("  binary: {}", binary.display());
        }
        for shader in &pipeline.shaders {
            println!("  {}", shader.export_name);
            print_artifact("isa", shader.isa_file.as_deref());
            print_artifact("stats", shader.stats_file.as_deref());
        }
    }
}

fn print_artifact(label: &str, path: Option<&Path>) {
    match path {
        Some(path) => println!("    {label}: {}", path.display()),
        None => println!("    {label}: -"),
    }
}
