//! VecPy compiler CLI.
//!
//! Provides the `vecpy` binary. `vecpy compile` reads a kernel AST as JSON,
//! runs the same `vecpy_codegen::vectorize()` pipeline a library host would,
//! writes the emitted sources into the output directory, and prints a
//! machine-readable manifest (files plus the toolchain command) to stdout.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use vecpy_codegen::{
    vectorize, Architecture, Binding, BuildPlan, DataType, Error, Options, Threads,
};
use vecpy_front::FunctionDef;

/// VecPy: elementwise SIMD kernel compiler.
#[derive(Parser)]
#[command(name = "vecpy", about = "Elementwise SIMD kernel compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Compile a kernel AST to C++ sources and a build plan.
    Compile {
        /// Path to the kernel AST (JSON).
        #[arg(short, long)]
        input: PathBuf,

        /// Target architecture: generic, sse4.2, avx2.
        #[arg(short, long, default_value = "avx2")]
        arch: String,

        /// Element datatype: float, uint32.
        #[arg(short, long, default_value = "float")]
        dtype: String,

        /// Comma-separated bindings to emit: cpp, python, java, all.
        #[arg(short, long, default_value = "cpp")]
        bindings: String,

        /// Worker threads: a positive count, or "auto".
        #[arg(short, long, default_value = "auto")]
        threads: String,

        /// Owning class name for the managed binding.
        #[arg(long, default_value = "VecPy")]
        managed_package: String,

        /// Output directory for the emitted sources.
        #[arg(short = 'O', long, default_value = "./build")]
        output_dir: PathBuf,
    },
}

/// Manifest printed on success.
#[derive(Serialize)]
struct CompileManifest {
    kernel: String,
    files: Vec<PathBuf>,
    build: BuildPlan,
    command: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Compile {
            input,
            arch,
            dtype,
            bindings,
            threads,
            managed_package,
            output_dir,
        } => {
            let exit_code = run_compile(
                &input,
                &arch,
                &dtype,
                &bindings,
                &threads,
                managed_package,
                output_dir,
            );
            process::exit(exit_code);
        }
    }
}

/// Execute the compile subcommand.
///
/// Returns exit code: 0 = success, 1 = configuration or codegen error,
/// 2 = front-end error, 3 = I/O error.
fn run_compile(
    input: &PathBuf,
    arch: &str,
    dtype: &str,
    bindings: &str,
    threads: &str,
    managed_package: String,
    output_dir: PathBuf,
) -> i32 {
    let options = match build_options(arch, dtype, bindings, threads, managed_package) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("Error: {}", message);
            return 1;
        }
    };

    let source = match std::fs::read_to_string(input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {}", input.display(), e);
            return 3;
        }
    };
    let func: FunctionDef = match serde_json::from_str(&source) {
        Ok(func) => func,
        Err(e) => {
            eprintln!("Error: '{}' is not a kernel AST: {}", input.display(), e);
            return 2;
        }
    };

    // Same pipeline a library host uses.
    let artifacts = match vectorize(&func, &options) {
        Ok(artifacts) => artifacts,
        Err(Error::FrontEnd(e)) => {
            eprintln!("Front-end error: {}", e);
            return 2;
        }
        Err(Error::Io(e)) => {
            eprintln!("I/O error: {}", e);
            return 3;
        }
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            return 1;
        }
    };

    let files = match artifacts.write_to(&output_dir) {
        Ok(files) => files,
        Err(e) => {
            eprintln!(
                "Error: failed to write artifacts to '{}': {}",
                output_dir.display(),
                e
            );
            return 3;
        }
    };

    let manifest = CompileManifest {
        kernel: artifacts.kernel.clone(),
        files,
        command: artifacts.build.command_line(),
        build: artifacts.build,
    };
    let json = serde_json::to_string_pretty(&manifest)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize manifest: {}\"}}", e));
    println!("{}", json);
    0
}

/// Parse the textual CLI options into pipeline [`Options`].
fn build_options(
    arch: &str,
    dtype: &str,
    bindings: &str,
    threads: &str,
    managed_package: String,
) -> Result<Options, String> {
    let arch = Architecture::parse(arch)
        .ok_or_else(|| format!("unknown architecture '{}', expected generic/sse4.2/avx2", arch))?;
    let dtype = DataType::parse(dtype)
        .ok_or_else(|| format!("unknown datatype '{}', expected float/uint32", dtype))?;
    let bindings = bindings
        .split(',')
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| {
            Binding::parse(text)
                .ok_or_else(|| format!("unknown binding '{}', expected cpp/python/java/all", text))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let threads = if threads.eq_ignore_ascii_case("auto") {
        Threads::Auto
    } else {
        let count: u32 = threads
            .parse()
            .map_err(|_| format!("invalid thread count '{}', expected a number or 'auto'", threads))?;
        Threads::Count(count)
    };
    Ok(Options {
        arch,
        dtype,
        bindings,
        threads,
        managed_package,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_parses_the_full_surface() {
        let options =
            build_options("sse4.2", "uint32", "cpp, java", "4", "Kernels".into()).unwrap();
        assert_eq!(options.arch, Architecture::Sse4_2);
        assert_eq!(options.dtype, DataType::Uint32);
        assert_eq!(options.bindings, vec![Binding::Cpp, Binding::Managed]);
        assert_eq!(options.threads, Threads::Count(4));
        assert_eq!(options.managed_package, "Kernels");
    }

    #[test]
    fn auto_threads_and_all_bindings() {
        let options = build_options("avx2", "float", "all", "auto", "VecPy".into()).unwrap();
        assert_eq!(options.threads, Threads::Auto);
        assert!(options.wants(Binding::Dynamic));
    }

    #[test]
    fn bad_inputs_are_reported() {
        assert!(build_options("mips", "float", "cpp", "auto", "V".into()).is_err());
        assert!(build_options("avx2", "f64", "cpp", "auto", "V".into()).is_err());
        assert!(build_options("avx2", "float", "wasm", "auto", "V".into()).is_err());
        assert!(build_options("avx2", "float", "cpp", "many", "V".into()).is_err());
    }
}
