use anyhow::Result;
use clap::ArgGroup;
use clap::Parser;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[cfg(target_env = "msvc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use defog_cli::{DefogOptions, run_main};

#[derive(Parser, Debug)]
#[command(
    name = "defog",
    about = "defog: rewrite obfuscated Python ASTs back into readable constants",
    version,
    group = ArgGroup::new("inputs").required(true).args(["trees", "files"]).multiple(true)
)]
pub struct Cli {
    /// JSON tree files produced by the parser (repeatable)
    #[arg(
        short = 't',
        long = "tree",
        value_name = "FILE",
        num_args = 1..,
        action = clap::ArgAction::Append
    )]
    trees: Vec<String>,

    /// Source files to parse with --parser-cmd (repeatable)
    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        num_args = 1..,
        action = clap::ArgAction::Append
    )]
    files: Vec<String>,

    /// External parser command; gets the source path as its last argument
    /// and must print a JSON tree to stdout
    #[arg(long = "parser-cmd", value_name = "CMD")]
    parser_cmd: Option<String>,

    /// Comma-separated stage order (default: convert,rewrite,readonly)
    #[arg(long = "ast-stages", value_name = "STAGES", value_delimiter = ',')]
    stages: Vec<String>,

    /// Hard cap on traversal passes per stage
    #[arg(long = "max-ast-iterations", default_value = "500")]
    max_iterations: u32,

    /// Per-pass traversal queue cap
    #[arg(long = "max-ast-queue-size", default_value = "10000")]
    max_queue_size: usize,

    /// Lines that trigger a diagnostic break when visited (repeatable)
    #[arg(long = "debug-line", value_name = "LINE")]
    debug_lines: Vec<u32>,

    /// Fold string concatenation in source order instead of the parser's
    /// inverted operand order
    #[arg(long = "concat-source-order", default_value_t = false)]
    concat_source_order: bool,

    /// Pretty-print the output JSON
    #[arg(long, default_value_t = false)]
    pretty: bool,

    /// Output file path (writes to file instead of stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<String>,
}

pub fn run(args: Cli) -> Result<()> {
    // Initialize tracing subscriber for logging
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let opts = DefogOptions {
        trees: args.trees,
        files: args.files,
        parser_cmd: args.parser_cmd.clone(),
        output: args.output.clone(),
        pretty: args.pretty,
        stages: args.stages,
        max_iterations: args.max_iterations,
        max_queue_size: args.max_queue_size,
        debug_lines: args.debug_lines,
        concat_source_order: args.concat_source_order,
    };

    match run_main(&opts) {
        Ok(Some(output)) => {
            if let Some(ref path) = args.output {
                std::fs::write(path, &output)?;
                tracing::info!("output written to: {}", path);
            } else {
                println!("{output}");
            }
        }
        Ok(None) => {
            // Nothing to process.
        }
        Err(e) => {
            eprintln!("Error: {e}");
            tracing::error!("Error: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

pub fn main() -> Result<()> {
    let args = Cli::parse();
    run(args)
}
