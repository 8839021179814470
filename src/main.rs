//! Remod CLI - command-line interface for the module namespace rewriter.

use clap::Parser;
use owo_colors::OwoColorize;
use remod::{merge, RewriteDriver, RewriteJob};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "remod")]
#[command(version)]
#[command(about = "Rewrites modules and namespaces")]
#[command(long_about = r#"
Remod renames the top-level namespace of one or more binary modules,
keeping every internal and cross-module reference consistent.

Example usage:
  remod --in Acme.rmod --out Vendor.Acme.rmod
  remod -i Acme.rmod -o Vendor.Acme.rmod -i AcmeCore.rmod -o Vendor.AcmeCore.rmod
  remod -i Acme.rmod -o Vendor.Acme.rmod -m -k signing.key

Each input path must have a corresponding output path.
"#)]
struct Cli {
    /// Input path for a module to rewrite. Use multiple flags for multiple input paths
    #[arg(short = 'i', long = "in", required = true)]
    input: Vec<PathBuf>,

    /// Output path for a rewritten module. Use multiple flags for multiple output paths
    #[arg(short = 'o', long = "out", required = true)]
    output: Vec<PathBuf>,

    /// Additional module resolve directories. Use multiple flags for multiple directories
    #[arg(short = 'r', long = "resolvedir")]
    resolve_dirs: Vec<PathBuf>,

    /// Merge all rewritten modules into a single module at the first output path
    #[arg(short = 'm', long)]
    merge: bool,

    /// Sign with this key file. When merge is specified, the merged module is signed
    #[arg(short = 'k', long)]
    keyfile: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return handle_parse_error(err),
    };

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    if cli.input.len() != cli.output.len() {
        eprintln!(
            "{}",
            "Number of input paths must equal number of output paths".red()
        );
        return ExitCode::from(1);
    }

    if let Err(err) = rewrite(&cli) {
        eprintln!("{}", format!("{err:#}").red());
        return ExitCode::from(1);
    }

    if !cli.merge {
        return ExitCode::SUCCESS;
    }

    if let Err(err) = merge::merge_modules(&cli.output, cli.keyfile.as_deref()) {
        eprintln!("{}", format!("{err:#}").red());
        return ExitCode::from(2);
    }

    ExitCode::SUCCESS
}

fn rewrite(cli: &Cli) -> anyhow::Result<()> {
    let jobs = cli
        .input
        .iter()
        .zip(&cli.output)
        .map(|(input, output)| RewriteJob::new(input, output))
        .collect::<remod::Result<Vec<_>>>()?;

    let mut driver = RewriteDriver::new(jobs, &cli.resolve_dirs)?;
    driver.run()?;
    Ok(())
}

fn handle_parse_error(err: clap::Error) -> ExitCode {
    let _ = err.print();
    match err.kind() {
        // help and version are not failures
        clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
            ExitCode::SUCCESS
        }
        _ => ExitCode::from(1),
    }
}
