mod cli;

use clap::{Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tpred",
    version,
    about = "Thread predicate analysis for fused GPU kernels"
)]
struct Cli {
    /// Log every analyzed expression (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a fusion file and run the thread predicate analysis
    Check(cli::check::CheckArgs),
    /// Print the per-tensor predicate table
    Report(cli::report::ReportArgs),
    /// Print the kernel with guards spliced in
    Emit(cli::emit::EmitArgs),
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Check(args) => cli::check::cmd_check(args),
        Command::Report(args) => cli::report::cmd_report(args),
        Command::Emit(args) => cli::emit::cmd_emit(args),
    }
}
