use std::path::PathBuf;
use std::process;

use clap::Args;
use thread_predicate::kir::lower::create_kernel_lowering;

use super::{analyze_file, load_config};

#[derive(Args)]
pub struct EmitArgs {
    /// Fusion description file
    pub input: PathBuf,
    /// Lowering target: cuda, metal or vulkan (default: from tpred.toml, else cuda)
    #[arg(long)]
    pub target: Option<String>,
}

pub fn cmd_emit(args: EmitArgs) {
    let config = load_config(&args.input);
    let target = args.target.unwrap_or(config.target);
    let Some(lowering) = create_kernel_lowering(&target) else {
        eprintln!("error: unknown target '{}'", target);
        eprintln!("  help: available targets: cuda, metal, vulkan");
        process::exit(1);
    };

    let analyzed = analyze_file(&args.input);
    tracing::debug!(backend = lowering.target_name(), "lowering kernel");
    match lowering.lower(&analyzed.parsed.fusion, &analyzed.preds) {
        Ok(src) => print!("{}", src),
        Err(e) => analyzed.fail(&e),
    }
}
