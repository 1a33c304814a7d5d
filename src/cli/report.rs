use std::path::PathBuf;

use clap::Args;
use thread_predicate::report::format_report;

use super::{analyze_file, load_config};

#[derive(Args)]
pub struct ReportArgs {
    /// Fusion description file
    pub input: PathBuf,
    /// Also list tensors that need no guard
    #[arg(long)]
    pub all: bool,
}

pub fn cmd_report(args: ReportArgs) {
    let config = load_config(&args.input);
    let analyzed = analyze_file(&args.input);
    let show_all = args.all || config.show_all;
    match format_report(&analyzed.parsed.fusion, &analyzed.preds, show_all) {
        Ok(text) => print!("{}", text),
        Err(e) => analyzed.fail(&e),
    }
}
