use std::path::PathBuf;
use std::process;

use clap::Args;
use rayon::prelude::*;

use super::try_analyze_file;

#[derive(Args)]
pub struct CheckArgs {
    /// Fusion description files
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

/// Files are analyzed in parallel; results are printed in argument order.
pub fn cmd_check(args: CheckArgs) {
    let results: Vec<_> = args
        .inputs
        .par_iter()
        .map(|input| try_analyze_file(input))
        .collect();

    let mut failed = false;
    for (input, result) in args.inputs.iter().zip(results) {
        match result {
            Ok(analyzed) => {
                let guarded = analyzed
                    .preds
                    .iter()
                    .filter(|(_, info)| info.pred.any())
                    .count();
                eprintln!("OK: {} ({} guarded values)", input.display(), guarded);
            }
            Err(failure) => {
                failure.render(input);
                failed = true;
            }
        }
    }

    if failed {
        process::exit(1);
    }
}
