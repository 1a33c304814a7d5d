pub mod check;
pub mod emit;
pub mod report;

use std::path::{Path, PathBuf};
use std::process;

use thread_predicate::diagnostic::render_diagnostics;
use thread_predicate::{
    analyze_source, Diagnostic, ParsedFusion, PredicateConfig, PredicateError, ThreadPredicateMap,
};

/// A fusion file that parsed and passed the analysis.
pub struct Analyzed {
    pub path: PathBuf,
    pub source: String,
    pub parsed: ParsedFusion,
    pub preds: ThreadPredicateMap,
}

impl Analyzed {
    /// Render a failure found after the analysis itself succeeded, then exit.
    pub fn fail(&self, err: &PredicateError) -> ! {
        let diag = Diagnostic::from_predicate_error(err, &self.parsed);
        diag.render(&self.path.display().to_string(), &self.source);
        process::exit(1);
    }
}

/// Why a fusion file could not be analyzed.
pub enum Failure {
    Read(String),
    Rejected {
        source: String,
        diagnostics: Vec<Diagnostic>,
    },
}

impl Failure {
    pub fn render(&self, input: &Path) {
        match self {
            Failure::Read(msg) => eprintln!("error: cannot read '{}': {}", input.display(), msg),
            Failure::Rejected {
                source,
                diagnostics,
            } => render_diagnostics(diagnostics, &input.display().to_string(), source),
        }
    }
}

pub fn try_analyze_file(input: &Path) -> Result<Analyzed, Failure> {
    let source = std::fs::read_to_string(input).map_err(|e| Failure::Read(e.to_string()))?;
    match analyze_source(&source) {
        Ok((parsed, preds)) => Ok(Analyzed {
            path: input.to_path_buf(),
            source,
            parsed,
            preds,
        }),
        Err(diagnostics) => Err(Failure::Rejected {
            source,
            diagnostics,
        }),
    }
}

/// Read, parse and analyze `input`, exiting with rendered diagnostics on failure.
pub fn analyze_file(input: &Path) -> Analyzed {
    match try_analyze_file(input) {
        Ok(analyzed) => analyzed,
        Err(failure) => {
            failure.render(input);
            process::exit(1);
        }
    }
}

/// Configuration from the nearest `tpred.toml` above `input`.
pub fn load_config(input: &Path) -> PredicateConfig {
    let dir = input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    match PredicateConfig::discover(dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e.message);
            if let Some(help) = &e.help {
                eprintln!("  help: {}", help);
            }
            process::exit(1);
        }
    }
}
