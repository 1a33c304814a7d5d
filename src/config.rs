//! `tpred.toml` configuration.
//!
//! ```toml
//! # tpred.toml
//! [lowering]
//! target = "metal"
//! show_all = true
//! ```

use std::path::{Path, PathBuf};

use crate::diagnostic::Diagnostic;
use crate::kir::lower::create_kernel_lowering;
use crate::span::Span;

/// File name looked up next to (or above) the analyzed fusion.
pub const CONFIG_FILE: &str = "tpred.toml";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PredicateConfig {
    /// Lowering target used by `emit` when none is given.
    pub target: String,
    /// Whether reports list tensors that need no guard.
    pub show_all: bool,
}

impl Default for PredicateConfig {
    fn default() -> Self {
        Self {
            target: "cuda".to_string(),
            show_all: false,
        }
    }
}

impl PredicateConfig {
    pub fn load(path: &Path) -> Result<Self, Diagnostic> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Diagnostic::error(
                format!("cannot read config '{}': {}", path.display(), e),
                Span::dummy(),
            )
        })?;
        Self::parse_toml(&content, path)
    }

    /// Walk up from `start_dir` looking for `tpred.toml`.
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.exists() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Load the nearest config above `start_dir`, or the defaults.
    pub fn discover(start_dir: &Path) -> Result<Self, Diagnostic> {
        match Self::find(start_dir) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }

    fn parse_toml(content: &str, path: &Path) -> Result<Self, Diagnostic> {
        let err =
            |msg: String| Diagnostic::error(format!("{}: {}", path.display(), msg), Span::dummy());

        let mut config = Self::default();
        let mut section = String::new();

        for (lineno, line) in content.lines().enumerate() {
            let trimmed = strip_comment(line).trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                section = trimmed[1..trimmed.len() - 1].trim().to_string();
                if section != "lowering" {
                    return Err(err(format!("unknown section [{}]", section)));
                }
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(err(format!(
                    "line {}: expected `key = value`, found `{}`",
                    lineno + 1,
                    trimmed
                )));
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "target" => {
                    let target = parse_string(value)
                        .ok_or_else(|| err(format!("invalid target: {}", value)))?;
                    if create_kernel_lowering(&target).is_none() {
                        return Err(err(format!("unknown target '{}'", target))
                            .with_help("available targets: cuda, metal, vulkan".to_string()));
                    }
                    config.target = target;
                }
                "show_all" => {
                    config.show_all = match value {
                        "true" => true,
                        "false" => false,
                        _ => return Err(err(format!("invalid show_all: {}", value))),
                    };
                }
                _ => return Err(err(format!("unknown key '{}'", key))),
            }
        }

        Ok(config)
    }
}

/// Drop a trailing `# comment` that is not inside a string.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

fn parse_string(value: &str) -> Option<String> {
    let inner = value.strip_prefix('"')?.strip_suffix('"')?;
    Some(inner.to_string())
}
