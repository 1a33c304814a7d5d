use std::io;

use crate::ir::{Fusion, ValId};
use crate::lower::PredicateError;
use crate::span::Span;
use crate::syntax::ParsedFusion;

/// A diagnostic about a fusion description or its analysis.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Diagnostic {
    pub fn error(message: String, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn warning(message: String, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    /// Point a predicate analysis failure at the declaration it concerns.
    pub fn from_predicate_error(err: &PredicateError, parsed: &ParsedFusion) -> Self {
        let fusion = &parsed.fusion;
        let name = |v: ValId| describe(fusion, v);
        match err {
            PredicateError::MissingPredicate { val } => Diagnostic::error(
                format!("{} is read before it has a thread predicate", name(*val)),
                parsed.val_span(*val),
            )
            .with_help("declare it as an `input` or define it before use".to_string()),
            PredicateError::DuplicatePredicate { val } => Diagnostic::error(
                format!("{} is assigned more than once", name(*val)),
                parsed.val_span(*val),
            ),
            PredicateError::MismatchedReduction { expr, val, kind } => Diagnostic::error(
                format!(
                    "mismatched parallelized reductions along {} among the inputs of `{}`",
                    kind.short_name(),
                    fusion.expr(*expr).op
                ),
                parsed.expr_span(*expr),
            )
            .with_note(format!(
                "{} is bound to {} but does not reduce it",
                name(*val),
                kind.short_name()
            )),
            PredicateError::ReductionBroadcastConflict { expr, val, kind } => Diagnostic::error(
                format!(
                    "`{}` both reduces and broadcasts along {}",
                    fusion.expr(*expr).op,
                    kind.short_name()
                ),
                parsed.expr_span(*expr),
            )
            .with_note(format!("conflict detected at input {}", name(*val)))
            .with_help(
                "a parallel dimension cannot be reduced and broadcast by the same operation"
                    .to_string(),
            ),
            PredicateError::NoPredicateSource { val, kind } => Diagnostic::error(
                format!(
                    "{} needs a {} guard but no reduction is recorded for it",
                    name(*val),
                    kind.short_name()
                ),
                parsed.val_span(*val),
            ),
            PredicateError::MultiplePredicateSources { val, kind, sources } => {
                let names: Vec<String> = sources.iter().map(|&s| name(s)).collect();
                Diagnostic::error(
                    format!(
                        "{} is guarded along {} by {} grid reductions",
                        name(*val),
                        kind.short_name(),
                        sources.len()
                    ),
                    parsed.val_span(*val),
                )
                .with_note(format!("reduced along {} in {}", kind.short_name(), names.join(", ")))
                .with_help(format!(
                    "a {} guard waits on exactly one reduction flag",
                    kind.short_name()
                ))
            }
            PredicateError::Graph(crate::ir::GraphError::Cycle { expr }) => Diagnostic::error(
                format!("`{}` depends on its own result", fusion.expr(*expr).op),
                parsed.expr_span(*expr),
            ),
            other => Diagnostic::error(other.to_string(), Span::dummy()),
        }
    }

    /// Write the report for this diagnostic to `out`.
    pub fn write_to(&self, filename: &str, source: &str, out: impl io::Write) -> io::Result<()> {
        use ariadne::{Color, Label, Report, ReportKind, Source};

        let kind = match self.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };

        let color = match self.severity {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
        };

        let mut report = Report::build(kind, filename, self.span.start as usize)
            .with_message(&self.message)
            .with_label(
                Label::new((filename, self.span.range()))
                    .with_message(&self.message)
                    .with_color(color),
            );

        for note in &self.notes {
            report = report.with_note(note);
        }

        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        report
            .finish()
            .write((filename, Source::from(source)), out)
    }

    /// Render the diagnostic to stderr using ariadne.
    pub fn render(&self, filename: &str, source: &str) {
        if self.write_to(filename, source, io::stderr()).is_err() {
            eprintln!("error: {}", self.message);
        }
    }
}

fn describe(fusion: &Fusion, val: ValId) -> String {
    if val.index() < fusion.num_vals() {
        format!("`{}`", fusion.val(val).name)
    } else {
        format!("value {}", val)
    }
}

/// Render a list of diagnostics.
pub fn render_diagnostics(diagnostics: &[Diagnostic], filename: &str, source: &str) {
    for diag in diagnostics {
        diag.render(filename, source);
    }
}
