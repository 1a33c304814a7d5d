//! Textual fusion descriptions.
//!
//! ```text
//! fusion softmax_like
//! input T0: [i@bidx, i@tidx]
//! T1: [i@bidx, r@tidx] = sum(T0)
//! T2: [i@bidx, b@tidx] = broadcast(T1)
//! T3: [i@bidx, i@tidx] = div(T0, T2)
//! output T3
//! ```

pub(crate) mod lexeme;
pub(crate) mod lexer;
pub(crate) mod parser;
pub mod span;

use crate::diagnostic::Diagnostic;
use crate::ir::{ExprId, Fusion, ValId};
use span::Span;

/// A fusion together with the source locations of its values and expressions.
#[derive(Clone, Debug)]
pub struct ParsedFusion {
    pub fusion: Fusion,
    val_spans: Vec<Span>,
    expr_spans: Vec<Span>,
}

impl ParsedFusion {
    pub(crate) fn new(fusion: Fusion, val_spans: Vec<Span>, expr_spans: Vec<Span>) -> Self {
        Self {
            fusion,
            val_spans,
            expr_spans,
        }
    }

    /// Where `val` is declared.
    pub fn val_span(&self, val: ValId) -> Span {
        self.val_spans
            .get(val.index())
            .copied()
            .unwrap_or_else(Span::dummy)
    }

    /// From the first output name through the closing parenthesis.
    pub fn expr_span(&self, expr: ExprId) -> Span {
        self.expr_spans
            .get(expr.index())
            .copied()
            .unwrap_or_else(Span::dummy)
    }
}

/// Parse a fusion description. Lexing stops at the first batch of
/// errors; the parser recovers at line boundaries and reports everything
/// it finds.
pub fn parse_fusion(source: &str) -> Result<ParsedFusion, Vec<Diagnostic>> {
    let (tokens, lex_errors) = lexer::Lexer::new(source).tokenize();
    if !lex_errors.is_empty() {
        return Err(lex_errors);
    }
    let parsed = parser::Parser::new(tokens, source).parse_file()?;
    tracing::debug!(
        fusion = %parsed.fusion.name,
        vals = parsed.fusion.num_vals(),
        exprs = parsed.fusion.num_exprs(),
        "parsed fusion"
    );
    Ok(parsed)
}
