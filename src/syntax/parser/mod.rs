use std::collections::HashMap;

use crate::diagnostic::Diagnostic;
use crate::ir::{
    DataType, Fusion, GraphError, IterDomain, IterType, ParallelType, TensorDomain, ValId, ValKind,
};
use crate::syntax::lexeme::Lexeme;
use crate::syntax::span::{Span, Spanned};
use crate::syntax::ParsedFusion;


/// Name used when the file has no `fusion <name>` header.
pub(crate) const DEFAULT_FUSION_NAME: &str = "fusion";

/// `name: type`, as written after `input` or left of a definition's `=`.
struct Decl {
    name: Spanned<String>,
    kind: ValKind,
}

pub(crate) struct Parser {
    tokens: Vec<Spanned<Lexeme>>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    line_starts: Vec<usize>,
    fusion: Fusion,
    names: HashMap<String, ValId>,
    val_spans: Vec<Span>,
    expr_spans: Vec<Span>,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Spanned<Lexeme>>, source: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            line_starts,
            fusion: Fusion::new(DEFAULT_FUSION_NAME),
            names: HashMap::new(),
            val_spans: Vec::new(),
            expr_spans: Vec::new(),
        }
    }

    pub(crate) fn parse_file(mut self) -> Result<ParsedFusion, Vec<Diagnostic>> {
        if self.at(&Lexeme::Fusion) {
            let line = self.line_of(self.current_span());
            self.advance();
            match self.expect_ident() {
                Some(name) => self.fusion.name = name.node,
                None => self.synchronize(line),
            }
        }

        while !self.at(&Lexeme::Eof) {
            let start = self.pos;
            let line = self.line_of(self.current_span());
            if self.parse_statement().is_none() {
                self.synchronize(line);
            }
            if self.pos == start {
                self.advance();
            }
        }

        if !self.diagnostics.is_empty() {
            return Err(self.diagnostics);
        }
        Ok(ParsedFusion::new(
            self.fusion,
            self.val_spans,
            self.expr_spans,
        ))
    }

    // ─── Statements ───────────────────────────────────────────────────

    fn parse_statement(&mut self) -> Option<()> {
        match self.peek() {
            Lexeme::Input => {
                self.advance();
                let decl = self.parse_decl()?;
                let span = decl.name.span;
                let val = self.declare(decl)?;
                let added = self.fusion.add_input(val);
                self.graph(added, span)
            }
            Lexeme::Output => {
                self.advance();
                let span = self.current_span();
                let val = self.resolve()?;
                let added = self.fusion.add_output(val);
                self.graph(added, span)
            }
            Lexeme::Ident(_) => self.parse_definition(),
            Lexeme::Fusion => {
                self.error_with_help(
                    "`fusion` header after the first statement",
                    "move `fusion <name>` to the top of the file",
                );
                None
            }
            other => {
                let msg = format!(
                    "expected 'input', 'output' or a definition, found {}",
                    other.description()
                );
                self.error_at_current(&msg);
                None
            }
        }
    }

    /// `T2: [i], T3: [i] = split(T1, s0)`
    fn parse_definition(&mut self) -> Option<()> {
        let start = self.current_span();
        let mut outputs = vec![self.parse_decl()?];
        while self.eat(&Lexeme::Comma) {
            outputs.push(self.parse_decl()?);
        }
        self.expect(&Lexeme::Eq)?;
        let op = self.expect_ident()?;
        self.expect(&Lexeme::LParen)?;
        let mut inputs = Vec::new();
        if !self.at(&Lexeme::RParen) {
            loop {
                inputs.push(self.resolve()?);
                if !self.eat(&Lexeme::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(&Lexeme::RParen)?;

        let mut outs = Vec::with_capacity(outputs.len());
        for decl in outputs {
            outs.push(self.declare(decl)?);
        }
        let span = start.merge(end);
        let added = self.fusion.add_expr(&op.node, inputs, outs);
        self.graph(added, span)?;
        self.expr_spans.push(span);
        Some(())
    }

    fn parse_decl(&mut self) -> Option<Decl> {
        let name = self.expect_ident()?;
        self.expect(&Lexeme::Colon)?;
        let kind = if self.at(&Lexeme::LBracket) {
            ValKind::Tensor(self.parse_domain()?)
        } else {
            ValKind::Scalar(self.parse_scalar_type()?)
        };
        Some(Decl { name, kind })
    }

    // ─── Types ────────────────────────────────────────────────────────

    fn parse_domain(&mut self) -> Option<TensorDomain> {
        self.expect(&Lexeme::LBracket)?;
        let mut axes = Vec::new();
        if !self.at(&Lexeme::RBracket) {
            loop {
                axes.push(self.parse_axis()?);
                if !self.eat(&Lexeme::Comma) {
                    break;
                }
            }
        }
        self.expect(&Lexeme::RBracket)?;
        Some(TensorDomain::new(axes))
    }

    /// `i`, `r@tidx`, `b@bidy`, ...
    fn parse_axis(&mut self) -> Option<IterDomain> {
        let tag = self.expect_ident()?;
        let iter_type = match tag.node.as_str() {
            "i" => IterType::Iteration,
            "r" => IterType::Reduction,
            "b" => IterType::Broadcast,
            other => {
                self.error_at(
                    format!("bad dimension '{}'", other),
                    tag.span,
                    Some("use i, r or b"),
                );
                return None;
            }
        };

        let parallel_type = if self.eat(&Lexeme::At) {
            let kind = self.expect_ident()?;
            match kind.node.parse::<ParallelType>() {
                Ok(pt) => Some(pt),
                Err(_) => {
                    let known: Vec<&str> =
                        ParallelType::ALL.iter().map(|pt| pt.short_name()).collect();
                    let help = format!("expected one of {}", known.join(", "));
                    self.error_at(
                        format!("unknown parallel kind '{}'", kind.node),
                        kind.span,
                        Some(&help),
                    );
                    return None;
                }
            }
        } else {
            None
        };

        Some(IterDomain::new(iter_type, parallel_type))
    }

    fn parse_scalar_type(&mut self) -> Option<DataType> {
        let ty = self.expect_ident()?;
        match ty.node.as_str() {
            "scalar" | "f32" => Some(DataType::Float),
            "i64" => Some(DataType::Int),
            "bool" => Some(DataType::Bool),
            other => {
                self.error_at(
                    format!("unknown type '{}'", other),
                    ty.span,
                    Some("write a domain like `[i@tidx, r]` or one of scalar, f32, i64, bool"),
                );
                None
            }
        }
    }

    // ─── Names ────────────────────────────────────────────────────────

    fn declare(&mut self, decl: Decl) -> Option<ValId> {
        if let Some(&prev) = self.names.get(&decl.name.node) {
            let prev_line = self.line_of(self.val_spans[prev.index()]) + 1;
            self.diagnostics.push(
                Diagnostic::error(
                    format!("`{}` is declared more than once", decl.name.node),
                    decl.name.span,
                )
                .with_note(format!("first declared on line {}", prev_line))
                .with_help("every value is assigned exactly once; pick a new name".to_string()),
            );
            return None;
        }
        let val = self.fusion.add_val(&decl.name.node, decl.kind);
        self.val_spans.push(decl.name.span);
        self.names.insert(decl.name.node, val);
        Some(val)
    }

    fn resolve(&mut self) -> Option<ValId> {
        let name = self.expect_ident()?;
        match self.names.get(&name.node) {
            Some(&val) => Some(val),
            None => {
                self.error_at(
                    format!("unknown value `{}`", name.node),
                    name.span,
                    Some("declare it with `input` or define it on an earlier line"),
                );
                None
            }
        }
    }

    fn graph<T>(&mut self, result: Result<T, GraphError>, span: Span) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(err) => {
                self.error_at(err.to_string(), span, None);
                None
            }
        }
    }

    // ─── Recovery ─────────────────────────────────────────────────────

    fn line_of(&self, span: Span) -> usize {
        let offset = span.start as usize;
        self.line_starts.partition_point(|&s| s <= offset) - 1
    }

    /// Skip the rest of the statement that started on `line`.
    fn synchronize(&mut self, line: usize) {
        while !self.at(&Lexeme::Eof) && self.line_of(self.current_span()) == line {
            self.advance();
        }
    }

    // ─── Token helpers ────────────────────────────────────────────────

    fn peek(&self) -> &Lexeme {
        &self.tokens[self.pos].node
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn at(&self, token: &Lexeme) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Lexeme) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Lexeme) -> Option<Span> {
        if self.at(token) {
            let span = self.current_span();
            self.advance();
            Some(span)
        } else {
            let msg = format!(
                "expected {}, found {}",
                token.description(),
                self.peek().description()
            );
            self.error_at_current(&msg);
            None
        }
    }

    fn expect_ident(&mut self) -> Option<Spanned<String>> {
        if let Lexeme::Ident(name) = self.peek().clone() {
            let span = self.current_span();
            self.advance();
            Some(Spanned::new(name, span))
        } else {
            let msg = format!("expected identifier, found {}", self.peek().description());
            self.error_at_current(&msg);
            None
        }
    }

    fn error_at_current(&mut self, msg: &str) {
        self.diagnostics
            .push(Diagnostic::error(msg.to_string(), self.current_span()));
    }

    fn error_with_help(&mut self, msg: &str, help: &str) {
        self.diagnostics.push(
            Diagnostic::error(msg.to_string(), self.current_span()).with_help(help.to_string()),
        );
    }

    fn error_at(&mut self, msg: String, span: Span, help: Option<&str>) {
        let mut diag = Diagnostic::error(msg, span);
        if let Some(help) = help {
            diag = diag.with_help(help.to_string());
        }
        self.diagnostics.push(diag);
    }
}
