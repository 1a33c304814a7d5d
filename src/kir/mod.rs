//! KIR: Kernel IR expression nodes.
//!
//! KIR holds the small scalar expressions that the lowering passes hand to
//! code emission: literals, named runtime scalars (thread indices, grid
//! reduction flags) and the boolean operators needed to combine them into
//! guards.
//!
//! Pipeline:
//! ```text
//! Fusion → ThreadPredicateMap → BoolExpr guards → KernelLowering → String
//! ```

pub mod lower;

use std::fmt;

use crate::ir::{ParallelType, ValId};

pub use crate::ir::DataType;

// ─── Expressions ──────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    And,
}

impl BinaryOp {
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::And => 1,
            BinaryOp::Eq => 2,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::And => "&&",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Bool(bool),
    Int(i64),
    /// A scalar that exists at kernel runtime under a fixed name.
    NamedScalar { name: String, dtype: DataType },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    pub fn named(name: &str, dtype: DataType) -> Self {
        Expr::NamedScalar {
            name: name.to_string(),
            dtype,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Expr::Bool(_) => DataType::Bool,
            Expr::Int(_) => DataType::Int,
            Expr::NamedScalar { dtype, .. } => *dtype,
            Expr::Binary { .. } => DataType::Bool,
        }
    }

    /// Copy of this expression with every named scalar renamed by `f`.
    pub fn map_names(&self, f: &impl Fn(&str) -> String) -> Expr {
        match self {
            Expr::NamedScalar { name, dtype } => Expr::NamedScalar {
                name: f(name),
                dtype: *dtype,
            },
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op: *op,
                lhs: Box::new(lhs.map_names(f)),
                rhs: Box::new(rhs.map_names(f)),
            },
            other => other.clone(),
        }
    }

    fn fmt_prec(&self, f: &mut fmt::Formatter<'_>, parent: u8) -> fmt::Result {
        match self {
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Int(n) => write!(f, "{}", n),
            Expr::NamedScalar { name, .. } => f.write_str(name),
            Expr::Binary { op, lhs, rhs } => {
                let prec = op.precedence();
                // `&&` is associative, so only a tighter-binding parent needs parens.
                let wrap = prec < parent || (prec == parent && *op == BinaryOp::Eq);
                if wrap {
                    f.write_str("(")?;
                }
                lhs.fmt_prec(f, prec)?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_prec(f, prec)?;
                if wrap {
                    f.write_str(")")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_prec(f, 0)
    }
}

pub fn eq_expr(lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op: BinaryOp::Eq,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

pub fn and_expr(lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op: BinaryOp::And,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

/// Runtime index of the current block or thread along `pt`.
pub fn parallel_index(pt: ParallelType) -> Expr {
    Expr::named(pt.cuda_name(), DataType::Int)
}

/// Name of the flag a grid reduction producing `val` raises once the
/// block-wide result is complete.
pub fn predicate_flag_name(val: ValId) -> String {
    format!("T{}pred", val.0)
}

// ─── Boolean guards ───────────────────────────────────────────────

/// An expression statically known to be boolean.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoolExpr(Expr);

impl BoolExpr {
    /// Wrap `expr`, or hand back the offending type.
    pub fn try_new(expr: Expr) -> Result<Self, DataType> {
        match expr.data_type() {
            DataType::Bool => Ok(Self(expr)),
            other => Err(other),
        }
    }

    pub fn literal(value: bool) -> Self {
        Self(Expr::Bool(value))
    }

    pub fn expr(&self) -> &Expr {
        &self.0
    }

    pub fn into_expr(self) -> Expr {
        self.0
    }

    pub fn is_true(&self) -> bool {
        self.0 == Expr::Bool(true)
    }

    /// Operands of the top-level `&&` chain, left to right.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        fn walk<'a>(e: &'a Expr, out: &mut Vec<&'a Expr>) {
            match e {
                Expr::Binary {
                    op: BinaryOp::And,
                    lhs,
                    rhs,
                } => {
                    walk(lhs, out);
                    walk(rhs, out);
                }
                other => out.push(other),
            }
        }
        let mut out = Vec::new();
        walk(&self.0, &mut out);
        out
    }
}

impl fmt::Display for BoolExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_types() {
        assert_eq!(Expr::Int(0).data_type(), DataType::Int);
        assert_eq!(parallel_index(ParallelType::TIDx).data_type(), DataType::Int);
        let eq = eq_expr(parallel_index(ParallelType::TIDx), Expr::Int(0));
        assert_eq!(eq.data_type(), DataType::Bool);
        let flag = Expr::named("T4pred", DataType::Bool);
        assert_eq!(and_expr(eq, flag).data_type(), DataType::Bool);
    }

    #[test]
    fn test_bool_expr_rejects_non_bool() {
        assert_eq!(BoolExpr::try_new(Expr::Int(3)), Err(DataType::Int));
        assert!(BoolExpr::try_new(Expr::named("n", DataType::Float)).is_err());
        assert!(BoolExpr::try_new(Expr::Bool(false)).is_ok());
    }

    #[test]
    fn test_display_guard() {
        let tid = eq_expr(parallel_index(ParallelType::TIDx), Expr::Int(0));
        let flag = Expr::named(&predicate_flag_name(ValId(3)), DataType::Bool);
        let guard = BoolExpr::try_new(and_expr(tid, flag)).unwrap();
        assert_eq!(guard.to_string(), "threadIdx.x == 0 && T3pred");
    }

    #[test]
    fn test_display_parenthesizes_nested_eq() {
        let inner = eq_expr(Expr::Int(1), Expr::Int(1));
        let outer = eq_expr(inner, Expr::Bool(true));
        assert_eq!(outer.to_string(), "(1 == 1) == true");
    }

    #[test]
    fn test_conjuncts_flatten() {
        let a = Expr::named("a", DataType::Bool);
        let b = Expr::named("b", DataType::Bool);
        let c = Expr::named("c", DataType::Bool);
        let guard = BoolExpr::try_new(and_expr(and_expr(a.clone(), b.clone()), c.clone())).unwrap();
        assert_eq!(guard.conjuncts(), vec![&a, &b, &c]);
        assert_eq!(BoolExpr::literal(true).conjuncts().len(), 1);
        assert!(BoolExpr::literal(true).is_true());
    }

    #[test]
    fn test_flag_name_derived_from_identity() {
        assert_eq!(predicate_flag_name(ValId(0)), "T0pred");
        assert_ne!(predicate_flag_name(ValId(1)), predicate_flag_name(ValId(2)));
    }
}
