//! Predicate AST.
//!
//! Predicates are plain data built with [`member`], [`lit`] and [`captured`]
//! plus the combinators on [`Expr`]:
//!
//! ```ignore
//! let wanted = "firstname 5".to_string();
//! let p = member("FirstName")
//!     .eq(captured(move || wanted.clone()))
//!     .or(member("Birth.Day").eq(lit(3)));
//! ```

use domain::MemberPath;
use serde::Serialize;
use serde_json::Value as Json;
use std::{fmt, ops::Not, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        f.write_str(symbol)
    }
}

/// A value read from the caller's scope each time the predicate is compiled.
#[derive(Clone)]
pub struct Capture(Arc<dyn Fn() -> serde_json::Result<Json> + Send + Sync>);

impl Capture {
    pub fn evaluate(&self) -> serde_json::Result<Json> {
        (self.0)()
    }
}

impl fmt::Debug for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Capture(..)")
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Member(MemberPath),
    Literal(Json),
    Captured(Capture),
    /// Type conversion wrapper; carries no semantics of its own.
    Convert(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
}

pub fn member(path: impl Into<MemberPath>) -> Expr {
    Expr::Member(path.into())
}

pub fn lit(value: impl Into<Json>) -> Expr {
    Expr::Literal(value.into())
}

pub fn captured<F, V>(read: F) -> Expr
where
    F: Fn() -> V + Send + Sync + 'static,
    V: Serialize,
{
    Expr::Captured(Capture(Arc::new(move || serde_json::to_value(read()))))
}

impl Expr {
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn eq(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Eq, self, rhs)
    }

    pub fn ne(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Ne, self, rhs)
    }

    pub fn lt(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Lt, self, rhs)
    }

    pub fn le(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Le, self, rhs)
    }

    pub fn gt(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Gt, self, rhs)
    }

    pub fn ge(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Ge, self, rhs)
    }

    pub fn and(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::And, self, rhs)
    }

    pub fn or(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Or, self, rhs)
    }

    pub fn convert(self) -> Self {
        Expr::Convert(Box::new(self))
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Member(path) => write!(f, "{path}"),
            Expr::Literal(value) => write!(f, "{value}"),
            Expr::Captured(_) => f.write_str("<captured>"),
            Expr::Convert(inner) => write!(f, "convert({inner})"),
            Expr::Binary { op, left, right } => match op {
                BinaryOp::And | BinaryOp::Or => write!(f, "({left}) {op} ({right})"),
                _ => write!(f, "{left} {op} {right}"),
            },
            Expr::Not(inner) => write!(f, "!({inner})"),
        }
    }
}
