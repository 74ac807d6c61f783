//! Symbol model: the tagged value tree used for expressions, field references,
//! literals and function/operator application.
//!
//! Symbols are pure value trees (§4.1 of SPEC_FULL.md) — transformations always
//! return new trees rather than mutating in place. `QN` (qualified name) is the
//! dotted identifier used to key relations throughout the planner.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dotted identifier naming a relation, base table or synthetic join
/// (e.g. `orders`, `join.t1.t2`). Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QN(pub String);

impl QN {
    pub fn new(name: impl Into<String>) -> Self {
        QN(name.into())
    }

    /// The synthetic name produced by joining two relations: `join.<left>.<right>`.
    pub fn synthetic(left: &QN, right: &QN) -> Self {
        QN(format!("join.{}.{}", left.0, right.0))
    }
}

impl fmt::Display for QN {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for QN {
    fn from(s: &str) -> Self {
        QN(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(v) => write!(f, "{}", v),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::String(s) => write!(f, "{}", s),
            Literal::Null => write!(f, "null"),
        }
    }
}

/// A reference to a column of a specific relation. `path` is a column path —
/// ordinarily a single segment, but after a synthetic join is introduced, a
/// rewritten field's path is prefixed with the original owning relation's
/// name (see `replacer.rs`) so the composite remains addressable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub relation: QN,
    pub path: Vec<String>,
}

impl Field {
    pub fn new(relation: impl Into<QN>, column: impl Into<String>) -> Self {
        Field {
            relation: relation.into(),
            path: vec![column.into()],
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.relation, self.path.join("."))
    }
}

/// Operator / function tag for `Symbol::FunctionCall`. Comparison and boolean
/// operators are closed enum variants (matching the teacher's preference for
/// small closed enums over strings); anything else falls back to `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    And,
    Or,
    Not,
    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    IsNull,
    IsNotNull,
    /// Any other scalar function or arithmetic operator, named verbatim
    /// (e.g. `"add"`, `"substring"`).
    Custom(String),
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::And => write!(f, "AND"),
            Op::Or => write!(f, "OR"),
            Op::Not => write!(f, "NOT"),
            Op::Eq => write!(f, "="),
            Op::NotEq => write!(f, "<>"),
            Op::Lt => write!(f, "<"),
            Op::Gt => write!(f, ">"),
            Op::Le => write!(f, "<="),
            Op::Ge => write!(f, ">="),
            Op::IsNull => write!(f, "IS NULL"),
            Op::IsNotNull => write!(f, "IS NOT NULL"),
            Op::Custom(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub op: Op,
    pub args: Vec<Symbol>,
}

/// An expression tree: fields, literals, or function/operator application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Symbol {
    Field(Field),
    Literal(Literal),
    FunctionCall(FunctionCall),
}

impl Symbol {
    /// The canonical `MATCH_ALL` predicate: an always-true literal, used as the
    /// sentinel that replaces a root `WHERE` once its fragments have been
    /// distributed into the split-query map.
    pub fn match_all() -> Symbol {
        Symbol::Literal(Literal::Boolean(true))
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, Symbol::Literal(Literal::Boolean(true)))
    }

    /// True for anything other than a bare literal — used by the `LIMIT`
    /// propagation rule (§4.6 Finalization, P7) which cares whether a node's
    /// `WHERE` can actually filter rows.
    pub fn is_non_literal(&self) -> bool {
        !matches!(self, Symbol::Literal(_))
    }

    pub fn field(relation: impl Into<QN>, column: impl Into<String>) -> Symbol {
        Symbol::Field(Field::new(relation, column))
    }

    pub fn and(self, other: Symbol) -> Symbol {
        Symbol::FunctionCall(FunctionCall {
            op: Op::And,
            args: vec![self, other],
        })
    }

    pub fn eq(self, other: Symbol) -> Symbol {
        Symbol::FunctionCall(FunctionCall {
            op: Op::Eq,
            args: vec![self, other],
        })
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Field(field) => write!(f, "{}", field),
            Symbol::Literal(lit) => write!(f, "{}", lit),
            Symbol::FunctionCall(call) => match call.op {
                Op::And | Op::Or | Op::Eq | Op::NotEq | Op::Lt | Op::Gt | Op::Le | Op::Ge
                    if call.args.len() == 2 =>
                {
                    write!(f, "({} {} {})", call.args[0], call.op, call.args[1])
                }
                Op::Not | Op::IsNull | Op::IsNotNull if call.args.len() == 1 => {
                    write!(f, "{} {}", call.args[0], call.op)
                }
                _ => {
                    write!(f, "{}(", call.op)?;
                    for (i, a) in call.args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", a)?;
                    }
                    write!(f, ")")
                }
            },
        }
    }
}
