//! Visitor pattern for `Symbol` traversal.
//!
//! Separates traversal from the operation performed at each node, mirroring
//! the teacher's `logical_expr::visitors` module (`ExpressionVisitor` +
//! `walk_expression`): a trait with do-nothing default methods plus a single
//! recursive `walk_symbol` free function that handles descent.

use crate::symbol::{Field, FunctionCall, Literal, Symbol};

/// Trait for visiting `Symbol` nodes. Implementors override only the
/// `visit_*` methods they care about; everything else falls through to the
/// default no-op.
pub trait SymbolVisitor {
    type Output: Default;

    fn visit_field(&mut self, _field: &Field) -> Self::Output {
        Self::Output::default()
    }

    fn visit_literal(&mut self, _lit: &Literal) -> Self::Output {
        Self::Output::default()
    }

    fn visit_function_call(&mut self, _call: &FunctionCall) -> Self::Output {
        Self::Output::default()
    }
}

/// Walk a symbol tree, invoking the visitor at each node and recursing into
/// children. `FunctionCall` children are visited after the call itself, left
/// to right.
pub fn walk_symbol<V: SymbolVisitor>(symbol: &Symbol, visitor: &mut V) -> V::Output {
    match symbol {
        Symbol::Field(field) => visitor.visit_field(field),
        Symbol::Literal(lit) => visitor.visit_literal(lit),
        Symbol::FunctionCall(call) => {
            let result = visitor.visit_function_call(call);
            for arg in &call.args {
                walk_symbol(arg, visitor);
            }
            result
        }
    }
}
