//! The field replacer (§4.1): a function `Field -> Symbol` lifted to a
//! recursive rewrite over an entire symbol tree. Only `Field` nodes are
//! candidates for substitution; everything else is rebuilt structurally.
//!
//! Modeled on the teacher's `expression_rewriter::rewrite_expression_with_property_mapping`:
//! a single match over every variant, recursing into children and rebuilding.
//! The contract (§4.1): structural identity is preserved outside substitutions,
//! and two independent replacers compose only when their substitution domains
//! are disjoint — the planner never applies conflicting ones to the same tree.

use crate::symbol::{Field, FunctionCall, Symbol};

/// Wraps a `Field -> Option<Symbol>` substitution function. Returning `None`
/// leaves the field untouched.
pub struct FieldReplacer<'a> {
    f: Box<dyn Fn(&Field) -> Option<Symbol> + 'a>,
}

impl<'a> FieldReplacer<'a> {
    pub fn new(f: impl Fn(&Field) -> Option<Symbol> + 'a) -> Self {
        FieldReplacer { f: Box::new(f) }
    }

    /// Apply the replacer recursively to `symbol`, returning a new tree.
    pub fn apply(&self, symbol: &Symbol) -> Symbol {
        match symbol {
            Symbol::Field(field) => match (self.f)(field) {
                Some(replacement) => replacement,
                None => symbol.clone(),
            },
            Symbol::Literal(_) => symbol.clone(),
            Symbol::FunctionCall(call) => Symbol::FunctionCall(FunctionCall {
                op: call.op.clone(),
                args: call.args.iter().map(|arg| self.apply(arg)).collect(),
            }),
        }
    }

    /// `apply` applied twice must equal `apply` applied once (P6) whenever the
    /// replacement produced for a field is itself a fixed point of `f` — true
    /// for every replacer the tree builder constructs, since it always
    /// retargets fields owned by the two just-joined relations onto the new
    /// synthetic relation, and the synthetic relation is never itself an
    /// input to the same replacer's substitution domain.
    pub fn apply_idempotent(&self, symbol: &Symbol) -> Symbol {
        let once = self.apply(symbol);
        debug_assert_eq!(self.apply(&once), once, "field replacer is not idempotent");
        once
    }
}
