//! Relation-name collector (§2.2 / §4.2): a depth-first visit of a `Symbol`
//! returning the set of relation names reached through any `Field`.
//!
//! Deterministic and insertion-ordered, matching `SPEC_FULL.md`'s resolution
//! of the "insertion-ordered set" requirement: this is what lets the order
//! chooser derive a presort prefix from `ORDER BY` symbols in the order their
//! relations first appear. For use as a map key (the predicate splitter's
//! dispatch map, §4.3) the ordered output is converted to a `RelationSet`
//! (`BTreeSet<QN>`), which is order-independent.

use crate::symbol::{Field, FunctionCall, Literal, QN};
use crate::visitor::SymbolVisitor;
use std::collections::BTreeSet;

/// Order-independent key type for the predicate-splitter dispatch map and
/// for join-condition key-sets throughout the order chooser.
pub type RelationSet = BTreeSet<QN>;

#[derive(Default)]
pub struct RelationCollector {
    ordered: Vec<QN>,
}

impl RelationCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the relations referenced by `symbol`, in first-seen order.
    pub fn collect_ordered(symbol: &crate::symbol::Symbol) -> Vec<QN> {
        let mut collector = Self::new();
        crate::visitor::walk_symbol(symbol, &mut collector);
        collector.ordered
    }

    /// Collect the relations referenced by `symbol` as an order-independent set.
    pub fn collect(symbol: &crate::symbol::Symbol) -> RelationSet {
        Self::collect_ordered(symbol).into_iter().collect()
    }
}

impl SymbolVisitor for RelationCollector {
    type Output = ();

    fn visit_field(&mut self, field: &Field) {
        if !self.ordered.contains(&field.relation) {
            self.ordered.push(field.relation.clone());
        }
    }

    fn visit_literal(&mut self, _lit: &Literal) {}

    fn visit_function_call(&mut self, _call: &FunctionCall) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Symbol;

    #[test]
    fn collects_both_sides_of_a_comparison() {
        let expr = Symbol::field("t1", "a").eq(Symbol::field("t2", "b"));
        let set = RelationCollector::collect(&expr);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&QN::from("t1")));
        assert!(set.contains(&QN::from("t2")));
    }

    #[test]
    fn ordered_collection_preserves_first_seen_order() {
        let expr = Symbol::field("t3", "c")
            .eq(Symbol::field("t1", "a"))
            .and(Symbol::field("t2", "b").eq(Symbol::field("t1", "a")));
        let ordered = RelationCollector::collect_ordered(&expr);
        assert_eq!(
            ordered,
            vec![QN::from("t3"), QN::from("t1"), QN::from("t2")]
        );
    }

    #[test]
    fn literal_has_no_relations() {
        let expr = Symbol::Literal(Literal::Integer(1));
        assert!(RelationCollector::collect(&expr).is_empty());
    }
}
