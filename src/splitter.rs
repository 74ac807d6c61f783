//! Predicate splitter (§2.3 / §4.3): splits a boolean `Symbol` on top-level
//! `AND` into fragments keyed by referenced-relation set, combining fragments
//! that land on the same key with `AND`.
//!
//! A disjunction spanning multiple relations is never split — it is kept
//! whole and keyed by the union of its referents (§9 "Opaque OR"). Splitting
//! across `OR` would silently change the predicate's meaning.

use crate::collector::{RelationCollector, RelationSet};
use crate::combinators::{self, and};
use crate::symbol::{Op, Symbol};
use std::collections::BTreeMap;

/// Dispatch map from the set of relations a fragment depends on to the
/// conjunction of all fragments with exactly that dependency set.
pub type SplitQuery = BTreeMap<RelationSet, Symbol>;

/// Split `predicate` on top-level `AND`, keying each fragment by its
/// referenced-relation set. Called on the root `WHERE` and on each `ON`
/// condition (the latter merged into a shared map across all pairs).
pub fn split_conjunction(predicate: &Symbol) -> SplitQuery {
    let mut map = SplitQuery::new();
    for fragment in combinators::flatten(predicate, &Op::And) {
        let key = RelationCollector::collect(&fragment);
        insert_fragment(&mut map, key, fragment);
    }
    map
}

/// Insert `fragment` under `key`, AND-combining with whatever is already
/// there. Used both by `split_conjunction` and by callers merging several
/// splits into one map (e.g. one `ON` condition per join pair).
pub fn insert_fragment(map: &mut SplitQuery, key: RelationSet, fragment: Symbol) {
    map.entry(key)
        .and_modify(|existing| {
            let combined = and(vec![existing.clone(), fragment.clone()])
                .expect("AND of two fragments is never empty");
            *existing = combined;
        })
        .or_insert(fragment);
}

/// Merge `other` into `into`, AND-combining any fragments that land on keys
/// already present. Used when rewriting causes two previously-distinct keys
/// to collapse onto the same relation set (§9 "Split-map key equality under
/// rewriting").
pub fn merge_into(into: &mut SplitQuery, other: SplitQuery) {
    for (key, fragment) in other {
        insert_fragment(into, key, fragment);
    }
}

/// Rewrite every key and value in `map` through a just-introduced synthetic
/// join: any key member equal to `old_left` or `old_right` becomes
/// `new_name`, and `replacer` is applied to each fragment. Keys that collapse
/// onto the same relation set after rewriting have their fragments
/// AND-combined (§9 "Split-map key equality under rewriting").
pub fn rewrite_keys(
    map: SplitQuery,
    old_left: &crate::symbol::QN,
    old_right: &crate::symbol::QN,
    new_name: &crate::symbol::QN,
    replacer: &crate::replacer::FieldReplacer,
) -> SplitQuery {
    let mut rewritten = SplitQuery::new();
    for (key, fragment) in map {
        let new_key: RelationSet = key
            .into_iter()
            .map(|qn| if &qn == old_left || &qn == old_right { new_name.clone() } else { qn })
            .collect();
        insert_fragment(&mut rewritten, new_key, replacer.apply_idempotent(&fragment));
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::QN;

    #[test]
    fn splits_top_level_and_by_relation_set() {
        let a = Symbol::field("t1", "a").eq(Symbol::field("t2", "a"));
        let b = Symbol::field("t2", "b").eq(Symbol::field("t3", "b"));
        let predicate = a.clone().and(b.clone());

        let split = split_conjunction(&predicate);
        assert_eq!(split.len(), 2);

        let key_t1_t2: RelationSet = vec![QN::from("t1"), QN::from("t2")].into_iter().collect();
        let key_t2_t3: RelationSet = vec![QN::from("t2"), QN::from("t3")].into_iter().collect();
        assert_eq!(split.get(&key_t1_t2), Some(&a));
        assert_eq!(split.get(&key_t2_t3), Some(&b));
    }

    #[test]
    fn opaque_or_is_kept_whole_and_keyed_by_union() {
        let a = Symbol::field("t1", "x").eq(Symbol::Literal(crate::symbol::Literal::Integer(1)));
        let b = Symbol::field("t2", "y").eq(Symbol::Literal(crate::symbol::Literal::Integer(1)));
        let disjunction = combinators::or(vec![a, b]).unwrap();

        let split = split_conjunction(&disjunction);
        assert_eq!(split.len(), 1);

        let key: RelationSet = vec![QN::from("t1"), QN::from("t2")].into_iter().collect();
        assert_eq!(split.get(&key), Some(&disjunction));
    }

    #[test]
    fn duplicate_keys_are_and_combined() {
        let mut map = SplitQuery::new();
        let key: RelationSet = vec![QN::from("t1")].into_iter().collect();
        insert_fragment(&mut map, key.clone(), Symbol::field("t1", "a"));
        insert_fragment(&mut map, key.clone(), Symbol::field("t1", "b"));

        match map.get(&key).unwrap() {
            Symbol::FunctionCall(call) => assert_eq!(call.op, Op::And),
            other => panic!("expected AND, got {:?}", other),
        }
    }

    #[test]
    fn four_table_straddling_fragment_merges_after_rewrite() {
        // WHERE fragment straddling join.t1.t2 and t3 should merge with an
        // existing fragment on the same collapsed key after rewriting.
        let mut map = SplitQuery::new();
        let key: RelationSet = vec![QN::from("join.t1.t2"), QN::from("t3")]
            .into_iter()
            .collect();
        insert_fragment(
            &mut map,
            key.clone(),
            Symbol::field("join.t1.t2", "t1_a").eq(Symbol::field("t3", "a")),
        );
        let mut other = SplitQuery::new();
        insert_fragment(
            &mut other,
            key.clone(),
            Symbol::field("join.t1.t2", "t2_b").eq(Symbol::field("t3", "b")),
        );
        merge_into(&mut map, other);

        assert_eq!(map.len(), 1);
        match map.get(&key).unwrap() {
            Symbol::FunctionCall(call) => assert_eq!(call.op, Op::And),
            other => panic!("expected AND, got {:?}", other),
        }
    }

    #[test]
    fn rewrite_keys_collapses_onto_synthetic_name() {
        use crate::replacer::FieldReplacer;

        let mut map = SplitQuery::new();
        insert_fragment(
            &mut map,
            vec![QN::from("t1"), QN::from("t3")].into_iter().collect(),
            Symbol::field("t1", "a").eq(Symbol::field("t3", "c")),
        );
        insert_fragment(
            &mut map,
            vec![QN::from("t2"), QN::from("t3")].into_iter().collect(),
            Symbol::field("t2", "b").eq(Symbol::field("t3", "c")),
        );

        let replacer = FieldReplacer::new(|field| {
            if field.relation == QN::from("t1") || field.relation == QN::from("t2") {
                Some(Symbol::field(
                    "join.t1.t2",
                    format!("{}.{}", field.relation, field.path.join(".")),
                ))
            } else {
                None
            }
        });

        let rewritten = rewrite_keys(map, &QN::from("t1"), &QN::from("t2"), &QN::from("join.t1.t2"), &replacer);

        let key: RelationSet = vec![QN::from("join.t1.t2"), QN::from("t3")].into_iter().collect();
        assert_eq!(rewritten.len(), 1);
        match rewritten.get(&key).unwrap() {
            Symbol::FunctionCall(call) => assert_eq!(call.op, Op::And),
            other => panic!("expected AND, got {:?}", other),
        }
    }
}
