//! Relation order chooser (§4.5, §6 `orderByJoinConditions`): produces the
//! permutation of relations that maximizes adjacent join-predicate push-down,
//! subject to an `ORDER BY`-derived presort prefix and outer-join ordering
//! constraints.
//!
//! Policy, applied in order:
//! 1. A presort prefix that already covers every relation wins outright.
//! 2. Two relations, or no join predicates anywhere (explicit key-sets,
//!    implicit key-sets, and `joinPairs` all empty) — nothing to optimize:
//!    presort prefix followed by whatever's left, input order.
//! 3. Empty presort prefix — concatenate relations from explicit key-sets,
//!    then implicit key-sets, then any stragglers, input order.
//! 4. Otherwise, enumerate permutations whose prefix equals the presort
//!    prefix, reject any that reorder an outer-join pair or place two
//!    outer-join relations adjacent without a direct pair between them,
//!    score the rest by adjacent-pair push-down, and return the first fully
//!    pushed-down permutation, else the best-scoring one, else input order.

use crate::collector::RelationSet;
use crate::join_pair::{of_relations, outer_join_relations, JoinKind, JoinPair};
use crate::symbol::QN;
use itertools::Itertools;
use log::debug;

/// Above this many relations, full permutation enumeration is abandoned for
/// a greedy nearest-neighbor walk (§9).
pub const PERMUTATION_CAP: usize = 8;

pub fn order_by_join_conditions(
    relations: &[QN],
    explicit_keys: &[RelationSet],
    implicit_keys: &[RelationSet],
    join_pairs: &[JoinPair],
    pre_sorted: &[QN],
) -> Vec<QN> {
    let all: RelationSet = relations.iter().cloned().collect();
    let sorted_set: RelationSet = pre_sorted.iter().cloned().collect();

    // Policy 1.
    if !pre_sorted.is_empty() && sorted_set == all {
        return pre_sorted.to_vec();
    }

    let no_predicates = explicit_keys.is_empty() && implicit_keys.is_empty() && join_pairs.is_empty();

    // Policy 2.
    if relations.len() == 2 || no_predicates {
        return with_missing_appended(pre_sorted, relations);
    }

    // Policy 3.
    if pre_sorted.is_empty() {
        let mut order = Vec::with_capacity(relations.len());
        for key in explicit_keys {
            for qn in key {
                if relations.contains(qn) && !order.contains(qn) {
                    order.push(qn.clone());
                }
            }
        }
        for key in implicit_keys {
            for qn in key {
                if relations.contains(qn) && !order.contains(qn) {
                    order.push(qn.clone());
                }
            }
        }
        for qn in relations {
            if !order.contains(qn) {
                order.push(qn.clone());
            }
        }
        return order;
    }

    // Policy 4.
    if relations.len() > PERMUTATION_CAP {
        debug!(
            "order_by_join_conditions: {} relations exceeds permutation cap {}, falling back to greedy nearest-neighbor",
            relations.len(),
            PERMUTATION_CAP
        );
        return greedy_nearest_neighbor(relations, join_pairs, pre_sorted);
    }

    let outer = outer_join_relations(join_pairs);
    let n = relations.len();

    let mut best: Option<(usize, Vec<QN>)> = None;
    for perm in relations.iter().cloned().permutations(n) {
        if !perm.starts_with(pre_sorted) {
            continue;
        }
        if !respects_outer_order(&perm, join_pairs) {
            continue;
        }
        let score = adjacency_score(&perm, join_pairs, explicit_keys, implicit_keys, &outer);
        match score {
            None => continue,
            Some(s) if s == n - 1 => return perm,
            Some(s) => {
                if best.as_ref().map(|(best_s, _)| s > *best_s).unwrap_or(true) {
                    best = Some((s, perm));
                }
            }
        }
    }

    best.map(|(_, perm)| perm).unwrap_or_else(|| relations.to_vec())
}

fn with_missing_appended(pre_sorted: &[QN], relations: &[QN]) -> Vec<QN> {
    let mut order = pre_sorted.to_vec();
    for qn in relations {
        if !order.contains(qn) {
            order.push(qn.clone());
        }
    }
    order
}

/// Every outer `JoinPair`'s `left` must precede its `right` in `perm` — the
/// relative order of relations on opposite sides of an outer join is never
/// altered (P4).
fn respects_outer_order(perm: &[QN], join_pairs: &[JoinPair]) -> bool {
    for pair in join_pairs {
        if pair.kind.is_outer() {
            let pos_left = perm.iter().position(|qn| qn == &pair.left);
            let pos_right = perm.iter().position(|qn| qn == &pair.right);
            if let (Some(l), Some(r)) = (pos_left, pos_right) {
                if l > r {
                    return false;
                }
            }
        }
    }
    true
}

/// Count adjacent pairs directly joined (by `joinPairs` or by appearing
/// together in an explicit/implicit key-set); returns `None` if two
/// outer-join relations are adjacent with no direct pair connecting them.
fn adjacency_score(
    perm: &[QN],
    join_pairs: &[JoinPair],
    explicit_keys: &[RelationSet],
    implicit_keys: &[RelationSet],
    outer: &std::collections::HashSet<QN>,
) -> Option<usize> {
    let mut score = 0;
    for window in perm.windows(2) {
        let (a, b) = (&window[0], &window[1]);
        let directly_joined = of_relations(a, b, join_pairs, true).is_some();
        let key_set: RelationSet = [a.clone(), b.clone()].into_iter().collect();
        let in_key_sets = explicit_keys.contains(&key_set) || implicit_keys.contains(&key_set);

        if directly_joined || in_key_sets {
            score += 1;
        } else if outer.contains(a) && outer.contains(b) {
            return None;
        }
    }
    Some(score)
}

/// Start from the last relation of `pre_sorted` (or the lexicographically
/// first relation, if no prefix) and repeatedly append whichever unused
/// relation has a direct join pair to the current tail; ties broken
/// lexicographically, disconnected leftovers appended last.
fn greedy_nearest_neighbor(relations: &[QN], join_pairs: &[JoinPair], pre_sorted: &[QN]) -> Vec<QN> {
    let mut unused: Vec<QN> = relations.iter().filter(|qn| !pre_sorted.contains(qn)).cloned().collect();
    let mut order = pre_sorted.to_vec();
    let mut tail = order.last().cloned();

    if tail.is_none() {
        unused.sort();
        let first = unused.remove(0);
        tail = Some(first.clone());
        order.push(first);
    }

    while !unused.is_empty() {
        let current = tail.as_ref().unwrap();
        let next_idx = unused
            .iter()
            .enumerate()
            .filter(|(_, qn)| of_relations(current, qn, join_pairs, false).is_some())
            .min_by_key(|(_, qn)| (*qn).clone())
            .map(|(i, _)| i);

        let idx = match next_idx {
            Some(i) => i,
            None => {
                unused.sort();
                0
            }
        };
        let chosen = unused.remove(idx);
        tail = Some(chosen.clone());
        order.push(chosen);
    }
    order
}

/// Derive the presort prefix (§4.5): the distinct relations referenced by
/// `order_by`, in the order their first field reference appears.
pub fn presort_prefix(order_by: &crate::query_spec::OrderBy) -> Vec<QN> {
    let mut prefix = Vec::new();
    for item in order_by {
        for relation in crate::collector::RelationCollector::collect_ordered(&item.symbol) {
            if !prefix.contains(&relation) {
                prefix.push(relation);
            }
        }
    }
    prefix
}
