//! Join-pair registry (§2.4 / §4.4): the abstract description of a direct
//! join between two relations, plus the lookup/merge/rewrite operations the
//! tree builder drives the fold with.

use crate::query_spec::QS;
use crate::replacer::FieldReplacer;
use crate::symbol::QN;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    /// Non-inner, non-cross kinds are outer joins — relations on their
    /// nullable side may not be reordered across (P4) and lose any `ORDER BY`
    /// they carried, since nulls are introduced post-ordering (§4.4).
    pub fn is_outer(&self) -> bool {
        matches!(self, JoinKind::Left | JoinKind::Right | JoinKind::Full)
    }
}

/// A direct join between two relations. Directional: `left`/`right` matter
/// for outer kinds (a `LEFT` join's nullable side is its `right`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinPair {
    pub left: QN,
    pub right: QN,
    pub kind: JoinKind,
    pub condition: Option<crate::symbol::Symbol>,
}

impl JoinPair {
    pub fn inner(left: QN, right: QN, condition: Option<crate::symbol::Symbol>) -> Self {
        JoinPair {
            left,
            right,
            kind: JoinKind::Inner,
            condition,
        }
    }

    fn connects(&self, a: &QN, b: &QN, exact: bool) -> bool {
        if exact {
            (&self.left == a && &self.right == b) || (&self.left == b && &self.right == a)
        } else {
            &self.left == a && &self.right == b
        }
    }
}

/// Find the first pair whose `{left, right}` matches `{a, b}`. When `exact`
/// is `false`, only the single direction `left == a && right == b` is
/// accepted (unlike `exact`, which also matches the reverse pairing) — used
/// by the greedy nearest-neighbor fallback (§9) to test whether `b` can
/// directly follow `a` in the chosen order.
pub fn of_relations<'a>(a: &QN, b: &QN, pairs: &'a [JoinPair], exact: bool) -> Option<&'a JoinPair> {
    pairs.iter().find(|p| p.connects(a, b, exact))
}

/// As `of_relations`, but if multiple pairs connect `{a, b}` their conditions
/// are merged with `AND`; when `remove` is set, all matched pairs are removed
/// from `pairs` and the merged pair is returned (not re-inserted — the
/// caller owns placement of the result).
pub fn of_relations_with_merged_conditions(
    a: &QN,
    b: &QN,
    pairs: &mut Vec<JoinPair>,
    remove: bool,
) -> Option<JoinPair> {
    let matches: Vec<usize> = pairs
        .iter()
        .enumerate()
        .filter(|(_, p)| p.connects(a, b, true))
        .map(|(i, _)| i)
        .collect();

    if matches.is_empty() {
        return None;
    }

    let mut merged = pairs[matches[0]].clone();
    let mut conditions: Vec<_> = matches
        .iter()
        .filter_map(|&i| pairs[i].condition.clone())
        .collect();
    merged.condition = crate::combinators::and(std::mem::take(&mut conditions));

    if remove {
        for &i in matches.iter().rev() {
            pairs.remove(i);
        }
    }

    Some(merged)
}

/// The set of all relations appearing on either side of any non-inner,
/// non-cross pair — reordering is never allowed across these (P4).
pub fn outer_join_relations(pairs: &[JoinPair]) -> HashSet<QN> {
    let mut set = HashSet::new();
    for pair in pairs {
        if pair.kind.is_outer() {
            set.insert(pair.left.clone());
            set.insert(pair.right.clone());
        }
    }
    set
}

/// For outer joins, clear any `ORDER BY` on the nullable side's `QS` — nulls
/// are introduced by the join itself, after whatever ordering the child
/// established, so a child-level sort there would be meaningless. The
/// cleared ordering must be re-applied above the join by the caller.
pub fn remove_order_by_on_outer_relation(left_qs: &mut QS, right_qs: &mut QS, pair: &JoinPair) {
    match pair.kind {
        JoinKind::Left => right_qs.order_by = None,
        JoinKind::Right => left_qs.order_by = None,
        JoinKind::Full => {
            left_qs.order_by = None;
            right_qs.order_by = None;
        }
        JoinKind::Inner | JoinKind::Cross => {}
    }
}

/// Apply `replacer` to every pair's condition, and rewrite any pair endpoint
/// equal to `old_left` or `old_right` to `new_name` — used once a synthetic
/// join absorbs two relations, so later pairs referencing either original
/// name still resolve.
pub fn rewrite_names(
    old_left: &QN,
    old_right: &QN,
    new_name: &QN,
    replacer: &FieldReplacer,
    pairs: &mut [JoinPair],
) {
    for pair in pairs.iter_mut() {
        if &pair.left == old_left || &pair.left == old_right {
            pair.left = new_name.clone();
        }
        if &pair.right == old_left || &pair.right == old_right {
            pair.right = new_name.clone();
        }
        pair.condition = pair.condition.as_ref().map(|c| replacer.apply_idempotent(c));
    }
}
