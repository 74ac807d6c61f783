//! Tree builder (§4.6): folds an ordered list of relations into a left-deep
//! binary join tree, distributing predicates to the earliest node at which
//! they become evaluable and rewriting symbol references as synthetic join
//! relations are introduced.

use crate::collector::RelationSet;
use crate::combinators;
use crate::errors::PlannerError;
use crate::join_pair::{self, JoinPair};
use crate::order_chooser;
use crate::query_spec::{OrderBy, QueriedRelation, QS};
use crate::replacer::FieldReplacer;
use crate::splitter::{self, SplitQuery};
use crate::symbol::{Field, Symbol, QN};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A node of the join tree: either a base relation, or a two-table join of
/// two further relations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Relation {
    Base(QueriedRelation),
    Join(Box<TwoTableJoin>),
}

impl Relation {
    pub fn name(&self) -> &QN {
        match self {
            Relation::Base(base) => &base.name,
            Relation::Join(join) => &join.name,
        }
    }

    pub fn qs(&self) -> &QS {
        match self {
            Relation::Base(base) => &base.qs,
            Relation::Join(join) => &join.qs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoTableJoin {
    pub qs: QS,
    pub left: Relation,
    pub right: Relation,
    pub remaining_order_by: Option<OrderBy>,
    pub pair: JoinPair,
    pub name: QN,
}

/// Input to the tree builder: the sources in their original (insertion)
/// order, the known direct join pairs, the root query spec, and whatever
/// `ORDER BY` fragment must still be applied once joining is done.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiSourceSelect {
    pub sources: IndexMap<QN, QueriedRelation>,
    pub join_pairs: Vec<JoinPair>,
    pub qs: QS,
    pub remaining_order_by: Option<OrderBy>,
}

/// Build the field replacer for absorbing `old_left`/`old_right` into
/// `new_name`: a field owned by either original relation is retargeted onto
/// the synthetic relation, with its column path prefixed by the original
/// owner's name so the composite stays uniquely addressable (§4.6 step 10).
fn absorbing_replacer(old_left: QN, old_right: QN, new_name: QN) -> FieldReplacer<'static> {
    FieldReplacer::new(move |field: &Field| {
        if field.relation == old_left || field.relation == old_right {
            let mut path = vec![field.relation.to_string()];
            path.extend(field.path.iter().cloned());
            Some(Symbol::Field(Field {
                relation: new_name.clone(),
                path,
            }))
        } else {
            None
        }
    })
}

/// Two-source fast path (§4.6 "Two-source fast path"): skip split/reorder
/// entirely and build a single `TwoTableJoin` directly from the two sources.
fn build_two_source_join(mss: MultiSourceSelect) -> Result<TwoTableJoin, PlannerError> {
    let mut names = mss.sources.keys().cloned();
    let left_name = names.next().ok_or(PlannerError::Disconnected("<none>".into()))?;
    let right_name = names
        .next()
        .ok_or_else(|| PlannerError::Disconnected(left_name.to_string()))?;

    let left = mss
        .sources
        .get(&left_name)
        .cloned()
        .ok_or_else(|| PlannerError::UnknownRelation(left_name.to_string()))?;
    let right = mss
        .sources
        .get(&right_name)
        .cloned()
        .ok_or_else(|| PlannerError::UnknownRelation(right_name.to_string()))?;

    let mut pairs = mss.join_pairs.clone();
    let pair = join_pair::of_relations_with_merged_conditions(&left_name, &right_name, &mut pairs, true)
        .unwrap_or_else(|| JoinPair::inner(left_name.clone(), right_name.clone(), None));

    let names_set: RelationSet = [left_name.clone(), right_name.clone()].into_iter().collect();
    let order_by_here = mss
        .remaining_order_by
        .as_ref()
        .filter(|ob| presort_relations(ob).iter().all(|qn| names_set.contains(qn)))
        .cloned();

    let mut left = left;
    let mut right = right;
    join_pair::remove_order_by_on_outer_relation(&mut left.qs, &mut right.qs, &pair);

    Ok(TwoTableJoin {
        name: QN::synthetic(&left_name, &right_name),
        qs: mss.qs,
        left: Relation::Base(left),
        right: Relation::Base(right),
        remaining_order_by: order_by_here,
        pair,
    })
}

fn presort_relations(order_by: &OrderBy) -> Vec<QN> {
    order_chooser::presort_prefix(order_by)
}

/// Build the left-deep join tree from an analyzed multi-source select
/// (§4.6). Requires `mss.sources.len() >= 2`.
pub fn build_two_table_join_tree(mss: MultiSourceSelect) -> Result<TwoTableJoin, PlannerError> {
    if mss.sources.len() < 2 {
        return Err(PlannerError::Disconnected(
            mss.sources
                .keys()
                .next()
                .map(|qn| qn.to_string())
                .unwrap_or_else(|| "<empty>".into()),
        ));
    }
    if mss.sources.len() == 2 {
        return build_two_source_join(mss);
    }

    let MultiSourceSelect {
        sources,
        join_pairs,
        mut qs,
        mut remaining_order_by,
    } = mss;

    // Preparation.
    let mut split_query: SplitQuery = if qs.where_clause.is_match_all() {
        SplitQuery::new()
    } else {
        splitter::split_conjunction(&qs.where_clause)
    };
    qs.where_clause = Symbol::match_all();

    let mut join_conditions_map: SplitQuery = SplitQuery::new();
    for pair in &join_pairs {
        if let Some(condition) = &pair.condition {
            let split = splitter::split_conjunction(condition);
            splitter::merge_into(&mut join_conditions_map, split);
        }
    }

    let relation_names: Vec<QN> = sources.keys().cloned().collect();
    let explicit_keys: Vec<RelationSet> = join_conditions_map.keys().cloned().collect();
    let implicit_keys: Vec<RelationSet> = split_query.keys().cloned().collect();
    let presort = remaining_order_by
        .as_ref()
        .map(|ob| order_chooser::presort_prefix(ob))
        .unwrap_or_default();

    let order = order_chooser::order_by_join_conditions(
        &relation_names,
        &explicit_keys,
        &implicit_keys,
        &join_pairs,
        &presort,
    );

    let mut order = order.into_iter();
    let first_name = order.next().ok_or(PlannerError::Disconnected("<empty>".into()))?;
    let mut left_relation = Relation::Base(
        sources
            .get(&first_name)
            .cloned()
            .ok_or_else(|| PlannerError::UnknownRelation(first_name.to_string()))?,
    );
    let mut left_name = first_name;
    let mut pairs = join_pairs;
    let remaining_names: Vec<QN> = order.collect();
    let n_joins = remaining_names.len();
    let mut non_literal_where: Vec<bool> = Vec::with_capacity(n_joins);

    let mut last_join: Option<TwoTableJoin> = None;

    for (i, right_name) in remaining_names.into_iter().enumerate() {
        let has_more = i + 1 < n_joins;
        let right_relation = Relation::Base(
            sources
                .get(&right_name)
                .cloned()
                .ok_or_else(|| PlannerError::UnknownRelation(right_name.to_string()))?,
        );
        let names: RelationSet = [left_name.clone(), right_name.clone()].into_iter().collect();

        let mut new_qs = qs.subset(&names, has_more);

        if let Some(fragment) = split_query.remove(&names) {
            new_qs.where_clause = fragment;
        }
        non_literal_where.push(new_qs.where_clause.is_non_literal());

        if has_more {
            for (key, fragment) in split_query.iter() {
                if key.contains(&left_name) || key.contains(&right_name) {
                    for output in outputs_needed_for(fragment) {
                        if !new_qs.outputs.contains(&output) {
                            new_qs.outputs.push(output);
                        }
                    }
                }
            }
        }

        if let Some(ob) = &remaining_order_by {
            let ob_relations: RelationSet = presort_relations(ob).into_iter().collect();
            if ob_relations.is_subset(&names) {
                new_qs.order_by = Some(ob.clone());
                remaining_order_by = None;
            }
        }

        // Only the pair's kind/direction is taken from the registry here —
        // its condition is discarded and rebuilt below from
        // `join_conditions_map`, which already holds every `ON` fragment
        // (including this pair's own) keyed by referenced relations.
        let mut pair = join_pair::of_relations_with_merged_conditions(&left_name, &right_name, &mut pairs, true)
            .unwrap_or_else(|| JoinPair::inner(left_name.clone(), right_name.clone(), None));
        pair.condition = None;

        let applicable_keys: Vec<RelationSet> = join_conditions_map
            .keys()
            .filter(|key| key.is_subset(&names))
            .cloned()
            .collect();
        let collected_conditions: Vec<Symbol> = applicable_keys
            .into_iter()
            .filter_map(|key| join_conditions_map.remove(&key))
            .collect();
        if !collected_conditions.is_empty() {
            pair.condition = combinators::and(collected_conditions);
        }

        let (mut left_qs, mut right_qs) = (left_relation.qs().clone(), right_relation.qs().clone());
        join_pair::remove_order_by_on_outer_relation(&mut left_qs, &mut right_qs, &pair);
        apply_qs_override(&mut left_relation, left_qs);
        let mut right_relation = right_relation;
        apply_qs_override(&mut right_relation, right_qs);

        let synthetic_name = QN::synthetic(&left_name, &right_name);
        let join = TwoTableJoin {
            name: synthetic_name.clone(),
            qs: new_qs,
            left: left_relation,
            right: right_relation,
            remaining_order_by: None,
            pair,
        };

        if has_more {
            let replacer = absorbing_replacer(left_name.clone(), right_name.clone(), synthetic_name.clone());
            split_query = splitter::rewrite_keys(split_query, &left_name, &right_name, &synthetic_name, &replacer);
            join_conditions_map =
                splitter::rewrite_keys(join_conditions_map, &left_name, &right_name, &synthetic_name, &replacer);
            join_pair::rewrite_names(&left_name, &right_name, &synthetic_name, &replacer, &mut pairs);
            if let Some(ob) = &remaining_order_by {
                remaining_order_by = Some(
                    ob.iter()
                        .map(|item| crate::query_spec::OrderByItem {
                            symbol: replacer.apply_idempotent(&item.symbol),
                            direction: item.direction,
                            nulls: item.nulls,
                        })
                        .collect(),
                );
            }
            qs = qs.copy_and_replace(&replacer);

            left_relation = Relation::Join(Box::new(join));
            left_name = synthetic_name;
        } else {
            last_join = Some(join);
        }
    }

    let mut root = last_join.ok_or_else(|| PlannerError::Disconnected(left_name.to_string()))?;

    // Finalization: any split-query fragments left over attach at the root.
    if !split_query.is_empty() {
        let remaining_fragments: Vec<Symbol> = split_query.into_values().collect();
        let combined = combinators::and(remaining_fragments).expect("non-empty fragment list");
        root.qs.where_clause = if root.qs.where_clause.is_match_all() {
            combined
        } else {
            combinators::and(vec![root.qs.where_clause, combined]).expect("non-empty operand list")
        };
        non_literal_where[n_joins - 1] = root.qs.where_clause.is_non_literal();
    }

    clear_limits_below_last_filter(&mut root, &non_literal_where);

    Ok(root)
}

fn apply_qs_override(relation: &mut Relation, qs: QS) {
    match relation {
        Relation::Base(base) => base.qs = qs,
        Relation::Join(join) => join.qs = qs,
    }
}

/// `Field`s referenced by a split-query fragment that must survive in an
/// intermediate node's outputs so an ancestor join can still evaluate it.
fn outputs_needed_for(fragment: &Symbol) -> Vec<Symbol> {
    struct FieldSymbols(Vec<Symbol>);
    impl crate::visitor::SymbolVisitor for FieldSymbols {
        type Output = ();
        fn visit_field(&mut self, field: &Field) {
            self.0.push(Symbol::Field(field.clone()));
        }
    }
    let mut collector = FieldSymbols(Vec::new());
    crate::visitor::walk_symbol(fragment, &mut collector);
    collector.0
}

/// Finalization (§4.6): clear `LIMIT` on every join node built before the
/// last one (scanning from the root backward) whose `WHERE` is non-literal.
/// `flags[i]` records whether the join built at fold step `i` carries a
/// non-literal `WHERE`; step `n-1` is the root.
fn clear_limits_below_last_filter(root: &mut TwoTableJoin, flags: &[bool]) {
    let cutoff = match flags.iter().rposition(|&f| f) {
        Some(i) => i,
        None => return,
    };
    let last_index = flags.len() - 1;
    clear_from(root, last_index, cutoff);
}

fn clear_from(join: &mut TwoTableJoin, index: usize, cutoff: usize) {
    if index < cutoff {
        join.qs.limit = None;
    }
    if index > 0 {
        if let Relation::Join(inner) = &mut join.left {
            clear_from(inner, index - 1, cutoff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join_pair::JoinKind;
    use crate::query_spec::{NullsOrder, OrderByItem, SortDirection};

    fn qr(name: &str, outputs: Vec<Symbol>) -> QueriedRelation {
        QueriedRelation {
            name: QN::from(name),
            qs: QS::new(outputs),
        }
    }

    fn sources(entries: Vec<(&str, QueriedRelation)>) -> IndexMap<QN, QueriedRelation> {
        entries.into_iter().map(|(n, r)| (QN::from(n), r)).collect()
    }

    #[test]
    fn scenario_1_three_way_inner_chain_with_order_by() {
        let sources = sources(vec![
            ("t1", qr("t1", vec![Symbol::field("t1", "a")])),
            ("t2", qr("t2", vec![Symbol::field("t2", "b")])),
            ("t3", qr("t3", vec![Symbol::field("t3", "c")])),
        ]);
        let join_pairs = vec![
            JoinPair::inner(
                QN::from("t1"),
                QN::from("t2"),
                Some(Symbol::field("t1", "a").eq(Symbol::field("t2", "b"))),
            ),
            JoinPair::inner(
                QN::from("t2"),
                QN::from("t3"),
                Some(Symbol::field("t2", "b").eq(Symbol::field("t3", "c"))),
            ),
        ];
        let mut qs = QS::new(vec![
            Symbol::field("t1", "a"),
            Symbol::field("t2", "b"),
            Symbol::field("t3", "c"),
        ]);
        qs.order_by = Some(vec![
            OrderByItem { symbol: Symbol::field("t1", "a"), direction: SortDirection::Asc, nulls: None },
            OrderByItem { symbol: Symbol::field("t2", "b"), direction: SortDirection::Asc, nulls: None },
            OrderByItem { symbol: Symbol::field("t3", "c"), direction: SortDirection::Asc, nulls: None },
        ]);
        let remaining_order_by = qs.order_by.clone();

        let mss = MultiSourceSelect {
            sources,
            join_pairs,
            qs,
            remaining_order_by,
        };

        let root = build_two_table_join_tree(mss).unwrap();
        assert_eq!(root.name, QN::from("join.join.t1.t2.t3"));
    }

    #[test]
    fn scenario_5_left_join_clears_right_child_order_by() {
        let sources = sources(vec![
            ("t1", qr("t1", vec![Symbol::field("t1", "a")])),
            ("t2", qr("t2", vec![Symbol::field("t2", "b")])),
        ]);
        let join_pairs = vec![JoinPair {
            left: QN::from("t1"),
            right: QN::from("t2"),
            kind: JoinKind::Left,
            condition: Some(Symbol::field("t1", "a").eq(Symbol::field("t2", "b"))),
        }];
        let mut qs = QS::new(vec![Symbol::field("t1", "a"), Symbol::field("t2", "b")]);
        qs.order_by = Some(vec![OrderByItem {
            symbol: Symbol::field("t2", "b"),
            direction: SortDirection::Asc,
            nulls: None,
        }]);
        let remaining_order_by = qs.order_by.clone();

        let mss = MultiSourceSelect {
            sources,
            join_pairs,
            qs,
            remaining_order_by,
        };
        let root = build_two_table_join_tree(mss).unwrap();
        assert!(root.right.qs().order_by.is_none());
        assert!(root.qs.order_by.is_some());
        let _ = NullsOrder::First;
    }
}
