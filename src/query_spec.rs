//! Query specification (§3): the per-relation and per-join-step bundle of
//! projected outputs, residual predicate, ordering and limit that the tree
//! builder threads through the fold.

use crate::collector::{RelationCollector, RelationSet};
use crate::combinators;
use crate::replacer::FieldReplacer;
use crate::symbol::{QN, Symbol};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullsOrder {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByItem {
    pub symbol: Symbol,
    pub direction: SortDirection,
    pub nulls: Option<NullsOrder>,
}

pub type OrderBy = Vec<OrderByItem>;

/// A single relation as it appears in the `FROM`/source list, paired with the
/// query-spec fragment that applies once that relation alone is available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueriedRelation {
    pub name: QN,
    pub qs: QS,
}

/// Per-node query spec: what this node (a base relation or a join) projects,
/// what residual predicate still applies to it, and what ordering/limit it
/// carries. `where_clause` defaults to `MATCH_ALL` — "nothing left to filter
/// at this node".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QS {
    pub outputs: Vec<Symbol>,
    #[serde(default = "Symbol::match_all")]
    pub where_clause: Symbol,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u64>,
}

impl Default for QS {
    fn default() -> Self {
        QS {
            outputs: Vec::new(),
            where_clause: Symbol::match_all(),
            order_by: None,
            limit: None,
        }
    }
}

impl QS {
    pub fn new(outputs: Vec<Symbol>) -> Self {
        QS {
            outputs,
            ..QS::default()
        }
    }

    /// Keep only outputs and `ORDER BY` items whose referenced relations are
    /// a subset of `names`; `where_clause` resets to `MATCH_ALL` (the tree
    /// builder attaches split-query fragments explicitly afterward), and
    /// when `is_intermediate`, `ORDER BY`/`LIMIT` are cleared — an
    /// intermediate node's own sort/limit have no meaning once it only ever
    /// feeds a further join (§4.6 Fold step 2).
    pub fn subset(&self, names: &RelationSet, is_intermediate: bool) -> QS {
        let covered = |symbol: &Symbol| RelationCollector::collect(symbol).is_subset(names);
        QS {
            outputs: self.outputs.iter().filter(|o| covered(o)).cloned().collect(),
            where_clause: Symbol::match_all(),
            order_by: if is_intermediate {
                None
            } else {
                self.order_by.clone().map(|items| {
                    items.into_iter().filter(|item| covered(&item.symbol)).collect()
                })
            },
            limit: if is_intermediate { None } else { self.limit },
        }
    }

    /// Rewrite every `Symbol` held by this spec (outputs, `where_clause`,
    /// `ORDER BY` expressions) through `replacer`, used after a synthetic join
    /// absorbs the relations this spec used to reference directly.
    pub fn copy_and_replace(&self, replacer: &FieldReplacer) -> QS {
        QS {
            outputs: self.outputs.iter().map(|s| replacer.apply_idempotent(s)).collect(),
            where_clause: replacer.apply_idempotent(&self.where_clause),
            order_by: self.order_by.as_ref().map(|items| {
                items
                    .iter()
                    .map(|item| OrderByItem {
                        symbol: replacer.apply_idempotent(&item.symbol),
                        direction: item.direction,
                        nulls: item.nulls,
                    })
                    .collect()
            }),
            limit: self.limit,
        }
    }

    /// AND an additional predicate fragment into this spec's `where_clause`.
    pub fn and_where(&mut self, fragment: Symbol) {
        let current = std::mem::replace(&mut self.where_clause, Symbol::match_all());
        self.where_clause = if current.is_match_all() {
            fragment
        } else {
            combinators::and(vec![current, fragment]).expect("non-empty operand list")
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_where_clause_is_match_all() {
        let qs = QS::default();
        assert!(qs.where_clause.is_match_all());
    }

    #[test]
    fn subset_clears_order_and_limit_when_intermediate() {
        let mut qs = QS::new(vec![Symbol::field("t1", "a"), Symbol::field("t2", "b")]);
        qs.order_by = Some(vec![OrderByItem {
            symbol: Symbol::field("t1", "a"),
            direction: SortDirection::Asc,
            nulls: None,
        }]);
        qs.limit = Some(10);

        let names: RelationSet = vec![QN::from("t1")].into_iter().collect();

        let intermediate = qs.subset(&names, true);
        assert_eq!(intermediate.outputs, vec![Symbol::field("t1", "a")]);
        assert!(intermediate.order_by.is_none());
        assert!(intermediate.limit.is_none());

        let leaf = qs.subset(&names, false);
        assert!(leaf.order_by.is_some());
        assert_eq!(leaf.limit, Some(10));
    }

    #[test]
    fn and_where_combines_with_existing_predicate() {
        let mut qs = QS::default();
        qs.and_where(Symbol::field("t1", "a").eq(Symbol::field("t2", "b")));
        assert!(!qs.where_clause.is_match_all());
        qs.and_where(Symbol::field("t1", "c").eq(Symbol::field("t2", "d")));
        match qs.where_clause {
            Symbol::FunctionCall(call) => assert_eq!(call.op, crate::symbol::Op::And),
            other => panic!("expected AND, got {:?}", other),
        }
    }
}
