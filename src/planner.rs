//! Planner entry (§2.7 / §4.7 / §6): validates an analyzed multi-source
//! select, rejects unsupported shapes, and delegates to the tree builder.

use crate::errors::ValidationError;
use crate::query_spec::QS;
use crate::symbol::{FunctionCall, Op, Symbol};
use crate::tree::{self, MultiSourceSelect, TwoTableJoin};
use log::trace;

/// Whether the planner should ever hand a query back to the fetch layer for
/// a second pass. The core never sets this to anything but `Never` itself —
/// a fetch-rewrite collaborator may request `Deferred` through `ConsumerContext`,
/// but the planner never originates that request (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Never,
    Deferred,
}

/// A lighter top-level projection a fetch-rewrite collaborator may offer in
/// place of the original output list, producing the two-phase "query then
/// fetch" shape described in §4.7. Optional and pluggable: the core planner
/// only consumes what `ConsumerContext::rewrite_for_fetch` returns.
#[derive(Debug, Clone)]
pub struct FetchRewrite {
    pub projection: QS,
}

/// The planner's result: either the join tree alone, or the join tree paired
/// with a fetch-rewrite projection to run afterward.
#[derive(Debug, Clone)]
pub enum Plan {
    Join(TwoTableJoin),
    QueryThenFetch { join: TwoTableJoin, fetch: FetchRewrite },
}

/// Collaborator contract the planner consumes but never constructs (§6).
/// `rewrite_for_fetch` is the optional, pluggable fetch-rewrite pass; a
/// context with no opinion returns `None` and the core emits the join tree
/// directly.
pub trait ConsumerContext {
    fn rewrite_for_fetch(&self, join: &TwoTableJoin) -> Option<FetchRewrite> {
        let _ = join;
        None
    }

    fn fetch_mode(&self) -> FetchMode {
        FetchMode::Never
    }

    fn validation_exception(&self, err: &ValidationError) {
        let _ = err;
    }
}

/// A `ConsumerContext` with no fetch-rewrite opinion and a no-op validation
/// sink, for callers (tests, the CLI) that only want the join tree.
pub struct NullConsumerContext;

impl ConsumerContext for NullConsumerContext {}

/// Reject a multi-source select carrying `GROUP BY` or a top-level aggregate
/// (§4.7, §7): these are unsupported features, not planner bugs, and must be
/// reported through the validation sink rather than panicking.
fn validate(outputs: &[Symbol], group_by: &Option<Vec<Symbol>>) -> Result<(), ValidationError> {
    if group_by.is_some() {
        return Err(ValidationError::GroupByNotSupported);
    }
    for output in outputs {
        if let Some(name) = first_aggregate(output) {
            return Err(ValidationError::AggregateNotSupported(name));
        }
    }
    Ok(())
}

fn first_aggregate(symbol: &Symbol) -> Option<String> {
    match symbol {
        Symbol::FunctionCall(FunctionCall { op, args }) => {
            if let Op::Custom(name) = op {
                if is_aggregate_name(name) {
                    return Some(name.clone());
                }
            }
            args.iter().find_map(first_aggregate)
        }
        Symbol::Field(_) | Symbol::Literal(_) => None,
    }
}

fn is_aggregate_name(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "count" | "sum" | "avg" | "min" | "max"
    )
}

/// `plan(mss, ctx)` (§6): validate, build the join tree, and optionally fold
/// in a fetch-rewrite's lighter projection. `group_by` is threaded in
/// separately from `mss.qs` since `QS` as specified in §3 carries no
/// `GROUP BY` field of its own — grouping is a property of the surrounding
/// analyzed statement, not of an individual query spec.
pub fn plan(
    mss: MultiSourceSelect,
    group_by: Option<Vec<Symbol>>,
    ctx: &dyn ConsumerContext,
) -> Result<Plan, ValidationError> {
    if mss.sources.len() < 2 {
        let err = match mss.sources.keys().next() {
            None => ValidationError::NoSources,
            Some(only) => ValidationError::SingleSource(only.to_string()),
        };
        ctx.validation_exception(&err);
        return Err(err);
    }

    if let Err(err) = validate(&mss.qs.outputs, &group_by) {
        ctx.validation_exception(&err);
        return Err(err);
    }

    trace!(
        "plan: {} source(s) in input order {:?}",
        mss.sources.len(),
        mss.sources.keys().collect::<Vec<_>>()
    );

    let join = tree::build_two_table_join_tree(mss).expect("at least two sources already validated");

    trace!("plan: root relation name {}", join.name);

    match ctx.rewrite_for_fetch(&join) {
        Some(fetch) => Ok(Plan::QueryThenFetch { join, fetch }),
        None => Ok(Plan::Join(join)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join_pair::JoinPair;
    use crate::query_spec::QueriedRelation;
    use crate::symbol::QN;
    use indexmap::IndexMap;

    fn qr(name: &str) -> QueriedRelation {
        QueriedRelation {
            name: QN::from(name),
            qs: QS::new(vec![Symbol::field(name, "a")]),
        }
    }

    fn two_source_mss() -> MultiSourceSelect {
        let mut sources = IndexMap::new();
        sources.insert(QN::from("t1"), qr("t1"));
        sources.insert(QN::from("t2"), qr("t2"));
        MultiSourceSelect {
            sources,
            join_pairs: vec![JoinPair::inner(
                QN::from("t1"),
                QN::from("t2"),
                Some(Symbol::field("t1", "a").eq(Symbol::field("t2", "a"))),
            )],
            qs: QS::new(vec![Symbol::field("t1", "a"), Symbol::field("t2", "a")]),
            remaining_order_by: None,
        }
    }

    #[test]
    fn rejects_group_by() {
        let err = plan(two_source_mss(), Some(vec![Symbol::field("t1", "a")]), &NullConsumerContext).unwrap_err();
        assert_eq!(err, ValidationError::GroupByNotSupported);
        assert_eq!(err.to_string(), "GROUP BY on JOINS is not supported");
    }

    #[test]
    fn rejects_top_level_aggregate() {
        let mut mss = two_source_mss();
        mss.qs.outputs = vec![Symbol::FunctionCall(FunctionCall {
            op: Op::Custom("count".into()),
            args: vec![Symbol::field("t1", "a")],
        })];
        let err = plan(mss, None, &NullConsumerContext).unwrap_err();
        assert_eq!(err, ValidationError::AggregateNotSupported("count".into()));
        assert_eq!(err.to_string(), "AGGREGATIONS on JOINS are not supported");
    }

    #[test]
    fn rejects_empty_sources() {
        let mut mss = two_source_mss();
        mss.sources.clear();
        let err = plan(mss, None, &NullConsumerContext).unwrap_err();
        assert_eq!(err, ValidationError::NoSources);
    }

    #[test]
    fn rejects_single_source() {
        let mut mss = two_source_mss();
        mss.sources.shift_remove(&QN::from("t2"));
        mss.join_pairs.clear();
        let err = plan(mss, None, &NullConsumerContext).unwrap_err();
        assert_eq!(err, ValidationError::SingleSource("t1".into()));
    }

    #[test]
    fn emits_join_tree_when_well_formed() {
        let plan_result = plan(two_source_mss(), None, &NullConsumerContext).unwrap();
        match plan_result {
            Plan::Join(join) => assert_eq!(join.name, QN::from("join.t1.t2")),
            Plan::QueryThenFetch { .. } => panic!("expected plain join, no fetch-rewrite was offered"),
        }
    }

    struct RewritingContext;
    impl ConsumerContext for RewritingContext {
        fn rewrite_for_fetch(&self, join: &TwoTableJoin) -> Option<FetchRewrite> {
            Some(FetchRewrite {
                projection: QS::new(vec![Symbol::field(join.name.to_string(), "a")]),
            })
        }
    }

    #[test]
    fn honors_fetch_rewrite_when_offered() {
        let plan_result = plan(two_source_mss(), None, &RewritingContext).unwrap();
        assert!(matches!(plan_result, Plan::QueryThenFetch { .. }));
    }
}
