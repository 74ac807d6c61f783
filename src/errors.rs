//! Error types (§6), modeled on the teacher's one-`errors.rs`-per-module
//! convention (`logical_expr::errors`, `plan_ctx::errors`, `optimizer::errors`):
//! a user-facing validation error distinct from an internal invariant
//! violation, both derived with `thiserror`.

use thiserror::Error;

/// Rejects a query the planner will not attempt to plan — the caller should
/// surface this to whoever issued the query, not retry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("GROUP BY on JOINS is not supported")]
    GroupByNotSupported,

    #[error("AGGREGATIONS on JOINS are not supported")]
    AggregateNotSupported(String),

    #[error("correlated subquery referencing `{0}` is not supported by this join planner")]
    CorrelatedSubqueryNotSupported(String),

    #[error("query has no sources to join")]
    NoSources,

    #[error("a multi-source join requires at least two relations; only `{0}` was given")]
    SingleSource(String),
}

/// An internal invariant was violated — this indicates a bug in the planner
/// itself rather than a malformed query, and should never surface from a
/// well-formed `MultiSourceSelect`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlannerError {
    #[error("no join pair connects relation `{0}` to the relations joined so far")]
    Disconnected(String),

    #[error("relation order chosen by the order chooser references unknown relation `{0}`")]
    UnknownRelation(String),

    #[error("join pair references outer-joined relation `{0}` that was already consumed")]
    OuterJoinReused(String),
}
