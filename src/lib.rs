//! Multi-table join planner: chooses a relation ordering that maximizes
//! adjacent join-predicate push-down and folds it into a left-deep binary
//! join tree, distributing `WHERE`/`ON` predicates to the earliest node at
//! which they become evaluable and rewriting symbol references as synthetic
//! join relations are introduced.
//!
//! SQL parsing, statement analysis, storage access and physical execution
//! are all out of scope here — this crate consumes an already-analyzed
//! multi-source select and hands back a join tree for downstream planning.

pub mod collector;
pub mod combinators;
pub mod errors;
pub mod join_pair;
pub mod order_chooser;
pub mod planner;
pub mod query_spec;
pub mod replacer;
pub mod splitter;
pub mod symbol;
pub mod tree;
pub mod visitor;

pub use errors::{PlannerError, ValidationError};
pub use planner::{plan, ConsumerContext, FetchMode, FetchRewrite, NullConsumerContext, Plan};
pub use tree::{build_two_table_join_tree, MultiSourceSelect, Relation, TwoTableJoin};
