//! # Filtering & Ordering
//!
//! Translators from caller-supplied specs to predicates, joins and orders on an
//! [`EntityQuery`](crate::query::EntityQuery).
//!
//! ## Condition specs
//!
//! ```rust,ignore
//! // flat: ["column", value] or ["column", "operator", value]
//! ConditionSpec::list_from_json(&json!([["name", "Ann"], ["age", ">=", 18]]))?;
//!
//! // grouped: nested lists take the caller's connector, {"or": [...]} sets its own
//! ConditionSpec::list_from_json(&json!([{"or": [["age", "<", 18], ["age", ">", 60]]}]))?;
//!
//! // relationship counts: "posts" means posts>=1
//! RelationExistence::from_json(&json!({"posts>=3": null, "roles": [["name", "admin"]]}))?;
//!
//! // relationship properties
//! RelationProperty::from_json(&json!([["posts", "views", ">", 100]]))?;
//! ```
//!
//! Allowed operators: `=, !=, >, <, >=, <=, like, not like, ilike, not ilike, rlike, not rlike`.
//!
//! ## Order specs
//!
//! `"title"` sorts the target's own column, `"posts.created_at"` joins through the
//! `posts` relationship first, `{"title": "desc"}` sets a direction.

pub mod conditions;
pub mod joins;
pub mod operators;
pub mod sort;

// Re-export commonly used items
pub use conditions::{
    ConditionSpec, Constraint, ExistenceMode, RelationExistence, RelationProperty,
    add_flat_conditions, add_relation_existence, add_relation_property,
};
pub use joins::{JoinStep, plan};
pub use operators::{Operator, parse_count_suffix, strip_count_suffix};
pub use sort::{Direction, OrderSpec, add_order};
