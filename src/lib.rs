//! # easymodel
//!
//! Describe searches, orderings and updates against Sea-ORM style entities with
//! plain specs (typed values or JSON arrays) instead of hand-chained builder calls.
//!
//! ```rust,ignore
//! use easymodel::{ConditionSpec, EasyModel, OrderSpec, RelationExistence};
//! use serde_json::json;
//!
//! let mut search = EasyModel::new();
//! search
//!     .set_model(&User)
//!     .add_wheres(ConditionSpec::list_from_json(&json!([["name", "Ann"], ["age", ">=", 18]]))?)?
//!     .add_where_has(vec![RelationExistence::parse("posts>=3")?])?
//!     .add_order_by(vec![OrderSpec::from_json(&json!("posts.created_at"))?])?;
//!
//! let sql = search.to_sql(sea_orm::DbBackend::Postgres)?;
//! ```

pub mod config;
pub mod core;
pub mod easy_model;
pub mod errors;
pub mod filtering;
pub mod operations;
pub mod query;

#[cfg(test)]
pub(crate) mod test_models;

pub use config::Config;
pub use crate::core::{
    Attributes, Model, ModelResolver, Pivot, Record, Relation, RelationKind, Subject, Target,
    attributes, truthy,
};
pub use easy_model::EasyModel;
pub use errors::{Error, Result};
pub use filtering::{
    ConditionSpec, Direction, ExistenceMode, JoinStep, Operator, OrderSpec, RelationExistence,
    RelationProperty,
};
pub use operations::{Fetched, MutationCoordinator, MutationTarget};
pub use query::{Connector, EntityQuery, QualifiedColumn, QueryContext};
