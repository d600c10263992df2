//! # Query assembly
//!
//! [`EntityQuery`] is the entity-aware builder every translator writes into. It keeps
//! the model, the row source, predicates in call order, joins and orders, and only
//! renders a sea-query [`SelectStatement`](sea_orm::sea_query::SelectStatement) when
//! asked. [`QueryContext`] carries one of these across a chain of calls.

pub mod builder;
pub mod context;
pub(crate) mod relation;

pub use builder::{Connector, EntityQuery, QualifiedColumn};
pub use context::QueryContext;
