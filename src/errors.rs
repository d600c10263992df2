//! # Error Handling
//!
//! Every failure in this crate surfaces as one [`Error`] value returned to the caller.
//! Nothing is retried here: spec validation errors are raised before the query is
//! touched, and database faults are passed through untouched from Sea-ORM.
//!
//! Validation failures are logged at `debug` level when they are produced so a host
//! application with `tracing` enabled can see which spec was rejected:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt().with_target(false).compact().init();
//! ```

use sea_orm::DbErr;
use thiserror::Error;

use crate::core::RelationKind;

#[derive(Debug, Error)]
pub enum Error {
    /// No explicit model was set and the call is not hosted by a model.
    #[error("Cannot resolve the target model")]
    UnresolvedTarget,

    /// Relationship-scoped work against an unidentified record, or a mutation with
    /// no updatable target.
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// A condition spec has the wrong arity or the wrong value types.
    #[error("Malformed condition spec: {0}")]
    MalformedConditionSpec(String),

    /// An order spec is neither a column nor a single column/direction pair.
    #[error("Malformed order spec: {0}")]
    MalformedOrderSpec(String),

    /// Operator outside the allow-list.
    #[error("The operator [{0}] is not allowed")]
    InvalidFilterOperator(String),

    #[error("Order direction must be \"asc\" or \"desc\", got [{0}]")]
    InvalidOrderDirection(String),

    #[error("The relationship [{relationship}] of kind {kind:?} is unsupported here")]
    UnsupportedRelationshipKind {
        relationship: String,
        kind: RelationKind,
    },

    #[error("Model [{model}] has no relationship named [{relationship}]")]
    UnknownRelationship {
        model: &'static str,
        relationship: String,
    },

    #[error("Model [{model}] has no scope named [{scope}]")]
    UnknownScope { model: &'static str, scope: String },

    /// Mutation values that cannot be applied (non-numeric deltas, empty value sets).
    #[error("Invalid attribute: {0}")]
    InvalidAttribute(String),

    #[error("{0} not found")]
    RecordNotFound(String),

    /// sea-query refused to build a statement.
    #[error("Failed to build statement: {0}")]
    Statement(String),

    #[error(transparent)]
    Database(#[from] DbErr),
}

impl Error {
    /// Whether the error was raised while validating caller-supplied specs, i.e.
    /// before any query state changed.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MalformedConditionSpec(_)
                | Self::MalformedOrderSpec(_)
                | Self::InvalidFilterOperator(_)
                | Self::InvalidOrderDirection(_)
                | Self::UnsupportedRelationshipKind { .. }
                | Self::UnknownRelationship { .. }
                | Self::UnknownScope { .. }
        )
    }

    pub(crate) fn malformed_condition(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::debug!(error = %message, "Rejected condition spec");
        Self::MalformedConditionSpec(message)
    }

    pub(crate) fn malformed_order(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::debug!(error = %message, "Rejected order spec");
        Self::MalformedOrderSpec(message)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
