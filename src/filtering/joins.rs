//! Join planning for dotted relationship paths such as `posts.comments.created_at`.

use crate::core::{Model, RelationKind};
use crate::errors::{Error, Result};
use crate::query::QualifiedColumn;

/// One `INNER JOIN table ON first = second`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinStep {
    /// Table being joined
    pub table: String,
    pub first: QualifiedColumn,
    pub second: QualifiedColumn,
}

/// Walk `segments` (every hop but the last is a relationship name, the last is a
/// column) from `start`, returning one join per hop and the column qualified by
/// the last model reached.
///
/// Owned relationships join `parent.owner_key = child.foreign_key`; belongs-to
/// relationships swap roles and join `related.owner_key = current.foreign_key`.
///
/// # Errors
///
/// [`Error::UnknownRelationship`] for undeclared hops,
/// [`Error::UnsupportedRelationshipKind`] for through-relationships and
/// self-referential hops, and
/// [`Error::MalformedOrderSpec`] when the path is shorter than two segments or has
/// empty segments.
pub fn plan(start: &'static dyn Model, segments: &[&str]) -> Result<(Vec<JoinStep>, QualifiedColumn)> {
    let Some((column, hops)) = segments.split_last() else {
        return Err(Error::malformed_order("empty relationship path"));
    };
    if hops.is_empty() || segments.iter().any(|s| s.trim().is_empty()) {
        return Err(Error::malformed_order(format!(
            "[{}] is not a relationship path",
            segments.join(".")
        )));
    }

    let mut current = start;
    let mut steps = Vec::with_capacity(hops.len());
    for hop in hops {
        let relation = current.require_relation(hop)?;
        let related = relation.related;
        let foreign_key = relation.foreign_key(current);
        let owner_key = relation.owner_key(current);

        let unsupported = || Error::UnsupportedRelationshipKind {
            relationship: relation.name.to_string(),
            kind: relation.kind,
        };
        // Joined tables are not aliased, so a table cannot be joined onto itself.
        if related.table_name() == current.table_name() {
            return Err(unsupported());
        }
        let step = match relation.kind {
            RelationKind::OwnedOne | RelationKind::OwnedMany => JoinStep {
                table: related.table_name().to_string(),
                first: QualifiedColumn::new(current.table_name(), owner_key),
                second: QualifiedColumn::new(related.table_name(), foreign_key),
            },
            RelationKind::BelongsToOne | RelationKind::BelongsToMany => JoinStep {
                table: related.table_name().to_string(),
                first: QualifiedColumn::new(related.table_name(), owner_key),
                second: QualifiedColumn::new(current.table_name(), foreign_key),
            },
            RelationKind::Through => return Err(unsupported()),
        };
        tracing::debug!(
            relationship = relation.name,
            kind = ?relation.kind,
            join = %step.table,
            "Planned join"
        );
        steps.push(step);
        current = related;
    }

    Ok((steps, QualifiedColumn::new(current.table_name(), column.trim())))
}
