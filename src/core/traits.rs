use std::fmt;

use crate::errors::{Error, Result};
use crate::query::EntityQuery;

/// Table-level metadata for an entity, supplied by the host application.
///
/// Implementations are usually unit structs referenced as `&'static dyn Model`:
///
/// ```rust,ignore
/// #[derive(Debug)]
/// pub struct User;
///
/// impl Model for User {
///     fn name(&self) -> &'static str { "user" }
///     fn table_name(&self) -> &'static str { "users" }
///     fn relation(&self, name: &str) -> Option<Relation> {
///         match name {
///             "posts" => Some(Relation::has_many("posts", &Post)),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Model: fmt::Debug + Send + Sync {
    /// Singular snake-case name, used to derive foreign keys (`user` -> `user_id`).
    fn name(&self) -> &'static str;

    fn table_name(&self) -> &'static str;

    fn primary_key(&self) -> &'static str {
        "id"
    }

    /// Column other tables use to point at this one.
    fn foreign_key(&self) -> String {
        format!("{}_{}", self.name(), self.primary_key())
    }

    /// Declared relationship by name.
    fn relation(&self, name: &str) -> Option<Relation> {
        let _ = name;
        None
    }

    /// Audit column touched by bulk increments when the policy asks for it.
    fn updated_at_column(&self) -> Option<&'static str> {
        None
    }

    /// Apply a named local scope to the query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownScope`] unless the model overrides this method for `name`.
    fn scope(&self, name: &str, query: &mut EntityQuery) -> Result<()> {
        let _ = query;
        Err(Error::UnknownScope {
            model: self.name(),
            scope: name.to_string(),
        })
    }

    /// Same as [`Model::relation`], failing for undeclared names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRelationship`] when `name` is not declared.
    fn require_relation(&self, name: &str) -> Result<Relation> {
        self.relation(name).ok_or_else(|| Error::UnknownRelationship {
            model: self.name(),
            relationship: name.to_string(),
        })
    }
}

/// Cardinality and ownership of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// The related table holds this model's foreign key, at most one row.
    OwnedOne,
    /// The related table holds this model's foreign key, any number of rows.
    OwnedMany,
    /// This table holds the related model's foreign key.
    BelongsToOne,
    /// Linked through a pivot table.
    BelongsToMany,
    /// Reached through an intermediate model (has-one/has-many-through).
    Through,
}

impl RelationKind {
    #[must_use]
    pub const fn is_owned(self) -> bool {
        matches!(self, Self::OwnedOne | Self::OwnedMany)
    }

    #[must_use]
    pub const fn is_belongs_to(self) -> bool {
        matches!(self, Self::BelongsToOne | Self::BelongsToMany)
    }
}

/// Pivot table of a many-to-many relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pivot {
    pub table: String,
    /// Pivot column pointing at the parent model.
    pub parent_key: String,
    /// Pivot column pointing at the related model.
    pub related_key: String,
}

/// A declared association from one model to another.
#[derive(Debug, Clone)]
pub struct Relation {
    pub name: &'static str,
    pub kind: RelationKind,
    pub related: &'static dyn Model,
    foreign_key: Option<&'static str>,
    owner_key: Option<&'static str>,
    pivot: Option<Pivot>,
}

impl Relation {
    #[must_use]
    pub fn new(name: &'static str, kind: RelationKind, related: &'static dyn Model) -> Self {
        Self {
            name,
            kind,
            related,
            foreign_key: None,
            owner_key: None,
            pivot: None,
        }
    }

    #[must_use]
    pub fn has_one(name: &'static str, related: &'static dyn Model) -> Self {
        Self::new(name, RelationKind::OwnedOne, related)
    }

    #[must_use]
    pub fn has_many(name: &'static str, related: &'static dyn Model) -> Self {
        Self::new(name, RelationKind::OwnedMany, related)
    }

    #[must_use]
    pub fn belongs_to(name: &'static str, related: &'static dyn Model) -> Self {
        Self::new(name, RelationKind::BelongsToOne, related)
    }

    #[must_use]
    pub fn belongs_to_many(name: &'static str, related: &'static dyn Model) -> Self {
        Self::new(name, RelationKind::BelongsToMany, related)
    }

    #[must_use]
    pub fn through(name: &'static str, related: &'static dyn Model) -> Self {
        Self::new(name, RelationKind::Through, related)
    }

    /// Override the conventional foreign key column.
    #[must_use]
    pub fn with_foreign_key(mut self, column: &'static str) -> Self {
        self.foreign_key = Some(column);
        self
    }

    /// Override the key the foreign key points at.
    #[must_use]
    pub fn with_owner_key(mut self, column: &'static str) -> Self {
        self.owner_key = Some(column);
        self
    }

    #[must_use]
    pub fn with_pivot(mut self, table: &str, parent_key: &str, related_key: &str) -> Self {
        self.pivot = Some(Pivot {
            table: table.to_string(),
            parent_key: parent_key.to_string(),
            related_key: related_key.to_string(),
        });
        self
    }

    /// Foreign key column: on the related table for owned relationships, on the
    /// parent table for belongs-to.
    #[must_use]
    pub fn foreign_key(&self, parent: &dyn Model) -> String {
        if let Some(column) = self.foreign_key {
            return column.to_string();
        }
        if self.kind.is_belongs_to() {
            self.related.foreign_key()
        } else {
            parent.foreign_key()
        }
    }

    /// Key referenced by [`Relation::foreign_key`].
    #[must_use]
    pub fn owner_key(&self, parent: &dyn Model) -> String {
        if let Some(column) = self.owner_key {
            return column.to_string();
        }
        if self.kind.is_belongs_to() {
            self.related.primary_key().to_string()
        } else {
            parent.primary_key().to_string()
        }
    }

    /// Pivot table, defaulting to both singular names sorted and joined by `_`.
    #[must_use]
    pub fn pivot(&self, parent: &dyn Model) -> Pivot {
        if let Some(pivot) = &self.pivot {
            return pivot.clone();
        }
        let mut names = [parent.name(), self.related.name()];
        names.sort_unstable();
        Pivot {
            table: names.join("_"),
            parent_key: parent.foreign_key(),
            related_key: self.related.foreign_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_models::{Comment, Post, Role, User};

    #[test]
    fn test_default_foreign_key() {
        assert_eq!(User.foreign_key(), "user_id");
        assert_eq!(Post.foreign_key(), "post_id");
    }

    #[test]
    fn test_owned_keys() {
        let posts = User.require_relation("posts").unwrap();
        assert_eq!(posts.kind, RelationKind::OwnedMany);
        assert_eq!(posts.foreign_key(&User), "user_id");
        assert_eq!(posts.owner_key(&User), "id");
    }

    #[test]
    fn test_belongs_to_keys() {
        let author = Post.require_relation("author").unwrap();
        assert_eq!(author.kind, RelationKind::BelongsToOne);
        assert_eq!(author.foreign_key(&Post), "user_id");
        assert_eq!(author.owner_key(&Post), "id");
    }

    #[test]
    fn test_explicit_keys_win() {
        let relation = Relation::has_many("replies", &Comment)
            .with_foreign_key("parent_id")
            .with_owner_key("uuid");
        assert_eq!(relation.foreign_key(&Comment), "parent_id");
        assert_eq!(relation.owner_key(&Comment), "uuid");
    }

    #[test]
    fn test_default_pivot_is_alphabetical() {
        let roles = User.require_relation("roles").unwrap();
        let pivot = roles.pivot(&User);
        assert_eq!(pivot.table, "role_user");
        assert_eq!(pivot.parent_key, "user_id");
        assert_eq!(pivot.related_key, "role_id");

        let users = Role.require_relation("users").unwrap();
        assert_eq!(users.pivot(&Role).table, "role_user");
    }

    #[test]
    fn test_unknown_relation() {
        let err = User.require_relation("nope").unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownRelationship { model: "user", ref relationship } if relationship == "nope"
        ));
    }

    #[test]
    fn test_default_scope_is_unknown() {
        let mut query = EntityQuery::new(&Post);
        let err = Post.scope("published", &mut query).unwrap_err();
        assert!(matches!(err, Error::UnknownScope { model: "post", .. }));
    }
}
