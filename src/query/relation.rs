//! Queries reached through a relationship: the rows related to one record, and
//! the correlated sub-queries behind `has`/`doesnt have` checks.

use sea_orm::sea_query::{Alias, Asterisk, Expr, SimpleExpr, SubQueryStatement};

use crate::core::{Model, Record, Relation, RelationKind, to_sql_value};
use crate::errors::{Error, Result};
use crate::filtering::{JoinStep, Operator};
use crate::query::builder::{PivotLink, Projection};
use crate::query::{EntityQuery, QualifiedColumn};

fn unsupported(relation: &Relation) -> Error {
    Error::UnsupportedRelationshipKind {
        relationship: relation.name.to_string(),
        kind: relation.kind,
    }
}

/// Pivot join for a many-to-many relationship, plus the pivot column that
/// points back at the parent.
fn pivot_join(parent: &dyn Model, relation: &Relation) -> (JoinStep, QualifiedColumn) {
    let related = relation.related;
    let pivot = relation.pivot(parent);
    let step = JoinStep {
        table: pivot.table.clone(),
        first: QualifiedColumn::new(related.table_name(), related.primary_key()),
        second: QualifiedColumn::new(&pivot.table, &pivot.related_key),
    };
    (step, QualifiedColumn::new(pivot.table, pivot.parent_key))
}

/// Rows of `relation.related` that belong to `parent`.
///
/// Owned relationships record the parent's key as a default and many-to-many
/// relationships record the pivot link, so rows created through the query attach
/// to the parent.
pub(crate) fn scoped_query(parent: &Record, relation: &Relation) -> Result<EntityQuery> {
    let parent_model = parent.model();
    let related = relation.related;
    let mut query = EntityQuery::new(related);
    let missing = |column: &str| {
        Error::InvalidModel(format!(
            "{} record has no value for [{column}]",
            parent_model.name()
        ))
    };

    match relation.kind {
        RelationKind::OwnedOne | RelationKind::OwnedMany => {
            let foreign_key = relation.foreign_key(parent_model);
            let owner_key = relation.owner_key(parent_model);
            let value = parent.get(&owner_key).ok_or_else(|| missing(&owner_key))?;
            query.add_scope(
                QualifiedColumn::new(related.table_name(), &foreign_key)
                    .expr()
                    .eq(to_sql_value(value)),
            );
            query.set_default(foreign_key, value.clone());
        }
        RelationKind::BelongsToOne => {
            let foreign_key = relation.foreign_key(parent_model);
            let owner_key = relation.owner_key(parent_model);
            let value = parent.get(&foreign_key).ok_or_else(|| missing(&foreign_key))?;
            query.add_scope(
                QualifiedColumn::new(related.table_name(), owner_key)
                    .expr()
                    .eq(to_sql_value(value)),
            );
        }
        RelationKind::BelongsToMany => {
            let key = parent
                .key()
                .ok_or_else(|| missing(parent_model.primary_key()))?;
            let (step, parent_column) = pivot_join(parent_model, relation);
            query.link_pivot(PivotLink {
                table: step.table.clone(),
                parent_key: parent_column.column.clone(),
                parent_value: key.clone(),
                related_key: step.second.column.clone(),
            });
            query.join(step);
            query.add_scope(parent_column.expr().eq(to_sql_value(key)));
        }
        RelationKind::Through => return Err(unsupported(relation)),
    }
    Ok(query)
}

/// Correlated existence check of `related` rows for each `parent` row.
///
/// `>= 1` renders `EXISTS`, `< 1` renders `NOT EXISTS`, any other pair compares a
/// `COUNT(*)` sub-query. Self-referential relationships are rejected: both sides
/// would share one unaliased table name.
pub(crate) fn existence_expr(
    parent: &'static dyn Model,
    relation: &Relation,
    mut related: EntityQuery,
    operator: Operator,
    count: i64,
) -> Result<SimpleExpr> {
    let related_table = relation.related.table_name();
    if related_table == parent.table_name() {
        return Err(unsupported(relation));
    }
    match relation.kind {
        RelationKind::OwnedOne | RelationKind::OwnedMany => {
            let foreign_key = relation.foreign_key(parent);
            let owner_key = relation.owner_key(parent);
            related.add_scope(
                QualifiedColumn::new(related_table, foreign_key)
                    .expr()
                    .equals((Alias::new(parent.table_name()), Alias::new(owner_key))),
            );
        }
        RelationKind::BelongsToOne => {
            let foreign_key = relation.foreign_key(parent);
            let owner_key = relation.owner_key(parent);
            related.add_scope(
                QualifiedColumn::new(related_table, owner_key)
                    .expr()
                    .equals((Alias::new(parent.table_name()), Alias::new(foreign_key))),
            );
        }
        RelationKind::BelongsToMany => {
            let (step, parent_column) = pivot_join(parent, relation);
            related.join(step);
            related.add_scope(
                parent_column
                    .expr()
                    .equals((Alias::new(parent.table_name()), Alias::new(parent.primary_key()))),
            );
        }
        RelationKind::Through => return Err(unsupported(relation)),
    }

    let expr = match (operator, count) {
        (Operator::GreaterOrEqual, 1) => Expr::exists(related.build(Projection::All, false)),
        (Operator::Less, 1) => Expr::exists(related.build(Projection::All, false)).not(),
        _ => {
            let counted = related.build(Projection::Expr(Expr::col(Asterisk).count()), false);
            operator.apply(
                SimpleExpr::SubQuery(None, Box::new(SubQueryStatement::SelectStatement(counted))),
                SimpleExpr::Value(count.into()),
            )
        }
    };
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::attributes;
    use crate::test_models::{Comment, Post, User};
    use sea_orm::DbBackend;
    use sea_orm::sea_query::{PostgresQueryBuilder, QueryStatementWriter};
    use serde_json::json;

    fn user() -> Record {
        Record::persisted(&User, attributes(json!({"id": 7, "name": "Ann"})).unwrap())
    }

    fn render(expr: SimpleExpr) -> String {
        let mut query = EntityQuery::new(&User);
        query.add_scope(expr);
        query.build(Projection::Key, false).to_string(PostgresQueryBuilder)
    }

    #[test]
    fn test_owned_scope_and_default() {
        let relation = User.require_relation("posts").unwrap();
        let query = scoped_query(&user(), &relation).unwrap();
        assert_eq!(
            query.to_sql(DbBackend::Postgres),
            r#"SELECT "posts".* FROM "posts" WHERE "posts"."user_id" = 7"#
        );
        assert_eq!(query.defaults().get("user_id"), Some(&json!(7)));
    }

    #[test]
    fn test_belongs_to_scope() {
        let post = Record::persisted(&Post, attributes(json!({"id": 3, "user_id": 7})).unwrap());
        let relation = Post.require_relation("author").unwrap();
        let query = scoped_query(&post, &relation).unwrap();
        assert_eq!(
            query.to_sql(DbBackend::Postgres),
            r#"SELECT "users".* FROM "users" WHERE "users"."id" = 7"#
        );
        assert!(query.defaults().is_empty());
    }

    #[test]
    fn test_belongs_to_many_scope_joins_pivot() {
        let relation = User.require_relation("roles").unwrap();
        let query = scoped_query(&user(), &relation).unwrap();
        assert_eq!(
            query.to_sql(DbBackend::Postgres),
            r#"SELECT "roles".* FROM "roles" INNER JOIN "role_user" ON "roles"."id" = "role_user"."role_id" WHERE "role_user"."user_id" = 7"#
        );
        let link = query.pivot_link().unwrap();
        assert_eq!(link.table, "role_user");
        assert_eq!(link.related_key, "role_id");
        assert_eq!(link.parent_value, json!(7));
    }

    #[test]
    fn test_through_is_unsupported() {
        let relation = User.require_relation("comments").unwrap();
        assert!(matches!(
            scoped_query(&user(), &relation),
            Err(Error::UnsupportedRelationshipKind { kind: RelationKind::Through, .. })
        ));
    }

    #[test]
    fn test_exists_for_at_least_one() {
        let relation = User.require_relation("posts").unwrap();
        let expr = existence_expr(&User, &relation, EntityQuery::new(&Post), Operator::GreaterOrEqual, 1).unwrap();
        let sql = render(expr);
        assert!(sql.contains("EXISTS"), "{sql}");
        assert!(!sql.contains("NOT EXISTS"), "{sql}");
        assert!(!sql.contains("COUNT"), "{sql}");
        assert!(sql.contains(r#"FROM "posts" WHERE "posts"."user_id" = "users"."id""#), "{sql}");
    }

    #[test]
    fn test_not_exists_for_less_than_one() {
        let relation = User.require_relation("posts").unwrap();
        let expr = existence_expr(&User, &relation, EntityQuery::new(&Post), Operator::Less, 1).unwrap();
        let sql = render(expr);
        assert!(sql.contains("NOT EXISTS"), "{sql}");
    }

    #[test]
    fn test_count_comparison() {
        let relation = Post.require_relation("comments").unwrap();
        let expr = existence_expr(&Post, &relation, EntityQuery::new(&Comment), Operator::GreaterOrEqual, 2).unwrap();
        let sql = render(expr);
        assert!(
            sql.contains(r#"SELECT COUNT(*) FROM "comments" WHERE "comments"."post_id" = "posts"."id""#),
            "{sql}"
        );
        assert!(sql.ends_with(">= 2"), "{sql}");
    }

    #[test]
    fn test_self_referential_existence_is_rejected() {
        let relation = User.require_relation("reports").unwrap();
        assert!(matches!(
            existence_expr(&User, &relation, EntityQuery::new(&User), Operator::GreaterOrEqual, 1),
            Err(Error::UnsupportedRelationshipKind { ref relationship, .. }) if relationship == "reports"
        ));
    }

    #[test]
    fn test_belongs_to_correlation() {
        let relation = Post.require_relation("author").unwrap();
        let expr = existence_expr(&Post, &relation, EntityQuery::new(&User), Operator::GreaterOrEqual, 1).unwrap();
        let sql = render(expr);
        assert!(sql.contains(r#""users"."id" = "posts"."user_id""#), "{sql}");
    }
}
