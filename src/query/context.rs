use sea_orm::sea_query::SelectStatement;

use crate::core::ModelResolver;
use crate::errors::{Error, Result};
use crate::query::EntityQuery;
use crate::query::relation::scoped_query;

/// The query a chain of calls builds up.
///
/// Holds a caller-supplied raw statement until the first translator needs an
/// [`EntityQuery`], then wraps it once; every later call gets that same query back.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    raw: Option<SelectStatement>,
    entity: Option<EntityQuery>,
}

impl QueryContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue from an already built entity query.
    pub fn set_query(&mut self, query: EntityQuery) {
        self.raw = None;
        self.entity = Some(query);
    }

    /// Continue from a raw statement. If an entity query already exists it is
    /// rebased onto the statement and keeps its accumulated filters.
    pub fn set_statement(&mut self, statement: SelectStatement) {
        match &mut self.entity {
            Some(query) => query.rebase(statement),
            None => self.raw = Some(statement),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_none() && self.entity.is_none()
    }

    #[must_use]
    pub fn query(&self) -> Option<&EntityQuery> {
        self.entity.as_ref()
    }

    /// The current query, creating it from the resolved target on first use.
    ///
    /// # Errors
    ///
    /// Propagates target resolution failures; the context is left untouched.
    pub fn get_or_create(&mut self, resolver: &ModelResolver) -> Result<&mut EntityQuery> {
        let query = match self.entity.take() {
            Some(query) => query,
            None => {
                let query = Self::start(self.raw.as_ref(), resolver)?;
                self.raw = None;
                query
            }
        };
        Ok(self.entity.insert(query))
    }

    fn start(raw: Option<&SelectStatement>, resolver: &ModelResolver) -> Result<EntityQuery> {
        let resolved = resolver.resolve_scoped()?;
        let mut query = match &resolved.relation {
            Some(relation) => {
                let parent = resolved.subject.record().ok_or_else(|| {
                    Error::InvalidModel("relationship queries need a record".to_string())
                })?;
                scoped_query(parent, relation)?
            }
            None => EntityQuery::new(resolved.model()),
        };
        if let Some(statement) = raw {
            query.rebase(statement.clone());
        }
        tracing::debug!(
            model = query.model().name(),
            relationship = resolver.relationship(),
            wrapped = raw.is_some(),
            "Created query context"
        );
        Ok(query)
    }

    /// Low-level statement for whatever has been accumulated so far.
    #[must_use]
    pub fn statement(&self) -> Option<SelectStatement> {
        self.entity
            .as_ref()
            .map(EntityQuery::statement)
            .or_else(|| self.raw.clone())
    }

    /// Hand the query out and leave the context empty.
    ///
    /// # Errors
    ///
    /// Propagates target resolution failures.
    pub fn take(&mut self, resolver: &ModelResolver) -> Result<EntityQuery> {
        self.get_or_create(resolver)?;
        self.entity.take().ok_or(Error::UnresolvedTarget)
    }

    pub fn reset(&mut self) {
        self.raw = None;
        self.entity = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Record, Subject, attributes};
    use crate::test_models::{Post, User};
    use sea_orm::DbBackend;
    use sea_orm::sea_query::{Alias, Asterisk, ConditionalStatement, Expr, Query};
    use serde_json::json;

    fn resolver_for(subject: Subject) -> ModelResolver {
        let mut resolver = ModelResolver::new();
        resolver.set_target(subject);
        resolver
    }

    #[test]
    fn test_accumulates_on_the_same_query() {
        let resolver = resolver_for(Subject::from(&User));
        let mut context = QueryContext::new();
        context.get_or_create(&resolver).unwrap().where_("name", "=", "Ann").unwrap();
        context.get_or_create(&resolver).unwrap().where_("age", ">", 20).unwrap();
        let sql = context.get_or_create(&resolver).unwrap().to_sql(DbBackend::Postgres);
        assert!(sql.contains(r#""users"."name" = 'Ann' AND "users"."age" > 20"#), "{sql}");
    }

    #[test]
    fn test_failed_resolution_keeps_raw_statement() {
        let mut context = QueryContext::new();
        context.set_statement(Query::select().column(Asterisk).from(Alias::new("users")).to_owned());
        assert!(context.get_or_create(&ModelResolver::new()).is_err());
        assert!(!context.is_empty());
        assert!(context.statement().is_some());
    }

    #[test]
    fn test_raw_statement_is_wrapped_once() {
        let raw = Query::select()
            .column(Asterisk)
            .from(Alias::new("posts"))
            .and_where(Expr::col(Alias::new("published")).eq(true))
            .to_owned();
        let resolver = resolver_for(Subject::from(&Post));
        let mut context = QueryContext::new();
        context.set_statement(raw);
        context.get_or_create(&resolver).unwrap().where_("id", ">", 1).unwrap();
        let sql = context.get_or_create(&resolver).unwrap().to_sql(DbBackend::Postgres);
        assert_eq!(sql.matches("FROM (SELECT").count(), 1, "{sql}");
        assert!(sql.contains(r#""posts"."id" > 1"#));
    }

    #[test]
    fn test_set_statement_after_creation_keeps_filters() {
        let resolver = resolver_for(Subject::from(&Post));
        let mut context = QueryContext::new();
        context.get_or_create(&resolver).unwrap().where_("id", "=", 4).unwrap();
        context.set_statement(Query::select().column(Asterisk).from(Alias::new("archived_posts")).to_owned());
        let sql = context.get_or_create(&resolver).unwrap().to_sql(DbBackend::Postgres);
        assert!(sql.contains(r#"FROM (SELECT * FROM "archived_posts") AS "posts""#), "{sql}");
        assert!(sql.contains(r#""posts"."id" = 4"#), "{sql}");
    }

    #[test]
    fn test_relationship_start() {
        let user = Record::persisted(&User, attributes(json!({"id": 2})).unwrap());
        let mut resolver = resolver_for(user.into());
        resolver.set_relationship(Some("posts".to_string()));
        let mut context = QueryContext::new();
        let query = context.get_or_create(&resolver).unwrap();
        assert_eq!(query.model().name(), "post");
        assert!(query.to_sql(DbBackend::Postgres).contains(r#""posts"."user_id" = 2"#));
    }

    #[test]
    fn test_take_and_reset() {
        let resolver = resolver_for(Subject::from(&User));
        let mut context = QueryContext::new();
        context.get_or_create(&resolver).unwrap();
        let query = context.take(&resolver).unwrap();
        assert_eq!(query.table(), "users");
        assert!(context.is_empty());

        context.set_query(EntityQuery::new(&Post));
        context.reset();
        assert!(context.is_empty());
        assert!(context.statement().is_none());
    }
}
