//! # `EasyModel`
//!
//! The fluent entry point. An `EasyModel` owns one chain: the resolved target,
//! the [`QueryContext`] the translators accumulate into, and the record an
//! upsert materialized.
//!
//! ```rust,ignore
//! let mut chain = EasyModel::new();
//! chain
//!     .set_model(&Post)
//!     .add_wheres(vec![ConditionSpec::eq("published", true)])?
//!     .add_order_by(vec![OrderSpec::desc("created_at")])?;
//! let posts = chain.fetch(&db).await?.into_records();
//!
//! // Mutations prefer the record an upsert produced over the bulk query.
//! chain.set_model(&User);
//! chain.update_or_create_model(&db, &attributes(json!({"email": "ann@example.com"}))?, &Attributes::new()).await?;
//! chain.increment_each(&db, &attributes(json!({"logins": 1}))?).await?;
//! ```

use sea_orm::sea_query::SelectStatement;
use sea_orm::{ConnectionTrait, DbBackend};

use crate::config::Config;
use crate::core::{Attributes, Model, ModelResolver, Record, Subject};
use crate::errors::Result;
use crate::filtering::{
    ConditionSpec, ExistenceMode, OrderSpec, RelationExistence, RelationProperty, add_flat_conditions,
    add_order, add_relation_existence, add_relation_property,
};
use crate::operations::{Fetched, MutationCoordinator, MutationTarget, upsert};
use crate::query::{Connector, EntityQuery, QueryContext};

#[derive(Debug, Clone, Default)]
pub struct EasyModel {
    resolver: ModelResolver,
    context: QueryContext,
    applied: Option<Record>,
    config: Config,
}

impl EasyModel {
    /// Chain with no target; call [`EasyModel::set_model`] before translating.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain that falls back to `model` when no explicit target is set.
    #[must_use]
    pub fn hosted_by(model: &'static dyn Model) -> Self {
        Self {
            resolver: ModelResolver::hosted_by(model),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn resolver(&self) -> &ModelResolver {
        &self.resolver
    }

    #[must_use]
    pub fn context(&self) -> &QueryContext {
        &self.context
    }

    /// Record produced by the last upsert, if any.
    #[must_use]
    pub fn applied(&self) -> Option<&Record> {
        self.applied.as_ref()
    }

    /// Target a model type or a record. Discards the current context.
    pub fn set_model(&mut self, subject: impl Into<Subject>) -> &mut Self {
        self.resolver.set_target(subject.into());
        self.reset()
    }

    /// Narrow the target to one of its relationships (or widen it back with
    /// `None`). Discards the current context.
    pub fn set_relationship(&mut self, relationship: Option<&str>) -> &mut Self {
        self.resolver.set_relationship(relationship.map(str::to_string));
        self.reset()
    }

    /// Continue from a caller-built entity query.
    pub fn set_query(&mut self, query: EntityQuery) -> &mut Self {
        self.context.set_query(query);
        self
    }

    /// Continue from a raw statement, read as the target's table.
    pub fn set_statement(&mut self, statement: SelectStatement) -> &mut Self {
        self.context.set_statement(statement);
        self
    }

    /// Forget the accumulated query and any materialized record.
    pub fn reset(&mut self) -> &mut Self {
        self.context.reset();
        self.applied = None;
        self
    }

    fn query(&mut self) -> Result<&mut EntityQuery> {
        self.context.get_or_create(&self.resolver)
    }

    fn wheres(&mut self, specs: Vec<ConditionSpec>, connector: Connector) -> Result<&mut Self> {
        add_flat_conditions(self.query()?, specs, connector)?;
        Ok(self)
    }

    fn existence(
        &mut self,
        specs: Vec<RelationExistence>,
        mode: ExistenceMode,
        connector: Connector,
    ) -> Result<&mut Self> {
        add_relation_existence(self.query()?, specs, mode, connector)?;
        Ok(self)
    }

    fn properties(&mut self, specs: Vec<RelationProperty>, connector: Connector) -> Result<&mut Self> {
        add_relation_property(self.query()?, specs, connector)?;
        Ok(self)
    }

    /// AND each condition onto the query.
    ///
    /// # Errors
    ///
    /// Target resolution or spec validation failures; the query is unchanged.
    pub fn add_wheres(&mut self, specs: Vec<ConditionSpec>) -> Result<&mut Self> {
        self.wheres(specs, Connector::And)
    }

    /// OR each condition onto the query.
    ///
    /// # Errors
    ///
    /// Target resolution or spec validation failures; the query is unchanged.
    pub fn add_or_wheres(&mut self, specs: Vec<ConditionSpec>) -> Result<&mut Self> {
        self.wheres(specs, Connector::Or)
    }

    /// # Errors
    ///
    /// Target resolution failures, unknown or unsupported relationships.
    pub fn add_where_has(&mut self, specs: Vec<RelationExistence>) -> Result<&mut Self> {
        self.existence(specs, ExistenceMode::Has, Connector::And)
    }

    /// # Errors
    ///
    /// Target resolution failures, unknown or unsupported relationships.
    pub fn add_or_where_has(&mut self, specs: Vec<RelationExistence>) -> Result<&mut Self> {
        self.existence(specs, ExistenceMode::Has, Connector::Or)
    }

    /// Require that none of the relationships has rows. Count suffixes are ignored.
    ///
    /// # Errors
    ///
    /// Target resolution failures, unknown or unsupported relationships.
    pub fn add_where_doesnt_have(&mut self, specs: Vec<RelationExistence>) -> Result<&mut Self> {
        self.existence(specs, ExistenceMode::DoesntHave, Connector::And)
    }

    /// # Errors
    ///
    /// Target resolution failures, unknown or unsupported relationships.
    pub fn add_or_where_doesnt_have(&mut self, specs: Vec<RelationExistence>) -> Result<&mut Self> {
        self.existence(specs, ExistenceMode::DoesntHave, Connector::Or)
    }

    /// # Errors
    ///
    /// Target resolution failures or invalid relation properties.
    pub fn add_where_relation(&mut self, specs: Vec<RelationProperty>) -> Result<&mut Self> {
        self.properties(specs, Connector::And)
    }

    /// # Errors
    ///
    /// Target resolution failures or invalid relation properties.
    pub fn add_or_where_relation(&mut self, specs: Vec<RelationProperty>) -> Result<&mut Self> {
        self.properties(specs, Connector::Or)
    }

    /// `has`, `doesnt have` and relation-property checks in one call, applied in
    /// that order with AND.
    ///
    /// # Errors
    ///
    /// The first invalid spec of any group; nothing is applied in that case.
    pub fn add_relation_conditions(
        &mut self,
        has: Vec<RelationExistence>,
        doesnt_have: Vec<RelationExistence>,
        relation: Vec<RelationProperty>,
    ) -> Result<&mut Self> {
        self.relation_conditions(has, doesnt_have, relation, Connector::And)
    }

    /// Same as [`EasyModel::add_relation_conditions`] with OR.
    ///
    /// # Errors
    ///
    /// The first invalid spec of any group; nothing is applied in that case.
    pub fn add_or_relation_conditions(
        &mut self,
        has: Vec<RelationExistence>,
        doesnt_have: Vec<RelationExistence>,
        relation: Vec<RelationProperty>,
    ) -> Result<&mut Self> {
        self.relation_conditions(has, doesnt_have, relation, Connector::Or)
    }

    fn relation_conditions(
        &mut self,
        has: Vec<RelationExistence>,
        doesnt_have: Vec<RelationExistence>,
        relation: Vec<RelationProperty>,
        connector: Connector,
    ) -> Result<&mut Self> {
        let query = self.query()?;
        let mut staged = query.clone();
        add_relation_existence(&mut staged, has, ExistenceMode::Has, connector)?;
        add_relation_existence(&mut staged, doesnt_have, ExistenceMode::DoesntHave, connector)?;
        add_relation_property(&mut staged, relation, connector)?;
        *query = staged;
        Ok(self)
    }

    /// Append the order specs, joining through relationship paths as needed.
    ///
    /// # Errors
    ///
    /// Target resolution failures or the first spec that does not resolve.
    pub fn add_order_by(&mut self, specs: Vec<OrderSpec>) -> Result<&mut Self> {
        let direction = self.config.default_direction;
        add_order(self.query()?, &specs, direction)?;
        Ok(self)
    }

    /// Apply the model's named scopes in order.
    ///
    /// # Errors
    ///
    /// [`crate::Error::UnknownScope`] or whatever a scope returns; nothing is
    /// applied in that case.
    pub fn using_scopes(&mut self, names: &[&str]) -> Result<&mut Self> {
        let query = self.query()?;
        let model = query.model();
        let mut staged = query.clone();
        for name in names {
            model.scope(name, &mut staged)?;
        }
        *query = staged;
        Ok(self)
    }

    /// Hand over the assembled query and start a fresh chain on the same target.
    ///
    /// # Errors
    ///
    /// Target resolution failures.
    pub fn execute(&mut self) -> Result<EntityQuery> {
        let query = self.context.take(&self.resolver)?;
        self.applied = None;
        Ok(query)
    }

    /// Low-level statement for the query assembled so far.
    ///
    /// # Errors
    ///
    /// Target resolution failures.
    pub fn statement(&mut self) -> Result<SelectStatement> {
        Ok(self.query()?.statement())
    }

    /// # Errors
    ///
    /// Target resolution failures.
    pub fn to_sql(&mut self, backend: DbBackend) -> Result<String> {
        Ok(self.query()?.to_sql(backend))
    }

    fn coordinator(&mut self) -> Result<MutationCoordinator<'_>> {
        let target = match self.applied.as_mut() {
            Some(record) => {
                tracing::debug!(model = record.model().name(), "Mutating materialized record");
                MutationTarget::Single(record)
            }
            None => {
                let query = self.context.get_or_create(&self.resolver)?;
                tracing::debug!(model = query.model().name(), "Mutating query rows");
                MutationTarget::Bulk(query)
            }
        };
        Ok(MutationCoordinator::new(target, &self.config))
    }

    /// # Errors
    ///
    /// See [`MutationCoordinator::update`].
    pub async fn perform_update<C: ConnectionTrait>(&mut self, db: &C, values: &Attributes) -> Result<u64> {
        self.coordinator()?.update(db, values).await
    }

    /// # Errors
    ///
    /// See [`MutationCoordinator::delete`].
    pub async fn perform_delete<C: ConnectionTrait>(&mut self, db: &C) -> Result<u64> {
        self.coordinator()?.delete(db).await
    }

    /// # Errors
    ///
    /// See [`MutationCoordinator::increment_each`].
    pub async fn increment_each<C: ConnectionTrait>(&mut self, db: &C, deltas: &Attributes) -> Result<u64> {
        self.coordinator()?.increment_each(db, deltas).await
    }

    /// # Errors
    ///
    /// See [`MutationCoordinator::decrement_each`].
    pub async fn decrement_each<C: ConnectionTrait>(&mut self, db: &C, deltas: &Attributes) -> Result<u64> {
        self.coordinator()?.decrement_each(db, deltas).await
    }

    /// # Errors
    ///
    /// See [`MutationCoordinator::zero_out_columns`].
    pub async fn zero_out_columns<C: ConnectionTrait>(&mut self, db: &C, columns: &[&str]) -> Result<u64> {
        self.coordinator()?.zero_out_columns(db, columns).await
    }

    /// # Errors
    ///
    /// See [`MutationCoordinator::toggle_columns`].
    pub async fn toggle_columns<C: ConnectionTrait>(&mut self, db: &C, columns: &[&str]) -> Result<u64> {
        self.coordinator()?.toggle_columns(db, columns).await
    }

    /// Find-or-create under the target (narrowed to its relationship when one
    /// is set), within the filters the chain has accumulated. The result becomes
    /// the target of later mutations.
    ///
    /// # Errors
    ///
    /// Target resolution failures or any database error.
    pub async fn update_or_create_model<C: ConnectionTrait>(
        &mut self,
        db: &C,
        matching: &Attributes,
        values: &Attributes,
    ) -> Result<&Record> {
        let base = self.query()?.clone();
        self.upsert_into(db, &base, matching, values).await
    }

    /// Find-or-create among the target record's `relationship` rows. Narrows the
    /// chain to `relationship` first, which discards the context unless the chain
    /// is already narrowed to it.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidModel`] unless the target is a persisted record,
    /// unknown or unsupported relationships, or any database error.
    pub async fn update_or_create_relationship<C: ConnectionTrait>(
        &mut self,
        db: &C,
        relationship: &str,
        matching: &Attributes,
        values: &Attributes,
    ) -> Result<&Record> {
        if self.resolver.relationship() != Some(relationship) {
            self.set_relationship(Some(relationship));
        }
        self.update_or_create_model(db, matching, values).await
    }

    async fn upsert_into<C: ConnectionTrait>(
        &mut self,
        db: &C,
        base: &EntityQuery,
        matching: &Attributes,
        values: &Attributes,
    ) -> Result<&Record> {
        let record = upsert(db, base, matching, values).await?;
        Ok(self.applied.insert(record))
    }

    /// Terminal read: the refreshed materialized record, or every row of the
    /// query. The chain is reset afterwards either way.
    ///
    /// # Errors
    ///
    /// Target resolution failures or any database error.
    pub async fn fetch<C: ConnectionTrait>(&mut self, db: &C) -> Result<Fetched> {
        let fetched = match self.coordinator() {
            Ok(coordinator) => coordinator.fetch(db).await,
            Err(err) => Err(err),
        };
        self.reset();
        fetched
    }
}
