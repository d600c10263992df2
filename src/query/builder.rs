use std::fmt;

use sea_orm::sea_query::{
    Alias, Asterisk, Condition, ConditionalStatement, Expr, JoinType, MysqlQueryBuilder, Order,
    PostgresQueryBuilder, Query, QueryStatementWriter, SelectStatement, SimpleExpr,
    SqliteQueryBuilder,
};
use sea_orm::{DbBackend, JsonValue};

use crate::core::{Attributes, Model};
use crate::errors::Result;
use crate::filtering::conditions::existence_condition;
use crate::filtering::{ExistenceMode, JoinStep, Operator, RelationExistence};

/// How a predicate attaches to the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connector {
    #[default]
    And,
    Or,
}

/// A column bound to the table it is read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedColumn {
    pub table: String,
    pub column: String,
}

impl QualifiedColumn {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Qualify `column` with `table` unless it is already `table.column` shaped.
    #[must_use]
    pub fn qualify(table: &str, column: &str) -> Self {
        match column.split_once('.') {
            Some((owner, name)) => Self::new(owner, name),
            None => Self::new(table, column),
        }
    }

    #[must_use]
    pub fn expr(&self) -> Expr {
        Expr::col((Alias::new(&self.table), Alias::new(&self.column)))
    }
}

impl fmt::Display for QualifiedColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Predicates in call order. AND binds tighter than OR, as in SQL.
#[derive(Debug, Clone, Default)]
pub(crate) struct Predicates(Vec<(Connector, Condition)>);

impl Predicates {
    pub(crate) fn push(&mut self, connector: Connector, condition: Condition) {
        self.0.push((connector, condition));
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `a AND b OR c AND d` becomes `(a AND b) OR (c AND d)`. The connector of the
    /// first predicate is ignored.
    pub(crate) fn to_condition(&self) -> Option<Condition> {
        let mut any = Condition::any();
        let mut run: Option<Condition> = None;
        for (connector, condition) in &self.0 {
            run = Some(match (run.take(), connector) {
                (Some(current), Connector::And) => current.add(condition.clone()),
                (Some(current), Connector::Or) => {
                    any = any.add(current);
                    Condition::all().add(condition.clone())
                }
                (None, _) => Condition::all().add(condition.clone()),
            });
        }
        run.map(|last| any.add(last))
    }
}

#[derive(Debug, Clone)]
enum Source {
    Table,
    /// Caller-supplied statement read as a derived table named after the model's table.
    Statement(Box<SelectStatement>),
}

/// What a built statement selects.
#[derive(Debug, Clone)]
pub(crate) enum Projection {
    /// `table.*`
    All,
    /// `table.<primary key>`
    Key,
    Expr(SimpleExpr),
}

/// Pivot row written when a record is created through a many-to-many query.
#[derive(Debug, Clone)]
pub(crate) struct PivotLink {
    pub(crate) table: String,
    pub(crate) parent_key: String,
    pub(crate) parent_value: JsonValue,
    pub(crate) related_key: String,
}

/// Entity-aware query: a model, its source rows, and the filters, joins and orders
/// accumulated so far.
#[derive(Debug, Clone)]
pub struct EntityQuery {
    model: &'static dyn Model,
    source: Source,
    /// Always ANDed in front of the predicates (relationship scoping, correlation).
    scope: Vec<SimpleExpr>,
    predicates: Predicates,
    joins: Vec<JoinStep>,
    orders: Vec<(QualifiedColumn, Order)>,
    limit: Option<u64>,
    /// Attributes a record created through this query starts with.
    defaults: Attributes,
    pivot: Option<PivotLink>,
}

impl EntityQuery {
    #[must_use]
    pub fn new(model: &'static dyn Model) -> Self {
        Self {
            model,
            source: Source::Table,
            scope: Vec::new(),
            predicates: Predicates::default(),
            joins: Vec::new(),
            orders: Vec::new(),
            limit: None,
            defaults: Attributes::new(),
            pivot: None,
        }
    }

    /// Wrap a raw statement so it can be filtered as `model`'s table.
    #[must_use]
    pub fn from_statement(model: &'static dyn Model, statement: SelectStatement) -> Self {
        Self {
            source: Source::Statement(Box::new(statement)),
            ..Self::new(model)
        }
    }

    #[must_use]
    pub fn model(&self) -> &'static dyn Model {
        self.model
    }

    #[must_use]
    pub fn table(&self) -> &'static str {
        self.model.table_name()
    }

    #[must_use]
    pub fn qualify(&self, column: &str) -> QualifiedColumn {
        QualifiedColumn::qualify(self.table(), column)
    }

    /// Swap the row source for a raw statement, keeping everything accumulated.
    pub fn rebase(&mut self, statement: SelectStatement) {
        self.source = Source::Statement(Box::new(statement));
    }

    /// `AND column <operator> value`.
    ///
    /// # Errors
    ///
    /// Fails for operators outside the allow-list or non-scalar values.
    pub fn where_(&mut self, column: &str, operator: &str, value: impl Into<JsonValue>) -> Result<&mut Self> {
        self.compare(Connector::And, column, operator, &value.into())
    }

    /// `OR column <operator> value`.
    ///
    /// # Errors
    ///
    /// Fails for operators outside the allow-list or non-scalar values.
    pub fn or_where(&mut self, column: &str, operator: &str, value: impl Into<JsonValue>) -> Result<&mut Self> {
        self.compare(Connector::Or, column, operator, &value.into())
    }

    fn compare(&mut self, connector: Connector, column: &str, operator: &str, value: &JsonValue) -> Result<&mut Self> {
        let operator: Operator = operator.parse()?;
        let expr = operator.compare(&self.qualify(column), value)?;
        self.push(connector, Condition::all().add(expr));
        Ok(self)
    }

    /// Require related rows, e.g. `RelationExistence::parse("posts>=2")`.
    ///
    /// # Errors
    ///
    /// Fails for undeclared or unsupported relationships, or when the constraint fails.
    pub fn where_has(&mut self, existence: RelationExistence) -> Result<&mut Self> {
        let expr = existence_condition(self.model, existence, ExistenceMode::Has)?;
        self.push(Connector::And, Condition::all().add(expr));
        Ok(self)
    }

    /// Require that no related rows exist.
    ///
    /// # Errors
    ///
    /// Fails for undeclared or unsupported relationships, or when the constraint fails.
    pub fn where_doesnt_have(&mut self, existence: RelationExistence) -> Result<&mut Self> {
        let expr = existence_condition(self.model, existence, ExistenceMode::DoesntHave)?;
        self.push(Connector::And, Condition::all().add(expr));
        Ok(self)
    }

    pub(crate) fn push(&mut self, connector: Connector, condition: Condition) {
        self.predicates.push(connector, condition);
    }

    pub(crate) fn add_scope(&mut self, expr: SimpleExpr) {
        self.scope.push(expr);
    }

    /// Add a join unless the same step is already present.
    pub fn join(&mut self, step: JoinStep) -> &mut Self {
        if !self.joins.contains(&step) {
            tracing::debug!(table = %step.table, on = %format!("{} = {}", step.first, step.second), "Added join");
            self.joins.push(step);
        }
        self
    }

    pub fn order_by(&mut self, column: QualifiedColumn, order: Order) -> &mut Self {
        self.orders.push((column, order));
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn set_default(&mut self, column: impl Into<String>, value: JsonValue) {
        self.defaults.insert(column.into(), value);
    }

    #[must_use]
    pub fn defaults(&self) -> &Attributes {
        &self.defaults
    }

    pub(crate) fn link_pivot(&mut self, link: PivotLink) {
        self.pivot = Some(link);
    }

    pub(crate) fn pivot_link(&self) -> Option<&PivotLink> {
        self.pivot.as_ref()
    }

    #[must_use]
    pub fn joins(&self) -> &[JoinStep] {
        &self.joins
    }

    /// Predicates alone, without the scope.
    pub(crate) fn predicate_condition(&self) -> Option<Condition> {
        self.predicates.to_condition()
    }

    /// Scope and predicates as one condition, `None` when unfiltered.
    #[must_use]
    pub fn filter_condition(&self) -> Option<Condition> {
        if self.scope.is_empty() && self.predicates.is_empty() {
            return None;
        }
        let mut condition = Condition::all();
        for expr in &self.scope {
            condition = condition.add(expr.clone());
        }
        if let Some(predicates) = self.predicates.to_condition() {
            condition = condition.add(predicates);
        }
        Some(condition)
    }

    /// Whether UPDATE/DELETE can filter the table directly, or must go through
    /// a key subquery.
    pub(crate) fn is_plain(&self) -> bool {
        self.joins.is_empty() && matches!(self.source, Source::Table)
    }

    pub(crate) fn build(&self, projection: Projection, with_orders: bool) -> SelectStatement {
        let table = Alias::new(self.table());
        let mut statement = Query::select();
        match projection {
            Projection::All => statement.column((table.clone(), Asterisk)),
            Projection::Key => statement.column((table.clone(), Alias::new(self.model.primary_key()))),
            Projection::Expr(expr) => statement.expr(expr),
        };
        match &self.source {
            Source::Table => statement.from(table),
            Source::Statement(raw) => statement.from_subquery(raw.as_ref().clone(), table),
        };
        for step in &self.joins {
            statement.join(
                JoinType::InnerJoin,
                Alias::new(&step.table),
                step.first.expr().equals((Alias::new(&step.second.table), Alias::new(&step.second.column))),
            );
        }
        if let Some(condition) = self.filter_condition() {
            statement.cond_where(condition);
        }
        if with_orders {
            for (column, order) in &self.orders {
                statement.order_by((Alias::new(&column.table), Alias::new(&column.column)), order.clone());
            }
            if let Some(limit) = self.limit {
                statement.limit(limit);
            }
        }
        statement
    }

    /// The low-level statement: `SELECT table.* ...` with joins, filters and orders.
    #[must_use]
    pub fn statement(&self) -> SelectStatement {
        self.build(Projection::All, true)
    }

    #[must_use]
    pub fn to_sql(&self, backend: DbBackend) -> String {
        let statement = self.statement();
        match backend {
            DbBackend::Postgres => statement.to_string(PostgresQueryBuilder),
            DbBackend::MySql => statement.to_string(MysqlQueryBuilder),
            DbBackend::Sqlite => statement.to_string(SqliteQueryBuilder),
        }
    }
}
