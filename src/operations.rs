//! # Mutations
//!
//! Updates, deletes and the upsert/fetch pair that run against either one
//! materialized [`Record`] or every row an [`EntityQuery`] matches.
//!
//! A record is mutated in memory first and then saved by primary key, so the
//! caller's copy always mirrors the row. A query is mutated with one
//! `UPDATE`/`DELETE`. When the query reads from a raw statement or needs joins,
//! the rows are addressed through `pk IN (SELECT pk ...)`.
//!
//! MySQL refuses that sub-query form when it reads the table being updated, so
//! joined bulk mutations are only portable to `PostgreSQL` and `SQLite`.

use sea_orm::sea_query::{
    Alias, Asterisk, ConditionalStatement, Expr, InsertStatement, Query, SelectStatement, SimpleExpr,
    UpdateStatement,
};
use sea_orm::{ConnectionTrait, FromQueryResult, JsonValue, StatementBuilder};

use crate::config::Config;
use crate::core::record::{negate, offset};
use crate::core::{Attributes, Model, Record, attributes, to_sql_value};
use crate::errors::{Error, Result};
use crate::query::EntityQuery;
use crate::query::builder::Projection;

/// What a mutation applies to.
#[derive(Debug)]
pub enum MutationTarget<'a> {
    /// A row already materialized, usually by an upsert.
    Single(&'a mut Record),
    /// Every row the query matches.
    Bulk(&'a EntityQuery),
}

/// Result of a terminal fetch.
#[derive(Debug, Clone)]
pub enum Fetched {
    /// The refreshed record a previous upsert or mutation produced.
    One(Record),
    Many(Vec<Record>),
}

impl Fetched {
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Self::One(record) => vec![record],
            Self::Many(records) => records,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(records) => records.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Applies mutations to a [`MutationTarget`], choosing between the single-record
/// and bulk paths.
#[derive(Debug)]
pub struct MutationCoordinator<'a> {
    target: MutationTarget<'a>,
    config: &'a Config,
}

impl<'a> MutationCoordinator<'a> {
    #[must_use]
    pub fn new(target: MutationTarget<'a>, config: &'a Config) -> Self {
        Self { target, config }
    }

    /// Set `values` on the target. Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidAttribute`] for an empty value set, [`Error::InvalidModel`]
    /// for an unidentified record, or any database error.
    pub async fn update<C: ConnectionTrait>(&mut self, db: &C, values: &Attributes) -> Result<u64> {
        if values.is_empty() {
            return Err(Error::InvalidAttribute("no values to update".to_string()));
        }
        match &mut self.target {
            MutationTarget::Single(record) => save(db, record, values).await,
            MutationTarget::Bulk(query) => {
                let mut statement = Query::update();
                statement.table(Alias::new(query.table()));
                for (column, value) in values {
                    statement.value(Alias::new(column), to_sql_value(value));
                }
                bulk_update(db, query, statement).await
            }
        }
    }

    /// Delete the target. A deleted record stays in memory but is no longer
    /// marked as persisted.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidModel`] for an unidentified record, or any database error.
    pub async fn delete<C: ConnectionTrait>(&mut self, db: &C) -> Result<u64> {
        match &mut self.target {
            MutationTarget::Single(record) => {
                let model = record.model();
                let key = identify(record)?;
                let mut statement = Query::delete();
                statement
                    .from_table(Alias::new(model.table_name()))
                    .and_where(key_column(model).eq(to_sql_value(&key)));
                tracing::debug!(model = model.name(), key = %key, "Deleting single record");
                let affected = execute(db, &statement).await?;
                record.mark_deleted();
                Ok(affected)
            }
            MutationTarget::Bulk(query) => {
                let mut statement = Query::delete();
                statement.from_table(Alias::new(query.table()));
                restrict(query, &mut statement);
                tracing::debug!(model = query.model().name(), "Deleting matching rows");
                execute(db, &statement).await
            }
        }
    }

    /// Add each delta to its column.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidAttribute`] for non-numeric deltas or columns, or any
    /// database error.
    pub async fn increment_each<C: ConnectionTrait>(&mut self, db: &C, deltas: &Attributes) -> Result<u64> {
        self.shift(db, deltas, 1).await
    }

    /// Subtract each delta from its column.
    ///
    /// # Errors
    ///
    /// Same as [`MutationCoordinator::increment_each`].
    pub async fn decrement_each<C: ConnectionTrait>(&mut self, db: &C, deltas: &Attributes) -> Result<u64> {
        self.shift(db, deltas, -1).await
    }

    async fn shift<C: ConnectionTrait>(&mut self, db: &C, deltas: &Attributes, sign: i64) -> Result<u64> {
        if deltas.is_empty() {
            return Err(Error::InvalidAttribute("no columns to adjust".to_string()));
        }
        if let Some((column, _)) = deltas.iter().find(|(_, delta)| !delta.is_number()) {
            return Err(Error::InvalidAttribute(format!(
                "delta for column [{column}] is not numeric"
            )));
        }

        match &mut self.target {
            MutationTarget::Single(record) => {
                let mut values = Attributes::new();
                for (column, delta) in deltas {
                    let current = record.get(column).cloned().unwrap_or(JsonValue::Null);
                    values.insert(column.clone(), offset(column, &current, delta, sign)?);
                }
                save(db, record, &values).await
            }
            MutationTarget::Bulk(query) => {
                let mut statement = Query::update();
                statement.table(Alias::new(query.table()));
                for (column, delta) in deltas {
                    let current = Expr::col(Alias::new(column));
                    let adjusted = if sign < 0 {
                        current.sub(to_sql_value(delta))
                    } else {
                        current.add(to_sql_value(delta))
                    };
                    statement.value(Alias::new(column), adjusted);
                }
                if let Some(stamp) = stamp_column(self.config, query.model(), deltas) {
                    statement.value(Alias::new(stamp), Expr::cust("CURRENT_TIMESTAMP"));
                }
                bulk_update(db, query, statement).await
            }
        }
    }

    /// The refreshed record for a single target, every matching row for a bulk one.
    ///
    /// # Errors
    ///
    /// Same as [`refresh`], or any database error.
    pub async fn fetch<C: ConnectionTrait>(self, db: &C) -> Result<Fetched> {
        match self.target {
            MutationTarget::Single(record) => Ok(Fetched::One(refresh(db, record).await?)),
            MutationTarget::Bulk(query) => {
                let backend = db.get_database_backend();
                let statement = backend.build(&query.statement());
                tracing::trace!(sql = %statement.sql, "Fetching rows");
                let rows = JsonValue::find_by_statement(statement).all(db).await?;
                let model = query.model();
                let records = rows
                    .into_iter()
                    .map(|row| Ok(Record::persisted(model, attributes(row)?)))
                    .collect::<Result<Vec<_>>>()?;
                tracing::debug!(model = model.name(), count = records.len(), "Fetched rows");
                Ok(Fetched::Many(records))
            }
        }
    }

    /// Set each column to `0`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidAttribute`] when `columns` is empty, or any database error.
    pub async fn zero_out_columns<C: ConnectionTrait>(&mut self, db: &C, columns: &[&str]) -> Result<u64> {
        let values: Attributes = columns
            .iter()
            .map(|column| ((*column).to_string(), JsonValue::from(0)))
            .collect();
        self.update(db, &values).await
    }

    /// Flip each boolean column.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidAttribute`] when `columns` is empty or a record holds a
    /// non-boolean value, or any database error.
    pub async fn toggle_columns<C: ConnectionTrait>(&mut self, db: &C, columns: &[&str]) -> Result<u64> {
        if columns.is_empty() {
            return Err(Error::InvalidAttribute("no columns to toggle".to_string()));
        }
        match &mut self.target {
            MutationTarget::Single(record) => {
                let mut values = Attributes::new();
                for column in columns {
                    let current = record.get(column).cloned().unwrap_or(JsonValue::Null);
                    values.insert((*column).to_string(), negate(column, &current)?);
                }
                save(db, record, &values).await
            }
            MutationTarget::Bulk(query) => {
                let mut statement = Query::update();
                statement.table(Alias::new(query.table()));
                for column in columns {
                    statement.value(Alias::new(*column), SimpleExpr::from(Expr::col(Alias::new(*column))).not());
                }
                bulk_update(db, query, statement).await
            }
        }
    }
}

/// Column a bulk increment stamps, unless disabled or already being written.
fn stamp_column(config: &Config, model: &dyn Model, deltas: &Attributes) -> Option<&'static str> {
    if !config.touch_updated_at {
        return None;
    }
    model.updated_at_column().filter(|column| !deltas.contains_key(*column))
}

/// Find the first row matching `query` and `matching`, then update it with
/// `values`; create it from the query defaults, `matching` and `values` when
/// nothing matches. Returns the row as stored.
///
/// # Errors
///
/// Any database error, or [`Error::RecordNotFound`] when the created row cannot
/// be read back.
pub async fn upsert<C: ConnectionTrait>(
    db: &C,
    query: &EntityQuery,
    matching: &Attributes,
    values: &Attributes,
) -> Result<Record> {
    let model = query.model();
    let mut lookup = query.clone();
    for (column, value) in matching {
        lookup.where_(column, "=", value.clone())?;
    }
    lookup.limit(1);

    if let Some(row) = select_one(db, &lookup.statement()).await? {
        let mut record = Record::persisted(model, attributes(row)?);
        tracing::debug!(model = model.name(), "Upsert matched an existing row");
        if !values.is_empty() {
            save(db, &mut record, values).await?;
        }
        return Ok(record);
    }

    let mut row = query.defaults().clone();
    row.extend(matching.iter().map(|(k, v)| (k.clone(), v.clone())));
    row.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
    tracing::debug!(model = model.name(), columns = row.len(), "Upsert creating a new row");

    let key = insert(db, model, &row).await?;
    if let Some(link) = query.pivot_link() {
        let mut attach = Query::insert();
        attach
            .into_table(Alias::new(&link.table))
            .columns([Alias::new(&link.parent_key), Alias::new(&link.related_key)])
            .values([
                SimpleExpr::from(to_sql_value(&link.parent_value)),
                SimpleExpr::from(to_sql_value(&key)),
            ])
            .map_err(|e| Error::Statement(e.to_string()))?;
        execute(db, &attach).await?;
    }
    reload(db, model, &key).await
}

/// Re-read `record` from the database by primary key.
///
/// # Errors
///
/// [`Error::InvalidModel`] for an unidentified record, [`Error::RecordNotFound`]
/// when the row is gone, or any database error.
pub async fn refresh<C: ConnectionTrait>(db: &C, record: &Record) -> Result<Record> {
    let key = identify(record)?;
    reload(db, record.model(), &key).await
}

fn key_column(model: &dyn Model) -> Expr {
    Expr::col((Alias::new(model.table_name()), Alias::new(model.primary_key())))
}

fn identify(record: &Record) -> Result<JsonValue> {
    if !record.exists() {
        return Err(Error::InvalidModel(format!(
            "{} record is not persisted",
            record.model().name()
        )));
    }
    record.key().cloned().ok_or_else(|| {
        Error::InvalidModel(format!("{} record has no primary key", record.model().name()))
    })
}

/// Write `values` to the record's row and merge them into the record.
async fn save<C: ConnectionTrait>(db: &C, record: &mut Record, values: &Attributes) -> Result<u64> {
    let model = record.model();
    let key = identify(record)?;
    let mut statement = Query::update();
    statement.table(Alias::new(model.table_name()));
    for (column, value) in values {
        statement.value(Alias::new(column), to_sql_value(value));
    }
    statement.and_where(key_column(model).eq(to_sql_value(&key)));
    tracing::debug!(model = model.name(), key = %key, "Updating single record");
    let affected = execute(db, &statement).await?;
    record.fill(values);
    Ok(affected)
}

fn restrict<S: ConditionalStatement>(query: &EntityQuery, statement: &mut S) {
    if query.is_plain() {
        if let Some(condition) = query.filter_condition() {
            statement.cond_where(condition);
        }
    } else {
        statement.and_where(key_column(query.model()).in_subquery(query.build(Projection::Key, false)));
    }
}

async fn bulk_update<C: ConnectionTrait>(db: &C, query: &EntityQuery, mut statement: UpdateStatement) -> Result<u64> {
    restrict(query, &mut statement);
    tracing::debug!(
        model = query.model().name(),
        via_key_subquery = !query.is_plain(),
        "Updating matching rows"
    );
    execute(db, &statement).await
}

async fn execute<C: ConnectionTrait, S: StatementBuilder>(db: &C, statement: &S) -> Result<u64> {
    let statement = db.get_database_backend().build(statement);
    tracing::trace!(sql = %statement.sql, "Executing mutation");
    Ok(db.execute(statement).await?.rows_affected())
}

async fn select_one<C: ConnectionTrait>(db: &C, statement: &SelectStatement) -> Result<Option<JsonValue>> {
    let statement = db.get_database_backend().build(statement);
    tracing::trace!(sql = %statement.sql, "Selecting one row");
    Ok(JsonValue::find_by_statement(statement).one(db).await?)
}

/// Insert `row` and return its primary key.
async fn insert<C: ConnectionTrait>(db: &C, model: &dyn Model, row: &Attributes) -> Result<JsonValue> {
    let primary_key = model.primary_key();
    let mut statement = Query::insert();
    statement.into_table(Alias::new(model.table_name()));
    if row.is_empty() {
        statement.or_default_values();
    } else {
        statement
            .columns(row.keys().map(Alias::new))
            .values(row.values().map(|value| SimpleExpr::from(to_sql_value(value))))
            .map_err(|e| Error::Statement(e.to_string()))?;
    }

    if let Some(key) = row.get(primary_key).filter(|key| !key.is_null()) {
        execute(db, &statement).await?;
        return Ok(key.clone());
    }

    let backend = db.get_database_backend();
    if backend.support_returning() {
        statement.returning_col(Alias::new(primary_key));
        let key = returned_key(db, &statement, primary_key).await?;
        return key.ok_or_else(|| Error::RecordNotFound(format!("{} created without a key", model.name())));
    }

    let statement = backend.build(&statement);
    tracing::trace!(sql = %statement.sql, "Inserting row");
    let id = db.execute(statement).await?.last_insert_id();
    Ok(JsonValue::from(id))
}

async fn returned_key<C: ConnectionTrait>(
    db: &C,
    statement: &InsertStatement,
    primary_key: &str,
) -> Result<Option<JsonValue>> {
    let statement = db.get_database_backend().build(statement);
    tracing::trace!(sql = %statement.sql, "Inserting row");
    let row = JsonValue::find_by_statement(statement).one(db).await?;
    Ok(row.and_then(|mut row| row.get_mut(primary_key).map(JsonValue::take)))
}

async fn reload<C: ConnectionTrait>(db: &C, model: &'static dyn Model, key: &JsonValue) -> Result<Record> {
    let mut statement = Query::select();
    statement
        .column((Alias::new(model.table_name()), Asterisk))
        .from(Alias::new(model.table_name()))
        .and_where(key_column(model).eq(to_sql_value(key)))
        .limit(1);
    let row = select_one(db, &statement)
        .await?
        .ok_or_else(|| Error::RecordNotFound(format!("{} with key {key}", model.name())))?;
    Ok(Record::persisted(model, attributes(row)?))
}
