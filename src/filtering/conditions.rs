//! Condition specs and their translation into predicates.
//!
//! Every `add_*` function compiles the whole spec list first and only then touches
//! the query, so a rejected spec leaves no partial filter behind.

use std::fmt;

use sea_orm::JsonValue;
use sea_orm::sea_query::{Condition, SimpleExpr};

use super::operators::{Operator, parse_count_suffix, strip_count_suffix};
use crate::core::Model;
use crate::errors::{Error, Result};
use crate::query::builder::Predicates;
use crate::query::relation::existence_expr;
use crate::query::{Connector, EntityQuery, QualifiedColumn};

/// Callback that adds predicates to a query, used for nested groups and
/// relationship constraints. Only predicates survive from a nested group; joins
/// and orders added there are dropped.
pub type Constraint = Box<dyn FnOnce(&mut EntityQuery) -> Result<()> + Send>;

/// One entry of a where list.
pub enum ConditionSpec {
    /// `column <operator> value`
    Basic {
        column: String,
        operator: Operator,
        value: JsonValue,
    },
    /// Parenthesized sub-list. Without a connector the entries are joined with the
    /// connector of the call that adds the group.
    Group {
        specs: Vec<ConditionSpec>,
        connector: Option<Connector>,
    },
    /// Parenthesized group built by a callback.
    Nested(Constraint),
}

impl fmt::Debug for ConditionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { column, operator, value } => f
                .debug_struct("Basic")
                .field("column", column)
                .field("operator", operator)
                .field("value", value)
                .finish(),
            Self::Group { specs, connector } => f
                .debug_struct("Group")
                .field("specs", specs)
                .field("connector", connector)
                .finish(),
            Self::Nested(_) => f.write_str("Nested(..)"),
        }
    }
}

impl ConditionSpec {
    /// # Errors
    ///
    /// [`Error::InvalidFilterOperator`] when `operator` is not allowed.
    pub fn new(column: impl Into<String>, operator: &str, value: impl Into<JsonValue>) -> Result<Self> {
        Ok(Self::Basic {
            column: column.into(),
            operator: operator.parse()?,
            value: value.into(),
        })
    }

    pub fn eq(column: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::Basic {
            column: column.into(),
            operator: Operator::Equal,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn group(specs: Vec<Self>, connector: Option<Connector>) -> Self {
        Self::Group { specs, connector }
    }

    pub fn nested<F>(callback: F) -> Self
    where
        F: FnOnce(&mut EntityQuery) -> Result<()> + Send + 'static,
    {
        Self::Nested(Box::new(callback))
    }

    /// Parse one spec:
    /// - `["column", value]` or `["column", "operator", value]`
    /// - `[[...], [...]]`, a group joined with the caller's connector
    /// - `{"and": [...]}` or `{"or": [...]}`, a group with its own connector
    ///
    /// # Errors
    ///
    /// [`Error::MalformedConditionSpec`] for other shapes,
    /// [`Error::InvalidFilterOperator`] for operators outside the allow-list.
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        match value {
            JsonValue::Array(items) if items.first().is_some_and(|first| first.is_array() || first.is_object()) => {
                Ok(Self::group(Self::parse_all(items)?, None))
            }
            JsonValue::Array(items) => {
                let column = items
                    .first()
                    .and_then(JsonValue::as_str)
                    .ok_or_else(|| Error::malformed_condition(format!("{value} must start with a column name")))?;
                match items.as_slice() {
                    [_, value] => Ok(Self::eq(column, value.clone())),
                    [_, operator, value] => {
                        let operator = operator.as_str().ok_or_else(|| {
                            Error::malformed_condition(format!("operator for [{column}] must be a string"))
                        })?;
                        Self::new(column, operator, value.clone())
                    }
                    _ => Err(Error::malformed_condition(format!(
                        "[{column}] needs 2 or 3 elements, got {}",
                        items.len()
                    ))),
                }
            }
            JsonValue::Object(map) if map.len() == 1 => {
                let (key, specs) = map
                    .iter()
                    .next()
                    .ok_or_else(|| Error::malformed_condition("empty group"))?;
                let connector = match key.to_lowercase().as_str() {
                    "and" => Connector::And,
                    "or" => Connector::Or,
                    _ => {
                        return Err(Error::malformed_condition(format!(
                            "group key must be \"and\" or \"or\", got [{key}]"
                        )));
                    }
                };
                let items = specs
                    .as_array()
                    .ok_or_else(|| Error::malformed_condition(format!("[{key}] group must hold a list")))?;
                Ok(Self::group(Self::parse_all(items)?, Some(connector)))
            }
            other => Err(Error::malformed_condition(format!("unrecognized condition {other}"))),
        }
    }

    /// Parse a JSON array of specs.
    ///
    /// # Errors
    ///
    /// See [`ConditionSpec::from_json`].
    pub fn list_from_json(value: &JsonValue) -> Result<Vec<Self>> {
        let items = value
            .as_array()
            .ok_or_else(|| Error::malformed_condition("conditions must be an array"))?;
        Self::parse_all(items)
    }

    fn parse_all(items: &[JsonValue]) -> Result<Vec<Self>> {
        items.iter().map(Self::from_json).collect()
    }
}

/// Compile one spec against `model`. `None` for groups that produced nothing.
fn compile(model: &'static dyn Model, spec: ConditionSpec, connector: Connector) -> Result<Option<Condition>> {
    match spec {
        ConditionSpec::Basic { column, operator, value } => {
            let expr = operator.compare(&QualifiedColumn::qualify(model.table_name(), &column), &value)?;
            Ok(Some(Condition::all().add(expr)))
        }
        ConditionSpec::Group { specs, connector: inner } => {
            let inner = inner.unwrap_or(connector);
            let mut predicates = Predicates::default();
            for spec in specs {
                if let Some(condition) = compile(model, spec, inner)? {
                    predicates.push(inner, condition);
                }
            }
            Ok(predicates.to_condition())
        }
        ConditionSpec::Nested(callback) => {
            let mut scratch = EntityQuery::new(model);
            callback(&mut scratch)?;
            Ok(scratch.predicate_condition())
        }
    }
}

/// Add flat, grouped and nested where conditions, each attached with `connector`.
///
/// # Errors
///
/// Fails on the first invalid spec without changing `query`.
pub fn add_flat_conditions(query: &mut EntityQuery, specs: Vec<ConditionSpec>, connector: Connector) -> Result<()> {
    let model = query.model();
    let mut compiled = Vec::with_capacity(specs.len());
    for spec in specs {
        if let Some(condition) = compile(model, spec, connector)? {
            compiled.push(condition);
        }
    }
    for condition in compiled {
        query.push(connector, condition);
    }
    Ok(())
}

/// Whether related rows must exist or must not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistenceMode {
    Has,
    DoesntHave,
}

/// A relationship count check such as `posts>=3`, optionally constrained.
pub struct RelationExistence {
    pub relation: String,
    pub operator: Operator,
    pub count: i64,
    constraint: Option<Constraint>,
}

impl fmt::Debug for RelationExistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationExistence")
            .field("relation", &self.relation)
            .field("operator", &self.operator)
            .field("count", &self.count)
            .field("constrained", &self.constraint.is_some())
            .finish()
    }
}

impl RelationExistence {
    /// At least one related row.
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            operator: Operator::GreaterOrEqual,
            count: 1,
            constraint: None,
        }
    }

    /// Parse `relation[<op><count>]`, e.g. `posts`, `posts>=3`, `roles=0`.
    ///
    /// # Errors
    ///
    /// See [`parse_count_suffix`].
    pub fn parse(key: &str) -> Result<Self> {
        let (relation, operator, count) = parse_count_suffix(key)?;
        Ok(Self {
            relation,
            operator,
            count,
            constraint: None,
        })
    }

    /// Parse `key` for a check in `mode`. [`ExistenceMode::DoesntHave`] always
    /// checks `< 1`, so its suffix is dropped without being read.
    ///
    /// # Errors
    ///
    /// See [`parse_count_suffix`] and [`strip_count_suffix`].
    pub fn parse_for(key: &str, mode: ExistenceMode) -> Result<Self> {
        match mode {
            ExistenceMode::Has => Self::parse(key),
            ExistenceMode::DoesntHave => Ok(Self {
                relation: strip_count_suffix(key)?,
                operator: Operator::Less,
                count: 1,
                constraint: None,
            }),
        }
    }

    /// Only count related rows matching `callback`.
    #[must_use]
    pub fn with_constraint<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&mut EntityQuery) -> Result<()> + Send + 'static,
    {
        self.constraint = Some(Box::new(callback));
        self
    }

    /// Parse `["posts", "comments>=2"]` or `{"posts>=2": null, "roles": [["name", "admin"]]}`.
    /// An object value that is a list of condition specs constrains the related rows.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedConditionSpec`] for other shapes, or the errors of
    /// [`RelationExistence::parse`] and [`ConditionSpec::list_from_json`].
    pub fn from_json(value: &JsonValue) -> Result<Vec<Self>> {
        Self::from_json_for(value, ExistenceMode::Has)
    }

    /// [`RelationExistence::from_json`] with keys read by
    /// [`RelationExistence::parse_for`], for lists headed to a `doesnt have` check.
    ///
    /// # Errors
    ///
    /// Same as [`RelationExistence::from_json`].
    pub fn from_json_for(value: &JsonValue, mode: ExistenceMode) -> Result<Vec<Self>> {
        match value {
            JsonValue::Array(keys) => keys
                .iter()
                .map(|key| {
                    key.as_str()
                        .ok_or_else(|| Error::malformed_condition(format!("relationship must be a string, got {key}")))
                        .and_then(|key| Self::parse_for(key, mode))
                })
                .collect(),
            JsonValue::Object(map) => map
                .iter()
                .map(|(key, constraint)| {
                    let existence = Self::parse_for(key, mode)?;
                    match constraint {
                        JsonValue::Null => Ok(existence),
                        JsonValue::Array(_) => {
                            let specs = ConditionSpec::list_from_json(constraint)?;
                            Ok(existence.with_constraint(move |query| {
                                add_flat_conditions(query, specs, Connector::And)
                            }))
                        }
                        other => Err(Error::malformed_condition(format!(
                            "constraint for [{key}] must be null or a list of conditions, got {other}"
                        ))),
                    }
                })
                .collect(),
            other => Err(Error::malformed_condition(format!(
                "relationship checks must be an array or object, got {other}"
            ))),
        }
    }
}

/// Build the existence predicate for `existence` on `model`. In
/// [`ExistenceMode::DoesntHave`] the check is always `< 1`, whatever was parsed.
pub(crate) fn existence_condition(
    model: &'static dyn Model,
    existence: RelationExistence,
    mode: ExistenceMode,
) -> Result<SimpleExpr> {
    let (operator, count) = match mode {
        ExistenceMode::Has => (existence.operator, existence.count),
        ExistenceMode::DoesntHave => (Operator::Less, 1),
    };
    let relation = model.require_relation(&existence.relation)?;
    let mut related = EntityQuery::new(relation.related);
    if let Some(constraint) = existence.constraint {
        constraint(&mut related)?;
    }
    existence_expr(model, &relation, related, operator, count)
}

/// Add `has`/`doesnt have` checks, each attached with `connector`.
///
/// # Errors
///
/// Fails on the first unknown or unsupported relationship, or failing
/// constraint, without changing `query`.
pub fn add_relation_existence(
    query: &mut EntityQuery,
    specs: Vec<RelationExistence>,
    mode: ExistenceMode,
    connector: Connector,
) -> Result<()> {
    let model = query.model();
    let compiled = specs
        .into_iter()
        .map(|existence| existence_condition(model, existence, mode))
        .collect::<Result<Vec<_>>>()?;
    for expr in compiled {
        query.push(connector, Condition::all().add(expr));
    }
    Ok(())
}

enum PropertyConstraint {
    Compare {
        column: String,
        operator: Operator,
        value: JsonValue,
    },
    Using(Constraint),
}

/// A condition on related rows: "has a related row where ...".
pub struct RelationProperty {
    pub relation: String,
    constraint: PropertyConstraint,
}

impl fmt::Debug for RelationProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("RelationProperty");
        s.field("relation", &self.relation);
        if let PropertyConstraint::Compare { column, operator, value } = &self.constraint {
            s.field("column", column).field("operator", operator).field("value", value);
        }
        s.finish_non_exhaustive()
    }
}

impl RelationProperty {
    /// # Errors
    ///
    /// [`Error::InvalidFilterOperator`] when `operator` is not allowed.
    pub fn new(
        relation: impl Into<String>,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<JsonValue>,
    ) -> Result<Self> {
        Ok(Self {
            relation: relation.into(),
            constraint: PropertyConstraint::Compare {
                column: column.into(),
                operator: operator.parse()?,
                value: value.into(),
            },
        })
    }

    pub fn eq(relation: impl Into<String>, column: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self {
            relation: relation.into(),
            constraint: PropertyConstraint::Compare {
                column: column.into(),
                operator: Operator::Equal,
                value: value.into(),
            },
        }
    }

    pub fn using<F>(relation: impl Into<String>, callback: F) -> Self
    where
        F: FnOnce(&mut EntityQuery) -> Result<()> + Send + 'static,
    {
        Self {
            relation: relation.into(),
            constraint: PropertyConstraint::Using(Box::new(callback)),
        }
    }

    fn from_parts(relation: &str, parts: &[JsonValue]) -> Result<Self> {
        let column = parts
            .first()
            .and_then(JsonValue::as_str)
            .ok_or_else(|| Error::malformed_condition(format!("[{relation}] condition must start with a column")))?;
        match parts {
            [_, value] => Ok(Self::eq(relation, column, value.clone())),
            [_, operator, value] => {
                let operator = operator
                    .as_str()
                    .ok_or_else(|| Error::malformed_condition(format!("operator for [{relation}.{column}] must be a string")))?;
                Self::new(relation, column, operator, value.clone())
            }
            _ => Err(Error::malformed_condition(format!(
                "[{relation}] condition needs a column, an optional operator and a value"
            ))),
        }
    }

    /// Parse `["posts", "title", "like", "%rust%"]`, a list of such arrays, or
    /// `{"posts": ["published", true]}`.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedConditionSpec`] for other shapes or arities,
    /// [`Error::InvalidFilterOperator`] for operators outside the allow-list.
    pub fn from_json(value: &JsonValue) -> Result<Vec<Self>> {
        match value {
            JsonValue::Array(items) if items.first().is_some_and(JsonValue::is_string) => {
                Ok(vec![Self::from_array(items)?])
            }
            JsonValue::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_array()
                        .ok_or_else(|| Error::malformed_condition(format!("relation condition must be an array, got {item}")))
                        .and_then(|parts| Self::from_array(parts))
                })
                .collect(),
            JsonValue::Object(map) => map
                .iter()
                .map(|(relation, parts)| {
                    let parts = parts
                        .as_array()
                        .ok_or_else(|| Error::malformed_condition(format!("[{relation}] condition must be an array")))?;
                    Self::from_parts(relation, parts)
                })
                .collect(),
            other => Err(Error::malformed_condition(format!(
                "relation conditions must be an array or object, got {other}"
            ))),
        }
    }

    fn from_array(items: &[JsonValue]) -> Result<Self> {
        let Some((relation, parts)) = items.split_first() else {
            return Err(Error::malformed_condition("empty relation condition"));
        };
        let relation = relation
            .as_str()
            .ok_or_else(|| Error::malformed_condition("relation condition must start with a relationship name"))?;
        if !(3..=4).contains(&items.len()) {
            return Err(Error::malformed_condition(format!(
                "[{relation}] condition needs 3 or 4 elements, got {}",
                items.len()
            )));
        }
        Self::from_parts(relation, parts)
    }

    fn into_existence(self) -> RelationExistence {
        let existence = RelationExistence::new(self.relation);
        match self.constraint {
            PropertyConstraint::Compare { column, operator, value } => existence.with_constraint(move |query| {
                let expr = operator.compare(&query.qualify(&column), &value)?;
                query.push(Connector::And, Condition::all().add(expr));
                Ok(())
            }),
            PropertyConstraint::Using(callback) => RelationExistence {
                constraint: Some(callback),
                ..existence
            },
        }
    }
}

/// Add "has a related row where ..." checks, each attached with `connector`.
///
/// # Errors
///
/// Fails on the first invalid spec without changing `query`.
pub fn add_relation_property(query: &mut EntityQuery, specs: Vec<RelationProperty>, connector: Connector) -> Result<()> {
    let existences = specs.into_iter().map(RelationProperty::into_existence).collect();
    add_relation_existence(query, existences, ExistenceMode::Has, connector)
}
