use std::str::FromStr;

use sea_orm::JsonValue;
use sea_orm::sea_query::Order;
use serde::Deserialize;

use super::joins::{JoinStep, plan};
use crate::errors::{Error, Result};
use crate::query::{EntityQuery, QualifiedColumn};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim();
        if token.eq_ignore_ascii_case("asc") {
            Ok(Self::Asc)
        } else if token.eq_ignore_ascii_case("desc") {
            Ok(Self::Desc)
        } else {
            Err(Error::InvalidOrderDirection(s.to_string()))
        }
    }
}

impl From<Direction> for Order {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Asc => Self::Asc,
            Direction::Desc => Self::Desc,
        }
    }
}

/// A sort key: `"title"`, `"posts.created_at"`, or `{"title": "desc"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderSpec {
    /// Sorted in the configured default direction
    Column(String),
    Directed { column: String, direction: Direction },
}

impl OrderSpec {
    pub fn column(column: impl Into<String>) -> Self {
        Self::Column(column.into())
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self::Directed {
            column: column.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self::Directed {
            column: column.into(),
            direction: Direction::Desc,
        }
    }

    /// # Errors
    ///
    /// [`Error::InvalidOrderDirection`] unless `direction` is `asc`/`desc` in any case.
    pub fn directed(column: impl Into<String>, direction: &str) -> Result<Self> {
        Ok(Self::Directed {
            column: column.into(),
            direction: direction.parse()?,
        })
    }

    /// Parse `"column"` or `{"column": "asc|desc"}`.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedOrderSpec`] for any other shape, [`Error::InvalidOrderDirection`]
    /// for a bad direction.
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        match value {
            JsonValue::String(column) => Ok(Self::column(column.as_str())),
            JsonValue::Object(map) if map.len() == 1 => {
                let Some((column, direction)) = map.iter().next() else {
                    return Err(Error::malformed_order("empty order object"));
                };
                let direction = direction.as_str().ok_or_else(|| {
                    Error::malformed_order(format!("direction for [{column}] must be a string"))
                })?;
                Self::directed(column.as_str(), direction)
            }
            other => Err(Error::malformed_order(format!(
                "expected a column or a single column/direction pair, got {other}"
            ))),
        }
    }

    /// Parse a JSON array of order specs.
    ///
    /// # Errors
    ///
    /// Same as [`OrderSpec::from_json`], plus [`Error::MalformedOrderSpec`] when
    /// `value` is not an array.
    pub fn list_from_json(value: &JsonValue) -> Result<Vec<Self>> {
        value
            .as_array()
            .ok_or_else(|| Error::malformed_order("order specs must be an array"))?
            .iter()
            .map(Self::from_json)
            .collect()
    }

    fn parts(&self, default_direction: Direction) -> (&str, Direction) {
        match self {
            Self::Column(column) => (column.as_str(), default_direction),
            Self::Directed { column, direction } => (column.as_str(), *direction),
        }
    }
}

/// Resolve one spec against `query`: a bare column is qualified with the query's
/// table, `table.column` on the query's own table is kept, anything else is a
/// relationship path.
fn resolve(query: &EntityQuery, column: &str) -> Result<(Vec<JoinStep>, QualifiedColumn)> {
    let column = column.trim();
    if column.is_empty() {
        return Err(Error::malformed_order("order column is empty"));
    }
    if column.eq_ignore_ascii_case("asc") || column.eq_ignore_ascii_case("desc") {
        return Err(Error::malformed_order(format!(
            "[{column}] is a direction, provide an orderable column"
        )));
    }

    let segments: Vec<&str> = column.split('.').collect();
    match segments.as_slice() {
        [name] => Ok((Vec::new(), QualifiedColumn::new(query.table(), *name))),
        [table, name] if *table == query.table() && !name.is_empty() => {
            Ok((Vec::new(), QualifiedColumn::new(query.table(), *name)))
        }
        _ => plan(query.model(), &segments),
    }
}

/// Append `specs` to the query's ORDER BY in the given order, adding the joins
/// relationship paths need. Every spec is validated before the query changes.
///
/// # Errors
///
/// Any spec failing to resolve; the query is left untouched.
pub fn add_order(query: &mut EntityQuery, specs: &[OrderSpec], default_direction: Direction) -> Result<()> {
    let mut planned = Vec::with_capacity(specs.len());
    for spec in specs {
        let (column, direction) = spec.parts(default_direction);
        let (steps, column) = resolve(query, column)?;
        planned.push((steps, column, direction));
    }

    for (steps, column, direction) in planned {
        for step in steps {
            query.join(step);
        }
        query.order_by(column, direction.into());
    }
    Ok(())
}
