use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use sea_orm::JsonValue;
use sea_orm::sea_query::{BinOper, Expr, Func, SimpleExpr};

use crate::core::to_sql_value;
use crate::errors::{Error, Result};
use crate::query::QualifiedColumn;

// Runs of comparison characters split a relationship name from its count.
static COUNT_SUFFIX: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[><=]+").ok());

/// Comparison operators a condition spec may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `>`
    Greater,
    /// `<`
    Less,
    /// `>=`
    GreaterOrEqual,
    /// `<=`
    LessOrEqual,
    Like,
    NotLike,
    /// Case-insensitive LIKE, rendered as `UPPER(col) LIKE UPPER(value)` on every backend
    ILike,
    NotILike,
    /// Regular expression match (MySQL)
    RLike,
    NotRLike,
}

impl Operator {
    pub const ALL: [Self; 12] = [
        Self::Equal,
        Self::NotEqual,
        Self::Greater,
        Self::Less,
        Self::GreaterOrEqual,
        Self::LessOrEqual,
        Self::Like,
        Self::NotLike,
        Self::ILike,
        Self::NotILike,
        Self::RLike,
        Self::NotRLike,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Greater => ">",
            Self::Less => "<",
            Self::GreaterOrEqual => ">=",
            Self::LessOrEqual => "<=",
            Self::Like => "like",
            Self::NotLike => "not like",
            Self::ILike => "ilike",
            Self::NotILike => "not ilike",
            Self::RLike => "rlike",
            Self::NotRLike => "not rlike",
        }
    }

    /// Operators usable against a related-row count.
    #[must_use]
    pub const fn is_count_operator(self) -> bool {
        matches!(
            self,
            Self::Equal | Self::Greater | Self::Less | Self::GreaterOrEqual | Self::LessOrEqual
        )
    }

    /// `lhs <op> rhs`.
    #[must_use]
    pub fn apply(self, lhs: SimpleExpr, rhs: SimpleExpr) -> SimpleExpr {
        let binary = |op: BinOper, lhs: SimpleExpr, rhs: SimpleExpr| {
            SimpleExpr::Binary(Box::new(lhs), op, Box::new(rhs))
        };
        match self {
            Self::Equal => binary(BinOper::Equal, lhs, rhs),
            Self::NotEqual => binary(BinOper::NotEqual, lhs, rhs),
            Self::Greater => binary(BinOper::GreaterThan, lhs, rhs),
            Self::Less => binary(BinOper::SmallerThan, lhs, rhs),
            Self::GreaterOrEqual => binary(BinOper::GreaterThanOrEqual, lhs, rhs),
            Self::LessOrEqual => binary(BinOper::SmallerThanOrEqual, lhs, rhs),
            Self::Like => binary(BinOper::Like, lhs, rhs),
            Self::NotLike => binary(BinOper::NotLike, lhs, rhs),
            Self::ILike => binary(BinOper::Like, Func::upper(lhs).into(), Func::upper(rhs).into()),
            Self::NotILike => binary(BinOper::NotLike, Func::upper(lhs).into(), Func::upper(rhs).into()),
            Self::RLike => Expr::cust_with_exprs("? RLIKE ?", [lhs, rhs]),
            Self::NotRLike => Expr::cust_with_exprs("? NOT RLIKE ?", [lhs, rhs]),
        }
    }

    /// `column <op> value`. A null value turns `=`/`!=` into `IS NULL`/`IS NOT NULL`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedConditionSpec`] for array or object values, and for
    /// null compared with anything but `=`/`!=`.
    pub fn compare(self, column: &QualifiedColumn, value: &JsonValue) -> Result<SimpleExpr> {
        match (self, value) {
            (_, JsonValue::Array(_) | JsonValue::Object(_)) => Err(Error::malformed_condition(format!(
                "value for [{column}] must be a scalar, got {value}"
            ))),
            (Self::Equal, JsonValue::Null) => Ok(column.expr().is_null()),
            (Self::NotEqual, JsonValue::Null) => Ok(column.expr().is_not_null()),
            (_, JsonValue::Null) => Err(Error::malformed_condition(format!(
                "[{column}] can only be compared with null using = or !="
            ))),
            _ => Ok(self.apply(column.expr().into(), SimpleExpr::Value(to_sql_value(value)))),
        }
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == normalized)
            .ok_or_else(|| {
                tracing::debug!(operator = s, "Rejected filter operator");
                Error::InvalidFilterOperator(s.to_string())
            })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split `posts>=3` into (`posts`, `>=`, 3). Without a suffix the check is
/// `>= 1`.
///
/// # Errors
///
/// [`Error::MalformedConditionSpec`] for an empty name, a missing or non-integer
/// count, or trailing text; [`Error::InvalidFilterOperator`] for comparison runs
/// that are not count operators (`=>`, `==`).
pub fn parse_count_suffix(key: &str) -> Result<(String, Operator, i64)> {
    let pattern = COUNT_SUFFIX
        .as_ref()
        .ok_or_else(|| Error::malformed_condition("count pattern unavailable"))?;
    let key = key.trim();

    let Some(found) = pattern.find(key) else {
        if key.is_empty() {
            return Err(Error::malformed_condition("relationship name is empty"));
        }
        return Ok((key.to_string(), Operator::GreaterOrEqual, 1));
    };

    let relation = key[..found.start()].trim();
    if relation.is_empty() {
        return Err(Error::malformed_condition(format!("[{key}] has no relationship name")));
    }
    let operator: Operator = found.as_str().parse()?;
    if !operator.is_count_operator() {
        return Err(Error::InvalidFilterOperator(found.as_str().to_string()));
    }
    let count = key[found.end()..].trim();
    let count = count
        .parse::<i64>()
        .map_err(|_| Error::malformed_condition(format!("[{key}] needs an integer count after [{operator}]")))?;
    Ok((relation.to_string(), operator, count))
}

/// Relationship name of `key` with any comparison suffix dropped unread, so
/// `posts>=many` is just `posts`.
///
/// # Errors
///
/// [`Error::MalformedConditionSpec`] when no name is left.
pub fn strip_count_suffix(key: &str) -> Result<String> {
    let pattern = COUNT_SUFFIX
        .as_ref()
        .ok_or_else(|| Error::malformed_condition("count pattern unavailable"))?;
    let key = key.trim();
    let relation = pattern.find(key).map_or(key, |found| key[..found.start()].trim());
    if relation.is_empty() {
        return Err(Error::malformed_condition(format!("[{key}] has no relationship name")));
    }
    Ok(relation.to_string())
}
