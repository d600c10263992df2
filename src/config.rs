use serde::Deserialize;

use crate::filtering::Direction;

/// Runtime policy for an [`EasyModel`](crate::EasyModel) chain.
///
/// Deserializable so a host can keep it next to the rest of its settings:
/// ```json
/// {"touch_updated_at": false, "default_direction": "desc"}
/// ```
/// Missing keys fall back to [`Config::default`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Stamp the model's `updated_at` column with `CURRENT_TIMESTAMP` when a bulk
    /// increment or decrement runs. Only applies to models that declare one.
    pub touch_updated_at: bool,
    /// Direction used for order specs given as a bare column.
    pub default_direction: Direction,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            touch_updated_at: true,
            default_direction: Direction::Asc,
        }
    }
}
