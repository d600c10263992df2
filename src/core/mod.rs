// Entity collaborator seam, materialized records and target resolution

pub mod record;
pub mod resolver;
pub mod traits;

// Re-export commonly used items
pub use record::{Attributes, Record, attributes, to_sql_value, truthy};
pub use resolver::{ModelResolver, Resolved, Subject, Target};
pub use traits::{Model, Pivot, Relation, RelationKind};
