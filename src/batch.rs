//! Item creation specs, single and bulk.

use crate::id::{ITEM_PREFIX, generate_id};
use crate::types::{DependencyEdge, Item};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Specification for creating an item.
///
/// Deserializable so a bulk import file is just a JSON array of these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewItem {
    pub project_id: String,
    pub name: String,
    pub required_qty: i64,
    #[serde(default)]
    pub completed_qty: i64,
    #[serde(default)]
    pub dependencies: Vec<DependencyEdge>,
}

impl NewItem {
    /// Create a new spec with nothing crafted and no dependencies.
    pub fn new(project_id: impl Into<String>, name: impl Into<String>, required_qty: i64) -> Self {
        Self {
            project_id: project_id.into(),
            name: name.into(),
            required_qty,
            completed_qty: 0,
            dependencies: Vec::new(),
        }
    }

    /// Add a dependency edge.
    pub fn with_dependency(mut self, item_id: impl Into<String>, qty: i64) -> Self {
        self.dependencies.push(DependencyEdge::new(item_id, qty));
        self
    }

    /// Set how much is already crafted.
    pub fn with_completed(mut self, completed_qty: i64) -> Self {
        self.completed_qty = completed_qty;
        self
    }

    /// Materialize into an item with a fresh id.
    pub fn into_item(self, now: DateTime<Utc>) -> Item {
        let id = generate_id(ITEM_PREFIX, &format!("{}/{}", self.project_id, self.name), now);
        Item {
            id,
            project_id: self.project_id,
            name: self.name,
            required_qty: self.required_qty,
            completed_qty: self.completed_qty,
            dependencies: self.dependencies,
            contributions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
