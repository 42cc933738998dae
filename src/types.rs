//! Core data types for the CraftChain item graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Maximum length of an item name.
pub const MAX_NAME_LEN: usize = 200;

/// A craftable unit with a quantity target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    /// Unique identifier: "it-" + 10 hex chars
    pub id: String,

    /// Owning project
    pub project_id: String,

    /// Display name, expected to be unique within the project
    pub name: String,

    /// How many must be finished
    pub required_qty: i64,

    /// How many have been crafted so far (never above required_qty)
    #[serde(default)]
    pub completed_qty: i64,

    /// Items that must be crafted first, in insertion order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyEdge>,

    /// Raw pledges recorded against this item
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contributions: Vec<Contribution>,

    /// When created
    pub created_at: DateTime<Utc>,

    /// Last modification
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Sum of all raw contribution quantities.
    ///
    /// This is a separate progress signal from `completed_qty` and is never
    /// folded into it.
    pub fn contributed_qty(&self) -> i64 {
        self.contributions.iter().map(|c| c.qty).sum()
    }

    /// Whether the item has reached its target.
    pub fn is_complete(&self) -> bool {
        self.completed_qty >= self.required_qty
    }

    /// Whether an edge to `item_id` already exists.
    pub fn depends_on(&self, item_id: &str) -> bool {
        self.dependencies.iter().any(|d| d.item_id == item_id)
    }
}

/// "This item needs `qty` of that item completed first."
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyEdge {
    /// The item being depended on
    pub item_id: String,

    /// Quantity of the dependency required by this edge
    pub qty: i64,
}

impl DependencyEdge {
    pub fn new(item_id: impl Into<String>, qty: i64) -> Self {
        Self {
            item_id: item_id.into(),
            qty,
        }
    }
}

/// A raw pledge embedded on an item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contribution {
    /// Identifier: "ct-" + 10 hex chars
    pub id: String,

    /// Contributing user
    pub user_id: String,

    pub qty: i64,

    pub created_at: DateTime<Utc>,
}

/// How an activity entry came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Gated craft increment
    Crafted,

    /// Resource drop-off
    Resource,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Crafted => "crafted",
            ActivityKind::Resource => "resource",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "crafted" => Some(ActivityKind::Crafted),
            "resource" => Some(ActivityKind::Resource),
            _ => None,
        }
    }
}

/// Entry in the project activity ledger.
///
/// Kept apart from the contributions embedded on items: this is the durable
/// history written by the craft path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityRecord {
    /// Identifier: "ac-" + 10 hex chars
    pub id: String,
    pub user_id: String,
    pub project_id: String,
    pub item_id: String,
    /// The requested increment, before any clamping
    pub quantity: i64,
    pub kind: ActivityKind,
    pub created_at: DateTime<Utc>,
}

/// Both progress signals for one item, side by side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemProgress {
    pub id: String,
    pub name: String,
    pub required_qty: i64,
    pub completed_qty: i64,
    pub contributed_qty: i64,
}

impl From<&Item> for ItemProgress {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            required_qty: item.required_qty,
            completed_qty: item.completed_qty,
            contributed_qty: item.contributed_qty(),
        }
    }
}

/// Validation errors for items.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyName,
    NameTooLong,
    InvalidCharacters,
    EmptyProject,
    NonPositiveRequiredQty(i64),
    CompletedOutOfRange { completed: i64, required: i64 },
    NonPositiveEdgeQty(String),
    DuplicateEdge(String),
    SelfEdge,
    NonPositiveContribution(String),
    InvalidTimestamp,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyName => write!(f, "name cannot be empty"),
            ValidationError::NameTooLong => {
                write!(f, "name cannot exceed {} characters", MAX_NAME_LEN)
            }
            ValidationError::InvalidCharacters => write!(f, "name contains control characters"),
            ValidationError::EmptyProject => write!(f, "project id cannot be empty"),
            ValidationError::NonPositiveRequiredQty(qty) => {
                write!(f, "required quantity must be positive, got {}", qty)
            }
            ValidationError::CompletedOutOfRange { completed, required } => {
                write!(f, "completed quantity {} outside 0..={}", completed, required)
            }
            ValidationError::NonPositiveEdgeQty(id) => {
                write!(f, "dependency quantity for {} must be positive", id)
            }
            ValidationError::DuplicateEdge(id) => write!(f, "duplicate dependency on {}", id),
            ValidationError::SelfEdge => write!(f, "item cannot depend on itself"),
            ValidationError::NonPositiveContribution(id) => {
                write!(f, "contribution {} must have a positive quantity", id)
            }
            ValidationError::InvalidTimestamp => write!(f, "updated_at cannot be before created_at"),
        }
    }
}

impl std::error::Error for ValidationError {}

impl Item {
    /// Validate the item's fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        // Name: required, bounded, printable
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(ValidationError::NameTooLong);
        }
        if self.name.chars().any(|c| c.is_control()) {
            return Err(ValidationError::InvalidCharacters);
        }

        if self.project_id.trim().is_empty() {
            return Err(ValidationError::EmptyProject);
        }

        if self.required_qty <= 0 {
            return Err(ValidationError::NonPositiveRequiredQty(self.required_qty));
        }
        if self.completed_qty < 0 || self.completed_qty > self.required_qty {
            return Err(ValidationError::CompletedOutOfRange {
                completed: self.completed_qty,
                required: self.required_qty,
            });
        }

        let mut seen = HashSet::new();
        for edge in &self.dependencies {
            if edge.item_id == self.id {
                return Err(ValidationError::SelfEdge);
            }
            if edge.qty <= 0 {
                return Err(ValidationError::NonPositiveEdgeQty(edge.item_id.clone()));
            }
            if !seen.insert(edge.item_id.as_str()) {
                return Err(ValidationError::DuplicateEdge(edge.item_id.clone()));
            }
        }

        for contribution in &self.contributions {
            if contribution.qty <= 0 {
                return Err(ValidationError::NonPositiveContribution(contribution.id.clone()));
            }
        }

        if self.updated_at < self.created_at {
            return Err(ValidationError::InvalidTimestamp);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_item(name: &str) -> Item {
        let now = Utc::now();
        Item {
            id: "it-test123456".to_string(),
            project_id: "pr-forge".to_string(),
            name: name.to_string(),
            required_qty: 5,
            completed_qty: 0,
            dependencies: vec![],
            contributions: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn make_contribution(id: &str, qty: i64) -> Contribution {
        Contribution {
            id: id.to_string(),
            user_id: "alice".to_string(),
            qty,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_item_validation_valid() {
        let item = make_item("Iron Ingot");
        assert!(item.validate().is_ok());
    }

    #[test]
    fn test_item_validation_empty_name() {
        assert_eq!(make_item("").validate(), Err(ValidationError::EmptyName));
        assert_eq!(make_item("   ").validate(), Err(ValidationError::EmptyName));
    }

    #[test]
    fn test_item_validation_name_too_long() {
        let item = make_item(&"x".repeat(MAX_NAME_LEN + 1));
        assert_eq!(item.validate(), Err(ValidationError::NameTooLong));
    }

    #[test]
    fn test_item_validation_control_chars() {
        let item = make_item("Hilt\x00");
        assert_eq!(item.validate(), Err(ValidationError::InvalidCharacters));
    }

    #[test]
    fn test_item_validation_quantities() {
        let mut item = make_item("Blade");
        item.required_qty = 0;
        assert_eq!(item.validate(), Err(ValidationError::NonPositiveRequiredQty(0)));

        let mut item = make_item("Blade");
        item.completed_qty = 6;
        assert_eq!(
            item.validate(),
            Err(ValidationError::CompletedOutOfRange {
                completed: 6,
                required: 5
            })
        );
    }

    #[test]
    fn test_item_validation_edges() {
        let mut item = make_item("Sword");
        item.dependencies = vec![DependencyEdge::new("it-a", 2), DependencyEdge::new("it-a", 1)];
        assert_eq!(item.validate(), Err(ValidationError::DuplicateEdge("it-a".to_string())));

        item.dependencies = vec![DependencyEdge::new("it-a", 0)];
        assert_eq!(
            item.validate(),
            Err(ValidationError::NonPositiveEdgeQty("it-a".to_string()))
        );

        item.dependencies = vec![DependencyEdge::new(item.id.clone(), 1)];
        assert_eq!(item.validate(), Err(ValidationError::SelfEdge));
    }

    #[test]
    fn test_item_validation_contribution_qty() {
        let mut item = make_item("Sword");
        item.contributions = vec![make_contribution("ct-bad", -1)];
        assert_eq!(
            item.validate(),
            Err(ValidationError::NonPositiveContribution("ct-bad".to_string()))
        );
    }

    #[test]
    fn test_contributed_qty_is_independent_of_completed() {
        let mut item = make_item("Sword");
        item.completed_qty = 1;
        item.contributions = vec![make_contribution("ct-1", 3), make_contribution("ct-2", 4)];
        assert_eq!(item.contributed_qty(), 7);
        assert_eq!(item.completed_qty, 1);

        let progress = ItemProgress::from(&item);
        assert_eq!(progress.contributed_qty, 7);
        assert_eq!(progress.completed_qty, 1);
    }

    #[test]
    fn test_activity_kind_strings() {
        assert_eq!(ActivityKind::Crafted.as_str(), "crafted");
        assert_eq!(ActivityKind::parse("resource"), Some(ActivityKind::Resource));
        assert_eq!(ActivityKind::parse("gift"), None);
    }

    #[test]
    fn test_item_deserializes_without_optional_fields() {
        let json = r#"{"id":"it-0000000001","project_id":"p","name":"Nail","required_qty":3,
            "created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z"}"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.completed_qty, 0);
        assert!(item.dependencies.is_empty());
        assert!(item.contributions.is_empty());
    }
}
