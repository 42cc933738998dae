//! IPC protocol types for daemon communication.

use crate::batch::NewItem;
use crate::error::ErrorKind;
use crate::tree::DependencyTree;
use crate::types::{ActivityRecord, Item, ItemProgress};
use serde::{Deserialize, Serialize};

/// Request sent from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Create a new item.
    CreateItem { item: NewItem },

    /// Add a dependency edge by item names.
    AddDependency {
        project_id: String,
        parent_name: String,
        dependency_name: String,
        qty: i64,
    },

    /// Insert many items without graph checks.
    BulkInsert { items: Vec<NewItem> },

    /// Get an item by ID.
    Get { id: String },

    /// Full dependency tree of an item.
    Tree { id: String },

    /// All items of a project.
    ProjectItems { project_id: String },

    /// Progress report for a project.
    Progress { project_id: String },

    /// Gated craft increment.
    Craft {
        item_id: String,
        user_id: String,
        increment_by: i64,
    },

    /// Raw contribution.
    Contribute { item_id: String, user_id: String, qty: i64 },

    /// Remove a contribution.
    RemoveContribution {
        item_id: String,
        user_id: String,
        contribution_id: String,
    },

    /// Recent activity for a project.
    Activity { project_id: String, limit: Option<usize> },

    /// Force flush pending writes to disk.
    Flush,

    /// Shutdown the daemon.
    Shutdown,

    /// Ping to check if daemon is alive.
    Ping,
}

/// Response sent from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Single item response.
    Item { item: Item },

    /// Multiple items response.
    Items { items: Vec<Item> },

    /// Dependency tree.
    Tree { tree: DependencyTree },

    /// Progress report.
    Progress { progress: Vec<ItemProgress> },

    /// Activity feed.
    Activity { records: Vec<ActivityRecord> },

    /// Item not found.
    NotFound { id: String },

    /// Operation succeeded.
    Ok,

    /// Pong response to ping.
    Pong,

    /// Error response.
    Error { kind: ErrorKind, message: String },
}

impl Response {
    /// Create an error response from a store error.
    pub fn error(report: &eyre::Report) -> Self {
        Self::Error {
            kind: ErrorKind::of(report),
            message: format!("{:#}", report),
        }
    }
}
