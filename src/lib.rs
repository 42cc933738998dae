//! CraftChain: a crafting dependency graph with gated progress tracking.
//!
//! Items in a project require quantities of other items. CraftChain keeps the
//! graph acyclic, renders full dependency trees, gates crafting on dependency
//! completion and keeps a per-user contribution ledger. The JSONL files under
//! `.craftchain/` are the source of truth; SQLite is a rebuildable cache.
//!
//! # Example
//!
//! ```no_run
//! use craftchain::{NewItem, Store};
//! use std::path::Path;
//!
//! let mut store = Store::init(Path::new(".")).unwrap();
//!
//! let blade = store.create_item(NewItem::new("forge", "Blade", 1)).unwrap();
//! let sword = store
//!     .create_item(NewItem::new("forge", "Sword", 1).with_dependency(&blade.id, 1))
//!     .unwrap();
//!
//! // Blocked until the blade is crafted
//! assert!(store.craft(&sword.id, "alice", 1).is_err());
//!
//! store.craft(&blade.id, "alice", 1).unwrap();
//! let sword = store.craft(&sword.id, "alice", 1).unwrap();
//! assert!(sword.is_complete());
//!
//! let tree = store.tree(&sword.id).unwrap();
//! assert_eq!(tree.node_count(), 2);
//! ```

mod batch;
mod config;
mod craft;
mod cycle;
mod error;
mod graph_store;
mod id;
mod ledger;
mod storage;
mod store;
mod tree;
mod types;

pub mod client;
pub mod daemon;
pub mod protocol;

// Re-export public API
pub use batch::NewItem;
pub use client::Client;
pub use config::Config;
pub use craft::{CraftEngine, ResolvedEdge};
pub use cycle::CycleGuard;
pub use daemon::{Daemon, DaemonConfig, is_daemon_running, start_daemon};
pub use error::{CraftError, ErrorKind, RemoteError};
pub use graph_store::{GraphStore, MemoryStore};
pub use ledger::ContributionLedger;
pub use protocol::{Request, Response};
pub use storage::{STORE_DIR, Storage};
pub use store::Store;
pub use tree::{DependencyTree, TreeBuilder, TreeChild, TreeEntry, TreeNode};
pub use types::{
    ActivityKind, ActivityRecord, Contribution, DependencyEdge, Item, ItemProgress, MAX_NAME_LEN, ValidationError,
};
