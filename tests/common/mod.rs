//! Shared test infrastructure for CraftChain integration tests.
//!
//! Provides TestEnv helper for consistent test setup/teardown.

#![allow(dead_code)]

use craftchain::{ErrorKind, Item, NewItem, Store};
use tempfile::TempDir;

/// Project every helper creates items in.
pub const PROJECT: &str = "pr-forge";

/// Default acting user.
pub const USER: &str = "alice";

/// Test environment with automatic cleanup.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub store: Store,
}

impl TestEnv {
    /// Create a new test environment with an initialized store.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Store::init(temp_dir.path()).expect("Failed to init store");
        Self { temp_dir, store }
    }

    /// Drop the store handle and open it again from disk.
    pub fn reopen(&mut self) {
        self.store = Store::open(self.temp_dir.path()).expect("Failed to reopen store");
    }

    /// Create an item with no dependencies.
    pub fn create_item(&mut self, name: &str, required_qty: i64) -> Item {
        self.store
            .create_item(NewItem::new(PROJECT, name, required_qty))
            .expect("Failed to create item")
    }

    /// Create an item requiring the given (item, qty) pairs.
    pub fn create_item_with_deps(&mut self, name: &str, required_qty: i64, deps: &[(&Item, i64)]) -> Item {
        let spec = deps
            .iter()
            .fold(NewItem::new(PROJECT, name, required_qty), |spec, (dep, qty)| {
                spec.with_dependency(&dep.id, *qty)
            });
        self.store.create_item(spec).expect("Failed to create item")
    }

    /// Add an edge by names, expecting success.
    pub fn link(&mut self, parent: &str, dependency: &str, qty: i64) -> Item {
        self.store
            .add_dependency(PROJECT, parent, dependency, qty)
            .expect("Failed to add dependency")
    }

    /// Craft as the default user, expecting success.
    pub fn craft(&mut self, item: &Item, qty: i64) -> Item {
        self.store.craft(&item.id, USER, qty).expect("Failed to craft")
    }

    /// Re-read an item from the store.
    pub fn reload(&self, item: &Item) -> Item {
        self.store
            .get(&item.id)
            .expect("Failed to get item")
            .expect("Item vanished")
    }

    /// Number of items in the default project.
    pub fn item_count(&self) -> usize {
        self.store.project_items(PROJECT).expect("Failed to list items").len()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert that a result failed with the given error kind.
pub fn assert_kind<T: std::fmt::Debug>(result: eyre::Result<T>, kind: ErrorKind) -> eyre::Report {
    match result {
        Ok(value) => panic!("Expected {} error, got Ok({:?})", kind, value),
        Err(e) => {
            assert_eq!(ErrorKind::of(&e), kind, "unexpected error: {:#}", e);
            e
        }
    }
}
