//! High-level store API for CraftChain.
//!
//! Each method here is one operation of the serving surface; the daemon and
//! CLI map onto them one to one.

use crate::batch::NewItem;
use crate::config::Config;
use crate::craft::CraftEngine;
use crate::cycle::{CycleGuard, would_create_cycle};
use crate::error::CraftError;
use crate::graph_store::{GraphStore, MemoryStore};
use crate::ledger::ContributionLedger;
use crate::storage::Storage;
use crate::tree::{DependencyTree, TreeBuilder};
use crate::types::{ActivityRecord, Item, ItemProgress};
use chrono::Utc;
use eyre::{Context, Result};
use std::path::Path;

/// The main CraftChain store.
pub struct Store<S: GraphStore = Storage> {
    backend: S,
    config: Config,
}

impl Store<Storage> {
    /// Initialize a new store in the given directory.
    pub fn init(root: &Path) -> Result<Self> {
        let storage = Storage::init(root)?;
        let config = Config::load(root)?;
        Ok(Self::with_backend(storage, config))
    }

    /// Open an existing store.
    pub fn open(root: &Path) -> Result<Self> {
        let storage = Storage::open(root)?;
        let config = Config::load(root)?;
        Ok(Self::with_backend(storage, config))
    }
}

impl Store<MemoryStore> {
    /// A throwaway store that lives only in memory.
    pub fn in_memory() -> Self {
        Self::with_backend(MemoryStore::new(), Config::default())
    }
}

impl<S: GraphStore> Store<S> {
    /// Wrap any backend.
    pub fn with_backend(backend: S, config: Config) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Mutable access to the backend, bypassing all graph checks.
    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    /// Create an item. Each dependency must exist and must not lead back to
    /// an item carrying the new item's name.
    pub fn create_item(&mut self, spec: NewItem) -> Result<Item> {
        let item = spec.into_item(Utc::now());
        item.validate()
            .map_err(|e| eyre::eyre!(CraftError::Validation(e)))?;

        for edge in &item.dependencies {
            let dependency = self
                .backend
                .find_by_id(&edge.item_id)?
                .ok_or_else(|| eyre::eyre!(CraftError::ItemNotFound(edge.item_id.clone())))?;

            if would_create_cycle(&self.backend, &dependency.id, &item.name)? {
                return Err(eyre::eyre!(CraftError::CycleDetected {
                    parent: item.name.clone(),
                    dependency: dependency.name,
                }));
            }
        }

        self.backend.save(&item).context("Failed to persist item")?;
        log::info!("Created item {} ({}) in {}", item.id, item.name, item.project_id);
        Ok(item)
    }

    /// Add a dependency edge between two items named within a project.
    pub fn add_dependency(
        &mut self,
        project_id: &str,
        parent_name: &str,
        dependency_name: &str,
        qty: i64,
    ) -> Result<Item> {
        CycleGuard::new(&mut self.backend).add_edge_by_name(project_id, parent_name, dependency_name, qty)
    }

    /// Insert many items at once. Fields are validated up front; the graph is
    /// not checked for cycles or dangling edges.
    pub fn insert_many(&mut self, specs: Vec<NewItem>) -> Result<Vec<Item>> {
        let now = Utc::now();
        let items: Vec<Item> = specs.into_iter().map(|s| s.into_item(now)).collect();

        for (index, item) in items.iter().enumerate() {
            item.validate().map_err(|e| {
                eyre::eyre!(CraftError::InvalidInput(format!("item {} ({}): {}", index, item.name, e)))
            })?;
        }

        self.backend
            .insert_many(&items)
            .context("Failed to persist bulk insert")?;
        log::info!("Bulk inserted {} items", items.len());
        Ok(items)
    }

    /// Get an item by ID.
    pub fn get(&self, id: &str) -> Result<Option<Item>> {
        self.backend.find_by_id(id)
    }

    /// Full dependency tree rooted at an item.
    pub fn tree(&self, id: &str) -> Result<DependencyTree> {
        TreeBuilder::new(&self.backend).build_tree(id)
    }

    /// All items of a project, contributions included.
    pub fn project_items(&self, project_id: &str) -> Result<Vec<Item>> {
        self.backend.items_in_project(project_id)
    }

    /// Both progress signals for every item of a project.
    pub fn progress(&self, project_id: &str) -> Result<Vec<ItemProgress>> {
        Ok(self
            .project_items(project_id)?
            .iter()
            .map(ItemProgress::from)
            .collect())
    }

    /// Gated craft increment.
    pub fn craft(&mut self, item_id: &str, user_id: &str, increment_by: i64) -> Result<Item> {
        require_user(user_id)?;
        CraftEngine::new(&mut self.backend).apply_progress(item_id, user_id, increment_by)
    }

    /// Raw contribution, no dependency gate.
    pub fn contribute(&mut self, item_id: &str, user_id: &str, qty: i64) -> Result<Item> {
        require_user(user_id)?;
        ContributionLedger::new(&mut self.backend).append(item_id, user_id, qty)
    }

    /// Remove a contribution; absent ids are a no-op.
    pub fn remove_contribution(&mut self, item_id: &str, user_id: &str, contribution_id: &str) -> Result<Item> {
        require_user(user_id)?;
        ContributionLedger::new(&mut self.backend).remove(item_id, contribution_id)
    }

    /// Sum of raw contributions on an item.
    pub fn contribution_total(&mut self, item_id: &str) -> Result<i64> {
        ContributionLedger::new(&mut self.backend).aggregate(item_id)
    }

    /// Recent craft activity for a project, newest first. `None` uses the
    /// configured cap.
    pub fn activity(&self, project_id: &str, limit: Option<usize>) -> Result<Vec<ActivityRecord>> {
        let limit = limit.unwrap_or(self.config.activity_limit);
        self.backend.recent_activity(project_id, limit)
    }
}

fn require_user(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(eyre::eyre!(CraftError::InvalidInput(
            "a user identity is required".to_string()
        )));
    }
    Ok(())
}
