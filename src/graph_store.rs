//! The storage seam consumed by the graph engines.
//!
//! Engines only ever load and save whole item documents through this trait,
//! one at a time. Adapters do no validation of their own, so a store can hold
//! data (cycles, dangling edges) that the engines must tolerate.

use crate::types::{ActivityRecord, Item};
use eyre::{Result, bail};
use std::collections::{HashMap, HashSet};

/// Item and activity persistence used by the engines.
pub trait GraphStore {
    /// Fetch an item document, edges and contributions included.
    fn find_by_id(&self, id: &str) -> Result<Option<Item>>;

    /// Fetch an item by name within a project. With duplicate names the
    /// earliest created item wins.
    fn find_by_name(&self, project_id: &str, name: &str) -> Result<Option<Item>>;

    /// Insert or replace one item document.
    fn save(&mut self, item: &Item) -> Result<()>;

    /// Insert a batch of new item documents. Every id must be new, to the
    /// store and within the batch. No graph checks are applied.
    fn insert_many(&mut self, items: &[Item]) -> Result<()>;

    /// All items of a project, oldest first.
    fn items_in_project(&self, project_id: &str) -> Result<Vec<Item>>;

    /// Append to the activity ledger.
    fn record_activity(&mut self, record: &ActivityRecord) -> Result<()>;

    /// Most recent activity for a project, newest first.
    fn recent_activity(&self, project_id: &str, limit: usize) -> Result<Vec<ActivityRecord>>;
}

/// In-process [`GraphStore`] backed by plain collections.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    items: Vec<Item>,
    index: HashMap<String, usize>,
    activity: Vec<ActivityRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Every activity record, in insertion order.
    pub fn activity(&self) -> &[ActivityRecord] {
        &self.activity
    }
}

impl GraphStore for MemoryStore {
    fn find_by_id(&self, id: &str) -> Result<Option<Item>> {
        Ok(self.index.get(id).map(|&i| self.items[i].clone()))
    }

    fn find_by_name(&self, project_id: &str, name: &str) -> Result<Option<Item>> {
        Ok(self
            .items
            .iter()
            .find(|i| i.project_id == project_id && i.name == name)
            .cloned())
    }

    fn save(&mut self, item: &Item) -> Result<()> {
        match self.index.get(&item.id) {
            Some(&i) => self.items[i] = item.clone(),
            None => {
                self.index.insert(item.id.clone(), self.items.len());
                self.items.push(item.clone());
            }
        }
        Ok(())
    }

    fn insert_many(&mut self, items: &[Item]) -> Result<()> {
        let mut batch_ids = HashSet::new();
        for item in items {
            if self.index.contains_key(&item.id) || !batch_ids.insert(item.id.as_str()) {
                bail!("duplicate item id: {}", item.id);
            }
        }
        for item in items {
            self.save(item)?;
        }
        Ok(())
    }

    fn items_in_project(&self, project_id: &str) -> Result<Vec<Item>> {
        Ok(self
            .items
            .iter()
            .filter(|i| i.project_id == project_id)
            .cloned()
            .collect())
    }

    fn record_activity(&mut self, record: &ActivityRecord) -> Result<()> {
        self.activity.push(record.clone());
        Ok(())
    }

    fn recent_activity(&self, project_id: &str, limit: usize) -> Result<Vec<ActivityRecord>> {
        let mut records: Vec<ActivityRecord> = self
            .activity
            .iter()
            .rev()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect();
        // Stable sort keeps later inserts first among equal timestamps
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }
}
