//! Raw contributions embedded on items.
//!
//! Unlike crafting, pledges are never gated on dependencies and never touch
//! `completed_qty`.

use crate::error::CraftError;
use crate::graph_store::GraphStore;
use crate::id::{CONTRIBUTION_PREFIX, generate_id};
use crate::types::{Contribution, Item};
use chrono::Utc;
use eyre::{Context, Result};

/// Records and removes contributions on items.
pub struct ContributionLedger<'a, S: GraphStore> {
    store: &'a mut S,
}

impl<'a, S: GraphStore> ContributionLedger<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    fn load(&self, item_id: &str) -> Result<Item> {
        self.store
            .find_by_id(item_id)?
            .ok_or_else(|| eyre::eyre!(CraftError::ItemNotFound(item_id.to_string())))
    }

    /// Pledge `qty` toward an item on behalf of `user_id`.
    pub fn append(&mut self, item_id: &str, user_id: &str, qty: i64) -> Result<Item> {
        if qty <= 0 {
            return Err(eyre::eyre!(CraftError::InvalidInput(format!(
                "contribution quantity must be positive, got {}",
                qty
            ))));
        }

        let mut item = self.load(item_id)?;
        let now = Utc::now();
        item.contributions.push(Contribution {
            id: generate_id(CONTRIBUTION_PREFIX, user_id, now),
            user_id: user_id.to_string(),
            qty,
            created_at: now,
        });
        item.updated_at = now;

        self.store.save(&item).context("Failed to persist contribution")?;
        log::debug!("{} contributed {} to {}", user_id, qty, item.id);
        Ok(item)
    }

    /// Remove a contribution by id. Removing an id that isn't there returns
    /// the item untouched and writes nothing.
    pub fn remove(&mut self, item_id: &str, contribution_id: &str) -> Result<Item> {
        let mut item = self.load(item_id)?;

        let before = item.contributions.len();
        item.contributions.retain(|c| c.id != contribution_id);
        if item.contributions.len() == before {
            log::debug!("No contribution {} on {}", contribution_id, item.id);
            return Ok(item);
        }

        item.updated_at = Utc::now();
        self.store
            .save(&item)
            .context("Failed to persist contribution removal")?;
        Ok(item)
    }

    /// Sum of contributed quantities for an item.
    pub fn aggregate(&self, item_id: &str) -> Result<i64> {
        Ok(self.load(item_id)?.contributed_qty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::graph_store::MemoryStore;
    use crate::types::DependencyEdge;

    fn setup() -> MemoryStore {
        let mut store = MemoryStore::new();
        let now = Utc::now();
        store
            .save(&Item {
                id: "it-wall".to_string(),
                project_id: "pr-keep".to_string(),
                name: "Wall".to_string(),
                required_qty: 100,
                completed_qty: 0,
                dependencies: vec![DependencyEdge::new("it-stone", 50)],
                contributions: vec![],
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        store
    }

    #[test]
    fn test_append_ignores_dependencies_and_completed() {
        let mut store = setup();
        let mut ledger = ContributionLedger::new(&mut store);

        ledger.append("it-wall", "alice", 30).unwrap();
        let item = ledger.append("it-wall", "bob", 12).unwrap();

        assert_eq!(item.contributions.len(), 2);
        assert_eq!(item.contributions[1].user_id, "bob");
        assert!(item.contributions[0].id.starts_with("ct-"));
        assert_eq!(item.completed_qty, 0);
        assert_eq!(ledger.aggregate("it-wall").unwrap(), 42);
        assert!(store.activity().is_empty());
    }

    #[test]
    fn test_append_validation() {
        let mut store = setup();
        let mut ledger = ContributionLedger::new(&mut store);

        let err = ledger.append("it-wall", "alice", 0).unwrap_err();
        assert_eq!(ErrorKind::of(&err), ErrorKind::InvalidInput);

        let err = ledger.append("it-ghost", "alice", 1).unwrap_err();
        assert_eq!(ErrorKind::of(&err), ErrorKind::NotFound);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut store = setup();
        let mut ledger = ContributionLedger::new(&mut store);

        ledger.append("it-wall", "alice", 5).unwrap();
        let item = ledger.append("it-wall", "bob", 7).unwrap();
        let target = item.contributions[0].id.clone();

        let first = ledger.remove("it-wall", &target).unwrap();
        let second = ledger.remove("it-wall", &target).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.contributions.len(), 1);
        assert_eq!(ledger.aggregate("it-wall").unwrap(), 7);
    }

    #[test]
    fn test_remove_from_missing_item() {
        let mut store = setup();
        let mut ledger = ContributionLedger::new(&mut store);
        let err = ledger.remove("it-ghost", "ct-0000000000").unwrap_err();
        assert_eq!(ErrorKind::of(&err), ErrorKind::NotFound);
    }
}
