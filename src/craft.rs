//! Gated crafting: progress only moves once every dependency is satisfied.

use crate::error::CraftError;
use crate::graph_store::GraphStore;
use crate::id::{ACTIVITY_PREFIX, generate_id};
use crate::types::{ActivityKind, ActivityRecord, DependencyEdge, Item};
use chrono::Utc;
use eyre::{Context, Result};

/// A dependency edge joined with the current state of its target.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEdge {
    pub edge: DependencyEdge,
    pub name: String,
    pub completed_qty: i64,
}

impl ResolvedEdge {
    pub fn is_satisfied(&self) -> bool {
        self.completed_qty >= self.edge.qty
    }
}

/// Applies craft increments to items.
pub struct CraftEngine<'a, S: GraphStore> {
    store: &'a mut S,
}

impl<'a, S: GraphStore> CraftEngine<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    fn resolve_edge(&self, edge: &DependencyEdge) -> Result<ResolvedEdge> {
        let target = self
            .store
            .find_by_id(&edge.item_id)?
            .ok_or_else(|| eyre::eyre!(CraftError::ItemNotFound(edge.item_id.clone())))?;
        Ok(ResolvedEdge {
            edge: edge.clone(),
            name: target.name,
            completed_qty: target.completed_qty,
        })
    }

    /// Resolve every edge of `item` to its target's name and progress, in
    /// stored order. A dangling edge is an error.
    pub fn resolve_dependencies(&self, item: &Item) -> Result<Vec<ResolvedEdge>> {
        item.dependencies.iter().map(|edge| self.resolve_edge(edge)).collect()
    }

    /// First dependency of `item` that isn't crafted far enough, if any.
    ///
    /// Edges are checked in stored order and the walk stops at the first
    /// failure, whether that is an unmet edge or a dangling one.
    pub fn first_unmet(&self, item: &Item) -> Result<Option<ResolvedEdge>> {
        for edge in &item.dependencies {
            let resolved = self.resolve_edge(edge)?;
            if !resolved.is_satisfied() {
                return Ok(Some(resolved));
            }
        }
        Ok(None)
    }

    /// Add `increment_by` to an item's completed quantity on behalf of
    /// `user_id`.
    ///
    /// The result is clamped to `required_qty`. The activity record keeps the
    /// requested amount, so over-crafting still shows up in the feed.
    pub fn apply_progress(&mut self, item_id: &str, user_id: &str, increment_by: i64) -> Result<Item> {
        if increment_by <= 0 {
            return Err(eyre::eyre!(CraftError::InvalidInput(format!(
                "increment must be positive, got {}",
                increment_by
            ))));
        }

        let mut item = self
            .store
            .find_by_id(item_id)?
            .ok_or_else(|| eyre::eyre!(CraftError::ItemNotFound(item_id.to_string())))?;

        if let Some(unmet) = self.first_unmet(&item)? {
            return Err(eyre::eyre!(CraftError::DependencyIncomplete {
                id: unmet.edge.item_id,
                name: unmet.name,
                completed: unmet.completed_qty,
                required: unmet.edge.qty,
            }));
        }

        let now = Utc::now();
        item.completed_qty = item.completed_qty.saturating_add(increment_by).min(item.required_qty);
        item.updated_at = now;

        let record = ActivityRecord {
            id: generate_id(ACTIVITY_PREFIX, &item.id, now),
            user_id: user_id.to_string(),
            project_id: item.project_id.clone(),
            item_id: item.id.clone(),
            quantity: increment_by,
            kind: ActivityKind::Crafted,
            created_at: now,
        };

        self.store
            .record_activity(&record)
            .context("Failed to record craft activity")?;
        self.store.save(&item).context("Failed to persist crafted item")?;

        log::debug!(
            "{} crafted {} x{} -> {}/{}",
            user_id,
            item.id,
            increment_by,
            item.completed_qty,
            item.required_qty
        );
        Ok(item)
    }
}
