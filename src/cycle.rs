//! Cycle checks for new dependency edges.

use crate::error::CraftError;
use crate::graph_store::GraphStore;
use crate::types::{DependencyEdge, Item};
use chrono::Utc;
use eyre::{Context, Result};
use std::collections::HashSet;

/// Guards edge creation against introducing cycles.
///
/// Matching is by item *name*: dependencies are wired by name within a
/// project, so an item reachable from the candidate that carries the parent's
/// name counts as the parent.
pub struct CycleGuard<'a, S: GraphStore> {
    store: &'a mut S,
}

impl<'a, S: GraphStore> CycleGuard<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Would an edge `parent -> candidate` close a loop back to `parent_name`?
    ///
    /// An unknown candidate has nothing to traverse and reports `false`.
    pub fn would_create_cycle(&self, candidate_id: &str, parent_name: &str) -> Result<bool> {
        would_create_cycle(&*self.store, candidate_id, parent_name)
    }

    /// Append an edge `parent_name -> dependency_name` within a project.
    pub fn add_edge_by_name(
        &mut self,
        project_id: &str,
        parent_name: &str,
        dependency_name: &str,
        qty: i64,
    ) -> Result<Item> {
        if qty <= 0 {
            return Err(eyre::eyre!(CraftError::InvalidInput(format!(
                "dependency quantity must be positive, got {}",
                qty
            ))));
        }

        let mut parent = self.find_named(project_id, parent_name)?;
        let dependency = self.find_named(project_id, dependency_name)?;

        if parent.id == dependency.id {
            return Err(eyre::eyre!(CraftError::SelfDependency(parent.name)));
        }

        if parent.depends_on(&dependency.id) {
            return Err(eyre::eyre!(CraftError::DuplicateDependency {
                parent: parent.name,
                dependency: dependency.name,
            }));
        }

        if self.would_create_cycle(&dependency.id, &parent.name)? {
            return Err(eyre::eyre!(CraftError::CycleDetected {
                parent: parent.name,
                dependency: dependency.name,
            }));
        }

        parent.dependencies.push(DependencyEdge::new(dependency.id.clone(), qty));
        parent.updated_at = Utc::now();
        self.store.save(&parent).context("Failed to persist dependency edge")?;

        log::debug!("Added edge {} -> {} (qty {})", parent.id, dependency.id, qty);
        Ok(parent)
    }

    fn find_named(&self, project_id: &str, name: &str) -> Result<Item> {
        self.store.find_by_name(project_id, name)?.ok_or_else(|| {
            eyre::eyre!(CraftError::NamedItemNotFound {
                project_id: project_id.to_string(),
                name: name.to_string(),
            })
        })
    }
}

/// Depth-first walk from `candidate_id` looking for an item named
/// `parent_name`. Each node is loaded at most once, so pre-existing cycles in
/// stored data cannot stall the walk.
pub(crate) fn would_create_cycle<S: GraphStore + ?Sized>(
    store: &S,
    candidate_id: &str,
    parent_name: &str,
) -> Result<bool> {
    let mut visited = HashSet::new();
    let mut stack = vec![candidate_id.to_string()];

    while let Some(node) = stack.pop() {
        if !visited.insert(node.clone()) {
            continue;
        }

        let Some(item) = store.find_by_id(&node)? else {
            continue;
        };

        if item.name == parent_name {
            log::debug!("Cycle: {} reaches an item named {:?}", candidate_id, parent_name);
            return Ok(true);
        }

        // Reverse so edges are explored in stored order
        for edge in item.dependencies.into_iter().rev() {
            if !visited.contains(&edge.item_id) {
                stack.push(edge.item_id);
            }
        }
    }

    Ok(false)
}
