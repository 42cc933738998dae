//! Full dependency tree materialization.
//!
//! The walk is iterative and its output is flat: nodes live in one vector in
//! visit order and children point at them by index. Building, dropping and
//! serializing a tree never recurse, however deep the graph.

use crate::error::CraftError;
use crate::graph_store::GraphStore;
use crate::types::{DependencyEdge, Item};
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Marker text for an edge whose target was already expanded.
const TRUNCATED_MESSAGE: &str = "circular dependency detected";

/// A dependency tree. `nodes[0]` is the root; every expanded child sits at a
/// higher index than its parent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DependencyTree {
    pub nodes: Vec<TreeNode>,
}

/// One expanded item in a dependency tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeNode {
    pub id: String,
    pub name: String,
    pub required_qty: i64,
    pub dependencies: Vec<TreeChild>,
}

/// An edge of the tree: the edge quantity plus what it points at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeChild {
    pub qty: i64,
    #[serde(flatten)]
    pub entry: TreeEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeEntry {
    /// Expanded subtree, stored at `nodes[node]`.
    Item { node: usize },
    /// Target was already visited in this traversal; not expanded again.
    Truncated { id: String, message: String },
    /// Edge points at an item that no longer exists.
    Missing { id: String },
}

impl DependencyTree {
    pub fn root(&self) -> Option<&TreeNode> {
        self.nodes.first()
    }

    /// Number of expanded nodes, the root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The expanded node an edge leads to, if it was expanded.
    pub fn expanded(&self, child: &TreeChild) -> Option<&TreeNode> {
        match child.entry {
            TreeEntry::Item { node } => self.nodes.get(node),
            _ => None,
        }
    }
}

impl TreeNode {
    fn from_item(item: &Item) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            required_qty: item.required_qty,
            dependencies: Vec::with_capacity(item.dependencies.len()),
        }
    }
}

struct Frame {
    node: usize,
    edges: Vec<DependencyEdge>,
    next: usize,
}

/// Builds read-only dependency trees.
pub struct TreeBuilder<'a, S: GraphStore> {
    store: &'a S,
}

impl<'a, S: GraphStore> TreeBuilder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Expand `root_id` and everything it transitively depends on.
    ///
    /// The visited set spans the whole walk: an item reachable along two
    /// paths is expanded once and the later edge gets a `Truncated` marker.
    pub fn build_tree(&self, root_id: &str) -> Result<DependencyTree> {
        let root = self
            .store
            .find_by_id(root_id)?
            .ok_or_else(|| eyre::eyre!(CraftError::ItemNotFound(root_id.to_string())))?;

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(root.id.clone());

        let mut nodes = vec![TreeNode::from_item(&root)];
        let mut stack = vec![Frame {
            node: 0,
            edges: root.dependencies,
            next: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let Some(edge) = frame.edges.get(frame.next).cloned() else {
                stack.pop();
                continue;
            };
            frame.next += 1;
            let parent = frame.node;

            if !visited.insert(edge.item_id.clone()) {
                nodes[parent].dependencies.push(TreeChild {
                    qty: edge.qty,
                    entry: TreeEntry::Truncated {
                        id: edge.item_id,
                        message: TRUNCATED_MESSAGE.to_string(),
                    },
                });
                continue;
            }

            match self.store.find_by_id(&edge.item_id)? {
                Some(item) => {
                    let node = nodes.len();
                    nodes.push(TreeNode::from_item(&item));
                    nodes[parent].dependencies.push(TreeChild {
                        qty: edge.qty,
                        entry: TreeEntry::Item { node },
                    });
                    stack.push(Frame {
                        node,
                        edges: item.dependencies,
                        next: 0,
                    });
                }
                None => {
                    log::warn!("Dangling dependency {} under {}", edge.item_id, nodes[parent].id);
                    nodes[parent].dependencies.push(TreeChild {
                        qty: edge.qty,
                        entry: TreeEntry::Missing { id: edge.item_id },
                    });
                }
            }
        }

        log::debug!("Built tree for {} with {} nodes", root_id, nodes.len());
        Ok(DependencyTree { nodes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::graph_store::MemoryStore;
    use chrono::Utc;

    fn put(store: &mut MemoryStore, id: &str, name: &str, deps: &[(&str, i64)]) {
        let now = Utc::now();
        store
            .save(&Item {
                id: id.to_string(),
                project_id: "pr-forge".to_string(),
                name: name.to_string(),
                required_qty: 1,
                completed_qty: 0,
                dependencies: deps.iter().map(|(d, q)| DependencyEdge::new(*d, *q)).collect(),
                contributions: vec![],
                created_at: now,
                updated_at: now,
            })
            .unwrap();
    }

    fn child_item<'t>(tree: &'t DependencyTree, child: &TreeChild) -> &'t TreeNode {
        match tree.expanded(child) {
            Some(node) => node,
            None => panic!("expected expanded item, got {:?}", child.entry),
        }
    }

    #[test]
    fn test_nested_tree_keeps_edge_order_and_qty() {
        let mut store = MemoryStore::new();
        put(&mut store, "it-ore", "Ore", &[]);
        put(&mut store, "it-ingot", "Ingot", &[("it-ore", 3)]);
        put(&mut store, "it-wood", "Wood", &[]);
        put(&mut store, "it-sword", "Sword", &[("it-ingot", 2), ("it-wood", 1)]);

        let tree = TreeBuilder::new(&store).build_tree("it-sword").unwrap();
        let root = tree.root().unwrap();

        assert_eq!(root.name, "Sword");
        assert_eq!(root.dependencies.len(), 2);
        assert_eq!(root.dependencies[0].qty, 2);
        let ingot = child_item(&tree, &root.dependencies[0]);
        assert_eq!(ingot.name, "Ingot");
        assert_eq!(ingot.dependencies[0].qty, 3);
        assert_eq!(child_item(&tree, &ingot.dependencies[0]).name, "Ore");
        assert_eq!(child_item(&tree, &root.dependencies[1]).name, "Wood");
        assert_eq!(tree.node_count(), 4);
    }

    #[test]
    fn test_missing_root() {
        let store = MemoryStore::new();
        let err = TreeBuilder::new(&store).build_tree("it-ghost").unwrap_err();
        assert_eq!(ErrorKind::of(&err), ErrorKind::NotFound);
    }

    #[test]
    fn test_terminates_on_cycle_through_root() {
        let mut store = MemoryStore::new();
        put(&mut store, "it-a", "A", &[("it-b", 1)]);
        put(&mut store, "it-b", "B", &[("it-c", 1)]);
        put(&mut store, "it-c", "C", &[("it-a", 1)]);

        let tree = TreeBuilder::new(&store).build_tree("it-a").unwrap();
        let b = child_item(&tree, &tree.nodes[0].dependencies[0]);
        let c = child_item(&tree, &b.dependencies[0]);
        assert!(matches!(
            &c.dependencies[0].entry,
            TreeEntry::Truncated { id, .. } if id == "it-a"
        ));
        assert_eq!(tree.node_count(), 3);
    }

    #[test]
    fn test_shared_dependency_expanded_once() {
        let mut store = MemoryStore::new();
        put(&mut store, "it-nail", "Nail", &[]);
        put(&mut store, "it-left", "Left", &[("it-nail", 2)]);
        put(&mut store, "it-right", "Right", &[("it-nail", 4)]);
        put(&mut store, "it-table", "Table", &[("it-left", 1), ("it-right", 1)]);

        let tree = TreeBuilder::new(&store).build_tree("it-table").unwrap();
        let root = tree.root().unwrap();
        let left = child_item(&tree, &root.dependencies[0]);
        let right = child_item(&tree, &root.dependencies[1]);
        assert_eq!(child_item(&tree, &left.dependencies[0]).name, "Nail");
        assert_eq!(right.dependencies[0].qty, 4);
        assert!(matches!(right.dependencies[0].entry, TreeEntry::Truncated { .. }));
    }

    #[test]
    fn test_dangling_edge_marked_missing() {
        let mut store = MemoryStore::new();
        put(&mut store, "it-a", "A", &[("it-gone", 2)]);

        let tree = TreeBuilder::new(&store).build_tree("it-a").unwrap();
        assert_eq!(
            tree.nodes[0].dependencies[0].entry,
            TreeEntry::Missing {
                id: "it-gone".to_string()
            }
        );
    }

    #[test]
    fn test_children_follow_their_parent() {
        let mut store = MemoryStore::new();
        put(&mut store, "it-x", "X", &[]);
        put(&mut store, "it-y", "Y", &[("it-x", 1)]);
        put(&mut store, "it-z", "Z", &[("it-y", 1), ("it-x", 1)]);

        let tree = TreeBuilder::new(&store).build_tree("it-z").unwrap();
        for (index, node) in tree.nodes.iter().enumerate() {
            for child in &node.dependencies {
                if let TreeEntry::Item { node: target } = child.entry {
                    assert!(target > index && target < tree.nodes.len());
                }
            }
        }
    }

    #[test]
    fn test_deep_chain_builds_drops_and_serializes() {
        let mut store = MemoryStore::new();
        let depth = 10_000;
        put(&mut store, "it-0", "Link 0", &[]);
        for i in 1..depth {
            let prev = format!("it-{}", i - 1);
            put(&mut store, &format!("it-{}", i), &format!("Link {}", i), &[(prev.as_str(), 1)]);
        }

        let tree = TreeBuilder::new(&store)
            .build_tree(&format!("it-{}", depth - 1))
            .unwrap();
        assert_eq!(tree.node_count(), depth);

        let json = serde_json::to_string(&tree).unwrap();
        let parsed: DependencyTree = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tree);

        drop(parsed);
        drop(tree);
    }

    #[test]
    fn test_serialized_shape() {
        let mut store = MemoryStore::new();
        put(&mut store, "it-a", "A", &[("it-b", 2), ("it-a2", 1)]);
        put(&mut store, "it-b", "B", &[("it-a", 1)]);

        let tree = TreeBuilder::new(&store).build_tree("it-a").unwrap();
        let json = serde_json::to_value(&tree).unwrap();

        let root = &json["nodes"][0];
        assert_eq!(root["dependencies"][0]["qty"], 2);
        assert_eq!(root["dependencies"][0]["kind"], "item");
        assert_eq!(root["dependencies"][0]["node"], 1);
        assert_eq!(json["nodes"][1]["name"], "B");
        assert_eq!(json["nodes"][1]["dependencies"][0]["kind"], "truncated");
        assert_eq!(root["dependencies"][1]["kind"], "missing");
    }
}
