//! Name-keyed directed graph with labelled edges.
//!
//! Nodes are plain template names, so an edge may point at a template that
//! does not exist in any store.

use rustc_hash::FxHashMap;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("node {name} is not in the graph")]
    MissingNode { name: String },
}

#[derive(Clone, Debug)]
pub struct DiGraph<L> {
    names: Vec<String>,
    index: FxHashMap<String, usize>,
    successors: Vec<Vec<usize>>,
    labels: FxHashMap<(usize, usize), L>,
}

impl<L> Default for DiGraph<L> {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            index: FxHashMap::default(),
            successors: Vec::new(),
            labels: FxHashMap::default(),
        }
    }
}

impl<L> DiGraph<L> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning whether it was new.
    pub fn add_node(&mut self, name: &str) -> bool {
        if self.index.contains_key(name) {
            return false;
        }
        self.index.insert(name.to_string(), self.names.len());
        self.names.push(name.to_string());
        self.successors.push(Vec::new());
        true
    }

    /// Add a labelled edge, returning whether it was new.
    ///
    /// A duplicate edge keeps its first label. Both endpoints must already
    /// be nodes.
    pub fn add_edge(&mut self, from: &str, to: &str, label: L) -> Result<bool, GraphError> {
        let source = self.id(from)?;
        let target = self.id(to)?;
        if self.labels.contains_key(&(source, target)) {
            return Ok(false);
        }
        self.labels.insert((source, target), label);
        self.successors[source].push(target);
        Ok(true)
    }

    fn id(&self, name: &str) -> Result<usize, GraphError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::MissingNode {
                name: name.to_string(),
            })
    }

    #[must_use]
    pub fn edge_label(&self, from: &str, to: &str) -> Option<&L> {
        let source = self.index.get(from)?;
        let target = self.index.get(to)?;
        self.labels.get(&(*source, *target))
    }

    #[must_use]
    pub fn has_node(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[must_use]
    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edge_label(from, to).is_some()
    }

    /// Successors of `name` in insertion order; empty for unknown nodes.
    pub fn neighbors(&self, name: &str) -> impl Iterator<Item = &str> {
        self.index
            .get(name)
            .map(|id| self.successors[*id].as_slice())
            .unwrap_or_default()
            .iter()
            .map(|id| self.names[*id].as_str())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Every edge as `(from, to, label)`, grouped by source node.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &L)> {
        self.successors.iter().enumerate().flat_map(move |(source, targets)| {
            targets.iter().filter_map(move |target| {
                let label = self.labels.get(&(source, *target))?;
                Some((
                    self.names[source].as_str(),
                    self.names[*target].as_str(),
                    label,
                ))
            })
        })
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.labels.len()
    }
}

/// Find a cycle by depth-first search, visiting nodes and edges in insertion
/// order.
///
/// Returns the cycle as a node sequence whose last element leads back to the
/// first, or an empty vector when the graph is acyclic. Only an edge back to
/// an ancestor on the spanning tree closes a cycle; an edge into an already
/// finished branch does not.
#[must_use]
pub fn find_cycle<L>(graph: &DiGraph<L>) -> Vec<String> {
    let count = graph.names.len();
    let mut visited = vec![false; count];
    let mut parent: Vec<Option<usize>> = vec![None; count];

    for start in 0..count {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];

        while let Some((node, next_edge)) = stack.last_mut() {
            let node = *node;
            let Some(&successor) = graph.successors[node].get(*next_edge) else {
                stack.pop();
                continue;
            };
            *next_edge += 1;

            if visited[successor] {
                let cycle = path_from_ancestor(&parent, node, successor);
                if !cycle.is_empty() {
                    return cycle
                        .into_iter()
                        .map(|id| graph.names[id].clone())
                        .collect();
                }
            } else {
                visited[successor] = true;
                parent[successor] = Some(node);
                stack.push((successor, 0));
            }
        }
    }

    Vec::new()
}

/// The spanning-tree path `ancestor ..= node`, or empty when `ancestor` is
/// not above `node`.
fn path_from_ancestor(parent: &[Option<usize>], node: usize, ancestor: usize) -> Vec<usize> {
    let mut path = Vec::new();
    let mut current = Some(node);
    while current != Some(ancestor) {
        let Some(id) = current else {
            return Vec::new();
        };
        path.push(id);
        current = parent[id];
    }
    path.push(ancestor);
    path.reverse();
    path
}
