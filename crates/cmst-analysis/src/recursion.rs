use std::collections::VecDeque;
use std::fmt::Write as _;

use cmst_templates::Relation;
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::graph::find_cycle;
use crate::graph::DiGraph;
use crate::reference::Reference;
use crate::scan::direct_references;
use crate::store::TemplateStore;

/// A closed walk through the dependency graph.
#[derive(Clone, Debug, Error)]
#[error("template dependency cycle: {}", .cycle.join(" -> "))]
pub struct CycleError {
    /// Template names in cycle order; the last one leads back to the first.
    pub cycle: Vec<String>,
    pub graph: DiGraph<Relation>,
}

impl CycleError {
    /// Render every edge of the cycle as `<a> uses (relation) <b>, `, starting
    /// from `pivot` when it is part of the cycle.
    #[must_use]
    pub fn describe(&self, pivot: &str) -> String {
        let len = self.cycle.len();
        let start = self
            .cycle
            .iter()
            .position(|name| name == pivot)
            .unwrap_or(0);

        let mut message = String::new();
        for i in 0..len {
            let from = &self.cycle[(start + i) % len];
            let to = &self.cycle[(start + i + 1) % len];
            let relation = self
                .graph
                .edge_label(from, to)
                .map_or("", |relation| relation.as_str());
            let _ = write!(message, "<{from}> uses ({relation}) <{to}>, ");
        }
        message
    }
}

/// Expand the dependency closure of `root` breadth first and fail on the
/// first cycle.
///
/// `root` is analysed with `root_content`; every other template with what
/// `store` currently holds. Templates that cannot be read or decoded are
/// pruned from the search. On success the returned graph holds every edge
/// reached.
pub fn validate_no_cycles(
    root: &str,
    root_content: &str,
    store: &dyn TemplateStore,
) -> Result<DiGraph<Relation>, CycleError> {
    let mut graph = DiGraph::new();
    graph.add_node(root);

    let mut frontier: VecDeque<String> = VecDeque::from([root.to_string()]);
    let mut expanded: FxHashSet<String> = FxHashSet::default();
    let mut is_root = true;

    while let Some(name) = frontier.pop_front() {
        if !expanded.insert(name.clone()) {
            continue;
        }

        let references = if std::mem::take(&mut is_root) {
            direct_references(&name, root_content)
        } else {
            match read_stored(&name, store) {
                Some(content) => direct_references(&name, &content),
                None => continue,
            }
        };

        for Reference {
            callee,
            relation,
            caller,
        } in references
        {
            graph.add_node(&callee);
            // both endpoints were added above
            if let Ok(true) = graph.add_edge(&caller, &callee, relation) {
                tracing::trace!(%caller, %callee, %relation, "dependency edge");
            }
            frontier.push_back(callee);
        }

        let cycle = find_cycle(&graph);
        if !cycle.is_empty() {
            tracing::debug!(template = root, cycle = ?cycle, "dependency cycle found");
            return Err(CycleError { cycle, graph });
        }
    }

    Ok(graph)
}

fn read_stored(name: &str, store: &dyn TemplateStore) -> Option<String> {
    let bytes = match store.read(name) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(template = name, error = %err, "pruning unreadable template");
            return None;
        }
    };
    match String::from_utf8(bytes) {
        Ok(content) => Some(content),
        Err(_) => {
            tracing::debug!(template = name, "pruning template that is not UTF-8");
            None
        }
    }
}
