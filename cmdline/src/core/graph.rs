//! Workflow dependency graph: nodes are workflow inputs, outputs and steps;
//! edges point from a data source to its consumer.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("Graph has cycles")]
    Cyclic,
    #[error("Graph is not connected")]
    Disconnected,
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: BTreeSet<String>,
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl Graph {
    pub fn add_node(&mut self, id: &str) {
        self.nodes.insert(id.to_string());
    }

    /// Connect `from -> to`, adding either endpoint if missing.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.add_node(from);
        self.add_node(to);
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    /// Dependency order that also requires the graph to be connected.
    pub fn top_sort(&self) -> Result<Vec<String>, GraphError> {
        let ordered = self.dependency_order().ok_or(GraphError::Cyclic)?;
        if !self.is_connected() {
            return Err(GraphError::Disconnected);
        }
        Ok(ordered)
    }

    /// Kahn's algorithm; ties are broken by node id so the order is stable.
    /// `None` when the graph has a cycle.
    pub fn dependency_order(&self) -> Option<Vec<String>> {
        let mut in_degree: BTreeMap<&str, usize> =
            self.nodes.iter().map(|id| (id.as_str(), 0)).collect();
        for targets in self.edges.values() {
            for target in targets {
                if let Some(degree) = in_degree.get_mut(target.as_str()) {
                    *degree += 1;
                }
            }
        }

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut ordered = Vec::with_capacity(self.nodes.len());
        while let Some(first) = ready.pop_first() {
            ordered.push(first.to_string());
            for target in self.edges.get(first).into_iter().flatten() {
                let Some(degree) = in_degree.get_mut(target.as_str()) else {
                    continue;
                };
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    ready.insert(target.as_str());
                }
            }
        }

        (ordered.len() == self.nodes.len()).then_some(ordered)
    }

    /// True when every node is reachable from every other ignoring edge direction.
    fn is_connected(&self) -> bool {
        let Some(start) = self.nodes.first() else {
            return true;
        };
        let mut neighbours: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (from, targets) in &self.edges {
            for to in targets {
                neighbours
                    .entry(from.as_str())
                    .or_default()
                    .push(to.as_str());
                neighbours
                    .entry(to.as_str())
                    .or_default()
                    .push(from.as_str());
            }
        }

        let mut seen: BTreeSet<&str> = BTreeSet::from([start.as_str()]);
        let mut queue = VecDeque::from([start.as_str()]);
        while let Some(id) = queue.pop_front() {
            for &next in neighbours.get(id).into_iter().flatten() {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen.len() == self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_sources_before_consumers() {
        let mut graph = Graph::default();
        graph.add_edge("in", "align");
        graph.add_edge("align", "sort");
        graph.add_edge("sort", "out");
        assert_eq!(
            graph.top_sort().expect("sorted"),
            vec!["in", "align", "sort", "out"]
        );
    }

    #[test]
    fn detects_cycles() {
        let mut graph = Graph::default();
        graph.add_edge("a", "b");
        graph.add_edge("b", "a");
        assert_eq!(graph.top_sort(), Err(GraphError::Cyclic));
    }

    #[test]
    fn detects_disconnected_nodes() {
        let mut graph = Graph::default();
        graph.add_edge("a", "b");
        graph.add_node("orphan");
        assert_eq!(graph.top_sort(), Err(GraphError::Disconnected));
    }

    #[test]
    fn empty_graph_sorts_to_nothing() {
        assert_eq!(Graph::default().top_sort(), Ok(Vec::new()));
    }
}
