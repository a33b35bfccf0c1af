//! Foreign-key digraph over the tables of a schema

use crate::error::PlanResult;
use fk_core::{ColumnName, CoreError, SchemaGraph, TableId};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Directed graph with one node per table and one edge per foreign-key
/// column, pointing from the referencing table to the referenced one.
///
/// Nodes are added in `TableId` order and edges in column declaration order,
/// so every petgraph traversal over it is reproducible.
#[derive(Debug)]
pub struct FkGraph {
    /// The underlying graph; edge weights name the referencing column
    graph: DiGraph<TableId, ColumnName>,

    /// Map from table identity to node index
    node_map: HashMap<TableId, NodeIndex>,
}

impl FkGraph {
    /// Build the graph from a resolved schema
    pub fn build(schema: &SchemaGraph) -> PlanResult<Self> {
        let mut graph = DiGraph::with_capacity(schema.len(), 0);
        let mut node_map = HashMap::with_capacity(schema.len());

        for id in schema.table_ids() {
            let idx = graph.add_node(id.clone());
            node_map.insert(id.clone(), idx);
        }

        for table in schema.tables() {
            let from = node_map[&table.id];
            for column in table.foreign_key_columns() {
                let Some(target) = column.target() else {
                    continue;
                };
                let Some(&to) = node_map.get(target) else {
                    return Err(CoreError::DanglingForeignKey {
                        table: table.id.to_string(),
                        column: column.name.to_string(),
                        target: target.to_string(),
                    }
                    .into());
                };
                graph.add_edge(from, to, column.name.clone());
            }
        }

        Ok(Self { graph, node_map })
    }

    /// Number of tables
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of foreign-key columns
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Tables referenced by `table`, without duplicates, in `TableId` order
    pub fn references(&self, table: &TableId) -> Vec<&TableId> {
        self.neighbors(table, Direction::Outgoing)
    }

    /// Tables referencing `table`, without duplicates, in `TableId` order
    pub fn referenced_by(&self, table: &TableId) -> Vec<&TableId> {
        self.neighbors(table, Direction::Incoming)
    }

    fn neighbors(&self, table: &TableId, direction: Direction) -> Vec<&TableId> {
        let Some(&idx) = self.node_map.get(table) else {
            return Vec::new();
        };
        let set: BTreeSet<&TableId> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| match direction {
                Direction::Outgoing => &self.graph[e.target()],
                Direction::Incoming => &self.graph[e.source()],
            })
            .collect();
        set.into_iter().collect()
    }

    /// Whether `table` has a column referencing itself
    pub fn has_self_reference(&self, table: &TableId) -> bool {
        self.node_map
            .get(table)
            .is_some_and(|&idx| self.graph.contains_edge(idx, idx))
    }

    /// Strongly connected components, each sorted, ordered by first member.
    ///
    /// Every table appears in exactly one component, including tables
    /// without any foreign keys.
    pub fn strongly_connected_components(&self) -> Vec<Vec<TableId>> {
        let mut components: Vec<Vec<TableId>> = tarjan_scc(&self.graph)
            .into_iter()
            .map(|scc| {
                let mut members: Vec<TableId> =
                    scc.into_iter().map(|idx| self.graph[idx].clone()).collect();
                members.sort();
                members
            })
            .collect();
        components.sort();
        components
    }

    /// Referencing/referenced table pairs, one per foreign-key column
    pub fn edges(&self) -> impl Iterator<Item = (&TableId, &TableId, &ColumnName)> {
        self.graph.edge_references().map(|e| {
            (
                &self.graph[e.source()],
                &self.graph[e.target()],
                e.weight(),
            )
        })
    }
}

/// Topologically order `nodes` so that every node follows its dependencies.
///
/// Among nodes that are ready at the same time the smallest comes first,
/// which makes the result a pure function of the input. Returns the nodes
/// that could not be ordered when the dependencies contain a cycle.
pub(crate) fn ordered_toposort<K>(
    nodes: &[K],
    dependencies: &BTreeMap<K, BTreeSet<K>>,
) -> Result<Vec<K>, Vec<K>>
where
    K: Ord + Clone,
{
    let known: BTreeSet<&K> = nodes.iter().collect();
    let mut remaining: BTreeMap<K, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<K, Vec<K>> = BTreeMap::new();

    for node in nodes {
        let deps: Vec<&K> = dependencies
            .get(node)
            .into_iter()
            .flatten()
            .filter(|dep| known.contains(dep))
            .collect();
        // A self dependency is counted but never released.
        remaining.insert(node.clone(), deps.len());
        for dep in deps.into_iter().filter(|dep| *dep != node) {
            dependents.entry(dep.clone()).or_default().push(node.clone());
        }
    }

    let mut ready: BTreeSet<K> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(node, _)| node.clone())
        .collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(node) = ready.pop_first() {
        if let Some(children) = dependents.get(&node) {
            for child in children {
                if let Some(count) = remaining.get_mut(child) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(child.clone());
                    }
                }
            }
        }
        remaining.remove(&node);
        order.push(node);
    }

    if remaining.is_empty() {
        Ok(order)
    } else {
        Err(remaining.into_keys().collect())
    }
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod tests;
