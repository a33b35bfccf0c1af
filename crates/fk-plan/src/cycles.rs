//! Cycle detection and the condensation of the foreign-key graph

use crate::error::PlanResult;
use crate::graph::{ordered_toposort, FkGraph};
use fk_core::{SchemaGraph, TableId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A strongly connected set of tables that contains at least one edge.
///
/// A single table forms a cycle only when it references itself.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Cycle {
    /// Member tables in `TableId` order
    tables: Vec<TableId>,
}

impl Cycle {
    /// Member tables in `TableId` order
    pub fn tables(&self) -> &[TableId] {
        &self.tables
    }

    pub fn contains(&self, table: &TableId) -> bool {
        self.tables.binary_search(table).is_ok()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// A one-table cycle, i.e. a self-referencing table
    pub fn is_self_reference(&self) -> bool {
        self.tables.len() == 1
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.tables.iter().map(|t| t.to_string()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// One node of the condensation: a strongly connected component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Member tables in `TableId` order
    pub tables: Vec<TableId>,
    /// Whether the component contains an edge (a cycle)
    pub cyclic: bool,
    /// Positions of the components this one references
    pub depends_on: BTreeSet<usize>,
}

/// The acyclic condensation of the foreign-key graph.
///
/// Components are stored in insertion order: every component comes after
/// all components it references, and independent components are ordered by
/// their smallest member.
#[derive(Debug, Clone)]
pub struct Condensation {
    components: Vec<Component>,
    component_of: BTreeMap<TableId, usize>,
}

impl Condensation {
    /// Compute the condensation of a schema
    pub fn build(schema: &SchemaGraph) -> PlanResult<Self> {
        let graph = FkGraph::build(schema)?;
        Ok(Self::from_graph(&graph))
    }

    /// Compute the condensation of an already built foreign-key graph
    pub fn from_graph(graph: &FkGraph) -> Self {
        let sccs = graph.strongly_connected_components();

        let mut representative_of: BTreeMap<&TableId, &TableId> = BTreeMap::new();
        for scc in &sccs {
            for table in scc {
                representative_of.insert(table, &scc[0]);
            }
        }

        let mut cyclic: BTreeSet<&TableId> = BTreeSet::new();
        let mut dependencies: BTreeMap<&TableId, BTreeSet<&TableId>> = BTreeMap::new();
        for (from, to, _) in graph.edges() {
            let from_rep = representative_of[from];
            let to_rep = representative_of[to];
            if from_rep == to_rep {
                cyclic.insert(from_rep);
            } else {
                dependencies.entry(from_rep).or_default().insert(to_rep);
            }
        }

        let representatives: Vec<&TableId> = sccs.iter().map(|scc| &scc[0]).collect();
        // The condensation has no cycles by construction.
        let order = ordered_toposort(&representatives, &dependencies)
            .unwrap_or_else(|_| representatives.clone());

        let by_representative: BTreeMap<&TableId, &Vec<TableId>> =
            sccs.iter().map(|scc| (&scc[0], scc)).collect();
        let position: BTreeMap<&TableId, usize> = order
            .iter()
            .enumerate()
            .map(|(idx, rep)| (*rep, idx))
            .collect();

        let mut components = Vec::with_capacity(order.len());
        let mut component_of = BTreeMap::new();
        for (idx, rep) in order.iter().enumerate() {
            let tables = by_representative[rep].clone();
            for table in &tables {
                component_of.insert(table.clone(), idx);
            }
            let depends_on = dependencies
                .get(rep)
                .map(|deps| deps.iter().map(|d| position[d]).collect())
                .unwrap_or_default();
            components.push(Component {
                tables,
                cyclic: cyclic.contains(rep),
                depends_on,
            });
        }

        Self {
            components,
            component_of,
        }
    }

    /// All components in insertion order
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Position of the component containing `table`
    pub fn component_of(&self, table: &TableId) -> Option<usize> {
        self.component_of.get(table).copied()
    }

    /// Whether two tables lie in the same strongly connected component
    pub fn same_component(&self, a: &TableId, b: &TableId) -> bool {
        match (self.component_of(a), self.component_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Whether `table` is a member of a cycle
    pub fn is_in_cycle(&self, table: &TableId) -> bool {
        self.component_of(table)
            .is_some_and(|idx| self.components[idx].cyclic)
    }

    /// The cycle containing `table`, if any
    pub fn cycle_of(&self, table: &TableId) -> Option<Cycle> {
        let idx = self.component_of(table)?;
        let component = &self.components[idx];
        component.cyclic.then(|| Cycle {
            tables: component.tables.clone(),
        })
    }

    /// All cycles, ordered by their smallest member
    pub fn cycles(&self) -> Vec<Cycle> {
        let mut cycles: Vec<Cycle> = self
            .components
            .iter()
            .filter(|c| c.cyclic)
            .map(|c| Cycle {
                tables: c.tables.clone(),
            })
            .collect();
        cycles.sort();
        cycles
    }
}

/// Find every foreign-key cycle of a schema.
///
/// Self-referencing tables are reported as one-table cycles; tables that
/// are not part of any cycle are not reported.
pub fn find_cycles(schema: &SchemaGraph) -> PlanResult<Vec<Cycle>> {
    let condensation = Condensation::build(schema)?;
    let cycles = condensation.cycles();
    log::debug!(
        "Found {} foreign-key cycle(s) among {} tables",
        cycles.len(),
        schema.len()
    );
    Ok(cycles)
}

#[cfg(test)]
#[path = "cycles_test.rs"]
mod tests;
