//! Dependency resolution for a seeding run.
//!
//! Provides:
//! - Closure of the requested tables over the FK parents they reference
//! - Topological sorting so parents are seeded before children
//! - Cycle detection with a concrete cycle path for diagnostics

use super::{Schema, TableId};
use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("table '{0}' not found in schema")]
    UnknownTable(String),
    /// `path` starts and ends with the same table.
    #[error("circular foreign key dependency: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },
}

/// Immediate in-set parents of every table in a seeding run.
///
/// Parent lists are deduplicated and never contain the table itself.
#[derive(Debug, Clone, Default)]
pub struct TableRelations {
    parents: AHashMap<String, Vec<String>>,
}

impl TableRelations {
    /// Parent table names of `table` (empty for roots and unknown tables)
    pub fn parents(&self, table: &str) -> &[String] {
        self.parents.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// A root table has no in-set parents
    pub fn is_root(&self, table: &str) -> bool {
        self.parents(table).is_empty()
    }

    pub fn insert(&mut self, table: impl Into<String>, parents: Vec<String>) {
        self.parents.insert(table.into(), parents);
    }
}

/// Outcome of [`resolve`]
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Table names, parents before children
    pub order: Vec<String>,
    /// Tables added because a requested table references them
    pub auto_included: Vec<String>,
    pub relations: TableRelations,
}

/// Parent/child graph restricted to the tables of one run.
///
/// Nodes are positions in `tables`; edges skip self references and
/// FKs pointing outside the set.
#[derive(Debug)]
struct DependencyGraph {
    tables: Vec<TableId>,
    /// For each node, the nodes it references via FK
    parents: Vec<Vec<usize>>,
    /// For each node, the nodes referencing it
    children: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Resolve the processing order for `requested` tables.
///
/// Referenced parents that were not requested are pulled in until a fixed
/// point is reached, then the closed set is topologically sorted.
pub fn resolve(schema: &Schema, requested: &[String]) -> Result<Resolution, ResolveError> {
    let mut members: Vec<TableId> = Vec::with_capacity(requested.len());
    let mut in_set: AHashSet<TableId> = AHashSet::new();

    for name in requested {
        let id = schema
            .get_table_id(name)
            .ok_or_else(|| ResolveError::UnknownTable(name.clone()))?;
        if in_set.insert(id) {
            members.push(id);
        }
    }

    let auto_included = close_over_parents(schema, &mut members, &mut in_set);
    let graph = DependencyGraph::build(schema, &members);

    let order = graph.topo_sort();
    if order.len() < members.len() {
        let path = graph
            .find_cycle()
            .unwrap_or_default()
            .into_iter()
            .map(|node| schema.table(graph.tables[node]).name.clone())
            .collect();
        return Err(ResolveError::Cycle { path });
    }

    let mut relations = TableRelations::default();
    for (node, &id) in graph.tables.iter().enumerate() {
        let parents = graph.parents[node]
            .iter()
            .map(|&p| schema.table(graph.tables[p]).name.clone())
            .collect();
        relations.insert(schema.table(id).name.clone(), parents);
    }

    Ok(Resolution {
        order: order
            .into_iter()
            .map(|node| schema.table(graph.tables[node]).name.clone())
            .collect(),
        auto_included,
        relations,
    })
}

/// Add every transitively referenced table to the set, returning the added names
fn close_over_parents(
    schema: &Schema,
    members: &mut Vec<TableId>,
    in_set: &mut AHashSet<TableId>,
) -> Vec<String> {
    let mut auto_included = Vec::new();
    let mut next = 0;

    while next < members.len() {
        let table = schema.table(members[next]);
        for (_, fk) in table.fk_columns() {
            if let Some(parent) = schema.get_table_id(&fk.referenced_table) {
                if in_set.insert(parent) {
                    members.push(parent);
                    auto_included.push(schema.table(parent).name.clone());
                }
            }
        }
        next += 1;
    }

    auto_included
}

impl DependencyGraph {
    fn build(schema: &Schema, tables: &[TableId]) -> Self {
        let n = tables.len();
        let position: AHashMap<TableId, usize> =
            tables.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let mut parents: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (child, &id) in tables.iter().enumerate() {
            for (_, fk) in schema.table(id).fk_columns() {
                let Some(parent) = schema
                    .get_table_id(&fk.referenced_table)
                    .and_then(|p| position.get(&p).copied())
                else {
                    continue;
                };
                if parent == child {
                    continue;
                }
                if !parents[child].contains(&parent) {
                    parents[child].push(parent);
                }
                if !children[parent].contains(&child) {
                    children[parent].push(child);
                }
            }
        }

        Self {
            tables: tables.to_vec(),
            parents,
            children,
        }
    }

    /// Kahn's algorithm. Tables on a cycle are missing from the result.
    fn topo_sort(&self) -> Vec<usize> {
        let n = self.tables.len();
        let mut in_degree: Vec<usize> = self.parents.iter().map(Vec::len).collect();

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for &child in &self.children[node] {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    queue.push_back(child);
                }
            }
        }

        order
    }

    /// Depth-first white/gray/black walk along FK edges.
    ///
    /// Returns a path of nodes where each one references the next and the
    /// first equals the last.
    fn find_cycle(&self) -> Option<Vec<usize>> {
        let n = self.tables.len();
        let mut color = vec![Color::White; n];
        let mut via = vec![usize::MAX; n];

        (0..n).find_map(|start| {
            if color[start] == Color::White {
                self.visit(start, &mut color, &mut via)
            } else {
                None
            }
        })
    }

    fn visit(&self, node: usize, color: &mut [Color], via: &mut [usize]) -> Option<Vec<usize>> {
        color[node] = Color::Gray;

        for &next in &self.parents[node] {
            match color[next] {
                Color::Gray => {
                    let mut path = vec![next, node];
                    let mut cur = node;
                    while cur != next {
                        cur = via[cur];
                        path.push(cur);
                    }
                    path.reverse();
                    return Some(path);
                }
                Color::White => {
                    via[next] = node;
                    if let Some(path) = self.visit(next, color, via) {
                        return Some(path);
                    }
                }
                Color::Black => {}
            }
        }

        color[node] = Color::Black;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, Table};

    fn table(name: &str, refs: &[(&str, &str)]) -> Table {
        let mut columns = vec![Column::new("id", "int").primary_key()];
        for (col, parent) in refs {
            columns.push(Column::new(*col, "int").references(parent, "id"));
        }
        Table::new(name, columns)
    }

    #[test]
    fn test_self_reference_is_not_a_cycle() {
        let schema = Schema::from_tables([table("node", &[("parent_id", "node")])]);
        let res = resolve(&schema, &["node".to_string()]).unwrap();
        assert_eq!(res.order, vec!["node"]);
        assert!(res.relations.is_root("node"));
    }

    #[test]
    fn test_duplicate_parent_edges_are_deduplicated() {
        let schema = Schema::from_tables([
            table("users", &[]),
            table(
                "messages",
                &[("sender_id", "users"), ("recipient_id", "users")],
            ),
        ]);
        let res = resolve(&schema, &["messages".to_string()]).unwrap();
        assert_eq!(res.order, vec!["users", "messages"]);
        assert_eq!(res.relations.parents("messages"), ["users".to_string()]);
    }

    #[test]
    fn test_cycle_path_follows_references() {
        let schema = Schema::from_tables([
            table("a", &[("b_id", "b")]),
            table("b", &[("c_id", "c")]),
            table("c", &[("a_id", "a")]),
        ]);
        let err = resolve(&schema, &["a".to_string()]).unwrap_err();
        let ResolveError::Cycle { path } = err else {
            panic!("expected cycle");
        };
        assert_eq!(path.len(), 4);
        assert_eq!(path.first(), path.last());
        for pair in path.windows(2) {
            let t = schema.get_table(&pair[0]).unwrap();
            assert!(t
                .fk_columns()
                .any(|(_, fk)| fk.referenced_table == pair[1]));
        }
    }
}
