//! Table arena and association registry.
//!
//! Tables live in an indexed arena keyed by resolved name; edges refer to
//! tables by name only and are resolved in the link phase.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::ast::{AssociationEdge, TableDefinition, ThroughTable};
use crate::config::Redefinition;
use crate::error::{CompileError, Diagnostic};

#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: Vec<TableDefinition>,
    index: HashMap<String, usize>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table under its resolved name. A second registration of
    /// the same name follows `policy`.
    pub fn register(
        &mut self,
        table: TableDefinition,
        policy: Redefinition,
    ) -> Result<Option<Diagnostic>, CompileError> {
        match self.index.get(&table.name) {
            Some(&id) => match policy {
                Redefinition::Reject => Err(CompileError::AmbiguousReregistration {
                    table: table.name,
                }),
                Redefinition::Overwrite => {
                    let diagnostic =
                        Diagnostic::warning(format!("Table {} redefined, last definition wins", table.name));
                    self.tables[id] = table;
                    Ok(Some(diagnostic))
                }
            },
            None => {
                self.index.insert(table.name.clone(), self.tables.len());
                self.tables.push(table);
                Ok(None)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&TableDefinition> {
        self.index.get(name).map(|&id| &self.tables[id])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn into_tables(self) -> Vec<TableDefinition> {
        self.tables
    }
}

/// Identity of a many-to-many link: unordered table pair plus alias.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct PairKey {
    low: String,
    high: String,
    alias: String,
}

impl PairKey {
    fn new(a: &str, b: &str, alias: Option<&str>) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self {
            low: low.to_string(),
            high: high.to_string(),
            alias: alias.unwrap_or_default().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssociationRegistry {
    edges: Vec<AssociationEdge>,
    /// table -> mount name -> edge index
    #[serde(skip)]
    mounts: BTreeMap<String, BTreeMap<String, usize>>,
    #[serde(skip)]
    pairs: BTreeMap<PairKey, usize>,
    through_tables: Vec<ThroughTable>,
}

impl AssociationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an edge and mount it on its source table. A mount name already
    /// taken on that table keeps pointing at the first edge.
    pub fn push(&mut self, edge: AssociationEdge) -> Option<Diagnostic> {
        let mount = edge.mount_name();
        let id = self.edges.len();
        let mounts = self.mounts.entry(edge.from.clone()).or_default();
        let diagnostic = if mounts.contains_key(&mount) {
            Some(Diagnostic::warning(format!(
                "Association name {mount} already used on {}, {:?} {} -> {} is not mounted",
                edge.from, edge.kind, edge.from, edge.to
            )))
        } else {
            mounts.insert(mount, id);
            None
        };
        self.edges.push(edge);
        diagnostic
    }

    /// Through-table already created for this pair and alias, in either
    /// direction.
    pub fn through_for(&self, a: &str, b: &str, alias: Option<&str>) -> Option<&ThroughTable> {
        self.pairs
            .get(&PairKey::new(a, b, alias))
            .map(|&id| &self.through_tables[id])
    }

    pub fn insert_through(&mut self, through: ThroughTable) {
        let key = PairKey::new(&through.left.table, &through.right.table, through.alias.as_deref());
        self.pairs.insert(key, self.through_tables.len());
        self.through_tables.push(through);
    }

    pub fn edges(&self) -> &[AssociationEdge] {
        &self.edges
    }

    pub fn edges_from<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a AssociationEdge> {
        self.edges.iter().filter(move |e| e.from == table)
    }

    /// Edge mounted on `table` under `name`.
    pub fn mounted(&self, table: &str, name: &str) -> Option<&AssociationEdge> {
        self.mounts
            .get(table)
            .and_then(|m| m.get(name))
            .map(|&id| &self.edges[id])
    }

    /// Mount names on `table`, sorted.
    pub fn mounts(&self, table: &str) -> impl Iterator<Item = (&str, &AssociationEdge)> {
        self.mounts
            .get(table)
            .into_iter()
            .flat_map(move |m| {
                m.iter()
                    .map(move |(name, &id)| (name.as_str(), &self.edges[id]))
            })
    }

    pub fn through_tables(&self) -> &[ThroughTable] {
        &self.through_tables
    }

    pub fn through_table(&self, name: &str) -> Option<&ThroughTable> {
        self.through_tables.iter().find(|t| t.name == name)
    }
}
