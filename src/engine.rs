//! Persistence collaborator contract. The compiler hands table definitions
//! and association edges to an [`Engine`]; accessors and CRUD helpers call
//! back into it with [`Filter`]s.

use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::ast::{AssociationEdge, TableDefinition};
use crate::crud::Table;

/// One row as the engine returns it.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Equality; `Null` matches a missing or null column.
    Eq(String, Value),
    In(String, Vec<Value>),
}

impl Condition {
    fn matches(&self, record: &Record) -> bool {
        match self {
            Self::Eq(column, Value::Null) => record.get(column).is_none_or(Value::is_null),
            Self::Eq(column, value) => record.get(column) == Some(value),
            Self::In(column, values) => record.get(column).is_some_and(|v| values.contains(v)),
        }
    }
}

/// Conjunction of column conditions. The empty filter matches every row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and_eq(column, value)
    }

    pub fn and_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq(column.into(), value.into()));
        self
    }

    pub fn and_in(mut self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions.push(Condition::In(column.into(), values));
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}

/// Storage backend driven by a compiled schema.
///
/// Field codecs are exposed on [`crate::ast::FieldSpec::codec`]; the engine
/// encodes before storing and decodes after fetching.
#[allow(async_fn_in_trait)]
pub trait Engine {
    type Handle: Clone;
    type Error: std::error::Error + 'static;

    fn define_table(&mut self, table: &TableDefinition) -> Result<Self::Handle, Self::Error>;

    fn declare_association(
        &mut self,
        from: &Self::Handle,
        to: &Self::Handle,
        edge: &AssociationEdge,
    ) -> Result<(), Self::Error>;

    async fn create(&self, table: &Self::Handle, values: Record) -> Result<Record, Self::Error>;

    async fn find_one(&self, table: &Self::Handle, filter: &Filter) -> Result<Option<Record>, Self::Error>;

    async fn find_all(&self, table: &Self::Handle, filter: &Filter) -> Result<Vec<Record>, Self::Error>;

    /// Returns the number of rows changed.
    async fn update(&self, table: &Self::Handle, filter: &Filter, values: Record) -> Result<u64, Self::Error>;

    /// Returns the number of rows removed.
    async fn destroy(&self, table: &Self::Handle, filter: &Filter) -> Result<u64, Self::Error>;

    async fn count(&self, table: &Self::Handle, filter: &Filter) -> Result<u64, Self::Error>;
}

#[derive(Debug, Error)]
pub enum EmitError<E> {
    #[error("Engine rejected table {table}: {source}")]
    DefineTable {
        table: String,
        #[source]
        source: E,
    },
    #[error("Engine rejected association {from} -> {to}: {source}")]
    DeclareAssociation {
        from: String,
        to: String,
        #[source]
        source: E,
    },
    #[error("No engine handle for table {0}")]
    MissingHandle(String),
}

/// Engine handles of every emitted table, by table name.
#[derive(Debug, Clone)]
pub struct Handles<H> {
    by_table: HashMap<String, H>,
}

impl<H> Default for Handles<H> {
    fn default() -> Self {
        Self {
            by_table: HashMap::new(),
        }
    }
}

impl<H> Handles<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: impl Into<String>, handle: H) {
        self.by_table.insert(table.into(), handle);
    }

    pub fn get(&self, table: &str) -> Option<&H> {
        self.by_table.get(table)
    }

    pub fn len(&self) -> usize {
        self.by_table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_table.is_empty()
    }

    pub fn bind<'a, E: Engine<Handle = H>>(&'a self, engine: &'a E) -> Bound<'a, E> {
        Bound { engine, handles: self }
    }
}

/// An engine paired with the handles it issued.
pub struct Bound<'a, E: Engine> {
    pub engine: &'a E,
    pub handles: &'a Handles<E::Handle>,
}

impl<E: Engine> Clone for Bound<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: Engine> Copy for Bound<'_, E> {}

impl<'a, E: Engine> Bound<'a, E> {
    pub fn handle(&self, table: &str) -> Option<&'a E::Handle> {
        self.handles.get(table)
    }

    pub fn table(&self, name: &'a str) -> Option<Table<'a, E>> {
        self.handle(name).map(|handle| Table::new(self.engine, handle, name))
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filter_matching() {
        let row = record(json!({"id": 1, "name": "a", "OrgId": null}));
        assert!(Filter::all().matches(&row));
        assert!(Filter::eq("id", 1).and_eq("name", "a").matches(&row));
        assert!(!Filter::eq("id", 2).matches(&row));
        assert!(Filter::eq("OrgId", Value::Null).matches(&row));
        assert!(Filter::eq("missing", Value::Null).matches(&row));
        assert!(Filter::all().and_in("id", vec![json!(3), json!(1)]).matches(&row));
        assert!(!Filter::all().and_in("id", vec![]).matches(&row));
    }

    #[test]
    fn test_handles() {
        let mut handles = Handles::new();
        assert!(handles.is_empty());
        handles.insert("User", 7u32);
        assert_eq!(handles.get("User"), Some(&7));
        assert_eq!(handles.len(), 1);
    }
}
