//! Table-scoped CRUD calls and record shaping helpers.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::engine::{Engine, Filter, Record};

/// CRUD calls bound to one table.
pub struct Table<'a, E: Engine> {
    engine: &'a E,
    handle: &'a E::Handle,
    name: &'a str,
}

impl<'a, E: Engine> Table<'a, E> {
    pub fn new(engine: &'a E, handle: &'a E::Handle, name: &'a str) -> Self {
        Self { engine, handle, name }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub async fn create(&self, values: Record) -> Result<Record, E::Error> {
        self.engine.create(self.handle, values).await
    }

    pub async fn find_one(&self, filter: &Filter) -> Result<Option<Record>, E::Error> {
        self.engine.find_one(self.handle, filter).await
    }

    pub async fn find_all(&self, filter: &Filter) -> Result<Vec<Record>, E::Error> {
        self.engine.find_all(self.handle, filter).await
    }

    pub async fn update(&self, filter: &Filter, values: Record) -> Result<u64, E::Error> {
        self.engine.update(self.handle, filter, values).await
    }

    pub async fn destroy(&self, filter: &Filter) -> Result<u64, E::Error> {
        self.engine.destroy(self.handle, filter).await
    }

    pub async fn count(&self, filter: &Filter) -> Result<u64, E::Error> {
        self.engine.count(self.handle, filter).await
    }

    /// Distinct non-null values of `column` among matching rows, sorted.
    pub async fn distinct(&self, column: &str, filter: &Filter) -> Result<Vec<Value>, E::Error> {
        let mut values: Vec<Value> = Vec::new();
        for mut row in self.find_all(filter).await? {
            if let Some(value) = row.remove(column).filter(|v| !v.is_null()) {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
        }
        values.sort_by(compare_values);
        Ok(values)
    }
}

/// Numbers compare numerically and strings lexically; mixed kinds fall back
/// to their JSON text.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => x.to_string().cmp(&y.to_string()),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Shape of what [`values`] returns.
#[derive(Debug, Clone, Copy)]
pub enum Pick<'a> {
    /// The whole record.
    All,
    /// A single column, `null` when absent.
    Column(&'a str),
    /// The record with these entries merged over it.
    Merge(&'a Record),
}

/// Plain value of `record` shaped by `pick`.
pub fn values(record: &Record, pick: Pick<'_>) -> Value {
    match pick {
        Pick::All => Value::Object(record.clone()),
        Pick::Column(column) => record.get(column).cloned().unwrap_or(Value::Null),
        Pick::Merge(extra) => {
            let mut merged = record.clone();
            merged.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
            Value::Object(merged)
        }
    }
}

/// [`values`] over a list of records.
pub fn values_all(records: &[Record], pick: Pick<'_>) -> Vec<Value> {
    records.iter().map(|record| values(record, pick)).collect()
}

/// Drop `keys` from `record` (just `id` when `keys` is empty) before it is
/// handed to `create` or `update`.
pub fn clean_params(mut record: Record, keys: &[&str]) -> Record {
    let keys = if keys.is_empty() { &["id"][..] } else { keys };
    for key in keys {
        record.remove(*key);
    }
    record
}

/// Expand dotted keys into nested objects: `{"a.b": 1}` becomes
/// `{"a": {"b": 1}}`. A scalar in the way is replaced by an object.
pub fn to_nested(flat: &Record) -> Record {
    let mut nested = Record::new();
    for (path, value) in flat {
        let parts: Vec<&str> = path.split('.').collect();
        insert_path(&mut nested, &parts, value.clone());
    }
    nested
}

fn insert_path(node: &mut Record, path: &[&str], value: Value) {
    match path {
        [] => {}
        [last] => {
            node.insert(last.to_string(), value);
        }
        [head, rest @ ..] => match node.entry(head.to_string()).or_insert_with(|| Value::Object(Map::new())) {
            Value::Object(child) => insert_path(child, rest, value),
            other => {
                let mut child = Map::new();
                insert_path(&mut child, rest, value);
                *other = Value::Object(child);
            }
        },
    }
}

/// Merge rows that agree on every non-array column, concatenating their
/// array columns, then apply the same merge to arrays of objects.
pub fn array_to_nested(rows: &[Record]) -> Vec<Record> {
    let mut merged: Vec<Record> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let mut scalars: Vec<(&String, &Value)> = row.iter().filter(|(_, v)| !v.is_array()).collect();
        scalars.sort_by(|a, b| a.0.cmp(b.0));
        let identity = Value::Object(
            scalars
                .into_iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
        .to_string();

        let position = *positions.entry(identity).or_insert_with(|| {
            merged.push(row.iter().filter(|(_, v)| !v.is_array()).map(|(k, v)| (k.clone(), v.clone())).collect());
            merged.len() - 1
        });
        let target = &mut merged[position];
        for (key, value) in row {
            if let Value::Array(items) = value {
                match target.entry(key.clone()).or_insert_with(|| Value::Array(Vec::new())) {
                    Value::Array(existing) => existing.extend(items.iter().cloned()),
                    other => *other = Value::Array(items.clone()),
                }
            }
        }
    }

    for record in &mut merged {
        for value in record.values_mut() {
            let Value::Array(items) = value else { continue };
            let objects: Option<Vec<Record>> = items.iter().map(|i| i.as_object().cloned()).collect();
            if let Some(objects) = objects {
                *items = array_to_nested(&objects).into_iter().map(Value::Object).collect();
            }
        }
    }
    merged
}
