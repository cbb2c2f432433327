//! Association accessors: the fixed verb set bound per association alias.
//!
//! Accessors are looked up by alias with [`TableAccessors::get`]; the method
//! names they carry (`getTags`, `addTag`, ...) are informational.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::ast::{AssociationEdge, AssociationKind, CompiledSchema};
use crate::engine::{Bound, Engine, Filter, Record};
use crate::inflect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Get,
    Set,
    Add,
    Remove,
    Has,
    Count,
}

impl Verb {
    pub const ALL: [Verb; 6] = [
        Verb::Get,
        Verb::Set,
        Verb::Add,
        Verb::Remove,
        Verb::Has,
        Verb::Count,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Set => "set",
            Verb::Add => "add",
            Verb::Remove => "remove",
            Verb::Has => "has",
            Verb::Count => "count",
        }
    }

    /// Single-row verbs take the singular form on multi-row associations.
    fn takes_singular(self) -> bool {
        matches!(self, Verb::Add | Verb::Remove | Verb::Has)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AccessError<E> {
    #[error(transparent)]
    Engine(E),
    #[error(transparent)]
    Usage(#[from] UsageError),
}

/// Accessor misuse, independent of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("No engine handle for table {0}")]
    UnknownTable(String),
    #[error("{table} record has no value for {column}")]
    MissingKey { table: String, column: String },
    #[error("{alias} holds at most one record, got {count}")]
    TooManyTargets { alias: String, count: usize },
}

/// Through-table columns of a many-to-many accessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThroughBinding {
    pub table: String,
    /// Column pointing at the accessor's source table.
    pub source_key: String,
    /// Column pointing at the accessor's target table.
    pub target_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssociationAccessor {
    pub alias: String,
    pub kind: AssociationKind,
    pub source: String,
    pub target: String,
    pub source_key: String,
    pub target_key: String,
    pub foreign_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub through: Option<ThroughBinding>,
    pub methods: BTreeMap<Verb, String>,
}

impl AssociationAccessor {
    fn new(schema: &CompiledSchema, alias: &str, edge: &AssociationEdge) -> Self {
        let primary_key = |table: &str| {
            schema
                .table(table)
                .map(|t| t.primary_key().to_string())
                .unwrap_or_else(|| "id".to_string())
        };

        let (singular, plural) = if edge.kind.is_single() {
            (inflect::capitalize(alias), inflect::capitalize(alias))
        } else {
            (inflect::singularize(alias), inflect::pluralize(alias))
        };
        let methods = Verb::ALL
            .iter()
            .map(|&verb| {
                let noun = if verb.takes_singular() { &singular } else { &plural };
                (verb, format!("{verb}{noun}"))
            })
            .collect();

        let through = edge.through.as_ref().map(|table| ThroughBinding {
            table: table.clone(),
            source_key: edge.foreign_key.clone(),
            target_key: edge.other_key.clone().unwrap_or_default(),
        });

        Self {
            alias: alias.to_string(),
            kind: edge.kind,
            source: edge.from.clone(),
            target: edge.to.clone(),
            source_key: primary_key(&edge.from),
            target_key: primary_key(&edge.to),
            foreign_key: edge.foreign_key.clone(),
            through,
            methods,
        }
    }

    pub fn method(&self, verb: Verb) -> Option<&str> {
        self.methods.get(&verb).map(String::as_str)
    }

    fn through_binding(&self) -> Result<&ThroughBinding, UsageError> {
        self.through
            .as_ref()
            .ok_or_else(|| UsageError::UnknownTable(format!("through table of {}", self.alias)))
    }

    /// Associated records of `source`.
    pub async fn get<E: Engine>(&self, bound: &Bound<'_, E>, source: &Record) -> Result<Vec<Record>, AccessError<E::Error>> {
        let target = handle(bound, &self.target)?;
        match self.kind {
            AssociationKind::BelongsTo => {
                let Some(fk) = source.get(&self.foreign_key).filter(|v| !v.is_null()) else {
                    return Ok(Vec::new());
                };
                let filter = Filter::eq(&self.target_key, fk.clone());
                let found = bound.engine.find_one(target, &filter).await.map_err(AccessError::Engine)?;
                Ok(found.into_iter().collect())
            }
            AssociationKind::HasOne => {
                let filter = Filter::eq(&self.foreign_key, self.source_id(source)?);
                let found = bound.engine.find_one(target, &filter).await.map_err(AccessError::Engine)?;
                Ok(found.into_iter().collect())
            }
            AssociationKind::HasMany => {
                let filter = Filter::eq(&self.foreign_key, self.source_id(source)?);
                bound.engine.find_all(target, &filter).await.map_err(AccessError::Engine)
            }
            AssociationKind::BelongsToMany => {
                let through = self.through_binding()?;
                let links = bound
                    .engine
                    .find_all(handle(bound, &through.table)?, &Filter::eq(&through.source_key, self.source_id(source)?))
                    .await
                    .map_err(AccessError::Engine)?;
                let ids: Vec<Value> = links
                    .into_iter()
                    .filter_map(|mut link| link.remove(&through.target_key))
                    .collect();
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                let filter = Filter::all().and_in(&self.target_key, ids);
                bound.engine.find_all(target, &filter).await.map_err(AccessError::Engine)
            }
        }
    }

    /// Replace the associated records of `source` with `targets`. An empty
    /// slice clears the association.
    pub async fn set<E: Engine>(
        &self,
        bound: &Bound<'_, E>,
        source: &Record,
        targets: &[Record],
    ) -> Result<(), AccessError<E::Error>> {
        if self.kind.is_single() && targets.len() > 1 {
            return Err(UsageError::TooManyTargets {
                alias: self.alias.clone(),
                count: targets.len(),
            }
            .into());
        }
        let engine = bound.engine;
        match self.kind {
            AssociationKind::BelongsTo => {
                let value = match targets.first() {
                    Some(target) => self.target_id(target)?,
                    None => Value::Null,
                };
                let filter = Filter::eq(&self.source_key, self.source_id(source)?);
                engine
                    .update(handle(bound, &self.source)?, &filter, assignment(&self.foreign_key, value))
                    .await
                    .map_err(AccessError::Engine)?;
            }
            AssociationKind::HasOne | AssociationKind::HasMany => {
                let id = self.source_id(source)?;
                let table = handle(bound, &self.target)?;
                engine
                    .update(table, &Filter::eq(&self.foreign_key, id.clone()), assignment(&self.foreign_key, Value::Null))
                    .await
                    .map_err(AccessError::Engine)?;
                for target in targets {
                    let filter = Filter::eq(&self.target_key, self.target_id(target)?);
                    engine
                        .update(table, &filter, assignment(&self.foreign_key, id.clone()))
                        .await
                        .map_err(AccessError::Engine)?;
                }
            }
            AssociationKind::BelongsToMany => {
                let through = self.through_binding()?;
                let table = handle(bound, &through.table)?;
                let id = self.source_id(source)?;
                engine
                    .destroy(table, &Filter::eq(&through.source_key, id.clone()))
                    .await
                    .map_err(AccessError::Engine)?;
                for target in targets {
                    engine
                        .create(table, self.link_row(through, id.clone(), self.target_id(target)?))
                        .await
                        .map_err(AccessError::Engine)?;
                }
            }
        }
        Ok(())
    }

    /// Attach `target` to `source`; already attached targets are left alone.
    /// On a single-row association this replaces the current target.
    pub async fn add<E: Engine>(&self, bound: &Bound<'_, E>, source: &Record, target: &Record) -> Result<(), AccessError<E::Error>> {
        if self.kind.is_single() {
            return self.set(bound, source, std::slice::from_ref(target)).await;
        }
        let id = self.source_id(source)?;
        let target_id = self.target_id(target)?;
        match &self.through {
            Some(through) => {
                if !self.has(bound, source, target).await? {
                    bound
                        .engine
                        .create(handle(bound, &through.table)?, self.link_row(through, id, target_id))
                        .await
                        .map_err(AccessError::Engine)?;
                }
            }
            None => {
                bound
                    .engine
                    .update(
                        handle(bound, &self.target)?,
                        &Filter::eq(&self.target_key, target_id),
                        assignment(&self.foreign_key, id),
                    )
                    .await
                    .map_err(AccessError::Engine)?;
            }
        }
        Ok(())
    }

    /// Detach `target` from `source`. A key pointing elsewhere is left alone.
    pub async fn remove<E: Engine>(&self, bound: &Bound<'_, E>, source: &Record, target: &Record) -> Result<(), AccessError<E::Error>> {
        match self.kind {
            AssociationKind::BelongsToMany => {
                let through = self.through_binding()?;
                bound
                    .engine
                    .destroy(handle(bound, &through.table)?, &self.link_filter(through, source, target)?)
                    .await
                    .map_err(AccessError::Engine)?;
            }
            AssociationKind::BelongsTo | AssociationKind::HasOne | AssociationKind::HasMany => {
                let (table, filter) = self.key_filter(source, target)?;
                bound
                    .engine
                    .update(handle(bound, table)?, &filter, assignment(&self.foreign_key, Value::Null))
                    .await
                    .map_err(AccessError::Engine)?;
            }
        }
        Ok(())
    }

    pub async fn has<E: Engine>(&self, bound: &Bound<'_, E>, source: &Record, target: &Record) -> Result<bool, AccessError<E::Error>> {
        let (table, filter) = match self.kind {
            AssociationKind::BelongsToMany => {
                let through = self.through_binding()?;
                (through.table.as_str(), self.link_filter(through, source, target)?)
            }
            AssociationKind::BelongsTo | AssociationKind::HasOne | AssociationKind::HasMany => {
                self.key_filter(source, target)?
            }
        };
        let found = bound
            .engine
            .count(handle(bound, table)?, &filter)
            .await
            .map_err(AccessError::Engine)?;
        Ok(found > 0)
    }

    /// Number of records associated with `source`; at most 1 on single-row
    /// associations.
    pub async fn count<E: Engine>(&self, bound: &Bound<'_, E>, source: &Record) -> Result<u64, AccessError<E::Error>> {
        let id = self.source_id(source)?;
        let (table, filter) = match self.kind {
            AssociationKind::BelongsTo => {
                let stored = bound
                    .engine
                    .find_one(handle(bound, &self.source)?, &Filter::eq(&self.source_key, id))
                    .await
                    .map_err(AccessError::Engine)?;
                let linked = stored
                    .and_then(|row| row.get(&self.foreign_key).cloned())
                    .is_some_and(|fk| !fk.is_null());
                return Ok(u64::from(linked));
            }
            AssociationKind::BelongsToMany => {
                let through = self.through_binding()?;
                (through.table.as_str(), Filter::eq(&through.source_key, id))
            }
            AssociationKind::HasOne | AssociationKind::HasMany => (self.target.as_str(), Filter::eq(&self.foreign_key, id)),
        };
        let found = bound
            .engine
            .count(handle(bound, table)?, &filter)
            .await
            .map_err(AccessError::Engine)?;
        Ok(if self.kind.is_single() { found.min(1) } else { found })
    }

    /// Table holding the foreign key, filtered to the row where it links
    /// `source` and `target`.
    fn key_filter(&self, source: &Record, target: &Record) -> Result<(&str, Filter), UsageError> {
        let source_id = self.source_id(source)?;
        let target_id = self.target_id(target)?;
        Ok(match self.kind {
            AssociationKind::BelongsTo => (
                self.source.as_str(),
                Filter::eq(&self.source_key, source_id).and_eq(&self.foreign_key, target_id),
            ),
            _ => (
                self.target.as_str(),
                Filter::eq(&self.target_key, target_id).and_eq(&self.foreign_key, source_id),
            ),
        })
    }

    fn source_id(&self, source: &Record) -> Result<Value, UsageError> {
        key_of(source, &self.source, &self.source_key)
    }

    fn target_id(&self, target: &Record) -> Result<Value, UsageError> {
        key_of(target, &self.target, &self.target_key)
    }

    fn link_row(&self, through: &ThroughBinding, source_id: Value, target_id: Value) -> Record {
        let mut row = Record::new();
        row.insert(through.source_key.clone(), source_id);
        row.insert(through.target_key.clone(), target_id);
        row
    }

    fn link_filter(&self, through: &ThroughBinding, source: &Record, target: &Record) -> Result<Filter, UsageError> {
        Ok(Filter::eq(&through.source_key, self.source_id(source)?).and_eq(&through.target_key, self.target_id(target)?))
    }
}

fn handle<'a, E: Engine>(bound: &Bound<'a, E>, table: &str) -> Result<&'a E::Handle, UsageError> {
    bound
        .handle(table)
        .ok_or_else(|| UsageError::UnknownTable(table.to_string()))
}

fn key_of(record: &Record, table: &str, column: &str) -> Result<Value, UsageError> {
    match record.get(column) {
        Some(value) if !value.is_null() => Ok(value.clone()),
        _ => Err(UsageError::MissingKey {
            table: table.to_string(),
            column: column.to_string(),
        }),
    }
}

fn assignment(column: &str, value: Value) -> Record {
    let mut values = Record::new();
    values.insert(column.to_string(), value);
    values
}

/// Accessors mounted on one table, keyed by alias.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TableAccessors {
    pub table: String,
    accessors: BTreeMap<String, AssociationAccessor>,
}

impl TableAccessors {
    pub fn get(&self, alias: &str) -> Option<&AssociationAccessor> {
        self.accessors.get(alias)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssociationAccessor> {
        self.accessors.values()
    }

    pub fn len(&self) -> usize {
        self.accessors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }
}

/// Accessors for every association mounted on `table`. Reads the schema
/// only; calling it twice gives equal results.
pub fn synthesize(schema: &CompiledSchema, table: &str) -> TableAccessors {
    let accessors = schema
        .associations
        .mounts(table)
        .map(|(alias, edge)| (alias.to_string(), AssociationAccessor::new(schema, alias, edge)))
        .collect();
    TableAccessors {
        table: table.to_string(),
        accessors,
    }
}

/// [`synthesize`] for every table with at least one association.
pub fn synthesize_all(schema: &CompiledSchema) -> BTreeMap<String, TableAccessors> {
    schema
        .tables
        .iter()
        .map(|t| synthesize(schema, &t.name))
        .filter(|a| !a.is_empty())
        .map(|a| (a.table.clone(), a))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::compiler::{Compiler, emit};
    use crate::engine::Handles;
    use crate::engine::testing::MemoryEngine;

    fn schema() -> CompiledSchema {
        Compiler::default()
            .compile(&json!({
                "Org": { "*id": "integer", "name": "string" },
                "User": { "*id": "integer", "name": "string", ">orgId@employer": {} },
                "Tag": { "*id": "integer", "label": "string" },
                "Post": { "*id": "integer", "title": "string", "><tags": {}, ">userId@author": {} },
            }))
            .unwrap()
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_method_names() {
        let schema = schema();
        let post = synthesize(&schema, "Post");
        let tags = post.get("Tags").unwrap();
        assert_eq!(tags.kind, AssociationKind::BelongsToMany);
        let names: Vec<_> = Verb::ALL.iter().filter_map(|&v| tags.method(v)).collect();
        assert_eq!(
            names,
            vec!["getTags", "setTags", "addTag", "removeTag", "hasTag", "countTags"]
        );

        let author = post.get("author").unwrap();
        assert_eq!(author.method(Verb::Get), Some("getAuthor"));
        assert_eq!(author.method(Verb::Set), Some("setAuthor"));
        assert_eq!(author.method(Verb::Add), Some("addAuthor"));
        assert_eq!(author.method(Verb::Count), Some("countAuthor"));
        assert_eq!(author.methods.len(), Verb::ALL.len());

        let org = synthesize(&schema, "Org");
        assert_eq!(org.get("Users").unwrap().method(Verb::Has), Some("hasUser"));
    }

    #[test]
    fn test_synthesize_is_pure() {
        let schema = schema();
        assert_eq!(synthesize(&schema, "Post"), synthesize(&schema, "Post"));
        assert_eq!(synthesize_all(&schema).len(), 4);
        assert!(synthesize(&schema, "Nope").is_empty());
    }

    async fn setup() -> (CompiledSchema, MemoryEngine, Handles<String>) {
        let schema = schema();
        let mut engine = MemoryEngine::default();
        let handles = emit(&schema, &mut engine).unwrap();
        (schema, engine, handles)
    }

    #[tokio::test]
    async fn test_belongs_to_many_verbs() {
        let (schema, engine, handles) = setup().await;
        let bound = handles.bind(&engine);
        let tags = synthesize(&schema, "Post").get("Tags").cloned().unwrap();

        let posts = bound.table("Post").unwrap();
        let tag_table = bound.table("Tag").unwrap();
        let post = posts.create(record(json!({"title": "hello"}))).await.unwrap();
        let rust = tag_table.create(record(json!({"label": "rust"}))).await.unwrap();
        let wasm = tag_table.create(record(json!({"label": "wasm"}))).await.unwrap();

        tags.add(&bound, &post, &rust).await.unwrap();
        tags.add(&bound, &post, &rust).await.unwrap();
        tags.add(&bound, &post, &wasm).await.unwrap();
        assert_eq!(tags.count(&bound, &post).await.unwrap(), 2);
        assert!(tags.has(&bound, &post, &wasm).await.unwrap());

        tags.remove(&bound, &post, &wasm).await.unwrap();
        assert!(!tags.has(&bound, &post, &wasm).await.unwrap());
        let found = tags.get(&bound, &post).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["label"], json!("rust"));

        tags.set(&bound, &post, &[wasm.clone()]).await.unwrap();
        let found = tags.get(&bound, &post).await.unwrap();
        assert_eq!(found[0]["label"], json!("wasm"));

        let posts_of_tag = synthesize(&schema, "Tag").get("Posts").cloned().unwrap();
        assert_eq!(posts_of_tag.count(&bound, &wasm).await.unwrap(), 1);
        assert_eq!(engine.rows("Tag@Post").len(), 1);
    }

    #[tokio::test]
    async fn test_one_to_many_verbs() {
        let (schema, engine, handles) = setup().await;
        let bound = handles.bind(&engine);
        let orgs = bound.table("Org").unwrap();
        let users = bound.table("User").unwrap();
        let acme = orgs.create(record(json!({"name": "acme"}))).await.unwrap();
        let ann = users.create(record(json!({"name": "ann"}))).await.unwrap();
        let bob = users.create(record(json!({"name": "bob"}))).await.unwrap();

        let members = synthesize(&schema, "Org").get("Users").cloned().unwrap();
        assert_eq!(members.foreign_key, "EmployerId");
        members.set(&bound, &acme, &[ann.clone(), bob.clone()]).await.unwrap();
        assert_eq!(members.count(&bound, &acme).await.unwrap(), 2);
        members.remove(&bound, &acme, &bob).await.unwrap();
        assert!(!members.has(&bound, &acme, &bob).await.unwrap());
        members.add(&bound, &acme, &bob).await.unwrap();
        assert!(members.has(&bound, &acme, &bob).await.unwrap());

        let employer = synthesize(&schema, "User").get("employer").cloned().unwrap();
        let ann = users.find_one(&Filter::eq("name", "ann")).await.unwrap().unwrap();
        let found = employer.get(&bound, &ann).await.unwrap();
        assert_eq!(found[0]["name"], json!("acme"));

        employer.set(&bound, &ann, &[]).await.unwrap();
        let ann = users.find_one(&Filter::eq("name", "ann")).await.unwrap().unwrap();
        assert!(employer.get(&bound, &ann).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_belongs_to_verbs() {
        let (schema, engine, handles) = setup().await;
        let bound = handles.bind(&engine);
        let orgs = bound.table("Org").unwrap();
        let users = bound.table("User").unwrap();
        let acme = orgs.create(record(json!({"name": "acme"}))).await.unwrap();
        let initech = orgs.create(record(json!({"name": "initech"}))).await.unwrap();
        let ann = users.create(record(json!({"name": "ann"}))).await.unwrap();

        let employer = synthesize(&schema, "User").get("employer").cloned().unwrap();
        assert_eq!(employer.count(&bound, &ann).await.unwrap(), 0);
        assert!(!employer.has(&bound, &ann, &acme).await.unwrap());

        employer.add(&bound, &ann, &acme).await.unwrap();
        assert!(employer.has(&bound, &ann, &acme).await.unwrap());
        assert_eq!(employer.count(&bound, &ann).await.unwrap(), 1);

        employer.add(&bound, &ann, &initech).await.unwrap();
        assert!(!employer.has(&bound, &ann, &acme).await.unwrap());
        assert!(employer.has(&bound, &ann, &initech).await.unwrap());
        assert_eq!(employer.count(&bound, &ann).await.unwrap(), 1);

        employer.remove(&bound, &ann, &acme).await.unwrap();
        assert!(employer.has(&bound, &ann, &initech).await.unwrap());

        employer.remove(&bound, &ann, &initech).await.unwrap();
        assert_eq!(employer.count(&bound, &ann).await.unwrap(), 0);
        assert_eq!(engine.rows("User")[0]["EmployerId"], Value::Null);
    }

    #[tokio::test]
    async fn test_has_one_verbs() {
        let schema = Compiler::default()
            .compile(&json!({
                "User": { "*id": "integer", "name": "string" },
                "Profile": { "*id": "integer", "bio": "string", "<user@owner*": {} },
            }))
            .unwrap();
        let mut engine = MemoryEngine::default();
        let handles = emit(&schema, &mut engine).unwrap();
        let bound = handles.bind(&engine);
        let users = bound.table("User").unwrap();
        let profiles = bound.table("Profile").unwrap();
        let ann = users.create(record(json!({"name": "ann"}))).await.unwrap();
        let first = profiles.create(record(json!({"bio": "one"}))).await.unwrap();
        let second = profiles.create(record(json!({"bio": "two"}))).await.unwrap();

        let profile = synthesize(&schema, "User").get("Profile").cloned().unwrap();
        assert_eq!(profile.kind, AssociationKind::HasOne);
        assert_eq!(profile.method(Verb::Has), Some("hasProfile"));

        profile.add(&bound, &ann, &first).await.unwrap();
        assert!(profile.has(&bound, &ann, &first).await.unwrap());
        profile.add(&bound, &ann, &second).await.unwrap();
        assert!(!profile.has(&bound, &ann, &first).await.unwrap());
        assert_eq!(profile.count(&bound, &ann).await.unwrap(), 1);
        assert_eq!(profile.get(&bound, &ann).await.unwrap()[0]["bio"], json!("two"));

        profile.remove(&bound, &ann, &first).await.unwrap();
        assert_eq!(profile.count(&bound, &ann).await.unwrap(), 1);
        profile.remove(&bound, &ann, &second).await.unwrap();
        assert_eq!(profile.count(&bound, &ann).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_access_errors() {
        let (schema, engine, handles) = setup().await;
        let bound = handles.bind(&engine);
        let employer = synthesize(&schema, "User").get("employer").cloned().unwrap();
        let user = record(json!({"id": 1}));
        let org = record(json!({"id": 1}));

        let err = employer.has(&bound, &user, &record(json!({"name": "x"}))).await.unwrap_err();
        assert!(matches!(err, AccessError::Usage(UsageError::MissingKey { ref table, .. }) if table == "Org"));

        let err = employer.set(&bound, &user, &[org.clone(), org.clone()]).await.unwrap_err();
        assert!(matches!(err, AccessError::Usage(UsageError::TooManyTargets { count: 2, .. })));

        let members = synthesize(&schema, "Org").get("Users").cloned().unwrap();
        let err = members.count(&bound, &record(json!({"name": "x"}))).await.unwrap_err();
        assert!(matches!(err, AccessError::Usage(UsageError::MissingKey { ref column, .. }) if column == "id"));
    }
}
