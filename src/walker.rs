//! Schema tree walk: discovers tables in a nested document and defers every
//! relation declaration to the link phase.

use serde_json::{Map, Value};
use tracing::debug;

use crate::ast::{FieldSpec, IndexDefinition, TableDefinition};
use crate::config::CompileOptions;
use crate::error::{CompileError, Diagnostic};
use crate::inflect;
use crate::marker::{self, FieldKey, IndexEntry, RelationKey, TypeToken};
use crate::registry::TableRegistry;
use crate::types::TypeResolver;

/// Keys allowed in a typed field object such as `{"type": "string", "default": "x"}`.
const FIELD_ATTRIBUTES: [&str; 2] = ["type", "default"];

/// A relation found under `parent`, resolved once every table is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSpec {
    pub parent: String,
    pub key: RelationKey,
    /// The relation key also carried a sub-table body.
    pub defines_table: bool,
}

#[derive(Debug, Default)]
pub struct WalkOutput {
    pub tables: TableRegistry,
    pub relations: Vec<RelationSpec>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Walker<'a> {
    options: &'a CompileOptions,
    resolver: &'a TypeResolver,
    output: WalkOutput,
}

impl<'a> Walker<'a> {
    pub fn new(options: &'a CompileOptions, resolver: &'a TypeResolver) -> Self {
        Self {
            options,
            resolver,
            output: WalkOutput::default(),
        }
    }

    pub fn walk(mut self, document: &Value) -> Result<WalkOutput, CompileError> {
        let root = document
            .as_object()
            .ok_or_else(|| CompileError::InvalidDocument("top level must be an object".into()))?;

        for (key, value) in root {
            match value {
                Value::Object(body) if !marker::is_options_key(key) => {
                    if RelationKey::parse(key).is_some() {
                        self.warn(format!("Relation marker on top-level key {key} has no parent, ignored"));
                    }
                    self.table(key, body, None)?;
                }
                _ => self.warn(format!("Top-level entry {key} is not a table, ignored")),
            }
        }

        Ok(self.output)
    }

    fn warn(&mut self, message: String) {
        self.output.diagnostics.push(Diagnostic::warning(message));
    }

    fn table(&mut self, raw: &str, body: &Map<String, Value>, parent: Option<&str>) -> Result<(), CompileError> {
        let (stripped, ignored) = marker::split_name(raw);
        if let Some(ignored) = ignored {
            self.warn(format!("Ignoring `{ignored}` in table key {raw}"));
        }
        let name = inflect::capitalize(&stripped);
        if name.is_empty() {
            self.warn(format!("Table key {raw} has no name, ignored"));
            return Ok(());
        }
        debug!(table = %name, parent = ?parent, "defining table");

        let mut table = TableDefinition::new(name.clone());
        let mut children = Vec::new();
        let first_relation = self.output.relations.len();

        for (key, value) in body {
            match value {
                Value::Object(options) if marker::is_options_key(key) => {
                    table.options.extend(options.clone());
                }
                Value::Array(items) if marker::is_indexes_key(key) => self.indexes(&mut table, items),
                Value::Object(map) => {
                    if let Some(relation) = RelationKey::parse(key) {
                        for ignored in &relation.ignored {
                            self.warn(format!("Ignoring `{ignored}` in relation key {key} of {name}"));
                        }
                        let defines_table = !map.is_empty();
                        if defines_table {
                            children.push((key, map));
                        }
                        self.output.relations.push(RelationSpec {
                            parent: name.clone(),
                            key: relation,
                            defines_table,
                        });
                    } else if is_typed_field(map) {
                        self.field(&mut table, key, value)?;
                    } else {
                        children.push((key, map));
                    }
                }
                Value::String(_) | Value::Array(_) => self.field(&mut table, key, value)?,
                other => self.warn(format!("Entry {name}.{key} holds {other}, ignored")),
            }
        }

        for relation in &self.output.relations[first_relation..] {
            if table.field(&relation.key.target).is_some() {
                return Err(CompileError::FieldRelationConflict {
                    table: name,
                    name: relation.key.target.clone(),
                });
            }
        }

        table.options.insert("freezeTableName".into(), Value::Bool(true));
        if self.options.disable_timestamps {
            table.options.insert("timestamps".into(), Value::Bool(false));
        }

        if let Some(diagnostic) = self.output.tables.register(table, self.options.redefinition)? {
            self.output.diagnostics.push(diagnostic);
        }

        for (key, map) in children {
            self.table(key, map, Some(&name))?;
        }
        Ok(())
    }

    fn field(&mut self, table: &mut TableDefinition, raw: &str, value: &Value) -> Result<(), CompileError> {
        if RelationKey::parse(raw).is_some() {
            self.warn(format!("Relation key {raw} of {} needs an object value, ignored", table.name));
            return Ok(());
        }
        let key = FieldKey::parse(raw);
        if let Some(ignored) = &key.ignored {
            self.warn(format!("Ignoring `{ignored}` in field key {}.{raw}", table.name));
        }
        if key.name.is_empty() {
            self.warn(format!("Field key {raw} of {} has no name, ignored", table.name));
            return Ok(());
        }
        let Some((type_raw, default_value)) = field_source(value) else {
            self.warn(format!("Field {}.{} has no type, ignored", table.name, key.name));
            return Ok(());
        };

        let token = TypeToken::parse(type_raw);
        let Some(resolved) = self.resolver.resolve(&token) else {
            if self.options.strict_types {
                return Err(CompileError::UnknownType {
                    table: table.name.clone(),
                    field: key.name,
                    token: type_raw.to_string(),
                });
            }
            self.warn(format!(
                "Unknown type `{type_raw}` for field {}.{}, field dropped",
                table.name, key.name
            ));
            return Ok(());
        };

        let mut field = FieldSpec::new(key.name, resolved.descriptor);
        field.nullable = !token.not_null;
        field.unique = token.unique;
        field.codec = resolved.codec;
        field.default_value = default_value;
        if key.primary_key {
            field = field.with_primary_key();
        }

        let field_name = field.name.clone();
        if table.insert_field(field) {
            self.warn(format!("Field {}.{field_name} declared twice, last one wins", table.name));
        }
        Ok(())
    }

    fn indexes(&mut self, table: &mut TableDefinition, items: &[Value]) {
        for item in items {
            let Some(raw) = item.as_str() else {
                self.warn(format!("Index entry {item} of {} is not a string, ignored", table.name));
                continue;
            };
            let entry = IndexEntry::parse(raw);
            if entry.field.is_empty() {
                self.warn(format!("Empty index entry on {}, ignored", table.name));
                continue;
            }
            table.indexes.push(IndexDefinition {
                name: format!("{}_{}_idx", table.name, entry.field),
                method: entry.method,
                fields: vec![entry.field],
            });
        }
    }
}

fn is_typed_field(map: &Map<String, Value>) -> bool {
    map.get("type").is_some_and(Value::is_string)
        && map.keys().all(|k| FIELD_ATTRIBUTES.contains(&k.as_str()))
}

/// Type string and default value of a field entry. Arrays read as
/// `[type, default, default]`, the last non-null default winning.
fn field_source(value: &Value) -> Option<(&str, Option<Value>)> {
    match value {
        Value::String(raw) => Some((raw.as_str(), None)),
        Value::Object(map) => {
            let raw = map.get("type")?.as_str()?;
            Some((raw, map.get("default").filter(|v| !v.is_null()).cloned()))
        }
        Value::Array(items) => {
            let (raw, inner) = field_source(items.first()?)?;
            let default_value = items
                .iter()
                .skip(1)
                .take(2)
                .filter(|v| !v.is_null())
                .last()
                .cloned()
                .or(inner);
            Some((raw, default_value))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::codec::CodecKind;
    use crate::config::Redefinition;
    use crate::error::Level;
    use crate::marker::{IndexMethod, RelationShape};
    use crate::types::TypeTag;

    fn walk_with(document: Value, options: CompileOptions) -> Result<WalkOutput, CompileError> {
        let resolver = TypeResolver::default();
        Walker::new(&options, &resolver).walk(&document)
    }

    fn walk(document: Value) -> WalkOutput {
        walk_with(document, CompileOptions::default()).unwrap()
    }

    #[test]
    fn test_fields_and_markers() {
        let out = walk(json!({
            "User": {
                "*id": "integer",
                "name": "string^255!",
                "email": "string~",
                "balance": "bignumber",
            }
        }));
        let user = out.tables.get("User").unwrap();
        assert_eq!(user.fields.len(), 4);

        let id = user.field("id").unwrap();
        assert!(id.primary_key && id.auto_increment);

        let name = user.field("name").unwrap();
        assert_eq!(name.typ.tag, TypeTag::String);
        assert_eq!(name.typ.args, vec!["255"]);
        assert!(!name.nullable);

        assert!(user.field("email").unwrap().unique);
        let balance = user.field("balance").unwrap();
        assert_eq!(balance.typ.tag, TypeTag::Text);
        assert_eq!(balance.codec, Some(CodecKind::BigNumber));
    }

    #[test]
    fn test_defaults_from_array_and_object() {
        let out = walk(json!({
            "Item": {
                "qty": ["integer", 1, 5],
                "kind": ["string", "a", null],
                "flag": {"type": "boolean", "default": true},
                "plain": ["string"],
            }
        }));
        let item = out.tables.get("Item").unwrap();
        assert_eq!(item.field("qty").unwrap().default_value, Some(json!(5)));
        assert_eq!(item.field("kind").unwrap().default_value, Some(json!("a")));
        assert_eq!(item.field("flag").unwrap().default_value, Some(json!(true)));
        assert_eq!(item.field("plain").unwrap().default_value, None);
    }

    #[test]
    fn test_options_and_indexes() {
        let out = walk_with(
            json!({
                "User": {
                    "name": "string",
                    "#opts": {"paranoid": true},
                    "$idx": ["name", "#email"],
                }
            }),
            CompileOptions {
                disable_timestamps: true,
                ..Default::default()
            },
        )
        .unwrap();
        let user = out.tables.get("User").unwrap();
        assert_eq!(user.options["paranoid"], json!(true));
        assert_eq!(user.options["freezeTableName"], json!(true));
        assert_eq!(user.options["timestamps"], json!(false));
        assert_eq!(user.indexes.len(), 2);
        assert_eq!(user.indexes[0].name, "User_name_idx");
        assert_eq!(user.indexes[0].method, IndexMethod::Btree);
        assert_eq!(user.indexes[1].fields, vec!["email"]);
        assert_eq!(user.indexes[1].method, IndexMethod::Hash);
    }

    #[test]
    fn test_nested_tables_register_parent_first() {
        let out = walk(json!({
            "Post": {
                "title": "string",
                ">comments": { "body": "text" },
                "meta": { "key": "string" },
            }
        }));
        assert_eq!(out.tables.names(), vec!["Post", "Comments", "Meta"]);
        assert_eq!(out.relations.len(), 1);
        let relation = &out.relations[0];
        assert_eq!(relation.parent, "Post");
        assert_eq!(relation.key.target, "comments");
        assert!(relation.defines_table);
        assert_eq!(
            relation.key.shape,
            RelationShape::OneToMany(crate::marker::Direction::Forward)
        );
    }

    #[test]
    fn test_empty_relation_is_reference_only() {
        let out = walk(json!({
            "Post": { "><tags": {} },
            "Tag": { "name": "string" },
        }));
        assert_eq!(out.tables.names(), vec!["Post", "Tag"]);
        assert!(!out.relations[0].defines_table);
    }

    #[test]
    fn test_unknown_type_dropped_or_rejected() {
        let out = walk(json!({ "User": { "name": "strng" } }));
        assert!(out.tables.get("User").unwrap().fields.is_empty());
        assert!(out.diagnostics.iter().any(|d| d.level == Level::Warning && d.message.contains("strng")));

        let err = walk_with(
            json!({ "User": { "name": "strng" } }),
            CompileOptions {
                strict_types: true,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::UnknownType { ref field, .. } if field == "name"));
    }

    #[test]
    fn test_reregistration() {
        let document = json!({
            "User": { "a": "string" },
            "Team": { "User": { "b": "string" } },
        });
        let err = walk_with(document.clone(), CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::AmbiguousReregistration { .. }));

        let out = walk_with(
            document,
            CompileOptions {
                redefinition: Redefinition::Overwrite,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(out.tables.get("User").unwrap().field("b").is_some());
    }

    #[test]
    fn test_field_relation_conflict() {
        let err = walk_with(
            json!({ "Post": { "tags": "string", "><tags": {} } }),
            CompileOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::FieldRelationConflict { ref name, .. } if name == "tags"));
    }

    #[test]
    fn test_root_must_be_object() {
        let err = walk_with(json!([1, 2]), CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidDocument(_)));
    }

    #[test]
    fn test_non_table_entries_reported() {
        let out = walk(json!({
            "version": 2,
            "#meta": {"x": 1},
            "User": { "age": 3 },
        }));
        assert_eq!(out.tables.names(), vec!["User"]);
        assert_eq!(out.diagnostics.len(), 3);
    }
}
