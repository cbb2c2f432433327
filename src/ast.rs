use serde::Serialize;
use serde_json::{Map, Value};

use crate::codec::CodecKind;
use crate::error::Diagnostic;
use crate::inflect;
use crate::marker::IndexMethod;
use crate::registry::AssociationRegistry;
use crate::types::{TypeDescriptor, TypeTag};

/// Free-form table options handed to the engine untouched.
pub type OptionBag = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDefinition {
    pub name: String,
    pub fields: Vec<FieldSpec>,
    pub options: OptionBag,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            options: OptionBag::new(),
            indexes: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Insert a field, replacing one with the same name. Returns `true` when
    /// a field was replaced.
    pub fn insert_field(&mut self, field: FieldSpec) -> bool {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => {
                *existing = field;
                true
            }
            None => {
                self.fields.push(field);
                false
            }
        }
    }

    /// Name of the primary key column, `id` when none is declared.
    pub fn primary_key(&self) -> &str {
        self.fields
            .iter()
            .find(|f| f.primary_key)
            .map(|f| f.name.as_str())
            .unwrap_or("id")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: TypeDescriptor,
    pub nullable: bool,
    pub unique: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<CodecKind>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, typ: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            typ,
            nullable: true,
            unique: false,
            primary_key: false,
            auto_increment: false,
            default_value: None,
            codec: None,
        }
    }

    /// Mark as primary key; integer keys auto-increment.
    pub fn with_primary_key(mut self) -> Self {
        self.primary_key = true;
        self.auto_increment = self.typ.tag.is_integer();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDefinition {
    pub name: String,
    pub method: IndexMethod,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AssociationKind {
    HasOne,
    HasMany,
    BelongsTo,
    BelongsToMany,
}

impl AssociationKind {
    /// At most one associated row.
    pub fn is_single(self) -> bool {
        matches!(self, Self::HasOne | Self::BelongsTo)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssociationEdge {
    pub from: String,
    pub to: String,
    pub kind: AssociationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub foreign_key: String,
    /// Through-table column pointing at `to` (many-to-many only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_key: Option<String>,
    pub allow_null_fk: bool,
    pub mount_as_primary_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub through: Option<String>,
}

impl AssociationEdge {
    /// Name the association is mounted under on `from`: the alias, or the
    /// target name in singular/plural form depending on the kind.
    pub fn mount_name(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None if self.kind.is_single() => inflect::singularize(&self.to),
            None => inflect::pluralize(&self.to),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThroughSide {
    pub table: String,
    pub foreign_key: String,
}

/// Auxiliary table backing one many-to-many association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThroughTable {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub left: ThroughSide,
    pub right: ThroughSide,
}

impl ThroughTable {
    /// Table definition with both foreign keys forming the key.
    pub fn definition(&self) -> TableDefinition {
        let mut table = TableDefinition::new(self.name.clone());
        for side in [&self.left, &self.right] {
            let mut field = FieldSpec::new(
                side.foreign_key.clone(),
                TypeDescriptor::new(TypeTag::Integer),
            );
            field.nullable = false;
            field.primary_key = true;
            table.insert_field(field);
        }
        table
            .options
            .insert("freezeTableName".into(), Value::Bool(true));
        table
    }
}

/// Result of one compilation pass. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledSchema {
    pub tables: Vec<TableDefinition>,
    pub associations: AssociationRegistry,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl CompiledSchema {
    pub fn table(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn through_tables(&self) -> &[ThroughTable] {
        self.associations.through_tables()
    }

    pub fn edges(&self) -> &[AssociationEdge] {
        self.associations.edges()
    }

    pub fn edges_from<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a AssociationEdge> {
        self.associations.edges_from(table)
    }
}
