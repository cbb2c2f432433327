//! Renders a compiled schema as an aligned text report or as JSON.

use unicode_width::UnicodeWidthStr;

use crate::accessor::TableAccessors;
use crate::ast::{CompiledSchema, FieldSpec, TableDefinition, ThroughTable};
use crate::error::Level;

/// Serialize a compiled schema to a text report.
pub fn serialize(schema: &CompiledSchema) -> String {
    let mut output = String::new();

    for (i, table) in schema.tables.iter().enumerate() {
        if i > 0 {
            output.push('\n');
        }
        serialize_table(&mut output, table, schema);
    }

    for through in schema.through_tables() {
        output.push('\n');
        serialize_through(&mut output, through);
    }

    if !schema.diagnostics.is_empty() {
        output.push('\n');
        for diagnostic in &schema.diagnostics {
            let level = match diagnostic.level {
                Level::Info => "info",
                Level::Warning => "warning",
            };
            output.push_str(&format!("{level}: {}\n", diagnostic.message));
        }
    }

    output
}

/// Pretty JSON rendering of the whole compiled schema.
pub fn to_json(schema: &CompiledSchema) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(schema)
}

fn serialize_table(output: &mut String, table: &TableDefinition, schema: &CompiledSchema) {
    output.push_str(&format!("table {} {{\n", table.name));

    let name_width = column_width(table.fields.iter().map(|f| f.name.as_str()));
    let types: Vec<String> = table.fields.iter().map(|f| f.typ.to_string()).collect();
    let type_width = column_width(types.iter().map(String::as_str));
    for (field, typ) in table.fields.iter().zip(&types) {
        let marker = if field.primary_key { '*' } else { ' ' };
        let line = format!(
            "    {marker}{} {} {}",
            pad(&field.name, name_width),
            pad(typ, type_width),
            field_flags(field).join(" ")
        );
        output.push_str(line.trim_end());
        output.push('\n');
    }

    if !table.options.is_empty() {
        let options = serde_json::Value::Object(table.options.clone());
        output.push_str(&format!("    #options {options}\n"));
    }

    for index in &table.indexes {
        output.push_str(&format!(
            "    ${} {} ({})\n",
            index.name,
            serde_json::to_value(index.method)
                .ok()
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_default(),
            index.fields.join(", ")
        ));
    }

    let mounts: Vec<_> = schema.associations.mounts(&table.name).collect();
    let mount_width = column_width(mounts.iter().map(|(name, _)| *name));
    let kinds: Vec<String> = mounts.iter().map(|(_, e)| format!("{:?}", e.kind)).collect();
    let kind_width = column_width(kinds.iter().map(String::as_str));
    for ((name, edge), kind) in mounts.iter().zip(&kinds) {
        let mut line = format!(
            "    @{} {} -> {} fk {}",
            pad(name, mount_width),
            pad(kind, kind_width),
            edge.to,
            edge.foreign_key
        );
        if let Some(through) = &edge.through {
            line.push_str(&format!(" via {through}"));
        }
        if !edge.allow_null_fk {
            line.push_str(" not null");
        }
        if edge.mount_as_primary_key {
            line.push_str(" primary");
        }
        output.push_str(&line);
        output.push('\n');
    }

    output.push_str("}\n");
}

fn serialize_through(output: &mut String, through: &ThroughTable) {
    output.push_str(&format!("through {} {{\n", through.name));
    let width = column_width([through.left.foreign_key.as_str(), through.right.foreign_key.as_str()]);
    for side in [&through.left, &through.right] {
        output.push_str(&format!("    {} -> {}\n", pad(&side.foreign_key, width), side.table));
    }
    output.push_str("}\n");
}

fn field_flags(field: &FieldSpec) -> Vec<String> {
    let mut flags = Vec::new();
    if !field.nullable {
        flags.push("not null".to_string());
    }
    if field.unique {
        flags.push("unique".to_string());
    }
    if field.auto_increment {
        flags.push("auto increment".to_string());
    }
    if let Some(default) = &field.default_value {
        flags.push(format!("default {default}"));
    }
    if let Some(codec) = field.codec {
        flags.push(format!("codec {codec:?}").to_lowercase());
    }
    flags
}

/// Serialize the accessors of one table: one line per alias with its
/// method names.
pub fn serialize_accessors(accessors: &TableAccessors) -> String {
    let mut output = format!("{}\n", accessors.table);
    let alias_width = column_width(accessors.iter().map(|a| a.alias.as_str()));
    let kinds: Vec<String> = accessors.iter().map(|a| format!("{:?}", a.kind)).collect();
    let kind_width = column_width(kinds.iter().map(String::as_str));
    for (accessor, kind) in accessors.iter().zip(&kinds) {
        let methods: Vec<&str> = accessor.methods.values().map(String::as_str).collect();
        output.push_str(&format!(
            "    {} {} {}\n",
            pad(&accessor.alias, alias_width),
            pad(kind, kind_width),
            methods.join(" ")
        ));
    }
    output
}

fn column_width<'a>(cells: impl IntoIterator<Item = &'a str>) -> usize {
    cells.into_iter().map(UnicodeWidthStr::width).max().unwrap_or(0)
}

/// Left-align `text` to `width` display columns.
fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(UnicodeWidthStr::width(text));
    format!("{text}{}", " ".repeat(fill))
}
