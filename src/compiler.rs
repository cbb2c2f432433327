//! Compilation driver: walk, link, then hand the result to an engine.

use serde_json::Value;
use tracing::info;

use crate::ast::CompiledSchema;
use crate::config::CompileOptions;
use crate::engine::{EmitError, Engine, Handles};
use crate::error::CompileError;
use crate::linker;
use crate::registry::AssociationRegistry;
use crate::types::TypeResolver;
use crate::walker::Walker;

#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
    resolver: TypeResolver,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            resolver: TypeResolver::default(),
        }
    }

    /// Use `resolver` for type names, e.g. one with extra logical types.
    pub fn with_resolver(mut self, resolver: TypeResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn compile_str(&self, source: &str) -> Result<CompiledSchema, CompileError> {
        let document: Value = serde_json::from_str(source)?;
        self.compile(&document)
    }

    pub fn compile(&self, document: &Value) -> Result<CompiledSchema, CompileError> {
        let walked = Walker::new(&self.options, &self.resolver).walk(document)?;

        let mut associations = AssociationRegistry::new();
        let mut diagnostics = walked.diagnostics;
        diagnostics.extend(linker::link(&walked.relations, &walked.tables, &mut associations)?);

        info!(
            tables = walked.tables.len(),
            associations = associations.edges().len(),
            through_tables = associations.through_tables().len(),
            diagnostics = diagnostics.len(),
            "schema compiled"
        );

        Ok(CompiledSchema {
            tables: walked.tables.into_tables(),
            associations,
            diagnostics,
        })
    }
}

/// Compile with default options.
pub fn compile(document: &Value) -> Result<CompiledSchema, CompileError> {
    Compiler::default().compile(document)
}

/// Define every table (through tables last) on `engine`, then declare every
/// association edge.
pub fn emit<E: Engine>(schema: &CompiledSchema, engine: &mut E) -> Result<Handles<E::Handle>, EmitError<E::Error>> {
    let mut handles = Handles::new();

    let through_tables: Vec<_> = schema.through_tables().iter().map(|t| t.definition()).collect();
    for table in schema.tables.iter().chain(&through_tables) {
        let handle = engine
            .define_table(table)
            .map_err(|source| EmitError::DefineTable {
                table: table.name.clone(),
                source,
            })?;
        handles.insert(table.name.clone(), handle);
    }

    for edge in schema.edges() {
        let from = handles
            .get(&edge.from)
            .ok_or_else(|| EmitError::MissingHandle(edge.from.clone()))?;
        let to = handles
            .get(&edge.to)
            .ok_or_else(|| EmitError::MissingHandle(edge.to.clone()))?;
        engine
            .declare_association(from, to, edge)
            .map_err(|source| EmitError::DeclareAssociation {
                from: edge.from.clone(),
                to: edge.to.clone(),
                source,
            })?;
    }

    Ok(handles)
}
