use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Invalid schema document: {0}")]
    InvalidDocument(String),
    #[error("Schema is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Can't find table for association {from} -> {to} (known tables: {})", .known.join(", "))]
    UnresolvedAssociationTarget {
        from: String,
        to: String,
        known: Vec<String>,
        alias: Option<String>,
        foreign_key: Option<String>,
    },
    #[error("Unknown type `{token}` for field {table}.{field}")]
    UnknownType {
        table: String,
        field: String,
        token: String,
    },
    #[error("Table {table} is defined more than once")]
    AmbiguousReregistration { table: String },
    #[error("{table}.{name} is declared both as a field and as an association")]
    FieldRelationConflict { table: String, name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
}

/// A non-fatal anomaly found while compiling. Also emitted through `tracing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::warn!("{message}");
        Self {
            level: Level::Warning,
            message,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::info!("{message}");
        Self {
            level: Level::Info,
            message,
        }
    }
}
