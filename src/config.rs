//! Compile options.

use serde::{Deserialize, Serialize};

/// What to do when a resolved table name is registered twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Redefinition {
    /// Fail with `AmbiguousReregistration`.
    #[default]
    Reject,
    /// Last definition wins, with a warning.
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Force `timestamps: false` into every table's option bag.
    pub disable_timestamps: bool,
    /// Fail on unknown type names instead of dropping the field.
    pub strict_types: bool,
    pub redefinition: Redefinition,
}

pub use loader::ConfigError;

mod loader {
    use std::path::Path;

    use thiserror::Error;

    use super::CompileOptions;

    #[derive(Error, Debug)]
    pub enum ConfigError {
        #[error("Failed to load configuration: {0}")]
        LoadError(#[from] config::ConfigError),
    }

    impl CompileOptions {
        /// Load options from an optional TOML file, then `SCHEMARK_*`
        /// environment variables.
        pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
            Self::load_with_env(path, None)
        }

        /// [`CompileOptions::load`] reading variables from `env` instead of
        /// the process environment when given.
        pub(crate) fn load_with_env(
            path: Option<&Path>,
            env: Option<config::Map<String, String>>,
        ) -> Result<Self, ConfigError> {
            let mut builder = config::Config::builder();
            if let Some(path) = path {
                builder = builder.add_source(config::File::from(path));
            }
            let settings = builder
                .add_source(
                    config::Environment::with_prefix("SCHEMARK")
                        .try_parsing(true)
                        .source(env),
                )
                .build()?;

            Ok(settings.try_deserialize::<CompileOptions>()?)
        }
    }
}
