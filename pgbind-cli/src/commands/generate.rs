use std::{collections::HashSet, error::Error, path::PathBuf};

use clap::Parser;
use pgbind_core::analyze_statement;
use sqlx::postgres::PgPoolOptions;

use crate::{
    codegen::{json::JsonCodeGen, typescript::TypeScriptCodeGen, CodeGen, QueryDefinition},
    config::{self, Emitter, PgbindConfig, TomlConfig},
    utils::{to_positional, ParametrizedQuery},
};

/// Analyze every query file named by the config and write the generated
/// bindings to the target file.
#[derive(Parser, Debug, Clone)]
#[must_use]
pub struct Generate {
    /// Path to the config file; defaults to pgbind.toml.
    config: Option<PathBuf>,
}

impl Generate {
    pub fn run(self) -> Result<(), Box<dyn Error>> {
        let config_path = self
            .config
            .unwrap_or_else(|| PathBuf::from("pgbind.toml"));
        let config: TomlConfig = toml::from_str(&std::fs::read_to_string(config_path)?)?;
        let config = PgbindConfig::from(config);

        let mut codegen: Box<dyn CodeGen> = match config.mode {
            Emitter::Json => Box::new(JsonCodeGen::default()),
            Emitter::Typescript => Box::new(TypeScriptCodeGen::default()),
        };

        let rt = tokio::runtime::Runtime::new()?;
        let pool = rt.block_on(
            PgPoolOptions::new()
                .max_connections(1)
                .connect(&config::db_url()?),
        )?;

        let mut seen = HashSet::<String>::new();
        for directory in config.source {
            for entry in std::fs::read_dir(directory)? {
                let entry = entry?;
                if !entry.metadata()?.is_file() {
                    continue;
                }
                let path = entry.path();
                if path.extension().is_none_or(|ext| ext != "sql") {
                    continue;
                }
                let Some(stem) = path.file_stem() else {
                    tracing::info!("Skipping {path:?}, the filename is not valid.");
                    continue;
                };
                let name = stem.to_string_lossy().to_string();
                if seen.contains(&name) {
                    tracing::error!("{name} already exists, skipping {path:?}");
                    continue;
                }

                let query = std::fs::read_to_string(&path)?;
                let ParametrizedQuery { sql, params } = to_positional(&query)?;

                let statement = match rt.block_on(analyze_statement(&pool, &sql)) {
                    Ok(statement) => statement,
                    Err(err) => {
                        tracing::error!("Check for {name} failed\n {err}");
                        continue;
                    }
                };
                tracing::info!("Check for {name} successful!");

                // Queries written with $n placeholders have no names; invent
                // stable ones so emitters always have something to print.
                let mut param_names = params;
                for index in param_names.len()..statement.params.len() {
                    param_names.push(format!("param{}", index + 1));
                }

                codegen.push(
                    &name,
                    QueryDefinition {
                        param_names,
                        statement,
                    },
                )?;
                seen.insert(name);
            }
        }

        let code = codegen.finalize()?;
        std::fs::write(config.target, code)?;
        Ok(())
    }
}
