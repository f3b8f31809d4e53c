pub mod json;
pub mod typescript;

use std::error::Error;

use pgbind_core::types::StatementDescription;
use serde::{Deserialize, Serialize};

/// One analyzed query, ready for emission. `param_names` lines up with
/// `statement.params`; names come from `:name` placeholders or are
/// synthesized for positional ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDefinition {
    pub param_names: Vec<String>,
    pub statement: StatementDescription,
}

pub trait CodeGen {
    fn push(&mut self, name: &str, query: QueryDefinition) -> Result<(), Box<dyn Error>>;

    fn finalize(&self) -> Result<String, Box<dyn Error>>;
}
