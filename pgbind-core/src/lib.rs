//! Schema-aware analysis of SQL statements against a live PostgreSQL
//! database: output column nullability, input parameter nullability and a
//! conservative row count estimate.
//!
//! The pipeline is probe → schema load → inference. The probe asks the
//! server to prepare the statement and records names and type oids with
//! everything assumed nullable. Inference parses the statement, walks it
//! with the prefetched schema and overwrites the pessimistic verdicts where
//! the analysis can do better. Inference failures other than an internal
//! shape mismatch degrade to the probed description.

use std::error::Error;

use sqlx::{Pool, Postgres};

pub mod ast;
pub mod describe;
pub mod inference;
pub mod parser;
pub mod schema;
pub mod types;

pub use describe::describe_statement;
pub use inference::infer;
pub use schema::SchemaCache;
pub use types::{RowCount, StatementDescription};

/// Probe and analyze a single SQL statement over the given connection pool.
pub async fn analyze_statement(
    pool: &Pool<Postgres>,
    sql: &str,
) -> Result<StatementDescription, Box<dyn Error>> {
    let raw = describe_statement(pool, sql).await?;
    let schema = match parser::parse_sql(sql) {
        Ok(ast) => SchemaCache::load(pool, &ast).await?,
        // infer() reports the parse failure; an empty cache is enough to let
        // it degrade gracefully.
        Err(_) => SchemaCache::default(),
    };
    Ok(inference::infer(&schema, raw)?)
}
