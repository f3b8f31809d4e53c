use std::error::Error;

use clap::Parser;
use pgbind_core::analyze_statement;
use pgbind_core::types::StatementDescription;
use sqlx::postgres::PgPoolOptions;

use crate::config;

/// Probe and analyze ad-hoc statements and print the enriched descriptions.
/// Each argument is SQL text or a path to a file containing it.
#[derive(Parser, Debug, Clone)]
#[must_use]
pub struct Analyze {
    query: Vec<String>,
}

impl Analyze {
    fn get_query(query: String) -> Result<String, Box<dyn Error>> {
        Ok(match std::fs::exists(&query)? {
            true => std::fs::read_to_string(query)?,
            false => query,
        })
    }

    pub fn run(self) -> Result<(), Box<dyn Error>> {
        let rt = tokio::runtime::Runtime::new()?;
        let pool = rt.block_on(
            PgPoolOptions::new()
                .max_connections(1)
                .connect(&config::db_url()?),
        )?;

        for query in self.query {
            let query = Self::get_query(query)?;
            let statement = rt.block_on(analyze_statement(&pool, &query))?;
            print_statement(&statement);
        }
        Ok(())
    }
}

fn print_statement(statement: &StatementDescription) {
    println!("{}", statement.sql.trim());
    println!("  row count: {}", statement.row_count);
    for (index, param) in statement.params.iter().enumerate() {
        println!(
            "  ${}: {}{}",
            index + 1,
            param.sql_type,
            nullable_suffix(param.nullable),
        );
    }
    for column in &statement.columns {
        println!(
            "  {}: {}{}",
            column.name,
            column.sql_type,
            nullable_suffix(column.nullable),
        );
    }
    println!();
}

fn nullable_suffix(nullable: bool) -> &'static str {
    match nullable {
        true => "?",
        false => "",
    }
}
