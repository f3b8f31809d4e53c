//! The driver probe: prepare a statement and turn the server's metadata into
//! a pessimistic [`StatementDescription`] for inference to refine.

use std::collections::HashMap;
use std::error::Error;

use sqlx::postgres::types::Oid;
use sqlx::{Column as _, Either, Executor, Pool, Postgres, Row, Statement as _, TypeInfo};
use tracing::warn;

use crate::types::{Column, Param, PgType, RowCount, StatementDescription};

pub async fn describe_statement(
    pool: &Pool<Postgres>,
    sql: &str,
) -> Result<StatementDescription, Box<dyn Error>> {
    let prepared = pool.prepare(sql).await?;

    let column_types: Vec<(String, String)> = prepared
        .columns()
        .iter()
        .map(|column| {
            (
                column.name().to_string(),
                column.type_info().name().to_string(),
            )
        })
        .collect();
    let param_types: Vec<String> = match prepared.parameters() {
        Some(Either::Left(types)) => types.iter().map(|info| info.name().to_string()).collect(),
        // The postgres driver always reports parameter type infos.
        _ => unreachable!(),
    };

    let mut names: Vec<&str> = column_types
        .iter()
        .map(|(_, type_name)| type_name.as_str())
        .chain(param_types.iter().map(String::as_str))
        .collect();
    names.sort_unstable();
    names.dedup();
    let oids = resolve_type_oids(pool, &names).await?;

    Ok(StatementDescription {
        sql: sql.to_string(),
        columns: column_types
            .into_iter()
            .map(|(name, type_name)| Column {
                sql_type: lookup_type(&oids, &type_name),
                name,
                // Everything is nullable until inference proves otherwise.
                nullable: true,
            })
            .collect(),
        params: param_types
            .into_iter()
            .map(|type_name| Param {
                sql_type: lookup_type(&oids, &type_name),
                nullable: true,
            })
            .collect(),
        row_count: RowCount::Many,
    })
}

struct ResolvedType {
    oid: u32,
    elem_oid: Option<u32>,
}

/// The driver reports display names ("INT4", "TEXT[]"); `pg_type` stores
/// lowercase names with arrays spelled `_elem`.
fn catalog_type_name(driver_name: &str) -> String {
    match driver_name.strip_suffix("[]") {
        Some(base) => format!("_{}", base.to_lowercase()),
        None => driver_name.to_lowercase(),
    }
}

fn lookup_type(oids: &HashMap<String, ResolvedType>, driver_name: &str) -> PgType {
    match oids.get(&catalog_type_name(driver_name)) {
        Some(ResolvedType {
            oid,
            elem_oid: Some(elem_oid),
        }) => PgType::array(*oid, driver_name, *elem_oid),
        Some(ResolvedType { oid, elem_oid: None }) => PgType::scalar(*oid, driver_name),
        None => {
            warn!("Type {driver_name} not found in pg_type, using oid 0");
            PgType::scalar(0, driver_name)
        }
    }
}

async fn resolve_type_oids(
    pool: &Pool<Postgres>,
    driver_names: &[&str],
) -> Result<HashMap<String, ResolvedType>, sqlx::Error> {
    let catalog_names: Vec<String> = driver_names
        .iter()
        .map(|name| catalog_type_name(name))
        .collect();
    let rows = sqlx::query(
        "select t.typname::text as name, t.oid as oid, t.typelem as typelem,
                t.typcategory = 'A' as is_array
         from pg_catalog.pg_type t
         where t.typname = any($1)",
    )
    .bind(&catalog_names)
    .fetch_all(pool)
    .await?;

    let mut resolved = HashMap::with_capacity(rows.len());
    for row in rows {
        let name: String = row.try_get("name")?;
        let oid: Oid = row.try_get("oid")?;
        let typelem: Oid = row.try_get("typelem")?;
        let is_array: bool = row.try_get("is_array")?;
        resolved.entry(name).or_insert(ResolvedType {
            oid: oid.0,
            elem_oid: match is_array && typelem.0 != 0 {
                true => Some(typelem.0),
                false => None,
            },
        });
    }
    Ok(resolved)
}
