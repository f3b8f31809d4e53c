//! The schema oracle: table and column metadata for the statements under
//! analysis. Inference only ever asks one question ([`SchemaClient::get_table`])
//! and never performs I/O itself; [`SchemaCache::load`] prefetches every table
//! the statement references before the passes run.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use sqlx::postgres::types::Oid;
use sqlx::{Pool, Postgres, Row};
use tracing::warn;

use crate::ast::visit::collect_table_refs;
use crate::ast::{Statement, TableRef};
use crate::types::FieldNullability;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub schema: String,
    pub name: String,
    pub columns: Vec<SchemaColumn>,
}

impl Table {
    /// Column lookup by name, hidden columns included.
    pub fn column(&self, name: &str) -> Option<&SchemaColumn> {
        self.columns.iter().find(|column| column.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaColumn {
    pub name: String,
    pub type_oid: u32,
    /// Element type oid when the column is an array.
    pub array_elem_oid: Option<u32>,
    pub nullable: bool,
    /// System columns (`ctid`, `xmin`, …) are resolvable by explicit
    /// reference but excluded from `SELECT *`.
    pub hidden: bool,
}

impl SchemaColumn {
    pub fn nullability(&self) -> FieldNullability {
        match self.array_elem_oid {
            // Element nullability cannot be constrained at the schema level.
            Some(_) => FieldNullability::Array {
                nullable: self.nullable,
                elem_nullable: true,
            },
            None => FieldNullability::Scalar {
                nullable: self.nullable,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum SchemaError {
    TableNotFound {
        schema: Option<String>,
        name: String,
    },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::TableNotFound {
                schema: Some(schema),
                name,
            } => write!(f, "Table {schema}.{name} not found"),
            SchemaError::TableNotFound { schema: None, name } => {
                write!(f, "Table {name} not found in search path")
            }
        }
    }
}

impl Error for SchemaError {}

/// The narrow interface the inference passes consume. `schema = None` means
/// the name resolves through the server's search path.
pub trait SchemaClient {
    fn get_table(&self, schema: Option<&str>, name: &str) -> Result<Table, SchemaError>;
}

type TableKey = (Option<String>, String);

/// An immutable `(schema, name) → Table` map. The sole [`SchemaClient`]
/// implementation: prefetched from the database for real statements, built
/// by hand in tests.
#[derive(Debug, Default)]
pub struct SchemaCache {
    tables: HashMap<TableKey, Table>,
}

impl SchemaCache {
    /// Build a cache from already-known tables. Each table is reachable both
    /// by its bare name and by its qualified name.
    pub fn from_tables(tables: impl IntoIterator<Item = Table>) -> Self {
        let mut cache = Self::default();
        for table in tables {
            cache.tables.insert(
                (Some(table.schema.clone()), table.name.clone()),
                table.clone(),
            );
            cache.tables.insert((None, table.name.clone()), table);
        }
        cache
    }

    /// Fetch every table the statement references. Unresolvable references
    /// are skipped; the corresponding `get_table` miss during inference is a
    /// recoverable error there.
    pub async fn load(pool: &Pool<Postgres>, statement: &Statement) -> Result<Self, sqlx::Error> {
        let mut cache = Self::default();
        for table_ref in collect_table_refs(statement) {
            let key = (table_ref.schema.clone(), table_ref.name.clone());
            if cache.tables.contains_key(&key) {
                continue;
            }
            match fetch_table(pool, table_ref).await? {
                Some(table) => {
                    cache.tables.insert(key, table);
                }
                // Either a CTE name or genuinely missing; decided later.
                None => warn!(
                    "Table {} not found while loading the schema",
                    table_ref.name
                ),
            }
        }
        Ok(cache)
    }
}

impl SchemaClient for SchemaCache {
    fn get_table(&self, schema: Option<&str>, name: &str) -> Result<Table, SchemaError> {
        let key = (schema.map(str::to_string), name.to_string());
        self.tables
            .get(&key)
            .cloned()
            .ok_or_else(|| SchemaError::TableNotFound {
                schema: schema.map(str::to_string),
                name: name.to_string(),
            })
    }
}

async fn fetch_table(
    pool: &Pool<Postgres>,
    table_ref: &TableRef,
) -> Result<Option<Table>, sqlx::Error> {
    let relation = sqlx::query(
        "select c.oid as oid, n.nspname::text as schema
         from pg_catalog.pg_class c
         join pg_catalog.pg_namespace n on n.oid = c.relnamespace
         where c.relname = $1
           and c.relkind in ('r', 'p', 'v', 'm', 'f')
           and case
             when $2::text is null then pg_catalog.pg_table_is_visible(c.oid)
             else n.nspname = $2::text
           end",
    )
    .bind(&table_ref.name)
    .bind(table_ref.schema.as_deref())
    .fetch_optional(pool)
    .await?;

    let Some(relation) = relation else {
        return Ok(None);
    };
    let relation_oid: Oid = relation.try_get("oid")?;
    let schema: String = relation.try_get("schema")?;

    let rows = sqlx::query(
        "select
             a.attname::text as name,
             a.atttypid::int8 as type_oid,
             case when t.typcategory = 'A' then t.typelem::int8 end as elem_oid,
             not a.attnotnull as nullable,
             a.attnum < 1 as hidden
         from pg_catalog.pg_attribute a
         join pg_catalog.pg_type t on t.oid = a.atttypid
         where a.attrelid = $1 and not a.attisdropped and a.attnum <> 0
         order by a.attnum",
    )
    .bind(relation_oid)
    .fetch_all(pool)
    .await?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let type_oid: i64 = row.try_get("type_oid")?;
        let elem_oid: Option<i64> = row.try_get("elem_oid")?;
        columns.push(SchemaColumn {
            name: row.try_get("name")?,
            type_oid: type_oid as u32,
            array_elem_oid: elem_oid.map(|oid| oid as u32),
            nullable: row.try_get("nullable")?,
            hidden: row.try_get("hidden")?,
        });
    }

    Ok(Some(Table {
        schema,
        name: table_ref.name.clone(),
        columns,
    }))
}

#[cfg(test)]
mod tests {
    use super::{SchemaCache, SchemaClient, SchemaColumn, Table};

    fn person() -> Table {
        Table {
            schema: "public".into(),
            name: "person".into(),
            columns: vec![SchemaColumn {
                name: "id".into(),
                type_oid: 23,
                array_elem_oid: None,
                nullable: false,
                hidden: false,
            }],
        }
    }

    #[test]
    fn cache_resolves_bare_and_qualified_names() {
        let cache = SchemaCache::from_tables([person()]);
        assert!(cache.get_table(None, "person").is_ok());
        assert!(cache.get_table(Some("public"), "person").is_ok());
        assert!(cache.get_table(Some("other"), "person").is_err());
        assert!(cache.get_table(None, "missing").is_err());
    }
}
