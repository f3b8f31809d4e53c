//! The three inference passes and their orchestration.
//!
//! [`infer`] enriches a probed [`StatementDescription`]: column nullability,
//! parameter nullability, row count. Every pass failure except one is
//! recoverable: the statement keeps its pessimistic probed values and the
//! problem is logged. The exception is a shape mismatch between the inferred
//! and the probed output columns, which means the analysis itself went wrong
//! and must not be papered over.

pub mod columns;
pub mod expression;
pub mod non_null;
pub mod null_safety;
pub mod params;
pub mod rowcount;
pub mod scope;

use std::error::Error;
use std::fmt;

use tracing::warn;

use crate::parser::parse_sql;
use crate::schema::{SchemaClient, SchemaError};
use crate::types::{ArrayElemType, FieldNullability, StatementDescription};

use self::scope::VirtualField;

#[derive(Debug, Clone)]
pub enum InferError {
    Schema(SchemaError),
    UnknownColumn { name: String },
    ArraySubQueryColumns { count: usize },
}

impl fmt::Display for InferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferError::Schema(err) => write!(f, "{err}"),
            InferError::UnknownColumn { name } => write!(f, "Unknown column {name}"),
            InferError::ArraySubQueryColumns { count } => {
                write!(f, "ARRAY subquery returns {count} columns, expected exactly one")
            }
        }
    }
}

impl Error for InferError {}

impl From<SchemaError> for InferError {
    fn from(err: SchemaError) -> Self {
        InferError::Schema(err)
    }
}

/// The inferred output columns do not line up with what the server reported
/// for the same statement. This is a bug in the analysis, not in the input.
#[derive(Debug, Clone)]
pub struct ColumnMismatch {
    pub probed: Vec<String>,
    pub inferred: Vec<String>,
}

impl fmt::Display for ColumnMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Inferred output columns [{}] do not match the prepared statement [{}]",
            self.inferred.join(", "),
            self.probed.join(", "),
        )
    }
}

impl Error for ColumnMismatch {}

/// Enrich a probed statement description by analyzing its SQL.
///
/// Recoverable problems (parse failure, missing table, analyzer gap) degrade
/// to the probed values with a warning: a pessimistic binding is still a
/// usable binding. Only [`ColumnMismatch`] surfaces as an error.
pub fn infer(
    client: &dyn SchemaClient,
    mut statement: StatementDescription,
) -> Result<StatementDescription, ColumnMismatch> {
    let ast = match parse_sql(&statement.sql) {
        Ok(ast) => ast,
        Err(err) => {
            warn!("Failed to parse statement, keeping the driver description: {err}");
            return Ok(statement);
        }
    };

    match columns::get_output_columns(client, &[], &ast) {
        Ok(fields) => apply_output_columns(&mut statement, &fields)?,
        Err(err) => warn!("Column nullability inference failed: {err}"),
    }

    match params::infer_param_nullability(client, &ast) {
        Ok(nullable) => {
            for (i, param) in statement.params.iter_mut().enumerate() {
                if let Some(nullable) = nullable.get(i + 1) {
                    param.nullable = nullable;
                }
            }
        }
        Err(err) => warn!("Parameter nullability inference failed: {err}"),
    }

    statement.row_count = rowcount::infer_row_count(&ast);

    Ok(statement)
}

fn apply_output_columns(
    statement: &mut StatementDescription,
    fields: &[VirtualField],
) -> Result<(), ColumnMismatch> {
    let aligned = fields.len() == statement.columns.len()
        && fields.iter().zip(&statement.columns).all(|(field, column)| {
            // `?column?` means the analyzer could not name the expression;
            // the server invents its own name in those cases too.
            field.name == column.name || field.name == "?column?"
        });
    if !aligned {
        return Err(ColumnMismatch {
            probed: statement.columns.iter().map(|c| c.name.clone()).collect(),
            inferred: fields.iter().map(|f| f.name.clone()).collect(),
        });
    }

    for (column, field) in statement.columns.iter_mut().zip(fields) {
        match field.nullability {
            FieldNullability::Scalar { nullable } => column.nullable = nullable,
            FieldNullability::Array {
                nullable,
                elem_nullable,
            } => {
                column.nullable = nullable;
                match &mut column.sql_type.array_elem {
                    Some(elem) => elem.nullable = elem_nullable,
                    // The probe did not see an array type; keep the scalar
                    // oid and record the element verdict anyway.
                    None => {
                        column.sql_type.array_elem = Some(ArrayElemType {
                            oid: 0,
                            nullable: elem_nullable,
                        })
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::infer;
    use crate::schema::{SchemaCache, SchemaColumn, Table};
    use crate::types::{Column, Param, PgType, RowCount, StatementDescription};

    fn column(name: &str, type_oid: u32, nullable: bool) -> SchemaColumn {
        SchemaColumn {
            name: name.into(),
            type_oid,
            array_elem_oid: None,
            nullable,
            hidden: false,
        }
    }

    /// `person(id serial primary key, name varchar not null, age int)`
    fn person_schema() -> SchemaCache {
        SchemaCache::from_tables([Table {
            schema: "public".into(),
            name: "person".into(),
            columns: vec![
                SchemaColumn {
                    name: "ctid".into(),
                    type_oid: 27,
                    array_elem_oid: None,
                    nullable: false,
                    hidden: true,
                },
                column("id", 23, false),
                column("name", 1043, false),
                column("age", 23, true),
            ],
        }])
    }

    fn probed(sql: &str, columns: &[(&str, u32)], param_count: usize) -> StatementDescription {
        StatementDescription {
            sql: sql.into(),
            columns: columns
                .iter()
                .map(|(name, oid)| Column {
                    name: name.to_string(),
                    sql_type: PgType::scalar(*oid, "probed"),
                    nullable: true,
                })
                .collect(),
            params: (0..param_count)
                .map(|_| Param {
                    sql_type: PgType::scalar(0, "probed"),
                    nullable: true,
                })
                .collect(),
            row_count: RowCount::Many,
        }
    }

    fn nullables(statement: &StatementDescription) -> Vec<bool> {
        statement.columns.iter().map(|c| c.nullable).collect()
    }

    #[test]
    fn select_star_follows_schema_nullability() {
        let schema = person_schema();
        let raw = probed(
            "SELECT * FROM person",
            &[("id", 23), ("name", 1043), ("age", 23)],
            0,
        );
        let inferred = infer(&schema, raw).unwrap();
        assert_eq!(nullables(&inferred), vec![false, false, true]);
        assert_eq!(inferred.row_count, RowCount::Many);
        assert!(inferred.params.is_empty());
    }

    #[test]
    fn where_is_not_null_eliminates_nullability() {
        let schema = person_schema();
        let raw = probed(
            "SELECT * FROM person WHERE age IS NOT NULL",
            &[("id", 23), ("name", 1043), ("age", 23)],
            0,
        );
        let inferred = infer(&schema, raw).unwrap();
        assert_eq!(nullables(&inferred), vec![false, false, false]);
        assert_eq!(inferred.row_count, RowCount::Many);
    }

    #[test]
    fn limit_one_bounds_the_row_count() {
        let schema = person_schema();
        let raw = probed(
            "SELECT * FROM person LIMIT 1",
            &[("id", 23), ("name", 1043), ("age", 23)],
            0,
        );
        let inferred = infer(&schema, raw).unwrap();
        assert_eq!(inferred.row_count, RowCount::ZeroOrOne);
        assert_eq!(nullables(&inferred), vec![false, false, true]);
    }

    #[test]
    fn left_join_makes_the_right_side_nullable() {
        let schema = person_schema();
        let raw = probed(
            "SELECT p.name, q.name AS qname, q.age \
             FROM person p LEFT JOIN person q ON p.id = q.id",
            &[("name", 1043), ("qname", 1043), ("age", 23)],
            0,
        );
        let inferred = infer(&schema, raw).unwrap();
        assert_eq!(nullables(&inferred), vec![false, true, true]);
    }

    #[test]
    fn insert_binds_params_to_target_columns() {
        let schema = person_schema();
        let raw = probed(
            "INSERT INTO person(name, age) VALUES ($1, $2) RETURNING id",
            &[("id", 23)],
            2,
        );
        let inferred = infer(&schema, raw).unwrap();
        assert_eq!(nullables(&inferred), vec![false]);
        assert_eq!(inferred.row_count, RowCount::One);
        assert_eq!(
            inferred.params.iter().map(|p| p.nullable).collect::<Vec<_>>(),
            vec![false, true],
        );
    }

    #[test]
    fn update_refines_only_set_parameters() {
        let schema = person_schema();
        let raw = probed("UPDATE person SET name = $1 WHERE id = $2", &[], 2);
        let inferred = infer(&schema, raw).unwrap();
        assert_eq!(inferred.row_count, RowCount::Zero);
        // $1 is bound to a NOT NULL column; $2 is a WHERE use and keeps the
        // probed verdict.
        assert_eq!(
            inferred.params.iter().map(|p| p.nullable).collect::<Vec<_>>(),
            vec![false, true],
        );
    }

    #[test]
    fn parameter_used_at_nullable_site_stays_nullable() {
        let schema = person_schema();
        let raw = probed(
            "INSERT INTO person(name, age) VALUES ($1, $1)",
            &[],
            1,
        );
        let inferred = infer(&schema, raw).unwrap();
        assert_eq!(inferred.params[0].nullable, true);
    }

    #[test]
    fn parse_failure_keeps_the_probed_description() {
        let schema = person_schema();
        let raw = probed("SELECT FROM WHERE", &[("x", 0)], 0);
        let inferred = infer(&schema, raw.clone()).unwrap();
        assert_eq!(inferred, raw);
    }

    #[test]
    fn unknown_table_degrades_to_probed_nullability() {
        let schema = person_schema();
        let raw = probed("SELECT * FROM nowhere LIMIT 1", &[("id", 23)], 0);
        let inferred = infer(&schema, raw).unwrap();
        assert_eq!(nullables(&inferred), vec![true]);
        // Row count needs no schema and still applies.
        assert_eq!(inferred.row_count, RowCount::ZeroOrOne);
    }

    #[test]
    fn misaligned_columns_are_a_fatal_error() {
        let schema = person_schema();
        let raw = probed("SELECT name FROM person", &[("name", 1043), ("age", 23)], 0);
        assert!(infer(&schema, raw).is_err());

        let raw = probed("SELECT name FROM person", &[("renamed", 1043)], 0);
        assert!(infer(&schema, raw).is_err());
    }

    #[test]
    fn hidden_columns_resolve_only_by_explicit_reference() {
        let schema = person_schema();
        // ctid is not part of `*` ...
        let raw = probed(
            "SELECT * FROM person",
            &[("id", 23), ("name", 1043), ("age", 23)],
            0,
        );
        assert!(infer(&schema, raw).is_ok());
        // ... but an explicit reference resolves it.
        let raw = probed("SELECT ctid FROM person", &[("ctid", 27)], 0);
        let inferred = infer(&schema, raw).unwrap();
        assert_eq!(nullables(&inferred), vec![false]);
    }

    #[test]
    fn inference_is_idempotent() {
        let schema = person_schema();
        let raw = probed(
            "SELECT p.name, q.age FROM person p LEFT JOIN person q ON p.id = q.id \
             WHERE p.age IS NOT NULL",
            &[("name", 1043), ("age", 23)],
            0,
        );
        let once = infer(&schema, raw).unwrap();
        let twice = infer(&schema, once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn cte_chain_sees_earlier_ctes() {
        let schema = person_schema();
        let raw = probed(
            "WITH adults AS (SELECT * FROM person WHERE age IS NOT NULL), \
                  named AS (SELECT name, age FROM adults) \
             SELECT * FROM named",
            &[("name", 1043), ("age", 23)],
            0,
        );
        let inferred = infer(&schema, raw).unwrap();
        assert_eq!(nullables(&inferred), vec![false, false]);
    }

    #[test]
    fn subquery_alias_renames_fields() {
        let schema = person_schema();
        let raw = probed(
            "SELECT sub.age FROM (SELECT age FROM person) sub",
            &[("age", 23)],
            0,
        );
        let inferred = infer(&schema, raw).unwrap();
        assert_eq!(nullables(&inferred), vec![true]);
    }

    #[test]
    fn where_refinement_reaches_expression_results() {
        let schema = person_schema();
        // `age + 1` is not a plain column reference; structural equality on
        // the WHERE-proven operand list is what refines it.
        let raw = probed(
            "SELECT age + 1 AS next FROM person WHERE age + 1 = $1",
            &[("next", 23)],
            1,
        );
        let inferred = infer(&schema, raw).unwrap();
        assert_eq!(nullables(&inferred), vec![false]);
    }
}
