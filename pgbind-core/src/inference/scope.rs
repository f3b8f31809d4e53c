//! Scope handling: which columns are visible where.
//!
//! CTEs resolve left to right, each one seeing the outer scope plus its
//! predecessors, and flow into subqueries as an explicit parameter. FROM
//! resolution turns a join tree into a flat list of [`SourceColumn`]s with
//! outer-join nullability already applied.

use crate::ast::{JoinType, TableExpression, TableRef, WithQuery};
use crate::schema::SchemaClient;
use crate::types::FieldNullability;

use super::columns::get_output_columns;
use super::InferError;

/// An output column of a (sub)query before it is bound back to the probed
/// statement description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualField {
    pub name: String,
    pub nullability: FieldNullability,
}

/// The result shape of a named CTE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualTable {
    pub name: String,
    pub columns: Vec<VirtualField>,
}

/// A column visible in the current FROM scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceColumn {
    pub table_alias: String,
    pub column_name: String,
    pub nullability: FieldNullability,
    /// System columns are excluded from `SELECT *` but resolvable by an
    /// explicit reference.
    pub hidden: bool,
}

/// Resolve a WITH list against the outer scope. Returns the combined scope:
/// outer CTEs first, then the local ones in declaration order, so a lookup
/// from the back sees the innermost definition first.
pub fn resolve_ctes(
    client: &dyn SchemaClient,
    outer_ctes: &[VirtualTable],
    ctes: &[WithQuery],
) -> Result<Vec<VirtualTable>, InferError> {
    let mut scope = outer_ctes.to_vec();
    for cte in ctes {
        let columns = get_output_columns(client, &scope, &cte.query)?;
        scope.push(VirtualTable {
            name: cte.name.clone(),
            columns,
        });
    }
    Ok(scope)
}

pub fn get_source_columns_for_table_expr(
    client: &dyn SchemaClient,
    ctes: &[VirtualTable],
    table_expr: Option<&TableExpression>,
) -> Result<Vec<SourceColumn>, InferError> {
    match table_expr {
        None => Ok(vec![]),
        Some(table_expr) => source_columns(client, ctes, table_expr),
    }
}

fn source_columns(
    client: &dyn SchemaClient,
    ctes: &[VirtualTable],
    table_expr: &TableExpression,
) -> Result<Vec<SourceColumn>, InferError> {
    match table_expr {
        TableExpression::Table { table, alias } => {
            table_source_columns(client, ctes, table, alias.as_deref())
        }
        TableExpression::SubQuery { query, alias } => {
            let fields = get_output_columns(client, ctes, query)?;
            Ok(fields
                .into_iter()
                .map(|field| SourceColumn {
                    table_alias: alias.clone(),
                    column_name: field.name,
                    nullability: field.nullability,
                    hidden: false,
                })
                .collect())
        }
        TableExpression::CrossJoin { left, right } => {
            let mut columns = source_columns(client, ctes, left)?;
            columns.extend(source_columns(client, ctes, right)?);
            Ok(columns)
        }
        TableExpression::QualifiedJoin {
            left,
            join_type,
            right,
            ..
        } => {
            let mut left_columns = source_columns(client, ctes, left)?;
            let mut right_columns = source_columns(client, ctes, right)?;
            if matches!(join_type, JoinType::Right | JoinType::Full) {
                force_nullable(&mut left_columns);
            }
            if matches!(join_type, JoinType::Left | JoinType::Full) {
                force_nullable(&mut right_columns);
            }
            left_columns.extend(right_columns);
            Ok(left_columns)
        }
    }
}

fn force_nullable(columns: &mut [SourceColumn]) {
    for column in columns {
        column.nullability = column.nullability.to_nullable();
    }
}

/// Columns of a single named source. An unqualified name first tries the
/// CTEs in scope (innermost wins), then the schema client.
pub fn table_source_columns(
    client: &dyn SchemaClient,
    ctes: &[VirtualTable],
    table: &TableRef,
    alias: Option<&str>,
) -> Result<Vec<SourceColumn>, InferError> {
    let alias = alias.unwrap_or(&table.name);
    if table.schema.is_none() {
        if let Some(virtual_table) = ctes.iter().rev().find(|cte| cte.name == table.name) {
            return Ok(virtual_table
                .columns
                .iter()
                .map(|field| SourceColumn {
                    table_alias: alias.to_string(),
                    column_name: field.name.clone(),
                    nullability: field.nullability,
                    hidden: false,
                })
                .collect());
        }
    }
    let table = client.get_table(table.schema.as_deref(), &table.name)?;
    Ok(table
        .columns
        .iter()
        .map(|column| SourceColumn {
            table_alias: alias.to_string(),
            column_name: column.name.clone(),
            nullability: column.nullability(),
            hidden: column.hidden,
        })
        .collect())
}
