//! Nullability of a scalar expression, given the columns in scope and the
//! WHERE-derived non-null facts.

use crate::ast::Expression;
use crate::schema::SchemaClient;
use crate::types::FieldNullability;

use super::columns::get_output_columns;
use super::null_safety::{function_null_safety, operator_null_safety, NullSafety};
use super::scope::{SourceColumn, VirtualTable};
use super::InferError;

pub fn infer_expression_nullability(
    client: &dyn SchemaClient,
    ctes: &[VirtualTable],
    sources: &[SourceColumn],
    non_null: &[&Expression],
    expression: &Expression,
) -> Result<FieldNullability, InferError> {
    // A structurally equal expression proven non-null by the WHERE clause
    // settles the question regardless of what the expression contains.
    if non_null.iter().any(|proven| *proven == expression) {
        return Ok(FieldNullability::NOT_NULL);
    }

    match expression {
        Expression::ColumnRef { column } => {
            Ok(resolve_column(sources, None, column)?.nullability)
        }
        Expression::TableColumnRef { table, column } => {
            Ok(resolve_column(sources, Some(table), column)?.nullability)
        }
        Expression::Constant { text } => Ok(FieldNullability::scalar(
            text.eq_ignore_ascii_case("null"),
        )),
        // Parameters are conservatively nullable here; the parameter pass
        // refines the binding, not the expression result.
        Expression::Parameter { .. } => Ok(FieldNullability::NULLABLE),
        Expression::UnaryOp { op, operand } => match operator_null_safety(op) {
            NullSafety::Safe => {
                infer_expression_nullability(client, ctes, sources, non_null, operand)
            }
            NullSafety::Unsafe | NullSafety::AlwaysNull => Ok(FieldNullability::NULLABLE),
            NullSafety::NeverNull => Ok(FieldNullability::NOT_NULL),
        },
        Expression::BinaryOp { op, lhs, rhs } => match operator_null_safety(op) {
            NullSafety::Safe => {
                let lhs = infer_expression_nullability(client, ctes, sources, non_null, lhs)?;
                let rhs = infer_expression_nullability(client, ctes, sources, non_null, rhs)?;
                Ok(FieldNullability::scalar(lhs.nullable() || rhs.nullable()))
            }
            NullSafety::Unsafe | NullSafety::AlwaysNull => Ok(FieldNullability::NULLABLE),
            NullSafety::NeverNull => Ok(FieldNullability::NOT_NULL),
        },
        Expression::FunctionCall { name, args } => match function_null_safety(name) {
            NullSafety::Safe => {
                let mut nullable = false;
                for arg in args {
                    nullable |=
                        infer_expression_nullability(client, ctes, sources, non_null, arg)?
                            .nullable();
                }
                Ok(FieldNullability::scalar(nullable))
            }
            NullSafety::Unsafe | NullSafety::AlwaysNull => Ok(FieldNullability::NULLABLE),
            NullSafety::NeverNull => Ok(FieldNullability::NOT_NULL),
        },
        // EXISTS yields TRUE or FALSE, never NULL.
        Expression::Exists { .. } => Ok(FieldNullability::NOT_NULL),
        // An empty subquery makes IN yield FALSE, not NULL, so only the
        // left-hand side matters.
        Expression::InSubQuery { lhs, .. } => {
            let lhs = infer_expression_nullability(client, ctes, sources, non_null, lhs)?;
            Ok(FieldNullability::scalar(lhs.nullable()))
        }
        Expression::ArraySubQuery { query } => {
            let columns = get_output_columns(client, ctes, query)?;
            match columns.as_slice() {
                [column] => Ok(FieldNullability::Array {
                    nullable: false,
                    elem_nullable: column.nullability.nullable(),
                }),
                _ => Err(InferError::ArraySubQueryColumns {
                    count: columns.len(),
                }),
            }
        }
        Expression::TypeCast { lhs, .. } => {
            infer_expression_nullability(client, ctes, sources, non_null, lhs)
        }
    }
}

fn resolve_column<'a>(
    sources: &'a [SourceColumn],
    table: Option<&str>,
    column: &str,
) -> Result<&'a SourceColumn, InferError> {
    sources
        .iter()
        .find(|source| {
            source.column_name == column && table.is_none_or(|table| source.table_alias == table)
        })
        .ok_or_else(|| InferError::UnknownColumn {
            name: match table {
                Some(table) => format!("{table}.{column}"),
                None => column.to_string(),
            },
        })
}
