//! The column nullability pass: the output shape of a statement as a list of
//! [`VirtualField`]s in top-level output order.

use crate::ast::{Expression, SelectListItem, Statement};
use crate::schema::SchemaClient;

use super::expression::infer_expression_nullability;
use super::non_null::{non_null_expressions, refine_source_columns};
use super::scope::{
    get_source_columns_for_table_expr, resolve_ctes, table_source_columns, SourceColumn,
    VirtualField, VirtualTable,
};
use super::InferError;

pub fn get_output_columns(
    client: &dyn SchemaClient,
    outer_ctes: &[VirtualTable],
    statement: &Statement,
) -> Result<Vec<VirtualField>, InferError> {
    match statement {
        Statement::Select(select) => {
            let ctes = resolve_ctes(client, outer_ctes, &select.ctes)?;
            let mut sources =
                get_source_columns_for_table_expr(client, &ctes, select.from.as_ref())?;
            let non_null = match &select.where_clause {
                Some(where_clause) => non_null_expressions(where_clause),
                None => vec![],
            };
            refine_source_columns(&mut sources, &non_null);
            infer_select_list_output(client, &ctes, &sources, &non_null, &select.select_list)
        }
        Statement::Insert(insert) => {
            let ctes = resolve_ctes(client, outer_ctes, &insert.ctes)?;
            // RETURNING sees the inserted row; the target table is the sole
            // source and WHERE-style refinement does not apply.
            let sources = table_source_columns(client, &ctes, &insert.table, None)?;
            infer_select_list_output(client, &ctes, &sources, &[], &insert.returning)
        }
        Statement::Update(update) => {
            let ctes = resolve_ctes(client, outer_ctes, &update.ctes)?;
            let mut sources =
                get_source_columns_for_table_expr(client, &ctes, update.from.as_ref())?;
            sources.extend(table_source_columns(
                client,
                &ctes,
                &update.table,
                update.alias.as_deref(),
            )?);
            infer_select_list_output(client, &ctes, &sources, &[], &update.returning)
        }
        Statement::Delete(delete) => {
            let sources = table_source_columns(
                client,
                outer_ctes,
                &delete.table,
                delete.alias.as_deref(),
            )?;
            infer_select_list_output(client, outer_ctes, &sources, &[], &delete.returning)
        }
    }
}

pub fn infer_select_list_output(
    client: &dyn SchemaClient,
    ctes: &[VirtualTable],
    sources: &[SourceColumn],
    non_null: &[&Expression],
    select_list: &[SelectListItem],
) -> Result<Vec<VirtualField>, InferError> {
    let mut fields = Vec::new();
    for item in select_list {
        match item {
            SelectListItem::AllFields => {
                fields.extend(sources.iter().filter(|source| !source.hidden).map(|source| {
                    VirtualField {
                        name: source.column_name.clone(),
                        nullability: source.nullability,
                    }
                }));
            }
            SelectListItem::AllTableFields { table } => {
                fields.extend(
                    sources
                        .iter()
                        .filter(|source| !source.hidden && source.table_alias == *table)
                        .map(|source| VirtualField {
                            name: source.column_name.clone(),
                            nullability: source.nullability,
                        }),
                );
            }
            SelectListItem::Expression { expression, alias } => {
                let nullability =
                    infer_expression_nullability(client, ctes, sources, non_null, expression)?;
                fields.push(VirtualField {
                    name: output_name(expression, alias.as_deref()),
                    nullability,
                });
            }
        }
    }
    Ok(fields)
}

/// The column name the server will report for an expression, following the
/// same rules: the alias when given, the referenced column's name, the
/// function name for calls, `?column?` otherwise.
fn output_name(expression: &Expression, alias: Option<&str>) -> String {
    if let Some(alias) = alias {
        return alias.to_string();
    }
    match expression {
        Expression::ColumnRef { column } | Expression::TableColumnRef { column, .. } => {
            column.clone()
        }
        Expression::FunctionCall { name, .. } => name.clone(),
        _ => "?column?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::InferError;
    use super::get_output_columns;
    use crate::ast::{Expression, Select, SelectListItem, Statement, TableExpression};
    use crate::schema::{SchemaCache, SchemaColumn, Table};
    use crate::types::FieldNullability;

    fn schema() -> SchemaCache {
        SchemaCache::from_tables([Table {
            schema: "public".into(),
            name: "person".into(),
            columns: vec![
                SchemaColumn {
                    name: "id".into(),
                    type_oid: 23,
                    array_elem_oid: None,
                    nullable: false,
                    hidden: false,
                },
                SchemaColumn {
                    name: "age".into(),
                    type_oid: 23,
                    array_elem_oid: None,
                    nullable: true,
                    hidden: false,
                },
            ],
        }])
    }

    fn select(select_list: Vec<SelectListItem>, from: Option<TableExpression>) -> Statement {
        Statement::Select(Select {
            ctes: vec![],
            select_list,
            from,
            where_clause: None,
            limit: None,
        })
    }

    fn item(expression: Expression, alias: &str) -> SelectListItem {
        SelectListItem::Expression {
            expression,
            alias: Some(alias.to_string()),
        }
    }

    #[test]
    fn constants_without_from() {
        let statement = select(
            vec![
                SelectListItem::Expression {
                    expression: Expression::constant("1"),
                    alias: None,
                },
                SelectListItem::Expression {
                    expression: Expression::constant("NULL"),
                    alias: None,
                },
            ],
            None,
        );
        let fields = get_output_columns(&schema(), &[], &statement).unwrap();
        assert_eq!(fields[0].name, "?column?");
        assert_eq!(fields[0].nullability, FieldNullability::NOT_NULL);
        assert_eq!(fields[1].nullability, FieldNullability::NULLABLE);
    }

    #[test]
    fn all_table_fields_filters_by_alias() {
        let statement = select(
            vec![SelectListItem::AllTableFields { table: "q".into() }],
            Some(TableExpression::CrossJoin {
                left: Box::new(TableExpression::aliased("person", "p")),
                right: Box::new(TableExpression::aliased("person", "q")),
            }),
        );
        let fields = get_output_columns(&schema(), &[], &statement).unwrap();
        assert_eq!(
            fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            vec!["id", "age"],
        );
    }

    #[test]
    fn array_subquery_collects_element_nullability() {
        let subquery = |column: &str| {
            Box::new(select(
                vec![SelectListItem::Expression {
                    expression: Expression::column(column),
                    alias: None,
                }],
                Some(TableExpression::table("person")),
            ))
        };

        let statement = select(
            vec![
                item(Expression::ArraySubQuery { query: subquery("id") }, "ids"),
                item(Expression::ArraySubQuery { query: subquery("age") }, "ages"),
            ],
            None,
        );
        let fields = get_output_columns(&schema(), &[], &statement).unwrap();
        assert_eq!(
            fields[0].nullability,
            FieldNullability::Array {
                nullable: false,
                elem_nullable: false,
            }
        );
        assert_eq!(
            fields[1].nullability,
            FieldNullability::Array {
                nullable: false,
                elem_nullable: true,
            }
        );
    }

    #[test]
    fn array_subquery_requires_exactly_one_column() {
        let statement = select(
            vec![item(
                Expression::ArraySubQuery {
                    query: Box::new(select(
                        vec![SelectListItem::AllFields],
                        Some(TableExpression::table("person")),
                    )),
                },
                "pairs",
            )],
            None,
        );
        let err = get_output_columns(&schema(), &[], &statement).unwrap_err();
        assert!(matches!(err, InferError::ArraySubQueryColumns { count: 2 }));
    }

    #[test]
    fn unresolved_column_is_an_error() {
        let statement = select(
            vec![item(Expression::column("missing"), "m")],
            Some(TableExpression::table("person")),
        );
        let err = get_output_columns(&schema(), &[], &statement).unwrap_err();
        assert!(matches!(err, InferError::UnknownColumn { .. }));
    }
}
