//! WHERE-based NULL elimination.
//!
//! For a row to be returned, the WHERE clause must have evaluated to TRUE,
//! which proves certain sub-expressions were not NULL: the operands of a
//! NULL-safe operator or function, and the operand of `IS NOT NULL`. `OR` is
//! not descended (either branch alone may have made the row true), and
//! neither is `NOT`.

use crate::ast::Expression;

use super::null_safety::{function_null_safety, operator_null_safety, NullSafety};
use super::scope::SourceColumn;

/// Sub-expressions of the WHERE clause that are non-NULL for every returned
/// row. The list may contain duplicates; consumers only ever scan it.
pub fn non_null_expressions(where_clause: &Expression) -> Vec<&Expression> {
    let mut found = Vec::new();
    collect(where_clause, &mut found);
    found
}

fn collect<'a>(expression: &'a Expression, found: &mut Vec<&'a Expression>) {
    match expression {
        Expression::BinaryOp { op, lhs, rhs } => {
            if op.eq_ignore_ascii_case("and") {
                collect(lhs, found);
                collect(rhs, found);
            } else if operator_null_safety(op) == NullSafety::Safe {
                found.push(lhs);
                found.push(rhs);
            }
        }
        Expression::UnaryOp { op, operand } => {
            if op.eq_ignore_ascii_case("is not null") || op.eq_ignore_ascii_case("notnull") {
                found.push(operand);
            }
        }
        Expression::FunctionCall { name, args } => {
            if function_null_safety(name) == NullSafety::Safe {
                found.extend(args.iter());
            }
        }
        _ => {}
    }
}

/// Force to non-NULL every source column named by a column reference in the
/// non-null list. A bare `ColumnRef` matches any source column with that
/// name; a `TableColumnRef` requires the alias to match as well.
pub fn refine_source_columns(sources: &mut [SourceColumn], non_null: &[&Expression]) {
    for expression in non_null {
        match expression {
            Expression::ColumnRef { column } => {
                for source in sources.iter_mut() {
                    if source.column_name == *column {
                        source.nullability = source.nullability.to_non_null();
                    }
                }
            }
            Expression::TableColumnRef { table, column } => {
                for source in sources.iter_mut() {
                    if source.table_alias == *table && source.column_name == *column {
                        source.nullability = source.nullability.to_non_null();
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::Expression;
    use crate::types::FieldNullability;

    use super::super::scope::SourceColumn;
    use super::{non_null_expressions, refine_source_columns};

    fn source(alias: &str, column: &str, nullable: bool) -> SourceColumn {
        SourceColumn {
            table_alias: alias.to_string(),
            column_name: column.to_string(),
            nullability: FieldNullability::scalar(nullable),
            hidden: false,
        }
    }

    #[test]
    fn is_not_null_yields_its_operand() {
        let clause = Expression::unary("IS NOT NULL", Expression::column("age"));
        assert_eq!(non_null_expressions(&clause), vec![&Expression::column("age")]);
    }

    #[test]
    fn and_recurses_or_does_not() {
        let age = Expression::unary("IS NOT NULL", Expression::column("age"));
        let name = Expression::unary("IS NOT NULL", Expression::column("name"));

        let conjunction = Expression::binary(age.clone(), "AND", name.clone());
        assert_eq!(non_null_expressions(&conjunction).len(), 2);

        let disjunction = Expression::binary(age, "OR", name);
        assert!(non_null_expressions(&disjunction).is_empty());
    }

    #[test]
    fn safe_binary_operators_prove_both_operands() {
        let clause = Expression::binary(Expression::column("id"), "=", Expression::parameter(1));
        assert_eq!(
            non_null_expressions(&clause),
            vec![&Expression::column("id"), &Expression::parameter(1)],
        );
    }

    #[test]
    fn unsafe_operators_prove_nothing() {
        let clause = Expression::binary(
            Expression::binary(Expression::column("a"), "->", Expression::constant("'k'")),
            "OR",
            Expression::column("b"),
        );
        assert!(non_null_expressions(&clause).is_empty());
    }

    #[test]
    fn bare_column_ref_refines_any_alias() {
        let mut sources = vec![source("p", "age", true), source("q", "age", true)];
        let age = Expression::column("age");
        refine_source_columns(&mut sources, &[&age]);
        assert!(sources.iter().all(|s| !s.nullability.nullable()));
    }

    #[test]
    fn qualified_ref_refines_one_alias() {
        let mut sources = vec![source("p", "age", true), source("q", "age", true)];
        let age = Expression::table_column("q", "age");
        refine_source_columns(&mut sources, &[&age]);
        assert!(sources[0].nullability.nullable());
        assert!(!sources[1].nullability.nullable());
    }
}
