//! Row count from statement shape alone. Anything the rules below do not
//! cover is `Many`.

use crate::ast::{Expression, InsertValues, Statement};
use crate::types::RowCount;

pub fn infer_row_count(statement: &Statement) -> RowCount {
    match statement {
        Statement::Select(select) => match &select.limit {
            // Only the constant 1 improves the bound; `LIMIT $1` or any
            // other expression does not.
            Some(Expression::Constant { text }) if text == "1" => RowCount::ZeroOrOne,
            _ => RowCount::Many,
        },
        Statement::Insert(insert) => match &insert.values {
            InsertValues::DefaultValues => RowCount::One,
            InsertValues::Rows(_) if insert.returning.is_empty() => RowCount::Zero,
            InsertValues::Rows(rows) if rows.len() == 1 => RowCount::One,
            InsertValues::Rows(_) => RowCount::Many,
            InsertValues::Query(_) if insert.returning.is_empty() => RowCount::Zero,
            InsertValues::Query(_) => RowCount::Many,
        },
        Statement::Update(update) => match update.returning.is_empty() {
            true => RowCount::Zero,
            false => RowCount::Many,
        },
        Statement::Delete(delete) => match delete.returning.is_empty() {
            true => RowCount::Zero,
            false => RowCount::Many,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::infer_row_count;
    use crate::parser::parse_sql;
    use crate::types::RowCount;

    const CASES: &[(&str, RowCount)] = &[
        ("SELECT * FROM person", RowCount::Many),
        ("SELECT * FROM person LIMIT 1", RowCount::ZeroOrOne),
        ("SELECT * FROM person LIMIT 2", RowCount::Many),
        ("SELECT * FROM person LIMIT $1", RowCount::Many),
        ("SELECT * FROM person WHERE id = 1 LIMIT 1", RowCount::ZeroOrOne),
        ("INSERT INTO person DEFAULT VALUES", RowCount::One),
        ("INSERT INTO person(name) VALUES ($1)", RowCount::Zero),
        (
            "INSERT INTO person(name) VALUES ($1) RETURNING id",
            RowCount::One,
        ),
        (
            "INSERT INTO person(name) VALUES ($1), ($2) RETURNING id",
            RowCount::Many,
        ),
        (
            "INSERT INTO person(name) SELECT name FROM person",
            RowCount::Zero,
        ),
        (
            "INSERT INTO person(name) SELECT name FROM person RETURNING id",
            RowCount::Many,
        ),
        ("UPDATE person SET name = $1", RowCount::Zero),
        ("UPDATE person SET name = $1 RETURNING id", RowCount::Many),
        ("DELETE FROM person", RowCount::Zero),
        ("DELETE FROM person RETURNING id", RowCount::Many),
    ];

    #[test]
    fn row_count_depends_only_on_shape() {
        for (sql, expected) in CASES {
            let statement = parse_sql(sql).unwrap();
            assert_eq!(infer_row_count(&statement), *expected, "{sql}");
        }
    }
}
