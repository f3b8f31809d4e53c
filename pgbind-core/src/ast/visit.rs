//! Read-only walkers over the analysis tree.
//!
//! [`walk_statement`] and its helpers match every variant exhaustively, so a
//! new AST node becomes a compile error here rather than a silently skipped
//! subtree. Narrow scans implement [`Visit`] with only the hooks they care
//! about; full-coverage analysis (column nullability) dispatches directly on
//! the tree instead of going through a visitor.

use super::{
    Expression, InsertValues, SelectListItem, Statement, TableExpression, TableRef, WithQuery,
};

/// Hooks called in pre-order during a walk. Every hook has an empty default,
/// so an implementation only names the nodes it wants to see. `'ast` is the
/// lifetime of the walked tree, letting visitors keep references into it.
pub trait Visit<'ast> {
    fn visit_statement(&mut self, _statement: &'ast Statement) {}
    fn visit_table_ref(&mut self, _table: &'ast TableRef) {}
    fn visit_expression(&mut self, _expression: &'ast Expression) {}
}

pub fn walk_statement<'ast>(statement: &'ast Statement, visitor: &mut impl Visit<'ast>) {
    visitor.visit_statement(statement);
    match statement {
        Statement::Select(select) => {
            walk_ctes(&select.ctes, visitor);
            walk_select_list(&select.select_list, visitor);
            if let Some(from) = &select.from {
                walk_table_expression(from, visitor);
            }
            if let Some(where_clause) = &select.where_clause {
                walk_expression(where_clause, visitor);
            }
            if let Some(limit) = &select.limit {
                walk_expression(limit, visitor);
            }
        }
        Statement::Insert(insert) => {
            walk_ctes(&insert.ctes, visitor);
            visitor.visit_table_ref(&insert.table);
            match &insert.values {
                InsertValues::DefaultValues => {}
                InsertValues::Rows(rows) => {
                    for row in rows {
                        for value in row {
                            walk_expression(value, visitor);
                        }
                    }
                }
                InsertValues::Query(query) => walk_statement(query, visitor),
            }
            walk_select_list(&insert.returning, visitor);
        }
        Statement::Update(update) => {
            walk_ctes(&update.ctes, visitor);
            visitor.visit_table_ref(&update.table);
            for assignment in &update.assignments {
                walk_expression(&assignment.value, visitor);
            }
            if let Some(from) = &update.from {
                walk_table_expression(from, visitor);
            }
            if let Some(where_clause) = &update.where_clause {
                walk_expression(where_clause, visitor);
            }
            walk_select_list(&update.returning, visitor);
        }
        Statement::Delete(delete) => {
            visitor.visit_table_ref(&delete.table);
            if let Some(where_clause) = &delete.where_clause {
                walk_expression(where_clause, visitor);
            }
            walk_select_list(&delete.returning, visitor);
        }
    }
}

fn walk_ctes<'ast>(ctes: &'ast [WithQuery], visitor: &mut impl Visit<'ast>) {
    for cte in ctes {
        walk_statement(&cte.query, visitor);
    }
}

fn walk_select_list<'ast>(items: &'ast [SelectListItem], visitor: &mut impl Visit<'ast>) {
    for item in items {
        match item {
            SelectListItem::AllFields | SelectListItem::AllTableFields { .. } => {}
            SelectListItem::Expression { expression, .. } => walk_expression(expression, visitor),
        }
    }
}

pub fn walk_table_expression<'ast>(
    table_expr: &'ast TableExpression,
    visitor: &mut impl Visit<'ast>,
) {
    match table_expr {
        TableExpression::Table { table, .. } => visitor.visit_table_ref(table),
        TableExpression::SubQuery { query, .. } => walk_statement(query, visitor),
        TableExpression::CrossJoin { left, right } => {
            walk_table_expression(left, visitor);
            walk_table_expression(right, visitor);
        }
        TableExpression::QualifiedJoin {
            left, right, on, ..
        } => {
            walk_table_expression(left, visitor);
            walk_table_expression(right, visitor);
            if let Some(on) = on {
                walk_expression(on, visitor);
            }
        }
    }
}

pub fn walk_expression<'ast>(expression: &'ast Expression, visitor: &mut impl Visit<'ast>) {
    visitor.visit_expression(expression);
    match expression {
        Expression::ColumnRef { .. }
        | Expression::TableColumnRef { .. }
        | Expression::Constant { .. }
        | Expression::Parameter { .. } => {}
        Expression::UnaryOp { operand, .. } => walk_expression(operand, visitor),
        Expression::BinaryOp { lhs, rhs, .. } => {
            walk_expression(lhs, visitor);
            walk_expression(rhs, visitor);
        }
        Expression::FunctionCall { args, .. } => {
            for arg in args {
                walk_expression(arg, visitor);
            }
        }
        Expression::Exists { query } | Expression::ArraySubQuery { query } => {
            walk_statement(query, visitor)
        }
        Expression::InSubQuery { lhs, query } => {
            walk_expression(lhs, visitor);
            walk_statement(query, visitor);
        }
        Expression::TypeCast { lhs, .. } => walk_expression(lhs, visitor),
    }
}

/// Every table reference in the statement, in walk order: FROM sources, CTE
/// bodies, subqueries and DML targets alike. Used to prefetch the schema
/// before inference runs.
pub fn collect_table_refs(statement: &Statement) -> Vec<&TableRef> {
    struct Tables<'ast>(Vec<&'ast TableRef>);

    impl<'ast> Visit<'ast> for Tables<'ast> {
        fn visit_table_ref(&mut self, table: &'ast TableRef) {
            self.0.push(table);
        }
    }

    let mut tables = Tables(Vec::new());
    walk_statement(statement, &mut tables);
    tables.0
}

#[cfg(test)]
mod tests {
    use super::super::{
        Expression, InsertValues, Select, SelectListItem, Statement, TableExpression, TableRef,
        WithQuery,
    };
    use super::{collect_table_refs, walk_statement, Visit};

    fn select_from(from: TableExpression) -> Statement {
        Statement::Select(Select {
            ctes: vec![],
            select_list: vec![SelectListItem::AllFields],
            from: Some(from),
            where_clause: None,
            limit: None,
        })
    }

    #[test]
    fn collects_tables_from_nested_scopes() {
        let statement = Statement::Select(Select {
            ctes: vec![WithQuery {
                name: "recent".into(),
                query: select_from(TableExpression::table("event")),
            }],
            select_list: vec![SelectListItem::Expression {
                expression: Expression::Exists {
                    query: Box::new(select_from(TableExpression::table("account"))),
                },
                alias: None,
            }],
            from: Some(TableExpression::table("recent")),
            where_clause: None,
            limit: None,
        });

        let names: Vec<&str> = collect_table_refs(&statement)
            .into_iter()
            .map(|table| table.name.as_str())
            .collect();
        assert_eq!(names, vec!["event", "account", "recent"]);
    }

    #[test]
    fn visits_parameters_in_insert_rows() {
        struct Params(Vec<usize>);

        impl<'ast> Visit<'ast> for Params {
            fn visit_expression(&mut self, expression: &'ast Expression) {
                if let Expression::Parameter { index } = expression {
                    self.0.push(*index);
                }
            }
        }

        let statement = Statement::Insert(super::super::Insert {
            ctes: vec![],
            table: TableRef::new("person"),
            columns: vec!["name".into(), "age".into()],
            values: InsertValues::Rows(vec![
                vec![Expression::parameter(1), Expression::parameter(2)],
                vec![Expression::parameter(3), Expression::constant("0")],
            ]),
            returning: vec![],
        });

        let mut params = Params(Vec::new());
        walk_statement(&statement, &mut params);
        assert_eq!(params.0, vec![1, 2, 3]);
    }
}
