//! Lowering from the sqlparser tree to the analysis tree.
//!
//! The lowering is total over the subset modeled in [`crate::ast`] and fails
//! with [`ParseError::Unsupported`] for everything else. Callers treat every
//! `ParseError` as recoverable: the statement keeps its probed (pessimistic)
//! description.
//!
//! Unquoted identifiers are folded to lowercase here, matching the server's
//! case folding, so inferred output names line up with probed column names.

use std::error::Error;
use std::fmt;

use sqlparser::ast as sql;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::ast::{
    Assignment, Delete, Expression, Insert, InsertValues, JoinType, Select, SelectListItem,
    Statement, TableExpression, TableRef, Update, WithQuery,
};

#[derive(Debug, Clone)]
pub enum ParseError {
    Sql(sqlparser::parser::ParserError),
    EmptyInput,
    MultipleStatements { count: usize },
    Unsupported { construct: String },
    InvalidPlaceholder { text: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Sql(err) => write!(f, "{err}"),
            ParseError::EmptyInput => write!(f, "No statement to analyze"),
            ParseError::MultipleStatements { count } => {
                write!(f, "Expected a single statement, got {count}")
            }
            ParseError::Unsupported { construct } => {
                write!(f, "Unsupported SQL construct: {construct}")
            }
            ParseError::InvalidPlaceholder { text } => {
                write!(f, "Unsupported placeholder {text}, expected $1, $2, ...")
            }
        }
    }
}

impl Error for ParseError {}

fn unsupported<T>(construct: impl Into<String>) -> Result<T, ParseError> {
    Err(ParseError::Unsupported {
        construct: construct.into(),
    })
}

/// Parse one SQL statement into the analysis tree.
pub fn parse_sql(sql_text: &str) -> Result<Statement, ParseError> {
    let dialect = PostgreSqlDialect {};
    let mut statements = Parser::parse_sql(&dialect, sql_text).map_err(ParseError::Sql)?;
    match statements.len() {
        0 => Err(ParseError::EmptyInput),
        1 => lower_statement(statements.remove(0)),
        count => Err(ParseError::MultipleStatements { count }),
    }
}

fn lower_statement(statement: sql::Statement) -> Result<Statement, ParseError> {
    match statement {
        sql::Statement::Query(query) => lower_query(*query),
        sql::Statement::Insert(insert) => lower_insert(insert),
        sql::Statement::Update {
            table,
            assignments,
            from,
            selection,
            returning,
            or: _,
        } => lower_update(table, assignments, from, selection, returning),
        sql::Statement::Delete(delete) => lower_delete(delete),
        other => unsupported(other.to_string()),
    }
}

/// PostgreSQL folds unquoted identifiers to lowercase; quoted ones are taken
/// verbatim.
fn ident_value(ident: &sql::Ident) -> String {
    match ident.quote_style {
        Some(_) => ident.value.clone(),
        None => ident.value.to_lowercase(),
    }
}

fn object_name_parts(name: &sql::ObjectName) -> Result<Vec<String>, ParseError> {
    name.0
        .iter()
        .map(|part| match part {
            sql::ObjectNamePart::Identifier(ident) => Ok(ident_value(ident)),
            _ => unsupported(format!("object name part in {name}")),
        })
        .collect()
}

fn lower_table_ref(name: &sql::ObjectName) -> Result<TableRef, ParseError> {
    let mut parts = object_name_parts(name)?;
    match parts.len() {
        1 => Ok(TableRef {
            schema: None,
            name: parts.remove(0),
        }),
        2 => {
            let table = parts.remove(1);
            Ok(TableRef {
                schema: Some(parts.remove(0)),
                name: table,
            })
        }
        _ => unsupported(format!("table name {name}")),
    }
}

fn lower_table_alias(alias: Option<sql::TableAlias>) -> Result<Option<String>, ParseError> {
    match alias {
        None => Ok(None),
        Some(alias) => {
            if !alias.columns.is_empty() {
                return unsupported("column aliases on a table alias");
            }
            Ok(Some(ident_value(&alias.name)))
        }
    }
}

fn lower_with(with: Option<sql::With>) -> Result<Vec<WithQuery>, ParseError> {
    let Some(with) = with else {
        return Ok(vec![]);
    };
    with.cte_tables
        .into_iter()
        .map(|cte| {
            if !cte.alias.columns.is_empty() {
                return unsupported("column aliases on a CTE");
            }
            Ok(WithQuery {
                name: ident_value(&cte.alias.name),
                query: lower_query(*cte.query)?,
            })
        })
        .collect()
}

fn lower_limit(limit_clause: Option<sql::LimitClause>) -> Result<Option<Expression>, ParseError> {
    match limit_clause {
        Some(sql::LimitClause::LimitOffset { limit, .. }) => {
            limit.map(lower_expression).transpose()
        }
        _ => Ok(None),
    }
}

fn lower_query(query: sql::Query) -> Result<Statement, ParseError> {
    let ctes = lower_with(query.with)?;
    let limit = lower_limit(query.limit_clause)?;
    lower_query_body(*query.body, ctes, limit)
}

fn lower_query_body(
    body: sql::SetExpr,
    ctes: Vec<WithQuery>,
    limit: Option<Expression>,
) -> Result<Statement, ParseError> {
    match body {
        sql::SetExpr::Select(select) => lower_select(*select, ctes, limit),
        // A parenthesized query; fold the outer WITH/LIMIT into it.
        sql::SetExpr::Query(inner) => match lower_query(*inner)? {
            Statement::Select(mut select) => {
                let mut merged = ctes;
                merged.extend(select.ctes);
                select.ctes = merged;
                if limit.is_some() {
                    select.limit = limit;
                }
                Ok(Statement::Select(select))
            }
            _ => unsupported("nested non-SELECT query"),
        },
        other => unsupported(other.to_string()),
    }
}

fn lower_select(
    select: sql::Select,
    ctes: Vec<WithQuery>,
    limit: Option<Expression>,
) -> Result<Statement, ParseError> {
    let select_list = select
        .projection
        .into_iter()
        .map(lower_select_item)
        .collect::<Result<Vec<_>, _>>()?;
    let from = lower_from(select.from)?;
    let where_clause = select.selection.map(lower_expression).transpose()?;

    Ok(Statement::Select(Select {
        ctes,
        select_list,
        from,
        where_clause,
        limit,
    }))
}

fn lower_select_item(item: sql::SelectItem) -> Result<SelectListItem, ParseError> {
    match item {
        sql::SelectItem::Wildcard(_) => Ok(SelectListItem::AllFields),
        sql::SelectItem::QualifiedWildcard(kind, _) => match kind {
            sql::SelectItemQualifiedWildcardKind::ObjectName(name) => {
                let mut parts = object_name_parts(&name)?;
                match parts.pop() {
                    Some(table) => Ok(SelectListItem::AllTableFields { table }),
                    None => unsupported("empty qualified wildcard"),
                }
            }
            _ => unsupported("expression-qualified wildcard"),
        },
        sql::SelectItem::UnnamedExpr(expr) => Ok(SelectListItem::Expression {
            expression: lower_expression(expr)?,
            alias: None,
        }),
        sql::SelectItem::ExprWithAlias { expr, alias } => Ok(SelectListItem::Expression {
            expression: lower_expression(expr)?,
            alias: Some(ident_value(&alias)),
        }),
    }
}

fn lower_from(from: Vec<sql::TableWithJoins>) -> Result<Option<TableExpression>, ParseError> {
    let mut result: Option<TableExpression> = None;
    for table_with_joins in from {
        let item = lower_table_with_joins(table_with_joins)?;
        result = Some(match result {
            // `FROM a, b` is an implicit cross join.
            Some(left) => TableExpression::CrossJoin {
                left: Box::new(left),
                right: Box::new(item),
            },
            None => item,
        });
    }
    Ok(result)
}

fn lower_table_with_joins(
    table_with_joins: sql::TableWithJoins,
) -> Result<TableExpression, ParseError> {
    let mut result = lower_table_factor(table_with_joins.relation)?;
    for join in table_with_joins.joins {
        let right = lower_table_factor(join.relation)?;
        let (join_type, constraint) = match join.join_operator {
            sql::JoinOperator::Inner(constraint) | sql::JoinOperator::Join(constraint) => {
                (JoinType::Inner, constraint)
            }
            sql::JoinOperator::Left(constraint) | sql::JoinOperator::LeftOuter(constraint) => {
                (JoinType::Left, constraint)
            }
            sql::JoinOperator::Right(constraint) | sql::JoinOperator::RightOuter(constraint) => {
                (JoinType::Right, constraint)
            }
            sql::JoinOperator::FullOuter(constraint) => (JoinType::Full, constraint),
            sql::JoinOperator::CrossJoin { .. } => {
                result = TableExpression::CrossJoin {
                    left: Box::new(result),
                    right: Box::new(right),
                };
                continue;
            }
            other => return unsupported(format!("join operator {other:?}")),
        };
        let on = match constraint {
            sql::JoinConstraint::On(expr) => Some(Box::new(lower_expression(expr)?)),
            // A bare JOIN without a constraint behaves like CROSS JOIN.
            sql::JoinConstraint::None if join_type == JoinType::Inner => {
                result = TableExpression::CrossJoin {
                    left: Box::new(result),
                    right: Box::new(right),
                };
                continue;
            }
            _ => None,
        };
        result = TableExpression::QualifiedJoin {
            left: Box::new(result),
            join_type,
            right: Box::new(right),
            on,
        };
    }
    Ok(result)
}

fn lower_table_factor(factor: sql::TableFactor) -> Result<TableExpression, ParseError> {
    match factor {
        sql::TableFactor::Table { name, alias, .. } => Ok(TableExpression::Table {
            table: lower_table_ref(&name)?,
            alias: lower_table_alias(alias)?,
        }),
        sql::TableFactor::Derived {
            subquery, alias, ..
        } => {
            let Some(alias) = lower_table_alias(alias)? else {
                return unsupported("subquery in FROM without an alias");
            };
            Ok(TableExpression::SubQuery {
                query: Box::new(lower_query(*subquery)?),
                alias,
            })
        }
        sql::TableFactor::NestedJoin {
            table_with_joins,
            alias,
            ..
        } => {
            if alias.is_some() {
                return unsupported("alias on a parenthesized join");
            }
            lower_table_with_joins(*table_with_joins)
        }
        other => unsupported(other.to_string()),
    }
}

fn lower_expression(expr: sql::Expr) -> Result<Expression, ParseError> {
    match expr {
        sql::Expr::Identifier(ident) => Ok(Expression::ColumnRef {
            column: ident_value(&ident),
        }),
        sql::Expr::CompoundIdentifier(idents) => match idents.as_slice() {
            [] => unsupported("empty identifier"),
            [column] => Ok(Expression::ColumnRef {
                column: ident_value(column),
            }),
            // Use the last two parts; any leading schema qualifier does not
            // matter for column resolution.
            [.., table, column] => Ok(Expression::TableColumnRef {
                table: ident_value(table),
                column: ident_value(column),
            }),
        },
        sql::Expr::Value(value) => lower_value(value.value),
        sql::Expr::BinaryOp { left, op, right } => Ok(Expression::binary(
            lower_expression(*left)?,
            op.to_string(),
            lower_expression(*right)?,
        )),
        sql::Expr::UnaryOp { op, expr } => Ok(Expression::unary(
            op.to_string(),
            lower_expression(*expr)?,
        )),
        sql::Expr::IsNull(expr) => Ok(Expression::unary("IS NULL", lower_expression(*expr)?)),
        sql::Expr::IsNotNull(expr) => {
            Ok(Expression::unary("IS NOT NULL", lower_expression(*expr)?))
        }
        sql::Expr::IsTrue(expr) => Ok(Expression::unary("IS TRUE", lower_expression(*expr)?)),
        sql::Expr::IsNotTrue(expr) => {
            Ok(Expression::unary("IS NOT TRUE", lower_expression(*expr)?))
        }
        sql::Expr::IsFalse(expr) => Ok(Expression::unary("IS FALSE", lower_expression(*expr)?)),
        sql::Expr::IsNotFalse(expr) => {
            Ok(Expression::unary("IS NOT FALSE", lower_expression(*expr)?))
        }
        sql::Expr::IsUnknown(expr) => Ok(Expression::unary("IS UNKNOWN", lower_expression(*expr)?)),
        sql::Expr::IsNotUnknown(expr) => {
            Ok(Expression::unary("IS NOT UNKNOWN", lower_expression(*expr)?))
        }
        sql::Expr::IsDistinctFrom(lhs, rhs) => Ok(Expression::binary(
            lower_expression(*lhs)?,
            "IS DISTINCT FROM",
            lower_expression(*rhs)?,
        )),
        sql::Expr::IsNotDistinctFrom(lhs, rhs) => Ok(Expression::binary(
            lower_expression(*lhs)?,
            "IS NOT DISTINCT FROM",
            lower_expression(*rhs)?,
        )),
        sql::Expr::Like { expr, pattern, .. } => Ok(Expression::binary(
            lower_expression(*expr)?,
            "LIKE",
            lower_expression(*pattern)?,
        )),
        sql::Expr::ILike { expr, pattern, .. } => Ok(Expression::binary(
            lower_expression(*expr)?,
            "ILIKE",
            lower_expression(*pattern)?,
        )),
        sql::Expr::Nested(expr) => lower_expression(*expr),
        sql::Expr::Cast {
            expr, data_type, ..
        } => Ok(Expression::TypeCast {
            lhs: Box::new(lower_expression(*expr)?),
            target_type: data_type.to_string(),
        }),
        sql::Expr::Exists { subquery, .. } => Ok(Expression::Exists {
            query: Box::new(lower_query(*subquery)?),
        }),
        sql::Expr::InSubquery { expr, subquery, .. } => Ok(Expression::InSubQuery {
            lhs: Box::new(lower_expression(*expr)?),
            query: Box::new(lower_query(*subquery)?),
        }),
        // `x IN (a, b)` propagates NULL like a function over all operands.
        sql::Expr::InList { expr, list, .. } => {
            let mut args = vec![lower_expression(*expr)?];
            for item in list {
                args.push(lower_expression(item)?);
            }
            Ok(Expression::FunctionCall {
                name: "in".to_string(),
                args,
            })
        }
        sql::Expr::Function(function) => lower_function(function),
        other => unsupported(other.to_string()),
    }
}

fn lower_value(value: sql::Value) -> Result<Expression, ParseError> {
    match value {
        sql::Value::Placeholder(text) => match text.strip_prefix('$') {
            Some(index) => match index.parse::<usize>() {
                Ok(index) if index > 0 => Ok(Expression::Parameter { index }),
                _ => Err(ParseError::InvalidPlaceholder { text }),
            },
            None => Err(ParseError::InvalidPlaceholder { text }),
        },
        sql::Value::Null => Ok(Expression::constant("NULL")),
        other => Ok(Expression::Constant {
            text: other.to_string(),
        }),
    }
}

fn lower_function(function: sql::Function) -> Result<Expression, ParseError> {
    let name = function.name.to_string().to_lowercase();
    match function.args {
        sql::FunctionArguments::Subquery(query) if name == "array" => {
            Ok(Expression::ArraySubQuery {
                query: Box::new(lower_query(*query)?),
            })
        }
        sql::FunctionArguments::Subquery(_) => unsupported(format!("subquery call to {name}")),
        sql::FunctionArguments::None => Ok(Expression::FunctionCall { name, args: vec![] }),
        sql::FunctionArguments::List(list) => {
            let mut args = Vec::with_capacity(list.args.len());
            for arg in list.args {
                match arg {
                    sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Expr(expr)) => {
                        args.push(lower_expression(expr)?)
                    }
                    // `count(*)` and friends; the wildcard is not a value.
                    sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Wildcard)
                    | sql::FunctionArg::Unnamed(sql::FunctionArgExpr::QualifiedWildcard(_)) => {}
                    _ => return unsupported(format!("named argument to {name}")),
                }
            }
            Ok(Expression::FunctionCall { name, args })
        }
    }
}

fn lower_insert(insert: sql::Insert) -> Result<Statement, ParseError> {
    let table = match &insert.table {
        sql::TableObject::TableName(name) => lower_table_ref(name)?,
        other => return unsupported(other.to_string()),
    };
    let columns = insert.columns.iter().map(ident_value).collect();
    let values = match insert.source {
        None => InsertValues::DefaultValues,
        Some(query) => {
            let query = *query;
            match *query.body {
                sql::SetExpr::Values(values) => {
                    let rows = values
                        .rows
                        .into_iter()
                        .map(|row| {
                            row.into_iter()
                                .map(lower_expression)
                                .collect::<Result<Vec<_>, _>>()
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    InsertValues::Rows(rows)
                }
                body => InsertValues::Query(Box::new(lower_query_body(
                    body,
                    lower_with(query.with)?,
                    lower_limit(query.limit_clause)?,
                )?)),
            }
        }
    };
    let returning = lower_returning(insert.returning)?;

    Ok(Statement::Insert(Insert {
        ctes: vec![],
        table,
        columns,
        values,
        returning,
    }))
}

fn lower_returning(
    returning: Option<Vec<sql::SelectItem>>,
) -> Result<Vec<SelectListItem>, ParseError> {
    returning
        .into_iter()
        .flatten()
        .map(lower_select_item)
        .collect()
}

/// UPDATE and DELETE target a single plain table.
fn lower_dml_target(
    target: sql::TableWithJoins,
) -> Result<(TableRef, Option<String>), ParseError> {
    if !target.joins.is_empty() {
        return unsupported("joined DML target");
    }
    match target.relation {
        sql::TableFactor::Table { name, alias, .. } => {
            Ok((lower_table_ref(&name)?, lower_table_alias(alias)?))
        }
        other => unsupported(other.to_string()),
    }
}

fn lower_update(
    table: sql::TableWithJoins,
    assignments: Vec<sql::Assignment>,
    from: Option<sql::UpdateTableFromKind>,
    selection: Option<sql::Expr>,
    returning: Option<Vec<sql::SelectItem>>,
) -> Result<Statement, ParseError> {
    let (table, alias) = lower_dml_target(table)?;
    let assignments = assignments
        .into_iter()
        .map(|assignment| {
            let column = match &assignment.target {
                sql::AssignmentTarget::ColumnName(name) => {
                    let mut parts = object_name_parts(name)?;
                    match parts.pop() {
                        Some(column) => column,
                        None => return unsupported("empty assignment target"),
                    }
                }
                other => return unsupported(other.to_string()),
            };
            Ok(Assignment {
                column,
                value: lower_expression(assignment.value)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let from = match from {
        None => None,
        Some(
            sql::UpdateTableFromKind::BeforeSet(tables)
            | sql::UpdateTableFromKind::AfterSet(tables),
        ) => lower_from(tables)?,
    };
    let where_clause = selection.map(lower_expression).transpose()?;
    let returning = lower_returning(returning)?;

    Ok(Statement::Update(Update {
        ctes: vec![],
        table,
        alias,
        assignments,
        from,
        where_clause,
        returning,
    }))
}

fn lower_delete(delete: sql::Delete) -> Result<Statement, ParseError> {
    if !delete.tables.is_empty() {
        return unsupported("multi-table DELETE");
    }
    if delete.using.is_some() {
        return unsupported("DELETE USING");
    }
    let mut from = match delete.from {
        sql::FromTable::WithFromKeyword(tables) | sql::FromTable::WithoutKeyword(tables) => tables,
    };
    if from.len() != 1 {
        return unsupported("DELETE from multiple tables");
    }
    let (table, alias) = lower_dml_target(from.remove(0))?;
    let where_clause = delete.selection.map(lower_expression).transpose()?;
    let returning = lower_returning(delete.returning)?;

    Ok(Statement::Delete(Delete {
        table,
        alias,
        where_clause,
        returning,
    }))
}
