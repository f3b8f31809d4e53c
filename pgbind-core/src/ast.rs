//! The analysis tree: a closed model of the SQL subset the inference engine
//! understands. The lowering in [`crate::parser`] produces it from the
//! sqlparser tree; everything outside this model is rejected there.
//!
//! All nodes derive `PartialEq`, and that derived structural equality is the
//! comparator used for WHERE-clause refinement.

pub mod visit;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

/// A named CTE: `WITH name AS (query)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithQuery {
    pub name: String,
    pub query: Statement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    pub ctes: Vec<WithQuery>,
    pub select_list: Vec<SelectListItem>,
    pub from: Option<TableExpression>,
    pub where_clause: Option<Expression>,
    pub limit: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectListItem {
    /// `SELECT *`
    AllFields,
    /// `SELECT t.*`
    AllTableFields { table: String },
    /// `SELECT expr [AS alias]`
    Expression {
        expression: Expression,
        alias: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insert {
    pub ctes: Vec<WithQuery>,
    pub table: TableRef,
    /// Explicit target column list; empty means the table's own column order.
    pub columns: Vec<String>,
    pub values: InsertValues,
    pub returning: Vec<SelectListItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertValues {
    DefaultValues,
    Rows(Vec<Vec<Expression>>),
    Query(Box<Statement>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub ctes: Vec<WithQuery>,
    pub table: TableRef,
    pub alias: Option<String>,
    pub assignments: Vec<Assignment>,
    pub from: Option<TableExpression>,
    pub where_clause: Option<Expression>,
    pub returning: Vec<SelectListItem>,
}

/// One `SET column = value` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub column: String,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delete {
    pub table: TableRef,
    pub alias: Option<String>,
    pub where_clause: Option<Expression>,
    pub returning: Vec<SelectListItem>,
}

/// A possibly schema-qualified table name. An unqualified name is first tried
/// against the CTEs in scope, then resolved through the search path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableExpression {
    Table {
        table: TableRef,
        alias: Option<String>,
    },
    SubQuery {
        query: Box<Statement>,
        alias: String,
    },
    CrossJoin {
        left: Box<TableExpression>,
        right: Box<TableExpression>,
    },
    QualifiedJoin {
        left: Box<TableExpression>,
        join_type: JoinType,
        right: Box<TableExpression>,
        /// `ON` condition; absent for `USING`/`NATURAL` joins. The condition
        /// does not participate in nullability analysis.
        on: Option<Box<Expression>>,
    },
}

impl TableExpression {
    pub fn table(name: impl Into<String>) -> Self {
        Self::Table {
            table: TableRef::new(name),
            alias: None,
        }
    }

    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Table {
            table: TableRef::new(name),
            alias: Some(alias.into()),
        }
    }

    pub fn join(self, join_type: JoinType, right: TableExpression, on: Option<Expression>) -> Self {
        Self::QualifiedJoin {
            left: Box::new(self),
            join_type,
            right: Box::new(right),
            on: on.map(Box::new),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// An unqualified column reference.
    ColumnRef { column: String },
    /// A `table.column` reference; `table` is an alias or table name.
    TableColumnRef { table: String, column: String },
    /// A literal, carrying its SQL spelling (`NULL` for the null literal).
    Constant { text: String },
    /// A positional parameter; `index` is 1-based as in `$1`.
    Parameter { index: usize },
    UnaryOp {
        op: String,
        operand: Box<Expression>,
    },
    BinaryOp {
        op: String,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    FunctionCall {
        name: String,
        args: Vec<Expression>,
    },
    /// `EXISTS (subquery)` or `NOT EXISTS (subquery)`.
    Exists { query: Box<Statement> },
    /// `expr IN (subquery)` or `expr NOT IN (subquery)`.
    InSubQuery {
        lhs: Box<Expression>,
        query: Box<Statement>,
    },
    /// `ARRAY(subquery)`.
    ArraySubQuery { query: Box<Statement> },
    /// `expr::type` or `CAST(expr AS type)`.
    TypeCast {
        lhs: Box<Expression>,
        target_type: String,
    },
}

impl Expression {
    pub fn column(column: impl Into<String>) -> Self {
        Self::ColumnRef {
            column: column.into(),
        }
    }

    pub fn table_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::TableColumnRef {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn constant(text: impl Into<String>) -> Self {
        Self::Constant { text: text.into() }
    }

    pub fn parameter(index: usize) -> Self {
        Self::Parameter { index }
    }

    pub fn unary(op: impl Into<String>, operand: Expression) -> Self {
        Self::UnaryOp {
            op: op.into(),
            operand: Box::new(operand),
        }
    }

    pub fn binary(lhs: Expression, op: impl Into<String>, rhs: Expression) -> Self {
        Self::BinaryOp {
            op: op.into(),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self::FunctionCall {
            name: name.into(),
            args,
        }
    }
}
