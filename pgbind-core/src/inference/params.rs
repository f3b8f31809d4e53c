//! The parameter nullability pass.
//!
//! Every parameter starts out nullable (as probed). A parameter bound
//! directly to a column (an `INSERT ... VALUES` position or an `UPDATE ...
//! SET` assignment) takes that column's nullability instead. A parameter
//! used at several sites is nullable as soon as any site says so.

use std::collections::HashMap;

use crate::ast::{
    visit::{walk_statement, Visit},
    Expression, Insert, InsertValues, Statement, Update,
};
use crate::schema::SchemaClient;

use super::InferError;

/// Per-index verdicts of the parameter pass. Indices without a verdict keep
/// whatever the driver probe reported.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NullableParams {
    records: HashMap<usize, bool>,
}

impl NullableParams {
    pub fn get(&self, index: usize) -> Option<bool> {
        self.records.get(&index).copied()
    }

    fn record(&mut self, index: usize, nullable: bool) {
        self.records
            .entry(index)
            .and_modify(|recorded| *recorded |= nullable)
            .or_insert(nullable);
    }
}

pub fn infer_param_nullability(
    client: &dyn SchemaClient,
    statement: &Statement,
) -> Result<NullableParams, InferError> {
    struct BindingSites<'ast> {
        inserts: Vec<&'ast Insert>,
        updates: Vec<&'ast Update>,
    }

    impl<'ast> Visit<'ast> for BindingSites<'ast> {
        fn visit_statement(&mut self, statement: &'ast Statement) {
            match statement {
                Statement::Insert(insert) => self.inserts.push(insert),
                Statement::Update(update) => self.updates.push(update),
                Statement::Select(_) | Statement::Delete(_) => {}
            }
        }
    }

    let mut sites = BindingSites {
        inserts: vec![],
        updates: vec![],
    };
    walk_statement(statement, &mut sites);

    let mut params = NullableParams::default();
    for insert in sites.inserts {
        record_insert_params(client, insert, &mut params)?;
    }
    for update in sites.updates {
        record_update_params(client, update, &mut params)?;
    }
    Ok(params)
}

fn record_insert_params(
    client: &dyn SchemaClient,
    insert: &Insert,
    params: &mut NullableParams,
) -> Result<(), InferError> {
    let InsertValues::Rows(rows) = &insert.values else {
        return Ok(());
    };
    let table = client.get_table(insert.table.schema.as_deref(), &insert.table.name)?;

    // The nullability of each VALUES position: the named target columns, or
    // the table's own column order when the statement names none.
    let targets: Vec<bool> = if insert.columns.is_empty() {
        table
            .columns
            .iter()
            .filter(|column| !column.hidden)
            .map(|column| column.nullable)
            .collect()
    } else {
        insert
            .columns
            .iter()
            .map(|name| {
                table
                    .column(name)
                    .map(|column| column.nullable)
                    .ok_or_else(|| InferError::UnknownColumn { name: name.clone() })
            })
            .collect::<Result<_, _>>()?
    };

    for row in rows {
        for (value, nullable) in row.iter().zip(&targets) {
            if let Expression::Parameter { index } = value {
                params.record(*index, *nullable);
            }
        }
    }
    Ok(())
}

fn record_update_params(
    client: &dyn SchemaClient,
    update: &Update,
    params: &mut NullableParams,
) -> Result<(), InferError> {
    let table = client.get_table(update.table.schema.as_deref(), &update.table.name)?;
    for assignment in &update.assignments {
        if let Expression::Parameter { index } = &assignment.value {
            let column = table
                .column(&assignment.column)
                .ok_or_else(|| InferError::UnknownColumn {
                    name: assignment.column.clone(),
                })?;
            params.record(*index, column.nullable);
        }
    }
    Ok(())
}
