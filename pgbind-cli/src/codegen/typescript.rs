//! TypeScript emitter: one typed async function per query over a `pg`
//! client, with a row interface per query and the return shape driven by the
//! inferred row count.

use std::{collections::BTreeMap, error::Error, fmt::Write};

use pgbind_core::types::{PgType, RowCount, StatementDescription};

use super::{CodeGen, QueryDefinition};

const HEADER: &str = "\
// Generated by pgbind. Do not edit.
import type { ClientBase } from \"pg\";
";

fn to_pascal(mixed_case_name: &str) -> String {
    let mut result = String::new();
    let mut upper_next = true;
    for character in mixed_case_name.chars() {
        if character == '_' || character == '-' {
            upper_next = true;
            continue;
        }
        if upper_next {
            result.extend(character.to_uppercase());
            upper_next = false;
        } else {
            result.push(character);
        }
    }
    result
}

fn to_camel(mixed_case_name: &str) -> String {
    let pascal = to_pascal(mixed_case_name);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => pascal,
    }
}

/// oid → TypeScript type. `int8` and `numeric` map to `string`: the former
/// exceeds `Number.MAX_SAFE_INTEGER`, the latter loses precision as a float.
fn ts_base_type(oid: u32) -> &'static str {
    match oid {
        16 => "boolean",
        21 | 23 | 26 => "number",
        700 | 701 => "number",
        20 | 1700 => "string",
        18 | 19 | 25 | 1042 | 1043 => "string",
        1082 | 1114 | 1184 => "Date",
        1083 | 1266 | 1186 => "string",
        2950 => "string",
        17 => "Buffer",
        114 | 3802 => "unknown",
        _ => "unknown",
    }
}

fn ts_type(sql_type: &PgType, nullable: bool) -> String {
    let base = match &sql_type.array_elem {
        Some(elem) => {
            let elem_type = ts_base_type(elem.oid);
            match elem.nullable {
                true => format!("({elem_type} | null)[]"),
                false => format!("{elem_type}[]"),
            }
        }
        None => ts_base_type(sql_type.oid).to_string(),
    };
    match nullable {
        true => format!("{base} | null"),
        false => base,
    }
}

fn return_type(statement: &StatementDescription, row_type: &str) -> String {
    match statement.row_count {
        RowCount::Zero => "void".to_string(),
        RowCount::One => row_type.to_string(),
        RowCount::ZeroOrOne => format!("{row_type} | undefined"),
        RowCount::Many => format!("{row_type}[]"),
    }
}

fn return_statement(row_count: RowCount) -> &'static str {
    match row_count {
        RowCount::Zero => "",
        RowCount::One | RowCount::ZeroOrOne => "  return result.rows[0];\n",
        RowCount::Many => "  return result.rows;\n",
    }
}

#[derive(Default)]
pub struct TypeScriptCodeGen {
    queries: BTreeMap<String, QueryDefinition>,
}

impl TypeScriptCodeGen {
    fn emit_query(&self, name: &str, query: &QueryDefinition) -> Result<String, Box<dyn Error>> {
        let statement = &query.statement;
        let function_name = to_camel(name);
        let row_type = to_pascal(&format!("{name}_row"));
        let mut code = String::new();

        if !statement.columns.is_empty() {
            writeln!(code, "export interface {row_type} {{")?;
            for column in &statement.columns {
                writeln!(
                    code,
                    "  {}: {};",
                    column.name,
                    ts_type(&column.sql_type, column.nullable)
                )?;
            }
            writeln!(code, "}}\n")?;
        }

        let params = match statement.params.is_empty() {
            true => String::new(),
            false => {
                let fields = statement
                    .params
                    .iter()
                    .zip(&query.param_names)
                    .map(|(param, name)| {
                        format!("{}: {}", name, ts_type(&param.sql_type, param.nullable))
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                format!(", params: {{ {fields} }}")
            }
        };

        writeln!(
            code,
            "export async function {function_name}(client: ClientBase{params}): Promise<{}> {{",
            return_type(statement, &row_type),
        )?;
        writeln!(code, "  const result = await client.query(")?;
        writeln!(code, "    `{}`,", statement.sql.trim())?;
        let values = query
            .param_names
            .iter()
            .map(|name| format!("params.{name}"))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(code, "    [{values}]")?;
        writeln!(code, "  );")?;
        code.push_str(return_statement(statement.row_count));
        writeln!(code, "}}")?;
        Ok(code)
    }
}

impl CodeGen for TypeScriptCodeGen {
    fn push(&mut self, name: &str, query: QueryDefinition) -> Result<(), Box<dyn Error>> {
        self.queries.insert(name.to_string(), query);
        Ok(())
    }

    fn finalize(&self) -> Result<String, Box<dyn Error>> {
        let mut code = HEADER.to_string();
        for (name, query) in &self.queries {
            code.push('\n');
            code.push_str(&self.emit_query(name, query)?);
        }
        Ok(code)
    }
}
