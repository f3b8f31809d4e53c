//! NULL propagation categories for operators and functions.
//!
//! Almost every PostgreSQL operator and built-in function is strict: the
//! result is NULL exactly when an operand is NULL. `Safe` is therefore the
//! default and the tables below list the exceptions.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullSafety {
    /// Result is NULL iff some operand is NULL.
    Safe,
    /// Result may be NULL even when no operand is.
    Unsafe,
    /// Result is always NULL.
    AlwaysNull,
    /// Result is never NULL.
    NeverNull,
}

pub fn operator_null_safety(op: &str) -> NullSafety {
    let op = op.to_uppercase();
    match op.as_str() {
        // FALSE AND NULL is FALSE and TRUE OR NULL is TRUE, so these can
        // swallow a NULL operand without the proof going the other way.
        "AND" | "OR" => NullSafety::Unsafe,

        // JSON extraction yields SQL NULL for a missing key.
        "->" | "->>" | "#>" | "#>>" => NullSafety::Unsafe,

        "IS NULL" | "ISNULL" | "IS NOT NULL" | "NOTNULL" | "IS TRUE" | "IS NOT TRUE"
        | "IS FALSE" | "IS NOT FALSE" | "IS UNKNOWN" | "IS NOT UNKNOWN" | "IS DISTINCT FROM"
        | "IS NOT DISTINCT FROM" => NullSafety::NeverNull,

        _ => NullSafety::Safe,
    }
}

pub fn function_null_safety(name: &str) -> NullSafety {
    let name = name.to_lowercase();
    match name.as_str() {
        // Comparison and inspection functions.
        "num_nonnulls" | "num_nulls" => NullSafety::NeverNull,

        // Session and clock functions.
        "pi" | "random" | "setseed" | "now" | "clock_timestamp" | "statement_timestamp"
        | "transaction_timestamp" | "timeofday" | "version" | "pg_client_encoding"
        | "current_database" => NullSafety::NeverNull,

        // String builders that treat NULL arguments as empty.
        "concat" | "concat_ws" | "quote_nullable" | "format" => NullSafety::NeverNull,

        // Range constructors.
        "daterange" | "int4range" | "int8range" | "numrange" | "tsrange" | "tstzrange" => {
            NullSafety::NeverNull
        }

        // count never returns NULL; every other aggregate does on empty input.
        "count" => NullSafety::NeverNull,
        "sum" | "avg" | "max" | "min" | "array_agg" | "string_agg" | "json_agg" | "jsonb_agg"
        | "json_object_agg" | "jsonb_object_agg" | "bool_and" | "bool_or" | "every" => {
            NullSafety::Unsafe
        }

        // Window functions over an empty frame.
        "row_number" | "rank" | "dense_rank" | "ntile" => NullSafety::NeverNull,
        "lead" | "lag" | "first_value" | "last_value" | "nth_value" => NullSafety::Unsafe,

        "nullif" => NullSafety::Unsafe,
        "json_extract_path" | "json_extract_path_text" | "jsonb_extract_path"
        | "jsonb_extract_path_text" => NullSafety::Unsafe,

        _ => NullSafety::Safe,
    }
}
