use std::error::Error;

use regex::Regex;

/// A query rewritten to positional `$n` placeholders, with the original
/// parameter names in index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParametrizedQuery {
    pub sql: String,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Plain(&'a str),
    Quoted(&'a str),
}

/// Split a query into plain and quoted segments so placeholder rewriting
/// never touches string literals or quoted identifiers. SQL escapes quotes
/// by doubling them, which this split handles for free: the doubled quote
/// closes one segment and opens the next.
fn split_quoted(query: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut open: Option<char> = None;
    let mut start = 0;
    for (idx, character) in query.char_indices() {
        match open {
            None if character == '\'' || character == '"' => {
                if idx > start {
                    segments.push(Segment::Plain(&query[start..idx]));
                }
                open = Some(character);
                start = idx;
            }
            Some(quote) if character == quote => {
                segments.push(Segment::Quoted(&query[start..=idx]));
                open = None;
                start = idx + 1;
            }
            _ => {}
        }
    }
    if start < query.len() {
        match open {
            None => segments.push(Segment::Plain(&query[start..])),
            Some(_) => segments.push(Segment::Quoted(&query[start..])),
        }
    }
    segments
}

/// Rewrite `:name` placeholders to `$n`, reusing the index for repeated
/// names. `::` casts are left alone. Already-positional queries pass through
/// unchanged with an empty name list.
pub fn to_positional(query: &str) -> Result<ParametrizedQuery, Box<dyn Error>> {
    let placeholder = Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)")?;
    let mut params: Vec<String> = Vec::new();
    let mut sql = String::with_capacity(query.len());

    for segment in split_quoted(query) {
        let text = match segment {
            Segment::Quoted(text) => {
                sql.push_str(text);
                continue;
            }
            Segment::Plain(text) => text,
        };
        let mut head = 0;
        for capture in placeholder.captures_iter(text) {
            let matched = match capture.get(0) {
                Some(matched) => matched,
                None => continue,
            };
            // A second colon right before the match means a `::type` cast.
            if text[..matched.start()].ends_with(':') {
                continue;
            }
            let name = &matched.as_str()[1..];
            let index = match params.iter().position(|param| param == name) {
                Some(index) => index + 1,
                None => {
                    params.push(name.to_string());
                    params.len()
                }
            };
            sql.push_str(&text[head..matched.start()]);
            sql.push_str(&format!("${index}"));
            head = matched.end();
        }
        sql.push_str(&text[head..]);
    }

    Ok(ParametrizedQuery { sql, params })
}
