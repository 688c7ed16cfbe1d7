//! Tokenizer and clause parser for the search grammar.
//!
//! This layer only recognizes the shape of each clause: `key:value`, quoted
//! values, the `!` negation prefix, range operators on the value, `[a, b]`
//! lists, aggregate keys like `count()`, bare text terms, and the boolean
//! combinators `AND`/`OR`. What each clause means is decided by the visitor
//! in [`super::visitor`].

use super::error::QueryError;
use super::filter::Operator;
use regex::Regex;
use std::sync::LazyLock;

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_][a-zA-Z0-9_.-]*$").expect("valid key regex"));
static AGGREGATE_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_.]*\([a-zA-Z0-9_.,\x20]*\)$").expect("valid aggregate regex")
});

/// One recognized term of the query, positioned by its 1-based start column.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Clause(RawClause),
    FreeText { text: String, column: usize },
    Boolean { op: String, column: usize },
}

/// A `key:value` clause before any semantic interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawClause {
    pub negated: bool,
    pub key: String,
    pub aggregate: bool,
    /// Range operator taken from the value prefix (`>`, `>=`, `<`, `<=`).
    pub range: Option<Operator>,
    pub value: RawValue,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text { text: String, quoted: bool },
    List(Vec<String>),
}

/// Split the query into tokens and classify each one.
pub fn parse_tokens(query: &str) -> Result<Vec<Token>, QueryError> {
    split_terms(query)?
        .into_iter()
        .map(|(text, column)| classify(text, column))
        .collect()
}

/// Split on whitespace while keeping quoted segments and bracketed lists
/// together. Unmatched quotes and brackets are syntax errors reported with
/// the offending column.
fn split_terms(query: &str) -> Result<Vec<(String, usize)>, QueryError> {
    let mut terms: Vec<(String, usize)> = Vec::new();
    let mut current = String::new();
    let mut start = 0usize;
    let mut in_quotes = false;
    let mut quote_col = 0usize;
    let mut bracket_depth = 0usize;
    let mut bracket_col = 0usize;

    for (i, ch) in query.chars().enumerate() {
        let col = i + 1;
        if in_quotes {
            current.push(ch);
            if ch == '"' {
                in_quotes = false;
            }
            continue;
        }
        match ch {
            '"' => {
                if current.is_empty() {
                    start = col;
                }
                in_quotes = true;
                quote_col = col;
                current.push(ch);
            }
            '[' if current.ends_with(':') || bracket_depth > 0 => {
                bracket_depth += 1;
                if bracket_depth == 1 {
                    bracket_col = col;
                }
                current.push(ch);
            }
            ']' if bracket_depth > 0 => {
                bracket_depth -= 1;
                current.push(ch);
            }
            c if c.is_whitespace() && bracket_depth == 0 => {
                if !current.is_empty() {
                    terms.push((std::mem::take(&mut current), start));
                }
            }
            _ => {
                if current.is_empty() {
                    start = col;
                }
                current.push(ch);
            }
        }
    }

    if in_quotes {
        return Err(QueryError::Syntax {
            token: tail_from(query, quote_col),
            column: quote_col,
        });
    }
    if bracket_depth > 0 {
        return Err(QueryError::Syntax {
            token: tail_from(query, bracket_col),
            column: bracket_col,
        });
    }
    if !current.is_empty() {
        terms.push((current, start));
    }

    Ok(terms)
}

fn tail_from(query: &str, column: usize) -> String {
    query.chars().skip(column.saturating_sub(1)).collect()
}

fn classify(token: String, column: usize) -> Result<Token, QueryError> {
    if token == "AND" || token == "OR" {
        return Ok(Token::Boolean { op: token, column });
    }

    let (negated, body) = match token.strip_prefix('!') {
        Some(rest) if rest.contains(':') => (true, rest),
        _ => (false, token.as_str()),
    };

    let split = split_key_value(body);
    let Some((key, raw_value, aggregate)) = split else {
        return Ok(Token::FreeText {
            text: strip_quotes(&token).0,
            column,
        });
    };

    if raw_value.is_empty() {
        return Err(QueryError::EmptyValue(key.to_string()));
    }

    let (range, value) = parse_raw_value(key, raw_value)?;
    if negated && range.is_some() {
        return Err(QueryError::NegatedRange);
    }

    Ok(Token::Clause(RawClause {
        negated,
        key: key.to_string(),
        aggregate,
        range,
        value,
        column,
    }))
}

/// Split a term into key and value, recognizing aggregate keys whose
/// parentheses precede the separating colon. Returns `None` when the term is
/// not a clause at all.
fn split_key_value(body: &str) -> Option<(&str, &str, bool)> {
    if let Some(close) = body.find(')')
        && body[close + 1..].starts_with(':')
    {
        let key = &body[..=close];
        if AGGREGATE_KEY_RE.is_match(key) {
            return Some((key, &body[close + 2..], true));
        }
    }

    let (key, value) = body.split_once(':')?;
    KEY_RE.is_match(key).then_some((key, value, false))
}

fn parse_raw_value(key: &str, raw: &str) -> Result<(Option<Operator>, RawValue), QueryError> {
    if let Some(interior) = raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        let items: Vec<String> = interior
            .split(',')
            .map(|item| strip_quotes(item.trim()).0)
            .filter(|item| !item.is_empty())
            .collect();
        if items.is_empty() {
            return Err(QueryError::EmptyValue(key.to_string()));
        }
        return Ok((None, RawValue::List(items)));
    }

    let (range, rest) = match raw {
        r if r.starts_with(">=") => (Some(Operator::Gte), &r[2..]),
        r if r.starts_with("<=") => (Some(Operator::Lte), &r[2..]),
        r if r.starts_with('>') => (Some(Operator::Gt), &r[1..]),
        r if r.starts_with('<') => (Some(Operator::Lt), &r[1..]),
        r => (None, r),
    };

    let (text, quoted) = strip_quotes(rest);
    if text.is_empty() && !quoted {
        return Err(QueryError::EmptyValue(key.to_string()));
    }

    Ok((range, RawValue::Text { text, quoted }))
}

fn strip_quotes(raw: &str) -> (String, bool) {
    if raw.len() >= 2
        && let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"'))
    {
        (inner.to_string(), true)
    } else {
        (raw.to_string(), false)
    }
}
