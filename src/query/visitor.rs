//! Issue-search semantics over the raw clause stream.
//!
//! The parser recognizes clause shapes; this visitor decides what each clause
//! means for issue search: alias normalization, the `is:` pseudo-key, numeric
//! and date keys, and the rejection of boolean combinators.

use super::error::QueryError;
use super::filter::{AggregateFilter, Operator, QueryClause, SearchFilter, SearchKey, SearchValue};
use super::parser::{self, RawClause, RawValue, Token};
use crate::context::GroupStatus;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

/// Canonical key to the surface spellings it also accepts.
const KEY_ALIASES: &[(&str, &[&str])] = &[
    ("assigned_to", &["assigned"]),
    ("bookmarked_by", &["bookmarks"]),
    ("subscribed_by", &["subscribed"]),
    ("first_release", &["first-release", "firstRelease"]),
    ("first_seen", &["age", "firstSeen"]),
    ("last_seen", &["lastSeen"]),
    ("active_at", &["activeSince"]),
    ("date", &["event.timestamp"]),
    ("times_seen", &["timesSeen"]),
];

/// Keys every search treats as numeric, before issue-specific additions.
const BASE_NUMERIC_KEYS: &[&str] = &["project_id", "project.id", "issue.id"];
const ISSUE_NUMERIC_KEYS: &[&str] = &["times_seen"];

/// Keys every search treats as dates, before issue-specific additions.
const BASE_DATE_KEYS: &[&str] = &["start", "end", "first_seen", "last_seen", "timestamp"];
const ISSUE_DATE_KEYS: &[&str] = &["active_at", "date"];

static ALIAS_LOOKUP: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut lookup = HashMap::new();
    for (canonical, aliases) in KEY_ALIASES {
        for alias in *aliases {
            lookup.insert(*alias, *canonical);
        }
    }
    lookup
});

static NUMERIC_KEYS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    BASE_NUMERIC_KEYS
        .iter()
        .chain(ISSUE_NUMERIC_KEYS)
        .copied()
        .collect()
});

static DATE_KEYS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    BASE_DATE_KEYS
        .iter()
        .chain(ISSUE_DATE_KEYS)
        .copied()
        .collect()
});

/// Translation table for `is:<value>` clauses. A BTreeMap keeps the allowed
/// set sorted for error messages.
static IS_TRANSLATIONS: LazyLock<BTreeMap<&'static str, (&'static str, SearchValue)>> =
    LazyLock::new(|| {
        let mut translations = BTreeMap::new();
        translations.insert("assigned", ("unassigned", SearchValue::Bool(false)));
        translations.insert("unassigned", ("unassigned", SearchValue::Bool(true)));
        translations.insert("for_review", ("for_review", SearchValue::Bool(true)));
        translations.insert("linked", ("linked", SearchValue::Bool(true)));
        translations.insert("unlinked", ("linked", SearchValue::Bool(false)));
        for (label, status) in GroupStatus::query_choices() {
            translations.insert(*label, ("status", SearchValue::Number(*status as i64)));
        }
        translations
    });

static NUMERIC_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(-?\d+(?:\.\d+)?)([kKmMbB]?)$").expect("valid numeric regex"));
static RELATIVE_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([+-])(\d+)([smhdw])$").expect("valid relative date regex"));

/// Parse one issue-search query string into an ordered clause sequence.
///
/// Deterministic: the same query always yields the same sequence, in clause
/// order. Boolean combinators fail with [`QueryError::UnsupportedOperator`];
/// issue search supports only the implicit conjunction of clauses.
pub fn parse_issue_query(query: &str) -> Result<Vec<QueryClause>, QueryError> {
    let tokens = parser::parse_tokens(query)?;
    let mut clauses = Vec::with_capacity(tokens.len());

    for token in tokens {
        match token {
            Token::Boolean { .. } => return Err(QueryError::UnsupportedOperator),
            Token::FreeText { text, .. } => clauses.push(QueryClause::Filter(SearchFilter::new(
                "message",
                Operator::Eq,
                SearchValue::Text(text),
            ))),
            Token::Clause(raw) => clauses.push(visit_clause(raw)?),
        }
    }

    Ok(clauses)
}

/// Resolve a surface key spelling to its canonical name.
pub fn canonical_key(surface: &str) -> &str {
    ALIAS_LOOKUP.get(surface).copied().unwrap_or(surface)
}

fn visit_clause(raw: RawClause) -> Result<QueryClause, QueryError> {
    if raw.aggregate {
        return visit_aggregate(raw);
    }

    let key = canonical_key(&raw.key).to_string();
    if key == "is" {
        return visit_is_filter(&raw);
    }
    if NUMERIC_KEYS.contains(key.as_str()) {
        return visit_numeric(&key, &raw);
    }
    if DATE_KEYS.contains(key.as_str()) {
        return visit_date(&key, &raw);
    }

    let filter = match raw.value {
        RawValue::List(items) => SearchFilter::new(
            key,
            membership_operator(raw.negated),
            SearchValue::TextList(items),
        ),
        RawValue::Text { text, .. } => {
            if raw.range.is_some() {
                return Err(QueryError::RangeOnStringKey(key));
            }
            SearchFilter::new(key, equality_operator(raw.negated), SearchValue::Text(text))
        }
    };
    Ok(QueryClause::Filter(filter))
}

fn visit_aggregate(raw: RawClause) -> Result<QueryClause, QueryError> {
    let value = match raw.value {
        RawValue::Text { text, .. } => SearchValue::Text(text),
        RawValue::List(items) => SearchValue::TextList(items),
    };
    Ok(QueryClause::Aggregate(AggregateFilter {
        key: SearchKey::new(raw.key),
        operator: raw.range.unwrap_or(equality_operator(raw.negated)),
        value,
    }))
}

fn visit_is_filter(raw: &RawClause) -> Result<QueryClause, QueryError> {
    let label = match &raw.value {
        RawValue::List(_) => return Err(QueryError::IsListSyntax),
        RawValue::Text { text, .. } => text.as_str(),
    };

    let Some((key, value)) = IS_TRANSLATIONS.get(label) else {
        return Err(QueryError::InvalidIsValue {
            allowed: IS_TRANSLATIONS.keys().copied().collect(),
        });
    };

    Ok(QueryClause::Filter(SearchFilter::new(
        *key,
        equality_operator(raw.negated),
        value.clone(),
    )))
}

fn visit_numeric(key: &str, raw: &RawClause) -> Result<QueryClause, QueryError> {
    let RawValue::Text { text, .. } = &raw.value else {
        return Err(QueryError::InvalidNumber(raw.value_display()));
    };
    let number = parse_numeric(text).ok_or_else(|| QueryError::InvalidNumber(text.clone()))?;
    Ok(QueryClause::Filter(SearchFilter::new(
        key,
        raw.range.unwrap_or(equality_operator(raw.negated)),
        SearchValue::Number(number),
    )))
}

fn visit_date(key: &str, raw: &RawClause) -> Result<QueryClause, QueryError> {
    let RawValue::Text { text, .. } = &raw.value else {
        return Err(QueryError::InvalidDate(raw.value_display()));
    };

    if let Some(captures) = RELATIVE_DATE_RE.captures(text) {
        if raw.range.is_some() {
            return Err(QueryError::InvalidDate(text.clone()));
        }
        let amount: i64 = captures[2]
            .parse()
            .map_err(|_| QueryError::InvalidDate(text.clone()))?;
        let duration = match &captures[3] {
            "s" => Duration::seconds(amount),
            "m" => Duration::minutes(amount),
            "h" => Duration::hours(amount),
            "d" => Duration::days(amount),
            "w" => Duration::weeks(amount),
            _ => return Err(QueryError::InvalidDate(text.clone())),
        };
        // `-24h` means "within the last 24 hours", `+24h` "older than that".
        let operator = if &captures[1] == "-" {
            Operator::Gte
        } else {
            Operator::Lte
        };
        return Ok(QueryClause::Filter(SearchFilter::new(
            key,
            operator,
            SearchValue::Date(Utc::now() - duration),
        )));
    }

    let datetime = parse_datetime(text).ok_or_else(|| QueryError::InvalidDate(text.clone()))?;
    Ok(QueryClause::Filter(SearchFilter::new(
        key,
        raw.range.unwrap_or(equality_operator(raw.negated)),
        SearchValue::Date(datetime),
    )))
}

fn parse_numeric(text: &str) -> Option<i64> {
    let captures = NUMERIC_VALUE_RE.captures(text)?;
    let base: f64 = captures[1].parse().ok()?;
    let multiplier = match captures[2].to_ascii_lowercase().as_str() {
        "k" => 1_000.0,
        "m" => 1_000_000.0,
        "b" => 1_000_000_000.0,
        _ => 1.0,
    };
    Some((base * multiplier) as i64)
}

fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

fn equality_operator(negated: bool) -> Operator {
    if negated { Operator::NotEq } else { Operator::Eq }
}

fn membership_operator(negated: bool) -> Operator {
    if negated { Operator::NotIn } else { Operator::In }
}

impl RawClause {
    fn value_display(&self) -> String {
        match &self.value {
            RawValue::Text { text, .. } => text.clone(),
            RawValue::List(items) => format!("[{}]", items.join(", ")),
        }
    }
}
