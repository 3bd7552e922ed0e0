//! The entity search query language: equality plus a small operator set,
//! conjoined with AND, evaluated against either projection of an
//! `EntityPair`.

use datacollect_model::EntityPair;
use regex::RegexBuilder;
use serde_json::Value;

use crate::error::{StorageError, StorageResult};

/// One of the operators a search criterion may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Regex,
}

impl Op {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "$eq" => Some(Op::Eq),
            "$gt" => Some(Op::Gt),
            "$gte" => Some(Op::Gte),
            "$lt" => Some(Op::Lt),
            "$lte" => Some(Op::Lte),
            "$regex" => Some(Op::Regex),
            _ => None,
        }
    }
}

/// A single `{dotted.path: constraint}` criterion. `constraints` normally
/// holds one `(op, value)` pair; it holds two only for a `$gte`+`$lte`
/// range co-targeting the same field.
#[derive(Debug, Clone)]
pub struct Criterion {
    pub path: String,
    pub constraints: Vec<(Op, Value)>,
}

impl Criterion {
    fn satisfied_by(&self, root: &Value) -> bool {
        let Some(actual) = get_path(root, &self.path) else { return false };
        self.constraints.iter().all(|(op, expected)| match_one(*op, actual, expected))
    }
}

/// A fully parsed search query: every criterion must be satisfied (by
/// either projection) for an entity to match.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery(pub Vec<Criterion>);

impl SearchQuery {
    /// Parses a sequence of single-key criteria objects, as received over
    /// the wire.
    pub fn parse(criteria: &[Value]) -> StorageResult<Self> {
        let mut parsed = Vec::with_capacity(criteria.len());
        for obj in criteria {
            let Value::Object(map) = obj else {
                return Err(StorageError::InvalidSearchCriteria("criterion must be a single-key object".into()));
            };
            if map.len() != 1 {
                return Err(StorageError::InvalidSearchCriteria("criterion must have exactly one key".into()));
            }
            let (path, value) = map.iter().next().unwrap();
            parsed.push(parse_criterion(path.clone(), value)?);
        }
        Ok(Self(parsed))
    }

    /// True iff every criterion is satisfied on the `initial` projection,
    /// the `modified` projection, or both.
    #[must_use]
    pub fn matches(&self, pair: &EntityPair) -> bool {
        let initial = serde_json::to_value(&pair.initial).unwrap_or(Value::Null);
        let modified = serde_json::to_value(&pair.modified).unwrap_or(Value::Null);
        self.0.iter().all(|c| c.satisfied_by(&initial) || c.satisfied_by(&modified))
    }
}

fn parse_criterion(path: String, value: &Value) -> StorageResult<Criterion> {
    match value {
        Value::Object(ops) if ops.keys().all(|k| k.starts_with('$')) => {
            let mut constraints = Vec::new();
            for (k, v) in ops {
                let op = Op::from_key(k).ok_or_else(|| StorageError::InvalidSearchCriteria(format!("unknown operator {k}")))?;
                constraints.push((op, v.clone()));
            }
            let is_range = constraints.len() == 2
                && constraints.iter().any(|(op, _)| matches!(op, Op::Gte | Op::Gt))
                && constraints.iter().any(|(op, _)| matches!(op, Op::Lte | Op::Lt));
            if constraints.len() > 1 && !is_range {
                return Err(StorageError::InvalidSearchCriteria(format!(
                    "multiple operators on {path} must form a range (one lower, one upper bound)"
                )));
            }
            Ok(Criterion { path, constraints })
        }
        _ => Ok(Criterion { path, constraints: vec![(Op::Eq, value.clone())] }),
    }
}

fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn match_one(op: Op, actual: &Value, expected: &Value) -> bool {
    match op {
        Op::Eq => eq_case_insensitive(actual, expected),
        Op::Gt => compare(actual, expected) == Some(std::cmp::Ordering::Greater),
        Op::Gte => matches!(compare(actual, expected), Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)),
        Op::Lt => compare(actual, expected) == Some(std::cmp::Ordering::Less),
        Op::Lte => matches!(compare(actual, expected), Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)),
        Op::Regex => match (actual.as_str(), expected.as_str()) {
            (Some(a), Some(pattern)) => RegexBuilder::new(pattern).case_insensitive(true).build().map(|re| re.is_match(a)).unwrap_or(false),
            _ => false,
        },
    }
}

fn eq_case_insensitive(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.trim().eq_ignore_ascii_case(y.trim()),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
        return Some(x.cmp(y));
    }
    None
}
