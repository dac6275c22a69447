use crate::error::{Result, TenantryError};
use crate::types::lookup_path;
use serde_json::{json, Map, Value};

/// Search filter understood by every [`crate::store::DocumentStore`].
///
/// Renders to (and parses from) the Koncorde JSON form used on the wire, e.g.
/// `{"and": [{"equals": {"type": "engine-asset"}}, {"equals": {"group": "g1"}}]}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    MatchAll,
    Equals { field: String, value: Value },
    NotEquals { field: String, value: Value },
    Exists(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

const MAX_FILTER_DEPTH: usize = 10;

impl Filter {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether `source` satisfies the filter. Fields are dotted paths.
    pub fn matches(&self, source: &Value) -> bool {
        match self {
            Filter::MatchAll => true,
            Filter::Equals { field, value } => lookup_path(source, field) == Some(value),
            Filter::NotEquals { field, value } => lookup_path(source, field) != Some(value),
            Filter::Exists(field) => {
                matches!(lookup_path(source, field), Some(v) if !v.is_null())
            }
            Filter::And(filters) => filters.iter().all(|f| f.matches(source)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(source)),
            Filter::Not(inner) => !inner.matches(source),
        }
    }

    pub fn to_koncorde(&self) -> Value {
        match self {
            Filter::MatchAll => json!({}),
            Filter::Equals { field, value } => json!({ "equals": { field.as_str(): value } }),
            Filter::NotEquals { field, value } => {
                json!({ "not": { "equals": { field.as_str(): value } } })
            }
            Filter::Exists(field) => json!({ "exists": field }),
            Filter::And(filters) => {
                json!({ "and": filters.iter().map(Filter::to_koncorde).collect::<Vec<_>>() })
            }
            Filter::Or(filters) => {
                json!({ "or": filters.iter().map(Filter::to_koncorde).collect::<Vec<_>>() })
            }
            Filter::Not(inner) => json!({ "not": inner.to_koncorde() }),
        }
    }

    pub fn from_koncorde(value: &Value) -> Result<Self> {
        Self::parse(value, 0)
    }

    fn parse(value: &Value, depth: usize) -> Result<Self> {
        if depth > MAX_FILTER_DEPTH {
            return Err(TenantryError::InvalidDocument(format!(
                "Filter nesting exceeds {} levels",
                MAX_FILTER_DEPTH
            )));
        }

        let obj = value.as_object().ok_or_else(|| {
            TenantryError::InvalidDocument("Filter must be a JSON object".to_string())
        })?;

        let Some((op, arg)) = obj.iter().next() else {
            return Ok(Filter::MatchAll);
        };
        if obj.len() != 1 {
            return Err(TenantryError::InvalidDocument(
                "Filter clause must have exactly one operator".to_string(),
            ));
        }

        match op.as_str() {
            "equals" => {
                let (field, value) = single_entry(arg, "equals")?;
                Ok(Filter::Equals { field, value })
            }
            "exists" => {
                let field = arg
                    .as_str()
                    .or_else(|| arg.get("field").and_then(Value::as_str))
                    .ok_or_else(|| {
                        TenantryError::InvalidDocument(
                            "\"exists\" expects a field name".to_string(),
                        )
                    })?;
                Ok(Filter::Exists(field.to_string()))
            }
            "and" | "or" => {
                let items = arg.as_array().ok_or_else(|| {
                    TenantryError::InvalidDocument(format!("\"{}\" expects an array", op))
                })?;
                let filters = items
                    .iter()
                    .map(|item| Self::parse(item, depth + 1))
                    .collect::<Result<Vec<_>>>()?;
                Ok(if op == "and" {
                    Filter::And(filters)
                } else {
                    Filter::Or(filters)
                })
            }
            "not" => {
                let inner = Self::parse(arg, depth + 1)?;
                Ok(match inner {
                    Filter::Equals { field, value } => Filter::NotEquals { field, value },
                    other => Filter::Not(Box::new(other)),
                })
            }
            other => Err(TenantryError::InvalidDocument(format!(
                "Unknown filter operator: {}",
                other
            ))),
        }
    }
}

fn single_entry(arg: &Value, op: &str) -> Result<(String, Value)> {
    let map: &Map<String, Value> = arg.as_object().ok_or_else(|| {
        TenantryError::InvalidDocument(format!("\"{}\" expects an object", op))
    })?;
    let mut entries = map.iter();
    match (entries.next(), entries.next()) {
        (Some((field, value)), None) => Ok((field.clone(), value.clone())),
        _ => Err(TenantryError::InvalidDocument(format!(
            "\"{}\" expects exactly one field",
            op
        ))),
    }
}
