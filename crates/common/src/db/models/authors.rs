//! Normalization of the free-form authors column
//!
//! Stored values seen in the wild: null, a JSON array of names, a JSON
//! array of author objects, a JSON-encoded string holding either of those,
//! or plain text. Everything is folded into `Authors` here so read sites
//! never parse the column themselves.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Authors {
    Unstructured(String),
    List(Vec<AuthorRecord>),
}

impl Default for Authors {
    fn default() -> Self {
        Authors::List(Vec::new())
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}")
            .expect("email pattern is valid")
    })
}

impl Authors {
    /// Normalize a stored column value
    pub fn from_stored(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Authors::default(),
            Some(Value::String(text)) => Self::from_text(text),
            Some(Value::Array(items)) => Authors::List(
                items.iter().filter_map(record_from_value).collect(),
            ),
            Some(Value::Object(_)) => Authors::List(
                value.and_then(record_from_value).into_iter().collect(),
            ),
            Some(other) => Authors::Unstructured(other.to_string()),
        }
    }

    /// Normalize client-supplied text: JSON if it parses, plain text otherwise
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Authors::default();
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value @ (Value::Array(_) | Value::Object(_))) => Self::from_stored(Some(&value)),
            // A JSON string literal may itself hold encoded JSON
            Ok(Value::String(inner)) if inner.trim() != trimmed => Self::from_text(&inner),
            _ => Authors::Unstructured(trimmed.to_string()),
        }
    }

    /// Value written to the database column
    pub fn to_stored(&self) -> Option<Value> {
        match self {
            Authors::List(list) if list.is_empty() => None,
            Authors::List(list) => serde_json::to_value(list).ok(),
            Authors::Unstructured(text) => Some(Value::String(text.clone())),
        }
    }

    /// Every email address mentioned, lowercased and de-duplicated
    pub fn emails(&self) -> Vec<String> {
        let mut found: Vec<String> = match self {
            Authors::List(list) => list
                .iter()
                .filter_map(|a| a.email.as_deref())
                .map(|e| e.trim().to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            Authors::Unstructured(text) => email_pattern()
                .find_iter(text)
                .map(|m| m.as_str().to_ascii_lowercase())
                .collect(),
        };
        found.sort();
        found.dedup();
        found
    }

    /// Display names, in order
    #[cfg(test)]
    pub fn names(&self) -> Vec<String> {
        match self {
            Authors::List(list) => list.iter().map(|a| a.name.clone()).collect(),
            Authors::Unstructured(text) => vec![text.clone()],
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Authors::List(list) => list.is_empty(),
            Authors::Unstructured(text) => text.trim().is_empty(),
        }
    }
}

fn record_from_value(value: &Value) -> Option<AuthorRecord> {
    match value {
        Value::String(name) if !name.trim().is_empty() => Some(AuthorRecord {
            name: name.trim().to_string(),
            ..Default::default()
        }),
        Value::Object(map) => {
            let text = |key: &str| {
                map.get(key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };
            let email = text("email");
            let name = text("name")
                .or_else(|| text("full_name"))
                .or_else(|| email.clone())?;
            Some(AuthorRecord {
                name,
                email,
                affiliation: text("affiliation"),
            })
        }
        _ => None,
    }
}
