//! ActivityStreams objects accepted and produced by the inbox.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Activity types understood by the inbox
///
/// Parsing is total: anything that isn't one of the known types becomes
/// `Unrecognized` and keeps the original text for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityType {
    Follow,
    Like,
    Announce,
    Dislike,
    Undo,
    Unrecognized(String),
}

impl ActivityType {
    /// Parse activity type from string, ignoring ASCII case
    pub fn parse(raw: &str) -> Self {
        const KNOWN: [(&str, ActivityType); 5] = [
            ("Follow", ActivityType::Follow),
            ("Like", ActivityType::Like),
            ("Announce", ActivityType::Announce),
            ("Dislike", ActivityType::Dislike),
            ("Undo", ActivityType::Undo),
        ];

        let raw = raw.trim();
        KNOWN
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(raw))
            .map(|(_, kind)| kind)
            .unwrap_or_else(|| Self::Unrecognized(raw.to_string()))
    }

    /// Canonical ActivityStreams name, or the raw text when unrecognized
    pub fn as_str(&self) -> &str {
        match self {
            Self::Follow => "Follow",
            Self::Like => "Like",
            Self::Announce => "Announce",
            Self::Dislike => "Dislike",
            Self::Undo => "Undo",
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound activity
///
/// Only `type`, `actor` and `object` are inspected; every other property is
/// carried along untouched in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// `type` may be a single value or an array; only the first entry counts
    /// and the rest are kept as they came
    #[serde(
        rename = "type",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub types: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Activity {
    /// First `type` token when it is a non-blank string
    pub fn first_type(&self) -> Option<&str> {
        self.types
            .first()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Actor id, given either inline as a string or as an object with `id`
    pub fn actor_id(&self) -> Option<&str> {
        reference_id(self.actor.as_ref()?)
    }

    /// Type of the embedded object, e.g. the `Follow` inside an `Undo`
    pub fn object_type(&self) -> Option<ActivityType> {
        let kind = match self.object.as_ref()?.get("type")? {
            Value::String(kind) => kind.as_str(),
            Value::Array(kinds) => kinds.first()?.as_str()?,
            _ => return None,
        };

        let kind = kind.trim();
        (!kind.is_empty()).then(|| ActivityType::parse(kind))
    }
}

fn reference_id(value: &Value) -> Option<&str> {
    value
        .as_str()
        .or_else(|| value.get("id").and_then(Value::as_str))
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(many) => many,
        one => vec![one],
    })
}

/// The activities collection a site exposes back to the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedCollection {
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub items: Vec<Value>,
}

impl OrderedCollection {
    /// A collection with no items
    pub fn empty() -> Self {
        Self {
            types: vec!["OrderedCollection".to_string()],
            items: Vec::new(),
        }
    }
}
