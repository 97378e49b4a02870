//! Per-user key/value variables.
//!
//! A variable stores one typed value under a key that is unique per user.
//! Values arrive as arbitrary JSON and are normalised against the declared
//! [`VariableType`] before they reach a repository; numbers, booleans, and
//! strings are kept as text, JSON documents in their own column.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Error, UserId};

/// Longest accepted variable key, in characters.
pub const MAX_VARIABLE_KEY_LEN: usize = 255;

/// Declared type of a variable's value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    #[default]
    String,
    Number,
    Boolean,
    Json,
}

impl VariableType {
    /// Stored string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Json => "json",
        }
    }

    /// Parse a client-supplied type; `None` means `string`.
    ///
    /// # Examples
    /// ```
    /// use forge_backend::domain::VariableType;
    ///
    /// assert_eq!(VariableType::parse(None).ok(), Some(VariableType::String));
    /// assert_eq!(VariableType::parse(Some("json")).ok(), Some(VariableType::Json));
    /// assert!(VariableType::parse(Some("date")).is_err());
    /// ```
    pub fn parse(raw: Option<&str>) -> Result<Self, Error> {
        match raw {
            None => Ok(Self::String),
            Some(value) => Self::from_name(value).ok_or_else(|| {
                Error::invalid_request("Invalid type").with_details(json!({
                    "field": "type",
                    "value": value,
                    "allowed": ["string", "number", "boolean", "json"],
                }))
            }),
        }
    }

    /// Read a stored type, treating anything unknown as `string`.
    pub fn from_stored(raw: &str) -> Self {
        Self::from_name(raw).unwrap_or_default()
    }

    fn from_name(raw: &str) -> Option<Self> {
        match raw {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Validated variable key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VariableKey(String);

impl VariableKey {
    /// Accept a non-blank key of at most [`MAX_VARIABLE_KEY_LEN`] characters.
    pub fn new(raw: &str) -> Result<Self, Error> {
        if raw.trim().is_empty() {
            return Err(Error::invalid_request("Key is required")
                .with_details(json!({ "field": "key", "code": "empty" })));
        }
        if raw.chars().count() > MAX_VARIABLE_KEY_LEN {
            return Err(Error::invalid_request("Invalid key").with_details(json!({
                "field": "key",
                "code": "too_long",
                "max": MAX_VARIABLE_KEY_LEN,
            })));
        }
        Ok(Self(raw.to_owned()))
    }

    /// Key as stored.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VariableKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalised variable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableValue {
    Text(String),
    Number(serde_json::Number),
    Boolean(bool),
    Json(Value),
}

impl VariableValue {
    /// Normalise `raw` against `kind`.
    ///
    /// Strings are accepted for every type and parsed where needed; any
    /// other JSON value becomes its compact text for `string`.
    ///
    /// # Examples
    /// ```
    /// use forge_backend::domain::{VariableType, VariableValue};
    /// use serde_json::json;
    ///
    /// let value = VariableValue::parse(VariableType::Number, &json!("42")).expect("number");
    /// assert_eq!(value.to_json(), json!(42));
    /// assert!(VariableValue::parse(VariableType::Boolean, &json!("maybe")).is_err());
    /// ```
    pub fn parse(kind: VariableType, raw: &Value) -> Result<Self, Error> {
        let parsed = match (kind, raw) {
            (VariableType::String, Value::String(text)) => Some(Self::Text(text.clone())),
            (VariableType::String, other) => Some(Self::Text(other.to_string())),
            (VariableType::Number, Value::Number(number)) => Some(Self::Number(number.clone())),
            (VariableType::Number, Value::String(text)) => {
                text.trim().parse().ok().map(Self::Number)
            }
            (VariableType::Boolean, Value::Bool(flag)) => Some(Self::Boolean(*flag)),
            (VariableType::Boolean, Value::String(text)) => match text.as_str() {
                "true" => Some(Self::Boolean(true)),
                "false" => Some(Self::Boolean(false)),
                _ => None,
            },
            (VariableType::Json, Value::String(text)) => {
                serde_json::from_str(text).ok().map(Self::Json)
            }
            (VariableType::Json, other) => Some(Self::Json(other.clone())),
            _ => None,
        };
        parsed.ok_or_else(|| {
            Error::invalid_request("Invalid value").with_details(json!({
                "field": "value",
                "type": kind.as_str(),
            }))
        })
    }

    /// Declared type of this value.
    pub const fn kind(&self) -> VariableType {
        match self {
            Self::Text(_) => VariableType::String,
            Self::Number(_) => VariableType::Number,
            Self::Boolean(_) => VariableType::Boolean,
            Self::Json(_) => VariableType::Json,
        }
    }

    /// Typed JSON form returned to clients.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Number(number) => Value::Number(number.clone()),
            Self::Boolean(flag) => Value::Bool(*flag),
            Self::Json(value) => value.clone(),
        }
    }

    /// Split into the `(value, json_value)` storage columns.
    pub fn to_columns(&self) -> (Option<String>, Option<Value>) {
        match self {
            Self::Text(text) => (Some(text.clone()), None),
            Self::Number(number) => (Some(number.to_string()), None),
            Self::Boolean(flag) => (Some(flag.to_string()), None),
            Self::Json(value) => (None, Some(value.clone())),
        }
    }

    /// Rebuild from storage columns.
    ///
    /// A JSON column wins over the text column. Text that no longer parses
    /// as its declared type is returned as plain text.
    pub fn from_columns(kind: VariableType, text: Option<String>, json: Option<Value>) -> Self {
        if let Some(value) = json {
            return Self::Json(value);
        }
        let text = text.unwrap_or_default();
        match kind {
            VariableType::String => Self::Text(text),
            VariableType::Number => match text.trim().parse() {
                Ok(number) => Self::Number(number),
                Err(_) => Self::Text(text),
            },
            VariableType::Boolean => Self::Boolean(text == "true"),
            VariableType::Json => match serde_json::from_str(&text) {
                Ok(value) => Self::Json(value),
                Err(_) if text.is_empty() => Self::Json(json!({})),
                Err(_) => Self::Text(text),
            },
        }
    }
}

/// A stored variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserVariable {
    pub id: Uuid,
    pub user_id: UserId,
    pub key: VariableKey,
    pub value: VariableValue,
    pub description: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserVariable {
    /// Apply `write` over `existing`, or create a new variable.
    ///
    /// Omitted descriptions and visibility keep their stored values; a new
    /// variable is private.
    pub fn merge(
        user_id: &UserId,
        existing: Option<Self>,
        write: VariableWrite,
        now: DateTime<Utc>,
    ) -> Self {
        match existing {
            Some(current) => Self {
                value: write.value,
                description: write.description.or(current.description),
                is_public: write.is_public.unwrap_or(current.is_public),
                updated_at: now,
                ..current
            },
            None => Self {
                id: Uuid::new_v4(),
                user_id: user_id.clone(),
                key: write.key,
                value: write.value,
                description: write.description,
                is_public: write.is_public.unwrap_or(false),
                created_at: now,
                updated_at: now,
            },
        }
    }
}

/// A validated create-or-replace request for one variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableWrite {
    pub key: VariableKey,
    pub value: VariableValue,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

/// Raw client fields for one variable write.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariableFields<'a> {
    pub value: Option<&'a Value>,
    pub kind: Option<&'a str>,
    pub description: Option<&'a str>,
    pub is_public: Option<bool>,
}

impl VariableWrite {
    /// Validate a write for `key`. A missing or `null` value is rejected
    /// with `missing_value`.
    pub fn parse(
        key: &str,
        fields: VariableFields<'_>,
        missing_value: &str,
    ) -> Result<Self, Error> {
        let raw = fields.value.filter(|value| !value.is_null()).ok_or_else(|| {
            Error::invalid_request(missing_value)
                .with_details(json!({ "field": "value", "code": "missing" }))
        })?;
        let key = VariableKey::new(key)?;
        let kind = VariableType::parse(fields.kind)?;
        Ok(Self {
            key,
            value: VariableValue::parse(kind, raw)?,
            description: fields.description.map(str::to_owned),
            is_public: fields.is_public,
        })
    }
}

/// Wire form of a variable.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VariableView {
    pub id: Uuid,
    pub key: String,
    /// Value converted to its declared type.
    #[schema(value_type = Object)]
    pub value: Value,
    /// The stored document for `json` variables.
    #[schema(value_type = Option<Object>)]
    pub json_value: Option<Value>,
    #[serde(rename = "type")]
    pub variable_type: VariableType,
    pub description: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&UserVariable> for VariableView {
    fn from(variable: &UserVariable) -> Self {
        let (_, json_value) = variable.value.to_columns();
        Self {
            id: variable.id,
            key: variable.key.as_str().to_owned(),
            value: variable.value.to_json(),
            json_value,
            variable_type: variable.value.kind(),
            description: variable.description.clone(),
            is_public: variable.is_public,
            created_at: variable.created_at,
            updated_at: variable.updated_at,
        }
    }
}
