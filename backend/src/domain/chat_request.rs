//! Persisted record of one prompt/response exchange with the AI provider.
//!
//! A record is created `pending` before the provider is called and moves to
//! `completed` or `failed` once the outcome is known. Terminal records never
//! change again.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use utoipa::ToSchema;

use crate::domain::UserId;

/// Model identifier recorded when the caller does not name one.
pub const DEFAULT_MODEL: &str = "openai/gpt-oss-20b";

/// Longest client-supplied session tag that can be stored.
pub const MAX_SESSION_TAG_LEN: usize = 64;
/// Longest model identifier that can be stored.
pub const MAX_MODEL_LEN: usize = 128;
/// Longest client address that can be stored.
pub const MAX_IP_ADDRESS_LEN: usize = 64;

/// Identifier of a chat request row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String)]
pub struct ChatRequestId(Uuid);

impl ChatRequestId {
    /// Generate a fresh identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ChatRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Lifecycle state of a chat request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChatRequestStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl ChatRequestStatus {
    /// Storage and wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse a stored status.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether the request has reached a final state.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Caller metadata captured with each request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Client-visible grouping tag in the form `session_<millis>_<suffix>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String)]
pub struct SessionTag(String);

impl SessionTag {
    const SUFFIX_LEN: usize = 9;
    const ALPHABET: &'static [u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    /// Generate a tag for a request started at `now`.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..Self::SUFFIX_LEN)
            .filter_map(|_| {
                Self::ALPHABET
                    .get(rng.gen_range(0..Self::ALPHABET.len()))
                    .map(|byte| char::from(*byte))
            })
            .collect();
        Self(format!("session_{}_{suffix}", now.timestamp_millis()))
    }

    /// Use a caller-supplied tag verbatim.
    pub fn from_client(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl AsRef<str> for SessionTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Cost and performance numbers recorded when a request finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetrics {
    pub tokens_used: Option<u32>,
    /// Cost in cents.
    pub cost_cents: Option<u32>,
    pub duration_ms: Option<u32>,
}

impl RequestMetrics {
    /// Estimate usage from text lengths when the provider reports none.
    ///
    /// Tokens are approximated as one per four characters of prompt and
    /// response; cost is one cent per thousand tokens, rounded down.
    ///
    /// # Examples
    /// ```
    /// use std::time::Duration;
    /// use forge_backend::domain::RequestMetrics;
    ///
    /// let metrics = RequestMetrics::estimate("abcd", "abcdefgh", Duration::from_millis(1500));
    /// assert_eq!(metrics.tokens_used, Some(3));
    /// assert_eq!(metrics.duration_ms, Some(1500));
    /// ```
    pub fn estimate(prompt: &str, response: &str, elapsed: Duration) -> Self {
        let tokens = approx_tokens(prompt).saturating_add(approx_tokens(response));
        Self {
            tokens_used: Some(tokens),
            cost_cents: Some(tokens / 1000),
            duration_ms: Some(u32::try_from(elapsed.as_millis()).unwrap_or(u32::MAX)),
        }
    }
}

fn approx_tokens(text: &str) -> u32 {
    let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
    chars.div_ceil(4)
}

/// Values for a freshly created pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChatRequest {
    pub id: ChatRequestId,
    pub user_id: UserId,
    pub session_id: SessionTag,
    pub prompt: String,
    pub model: String,
    pub client: ClientInfo,
    pub started_at: DateTime<Utc>,
}

/// Terminal update applied to a pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequestUpdate {
    pub status: ChatRequestStatus,
    pub response: Option<String>,
    pub metrics: RequestMetrics,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ChatRequestUpdate {
    /// Successful completion.
    pub fn completed(response: String, metrics: RequestMetrics, at: DateTime<Utc>) -> Self {
        Self {
            status: ChatRequestStatus::Completed,
            response: Some(response),
            metrics,
            error_message: None,
            completed_at: Some(at),
        }
    }

    /// Provider or pipeline failure.
    pub fn failed(message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            status: ChatRequestStatus::Failed,
            response: None,
            metrics: RequestMetrics::default(),
            error_message: Some(message.into()),
            completed_at: Some(at),
        }
    }
}

/// Stored chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub id: ChatRequestId,
    pub user_id: UserId,
    pub session_id: SessionTag,
    pub prompt: String,
    pub response: Option<String>,
    pub model: String,
    pub status: ChatRequestStatus,
    #[serde(flatten)]
    pub metrics: RequestMetrics,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ChatRequest {
    /// Materialise a pending record from its creation values.
    pub fn from_new(new: NewChatRequest) -> Self {
        let NewChatRequest {
            id,
            user_id,
            session_id,
            prompt,
            model,
            client: _,
            started_at,
        } = new;
        Self {
            id,
            user_id,
            session_id,
            prompt,
            response: None,
            model,
            status: ChatRequestStatus::Pending,
            metrics: RequestMetrics::default(),
            error_message: None,
            started_at,
            completed_at: None,
            created_at: started_at,
        }
    }

    /// Apply a terminal update in place.
    pub fn apply(&mut self, update: ChatRequestUpdate) {
        self.status = update.status;
        if update.response.is_some() {
            self.response = update.response;
        }
        self.metrics = RequestMetrics {
            tokens_used: update.metrics.tokens_used.or(self.metrics.tokens_used),
            cost_cents: update.metrics.cost_cents.or(self.metrics.cost_cents),
            duration_ms: update.metrics.duration_ms.or(self.metrics.duration_ms),
        };
        if update.error_message.is_some() {
            self.error_message = update.error_message;
        }
        if update.completed_at.is_some() {
            self.completed_at = update.completed_at;
        }
    }
}
