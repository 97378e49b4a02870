//! Per-request quality and performance samples derived from chat requests.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ChatRequestId, UserId};

/// Category label used when a request has none.
pub const UNCATEGORIZED: &str = "uncategorized";
/// Longest category label that can be stored.
pub const MAX_CATEGORY_LEN: usize = 64;

/// Kind of work a request asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    #[default]
    Chat,
    CodeGeneration,
    Analysis,
}

impl RequestType {
    /// Storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::CodeGeneration => "code_generation",
            Self::Analysis => "analysis",
        }
    }

    /// Parse a stored value.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "chat" => Some(Self::Chat),
            "code_generation" => Some(Self::CodeGeneration),
            "analysis" => Some(Self::Analysis),
            _ => None,
        }
    }
}

/// Rough size of the task described by a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    #[default]
    Medium,
    Complex,
}

impl Complexity {
    /// Storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Medium => "medium",
            Self::Complex => "complex",
        }
    }

    /// Parse a stored value.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "simple" => Some(Self::Simple),
            "medium" => Some(Self::Medium),
            "complex" => Some(Self::Complex),
            _ => None,
        }
    }

    /// Classify a prompt by length.
    pub fn from_prompt(prompt: &str) -> Self {
        match prompt.chars().count() {
            0..200 => Self::Simple,
            200..1000 => Self::Medium,
            _ => Self::Complex,
        }
    }
}

/// User rating between one and five stars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UserRating(u8);

impl UserRating {
    /// Accept ratings in `1..=5`.
    pub fn new(value: u8) -> Option<Self> {
        (1..=5).contains(&value).then_some(Self(value))
    }

    /// Numeric star count.
    pub fn value(self) -> u8 {
        self.0
    }
}

const CATEGORY_KEYWORDS: &[(&str, &str)] = &[
    ("marketplace", r"(?i)\b(marketplace|listing|auction)s?\b"),
    ("nft", r"(?i)\b(nft|nonfungibletoken|collectible)s?\b"),
    ("defi", r"(?i)\b(defi|swap|liquidity|lending)\b"),
    ("staking", r"(?i)\b(stak(e|ing)|rewards?)\b"),
    ("dao", r"(?i)\b(dao|governance|proposal)s?\b"),
    ("token", r"(?i)\b(fungibletoken|tokens?)\b"),
];

static CATEGORY_RES: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();

fn category_regexes() -> &'static [(&'static str, Regex)] {
    CATEGORY_RES.get_or_init(|| {
        CATEGORY_KEYWORDS
            .iter()
            .map(|(name, pattern)| {
                let re = Regex::new(pattern).unwrap_or_else(|error| {
                    panic!("category regex for {name} failed to compile: {error}")
                });
                (*name, re)
            })
            .collect()
    })
}

/// Guess a dashboard category from prompt keywords.
///
/// # Examples
/// ```
/// use forge_backend::domain::infer_category;
///
/// assert_eq!(infer_category("Build an NFT collection"), Some("nft"));
/// assert_eq!(infer_category("Explain resources"), None);
/// ```
pub fn infer_category(prompt: &str) -> Option<&'static str> {
    category_regexes()
        .iter()
        .find(|(_, re)| re.is_match(prompt))
        .map(|(name, _)| *name)
}

/// Optional analytics fields a client may send with a tracking update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyticsInput {
    pub request_type: Option<RequestType>,
    pub category: Option<String>,
    pub complexity: Option<Complexity>,
    pub user_rating: Option<UserRating>,
}

/// Stored analytics sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestAnalytic {
    pub id: Uuid,
    pub user_id: UserId,
    pub request_id: ChatRequestId,
    pub request_type: RequestType,
    pub category: Option<String>,
    pub complexity: Complexity,
    pub response_time_ms: Option<u32>,
    pub tokens_input: Option<u32>,
    pub tokens_output: Option<u32>,
    pub user_rating: Option<UserRating>,
    pub was_successful: bool,
    pub created_at: DateTime<Utc>,
}

/// The fields of a sample that feed the performance aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceSample {
    pub response_time_ms: Option<u32>,
    pub was_successful: bool,
    pub user_rating: Option<UserRating>,
}

impl From<&RequestAnalytic> for PerformanceSample {
    fn from(analytic: &RequestAnalytic) -> Self {
        Self {
            response_time_ms: analytic.response_time_ms,
            was_successful: analytic.was_successful,
            user_rating: analytic.user_rating,
        }
    }
}

/// Values needed to derive an analytics sample from a finished request.
#[derive(Debug, Clone, Copy)]
pub struct AnalyticSource<'a> {
    pub user_id: &'a UserId,
    pub request_id: ChatRequestId,
    pub prompt: &'a str,
    pub response: &'a str,
    pub response_time_ms: Option<u32>,
    pub was_successful: bool,
}

impl RequestAnalytic {
    /// Derive a sample, letting client-supplied fields override inference.
    pub fn derive(source: AnalyticSource<'_>, input: AnalyticsInput, now: DateTime<Utc>) -> Self {
        let category = input
            .category
            .or_else(|| infer_category(source.prompt).map(str::to_owned));
        Self {
            id: Uuid::new_v4(),
            user_id: source.user_id.clone(),
            request_id: source.request_id,
            request_type: input.request_type.unwrap_or_default(),
            category,
            complexity: input
                .complexity
                .unwrap_or_else(|| Complexity::from_prompt(source.prompt)),
            response_time_ms: source.response_time_ms,
            tokens_input: Some(estimate(source.prompt)),
            tokens_output: Some(estimate(source.response)),
            user_rating: input.user_rating,
            was_successful: source.was_successful,
            created_at: now,
        }
    }
}

fn estimate(text: &str) -> u32 {
    u32::try_from(text.chars().count())
        .unwrap_or(u32::MAX)
        .div_ceil(4)
}
