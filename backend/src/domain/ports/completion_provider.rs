//! Driven port for the AI completion provider.
//!
//! Adapters stream the answer back in text chunks. The only adapter shipped
//! here is a deterministic fixture; real provider integrations plug in
//! behind the same trait.

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use serde::{Deserialize, Serialize};

use crate::domain::{Error, infer_base_name};

use super::define_port_error;

define_port_error! {
    /// Errors raised by completion providers.
    pub enum CompletionError {
        /// The provider rejected the request or could not be reached.
        Unavailable { message: String } => "completion provider unavailable: {message}",
        /// The stream broke after it started.
        Stream { message: String } => "completion stream failed: {message}",
    }
}

impl From<CompletionError> for Error {
    fn from(err: CompletionError) -> Self {
        Error::internal(err.to_string())
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message in a conversation sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    /// System instruction.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// User turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Parameters for one streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

impl CompletionRequest {
    /// Content of the last user message, if any.
    pub fn last_user_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
    }
}

/// Text chunks in arrival order.
pub type CompletionStream = BoxStream<'static, Result<String, CompletionError>>;

/// Port for streaming completions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Start a completion and return its chunk stream.
    async fn stream(&self, request: CompletionRequest)
    -> Result<CompletionStream, CompletionError>;
}

const FIXTURE_CHUNK_CHARS: usize = 48;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum FixtureBehaviour {
    #[default]
    Contract,
    Answer(String),
    Unavailable(String),
    BreakAfter { prefix: String, message: String },
}

/// Deterministic provider used in development and tests.
///
/// By default it answers every prompt with a small Cadence contract named
/// after the prompt's subject.
///
/// # Examples
/// ```
/// use futures_util::TryStreamExt;
/// use forge_backend::domain::ports::{
///     ChatMessage, CompletionProvider, CompletionRequest, FixtureCompletionProvider,
/// };
///
/// # tokio::runtime::Runtime::new().expect("runtime").block_on(async {
/// let provider = FixtureCompletionProvider::default();
/// let request = CompletionRequest {
///     model: "openai/gpt-oss-20b".to_owned(),
///     messages: vec![ChatMessage::user("an NFT collection")],
///     temperature: 0.7,
/// };
/// let chunks: Vec<String> = provider
///     .stream(request)
///     .await
///     .expect("stream starts")
///     .try_collect()
///     .await
///     .expect("stream completes");
/// assert!(chunks.concat().contains("access(all) contract NFTContract"));
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct FixtureCompletionProvider {
    behaviour: FixtureBehaviour,
}

impl FixtureCompletionProvider {
    /// Always answer with `answer`.
    pub fn with_answer(answer: impl Into<String>) -> Self {
        Self {
            behaviour: FixtureBehaviour::Answer(answer.into()),
        }
    }

    /// Refuse every request.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            behaviour: FixtureBehaviour::Unavailable(message.into()),
        }
    }

    /// Emit `prefix`, then fail the stream.
    pub fn breaking_after(prefix: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            behaviour: FixtureBehaviour::BreakAfter {
                prefix: prefix.into(),
                message: message.into(),
            },
        }
    }
}

fn contract_answer(prompt: &str) -> String {
    let name = match infer_base_name(prompt) {
        "Contract" => "HelloWorld",
        other => other,
    };
    format!(
        "Here is a starting point for your contract.\n\n\
         ```cadence\n\
         access(all) contract {name} {{\n\
         \x20   access(all) var greeting: String\n\n\
         \x20   access(all) fun setGreeting(_ greeting: String) {{\n\
         \x20       self.greeting = greeting\n\
         \x20   }}\n\n\
         \x20   init() {{\n\
         \x20       self.greeting = \"Hello from {name}\"\n\
         \x20   }}\n\
         }}\n\
         ```\n\n\
         Deploy it with the Flow CLI and call `setGreeting` from a transaction.\n"
    )
}

fn chunked(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(FIXTURE_CHUNK_CHARS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[async_trait]
impl CompletionProvider for FixtureCompletionProvider {
    async fn stream(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionStream, CompletionError> {
        let chunks: Vec<Result<String, CompletionError>> = match &self.behaviour {
            FixtureBehaviour::Contract => {
                let prompt = request.last_user_prompt().unwrap_or_default();
                chunked(&contract_answer(prompt)).into_iter().map(Ok).collect()
            }
            FixtureBehaviour::Answer(answer) => chunked(answer).into_iter().map(Ok).collect(),
            FixtureBehaviour::Unavailable(message) => {
                return Err(CompletionError::unavailable(message.clone()));
            }
            FixtureBehaviour::BreakAfter { prefix, message } => vec![
                Ok(prefix.clone()),
                Err(CompletionError::stream(message.clone())),
            ],
        };
        Ok(stream::iter(chunks).boxed())
    }
}
