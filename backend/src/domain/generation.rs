//! Credit-gated contract generation around the completion provider.
//!
//! Both entry points share one pipeline: load the user, apply the credit
//! gate, open a pending chat request, stream the completion, then finish the
//! record and deduct a credit once the stream ends. `chat` forwards chunks as
//! they arrive; `generate` buffers them and extracts virtual files.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use mockable::Clock;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::domain::accounts::user_not_found;
use crate::domain::ports::{
    ChatMessage, ChatRequestRepository, ChatRole, CompletionError, CompletionProvider,
    CompletionRequest, CompletionStream, UserRepository,
};
use crate::domain::{
    ChatRequestId, ChatRequestUpdate, ClientInfo, CreditBalance, CreditDeduction, DEFAULT_MODEL,
    Error, NewChatRequest, RequestMetrics, SessionTag, UserId, VirtualFile, Workspace,
};

/// Instruction prepended to every conversation.
pub const SYSTEM_PROMPT: &str = "You are an expert Cadence developer for the Flow blockchain. \
Write secure, idiomatic Cadence 1.0 smart contracts using access(all) and entitlements. \
Return complete contracts in fenced ```cadence code blocks and explain briefly how to deploy \
and interact with them.";

/// Sampling temperature sent to the provider.
pub const TEMPERATURE: f32 = 0.7;

/// Text chunks forwarded to a streaming client.
pub type AnswerStream = BoxStream<'static, Result<String, Error>>;

/// Buffered result of `generate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    /// Chat request id, absent when the pending record could not be stored.
    pub request_id: Option<ChatRequestId>,
    pub answer: String,
    pub files: Vec<VirtualFile>,
    pub credits: CreditBalance,
}

/// Service behind `POST /generate` and `POST /chat`.
#[derive(Clone)]
pub struct GenerationService {
    users: Arc<dyn UserRepository>,
    chat_requests: Arc<dyn ChatRequestRepository>,
    provider: Arc<dyn CompletionProvider>,
    clock: Arc<dyn Clock>,
    model: String,
}

/// Bookkeeping carried from the start of a generation to its end.
#[derive(Clone)]
struct InFlight {
    service: GenerationService,
    user_id: UserId,
    request_id: Option<ChatRequestId>,
    prompt: String,
    started_at: DateTime<Utc>,
}

struct AnswerState {
    chunks: CompletionStream,
    answer: String,
    in_flight: Option<InFlight>,
}

impl GenerationService {
    /// Create the service over its ports.
    pub fn new(
        users: Arc<dyn UserRepository>,
        chat_requests: Arc<dyn ChatRequestRepository>,
        provider: Arc<dyn CompletionProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            chat_requests,
            provider,
            clock,
            model: DEFAULT_MODEL.to_owned(),
        }
    }

    /// Generate an answer for a single prompt and extract its code files.
    pub async fn generate(
        &self,
        user_id: &UserId,
        prompt: &str,
        client: ClientInfo,
    ) -> Result<GenerationOutcome, Error> {
        let messages = vec![ChatMessage::user(prompt)];
        let (in_flight, mut chunks) = self.begin(user_id, messages, client).await?;
        let request_id = in_flight.request_id;

        let mut answer = String::new();
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(text) => answer.push_str(&text),
                Err(err) => {
                    in_flight.fail(&err).await;
                    return Err(err.into());
                }
            }
        }
        in_flight.complete(&answer).await;

        let credits = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(user_not_found)?
            .credits;
        let files = Workspace::from_answer(&answer).into_files();
        Ok(GenerationOutcome {
            request_id,
            answer,
            files,
            credits,
        })
    }

    /// Stream an answer to a conversation.
    ///
    /// Bookkeeping runs when the returned stream is drained; a client that
    /// disconnects early leaves the request pending and keeps its credit.
    pub async fn chat(
        &self,
        user_id: &UserId,
        messages: Vec<ChatMessage>,
        client: ClientInfo,
    ) -> Result<AnswerStream, Error> {
        let (in_flight, chunks) = self.begin(user_id, messages, client).await?;
        let state = AnswerState {
            chunks,
            answer: String::new(),
            in_flight: Some(in_flight),
        };
        Ok(stream::unfold(state, |mut state| async move {
            let in_flight = state.in_flight.take()?;
            match state.chunks.next().await {
                Some(Ok(text)) => {
                    state.answer.push_str(&text);
                    state.in_flight = Some(in_flight);
                    Some((Ok(text), state))
                }
                Some(Err(err)) => {
                    in_flight.fail(&err).await;
                    Some((Err(Error::from(err)), state))
                }
                None => {
                    in_flight.complete(&state.answer).await;
                    None
                }
            }
        })
        .boxed())
    }

    async fn begin(
        &self,
        user_id: &UserId,
        messages: Vec<ChatMessage>,
        client: ClientInfo,
    ) -> Result<(InFlight, CompletionStream), Error> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(user_not_found)?;
        user.credits.ensure_available()?;

        let prompt = last_user_prompt(&messages)
            .ok_or_else(|| Error::invalid_request("Prompt is required"))?
            .to_owned();

        let started_at = self.clock.utc();
        let request_id = self
            .open_record(user_id, &prompt, client, started_at)
            .await;
        let in_flight = InFlight {
            service: self.clone(),
            user_id: user_id.clone(),
            request_id,
            prompt,
            started_at,
        };

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: with_system_prompt(messages),
            temperature: TEMPERATURE,
        };
        match self.provider.stream(request).await {
            Ok(chunks) => Ok((in_flight, chunks)),
            Err(err) => {
                in_flight.fail(&err).await;
                Err(err.into())
            }
        }
    }

    async fn open_record(
        &self,
        user_id: &UserId,
        prompt: &str,
        client: ClientInfo,
        started_at: DateTime<Utc>,
    ) -> Option<ChatRequestId> {
        let new_request = NewChatRequest {
            id: ChatRequestId::random(),
            user_id: user_id.clone(),
            session_id: SessionTag::generate(started_at),
            prompt: prompt.to_owned(),
            model: self.model.clone(),
            client,
            started_at,
        };
        match self.chat_requests.create(&new_request).await {
            Ok(()) => Some(new_request.id),
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "failed to record pending chat request");
                None
            }
        }
    }
}

impl InFlight {
    async fn complete(&self, answer: &str) {
        let service = &self.service;
        let now = service.clock.utc();
        let elapsed = (now - self.started_at).to_std().unwrap_or_default();
        if let Some(request_id) = self.request_id {
            let metrics = RequestMetrics::estimate(&self.prompt, answer, elapsed);
            let update = ChatRequestUpdate::completed(answer.to_owned(), metrics, now);
            if let Err(err) = service.chat_requests.finish(request_id, &update).await {
                warn!(request_id = %request_id, error = %err, "failed to record completed chat request");
            }
        }

        match service.users.deduct_credit(&self.user_id).await {
            Ok(CreditDeduction::Applied(balance)) => info!(
                user_id = %self.user_id,
                used = balance.used(),
                limit = balance.limit(),
                "credit deducted"
            ),
            Ok(CreditDeduction::Exhausted) => warn!(
                user_id = %self.user_id,
                "credit deduction skipped; balance already spent"
            ),
            Err(err) => error!(user_id = %self.user_id, error = %err, "credit deduction failed"),
        }
    }

    async fn fail(&self, err: &CompletionError) {
        warn!(user_id = %self.user_id, error = %err, "generation failed");
        let Some(request_id) = self.request_id else {
            return;
        };
        let update = ChatRequestUpdate::failed(err.to_string(), self.service.clock.utc());
        if let Err(store_err) = self.service.chat_requests.finish(request_id, &update).await {
            warn!(request_id = %request_id, error = %store_err, "failed to record failed chat request");
        }
    }
}

fn last_user_prompt(messages: &[ChatMessage]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == ChatRole::User)
        .map(|m| m.content.as_str())
        .filter(|content| !content.trim().is_empty())
}

fn with_system_prompt(mut messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    if !messages.iter().any(|m| m.role == ChatRole::System) {
        messages.insert(0, ChatMessage::system(SYSTEM_PROMPT));
    }
    messages
}
