//! A single request/response exchange with the model service.
//!
//! `StreamSession` drives: budgeting -> request -> decode -> assemble ->
//! completion or cancellation. Progress is published through a
//! [`SessionHandle`]: draft snapshots and state transitions travel over
//! `watch` channels, so a slow observer only ever sees the newest value and
//! never stalls the read loop.

use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use lmchat_types::chat::{AssistantDraft, Message};
use lmchat_types::error::ChatError;
use lmchat_types::llm::{Budget, CompletionRequest};

use crate::context::ContextBudgeter;
use crate::llm::BoxCompletionClient;

use super::assembler::{Applied, MessageAssembler};
use super::decoder::ChunkDecoder;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Budgeting,
    AwaitingResponse,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Budgeting => "budgeting",
            SessionState::AwaitingResponse => "awaiting_response",
            SessionState::Streaming => "streaming",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
            SessionState::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Per-exchange request parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub model: String,
    pub temperature: f64,
    pub budget: Budget,
}

/// Counters gathered while a session runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    /// Estimated cost of the context actually sent.
    pub tokens_consumed: u32,
    /// `max_tokens` requested for the response.
    pub max_tokens: u32,
    /// Messages sent as context.
    pub messages_sent: usize,
    /// Undecodable lines skipped.
    pub malformed_chunks: u32,
    pub elapsed: Duration,
}

/// How a session ended.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    /// The stream finished; `message` is the frozen assistant reply.
    Completed { message: Message, stats: SessionStats },
    /// The exchange failed. `partial` is present when streaming had begun.
    Failed {
        error: ChatError,
        partial: Option<AssistantDraft>,
    },
    /// Cancelled before completion; `partial` is what had been assembled.
    Cancelled { partial: AssistantDraft },
}

impl SessionOutcome {
    pub fn state(&self) -> SessionState {
        match self {
            SessionOutcome::Completed { .. } => SessionState::Completed,
            SessionOutcome::Failed { .. } => SessionState::Failed,
            SessionOutcome::Cancelled { .. } => SessionState::Cancelled,
        }
    }
}

/// Observer side of a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    snapshots: watch::Receiver<AssistantDraft>,
    state: watch::Receiver<SessionState>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Coalescing receiver of draft snapshots.
    pub fn snapshots(&self) -> watch::Receiver<AssistantDraft> {
        self.snapshots.clone()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn state_receiver(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Close the connection and stop emitting events. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Driver for one exchange. Consumed by [`StreamSession::run`].
pub struct StreamSession {
    config: SessionConfig,
    draft_tx: watch::Sender<AssistantDraft>,
    state_tx: watch::Sender<SessionState>,
    cancel: CancellationToken,
}

impl StreamSession {
    pub fn new(config: SessionConfig) -> (Self, SessionHandle) {
        let (draft_tx, snapshots) = watch::channel(MessageAssembler::initial());
        let (state_tx, state) = watch::channel(SessionState::Idle);
        let cancel = CancellationToken::new();
        let handle = SessionHandle {
            snapshots,
            state,
            cancel: cancel.clone(),
        };
        (
            Self {
                config,
                draft_tx,
                state_tx,
                cancel,
            },
            handle,
        )
    }

    fn transition(&self, next: SessionState) {
        let prev = self.state_tx.send_replace(next);
        tracing::debug!(from = %prev, to = %next, "session state");
    }

    fn fail(&self, error: ChatError, partial: Option<AssistantDraft>) -> SessionOutcome {
        tracing::warn!(error = %error, "completion session failed");
        self.transition(SessionState::Failed);
        SessionOutcome::Failed { error, partial }
    }

    fn cancelled(&self, partial: AssistantDraft) -> SessionOutcome {
        tracing::info!(chars = partial.content.len(), "completion session cancelled");
        self.transition(SessionState::Cancelled);
        SessionOutcome::Cancelled { partial }
    }

    /// Run the exchange to a terminal state.
    #[tracing::instrument(
        name = "stream_session",
        skip_all,
        fields(model = %self.config.model, backend = %client.name(), history = history.len())
    )]
    pub async fn run(self, client: &BoxCompletionClient, history: &[Message]) -> SessionOutcome {
        let started = Instant::now();

        self.transition(SessionState::Budgeting);
        if history.is_empty() {
            return self.fail(ChatError::EmptyConversation, None);
        }
        let selection = ContextBudgeter::select(history, &self.config.budget);
        let max_tokens = selection.response_tokens(&self.config.budget);
        let mut stats = SessionStats {
            tokens_consumed: selection.tokens_consumed,
            max_tokens,
            messages_sent: selection.messages.len(),
            ..SessionStats::default()
        };
        if selection.forced {
            tracing::warn!(
                tokens = selection.tokens_consumed,
                limit = self.config.budget.max_context_tokens,
                "newest message alone exceeds the context budget, sending it anyway"
            );
        }

        let request = CompletionRequest {
            model: self.config.model.clone(),
            messages: selection.messages,
            temperature: self.config.temperature,
            max_tokens,
            stream: true,
        };

        self.transition(SessionState::AwaitingResponse);
        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = client.open_stream(&request) => Some(result),
        };
        let mut body = match opened {
            None => return self.cancelled(MessageAssembler::initial()),
            Some(Err(e)) => return self.fail(ChatError::from_llm(e, false), None),
            Some(Ok(body)) => body,
        };

        self.transition(SessionState::Streaming);
        let mut decoder = ChunkDecoder::new();
        let mut draft = MessageAssembler::initial();

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    drop(body);
                    return self.cancelled(draft);
                }
                item = body.next() => item,
            };

            let (events, eof) = match next {
                Some(Ok(bytes)) => (decoder.push(&bytes), false),
                Some(Err(e)) => {
                    drop(body);
                    return self.fail(ChatError::from_llm(e, true), Some(draft));
                }
                None => (decoder.finish(), true),
            };

            let mut finished = false;
            for event in &events {
                if self.cancel.is_cancelled() {
                    drop(body);
                    return self.cancelled(draft);
                }
                match MessageAssembler::apply(draft, event) {
                    Applied::Updated(d) => {
                        self.draft_tx.send_replace(d.clone());
                        draft = d;
                    }
                    Applied::Unchanged(d) => {
                        stats.malformed_chunks += 1;
                        draft = d;
                    }
                    Applied::Finished(d) => {
                        draft = d;
                        finished = true;
                        break;
                    }
                }
            }

            if finished || eof {
                if eof && !finished {
                    tracing::debug!("stream ended without terminator, treating as complete");
                }
                break;
            }
        }
        drop(body);

        stats.elapsed = started.elapsed();
        tracing::info!(
            chars = draft.content.len(),
            tokens_consumed = stats.tokens_consumed,
            max_tokens = stats.max_tokens,
            malformed = stats.malformed_chunks,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "completion session finished"
        );
        self.transition(SessionState::Completed);
        SessionOutcome::Completed {
            message: draft.into_message(),
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::fake::{text_line, FakeClient, Script};
    use lmchat_types::chat::MessageRole;
    use lmchat_types::llm::StreamEvent;
    use std::sync::Arc;

    fn config() -> SessionConfig {
        SessionConfig {
            model: "local-model".to_string(),
            temperature: 0.7,
            budget: Budget::default(),
        }
    }

    fn boxed(script: Script) -> (BoxCompletionClient, Arc<FakeClient>) {
        let fake = Arc::new(FakeClient::new(script));
        (BoxCompletionClient::new(fake.clone()), fake)
    }

    #[tokio::test]
    async fn test_hi_hello_there_end_to_end() {
        let (client, fake) = boxed(Script::Chunks(vec![
            text_line("Hello"),
            text_line(" there"),
            "data: [DONE]\n".to_string(),
        ]));
        let (session, handle) = StreamSession::new(config());
        let outcome = session.run(&client, &[Message::user("Hi")]).await;

        let request = fake.last_request().unwrap();
        assert_eq!(request.messages, vec![Message::user("Hi")]);
        assert_eq!(request.max_tokens, 4096);
        assert!(request.stream);
        assert_eq!(request.model, "local-model");

        match outcome {
            SessionOutcome::Completed { message, stats } => {
                assert_eq!(message.role, MessageRole::Assistant);
                assert_eq!(message.content.as_deref(), Some("Hello there"));
                assert_eq!(stats.max_tokens, 4096);
                assert_eq!(stats.malformed_chunks, 0);
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(handle.state(), SessionState::Completed);
        assert_eq!(handle.snapshots().borrow().content, "Hello there");
    }

    #[tokio::test]
    async fn test_empty_history_fails() {
        let (client, fake) = boxed(Script::Chunks(vec![]));
        let (session, handle) = StreamSession::new(config());
        let outcome = session.run(&client, &[]).await;
        assert!(matches!(
            outcome,
            SessionOutcome::Failed {
                error: ChatError::EmptyConversation,
                partial: None
            }
        ));
        assert!(fake.last_request().is_none());
        assert_eq!(handle.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_rejected_request_surfaces_server_message() {
        let (client, _) = boxed(Script::Reject {
            status: 400,
            message: "No models loaded",
        });
        let (session, _handle) = StreamSession::new(config());
        let outcome = session.run(&client, &[Message::user("Hi")]).await;
        match outcome {
            SessionOutcome::Failed {
                error: ChatError::RequestFailed(msg),
                partial: None,
            } => assert_eq!(msg, "No models loaded"),
            other => panic!("expected request failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_error_preserves_partial() {
        let (client, _) = boxed(Script::ChunksThenError(
            vec![text_line("Half an "), text_line("answer")],
            "connection reset",
        ));
        let (session, _handle) = StreamSession::new(config());
        let outcome = session.run(&client, &[Message::user("Hi")]).await;
        match outcome {
            SessionOutcome::Failed {
                error: ChatError::StreamReadFailed(_),
                partial: Some(draft),
            } => assert_eq!(draft.content, "Half an answer"),
            other => panic!("expected stream read failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_chunks_counted_not_fatal() {
        let (client, _) = boxed(Script::Chunks(vec![
            text_line("a"),
            "data: {broken\n".to_string(),
            text_line("b"),
            "data: [DONE]\n".to_string(),
        ]));
        let (session, _handle) = StreamSession::new(config());
        match session.run(&client, &[Message::user("Hi")]).await {
            SessionOutcome::Completed { message, stats } => {
                assert_eq!(message.text(), "ab");
                assert_eq!(stats.malformed_chunks, 1);
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_natural_eof_completes() {
        let (client, _) = boxed(Script::Chunks(vec![
            text_line("no"),
            // unterminated final line
            text_line(" terminator").trim_end().to_string(),
        ]));
        let (session, _handle) = StreamSession::new(config());
        match session.run(&client, &[Message::user("Hi")]).await {
            SessionOutcome::Completed { message, .. } => assert_eq!(message.text(), "no terminator"),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_keeps_folded_prefix() {
        let lines = vec![text_line("one "), text_line("two "), text_line("three")];
        let (client, _) = boxed(Script::ChunksThenHang(lines));
        let (session, handle) = StreamSession::new(config());
        let mut snapshots = handle.snapshots();
        let history = vec![Message::user("count")];

        let run = tokio::spawn(async move { session.run(&client, &history).await });

        // wait until all three deltas have been folded
        snapshots
            .wait_for(|d| d.content == "one two three")
            .await
            .unwrap();
        handle.cancel();
        handle.cancel();

        let outcome = run.await.unwrap();
        let expected = MessageAssembler::fold(&[
            StreamEvent::text("one "),
            StreamEvent::text("two "),
            StreamEvent::text("three"),
        ]);
        match outcome {
            SessionOutcome::Cancelled { partial } => assert_eq!(partial, expected),
            other => panic!("expected cancellation, got {other:?}"),
        }
        assert_eq!(handle.state(), SessionState::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_before_response() {
        let (client, fake) = boxed(Script::Chunks(vec![text_line("x")]));
        let (session, handle) = StreamSession::new(config());
        handle.cancel();
        let outcome = session.run(&client, &[Message::user("Hi")]).await;
        match outcome {
            SessionOutcome::Cancelled { partial } => assert!(partial.is_empty()),
            other => panic!("expected cancellation, got {other:?}"),
        }
        assert!(fake.last_request().is_none());
    }

    #[tokio::test]
    async fn test_budget_trims_history_before_request() {
        let (client, fake) = boxed(Script::Chunks(vec!["data: [DONE]\n".to_string()]));
        let mut cfg = config();
        cfg.budget.max_context_tokens = 20;
        let history = vec![
            Message::user("x".repeat(200)),
            Message::assistant("y".repeat(200)),
            Message::user("short"),
        ];
        let (session, _handle) = StreamSession::new(cfg);
        let outcome = session.run(&client, &history).await;
        assert!(matches!(outcome, SessionOutcome::Completed { .. }));
        assert_eq!(fake.last_request().unwrap().messages, vec![Message::user("short")]);
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Cancelled.is_terminal());
        assert!(!SessionState::Streaming.is_terminal());
        assert!(!SessionState::Idle.is_terminal());
    }
}
