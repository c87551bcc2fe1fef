//! Chat session controller.
//!
//! `ChatSessionController` owns the conversation of the selected chat. It
//! appends user turns, persists them before contacting the model, drives one
//! `StreamSession` at a time, republishes every draft snapshot as updated
//! conversation state, and persists the assistant reply once it completes.
//!
//! Generic over `ChatStore` (lmchat-core never depends on lmchat-infra).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use lmchat_types::chat::{AssistantDraft, Chat, ChatId, Message, MessageId, MessageRole};
use lmchat_types::error::ChatError;
use lmchat_types::llm::Budget;

use crate::llm::BoxCompletionClient;
use crate::stream::{SessionConfig, SessionOutcome, SessionStats, StreamSession};

use super::store::ChatStore;

/// Fixed parameters for every exchange the controller runs.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: f64,
    pub budget: Budget,
}

/// What the user submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInput {
    pub text: String,
    pub image: Option<String>,
}

impl UserInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    fn is_blank(&self) -> bool {
        self.text.trim().is_empty() && self.image.is_none()
    }

    fn into_message(self) -> Message {
        Message {
            role: MessageRole::User,
            content: Some(self.text),
            image: self.image,
        }
    }
}

/// Result of a send that did not fail.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// The reply streamed to completion and was persisted.
    Completed {
        message: Message,
        message_id: MessageId,
        stats: SessionStats,
    },
    /// The user cancelled; `partial` stays visible but is not persisted.
    Cancelled { partial: AssistantDraft },
}

#[derive(Debug, Default)]
struct ControllerState {
    chat_id: Option<ChatId>,
    messages: Vec<Message>,
    model: String,
    /// Index of the in-flight assistant draft within `messages`.
    draft_slot: Option<usize>,
    active: Option<CancellationToken>,
    /// A chat switch is waiting on the store; sends are refused meanwhile.
    switching: bool,
}

/// Top-level coordinator between the UI, the model service, and persistence.
pub struct ChatSessionController<S: ChatStore> {
    store: S,
    client: Arc<BoxCompletionClient>,
    temperature: f64,
    budget: Budget,
    state: Mutex<ControllerState>,
    view: watch::Sender<Vec<Message>>,
}

/// Clears the busy flag however `send` exits.
struct ActiveGuard<'a, S: ChatStore> {
    controller: &'a ChatSessionController<S>,
}

impl<S: ChatStore> Drop for ActiveGuard<'_, S> {
    fn drop(&mut self) {
        let mut state = self.controller.lock();
        state.active = None;
        state.draft_slot = None;
    }
}

/// Holds the controller in the switching state across a store call.
struct SwitchGuard<'a, S: ChatStore> {
    controller: &'a ChatSessionController<S>,
}

impl<S: ChatStore> Drop for SwitchGuard<'_, S> {
    fn drop(&mut self) {
        self.controller.lock().switching = false;
    }
}

impl ControllerState {
    fn is_busy(&self) -> bool {
        self.active.is_some() || self.switching
    }
}

impl<S: ChatStore> ChatSessionController<S> {
    pub fn new(store: S, client: Arc<BoxCompletionClient>, settings: ChatSettings) -> Self {
        let (view, _) = watch::channel(Vec::new());
        Self {
            store,
            client,
            temperature: settings.temperature,
            budget: settings.budget,
            state: Mutex::new(ControllerState {
                model: settings.model,
                ..ControllerState::default()
            }),
            view,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &ControllerState) {
        self.view.send_replace(state.messages.clone());
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn client(&self) -> &BoxCompletionClient {
        &self.client
    }

    /// Coalescing view of the conversation, draft included.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Message>> {
        self.view.subscribe()
    }

    pub fn conversation(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    pub fn current_chat(&self) -> Option<ChatId> {
        self.lock().chat_id
    }

    pub fn model(&self) -> String {
        self.lock().model.clone()
    }

    /// Model used from the next send on.
    pub fn set_model(&self, model: impl Into<String>) {
        let model = model.into();
        tracing::info!(model = %model, "model selected");
        self.lock().model = model;
    }

    /// Whether a reply is streaming or a chat switch is in progress.
    pub fn is_busy(&self) -> bool {
        self.lock().is_busy()
    }

    /// Claim the controller for a change of the current chat.
    fn begin_switch(&self) -> Result<SwitchGuard<'_, S>, ChatError> {
        let mut state = self.lock();
        if state.is_busy() {
            return Err(ChatError::SessionBusy);
        }
        state.switching = true;
        Ok(SwitchGuard { controller: self })
    }

    /// Cancel the active exchange, if any. Returns whether one was running.
    pub fn cancel(&self) -> bool {
        match &self.lock().active {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn list_chats(&self) -> Result<Vec<Chat>, ChatError> {
        Ok(self.store.list_chats().await?)
    }

    /// Create a chat and make it the current one.
    pub async fn new_chat(&self, title: Option<&str>) -> Result<ChatId, ChatError> {
        let _switch = self.begin_switch()?;
        let chat_id = self.store.create_chat(title).await?;
        let mut state = self.lock();
        state.chat_id = Some(chat_id);
        state.messages.clear();
        self.publish(&state);
        tracing::info!(chat_id = %chat_id, "chat created");
        Ok(chat_id)
    }

    /// Load a chat's persisted messages and make it the current one.
    pub async fn select_chat(&self, chat_id: ChatId) -> Result<(), ChatError> {
        let _switch = self.begin_switch()?;
        let messages: Vec<Message> = self
            .store
            .list_messages(chat_id)
            .await?
            .iter()
            .map(|m| m.to_message())
            .collect();
        let mut state = self.lock();
        state.chat_id = Some(chat_id);
        state.messages = messages;
        self.publish(&state);
        tracing::debug!(chat_id = %chat_id, messages = state.messages.len(), "chat selected");
        Ok(())
    }

    /// Delete a chat. Other chats may be deleted while a reply streams.
    pub async fn delete_chat(&self, chat_id: ChatId) -> Result<(), ChatError> {
        let _switch = match self.begin_switch() {
            Ok(guard) => Some(guard),
            Err(_) if self.current_chat() != Some(chat_id) => None,
            Err(e) => return Err(e),
        };
        self.store.delete_chat(chat_id).await?;
        let mut state = self.lock();
        // A reply may have started on this chat while the store was busy.
        if state.chat_id == Some(chat_id) && state.active.is_none() {
            state.chat_id = None;
            state.messages.clear();
            self.publish(&state);
        }
        tracing::info!(chat_id = %chat_id, "chat deleted");
        Ok(())
    }

    /// Send a user turn and stream the assistant reply.
    ///
    /// The user message is persisted before the model is contacted. On
    /// failure or cancellation the partial reply stays in the conversation
    /// but is not persisted.
    pub async fn send(&self, input: UserInput) -> Result<SendOutcome, ChatError> {
        if input.is_blank() {
            return Err(ChatError::EmptyInput);
        }

        let title = input.text.clone();
        let user_message = input.into_message();

        let (chat_id, is_first, history, session, handle) = {
            let mut state = self.lock();
            if state.is_busy() {
                return Err(ChatError::SessionBusy);
            }
            let chat_id = state.chat_id.ok_or(ChatError::NoChatSelected)?;
            let is_first = state.messages.is_empty();
            state.messages.push(user_message.clone());
            let (session, handle) = StreamSession::new(SessionConfig {
                model: state.model.clone(),
                temperature: self.temperature,
                budget: self.budget,
            });
            state.active = Some(handle.cancellation_token());
            self.publish(&state);
            (chat_id, is_first, state.messages.clone(), session, handle)
        };
        let _guard = ActiveGuard { controller: self };

        if let Err(e) = self.store.append_message(chat_id, &user_message).await {
            tracing::error!(chat_id = %chat_id, error = %e, "failed to persist user message");
            let mut state = self.lock();
            state.messages.pop();
            self.publish(&state);
            return Err(e.into());
        }

        if is_first && !title.trim().is_empty() {
            if let Err(e) = self.store.rename_chat(chat_id, &title).await {
                tracing::warn!(chat_id = %chat_id, error = %e, "failed to rename chat from first message");
            }
        }

        let mut snapshots = handle.snapshots();
        let run = session.run(&self.client, &history);
        tokio::pin!(run);
        let outcome = loop {
            tokio::select! {
                biased;
                outcome = &mut run => break outcome,
                Ok(()) = snapshots.changed() => {
                    let draft = snapshots.borrow_and_update().clone();
                    self.show_draft(&draft);
                }
            }
        };

        match outcome {
            SessionOutcome::Completed { message, stats } => {
                self.place_draft(Some(message.clone()));
                let message_id = self.store.append_message(chat_id, &message).await?;
                tracing::debug!(chat_id = %chat_id, message_id = %message_id, "assistant reply persisted");
                Ok(SendOutcome::Completed {
                    message,
                    message_id,
                    stats,
                })
            }
            SessionOutcome::Failed { error, partial } => {
                self.place_draft(partial.filter(|d| !d.is_empty()).map(|d| d.into_message()));
                Err(error)
            }
            SessionOutcome::Cancelled { partial } => {
                self.place_draft((!partial.is_empty()).then(|| partial.to_message()));
                Ok(SendOutcome::Cancelled { partial })
            }
        }
    }

    /// Insert the draft on its first snapshot, then replace it in place.
    fn show_draft(&self, draft: &AssistantDraft) {
        let mut guard = self.lock();
        let state = &mut *guard;
        let message = draft.to_message();
        // A slot that no longer exists is reclaimed rather than indexed.
        match state.draft_slot.and_then(|idx| state.messages.get_mut(idx)) {
            Some(slot) => *slot = message,
            None => {
                state.messages.push(message);
                state.draft_slot = Some(state.messages.len() - 1);
            }
        }
        self.publish(state);
    }

    /// Settle the draft slot: replace it with `message`, or drop it when `None`.
    fn place_draft(&self, message: Option<Message>) {
        let mut state = self.lock();
        let slot = state.draft_slot.filter(|&idx| idx < state.messages.len());
        match (slot, message) {
            (Some(idx), Some(message)) => state.messages[idx] = message,
            (None, Some(message)) => {
                state.messages.push(message);
                state.draft_slot = Some(state.messages.len() - 1);
            }
            (Some(idx), None) => {
                state.messages.remove(idx);
                state.draft_slot = None;
            }
            (None, None) => state.draft_slot = None,
        }
        self.publish(&state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::fake::{text_line, FakeClient, Script};
    use chrono::Utc;
    use lmchat_types::chat::{ChatMessage, DEFAULT_CHAT_TITLE};
    use lmchat_types::error::RepositoryError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::{oneshot, Notify};

    #[derive(Default)]
    struct MemoryStore {
        chats: Mutex<Vec<Chat>>,
        messages: Mutex<Vec<ChatMessage>>,
        fail_appends: AtomicBool,
        /// When set, the next `create_chat` or `list_messages` waits for it.
        gate: Mutex<Option<oneshot::Receiver<()>>>,
        gate_entered: Notify,
    }

    impl MemoryStore {
        fn close_gate(&self) -> oneshot::Sender<()> {
            let (open, gate) = oneshot::channel();
            *self.gate.lock().unwrap() = Some(gate);
            open
        }

        async fn pass_gate(&self) {
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                self.gate_entered.notify_one();
                let _ = gate.await;
            }
        }

        fn persisted(&self, chat_id: ChatId) -> Vec<Message> {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.chat_id == chat_id)
                .map(|m| m.to_message())
                .collect()
        }

        fn title(&self, chat_id: ChatId) -> String {
            self.chats
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.id == chat_id)
                .map(|c| c.title.clone())
                .unwrap()
        }
    }

    impl ChatStore for MemoryStore {
        async fn list_chats(&self) -> Result<Vec<Chat>, RepositoryError> {
            Ok(self.chats.lock().unwrap().clone())
        }

        async fn create_chat(&self, title: Option<&str>) -> Result<ChatId, RepositoryError> {
            self.pass_gate().await;
            let mut chats = self.chats.lock().unwrap();
            let id = ChatId(chats.len() as i64 + 1);
            chats.push(Chat {
                id,
                title: title.unwrap_or(DEFAULT_CHAT_TITLE).to_string(),
                created_at: Utc::now(),
            });
            Ok(id)
        }

        async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<ChatMessage>, RepositoryError> {
            self.pass_gate().await;
            Ok(self
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.chat_id == chat_id)
                .cloned()
                .collect())
        }

        async fn append_message(
            &self,
            chat_id: ChatId,
            message: &Message,
        ) -> Result<MessageId, RepositoryError> {
            if self.fail_appends.load(Ordering::SeqCst) {
                return Err(RepositoryError::Query("disk full".to_string()));
            }
            let mut messages = self.messages.lock().unwrap();
            let id = MessageId(messages.len() as i64 + 1);
            messages.push(ChatMessage {
                id,
                chat_id,
                role: message.role,
                content: message.content.clone(),
                image: message.image.clone(),
                created_at: Utc::now(),
            });
            Ok(id)
        }

        async fn rename_chat(&self, chat_id: ChatId, title: &str) -> Result<(), RepositoryError> {
            let mut chats = self.chats.lock().unwrap();
            let chat = chats
                .iter_mut()
                .find(|c| c.id == chat_id)
                .ok_or(RepositoryError::NotFound)?;
            chat.title = title.to_string();
            Ok(())
        }

        async fn delete_chat(&self, chat_id: ChatId) -> Result<(), RepositoryError> {
            self.chats.lock().unwrap().retain(|c| c.id != chat_id);
            self.messages.lock().unwrap().retain(|m| m.chat_id != chat_id);
            Ok(())
        }
    }

    fn controller(script: Script) -> (ChatSessionController<MemoryStore>, Arc<FakeClient>) {
        let fake = Arc::new(FakeClient::new(script));
        let client = Arc::new(BoxCompletionClient::new(fake.clone()));
        let settings = ChatSettings {
            model: "local-model".to_string(),
            temperature: 0.7,
            budget: Budget::default(),
        };
        (
            ChatSessionController::new(MemoryStore::default(), client, settings),
            fake,
        )
    }

    fn hello_there() -> Script {
        Script::Chunks(vec![
            text_line("Hello"),
            text_line(" there"),
            "data: [DONE]\n".to_string(),
        ])
    }

    #[tokio::test]
    async fn test_send_persists_both_turns_and_renames() {
        let (ctl, fake) = controller(hello_there());
        let chat_id = ctl.new_chat(None).await.unwrap();
        assert_eq!(ctl.store().title(chat_id), DEFAULT_CHAT_TITLE);

        let outcome = ctl.send(UserInput::text("Hi")).await.unwrap();
        match outcome {
            SendOutcome::Completed { message, .. } => {
                assert_eq!(message.text(), "Hello there");
            }
            other => panic!("expected completion, got {other:?}"),
        }

        let expected = vec![Message::user("Hi"), Message::assistant("Hello there")];
        assert_eq!(ctl.conversation(), expected);
        assert_eq!(*ctl.subscribe().borrow(), expected);
        assert_eq!(ctl.store().persisted(chat_id), expected);
        assert_eq!(ctl.store().title(chat_id), "Hi");
        assert_eq!(fake.last_request().unwrap().max_tokens, 4096);
        assert!(!ctl.is_busy());
    }

    #[tokio::test]
    async fn test_second_message_does_not_rename() {
        let (ctl, _) = controller(hello_there());
        let chat_id = ctl.new_chat(None).await.unwrap();
        ctl.send(UserInput::text("first")).await.unwrap();
        ctl.send(UserInput::text("second")).await.unwrap();
        assert_eq!(ctl.store().title(chat_id), "first");
        assert_eq!(ctl.conversation().len(), 4);
    }

    #[tokio::test]
    async fn test_send_requires_selected_chat() {
        let (ctl, fake) = controller(hello_there());
        let err = ctl.send(UserInput::text("Hi")).await.unwrap_err();
        assert!(matches!(err, ChatError::NoChatSelected));
        assert!(ctl.conversation().is_empty());
        assert!(fake.last_request().is_none());
    }

    #[tokio::test]
    async fn test_blank_input_rejected() {
        let (ctl, _) = controller(hello_there());
        ctl.new_chat(None).await.unwrap();
        let err = ctl.send(UserInput::text("   ")).await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyInput));
    }

    #[tokio::test]
    async fn test_image_only_input_is_sent() {
        let (ctl, fake) = controller(hello_there());
        let chat_id = ctl.new_chat(None).await.unwrap();
        ctl.send(UserInput::default().with_image("data:image/png;base64,AAAA"))
            .await
            .unwrap();
        let sent = fake.last_request().unwrap();
        assert_eq!(sent.messages[0].image.as_deref(), Some("data:image/png;base64,AAAA"));
        // no text, so the default title stays
        assert_eq!(ctl.store().title(chat_id), DEFAULT_CHAT_TITLE);
    }

    #[tokio::test]
    async fn test_request_failure_keeps_user_message() {
        let (ctl, _) = controller(Script::Reject {
            status: 500,
            message: "model crashed",
        });
        let chat_id = ctl.new_chat(None).await.unwrap();
        let err = ctl.send(UserInput::text("Hi")).await.unwrap_err();
        assert!(matches!(err, ChatError::RequestFailed(ref m) if m == "model crashed"));
        assert_eq!(ctl.conversation(), vec![Message::user("Hi")]);
        assert_eq!(ctl.store().persisted(chat_id), vec![Message::user("Hi")]);
        assert!(!ctl.is_busy());
    }

    #[tokio::test]
    async fn test_stream_failure_shows_partial_but_does_not_persist_it() {
        let (ctl, _) = controller(Script::ChunksThenError(
            vec![text_line("partial")],
            "connection reset",
        ));
        let chat_id = ctl.new_chat(None).await.unwrap();
        let err = ctl.send(UserInput::text("Hi")).await.unwrap_err();
        assert!(matches!(err, ChatError::StreamReadFailed(_)));
        assert_eq!(
            ctl.conversation(),
            vec![Message::user("Hi"), Message::assistant("partial")]
        );
        assert_eq!(ctl.store().persisted(chat_id), vec![Message::user("Hi")]);
    }

    #[tokio::test]
    async fn test_user_persist_failure_rolls_back() {
        let (ctl, fake) = controller(hello_there());
        ctl.new_chat(None).await.unwrap();
        ctl.store().fail_appends.store(true, Ordering::SeqCst);
        let err = ctl.send(UserInput::text("Hi")).await.unwrap_err();
        assert!(matches!(err, ChatError::Persistence(_)));
        assert!(ctl.conversation().is_empty());
        assert!(fake.last_request().is_none());
        assert!(!ctl.is_busy());
    }

    #[tokio::test]
    async fn test_busy_rejection_and_cancel() {
        let (ctl, _) = controller(Script::ChunksThenHang(vec![text_line("thinking")]));
        let ctl = Arc::new(ctl);
        let chat_id = ctl.new_chat(None).await.unwrap();
        let mut view = ctl.subscribe();

        let runner = {
            let ctl = ctl.clone();
            tokio::spawn(async move { ctl.send(UserInput::text("Hi")).await })
        };

        view.wait_for(|msgs| msgs.len() == 2 && msgs[1].text() == "thinking")
            .await
            .unwrap();
        assert!(ctl.is_busy());

        let err = ctl.send(UserInput::text("again")).await.unwrap_err();
        assert!(matches!(err, ChatError::SessionBusy));
        assert!(matches!(
            ctl.select_chat(chat_id).await.unwrap_err(),
            ChatError::SessionBusy
        ));
        assert!(matches!(
            ctl.delete_chat(chat_id).await.unwrap_err(),
            ChatError::SessionBusy
        ));

        assert!(ctl.cancel());
        let outcome = runner.await.unwrap().unwrap();
        match outcome {
            SendOutcome::Cancelled { partial } => assert_eq!(partial.content, "thinking"),
            other => panic!("expected cancellation, got {other:?}"),
        }
        assert!(!ctl.is_busy());
        assert!(!ctl.cancel());
        assert_eq!(
            ctl.conversation(),
            vec![Message::user("Hi"), Message::assistant("thinking")]
        );
        assert_eq!(ctl.store().persisted(chat_id), vec![Message::user("Hi")]);
    }

    #[tokio::test]
    async fn test_select_chat_replaces_conversation() {
        let (ctl, _) = controller(hello_there());
        let first = ctl.new_chat(None).await.unwrap();
        ctl.send(UserInput::text("Hi")).await.unwrap();
        let second = ctl.new_chat(Some("other")).await.unwrap();
        assert!(ctl.conversation().is_empty());

        ctl.select_chat(first).await.unwrap();
        assert_eq!(ctl.current_chat(), Some(first));
        assert_eq!(ctl.conversation().len(), 2);

        ctl.delete_chat(first).await.unwrap();
        assert_eq!(ctl.current_chat(), None);
        assert!(ctl.conversation().is_empty());
        let remaining: Vec<ChatId> = ctl.list_chats().await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(remaining, vec![second]);
    }

    #[tokio::test]
    async fn test_set_model_applies_to_next_send() {
        let (ctl, fake) = controller(hello_there());
        ctl.new_chat(None).await.unwrap();
        ctl.set_model("qwen2.5-7b");
        ctl.send(UserInput::text("Hi")).await.unwrap();
        assert_eq!(fake.last_request().unwrap().model, "qwen2.5-7b");
        assert_eq!(ctl.model(), "qwen2.5-7b");
    }

    #[tokio::test]
    async fn test_send_refused_while_new_chat_awaits_store() {
        let (ctl, fake) = controller(Script::ChunksThenHang(vec![text_line("thinking")]));
        let ctl = Arc::new(ctl);
        let first = ctl.new_chat(None).await.unwrap();

        let open = ctl.store().close_gate();
        let creating = {
            let ctl = ctl.clone();
            tokio::spawn(async move { ctl.new_chat(Some("second")).await })
        };
        ctl.store().gate_entered.notified().await;

        assert!(ctl.is_busy());
        let err = ctl.send(UserInput::text("Hi")).await.unwrap_err();
        assert!(matches!(err, ChatError::SessionBusy));
        assert!(!ctl.cancel());
        assert!(fake.last_request().is_none());

        open.send(()).unwrap();
        let second = creating.await.unwrap().unwrap();
        assert_ne!(second, first);
        assert_eq!(ctl.current_chat(), Some(second));
        assert!(ctl.conversation().is_empty());
        assert!(ctl.store().persisted(first).is_empty());
        assert!(!ctl.is_busy());

        // the controller is usable again once the switch settles
        let runner = {
            let ctl = ctl.clone();
            tokio::spawn(async move { ctl.send(UserInput::text("Hi")).await })
        };
        let mut view = ctl.subscribe();
        view.wait_for(|msgs| msgs.len() == 2).await.unwrap();
        assert!(ctl.cancel());
        assert!(matches!(
            runner.await.unwrap().unwrap(),
            SendOutcome::Cancelled { .. }
        ));
    }

    #[tokio::test]
    async fn test_send_refused_while_select_chat_awaits_store() {
        let (ctl, _) = controller(hello_there());
        let ctl = Arc::new(ctl);
        let first = ctl.new_chat(None).await.unwrap();
        ctl.send(UserInput::text("Hi")).await.unwrap();
        ctl.new_chat(Some("other")).await.unwrap();

        let open = ctl.store().close_gate();
        let selecting = {
            let ctl = ctl.clone();
            tokio::spawn(async move { ctl.select_chat(first).await })
        };
        ctl.store().gate_entered.notified().await;

        let err = ctl.send(UserInput::text("in between")).await.unwrap_err();
        assert!(matches!(err, ChatError::SessionBusy));
        assert!(matches!(
            ctl.new_chat(None).await.unwrap_err(),
            ChatError::SessionBusy
        ));

        open.send(()).unwrap();
        selecting.await.unwrap().unwrap();
        assert_eq!(ctl.current_chat(), Some(first));
        assert_eq!(
            ctl.conversation(),
            vec![Message::user("Hi"), Message::assistant("Hello there")]
        );
    }

    #[tokio::test]
    async fn test_deleting_other_chat_while_streaming_keeps_draft() {
        let (ctl, _) = controller(Script::ChunksThenHang(vec![text_line("thinking")]));
        let ctl = Arc::new(ctl);
        let other = ctl.new_chat(Some("old")).await.unwrap();
        let current = ctl.new_chat(None).await.unwrap();
        let mut view = ctl.subscribe();

        let runner = {
            let ctl = ctl.clone();
            tokio::spawn(async move { ctl.send(UserInput::text("Hi")).await })
        };
        view.wait_for(|msgs| msgs.len() == 2).await.unwrap();

        ctl.delete_chat(other).await.unwrap();
        assert_eq!(ctl.current_chat(), Some(current));
        assert_eq!(ctl.conversation().len(), 2);

        assert!(ctl.cancel());
        let outcome = runner.await.unwrap().unwrap();
        assert!(matches!(outcome, SendOutcome::Cancelled { .. }));
        assert_eq!(
            ctl.conversation(),
            vec![Message::user("Hi"), Message::assistant("thinking")]
        );
    }

    #[tokio::test]
    async fn test_stale_draft_slot_is_reclaimed() {
        let (ctl, _) = controller(hello_there());
        ctl.lock().draft_slot = Some(3);

        let draft = AssistantDraft {
            content: "late".to_string(),
            image: None,
        };
        ctl.show_draft(&draft);
        assert_eq!(ctl.conversation(), vec![Message::assistant("late")]);

        ctl.lock().draft_slot = Some(7);
        ctl.place_draft(None);
        assert_eq!(ctl.conversation(), vec![Message::assistant("late")]);
        assert!(ctl.lock().draft_slot.is_none());
    }
}
