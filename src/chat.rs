//! View model for the vendor chat pane.
//!
//! [`VendorChat`] owns everything the pane renders: the open conversation, the
//! chat picker, the input box with its `@` popover, the tag chips and the
//! context selection panel. Front ends call its operations, read
//! [`ChatSnapshot`]s and watch [`VendorChat::subscribe`] for changes.
//!
//! Every deferred mutation goes through the view's liveness token: once
//! [`VendorChat::stop`] has been called, late responses and stream chunks are
//! dropped instead of touching a disposed view.

use crate::api::{MentionQuery, SendMessage, VendorApi};
use crate::config::Config;
use crate::error::ChatResult;
use crate::mention::{MentionToken, TagList, active_mention};
use crate::session::{Conversation, SessionManager};
use crate::stream::{FoldOutcome, fold_stream};
use crate::types::{ChatMessage, ChatSummary, MentionCandidate, MentionKind, VendorContext};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Status lines cycled under a reply while it streams.
pub const STATUS_STAGES: [&str; 4] = [
    "Preparing vendor context...",
    "Fetching invoices / POs...",
    "Analyzing line items...",
    "Drafting answer...",
];
pub const STATUS_INTERVAL: Duration = Duration::from_millis(1200);

/// Ids assigned locally to messages the server has not confirmed yet.
fn is_local_id(id: &str) -> bool {
    id.starts_with("tmp-") || id.starts_with("stream-")
}

pub fn status_label(elapsed: Duration) -> &'static str {
    let step = elapsed.as_millis() / STATUS_INTERVAL.as_millis();
    STATUS_STAGES[(step % STATUS_STAGES.len() as u128) as usize]
}

/// The `@` typeahead.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MentionPopover {
    pub open: bool,
    pub kind: MentionKind,
    pub query: String,
    pub items: Vec<MentionCandidate>,
}

/// Checked rows of the context panel. Only one kind is shown at a time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    pub kind: MentionKind,
    pub ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatSnapshot {
    pub vendor: Option<VendorContext>,
    pub chats: Vec<ChatSummary>,
    pub chat_id: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub input: String,
    pub tokens: Vec<String>,
    pub mention: MentionPopover,
    pub selection: Selection,
    /// Present while any reply is streaming.
    pub status: Option<&'static str>,
}

impl ChatSnapshot {
    pub fn is_streaming(&self) -> bool {
        self.messages.iter().any(|msg| msg.streaming)
    }

    pub fn message(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|msg| msg.id == id)
    }
}

#[derive(Debug, Default)]
struct ChatState {
    vendor: Option<VendorContext>,
    chats: Vec<ChatSummary>,
    conversation: Conversation,
    input: String,
    tags: TagList,
    mention: MentionPopover,
    selection: Selection,
    stream_started: Option<Instant>,
}

impl ChatState {
    fn message_mut(&mut self, id: &str) -> Option<&mut ChatMessage> {
        self.conversation.messages.iter_mut().find(|msg| msg.id == id)
    }

    fn render_placeholder(&mut self, id: &str, text: &str) {
        if let Some(msg) = self.message_mut(id) {
            msg.content.clear();
            msg.content.push_str(text);
        }
    }

    fn finish_placeholder(&mut self, id: &str, text: String) {
        if let Some(msg) = self.message_mut(id) {
            msg.content = text;
            msg.streaming = false;
        }
    }

    fn sync_selection(&mut self) {
        let kind = self.selection.kind;
        self.tags
            .replace_kind(kind, self.selection.ids.iter().map(String::as_str));
    }

    fn snapshot(&self) -> ChatSnapshot {
        let streaming = self.conversation.messages.iter().any(|msg| msg.streaming);
        let status = streaming.then(|| {
            status_label(
                self.stream_started
                    .map(|started| started.elapsed())
                    .unwrap_or_default(),
            )
        });
        ChatSnapshot {
            vendor: self.vendor.clone(),
            chats: self.chats.clone(),
            chat_id: self.conversation.id.clone(),
            messages: self.conversation.messages.clone(),
            input: self.input.clone(),
            tokens: self.tags.tokens().to_vec(),
            mention: self.mention.clone(),
            selection: self.selection.clone(),
            status,
        }
    }
}

struct Inner {
    api: Arc<dyn VendorApi>,
    sessions: SessionManager,
    vendor_id: String,
    mention_limit: usize,
    stream: bool,
    state: Mutex<ChatState>,
    alive: CancellationToken,
    revision: watch::Sender<u64>,
    next_id: AtomicU64,
    mention_seq: AtomicU64,
}

/// Chat pane for one vendor. Cloning yields another handle to the same view.
#[derive(Clone)]
pub struct VendorChat {
    inner: Arc<Inner>,
}

impl VendorChat {
    pub fn new(api: Arc<dyn VendorApi>, vendor_id: impl Into<String>, config: &Config) -> Self {
        let vendor_id = vendor_id.into();
        let sessions = SessionManager::new(api.clone(), vendor_id.clone(), config);
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                api,
                sessions,
                vendor_id,
                mention_limit: config.mention_limit,
                stream: config.stream,
                state: Mutex::new(ChatState::default()),
                alive: CancellationToken::new(),
                revision,
                next_id: AtomicU64::new(1),
                mention_seq: AtomicU64::new(0),
            }),
        }
    }

    pub fn vendor_id(&self) -> &str {
        &self.inner.vendor_id
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.inner.sessions
    }

    /// Revision counter bumped after every state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Token cancelled by [`stop`](Self::stop); hosts may tie their own tasks to it.
    pub fn liveness(&self) -> CancellationToken {
        self.inner.alive.clone()
    }

    pub fn is_active(&self) -> bool {
        !self.inner.alive.is_cancelled()
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        self.read(ChatState::snapshot)
    }

    /// Loads the vendor context, the chat list and the latest conversation.
    /// Each part degrades to empty on failure.
    pub async fn start(&self) {
        info!(vendor_id = %self.inner.vendor_id, "opening vendor chat");
        let (vendor, chats, conversation) = tokio::join!(
            self.inner.api.vendor(&self.inner.vendor_id),
            self.inner.sessions.list(),
            self.inner.sessions.bootstrap(),
        );
        let vendor = vendor
            .inspect_err(|err| debug!(error = %err, "vendor context unavailable"))
            .ok();
        let chats = chats
            .inspect_err(|err| debug!(error = %err, "chat list unavailable"))
            .unwrap_or_default();
        self.update(|s| {
            s.vendor = vendor;
            s.chats = chats;
            s.conversation = conversation;
        });
    }

    /// Disposes the view. Outstanding requests and streams stop mutating it.
    pub fn stop(&self) {
        if self.is_active() {
            info!(vendor_id = %self.inner.vendor_id, "closing vendor chat");
        }
        self.inner.alive.cancel();
    }

    /// Replaces the input text and opens or closes the `@` popover. Returns
    /// whether a mention is being typed.
    pub fn set_input(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        self.update(|s| {
            match active_mention(&text) {
                Some(query) => {
                    s.mention.open = true;
                    s.mention.query = query.to_string();
                }
                None => s.mention.open = false,
            }
            s.input = text;
            s.mention.open
        })
        .unwrap_or(false)
    }

    pub fn set_mention_kind(&self, kind: MentionKind) {
        self.update(|s| s.mention.kind = kind);
    }

    /// Fetches candidates for the open popover. Safe to call on every
    /// keystroke: only the most recently issued lookup may store its result,
    /// and a failed lookup clears the list.
    pub async fn refresh_mentions(&self) {
        if !self.is_active() {
            return;
        }
        let limit = self.inner.mention_limit;
        let Some(query) = self.read(|s| {
            s.mention.open.then(|| MentionQuery {
                kind: s.mention.kind,
                query: s.mention.query.clone(),
                limit,
            })
        }) else {
            return;
        };

        let seq = self.inner.mention_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let items = match self.inner.api.mentions(&self.inner.vendor_id, &query).await {
            Ok(items) => items,
            Err(err) => {
                debug!(error = %err, kind = %query.kind, "mention lookup failed");
                Vec::new()
            }
        };
        let latest = &self.inner.mention_seq;
        self.update(|s| {
            if latest.load(Ordering::SeqCst) == seq {
                s.mention.items = items;
            } else {
                debug!(seq, "discarding stale mention lookup");
            }
        });
    }

    /// Tags the candidate `id` using the popover's current kind.
    pub fn select_mention(&self, id: &str) -> bool {
        let kind = self.read(|s| s.mention.kind);
        self.add_token(MentionToken::new(kind, id).to_string())
    }

    /// Adds a chip (idempotent) and closes the popover.
    pub fn add_token(&self, token: impl Into<String>) -> bool {
        let token = token.into();
        self.update(|s| {
            s.mention.open = false;
            s.tags.add(token)
        })
        .unwrap_or(false)
    }

    pub fn remove_token(&self, token: &str) -> bool {
        self.update(|s| s.tags.remove(token)).unwrap_or(false)
    }

    pub fn tokens(&self) -> Vec<String> {
        self.read(|s| s.tags.tokens().to_vec())
    }

    /// Switches the context panel to `kind`, clearing the checked rows.
    pub fn set_selection_kind(&self, kind: MentionKind) {
        self.update(|s| {
            s.selection.kind = kind;
            s.selection.ids.clear();
            s.sync_selection();
        });
    }

    /// Checks or unchecks `id` in the context panel. Returns whether it is
    /// now checked.
    pub fn toggle_selection(&self, id: &str) -> bool {
        self.update(|s| {
            let checked = match s.selection.ids.iter().position(|existing| existing == id) {
                Some(index) => {
                    s.selection.ids.remove(index);
                    false
                }
                None => {
                    s.selection.ids.push(id.to_string());
                    true
                }
            };
            s.sync_selection();
            checked
        })
        .unwrap_or(false)
    }

    pub async fn refresh_chats(&self) {
        match self.inner.sessions.list().await {
            Ok(chats) => {
                self.update(|s| s.chats = chats);
            }
            Err(err) => debug!(error = %err, "chat list refresh failed"),
        }
    }

    /// Opens another conversation. Id and messages are replaced together, and
    /// only once the messages have loaded.
    pub async fn switch_chat(&self, chat_id: &str) -> bool {
        match self.inner.sessions.switch(chat_id).await {
            Ok(Some(conversation)) => self
                .update(|s| s.conversation = conversation)
                .is_some(),
            Ok(None) => false,
            Err(err) => {
                warn!(chat_id, error = %err, "failed to switch chat");
                false
            }
        }
    }

    pub async fn new_chat(&self) -> bool {
        match self.inner.sessions.new_chat().await {
            Ok(conversation) => {
                if self.update(|s| s.conversation = conversation).is_none() {
                    return false;
                }
                self.refresh_chats().await;
                true
            }
            Err(err) => {
                warn!(error = %err, "failed to create chat");
                false
            }
        }
    }

    /// Prepends the page of history older than the oldest loaded message.
    /// Returns how many messages were added.
    pub async fn load_older(&self) -> usize {
        let Some((chat_id, oldest)) = self.read(|s| {
            let chat_id = s.conversation.id.clone()?;
            let oldest = s.conversation.messages.first()?.id.clone();
            (!is_local_id(&oldest)).then_some((chat_id, oldest))
        }) else {
            return 0;
        };
        let older = match self.inner.sessions.load_messages(&chat_id, Some(&oldest)).await {
            Ok(older) => older,
            Err(err) => {
                debug!(error = %err, "failed to load older messages");
                return 0;
            }
        };
        self.update(|s| {
            if s.conversation.id.as_deref() != Some(chat_id.as_str()) {
                return 0;
            }
            let added = older.len();
            let mut merged = older;
            merged.append(&mut s.conversation.messages);
            s.conversation.messages = merged;
            added
        })
        .unwrap_or(0)
    }

    /// Sends the current input with the current tags.
    ///
    /// The user message and an empty streaming placeholder are appended
    /// before any request is made; the placeholder then tracks the reply and
    /// ends either complete or with `Error: ...`. Returns the placeholder id,
    /// or `None` when there is nothing to send or no open conversation.
    pub async fn send(&self) -> Option<String> {
        let n = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let placeholder_id = format!("stream-{n}");
        let stream = self.inner.stream;
        let (chat_id, request) = self
            .update(|s| {
                let chat_id = s.conversation.id.clone()?;
                if s.input.trim().is_empty() {
                    return None;
                }
                let prompt = std::mem::take(&mut s.input);
                let tags = s.tags.to_tag_set();
                s.mention.open = false;
                s.stream_started = Some(Instant::now());
                s.conversation.messages.push(ChatMessage::user(
                    format!("tmp-{n}"),
                    prompt.clone(),
                    tags.clone(),
                ));
                s.conversation
                    .messages
                    .push(ChatMessage::placeholder(placeholder_id.clone(), tags.clone()));
                Some((chat_id, SendMessage { prompt, tags, stream }))
            })
            .flatten()?;

        let result = if stream {
            self.stream_reply(&chat_id, &request, &placeholder_id).await
        } else {
            self.complete_reply(&chat_id, &request, &placeholder_id).await
        };

        match result {
            Ok(true) => self.refresh_chats().await,
            Ok(false) => debug!(%placeholder_id, "view closed before reply finished"),
            Err(err) => {
                warn!(%placeholder_id, error = %err, "send failed");
                self.update(|s| s.finish_placeholder(&placeholder_id, format!("Error: {err}")));
            }
        }
        Some(placeholder_id)
    }

    /// Returns `Ok(false)` when the view was closed mid-reply.
    async fn stream_reply(
        &self,
        chat_id: &str,
        request: &SendMessage,
        placeholder_id: &str,
    ) -> ChatResult<bool> {
        let body = self
            .inner
            .api
            .send_message_stream(&self.inner.vendor_id, chat_id, request)
            .await?;
        let outcome = fold_stream(body, |text| {
            match self.update(|s| s.render_placeholder(placeholder_id, text)) {
                Some(()) => ControlFlow::Continue(()),
                None => ControlFlow::Break(()),
            }
        })
        .await?;
        match outcome {
            FoldOutcome::Complete(text) => Ok(self
                .update(|s| s.finish_placeholder(placeholder_id, text))
                .is_some()),
            FoldOutcome::Stopped => Ok(false),
        }
    }

    async fn complete_reply(
        &self,
        chat_id: &str,
        request: &SendMessage,
        placeholder_id: &str,
    ) -> ChatResult<bool> {
        let reply = self
            .inner
            .api
            .send_message(&self.inner.vendor_id, chat_id, request)
            .await?;
        Ok(self
            .update(|s| s.finish_placeholder(placeholder_id, reply))
            .is_some())
    }

    fn read<R>(&self, f: impl FnOnce(&ChatState) -> R) -> R {
        let state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Applies `f` unless the view has been stopped, then bumps the revision.
    fn update<R>(&self, f: impl FnOnce(&mut ChatState) -> R) -> Option<R> {
        if !self.is_active() {
            return None;
        }
        let result = {
            let mut state = self
                .inner
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            f(&mut state)
        };
        self.inner.revision.send_modify(|rev| *rev += 1);
        Some(result)
    }
}
