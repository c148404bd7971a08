//! Scripted in-memory backend shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc;
use reqwest::StatusCode;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use vendorchat::api::{ByteStream, MentionQuery, MessagePage, SendMessage, StartChat, VendorApi};
use vendorchat::types::{ChatMessage, ChatSummary, MentionCandidate, MentionMeta, Role, TagSet, VendorContext};
use vendorchat::{ChatError, ChatResult, Config};

pub const VENDOR: &str = "v-1";

/// How the next submitted message is answered.
pub enum Reply {
    /// Streamed body delivered all at once, chunk by chunk.
    Chunks(Vec<ChatResult<Vec<u8>>>),
    /// Streamed body fed by the test through a [`ReplyFeed`].
    Feed(mpsc::UnboundedReceiver<ChatResult<Vec<u8>>>),
    /// The submission itself is rejected.
    Reject(ChatError),
    /// Whole reply for non-streaming sends.
    Text(String),
}

/// Sending half of a [`Reply::Feed`].
pub struct ReplyFeed(mpsc::UnboundedSender<ChatResult<Vec<u8>>>);

impl ReplyFeed {
    pub fn chunk(&self, text: &str) {
        let _ = self.0.unbounded_send(Ok(text.as_bytes().to_vec()));
    }

    pub fn fail(&self, err: ChatError) {
        let _ = self.0.unbounded_send(Err(err));
    }
}

pub fn feed() -> (ReplyFeed, Reply) {
    let (tx, rx) = mpsc::unbounded();
    (ReplyFeed(tx), Reply::Feed(rx))
}

pub fn chunks(parts: &[&str]) -> Reply {
    Reply::Chunks(parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect())
}

pub fn server_error(message: &str) -> ChatError {
    ChatError::Status {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.to_string(),
    }
}

pub fn message(id: &str, role: Role, content: &str) -> ChatMessage {
    ChatMessage {
        id: id.to_string(),
        role,
        content: content.to_string(),
        tags: TagSet::default(),
        created_at: None,
        streaming: false,
    }
}

pub fn candidate(id: &str, label: &str) -> MentionCandidate {
    MentionCandidate {
        id: id.to_string(),
        label: label.to_string(),
        meta: MentionMeta::default(),
    }
}

pub fn test_config() -> Config {
    Config {
        api_url: "http://backend.test/api".into(),
        chat_limit: 20,
        message_limit: 2,
        mention_limit: 8,
        stream: true,
        connect_timeout: Duration::from_secs(1),
    }
}

#[derive(Default)]
struct FakeState {
    /// Most recent first.
    chats: Vec<ChatSummary>,
    messages: HashMap<String, Vec<ChatMessage>>,
    next_chat: u32,
    replies: VecDeque<Reply>,
    sent: Vec<(String, SendMessage)>,
    mentions: HashMap<String, Vec<MentionCandidate>>,
    mention_queries: Vec<MentionQuery>,
    gates: HashMap<String, Arc<Notify>>,
    vendor: Option<VendorContext>,
    failing: HashSet<&'static str>,
    list_calls: usize,
}

/// `VendorApi` over in-memory chats for vendor [`VENDOR`].
#[derive(Clone, Default)]
pub struct FakeApi {
    state: Arc<Mutex<FakeState>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn add_chat(&self, id: &str, title: &str, messages: Vec<ChatMessage>) {
        self.with(|s| {
            s.chats.insert(
                0,
                ChatSummary {
                    id: id.to_string(),
                    title: Some(title.to_string()),
                    created_at: None,
                    updated_at: None,
                },
            );
            s.messages.insert(id.to_string(), messages);
        });
    }

    pub fn set_vendor(&self, vendor: VendorContext) {
        self.with(|s| s.vendor = Some(vendor));
    }

    pub fn push_reply(&self, reply: Reply) {
        self.with(|s| s.replies.push_back(reply));
    }

    pub fn set_mentions(&self, query: &str, items: Vec<MentionCandidate>) {
        self.with(|s| s.mentions.insert(query.to_string(), items));
    }

    /// Holds lookups for `query` until the returned gate is notified.
    pub fn gate_mentions(&self, query: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.with(|s| s.gates.insert(query.to_string(), gate.clone()));
        gate
    }

    /// Makes every call to `endpoint` fail, e.g. `"messages"` or `"mentions"`.
    pub fn fail(&self, endpoint: &'static str) {
        self.with(|s| s.failing.insert(endpoint));
    }

    pub fn recover(&self, endpoint: &'static str) {
        self.with(|s| s.failing.remove(endpoint));
    }

    pub fn sent(&self) -> Vec<(String, SendMessage)> {
        self.with(|s| s.sent.clone())
    }

    pub fn mention_queries(&self) -> Vec<MentionQuery> {
        self.with(|s| s.mention_queries.clone())
    }

    pub fn chat_count(&self) -> usize {
        self.with(|s| s.chats.len())
    }

    pub fn list_calls(&self) -> usize {
        self.with(|s| s.list_calls)
    }

    fn check(&self, endpoint: &'static str, vendor_id: &str) -> ChatResult<()> {
        if vendor_id != VENDOR {
            return Err(ChatError::Status {
                status: StatusCode::NOT_FOUND,
                message: "vendor not found".into(),
            });
        }
        if self.with(|s| s.failing.contains(endpoint)) {
            return Err(server_error(&format!("{endpoint} unavailable")));
        }
        Ok(())
    }

    fn record_send(&self, chat_id: &str, request: &SendMessage) -> ChatResult<Reply> {
        self.with(|s| {
            if !s.messages.contains_key(chat_id) {
                return Err(ChatError::Status {
                    status: StatusCode::FORBIDDEN,
                    message: "chat does not belong to vendor".into(),
                });
            }
            s.sent.push((chat_id.to_string(), request.clone()));
            s.replies
                .pop_front()
                .ok_or_else(|| server_error("no scripted reply"))
        })
    }
}

#[async_trait]
impl VendorApi for FakeApi {
    async fn start_chat(&self, vendor_id: &str, request: &StartChat) -> ChatResult<String> {
        self.check("start", vendor_id)?;
        Ok(self.with(|s| {
            if request.reuse_latest
                && let Some(latest) = s.chats.first()
            {
                return latest.id.clone();
            }
            s.next_chat += 1;
            let id = format!("c-new-{}", s.next_chat);
            s.chats.insert(
                0,
                ChatSummary {
                    id: id.clone(),
                    title: request.title.clone(),
                    created_at: None,
                    updated_at: None,
                },
            );
            s.messages.insert(id.clone(), Vec::new());
            id
        }))
    }

    async fn list_chats(&self, vendor_id: &str, limit: usize) -> ChatResult<Vec<ChatSummary>> {
        self.check("chats", vendor_id)?;
        Ok(self.with(|s| {
            s.list_calls += 1;
            s.chats.iter().take(limit).cloned().collect()
        }))
    }

    async fn list_messages(
        &self,
        vendor_id: &str,
        chat_id: &str,
        page: MessagePage<'_>,
    ) -> ChatResult<Vec<ChatMessage>> {
        self.check("messages", vendor_id)?;
        self.with(|s| {
            let all = s
                .messages
                .get(chat_id)
                .ok_or_else(|| server_error("chat not found"))?;
            let end = match page.before {
                Some(before) => all.iter().position(|m| m.id == before).unwrap_or(all.len()),
                None => all.len(),
            };
            let start = end.saturating_sub(page.limit);
            Ok(all[start..end].to_vec())
        })
    }

    async fn send_message_stream(
        &self,
        vendor_id: &str,
        chat_id: &str,
        request: &SendMessage,
    ) -> ChatResult<ByteStream> {
        self.check("send", vendor_id)?;
        match self.record_send(chat_id, request)? {
            Reply::Chunks(items) => Ok(futures::stream::iter(items).boxed()),
            Reply::Feed(rx) => Ok(rx.boxed()),
            Reply::Reject(err) => Err(err),
            Reply::Text(text) => Ok(futures::stream::iter(vec![Ok(text.into_bytes())]).boxed()),
        }
    }

    async fn send_message(
        &self,
        vendor_id: &str,
        chat_id: &str,
        request: &SendMessage,
    ) -> ChatResult<String> {
        self.check("send", vendor_id)?;
        match self.record_send(chat_id, request)? {
            Reply::Text(text) => Ok(text),
            Reply::Reject(err) => Err(err),
            Reply::Chunks(_) | Reply::Feed(_) => Err(server_error("expected a streamed send")),
        }
    }

    async fn mentions(
        &self,
        vendor_id: &str,
        query: &MentionQuery,
    ) -> ChatResult<Vec<MentionCandidate>> {
        let gate = self.with(|s| {
            s.mention_queries.push(query.clone());
            s.gates.get(&query.query).cloned()
        });
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.check("mentions", vendor_id)?;
        Ok(self.with(|s| {
            s.mentions
                .get(&query.query)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .take(query.limit)
                .collect()
        }))
    }

    async fn vendor(&self, vendor_id: &str) -> ChatResult<VendorContext> {
        self.check("vendor", vendor_id)?;
        self.with(|s| s.vendor.clone())
            .ok_or_else(|| server_error("vendor not found"))
    }
}

/// Yields until `condition` holds, failing the test after a second.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}
