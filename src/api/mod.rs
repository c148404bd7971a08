//! REST wrappers for the vendor chat endpoints.
//!
//! `VendorApi` is the seam between the view model and the backend: the
//! production implementation is [`HttpVendorApi`], tests plug in fakes.
mod http;

pub use http::HttpVendorApi;

use crate::error::ChatResult;
use crate::types::{ChatMessage, ChatSummary, MentionCandidate, MentionKind, TagSet, VendorContext};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Raw reply body, one item per received chunk.
pub type ByteStream = BoxStream<'static, ChatResult<Vec<u8>>>;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartChat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub reuse_latest: bool,
}

impl StartChat {
    pub fn reuse_latest() -> Self {
        Self {
            title: None,
            reuse_latest: true,
        }
    }

    pub fn fresh() -> Self {
        Self {
            title: None,
            reuse_latest: false,
        }
    }
}

/// Body of a message submission.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SendMessage {
    pub prompt: String,
    pub tags: TagSet,
    pub stream: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MessagePage<'a> {
    pub limit: usize,
    /// Only return messages older than this message id.
    pub before: Option<&'a str>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MentionQuery {
    pub kind: MentionKind,
    pub query: String,
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StartChatResponse {
    pub chat_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatListResponse {
    #[serde(default)]
    pub chats: Vec<ChatSummary>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageListResponse {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MentionListResponse {
    #[serde(default)]
    pub items: Vec<MentionCandidate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReplyResponse {
    #[serde(default)]
    pub reply: String,
}

#[async_trait]
pub trait VendorApi: Send + Sync {
    /// Returns the id of the vendor's latest conversation when
    /// `reuse_latest` is set and one exists, otherwise of a new one.
    async fn start_chat(&self, vendor_id: &str, request: &StartChat) -> ChatResult<String>;

    /// Conversations for the vendor, most recent first.
    async fn list_chats(&self, vendor_id: &str, limit: usize) -> ChatResult<Vec<ChatSummary>>;

    /// Messages of one conversation, oldest first.
    async fn list_messages(
        &self,
        vendor_id: &str,
        chat_id: &str,
        page: MessagePage<'_>,
    ) -> ChatResult<Vec<ChatMessage>>;

    /// Submits a message with `stream: true` and hands back the reply body.
    async fn send_message_stream(
        &self,
        vendor_id: &str,
        chat_id: &str,
        request: &SendMessage,
    ) -> ChatResult<ByteStream>;

    /// Submits a message with `stream: false` and waits for the whole reply.
    async fn send_message(
        &self,
        vendor_id: &str,
        chat_id: &str,
        request: &SendMessage,
    ) -> ChatResult<String>;

    async fn mentions(
        &self,
        vendor_id: &str,
        query: &MentionQuery,
    ) -> ChatResult<Vec<MentionCandidate>>;

    async fn vendor(&self, vendor_id: &str) -> ChatResult<VendorContext>;
}
