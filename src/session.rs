use crate::api::{MessagePage, StartChat, VendorApi};
use crate::config::Config;
use crate::error::ChatResult;
use crate::types::{ChatMessage, ChatSummary};
use std::sync::Arc;
use tracing::{info, warn};

/// One open conversation as the view renders it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Conversation {
    pub id: Option<String>,
    pub messages: Vec<ChatMessage>,
}

/// Conversation lifecycle for a single vendor.
#[derive(Clone)]
pub struct SessionManager {
    api: Arc<dyn VendorApi>,
    vendor_id: String,
    chat_limit: usize,
    message_limit: usize,
}

impl SessionManager {
    pub fn new(api: Arc<dyn VendorApi>, vendor_id: impl Into<String>, config: &Config) -> Self {
        Self {
            api,
            vendor_id: vendor_id.into(),
            chat_limit: config.chat_limit,
            message_limit: config.message_limit,
        }
    }

    pub fn vendor_id(&self) -> &str {
        &self.vendor_id
    }

    pub async fn start(&self, request: &StartChat) -> ChatResult<String> {
        self.api.start_chat(&self.vendor_id, request).await
    }

    pub async fn list(&self) -> ChatResult<Vec<ChatSummary>> {
        self.api.list_chats(&self.vendor_id, self.chat_limit).await
    }

    pub async fn load_messages(
        &self,
        chat_id: &str,
        before: Option<&str>,
    ) -> ChatResult<Vec<ChatMessage>> {
        let page = MessagePage {
            limit: self.message_limit,
            before,
        };
        self.api.list_messages(&self.vendor_id, chat_id, page).await
    }

    /// Reuses the latest conversation (or creates one) and loads its history.
    /// Any failure leaves an empty conversation so the view stays usable.
    pub async fn bootstrap(&self) -> Conversation {
        match self.open(&StartChat::reuse_latest()).await {
            Ok(conversation) => conversation,
            Err(err) => {
                warn!(vendor_id = %self.vendor_id, error = %err, "chat bootstrap failed");
                Conversation::default()
            }
        }
    }

    /// Loads `chat_id` in full so the caller can swap it in at once.
    /// An empty id yields `Ok(None)`.
    pub async fn switch(&self, chat_id: &str) -> ChatResult<Option<Conversation>> {
        if chat_id.is_empty() {
            return Ok(None);
        }
        let messages = self.load_messages(chat_id, None).await?;
        Ok(Some(Conversation {
            id: Some(chat_id.to_string()),
            messages,
        }))
    }

    /// Creates a new, empty conversation.
    pub async fn new_chat(&self) -> ChatResult<Conversation> {
        let id = self.start(&StartChat::fresh()).await?;
        info!(vendor_id = %self.vendor_id, chat_id = %id, "created chat");
        Ok(Conversation {
            id: Some(id),
            messages: Vec::new(),
        })
    }

    async fn open(&self, request: &StartChat) -> ChatResult<Conversation> {
        let id = self.start(request).await?;
        let messages = self.load_messages(&id, None).await?;
        info!(vendor_id = %self.vendor_id, chat_id = %id, messages = messages.len(), "opened chat");
        Ok(Conversation {
            id: Some(id),
            messages,
        })
    }
}
