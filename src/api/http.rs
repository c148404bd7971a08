use super::{
    ByteStream, ChatListResponse, MentionListResponse, MentionQuery, MessageListResponse,
    MessagePage, ReplyResponse, SendMessage, StartChat, StartChatResponse, VendorApi,
};
use crate::config::Config;
use crate::error::{ChatError, ChatResult};
use crate::types::{ChatMessage, ChatSummary, MentionCandidate, VendorContext};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

/// `VendorApi` over HTTP against the backend's `/api` root.
#[derive(Clone)]
pub struct HttpVendorApi {
    client: Client,
    base_url: Url,
}

impl HttpVendorApi {
    pub fn new(base_url: &str) -> ChatResult<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn from_config(config: &Config) -> ChatResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Self::with_client(client, &config.api_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> ChatResult<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|err| ChatError::InvalidUrl(format!("{base_url}: {err}")))?;
        if parsed.cannot_be_a_base() {
            return Err(ChatError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> ChatResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ChatError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn check(response: Response) -> ChatResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/json"));
    let body = response.text().await.unwrap_or_default();
    Err(ChatError::from_response_body(status, is_json, &body))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> ChatResult<T> {
    let body = check(response).await?.text().await?;
    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl VendorApi for HttpVendorApi {
    async fn start_chat(&self, vendor_id: &str, request: &StartChat) -> ChatResult<String> {
        let url = self.endpoint(&["vendors", vendor_id, "chat", "start"])?;
        debug!(%url, reuse_latest = request.reuse_latest, "starting chat");
        let response = self.client.post(url).json(request).send().await?;
        let body: StartChatResponse = read_json(response).await?;
        Ok(body.chat_id)
    }

    async fn list_chats(&self, vendor_id: &str, limit: usize) -> ChatResult<Vec<ChatSummary>> {
        let url = self.endpoint(&["vendors", vendor_id, "chat"])?;
        let response = self
            .client
            .get(url)
            .query(&[("limit", limit)])
            .send()
            .await?;
        let body: ChatListResponse = read_json(response).await?;
        Ok(body.chats)
    }

    async fn list_messages(
        &self,
        vendor_id: &str,
        chat_id: &str,
        page: MessagePage<'_>,
    ) -> ChatResult<Vec<ChatMessage>> {
        let url = self.endpoint(&["vendors", vendor_id, "chat", chat_id, "messages"])?;
        let mut query = vec![("limit", page.limit.to_string())];
        if let Some(before) = page.before {
            query.push(("before", before.to_string()));
        }
        let response = self.client.get(url).query(&query).send().await?;
        let body: MessageListResponse = read_json(response).await?;
        Ok(body.messages)
    }

    async fn send_message_stream(
        &self,
        vendor_id: &str,
        chat_id: &str,
        request: &SendMessage,
    ) -> ChatResult<ByteStream> {
        let url = self.endpoint(&["vendors", vendor_id, "chat", chat_id, "messages"])?;
        debug!(%url, "sending message (streaming)");
        let response = self
            .client
            .post(url)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response
            .bytes_stream()
            .map(|item| item.map(|bytes| bytes.to_vec()).map_err(ChatError::from))
            .boxed())
    }

    async fn send_message(
        &self,
        vendor_id: &str,
        chat_id: &str,
        request: &SendMessage,
    ) -> ChatResult<String> {
        let url = self.endpoint(&["vendors", vendor_id, "chat", chat_id, "messages"])?;
        debug!(%url, "sending message");
        let response = self.client.post(url).json(request).send().await?;
        let body: ReplyResponse = read_json(response).await?;
        Ok(body.reply)
    }

    async fn mentions(
        &self,
        vendor_id: &str,
        query: &MentionQuery,
    ) -> ChatResult<Vec<MentionCandidate>> {
        let url = self.endpoint(&["vendors", vendor_id, "mentions"])?;
        let mut params = vec![("kind", query.kind.as_query().to_string())];
        if !query.query.is_empty() {
            params.push(("q", query.query.clone()));
        }
        params.push(("limit", query.limit.to_string()));
        let response = self.client.get(url).query(&params).send().await?;
        let body: MentionListResponse = read_json(response).await?;
        Ok(body.items)
    }

    async fn vendor(&self, vendor_id: &str) -> ChatResult<VendorContext> {
        let url = self.endpoint(&["vendors", vendor_id])?;
        let response = self.client.get(url).send().await?;
        read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_extend_the_base_path() {
        let api = HttpVendorApi::new("http://localhost:5000/api").unwrap();
        let url = api.endpoint(&["vendors", "v-1", "chat", "start"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/vendors/v-1/chat/start");

        let api = HttpVendorApi::new("http://localhost:5000/api/").unwrap();
        let url = api.endpoint(&["vendors", "v-1"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/vendors/v-1");
    }

    #[test]
    fn path_segments_are_escaped() {
        let api = HttpVendorApi::new("http://localhost:5000/api").unwrap();
        let url = api.endpoint(&["vendors", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/vendors/a%2Fb%20c");
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(matches!(
            HttpVendorApi::new("not a url"),
            Err(ChatError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpVendorApi::new("mailto:ap@example.com"),
            Err(ChatError::InvalidUrl(_))
        ));
    }
}
