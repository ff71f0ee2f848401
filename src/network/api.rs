use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::common::{
    AmbassadorProfile, ChatUser, Conversation, EmbedConfig, Message, VisitorIdentity,
    types::sort_by_recency,
};
use crate::error::{ChatError, Result};
use crate::session::Session;

use super::capability::{AdminCapability, ImpersonationGrant};
use super::transport::ChatTransport;
use super::wire::{WireConversation, WireEmbedConfig, WireEntity, WireMessage, WireStarted};

/// REST client for the chat backend.
pub struct ChatApi {
    client: Client,
    base_url: String,
    session: Arc<Session>,
}

impl ChatApi {
    pub fn new(base_url: impl Into<String>, session: Arc<Session>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attaches the token as it is stored right now.
    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.session.bearer_token()?.ok_or(ChatError::Auth)?;
        Ok(request.bearer_auth(token))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ChatError::Auth);
        }

        let text = response.text().await?;
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::Null);

        if !status.is_success() {
            return Err(ChatError::Transport {
                status: status.as_u16(),
                message: error_text(&body).unwrap_or_else(|| status.to_string()),
            });
        }
        if body.get("success") == Some(&Value::Bool(false)) {
            return Err(ChatError::Transport {
                status: status.as_u16(),
                message: error_text(&body).unwrap_or_else(|| "request was rejected".to_string()),
            });
        }

        Ok(body)
    }

    async fn get_authorized(&self, path: &str) -> Result<Value> {
        log::debug!("GET {path}");
        let request = self.authorized(self.client.get(self.url(path)))?;
        self.execute(request).await
    }

    async fn post_authorized(&self, path: &str, body: Value) -> Result<Value> {
        log::debug!("POST {path}");
        let request = self.authorized(self.client.post(self.url(path)).json(&body))?;
        self.execute(request).await
    }

    async fn fetch_messages(&self, path: &str, chat_id: &str) -> Result<Vec<Message>> {
        let mut body = self.get_authorized(path).await?;
        let wire: Vec<WireMessage> = take_field(&mut body, &["data"])?;
        let mut messages = wire
            .into_iter()
            .map(|message| message.into_message(Some(chat_id)))
            .collect::<Result<Vec<_>>>()?;
        messages.sort_by_key(|message| message.created_at);
        Ok(messages)
    }

    fn conversations_from(body: &mut Value) -> Result<Vec<Conversation>> {
        let wire: Vec<WireConversation> = take_field(body, &["data"])?;
        let mut conversations = wire
            .into_iter()
            .map(WireConversation::into_conversation)
            .collect::<Result<Vec<_>>>()?;
        sort_by_recency(&mut conversations);
        Ok(conversations)
    }
}

#[async_trait]
impl ChatTransport for ChatApi {
    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let mut body = self.get_authorized("/chat/my").await?;
        Self::conversations_from(&mut body)
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        self.fetch_messages(&format!("/chat/{chat_id}"), chat_id).await
    }

    async fn send_message(
        &self,
        chat_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> Result<Message> {
        let mut body = self
            .post_authorized(
                "/chat/send",
                json!({ "chatId": chat_id, "receiver": receiver_id, "content": content }),
            )
            .await?;
        let wire: WireMessage = take_field(&mut body, &["message", "data"])?;
        wire.into_message(Some(chat_id))
    }

    async fn delete_message(&self, message_id: &str) -> Result<()> {
        let path = format!("/chat/message/{message_id}");
        log::debug!("DELETE {path}");
        let request = self.authorized(self.client.delete(self.url(&path)))?;
        self.execute(request).await?;
        Ok(())
    }

    async fn start_conversation(
        &self,
        ambassador_id: &str,
        visitor: &VisitorIdentity,
    ) -> Result<Conversation> {
        log::debug!("POST /chat/start");
        let mut request = self.client.post(self.url("/chat/start")).json(&json!({
            "ambassadorId": ambassador_id,
            "name": visitor.name,
            "email": visitor.email,
            "phone": visitor.phone,
        }));
        // First-time visitors have no session yet.
        if let Some(token) = self.session.bearer_token()? {
            request = request.bearer_auth(token);
        }

        let body = self.execute(request).await?;
        let started: WireStarted = serde_json::from_value(body)?;
        if let Some(visitor_session) = started.visitor_session() {
            self.session.save(&visitor_session)?;
        }
        started.data.into_conversation()
    }

    async fn list_my_users(&self) -> Result<Vec<ChatUser>> {
        let mut body = self.get_authorized("/chat/my-users").await?;
        let wire: Vec<WireEntity> = take_field(&mut body, &["data"])?;
        Ok(wire.into_iter().map(ChatUser::from).collect())
    }

    async fn list_ambassadors(&self) -> Result<Vec<AmbassadorProfile>> {
        let mut body = self.get_authorized("/auth/ambassadors").await?;
        let wire: Vec<WireEntity> = take_field(&mut body, &["data"])?;
        Ok(wire.into_iter().map(AmbassadorProfile::from).collect())
    }

    async fn admin_list_ambassador_chats(
        &self,
        capability: &AdminCapability,
        ambassador_id: &str,
    ) -> Result<(Vec<Conversation>, ImpersonationGrant)> {
        let mut body = self
            .get_authorized(&format!("/chat/admin/ambassador/{ambassador_id}/chats"))
            .await?;
        let conversations = Self::conversations_from(&mut body)?;
        let grant = ImpersonationGrant::issue(capability, ambassador_id, &conversations);
        Ok((conversations, grant))
    }

    async fn admin_list_chat_messages(
        &self,
        _capability: &AdminCapability,
        chat_id: &str,
    ) -> Result<Vec<Message>> {
        self.fetch_messages(&format!("/chat/admin/chat/{chat_id}/messages"), chat_id)
            .await
    }

    async fn send_message_as_ambassador(
        &self,
        grant: &ImpersonationGrant,
        chat_id: &str,
        recipient_user_id: &str,
        content: &str,
    ) -> Result<Message> {
        grant.check(chat_id)?;
        let mut body = self
            .post_authorized(
                "/chat/admin/send-as-ambassador",
                json!({
                    "chatId": chat_id,
                    "ambassadorId": grant.ambassador_id(),
                    "receiver": recipient_user_id,
                    "content": content,
                }),
            )
            .await?;
        let wire: WireMessage = take_field(&mut body, &["message", "data"])?;
        wire.into_message(Some(chat_id))
    }

    async fn get_embed_config(&self, config_key: &str) -> Result<EmbedConfig> {
        let path = format!("/embed/public/config/{config_key}");
        log::debug!("GET {path}");
        let mut body = self.execute(self.client.get(self.url(&path))).await?;
        let wire: WireEmbedConfig = take_field(&mut body, &["data"])?;
        wire.into_config(config_key)
    }

    async fn submit_embed(
        &self,
        config_key: &str,
        visitor: &VisitorIdentity,
        message: &str,
    ) -> Result<()> {
        log::debug!("POST /embed/submit");
        let request = self.client.post(self.url("/embed/submit")).json(&json!({
            "configKey": config_key,
            "name": visitor.name,
            "email": visitor.email,
            "phone": visitor.phone,
            "message": message,
        }));
        self.execute(request).await?;
        Ok(())
    }
}

fn error_text(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|field| body.get(*field).and_then(Value::as_str))
        .map(str::to_string)
}

/// Takes the first of `fields` that holds a JSON object or array.
fn take_field<T: DeserializeOwned>(body: &mut Value, fields: &[&str]) -> Result<T> {
    let field = fields
        .iter()
        .find(|field| {
            body.get(**field)
                .is_some_and(|value| value.is_object() || value.is_array())
        })
        .ok_or_else(|| ChatError::Protocol(format!("response has no `{}`", fields.join("`/`"))))?;
    let value = body.get_mut(*field).map(Value::take).unwrap_or(Value::Null);
    Ok(serde_json::from_value(value)?)
}
