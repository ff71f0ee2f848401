use async_trait::async_trait;

use crate::common::{AmbassadorProfile, ChatUser, Conversation, EmbedConfig, Message, VisitorIdentity};
use crate::error::Result;

use super::capability::{AdminCapability, ImpersonationGrant};

/// Request/response operations against the chat backend.
///
/// Implementations authenticate each call with the token current at call
/// time and return entities already normalized to their canonical ids.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Conversations of the signed-in identity, most recent first.
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;

    /// Full history of one conversation, oldest first.
    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>>;

    async fn send_message(&self, chat_id: &str, receiver_id: &str, content: &str)
    -> Result<Message>;

    async fn delete_message(&self, message_id: &str) -> Result<()>;

    /// Creates the conversation between the visitor and the ambassador, or
    /// returns the existing one.
    async fn start_conversation(
        &self,
        ambassador_id: &str,
        visitor: &VisitorIdentity,
    ) -> Result<Conversation>;

    async fn list_my_users(&self) -> Result<Vec<ChatUser>>;

    async fn list_ambassadors(&self) -> Result<Vec<AmbassadorProfile>>;

    async fn admin_list_ambassador_chats(
        &self,
        capability: &AdminCapability,
        ambassador_id: &str,
    ) -> Result<(Vec<Conversation>, ImpersonationGrant)>;

    async fn admin_list_chat_messages(
        &self,
        capability: &AdminCapability,
        chat_id: &str,
    ) -> Result<Vec<Message>>;

    /// Rejects chats outside `grant` without touching the network.
    async fn send_message_as_ambassador(
        &self,
        grant: &ImpersonationGrant,
        chat_id: &str,
        recipient_user_id: &str,
        content: &str,
    ) -> Result<Message>;

    async fn get_embed_config(&self, config_key: &str) -> Result<EmbedConfig>;

    async fn submit_embed(
        &self,
        config_key: &str,
        visitor: &VisitorIdentity,
        message: &str,
    ) -> Result<()>;
}
