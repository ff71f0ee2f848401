//! Server payload shapes and their conversion into the canonical domain types.
//!
//! The API mixes `_id` and `id` and sends references either as bare ids or as
//! populated objects. Both are accepted here and nothing past this module
//! sees the difference.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::common::{
    AmbassadorProfile, ChatUser, Conversation, EmbedConfig, Message, MessageStatus, Participant,
    Role, SenderRole,
};
use crate::error::{ChatError, Result};
use crate::session::{AuthState, Identity};

/// A document id sent as `_id`, `id`, or both. Virtual-enabled serializers
/// emit both keys, so a plain alias would reject the document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawDocumentKey")]
pub struct DocumentKey(String);

#[derive(Deserialize)]
struct RawDocumentKey {
    #[serde(rename = "_id", default)]
    object_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

impl TryFrom<RawDocumentKey> for DocumentKey {
    type Error = String;

    fn try_from(raw: RawDocumentKey) -> std::result::Result<Self, Self::Error> {
        raw.object_id
            .or(raw.id)
            .filter(|id| !id.is_empty())
            .map(DocumentKey)
            .ok_or_else(|| "document has neither `_id` nor `id`".to_string())
    }
}

impl DocumentKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl PartialEq<&str> for DocumentKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEntity {
    #[serde(flatten)]
    pub id: DocumentKey,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
}

/// A reference that may or may not have been populated by the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireRef {
    Id(String),
    Entity(WireEntity),
}

impl WireRef {
    pub fn id(&self) -> &str {
        match self {
            WireRef::Id(id) => id,
            WireRef::Entity(entity) => entity.id.as_str(),
        }
    }

    fn role(&self) -> Option<&str> {
        match self {
            WireRef::Id(_) => None,
            WireRef::Entity(entity) => entity.role.as_deref(),
        }
    }

    fn into_participant(self, role_hint: Option<Role>) -> Participant {
        match self {
            WireRef::Id(id) => Participant {
                id,
                name: String::new(),
                role: role_hint.unwrap_or(Role::User),
            },
            WireRef::Entity(entity) => {
                let role = role_hint
                    .or_else(|| entity.role.as_deref().and_then(|role| role.parse().ok()))
                    .unwrap_or(Role::User);
                Participant {
                    id: entity.id.into_string(),
                    name: entity.name.unwrap_or_default(),
                    role,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    #[serde(flatten)]
    pub id: DocumentKey,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub chat: Option<WireRef>,
    #[serde(default)]
    pub sender: Option<WireRef>,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub sender_role: Option<String>,
    #[serde(default)]
    pub receiver: Option<WireRef>,
    #[serde(default)]
    pub receiver_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<MessageStatus>,
    #[serde(default)]
    pub is_read: Option<bool>,
    #[serde(default)]
    pub sent_by_admin: Option<bool>,
}

impl WireMessage {
    /// `fallback_chat` fills in the chat id for endpoints that omit it.
    pub fn into_message(self, fallback_chat: Option<&str>) -> Result<Message> {
        let chat_id = self
            .chat_id
            .or_else(|| self.chat.as_ref().map(|chat| chat.id().to_string()))
            .or_else(|| fallback_chat.map(str::to_string))
            .ok_or_else(|| ChatError::Protocol(format!("message {} has no chat id", self.id.as_str())))?;

        let sender_role = resolve_sender_role(
            self.sent_by_admin.unwrap_or(false),
            self.sender_role.as_deref(),
            self.sender.as_ref().and_then(WireRef::role),
        );

        let sender_id = self
            .sender_id
            .or_else(|| self.sender.as_ref().map(|sender| sender.id().to_string()))
            .unwrap_or_default();
        let receiver_id = self
            .receiver_id
            .or_else(|| self.receiver.as_ref().map(|receiver| receiver.id().to_string()))
            .unwrap_or_default();

        let status = match (self.status, self.is_read) {
            (Some(status), _) => status,
            (None, Some(true)) => MessageStatus::Read,
            (None, _) => MessageStatus::Sent,
        };

        Ok(Message {
            id: self.id.into_string(),
            chat_id,
            sender_id,
            sender_role,
            receiver_id,
            content: self.content,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            status,
            is_temporary: false,
        })
    }
}

fn resolve_sender_role(
    sent_by_admin: bool,
    explicit: Option<&str>,
    sender_entity_role: Option<&str>,
) -> SenderRole {
    if sent_by_admin {
        return SenderRole::AdminAsAmbassador;
    }
    match explicit.or(sender_entity_role) {
        Some("admin-acting-as-ambassador") | Some("admin") => SenderRole::AdminAsAmbassador,
        Some("ambassador") => SenderRole::Ambassador,
        _ => SenderRole::User,
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireConversation {
    #[serde(flatten)]
    pub id: DocumentKey,
    #[serde(default)]
    pub participants: Vec<WireRef>,
    #[serde(default)]
    pub user: Option<WireRef>,
    #[serde(default)]
    pub ambassador: Option<WireRef>,
    #[serde(default)]
    pub last_message: Option<WireMessage>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl WireConversation {
    pub fn into_conversation(self) -> Result<Conversation> {
        let mut participants = Vec::with_capacity(2);
        if let Some(user) = self.user {
            participants.push(user.into_participant(Some(Role::User)));
        }
        if let Some(ambassador) = self.ambassador {
            participants.push(ambassador.into_participant(Some(Role::Ambassador)));
        }
        for participant in self.participants {
            if !participants.iter().any(|known| known.id == participant.id()) {
                participants.push(participant.into_participant(None));
            }
        }

        let last_message = self
            .last_message
            .map(|message| message.into_message(Some(self.id.as_str())))
            .transpose()?;

        Ok(Conversation {
            id: self.id.into_string(),
            participants,
            last_message,
            updated_at: self.updated_at,
        })
    }
}

impl From<WireEntity> for ChatUser {
    fn from(entity: WireEntity) -> Self {
        ChatUser {
            id: entity.id.into_string(),
            name: entity.name.unwrap_or_default(),
            email: entity.email,
        }
    }
}

impl From<WireEntity> for AmbassadorProfile {
    fn from(entity: WireEntity) -> Self {
        AmbassadorProfile {
            id: entity.id.into_string(),
            name: entity.name.unwrap_or_default(),
            course: entity.course,
        }
    }
}

/// Response of `POST /chat/start`; the token is present when the server
/// registered the visitor as a new user.
#[derive(Debug, Clone, Deserialize)]
pub struct WireStarted {
    pub data: WireConversation,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<WireEntity>,
}

impl WireStarted {
    pub fn visitor_session(&self) -> Option<AuthState> {
        let token = self.token.clone().filter(|token| !token.is_empty())?;
        let user = self.user.as_ref()?;
        Some(AuthState {
            token,
            user: Identity {
                id: user.id.as_str().to_string(),
                role: user
                    .role
                    .as_deref()
                    .and_then(|role| role.parse().ok())
                    .unwrap_or(Role::User),
                name: user.name.clone().unwrap_or_default(),
                email: user.email.clone(),
            },
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEmbedConfig {
    #[serde(default)]
    pub config_key: Option<String>,
    #[serde(default)]
    pub ambassador_id: Option<String>,
    #[serde(default)]
    pub ambassador: Option<WireRef>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub welcome_message: Option<String>,
}

impl WireEmbedConfig {
    pub fn into_config(self, requested_key: &str) -> Result<EmbedConfig> {
        let ambassador_name = match &self.ambassador {
            Some(WireRef::Entity(entity)) => entity.name.clone(),
            _ => None,
        };
        let ambassador_id = self
            .ambassador_id
            .or_else(|| self.ambassador.as_ref().map(|a| a.id().to_string()))
            .ok_or_else(|| ChatError::Protocol("embed config has no ambassador".to_string()))?;

        Ok(EmbedConfig {
            config_key: self.config_key.unwrap_or_else(|| requested_key.to_string()),
            ambassador_id,
            ambassador_name,
            title: self.title,
            welcome_message: self.welcome_message,
        })
    }
}

/// Payload of a `messageDeleted` event.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireDeleted {
    Id(String),
    Object {
        #[serde(rename = "messageId", default)]
        message_id: Option<String>,
        #[serde(flatten)]
        key: Option<DocumentKey>,
    },
}

impl WireDeleted {
    pub fn into_id(self) -> Option<String> {
        match self {
            WireDeleted::Id(id) => Some(id),
            WireDeleted::Object { message_id, key } => {
                message_id.or_else(|| key.map(DocumentKey::into_string))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn populated_and_bare_references_normalize_alike() {
        let populated: WireMessage = serde_json::from_value(json!({
            "_id": "m1",
            "chat": { "_id": "c1" },
            "sender": { "_id": "a1", "name": "Asha", "role": "ambassador" },
            "receiver": "u1",
            "content": "hello",
            "createdAt": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        let bare: WireMessage = serde_json::from_value(json!({
            "id": "m1",
            "chatId": "c1",
            "senderId": "a1",
            "senderRole": "ambassador",
            "receiverId": "u1",
            "content": "hello",
            "createdAt": "2024-05-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(
            populated.into_message(None).unwrap(),
            bare.into_message(None).unwrap()
        );
    }

    #[test]
    fn admin_sent_messages_are_attributed_to_acting_admin() {
        let wire: WireMessage = serde_json::from_value(json!({
            "_id": "m2", "chatId": "c1", "sender": "a1", "content": "hi", "sentByAdmin": true
        }))
        .unwrap();
        let message = wire.into_message(None).unwrap();
        assert_eq!(message.sender_role, SenderRole::AdminAsAmbassador);
        assert_eq!(message.sender_id, "a1");
    }

    #[test]
    fn message_without_any_chat_reference_is_rejected() {
        let wire: WireMessage =
            serde_json::from_value(json!({ "_id": "m3", "content": "x" })).unwrap();
        assert!(matches!(wire.into_message(None), Err(ChatError::Protocol(_))));
    }

    #[test]
    fn read_flag_maps_to_status() {
        let wire: WireMessage = serde_json::from_value(
            json!({ "_id": "m4", "chatId": "c1", "content": "x", "isRead": true }),
        )
        .unwrap();
        assert_eq!(wire.into_message(None).unwrap().status, MessageStatus::Read);
    }

    #[test]
    fn conversation_participants_from_role_fields() {
        let wire: WireConversation = serde_json::from_value(json!({
            "_id": "c1",
            "user": { "_id": "u1", "name": "Ravi" },
            "ambassador": { "_id": "a1", "name": "Asha" },
            "participants": ["u1", "a1"],
            "lastMessage": { "_id": "m1", "sender": "u1", "content": "hey" }
        }))
        .unwrap();
        let chat = wire.into_conversation().unwrap();
        assert_eq!(chat.participants.len(), 2);
        assert_eq!(chat.participant_with_role(Role::Ambassador).unwrap().name, "Asha");
        assert_eq!(chat.last_message.unwrap().chat_id, "c1");
    }

    #[test]
    fn delete_payload_shapes() {
        for payload in [
            json!("m1"),
            json!({ "_id": "m1" }),
            json!({ "_id": "m1", "id": "m1" }),
            json!({ "messageId": "m1" }),
        ] {
            let deleted: WireDeleted = serde_json::from_value(payload).unwrap();
            assert_eq!(deleted.into_id().as_deref(), Some("m1"));
        }
    }

    #[test]
    fn documents_carrying_both_id_keys_are_accepted() {
        let message: WireMessage = serde_json::from_value(json!({
            "_id": "m1",
            "id": "m1",
            "chat": { "_id": "c1", "id": "c1" },
            "sender": { "_id": "a1", "id": "a1", "role": "ambassador" },
            "content": "hello"
        }))
        .unwrap();
        let message = message.into_message(None).unwrap();
        assert_eq!(message.id, "m1");
        assert_eq!(message.chat_id, "c1");
        assert_eq!(message.sender_role, SenderRole::Ambassador);

        let chats: Vec<WireConversation> = serde_json::from_value(json!([
            { "_id": "c1", "id": "c1", "user": "u1", "ambassador": { "_id": "a1", "id": "a1" } },
            { "id": "c2", "user": "u2", "ambassador": "a1" }
        ]))
        .unwrap();
        let ids: Vec<String> = chats
            .into_iter()
            .map(|chat| chat.into_conversation().unwrap().id)
            .collect();
        assert_eq!(ids, ["c1", "c2"]);
    }

    #[test]
    fn document_without_any_id_is_rejected() {
        let result = serde_json::from_value::<WireMessage>(json!({ "chatId": "c1", "content": "x" }));
        assert!(result.is_err());
    }
}
