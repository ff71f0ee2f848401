use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of ids synthesized locally for messages not yet confirmed by the server.
pub const TEMP_ID_PREFIX: &str = "temp_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Ambassador,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Ambassador => "ambassador",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "user" | "student" => Ok(Role::User),
            "ambassador" => Ok(Role::Ambassador),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SenderRole {
    #[default]
    #[serde(rename = "user")]
    User,
    #[serde(rename = "ambassador")]
    Ambassador,
    #[serde(rename = "admin-acting-as-ambassador")]
    AdminAsAmbassador,
}

/// Client-tracked delivery state; the server is authoritative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sending,
    #[default]
    Sent,
    Delivered,
    Read,
}

/// A chat message. `content` is stored exactly as submitted; redaction is
/// applied only when rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_role: SenderRole,
    pub receiver_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub status: MessageStatus,
    pub is_temporary: bool,
}

impl Message {
    /// Builds the optimistic local copy of an outbound message.
    pub fn optimistic(
        chat_id: &str,
        sender_id: &str,
        sender_role: SenderRole,
        receiver_id: &str,
        content: &str,
    ) -> Self {
        let now = Utc::now();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: format!("{TEMP_ID_PREFIX}{}_{}", now.timestamp_millis(), &suffix[..8]),
            chat_id: chat_id.to_string(),
            sender_id: sender_id.to_string(),
            sender_role,
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            created_at: now,
            status: MessageStatus::Sending,
            is_temporary: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub role: Role,
}

/// Conversation summary: the two participants and a snapshot of the latest message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub participants: Vec<Participant>,
    pub last_message: Option<Message>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// The participant that is not `me`.
    pub fn other_participant(&self, me: &str) -> Option<&Participant> {
        self.participants.iter().find(|participant| participant.id != me)
    }

    pub fn participant_with_role(&self, role: Role) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|participant| participant.role == role)
    }

    pub fn involves(&self, participant_id: &str) -> bool {
        self.participants
            .iter()
            .any(|participant| participant.id == participant_id)
    }

    fn recency(&self) -> Option<DateTime<Utc>> {
        self.last_message
            .as_ref()
            .map(|message| message.created_at)
            .or(self.updated_at)
    }
}

/// Orders summaries most recent first; conversations without activity go last.
pub fn sort_by_recency(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| b.recency().cmp(&a.recency()));
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbassadorProfile {
    pub id: String,
    pub name: String,
    pub course: Option<String>,
}

/// Contact details collected from a first-time visitor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitorIdentity {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Public configuration of an embeddable widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedConfig {
    pub config_key: String,
    pub ambassador_id: String,
    pub ambassador_name: Option<String>,
    pub title: Option<String>,
    pub welcome_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn participant(id: &str, role: Role) -> Participant {
        Participant {
            id: id.to_string(),
            name: id.to_uppercase(),
            role,
        }
    }

    fn conversation(id: &str, at: Option<i64>) -> Conversation {
        Conversation {
            id: id.to_string(),
            participants: vec![participant("u1", Role::User), participant("a1", Role::Ambassador)],
            last_message: None,
            updated_at: at.map(|secs| Utc.timestamp_opt(secs, 0).unwrap()),
        }
    }

    #[test]
    fn other_participant_is_the_complement() {
        let chat = conversation("c1", None);
        assert_eq!(chat.other_participant("a1").map(|p| p.id.as_str()), Some("u1"));
        assert_eq!(chat.other_participant("u1").map(|p| p.id.as_str()), Some("a1"));
    }

    #[test]
    fn recency_sort_puts_latest_first() {
        let mut chats = vec![
            conversation("old", Some(10)),
            conversation("none", None),
            conversation("new", Some(20)),
        ];
        sort_by_recency(&mut chats);
        let ids: Vec<_> = chats.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["new", "old", "none"]);
    }

    #[test]
    fn optimistic_messages_are_temporary_and_sending() {
        let message = Message::optimistic("c1", "a1", SenderRole::Ambassador, "u1", "hi");
        assert!(message.id.starts_with(TEMP_ID_PREFIX));
        assert!(message.is_temporary);
        assert_eq!(message.status, MessageStatus::Sending);
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("Ambassador".parse::<Role>(), Ok(Role::Ambassador));
        assert!("guest".parse::<Role>().is_err());
    }
}
