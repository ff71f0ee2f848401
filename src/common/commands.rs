use super::types::VisitorIdentity;

/// An outbound message handed to the network worker after it passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub temp_id: String,
    pub chat_id: String,
    pub receiver_id: String,
    pub content: String,
    /// Set when an admin writes on behalf of this ambassador.
    pub as_ambassador: Option<String>,
}

/// Commands the UI sends down to the network worker.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    RefreshConversations,
    LoadMyUsers,
    /// Admin: list ambassadors for the first-level picker.
    LoadAmbassadors,
    /// Admin: list one ambassador's conversations and grant write access to them.
    SelectAmbassador {
        ambassador_id: String,
    },
    /// Fetch history, then connect live updates scoped to this conversation.
    /// `generation` is echoed back so superseded fetches can be told apart.
    OpenConversation {
        chat_id: String,
        generation: u64,
        admin_view: bool,
    },
    CloseConversation,
    SendMessage(OutboundMessage),
    DeleteMessage {
        message_id: String,
    },
    StartConversation {
        ambassador_id: String,
        visitor: VisitorIdentity,
        first_message: String,
    },
    SubmitEmbed {
        config_key: String,
        visitor: VisitorIdentity,
        message: String,
    },
}
