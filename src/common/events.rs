use super::types::{AmbassadorProfile, ChatUser, Conversation, Message};

/// Events the network worker and socket task send up to the UI.
///
/// Failures carry the user-facing text already, so events stay `Clone`.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    ConversationsLoaded(Vec<Conversation>),
    MyUsersLoaded(Vec<ChatUser>),
    AmbassadorsLoaded(Vec<AmbassadorProfile>),
    AmbassadorChatsLoaded {
        ambassador_id: String,
        conversations: Vec<Conversation>,
    },
    HistoryLoaded {
        chat_id: String,
        generation: u64,
        messages: Vec<Message>,
    },
    HistoryFailed {
        chat_id: String,
        generation: u64,
        error: String,
    },
    MessageSent {
        temp_id: String,
        message: Message,
    },
    SendFailed {
        temp_id: String,
        error: String,
    },
    MessageDeleted {
        message_id: String,
    },
    DeleteFailed {
        message_id: String,
        error: String,
    },
    /// Pushed by the socket: a new message.
    LiveMessage(Message),
    /// Pushed by the socket: an existing message changed.
    LiveMessageUpdated(Message),
    /// Pushed by the socket: a message was removed.
    LiveMessageDeleted(String),
    LiveUpdatesConnected {
        chat_id: String,
    },
    LiveUpdatesUnavailable {
        chat_id: String,
        reason: String,
    },
    /// The intake flow finished; embed submissions have no chat id.
    IntakeCompleted {
        chat_id: Option<String>,
    },
    IntakeFailed(String),
    SessionExpired,
    Notice(String),
}
