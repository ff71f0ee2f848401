pub mod commands;
pub mod events;
pub mod types;

pub use commands::{ChatCommand, OutboundMessage};
pub use events::ChatEvent;
pub use types::{
    AmbassadorProfile, ChatUser, Conversation, EmbedConfig, Message, MessageStatus, Participant,
    Role, SenderRole, VisitorIdentity,
};
