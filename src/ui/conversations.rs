use crate::common::{Conversation, Participant, Role};

/// Conversation summaries for the signed-in identity plus the current selection.
#[derive(Debug, Default)]
pub struct ConversationList {
    conversations: Vec<Conversation>,
    selected: Option<String>,
}

impl ConversationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the summaries. The selection survives a refresh.
    pub fn replace(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
    }

    pub fn clear(&mut self) {
        self.conversations.clear();
        self.selected = None;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.iter()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn get(&self, chat_id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|chat| chat.id == chat_id)
    }

    pub fn select(&mut self, chat_id: &str) {
        self.selected = Some(chat_id.to_string());
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected(&self) -> Option<&Conversation> {
        self.selected_id().and_then(|chat_id| self.get(chat_id))
    }

    pub fn is_selected(&self, chat_id: &str) -> bool {
        self.selected.as_deref() == Some(chat_id)
    }
}

/// The participant shown as "the other side" of a conversation.
///
/// `acting_as` is the identity whose messages count as ours: the signed-in
/// user, or for admins the ambassador they are acting for.
pub fn counterpart<'a>(
    conversation: &'a Conversation,
    viewer_role: Role,
    acting_as: &str,
) -> Option<&'a Participant> {
    match viewer_role {
        Role::Admin => conversation
            .participant_with_role(Role::User)
            .or_else(|| conversation.other_participant(acting_as)),
        Role::User | Role::Ambassador => conversation.other_participant(acting_as),
    }
}

pub fn display_name(participant: &Participant) -> String {
    if participant.name.trim().is_empty() {
        let short: String = participant.id.chars().take(8).collect();
        format!("{} {short}", capitalize(participant.role.as_str()))
    } else {
        participant.name.clone()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
