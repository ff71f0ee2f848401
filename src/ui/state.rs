use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::common::{
    AmbassadorProfile, ChatCommand, ChatEvent, ChatUser, Message, MessageStatus, OutboundMessage,
    Role, SenderRole,
};
use crate::security::{
    SecurityWarning, detailed_security_warning, filter_sensitive_data, validate_message,
};
use crate::session::Identity;

use super::conversations::{ConversationList, counterpart, display_name};
use super::intake::IntakeWizard;
use super::message_store::MessageStore;

const MAX_NOTICES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveStatus {
    Idle,
    Connected,
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub at: DateTime<Utc>,
    pub text: String,
}

/// Result of pressing send.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Nothing to do: empty text, no conversation, or a send already in flight.
    Ignored,
    /// The text contains contact details; nothing was sent and the text is kept.
    Blocked(SecurityWarning),
    Sent(ChatCommand),
}

/// A message prepared for rendering, content already redacted.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMessage {
    pub id: String,
    pub content: String,
    pub is_own: bool,
    pub is_temporary: bool,
    pub status: MessageStatus,
    pub sent_at: DateTime<Utc>,
}

/// State of one chat view. Synchronous: it turns user actions into
/// commands for the network worker and folds worker events back in.
pub struct ChatViewState {
    pub me: Identity,
    pub conversations: ConversationList,
    pub store: MessageStore,
    pub compose: String,
    pub warning: Option<SecurityWarning>,
    pub history_loading: bool,
    pub live: LiveStatus,
    pub notices: VecDeque<Notice>,
    pub ambassadors: Vec<AmbassadorProfile>,
    pub selected_ambassador: Option<String>,
    pub my_users: Vec<ChatUser>,
    pub intake: Option<IntakeWizard>,
    pub scroll_to_latest: bool,
    pub session_expired: bool,
    sending: Option<String>,
    generation: u64,
}

impl ChatViewState {
    pub fn new(me: Identity) -> Self {
        Self {
            me,
            conversations: ConversationList::new(),
            store: MessageStore::new(),
            compose: String::new(),
            warning: None,
            history_loading: false,
            live: LiveStatus::Idle,
            notices: VecDeque::new(),
            ambassadors: Vec::new(),
            selected_ambassador: None,
            my_users: Vec::new(),
            intake: None,
            scroll_to_latest: false,
            session_expired: false,
            sending: None,
            generation: 0,
        }
    }

    pub fn role(&self) -> Role {
        self.me.role
    }

    /// What to fetch when the view opens.
    pub fn initial_commands(&self) -> Vec<ChatCommand> {
        match self.me.role {
            Role::Ambassador => vec![ChatCommand::RefreshConversations, ChatCommand::LoadMyUsers],
            Role::User => vec![ChatCommand::RefreshConversations, ChatCommand::LoadAmbassadors],
            Role::Admin => vec![ChatCommand::LoadAmbassadors],
        }
    }

    /// The id our own messages are sent as: ours, or the ambassador an admin acts for.
    pub fn acting_as(&self) -> Option<&str> {
        match self.me.role {
            Role::Admin => self.selected_ambassador.as_deref(),
            Role::User | Role::Ambassador => Some(self.me.id.as_str()),
        }
    }

    pub fn is_sending(&self) -> bool {
        self.sending.is_some()
    }

    pub fn can_send(&self) -> bool {
        !self.is_sending()
            && self.conversations.selected_id().is_some()
            && !self.compose.trim().is_empty()
    }

    /// Admin only: switch the acting ambassador. Clears everything scoped to the previous one.
    pub fn select_ambassador(&mut self, ambassador_id: &str) -> Option<ChatCommand> {
        if self.me.role != Role::Admin {
            return None;
        }
        self.selected_ambassador = Some(ambassador_id.to_string());
        self.conversations.clear();
        self.reset_conversation_state(None);
        Some(ChatCommand::SelectAmbassador {
            ambassador_id: ambassador_id.to_string(),
        })
    }

    /// Clears the previous conversation's messages before its replacement is fetched.
    pub fn select_conversation(&mut self, chat_id: &str) -> ChatCommand {
        self.conversations.select(chat_id);
        self.reset_conversation_state(Some(chat_id));
        self.history_loading = true;
        self.open_command(chat_id)
    }

    /// Re-fetches the open conversation without clearing what is shown.
    pub fn refresh_history(&mut self) -> Option<ChatCommand> {
        let chat_id = self.conversations.selected_id()?.to_string();
        self.generation += 1;
        self.history_loading = true;
        Some(self.open_command(&chat_id))
    }

    pub fn close_conversation(&mut self) -> ChatCommand {
        self.conversations.clear_selection();
        self.reset_conversation_state(None);
        ChatCommand::CloseConversation
    }

    fn open_command(&self, chat_id: &str) -> ChatCommand {
        ChatCommand::OpenConversation {
            chat_id: chat_id.to_string(),
            generation: self.generation,
            admin_view: self.me.role == Role::Admin,
        }
    }

    /// `sending` survives the reset: the worker still owns that send until it
    /// reports `MessageSent` or `SendFailed`.
    fn reset_conversation_state(&mut self, chat_id: Option<&str>) {
        self.generation += 1;
        self.store.reset(chat_id);
        self.warning = None;
        self.history_loading = false;
        self.live = LiveStatus::Idle;
    }

    /// Validates the compose text and, if clean, inserts the optimistic copy
    /// and returns the send command. One send may be in flight at a time.
    pub fn submit(&mut self) -> SubmitOutcome {
        if self.is_sending() {
            return SubmitOutcome::Ignored;
        }
        let content = self.compose.trim().to_string();
        if content.is_empty() {
            return SubmitOutcome::Ignored;
        }
        if self.conversations.selected().is_none() {
            return SubmitOutcome::Ignored;
        }
        let Some(acting_as) = self.acting_as().map(str::to_string) else {
            return SubmitOutcome::Ignored;
        };

        let outcome = validate_message(&content);
        if !outcome.is_valid {
            if let Some(warning) = detailed_security_warning(&outcome.violations) {
                self.warning = Some(warning.clone());
                return SubmitOutcome::Blocked(warning);
            }
        }

        let target = self.conversations.selected().and_then(|conversation| {
            counterpart(conversation, self.me.role, &acting_as)
                .map(|receiver| (conversation.id.clone(), receiver.id.clone()))
        });
        let Some((chat_id, receiver_id)) = target else {
            self.push_notice("This conversation has no recipient.".to_string());
            return SubmitOutcome::Ignored;
        };

        let (sender_role, as_ambassador) = match self.me.role {
            Role::Admin => (SenderRole::AdminAsAmbassador, Some(acting_as.clone())),
            Role::Ambassador => (SenderRole::Ambassador, None),
            Role::User => (SenderRole::User, None),
        };
        let temp = Message::optimistic(&chat_id, &acting_as, sender_role, &receiver_id, &content);
        let temp_id = temp.id.clone();

        self.store.insert_optimistic(temp);
        self.sending = Some(temp_id.clone());
        self.compose.clear();
        self.warning = None;
        self.scroll_to_latest = true;

        SubmitOutcome::Sent(ChatCommand::SendMessage(OutboundMessage {
            temp_id,
            chat_id,
            receiver_id,
            content,
            as_ambassador,
        }))
    }

    /// Only confirmed messages we sent can be deleted.
    pub fn request_delete(&self, message_id: &str) -> Option<ChatCommand> {
        let message = self.store.get(message_id)?;
        let own = Some(message.sender_id.as_str()) == self.acting_as();
        (own && !message.is_temporary).then(|| ChatCommand::DeleteMessage {
            message_id: message_id.to_string(),
        })
    }

    pub fn open_intake(&mut self, ambassador_id: &str, ambassador_name: &str) {
        self.intake = Some(IntakeWizard::new(ambassador_id, ambassador_name));
    }

    /// Folds a worker event into the view. Returns a follow-up command when one is needed.
    pub fn handle_event(&mut self, event: ChatEvent) -> Option<ChatCommand> {
        match event {
            ChatEvent::ConversationsLoaded(conversations) => {
                self.conversations.replace(conversations)
            }
            ChatEvent::MyUsersLoaded(users) => self.my_users = users,
            ChatEvent::AmbassadorsLoaded(ambassadors) => self.ambassadors = ambassadors,
            ChatEvent::AmbassadorChatsLoaded {
                ambassador_id,
                conversations,
            } => {
                if self.selected_ambassador.as_deref() == Some(ambassador_id.as_str()) {
                    self.conversations.replace(conversations);
                }
            }
            ChatEvent::HistoryLoaded {
                chat_id,
                generation,
                messages,
            } => {
                if self.is_current(&chat_id, generation) {
                    self.store.load_history(&chat_id, messages);
                    self.history_loading = false;
                    self.scroll_to_latest = true;
                } else {
                    log::debug!("Dropping superseded history for chat {chat_id}");
                }
            }
            ChatEvent::HistoryFailed {
                chat_id,
                generation,
                error,
            } => {
                if self.is_current(&chat_id, generation) {
                    self.history_loading = false;
                    self.push_notice(error);
                }
            }
            ChatEvent::MessageSent { temp_id, message } => {
                if self.sending.as_deref() == Some(temp_id.as_str()) {
                    self.sending = None;
                }
                self.store.confirm(&temp_id, message);
            }
            ChatEvent::SendFailed { temp_id, error } => {
                if self.sending.as_deref() == Some(temp_id.as_str()) {
                    self.sending = None;
                }
                self.store.rollback(&temp_id);
                self.push_notice(error);
            }
            ChatEvent::MessageDeleted { message_id } | ChatEvent::LiveMessageDeleted(message_id) => {
                self.store.remove(&message_id);
            }
            ChatEvent::DeleteFailed { error, .. } => self.push_notice(error),
            ChatEvent::LiveMessage(message) => {
                if self.conversations.is_selected(&message.chat_id)
                    && self.store.apply_incoming(message)
                {
                    self.scroll_to_latest = true;
                }
            }
            ChatEvent::LiveMessageUpdated(message) => {
                self.store.apply_update(message);
            }
            ChatEvent::LiveUpdatesConnected { chat_id } => {
                if self.conversations.is_selected(&chat_id) {
                    self.live = LiveStatus::Connected;
                }
            }
            ChatEvent::LiveUpdatesUnavailable { chat_id, reason } => {
                if self.conversations.is_selected(&chat_id) {
                    self.live = LiveStatus::Unavailable(reason);
                }
            }
            ChatEvent::IntakeCompleted { chat_id } => {
                if let Some(intake) = self.intake.as_mut() {
                    intake.handle_completed();
                }
                if chat_id.is_some() {
                    return Some(ChatCommand::RefreshConversations);
                }
            }
            ChatEvent::IntakeFailed(error) => match self.intake.as_mut() {
                Some(intake) => intake.handle_failed(error),
                None => self.push_notice(error),
            },
            ChatEvent::SessionExpired => self.session_expired = true,
            ChatEvent::Notice(text) => self.push_notice(text),
        }
        None
    }

    fn is_current(&self, chat_id: &str, generation: u64) -> bool {
        generation == self.generation && self.conversations.is_selected(chat_id)
    }

    pub fn push_notice(&mut self, text: String) {
        self.notices.push_back(Notice {
            at: Utc::now(),
            text,
        });
        while self.notices.len() > MAX_NOTICES {
            self.notices.pop_front();
        }
    }

    /// Messages of the open conversation with every body redacted, ours and theirs alike.
    pub fn display_messages(&self) -> Vec<DisplayMessage> {
        let acting_as = self.acting_as();
        self.store
            .messages()
            .iter()
            .map(|message| DisplayMessage {
                id: message.id.clone(),
                content: filter_sensitive_data(&message.content),
                is_own: Some(message.sender_id.as_str()) == acting_as,
                is_temporary: message.is_temporary,
                status: message.status,
                sent_at: message.created_at,
            })
            .collect()
    }

    /// Header text for the open conversation.
    pub fn counterpart_name(&self) -> Option<String> {
        let conversation = self.conversations.selected()?;
        counterpart(conversation, self.me.role, self.acting_as()?).map(display_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Conversation, Participant};
    use crate::security::PHONE_PLACEHOLDER;
    use chrono::Duration;

    fn me(role: Role, id: &str) -> Identity {
        Identity {
            id: id.to_string(),
            role,
            name: "Me".to_string(),
            email: None,
        }
    }

    fn chat(id: &str) -> Conversation {
        Conversation {
            id: id.to_string(),
            participants: vec![
                Participant {
                    id: "u1".to_string(),
                    name: "Ravi".to_string(),
                    role: Role::User,
                },
                Participant {
                    id: "a1".to_string(),
                    name: "Asha".to_string(),
                    role: Role::Ambassador,
                },
            ],
            last_message: None,
            updated_at: None,
        }
    }

    fn server_message(id: &str, chat_id: &str, sender: &str, content: &str) -> Message {
        Message {
            id: id.to_string(),
            chat_id: chat_id.to_string(),
            sender_id: sender.to_string(),
            sender_role: SenderRole::User,
            receiver_id: "a1".to_string(),
            content: content.to_string(),
            created_at: Utc::now() - Duration::minutes(1),
            status: MessageStatus::Sent,
            is_temporary: false,
        }
    }

    fn generation_of(command: &ChatCommand) -> u64 {
        match command {
            ChatCommand::OpenConversation { generation, .. } => *generation,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn ambassador_view_with_open_chat() -> ChatViewState {
        let mut state = ChatViewState::new(me(Role::Ambassador, "a1"));
        state.handle_event(ChatEvent::ConversationsLoaded(vec![chat("c1"), chat("c2")]));
        let open = state.select_conversation("c1");
        state.handle_event(ChatEvent::HistoryLoaded {
            chat_id: "c1".to_string(),
            generation: generation_of(&open),
            messages: vec![server_message("m1", "c1", "u1", "hello")],
        });
        state
    }

    #[test]
    fn blocked_send_keeps_text_and_issues_nothing() {
        let mut state = ambassador_view_with_open_chat();
        state.compose = "call me at 9876543210".to_string();

        let SubmitOutcome::Blocked(warning) = state.submit() else {
            panic!("expected the send to be blocked");
        };
        assert!(warning.message.contains("Phone numbers"));
        assert_eq!(state.compose, "call me at 9876543210");
        assert_eq!(state.store.len(), 1);
        assert!(!state.is_sending());
    }

    #[test]
    fn send_inserts_one_temporary_and_confirm_replaces_it() {
        let mut state = ambassador_view_with_open_chat();
        state.compose = "Happy to help!".to_string();

        let SubmitOutcome::Sent(ChatCommand::SendMessage(outbound)) = state.submit() else {
            panic!("expected a send");
        };
        assert_eq!(outbound.receiver_id, "u1");
        assert_eq!(outbound.as_ambassador, None);
        assert_eq!(state.store.len(), 2);
        assert_eq!(state.store.pending().count(), 1);
        assert!(state.compose.is_empty());

        // A second press while the first is pending does nothing.
        state.compose = "again".to_string();
        assert_eq!(state.submit(), SubmitOutcome::Ignored);
        assert_eq!(state.store.pending().count(), 1);

        let mut confirmed = server_message("m2", "c1", "a1", "Happy to help!");
        confirmed.created_at = Utc::now();
        state.handle_event(ChatEvent::MessageSent {
            temp_id: outbound.temp_id.clone(),
            message: confirmed,
        });
        assert_eq!(state.store.len(), 2);
        assert!(!state.store.messages()[1].is_temporary);
        assert!(!state.is_sending());
    }

    #[test]
    fn failed_send_rolls_back_without_restoring_text() {
        let mut state = ambassador_view_with_open_chat();
        state.compose = "Happy to help!".to_string();
        let SubmitOutcome::Sent(ChatCommand::SendMessage(outbound)) = state.submit() else {
            panic!("expected a send");
        };

        state.handle_event(ChatEvent::SendFailed {
            temp_id: outbound.temp_id.clone(),
            error: "Something went wrong. Please try again.".to_string(),
        });
        assert!(state.store.get(&outbound.temp_id).is_none());
        assert_eq!(state.store.len(), 1);
        assert!(state.compose.is_empty());
        assert_eq!(state.notices.len(), 1);
        assert!(!state.is_sending());
    }

    #[test]
    fn pending_send_blocks_sending_from_another_conversation() {
        let mut state = ambassador_view_with_open_chat();
        state.compose = "first".to_string();
        let SubmitOutcome::Sent(ChatCommand::SendMessage(outbound)) = state.submit() else {
            panic!("expected a send");
        };

        state.select_conversation("c2");
        state.compose = "second".to_string();
        assert_eq!(state.submit(), SubmitOutcome::Ignored);
        assert!(state.is_sending());
        assert!(!state.can_send());

        // The late confirmation frees the view without touching the new conversation.
        state.handle_event(ChatEvent::MessageSent {
            temp_id: outbound.temp_id,
            message: server_message("m9", "c1", "a1", "first"),
        });
        assert!(!state.is_sending());
        assert!(state.store.is_empty());
        assert!(matches!(state.submit(), SubmitOutcome::Sent(_)));
    }

    #[test]
    fn live_message_for_other_chat_is_ignored() {
        let mut state = ambassador_view_with_open_chat();
        state.handle_event(ChatEvent::LiveMessage(server_message("x1", "c2", "u1", "psst")));
        assert_eq!(state.store.len(), 1);

        state.handle_event(ChatEvent::LiveMessage(server_message("m2", "c1", "u1", "hi")));
        assert_eq!(state.store.len(), 2);
    }

    #[test]
    fn stale_history_does_not_land_in_new_conversation() {
        let mut state = ChatViewState::new(me(Role::Ambassador, "a1"));
        state.handle_event(ChatEvent::ConversationsLoaded(vec![chat("c1"), chat("c2")]));
        let open_a = state.select_conversation("c1");
        let open_b = state.select_conversation("c2");

        state.handle_event(ChatEvent::HistoryLoaded {
            chat_id: "c1".to_string(),
            generation: generation_of(&open_a),
            messages: vec![server_message("a-1", "c1", "u1", "from A")],
        });
        assert!(state.store.is_empty());
        assert!(state.history_loading);

        state.handle_event(ChatEvent::HistoryLoaded {
            chat_id: "c2".to_string(),
            generation: generation_of(&open_b),
            messages: vec![server_message("b-1", "c2", "u1", "from B")],
        });
        assert_eq!(state.store.messages()[0].id, "b-1");
        assert_eq!(state.store.chat_id(), Some("c2"));
    }

    #[test]
    fn display_redacts_both_sides() {
        let mut state = ambassador_view_with_open_chat();
        state.handle_event(ChatEvent::LiveMessage(server_message(
            "m2",
            "c1",
            "u1",
            "my number is 9876543210",
        )));
        let shown = state.display_messages();
        assert_eq!(shown[1].content, format!("my number is {PHONE_PLACEHOLDER}"));
        assert!(!shown[1].is_own);
        // Stored content stays as submitted.
        assert_eq!(state.store.get("m2").unwrap().content, "my number is 9876543210");
    }

    #[test]
    fn admin_sends_as_selected_ambassador() {
        let mut state = ChatViewState::new(me(Role::Admin, "admin-1"));
        assert_eq!(state.initial_commands(), vec![ChatCommand::LoadAmbassadors]);
        assert!(state.select_ambassador("a1").is_some());
        state.handle_event(ChatEvent::AmbassadorChatsLoaded {
            ambassador_id: "a1".to_string(),
            conversations: vec![chat("c1")],
        });
        let open = state.select_conversation("c1");
        assert!(matches!(open, ChatCommand::OpenConversation { admin_view: true, .. }));

        state.compose = "Hello from the team".to_string();
        let SubmitOutcome::Sent(ChatCommand::SendMessage(outbound)) = state.submit() else {
            panic!("expected a send");
        };
        assert_eq!(outbound.as_ambassador.as_deref(), Some("a1"));
        assert_eq!(outbound.receiver_id, "u1");
        assert_eq!(state.store.messages()[0].sender_id, "a1");
        assert_eq!(state.store.messages()[0].sender_role, SenderRole::AdminAsAmbassador);
    }

    #[test]
    fn chats_for_previous_ambassador_are_dropped() {
        let mut state = ChatViewState::new(me(Role::Admin, "admin-1"));
        state.select_ambassador("a1");
        state.select_ambassador("a2");
        state.handle_event(ChatEvent::AmbassadorChatsLoaded {
            ambassador_id: "a1".to_string(),
            conversations: vec![chat("c1")],
        });
        assert!(state.conversations.is_empty());
    }

    #[test]
    fn only_own_confirmed_messages_are_deletable() {
        let mut state = ambassador_view_with_open_chat();
        assert_eq!(state.request_delete("m1"), None);
        state.handle_event(ChatEvent::LiveMessage(server_message("m2", "c1", "a1", "mine")));
        assert_eq!(
            state.request_delete("m2"),
            Some(ChatCommand::DeleteMessage {
                message_id: "m2".to_string()
            })
        );
        state.handle_event(ChatEvent::MessageDeleted {
            message_id: "m2".to_string(),
        });
        assert!(state.store.get("m2").is_none());
    }

    #[test]
    fn live_status_tracks_open_chat_only() {
        let mut state = ambassador_view_with_open_chat();
        state.handle_event(ChatEvent::LiveUpdatesUnavailable {
            chat_id: "c2".to_string(),
            reason: "x".to_string(),
        });
        assert_eq!(state.live, LiveStatus::Idle);
        state.handle_event(ChatEvent::LiveUpdatesConnected {
            chat_id: "c1".to_string(),
        });
        assert_eq!(state.live, LiveStatus::Connected);
    }

    #[test]
    fn notices_are_bounded() {
        let mut state = ChatViewState::new(me(Role::User, "u1"));
        for i in 0..8 {
            state.handle_event(ChatEvent::Notice(format!("n{i}")));
        }
        assert_eq!(state.notices.len(), MAX_NOTICES);
        assert_eq!(state.notices.front().unwrap().text, "n3");
    }

    #[test]
    fn intake_completion_refreshes_conversations() {
        let mut state = ChatViewState::new(me(Role::User, "u1"));
        state.open_intake("a1", "Asha");
        let follow_up = state.handle_event(ChatEvent::IntakeCompleted {
            chat_id: Some("c9".to_string()),
        });
        assert_eq!(follow_up, Some(ChatCommand::RefreshConversations));
        assert_eq!(
            state.intake.as_ref().map(|intake| intake.step()),
            Some(super::super::intake::IntakeStep::Sent)
        );
    }
}
