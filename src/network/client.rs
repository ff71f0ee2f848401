use std::sync::Arc;

use tokio::sync::mpsc;

use crate::common::{ChatCommand, ChatEvent, OutboundMessage, VisitorIdentity};
use crate::error::{ChatError, Result};
use crate::session::Session;

use super::capability::{AdminCapability, ImpersonationGrant};
use super::socket::{SocketConnector, SocketHandle};
use super::transport::ChatTransport;

/// Background worker: executes UI commands against the backend one at a time
/// and reports every outcome as an event.
pub struct ChatClient<T, S> {
    transport: T,
    connector: S,
    session: Arc<Session>,
    event_sender: mpsc::Sender<ChatEvent>,
    command_receiver: mpsc::Receiver<ChatCommand>,
    live: Option<SocketHandle>,
    grant: Option<ImpersonationGrant>,
}

impl<T: ChatTransport, S: SocketConnector> ChatClient<T, S> {
    pub fn new(
        transport: T,
        connector: S,
        session: Arc<Session>,
        event_sender: mpsc::Sender<ChatEvent>,
        command_receiver: mpsc::Receiver<ChatCommand>,
    ) -> Self {
        Self {
            transport,
            connector,
            session,
            event_sender,
            command_receiver,
            live: None,
            grant: None,
        }
    }

    /// Runs until the UI drops its command sender.
    pub async fn run(mut self) -> Result<()> {
        log::info!("Chat worker started");
        while let Some(command) = self.command_receiver.recv().await {
            self.handle_command(command).await;
        }
        self.close_live().await;
        log::info!("Chat worker stopped");
        Ok(())
    }

    async fn handle_command(&mut self, command: ChatCommand) {
        log::debug!("Handling {command:?}");
        match command {
            ChatCommand::RefreshConversations => self.refresh_conversations().await,
            ChatCommand::LoadMyUsers => match self.transport.list_my_users().await {
                Ok(users) => self.emit(ChatEvent::MyUsersLoaded(users)).await,
                Err(err) => self.report(err).await,
            },
            ChatCommand::LoadAmbassadors => match self.transport.list_ambassadors().await {
                Ok(ambassadors) => self.emit(ChatEvent::AmbassadorsLoaded(ambassadors)).await,
                Err(err) => self.report(err).await,
            },
            ChatCommand::SelectAmbassador { ambassador_id } => {
                self.close_live().await;
                self.load_ambassador_chats(&ambassador_id).await;
            }
            ChatCommand::OpenConversation {
                chat_id,
                generation,
                admin_view,
            } => self.open_conversation(chat_id, generation, admin_view).await,
            ChatCommand::CloseConversation => self.close_live().await,
            ChatCommand::SendMessage(outbound) => self.send_message(outbound).await,
            ChatCommand::DeleteMessage { message_id } => {
                match self.transport.delete_message(&message_id).await {
                    Ok(()) => self.emit(ChatEvent::MessageDeleted { message_id }).await,
                    Err(err) => {
                        let error = err.user_message();
                        self.escalate_auth(&err).await;
                        self.emit(ChatEvent::DeleteFailed { message_id, error }).await;
                    }
                }
            }
            ChatCommand::StartConversation {
                ambassador_id,
                visitor,
                first_message,
            } => {
                match self
                    .start_conversation(&ambassador_id, &visitor, &first_message)
                    .await
                {
                    Ok(chat_id) => {
                        self.emit(ChatEvent::IntakeCompleted {
                            chat_id: Some(chat_id),
                        })
                        .await
                    }
                    Err(err) => {
                        log::warn!("Intake submission failed: {err}");
                        self.escalate_auth(&err).await;
                        self.emit(ChatEvent::IntakeFailed(err.user_message())).await;
                    }
                }
            }
            ChatCommand::SubmitEmbed {
                config_key,
                visitor,
                message,
            } => match self
                .transport
                .submit_embed(&config_key, &visitor, &message)
                .await
            {
                Ok(()) => self.emit(ChatEvent::IntakeCompleted { chat_id: None }).await,
                Err(err) => {
                    log::warn!("Embed submission failed: {err}");
                    self.emit(ChatEvent::IntakeFailed(err.user_message())).await;
                }
            },
        }
    }

    async fn refresh_conversations(&mut self) {
        if let Some(ambassador_id) = self.grant.as_ref().map(|g| g.ambassador_id().to_string()) {
            self.load_ambassador_chats(&ambassador_id).await;
            return;
        }
        match self.transport.list_conversations().await {
            Ok(conversations) => self.emit(ChatEvent::ConversationsLoaded(conversations)).await,
            Err(err) => self.report(err).await,
        }
    }

    async fn load_ambassador_chats(&mut self, ambassador_id: &str) {
        let result = match self.admin_capability() {
            Ok(capability) => {
                self.transport
                    .admin_list_ambassador_chats(&capability, ambassador_id)
                    .await
            }
            Err(err) => Err(err),
        };

        match result {
            Ok((conversations, grant)) => {
                self.grant = Some(grant);
                self.emit(ChatEvent::AmbassadorChatsLoaded {
                    ambassador_id: ambassador_id.to_string(),
                    conversations,
                })
                .await;
            }
            Err(err) => self.report(err).await,
        }
    }

    /// History first, live updates second: the socket is only wired once the
    /// base history has been delivered.
    async fn open_conversation(&mut self, chat_id: String, generation: u64, admin_view: bool) {
        self.close_live().await;

        let history = if admin_view {
            match self.admin_capability() {
                Ok(capability) => {
                    self.transport
                        .admin_list_chat_messages(&capability, &chat_id)
                        .await
                }
                Err(err) => Err(err),
            }
        } else {
            self.transport.list_messages(&chat_id).await
        };

        match history {
            Ok(messages) => {
                self.emit(ChatEvent::HistoryLoaded {
                    chat_id: chat_id.clone(),
                    generation,
                    messages,
                })
                .await;
            }
            Err(err) => {
                let error = err.user_message();
                self.escalate_auth(&err).await;
                self.emit(ChatEvent::HistoryFailed {
                    chat_id,
                    generation,
                    error,
                })
                .await;
                return;
            }
        }

        self.connect_live(&chat_id).await;
    }

    async fn connect_live(&mut self, chat_id: &str) {
        let token = match self.session.bearer_token() {
            Ok(Some(token)) => token,
            Ok(None) => {
                self.live_unavailable(chat_id, "not signed in").await;
                return;
            }
            Err(err) => {
                self.live_unavailable(chat_id, &err.to_string()).await;
                return;
            }
        };

        match self
            .connector
            .connect(&token, chat_id, self.event_sender.clone())
            .await
        {
            Ok(handle) => {
                self.live = Some(handle);
                self.emit(ChatEvent::LiveUpdatesConnected {
                    chat_id: chat_id.to_string(),
                })
                .await;
            }
            Err(err) => self.live_unavailable(chat_id, &err.to_string()).await,
        }
    }

    async fn live_unavailable(&self, chat_id: &str, reason: &str) {
        log::warn!("Live updates unavailable for chat {chat_id}: {reason}");
        self.emit(ChatEvent::LiveUpdatesUnavailable {
            chat_id: chat_id.to_string(),
            reason: reason.to_string(),
        })
        .await;
    }

    async fn close_live(&mut self) {
        if let Some(handle) = self.live.take() {
            log::debug!("Disconnecting live updates for chat {}", handle.chat_id());
            handle.disconnect().await;
        }
    }

    async fn send_message(&mut self, outbound: OutboundMessage) {
        let result = match &outbound.as_ambassador {
            Some(ambassador_id) => match &self.grant {
                Some(grant) if grant.ambassador_id() == ambassador_id => {
                    self.transport
                        .send_message_as_ambassador(
                            grant,
                            &outbound.chat_id,
                            &outbound.receiver_id,
                            &outbound.content,
                        )
                        .await
                }
                _ => Err(ChatError::Forbidden(format!(
                    "no access to ambassador {ambassador_id}"
                ))),
            },
            None => {
                self.transport
                    .send_message(&outbound.chat_id, &outbound.receiver_id, &outbound.content)
                    .await
            }
        };

        match result {
            Ok(message) => {
                self.emit(ChatEvent::MessageSent {
                    temp_id: outbound.temp_id,
                    message,
                })
                .await;
                self.refresh_conversations().await;
            }
            Err(err) => {
                log::warn!("Send to chat {} failed: {err}", outbound.chat_id);
                let error = err.user_message();
                self.escalate_auth(&err).await;
                self.emit(ChatEvent::SendFailed {
                    temp_id: outbound.temp_id,
                    error,
                })
                .await;
            }
        }
    }

    async fn start_conversation(
        &self,
        ambassador_id: &str,
        visitor: &VisitorIdentity,
        first_message: &str,
    ) -> Result<String> {
        let conversation = self
            .transport
            .start_conversation(ambassador_id, visitor)
            .await?;
        self.transport
            .send_message(&conversation.id, ambassador_id, first_message)
            .await?;
        log::info!("Started conversation {} with {ambassador_id}", conversation.id);
        Ok(conversation.id)
    }

    fn admin_capability(&self) -> Result<AdminCapability> {
        AdminCapability::from_identity(&self.session.require_identity()?)
    }

    async fn escalate_auth(&self, err: &ChatError) {
        if err.is_auth() {
            self.emit(ChatEvent::SessionExpired).await;
        }
    }

    async fn report(&self, err: ChatError) {
        log::warn!("Request failed: {err}");
        if err.is_auth() {
            self.emit(ChatEvent::SessionExpired).await;
        } else {
            self.emit(ChatEvent::Notice(err.user_message())).await;
        }
    }

    async fn emit(&self, event: ChatEvent) {
        if let Err(err) = self.event_sender.send(event).await {
            log::warn!("Failed to notify UI: {err}");
        }
    }
}
