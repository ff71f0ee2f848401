use eframe::egui;
use tokio::sync::mpsc;

use crate::common::{ChatCommand, ChatEvent, EmbedConfig};
use crate::session::Identity;

use super::components::{chat_area, input_bar, intake_modal, sidebar};
use super::intake::IntakeWizard;
use super::state::{ChatViewState, SubmitOutcome};

const SIGN_IN_HINT: &str =
    "ambassador-chat session set --token <TOKEN> --user-id <ID> --role <ROLE>";

/// What the window shows first.
pub enum Launch {
    Chat(Identity),
    Embed(EmbedConfig),
    SignedOut,
}

enum Screen {
    Chat(Box<ChatViewState>),
    Embed {
        config: EmbedConfig,
        wizard: IntakeWizard,
    },
    SignedOut {
        expired: bool,
    },
}

pub struct ChatApp {
    screen: Screen,
    command_sender: mpsc::Sender<ChatCommand>,
    event_receiver: mpsc::Receiver<ChatEvent>,
}

impl ChatApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        launch: Launch,
        command_sender: mpsc::Sender<ChatCommand>,
        event_receiver: mpsc::Receiver<ChatEvent>,
    ) -> Self {
        let screen = match launch {
            Launch::Chat(identity) => {
                log::info!(
                    "Opening chat view for {} ({})",
                    identity.id,
                    identity.role.as_str()
                );
                Screen::Chat(Box::new(ChatViewState::new(identity)))
            }
            Launch::Embed(config) => {
                let wizard = IntakeWizard::for_embed(&config);
                Screen::Embed { config, wizard }
            }
            Launch::SignedOut => Screen::SignedOut { expired: false },
        };

        let app = Self {
            screen,
            command_sender,
            event_receiver,
        };
        if let Screen::Chat(state) = &app.screen {
            for command in state.initial_commands() {
                app.send_command(command);
            }
        }
        app
    }

    fn handle_network_events(&mut self) {
        while let Ok(event) = self.event_receiver.try_recv() {
            let follow_up = match &mut self.screen {
                Screen::Chat(state) => state.handle_event(event),
                Screen::Embed { wizard, .. } => {
                    match event {
                        ChatEvent::IntakeCompleted { .. } => wizard.handle_completed(),
                        ChatEvent::IntakeFailed(error) => wizard.handle_failed(error),
                        other => log::debug!("Ignoring {other:?} in embed mode"),
                    }
                    None
                }
                Screen::SignedOut { .. } => None,
            };
            if let Some(command) = follow_up {
                self.send_command(command);
            }
        }

        let expired = matches!(&self.screen, Screen::Chat(state) if state.session_expired);
        if expired {
            log::warn!("Session expired; returning to sign-in screen");
            self.send_command(ChatCommand::CloseConversation);
            self.screen = Screen::SignedOut { expired: true };
        }
    }

    fn send_command(&self, command: ChatCommand) {
        if let Err(err) = self.command_sender.try_send(command) {
            log::warn!("Failed to send command to network: {err}");
        }
    }

    fn render_chat(&mut self, ctx: &egui::Context) {
        let Screen::Chat(state) = &mut self.screen else {
            return;
        };
        let mut commands = Vec::new();

        egui::SidePanel::left("conversation_sidebar")
            .resizable(true)
            .default_width(240.0)
            .show(ctx, |ui| {
                let actions = sidebar::render(ui, state);
                if actions.refresh {
                    commands.push(ChatCommand::RefreshConversations);
                }
                if let Some(ambassador_id) = actions.select_ambassador {
                    commands.extend(state.select_ambassador(&ambassador_id));
                }
                if let Some(chat_id) = actions.select_chat {
                    commands.push(state.select_conversation(&chat_id));
                }
                if let Some((ambassador_id, name)) = actions.start_with {
                    state.open_intake(&ambassador_id, &name);
                }
            });

        egui::TopBottomPanel::bottom("notices")
            .resizable(false)
            .show_animated(ctx, !state.notices.is_empty(), |ui| {
                for notice in &state.notices {
                    ui.horizontal(|ui| {
                        let at = notice.at.format("%H:%M:%S").to_string();
                        ui.label(egui::RichText::new(at).weak());
                        ui.colored_label(egui::Color32::LIGHT_RED, &notice.text);
                    });
                }
                if ui.small_button("Dismiss").clicked() {
                    state.notices.clear();
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            let actions = chat_area::render(ui, state);
            if actions.close {
                commands.push(state.close_conversation());
            }
            if actions.refresh {
                commands.extend(state.refresh_history());
            }
            if let Some(message_id) = actions.delete_message {
                commands.extend(state.request_delete(&message_id));
            }

            if state.conversations.selected_id().is_some() {
                ui.separator();
                if input_bar::render(ui, state) {
                    match state.submit() {
                        SubmitOutcome::Sent(command) => commands.push(command),
                        SubmitOutcome::Blocked(warning) => {
                            log::info!("Blocked outgoing message: {}", warning.message);
                        }
                        SubmitOutcome::Ignored => {}
                    }
                }
            }
        });

        let mut close_intake = false;
        if let Some(wizard) = state.intake.as_mut() {
            let title = format!("Message {}", wizard.ambassador_name);
            egui::Window::new(title)
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
                .show(ctx, |ui| {
                    let actions = intake_modal::render(ui, wizard);
                    commands.extend(actions.submit);
                    close_intake = actions.close;
                });
        }
        if close_intake {
            state.intake = None;
        }

        for command in commands {
            self.send_command(command);
        }
    }

    fn render_embed(&mut self, ctx: &egui::Context) {
        let Screen::Embed { config, wizard } = &mut self.screen else {
            return;
        };
        let mut submit = None;

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(config.title.as_deref().unwrap_or("Chat with an ambassador"));
            if let Some(welcome) = &config.welcome_message {
                ui.label(welcome);
            }
            ui.separator();
            let actions = intake_modal::render(ui, wizard);
            submit = actions.submit;
            if actions.close {
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        });

        if let Some(command) = submit {
            self.send_command(command);
        }
    }

    fn render_signed_out(&self, ctx: &egui::Context, expired: bool) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(40.0);
                ui.heading("Signed out");
                if expired {
                    ui.label("Your session has expired. Please sign in again.");
                } else {
                    ui.label("No active session found.");
                }
                ui.add_space(8.0);
                ui.label("Store a session and restart:");
                ui.label(egui::RichText::new(SIGN_IN_HINT).monospace());
            });
        });
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_network_events();

        match &self.screen {
            Screen::Chat(_) => self.render_chat(ctx),
            Screen::Embed { .. } => self.render_embed(ctx),
            Screen::SignedOut { expired } => {
                let expired = *expired;
                self.render_signed_out(ctx, expired);
            }
        }

        ctx.request_repaint();
    }
}
