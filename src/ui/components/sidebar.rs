use eframe::egui;

use crate::common::Role;
use crate::security::filter_sensitive_data;
use crate::ui::conversations::{counterpart, display_name};
use crate::ui::state::ChatViewState;

#[derive(Default)]
pub struct SidebarActions {
    pub select_ambassador: Option<String>,
    pub select_chat: Option<String>,
    /// (ambassador id, ambassador name) to open the intake wizard for.
    pub start_with: Option<(String, String)>,
    pub refresh: bool,
}

pub fn render(ui: &mut egui::Ui, state: &ChatViewState) -> SidebarActions {
    let mut actions = SidebarActions::default();

    ui.horizontal(|ui| {
        ui.heading("Conversations");
        if ui.small_button("⟳").on_hover_text("Refresh").clicked() {
            actions.refresh = true;
        }
    });
    let signed_in = format!("{} ({})", state.me.name, state.role().as_str());
    ui.label(egui::RichText::new(signed_in).weak());
    ui.separator();

    match state.role() {
        Role::Admin => render_ambassador_picker(ui, state, &mut actions),
        Role::Ambassador => {
            ui.label(format!("Students you talk to: {}", state.my_users.len()));
            ui.separator();
        }
        Role::User => render_new_conversation(ui, state, &mut actions),
    }

    if state.role() == Role::Admin && state.selected_ambassador.is_none() {
        ui.label("Pick an ambassador to see their chats");
        return actions;
    }

    if state.conversations.is_empty() {
        ui.label("No conversations yet");
        return actions;
    }

    let acting_as = state.acting_as().unwrap_or_default();
    egui::ScrollArea::vertical()
        .id_salt("conversation_list")
        .show(ui, |ui| {
            for conversation in state.conversations.iter() {
                let title = counterpart(conversation, state.role(), acting_as)
                    .map(display_name)
                    .unwrap_or_else(|| "Unknown".to_string());
                let selected = state.conversations.is_selected(&conversation.id);

                ui.vertical(|ui| {
                    if ui.selectable_label(selected, title).clicked() && !selected {
                        actions.select_chat = Some(conversation.id.clone());
                    }
                    if let Some(last) = &conversation.last_message {
                        let preview: String = filter_sensitive_data(&last.content)
                            .chars()
                            .take(40)
                            .collect();
                        ui.label(egui::RichText::new(preview).weak().small());
                    }
                });
                ui.add_space(4.0);
            }
        });

    actions
}

fn render_ambassador_picker(
    ui: &mut egui::Ui,
    state: &ChatViewState,
    actions: &mut SidebarActions,
) {
    let current = state
        .selected_ambassador
        .as_deref()
        .and_then(|id| state.ambassadors.iter().find(|a| a.id == id))
        .map(|a| a.name.clone())
        .unwrap_or_else(|| "Select ambassador".to_string());

    ui.label("Acting as:");
    egui::ComboBox::from_id_salt("ambassador_picker")
        .selected_text(current)
        .show_ui(ui, |ui| {
            for ambassador in &state.ambassadors {
                let selected = state.selected_ambassador.as_deref() == Some(ambassador.id.as_str());
                if ui.selectable_label(selected, &ambassador.name).clicked() && !selected {
                    actions.select_ambassador = Some(ambassador.id.clone());
                }
            }
        });
    ui.separator();
}

fn render_new_conversation(
    ui: &mut egui::Ui,
    state: &ChatViewState,
    actions: &mut SidebarActions,
) {
    if state.ambassadors.is_empty() {
        return;
    }
    ui.collapsing("Talk to an ambassador", |ui| {
        for ambassador in &state.ambassadors {
            ui.horizontal(|ui| {
                ui.label(&ambassador.name);
                if let Some(course) = &ambassador.course {
                    ui.label(egui::RichText::new(course).weak());
                }
                if ui.small_button("Message").clicked() {
                    actions.start_with = Some((ambassador.id.clone(), ambassador.name.clone()));
                }
            });
        }
    });
    ui.separator();
}
