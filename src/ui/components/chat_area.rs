use eframe::egui;

use crate::common::MessageStatus;
use crate::ui::state::{ChatViewState, LiveStatus};

#[derive(Default)]
pub struct ChatAreaActions {
    pub delete_message: Option<String>,
    pub refresh: bool,
    pub close: bool,
}

pub fn render(ui: &mut egui::Ui, state: &mut ChatViewState) -> ChatAreaActions {
    let mut actions = ChatAreaActions::default();

    let Some(title) = state.counterpart_name() else {
        ui.centered_and_justified(|ui| {
            ui.label("Select a conversation to start chatting");
        });
        return actions;
    };

    ui.horizontal(|ui| {
        ui.heading(title);
        match &state.live {
            LiveStatus::Connected => {
                ui.colored_label(egui::Color32::GREEN, "● live");
            }
            LiveStatus::Unavailable(reason) => {
                ui.colored_label(egui::Color32::GRAY, "○ offline")
                    .on_hover_text(reason);
            }
            LiveStatus::Idle => {}
        }
        if state.history_loading {
            ui.spinner();
        }
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.button("Close").clicked() {
                actions.close = true;
            }
            if ui.button("Refresh").clicked() {
                actions.refresh = true;
            }
        });
    });
    ui.separator();

    let scroll_to_latest = std::mem::take(&mut state.scroll_to_latest);
    let messages = state.display_messages();

    egui::ScrollArea::vertical()
        .auto_shrink([false; 2])
        .stick_to_bottom(true)
        .max_height(ui.available_height() - 90.0)
        .show(ui, |ui| {
            if messages.is_empty() && !state.history_loading {
                ui.label(egui::RichText::new("No messages yet").weak());
            }
            for message in &messages {
                let layout = if message.is_own {
                    egui::Layout::right_to_left(egui::Align::TOP)
                } else {
                    egui::Layout::left_to_right(egui::Align::TOP)
                };
                ui.with_layout(layout, |ui| {
                    let mut text = egui::RichText::new(&message.content);
                    if message.is_temporary {
                        text = text.italics().weak();
                    }
                    ui.label(text);

                    let stamp = message.sent_at.format("%H:%M").to_string();
                    let meta = format!("{stamp} {}", status_mark(message.status));
                    ui.label(egui::RichText::new(meta).small().weak());

                    if message.is_own
                        && !message.is_temporary
                        && ui.small_button("🗑").on_hover_text("Delete").clicked()
                    {
                        actions.delete_message = Some(message.id.clone());
                    }
                });
            }
            if scroll_to_latest {
                ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
            }
        });

    actions
}

fn status_mark(status: MessageStatus) -> &'static str {
    match status {
        MessageStatus::Sending => "…",
        MessageStatus::Sent => "✓",
        MessageStatus::Delivered => "✓✓",
        MessageStatus::Read => "👁",
    }
}
