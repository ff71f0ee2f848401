use eframe::egui;

use crate::ui::state::ChatViewState;

const WARNING_FILL: egui::Color32 = egui::Color32::from_rgb(255, 243, 205);
const WARNING_TEXT: egui::Color32 = egui::Color32::from_rgb(133, 100, 4);

/// Returns true when the user asked to send.
pub fn render(ui: &mut egui::Ui, state: &mut ChatViewState) -> bool {
    if let Some(warning) = &state.warning {
        egui::Frame::default()
            .fill(WARNING_FILL)
            .inner_margin(egui::Margin::same(6))
            .show(ui, |ui| {
                ui.colored_label(WARNING_TEXT, egui::RichText::new(&warning.title).strong());
                ui.colored_label(WARNING_TEXT, &warning.message);
            });
    }

    let mut send = false;
    ui.horizontal(|ui| {
        let response = ui.add(
            egui::TextEdit::multiline(&mut state.compose)
                .desired_rows(2)
                .desired_width(ui.available_width() - 70.0)
                .hint_text("Type a message"),
        );
        if response.changed() {
            state.warning = None;
        }

        // Enter sends, Shift+Enter inserts a newline.
        let enter = response.has_focus()
            && ui.input(|i| i.key_pressed(egui::Key::Enter) && !i.modifiers.shift);
        if enter {
            let trimmed = state.compose.trim_end_matches('\n').to_string();
            state.compose = trimmed;
        }

        let label = if state.is_sending() { "Sending…" } else { "Send" };
        let clicked = ui
            .add_enabled(state.can_send(), egui::Button::new(label))
            .clicked();
        send = (clicked || enter) && state.can_send();
    });

    send
}
