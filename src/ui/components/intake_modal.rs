use eframe::egui;

use crate::common::ChatCommand;
use crate::ui::intake::{IntakeStep, IntakeWizard, MIN_MESSAGE_LEN};

#[derive(Default)]
pub struct IntakeActions {
    pub submit: Option<ChatCommand>,
    pub close: bool,
}

/// Draws the wizard inside `ui`. Used both in a floating window and as the
/// full page of the embed mode.
pub fn render(ui: &mut egui::Ui, wizard: &mut IntakeWizard) -> IntakeActions {
    let mut actions = IntakeActions::default();

    if wizard.step() != IntakeStep::Sent {
        ui.label(egui::RichText::new(format!("Step {} of 3", wizard.step().number())).weak());
        ui.add_space(4.0);
    }

    match wizard.step() {
        IntakeStep::Message => {
            ui.label(format!("What would you like to ask {}?", wizard.ambassador_name));
            ui.add(
                egui::TextEdit::multiline(&mut wizard.message)
                    .desired_rows(4)
                    .hint_text(format!("At least {MIN_MESSAGE_LEN} characters")),
            );
        }
        IntakeStep::ContactInfo => {
            egui::Grid::new("intake_contact").num_columns(2).show(ui, |ui| {
                ui.label("Name");
                ui.text_edit_singleline(&mut wizard.name);
                ui.end_row();
                ui.label("Email");
                ui.text_edit_singleline(&mut wizard.email);
                ui.end_row();
                ui.label("Phone");
                ui.text_edit_singleline(&mut wizard.phone);
                ui.end_row();
            });
            ui.checkbox(
                &mut wizard.consent,
                "I agree to be contacted about my question",
            );
        }
        IntakeStep::Confirmation => {
            ui.label(egui::RichText::new("Please check your details").strong());
            ui.label(format!("To: {}", wizard.ambassador_name));
            ui.label(format!("Name: {}", wizard.name.trim()));
            ui.label(format!("Email: {}", wizard.email.trim()));
            ui.label(format!("Phone: {}", wizard.phone.trim()));
            ui.separator();
            ui.label(wizard.message.trim());
        }
        IntakeStep::Sent => {
            ui.heading("Message sent");
            if let Some(text) = wizard.confirmation_text() {
                ui.label(text);
            }
        }
    }

    if let Some(error) = &wizard.error {
        ui.colored_label(egui::Color32::RED, error);
    }

    ui.separator();
    ui.horizontal(|ui| {
        match wizard.step() {
            IntakeStep::Message => {
                if ui.button("Next").clicked() {
                    advance(wizard);
                }
            }
            IntakeStep::ContactInfo => {
                if ui.button("Back").clicked() {
                    wizard.back();
                }
                if ui.button("Next").clicked() {
                    advance(wizard);
                }
            }
            IntakeStep::Confirmation => {
                if ui
                    .add_enabled(!wizard.is_submitting(), egui::Button::new("Back"))
                    .clicked()
                {
                    wizard.back();
                }
                let label = if wizard.is_submitting() { "Sending…" } else { "Send" };
                if ui
                    .add_enabled(wizard.can_submit(), egui::Button::new(label))
                    .clicked()
                {
                    actions.submit = wizard.submit();
                }
                if wizard.is_submitting() {
                    ui.spinner();
                }
            }
            IntakeStep::Sent => {}
        }
        if ui
            .add_enabled(!wizard.is_submitting(), egui::Button::new("Close"))
            .clicked()
        {
            actions.close = true;
        }
    });

    actions
}

/// The wizard keeps the rejection in `wizard.error`, which is rendered above the buttons.
fn advance(wizard: &mut IntakeWizard) {
    if let Err(err) = wizard.next() {
        log::debug!("Intake step {:?} not complete: {err}", wizard.step());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_step_stays_put_with_its_error_shown() {
        let mut wizard = IntakeWizard::new("a1", "Asha");
        wizard.message = "hi".to_string();
        advance(&mut wizard);
        assert_eq!(wizard.step(), IntakeStep::Message);
        assert!(wizard.error.is_some());

        wizard.message = "How is the CS program?".to_string();
        advance(&mut wizard);
        assert_eq!(wizard.step(), IntakeStep::ContactInfo);
        assert_eq!(wizard.error, None);
    }
}
