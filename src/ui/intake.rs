//! First-contact wizard: message, contact details, confirmation, then a
//! terminal "sent" screen.

use std::sync::LazyLock;

use regex::Regex;

use crate::common::{ChatCommand, EmbedConfig, VisitorIdentity};
use crate::error::{ChatError, Result};
use crate::security::{detailed_security_warning, validate_message};

pub const MIN_MESSAGE_LEN: usize = 10;

static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email shape"));

static PHONE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\+91)?\d{10}$").expect("valid phone shape"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeStep {
    Message,
    ContactInfo,
    Confirmation,
    Sent,
}

impl IntakeStep {
    pub fn number(&self) -> u8 {
        match self {
            IntakeStep::Message => 1,
            IntakeStep::ContactInfo => 2,
            IntakeStep::Confirmation => 3,
            IntakeStep::Sent => 4,
        }
    }
}

/// Where the finished intake goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeTarget {
    Ambassador { ambassador_id: String },
    Embed { config_key: String },
}

#[derive(Debug, Clone)]
pub struct IntakeWizard {
    pub target: IntakeTarget,
    pub ambassador_name: String,
    pub message: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub consent: bool,
    pub error: Option<String>,
    step: IntakeStep,
    submitting: bool,
    submitted_email: Option<String>,
}

impl IntakeWizard {
    pub fn new(ambassador_id: &str, ambassador_name: &str) -> Self {
        Self::with_target(
            IntakeTarget::Ambassador {
                ambassador_id: ambassador_id.to_string(),
            },
            ambassador_name,
        )
    }

    pub fn for_embed(config: &EmbedConfig) -> Self {
        let name = config
            .ambassador_name
            .clone()
            .unwrap_or_else(|| "our ambassador".to_string());
        Self::with_target(
            IntakeTarget::Embed {
                config_key: config.config_key.clone(),
            },
            &name,
        )
    }

    fn with_target(target: IntakeTarget, ambassador_name: &str) -> Self {
        Self {
            target,
            ambassador_name: ambassador_name.to_string(),
            message: String::new(),
            name: String::new(),
            email: String::new(),
            phone: String::new(),
            consent: false,
            error: None,
            step: IntakeStep::Message,
            submitting: false,
            submitted_email: None,
        }
    }

    pub fn step(&self) -> IntakeStep {
        self.step
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn can_submit(&self) -> bool {
        self.step == IntakeStep::Confirmation && !self.submitting
    }

    /// Validates the current step and moves forward. Errors are also kept in `error`.
    pub fn next(&mut self) -> Result<()> {
        let result = match self.step {
            IntakeStep::Message => self.check_message().map(|()| IntakeStep::ContactInfo),
            IntakeStep::ContactInfo => self.check_contact().map(|()| IntakeStep::Confirmation),
            step => Ok(step),
        };

        match result {
            Ok(step) => {
                self.step = step;
                self.error = None;
                Ok(())
            }
            Err(err) => {
                self.error = Some(err.user_message());
                Err(err)
            }
        }
    }

    pub fn back(&mut self) {
        if self.submitting {
            return;
        }
        self.step = match self.step {
            IntakeStep::ContactInfo => IntakeStep::Message,
            IntakeStep::Confirmation => IntakeStep::ContactInfo,
            step => step,
        };
        self.error = None;
    }

    /// Starts the submission. Returns `None` while one is already in flight.
    pub fn submit(&mut self) -> Option<ChatCommand> {
        if !self.can_submit() {
            return None;
        }
        self.submitting = true;
        self.error = None;

        let visitor = self.visitor();
        let message = self.message.trim().to_string();
        Some(match &self.target {
            IntakeTarget::Ambassador { ambassador_id } => ChatCommand::StartConversation {
                ambassador_id: ambassador_id.clone(),
                visitor,
                first_message: message,
            },
            IntakeTarget::Embed { config_key } => ChatCommand::SubmitEmbed {
                config_key: config_key.clone(),
                visitor,
                message,
            },
        })
    }

    pub fn handle_completed(&mut self) {
        self.submitting = false;
        self.step = IntakeStep::Sent;
        self.submitted_email = Some(self.email.trim().to_string());
    }

    /// Stays on the confirmation step so the user can retry.
    pub fn handle_failed(&mut self, error: String) {
        self.submitting = false;
        if self.step != IntakeStep::Sent {
            self.error = Some(error);
        }
    }

    pub fn confirmation_text(&self) -> Option<String> {
        self.submitted_email.as_ref().map(|email| {
            format!(
                "Your message was sent to {}. You will be notified at {email} when they reply.",
                self.ambassador_name
            )
        })
    }

    fn visitor(&self) -> VisitorIdentity {
        VisitorIdentity {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: normalize_phone(&self.phone),
        }
    }

    fn check_message(&self) -> Result<()> {
        let message = self.message.trim();
        if message.is_empty() {
            return Err(ChatError::Validation("Please write a message".to_string()));
        }
        if message.chars().count() < MIN_MESSAGE_LEN {
            return Err(ChatError::Validation(format!(
                "Message must be at least {MIN_MESSAGE_LEN} characters"
            )));
        }
        let outcome = validate_message(message);
        if let Some(warning) = detailed_security_warning(&outcome.violations) {
            return Err(ChatError::Validation(warning.message));
        }
        Ok(())
    }

    fn check_contact(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ChatError::Validation("Please enter your name".to_string()));
        }
        if !EMAIL_SHAPE.is_match(self.email.trim()) {
            return Err(ChatError::Validation(
                "Please enter a valid email address".to_string(),
            ));
        }
        if !PHONE_SHAPE.is_match(&normalize_phone(&self.phone)) {
            return Err(ChatError::Validation(
                "Please enter a valid 10-digit phone number".to_string(),
            ));
        }
        if !self.consent {
            return Err(ChatError::Validation(
                "Please agree to be contacted before continuing".to_string(),
            ));
        }
        Ok(())
    }
}

fn normalize_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> IntakeWizard {
        let mut wizard = IntakeWizard::new("a1", "Asha");
        wizard.message = "How is the CS program?".to_string();
        wizard.next().unwrap();
        wizard.name = "Ravi".to_string();
        wizard.email = "ravi@example.com".to_string();
        wizard.phone = "98765 43210".to_string();
        wizard.consent = true;
        wizard.next().unwrap();
        wizard
    }

    #[test]
    fn short_or_sensitive_messages_do_not_advance() {
        let mut wizard = IntakeWizard::new("a1", "Asha");
        wizard.message = "hi".to_string();
        assert!(wizard.next().is_err());
        assert_eq!(wizard.step(), IntakeStep::Message);

        wizard.message = "write me at ravi@example.com please".to_string();
        assert!(wizard.next().is_err());
        assert!(wizard.error.as_deref().unwrap().contains("Email addresses"));
        assert_eq!(wizard.step(), IntakeStep::Message);
    }

    #[test]
    fn contact_step_checks_shape_and_consent() {
        let mut wizard = IntakeWizard::new("a1", "Asha");
        wizard.message = "How is the CS program?".to_string();
        wizard.next().unwrap();
        wizard.name = "Ravi".to_string();
        wizard.email = "not-an-email".to_string();
        wizard.phone = "9876543210".to_string();
        assert!(wizard.next().is_err());

        wizard.email = "ravi@example.com".to_string();
        wizard.phone = "12345".to_string();
        assert!(wizard.next().is_err());

        wizard.phone = "+919876543210".to_string();
        assert!(wizard.next().is_err(), "consent is required");

        wizard.consent = true;
        wizard.next().unwrap();
        assert_eq!(wizard.step(), IntakeStep::Confirmation);
    }

    #[test]
    fn submit_is_single_flight() {
        let mut wizard = filled();
        let command = wizard.submit().expect("first submit");
        assert!(matches!(
            command,
            ChatCommand::StartConversation { ref ambassador_id, ref visitor, .. }
                if ambassador_id == "a1" && visitor.phone == "9876543210"
        ));
        assert!(wizard.submit().is_none());
        wizard.back();
        assert_eq!(wizard.step(), IntakeStep::Confirmation);
    }

    #[test]
    fn failure_keeps_confirmation_step_and_allows_retry() {
        let mut wizard = filled();
        wizard.submit().unwrap();
        wizard.handle_failed("Something went wrong. Please try again.".to_string());
        assert_eq!(wizard.step(), IntakeStep::Confirmation);
        assert!(wizard.error.is_some());
        assert!(wizard.submit().is_some());
    }

    #[test]
    fn sent_is_terminal() {
        let mut wizard = filled();
        wizard.submit().unwrap();
        wizard.handle_completed();
        assert_eq!(wizard.step(), IntakeStep::Sent);
        wizard.back();
        assert_eq!(wizard.step(), IntakeStep::Sent);
        assert!(wizard.submit().is_none());
        assert!(wizard.confirmation_text().unwrap().contains("ravi@example.com"));
    }

    #[test]
    fn embed_target_submits_through_embed() {
        let config = EmbedConfig {
            config_key: "site-1".to_string(),
            ambassador_id: "a1".to_string(),
            ambassador_name: None,
            title: None,
            welcome_message: None,
        };
        let mut wizard = IntakeWizard::for_embed(&config);
        wizard.message = "How is the CS program?".to_string();
        wizard.next().unwrap();
        wizard.name = "Ravi".to_string();
        wizard.email = "ravi@example.com".to_string();
        wizard.phone = "9876543210".to_string();
        wizard.consent = true;
        wizard.next().unwrap();
        assert!(matches!(
            wizard.submit(),
            Some(ChatCommand::SubmitEmbed { ref config_key, .. }) if config_key == "site-1"
        ));
    }
}
