//! Detection and redaction of personal contact details in chat text.
//!
//! Validation runs before a message is sent; redaction runs whenever message
//! content is displayed, for both sides of the conversation.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const EMAIL_PLACEHOLDER: &str = "[Email Removed for Security]";
pub const PHONE_PLACEHOLDER: &str = "[Phone Number Removed for Security]";
// Must not contain any of the messaging keywords, or redaction would stop being idempotent.
pub const WHATSAPP_PLACEHOLDER: &str = "[Messaging Link Removed for Security]";
pub const SOCIAL_MEDIA_PLACEHOLDER: &str = "[Social Media Link Removed for Security]";

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("valid email pattern")
});

// Optional +91/91 prefix and an Indian mobile number, or any bare 10-digit run.
static PHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?:\+91|91)[\-\s]?)?[6-9]\d{9}|\d{10}").expect("valid phone pattern")
});

static WHATSAPP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)whatsapp\.com|whatsapp|wa\.me|wa\.ly").expect("valid whatsapp pattern")
});

static SOCIAL_MEDIA_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)facebook\.com|instagram\.com|twitter\.com|linkedin\.com|snapchat\.com|telegram\.com",
    )
    .expect("valid social media pattern")
});

/// Which categories of sensitive content a piece of text contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationSet {
    pub email: bool,
    pub phone: bool,
    pub whatsapp_link: bool,
    pub social_media_link: bool,
}

impl ViolationSet {
    pub fn any(&self) -> bool {
        self.email || self.phone || self.whatsapp_link || self.social_media_link
    }

    /// Human-readable names of the categories that are set, in a fixed order.
    pub fn labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.email {
            labels.push("Email addresses");
        }
        if self.phone {
            labels.push("Phone numbers");
        }
        if self.whatsapp_link {
            labels.push("WhatsApp links");
        }
        if self.social_media_link {
            labels.push("Social media links");
        }
        labels
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub violations: ViolationSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningKind {
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityWarning {
    pub title: String,
    pub message: String,
    pub kind: WarningKind,
}

/// Classifies `text`. Every call scans the whole input; the compiled
/// patterns carry no match state between calls.
pub fn validate_message(text: &str) -> ValidationOutcome {
    let violations = ViolationSet {
        email: EMAIL_PATTERN.is_match(text),
        phone: PHONE_PATTERN.is_match(text),
        whatsapp_link: WHATSAPP_PATTERN.is_match(text),
        social_media_link: SOCIAL_MEDIA_PATTERN.is_match(text),
    };

    ValidationOutcome {
        is_valid: !violations.any(),
        violations,
    }
}

/// Replaces every sensitive match with its category placeholder.
/// Filtering already-filtered text returns it unchanged.
pub fn filter_sensitive_data(text: &str) -> String {
    let filtered = EMAIL_PATTERN.replace_all(text, EMAIL_PLACEHOLDER);
    let filtered = PHONE_PATTERN.replace_all(&filtered, PHONE_PLACEHOLDER);
    let filtered = WHATSAPP_PATTERN.replace_all(&filtered, WHATSAPP_PLACEHOLDER);
    let filtered = SOCIAL_MEDIA_PATTERN.replace_all(&filtered, SOCIAL_MEDIA_PLACEHOLDER);
    filtered.into_owned()
}

pub fn detailed_security_warning(violations: &ViolationSet) -> Option<SecurityWarning> {
    if !violations.any() {
        return None;
    }

    Some(SecurityWarning {
        title: "Security Warning".to_string(),
        message: format!(
            "Your message contains {}. Sharing personal contact information is not allowed \
             for your safety. Please keep the conversation on this platform.",
            violations.labels().join(", ")
        ),
        kind: WarningKind::Warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_detected() {
        let outcome = validate_message("contact me at a@b.com");
        assert!(!outcome.is_valid);
        assert!(outcome.violations.email);
        assert!(!outcome.violations.phone);
    }

    #[test]
    fn plain_text_is_valid() {
        let outcome = validate_message("let's meet Tuesday");
        assert!(outcome.is_valid);
        assert_eq!(outcome.violations, ViolationSet::default());
    }

    #[test]
    fn indian_mobile_with_prefix_is_detected() {
        assert!(validate_message("ping +91 9876543210").violations.phone);
        assert!(validate_message("ping 919876543210").violations.phone);
    }

    #[test]
    fn any_ten_digit_run_counts_as_phone() {
        // Order ids of ten digits are caught too; that breadth is deliberate policy.
        assert!(validate_message("order 1234567890 shipped").violations.phone);
        assert!(validate_message("pin 123456").is_valid);
    }

    #[test]
    fn messaging_and_social_keywords_are_case_insensitive() {
        let outcome = validate_message("add me on WhatsApp or Instagram.com/me");
        assert!(outcome.violations.whatsapp_link);
        assert!(outcome.violations.social_media_link);
        assert!(validate_message("https://WA.ME/123").violations.whatsapp_link);
        assert!(validate_message("t.co via Telegram.com").violations.social_media_link);
    }

    #[test]
    fn repeated_validation_gives_same_answer() {
        for _ in 0..3 {
            assert!(validate_message("mail x@y.org").violations.email);
        }
    }

    #[test]
    fn filter_redacts_each_category_independently() {
        let filtered =
            filter_sensitive_data("mail a@b.com, call 9876543210, wa.me/1, facebook.com/x");
        assert_eq!(
            filtered,
            format!(
                "mail {EMAIL_PLACEHOLDER}, call {PHONE_PLACEHOLDER}, {WHATSAPP_PLACEHOLDER}/1, \
                 {SOCIAL_MEDIA_PLACEHOLDER}/x"
            )
        );
    }

    #[test]
    fn filter_is_idempotent() {
        let inputs = [
            "reach me: someone.else+tag@uni.edu.in or +91-9123456789",
            "whatsapp.com and WhatsApp and wa.ly",
            "1234567890123 twitter.com linkedin.com snapchat.com",
            "nothing sensitive here",
            "",
        ];
        for input in inputs {
            let once = filter_sensitive_data(input);
            assert_eq!(filter_sensitive_data(&once), once, "input: {input}");
        }
    }

    #[test]
    fn placeholders_are_clean() {
        for placeholder in [
            EMAIL_PLACEHOLDER,
            PHONE_PLACEHOLDER,
            WHATSAPP_PLACEHOLDER,
            SOCIAL_MEDIA_PLACEHOLDER,
        ] {
            assert!(validate_message(placeholder).is_valid, "{placeholder}");
        }
    }

    #[test]
    fn warning_lists_only_set_categories() {
        assert_eq!(detailed_security_warning(&ViolationSet::default()), None);

        let warning = detailed_security_warning(&ViolationSet {
            email: true,
            phone: true,
            ..ViolationSet::default()
        })
        .expect("warning");
        assert_eq!(warning.title, "Security Warning");
        assert!(warning.message.contains("Email addresses, Phone numbers."));
        assert!(!warning.message.contains("WhatsApp"));
        assert_eq!(warning.kind, WarningKind::Warning);
    }
}
