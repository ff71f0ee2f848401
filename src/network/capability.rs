use std::collections::HashSet;

use crate::common::{Conversation, Role};
use crate::error::{ChatError, Result};
use crate::session::Identity;

/// Proof that the signed-in identity is an admin. Required by every admin endpoint.
#[derive(Debug, Clone)]
pub struct AdminCapability {
    admin_id: String,
}

impl AdminCapability {
    pub fn from_identity(identity: &Identity) -> Result<Self> {
        if identity.role != Role::Admin {
            return Err(ChatError::Forbidden(format!(
                "{} is not an admin",
                identity.role.as_str()
            )));
        }
        Ok(Self {
            admin_id: identity.id.clone(),
        })
    }

    pub fn admin_id(&self) -> &str {
        &self.admin_id
    }
}

/// Write access, on behalf of one ambassador, to that ambassador's conversations only.
#[derive(Debug, Clone)]
pub struct ImpersonationGrant {
    admin_id: String,
    ambassador_id: String,
    chat_ids: HashSet<String>,
}

impl ImpersonationGrant {
    /// Conversations whose participants are known and exclude the ambassador are left out.
    pub fn issue(
        capability: &AdminCapability,
        ambassador_id: &str,
        conversations: &[Conversation],
    ) -> Self {
        let chat_ids = conversations
            .iter()
            .filter(|chat| chat.participants.is_empty() || chat.involves(ambassador_id))
            .map(|chat| chat.id.clone())
            .collect();

        Self {
            admin_id: capability.admin_id.clone(),
            ambassador_id: ambassador_id.to_string(),
            chat_ids,
        }
    }

    pub fn admin_id(&self) -> &str {
        &self.admin_id
    }

    pub fn ambassador_id(&self) -> &str {
        &self.ambassador_id
    }

    pub fn covers(&self, chat_id: &str) -> bool {
        self.chat_ids.contains(chat_id)
    }

    pub fn check(&self, chat_id: &str) -> Result<()> {
        if self.covers(chat_id) {
            Ok(())
        } else {
            Err(ChatError::Forbidden(format!(
                "chat {chat_id} does not belong to ambassador {}",
                self.ambassador_id
            )))
        }
    }
}
