//! Caller identity.
//!
//! Authentication happens outside this crate; the host passes whatever it
//! verified. Only `user_id` scopes stored records.

use serde::{Deserialize, Serialize};

/// An authenticated user, as vouched for by the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque, stable user id; the owner key of stored records.
    pub user_id: String,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}
