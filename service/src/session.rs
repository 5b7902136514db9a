//! Session hand-off from the external auth collaborator.
//!
//! Authentication and the second-factor mechanism are outside this crate;
//! all the transaction manager needs is who the caller is and whether their
//! session completed the second factor.

use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    pub user_id: Option<Uuid>,
    pub second_factor_verified: bool,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            second_factor_verified: false,
        }
    }

    /// Mark the session as having completed the second factor.
    pub fn with_second_factor(mut self) -> Self {
        self.second_factor_verified = true;
        self
    }
}
