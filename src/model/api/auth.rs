use serde::{Deserialize, Serialize};

use super::session::SessionIdentity;

/// Login credentials, received from a user.
#[derive(Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Response to a successful login or registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    pub user: SessionIdentity,
}

impl AuthResponse {
    pub fn new(user: SessionIdentity) -> Self {
        Self {
            success: true,
            user,
        }
    }
}

/// The caller's current session, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatus {
    pub user: Option<SessionIdentity>,
}

/// Bare acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}
