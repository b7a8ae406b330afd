use shopforge_auth::Role;
use shopforge_core::UserId;

/// Authenticated context for a request (derived from a verified token).
///
/// Absent for anonymous requests; guest identity comes from the
/// client-supplied session id instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    user_id: UserId,
    roles: Vec<Role>,
}

impl AuthContext {
    pub fn new(user_id: UserId, roles: Vec<Role>) -> Self {
        Self { user_id, roles }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r.as_str() == "admin")
    }
}
