//! Caller identity forwarded to collaborating services.

use serde::{Deserialize, Serialize};

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "X-User-ID";
/// Header carrying the caller's role.
pub const USER_ROLE_HEADER: &str = "X-User-Role";
/// Header carrying the caller's email.
pub const USER_EMAIL_HEADER: &str = "X-User-Email";

const SYSTEM_USER: &str = "system";
const SYSTEM_ROLE: &str = "SYSTEM";

/// Identity of the caller on whose behalf a saga runs.
///
/// Passed explicitly into every remote client call; there is no ambient
/// per-thread user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub user_id: String,
    pub role: String,
    pub email: Option<String>,
}

impl RequestContext {
    /// Creates a context for an authenticated user.
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
            email: None,
        }
    }

    /// Context used for internal calls that have no end user.
    pub fn system() -> Self {
        Self::new(SYSTEM_USER, SYSTEM_ROLE)
    }

    /// Sets the caller's email.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Returns true for the internal system identity.
    pub fn is_system(&self) -> bool {
        self.user_id == SYSTEM_USER && self.role == SYSTEM_ROLE
    }

    /// Header pairs to attach to an outbound request.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            (USER_ID_HEADER, self.user_id.clone()),
            (USER_ROLE_HEADER, self.role.clone()),
        ];
        if let Some(email) = &self.email {
            headers.push((USER_EMAIL_HEADER, email.clone()));
        }
        headers
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::system()
    }
}
