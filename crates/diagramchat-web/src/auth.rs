//! Access gate for the chat endpoint.
//!
//! A caller may use the server's own upstream key only by presenting the
//! shared password.  A caller who brings a usable key of their own is
//! spending their own quota and is let through unconditionally.

/// Header carrying the shared password.
pub const PASSWORD_HEADER: &str = "x-access-password";

/// Outcome of [`authorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// The request may proceed.
    Allow,
    /// The request is refused; the reason is shown to the caller.
    Deny(String),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decide whether a chat request may proceed.
///
/// Rules, first match wins:
///
/// 1. the caller supplied a usable override credential;
/// 2. the server has no password configured (deny);
/// 3. the caller supplied no password (deny);
/// 4. the supplied password equals the configured one.
///
/// Empty strings count as absent for both passwords.
pub fn authorize(
    supplied: Option<&str>,
    configured: Option<&str>,
    has_usable_override: bool,
) -> AccessDecision {
    if has_usable_override {
        return AccessDecision::Allow;
    }

    let Some(configured) = configured.filter(|p| !p.is_empty()) else {
        return AccessDecision::Deny(
            "server has no configured password; supply your own credentials.".into(),
        );
    };

    let Some(supplied) = supplied.filter(|p| !p.is_empty()) else {
        return AccessDecision::Deny("password or credentials required.".into());
    };

    if supplied == configured {
        AccessDecision::Allow
    } else {
        AccessDecision::Deny("incorrect password.".into())
    }
}
