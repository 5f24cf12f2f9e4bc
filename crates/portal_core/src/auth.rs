//! Authentication boundary.
//!
//! The portal never signs users in itself; it only asks an injected provider
//! who is looking at the screen. The viewer's email domain scopes every
//! college-level read.

use crate::model::email_domain;

/// Signed-in user as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub email: String,
}

impl Viewer {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }

    /// College domain of the viewer (text after `@`).
    pub fn domain(&self) -> Option<&str> {
        email_domain(&self.email)
    }
}

/// Snapshot of the auth provider state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthState {
    pub user: Option<Viewer>,
    /// `true` while the provider is still resolving the initial session.
    pub loading: bool,
}

impl AuthState {
    /// Returns the viewer once auth has settled with a signed-in user.
    pub fn ready_viewer(&self) -> Option<&Viewer> {
        if self.loading {
            return None;
        }
        self.user.as_ref()
    }
}

/// Source of the current auth state.
pub trait AuthProvider: Send + Sync {
    fn current(&self) -> AuthState;
}

impl<A: AuthProvider + ?Sized> AuthProvider for std::sync::Arc<A> {
    fn current(&self) -> AuthState {
        (**self).current()
    }
}

/// Provider with a fixed state.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    state: AuthState,
}

impl StaticAuth {
    pub fn signed_in(email: impl Into<String>) -> Self {
        Self {
            state: AuthState {
                user: Some(Viewer::new(email)),
                loading: false,
            },
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn loading() -> Self {
        Self {
            state: AuthState {
                user: None,
                loading: true,
            },
        }
    }
}

impl AuthProvider for StaticAuth {
    fn current(&self) -> AuthState {
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthProvider, StaticAuth};

    #[test]
    fn ready_viewer_requires_settled_sign_in() {
        assert!(StaticAuth::loading().current().ready_viewer().is_none());
        assert!(StaticAuth::signed_out().current().ready_viewer().is_none());

        let state = StaticAuth::signed_in("admin@x.edu").current();
        let viewer = state.ready_viewer().unwrap();
        assert_eq!(viewer.domain(), Some("x.edu"));
    }
}
