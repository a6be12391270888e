//! Who is signed in.
//!
//! Sign-in itself happens elsewhere; the services only ask for the current
//! user id when they are created or when an order is placed.

use std::sync::{PoisonError, RwLock};

use storefront_core::UserId;

/// Source of the signed-in user's id.
pub trait IdentityProvider: Send + Sync {
    /// The current user, or `None` when browsing anonymously.
    fn current_user_id(&self) -> Option<UserId>;
}

/// A fixed identity.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<UserId>);

impl StaticIdentity {
    /// Always `user_id`.
    #[must_use]
    pub const fn user(user_id: UserId) -> Self {
        Self(Some(user_id))
    }

    /// Never signed in.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<UserId> {
        self.0.clone()
    }
}

/// An identity that changes as the user signs in and out.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    user: RwLock<Option<UserId>>,
}

impl SessionIdentity {
    /// Start signed out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sign-in.
    pub fn sign_in(&self, user_id: UserId) {
        tracing::info!(user_id = %user_id, "user signed in");
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user_id);
    }

    /// Record a sign-out.
    pub fn sign_out(&self) {
        if let Some(user_id) = self
            .user
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            tracing::info!(user_id = %user_id, "user signed out");
        }
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user_id(&self) -> Option<UserId> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
