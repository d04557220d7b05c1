use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Source of the authenticated principal.
///
/// Injected into the role store and permission checker; returning `None`
/// means nobody is signed in, which every consumer treats as "no roles".
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_principal(&self) -> Option<Uuid>;
}

/// Fixed principal, typically resolved from a request's bearer token.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPrincipal(pub Option<Uuid>);

impl StaticPrincipal {
    pub fn new(user_id: Uuid) -> Self {
        Self(Some(user_id))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

#[async_trait]
impl AuthProvider for StaticPrincipal {
    async fn current_principal(&self) -> Option<Uuid> {
        self.0
    }
}

/// Long-lived session that can be signed in and out.
#[derive(Debug, Default)]
pub struct SessionAuth {
    current: RwLock<Option<Uuid>>,
}

impl SessionAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user_id: Uuid) -> Self {
        Self {
            current: RwLock::new(Some(user_id)),
        }
    }

    pub async fn sign_in(&self, user_id: Uuid) {
        *self.current.write().await = Some(user_id);
    }

    pub async fn sign_out(&self) {
        *self.current.write().await = None;
    }
}

#[async_trait]
impl AuthProvider for SessionAuth {
    async fn current_principal(&self) -> Option<Uuid> {
        *self.current.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_tracks_sign_in_and_out() {
        let session = SessionAuth::new();
        assert_eq!(session.current_principal().await, None);

        let user_id = Uuid::new_v4();
        session.sign_in(user_id).await;
        assert_eq!(session.current_principal().await, Some(user_id));

        session.sign_out().await;
        assert_eq!(session.current_principal().await, None);
    }

    #[tokio::test]
    async fn static_principal_is_fixed() {
        let user_id = Uuid::new_v4();
        assert_eq!(StaticPrincipal::new(user_id).current_principal().await, Some(user_id));
        assert_eq!(StaticPrincipal::anonymous().current_principal().await, None);
    }
}
