use crate::local_storage::{load_json, save_json, LocalStorage};
use chrono::{DateTime, Duration, Utc};
use fooddala_core::api::AuthApi;
use fooddala_core::identity::User;
use fooddala_core::{CoreError, CoreResult};
use fooddala_shared::Masked;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user: User,
    pub access_token: Masked<String>,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Who is signed in. Checkout refuses to run without a live session.
pub struct SessionStore {
    session: watch::Sender<Option<AuthSession>>,
    storage: Arc<dyn LocalStorage>,
    ttl: Duration,
}

impl SessionStore {
    pub const STORAGE_KEY: &'static str = "fooddala_session";

    pub fn hydrate(storage: Arc<dyn LocalStorage>, ttl: Duration) -> Self {
        let session = load_json::<AuthSession>(&*storage, Self::STORAGE_KEY).filter(|s| {
            let live = !s.is_expired(Utc::now());
            if !live {
                info!("Stored session for {} has expired", s.user.id);
            }
            live
        });
        let (tx, _) = watch::channel(session);
        Self { session: tx, storage, ttl }
    }

    /// The live session, if any. An expired one counts as none.
    pub fn current(&self) -> Option<AuthSession> {
        self.session
            .borrow()
            .as_ref()
            .filter(|s| !s.is_expired(Utc::now()))
            .cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }

    pub fn user(&self) -> Option<User> {
        self.current().map(|s| s.user)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.session.subscribe()
    }

    pub fn sign_in(&self, user: User, access_token: Masked<String>) -> AuthSession {
        let session = AuthSession {
            user,
            access_token,
            expires_at: Utc::now() + self.ttl,
        };
        info!("Signed in as {} ({:?})", session.user.id, session.user.role);
        save_json(&*self.storage, Self::STORAGE_KEY, &session);
        self.session.send_replace(Some(session.clone()));
        session
    }

    pub fn sign_out(&self) {
        if let Err(e) = self.storage.remove(Self::STORAGE_KEY) {
            warn!("Failed to drop stored session: {}", e);
        }
        self.session.send_replace(None);
    }

    /// Replace the profile (e.g. after saving a new address) without touching the token.
    pub fn update_user(&self, user: User) -> bool {
        let storage = &*self.storage;
        self.session.send_if_modified(|session| match session {
            Some(s) => {
                s.user = user;
                save_json(storage, Self::STORAGE_KEY, s);
                true
            }
            None => false,
        })
    }

    pub async fn login(&self, api: &dyn AuthApi, email: &str, password: &str) -> CoreResult<AuthSession> {
        let data = api.login(email, password).await?;
        Ok(self.sign_in(data.user, data.access_token))
    }

    /// Re-check a restored session with the backend; a rejected token signs the user out.
    pub async fn refresh_user(&self, api: &dyn AuthApi) -> CoreResult<Option<User>> {
        if !self.is_authenticated() {
            return Ok(None);
        }
        match api.me().await {
            Ok(user) => {
                self.update_user(user.clone());
                Ok(Some(user))
            }
            Err(CoreError::Unauthorized) | Err(CoreError::Rejected { .. }) => {
                warn!("Stored session rejected by backend, signing out");
                self.sign_out();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn logout(&self, api: &dyn AuthApi) {
        if let Err(e) = api.logout().await {
            warn!("Logout error: {}", e);
        }
        self.sign_out();
    }
}
