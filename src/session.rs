use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap, HeaderValue},
};
use rand::{rngs::OsRng, RngCore};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::config::SessionConfig;

/// Per-client session state. `user_id` is set by signin and cleared by
/// signout.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Option<i64>,
    expires_at: OffsetDateTime,
}

/// In-memory token-to-session map. Expired entries are dropped on access.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn create(&self, ttl: Duration) -> String {
        let mut raw = [0u8; 16];
        OsRng.fill_bytes(&mut raw);
        let token = hex::encode(raw);
        let session = Session {
            user_id: None,
            expires_at: OffsetDateTime::now_utc() + ttl,
        };
        self.inner
            .write()
            .expect("session store lock")
            .insert(token.clone(), session);
        token
    }

    fn get(&self, token: &str) -> Option<Session> {
        let mut sessions = self.inner.write().expect("session store lock");
        match sessions.get(token) {
            Some(s) if s.expires_at > OffsetDateTime::now_utc() => Some(s.clone()),
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }

    fn set_user_id(&self, token: &str, user_id: Option<i64>) {
        if let Some(s) = self
            .inner
            .write()
            .expect("session store lock")
            .get_mut(token)
        {
            s.user_id = user_id;
        }
    }
}

/// Request-scoped session handle. Extraction never fails: requests without a
/// live session get a handle with no token, and a token is only allocated
/// when a handler actually signs a user in.
pub struct SessionCtx {
    store: SessionStore,
    config: SessionConfig,
    token: Option<String>,
    issued: bool,
}

impl SessionCtx {
    pub fn user_id(&self) -> Option<i64> {
        self.token
            .as_deref()
            .and_then(|t| self.store.get(t))
            .and_then(|s| s.user_id)
    }

    pub fn sign_in(&mut self, user_id: i64) {
        let token = match &self.token {
            Some(t) => t.clone(),
            None => {
                let t = self
                    .store
                    .create(Duration::minutes(self.config.ttl_minutes));
                debug!("session issued");
                self.token = Some(t.clone());
                self.issued = true;
                t
            }
        };
        self.store.set_user_id(&token, Some(user_id));
    }

    pub fn sign_out(&mut self) {
        if let Some(t) = &self.token {
            self.store.set_user_id(t, None);
        }
    }

    /// Append the `Set-Cookie` header for a token issued during this request.
    pub fn write_cookie(&self, headers: &mut HeaderMap) {
        if !self.issued {
            return;
        }
        let Some(token) = &self.token else {
            return;
        };
        let value = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            self.config.cookie, token
        );
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.append(header::SET_COOKIE, value);
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionCtx
where
    S: Send + Sync,
    SessionStore: FromRef<S>,
    SessionConfig: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let store = SessionStore::from_ref(state);
        let config = SessionConfig::from_ref(state);

        // Only a token the store still knows counts as a session
        let token = parts
            .headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|cookies| cookie_value(cookies, &config.cookie))
            .map(str::to_string)
            .filter(|t| store.get(t).is_some());

        Ok(Self {
            store,
            config,
            token,
            issued: false,
        })
    }
}

fn cookie_value<'a>(cookies: &'a str, name: &str) -> Option<&'a str> {
    cookies.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then_some(v)
    })
}
