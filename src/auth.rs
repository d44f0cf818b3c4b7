//! Session handling against the identity provider.
//!
//! The rental services only need to know who is signed in and whether the
//! session carries the administrator role; token issuance and refresh live
//! with the provider.

use reqwest::Client;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::Error;
use crate::fetch::Fetch;
use crate::models::CurrentUser;

const CLIENT_INFO: &str = "rent-a-bike/0.2.0";

/// An authenticated session
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub user: CurrentUser,
}

/// Raw user payload returned by the identity endpoint
#[derive(Debug, Deserialize)]
struct RawUser {
    email: String,
    #[serde(default)]
    user_metadata: RawUserMetadata,
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawUserMetadata {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

/// Client for the identity provider
pub struct Auth {
    base_url: String,
    key: String,
    http: Client,
    timeout: Option<Duration>,
    session: Arc<Mutex<Option<Session>>>,
}

impl Auth {
    pub fn new(base_url: &str, key: &str, http: Client, timeout: Option<Duration>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            http,
            timeout,
            session: Arc::new(Mutex::new(None)),
        }
    }

    /// Resolve an access token into a session and remember it
    pub async fn sign_in_with_token(&self, access_token: &str) -> Result<CurrentUser, Error> {
        let url = format!("{}/auth/v1/user", self.base_url);

        let raw = Fetch::get(&self.http, &url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .bearer_auth(access_token)
            .timeout(self.timeout)
            .execute::<RawUser>()
            .await
            .map_err(|e| match e {
                Error::RemoteTimeout => Error::RemoteTimeout,
                other => Error::auth(other.to_string()),
            })?;

        let user = CurrentUser {
            full_name: raw
                .user_metadata
                .full_name
                .unwrap_or_else(|| raw.email.clone()),
            email: raw.email,
            avatar_url: raw.user_metadata.avatar_url,
            role: raw.role,
        };

        let session = Session {
            access_token: access_token.to_string(),
            user: user.clone(),
        };
        *self.session.lock().map_err(|_| Error::auth("session lock poisoned"))? =
            Some(session);

        Ok(user)
    }

    /// The signed-in user, if any
    pub fn current_user(&self) -> Option<CurrentUser> {
        self.session
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|s| s.user.clone()))
    }

    /// The current access token, if any
    pub fn access_token(&self) -> Option<String> {
        self.session
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|s| s.access_token.clone()))
    }

    /// Drop the local session
    pub fn sign_out(&self) {
        if let Ok(mut guard) = self.session.lock() {
            *guard = None;
        }
    }
}
