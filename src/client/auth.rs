//! Request authentication.
//!
//! An [`Authenticator`] is installed once per client with
//! [`CouchClient::authenticate`]. It gets one chance to talk to the server
//! (to open a session, for example) and is then applied to every request.

use super::transport::{CouchClient, RequestOptions};
use crate::error::{CouchError, Result};
use crate::protocol::constants::AUTH_SESSION_COOKIE;
use crate::protocol::headers::parse_set_cookie;
use async_trait::async_trait;
use base64::Engine;
use http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use http::Method;
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;

/// Authentication strategy for a [`CouchClient`].
#[async_trait]
pub trait Authenticator: Send + Sync + fmt::Debug {
    /// Prepare credentials, talking to the server if needed.
    async fn authenticate(&self, client: &CouchClient) -> Result<()>;

    /// Attach credentials to an outgoing request.
    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder;
}

/// HTTP Basic authentication.
#[derive(Clone)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    /// Create Basic credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        BasicAuth {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Value of the `Authorization` header.
    pub fn header_value(&self) -> String {
        let credentials = format!("{}:{}", self.username, self.password);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        )
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Authenticator for BasicAuth {
    async fn authenticate(&self, _client: &CouchClient) -> Result<()> {
        Ok(())
    }

    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header(AUTHORIZATION, self.header_value())
    }
}

/// Cookie authentication through CouchDB's `/_session` endpoint.
pub struct CookieAuth {
    username: String,
    password: String,
    session: RwLock<Option<String>>,
}

#[derive(Serialize)]
struct SessionRequest<'a> {
    name: &'a str,
    password: &'a str,
}

impl CookieAuth {
    /// Create cookie-auth credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        CookieAuth {
            username: username.into(),
            password: password.into(),
            session: RwLock::new(None),
        }
    }

    /// The session cookie (`AuthSession=...`), once authenticated.
    pub fn session_cookie(&self) -> Option<String> {
        self.session.read().clone()
    }
}

impl fmt::Debug for CookieAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieAuth")
            .field("username", &self.username)
            .field("authenticated", &self.session.read().is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Authenticator for CookieAuth {
    async fn authenticate(&self, client: &CouchClient) -> Result<()> {
        let body = SessionRequest {
            name: &self.username,
            password: &self.password,
        };
        let response = client
            .do_req(Method::POST, &["_session"], RequestOptions::json(&body)?)
            .await?;
        let response = client.response_error(response).await?;

        let cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|value| parse_set_cookie(value, AUTH_SESSION_COOKIE))
            .ok_or_else(|| {
                CouchError::Auth(format!("no {} cookie in session response", AUTH_SESSION_COOKIE))
            })?;

        *self.session.write() = Some(cookie);
        Ok(())
    }

    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.session.read().as_deref() {
            Some(cookie) => request.header(COOKIE, cookie),
            None => request,
        }
    }
}
