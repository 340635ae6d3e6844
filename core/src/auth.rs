/*
    on-repeat-rs | Rust CLI tool to archive Spotify's On Repeat into monthly playlists.
    Copyright (C) 2025  Israel Alberto Roldan Vega

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use log::info;
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

use crate::api::{ApiError, SpotifyClient};
use crate::config::SyncConfig;
use crate::store::{SessionStore, StoreError};

/// Key the verifier is stored under between the redirect and the exchange.
pub const VERIFIER_KEY: &str = "verifier";
pub const VERIFIER_LENGTH: usize = 128;
const VERIFIER_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No PKCE verifier found; start again with `authorize` on this machine")]
    MissingVerifier,
    #[error("Authorization was denied: {0}")]
    Denied(String),
    #[error("Callback URL has no authorization code")]
    MissingCode,
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
    #[error("Token exchange failed: {0}")]
    Api(#[from] ApiError),
}

/// Bearer token for the rest of the run. No refresh, no expiry tracking.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenState {
    access_token: String,
}

impl TokenState {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenState")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// A PKCE verifier and its S256 challenge.
///
/// The verifier stays on this machine; only the challenge is sent with the
/// authorization redirect. The token endpoint later checks that the verifier
/// hashes to the challenge it saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceCredential {
    pub verifier: String,
    pub challenge: String,
}

impl PkceCredential {
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    /// Draws `VERIFIER_LENGTH` characters uniformly, with replacement, from
    /// the 62 ASCII letters and digits.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let verifier: String = (0..VERIFIER_LENGTH)
            .map(|_| VERIFIER_ALPHABET[rng.gen_range(0..VERIFIER_ALPHABET.len())] as char)
            .collect();
        Self::from_verifier(verifier)
    }

    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let challenge = code_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

/// base64url(SHA-256(verifier)) without padding.
///
/// The URL-safe alphabet already maps `+`/`/` to `-`/`_`, so no rewriting is
/// needed after encoding.
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// One authorization attempt. The verifier goes into the store when the
/// attempt starts and comes out (and is deleted) when it resumes.
#[derive(Debug)]
pub struct AuthorizationSession {
    verifier: String,
}

impl AuthorizationSession {
    pub fn start<S: SessionStore + ?Sized>(
        store: &mut S,
        credential: &PkceCredential,
    ) -> Result<Self, AuthError> {
        store.set(VERIFIER_KEY, &credential.verifier)?;
        Ok(Self {
            verifier: credential.verifier.clone(),
        })
    }

    pub fn resume<S: SessionStore + ?Sized>(store: &mut S) -> Result<Self, AuthError> {
        let verifier = store
            .remove(VERIFIER_KEY)?
            .ok_or(AuthError::MissingVerifier)?;
        Ok(Self { verifier })
    }

    pub fn into_verifier(self) -> String {
        self.verifier
    }
}

/// Where an authorization attempt stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    NoAuthorization,
    RedirectedToProvider { authorize_url: Url },
    AuthorizationCodeReceived { code: String },
    TokenAcquired(TokenState),
}

impl AuthState {
    pub fn from_code(code: Option<String>) -> Self {
        match code {
            Some(code) if !code.trim().is_empty() => Self::AuthorizationCodeReceived {
                code: code.trim().to_string(),
            },
            _ => Self::NoAuthorization,
        }
    }

    /// Reads the callback URL the provider redirected to.
    ///
    /// - `?code=...` gives `AuthorizationCodeReceived`.
    /// - `?error=...` (the user declined) gives `AuthError::Denied`.
    /// - Neither gives `AuthError::MissingCode`.
    pub fn from_redirect_url(redirect_url: &str) -> Result<Self, AuthError> {
        let url = Url::parse(redirect_url.trim())?;
        let mut code = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "error" => return Err(AuthError::Denied(value.into_owned())),
                "code" => code = Some(value.into_owned()),
                _ => {}
            }
        }
        match code {
            Some(code) if !code.is_empty() => Ok(Self::AuthorizationCodeReceived { code }),
            _ => Err(AuthError::MissingCode),
        }
    }
}

/// Drives the PKCE authorization code flow against the accounts service.
///
/// The flow spans two runs of the program: the first one sends the user to
/// Spotify, the second one receives the code. The verifier crosses that gap
/// through the [`SessionStore`].
pub struct AuthFlow<S: SessionStore> {
    client: SpotifyClient,
    client_id: String,
    redirect_uri: String,
    scopes: Vec<String>,
    store: S,
}

impl<S: SessionStore> AuthFlow<S> {
    pub fn new(client: SpotifyClient, config: &SyncConfig, store: S) -> Self {
        Self {
            client,
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Moves one step along
    /// `NoAuthorization -> RedirectedToProvider` or
    /// `AuthorizationCodeReceived -> TokenAcquired`. Other states are final.
    pub async fn advance(&mut self, state: AuthState) -> Result<AuthState, AuthError> {
        match state {
            AuthState::NoAuthorization => Ok(AuthState::RedirectedToProvider {
                authorize_url: self.begin()?,
            }),
            AuthState::AuthorizationCodeReceived { code } => {
                Ok(AuthState::TokenAcquired(self.exchange(&code).await?))
            }
            done => Ok(done),
        }
    }

    /// Starts an authorization attempt.
    ///
    /// This function:
    /// 1. Generates a fresh PKCE credential.
    /// 2. Persists the verifier under [`VERIFIER_KEY`], replacing any earlier one.
    /// 3. Builds the `/authorize` URL carrying the client id, the redirect URI,
    ///    the scopes and the S256 challenge.
    ///
    /// The caller is expected to send the user to the returned URL and end the
    /// run; nothing else happens until the provider redirects back.
    pub fn begin(&mut self) -> Result<Url, AuthError> {
        let credential = PkceCredential::generate();
        AuthorizationSession::start(&mut self.store, &credential)?;
        let url = self.authorize_url(&credential.challenge)?;
        info!("Authorization session started; redirecting to {}", url.host_str().unwrap_or(""));
        Ok(url)
    }

    /// The provider's consent page for `challenge`. Scopes are space-delimited.
    pub fn authorize_url(&self, challenge: &str) -> Result<Url, AuthError> {
        let scope = self.scopes.join(" ");
        let url = Url::parse_with_params(
            &self.client.endpoints().authorize_url(),
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("code_challenge_method", "S256"),
                ("code_challenge", challenge),
            ],
        )?;
        Ok(url)
    }

    /// Trades the authorization code for an access token.
    ///
    /// This function:
    /// 1. Takes the verifier out of the store. If none is there (authorization
    ///    was started elsewhere, or the verifier was already used) it fails with
    ///    [`AuthError::MissingVerifier`] without contacting Spotify.
    /// 2. POSTs the form-encoded exchange (`grant_type=authorization_code`,
    ///    code, redirect URI and verifier) to `/api/token`.
    /// 3. Decodes `access_token` from the response. A non-success status or a
    ///    body without the field surfaces as [`AuthError::Api`].
    ///
    /// The stored verifier is consumed even if the exchange fails; a new
    /// attempt has to start again from [`AuthFlow::begin`].
    pub async fn exchange(&mut self, code: &str) -> Result<TokenState, AuthError> {
        let verifier = AuthorizationSession::resume(&mut self.store)?.into_verifier();

        // The redirect URI must match the one sent to /authorize byte for byte.
        let form = vec![
            ("client_id".to_string(), self.client_id.clone()),
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("code".to_string(), code.to_string()),
            ("redirect_uri".to_string(), self.redirect_uri.clone()),
            ("code_verifier".to_string(), verifier),
        ];
        let response = self.client.request_token(form).await?;

        match response.expires_in {
            Some(seconds) => info!("Access token acquired (expires in {}s)", seconds),
            None => info!("Access token acquired"),
        }
        Ok(TokenState::new(response.access_token))
    }
}
