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

//! HTTP plumbing: a request/response [`Transport`] and the typed
//! [`SpotifyClient`] built on top of it.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::auth::TokenState;
use crate::models::{
    AddTracks, CreatedPlaylist, NewPlaylist, SnapshotResponse, TokenResponse, UserProfile,
};

pub const SPOTIFY_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
pub const SPOTIFY_API_URL: &str = "https://api.spotify.com";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },
    #[error("Unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Could not encode request body for {url}: {source}")]
    Encode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Form(Vec<(String, String)>),
    Json(serde_json::Value),
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub bearer: Option<String>,
    pub body: Body,
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request and hands back the raw status and body.
///
/// Nothing above this trait knows about sockets, so tests can swap in a fake.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// Production transport backed by `reqwest`. No timeouts and no retries.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut builder = match request.method {
            Method::Get => self.http.get(&request.url),
            Method::Post => self.http.post(&request.url),
        };
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.body {
            Body::Empty => builder,
            Body::Form(pairs) => builder.form(pairs),
            Body::Json(value) => builder.json(value),
        };

        let transport_error = |e: reqwest::Error| ApiError::Transport {
            url: request.url.clone(),
            source: Box::new(e),
        };
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;

        Ok(ApiResponse { status, body })
    }
}

/// Base URLs of the accounts service and the Web API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub accounts: String,
    pub api: String,
}

impl Endpoints {
    pub fn new(accounts: impl Into<String>, api: impl Into<String>) -> Self {
        Self {
            accounts: accounts.into().trim_end_matches('/').to_string(),
            api: api.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/authorize", self.accounts)
    }

    pub fn token_url(&self) -> String {
        format!("{}/api/token", self.accounts)
    }

    pub fn me_url(&self) -> String {
        format!("{}/v1/me", self.api)
    }

    pub fn user_playlists_url(&self, user_id: &str) -> String {
        format!("{}/v1/users/{}/playlists", self.api, user_id)
    }

    pub fn playlist_tracks_url(&self, playlist_id: &str) -> String {
        format!("{}/v1/playlists/{}/tracks", self.api, playlist_id)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(SPOTIFY_ACCOUNTS_URL, SPOTIFY_API_URL)
    }
}

/// Typed access to the handful of Spotify endpoints this tool touches.
///
/// Every response has its status checked before the body is decoded into the
/// endpoint's schema.
#[derive(Clone)]
pub struct SpotifyClient {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
}

impl SpotifyClient {
    pub fn new(transport: Arc<dyn Transport>, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    pub fn with_reqwest(endpoints: Endpoints) -> Self {
        Self::new(Arc::new(ReqwestTransport::new()), endpoints)
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Authenticated GET of an absolute URL, e.g. a pagination cursor.
    pub async fn get<R: DeserializeOwned>(
        &self,
        url: &str,
        token: &TokenState,
    ) -> Result<R, ApiError> {
        self.execute(ApiRequest {
            method: Method::Get,
            url: url.to_string(),
            bearer: Some(token.access_token().to_string()),
            body: Body::Empty,
        })
        .await
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        url: String,
        token: &TokenState,
        body: &B,
    ) -> Result<R, ApiError> {
        let body = serde_json::to_value(body).map_err(|source| ApiError::Encode {
            url: url.clone(),
            source,
        })?;
        self.execute(ApiRequest {
            method: Method::Post,
            url,
            bearer: Some(token.access_token().to_string()),
            body: Body::Json(body),
        })
        .await
    }

    async fn execute<R: DeserializeOwned>(&self, request: ApiRequest) -> Result<R, ApiError> {
        let url = request.url.clone();
        debug!("{:?} {}", request.method, url);

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(ApiError::Status {
                url,
                status: response.status,
                body: response.body,
            });
        }

        serde_json::from_str(&response.body).map_err(|source| ApiError::Decode { url, source })
    }

    /// `POST /api/token`, form encoded, unauthenticated.
    pub async fn request_token(
        &self,
        form: Vec<(String, String)>,
    ) -> Result<TokenResponse, ApiError> {
        self.execute(ApiRequest {
            method: Method::Post,
            url: self.endpoints.token_url(),
            bearer: None,
            body: Body::Form(form),
        })
        .await
    }

    pub async fn current_user(&self, token: &TokenState) -> Result<UserProfile, ApiError> {
        self.get(&self.endpoints.me_url(), token).await
    }

    pub async fn create_playlist(
        &self,
        user_id: &str,
        token: &TokenState,
        playlist: &NewPlaylist<'_>,
    ) -> Result<CreatedPlaylist, ApiError> {
        self.post_json(self.endpoints.user_playlists_url(user_id), token, playlist)
            .await
    }

    pub async fn add_tracks(
        &self,
        playlist_id: &str,
        token: &TokenState,
        uris: &[String],
    ) -> Result<SnapshotResponse, ApiError> {
        self.post_json(
            self.endpoints.playlist_tracks_url(playlist_id),
            token,
            &AddTracks { uris },
        )
        .await
    }
}
