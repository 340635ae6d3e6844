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

use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::api::{Endpoints, SPOTIFY_ACCOUNTS_URL, SPOTIFY_API_URL};

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:5173/callback";
pub const DEFAULT_SESSION_FILE: &str = ".on_repeat_session.json";

/// Scopes needed to read the profile, list private playlists and write to
/// the monthly playlist.
pub const DEFAULT_SCOPES: [&str; 4] = [
    "user-read-private",
    "playlist-modify-private",
    "playlist-modify",
    "playlist-read-private",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing SPOTIFY_CLIENT_ID")]
    MissingClientId,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub endpoints: Endpoints,
    /// Where the verifier waits between `authorize` and `sync`.
    pub session_file: PathBuf,
}

impl SyncConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            endpoints: Endpoints::default(),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
        }
    }

    /// Reads the configuration from the environment:
    ///
    /// - `SPOTIFY_CLIENT_ID` (required)
    /// - `SPOTIFY_REDIRECT_URI`
    /// - `SPOTIFY_ACCOUNTS_URL`, `SPOTIFY_API_URL`
    /// - `ON_REPEAT_SESSION_FILE`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let client_id = var("SPOTIFY_CLIENT_ID").ok_or(ConfigError::MissingClientId)?;
        let mut config = Self::new(client_id);

        if let Some(redirect_uri) = var("SPOTIFY_REDIRECT_URI") {
            config.redirect_uri = redirect_uri;
        }
        config.endpoints = Endpoints::new(
            var("SPOTIFY_ACCOUNTS_URL").unwrap_or_else(|| SPOTIFY_ACCOUNTS_URL.to_string()),
            var("SPOTIFY_API_URL").unwrap_or_else(|| SPOTIFY_API_URL.to_string()),
        );
        if let Some(path) = var("ON_REPEAT_SESSION_FILE") {
            config.session_file = PathBuf::from(path);
        }

        Ok(config)
    }
}
