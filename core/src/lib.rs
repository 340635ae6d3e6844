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

pub mod api;
pub mod auth;
pub mod config;
pub mod diff;
pub mod models;
pub mod mutator;
pub mod pagination;
pub mod resolver;
pub mod store;
pub mod sync;

#[cfg(test)]
mod test_utils;

// Re-export key items for convenience
pub use api::{ApiError, Endpoints, SpotifyClient, Transport};
pub use auth::{AuthError, AuthFlow, AuthState, PkceCredential, TokenState};
pub use config::{ConfigError, SyncConfig};
pub use models::{DestinationPlaylist, Playlist, SyncReport, Track, TrackDelta, TrackMap};
pub use resolver::monthly_playlist_name;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use sync::{SyncError, SyncFailure, SyncStage, Synchronizer};
