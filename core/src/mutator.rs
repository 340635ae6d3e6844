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

use log::{info, warn};
use thiserror::Error;

use crate::api::{ApiError, SpotifyClient};
use crate::auth::TokenState;
use crate::models::TrackDelta;

/// Most uris Spotify accepts in one add-items request.
pub const MAX_URIS_PER_REQUEST: usize = 100;

pub const NOTHING_TO_ADD: &str = "No new songs to add";

/// The line reported to the user for a delta.
pub fn summary_message(delta: &TrackDelta) -> String {
    if delta.is_empty() {
        NOTHING_TO_ADD.to_string()
    } else {
        format!("Added the following songs: {}", delta.names().join(";"))
    }
}

/// The line reported when only the first `written` tracks of the delta made
/// it into the playlist.
pub fn partial_message(delta: &TrackDelta, written: usize) -> String {
    let names = delta.names();
    format!(
        "Added {} of {} songs before failing: {}",
        written,
        names.len(),
        names[..written.min(names.len())].join(";")
    )
}

/// A batch was rejected after `written` uris had already been added.
#[derive(Error, Debug)]
#[error("wrote {written} of {total} tracks, then: {error}")]
pub struct MutationFailure {
    pub written: usize,
    pub total: usize,
    #[source]
    pub error: ApiError,
}

pub struct PlaylistMutator<'a> {
    client: &'a SpotifyClient,
    token: &'a TokenState,
}

impl<'a> PlaylistMutator<'a> {
    pub fn new(client: &'a SpotifyClient, token: &'a TokenState) -> Self {
        Self { client, token }
    }

    /// Appends the delta to the playlist and returns the snapshot ids Spotify
    /// reported. An empty delta makes no request at all.
    ///
    /// Batches are sent in delta order. When one fails, the error carries how
    /// many uris the earlier batches already added.
    pub async fn apply(
        &self,
        playlist_id: &str,
        delta: &TrackDelta,
    ) -> Result<Vec<String>, MutationFailure> {
        if delta.is_empty() {
            return Ok(Vec::new());
        }

        let uris = delta.uris();
        let mut snapshots = Vec::new();
        let mut written = 0;
        for (i, chunk) in uris.chunks(MAX_URIS_PER_REQUEST).enumerate() {
            let response = match self.client.add_tracks(playlist_id, self.token, chunk).await {
                Ok(response) => response,
                Err(error) => {
                    warn!(
                        "Batch {} for {} failed after {} of {} tracks were added",
                        i,
                        playlist_id,
                        written,
                        uris.len()
                    );
                    return Err(MutationFailure {
                        written,
                        total: uris.len(),
                        error,
                    });
                }
            };
            written += chunk.len();
            info!(
                "Batch {}: added {} tracks to {} (snapshot {})",
                i,
                chunk.len(),
                playlist_id,
                response.snapshot_id
            );
            snapshots.push(response.snapshot_id);
        }
        Ok(snapshots)
    }
}
