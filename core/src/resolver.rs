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

use chrono::NaiveDate;
use log::info;

use crate::api::SpotifyClient;
use crate::auth::TokenState;
use crate::models::{DestinationPlaylist, NewPlaylist, Playlist, PlaylistObject};
use crate::pagination::PaginatedFetcher;
use crate::sync::SyncError;

/// Account that owns Spotify's generated playlists.
pub const ON_REPEAT_OWNER: &str = "spotify";
pub const ON_REPEAT_NAME: &str = "On Repeat";

/// `MM/YY - Repeat`, e.g. `07/24 - Repeat` for any day of July 2024.
pub fn monthly_playlist_name(date: NaiveDate) -> String {
    format!("{} - Repeat", date.format("%m/%y"))
}

pub fn is_on_repeat_source(playlist: &PlaylistObject) -> bool {
    playlist.owner.id == ON_REPEAT_OWNER && playlist.name == ON_REPEAT_NAME
}

/// Finds the playlists a run reads from and writes to.
///
/// Both lookups walk the user's playlist listing page by page and stop at the
/// first match. Nothing is cached between runs: the listing is the only record
/// of whether this month's playlist exists.
pub struct PlaylistResolver<'a> {
    client: &'a SpotifyClient,
    token: &'a TokenState,
}

impl<'a> PlaylistResolver<'a> {
    pub fn new(client: &'a SpotifyClient, token: &'a TokenState) -> Self {
        Self { client, token }
    }

    fn fetcher(&self) -> PaginatedFetcher<'a> {
        PaginatedFetcher::new(self.client, self.token)
    }

    async fn find_playlist<P>(&self, user_id: &str, predicate: P) -> Result<Option<Playlist>, SyncError>
    where
        P: FnMut(&PlaylistObject) -> bool,
    {
        let url = self.client.endpoints().user_playlists_url(user_id);
        let found = self.fetcher().find::<PlaylistObject, _>(url, predicate).await?;
        Ok(found.map(Playlist::from))
    }

    /// Spotify's "On Repeat" playlist as it appears in the user's library.
    ///
    /// Only a playlist named exactly [`ON_REPEAT_NAME`] and owned by
    /// [`ON_REPEAT_OWNER`] counts; a user's own playlist with the same name is
    /// skipped. Fails with [`SyncError::SourcePlaylistNotFound`] once every page
    /// has been read without a match.
    pub async fn find_on_repeat_source(&self, user_id: &str) -> Result<Playlist, SyncError> {
        self.find_playlist(user_id, is_on_repeat_source)
            .await?
            .ok_or_else(|| SyncError::SourcePlaylistNotFound {
                user_id: user_id.to_string(),
            })
    }

    /// Looks up or creates this month's destination playlist.
    ///
    /// This function:
    /// 1. Computes the name for `today` with [`monthly_playlist_name`].
    /// 2. Searches the user's playlists for that exact name and returns the
    ///    first hit with `created: false`.
    /// 3. Otherwise creates a private playlist with an empty description and
    ///    returns it with `created: true`.
    ///
    /// Running it twice in the same month creates at most one playlist.
    pub async fn resolve_monthly_destination(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<DestinationPlaylist, SyncError> {
        let name = monthly_playlist_name(today);

        if let Some(existing) = self.find_playlist(user_id, |p| p.name == name).await? {
            info!("Found existing playlist '{}' ({})", name, existing.id);
            return Ok(DestinationPlaylist {
                id: existing.id,
                name,
                created: false,
            });
        }

        let created = self
            .client
            .create_playlist(
                user_id,
                self.token,
                &NewPlaylist {
                    name: &name,
                    description: "",
                    public: false,
                },
            )
            .await?;
        info!("Created playlist '{}' ({})", name, created.id);

        Ok(DestinationPlaylist {
            id: created.id,
            name,
            created: true,
        })
    }
}
