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

//! Reduces the source and destination playlists to the tracks still missing
//! from the destination.

use log::debug;

use crate::api::{ApiError, SpotifyClient};
use crate::auth::TokenState;
use crate::models::{PlaylistTrackItem, Track, TrackDelta, TrackMap};
use crate::pagination::PaginatedFetcher;

/// `source` minus every uri in `destination`.
pub fn diff<I, U>(source: &TrackMap, destination: I) -> TrackDelta
where
    I: IntoIterator<Item = U>,
    U: AsRef<str>,
{
    let mut delta = source.clone();
    for uri in destination {
        delta.remove(uri.as_ref());
    }
    delta
}

pub struct TrackSetDiffer<'a> {
    client: &'a SpotifyClient,
    token: &'a TokenState,
}

impl<'a> TrackSetDiffer<'a> {
    pub fn new(client: &'a SpotifyClient, token: &'a TokenState) -> Self {
        Self { client, token }
    }

    /// Every resolvable track of the playlist, across all pages, in order.
    pub async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>, ApiError> {
        let url = self.client.endpoints().playlist_tracks_url(playlist_id);
        let items: Vec<PlaylistTrackItem> = PaginatedFetcher::new(self.client, self.token)
            .collect(url)
            .await?;
        Ok(items
            .into_iter()
            .filter_map(PlaylistTrackItem::into_track)
            .collect())
    }

    pub async fn source_tracks(&self, playlist_id: &str) -> Result<TrackMap, ApiError> {
        let tracks = self.playlist_tracks(playlist_id).await?;
        let map: TrackMap = tracks.into_iter().collect();
        debug!("Source playlist {} holds {} distinct tracks", playlist_id, map.len());
        Ok(map)
    }

    /// Tracks of `source` not yet in the destination playlist.
    pub async fn delta(&self, source: &TrackMap, destination_id: &str) -> Result<TrackDelta, ApiError> {
        let destination = self.playlist_tracks(destination_id).await?;
        let delta = diff(source, destination.iter().map(|t| t.uri.as_str()));
        debug!(
            "{} of {} source tracks missing from {} ({} tracks)",
            delta.len(),
            source.len(),
            destination_id,
            destination.len()
        );
        Ok(delta)
    }
}
