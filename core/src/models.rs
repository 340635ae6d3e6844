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

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A track as far as synchronization cares. Identity is the `uri`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub uri: String,
    pub name: String,
}

impl Track {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub owner_id: String,
}

impl From<PlaylistObject> for Playlist {
    fn from(object: PlaylistObject) -> Self {
        Self {
            id: object.id,
            name: object.name,
            owner_id: object.owner.id,
        }
    }
}

/// The month's destination playlist and whether this run created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationPlaylist {
    pub id: String,
    pub name: String,
    pub created: bool,
}

impl fmt::Display for DestinationPlaylist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.created {
            write!(f, "Created new playlist: {}", self.name)
        } else {
            write!(f, "Used existing playlist: {}", self.name)
        }
    }
}

/// Insertion-ordered mapping from track uri to track name.
///
/// The source playlist is loaded into one of these, then every uri seen in
/// the destination is removed; whatever is left is the delta to add.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMap {
    names: HashMap<String, String>,
    order: Vec<String>,
}

/// Tracks present in the source but absent from the destination.
pub type TrackDelta = TrackMap;

impl TrackMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the track unless its uri is already present. The first name wins.
    pub fn insert(&mut self, track: Track) -> bool {
        if self.names.contains_key(&track.uri) {
            return false;
        }
        self.order.push(track.uri.clone());
        self.names.insert(track.uri, track.name);
        true
    }

    pub fn remove(&mut self, uri: &str) -> Option<String> {
        let name = self.names.remove(uri)?;
        self.order.retain(|u| u != uri);
        Some(name)
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.names.contains_key(uri)
    }

    pub fn get(&self, uri: &str) -> Option<&str> {
        self.names.get(uri).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.order
            .iter()
            .filter_map(|uri| self.names.get(uri).map(|name| (uri.as_str(), name.as_str())))
    }

    pub fn uris(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|(_, name)| name).collect()
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.iter().map(|(uri, name)| Track::new(uri, name)).collect()
    }
}

impl FromIterator<Track> for TrackMap {
    fn from_iter<I: IntoIterator<Item = Track>>(iter: I) -> Self {
        let mut map = TrackMap::new();
        for track in iter {
            map.insert(track);
        }
        map
    }
}

/// Outcome of one synchronization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub user_id: String,
    pub source: Playlist,
    pub destination: DestinationPlaylist,
    pub source_track_count: usize,
    pub added: Vec<Track>,
    pub messages: Vec<String>,
}

// Request and response bodies, one schema per endpoint.

/// One page of a cursor-paginated collection. `items` may be missing or null.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default = "Vec::new", deserialize_with = "null_as_empty")]
    pub items: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerObject {
    pub id: String,
}

/// Entry of `GET /v1/users/{user_id}/playlists`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistObject {
    pub id: String,
    pub name: String,
    pub owner: OwnerObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackObject {
    pub uri: String,
    pub name: String,
}

/// Entry of `GET /v1/playlists/{playlist_id}/tracks`. `track` is null for
/// entries Spotify can no longer resolve.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistTrackItem {
    #[serde(default)]
    pub track: Option<TrackObject>,
}

impl PlaylistTrackItem {
    pub fn into_track(self) -> Option<Track> {
        self.track.map(|t| Track::new(t.uri, t.name))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPlaylist {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotResponse {
    pub snapshot_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPlaylist<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub public: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddTracks<'a> {
    pub uris: &'a [String],
}
