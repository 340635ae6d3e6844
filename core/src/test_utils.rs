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

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use crate::api::{ApiError, ApiRequest, ApiResponse, Body, Endpoints, Method, SpotifyClient, Transport};
use crate::models::Track;

/// Answers fixed URLs with canned bodies and records every request.
/// Unknown URLs get a 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: HashMap<String, (u16, String)>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, url: &str, status: u16, body: &str) -> Self {
        self.routes
            .insert(url.to_string(), (status, body.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let (status, body) = self
            .routes
            .get(&request.url)
            .cloned()
            .unwrap_or((404, r#"{"error":"not found"}"#.to_string()));
        self.requests.lock().unwrap().push(request);
        Ok(ApiResponse { status, body })
    }
}

pub const FAKE_ACCOUNTS: &str = "https://accounts.fake.test";
pub const FAKE_API: &str = "https://api.fake.test";

#[derive(Debug, Clone)]
pub struct FakePlaylist {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub tracks: Vec<Track>,
}

struct FakeState {
    playlists: Vec<FakePlaylist>,
    catalog: HashMap<String, String>,
    requests: Vec<ApiRequest>,
    created: usize,
    adds_before_failure: Option<usize>,
}

/// An in-memory Spotify account: paginated listings, playlist creation and
/// track additions that later listings reflect.
pub struct FakeSpotify {
    user_id: String,
    page_size: usize,
    state: Mutex<FakeState>,
}

impl FakeSpotify {
    pub fn new(user_id: &str, page_size: usize) -> Self {
        Self {
            user_id: user_id.to_string(),
            page_size,
            state: Mutex::new(FakeState {
                playlists: Vec::new(),
                catalog: HashMap::new(),
                requests: Vec::new(),
                created: 0,
                adds_before_failure: None,
            }),
        }
    }

    pub fn with_playlist(self, id: &str, name: &str, owner: &str, tracks: Vec<Track>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for track in &tracks {
                state.catalog.insert(track.uri.clone(), track.name.clone());
            }
            state.playlists.push(FakePlaylist {
                id: id.to_string(),
                name: name.to_string(),
                owner: owner.to_string(),
                tracks,
            });
        }
        self
    }

    /// Lets `successes` add-tracks requests through, then answers 500.
    pub fn failing_adds_after(self, successes: usize) -> Self {
        self.state.lock().unwrap().adds_before_failure = Some(successes);
        self
    }

    pub fn client(self: &Arc<Self>) -> SpotifyClient {
        SpotifyClient::new(self.clone(), Endpoints::new(FAKE_ACCOUNTS, FAKE_API))
    }

    pub fn playlist_named(&self, name: &str) -> Option<FakePlaylist> {
        let state = self.state.lock().unwrap();
        state.playlists.iter().find(|p| p.name == name).cloned()
    }

    pub fn playlist_count(&self) -> usize {
        self.state.lock().unwrap().playlists.len()
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn post_count(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == Method::Post)
            .count()
    }

    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }

    fn page(&self, url: &Url, items: Vec<Value>) -> Value {
        let offset: usize = url
            .query_pairs()
            .find(|(k, _)| k == "offset")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);
        let end = (offset + self.page_size).min(items.len());
        let next = if end < items.len() {
            let mut next = url.clone();
            next.set_query(Some(&format!("offset={}", end)));
            Value::String(next.to_string())
        } else {
            Value::Null
        };
        let page: Vec<Value> = items.get(offset..end).map(<[Value]>::to_vec).unwrap_or_default();
        json!({ "items": page, "next": next })
    }

    fn route(&self, state: &mut FakeState, request: &ApiRequest) -> (u16, Value) {
        let url = match Url::parse(&request.url) {
            Ok(url) => url,
            Err(_) => return (400, json!({"error": "bad url"})),
        };
        let segments: Vec<String> = url
            .path_segments()
            .map(|s| s.map(str::to_string).collect())
            .unwrap_or_default();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        let authorized = request.bearer.is_some();

        match (request.method, segments.as_slice()) {
            (Method::Post, ["api", "token"]) => (
                200,
                json!({"access_token": "fake-token", "token_type": "Bearer", "expires_in": 3600}),
            ),
            (_, _) if !authorized => (401, json!({"error": "no token"})),
            (Method::Get, ["v1", "me"]) => (200, json!({"id": self.user_id})),
            (Method::Get, ["v1", "users", _, "playlists"]) => {
                let items = state
                    .playlists
                    .iter()
                    .map(|p| json!({"id": p.id, "name": p.name, "owner": {"id": p.owner}}))
                    .collect();
                (200, self.page(&url, items))
            }
            (Method::Post, ["v1", "users", _, "playlists"]) => {
                let Body::Json(body) = &request.body else {
                    return (400, json!({"error": "expected json"}));
                };
                state.created += 1;
                let id = format!("created-{}", state.created);
                state.playlists.push(FakePlaylist {
                    id: id.clone(),
                    name: body["name"].as_str().unwrap_or_default().to_string(),
                    owner: self.user_id.clone(),
                    tracks: Vec::new(),
                });
                (201, json!({"id": id}))
            }
            (Method::Get, ["v1", "playlists", id, "tracks"]) => {
                match state.playlists.iter().find(|p| p.id == *id) {
                    Some(playlist) => {
                        let items = playlist
                            .tracks
                            .iter()
                            .map(|t| json!({"track": {"uri": t.uri, "name": t.name}}))
                            .collect();
                        (200, self.page(&url, items))
                    }
                    None => (404, json!({"error": "no such playlist"})),
                }
            }
            (Method::Post, ["v1", "playlists", _, "tracks"])
                if state.adds_before_failure == Some(0) =>
            {
                (500, json!({"error": "server error"}))
            }
            (Method::Post, ["v1", "playlists", id, "tracks"]) => {
                if let Some(remaining) = state.adds_before_failure.as_mut() {
                    *remaining -= 1;
                }
                let Body::Json(body) = &request.body else {
                    return (400, json!({"error": "expected json"}));
                };
                let uris: Vec<String> = body["uris"]
                    .as_array()
                    .map(|a| a.iter().filter_map(|u| u.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();
                let catalog = state.catalog.clone();
                match state.playlists.iter_mut().find(|p| p.id == *id) {
                    Some(playlist) => {
                        for uri in uris {
                            let name = catalog.get(&uri).cloned().unwrap_or_default();
                            playlist.tracks.push(Track::new(uri, name));
                        }
                        (201, json!({"snapshot_id": format!("snap-{}", playlist.tracks.len())}))
                    }
                    None => (404, json!({"error": "no such playlist"})),
                }
            }
            _ => (404, json!({"error": "not found"})),
        }
    }
}

#[async_trait]
impl Transport for FakeSpotify {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut state = self.state.lock().unwrap();
        let (status, body) = self.route(&mut state, &request);
        state.requests.push(request);
        Ok(ApiResponse {
            status,
            body: body.to_string(),
        })
    }
}
