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

//! Cursor pagination over Spotify's `{ items, next }` pages.
//!
//! Pages are requested one at a time, in cursor order: the next URL is only
//! known once the previous page has arrived. A failed request ends the walk.

use futures::stream::{self, Stream, TryStreamExt};
use log::debug;
use serde::de::DeserializeOwned;

use crate::api::{ApiError, SpotifyClient};
use crate::auth::TokenState;
use crate::models::Page;

#[derive(Clone, Copy)]
pub struct PaginatedFetcher<'a> {
    client: &'a SpotifyClient,
    token: &'a TokenState,
}

impl<'a> PaginatedFetcher<'a> {
    pub fn new(client: &'a SpotifyClient, token: &'a TokenState) -> Self {
        Self { client, token }
    }

    /// Lazy stream of pages starting at `start_url`. Nothing is fetched until
    /// the stream is polled.
    pub fn pages<T>(&self, start_url: String) -> impl Stream<Item = Result<Vec<T>, ApiError>> + 'a
    where
        T: DeserializeOwned + 'a,
    {
        let client = self.client;
        let token = self.token;

        stream::try_unfold(Some(start_url), move |cursor: Option<String>| async move {
            let Some(url) = cursor else {
                return Ok::<_, ApiError>(None);
            };
            debug!("Fetching page {}", url);
            let page: Page<T> = client.get(&url, token).await?;
            Ok(Some((page.items, page.next)))
        })
    }

    /// First item matching `predicate`. Pages after the one holding the match
    /// are never requested.
    pub async fn find<T, P>(&self, start_url: String, mut predicate: P) -> Result<Option<T>, ApiError>
    where
        T: DeserializeOwned + 'a,
        P: FnMut(&T) -> bool,
    {
        let pages = self.pages::<T>(start_url);
        futures::pin_mut!(pages);

        while let Some(items) = pages.try_next().await? {
            if let Some(found) = items.into_iter().find(|item| predicate(item)) {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Every item of every page, in order, duplicates included.
    pub async fn collect<T>(&self, start_url: String) -> Result<Vec<T>, ApiError>
    where
        T: DeserializeOwned + 'a,
    {
        let pages = self.pages::<T>(start_url);
        futures::pin_mut!(pages);

        let mut all = Vec::new();
        let mut page_count = 0usize;
        while let Some(items) = pages.try_next().await? {
            page_count += 1;
            all.extend(items);
        }
        debug!("Collected {} items over {} pages", all.len(), page_count);
        Ok(all)
    }
}
