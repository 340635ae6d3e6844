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

//! The full run: profile, source, destination, diff, write.

use std::fmt;

use chrono::NaiveDate;
use log::info;
use serde::Serialize;
use thiserror::Error;

use crate::api::{ApiError, SpotifyClient};
use crate::auth::TokenState;
use crate::diff::TrackSetDiffer;
use crate::models::SyncReport;
use crate::mutator::{partial_message, summary_message, MutationFailure, PlaylistMutator};
use crate::resolver::PlaylistResolver;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("No 'On Repeat' playlist owned by Spotify in the library of user {user_id}")]
    SourcePlaylistNotFound { user_id: String },
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Mutation(#[from] MutationFailure),
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SyncStage {
    Profile,
    SourceResolution,
    DestinationResolution,
    SourceTracks,
    Diff,
    Mutation,
}

impl SyncStage {
    const ALL: [SyncStage; 6] = [
        SyncStage::Profile,
        SyncStage::SourceResolution,
        SyncStage::DestinationResolution,
        SyncStage::SourceTracks,
        SyncStage::Diff,
        SyncStage::Mutation,
    ];

    fn completed(self) -> &'static str {
        match self {
            SyncStage::Profile => "profile fetched",
            SyncStage::SourceResolution => "source resolved",
            SyncStage::DestinationResolution => "destination resolved",
            SyncStage::SourceTracks => "source tracks fetched",
            SyncStage::Diff => "diff computed",
            SyncStage::Mutation => "tracks added",
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStage::Profile => "profile fetch",
            SyncStage::SourceResolution => "source resolution",
            SyncStage::DestinationResolution => "destination resolution",
            SyncStage::SourceTracks => "source track retrieval",
            SyncStage::Diff => "diff",
            SyncStage::Mutation => "mutation",
        };
        f.write_str(name)
    }
}

/// A run that stopped part way, with the messages produced before it stopped.
#[derive(Error, Debug)]
pub struct SyncFailure {
    pub stage: SyncStage,
    pub messages: Vec<String>,
    #[source]
    pub error: SyncError,
}

impl SyncFailure {
    fn new(stage: SyncStage, messages: &[String], error: impl Into<SyncError>) -> Self {
        Self {
            stage,
            messages: messages.to_vec(),
            error: error.into(),
        }
    }
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for done in SyncStage::ALL.iter().take_while(|s| **s < self.stage) {
            write!(f, "{}, ", done.completed())?;
        }
        write!(f, "{} failed: {}", self.stage, self.error)
    }
}

/// Copies new On Repeat tracks into the month's playlist.
pub struct Synchronizer {
    client: SpotifyClient,
}

impl Synchronizer {
    pub fn new(client: SpotifyClient) -> Self {
        Self { client }
    }

    /// Runs every stage in order. `today` picks the destination playlist.
    pub async fn run(&self, token: &TokenState, today: NaiveDate) -> Result<SyncReport, SyncFailure> {
        let mut messages = Vec::new();
        let resolver = PlaylistResolver::new(&self.client, token);
        let differ = TrackSetDiffer::new(&self.client, token);

        let profile = self
            .client
            .current_user(token)
            .await
            .map_err(|e| SyncFailure::new(SyncStage::Profile, &messages, e))?;
        info!("Synchronizing for user {}", profile.id);

        let source = resolver
            .find_on_repeat_source(&profile.id)
            .await
            .map_err(|e| SyncFailure::new(SyncStage::SourceResolution, &messages, e))?;

        let destination = resolver
            .resolve_monthly_destination(&profile.id, today)
            .await
            .map_err(|e| SyncFailure::new(SyncStage::DestinationResolution, &messages, e))?;
        messages.push(destination.to_string());

        let source_tracks = differ
            .source_tracks(&source.id)
            .await
            .map_err(|e| SyncFailure::new(SyncStage::SourceTracks, &messages, e))?;

        let delta = differ
            .delta(&source_tracks, &destination.id)
            .await
            .map_err(|e| SyncFailure::new(SyncStage::Diff, &messages, e))?;

        // Report only what actually reached the playlist.
        if let Err(failure) = PlaylistMutator::new(&self.client, token)
            .apply(&destination.id, &delta)
            .await
        {
            if failure.written > 0 {
                messages.push(partial_message(&delta, failure.written));
            }
            return Err(SyncFailure::new(SyncStage::Mutation, &messages, failure));
        }
        messages.push(summary_message(&delta));

        Ok(SyncReport {
            user_id: profile.id,
            source,
            destination,
            source_track_count: source_tracks.len(),
            added: delta.tracks(),
            messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Track;
    use crate::test_utils::FakeSpotify;
    use std::sync::Arc;

    fn track(n: u32) -> Track {
        Track::new(format!("spotify:track:{}", n), format!("Song {}", n))
    }

    fn july() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 15).unwrap()
    }

    #[tokio::test]
    async fn test_first_run_creates_and_fills_destination() {
        let fake = Arc::new(
            FakeSpotify::new("alice", 2)
                .with_playlist("mix", "Daily Mix 1", "spotify", vec![])
                .with_playlist("src", "On Repeat", "spotify", (1..=5).map(track).collect()),
        );

        let report = Synchronizer::new(fake.client())
            .run(&TokenState::new("tok"), july())
            .await
            .unwrap();

        assert_eq!(report.user_id, "alice");
        assert_eq!(report.source.id, "src");
        assert!(report.destination.created);
        assert_eq!(report.source_track_count, 5);
        assert_eq!(report.added.len(), 5);
        assert_eq!(
            report.messages,
            vec![
                "Created new playlist: 07/24 - Repeat".to_string(),
                "Added the following songs: Song 1;Song 2;Song 3;Song 4;Song 5".to_string(),
            ]
        );
        assert_eq!(fake.playlist_named("07/24 - Repeat").unwrap().tracks.len(), 5);
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let fake = Arc::new(
            FakeSpotify::new("alice", 2)
                .with_playlist("src", "On Repeat", "spotify", (1..=7).map(track).collect()),
        );
        let sync = Synchronizer::new(fake.client());
        let token = TokenState::new("tok");

        sync.run(&token, july()).await.unwrap();
        let after_first = fake.playlist_named("07/24 - Repeat").unwrap().tracks;
        fake.clear_requests();

        let report = sync.run(&token, july()).await.unwrap();

        assert!(report.added.is_empty());
        assert!(!report.destination.created);
        assert_eq!(
            report.messages,
            vec![
                "Used existing playlist: 07/24 - Repeat".to_string(),
                "No new songs to add".to_string(),
            ]
        );
        assert_eq!(fake.post_count(), 0);
        assert_eq!(fake.playlist_count(), 2);
        assert_eq!(fake.playlist_named("07/24 - Repeat").unwrap().tracks, after_first);
    }

    #[tokio::test]
    async fn test_only_missing_tracks_are_added() {
        let fake = Arc::new(
            FakeSpotify::new("alice", 3)
                .with_playlist("dst", "07/24 - Repeat", "alice", vec![track(2), track(9)])
                .with_playlist("src", "On Repeat", "spotify", vec![track(1), track(2), track(3)]),
        );

        let report = Synchronizer::new(fake.client())
            .run(&TokenState::new("tok"), july())
            .await
            .unwrap();

        assert_eq!(report.added, vec![track(1), track(3)]);
        let uris: Vec<String> = fake
            .playlist_named("07/24 - Repeat")
            .unwrap()
            .tracks
            .into_iter()
            .map(|t| t.uri)
            .collect();
        assert_eq!(
            uris,
            vec!["spotify:track:2", "spotify:track:9", "spotify:track:1", "spotify:track:3"]
        );
    }

    #[tokio::test]
    async fn test_missing_source_reports_stage() {
        let fake = Arc::new(FakeSpotify::new("alice", 2).with_playlist("a", "Chill", "alice", vec![]));

        let failure = Synchronizer::new(fake.client())
            .run(&TokenState::new("tok"), july())
            .await
            .unwrap_err();

        assert_eq!(failure.stage, SyncStage::SourceResolution);
        assert!(matches!(failure.error, SyncError::SourcePlaylistNotFound { .. }));
        assert!(failure.messages.is_empty());
        assert!(failure
            .to_string()
            .starts_with("profile fetched, source resolution failed: "));
        assert_eq!(fake.post_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_batch_reports_partial_mutation() {
        let fake = Arc::new(
            FakeSpotify::new("alice", 50)
                .with_playlist("src", "On Repeat", "spotify", (0..150).map(track).collect())
                .failing_adds_after(1),
        );

        let failure = Synchronizer::new(fake.client())
            .run(&TokenState::new("tok"), july())
            .await
            .unwrap_err();

        assert_eq!(failure.stage, SyncStage::Mutation);
        match &failure.error {
            SyncError::Mutation(mutation) => {
                assert_eq!(mutation.written, 100);
                assert_eq!(mutation.total, 150);
            }
            other => panic!("Expected Mutation error, got {:?}", other),
        }
        assert_eq!(failure.messages.len(), 2);
        assert_eq!(failure.messages[0], "Created new playlist: 07/24 - Repeat");
        assert!(failure.messages[1].starts_with("Added 100 of 150 songs before failing: Song 0;"));
        assert!(failure.messages[1].ends_with(";Song 99"));
        assert!(failure.to_string().contains("mutation failed: wrote 100 of 150 tracks, then: "));
        assert_eq!(fake.playlist_named("07/24 - Repeat").unwrap().tracks.len(), 100);
    }

    #[tokio::test]
    async fn test_rejected_first_batch_adds_no_message() {
        let fake = Arc::new(
            FakeSpotify::new("alice", 50)
                .with_playlist("src", "On Repeat", "spotify", (1..=3).map(track).collect())
                .failing_adds_after(0),
        );

        let failure = Synchronizer::new(fake.client())
            .run(&TokenState::new("tok"), july())
            .await
            .unwrap_err();

        assert_eq!(failure.stage, SyncStage::Mutation);
        assert_eq!(
            failure.messages,
            vec!["Created new playlist: 07/24 - Repeat".to_string()]
        );
    }

    #[test]
    fn test_failure_display_lists_completed_stages() {
        let failure = SyncFailure::new(
            SyncStage::DestinationResolution,
            &["x".to_string()],
            ApiError::Status {
                url: "https://api.test/v1/users/alice/playlists".to_string(),
                status: 500,
                body: "boom".to_string(),
            },
        );

        assert_eq!(
            failure.to_string(),
            "profile fetched, source resolved, destination resolution failed: \
             https://api.test/v1/users/alice/playlists returned HTTP 500: boom"
        );
        assert_eq!(failure.messages, vec!["x".to_string()]);
    }
}
