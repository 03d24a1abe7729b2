/*
 *  listen_time.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Listening time from MusicBrainz track lengths
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::StatsConfig;
use crate::stats::{SongPlay, StatsError, StatsStore};

const USER_AGENT: &str = concat!("VinylPi/", env!("CARGO_PKG_VERSION"), " (turntable now-playing display)");

/// Recordings shorter or longer than this are unlikely to be the song.
const MIN_PLAUSIBLE_MS: u64 = 30_000;
const MAX_PLAUSIBLE_MS: u64 = 30 * 60_000;

#[derive(Debug, Error)]
pub enum ListenTimeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("MusicBrainz returned status {0}")]
    Api(u16),
    #[error("no track length found")]
    NoLength,
    #[error("stats error: {0}")]
    Stats(#[from] StatsError),
}

/// Finds how long a recording is.
#[async_trait]
pub trait TrackLengthLookup: Send + Sync {
    async fn track_length_ms(
        &self,
        artist: &str,
        title: &str,
        album: Option<&str>,
    ) -> Result<Option<u64>, ListenTimeError>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecordingSearch {
    pub recordings: Vec<Recording>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Recording {
    pub title: Option<String>,
    /// milliseconds
    pub length: Option<u64>,
    pub releases: Vec<Release>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Release {
    pub title: Option<String>,
}

/// Lucene query for the recording search endpoint.
pub fn build_query(artist: &str, title: &str, album: Option<&str>) -> String {
    let quote = |s: &str| s.trim().replace('"', "");
    let mut query = format!("recording:\"{}\" AND artist:\"{}\"", quote(title), quote(artist));
    if let Some(album) = album.map(str::trim).filter(|a| !a.is_empty()) {
        query.push_str(&format!(" AND release:\"{}\"", quote(album)));
    }
    query.push_str(" AND status:official");
    query
}

/// Pick the most plausible length among search hits: exact title and a
/// matching release weigh most, implausible lengths are pushed down.
pub fn pick_length(recordings: &[Recording], title: &str, album: Option<&str>) -> Option<u64> {
    let title = title.trim().to_lowercase();
    let album = album.map(|a| a.trim().to_lowercase()).filter(|a| !a.is_empty());

    let mut best: Option<(i32, u64)> = None;
    for rec in recordings {
        let Some(length) = rec.length.filter(|&l| l > 0) else {
            continue;
        };
        let mut score = 0;
        if rec.title.as_deref().is_some_and(|t| t.trim().to_lowercase() == title) {
            score += 50;
        }
        if !rec.releases.is_empty() {
            score += 10;
            if let Some(album) = &album {
                let on_album = rec.releases.iter().any(|rel| {
                    let rel = rel.title.as_deref().unwrap_or("").trim().to_lowercase();
                    !rel.is_empty() && (rel == *album || rel.contains(album.as_str()) || album.contains(&rel))
                });
                if on_album {
                    score += 40;
                }
            }
        }
        if length < MIN_PLAUSIBLE_MS {
            score -= 50;
        }
        if length > MAX_PLAUSIBLE_MS {
            score -= 50;
        }
        if best.is_none_or(|(s, _)| score > s) {
            best = Some((score, length));
        }
    }
    best.map(|(_, length)| length)
}

/// MusicBrainz recording search.
pub struct MusicBrainzLookup {
    http: Client,
    url: String,
}

impl MusicBrainzLookup {
    pub fn new(cfg: &StatsConfig) -> Result<Self, ListenTimeError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(cfg.lookup_timeout_seconds.max(1)))
            .build()?;
        Ok(Self { http, url: cfg.musicbrainz_url.clone() })
    }
}

#[async_trait]
impl TrackLengthLookup for MusicBrainzLookup {
    async fn track_length_ms(
        &self,
        artist: &str,
        title: &str,
        album: Option<&str>,
    ) -> Result<Option<u64>, ListenTimeError> {
        if artist.trim().is_empty() || title.trim().is_empty() {
            return Ok(None);
        }
        let query = build_query(artist, title, album);
        debug!("MusicBrainz query: {}", query);
        let resp = self
            .http
            .get(&self.url)
            .query(&[("query", query.as_str()), ("fmt", "json"), ("limit", "10"), ("inc", "releases")])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ListenTimeError::Api(status.as_u16()));
        }
        let search: RecordingSearch = resp.json().await?;
        Ok(pick_length(&search.recordings, title, album))
    }
}

/// Minutes credited for one confirmed play.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenTime {
    pub duration_ms: u64,
    /// length came from the stats cache, no lookup was made
    pub cached: bool,
}

impl ListenTime {
    pub fn minutes(&self) -> f64 {
        self.duration_ms as f64 / 60_000.0
    }
}

/// Credit a confirmed play with its track length, looking the length up
/// only when the store has not cached it yet.
pub async fn add_listen_time(
    stats: &mut dyn StatsStore,
    lookup: &dyn TrackLengthLookup,
    play: &SongPlay,
) -> Result<ListenTime, ListenTimeError> {
    let (duration_ms, cached) = match stats.cached_duration_ms(&play.id) {
        Some(ms) => (ms, true),
        None => {
            let ms = lookup
                .track_length_ms(&play.artist, &play.title, play.album.as_deref())
                .await?
                .ok_or(ListenTimeError::NoLength)?;
            (ms, false)
        }
    };
    stats.record_listen_time(play, duration_ms)?;
    Ok(ListenTime { duration_ms, cached })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::JsonStatsStore;
    use crate::track::Observation;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedLength {
        ms: Option<u64>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TrackLengthLookup for FixedLength {
        async fn track_length_ms(
            &self,
            _artist: &str,
            _title: &str,
            _album: Option<&str>,
        ) -> Result<Option<u64>, ListenTimeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.ms)
        }
    }

    fn play(artist: &str, title: &str) -> SongPlay {
        let obs = Observation::new(artist, title);
        SongPlay {
            id: obs.song_id(),
            artist: artist.into(),
            title: title.into(),
            album: None,
            variant_score: obs.variant_score(),
        }
    }

    #[test]
    fn test_query_shape() {
        assert_eq!(
            build_query("Eagles", " Take It Easy ", Some("Eagles")),
            "recording:\"Take It Easy\" AND artist:\"Eagles\" AND release:\"Eagles\" AND status:official"
        );
        assert_eq!(
            build_query("A \"B\"", "C", Some("  ")),
            "recording:\"C\" AND artist:\"A B\" AND status:official"
        );
    }

    #[test]
    fn test_pick_length_prefers_title_and_album() {
        let body = r#"{"recordings": [
            {"title": "Take It Easy (live)", "length": 300000, "releases": [{"title": "Live"}]},
            {"title": "Take It Easy", "length": 12000, "releases": []},
            {"title": "Take It Easy", "length": 211000, "releases": [{"title": "Eagles (Remastered)"}]},
            {"title": "Take It Easy"}
        ]}"#;
        let search: RecordingSearch = serde_json::from_str(body).unwrap();
        assert_eq!(pick_length(&search.recordings, "take it easy", Some("Eagles")), Some(211_000));
        assert_eq!(pick_length(&[], "x", None), None);
    }

    #[tokio::test]
    async fn test_lookup_once_then_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStatsStore::open(dir.path().join("stats.json")).unwrap();
        let lookup = FixedLength { ms: Some(180_000), calls: AtomicUsize::new(0) };
        let p = play("Eagles", "Take It Easy");
        store.record_song_play(&p).unwrap();

        let first = add_listen_time(&mut store, &lookup, &p).await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.minutes(), 3.0);
        let second = add_listen_time(&mut store, &lookup, &p).await.unwrap();
        assert!(second.cached);

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.data().listening.total_seconds, 360.0);
    }

    #[tokio::test]
    async fn test_unknown_length_adds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStatsStore::open(dir.path().join("stats.json")).unwrap();
        let lookup = FixedLength { ms: None, calls: AtomicUsize::new(0) };
        let result = add_listen_time(&mut store, &lookup, &play("Nobody", "Nothing")).await;
        assert!(matches!(result, Err(ListenTimeError::NoLength)));
        assert_eq!(store.data().listening.total_seconds, 0.0);
    }
}
