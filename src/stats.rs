/*
 *  stats.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Play statistics persisted as a JSON file
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

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::track::CanonicalSongId;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A confirmed switch to a new song, as seen by the statistics stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SongPlay {
    pub id: CanonicalSongId,
    pub artist: String,
    pub title: String,
    pub album: Option<String>,
    pub variant_score: i32,
}

/// Increment-only sink for confirmed plays, album sessions and listen time.
pub trait StatsStore: Send {
    fn record_song_play(&mut self, play: &SongPlay) -> Result<(), StatsError>;
    fn record_album_session(&mut self, album: &str) -> Result<(), StatsError>;

    /// Track length remembered from an earlier lookup.
    fn cached_duration_ms(&self, id: &CanonicalSongId) -> Option<u64>;

    /// Add one full play of `play` to the listening total and remember its
    /// length for the next time.
    fn record_listen_time(&mut self, play: &SongPlay, duration_ms: u64) -> Result<(), StatsError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongEntry {
    /// best-scoring raw labels seen for this song
    pub artist: String,
    pub title: String,
    pub album: Option<String>,
    pub variant_score: i32,
    pub plays: u64,
    pub last_played: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountEntry {
    pub name: String,
    pub count: u64,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Listening {
    pub total_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedDuration {
    pub ms: u64,
    pub artist: String,
    pub title: String,
    pub album: Option<String>,
    pub fetched: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsData {
    pub songs: BTreeMap<String, SongEntry>,
    pub artists: BTreeMap<String, CountEntry>,
    pub albums: BTreeMap<String, CountEntry>,
    pub listening: Listening,
    /// track lengths by song id
    pub durations_cache: BTreeMap<String, CachedDuration>,
}

/// Statistics kept in memory and rewritten to disk after every change.
#[derive(Debug)]
pub struct JsonStatsStore {
    path: PathBuf,
    data: StatsData,
}

impl JsonStatsStore {
    /// Load `path`, or start empty if it does not exist yet. A file that
    /// does not decode is moved to `<path>.bad` and replaced by empty stats.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StatsError> {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(s) if s.trim().is_empty() => StatsData::default(),
            Ok(s) => match serde_json::from_str(&s) {
                Ok(data) => data,
                Err(e) => {
                    let bad = bad_file_path(&path);
                    warn!(
                        "stats {} unreadable ({}), moving it to {} and starting fresh",
                        path.display(),
                        e,
                        bad.display()
                    );
                    fs::rename(&path, &bad)?;
                    StatsData::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no stats at {}, starting fresh", path.display());
                StatsData::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, data })
    }

    /// Empty statistics that will be written to `path` on the first change.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), data: StatsData::default() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &StatsData {
        &self.data
    }

    /// Write to a sibling temp file and rename, so readers never see half a file.
    pub fn save(&self) -> Result<(), StatsError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&self.data)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn top_songs(&self, n: usize) -> Vec<&SongEntry> {
        let mut songs: Vec<&SongEntry> = self.data.songs.values().collect();
        songs.sort_by(|a, b| {
            b.plays
                .cmp(&a.plays)
                .then_with(|| a.artist.cmp(&b.artist))
                .then_with(|| a.title.cmp(&b.title))
        });
        songs.truncate(n);
        songs
    }

    pub fn top_artists(&self, n: usize) -> Vec<&CountEntry> {
        top_counts(&self.data.artists, n)
    }

    pub fn top_albums(&self, n: usize) -> Vec<&CountEntry> {
        top_counts(&self.data.albums, n)
    }
}

fn bad_file_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bad");
    PathBuf::from(name)
}

fn top_counts(map: &BTreeMap<String, CountEntry>, n: usize) -> Vec<&CountEntry> {
    let mut entries: Vec<&CountEntry> = map.values().collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    entries.truncate(n);
    entries
}

fn bump(map: &mut BTreeMap<String, CountEntry>, key: String, name: &str, now: DateTime<Utc>) -> u64 {
    let entry = map.entry(key).or_insert_with(|| CountEntry {
        name: name.to_string(),
        count: 0,
        last_seen: now,
    });
    entry.count += 1;
    entry.last_seen = now;
    entry.count
}

impl StatsStore for JsonStatsStore {
    fn record_song_play(&mut self, play: &SongPlay) -> Result<(), StatsError> {
        let now = Utc::now();
        let entry = self
            .data
            .songs
            .entry(play.id.to_string())
            .or_insert_with(|| SongEntry {
                artist: play.artist.clone(),
                title: play.title.clone(),
                album: play.album.clone(),
                variant_score: play.variant_score,
                plays: 0,
                last_played: now,
                duration_ms: None,
            });
        if play.variant_score > entry.variant_score {
            entry.artist = play.artist.clone();
            entry.title = play.title.clone();
            entry.album = play.album.clone();
            entry.variant_score = play.variant_score;
        }
        entry.plays += 1;
        entry.last_played = now;
        let plays = entry.plays;

        bump(&mut self.data.artists, play.id.artist_key.clone(), play.artist.trim(), now);
        debug!("stats: {} now at {} plays", play.id, plays);
        self.save()
    }

    fn record_album_session(&mut self, album: &str) -> Result<(), StatsError> {
        let album = album.trim();
        let sessions = bump(&mut self.data.albums, album.to_lowercase(), album, Utc::now());
        info!("album session counted: {} ({} total)", album, sessions);
        self.save()
    }

    fn cached_duration_ms(&self, id: &CanonicalSongId) -> Option<u64> {
        self.data
            .durations_cache
            .get(&id.to_string())
            .map(|c| c.ms)
            .filter(|&ms| ms > 0)
    }

    fn record_listen_time(&mut self, play: &SongPlay, duration_ms: u64) -> Result<(), StatsError> {
        let key = play.id.to_string();
        self.data
            .durations_cache
            .entry(key.clone())
            .or_insert_with(|| CachedDuration {
                ms: duration_ms,
                artist: play.artist.clone(),
                title: play.title.clone(),
                album: play.album.clone(),
                fetched: Utc::now(),
            });
        if let Some(entry) = self.data.songs.get_mut(&key) {
            entry.duration_ms = Some(duration_ms);
        }
        self.data.listening.total_seconds += duration_ms as f64 / 1000.0;
        debug!(
            "listen time +{:.1} min, {:.1} min total",
            duration_ms as f64 / 60_000.0,
            self.data.listening.total_seconds / 60.0
        );
        self.save()
    }
}
