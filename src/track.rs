/*
 *  track.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
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

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::canonicalize;
use crate::variant;

/// Placeholder the recognizer reports when a field is missing.
pub const UNKNOWN: &str = "UNKNOWN";

/// One recognition result for one polling iteration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Observation {
    pub artist: String,
    pub title: String,
    pub album: Option<String>,
    pub cover_url: Option<String>,
}

impl Observation {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
            album: None,
            cover_url: None,
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_cover(mut self, url: impl Into<String>) -> Self {
        self.cover_url = Some(url.into());
        self
    }

    /// True when neither artist nor title carries real information.
    pub fn is_unknown(&self) -> bool {
        is_sentinel(&self.artist) && is_sentinel(&self.title)
    }

    /// Trimmed album name, `None` when absent or blank.
    pub fn album_key(&self) -> Option<&str> {
        self.album
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    pub fn song_id(&self) -> CanonicalSongId {
        CanonicalSongId::from_raw(&self.artist, &self.title)
    }

    pub fn variant_score(&self) -> i32 {
        variant::score(&self.title, self.album_key())
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.album_key() {
            Some(album) => write!(f, "{} - {} [{}]", self.artist, self.title, album),
            None => write!(f, "{} - {}", self.artist, self.title),
        }
    }
}

fn is_sentinel(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s.eq_ignore_ascii_case(UNKNOWN)
}

/// Identity of "the same song" across variant metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalSongId {
    pub artist_key: String,
    pub title_key: String,
}

impl CanonicalSongId {
    pub fn from_raw(artist: &str, title: &str) -> Self {
        Self {
            artist_key: artist.trim().to_lowercase(),
            title_key: canonicalize(title),
        }
    }
}

impl fmt::Display for CanonicalSongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.artist_key, self.title_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variants_share_identity() {
        let a = Observation::new("Eagles", "Hotel California (2013 Remaster)");
        let b = Observation::new("  EAGLES ", "Hotel California");
        assert_eq!(a.song_id(), b.song_id());
        assert_eq!(a.song_id().to_string(), "eagles::hotel california");
    }

    #[test]
    fn test_unknown_sentinel() {
        assert!(Observation::new(UNKNOWN, UNKNOWN).is_unknown());
        assert!(Observation::new("", "unknown").is_unknown());
        assert!(!Observation::new(UNKNOWN, "Song").is_unknown());
        assert!(!Observation::new("Artist", UNKNOWN).is_unknown());
    }

    #[test]
    fn test_album_key_trims_and_drops_blank() {
        assert_eq!(Observation::new("a", "b").with_album("  Rumours ").album_key(), Some("Rumours"));
        assert_eq!(Observation::new("a", "b").with_album("   ").album_key(), None);
        assert_eq!(Observation::new("a", "b").album_key(), None);
    }
}
