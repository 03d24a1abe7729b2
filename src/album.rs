/*
 *  album.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Album listening-session tracker
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

use log::{debug, info};
use std::collections::HashSet;

use crate::debounce::{Debounce, SwitchDebouncer};

/// Counts album "sessions": one uninterrupted stay on an album during which
/// at least `min_tracks` distinct titles were heard. A stay is counted at
/// most once.
#[derive(Debug, Clone)]
pub struct AlbumSessionTracker {
    current_album: Option<String>,
    unique_titles_seen: HashSet<String>,
    session_counted: bool,
    switch: SwitchDebouncer<String>,
    min_tracks: usize,
}

impl AlbumSessionTracker {
    pub fn new(min_consecutive: u32, min_tracks: usize) -> Self {
        Self {
            current_album: None,
            unique_titles_seen: HashSet::new(),
            session_counted: false,
            switch: SwitchDebouncer::new(min_consecutive),
            min_tracks: min_tracks.max(1),
        }
    }

    pub fn set_thresholds(&mut self, min_consecutive: u32, min_tracks: usize) {
        self.switch.set_min_consecutive(min_consecutive);
        self.min_tracks = min_tracks.max(1);
    }

    pub fn current_album(&self) -> Option<&str> {
        self.current_album.as_deref()
    }

    pub fn titles_seen(&self) -> usize {
        self.unique_titles_seen.len()
    }

    pub fn session_counted(&self) -> bool {
        self.session_counted
    }

    /// The current album once its session has been counted.
    pub fn locked_album(&self) -> Option<&str> {
        self.current_album.as_deref().filter(|_| self.session_counted)
    }

    /// Feed one observation (trimmed album, canonical title). Returns the
    /// albums whose session counter must be incremented, in order.
    ///
    /// The first album ever seen is adopted at once; later album changes
    /// need `min_consecutive` observations in a row.
    pub fn observe(&mut self, album: &str, title_key: &str) -> Vec<String> {
        let album = album.trim();
        let mut counted = Vec::new();
        if album.is_empty() {
            return counted;
        }

        if self.current_album.is_none() {
            info!("first album: '{}'", album);
            self.switch.adopt(album.to_string());
            self.start_stay(album, title_key);
            self.count_if_qualified(&mut counted);
            return counted;
        }

        match self.switch.observe(album.to_string()) {
            Debounce::Stable => {
                self.unique_titles_seen.insert(title_key.to_string());
                self.count_if_qualified(&mut counted);
            }
            Debounce::Pending { streak } => {
                debug!("album candidate '{}' seen {} time(s)", album, streak);
            }
            Debounce::Switched { .. } => {
                // outgoing stay may qualify if the threshold was lowered mid-stay
                self.count_if_qualified(&mut counted);
                info!("album switch confirmed: {:?} -> '{}'", self.current_album, album);
                self.start_stay(album, title_key);
                self.count_if_qualified(&mut counted);
            }
        }
        counted
    }

    fn start_stay(&mut self, album: &str, title_key: &str) {
        self.current_album = Some(album.to_string());
        self.unique_titles_seen.clear();
        self.unique_titles_seen.insert(title_key.to_string());
        self.session_counted = false;
    }

    fn count_if_qualified(&mut self, counted: &mut Vec<String>) {
        let Some(album) = self.current_album.as_ref() else {
            return;
        };
        if !self.session_counted && self.unique_titles_seen.len() >= self.min_tracks {
            self.session_counted = true;
            info!(
                "album session counted for '{}' ({} titles)",
                album,
                self.unique_titles_seen.len()
            );
            counted.push(album.clone());
        }
    }
}
