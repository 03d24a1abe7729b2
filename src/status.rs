/*
 *  status.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Now-playing status file for external dashboards
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

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::track::Observation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    Playing,
    Fallback,
    Sleeping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlayingStatus {
    pub state: PlayState,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub cover_url: Option<String>,
    pub updated: DateTime<Local>,
}

impl NowPlayingStatus {
    pub fn playing(obs: &Observation) -> Self {
        Self {
            state: PlayState::Playing,
            artist: Some(obs.artist.trim().to_string()),
            title: Some(obs.title.trim().to_string()),
            album: obs.album_key().map(String::from),
            cover_url: obs.cover_url.clone(),
            updated: Local::now(),
        }
    }

    pub fn idle(state: PlayState) -> Self {
        Self {
            state,
            artist: None,
            title: None,
            album: None,
            cover_url: None,
            updated: Local::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, status: &NowPlayingStatus) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(status)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!("status {:?} written to {}", status.state, self.path.display());
        Ok(())
    }

    pub fn read(&self) -> std::io::Result<NowPlayingStatus> {
        let s = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&s)?)
    }
}
