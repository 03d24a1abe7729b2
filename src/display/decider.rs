/*
 *  display/decider.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Display update decider
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

use crate::track::CanonicalSongId;

/// What the display is currently showing. Process-local, never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayState {
    pub last_song_id: Option<CanonicalSongId>,
    pub last_variant_score: Option<i32>,
    pub last_display_was_fallback: bool,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayDecision {
    pub should_update: bool,
    pub better_variant: bool,
}

impl DisplayState {
    /// Record that `id` at `score` has been handed to the display.
    pub fn commit(&mut self, id: CanonicalSongId, score: i32) {
        self.last_song_id = Some(id);
        self.last_variant_score = Some(score);
        self.last_display_was_fallback = false;
    }

    pub fn mark_fallback(&mut self) {
        self.last_display_was_fallback = true;
    }
}

/// Decide whether a confirmed song observation must reach the display.
///
/// A worse-or-equal variant of the song already on screen is suppressed,
/// unless the display is recovering from the fallback image or the
/// configuration was just reloaded. A different song always updates.
pub fn decide(
    state: &DisplayState,
    id: &CanonicalSongId,
    score: i32,
    config_reloaded: bool,
) -> DisplayDecision {
    let forced = state.last_display_was_fallback || config_reloaded;

    if state.last_song_id.as_ref() != Some(id) {
        return DisplayDecision { should_update: true, better_variant: false };
    }

    match state.last_variant_score {
        Some(shown) if score <= shown => DisplayDecision {
            should_update: forced,
            better_variant: false,
        },
        Some(_) => DisplayDecision { should_update: true, better_variant: true },
        None => DisplayDecision { should_update: true, better_variant: false },
    }
}
