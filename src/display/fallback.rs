/*
 *  display/fallback.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Fallback image and auto-sleep policy
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

use crate::display::decider::DisplayState;

/// What a miss triggers. Both can happen in the same iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MissAction {
    /// Send the static fallback image
    pub show_fallback: bool,
    /// Stop polling
    pub sleep: bool,
}

impl MissAction {
    pub const WAIT: MissAction = MissAction { show_fallback: false, sleep: false };
    pub const FALLBACK: MissAction = MissAction { show_fallback: true, sleep: false };
    pub const SLEEP: MissAction = MissAction { show_fallback: false, sleep: true };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackPolicy {
    /// Misses in a row before the fallback image is shown
    pub allowed_failures: u32,
    /// Misses in a row before polling stops; 0 disables
    pub auto_sleep: u32,
    /// When false no fallback image is ever sent
    pub enabled: bool,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self { allowed_failures: 3, auto_sleep: 50, enabled: true }
    }
}

impl FallbackPolicy {
    /// Fallback and sleep are decided independently; one miss may trigger both.
    pub fn on_miss(&self, state: &mut DisplayState, config_reloaded: bool) -> MissAction {
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        let failures = state.consecutive_failures;
        let mut action = MissAction::WAIT;

        if self.enabled
            && failures >= self.allowed_failures
            && (!state.last_display_was_fallback || config_reloaded)
        {
            info!("{} misses in a row, showing fallback image", failures);
            state.mark_fallback();
            action.show_fallback = true;
        }

        if self.auto_sleep > 0 && failures >= self.auto_sleep {
            info!("{} misses in a row, going to sleep", failures);
            action.sleep = true;
        }

        if action == MissAction::WAIT {
            debug!("miss {} (fallback after {})", failures, self.allowed_failures);
        }
        action
    }

    pub fn on_hit(state: &mut DisplayState) {
        state.consecutive_failures = 0;
    }
}
