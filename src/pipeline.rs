/*
 *  pipeline.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Per-iteration now-playing decisions
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

use crate::album::AlbumSessionTracker;
use crate::config::Config;
use crate::debounce::{Debounce, SwitchDebouncer};
use crate::display::decider::{decide, DisplayState};
use crate::display::fallback::FallbackPolicy;
use crate::stats::SongPlay;
use crate::track::{CanonicalSongId, Observation};
use crate::variant::is_live_variant;

/// The thresholds the pipeline reads from each config snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub min_consecutive_switch: u32,
    pub min_tracks_for_album_session: usize,
    pub fallback: FallbackPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for PipelineSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            min_consecutive_switch: cfg.behavior.min_consecutive_switch,
            min_tracks_for_album_session: cfg.behavior.min_tracks_for_album_session,
            fallback: FallbackPolicy {
                allowed_failures: cfg.fallback_allowed_failures(),
                auto_sleep: cfg.behavior.auto_sleep,
                enabled: cfg.fallback.enabled,
            },
        }
    }
}

/// What the display must do this iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayCommand {
    ShowTrack {
        observation: Observation,
        better_variant: bool,
    },
    ShowFallback,
}

/// Side effects decided by one iteration, for the caller to carry out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationOutcome {
    pub display: Option<DisplayCommand>,
    pub song_play: Option<SongPlay>,
    pub album_sessions: Vec<String>,
    /// stop polling
    pub sleep: bool,
    /// observation carried no usable identity and was ignored
    pub discarded: bool,
}

/// Owns all identity state: two independent song debouncers (display and
/// statistics), the album tracker and the display state.
#[derive(Debug, Clone)]
pub struct NowPlaying {
    settings: PipelineSettings,
    display_state: DisplayState,
    display_switch: SwitchDebouncer<CanonicalSongId>,
    stats_switch: SwitchDebouncer<CanonicalSongId>,
    albums: AlbumSessionTracker,
    /// set by a config reload, cleared once a display refresh consumed it
    reload_pending: bool,
}

impl NowPlaying {
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            settings,
            display_state: DisplayState::default(),
            display_switch: SwitchDebouncer::new(settings.min_consecutive_switch),
            stats_switch: SwitchDebouncer::new(settings.min_consecutive_switch),
            albums: AlbumSessionTracker::new(
                settings.min_consecutive_switch,
                settings.min_tracks_for_album_session,
            ),
            reload_pending: false,
        }
    }

    pub fn apply_settings(&mut self, settings: PipelineSettings) {
        if settings == self.settings {
            return;
        }
        debug!("pipeline settings updated: {:?}", settings);
        self.display_switch.set_min_consecutive(settings.min_consecutive_switch);
        self.stats_switch.set_min_consecutive(settings.min_consecutive_switch);
        self.albums
            .set_thresholds(settings.min_consecutive_switch, settings.min_tracks_for_album_session);
        self.settings = settings;
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn display_state(&self) -> &DisplayState {
        &self.display_state
    }

    pub fn albums(&self) -> &AlbumSessionTracker {
        &self.albums
    }

    /// Process one polling result. `None` is a miss (no match, timeout or
    /// recognizer error alike).
    pub fn observe(&mut self, observation: Option<&Observation>, config_reloaded: bool) -> IterationOutcome {
        if config_reloaded {
            self.reload_pending = true;
        }
        match observation {
            None => self.on_miss(),
            Some(obs) if obs.is_unknown() => {
                debug!("discarding observation without artist and title");
                IterationOutcome { discarded: true, ..IterationOutcome::default() }
            }
            Some(obs) => self.on_hit(obs),
        }
    }

    fn on_miss(&mut self) -> IterationOutcome {
        let mut out = IterationOutcome::default();
        let action = self.settings.fallback.on_miss(&mut self.display_state, self.reload_pending);
        if action.show_fallback {
            self.reload_pending = false;
            out.display = Some(DisplayCommand::ShowFallback);
        }
        out.sleep = action.sleep;
        out
    }

    /// Live recording credited to another album while a counted album
    /// session is running.
    fn is_live_mismatch(&self, obs: &Observation) -> bool {
        match (self.albums.locked_album(), obs.album_key()) {
            (Some(locked), Some(album)) => {
                album != locked.trim() && is_live_variant(&obs.title, Some(album))
            }
            _ => false,
        }
    }

    fn on_hit(&mut self, obs: &Observation) -> IterationOutcome {
        if self.is_live_mismatch(obs) {
            debug!(
                "ignoring live mismatch '{}' on '{}' while '{}' is playing",
                obs.title,
                obs.album_key().unwrap_or_default(),
                self.albums.locked_album().unwrap_or_default()
            );
            return self.on_miss();
        }

        let mut out = IterationOutcome::default();
        FallbackPolicy::on_hit(&mut self.display_state);

        let id = obs.song_id();
        let score = obs.variant_score();

        match self.display_switch.observe(id.clone()) {
            Debounce::Switched { previous } => {
                info!("display switch confirmed: {:?} -> {}", previous.map(|p| p.to_string()), id);
            }
            Debounce::Pending { streak } => debug!("display candidate {} ({} seen)", id, streak),
            Debounce::Stable => {}
        }

        if self.display_switch.is_confirmed(&id) {
            let decision = decide(&self.display_state, &id, score, self.reload_pending);
            if decision.should_update {
                if decision.better_variant {
                    info!("better variant of {} (score {})", id, score);
                }
                self.display_state.commit(id.clone(), score);
                self.reload_pending = false;
                out.display = Some(DisplayCommand::ShowTrack {
                    observation: obs.clone(),
                    better_variant: decision.better_variant,
                });
            } else {
                debug!("suppressed variant of {} (score {})", id, score);
            }
        }

        if let Debounce::Switched { .. } = self.stats_switch.observe(id.clone()) {
            out.song_play = Some(SongPlay {
                id: id.clone(),
                artist: obs.artist.trim().to_string(),
                title: obs.title.trim().to_string(),
                album: obs.album_key().map(String::from),
                variant_score: score,
            });
        }

        if let Some(album) = obs.album_key() {
            out.album_sessions = self.albums.observe(album, &id.title_key);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(allowed: u32, sleep: u32) -> PipelineSettings {
        PipelineSettings {
            min_consecutive_switch: 2,
            min_tracks_for_album_session: 2,
            fallback: FallbackPolicy { allowed_failures: allowed, auto_sleep: sleep, enabled: true },
        }
    }

    fn shown_title(out: &IterationOutcome) -> Option<&str> {
        match &out.display {
            Some(DisplayCommand::ShowTrack { observation, .. }) => Some(observation.title.as_str()),
            _ => None,
        }
    }

    #[test]
    fn test_confirm_then_ignore_noise() {
        let mut np = NowPlaying::new(settings(3, 0));
        let a = Observation::new("Artist", "Song A");
        let b = Observation::new("Artist", "Song B (Live)");

        let first = np.observe(Some(&a), false);
        assert!(first.display.is_none());
        assert!(first.song_play.is_none());

        let second = np.observe(Some(&a), false);
        assert_eq!(shown_title(&second), Some("Song A"));
        assert_eq!(second.song_play.as_ref().map(|p| p.title.as_str()), Some("Song A"));

        let third = np.observe(Some(&b), false);
        assert!(third.display.is_none());
        assert!(third.song_play.is_none());
        assert_eq!(
            np.display_state().last_song_id,
            Some(CanonicalSongId::from_raw("Artist", "Song A"))
        );
    }

    #[test]
    fn test_variant_upgrade_and_suppression() {
        let mut np = NowPlaying::new(settings(3, 0));
        let remaster = Observation::new("Eagles", "Hotel California (2013 Remaster)");
        let studio = Observation::new("Eagles", "Hotel California").with_album("Hotel California");

        np.observe(Some(&remaster), false);
        assert!(np.observe(Some(&remaster), false).display.is_some());
        // same variant again
        assert!(np.observe(Some(&remaster), false).display.is_none());

        let out = np.observe(Some(&studio), false);
        assert_eq!(
            out.display,
            Some(DisplayCommand::ShowTrack { observation: studio.clone(), better_variant: true })
        );
        // worse variant of what is shown
        assert!(np.observe(Some(&remaster), false).display.is_none());
        // no second play for a variant of the same song
        assert!(out.song_play.is_none());
    }

    #[test]
    fn test_fallback_after_three_misses() {
        let mut np = NowPlaying::new(settings(3, 0));
        assert!(np.observe(None, false).display.is_none());
        assert!(np.observe(None, false).display.is_none());
        assert_eq!(np.observe(None, false).display, Some(DisplayCommand::ShowFallback));
        assert!(np.observe(None, false).display.is_none());
    }

    #[test]
    fn test_hit_between_misses_prevents_fallback() {
        let mut np = NowPlaying::new(settings(3, 0));
        let a = Observation::new("Artist", "Song A");
        let outs = vec![
            np.observe(None, false),
            np.observe(None, false),
            np.observe(Some(&a), false),
            np.observe(None, false),
            np.observe(None, false),
        ];
        assert!(outs.iter().all(|o| o.display != Some(DisplayCommand::ShowFallback)));
    }

    #[test]
    fn test_recovery_from_fallback_redraws_same_song() {
        let mut np = NowPlaying::new(settings(1, 0));
        let a = Observation::new("Artist", "Song A");
        np.observe(Some(&a), false);
        assert!(np.observe(Some(&a), false).display.is_some());
        assert_eq!(np.observe(None, false).display, Some(DisplayCommand::ShowFallback));
        assert_eq!(shown_title(&np.observe(Some(&a), false)), Some("Song A"));
        assert!(!np.display_state().last_display_was_fallback);
    }

    #[test]
    fn test_reload_forces_one_refresh() {
        let mut np = NowPlaying::new(settings(3, 0));
        let a = Observation::new("Artist", "Song A");
        np.observe(Some(&a), false);
        np.observe(Some(&a), false);
        assert!(np.observe(Some(&a), true).display.is_some());
        assert!(np.observe(Some(&a), false).display.is_none());
    }

    #[test]
    fn test_reload_carries_over_until_consumed() {
        let mut np = NowPlaying::new(settings(2, 0));
        let a = Observation::new("Artist", "Song A");
        np.observe(Some(&a), false);
        np.observe(Some(&a), false);
        // reload arrives on a miss that does not reach the fallback threshold
        assert!(np.observe(None, true).display.is_none());
        assert!(np.observe(Some(&a), false).display.is_some());
    }

    #[test]
    fn test_unknown_observation_is_discarded() {
        let mut np = NowPlaying::new(settings(1, 0));
        let unknown = Observation::new("UNKNOWN", " ");
        let out = np.observe(Some(&unknown), false);
        assert!(out.discarded);
        assert_eq!(np.display_state(), &DisplayState::default());
        // a discard neither resets nor advances the miss counter
        np.observe(None, false);
        np.observe(Some(&unknown), false);
        assert_eq!(np.display_state().consecutive_failures, 1);
    }

    #[test]
    fn test_auto_sleep() {
        let mut np = NowPlaying::new(settings(2, 3));
        assert!(!np.observe(None, false).sleep);
        assert!(!np.observe(None, false).sleep);
        assert!(np.observe(None, false).sleep);
    }

    #[test]
    fn test_album_session_emitted_once() {
        let mut np = NowPlaying::new(settings(3, 0));
        let mut sessions = Vec::new();
        for title in ["One", "One", "Two", "Two", "Three", "Three"] {
            let obs = Observation::new("Band", title).with_album("Record");
            sessions.extend(np.observe(Some(&obs), false).album_sessions);
        }
        assert_eq!(sessions, vec!["Record".to_string()]);
    }

    #[test]
    fn test_live_mismatch_on_locked_album_counts_as_miss() {
        let mut np = NowPlaying::new(settings(2, 0));
        for title in ["One", "One", "Two", "Two"] {
            np.observe(Some(&Observation::new("Band", title).with_album("Record")), false);
        }
        assert_eq!(np.albums().locked_album(), Some("Record"));

        let live = Observation::new("Band", "Two").with_album("Live in Berlin");
        let out = np.observe(Some(&live), false);
        assert!(out.display.is_none());
        assert!(out.album_sessions.is_empty());
        assert_eq!(np.display_state().consecutive_failures, 1);
        assert_eq!(np.observe(Some(&live), false).display, Some(DisplayCommand::ShowFallback));
        assert_eq!(np.albums().current_album(), Some("Record"));

        // a studio track from another album is a normal hit
        let other = Observation::new("Band", "Elsewhere").with_album("Other Record");
        np.observe(Some(&other), false);
        assert_eq!(np.display_state().consecutive_failures, 0);
    }

    #[test]
    fn test_live_track_before_lock_is_a_hit() {
        let mut np = NowPlaying::new(settings(2, 0));
        let first = Observation::new("Band", "One").with_album("Record");
        np.observe(Some(&first), false);
        assert_eq!(np.albums().locked_album(), None);
        let live = Observation::new("Band", "One (Live)").with_album("Live in Berlin");
        np.observe(Some(&live), false);
        assert_eq!(np.display_state().consecutive_failures, 0);
    }

    #[test]
    fn test_apply_settings_changes_thresholds() {
        let mut np = NowPlaying::new(settings(3, 0));
        np.apply_settings(PipelineSettings { min_consecutive_switch: 1, ..settings(3, 0) });
        let a = Observation::new("Artist", "Song A");
        assert!(np.observe(Some(&a), false).display.is_some());
    }
}
