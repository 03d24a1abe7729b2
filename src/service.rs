/*
 *  service.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  The polling loop: capture, recognize, decide, display
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

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use reqwest::Client;

use crate::capture::AudioSource;
use crate::config::{Config, ConfigStore, ConfigWatcher};
use crate::display::error::DisplayError;
use crate::display::render::{fetch_cover, load_fallback, prepare_track_layout};
use crate::display::traits::DisplayDriver;
use crate::display::worker::{DebugDump, ScrollController, ScrollJob};
use crate::listen_time::{add_listen_time, TrackLengthLookup};
use crate::pipeline::{DisplayCommand, IterationOutcome, NowPlaying, PipelineSettings};
use crate::recognition::{recognize_or_miss, Recognizer};
use crate::stats::{SongPlay, StatsStore};
use crate::status::{NowPlayingStatus, PlayState, StatusFile};
use crate::track::Observation;

/// Pause after a failed recording before trying again.
pub const CAPTURE_RETRY: Duration = Duration::from_secs(5);

/// Why the polling loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Too many misses in a row
    Sleep,
    /// Signal received
    Shutdown,
}

/// Everything the monitor is wired to.
pub struct MonitorParts<S: ConfigStore> {
    pub watcher: ConfigWatcher<S>,
    pub source: Box<dyn AudioSource>,
    pub recognizer: Box<dyn Recognizer>,
    pub driver: Arc<dyn DisplayDriver>,
    pub stats: Box<dyn StatsStore>,
    /// `None` turns listening time off
    pub lengths: Option<Box<dyn TrackLengthLookup>>,
    pub status: Option<StatusFile>,
}

pub struct Monitor<S: ConfigStore> {
    watcher: ConfigWatcher<S>,
    config: Config,
    pipeline: NowPlaying,
    source: Box<dyn AudioSource>,
    recognizer: Box<dyn Recognizer>,
    controller: ScrollController,
    stats: Box<dyn StatsStore>,
    lengths: Option<Box<dyn TrackLengthLookup>>,
    status: Option<StatusFile>,
    http: Client,
    /// a reload seen in an iteration that never reached the pipeline
    reload_unseen: bool,
}

impl<S: ConfigStore> Monitor<S> {
    pub fn new(parts: MonitorParts<S>) -> Result<Self, DisplayError> {
        let config = parts.watcher.current().clone();
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            pipeline: NowPlaying::new(PipelineSettings::from(&config)),
            config,
            watcher: parts.watcher,
            source: parts.source,
            recognizer: parts.recognizer,
            controller: ScrollController::new(parts.driver),
            stats: parts.stats,
            lengths: parts.lengths,
            status: parts.status,
            http,
            reload_unseen: false,
        })
    }

    pub fn pipeline(&self) -> &NowPlaying {
        &self.pipeline
    }

    fn driver(&self) -> &Arc<dyn DisplayDriver> {
        self.controller.driver()
    }

    /// Probe the device and apply the configured brightness.
    pub async fn start(&self) -> Result<(), DisplayError> {
        self.driver().init().await?;
        self.apply_brightness().await;
        Ok(())
    }

    async fn apply_brightness(&self) {
        let Some(level) = self.config.divoom.brightness else {
            return;
        };
        if let Err(e) = self.driver().set_brightness(level).await {
            warn!("could not set brightness: {}", e);
        }
    }

    /// Poll until auto-sleep kicks in. Cancel-safe between awaits.
    pub async fn run(&mut self) -> LoopExit {
        info!(
            "starting to loop every {:.1}s",
            self.config.behavior.loop_delay_seconds
        );
        loop {
            if let Some(exit) = self.iterate().await {
                return exit;
            }
        }
    }

    /// One polling iteration. `Some` ends the loop.
    pub async fn iterate(&mut self) -> Option<LoopExit> {
        self.refresh_config().await;

        let wav = match self.source.capture().await {
            Ok(wav) => wav,
            Err(e) => {
                warn!("no recording possible, trying again in {}s: {}", CAPTURE_RETRY.as_secs(), e);
                tokio::time::sleep(CAPTURE_RETRY).await;
                return None;
            }
        };

        let timeout = Duration::from_secs(self.config.recognition.timeout_seconds.max(1));
        let observation = recognize_or_miss(self.recognizer.as_ref(), &wav, timeout).await;
        let reloaded = std::mem::take(&mut self.reload_unseen);
        let outcome = self.pipeline.observe(observation.as_ref(), reloaded);

        if self.apply(outcome).await {
            return Some(LoopExit::Sleep);
        }

        let delay = self.config.behavior.loop_delay_seconds.max(0.0);
        tokio::time::sleep(Duration::from_secs_f64(delay)).await;
        None
    }

    async fn refresh_config(&mut self) {
        let (mut cfg, reloaded) = self.watcher.poll();
        if !reloaded {
            return;
        }
        let canvas = self.driver().capabilities().canvas_size;
        if cfg.image.canvas_size != canvas {
            warn!("image.canvas_size change needs a restart, keeping {}", canvas);
            cfg.image.canvas_size = canvas;
            cfg.image.cover_size = cfg.image.cover_size.min(canvas);
        }
        self.config = cfg;
        self.pipeline.apply_settings(PipelineSettings::from(&self.config));
        self.reload_unseen = true;
        self.apply_brightness().await;
    }

    /// Carry out the side effects of one iteration. Returns true to sleep.
    async fn apply(&mut self, outcome: IterationOutcome) -> bool {
        match outcome.display {
            Some(DisplayCommand::ShowTrack { observation, better_variant }) => {
                if better_variant {
                    debug!("redrawing with better variant");
                }
                self.show_track(&observation).await;
                self.write_status(NowPlayingStatus::playing(&observation));
            }
            Some(DisplayCommand::ShowFallback) => {
                self.show_fallback().await;
                self.write_status(NowPlayingStatus::idle(PlayState::Fallback));
            }
            None => {}
        }

        if let Some(play) = &outcome.song_play {
            info!("now playing: {} - {}", play.artist, play.title);
            if let Err(e) = self.stats.record_song_play(play) {
                warn!("stats update failed: {}", e);
            }
            self.credit_listen_time(play).await;
        }
        for album in &outcome.album_sessions {
            if let Err(e) = self.stats.record_album_session(album) {
                warn!("stats update failed: {}", e);
            }
        }
        outcome.sleep
    }

    async fn credit_listen_time(&mut self, play: &SongPlay) {
        if !self.config.stats.listen_time {
            return;
        }
        let Some(lookup) = self.lengths.as_deref() else {
            return;
        };
        match add_listen_time(self.stats.as_mut(), lookup, play).await {
            Ok(t) => info!(
                "listen time +{:.2} min{}",
                t.minutes(),
                if t.cached { " (cached)" } else { "" }
            ),
            Err(e) => warn!("listen time not added for {}: {}", play.id, e),
        }
    }

    async fn show_track(&self, obs: &Observation) {
        let cover = match obs.cover_url.as_deref() {
            Some(url) => match fetch_cover(&self.http, url).await {
                Ok(img) => Some(img),
                Err(e) => {
                    warn!("cover download failed, drawing text only: {}", e);
                    None
                }
            },
            None => None,
        };

        let image = &self.config.image;
        let layout = prepare_track_layout(cover.as_ref(), &obs.artist, &obs.title, image);
        let job = ScrollJob {
            layout,
            speed_px_per_s: image.marquee_speed,
            frame_delay: Duration::from_secs_f64(image.frame_delay_seconds),
            debug: DebugDump {
                frame_path: self.config.debug.pixoo_frame_path.clone(),
                preview_path: self.config.debug.preview_path.clone(),
                preview_scale: image.preview_scale,
            },
        };
        self.controller.start(job).await;
    }

    async fn show_fallback(&self) {
        let canvas = self.driver().capabilities().canvas_size;
        let frame = match load_fallback(&self.config.fallback.image_path, canvas) {
            Ok(frame) => frame,
            Err(e) => {
                error!(
                    "cannot load fallback image {}: {}",
                    self.config.fallback.image_path.display(),
                    e
                );
                self.controller.stop().await;
                return;
            }
        };
        match self.controller.show_static(&frame).await {
            Ok(()) => info!("fallback image sent"),
            Err(e) => error!("showing fallback image failed: {}", e),
        }
    }

    fn write_status(&self, status: NowPlayingStatus) {
        if let Some(file) = &self.status {
            if let Err(e) = file.write(&status) {
                warn!("status file {} not written: {}", file.path().display(), e);
            }
        }
    }

    /// Stop the display worker; on auto-sleep also switch the panel off.
    pub async fn shutdown(&self, exit: LoopExit) {
        self.controller.stop().await;
        if exit == LoopExit::Sleep {
            info!("going to sleep");
            if let Err(e) = self.driver().set_screen(false).await {
                warn!("could not switch screen off: {}", e);
            }
            self.write_status(NowPlayingStatus::idle(PlayState::Sleeping));
        }
    }
}
