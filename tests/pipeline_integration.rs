/*
 *  tests/pipeline_integration.rs
 *
 *  End-to-end runs of the polling loop against the mock display
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 */

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use async_trait::async_trait;
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use image::{Rgb, RgbImage};

use vinylpi::capture::{AudioSource, CaptureError};
use vinylpi::config::{Config, ConfigError, ConfigStore, ConfigWatcher};
use vinylpi::display::drivers::MockDriver;
use vinylpi::listen_time::{ListenTimeError, TrackLengthLookup};
use vinylpi::recognition::{RecognitionError, Recognizer};
use vinylpi::service::{LoopExit, Monitor, MonitorParts};
use vinylpi::stats::{SongPlay, StatsError, StatsStore};
use vinylpi::status::{PlayState, StatusFile};
use vinylpi::track::{CanonicalSongId, Observation};

struct SilentWav;

#[async_trait]
impl AudioSource for SilentWav {
    async fn capture(&self) -> Result<Vec<u8>, CaptureError> {
        let mut wav = b"RIFF\x24\x00\x00\x00WAVE".to_vec();
        wav.resize(44, 0);
        Ok(wav)
    }
}

/// Plays back a fixed list of results, then misses forever.
struct Script(Mutex<VecDeque<Option<Observation>>>);

impl Script {
    fn new(items: Vec<Option<Observation>>) -> Self {
        Script(Mutex::new(items.into()))
    }
}

#[async_trait]
impl Recognizer for Script {
    async fn recognize(&self, _wav: &[u8]) -> Result<Option<Observation>, RecognitionError> {
        Ok(self.0.lock().unwrap().pop_front().flatten())
    }
}

#[derive(Clone, Default)]
struct MemoryStats {
    plays: Arc<Mutex<Vec<SongPlay>>>,
    albums: Arc<Mutex<Vec<String>>>,
    durations: Arc<Mutex<HashMap<String, u64>>>,
    listened_ms: Arc<Mutex<u64>>,
}

impl StatsStore for MemoryStats {
    fn record_song_play(&mut self, play: &SongPlay) -> Result<(), StatsError> {
        self.plays.lock().unwrap().push(play.clone());
        Ok(())
    }

    fn record_album_session(&mut self, album: &str) -> Result<(), StatsError> {
        self.albums.lock().unwrap().push(album.to_string());
        Ok(())
    }

    fn cached_duration_ms(&self, id: &CanonicalSongId) -> Option<u64> {
        self.durations.lock().unwrap().get(&id.to_string()).copied()
    }

    fn record_listen_time(&mut self, play: &SongPlay, duration_ms: u64) -> Result<(), StatsError> {
        self.durations.lock().unwrap().insert(play.id.to_string(), duration_ms);
        *self.listened_ms.lock().unwrap() += duration_ms;
        Ok(())
    }
}

/// Every song is four minutes long.
struct FourMinutes(Arc<Mutex<usize>>);

#[async_trait]
impl TrackLengthLookup for FourMinutes {
    async fn track_length_ms(
        &self,
        _artist: &str,
        _title: &str,
        _album: Option<&str>,
    ) -> Result<Option<u64>, ListenTimeError> {
        *self.0.lock().unwrap() += 1;
        Ok(Some(240_000))
    }
}

/// A config that never changes on disk.
struct Fixed(Config);

impl ConfigStore for Fixed {
    fn read(&self) -> Result<Config, ConfigError> {
        Ok(self.0.clone())
    }

    fn last_modified_time(&self) -> Option<SystemTime> {
        None
    }
}

fn test_config(dir: &std::path::Path) -> Config {
    let fallback = dir.join("fallback.png");
    RgbImage::from_pixel(4, 4, Rgb([255, 0, 0])).save(&fallback).unwrap();

    let mut cfg = Config::default();
    cfg.behavior.loop_delay_seconds = 0.0;
    cfg.behavior.fallback_allowed_failures = 2;
    cfg.behavior.auto_sleep = 4;
    cfg.image.frame_delay_seconds = 0.01;
    cfg.fallback.image_path = fallback;
    cfg
}

#[tokio::test]
async fn test_track_then_fallback_then_sleep() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mock = Arc::new(MockDriver::new(64));
    let stats = MemoryStats::default();
    let status = StatusFile::new(dir.path().join("status.json"));

    let a = Observation::new("Artist", "Song A").with_album("Album");
    let script = Script::new(vec![
        Some(a.clone()),
        Some(a.clone()),
        Some(Observation::new("Artist", "Song B (Live)")),
        Some(a.clone()),
    ]);

    let mut monitor = Monitor::new(MonitorParts {
        watcher: ConfigWatcher::new(Fixed(cfg.clone()), cfg),
        source: Box::new(SilentWav),
        recognizer: Box::new(script),
        driver: mock.clone(),
        stats: Box::new(stats.clone()),
        lengths: None,
        status: Some(status.clone()),
    })
    .unwrap();

    monitor.start().await.unwrap();
    let exit = monitor.run().await;
    assert_eq!(exit, LoopExit::Sleep);
    monitor.shutdown(exit).await;

    // one track card, one fallback image; the noise and the repeat drew nothing
    assert_eq!(mock.frames_sent(), 2);
    assert_eq!(mock.last_frame().unwrap().pixel(10, 10), Some(Rgb888::RED));

    let state = mock.state();
    let state = state.lock().unwrap();
    assert_eq!(state.init_count, 1);
    assert_eq!(state.screen_on, Some(false));

    let plays = stats.plays.lock().unwrap();
    assert_eq!(plays.len(), 1);
    assert_eq!(plays[0].title, "Song A");
    assert_eq!(plays[0].album.as_deref(), Some("Album"));
    assert_eq!(*stats.listened_ms.lock().unwrap(), 0);

    assert_eq!(status.read().unwrap().state, PlayState::Sleeping);
}

#[tokio::test]
async fn test_album_sessions_reach_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path());
    cfg.fallback.enabled = false;
    cfg.behavior.auto_sleep = 1;
    let mock = Arc::new(MockDriver::new(64));
    let stats = MemoryStats::default();
    let lookups = Arc::new(Mutex::new(0));

    let track = |t: &str| Some(Observation::new("Band", t).with_album("Record"));
    let script = Script::new(vec![track("One"), track("One"), track("Two"), track("Two"), track("Three")]);

    let mut monitor = Monitor::new(MonitorParts {
        watcher: ConfigWatcher::new(Fixed(cfg.clone()), cfg),
        source: Box::new(SilentWav),
        recognizer: Box::new(script),
        driver: mock.clone(),
        stats: Box::new(stats.clone()),
        lengths: Some(Box::new(FourMinutes(lookups.clone()))),
        status: None,
    })
    .unwrap();

    let exit = monitor.run().await;
    monitor.shutdown(exit).await;

    assert_eq!(*stats.albums.lock().unwrap(), vec!["Record".to_string()]);
    assert_eq!(stats.plays.lock().unwrap().len(), 2);
    // each confirmed song is credited once with its looked-up length
    assert_eq!(*lookups.lock().unwrap(), 2);
    assert_eq!(*stats.listened_ms.lock().unwrap(), 480_000);
    // fallback disabled: only the two track cards were drawn
    assert_eq!(mock.frames_sent(), 2);
    assert_ne!(mock.last_frame().unwrap().pixel(0, 0), Some(Rgb888::RED));
}
