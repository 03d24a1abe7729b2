/*
 *  config.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Layered configuration: defaults, YAML/JSON file, CLI overrides
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

use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}, time::SystemTime};
use thiserror::Error;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration. Every section falls back to its defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub recognition: RecognitionConfig,
    pub image: ImageConfig,
    pub fallback: FallbackConfig,
    pub divoom: DivoomConfig,
    pub behavior: BehaviorConfig,
    pub stats: StatsConfig,
    pub status: StatusConfig,
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// ALSA capture device passed to arecord
    pub device: String,
    pub sample_seconds: u32,
    pub sample_rate: u32,
    pub channels: u16,
    /// keep a copy of every captured sample here
    pub output_wav: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: "default".into(),
            sample_seconds: 10,
            sample_rate: 44_100,
            channels: 1,
            output_wav: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub api_url: String,
    pub api_token: String,
    pub timeout_seconds: u64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.audd.io/".into(),
            api_token: String::new(),
            timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextColorMode {
    /// use `text_color` as given
    #[default]
    Manual,
    /// most common dark-enough colour of the cover
    Dominant,
    /// black or white depending on the background
    Contrast,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub canvas_size: u32,
    pub top_margin: u32,
    pub cover_size: u32,
    /// gap between the cover and the artist line
    pub margin_image_text: u32,
    pub line_spacing_margin: u32,
    /// 4x6 | 5x7 | 5x8 | 6x10
    pub font: String,
    pub uppercase: bool,
    #[serde(alias = "manual_bg_color")]
    pub background_color: [u8; 3],
    pub use_dynamic_bg: bool,
    pub text_color: [u8; 3],
    pub text_color_mode: TextColorMode,
    /// legacy switch: true means `contrast`, false means `manual`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_dynamic_text_color: Option<bool>,
    /// pixels per second
    pub marquee_speed: f64,
    #[serde(alias = "sleep_seconds")]
    pub frame_delay_seconds: f64,
    pub preview_scale: u32,
}

impl ImageConfig {
    /// `use_dynamic_text_color` wins over `text_color_mode` when present.
    pub fn effective_text_color_mode(&self) -> TextColorMode {
        match self.use_dynamic_text_color {
            Some(true) => TextColorMode::Contrast,
            Some(false) => TextColorMode::Manual,
            None => self.text_color_mode,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            canvas_size: 64,
            top_margin: 1,
            cover_size: 46,
            margin_image_text: 3,
            line_spacing_margin: 3,
            font: "4x6".into(),
            uppercase: true,
            background_color: [0, 0, 0],
            use_dynamic_bg: false,
            text_color: [255, 255, 255],
            text_color_mode: TextColorMode::Manual,
            use_dynamic_text_color: None,
            marquee_speed: 10.0,
            frame_delay_seconds: 0.1,
            preview_scale: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub image_path: PathBuf,
    /// overrides `behavior.fallback_allowed_failures` when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_failures: Option<u32>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            image_path: PathBuf::from("assets/fallback.png"),
            allowed_failures: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DivoomConfig {
    pub ip: Option<String>,
    /// per-request timeout, seconds
    pub timeout: f64,
    pub gif_speed_ms: u32,
    pub auto_reset_gif_id: bool,
    /// 0..=100, applied at start and on reload
    pub brightness: Option<u8>,
}

impl Default for DivoomConfig {
    fn default() -> Self {
        Self {
            ip: None,
            timeout: 2.0,
            gif_speed_ms: 100,
            auto_reset_gif_id: true,
            brightness: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub loop_delay_seconds: f64,
    /// misses in a row before polling stops, 0 disables
    pub auto_sleep: u32,
    pub fallback_allowed_failures: u32,
    pub min_consecutive_switch: u32,
    pub min_tracks_for_album_session: usize,
}

impl Config {
    /// Misses in a row before the fallback image is shown.
    pub fn fallback_allowed_failures(&self) -> u32 {
        self.fallback.allowed_failures.unwrap_or(self.behavior.fallback_allowed_failures)
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            loop_delay_seconds: 1.0,
            auto_sleep: 50,
            fallback_allowed_failures: 3,
            min_consecutive_switch: 2,
            min_tracks_for_album_session: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub path: PathBuf,
    /// look up track lengths on MusicBrainz and sum up listening time
    pub listen_time: bool,
    pub musicbrainz_url: String,
    pub lookup_timeout_seconds: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("stats.json"),
            listen_time: true,
            musicbrainz_url: "https://musicbrainz.org/ws/2/recording".into(),
            lookup_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub path: PathBuf,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("/tmp/vinylpi_status.json") }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    pub logs: bool,
    pub pixoo_frame_path: Option<PathBuf>,
    pub preview_path: Option<PathBuf>,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "vinylpi", about = "VinylPi - now playing on a Pixoo", version)]
pub struct Cli {
    /// Path to a YAML/JSON config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Debug logging
    #[arg(short = 'v', long, action = ArgAction::SetTrue)]
    pub debug: bool,
    /// Render to a mock display instead of the Pixoo
    #[arg(long, action = ArgAction::SetTrue)]
    pub dry_run: bool,
    /// Print the top N songs, artists and albums and exit
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "10")]
    pub stats: Option<usize>,
    /// Recognize this WAV file every iteration instead of recording
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub replay: Option<PathBuf>,
    #[arg(long)]
    pub divoom_ip: Option<String>,
    #[arg(long)]
    pub brightness: Option<u8>,
    #[arg(long)]
    pub audio_device: Option<String>,
    #[arg(long)]
    pub api_token: Option<String>,
    #[arg(long)]
    pub loop_delay: Option<f64>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Defaults, then the config file, then CLI overrides, then validation.
/// Returns the path that was read so it can be watched for changes.
pub fn load(cli: &Cli) -> Result<(Config, Option<PathBuf>), ConfigError> {
    let path = match cli.config.as_ref() {
        Some(p) if p.exists() => Some(p.clone()),
        Some(p) => {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
        None => find_config_file(),
    };

    let mut cfg = match path.as_deref() {
        Some(p) => read_yaml(p)?,
        None => Config::default(),
    };

    apply_cli_overrides(&mut cfg, cli);
    validate(&cfg)?;
    Ok((cfg, path))
}

/// Pretty YAML of the effective config.
pub fn dump_config(cfg: &Config) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(cfg)?)
}

/// Try common locations in order (first hit wins).
pub fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/vinylpi/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/vinylpi/config.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["vinylpi.yaml", "config.yaml", "config.json"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

/// YAML is a superset of JSON, so `config.json` parses here as well.
pub fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    if s.trim().is_empty() {
        return Ok(Config::default());
    }
    let mut cfg: Config = serde_yaml::from_str(&s)?;
    clear_empty_values(&mut cfg);
    Ok(cfg)
}

/// Older JSON configs write `""` for unset paths and addresses.
fn clear_empty_values(cfg: &mut Config) {
    fn clear(path: &mut Option<PathBuf>) {
        if path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            *path = None;
        }
    }
    clear(&mut cfg.audio.output_wav);
    clear(&mut cfg.debug.pixoo_frame_path);
    clear(&mut cfg.debug.preview_path);
    if cfg.divoom.ip.as_deref().is_some_and(|ip| ip.trim().is_empty()) {
        cfg.divoom.ip = None;
    }
}

pub fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.debug                    { cfg.debug.logs = true; }
    if cli.divoom_ip.is_some()      { cfg.divoom.ip = cli.divoom_ip.clone(); }
    if cli.brightness.is_some()     { cfg.divoom.brightness = cli.brightness; }
    if let Some(dev) = &cli.audio_device { cfg.audio.device = dev.clone(); }
    if let Some(tok) = &cli.api_token    { cfg.recognition.api_token = tok.clone(); }
    if let Some(d) = cli.loop_delay      { cfg.behavior.loop_delay_seconds = d; }
}

/// Put any invariants here (required fields, ranges, etc.)
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let image = &cfg.image;
    if !matches!(image.canvas_size, 16 | 32 | 64) {
        return Err(ConfigError::Validation("image canvas_size must be 16|32|64".into()));
    }
    if image.cover_size > image.canvas_size {
        return Err(ConfigError::Validation("image cover_size must not exceed canvas_size".into()));
    }
    if !(image.frame_delay_seconds > 0.0) || !image.frame_delay_seconds.is_finite() {
        return Err(ConfigError::Validation("image frame_delay_seconds must be > 0".into()));
    }
    if image.marquee_speed < 0.0 || !image.marquee_speed.is_finite() {
        return Err(ConfigError::Validation("image marquee_speed must be >= 0".into()));
    }
    if let Some(b) = cfg.divoom.brightness {
        if b > 100 {
            return Err(ConfigError::Validation("divoom brightness must be 0..=100".into()));
        }
    }
    let behavior = &cfg.behavior;
    if behavior.min_consecutive_switch < 1 {
        return Err(ConfigError::Validation("behavior min_consecutive_switch must be >= 1".into()));
    }
    if behavior.min_tracks_for_album_session < 1 {
        return Err(ConfigError::Validation(
            "behavior min_tracks_for_album_session must be >= 1".into(),
        ));
    }
    if behavior.loop_delay_seconds < 0.0 || !behavior.loop_delay_seconds.is_finite() {
        return Err(ConfigError::Validation("behavior loop_delay_seconds must be >= 0".into()));
    }
    Ok(())
}

/// Where configuration snapshots come from.
pub trait ConfigStore {
    fn read(&self) -> Result<Config, ConfigError>;

    /// `None` when there is nothing to watch (no file, or it vanished).
    fn last_modified_time(&self) -> Option<SystemTime>;
}

/// A config file with CLI overrides re-applied on every read.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: Option<PathBuf>,
    cli: Cli,
}

impl FileConfigStore {
    pub fn new(path: Option<PathBuf>, cli: Cli) -> Self {
        Self { path, cli }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl ConfigStore for FileConfigStore {
    fn read(&self) -> Result<Config, ConfigError> {
        let mut cfg = match self.path.as_deref() {
            Some(p) => read_yaml(p)?,
            None => Config::default(),
        };
        apply_cli_overrides(&mut cfg, &self.cli);
        validate(&cfg)?;
        Ok(cfg)
    }

    fn last_modified_time(&self) -> Option<SystemTime> {
        let path = self.path.as_deref()?;
        fs::metadata(path).and_then(|m| m.modified()).ok()
    }
}

/// Polls a store's timestamp once per iteration and re-reads on change.
pub struct ConfigWatcher<S: ConfigStore> {
    store: S,
    current: Config,
    last_seen: Option<SystemTime>,
}

impl<S: ConfigStore> ConfigWatcher<S> {
    pub fn new(store: S, initial: Config) -> Self {
        let last_seen = store.last_modified_time();
        Self { store, current: initial, last_seen }
    }

    pub fn current(&self) -> &Config {
        &self.current
    }

    /// Returns the config snapshot for this iteration and whether it was
    /// just reloaded. A broken file keeps the cached config; its timestamp
    /// is remembered so it is not re-parsed until it changes again.
    pub fn poll(&mut self) -> (Config, bool) {
        let Some(mtime) = self.store.last_modified_time() else {
            return (self.current.clone(), false);
        };
        if self.last_seen == Some(mtime) {
            return (self.current.clone(), false);
        }
        self.last_seen = Some(mtime);

        match self.store.read() {
            Ok(cfg) => {
                info!("configuration reloaded");
                self.current = cfg;
                (self.current.clone(), true)
            }
            Err(e) => {
                warn!("config reload failed, keeping previous settings: {}", e);
                (self.current.clone(), false)
            }
        }
    }
}
