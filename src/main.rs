/*
 *  main.rs
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

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};

#[cfg(unix)] // Only compile this block on Unix-like systems
use tokio::signal::unix::{signal, SignalKind}; // Import specific Unix signals

use vinylpi::capture::{ArecordSource, AudioSource, FileSource};
use vinylpi::config::{self, Cli, Config, ConfigWatcher, FileConfigStore};
use vinylpi::display::drivers::{MockDriver, PixooDriver};
use vinylpi::display::DisplayDriver;
use vinylpi::listen_time::{MusicBrainzLookup, TrackLengthLookup};
use vinylpi::recognition::AuddRecognizer;
use vinylpi::service::{LoopExit, Monitor, MonitorParts};
use vinylpi::stats::JsonStatsStore;
use vinylpi::status::StatusFile;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Asynchronously waits for a SIGINT, SIGTERM, or SIGHUP signal.
/// Once a signal is caught it is logged and the function returns, allowing
/// for graceful shutdown.
async fn signal_handler() -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

fn print_stats(cfg: &Config, n: usize) -> Result<()> {
    let store = JsonStatsStore::open(&cfg.stats.path)
        .with_context(|| format!("reading stats from {}", cfg.stats.path.display()))?;

    let total_minutes = (store.data().listening.total_seconds / 60.0).round() as u64;
    println!("Listening time: {}h {:02}m\n", total_minutes / 60, total_minutes % 60);

    println!("Top {} songs", n);
    for (i, s) in store.top_songs(n).iter().enumerate() {
        let length = s
            .duration_ms
            .map(|ms| format!("  [{}:{:02}]", ms / 60_000, (ms / 1000) % 60))
            .unwrap_or_default();
        println!("{:>3}. {:>4}x  {} - {}{}", i + 1, s.plays, s.artist, s.title, length);
    }
    println!("\nTop {} artists", n);
    for (i, a) in store.top_artists(n).iter().enumerate() {
        println!("{:>3}. {:>4}x  {}", i + 1, a.count, a.name);
    }
    println!("\nTop {} albums (sessions)", n);
    for (i, a) in store.top_albums(n).iter().enumerate() {
        println!("{:>3}. {:>4}x  {}", i + 1, a.count, a.name);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (cfg, config_path) = config::load(&cli).context("loading configuration")?;

    if cli.dump_config {
        println!("{}", config::dump_config(&cfg)?);
        return Ok(());
    }

    // Initialize the logger with the appropriate level based on debug flag
    env_logger::Builder::from_env(Env::default().default_filter_or(if cfg.debug.logs {"debug"} else {"info"}))
        .format_timestamp_secs()
        .init();

    info!("VinylPi - spin it, see it");
    info!("v.{} built {} for {}", env!("CARGO_PKG_VERSION"), BUILD_DATE, BUILD_TARGET);
    match config_path.as_deref() {
        Some(p) => info!("config: {}", p.display()),
        None => info!("no config file found, using defaults"),
    }

    if let Some(n) = cli.stats {
        return print_stats(&cfg, n);
    }

    let canvas = cfg.image.canvas_size;
    let driver: Arc<dyn DisplayDriver> = if cli.dry_run {
        info!("dry run: frames go to a mock display");
        Arc::new(MockDriver::new(canvas))
    } else {
        Arc::new(PixooDriver::new(&cfg.divoom, canvas).context("setting up the Pixoo")?)
    };

    let source: Box<dyn AudioSource> = match cli.replay.as_ref() {
        Some(path) => {
            info!("replaying {}", path.display());
            Box::new(FileSource::new(path))
        }
        None => Box::new(ArecordSource::new(cfg.audio.clone())),
    };

    let recognizer = AuddRecognizer::new(&cfg.recognition).context("setting up recognition")?;
    let stats = JsonStatsStore::open(&cfg.stats.path).unwrap_or_else(|e| {
        warn!("cannot read stats {}, starting empty: {}", cfg.stats.path.display(), e);
        JsonStatsStore::empty(&cfg.stats.path)
    });
    let lengths: Option<Box<dyn TrackLengthLookup>> = match MusicBrainzLookup::new(&cfg.stats) {
        Ok(lookup) => Some(Box::new(lookup)),
        Err(e) => {
            warn!("listening time disabled: {}", e);
            None
        }
    };

    let watcher = ConfigWatcher::new(FileConfigStore::new(config_path, cli.clone()), cfg.clone());
    let mut monitor = Monitor::new(MonitorParts {
        watcher,
        source,
        recognizer: Box::new(recognizer),
        driver,
        stats: Box::new(stats),
        lengths,
        status: Some(StatusFile::new(&cfg.status.path)),
    })?;
    monitor.start().await.context("display not reachable")?;

    // Main application loop
    let exit = tokio::select! {
        // Handle Unix signals for graceful shutdown
        r = signal_handler() => {
            if let Err(e) = r {
                error!("signal handler failed: {}", e);
            }
            LoopExit::Shutdown
        }
        exit = monitor.run() => exit,
    };

    monitor.shutdown(exit).await;
    info!("bye");
    Ok(())
}
