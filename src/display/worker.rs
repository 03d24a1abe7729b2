/*
 *  display/worker.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Scroll worker: one display refresh task at a time
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

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::display::error::DisplayError;
use crate::display::frame::Frame;
use crate::display::marquee::ScrollState;
use crate::display::render::{save_debug_frames, TrackLayout};
use crate::display::traits::DisplayDriver;

/// Where the first frame of each worker is dumped, if anywhere.
#[derive(Debug, Clone, Default)]
pub struct DebugDump {
    pub frame_path: Option<PathBuf>,
    pub preview_path: Option<PathBuf>,
    pub preview_scale: u32,
}

impl DebugDump {
    fn is_enabled(&self) -> bool {
        self.frame_path.is_some() || self.preview_path.is_some()
    }
}

/// A track card to keep on screen until superseded.
#[derive(Debug, Clone)]
pub struct ScrollJob {
    pub layout: TrackLayout,
    pub speed_px_per_s: f64,
    pub frame_delay: Duration,
    pub debug: DebugDump,
}

struct ActiveWorker {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns the display refresh task. Starting a job stops and joins the
/// previous one first, so frames from two generations never interleave.
pub struct ScrollController {
    driver: Arc<dyn DisplayDriver>,
    active: Mutex<Option<ActiveWorker>>,
}

impl ScrollController {
    pub fn new(driver: Arc<dyn DisplayDriver>) -> Self {
        Self { driver, active: Mutex::new(None) }
    }

    pub fn driver(&self) -> &Arc<dyn DisplayDriver> {
        &self.driver
    }

    pub async fn start(&self, job: ScrollJob) {
        let mut active = self.active.lock().await;
        Self::stop_locked(&mut active).await;

        let (stop_tx, stop_rx) = mpsc::channel(1);
        let driver = Arc::clone(&self.driver);
        let handle = tokio::spawn(async move {
            run_scroll(driver, job, stop_rx).await;
        });
        *active = Some(ActiveWorker { stop_tx, handle });
    }

    /// Stop any worker, then push one frame directly.
    pub async fn show_static(&self, frame: &Frame) -> Result<(), DisplayError> {
        let mut active = self.active.lock().await;
        Self::stop_locked(&mut active).await;
        self.driver.send_frame(frame).await
    }

    pub async fn stop(&self) {
        let mut active = self.active.lock().await;
        Self::stop_locked(&mut active).await;
    }

    pub async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    async fn stop_locked(active: &mut Option<ActiveWorker>) {
        let Some(worker) = active.take() else {
            return;
        };
        // a finished worker has dropped its receiver, the send error is expected
        let _ = worker.stop_tx.send(()).await;
        if let Err(e) = worker.handle.await {
            warn!("scroll worker ended abnormally: {}", e);
        }
        debug!("scroll worker stopped");
    }
}

async fn run_scroll(driver: Arc<dyn DisplayDriver>, job: ScrollJob, mut stop_rx: mpsc::Receiver<()>) {
    let mut scroll = ScrollState::new();
    let animated = job.layout.is_animated();
    let mut first = true;
    info!("scroll worker started ({})", if animated { "scrolling" } else { "static" });

    loop {
        let tick = scroll.advance(Instant::now(), job.speed_px_per_s);
        let frame = job.layout.render(tick);

        if first && job.debug.is_enabled() {
            if let Err(e) = save_debug_frames(
                &frame,
                job.debug.frame_path.as_deref(),
                job.debug.preview_path.as_deref(),
                job.debug.preview_scale,
            ) {
                warn!("debug frame dump failed: {}", e);
            }
        }

        if let Err(e) = driver.send_frame(&frame).await {
            error!("display send failed, stopping scroll worker: {}", e);
            return;
        }

        if first && !animated {
            // nothing moves, keep the frame until told otherwise
            let _ = stop_rx.recv().await;
            break;
        }
        first = false;

        tokio::select! {
            _ = tokio::time::sleep(job.frame_delay) => {}
            _ = stop_rx.recv() => break,
        }
    }
    debug!("scroll worker exiting");
}
