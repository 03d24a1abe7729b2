/*
 *  display/marquee.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Marquee scroll synchronizer for the artist and title lines
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

use std::time::Instant;

/// Horizontal position of one text line at `tick`.
///
/// Lines that fit are centered. Wider lines enter from the right edge and
/// travel left, looping every `scroll_range` pixels of travel.
pub fn line_x(width: u32, canvas: u32, scroll_range: u32, tick: f64) -> i32 {
    if width <= canvas {
        return ((canvas - width) / 2) as i32;
    }
    let range = u64::from(scroll_range.max(1));
    let travelled = tick.max(0.0).floor() as u64 % range;
    canvas as i32 - travelled as i32
}

/// Keeps the two lines of a track card looping in phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarqueeSync {
    canvas: u32,
    first_width: u32,
    second_width: u32,
}

impl MarqueeSync {
    pub fn new(first_width: u32, second_width: u32, canvas: u32) -> Self {
        Self { canvas, first_width, second_width }
    }

    fn range_for(&self, width: u32) -> u32 {
        if self.first_width > self.canvas && self.second_width > self.canvas {
            // both overflow: one shared loop length
            self.first_width.max(self.second_width) + self.canvas
        } else {
            width + self.canvas
        }
    }

    /// Loop period in pixels of travel, `None` when nothing scrolls.
    pub fn period(&self) -> Option<u32> {
        match (self.first_width > self.canvas, self.second_width > self.canvas) {
            (false, false) => None,
            (true, false) => Some(self.range_for(self.first_width)),
            (false, true) => Some(self.range_for(self.second_width)),
            (true, true) => Some(self.range_for(self.first_width)),
        }
    }

    pub fn positions(&self, tick: f64) -> (i32, i32) {
        (
            line_x(self.first_width, self.canvas, self.range_for(self.first_width), tick),
            line_x(self.second_width, self.canvas, self.range_for(self.second_width), tick),
        )
    }
}

/// Wall-clock driven scroll progress, independent of the frame rate.
#[derive(Debug, Clone, Default)]
pub struct ScrollState {
    tick: f64,
    last_wall_time: Option<Instant>,
}

impl ScrollState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self) -> f64 {
        self.tick
    }

    pub fn reset(&mut self) {
        self.tick = 0.0;
        self.last_wall_time = None;
    }

    /// Advance by the time elapsed since the previous call. The first call
    /// only anchors the clock, so the first frame is drawn at tick 0.
    pub fn advance(&mut self, now: Instant, speed_px_per_s: f64) -> f64 {
        if let Some(last) = self.last_wall_time {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            self.advance_by(elapsed, speed_px_per_s);
        }
        self.last_wall_time = Some(now);
        self.tick
    }

    pub fn advance_by(&mut self, elapsed_secs: f64, speed_px_per_s: f64) -> f64 {
        if elapsed_secs.is_finite() && elapsed_secs > 0.0 && speed_px_per_s > 0.0 {
            self.tick += speed_px_per_s * elapsed_secs;
        }
        self.tick
    }
}
