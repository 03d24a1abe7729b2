/*
 *  display/mod.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Display subsystem: decisions, rendering, refresh worker and drivers
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

// Core trait definitions
pub mod traits;
pub mod error;
pub mod frame;

// Decisions taken by the polling loop
pub mod decider;
pub mod fallback;

// Rendering and the refresh worker
pub mod marquee;
pub mod render;
pub mod worker;

// Display drivers
pub mod drivers;

// Re-exports for convenience
pub use traits::{DisplayCapabilities, DisplayDriver};
pub use error::DisplayError;
pub use frame::Frame;
pub use decider::{decide, DisplayDecision, DisplayState};
pub use fallback::{FallbackPolicy, MissAction};
pub use marquee::{MarqueeSync, ScrollState};
pub use render::{prepare_track_layout, TrackLayout};
pub use worker::{DebugDump, ScrollController, ScrollJob};
