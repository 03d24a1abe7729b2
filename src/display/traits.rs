/*
 *  display/traits.rs
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

use async_trait::async_trait;

use crate::display::error::DisplayError;
use crate::display::frame::Frame;

/// Display capabilities and metadata
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayCapabilities {
    /// Square canvas edge in pixels
    pub canvas_size: u32,

    /// Whether brightness can be set remotely
    pub supports_brightness: bool,

    /// Whether the device has selectable channels (clock, visualizer, custom...)
    pub supports_channels: bool,

    /// Whether the screen can be switched off
    pub supports_screen_power: bool,
}

/// Minimal device abstraction every display driver implements.
///
/// Methods take `&self`; the scroll controller guarantees a single frame
/// producer at a time, drivers only need interior mutability for bookkeeping.
#[async_trait]
pub trait DisplayDriver: Send + Sync {
    /// Returns the capabilities of this display
    fn capabilities(&self) -> &DisplayCapabilities;

    /// Prepare the device (connectivity probe, counters reset, ...)
    async fn init(&self) -> Result<(), DisplayError>;

    /// Push one full RGB frame
    async fn send_frame(&self, frame: &Frame) -> Result<(), DisplayError>;

    /// Set brightness in percent (0-100)
    async fn set_brightness(&self, _percent: u8) -> Result<(), DisplayError> {
        Err(DisplayError::UnsupportedOperation)
    }

    /// Select a device channel by index
    async fn set_channel(&self, _index: u8) -> Result<(), DisplayError> {
        Err(DisplayError::UnsupportedOperation)
    }

    /// Switch the panel on or off
    async fn set_screen(&self, _on: bool) -> Result<(), DisplayError> {
        Err(DisplayError::UnsupportedOperation)
    }

    /// Checks geometry before a frame goes on the wire.
    fn validate_frame(&self, frame: &Frame) -> Result<(), DisplayError> {
        let size = self.capabilities().canvas_size;
        if frame.size() != size {
            return Err(DisplayError::InvalidFrame {
                width: frame.size(),
                height: frame.size(),
                reason: "frame does not match canvas size",
            });
        }
        Ok(())
    }
}
