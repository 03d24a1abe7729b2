/*
 *  display/error.rs
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

use thiserror::Error;

/// Unified error type for all display operations
#[derive(Debug, Error)]
pub enum DisplayError {
    /// Transport failure talking to the device
    #[error("HTTP error talking to display: {0}")]
    Http(#[from] reqwest::Error),

    /// Device answered with a non-zero error code or unexpected payload
    #[error("Display API error: {0}")]
    Api(String),

    /// Frame geometry the device cannot show
    #[error("Invalid frame {width}x{height}: {reason}")]
    InvalidFrame {
        width: u32,
        height: u32,
        reason: &'static str,
    },

    /// Image decode/encode failure (cover art, fallback, previews)
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Unsupported operation for this display
    #[error("Operation not supported by this display")]
    UnsupportedOperation,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
