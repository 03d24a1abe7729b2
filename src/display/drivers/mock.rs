/*
 *  display/drivers/mock.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Mock display driver for testing and dry runs
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

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::display::error::DisplayError;
use crate::display::frame::Frame;
use crate::display::traits::{DisplayCapabilities, DisplayDriver};

/// Frames kept for inspection; older ones are dropped.
const MAX_RECORDED_FRAMES: usize = 64;

/// Mock display driver
///
/// Records every operation instead of talking to hardware. Used by the unit
/// and integration tests and by `--dry-run`.
#[derive(Debug, Clone)]
pub struct MockDriver {
    capabilities: DisplayCapabilities,
    state: Arc<Mutex<MockDriverState>>,
}

/// Internal state for the mock driver (shared for inspection in tests)
#[derive(Debug, Default)]
pub struct MockDriverState {
    /// Number of times init() was called
    pub init_count: usize,

    /// Frames accepted by send_frame()
    pub frames_sent: usize,

    /// Most recent frames, oldest first
    pub frames: Vec<Frame>,

    pub last_brightness: Option<u8>,
    pub last_channel: Option<u8>,
    pub screen_on: Option<bool>,

    /// Simulate failures (for error testing)
    pub simulate_send_failure: bool,
    pub simulate_init_failure: bool,
}

impl MockDriver {
    pub fn new(canvas_size: u32) -> Self {
        Self {
            capabilities: DisplayCapabilities {
                canvas_size,
                supports_brightness: true,
                supports_channels: true,
                supports_screen_power: true,
            },
            state: Arc::new(Mutex::new(MockDriverState::default())),
        }
    }

    /// Get reference to state for inspection in tests
    pub fn state(&self) -> Arc<Mutex<MockDriverState>> {
        Arc::clone(&self.state)
    }

    fn lock(&self) -> MutexGuard<'_, MockDriverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn frames_sent(&self) -> usize {
        self.lock().frames_sent
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.lock().frames.last().cloned()
    }

    pub fn set_send_failure(&self, fail: bool) {
        self.lock().simulate_send_failure = fail;
    }
}

#[async_trait]
impl DisplayDriver for MockDriver {
    fn capabilities(&self) -> &DisplayCapabilities {
        &self.capabilities
    }

    async fn init(&self) -> Result<(), DisplayError> {
        let mut state = self.lock();
        if state.simulate_init_failure {
            return Err(DisplayError::Other("Simulated init failure".to_string()));
        }
        state.init_count += 1;
        Ok(())
    }

    async fn send_frame(&self, frame: &Frame) -> Result<(), DisplayError> {
        self.validate_frame(frame)?;
        let mut state = self.lock();
        if state.simulate_send_failure {
            return Err(DisplayError::Other("Simulated send failure".to_string()));
        }
        state.frames_sent += 1;
        if state.frames.len() == MAX_RECORDED_FRAMES {
            state.frames.remove(0);
        }
        state.frames.push(frame.clone());
        Ok(())
    }

    async fn set_brightness(&self, percent: u8) -> Result<(), DisplayError> {
        self.lock().last_brightness = Some(percent);
        Ok(())
    }

    async fn set_channel(&self, index: u8) -> Result<(), DisplayError> {
        self.lock().last_channel = Some(index);
        Ok(())
    }

    async fn set_screen(&self, on: bool) -> Result<(), DisplayError> {
        self.lock().screen_on = Some(on);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::pixelcolor::{Rgb888, RgbColor};

    #[tokio::test]
    async fn test_mock_driver_init() {
        let driver = MockDriver::new(64);
        let state = driver.state();
        assert_eq!(state.lock().unwrap().init_count, 0);
        driver.init().await.unwrap();
        assert_eq!(state.lock().unwrap().init_count, 1);

        state.lock().unwrap().simulate_init_failure = true;
        assert!(driver.init().await.is_err());
    }

    #[tokio::test]
    async fn test_mock_driver_records_frames() {
        let driver = MockDriver::new(16);
        for _ in 0..(MAX_RECORDED_FRAMES + 5) {
            driver.send_frame(&Frame::new(16, Rgb888::RED)).await.unwrap();
        }
        assert_eq!(driver.frames_sent(), MAX_RECORDED_FRAMES + 5);
        assert_eq!(driver.state().lock().unwrap().frames.len(), MAX_RECORDED_FRAMES);
        assert_eq!(driver.last_frame().unwrap().pixel(0, 0), Some(Rgb888::RED));
    }

    #[tokio::test]
    async fn test_mock_driver_rejects_wrong_size_and_failures() {
        let driver = MockDriver::new(64);
        assert!(matches!(
            driver.send_frame(&Frame::new(32, Rgb888::BLACK)).await,
            Err(DisplayError::InvalidFrame { .. })
        ));
        driver.set_send_failure(true);
        assert!(driver.send_frame(&Frame::new(64, Rgb888::BLACK)).await.is_err());
        assert_eq!(driver.frames_sent(), 0);
    }

    #[tokio::test]
    async fn test_mock_driver_controls() {
        let driver = MockDriver::new(64);
        driver.set_brightness(40).await.unwrap();
        driver.set_channel(3).await.unwrap();
        driver.set_screen(false).await.unwrap();
        let state = driver.state();
        let s = state.lock().unwrap();
        assert_eq!(s.last_brightness, Some(40));
        assert_eq!(s.last_channel, Some(3));
        assert_eq!(s.screen_on, Some(false));
    }
}
