/*
 *  debounce.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Confirm-after-N switch debouncer
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

use log::debug;
use std::fmt::Debug;

/// Result of feeding one identity into a [`SwitchDebouncer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Debounce<T> {
    /// Identity matches the confirmed one.
    Stable,
    /// Identity is a candidate seen `streak` times in a row.
    Pending { streak: u32 },
    /// Identity was just confirmed, replacing `previous`.
    Switched { previous: Option<T> },
}

/// Requires `min_consecutive` identical observations in a row before the
/// confirmed identity changes. One instance per consumer; the display and the
/// statistics each own one so they can confirm at different moments.
#[derive(Debug, Clone)]
pub struct SwitchDebouncer<T> {
    confirmed: Option<T>,
    candidate: Option<T>,
    streak: u32,
    min_consecutive: u32,
}

impl<T: Clone + PartialEq + Debug> SwitchDebouncer<T> {
    pub fn new(min_consecutive: u32) -> Self {
        Self {
            confirmed: None,
            candidate: None,
            streak: 0,
            min_consecutive: min_consecutive.max(1),
        }
    }

    pub fn confirmed(&self) -> Option<&T> {
        self.confirmed.as_ref()
    }

    pub fn is_confirmed(&self, id: &T) -> bool {
        self.confirmed.as_ref() == Some(id)
    }

    pub fn candidate(&self) -> Option<(&T, u32)> {
        self.candidate.as_ref().map(|c| (c, self.streak))
    }

    pub fn min_consecutive(&self) -> u32 {
        self.min_consecutive
    }

    /// Takes effect from the next observation; a running streak is kept.
    pub fn set_min_consecutive(&mut self, min_consecutive: u32) {
        self.min_consecutive = min_consecutive.max(1);
    }

    /// Confirm `id` without a streak, e.g. for the very first identity.
    pub fn adopt(&mut self, id: T) {
        self.confirmed = Some(id);
        self.candidate = None;
        self.streak = 0;
    }

    pub fn observe(&mut self, id: T) -> Debounce<T> {
        if self.confirmed.as_ref() == Some(&id) {
            self.candidate = None;
            self.streak = 0;
            return Debounce::Stable;
        }

        if self.candidate.as_ref() == Some(&id) {
            self.streak += 1;
        } else {
            self.candidate = Some(id);
            self.streak = 1;
        }

        if self.streak >= self.min_consecutive {
            let previous = self.confirmed.take();
            self.confirmed = self.candidate.take();
            self.streak = 0;
            debug!("switch confirmed: {:?} -> {:?}", previous, self.confirmed);
            Debounce::Switched { previous }
        } else {
            Debounce::Pending { streak: self.streak }
        }
    }
}
