/*
 *  lib.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Library root
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

// identity and decisions
pub mod track;
pub mod canonical;
pub mod variant;
pub mod debounce;
pub mod album;
pub mod pipeline;

// display subsystem
pub mod display;

// collaborators
pub mod capture;
pub mod recognition;
pub mod stats;
pub mod listen_time;
pub mod status;
pub mod config;
pub mod service;
