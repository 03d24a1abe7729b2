/*
 *  display/frame.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Square RGB frame buffer usable as an embedded-graphics DrawTarget
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

use core::convert::Infallible;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use image::{imageops::FilterType, RgbImage};

/// A square RGB canvas, the unit the display device accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    buf: Vec<Rgb888>,
    size: usize,
}

impl Frame {
    pub fn new(size: u32, fill: Rgb888) -> Self {
        let size = size as usize;
        Self { buf: vec![fill; size * size], size }
    }

    /// Edge length in pixels
    pub fn size(&self) -> u32 {
        self.size as u32
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb888> {
        self.idx(Point::new(x as i32, y as i32)).map(|i| self.buf[i])
    }

    /// Row-major packed RGB bytes, three per pixel.
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.buf.len() * 3);
        for c in &self.buf {
            out.extend_from_slice(&[c.r(), c.g(), c.b()]);
        }
        out
    }

    /// Copy `img` with its top-left corner at (x, y), clipped to the canvas.
    pub fn blit(&mut self, img: &RgbImage, x: i32, y: i32) {
        for (px, py, p) in img.enumerate_pixels() {
            let pt = Point::new(x + px as i32, y + py as i32);
            if let Some(i) = self.idx(pt) {
                self.buf[i] = Rgb888::new(p[0], p[1], p[2]);
            }
        }
    }

    /// Nearest-neighbour resize of an arbitrary image onto a full frame.
    pub fn from_image(img: &RgbImage, size: u32) -> Self {
        let resized = image::imageops::resize(img, size, size, FilterType::Nearest);
        let mut frame = Frame::new(size, Rgb888::BLACK);
        frame.blit(&resized, 0, 0);
        frame
    }

    pub fn to_image(&self) -> RgbImage {
        RgbImage::from_fn(self.size(), self.size(), |x, y| {
            let c = self.buf[y as usize * self.size + x as usize];
            image::Rgb([c.r(), c.g(), c.b()])
        })
    }

    /// Map (x,y) to linear index; returns None if out of bounds
    #[inline]
    fn idx(&self, p: Point) -> Option<usize> {
        if p.x >= 0 && p.y >= 0 {
            let (x, y) = (p.x as usize, p.y as usize);
            if x < self.size && y < self.size {
                return Some(y * self.size + x);
            }
        }
        None
    }
}

impl OriginDimensions for Frame {
    fn size(&self) -> Size {
        Size::new(self.size as u32, self.size as u32)
    }
}

impl DrawTarget for Frame {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if let Some(i) = self.idx(p) {
                self.buf[i] = c;
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let clipped = area.intersection(&self.bounding_box());
        for p in clipped.points() {
            if let Some(i) = self.idx(p) {
                self.buf[i] = color;
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.buf.fill(color);
        Ok(())
    }
}
