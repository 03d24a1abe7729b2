/*
 *  display/drivers/pixoo.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Divoom Pixoo HTTP driver
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

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, info};
use reqwest::{header, Client};
use serde_json::{json, Value};

use crate::config::DivoomConfig;
use crate::display::error::DisplayError;
use crate::display::frame::Frame;
use crate::display::traits::{DisplayCapabilities, DisplayDriver};

/// Edge lengths the device firmware accepts
pub const SUPPORTED_SIZES: [u32; 3] = [16, 32, 64];

/// Talks to a Pixoo over its local `/post` JSON endpoint.
#[derive(Debug)]
pub struct PixooDriver {
    base_url: String,
    client: Client,
    gif_speed_ms: u32,
    auto_reset_gif_id: bool,
    capabilities: DisplayCapabilities,
}

impl PixooDriver {
    pub fn new(cfg: &DivoomConfig, canvas_size: u32) -> Result<Self, DisplayError> {
        const VERSION: &str = concat!("VinylPi ", env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

        let ip = cfg
            .ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| DisplayError::InvalidConfiguration("divoom.ip is not set".into()))?;
        if !SUPPORTED_SIZES.contains(&canvas_size) {
            return Err(DisplayError::InvalidConfiguration(format!(
                "canvas size {} not supported by Pixoo",
                canvas_size
            )));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));

        let timeout = Duration::from_secs_f64(cfg.timeout.max(0.05));
        let client = Client::builder()
            .connect_timeout(timeout)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: format!("http://{}/post", ip),
            client,
            gif_speed_ms: cfg.gif_speed_ms,
            auto_reset_gif_id: cfg.auto_reset_gif_id,
            capabilities: DisplayCapabilities {
                canvas_size,
                supports_brightness: true,
                supports_channels: true,
                supports_screen_power: true,
            },
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, payload: &Value) -> Result<Value, DisplayError> {
        let command = payload.get("Command").and_then(Value::as_str).unwrap_or("?");
        debug!("pixoo <- {}", command);
        let resp = self
            .client
            .post(&self.base_url)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        let body = resp.text().await?;
        check_response(parse_body(&body))
    }

    async fn next_pic_id(&self) -> Result<u64, DisplayError> {
        let data = self.post(&json!({ "Command": "Draw/GetHttpGifId" })).await?;
        Ok(pic_id_from(&data))
    }

    async fn reset_pic_id(&self) -> Result<(), DisplayError> {
        self.post(&json!({ "Command": "Draw/ResetHttpGifId" })).await?;
        Ok(())
    }
}

/// Bodies that are not JSON are treated as an empty reply.
fn parse_body(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or(Value::Null)
}

fn check_response(data: Value) -> Result<Value, DisplayError> {
    match data.get("error_code").and_then(Value::as_i64) {
        Some(code) if code != 0 => Err(DisplayError::Api(format!("Pixoo API error: {}", data))),
        _ => Ok(data),
    }
}

fn pic_id_from(data: &Value) -> u64 {
    data.get("PicId")
        .or_else(|| data.get("PicID"))
        .and_then(Value::as_u64)
        .unwrap_or(1)
}

/// Build a single-frame `Draw/SendHttpGif` command.
pub fn gif_payload(frame: &Frame, pic_id: u64, speed_ms: u32) -> Result<Value, DisplayError> {
    let width = frame.size();
    if !SUPPORTED_SIZES.contains(&width) {
        return Err(DisplayError::InvalidFrame {
            width,
            height: width,
            reason: "Pixoo only supports 16, 32 or 64 pixel frames",
        });
    }
    Ok(json!({
        "Command": "Draw/SendHttpGif",
        "PicNum": 1,
        "PicWidth": width,
        "PicOffset": 0,
        "PicID": pic_id,
        "PicSpeed": speed_ms,
        // some firmware revisions read the misspelled key
        "PicSpped": speed_ms,
        "PicData": STANDARD.encode(frame.to_rgb_bytes()),
    }))
}

#[async_trait]
impl DisplayDriver for PixooDriver {
    fn capabilities(&self) -> &DisplayCapabilities {
        &self.capabilities
    }

    async fn init(&self) -> Result<(), DisplayError> {
        self.post(&json!({ "Command": "Channel/GetAllConf" })).await?;
        info!("Pixoo reachable at {}", self.base_url);
        Ok(())
    }

    async fn send_frame(&self, frame: &Frame) -> Result<(), DisplayError> {
        self.validate_frame(frame)?;
        if self.auto_reset_gif_id {
            self.reset_pic_id().await?;
        }
        let pic_id = self.next_pic_id().await?;
        let payload = gif_payload(frame, pic_id, self.gif_speed_ms)?;
        self.post(&payload).await?;
        Ok(())
    }

    async fn set_brightness(&self, percent: u8) -> Result<(), DisplayError> {
        let percent = percent.min(100);
        self.post(&json!({ "Command": "Channel/SetBrightness", "Brightness": percent }))
            .await?;
        info!("Pixoo brightness set to {}", percent);
        Ok(())
    }

    async fn set_channel(&self, index: u8) -> Result<(), DisplayError> {
        self.post(&json!({ "Command": "Channel/SetIndex", "SelectIndex": index }))
            .await?;
        Ok(())
    }

    async fn set_screen(&self, on: bool) -> Result<(), DisplayError> {
        self.post(&json!({ "Command": "Channel/OnOffScreen", "OnOff": u8::from(on) }))
            .await?;
        info!("Pixoo screen {}", if on { "on" } else { "off" });
        Ok(())
    }
}
