/*
 *  recognition.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Song recognition from an audio sample
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
use log::{debug, info, warn};
use reqwest::{header, multipart, Client};
use serde::Deserialize;
use thiserror::Error;

use crate::config::RecognitionConfig;
use crate::track::{Observation, UNKNOWN};

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Recognition API error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("Recognition timed out after {0:?}")]
    Timeout(Duration),
    #[error("Recognizer not configured: {0}")]
    NotConfigured(String),
}

/// Turns a WAV sample into an observation, `Ok(None)` when nothing matched.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, wav: &[u8]) -> Result<Option<Observation>, RecognitionError>;
}

/// Recognize with a deadline; timeouts and errors count as a miss.
pub async fn recognize_or_miss(
    recognizer: &dyn Recognizer,
    wav: &[u8],
    timeout: Duration,
) -> Option<Observation> {
    match tokio::time::timeout(timeout, recognizer.recognize(wav)).await {
        Ok(Ok(Some(obs))) => {
            info!("recognized: {}", obs);
            Some(obs)
        }
        Ok(Ok(None)) => {
            debug!("no match");
            None
        }
        Ok(Err(e)) => {
            warn!("recognition failed: {}", e);
            None
        }
        Err(_) => {
            warn!("{}", RecognitionError::Timeout(timeout));
            None
        }
    }
}

/// AudD music recognition (https://audd.io).
#[derive(Debug)]
pub struct AuddRecognizer {
    client: Client,
    api_url: String,
    api_token: String,
}

impl AuddRecognizer {
    pub fn new(cfg: &RecognitionConfig) -> Result<Self, RecognitionError> {
        const VERSION: &str = concat!("VinylPi ", env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

        if cfg.api_token.trim().is_empty() {
            return Err(RecognitionError::NotConfigured("recognition.api_token is empty".into()));
        }
        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .default_headers(headers)
            .timeout(Duration::from_secs(cfg.timeout_seconds.max(1)))
            .build()?;

        Ok(Self {
            client,
            api_url: cfg.api_url.clone(),
            api_token: cfg.api_token.trim().to_string(),
        })
    }
}

#[async_trait]
impl Recognizer for AuddRecognizer {
    async fn recognize(&self, wav: &[u8]) -> Result<Option<Observation>, RecognitionError> {
        let file = multipart::Part::bytes(wav.to_vec())
            .file_name("sample.wav")
            .mime_str("audio/wav")?;
        let form = multipart::Form::new()
            .text("api_token", self.api_token.clone())
            .text("return", "apple_music,spotify")
            .part("file", file);

        debug!("posting {} byte sample to {}", wav.len(), self.api_url);
        let body = self
            .client
            .post(&self.api_url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_audd_response(&body)
    }
}

#[derive(Debug, Deserialize)]
struct AuddResponse {
    status: String,
    #[serde(default)]
    result: Option<AuddResult>,
    #[serde(default)]
    error: Option<AuddError>,
}

#[derive(Debug, Deserialize)]
struct AuddError {
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    error_message: String,
}

#[derive(Debug, Deserialize)]
struct AuddResult {
    artist: Option<String>,
    title: Option<String>,
    album: Option<String>,
    apple_music: Option<AppleMusic>,
    spotify: Option<Spotify>,
}

#[derive(Debug, Deserialize)]
struct AppleMusic {
    artwork: Option<Artwork>,
}

#[derive(Debug, Deserialize)]
struct Artwork {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Spotify {
    album: Option<SpotifyAlbum>,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    #[serde(default)]
    images: Vec<Artwork>,
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Apple artwork URLs are templates; ask for a 300x300 rendition.
fn cover_url(result: &AuddResult) -> Option<String> {
    let apple = result
        .apple_music
        .as_ref()
        .and_then(|a| a.artwork.as_ref())
        .and_then(|a| a.url.as_deref())
        .map(|u| u.replace("{w}x{h}", "300x300"));
    let spotify = || {
        result
            .spotify
            .as_ref()
            .and_then(|s| s.album.as_ref())
            .and_then(|a| a.images.first())
            .and_then(|i| i.url.clone())
    };
    apple.or_else(spotify)
}

pub fn parse_audd_response(body: &str) -> Result<Option<Observation>, RecognitionError> {
    let resp: AuddResponse = serde_json::from_str(body)?;
    if resp.status != "success" {
        let err = resp.error.unwrap_or(AuddError { error_code: -1, error_message: resp.status });
        return Err(RecognitionError::Api { code: err.error_code, message: err.error_message });
    }
    let Some(result) = resp.result else {
        return Ok(None);
    };

    let cover = cover_url(&result);
    let mut obs = Observation::new(
        non_blank(result.artist).unwrap_or_else(|| UNKNOWN.to_string()),
        non_blank(result.title).unwrap_or_else(|| UNKNOWN.to_string()),
    );
    obs.album = non_blank(result.album);
    obs.cover_url = cover;
    Ok(Some(obs))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow;

    #[async_trait]
    impl Recognizer for Slow {
        async fn recognize(&self, _wav: &[u8]) -> Result<Option<Observation>, RecognitionError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Some(Observation::new("late", "late")))
        }
    }

    struct Failing;

    #[async_trait]
    impl Recognizer for Failing {
        async fn recognize(&self, _wav: &[u8]) -> Result<Option<Observation>, RecognitionError> {
            Err(RecognitionError::Api { code: 901, message: "limit".into() })
        }
    }

    #[test]
    fn test_parse_match_with_apple_cover() {
        let body = r#"{"status":"success","result":{"artist":"Fleetwood Mac","title":"Dreams",
            "album":"Rumours","apple_music":{"artwork":{"url":"https://img/{w}x{h}bb.jpg"}},
            "spotify":{"album":{"images":[{"url":"https://spotify/cover.jpg"}]}}}}"#;
        let obs = parse_audd_response(body).unwrap().unwrap();
        assert_eq!(obs.artist, "Fleetwood Mac");
        assert_eq!(obs.title, "Dreams");
        assert_eq!(obs.album.as_deref(), Some("Rumours"));
        assert_eq!(obs.cover_url.as_deref(), Some("https://img/300x300bb.jpg"));
    }

    #[test]
    fn test_parse_spotify_cover_and_missing_fields() {
        let body = r#"{"status":"success","result":{"title":"Dreams","album":" ",
            "spotify":{"album":{"images":[{"url":"https://spotify/cover.jpg"}]}}}}"#;
        let obs = parse_audd_response(body).unwrap().unwrap();
        assert_eq!(obs.artist, UNKNOWN);
        assert_eq!(obs.album, None);
        assert_eq!(obs.cover_url.as_deref(), Some("https://spotify/cover.jpg"));
    }

    #[test]
    fn test_parse_no_match_and_errors() {
        assert!(parse_audd_response(r#"{"status":"success","result":null}"#).unwrap().is_none());
        let err = parse_audd_response(
            r#"{"status":"error","error":{"error_code":900,"error_message":"bad token"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, RecognitionError::Api { code: 900, .. }));
        assert!(matches!(parse_audd_response("<html>"), Err(RecognitionError::Decode(_))));
    }

    #[test]
    fn test_new_requires_token() {
        assert!(matches!(
            AuddRecognizer::new(&RecognitionConfig::default()),
            Err(RecognitionError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_timeout_and_error_are_misses() {
        assert!(recognize_or_miss(&Slow, b"RIFF", Duration::from_millis(10)).await.is_none());
        assert!(recognize_or_miss(&Failing, b"RIFF", Duration::from_secs(1)).await.is_none());
    }
}
