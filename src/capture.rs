/*
 *  capture.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Audio sample capture
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

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use log::{debug, warn};
use thiserror::Error;
use tokio::process::Command;

use crate::config::AudioConfig;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("recorder exited with {status}: {stderr}")]
    Recorder { status: String, stderr: String },
    #[error("captured data is not a WAV file ({0} bytes)")]
    NotWav(usize),
}

/// Something that yields one WAV-encoded audio sample per call.
#[async_trait]
pub trait AudioSource: Send + Sync {
    async fn capture(&self) -> Result<Vec<u8>, CaptureError>;
}

fn check_wav(bytes: Vec<u8>) -> Result<Vec<u8>, CaptureError> {
    if bytes.len() < 44 || &bytes[..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(CaptureError::NotWav(bytes.len()));
    }
    Ok(bytes)
}

/// Records from an ALSA device through `arecord`.
#[derive(Debug, Clone)]
pub struct ArecordSource {
    cfg: AudioConfig,
}

impl ArecordSource {
    pub fn new(cfg: AudioConfig) -> Self {
        Self { cfg }
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            "-q".into(),
            "-D".into(),
            self.cfg.device.clone(),
            "-f".into(),
            "S16_LE".into(),
            "-r".into(),
            self.cfg.sample_rate.to_string(),
            "-c".into(),
            self.cfg.channels.to_string(),
            "-d".into(),
            self.cfg.sample_seconds.max(1).to_string(),
            "-t".into(),
            "wav".into(),
            "-".into(),
        ]
    }
}

#[async_trait]
impl AudioSource for ArecordSource {
    async fn capture(&self) -> Result<Vec<u8>, CaptureError> {
        debug!("recording {}s from '{}'", self.cfg.sample_seconds, self.cfg.device);
        let output = Command::new("arecord")
            .args(self.args())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;
        if !output.status.success() {
            return Err(CaptureError::Recorder {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let wav = check_wav(output.stdout)?;

        if let Some(path) = &self.cfg.output_wav {
            if let Err(e) = tokio::fs::write(path, &wav).await {
                warn!("could not save debug WAV to {}: {}", path.display(), e);
            } else {
                debug!("debug WAV saved to {}", path.display());
            }
        }
        Ok(wav)
    }
}

/// Replays a WAV file from disk on every capture.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AudioSource for FileSource {
    async fn capture(&self) -> Result<Vec<u8>, CaptureError> {
        check_wav(tokio::fs::read(&self.path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_header() -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(b"RIFF");
        b.extend_from_slice(&36u32.to_le_bytes());
        b.extend_from_slice(b"WAVE");
        b.resize(44, 0);
        b
    }

    #[test]
    fn test_arecord_args() {
        let src = ArecordSource::new(AudioConfig { device: "hw:1,0".into(), ..AudioConfig::default() });
        let args = src.args().join(" ");
        assert_eq!(args, "-q -D hw:1,0 -f S16_LE -r 44100 -c 1 -d 10 -t wav -");
    }

    #[test]
    fn test_check_wav() {
        assert!(check_wav(wav_header()).is_ok());
        assert!(matches!(check_wav(b"RIFF".to_vec()), Err(CaptureError::NotWav(4))));
        let mut bad = wav_header();
        bad[8..12].copy_from_slice(b"AVI ");
        assert!(check_wav(bad).is_err());
    }

    #[tokio::test]
    async fn test_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.wav");
        std::fs::write(&path, wav_header()).unwrap();
        assert_eq!(FileSource::new(&path).capture().await.unwrap().len(), 44);
        assert!(FileSource::new(dir.path().join("missing.wav")).capture().await.is_err());
    }
}
