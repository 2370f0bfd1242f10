//! Serial number recognition through an external engine
//!
//! The engine only ever sees binarized images. Its raw output is reduced to
//! the characters a serial can contain and uppercased; an empty result means
//! no suggestion and the technician types the serial by hand.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use image::RgbaImage;
use thiserror::Error;
use tokio::process::Command;

use super::{ImagingError, binarize, encode_png};

/// Placeholder in configured arguments replaced by the image path
pub const IMAGE_PLACEHOLDER: &str = "{image}";

/// Text read by the engine plus its confidence
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub text: String,
    pub confidence: f32,
}

#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("recognition engine unavailable: {0}")]
    Unavailable(String),

    #[error("recognition failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Imaging(#[from] ImagingError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Image in, text and confidence out
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Recognize text in a PNG-encoded image
    async fn recognize(&self, png: &[u8]) -> Result<Recognition, RecognitionError>;
}

/// Keep `[A-Za-z0-9-/]` only, uppercased
pub fn post_filter(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '/')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Binarize, recognize and filter a photo of a serial plate
///
/// Returns `None` when nothing usable was read.
pub async fn recognize_serial(
    recognizer: &dyn Recognizer,
    image: &RgbaImage,
) -> Result<Option<Recognition>, RecognitionError> {
    let png = encode_png(&binarize(image))?;
    let raw = recognizer.recognize(&png).await?;

    let text = post_filter(&raw.text);
    log::debug!(
        "Recognized '{}' -> '{}' (confidence {:.2})",
        raw.text.trim(),
        text,
        raw.confidence
    );

    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(Recognition {
        text,
        confidence: raw.confidence,
    }))
}

/// Runs a configured program on the image file
///
/// The first stdout line is the text, an optional second line the
/// confidence (0 when missing or unparseable).
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    command: String,
    args: Vec<String>,
}

impl CommandRecognizer {
    /// `args` may contain `{image}`; without it the path is appended last
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        CommandRecognizer {
            command: command.into(),
            args,
        }
    }

    fn arguments(&self, image: &str) -> Vec<String> {
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(IMAGE_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(IMAGE_PLACEHOLDER, image)
                } else {
                    arg.clone()
                }
            })
            .collect();
        if !substituted {
            args.push(image.to_string());
        }
        args
    }

    fn scratch_path() -> PathBuf {
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        std::env::temp_dir().join(format!("inventory-ocr-{}-{}.png", std::process::id(), nanos))
    }

    async fn run(&self, path: &str) -> Result<Recognition, RecognitionError> {
        let output = Command::new(&self.command)
            .args(self.arguments(path))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| RecognitionError::Unavailable(format!("{}: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionError::Failed(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(parse_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn parse_output(stdout: &str) -> Recognition {
    let mut lines = stdout.lines();
    let text = lines.next().unwrap_or_default().trim().to_string();
    let confidence = lines
        .next()
        .and_then(|line| line.trim().parse::<f32>().ok())
        .unwrap_or(0.0);
    Recognition { text, confidence }
}

#[async_trait]
impl Recognizer for CommandRecognizer {
    async fn recognize(&self, png: &[u8]) -> Result<Recognition, RecognitionError> {
        let path = Self::scratch_path();
        tokio::fs::write(&path, png).await?;

        let result = self.run(&path.to_string_lossy()).await;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            log::debug!("Could not remove {}: {}", path.display(), e);
        }
        result
    }
}
