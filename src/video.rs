//! Step-reveal video encoding
//!
//! Frames are packed RGB24 rasters piped into an external `ffmpeg` process
//! (`-f rawvideo`), encoded as H.264 / yuv420p MP4. Encoding is blocking
//! and is not retried.

use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::compositing::ToneMap;
use crate::error::RenderError;

pub trait VideoEncoder: Send + Sync {
    /// Encode `frames` in order, each shown for `1 / fps` seconds
    fn encode(&self, frames: &[ToneMap], fps: u32, output: &Path) -> Result<(), RenderError>;
}

#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    bin: String,
}

impl FfmpegEncoder {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn encode(&self, frames: &[ToneMap], fps: u32, output: &Path) -> Result<(), RenderError> {
        let first = frames
            .first()
            .ok_or_else(|| RenderError::Encoder("no frames to encode".to_string()))?;
        let (width, height) = first.dimensions();
        if let Some(frame) = frames.iter().find(|f| f.dimensions() != (width, height)) {
            return Err(RenderError::Encoder(format!(
                "frame size mismatch: expected {}x{}, got {:?}",
                width,
                height,
                frame.dimensions()
            )));
        }

        let mut command = Command::new(&self.bin);
        command
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-s:v")
            .arg(format!("{}x{}", width, height))
            .arg("-r")
            .arg(fps.max(1).to_string())
            .arg("-i")
            .arg("-")
            .arg("-an")
            .arg("-c:v")
            .arg("libx264")
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg("-movflags")
            .arg("+faststart")
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                RenderError::Encoder(format!("'{}' was not found on PATH", self.bin))
            } else {
                RenderError::Encoder(format!("failed to spawn '{}': {}", self.bin, error))
            }
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RenderError::Encoder("failed to capture encoder stdin".to_string()))?;
        let written = frames
            .iter()
            .try_for_each(|frame| stdin.write_all(&frame.to_rgb_bytes()))
            .and_then(|()| stdin.flush());
        // close the pipe so the encoder sees EOF before we reap it
        drop(stdin);

        let result = child.wait_with_output()?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            warn!("{} exited with {}: {}", self.bin, result.status, stderr.trim());
            return Err(RenderError::Encoder(format!(
                "encoder exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }
        written?;

        debug!("Encoded {} frames to {}", frames.len(), output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositing::GlyphBitmap;

    #[test]
    fn test_missing_encoder_binary() {
        let encoder = FfmpegEncoder::new("kasane-test-no-such-encoder");
        let frames = vec![GlyphBitmap::blank(4, 4).to_silhouette()];
        let err = encoder
            .encode(&frames, 1, Path::new("unused.mp4"))
            .unwrap_err();
        assert!(matches!(err, RenderError::Encoder(msg) if msg.contains("not found")));
    }

    #[test]
    fn test_rejects_empty_and_mixed_frames() {
        let encoder = FfmpegEncoder::default();
        assert!(encoder.encode(&[], 1, Path::new("unused.mp4")).is_err());
        let mixed = vec![
            GlyphBitmap::blank(4, 4).to_silhouette(),
            GlyphBitmap::blank(2, 2).to_silhouette(),
        ];
        assert!(encoder.encode(&mixed, 1, Path::new("unused.mp4")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_early_encoder_exit_reports_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("ffmpeg.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\necho \"Unknown encoder 'libx264'\" >&2\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        // large enough that the pipe fills after the encoder has gone
        let frames = vec![GlyphBitmap::blank(1024, 1024).to_silhouette(); 3];
        let encoder = FfmpegEncoder::new(script.display().to_string());
        let err = encoder
            .encode(&frames, 1, &dir.path().join("out.mp4"))
            .unwrap_err();
        assert!(
            matches!(&err, RenderError::Encoder(msg) if msg.contains("Unknown encoder 'libx264'")),
            "unexpected error: {}",
            err
        );
    }
}
