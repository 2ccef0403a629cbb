use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::ArchiveError;

/// Losslessly combines a video and an audio stream into one container.
#[async_trait]
pub trait Muxer: Send + Sync {
    /// Write `output` from `video` and `audio`, copying streams without re-encoding.
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), ArchiveError>;
}

/// Muxes with an `ffmpeg` executable.
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    program: String,
}

impl FfmpegMuxer {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(video: &Path, audio: &Path, output: &Path) -> Vec<std::ffi::OsString> {
        vec![
            "-y".into(),
            "-i".into(),
            video.into(),
            "-i".into(),
            audio.into(),
            "-c".into(),
            "copy".into(),
            output.into(),
        ]
    }
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), ArchiveError> {
        debug!(program = %self.program, output = %output.display(), "Merging audio and video");

        let child = Command::new(&self.program)
            .args(Self::args(video, audio, output))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ArchiveError::MuxingUnavailable {
                        tool: self.program.clone(),
                    }
                } else {
                    ArchiveError::io(&self.program, e)
                }
            })?;

        let result = child
            .wait_with_output()
            .await
            .map_err(|e| ArchiveError::io(&self.program, e))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(ArchiveError::MuxingFailed {
                tool: self.program.clone(),
                status: result.status.to_string(),
                stderr: tail.into_iter().rev().collect::<Vec<_>>().join("\n"),
            });
        }

        Ok(())
    }
}
