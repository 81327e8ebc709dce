//! FfmpegHls - adaptive-bitrate HLS generation via the external engine.
//!
//! One engine invocation produces the whole ladder: the source video is
//! split and scaled into one stream per rendition, re-encoded alongside a
//! single shared audio track, segmented, and written out as one
//! sub-playlist per rendition plus the master manifest.

use coursecast_core::config::Rendition;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Filename of the master manifest the engine writes into the output dir.
pub const MASTER_PLAYLIST: &str = "master.m3u8";

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Failed to spawn transcoding engine: {0}")]
    Spawn(String),

    #[error("Transcoding engine exited with status {code:?}: {stderr}")]
    Nonzero { code: Option<i32>, stderr: String },
}

pub struct FfmpegHls {
    program: String,
    segment_duration: u64,
    renditions: Vec<Rendition>,
}

impl FfmpegHls {
    pub fn new(program: String, segment_duration: u64, renditions: Vec<Rendition>) -> Self {
        Self {
            program,
            segment_duration,
            renditions,
        }
    }

    /// Build the fixed, versioned argument template for one transcode run.
    fn build_args(&self, input_path: &Path, output_dir: &Path) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
        ];

        // Split the video into one scaled stream per rendition.
        let mut filter = format!("[0:v]split={}", self.renditions.len());
        for index in 0..self.renditions.len() {
            filter.push_str(&format!("[v{}]", index));
        }
        for (index, rendition) in self.renditions.iter().enumerate() {
            filter.push_str(&format!(
                ";[v{}]scale=w={}:h={}[v{}out]",
                index, rendition.width, rendition.height, index
            ));
        }
        args.extend_from_slice(&["-filter_complex".to_string(), filter]);

        for (index, rendition) in self.renditions.iter().enumerate() {
            let bitrate = rendition.video_bitrate_kbps;
            args.extend_from_slice(&[
                "-map".to_string(),
                format!("[v{}out]", index),
                format!("-c:v:{}", index),
                "libx264".to_string(),
                format!("-b:v:{}", index),
                format!("{}k", bitrate),
                format!("-maxrate:v:{}", index),
                format!("{}k", (bitrate as f32 * 1.2) as u32),
                format!("-bufsize:v:{}", index),
                format!("{}k", bitrate * 2),
            ]);
        }

        // One shared audio track for all renditions.
        args.extend_from_slice(&[
            "-map".to_string(),
            "a:0".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "128k".to_string(),
            "-ac".to_string(),
            "2".to_string(),
            "-ar".to_string(),
            "48000".to_string(),
        ]);

        // Variant stream map associating each video rendition with the
        // shared audio group.
        let mut stream_map: Vec<String> = self
            .renditions
            .iter()
            .enumerate()
            .map(|(index, rendition)| format!("v:{},agroup:audio,name:{}", index, rendition.name))
            .collect();
        stream_map.push("a:0,agroup:audio,name:audio,default:yes".to_string());

        args.extend_from_slice(&[
            "-f".to_string(),
            "hls".to_string(),
            "-hls_time".to_string(),
            self.segment_duration.to_string(),
            "-hls_playlist_type".to_string(),
            "vod".to_string(),
            "-hls_segment_filename".to_string(),
            output_dir
                .join("%v/segment_%03d.ts")
                .to_string_lossy()
                .to_string(),
            "-master_pl_name".to_string(),
            MASTER_PLAYLIST.to_string(),
            "-var_stream_map".to_string(),
            stream_map.join(" "),
            output_dir.join("%v/index.m3u8").to_string_lossy().to_string(),
        ]);

        args
    }

    /// Run the engine. Success is exit code 0; the master manifest path is
    /// returned for the caller to verify and publish. Engine stderr is
    /// forwarded to the host logs either way.
    pub async fn run(&self, input_path: &Path, output_dir: &Path) -> Result<PathBuf, EncodeError> {
        let args = self.build_args(input_path, output_dir);

        tracing::debug!(
            program = %self.program,
            input = %input_path.display(),
            output_dir = %output_dir.display(),
            "Invoking transcoding engine"
        );

        let output = Command::new(&self.program)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| EncodeError::Spawn(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            tracing::debug!(engine_stdout = %stdout.trim(), "Transcoding engine stdout");
        }
        if !stderr.trim().is_empty() {
            tracing::debug!(engine_stderr = %stderr.trim(), "Transcoding engine stderr");
        }

        if !output.status.success() {
            return Err(EncodeError::Nonzero {
                code: output.status.code(),
                stderr: truncate(&stderr, 2000),
            });
        }

        Ok(output_dir.join(MASTER_PLAYLIST))
    }
}

fn truncate(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= max {
        trimmed.to_string()
    } else {
        let mut end = max;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}
