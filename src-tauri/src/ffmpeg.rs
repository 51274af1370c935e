use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::OnceCell;

use crate::error::{ConvertError, Result};
use crate::media::{MediaDecoder, MediaInfo, Surface};

#[cfg(target_os = "windows")]
const FFMPEG_NAME: &str = "ffmpeg.exe";
#[cfg(target_os = "windows")]
const FFPROBE_NAME: &str = "ffprobe.exe";

#[cfg(not(target_os = "windows"))]
const FFMPEG_NAME: &str = "ffmpeg";
#[cfg(not(target_os = "windows"))]
const FFPROBE_NAME: &str = "ffprobe";

fn find_binary(resource_dir: Option<&Path>, name: &str) -> PathBuf {
    // 1. Development layout: target/debug/<exe> -> src-tauri/ffmpeg/
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(target_dir) = exe_path.parent() {
            let dev_path = target_dir.join("..").join("..").join("ffmpeg").join(name);
            if dev_path.exists() {
                return dev_path.canonicalize().unwrap_or(dev_path);
            }
        }
    }

    // 2. Bundled resources
    if let Some(resource_dir) = resource_dir {
        let bundled = resource_dir.join("ffmpeg").join(name);
        if bundled.exists() {
            return bundled;
        }
    }

    // 3. System PATH
    PathBuf::from(name)
}

pub(crate) fn command(program: &Path) -> Command {
    #[allow(unused_mut)]
    let mut cmd = Command::new(program);
    #[cfg(target_os = "windows")]
    {
        cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW
    }
    cmd
}

/// Locations of the ffmpeg and ffprobe executables.
///
/// Clones share the result of the availability check.
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    verified: Arc<OnceCell<()>>,
}

impl FfmpegTools {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            verified: Arc::new(OnceCell::new()),
        }
    }

    pub fn locate(resource_dir: Option<&Path>) -> Self {
        let tools = Self::new(
            find_binary(resource_dir, FFMPEG_NAME),
            find_binary(resource_dir, FFPROBE_NAME),
        );
        tracing::info!(ffmpeg = %tools.ffmpeg.display(), ffprobe = %tools.ffprobe.display(), "located ffmpeg tools");
        tools
    }

    /// Runs `-version` on both binaries. Success is remembered; a failed
    /// check runs again on the next call.
    pub async fn available(&self) -> bool {
        self.verified.get_or_try_init(|| self.verify()).await.is_ok()
    }

    async fn verify(&self) -> std::result::Result<(), PathBuf> {
        for binary in [&self.ffmpeg, &self.ffprobe] {
            let ok = command(binary)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map(|status| status.success())
                .unwrap_or(false);
            if !ok {
                tracing::warn!(binary = %binary.display(), "ffmpeg tool is not runnable");
                return Err(binary.clone());
            }
        }
        Ok(())
    }
}

pub async fn get_video_info(ffprobe_path: &Path, input: &Path) -> Result<MediaInfo> {
    let output = command(ffprobe_path)
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=width,height,r_frame_rate,duration",
            "-show_entries", "format=duration",
            "-of", "csv=p=0",
        ])
        .arg(input)
        .output()
        .await
        .map_err(|e| ConvertError::tool("ffprobe", format!("failed to run {}: {e}", ffprobe_path.display())))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ConvertError::tool(
            "ffprobe",
            format!("exit {:?}: {}", output.status.code(), stderr.trim()),
        ));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parse `ffprobe -of csv=p=0` output: one `width,height,fps,duration` stream
/// line and one container duration line.
pub fn parse_probe_output(stdout: &str) -> Result<MediaInfo> {
    let lines: Vec<&str> = stdout.trim().lines().collect();
    if lines.is_empty() {
        return Err(ConvertError::tool("ffprobe", "no video stream found"));
    }

    let mut width = 0u32;
    let mut height = 0u32;
    let mut duration = 0.0f64;

    for line in lines {
        let parts: Vec<&str> = line.trim().split(',').collect();

        if parts.len() >= 3 {
            if let Ok(w) = parts[0].parse::<u32>() {
                width = w;
            }
            if let Ok(h) = parts[1].parse::<u32>() {
                height = h;
            }
            if parts.len() >= 4 {
                if let Ok(d) = parts[3].parse::<f64>() {
                    duration = d;
                }
            }
        }

        // Container duration wins only when the stream has none.
        if parts.len() == 1 {
            if let Ok(d) = parts[0].parse::<f64>() {
                if duration == 0.0 {
                    duration = d;
                }
            }
        }
    }

    if width == 0 || height == 0 {
        return Err(ConvertError::tool("ffprobe", "no video stream found"));
    }
    if duration <= 0.0 {
        return Err(ConvertError::tool("ffprobe", "could not determine duration"));
    }

    Ok(MediaInfo {
        width,
        height,
        duration,
    })
}

fn out_time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"out_time_us=(\d+)").expect("valid out_time regex"))
}

/// Fraction of `duration` covered by one `-progress` line, if it carries one.
pub fn parse_progress_line(line: &str, duration: f64) -> Option<f64> {
    let caps = out_time_regex().captures(line)?;
    let microseconds = caps[1].parse::<f64>().ok()?;
    if duration <= 0.0 {
        return None;
    }
    Some((microseconds / 1_000_000.0 / duration).clamp(0.0, 1.0))
}

/// Run ffmpeg, reporting progress in `0.0..=1.0`. Without a known duration only
/// the final `1.0` is reported.
pub async fn run_ffmpeg_with_progress<F: FnMut(f64) + Send>(
    ffmpeg_path: &Path,
    args: &[String],
    duration: Option<f64>,
    mut on_progress: F,
) -> Result<()> {
    tracing::debug!(ffmpeg = %ffmpeg_path.display(), ?args, "spawning ffmpeg");

    let mut cmd = command(ffmpeg_path);
    cmd.args(["-progress", "pipe:1", "-nostats", "-v", "error"])
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| ConvertError::tool("ffmpeg", format!("failed to spawn: {e}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ConvertError::tool("ffmpeg", "failed to capture stdout"))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| ConvertError::tool("ffmpeg", "failed to capture stderr"))?;

    // Drain stderr alongside stdout so a chatty encoder cannot block on a full pipe.
    let stderr_reader = async move {
        let mut text = String::new();
        let _ = stderr.read_to_string(&mut text).await;
        text
    };
    let progress_reader = async {
        let mut reader = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            if let Some(fraction) = duration.and_then(|d| parse_progress_line(&line, d)) {
                on_progress(fraction);
            }
        }
    };
    let (stderr_text, ()) = tokio::join!(stderr_reader, progress_reader);

    let status = child
        .wait()
        .await
        .map_err(|e| ConvertError::tool("ffmpeg", format!("process error: {e}")))?;

    if !status.success() {
        let message = stderr_text.trim();
        return Err(ConvertError::tool(
            "ffmpeg",
            if message.is_empty() {
                format!("exit {:?}", status.code())
            } else {
                message.to_string()
            },
        ));
    }

    on_progress(1.0);
    Ok(())
}

/// Decoder backed by ffprobe for metadata and ffmpeg single-frame extraction
/// for seeking.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    tools: FfmpegTools,
}

impl FfmpegDecoder {
    pub fn new(tools: FfmpegTools) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl MediaDecoder for FfmpegDecoder {
    async fn available(&self) -> bool {
        self.tools.available().await
    }

    async fn load(&self, source: &Path) -> Result<MediaInfo> {
        get_video_info(&self.tools.ffprobe, source)
            .await
            .map_err(|e| ConvertError::MediaLoad {
                path: source.to_path_buf(),
                message: e.to_string(),
            })
    }

    async fn capture(&self, source: &Path, at: f64, surface: &mut Surface) -> Result<()> {
        let seek = format!("{:.3}", at.max(0.0));
        let scale = format!("scale={}:{}", surface.width(), surface.height());

        let output = command(&self.tools.ffmpeg)
            .args(["-v", "error", "-ss", &seek, "-i"])
            .arg(source)
            .args([
                "-frames:v", "1",
                "-vf", &scale,
                "-f", "rawvideo",
                "-pix_fmt", "rgba",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ConvertError::tool("ffmpeg", format!("failed to run: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConvertError::tool("ffmpeg", format!("frame capture at {seek}s: {}", stderr.trim())));
        }

        // Seeking past the last decodable frame yields nothing; keep the
        // previous frame in the surface, as a video element would.
        if output.stdout.is_empty() {
            tracing::debug!(at, "no frame at seek position, reusing previous frame");
            return Ok(());
        }
        if output.stdout.len() != surface.byte_len() {
            return Err(ConvertError::tool(
                "ffmpeg",
                format!(
                    "frame at {seek}s has {} bytes, expected {}",
                    output.stdout.len(),
                    surface.byte_len()
                ),
            ));
        }

        surface.pixels_mut().copy_from_slice(&output.stdout);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_tools_are_unavailable_and_rechecked() {
        let tools = FfmpegTools::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        assert!(!tools.available().await);
        assert!(tools.verified.get().is_none());
        assert!(!tools.clone().available().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn availability_is_tracked_per_tool_set() {
        let runnable = FfmpegTools::new("true", "true");
        let missing = FfmpegTools::new("/nonexistent/ffmpeg", "true");

        assert!(runnable.available().await);
        assert!(!missing.available().await);

        let shared = runnable.clone();
        assert!(shared.verified.get().is_some());
        assert!(shared.available().await);
    }

    #[test]
    fn probe_output_with_stream_duration() {
        let info = parse_probe_output("1920,1080,30000/1001,12.345000\n12.400000\n").unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert_eq!(info.duration, 12.345);
    }

    #[test]
    fn probe_output_falls_back_to_container_duration() {
        let info = parse_probe_output("640,360,25/1,N/A\n5.000000\n").unwrap();
        assert_eq!(info.duration, 5.0);
    }

    #[test]
    fn probe_output_without_video_is_an_error() {
        assert!(parse_probe_output("").is_err());
        assert!(parse_probe_output("3.5\n").is_err());
    }

    #[test]
    fn progress_lines_become_fractions() {
        assert_eq!(parse_progress_line("out_time_us=2500000", 10.0), Some(0.25));
        assert_eq!(parse_progress_line("out_time_us=99000000", 10.0), Some(1.0));
        assert_eq!(parse_progress_line("speed=1.2x", 10.0), None);
        assert_eq!(parse_progress_line("out_time_us=100", 0.0), None);
    }
}
