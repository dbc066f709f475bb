//! Tool version and hardware encoder detection.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::command::{NVENC_H264, NVENC_HEVC};
use super::config::TranscoderConfig;

/// What the installed ffmpeg toolchain offers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolchainInfo {
    /// `None` when ffmpeg is missing or unrecognised.
    pub ffmpeg_version: Option<String>,
    pub ffprobe_version: Option<String>,
    /// ffmpeg lists the NVENC H.264 encoder.
    pub h264_nvenc: bool,
    /// ffmpeg lists the NVENC HEVC encoder.
    pub hevc_nvenc: bool,
}

impl ToolchainInfo {
    /// Probes both binaries. Missing tools are reported, not raised.
    pub async fn detect(config: &TranscoderConfig) -> Self {
        let ffmpeg_version = tool_version(&config.ffmpeg_path, "ffmpeg").await;
        let ffprobe_version = tool_version(&config.ffprobe_path, "ffprobe").await;

        let encoders = run_stdout(&config.ffmpeg_path, &["-hide_banner", "-encoders"])
            .await
            .unwrap_or_default();

        Self {
            ffmpeg_version,
            ffprobe_version,
            h264_nvenc: encoders.contains(NVENC_H264),
            hevc_nvenc: encoders.contains(NVENC_HEVC),
        }
    }

    /// Whether GPU mode has a hardware encoder to substitute.
    pub fn gpu_available(&self) -> bool {
        self.h264_nvenc || self.hevc_nvenc
    }
}

async fn run_stdout(program: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).to_string())
}

async fn tool_version(program: &Path, tool: &str) -> Option<String> {
    let stdout = run_stdout(program, &["-version"]).await?;
    parse_version(&stdout, tool)
}

/// Extracts `<x>` from a first line of the form `<tool> version <x> ...`.
pub fn parse_version(output: &str, tool: &str) -> Option<String> {
    let first_line = output.lines().next()?;
    let re = Regex::new(&format!(r"^{}\s+version\s+(\S+)", regex_lite::escape(tool))).ok()?;
    re.captures(first_line.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
