//! Argument construction for ffmpeg.

use std::path::{Path, PathBuf};

use super::config::TranscoderConfig;
use crate::job::{OutputSettings, ProcessingMode};

/// Hardware H.264 encoder substituted in GPU mode.
pub const NVENC_H264: &str = "h264_nvenc";
/// Hardware H.265 encoder substituted in GPU mode.
pub const NVENC_HEVC: &str = "hevc_nvenc";

/// A fully built ffmpeg invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Codec actually passed to `-c:v`; may differ from the job's requested codec.
    pub effective_video_codec: String,
}

impl TranscodeCommand {
    /// Shell-ish rendering for logs.
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.display().to_string());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Returns the hardware encoder for a software codec name, if any.
///
/// Matching is case-insensitive; the CPU preset check uses the same rule.
pub fn hardware_codec(codec: &str) -> Option<&'static str> {
    let codec = codec.to_ascii_lowercase();
    if codec.contains("264") {
        Some(NVENC_H264)
    } else if codec.contains("265") || codec.contains("hevc") {
        Some(NVENC_HEVC)
    } else {
        None
    }
}

/// Translates `WxH` into ffmpeg's `scale=W:H`. Malformed values yield `None`.
fn scale_filter(resolution: &str) -> Option<String> {
    let (w, h) = resolution.trim().split_once(['x', 'X'])?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    if w == 0 || h == 0 {
        return None;
    }
    Some(format!("scale={}:{}", w, h))
}

/// Builds ffmpeg invocations from job output settings.
///
/// Building is pure: it never fails and never validates codec names. Optional
/// settings that are unset or malformed are left out and ffmpeg reports
/// anything else it does not accept.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    ffmpeg_path: PathBuf,
    log_level: Option<String>,
    extra_args: Vec<String>,
}

impl CommandBuilder {
    pub fn new(config: &TranscoderConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            log_level: config.ffmpeg_log_level.clone(),
            extra_args: config.extra_args.clone(),
        }
    }

    pub fn build(&self, input: &Path, output: &Path, settings: &OutputSettings) -> TranscodeCommand {
        let mut args: Vec<String> = Vec::new();

        // Processing mode is only consulted here.
        let effective_video_codec = match settings.processing_mode {
            ProcessingMode::Gpu => {
                args.extend(["-hwaccel".to_string(), "cuda".to_string()]);
                match hardware_codec(&settings.video_codec) {
                    Some(hw) => {
                        args.extend(["-hwaccel_output_format".to_string(), "cuda".to_string()]);
                        hw.to_string()
                    }
                    None => settings.video_codec.clone(),
                }
            }
            ProcessingMode::Cpu => settings.video_codec.clone(),
        };

        args.push("-i".to_string());
        args.push(input.to_string_lossy().to_string());

        args.push("-c:v".to_string());
        args.push(effective_video_codec.clone());
        args.push("-b:v".to_string());
        args.push(settings.video_bitrate.clone());

        if let Some(filter) = settings.resolution.as_deref().and_then(scale_filter) {
            args.push("-vf".to_string());
            args.push(filter);
        }

        if let Some(fps) = settings.frame_rate.filter(|fps| *fps > 0) {
            args.push("-r".to_string());
            args.push(fps.to_string());
        }

        args.push("-c:a".to_string());
        args.push(settings.audio_codec.clone());
        args.push("-b:a".to_string());
        args.push(settings.audio_bitrate.clone());

        if settings.processing_mode == ProcessingMode::Cpu {
            if hardware_codec(&settings.video_codec).is_some() {
                args.push("-preset".to_string());
                args.push(settings.quality_preset.as_str().to_string());
            }
            if let Some(threads) = settings.threads.filter(|t| *t > 0) {
                args.push("-threads".to_string());
                args.push(threads.to_string());
            }
        }

        args.push("-f".to_string());
        args.push(settings.output_format.clone());

        if let Some(ref level) = self.log_level {
            args.push("-loglevel".to_string());
            args.push(level.clone());
        }

        args.extend(self.extra_args.iter().cloned());

        // Progress goes to stdout, diagnostics stay on stderr.
        args.push("-progress".to_string());
        args.push("pipe:1".to_string());
        args.push("-y".to_string());
        args.push(output.to_string_lossy().to_string());

        TranscodeCommand {
            program: self.ffmpeg_path.clone(),
            args,
            effective_video_codec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::QualityPreset;

    fn builder() -> CommandBuilder {
        CommandBuilder::new(&TranscoderConfig::default())
    }

    fn build(settings: &OutputSettings) -> TranscodeCommand {
        builder().build(Path::new("/in/source.mov"), Path::new("/out/result.mp4"), settings)
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(|s| s.as_str())
    }

    #[test]
    fn test_default_cpu_command() {
        let cmd = build(&OutputSettings::default());
        assert_eq!(cmd.program, PathBuf::from("ffmpeg"));
        assert_eq!(
            cmd.args,
            vec![
                "-i",
                "/in/source.mov",
                "-c:v",
                "libx264",
                "-b:v",
                "1500k",
                "-c:a",
                "aac",
                "-b:a",
                "128k",
                "-preset",
                "medium",
                "-f",
                "mp4",
                "-progress",
                "pipe:1",
                "-y",
                "/out/result.mp4",
            ]
        );
        assert_eq!(cmd.effective_video_codec, "libx264");
    }

    #[test]
    fn test_gpu_substitutes_h264() {
        let settings = OutputSettings {
            processing_mode: ProcessingMode::Gpu,
            ..Default::default()
        };
        let cmd = build(&settings);

        assert_eq!(value_after(&cmd.args, "-hwaccel"), Some("cuda"));
        assert_eq!(value_after(&cmd.args, "-hwaccel_output_format"), Some("cuda"));
        assert_eq!(value_after(&cmd.args, "-c:v"), Some("h264_nvenc"));
        assert!(!cmd.args.iter().any(|a| a == "libx264"));
        assert!(!cmd.args.iter().any(|a| a == "-preset"));

        let hw = cmd.args.iter().position(|a| a == "-hwaccel").unwrap();
        let codec = cmd.args.iter().position(|a| a == "-c:v").unwrap();
        assert!(hw < codec);

        // The requested codec is left untouched.
        assert_eq!(settings.video_codec, "libx264");
    }

    #[test]
    fn test_gpu_substitutes_hevc() {
        for codec in ["libx265", "hevc"] {
            let settings = OutputSettings {
                video_codec: codec.to_string(),
                processing_mode: ProcessingMode::Gpu,
                ..Default::default()
            };
            let cmd = build(&settings);
            assert_eq!(value_after(&cmd.args, "-c:v"), Some("hevc_nvenc"));
            assert_eq!(cmd.effective_video_codec, "hevc_nvenc");
        }
    }

    #[test]
    fn test_gpu_passes_other_codecs_through() {
        let settings = OutputSettings {
            video_codec: "libvpx-vp9".to_string(),
            processing_mode: ProcessingMode::Gpu,
            ..Default::default()
        };
        let cmd = build(&settings);
        assert_eq!(value_after(&cmd.args, "-c:v"), Some("libvpx-vp9"));
        assert!(!cmd.args.iter().any(|a| a == "-hwaccel_output_format"));
    }

    #[test]
    fn test_cpu_preset_only_for_x264_x265() {
        let x265 = OutputSettings {
            video_codec: "libx265".to_string(),
            quality_preset: QualityPreset::Slow,
            ..Default::default()
        };
        assert_eq!(value_after(&build(&x265).args, "-preset"), Some("slow"));

        let vp9 = OutputSettings {
            video_codec: "libvpx-vp9".to_string(),
            ..Default::default()
        };
        assert!(!build(&vp9).args.iter().any(|a| a == "-preset"));
    }

    #[test]
    fn test_cpu_preset_ignores_codec_case() {
        for codec in ["LIBX264", "libX265", "HEVC"] {
            let settings = OutputSettings {
                video_codec: codec.to_string(),
                ..Default::default()
            };
            assert_eq!(
                value_after(&build(&settings).args, "-preset"),
                Some("medium"),
                "{}",
                codec
            );
        }
    }

    #[test]
    fn test_resolution_and_frame_rate() {
        let settings = OutputSettings {
            resolution: Some("1280x720".to_string()),
            frame_rate: Some(30),
            ..Default::default()
        };
        let cmd = build(&settings);
        assert_eq!(value_after(&cmd.args, "-vf"), Some("scale=1280:720"));
        assert_eq!(value_after(&cmd.args, "-r"), Some("30"));
    }

    #[test]
    fn test_malformed_optionals_are_omitted() {
        let settings = OutputSettings {
            resolution: Some("hd".to_string()),
            frame_rate: Some(0),
            threads: Some(0),
            ..Default::default()
        };
        let cmd = build(&settings);
        assert!(!cmd.args.iter().any(|a| a == "-vf"));
        assert!(!cmd.args.iter().any(|a| a == "-r"));
        assert!(!cmd.args.iter().any(|a| a == "-threads"));
    }

    #[test]
    fn test_threads_cpu_only() {
        let cpu = OutputSettings {
            threads: Some(4),
            ..Default::default()
        };
        assert_eq!(value_after(&build(&cpu).args, "-threads"), Some("4"));

        let gpu = OutputSettings {
            threads: Some(4),
            processing_mode: ProcessingMode::Gpu,
            ..Default::default()
        };
        assert!(!build(&gpu).args.iter().any(|a| a == "-threads"));
    }

    #[test]
    fn test_log_level_and_extra_args_before_progress_sink() {
        let mut config = TranscoderConfig::default().with_log_level("error");
        config.extra_args = vec!["-movflags".to_string(), "+faststart".to_string()];
        let cmd = CommandBuilder::new(&config).build(
            Path::new("in.mkv"),
            Path::new("out.mp4"),
            &OutputSettings::default(),
        );

        assert_eq!(value_after(&cmd.args, "-loglevel"), Some("error"));
        let extra = cmd.args.iter().position(|a| a == "-movflags").unwrap();
        let progress = cmd.args.iter().position(|a| a == "-progress").unwrap();
        assert!(extra < progress);
        assert_eq!(cmd.args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let settings = OutputSettings {
            resolution: Some("640x360".to_string()),
            ..Default::default()
        };
        assert_eq!(build(&settings), build(&settings));
    }
}
