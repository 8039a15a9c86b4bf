//! JSON 编码任务配置.
//!
//! ```json
//! {
//!     "output": "out.avi",
//!     "width": 1280,
//!     "height": 720,
//!     "frame_rate": "30000/1001",
//!     "pixel_format": "yuv420p",
//!     "source_format": "rgb24",
//!     "codec": "vdelta",
//!     "frames": 120
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result, bail};
use bianma_core::{PixelFormat, Rational};
use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;
use crate::pipeline::{EncoderOptions, VideoProperties};

/// 编码任务配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EncodeConfig {
    /// 输出路径, 扩展名决定容器格式
    #[serde(default)]
    pub output: Option<String>,
    pub width: u32,
    pub height: u32,
    /// 帧率, "30" 或 "30000/1001"
    #[serde(default = "default_frame_rate")]
    pub frame_rate: String,
    /// 编码器输入像素格式
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,
    /// 调用方提供的原始帧像素格式
    #[serde(default = "default_source_format")]
    pub source_format: String,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_frames")]
    pub frames: u64,
    #[serde(default = "default_gop_size")]
    pub gop_size: u32,
    #[serde(default)]
    pub max_b_frames: u32,
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
    /// 容器流时间基, 缺省时沿用编码器时间基
    #[serde(default)]
    pub stream_time_base: Option<String>,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

impl Default for EncodeConfig {
    /// 1280x720 @ 30 fps, rgb24 图案编码为 yuv420p vdelta
    fn default() -> Self {
        Self {
            output: None,
            width: 1280,
            height: 720,
            frame_rate: default_frame_rate(),
            pixel_format: default_pixel_format(),
            source_format: default_source_format(),
            codec: default_codec(),
            frames: default_frames(),
            gop_size: default_gop_size(),
            max_b_frames: 0,
            max_threads: default_max_threads(),
            stream_time_base: None,
            logging: None,
        }
    }
}

fn default_frame_rate() -> String {
    "30".to_string()
}

fn default_pixel_format() -> String {
    "yuv420p".to_string()
}

fn default_source_format() -> String {
    "rgb24".to_string()
}

fn default_codec() -> String {
    "vdelta".to_string()
}

fn default_frames() -> u64 {
    30
}

fn default_gop_size() -> u32 {
    12
}

fn default_max_threads() -> usize {
    crate::pipeline::properties::DEFAULT_MAX_THREADS
}

impl EncodeConfig {
    /// 从 JSON 文件加载
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败, path={}", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("解析配置文件失败, path={}", path.display()))
    }

    /// 从 JSON 字符串加载
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("配置 JSON 格式错误")?;
        if config.width == 0 || config.height == 0 {
            bail!("分辨率无效: {}x{}", config.width, config.height);
        }
        Ok(config)
    }

    /// 转换为视频属性
    pub fn video_properties(&self) -> Result<VideoProperties> {
        let frame_rate: Rational = self
            .frame_rate
            .parse()
            .with_context(|| format!("帧率无效: {}", self.frame_rate))?;
        let pixel_format: PixelFormat = self
            .pixel_format
            .parse()
            .with_context(|| format!("像素格式无效: {}", self.pixel_format))?;
        Ok(VideoProperties::new(
            self.width,
            self.height,
            frame_rate,
            pixel_format,
            self.codec.clone(),
        ))
    }

    /// 转换为编码器选项
    pub fn encoder_options(&self) -> Result<EncoderOptions> {
        let stream_time_base = match &self.stream_time_base {
            Some(tb) => Some(
                tb.parse::<Rational>()
                    .with_context(|| format!("流时间基无效: {tb}"))?,
            ),
            None => None,
        };
        Ok(EncoderOptions {
            gop_size: self.gop_size,
            max_b_frames: self.max_b_frames,
            max_threads: self.max_threads,
            stream_time_base,
            ..EncoderOptions::default()
        })
    }

    /// 原始帧像素格式
    pub fn source_pixel_format(&self) -> Result<PixelFormat> {
        self.source_format
            .parse()
            .with_context(|| format!("源像素格式无效: {}", self.source_format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_解析最小配置() {
        let config = EncodeConfig::from_json_str(r#"{"width": 64, "height": 32}"#).unwrap();
        assert_eq!(config.codec, "vdelta");
        assert_eq!(config.frames, 30);
        let props = config.video_properties().unwrap();
        assert_eq!(props.frame_rate, Rational::new(30, 1));
        assert_eq!(props.pixel_format, PixelFormat::Yuv420p);
        assert_eq!(config.source_pixel_format().unwrap(), PixelFormat::Rgb24);
        let opts = config.encoder_options().unwrap();
        assert_eq!(opts.gop_size, 12);
        assert!(opts.stream_time_base.is_none());
    }

    #[test]
    fn test_解析完整配置() {
        let json = r#"{
            "output": "out.avi",
            "width": 1280,
            "height": 720,
            "frame_rate": "30000/1001",
            "pixel_format": "nv12",
            "source_format": "bgra",
            "codec": "rawvideo",
            "frames": 4,
            "gop_size": 5,
            "max_b_frames": 2,
            "max_threads": 4,
            "stream_time_base": "1/90000"
        }"#;
        let config = EncodeConfig::from_json_str(json).unwrap();
        let props = config.video_properties().unwrap();
        assert_eq!(props.frame_rate, Rational::new(30000, 1001));
        assert_eq!(props.pixel_format, PixelFormat::Nv12);
        assert_eq!(props.codec_name, "rawvideo");
        let opts = config.encoder_options().unwrap();
        assert_eq!(opts.max_b_frames, 2);
        assert_eq!(opts.max_threads, 4);
        assert_eq!(opts.stream_time_base, Some(Rational::new(1, 90000)));
        assert_eq!(config.source_pixel_format().unwrap(), PixelFormat::Bgra);
    }

    #[test]
    fn test_非法配置() {
        assert!(EncodeConfig::from_json_str(r#"{"width": 0, "height": 32}"#).is_err());
        assert!(EncodeConfig::from_json_str("{").is_err());
        let config =
            EncodeConfig::from_json_str(r#"{"width": 8, "height": 8, "pixel_format": "yuv9"}"#)
                .unwrap();
        assert!(config.video_properties().is_err());
    }

    #[test]
    fn test_从文件加载() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        std::fs::write(&path, r#"{"width": 16, "height": 16, "frames": 2}"#).unwrap();
        let config = EncodeConfig::from_json_file(&path).unwrap();
        assert_eq!(config.frames, 2);
        assert!(EncodeConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
