//! 编码会话的视频属性与编码器选项.

use bianma_codec::ThreadType;
use bianma_core::{BianmaError, BianmaResult, PixelFormat, Rational};

/// 编码线程数上限
pub const DEFAULT_MAX_THREADS: usize = 16;

/// 刷新阶段连续收到 `NeedMoreData` 的最大重试次数
pub const DEFAULT_MAX_FLUSH_RETRIES: usize = 1024;

/// 输出视频属性
///
/// 宽高与像素格式同时约束编码器和像素转换器.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoProperties {
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 帧率, 精确有理数 (如 30000/1001)
    pub frame_rate: Rational,
    /// 编码器输入像素格式
    pub pixel_format: PixelFormat,
    /// 编码器名称 (注册表查找键)
    pub codec_name: String,
}

impl VideoProperties {
    /// 创建视频属性
    pub fn new(
        width: u32,
        height: u32,
        frame_rate: Rational,
        pixel_format: PixelFormat,
        codec_name: impl Into<String>,
    ) -> Self {
        Self {
            width,
            height,
            frame_rate,
            pixel_format,
            codec_name: codec_name.into(),
        }
    }

    /// 校验属性
    pub fn validate(&self) -> BianmaResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(BianmaError::InvalidArgument(format!(
                "分辨率无效: {}x{}",
                self.width, self.height
            )));
        }
        if !self.frame_rate.is_positive() {
            return Err(BianmaError::InvalidArgument(format!(
                "帧率无效: {}",
                self.frame_rate
            )));
        }
        if self.pixel_format == PixelFormat::None {
            return Err(BianmaError::InvalidArgument("像素格式不能为 none".into()));
        }
        if self.codec_name.trim().is_empty() {
            return Err(BianmaError::InvalidArgument("编码器名称为空".into()));
        }
        Ok(())
    }

    /// 编码器时间基 (帧率的倒数)
    pub fn codec_time_base(&self) -> Rational {
        self.frame_rate.invert().reduce()
    }
}

/// 编码器选项
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderOptions {
    /// GOP 大小 (关键帧间隔)
    pub gop_size: u32,
    /// 最多连续的非参考帧数
    pub max_b_frames: u32,
    /// 编码线程数上限, 实际线程数为 min(硬件并发数, max_threads)
    pub max_threads: usize,
    /// 线程并行方式
    pub thread_type: ThreadType,
    /// 容器流时间基, None 时沿用编码器时间基
    pub stream_time_base: Option<Rational>,
    /// 刷新阶段 `NeedMoreData` 的连续重试上限
    pub max_flush_retries: usize,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            gop_size: 12,
            max_b_frames: 0,
            max_threads: DEFAULT_MAX_THREADS,
            thread_type: ThreadType::FRAME | ThreadType::SLICE,
            stream_time_base: None,
            max_flush_retries: DEFAULT_MAX_FLUSH_RETRIES,
        }
    }
}
