//! 编码器 trait 与编码器配置.
//!
//! 所有编码器实现必须实现 `Encoder` trait.

use bianma_core::{BianmaError, BianmaResult, PixelFormat, Rational};
use bitflags::bitflags;

use crate::codec_id::CodecId;
use crate::codec_parameters::{CodecParameters, VideoCodecParams};
use crate::frame::VideoFrame;
use crate::packet::Packet;

bitflags! {
    /// 编码器线程并行方式, 对标 `FF_THREAD_FRAME | FF_THREAD_SLICE`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ThreadType: u32 {
        /// 帧级并行: 同时编码多帧, 代价是若干帧的编码延迟
        const FRAME = 1;
        /// 片级并行: 单帧内部并行, 不增加延迟
        const SLICE = 1 << 1;
    }
}

/// 编码器配置
///
/// 对标打开 `AVCodecContext` 前设置的字段.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 编码器输入像素格式
    pub pixel_format: PixelFormat,
    /// 帧率
    pub frame_rate: Rational,
    /// 编码器时间基, 默认为帧率的倒数
    pub time_base: Rational,
    /// GOP 大小 (关键帧间隔)
    pub gop_size: u32,
    /// 最多连续的非参考帧数
    pub max_b_frames: u32,
    /// 编码线程数
    pub thread_count: usize,
    /// 线程并行方式
    pub thread_type: ThreadType,
    /// 目标码率 (bits/s), 0 表示不限制
    pub bit_rate: u64,
}

impl EncoderConfig {
    /// 创建默认配置: GOP 12, 无非参考帧, 单线程
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat, frame_rate: Rational) -> Self {
        Self {
            width,
            height,
            pixel_format,
            frame_rate,
            time_base: frame_rate.invert().reduce(),
            gop_size: 12,
            max_b_frames: 0,
            thread_count: 1,
            thread_type: ThreadType::empty(),
            bit_rate: 0,
        }
    }

    /// 校验配置
    pub fn validate(&self) -> BianmaResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(BianmaError::InvalidArgument("宽度和高度不能为 0".into()));
        }
        if self.pixel_format == PixelFormat::None {
            return Err(BianmaError::InvalidArgument("像素格式不能为 None".into()));
        }
        if !self.frame_rate.is_positive() {
            return Err(BianmaError::InvalidArgument(format!(
                "无效帧率: {}",
                self.frame_rate
            )));
        }
        if !self.time_base.is_positive() {
            return Err(BianmaError::InvalidArgument(format!(
                "无效时间基: {}",
                self.time_base
            )));
        }
        if self.gop_size == 0 {
            return Err(BianmaError::InvalidArgument("GOP 大小不能为 0".into()));
        }
        Ok(())
    }

    /// 由配置生成视频参数
    pub fn video_params(&self, video_delay: u32) -> VideoCodecParams {
        VideoCodecParams {
            width: self.width,
            height: self.height,
            pixel_format: self.pixel_format,
            frame_rate: self.frame_rate,
            sample_aspect_ratio: Rational::new(1, 1),
            video_delay,
        }
    }

    /// 启用帧级并行且线程数大于 1 时的编码延迟 (帧数)
    pub fn frame_lookahead(&self) -> usize {
        if self.thread_type.contains(ThreadType::FRAME) && self.thread_count > 1 {
            self.thread_count
        } else {
            1
        }
    }
}

/// 编码器 trait
///
/// 定义了编码器的统一接口, 对标 `avcodec_send_frame` / `avcodec_receive_packet`.
///
/// 编码流程:
/// 1. 调用 `open()` 配置编码器
/// 2. 调用 `send_frame()` 送入原始帧数据
/// 3. 循环调用 `receive_packet()` 取出压缩数据包, 直到返回 `NeedMoreData`
/// 4. 送入 None 表示编码结束, 再循环 `receive_packet()` 直到返回 `Eof`
///
/// `NeedMoreData` 与 `Eof` 是控制信号而非错误.
pub trait Encoder: Send {
    /// 获取编码器标识
    fn codec_id(&self) -> CodecId;

    /// 获取编码器名称
    fn name(&self) -> &str;

    /// 使用配置打开编码器
    fn open(&mut self, config: &EncoderConfig) -> BianmaResult<()>;

    /// 打开后对外公开的编解码器参数 (含 extradata)
    fn parameters(&self) -> BianmaResult<CodecParameters>;

    /// 送入一帧原始数据进行编码
    ///
    /// # 参数
    /// - `frame`: 原始帧数据. `None` 表示进入刷新 (flush) 状态.
    ///
    /// # 返回
    /// - `Ok(())`: 帧已接受
    /// - `Err(BianmaError::NeedMoreData)`: 输出队列未取空, 需要先取出数据包
    /// - `Err(BianmaError::Eof)`: 已进入刷新状态, 不再接受输入
    fn send_frame(&mut self, frame: Option<&VideoFrame>) -> BianmaResult<()>;

    /// 取出一个压缩数据包, 写入调用方复用的 `packet`
    ///
    /// # 返回
    /// - `Ok(())`: `packet` 已被填充
    /// - `Err(BianmaError::NeedMoreData)`: 需要送入更多帧
    /// - `Err(BianmaError::Eof)`: 刷新完成, 所有数据包已取出
    fn receive_packet(&mut self, packet: &mut Packet) -> BianmaResult<()>;

    /// 丢弃内部缓存, 回到打开后的初始状态
    fn flush(&mut self);

    /// 关闭编码器, 释放内部资源 (线程池等)
    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_默认配置() {
        let cfg = EncoderConfig::new(1280, 720, PixelFormat::Yuv420p, Rational::new(30, 1));
        assert_eq!(cfg.time_base, Rational::new(1, 30));
        assert_eq!(cfg.gop_size, 12);
        assert_eq!(cfg.max_b_frames, 0);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.frame_lookahead(), 1);
    }

    #[test]
    fn test_ntsc_时间基() {
        let cfg = EncoderConfig::new(64, 64, PixelFormat::Yuv420p, Rational::new(30000, 1001));
        assert_eq!(cfg.time_base, Rational::new(1001, 30000));
    }

    #[test]
    fn test_帧级并行延迟() {
        let mut cfg = EncoderConfig::new(64, 64, PixelFormat::Yuv420p, Rational::new(25, 1));
        cfg.thread_count = 4;
        cfg.thread_type = ThreadType::SLICE;
        assert_eq!(cfg.frame_lookahead(), 1);
        cfg.thread_type = ThreadType::FRAME | ThreadType::SLICE;
        assert_eq!(cfg.frame_lookahead(), 4);
    }

    #[test]
    fn test_非法配置() {
        let mut cfg = EncoderConfig::new(0, 64, PixelFormat::Yuv420p, Rational::new(25, 1));
        assert!(cfg.validate().is_err());
        cfg.width = 64;
        cfg.frame_rate = Rational::new(0, 1);
        assert!(cfg.validate().is_err());
        cfg.frame_rate = Rational::new(25, 1);
        cfg.gop_size = 0;
        assert!(cfg.validate().is_err());
    }
}
