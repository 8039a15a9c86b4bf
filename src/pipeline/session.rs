//! 编码会话: 编码器的配置, 打开与关闭, 以及时间戳计数.

use std::thread;

use bianma_codec::{
    CodecParameters, CodecRegistry, Encoder, EncoderConfig, EncoderDescriptor, Packet, VideoFrame,
};
use bianma_core::{BianmaError, BianmaResult, PixelFormat, Rational};
use log::{debug, info};

use super::hardware::HardwareStrategy;
use super::properties::{EncoderOptions, VideoProperties};

/// 编码会话
///
/// 持有编码器实例和单调递增的 PTS 计数器. 计数器从 0 开始,
/// 每送入一帧加一, 会话打开期间不会被重置.
pub struct CodecSession {
    encoder: Box<dyn Encoder>,
    descriptor: EncoderDescriptor,
    config: EncoderConfig,
    parameters: CodecParameters,
    next_pts: i64,
    open: bool,
}

impl CodecSession {
    /// 按名称解析编码器, 配置参数并打开
    pub fn open(
        registry: &CodecRegistry,
        props: &VideoProperties,
        options: &EncoderOptions,
        hardware: &dyn HardwareStrategy,
    ) -> BianmaResult<Self> {
        props.validate()?;
        let descriptor = registry
            .find_encoder(&props.codec_name)
            .cloned()
            .ok_or_else(|| {
                BianmaError::CodecNotFound(format!("未找到名为 {} 的编码器", props.codec_name))
            })?;

        let candidates = candidate_formats(&descriptor, props.pixel_format)?;
        let pixel_format = hardware.select_format(&candidates)?;
        if !descriptor.supports(pixel_format) {
            return Err(BianmaError::Unsupported(format!(
                "{} 选择的像素格式 {pixel_format} 不被 {} 支持",
                hardware.name(),
                descriptor.name
            )));
        }

        let mut config =
            EncoderConfig::new(props.width, props.height, pixel_format, props.frame_rate);
        config.gop_size = options.gop_size;
        config.max_b_frames = options.max_b_frames;
        config.thread_count = thread_count(options.max_threads);
        config.thread_type = options.thread_type;
        config.validate()?;

        let mut encoder = registry.create_encoder(descriptor.name)?;
        encoder.open(&config)?;
        let parameters = encoder.parameters()?;

        info!(
            "编码器 {} 已打开: {}x{} {} @ {} fps, gop={}, 非参考帧={}, 线程={} ({:?}), 硬件策略={}",
            descriptor.name,
            config.width,
            config.height,
            config.pixel_format,
            config.frame_rate,
            config.gop_size,
            config.max_b_frames,
            config.thread_count,
            config.thread_type,
            hardware.name(),
        );

        Ok(Self {
            encoder,
            descriptor,
            config,
            parameters,
            next_pts: 0,
            open: true,
        })
    }

    /// 给帧打上下一个 PTS 并推进计数器
    pub fn stamp(&mut self, frame: &mut VideoFrame) {
        frame.pts = self.next_pts;
        frame.time_base = self.config.time_base;
        frame.duration = 1;
        self.next_pts += 1;
    }

    /// 送入一帧, `None` 表示进入刷新
    pub fn send_frame(&mut self, frame: Option<&VideoFrame>) -> BianmaResult<()> {
        self.encoder.send_frame(frame)
    }

    /// 取出一个数据包到调用方复用的 `packet`
    pub fn receive_packet(&mut self, packet: &mut Packet) -> BianmaResult<()> {
        self.encoder.receive_packet(packet)
    }

    /// 关闭编码器, 可重复调用
    pub fn close(&mut self) {
        if self.open {
            self.encoder.close();
            self.open = false;
            debug!("编码器 {} 已关闭, 共送入 {} 帧", self.descriptor.name, self.next_pts);
        }
    }

    /// 编码器是否打开
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// 编码器时间基
    pub fn time_base(&self) -> Rational {
        self.config.time_base
    }

    /// 编码器实际使用的像素格式
    pub fn pixel_format(&self) -> PixelFormat {
        self.config.pixel_format
    }

    /// 打开编码器时使用的配置
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// 编码器描述
    pub fn descriptor(&self) -> &EncoderDescriptor {
        &self.descriptor
    }

    /// 打开后的编解码器参数
    pub fn parameters(&self) -> &CodecParameters {
        &self.parameters
    }

    /// 已打上时间戳的帧数 (即下一个 PTS)
    pub fn frames_submitted(&self) -> u64 {
        self.next_pts as u64
    }
}

impl Drop for CodecSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// 候选像素格式: 请求的格式排第一, 其余按编码器偏好
///
/// 编码器不支持请求的格式时返回 `Unsupported`.
pub fn candidate_formats(
    descriptor: &EncoderDescriptor,
    requested: PixelFormat,
) -> BianmaResult<Vec<PixelFormat>> {
    if !descriptor.supports(requested) {
        return Err(BianmaError::Unsupported(format!(
            "编码器 {} 不支持像素格式 {requested}",
            descriptor.name
        )));
    }
    let mut candidates = vec![requested];
    candidates.extend(
        descriptor
            .pixel_formats
            .iter()
            .copied()
            .filter(|&fmt| fmt != requested),
    );
    Ok(candidates)
}

/// 编码线程数: min(硬件并发数, 上限), 至少为 1
pub fn thread_count(max_threads: usize) -> usize {
    thread::available_parallelism()
        .map_or(1, |n| n.get())
        .min(max_threads)
        .max(1)
}
