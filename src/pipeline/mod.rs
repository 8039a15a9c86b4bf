//! 视频编码管线.
//!
//! 把调用方提供的原始帧转换为编码器就绪的帧, 驱动编码器的 send/receive
//! 状态机产出压缩数据包, 再把数据包换算时间戳后封装进容器文件.
//!
//! 管线本身是同步的, 每个会话只由一个调用线程顺序驱动;
//! 并行完全交给编码器内部的线程池.
//!
//! ```rust,no_run
//! use bianma::pipeline::{EncodePipeline, ScaleConverter, VideoProperties};
//! use bianma::core::{PixelFormat, Rational};
//!
//! let mut pipeline = EncodePipeline::new(ScaleConverter::new(PixelFormat::Rgb24));
//! let props = VideoProperties::new(1280, 720, Rational::new(30, 1), PixelFormat::Yuv420p, "vdelta");
//! pipeline.initialize("out.avi", props).unwrap();
//! let frame = vec![0u8; 1280 * 720 * 3];
//! for _ in 0..4 {
//!     pipeline.encode_frame(&frame).unwrap();
//! }
//! pipeline.finalize().unwrap();
//! pipeline.close().unwrap();
//! ```

pub mod converter;
pub mod error;
pub mod hardware;
pub mod properties;
pub mod relay;
pub mod session;
pub mod sink;

use std::path::Path;
use std::sync::Arc;

use bianma_codec::{CodecParameters, CodecRegistry, EncoderDescriptor, VideoFrame};
use bianma_core::{BianmaError, BianmaResult, Rational, Timestamp};
use bianma_format::{FormatRegistry, Stream};
use log::{error, info, warn};

pub use converter::{FrameConverter, ScaleConverter};
pub use error::{FrameStage, PipelineError};
pub use hardware::{HardwareStrategy, PreferredFormatStrategy, SoftwareStrategy};
pub use properties::{EncoderOptions, VideoProperties};
pub use relay::PacketRelay;
pub use session::CodecSession;
pub use sink::FormatSink;

/// 编码管线
///
/// 会话资源 (编码器, 容器, 流, 复用数据包) 由管线独占. 管线可以移动但不能复制,
/// 移动后原变量不可再用. `Drop` 时自动调用 `close`.
pub struct EncodePipeline {
    converter: Box<dyn FrameConverter>,
    hardware: Box<dyn HardwareStrategy>,
    options: EncoderOptions,
    codec_registry: Arc<CodecRegistry>,
    format_registry: Arc<FormatRegistry>,
    state: Option<OpenSession>,
}

/// 打开期间的会话状态
struct OpenSession {
    properties: VideoProperties,
    sink: FormatSink,
    session: CodecSession,
    relay: PacketRelay,
    frame: VideoFrame,
    frames_attempted: u64,
    finalized: bool,
}

impl EncodePipeline {
    /// 创建管线, 使用全局注册表和软件路径
    pub fn new(converter: impl FrameConverter + 'static) -> Self {
        Self {
            converter: Box::new(converter),
            hardware: Box::new(SoftwareStrategy),
            options: EncoderOptions::default(),
            codec_registry: CodecRegistry::global(),
            format_registry: FormatRegistry::global(),
            state: None,
        }
    }

    /// 指定硬件策略
    pub fn with_hardware(mut self, hardware: impl HardwareStrategy + 'static) -> Self {
        self.hardware = Box::new(hardware);
        self
    }

    /// 指定编码器选项
    pub fn with_options(mut self, options: EncoderOptions) -> Self {
        self.options = options;
        self
    }

    /// 指定编解码器注册表
    pub fn with_codec_registry(mut self, registry: Arc<CodecRegistry>) -> Self {
        self.codec_registry = registry;
        self
    }

    /// 指定容器格式注册表
    pub fn with_format_registry(mut self, registry: Arc<FormatRegistry>) -> Self {
        self.format_registry = registry;
        self
    }

    /// 打开会话: 容器输出, 硬件上下文, 编码器, 流, 头部
    ///
    /// 任何一步失败都返回 `PipelineError::Init`, 管线保持未打开.
    pub fn initialize(
        &mut self,
        output: impl AsRef<Path>,
        props: VideoProperties,
    ) -> Result<(), PipelineError> {
        if self.state.is_some() {
            return Err(PipelineError::Init(BianmaError::InvalidArgument(
                "编码会话已打开".into(),
            )));
        }
        match self.open_session(output.as_ref(), props) {
            Ok(state) => {
                self.state = Some(state);
                Ok(())
            }
            Err(err) => {
                self.hardware.release();
                error!("编码会话初始化失败: {err}");
                Err(PipelineError::Init(err))
            }
        }
    }

    fn open_session(&mut self, output: &Path, props: VideoProperties) -> BianmaResult<OpenSession> {
        props.validate()?;
        let mut sink = FormatSink::create(output, &self.format_registry)?;
        self.hardware.init_context(&props)?;
        let session = CodecSession::open(
            &self.codec_registry,
            &props,
            &self.options,
            self.hardware.as_ref(),
        )?;

        let stream_time_base = self
            .options
            .stream_time_base
            .unwrap_or_else(|| session.time_base());
        let stream = Stream::from_codec_parameters(0, session.parameters(), stream_time_base)?;
        let stream_index = sink.add_stream(stream)?;
        sink.write_header()?;

        let frame = VideoFrame::alloc(props.width, props.height, session.pixel_format())?;
        let relay = PacketRelay::new(session.time_base(), stream_time_base, stream_index);

        info!(
            "编码会话已打开: {} -> {} ({}), 流时间基 {}",
            session.descriptor(),
            output.display(),
            sink.format_id(),
            stream_time_base
        );
        Ok(OpenSession {
            properties: props,
            sink,
            session,
            relay,
            frame,
            frames_attempted: 0,
            finalized: false,
        })
    }

    /// 编码一帧, 返回本次写入容器的数据包数
    ///
    /// 单帧失败以 `PipelineError::Frame` 返回并记录日志, 会话保持打开.
    /// 转换失败不推进时间戳计数器.
    pub fn encode_frame(&mut self, raw: &[u8]) -> Result<usize, PipelineError> {
        let state = self.state.as_mut().ok_or(PipelineError::NotOpen)?;
        if state.finalized {
            return Err(PipelineError::AlreadyFinalized);
        }
        let index = state.frames_attempted;
        state.frames_attempted += 1;

        state
            .encode(self.converter.as_mut(), raw, index)
            .inspect_err(|err| error!("{err}"))
    }

    /// 刷新编码器并写入尾部
    ///
    /// 未打开或已刷新时返回 `Ok(false)`. 刷新或写尾部失败是致命错误.
    pub fn finalize(&mut self) -> Result<bool, PipelineError> {
        let Some(state) = self.state.as_mut() else {
            return Ok(false);
        };
        if state.finalized {
            return Ok(false);
        }
        state.finalized = true;

        state
            .flush(self.options.max_flush_retries)
            .and_then(|()| state.sink.write_trailer())
            .map_err(|err| {
                error!("编码会话刷新失败: {err}");
                PipelineError::Drain(err)
            })?;
        info!(
            "编码会话已完成: {}, 送入 {} 帧, 中转 {} 个数据包, 写入 {} 个数据包",
            state.sink.path().display(),
            state.session.frames_submitted(),
            state.relay.relayed(),
            state.sink.packets_written()
        );
        Ok(true)
    }

    /// 关闭会话, 可重复调用
    ///
    /// 先刷新 (忽略未打开), 再依次释放数据包, 编码器, 容器和硬件上下文.
    pub fn close(&mut self) -> Result<(), PipelineError> {
        let finalized = self.finalize();
        let Some(mut state) = self.state.take() else {
            return finalized.map(|_| ());
        };

        if let Err(err) = self.converter.synchronize() {
            warn!("等待像素转换完成失败: {err}");
        }
        state.relay.release();
        state.session.close();
        let closed = state.sink.close();
        drop(state);
        self.hardware.release();
        info!("编码会话已关闭");

        finalized?;
        closed.map_err(PipelineError::Drain)
    }

    /// 容器和编码器是否都已打开
    pub fn is_open(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.session.is_open())
    }

    /// 注册表中所有可用的编码器
    pub fn list_supported_encoders(&self) -> Vec<EncoderDescriptor> {
        self.codec_registry.list_encoders()
    }

    /// 打开会话时的视频属性
    pub fn properties(&self) -> Option<&VideoProperties> {
        self.state.as_ref().map(|s| &s.properties)
    }

    /// 复制进流的编解码器参数
    pub fn codec_parameters(&self) -> Option<&CodecParameters> {
        self.state.as_ref().map(|s| s.session.parameters())
    }

    /// 容器流时间基
    pub fn stream_time_base(&self) -> Option<Rational> {
        self.state.as_ref().map(|s| s.relay.stream_time_base())
    }

    /// 已送入编码器 (打上时间戳) 的帧数
    pub fn frames_submitted(&self) -> u64 {
        self.state.as_ref().map_or(0, |s| s.session.frames_submitted())
    }

    /// 已写入容器的数据包数
    pub fn packets_written(&self) -> u64 {
        self.state.as_ref().map_or(0, |s| s.sink.packets_written())
    }

    /// 秒数换算为流时间基下的刻度 (向零截断)
    pub fn convert_timestamp(&self, seconds: f64) -> Result<i64, PipelineError> {
        let state = self.state.as_ref().ok_or(PipelineError::NotOpen)?;
        Ok(Timestamp::from_seconds(seconds, state.relay.stream_time_base()).pts)
    }
}

impl Drop for EncodePipeline {
    fn drop(&mut self) {
        if self.state.is_none() {
            return;
        }
        if let Err(err) = self.close() {
            error!("析构时关闭编码会话失败: {err}");
        }
    }
}

/// 生成单帧错误
fn frame_error(index: u64, stage: FrameStage) -> impl FnOnce(BianmaError) -> PipelineError {
    move |source| PipelineError::Frame {
        index,
        stage,
        source,
    }
}

impl OpenSession {
    fn encode(
        &mut self,
        converter: &mut dyn FrameConverter,
        raw: &[u8],
        index: u64,
    ) -> Result<usize, PipelineError> {
        converter
            .convert(&mut self.frame, raw)
            .map_err(frame_error(index, FrameStage::Convert))?;
        self.session.stamp(&mut self.frame);

        let mut written = 0;
        match self.session.send_frame(Some(&self.frame)) {
            Ok(()) => {}
            Err(BianmaError::NeedMoreData) => {
                // 输出队列满: 先取空再重送一次
                written += self
                    .drain_ready()
                    .map_err(|(stage, err)| frame_error(index, stage)(err))?;
                self.session
                    .send_frame(Some(&self.frame))
                    .map_err(frame_error(index, FrameStage::Submit))?;
            }
            Err(err) => return Err(frame_error(index, FrameStage::Submit)(err)),
        }

        written += self
            .drain_ready()
            .map_err(|(stage, err)| frame_error(index, stage)(err))?;
        Ok(written)
    }

    /// 取出编码器当前可产出的全部数据包, 遇到 `NeedMoreData` 或 `Eof` 停止
    fn drain_ready(&mut self) -> Result<usize, (FrameStage, BianmaError)> {
        let mut written = 0;
        loop {
            match self.session.receive_packet(self.relay.packet_mut()) {
                Ok(()) => {
                    self.relay
                        .relay(&mut self.sink)
                        .map_err(|err| (FrameStage::Write, err))?;
                    written += 1;
                }
                Err(err) if err.is_transient() => {
                    self.relay.release();
                    return Ok(written);
                }
                Err(err) => {
                    self.relay.release();
                    return Err((FrameStage::Receive, err));
                }
            }
        }
    }

    /// 送入结束信号并取出全部缓存的数据包, 只在 `Eof` 时结束
    ///
    /// 刷新阶段的 `NeedMoreData` 表示再试一次, 连续超过 `max_retries` 次视为失败.
    fn flush(&mut self, max_retries: usize) -> BianmaResult<()> {
        match self.session.send_frame(None) {
            Ok(()) | Err(BianmaError::Eof) => {}
            Err(BianmaError::NeedMoreData) => {
                self.drain_ready().map_err(|(_, err)| err)?;
                match self.session.send_frame(None) {
                    Ok(()) | Err(BianmaError::Eof) => {}
                    Err(err) => return Err(err),
                }
            }
            Err(err) => return Err(err),
        }

        let mut retries = 0;
        loop {
            match self.session.receive_packet(self.relay.packet_mut()) {
                Ok(()) => {
                    retries = 0;
                    self.relay.relay(&mut self.sink)?;
                }
                Err(BianmaError::Eof) => {
                    self.relay.release();
                    return Ok(());
                }
                Err(BianmaError::NeedMoreData) => {
                    self.relay.release();
                    retries += 1;
                    if retries > max_retries {
                        return Err(BianmaError::Codec(format!(
                            "刷新时编码器连续 {retries} 次要求更多数据, 超过上限 {max_retries}"
                        )));
                    }
                }
                Err(err) => {
                    self.relay.release();
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bianma_core::PixelFormat;

    fn props() -> VideoProperties {
        VideoProperties::new(8, 4, Rational::new(25, 1), PixelFormat::Gray8, "rawvideo")
    }

    #[test]
    fn test_未打开时的操作() {
        let mut pipeline = EncodePipeline::new(ScaleConverter::new(PixelFormat::Gray8));
        assert!(!pipeline.is_open());
        assert!(matches!(
            pipeline.encode_frame(&[0u8; 32]),
            Err(PipelineError::NotOpen)
        ));
        assert!(!pipeline.finalize().unwrap());
        pipeline.close().unwrap();
        assert!(pipeline.convert_timestamp(1.0).is_err());
        assert_eq!(pipeline.frames_submitted(), 0);
    }

    #[test]
    fn test_null_输出完整流程() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = EncodePipeline::new(ScaleConverter::new(PixelFormat::Gray8));
        pipeline.initialize(dir.path().join("x.null"), props()).unwrap();
        assert!(pipeline.is_open());
        assert_eq!(pipeline.encode_frame(&[9u8; 32]).unwrap(), 1);
        assert_eq!(pipeline.frames_submitted(), 1);
        assert_eq!(pipeline.convert_timestamp(2.0).unwrap(), 50);
        assert!(pipeline.finalize().unwrap());
        assert!(!pipeline.finalize().unwrap());
        assert!(matches!(
            pipeline.encode_frame(&[9u8; 32]),
            Err(PipelineError::AlreadyFinalized)
        ));
        pipeline.close().unwrap();
        assert!(!pipeline.is_open());
    }

    #[test]
    fn test_重复初始化报错() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = EncodePipeline::new(ScaleConverter::new(PixelFormat::Gray8));
        pipeline.initialize(dir.path().join("a.null"), props()).unwrap();
        let err = pipeline
            .initialize(dir.path().join("b.null"), props())
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(pipeline.is_open());
    }
}
