//! RAW 视频编码器.
//!
//! 将 VideoFrame 的各平面数据拼接为 Packet.
//! 不做任何压缩, 直接透传像素数据.

use bianma_core::{BianmaError, BianmaResult};
use bytes::Bytes;
use log::debug;

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::encoder::{Encoder, EncoderConfig};
use crate::frame::VideoFrame;
use crate::packet::Packet;

/// RAW 视频编码器
pub struct RawVideoEncoder {
    /// 打开时的配置
    config: Option<EncoderConfig>,
    /// 预计算: 每帧总字节数
    frame_size: usize,
    /// 输出数据包缓冲
    output_packet: Option<Packet>,
    /// 是否已收到刷新信号
    flushing: bool,
}

impl RawVideoEncoder {
    pub fn create() -> BianmaResult<Box<dyn Encoder>> {
        Ok(Box::new(Self {
            config: None,
            frame_size: 0,
            output_packet: None,
            flushing: false,
        }))
    }
}

impl Encoder for RawVideoEncoder {
    fn codec_id(&self) -> CodecId {
        CodecId::RawVideo
    }

    fn name(&self) -> &str {
        "rawvideo"
    }

    fn open(&mut self, config: &EncoderConfig) -> BianmaResult<()> {
        config.validate()?;
        let pf = config.pixel_format;
        let frame_size = pf
            .frame_size(config.width, config.height)
            .ok_or_else(|| BianmaError::InvalidArgument(format!("无法计算 {pf} 的帧大小")))?;

        self.frame_size = frame_size;
        self.output_packet = None;
        self.flushing = false;
        self.config = Some(config.clone());

        debug!(
            "打开 rawvideo 编码器: {}x{}, 格式={}, 帧大小={}",
            config.width, config.height, pf, frame_size,
        );
        Ok(())
    }

    fn parameters(&self) -> BianmaResult<CodecParameters> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| BianmaError::Codec("编码器未打开".into()))?;
        let mut params = CodecParameters::video_params(CodecId::RawVideo, config.video_params(0));
        // 码率由帧大小与帧率决定
        let fps = config.frame_rate;
        params.bit_rate = (self.frame_size as u64 * 8 * fps.num.unsigned_abs() as u64)
            / u64::from(fps.den.unsigned_abs().max(1));
        Ok(params)
    }

    fn send_frame(&mut self, frame: Option<&VideoFrame>) -> BianmaResult<()> {
        let Some(config) = &self.config else {
            return Err(BianmaError::Codec("编码器未打开, 请先调用 open()".into()));
        };
        if self.flushing {
            return Err(BianmaError::Eof);
        }
        if self.output_packet.is_some() {
            return Err(BianmaError::NeedMoreData);
        }

        let Some(frame) = frame else {
            self.flushing = true;
            return Ok(());
        };

        if frame.width != config.width
            || frame.height != config.height
            || frame.pixel_format != config.pixel_format
        {
            return Err(BianmaError::InvalidArgument(format!(
                "帧参数 {}x{} {} 与编码器配置 {}x{} {} 不一致",
                frame.width,
                frame.height,
                frame.pixel_format,
                config.width,
                config.height,
                config.pixel_format,
            )));
        }

        // 拼接所有平面数据
        let mut buf = Vec::with_capacity(self.frame_size);
        for plane in frame.packed_planes()? {
            buf.extend_from_slice(&plane);
        }
        if buf.len() != self.frame_size {
            return Err(BianmaError::InvalidData(format!(
                "帧数据大小 {} 与预期 {} 不匹配",
                buf.len(),
                self.frame_size,
            )));
        }

        let mut pkt = Packet::from_data(Bytes::from(buf));
        pkt.pts = frame.pts;
        pkt.dts = frame.pts; // RAW 视频无重排, DTS = PTS
        pkt.duration = if frame.duration > 0 { frame.duration } else { 1 };
        pkt.time_base = if frame.time_base.is_valid() {
            frame.time_base
        } else {
            config.time_base
        };
        pkt.is_keyframe = true;

        self.output_packet = Some(pkt);
        Ok(())
    }

    fn receive_packet(&mut self, packet: &mut Packet) -> BianmaResult<()> {
        if let Some(pkt) = self.output_packet.take() {
            *packet = pkt;
            return Ok(());
        }
        if self.flushing {
            return Err(BianmaError::Eof);
        }
        Err(BianmaError::NeedMoreData)
    }

    fn flush(&mut self) {
        self.output_packet = None;
        self.flushing = false;
    }

    fn close(&mut self) {
        self.flush();
        self.config = None;
    }
}
