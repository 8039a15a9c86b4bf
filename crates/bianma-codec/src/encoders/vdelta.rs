//! vdelta 视频编码器.
//!
//! 帧间差分 + PackBits 游程编码的无损编码器. 每 `gop_size` 帧一个关键帧,
//! 参考帧之间最多插入 `max_b_frames` 个非参考帧; 预测总是来自上一个参考帧,
//! 因此不需要重排, 输出数据包 DTS = PTS.
//!
//! 启用帧级并行 (`ThreadType::FRAME`) 且线程数大于 1 时, 编码器先缓存
//! `thread_count` 帧再整批并行编码, 即存在 `thread_count - 1` 帧的编码延迟;
//! 刷新时缓存中的剩余帧一次性编出. 片级并行 (`ThreadType::SLICE`) 在单帧内
//! 并行压缩各平面.

use std::collections::VecDeque;
use std::sync::Arc;

use bianma_core::{BianmaError, BianmaResult, PixelFormat, Rational};
use bytes::Bytes;
use log::debug;
use rayon::prelude::*;

use crate::bitstream::{self, FrameKind, StreamHeader};
use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::encoder::{Encoder, EncoderConfig, ThreadType};
use crate::frame::VideoFrame;
use crate::packet::Packet;

type Planes = Arc<Vec<Vec<u8>>>;

/// 等待编码的帧
struct PendingFrame {
    planes: Planes,
    pts: i64,
    duration: i64,
    time_base: Rational,
}

/// 已确定类型与参考帧的编码任务, 可独立并行执行
struct FrameJob {
    kind: FrameKind,
    planes: Planes,
    reference: Option<Planes>,
    pts: i64,
    duration: i64,
    time_base: Rational,
}

impl FrameJob {
    fn compress_plane(&self, index: usize, plane: &[u8]) -> Vec<u8> {
        match &self.reference {
            Some(reference) => {
                let residual: Vec<u8> = plane
                    .iter()
                    .zip(&reference[index])
                    .map(|(cur, prev)| cur.wrapping_sub(*prev))
                    .collect();
                bitstream::packbits_encode(&residual)
            }
            None => bitstream::packbits_encode(plane),
        }
    }

    fn encode(&self, slice_threads: bool) -> Packet {
        let planes: Vec<Vec<u8>> = if slice_threads {
            self.planes
                .par_iter()
                .enumerate()
                .map(|(i, p)| self.compress_plane(i, p))
                .collect()
        } else {
            self.planes
                .iter()
                .enumerate()
                .map(|(i, p)| self.compress_plane(i, p))
                .collect()
        };
        let mut pkt = Packet::from_data(Bytes::from(bitstream::write_packet(self.kind, &planes)));
        pkt.pts = self.pts;
        pkt.dts = self.pts;
        pkt.duration = self.duration;
        pkt.time_base = self.time_base;
        pkt.is_keyframe = self.kind == FrameKind::Intra;
        pkt
    }
}

/// 按帧序号决定帧类型
fn frame_kind(index: u64, gop_size: u32, max_b_frames: u32) -> FrameKind {
    let offset = index % u64::from(gop_size);
    if offset == 0 {
        FrameKind::Intra
    } else if max_b_frames == 0 || offset % u64::from(max_b_frames + 1) == 0 {
        FrameKind::Reference
    } else {
        FrameKind::NonReference
    }
}

/// vdelta 编码器
pub struct VdeltaEncoder {
    config: Option<EncoderConfig>,
    /// 各平面紧凑字节数
    plane_sizes: Vec<usize>,
    /// 攒够多少帧开始编码
    lookahead: usize,
    /// 编码线程池, 单线程时为 None
    pool: Option<rayon::ThreadPool>,
    pending: Vec<PendingFrame>,
    output: VecDeque<Packet>,
    /// 最近一个参考帧的源数据 (无损编码, 与解码端重建结果一致)
    reference: Option<Planes>,
    /// 下一帧的序号
    frame_index: u64,
    flushing: bool,
}

impl VdeltaEncoder {
    pub fn create() -> BianmaResult<Box<dyn Encoder>> {
        Ok(Box::new(Self {
            config: None,
            plane_sizes: Vec::new(),
            lookahead: 1,
            pool: None,
            pending: Vec::new(),
            output: VecDeque::new(),
            reference: None,
            frame_index: 0,
            flushing: false,
        }))
    }

    /// 为缓存帧分配类型和参考帧, 然后整批编码
    fn encode_pending(&mut self) -> BianmaResult<()> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| BianmaError::Codec("编码器未打开".into()))?;
        let (gop_size, max_b_frames) = (config.gop_size, config.max_b_frames);
        let slice_threads = self.pool.is_some() && config.thread_type.contains(ThreadType::SLICE);

        let mut jobs = Vec::with_capacity(self.pending.len());
        for frame in self.pending.drain(..) {
            let mut kind = frame_kind(self.frame_index, gop_size, max_b_frames);
            self.frame_index += 1;
            if self.reference.is_none() {
                kind = FrameKind::Intra;
            }
            let reference = match kind {
                FrameKind::Intra => None,
                _ => self.reference.clone(),
            };
            if kind.updates_reference() {
                self.reference = Some(Arc::clone(&frame.planes));
            }
            jobs.push(FrameJob {
                kind,
                planes: frame.planes,
                reference,
                pts: frame.pts,
                duration: frame.duration,
                time_base: frame.time_base,
            });
        }

        let packets: Vec<Packet> = match &self.pool {
            Some(pool) => pool.install(|| jobs.par_iter().map(|j| j.encode(slice_threads)).collect()),
            None => jobs.iter().map(|j| j.encode(false)).collect(),
        };
        debug!("vdelta 批量编码 {} 帧", packets.len());
        self.output.extend(packets);
        Ok(())
    }
}

impl Encoder for VdeltaEncoder {
    fn codec_id(&self) -> CodecId {
        CodecId::Vdelta
    }

    fn name(&self) -> &str {
        "vdelta"
    }

    fn open(&mut self, config: &EncoderConfig) -> BianmaResult<()> {
        config.validate()?;
        if config.gop_size > u32::from(u16::MAX) || config.max_b_frames > u32::from(u16::MAX) {
            return Err(BianmaError::InvalidArgument(format!(
                "GOP {} 或非参考帧数 {} 超出范围",
                config.gop_size, config.max_b_frames
            )));
        }
        let pf = config.pixel_format;
        let plane_sizes = (0..pf.plane_count() as usize)
            .map(|plane| {
                let linesize = pf.plane_linesize(plane, config.width);
                let rows = pf.plane_height(plane, config.height);
                linesize.zip(rows).map(|(l, r)| l * r)
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| BianmaError::InvalidArgument(format!("无法计算 {pf} 的平面大小")))?;

        self.pool = if config.thread_count > 1 && !config.thread_type.is_empty() {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.thread_count)
                .thread_name(|i| format!("vdelta-{i}"))
                .build()
                .map_err(|e| BianmaError::Codec(format!("创建编码线程池失败: {e}")))?;
            Some(pool)
        } else {
            None
        };
        self.plane_sizes = plane_sizes;
        self.lookahead = config.frame_lookahead();
        self.config = Some(config.clone());
        self.flush();

        debug!(
            "打开 vdelta 编码器: {}x{}, 格式={}, gop={}, 非参考帧={}, 线程={} ({:?}), 延迟={}",
            config.width,
            config.height,
            pf,
            config.gop_size,
            config.max_b_frames,
            config.thread_count,
            config.thread_type,
            self.lookahead,
        );
        Ok(())
    }

    fn parameters(&self) -> BianmaResult<CodecParameters> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| BianmaError::Codec("编码器未打开".into()))?;
        let delay = self.lookahead.saturating_sub(1) as u32;
        let mut params = CodecParameters::video_params(CodecId::Vdelta, config.video_params(delay));
        params.bit_rate = config.bit_rate;
        params.extra_data = bitstream::write_extradata(&StreamHeader {
            pixel_format: config.pixel_format,
            gop_size: config.gop_size as u16,
            max_b_frames: config.max_b_frames as u16,
        });
        Ok(params)
    }

    fn send_frame(&mut self, frame: Option<&VideoFrame>) -> BianmaResult<()> {
        let Some(config) = &self.config else {
            return Err(BianmaError::Codec("编码器未打开, 请先调用 open()".into()));
        };
        if self.flushing {
            return Err(BianmaError::Eof);
        }
        if !self.output.is_empty() {
            return Err(BianmaError::NeedMoreData);
        }
        let Some(frame) = frame else {
            self.flushing = true;
            debug!("vdelta 进入刷新, 缓存 {} 帧", self.pending.len());
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
        let time_base = if frame.time_base.is_valid() {
            frame.time_base
        } else {
            config.time_base
        };

        let planes = frame.packed_planes()?;
        let sizes: Vec<usize> = planes.iter().map(Vec::len).collect();
        if sizes != self.plane_sizes {
            return Err(BianmaError::InvalidData(format!(
                "平面大小 {sizes:?} 与预期 {:?} 不一致",
                self.plane_sizes
            )));
        }

        self.pending.push(PendingFrame {
            planes: Arc::new(planes),
            pts: frame.pts,
            duration: frame.duration.max(1),
            time_base,
        });
        if self.pending.len() >= self.lookahead {
            self.encode_pending()?;
        }
        Ok(())
    }

    fn receive_packet(&mut self, packet: &mut Packet) -> BianmaResult<()> {
        if self.config.is_none() {
            return Err(BianmaError::Codec("编码器未打开".into()));
        }
        if self.output.is_empty() && self.flushing && !self.pending.is_empty() {
            self.encode_pending()?;
        }
        match self.output.pop_front() {
            Some(pkt) => {
                *packet = pkt;
                Ok(())
            }
            None if self.flushing => Err(BianmaError::Eof),
            None => Err(BianmaError::NeedMoreData),
        }
    }

    fn flush(&mut self) {
        self.pending.clear();
        self.output.clear();
        self.reference = None;
        self.frame_index = 0;
        self.flushing = false;
    }

    fn close(&mut self) {
        self.flush();
        self.pool = None;
        self.config = None;
    }
}

/// vdelta 支持的输入像素格式
pub const PIXEL_FORMATS: &[PixelFormat] = &[
    PixelFormat::Yuv420p,
    PixelFormat::Yuv422p,
    PixelFormat::Yuv444p,
    PixelFormat::Nv12,
    PixelFormat::Gray8,
    PixelFormat::Rgb24,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::vdelta::VdeltaDecoder;

    fn make_config(threads: usize, thread_type: ThreadType) -> EncoderConfig {
        let mut cfg = EncoderConfig::new(16, 8, PixelFormat::Yuv420p, Rational::new(30, 1));
        cfg.thread_count = threads;
        cfg.thread_type = thread_type;
        cfg
    }

    fn make_frame(index: i64) -> VideoFrame {
        let mut vf = VideoFrame::alloc(16, 8, PixelFormat::Yuv420p).unwrap();
        for (plane, data) in vf.data.iter_mut().enumerate() {
            for (i, b) in data.iter_mut().enumerate() {
                *b = (i as i64 * (plane as i64 + 1) + index * 3) as u8;
            }
        }
        vf.pts = index;
        vf
    }

    fn drain(enc: &mut dyn Encoder, out: &mut Vec<Packet>) -> BianmaError {
        loop {
            let mut pkt = Packet::empty();
            match enc.receive_packet(&mut pkt) {
                Ok(()) => out.push(pkt),
                Err(e) => return e,
            }
        }
    }

    #[test]
    fn test_帧类型分配() {
        let kinds: Vec<_> = (0..8).map(|i| frame_kind(i, 6, 2)).collect();
        assert_eq!(
            kinds,
            vec![
                FrameKind::Intra,
                FrameKind::NonReference,
                FrameKind::NonReference,
                FrameKind::Reference,
                FrameKind::NonReference,
                FrameKind::NonReference,
                FrameKind::Intra,
                FrameKind::NonReference,
            ]
        );
        assert!((1..12).all(|i| frame_kind(i, 12, 0) == FrameKind::Reference));
    }

    #[test]
    fn test_单线程每帧立即输出() {
        let mut enc = VdeltaEncoder::create().unwrap();
        enc.open(&make_config(1, ThreadType::FRAME)).unwrap();
        let mut packets = Vec::new();
        for i in 0..3 {
            enc.send_frame(Some(&make_frame(i))).unwrap();
            let signal = drain(enc.as_mut(), &mut packets);
            assert!(matches!(signal, BianmaError::NeedMoreData));
            assert_eq!(packets.len(), i as usize + 1);
        }
        assert!(packets[0].is_keyframe);
        assert!(!packets[1].is_keyframe);
    }

    #[test]
    fn test_帧级并行产生延迟并在刷新时补齐() {
        let mut enc = VdeltaEncoder::create().unwrap();
        enc.open(&make_config(4, ThreadType::FRAME | ThreadType::SLICE))
            .unwrap();
        assert_eq!(enc.parameters().unwrap().video().unwrap().video_delay, 3);

        let mut packets = Vec::new();
        for i in 0..3 {
            enc.send_frame(Some(&make_frame(i))).unwrap();
            drain(enc.as_mut(), &mut packets);
        }
        assert!(packets.is_empty());

        enc.send_frame(Some(&make_frame(3))).unwrap();
        drain(enc.as_mut(), &mut packets);
        assert_eq!(packets.len(), 4);

        for i in 4..6 {
            enc.send_frame(Some(&make_frame(i))).unwrap();
            drain(enc.as_mut(), &mut packets);
        }
        assert_eq!(packets.len(), 4);

        enc.send_frame(None).unwrap();
        let signal = drain(enc.as_mut(), &mut packets);
        assert!(matches!(signal, BianmaError::Eof));
        let pts: Vec<_> = packets.iter().map(|p| p.pts).collect();
        assert_eq!(pts, vec![0, 1, 2, 3, 4, 5]);
        assert!(packets.iter().all(|p| p.dts == p.pts));
    }

    #[test]
    fn test_未取空时拒绝新帧() {
        let mut enc = VdeltaEncoder::create().unwrap();
        enc.open(&make_config(1, ThreadType::empty())).unwrap();
        enc.send_frame(Some(&make_frame(0))).unwrap();
        assert!(matches!(
            enc.send_frame(Some(&make_frame(1))),
            Err(BianmaError::NeedMoreData)
        ));
    }

    #[test]
    fn test_刷新后拒绝输入() {
        let mut enc = VdeltaEncoder::create().unwrap();
        enc.open(&make_config(1, ThreadType::empty())).unwrap();
        enc.send_frame(None).unwrap();
        assert!(matches!(
            enc.send_frame(Some(&make_frame(0))),
            Err(BianmaError::Eof)
        ));
    }

    #[test]
    fn test_无损往返_含非参考帧() {
        let mut cfg = make_config(3, ThreadType::FRAME | ThreadType::SLICE);
        cfg.gop_size = 5;
        cfg.max_b_frames = 1;
        let mut enc = VdeltaEncoder::create().unwrap();
        enc.open(&cfg).unwrap();

        let frames: Vec<_> = (0..11).map(make_frame).collect();
        let mut packets = Vec::new();
        for frame in &frames {
            enc.send_frame(Some(frame)).unwrap();
            drain(enc.as_mut(), &mut packets);
        }
        enc.send_frame(None).unwrap();
        drain(enc.as_mut(), &mut packets);
        assert_eq!(packets.len(), frames.len());

        let mut dec = VdeltaDecoder::create().unwrap();
        dec.open(&enc.parameters().unwrap()).unwrap();
        for (pkt, original) in packets.iter().zip(&frames) {
            dec.send_packet(pkt).unwrap();
            let decoded = dec.receive_frame().unwrap();
            assert_eq!(decoded.pts, original.pts);
            assert_eq!(decoded.data, original.data);
        }
    }
}
