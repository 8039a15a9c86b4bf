//! 输出探测: 重新打开编码产物, 报告容器和流信息.

use std::fmt;
use std::path::Path;

use bianma_codec::{CodecId, CodecRegistry, Packet, VideoFrame};
use bianma_core::{BianmaError, BianmaResult, PixelFormat, Rational};
use bianma_format::{FormatId, FormatRegistry, IoContext};
use log::debug;

/// 容器探测结果
#[derive(Debug, Clone)]
pub struct MediaInfo {
    /// 容器格式
    pub format: FormatId,
    /// 解封装器名称
    pub format_name: String,
    /// 时长 (秒)
    pub duration: Option<f64>,
    /// 各路流
    pub streams: Vec<StreamInfo>,
}

/// 单路流信息
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// 流索引
    pub index: usize,
    /// 编解码器
    pub codec_id: CodecId,
    /// 宽度
    pub width: u32,
    /// 高度
    pub height: u32,
    /// 像素格式
    pub pixel_format: PixelFormat,
    /// 帧率
    pub frame_rate: Rational,
    /// 流时间基
    pub time_base: Rational,
    /// 容器头部记录的帧数
    pub nb_frames: u64,
    /// 实际读到的数据包数
    pub packets_read: u64,
}

impl MediaInfo {
    /// 第一路视频流
    pub fn video(&self) -> Option<&StreamInfo> {
        self.streams.first()
    }
}

impl fmt::Display for MediaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "格式: {}", self.format_name)?;
        if let Some(d) = self.duration {
            write!(f, ", 时长: {d:.3}s")?;
        }
        for s in &self.streams {
            write!(
                f,
                "\n  流 #{}: {} {}x{} {}, {:.3} fps, 时间基 {}, 头部帧数 {}, 实际数据包 {}",
                s.index,
                s.codec_id,
                s.width,
                s.height,
                s.pixel_format,
                s.frame_rate.to_f64(),
                s.time_base,
                s.nb_frames,
                s.packets_read
            )?;
        }
        Ok(())
    }
}

/// 探测输出文件, 读完全部数据包统计每路流的实际包数
pub fn probe_output(path: impl AsRef<Path>) -> BianmaResult<MediaInfo> {
    probe_output_with(path, &FormatRegistry::global())
}

/// 使用指定注册表探测输出文件
pub fn probe_output_with(path: impl AsRef<Path>, registry: &FormatRegistry) -> BianmaResult<MediaInfo> {
    let path = path.as_ref();
    let mut io = IoContext::open_read(path)?;
    let mut demuxer = registry.open_input(&mut io, path.to_str())?;

    let mut streams: Vec<StreamInfo> = demuxer
        .streams()
        .iter()
        .map(|s| {
            let video = s.video();
            StreamInfo {
                index: s.index,
                codec_id: s.codec_id,
                width: video.map_or(0, |v| v.width),
                height: video.map_or(0, |v| v.height),
                pixel_format: video.map_or(PixelFormat::None, |v| v.pixel_format),
                frame_rate: video.map_or(Rational::UNDEFINED, |v| v.frame_rate),
                time_base: s.time_base,
                nb_frames: s.nb_frames,
                packets_read: 0,
            }
        })
        .collect();

    loop {
        match demuxer.read_packet(&mut io) {
            Ok(packet) => {
                if let Some(s) = streams.get_mut(packet.stream_index) {
                    s.packets_read += 1;
                }
            }
            Err(BianmaError::Eof) => break,
            Err(err) => return Err(err),
        }
    }

    debug!("探测完成: {}, {} 路流", path.display(), streams.len());
    Ok(MediaInfo {
        format: demuxer.format_id(),
        format_name: demuxer.name().to_string(),
        duration: demuxer.duration(),
        streams,
    })
}

/// 解码输出文件第一路视频流的全部帧 (按解码顺序)
pub fn decode_video(path: impl AsRef<Path>) -> BianmaResult<Vec<VideoFrame>> {
    let path = path.as_ref();
    let mut io = IoContext::open_read(path)?;
    let mut demuxer = FormatRegistry::global().open_input(&mut io, path.to_str())?;
    let stream = demuxer
        .streams()
        .first()
        .cloned()
        .ok_or(BianmaError::StreamNotFound(0))?;

    let mut decoder = CodecRegistry::global().create_decoder(stream.codec_id)?;
    decoder.open(&stream.codec_parameters())?;

    let mut frames = Vec::new();
    loop {
        let packet = match demuxer.read_packet(&mut io) {
            Ok(packet) if packet.stream_index == stream.index => packet,
            Ok(_) => continue,
            Err(BianmaError::Eof) => break,
            Err(err) => return Err(err),
        };
        decoder.send_packet(&packet)?;
        receive_all(decoder.as_mut(), &mut frames)?;
    }

    decoder.send_packet(&Packet::empty())?;
    receive_all(decoder.as_mut(), &mut frames)?;
    Ok(frames)
}

fn receive_all(
    decoder: &mut dyn bianma_codec::Decoder,
    frames: &mut Vec<VideoFrame>,
) -> BianmaResult<()> {
    loop {
        match decoder.receive_frame() {
            Ok(frame) => frames.push(frame),
            Err(err) if err.is_transient() => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}
