//! AVI (Audio Video Interleave) 解封装器.
//!
//! AVI 基于 RIFF 格式, 结构如下:
//! ```text
//! RIFF 'AVI '
//!   LIST 'hdrl'
//!     avih (主 AVI 头: 56 字节)
//!     LIST 'strl' (每流一个)
//!       strh (流头)
//!       strf (BITMAPINFOHEADER + extradata)
//!   LIST 'movi' (数据块)
//!     00dc (视频数据)
//!   idx1 (可选旧式索引)
//! ```
//!
//! 只解析视频流; 其他类型的 strl 被跳过, 对应的数据块在读取时忽略.

use std::io::SeekFrom;

use bianma_codec::bitstream::parse_extradata;
use bianma_codec::{CodecId, Packet};
use bianma_core::{BianmaError, BianmaResult, MediaType, PixelFormat, Rational};
use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use log::{debug, warn};

use crate::demuxer::Demuxer;
use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::probe::{FormatProbe, ProbeScore, SCORE_EXTENSION, SCORE_MAX};
use crate::riff;
use crate::stream::{Stream, StreamParams, VideoStreamParams};

/// 视频流类型 FourCC
const FCC_VIDS: &[u8; 4] = b"vids";

/// idx1 索引条目标志: 关键帧
const AVIIF_KEYFRAME: u32 = 0x10;

/// idx1 索引条目
#[derive(Debug, Clone)]
struct Idx1Entry {
    chunk_id: [u8; 4],
    flags: u32,
    offset: u32,
    size: u32,
}

/// AVI 解封装器
pub struct AviDemuxer {
    streams: Vec<Stream>,
    /// AVI 流号 -> 本解封装器的流索引 (非视频流为 None)
    stream_map: Vec<Option<usize>>,
    /// movi 列表数据起始位置 (跳过 LIST + size + 'movi')
    movi_data_start: u64,
    /// movi 列表数据的字节大小 (不含 'movi' 标签)
    movi_data_size: u64,
    /// idx1 偏移的基准位置
    idx1_base: u64,
    idx1_entries: Vec<Idx1Entry>,
    /// 当前读取的索引位置
    idx_pos: usize,
    /// 每流已读取的帧计数 (用于 PTS)
    frame_counts: Vec<i64>,
}

impl AviDemuxer {
    /// 创建 AVI 解封装器实例 (工厂函数)
    pub fn create() -> BianmaResult<Box<dyn Demuxer>> {
        Ok(Box::new(Self {
            streams: Vec::new(),
            stream_map: Vec::new(),
            movi_data_start: 0,
            movi_data_size: 0,
            idx1_base: 0,
            idx1_entries: Vec::new(),
            idx_pos: 0,
            frame_counts: Vec::new(),
        }))
    }

    /// 读取 RIFF 块头 (返回块 ID 或列表类型, 大小, 是否为 LIST)
    fn read_riff_chunk_header(io: &mut IoContext) -> BianmaResult<([u8; 4], u32, bool)> {
        let chunk_id = io.read_tag()?;
        let chunk_size = io.read_u32_le()?;
        if &chunk_id == b"LIST" {
            let list_type = io.read_tag()?;
            Ok((list_type, chunk_size.saturating_sub(4), true))
        } else {
            Ok((chunk_id, chunk_size, false))
        }
    }

    /// 数据块 ID 中的流号 (`00dc` -> 0)
    fn chunk_stream_number(chunk_id: &[u8; 4]) -> Option<usize> {
        if chunk_id[0].is_ascii_digit() && chunk_id[1].is_ascii_digit() {
            Some(usize::from(chunk_id[0] - b'0') * 10 + usize::from(chunk_id[1] - b'0'))
        } else {
            None
        }
    }

    /// 解析 hdrl 列表
    fn parse_hdrl(&mut self, io: &mut IoContext, list_size: u32) -> BianmaResult<()> {
        let end = io.position()? + u64::from(list_size);

        while io.position()? < end {
            let (chunk_id, chunk_size, is_list) = Self::read_riff_chunk_header(io)?;
            match (&chunk_id, is_list) {
                (b"strl", true) => {
                    let strl_end = io.position()? + u64::from(chunk_size);
                    let stream = self.parse_strl(io, strl_end)?;
                    io.seek(SeekFrom::Start(strl_end))?;
                    match stream {
                        Some(stream) => {
                            self.stream_map.push(Some(self.streams.len()));
                            self.streams.push(stream);
                        }
                        None => self.stream_map.push(None),
                    }
                }
                (_, true) => io.skip(chunk_size as usize)?,
                (_, false) => {
                    // avih 的信息在 strh/strf 中都有, 直接跳过
                    io.skip((chunk_size + chunk_size % 2) as usize)?;
                }
            }
        }
        Ok(())
    }

    /// 解析一个 strl 列表, 非视频流返回 None
    fn parse_strl(&self, io: &mut IoContext, strl_end: u64) -> BianmaResult<Option<Stream>> {
        let mut fcc_type = [0u8; 4];
        let mut scale: u32 = 1;
        let mut rate: u32 = 1;
        let mut length: u32 = 0;
        let mut strf: Option<Vec<u8>> = None;

        while io.position()? < strl_end {
            let (sub_id, sub_size, sub_is_list) = Self::read_riff_chunk_header(io)?;
            if sub_is_list {
                io.skip(sub_size as usize)?;
                continue;
            }
            match &sub_id {
                b"strh" => {
                    if sub_size < 36 {
                        return Err(BianmaError::InvalidData("strh 块不足 36 字节".into()));
                    }
                    let data = io.read_bytes(sub_size as usize)?;
                    fcc_type.copy_from_slice(&data[0..4]);
                    scale = LittleEndian::read_u32(&data[20..24]);
                    rate = LittleEndian::read_u32(&data[24..28]);
                    length = LittleEndian::read_u32(&data[32..36]);
                }
                b"strf" => {
                    strf = Some(io.read_bytes(sub_size as usize)?);
                }
                _ => io.skip(sub_size as usize)?,
            }
            if sub_size % 2 != 0 {
                io.skip(1)?;
            }
        }

        if &fcc_type != FCC_VIDS {
            debug!(
                "跳过非视频流: {:?}",
                String::from_utf8_lossy(&fcc_type)
            );
            return Ok(None);
        }
        let strf = strf.ok_or_else(|| BianmaError::InvalidData("视频流缺少 strf 块".into()))?;
        if strf.len() < 40 {
            return Err(BianmaError::InvalidData("BITMAPINFOHEADER 不足 40 字节".into()));
        }
        if scale == 0 || rate == 0 {
            return Err(BianmaError::InvalidData(format!(
                "无效的流速率 {rate}/{scale}"
            )));
        }

        let bi_size = (LittleEndian::read_u32(&strf[0..4]) as usize).clamp(40, strf.len());
        let width = LittleEndian::read_i32(&strf[4..8]).unsigned_abs();
        let height = LittleEndian::read_i32(&strf[8..12]).unsigned_abs();
        let bit_count = LittleEndian::read_u16(&strf[14..16]);
        let compression = LittleEndian::read_u32(&strf[16..20]);
        let extra_data = strf[40..bi_size].to_vec();

        let (codec_id, pixel_format) = match riff::parse_video_tag(compression, bit_count) {
            Some((CodecId::Vdelta, _)) => {
                let header = parse_extradata(&extra_data)?;
                (CodecId::Vdelta, header.pixel_format)
            }
            Some(found) => found,
            None => {
                warn!(
                    "未知的视频 FourCC 0x{compression:08X}, 流按未知编解码器处理"
                );
                (CodecId::None, PixelFormat::None)
            }
        };

        let time_base = Rational::new(scale as i32, rate as i32);
        debug!(
            "AVI 视频流: {codec_id} {width}x{height} {pixel_format}, 时间基 {time_base}, {length} 帧"
        );

        Ok(Some(Stream {
            index: self.streams.len(),
            media_type: MediaType::Video,
            codec_id,
            time_base,
            duration: i64::from(length),
            start_time: 0,
            nb_frames: u64::from(length),
            extra_data,
            params: StreamParams::Video(VideoStreamParams {
                width,
                height,
                pixel_format,
                frame_rate: Rational::new(rate as i32, scale as i32),
                sample_aspect_ratio: Rational::new(1, 1),
                bit_rate: 0,
            }),
            metadata: Vec::new(),
        }))
    }

    /// 解析 idx1 索引
    fn parse_idx1(&mut self, io: &mut IoContext, chunk_size: u32) -> BianmaResult<()> {
        let data = io.read_bytes(chunk_size as usize)?;
        self.idx1_entries = data
            .chunks_exact(16)
            .map(|entry| {
                let mut chunk_id = [0u8; 4];
                chunk_id.copy_from_slice(&entry[0..4]);
                Idx1Entry {
                    chunk_id,
                    flags: LittleEndian::read_u32(&entry[4..8]),
                    offset: LittleEndian::read_u32(&entry[8..12]),
                    size: LittleEndian::read_u32(&entry[12..16]),
                }
            })
            .collect();
        debug!("idx1: {} 个索引条目", self.idx1_entries.len());
        Ok(())
    }

    /// 确定 idx1 偏移基准
    ///
    /// 规范写法相对 'movi' 标签, 部分写入器相对 movi 数据起始. 用第一个条目验证.
    fn resolve_idx1_base(&mut self, io: &mut IoContext) -> BianmaResult<()> {
        let Some(first) = self.idx1_entries.first().cloned() else {
            return Ok(());
        };
        let candidates = [self.movi_data_start - 4, self.movi_data_start];
        for base in candidates {
            io.seek(SeekFrom::Start(base + u64::from(first.offset)))?;
            if io.read_tag().ok() == Some(first.chunk_id) {
                self.idx1_base = base;
                return Ok(());
            }
        }
        warn!("idx1 偏移无法对齐, 改为顺序扫描 movi");
        self.idx1_entries.clear();
        Ok(())
    }

    /// 根据数据块构建数据包
    fn make_packet(
        &mut self,
        stream_index: usize,
        data: Vec<u8>,
        is_keyframe: bool,
        pos: u64,
    ) -> Packet {
        let pts = self.frame_counts[stream_index];
        self.frame_counts[stream_index] += 1;

        let mut pkt = Packet::from_data(Bytes::from(data));
        pkt.stream_index = stream_index;
        pkt.pts = pts;
        pkt.dts = pts;
        pkt.duration = 1;
        pkt.time_base = self.streams[stream_index].time_base;
        pkt.is_keyframe = is_keyframe;
        pkt.pos = pos as i64;
        pkt
    }

    fn mapped_stream(&self, chunk_id: &[u8; 4]) -> Option<usize> {
        let number = Self::chunk_stream_number(chunk_id)?;
        let code = &chunk_id[2..4];
        if code != b"dc" && code != b"db" {
            return None;
        }
        self.stream_map.get(number).copied().flatten()
    }
}

impl Demuxer for AviDemuxer {
    fn format_id(&self) -> FormatId {
        FormatId::Avi
    }

    fn name(&self) -> &str {
        "avi"
    }

    fn open(&mut self, io: &mut IoContext) -> BianmaResult<()> {
        if &io.read_tag()? != b"RIFF" {
            return Err(BianmaError::InvalidData("不是有效的 RIFF 文件".into()));
        }
        let _file_size = io.read_u32_le()?;
        if &io.read_tag()? != b"AVI " {
            return Err(BianmaError::InvalidData("不是有效的 AVI 文件".into()));
        }

        let mut has_movi = false;
        loop {
            let (chunk_id, chunk_size, is_list) = match Self::read_riff_chunk_header(io) {
                Ok(v) => v,
                Err(BianmaError::Eof) => break,
                Err(e) => return Err(e),
            };

            match (&chunk_id, is_list) {
                (b"hdrl", true) => self.parse_hdrl(io, chunk_size)?,
                (b"movi", true) => {
                    has_movi = true;
                    self.movi_data_start = io.position()?;
                    self.movi_data_size = u64::from(chunk_size);
                    io.seek(SeekFrom::Current(i64::from(chunk_size)))?;
                }
                (b"idx1", false) => {
                    if has_movi {
                        self.parse_idx1(io, chunk_size)?;
                    }
                    break;
                }
                (_, true) => io.skip(chunk_size as usize)?,
                (_, false) => io.skip((chunk_size + chunk_size % 2) as usize)?,
            }
        }

        if self.streams.is_empty() {
            return Err(BianmaError::InvalidData("AVI 文件中未找到视频流".into()));
        }
        if !has_movi {
            return Err(BianmaError::InvalidData("AVI 文件缺少 movi 列表".into()));
        }

        self.frame_counts = vec![0; self.streams.len()];
        self.resolve_idx1_base(io)?;
        if self.idx1_entries.is_empty() {
            io.seek(SeekFrom::Start(self.movi_data_start))?;
        }

        debug!(
            "AVI 打开完成: {} 个视频流, movi 起始={}, 索引条目={}",
            self.streams.len(),
            self.movi_data_start,
            self.idx1_entries.len()
        );
        Ok(())
    }

    fn streams(&self) -> &[Stream] {
        &self.streams
    }

    fn read_packet(&mut self, io: &mut IoContext) -> BianmaResult<Packet> {
        if !self.idx1_entries.is_empty() {
            while self.idx_pos < self.idx1_entries.len() {
                let entry = self.idx1_entries[self.idx_pos].clone();
                self.idx_pos += 1;
                let Some(stream_index) = self.mapped_stream(&entry.chunk_id) else {
                    continue;
                };
                let chunk_offset = self.idx1_base + u64::from(entry.offset) + 8;
                io.seek(SeekFrom::Start(chunk_offset))?;
                let data = io.read_bytes(entry.size as usize)?;
                let is_keyframe = entry.flags & AVIIF_KEYFRAME != 0;
                return Ok(self.make_packet(stream_index, data, is_keyframe, chunk_offset));
            }
            return Err(BianmaError::Eof);
        }

        // 无索引时顺序扫描 movi
        let movi_end = self.movi_data_start + self.movi_data_size;
        loop {
            let pos = io.position()?;
            if pos + 8 > movi_end {
                return Err(BianmaError::Eof);
            }
            let (chunk_id, chunk_size, is_list) = Self::read_riff_chunk_header(io)?;
            if is_list {
                // rec 列表: 进入列表继续扫描其中的数据块
                continue;
            }
            let Some(stream_index) = self.mapped_stream(&chunk_id) else {
                io.skip((chunk_size + chunk_size % 2) as usize)?;
                continue;
            };
            let data = io.read_bytes(chunk_size as usize)?;
            if chunk_size % 2 != 0 {
                io.skip(1)?;
            }
            // 无索引时无法区分关键帧, 按 dc 视为关键帧
            return Ok(self.make_packet(stream_index, data, true, pos));
        }
    }

    fn duration(&self) -> Option<f64> {
        let stream = self.streams.first()?;
        if stream.time_base.is_valid() && stream.duration > 0 {
            Some(stream.duration as f64 * stream.time_base.to_f64())
        } else {
            None
        }
    }
}

/// AVI 格式探测器
pub struct AviProbe;

impl FormatProbe for AviProbe {
    fn probe(&self, data: &[u8], filename: Option<&str>) -> Option<ProbeScore> {
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"AVI " {
            return Some(SCORE_MAX);
        }
        let name = filename?;
        (FormatId::from_filename(name) == Some(FormatId::Avi)).then_some(SCORE_EXTENSION)
    }

    fn format_id(&self) -> FormatId {
        FormatId::Avi
    }
}
