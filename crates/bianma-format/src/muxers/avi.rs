//! AVI (Audio Video Interleave) 封装器.
//!
//! 写入流程:
//! 1. `write_header()` - 写入 RIFF/AVI 头, hdrl 列表 (avih, 每流一个 strl/strh/strf)
//! 2. `write_packet()` - 写入 `NNdc` 数据块并记录 idx1 条目
//! 3. `write_trailer()` - 写入 idx1 索引, 回填 RIFF/movi 大小、总帧数和每流长度

use std::io::SeekFrom;

use bianma_codec::Packet;
use bianma_core::{BianmaError, BianmaResult, MediaType, PixelFormat, Rational};
use log::debug;

use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::muxer::Muxer;
use crate::riff;
use crate::stream::Stream;

/// 视频流类型 FourCC
const FCC_VIDS: &[u8; 4] = b"vids";

/// avih.dwFlags: 文件带 idx1 索引
const AVIF_HASINDEX: u32 = 0x10;

/// idx1 索引条目标志: 关键帧
const AVIIF_KEYFRAME: u32 = 0x10;

/// BITMAPINFOHEADER 固定部分大小
const BITMAPINFOHEADER_SIZE: u32 = 40;

/// idx1 索引条目
struct Idx1Entry {
    chunk_id: [u8; 4],
    flags: u32,
    offset: u32,
    size: u32,
}

/// 每流写入状态
struct StreamState {
    /// 数据块 ID, 如 `00dc`
    chunk_id: [u8; 4],
    /// strh.dwLength 字段的文件偏移
    length_offset: u64,
    /// 已写入的帧数
    frame_count: u32,
}

/// AVI 封装器
pub struct AviMuxer {
    streams: Vec<StreamState>,
    /// movi 列表数据起始位置 ('movi' 标签之后)
    movi_data_start: u64,
    /// movi 列表大小字段的文件偏移
    movi_size_offset: u64,
    /// RIFF 大小字段的文件偏移
    riff_size_offset: u64,
    /// avih.dwTotalFrames 字段的文件偏移
    total_frames_offset: u64,
    idx1_entries: Vec<Idx1Entry>,
}

impl AviMuxer {
    /// 创建 AVI 封装器实例 (工厂函数)
    pub fn create() -> BianmaResult<Box<dyn Muxer>> {
        Ok(Box::new(Self {
            streams: Vec::new(),
            movi_data_start: 0,
            movi_size_offset: 0,
            riff_size_offset: 0,
            total_frames_offset: 0,
            idx1_entries: Vec::new(),
        }))
    }

    /// 流的帧率, 未设置时由时间基推出
    fn frame_rate(stream: &Stream) -> Rational {
        match stream.video() {
            Some(v) if v.frame_rate.is_positive() => v.frame_rate,
            _ => stream.time_base.invert(),
        }
    }

    /// 写入 strh 块, 返回 dwLength 字段的偏移
    fn write_strh(io: &mut IoContext, stream: &Stream, handler: &[u8; 4]) -> BianmaResult<u64> {
        let rate = Self::frame_rate(stream);
        let (width, height) = stream.video().map_or((0, 0), |v| (v.width, v.height));

        io.write_tag(b"strh")?;
        io.write_u32_le(56)?;
        io.write_tag(FCC_VIDS)?;
        io.write_tag(handler)?;
        io.write_u32_le(0)?; // dwFlags
        io.write_u16_le(0)?; // wPriority
        io.write_u16_le(0)?; // wLanguage
        io.write_u32_le(0)?; // dwInitialFrames
        io.write_u32_le(rate.den as u32)?; // dwScale
        io.write_u32_le(rate.num as u32)?; // dwRate
        io.write_u32_le(0)?; // dwStart
        let length_offset = io.position()?;
        io.write_u32_le(0)?; // dwLength, 尾部回填
        io.write_u32_le(0)?; // dwSuggestedBufferSize
        io.write_u32_le(u32::MAX)?; // dwQuality, 默认
        io.write_u32_le(0)?; // dwSampleSize
        io.write_u16_le(0)?; // rcFrame
        io.write_u16_le(0)?;
        io.write_u16_le(width as u16)?;
        io.write_u16_le(height as u16)?;
        Ok(length_offset)
    }

    /// 写入 strf 块 (BITMAPINFOHEADER + extradata)
    fn write_strf(io: &mut IoContext, stream: &Stream, tag: &riff::VideoTag) -> BianmaResult<()> {
        let video = stream
            .video()
            .ok_or_else(|| BianmaError::InvalidArgument("期望视频流参数".into()))?;
        let size_image = video
            .pixel_format
            .frame_size(video.width, video.height)
            .unwrap_or(0) as u32;
        let extra_len = stream.extra_data.len() as u32;
        let chunk_size = BITMAPINFOHEADER_SIZE + extra_len;

        io.write_tag(b"strf")?;
        io.write_u32_le(chunk_size)?;
        io.write_u32_le(chunk_size)?; // biSize 包含 extradata
        io.write_i32_le(video.width as i32)?;
        io.write_i32_le(video.height as i32)?;
        io.write_u16_le(1)?; // biPlanes
        io.write_u16_le(tag.bit_count)?;
        io.write_u32_le(tag.compression)?;
        io.write_u32_le(size_image)?;
        io.write_i32_le(0)?; // biXPelsPerMeter
        io.write_i32_le(0)?; // biYPelsPerMeter
        io.write_u32_le(0)?; // biClrUsed
        io.write_u32_le(0)?; // biClrImportant
        io.write_all(&stream.extra_data)?;
        if chunk_size % 2 != 0 {
            io.write_all(&[0])?;
        }
        Ok(())
    }

    /// 回填一个 u32 字段, 写完后回到原位置
    fn patch_u32(io: &mut IoContext, offset: u64, value: u32) -> BianmaResult<()> {
        let current = io.position()?;
        io.seek(SeekFrom::Start(offset))?;
        io.write_u32_le(value)?;
        io.seek(SeekFrom::Start(current))?;
        Ok(())
    }
}

impl Muxer for AviMuxer {
    fn format_id(&self) -> FormatId {
        FormatId::Avi
    }

    fn name(&self) -> &str {
        "avi"
    }

    fn write_header(&mut self, io: &mut IoContext, streams: &[Stream]) -> BianmaResult<()> {
        let Some(first) = streams.first() else {
            return Err(BianmaError::InvalidArgument("AVI: 没有输入流".into()));
        };
        if streams.len() > 100 {
            return Err(BianmaError::Unsupported("AVI 最多支持 100 条流".into()));
        }
        if let Some(s) = streams.iter().find(|s| s.media_type != MediaType::Video) {
            return Err(BianmaError::Unsupported(format!(
                "AVI 封装器不支持 {} 流 (流 #{})",
                s.media_type, s.index
            )));
        }

        let rate = Self::frame_rate(first);
        let micro_sec_per_frame = if rate.is_positive() {
            (1_000_000i64 * i64::from(rate.den) / i64::from(rate.num)) as u32
        } else {
            0
        };
        let (width, height) = first.video().map_or((0, 0), |v| (v.width, v.height));

        io.write_tag(b"RIFF")?;
        self.riff_size_offset = io.position()?;
        io.write_u32_le(0)?;
        io.write_tag(b"AVI ")?;

        let hdrl_start = io.position()?;
        io.write_tag(b"LIST")?;
        let hdrl_size_offset = io.position()?;
        io.write_u32_le(0)?;
        io.write_tag(b"hdrl")?;

        io.write_tag(b"avih")?;
        io.write_u32_le(56)?;
        io.write_u32_le(micro_sec_per_frame)?;
        io.write_u32_le(0)?; // dwMaxBytesPerSec
        io.write_u32_le(0)?; // dwPaddingGranularity
        io.write_u32_le(AVIF_HASINDEX)?;
        self.total_frames_offset = io.position()?;
        io.write_u32_le(0)?; // dwTotalFrames, 尾部回填
        io.write_u32_le(0)?; // dwInitialFrames
        io.write_u32_le(streams.len() as u32)?;
        io.write_u32_le(0)?; // dwSuggestedBufferSize
        io.write_u32_le(width)?;
        io.write_u32_le(height)?;
        for _ in 0..4 {
            io.write_u32_le(0)?; // dwReserved
        }

        self.streams.clear();
        for (idx, stream) in streams.iter().enumerate() {
            let pixel_format = stream.video().map_or(PixelFormat::None, |v| v.pixel_format);
            let tag = riff::video_tag(stream.codec_id, pixel_format)?;

            let strl_start = io.position()?;
            io.write_tag(b"LIST")?;
            let strl_size_offset = io.position()?;
            io.write_u32_le(0)?;
            io.write_tag(b"strl")?;

            let length_offset = Self::write_strh(io, stream, &tag.handler)?;
            Self::write_strf(io, stream, &tag)?;

            let strl_end = io.position()?;
            Self::patch_u32(io, strl_size_offset, (strl_end - strl_start - 8) as u32)?;

            let mut chunk_id = [0u8; 4];
            chunk_id.copy_from_slice(format!("{idx:02}dc").as_bytes());
            self.streams.push(StreamState {
                chunk_id,
                length_offset,
                frame_count: 0,
            });
        }

        let hdrl_end = io.position()?;
        Self::patch_u32(io, hdrl_size_offset, (hdrl_end - hdrl_start - 8) as u32)?;

        io.write_tag(b"LIST")?;
        self.movi_size_offset = io.position()?;
        io.write_u32_le(0)?;
        io.write_tag(b"movi")?;
        self.movi_data_start = io.position()?;
        self.idx1_entries.clear();

        debug!(
            "AVI 写入头部: {} 个流, {}x{}, 帧率 {}, movi 起始={}",
            streams.len(),
            width,
            height,
            rate,
            self.movi_data_start
        );
        Ok(())
    }

    fn write_packet(&mut self, io: &mut IoContext, packet: &Packet) -> BianmaResult<()> {
        let state = self
            .streams
            .get_mut(packet.stream_index)
            .ok_or(BianmaError::StreamNotFound(packet.stream_index))?;

        // idx1 偏移相对 'movi' 标签
        let offset = (io.position()? - self.movi_data_start + 4) as u32;
        let size = packet.data.len() as u32;

        io.write_tag(&state.chunk_id)?;
        io.write_u32_le(size)?;
        io.write_all(&packet.data)?;
        if size % 2 != 0 {
            io.write_all(&[0])?;
        }
        state.frame_count += 1;

        self.idx1_entries.push(Idx1Entry {
            chunk_id: state.chunk_id,
            flags: if packet.is_keyframe { AVIIF_KEYFRAME } else { 0 },
            offset,
            size,
        });
        Ok(())
    }

    fn write_trailer(&mut self, io: &mut IoContext) -> BianmaResult<()> {
        let movi_end = io.position()?;
        // movi 大小包含 'movi' 标签本身
        let movi_size = (movi_end - self.movi_data_start + 4) as u32;

        io.write_tag(b"idx1")?;
        io.write_u32_le((self.idx1_entries.len() * 16) as u32)?;
        for entry in &self.idx1_entries {
            io.write_tag(&entry.chunk_id)?;
            io.write_u32_le(entry.flags)?;
            io.write_u32_le(entry.offset)?;
            io.write_u32_le(entry.size)?;
        }

        if !io.is_seekable() {
            debug!("AVI 输出不可 seek, 跳过头部回填");
            return Ok(());
        }

        let file_end = io.position()?;
        Self::patch_u32(io, self.riff_size_offset, (file_end - 8) as u32)?;
        Self::patch_u32(io, self.movi_size_offset, movi_size)?;
        let total_frames = self.streams.first().map_or(0, |s| s.frame_count);
        Self::patch_u32(io, self.total_frames_offset, total_frames)?;
        for state in &self.streams {
            Self::patch_u32(io, state.length_offset, state.frame_count)?;
        }

        debug!(
            "AVI 写入尾部: idx1 条目数={}, 总帧数={}",
            self.idx1_entries.len(),
            total_frames
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryBackend;
    use crate::stream::{StreamParams, VideoStreamParams};
    use bianma_codec::CodecId;

    fn make_video_stream(extra_data: Vec<u8>) -> Stream {
        Stream {
            index: 0,
            media_type: MediaType::Video,
            codec_id: CodecId::RawVideo,
            time_base: Rational::new(1, 90000),
            duration: -1,
            start_time: 0,
            nb_frames: 0,
            extra_data,
            params: StreamParams::Video(VideoStreamParams {
                width: 4,
                height: 2,
                pixel_format: PixelFormat::Yuv420p,
                frame_rate: Rational::new(30000, 1001),
                sample_aspect_ratio: Rational::new(1, 1),
                bit_rate: 0,
            }),
            metadata: Vec::new(),
        }
    }

    fn u32_at(data: &[u8], pos: usize) -> u32 {
        u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
    }

    fn find(data: &[u8], tag: &[u8; 4]) -> usize {
        data.windows(4).position(|w| w == tag).unwrap()
    }

    #[test]
    fn test_写入并回填() {
        let backend = MemoryBackend::new();
        let handle = backend.handle();
        let mut io = IoContext::new(Box::new(backend));

        let mut muxer = AviMuxer::create().unwrap();
        muxer
            .write_header(&mut io, &[make_video_stream(Vec::new())])
            .unwrap();
        for i in 0..3 {
            let mut pkt = Packet::from_data(vec![i as u8; 13]);
            pkt.is_keyframe = i == 0;
            muxer.write_packet(&mut io, &pkt).unwrap();
        }
        muxer.write_trailer(&mut io).unwrap();

        let data = handle.contents();
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(u32_at(&data, 4) as usize, data.len() - 8);

        let avih = find(&data, b"avih");
        // dwMicroSecPerFrame = 1e6 * 1001 / 30000
        assert_eq!(u32_at(&data, avih + 8), 33366);
        assert_eq!(u32_at(&data, avih + 8 + 16), 3);

        let strh = find(&data, b"strh");
        assert_eq!(&data[strh + 12..strh + 16], b"I420");
        assert_eq!(u32_at(&data, strh + 28), 1001);
        assert_eq!(u32_at(&data, strh + 32), 30000);
        assert_eq!(u32_at(&data, strh + 40), 3);

        let idx1 = find(&data, b"idx1");
        assert_eq!(u32_at(&data, idx1 + 4), 3 * 16);
        assert_eq!(u32_at(&data, idx1 + 12), AVIIF_KEYFRAME);
        assert_eq!(u32_at(&data, idx1 + 12 + 16), 0);
    }

    #[test]
    fn test_extradata_写入_strf() {
        let backend = MemoryBackend::new();
        let handle = backend.handle();
        let mut io = IoContext::new(Box::new(backend));

        let mut muxer = AviMuxer::create().unwrap();
        muxer
            .write_header(&mut io, &[make_video_stream(vec![9, 8, 7])])
            .unwrap();
        muxer.write_trailer(&mut io).unwrap();

        let data = handle.contents();
        let strf = find(&data, b"strf");
        assert_eq!(u32_at(&data, strf + 4), 43);
        assert_eq!(u32_at(&data, strf + 8), 43);
        assert_eq!(&data[strf + 48..strf + 51], &[9, 8, 7]);
        // 奇数大小补齐
        assert_eq!(data[strf + 51], 0);
    }

    #[test]
    fn test_空流列表报错() {
        let mut io = IoContext::new(Box::new(MemoryBackend::new()));
        let mut muxer = AviMuxer::create().unwrap();
        let err = muxer.write_header(&mut io, &[]).unwrap_err();
        assert!(matches!(err, BianmaError::InvalidArgument(_)));
    }

    #[test]
    fn test_未知流索引报错() {
        let mut io = IoContext::new(Box::new(MemoryBackend::new()));
        let mut muxer = AviMuxer::create().unwrap();
        muxer
            .write_header(&mut io, &[make_video_stream(Vec::new())])
            .unwrap();
        let mut pkt = Packet::from_data(vec![0u8; 4]);
        pkt.stream_index = 1;
        let err = muxer.write_packet(&mut io, &pkt).unwrap_err();
        assert!(matches!(err, BianmaError::StreamNotFound(1)));
    }
}
