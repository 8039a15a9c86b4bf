//! RIFF 视频标签映射.
//!
//! AVI 的 `strh.fccHandler` 与 `BITMAPINFOHEADER.biCompression` 用 FourCC 标识
//! 编码格式. rawvideo 的像素格式直接由 FourCC 决定, vdelta 的像素格式记录在 extradata 中.

use bianma_codec::CodecId;
use bianma_core::{BianmaError, BianmaResult, PixelFormat};

/// `BI_RGB`: 未压缩的 BGR 数据
pub const BI_RGB: u32 = 0;

/// vdelta 的 FourCC
pub const FCC_VDELTA: [u8; 4] = *b"VDLT";

/// 写入 strh/strf 的视频标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoTag {
    /// strh.fccHandler
    pub handler: [u8; 4],
    /// BITMAPINFOHEADER.biCompression
    pub compression: u32,
    /// BITMAPINFOHEADER.biBitCount
    pub bit_count: u16,
}

/// rawvideo 像素格式与 FourCC 对照, `None` 表示使用 BI_RGB
const RAW_TAGS: &[(PixelFormat, Option<[u8; 4]>, u16)] = &[
    (PixelFormat::Yuv420p, Some(*b"I420"), 12),
    (PixelFormat::Yuv422p, Some(*b"Y42B"), 16),
    (PixelFormat::Yuv444p, Some(*b"444P"), 24),
    (PixelFormat::Nv12, Some(*b"NV12"), 12),
    (PixelFormat::Nv21, Some(*b"NV21"), 12),
    (PixelFormat::Gray8, Some(*b"Y800"), 8),
    (PixelFormat::Rgb24, Some(*b"RGB\x18"), 24),
    (PixelFormat::Rgba, Some(*b"RGBA"), 32),
    (PixelFormat::Bgr24, None, 24),
    (PixelFormat::Bgra, None, 32),
];

/// 像素格式的每像素平均位数
pub fn bits_per_pixel(pixel_format: PixelFormat) -> u16 {
    RAW_TAGS
        .iter()
        .find(|(pf, _, _)| *pf == pixel_format)
        .map_or(0, |(_, _, bits)| *bits)
}

/// 根据编解码器和像素格式生成视频标签
pub fn video_tag(codec_id: CodecId, pixel_format: PixelFormat) -> BianmaResult<VideoTag> {
    match codec_id {
        CodecId::Vdelta => Ok(VideoTag {
            handler: FCC_VDELTA,
            compression: u32::from_le_bytes(FCC_VDELTA),
            bit_count: bits_per_pixel(pixel_format),
        }),
        CodecId::RawVideo => {
            let (_, fcc, bit_count) = RAW_TAGS
                .iter()
                .find(|(pf, _, _)| *pf == pixel_format)
                .ok_or_else(|| {
                    BianmaError::Unsupported(format!("AVI 不支持 rawvideo 像素格式 {pixel_format}"))
                })?;
            Ok(match fcc {
                Some(fcc) => VideoTag {
                    handler: *fcc,
                    compression: u32::from_le_bytes(*fcc),
                    bit_count: *bit_count,
                },
                None => VideoTag {
                    handler: [0; 4],
                    compression: BI_RGB,
                    bit_count: *bit_count,
                },
            })
        }
        CodecId::None => Err(BianmaError::Unsupported(
            "AVI 无法封装未知编解码器".into(),
        )),
    }
}

/// 从 biCompression/biBitCount 解析编解码器与像素格式
///
/// vdelta 返回 `PixelFormat::None`, 需由 extradata 补全.
pub fn parse_video_tag(compression: u32, bit_count: u16) -> Option<(CodecId, PixelFormat)> {
    if compression == u32::from_le_bytes(FCC_VDELTA) {
        return Some((CodecId::Vdelta, PixelFormat::None));
    }
    RAW_TAGS
        .iter()
        .find(|(_, fcc, bits)| match fcc {
            Some(fcc) => u32::from_le_bytes(*fcc) == compression,
            None => compression == BI_RGB && *bits == bit_count,
        })
        .map(|(pf, _, _)| (CodecId::RawVideo, *pf))
}
