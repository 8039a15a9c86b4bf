//! # bianma-scale
//!
//! bianma 编码框架像素格式转换库.
//!
//! 本 crate 对标 FFmpeg 的 libswscale 的格式转换部分, 分辨率保持不变.
//! 编码管线用它把调用方提供的打包 RGB 帧转换为编码器需要的像素格式.

pub mod convert;

use bianma_core::{BianmaError, BianmaResult, PixelFormat};
use log::trace;

pub use convert::is_conversion_supported;

/// 像素格式转换上下文
///
/// 配置一次后可多次复用. 源和目标分辨率相同.
#[derive(Debug, Clone)]
pub struct ScaleContext {
    /// 宽度
    pub width: u32,
    /// 高度
    pub height: u32,
    /// 源像素格式
    pub src_format: PixelFormat,
    /// 目标像素格式
    pub dst_format: PixelFormat,
}

impl ScaleContext {
    /// 创建转换上下文
    ///
    /// 分辨率为 0 返回 `InvalidArgument`, 不支持的格式组合返回 `Unsupported`.
    pub fn new(
        width: u32,
        height: u32,
        src_format: PixelFormat,
        dst_format: PixelFormat,
    ) -> BianmaResult<Self> {
        if width == 0 || height == 0 {
            return Err(BianmaError::InvalidArgument(format!(
                "转换分辨率无效: {width}x{height}"
            )));
        }
        if !is_conversion_supported(src_format, dst_format) {
            return Err(BianmaError::Unsupported(format!(
                "不支持的格式转换: {src_format} → {dst_format}"
            )));
        }
        Ok(Self {
            width,
            height,
            src_format,
            dst_format,
        })
    }

    /// 执行格式转换
    ///
    /// # 参数
    /// - `src_data`: 源图像各平面数据
    /// - `src_linesize`: 源图像各平面行字节数
    /// - `dst_data`: 目标图像各平面数据 (输出)
    /// - `dst_linesize`: 目标图像各平面行字节数
    pub fn convert(
        &self,
        src_data: &[&[u8]],
        src_linesize: &[usize],
        dst_data: &mut [&mut [u8]],
        dst_linesize: &[usize],
    ) -> BianmaResult<()> {
        check_planes(self.src_format, self.width, self.height, src_data.iter().map(|p| p.len()), src_linesize, "源")?;
        check_planes(self.dst_format, self.width, self.height, dst_data.iter().map(|p| p.len()), dst_linesize, "目标")?;

        trace!(
            "格式转换: {}x{} {} → {}",
            self.width, self.height, self.src_format, self.dst_format
        );

        let input = convert::ConvertInput {
            planes: src_data.to_vec(),
            linesize: src_linesize.to_vec(),
            width: self.width,
            height: self.height,
            format: self.src_format,
        };
        let mut output = convert::ConvertOutput {
            planes: dst_data.iter_mut().map(|p| &mut **p).collect(),
            linesize: dst_linesize.to_vec(),
            width: self.width,
            height: self.height,
            format: self.dst_format,
        };
        convert::convert(&input, &mut output)
    }
}

/// 校验平面数量, 行跨度和缓冲区长度
fn check_planes(
    format: PixelFormat,
    width: u32,
    height: u32,
    lens: impl ExactSizeIterator<Item = usize>,
    linesize: &[usize],
    side: &str,
) -> BianmaResult<()> {
    let planes = format.plane_count() as usize;
    if lens.len() < planes || linesize.len() < planes {
        return Err(BianmaError::InvalidArgument(format!(
            "{side}平面数量不足: {format} 需要 {planes} 个"
        )));
    }
    for (plane, len) in lens.take(planes).enumerate() {
        let (Some(row_bytes), Some(rows)) = (
            format.plane_linesize(plane, width),
            format.plane_height(plane, height),
        ) else {
            return Err(BianmaError::InvalidArgument(format!("{side}像素格式无效: {format}")));
        };
        let stride = linesize[plane];
        if stride < row_bytes {
            return Err(BianmaError::InvalidArgument(format!(
                "{side}平面 {plane} 行跨度过小: {stride} < {row_bytes}"
            )));
        }
        let needed = stride * (rows - 1) + row_bytes;
        if len < needed {
            return Err(BianmaError::InvalidArgument(format!(
                "{side}平面 {plane} 数据不足: {len} < {needed}"
            )));
        }
    }
    Ok(())
}

/// 把连续缓冲区按紧凑布局切分为各平面
///
/// 返回平面切片和对应的行字节数. 缓冲区长度必须不小于帧大小.
pub fn split_packed(
    buffer: &[u8],
    format: PixelFormat,
    width: u32,
    height: u32,
) -> BianmaResult<(Vec<&[u8]>, Vec<usize>)> {
    let total = format
        .frame_size(width, height)
        .ok_or_else(|| BianmaError::InvalidArgument(format!("像素格式无效: {format}")))?;
    if buffer.len() < total {
        return Err(BianmaError::InvalidArgument(format!(
            "帧数据不足: {} < {total}",
            buffer.len()
        )));
    }

    let mut planes = Vec::new();
    let mut linesize = Vec::new();
    let mut offset = 0;
    for plane in 0..format.plane_count() as usize {
        let (Some(stride), Some(rows)) = (
            format.plane_linesize(plane, width),
            format.plane_height(plane, height),
        ) else {
            break;
        };
        let size = stride * rows;
        planes.push(&buffer[offset..offset + size]);
        linesize.push(stride);
        offset += size;
    }
    Ok((planes, linesize))
}
