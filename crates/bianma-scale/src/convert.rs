//! 像素格式转换模块.
//!
//! 对标 FFmpeg libswscale 的格式转换部分. 支持的转换路径:
//! - 打包 RGB (rgb24/bgr24/rgba/bgra) → yuv420p / yuv422p / yuv444p / nv12 / gray8
//! - 打包 RGB 之间的通道重排
//! - yuv420p ↔ nv12
//! - yuv420p → rgb24
//!
//! 使用 BT.601 标准色彩矩阵:
//! ```text
//! Y  =  0.299 * R + 0.587 * G + 0.114 * B
//! Cb = -0.169 * R - 0.331 * G + 0.500 * B + 128
//! Cr =  0.500 * R - 0.419 * G - 0.081 * B + 128
//! ```
//!
//! 按行并行 (rayon), 每个输出行只被一个任务写入.

use bianma_core::{BianmaError, BianmaResult, PixelFormat};
use rayon::prelude::*;

/// 像素格式转换输入 (各平面数据切片)
pub struct ConvertInput<'a> {
    /// 各平面数据
    pub planes: Vec<&'a [u8]>,
    /// 各平面行字节数
    pub linesize: Vec<usize>,
    /// 宽度
    pub width: u32,
    /// 高度
    pub height: u32,
    /// 像素格式
    pub format: PixelFormat,
}

/// 像素格式转换输出 (各平面可变数据)
pub struct ConvertOutput<'a> {
    /// 各平面数据
    pub planes: Vec<&'a mut [u8]>,
    /// 各平面行字节数
    pub linesize: Vec<usize>,
    /// 宽度
    pub width: u32,
    /// 高度
    pub height: u32,
    /// 像素格式
    pub format: PixelFormat,
}

/// 打包 RGB 的通道偏移
#[derive(Debug, Clone, Copy)]
struct RgbLayout {
    r: usize,
    g: usize,
    b: usize,
    /// 每像素字节数
    bpp: usize,
}

impl RgbLayout {
    fn of(format: PixelFormat) -> Option<Self> {
        let (r, g, b, bpp) = match format {
            PixelFormat::Rgb24 => (0, 1, 2, 3),
            PixelFormat::Bgr24 => (2, 1, 0, 3),
            PixelFormat::Rgba => (0, 1, 2, 4),
            PixelFormat::Bgra => (2, 1, 0, 4),
            _ => return None,
        };
        Some(Self { r, g, b, bpp })
    }

    #[inline]
    fn rgb(&self, row: &[u8], col: usize) -> (i32, i32, i32) {
        let off = col * self.bpp;
        (
            i32::from(row[off + self.r]),
            i32::from(row[off + self.g]),
            i32::from(row[off + self.b]),
        )
    }
}

/// 检查给定的格式转换是否支持 (同格式复制总是支持)
pub fn is_conversion_supported(src: PixelFormat, dst: PixelFormat) -> bool {
    if src == PixelFormat::None || dst == PixelFormat::None {
        return false;
    }
    if src == dst {
        return true;
    }
    if RgbLayout::of(src).is_some() {
        return matches!(
            dst,
            PixelFormat::Yuv420p
                | PixelFormat::Yuv422p
                | PixelFormat::Yuv444p
                | PixelFormat::Nv12
                | PixelFormat::Gray8
                | PixelFormat::Rgb24
                | PixelFormat::Bgr24
                | PixelFormat::Rgba
                | PixelFormat::Bgra
        );
    }
    matches!(
        (src, dst),
        (PixelFormat::Yuv420p, PixelFormat::Nv12)
            | (PixelFormat::Nv12, PixelFormat::Yuv420p)
            | (PixelFormat::Yuv420p, PixelFormat::Rgb24)
    )
}

/// 执行像素格式转换
pub fn convert(src: &ConvertInput, dst: &mut ConvertOutput) -> BianmaResult<()> {
    if src.width != dst.width || src.height != dst.height {
        return Err(BianmaError::InvalidArgument(
            "像素格式转换要求源和目标分辨率相同".into(),
        ));
    }

    if src.format == dst.format {
        copy_planes(src, dst);
        return Ok(());
    }

    if let Some(layout) = RgbLayout::of(src.format) {
        return match dst.format {
            PixelFormat::Yuv420p => rgb_to_yuv_planar(src, dst, layout, (2, 2)),
            PixelFormat::Yuv422p => rgb_to_yuv_planar(src, dst, layout, (2, 1)),
            PixelFormat::Yuv444p => rgb_to_yuv_planar(src, dst, layout, (1, 1)),
            PixelFormat::Nv12 => rgb_to_nv12(src, dst, layout),
            PixelFormat::Gray8 => rgb_to_gray8(src, dst, layout),
            other => match RgbLayout::of(other) {
                Some(dst_layout) => rgb_to_rgb(src, dst, layout, dst_layout),
                None => Err(unsupported(src.format, other)),
            },
        };
    }

    match (src.format, dst.format) {
        (PixelFormat::Yuv420p, PixelFormat::Nv12) => yuv420p_to_nv12(src, dst),
        (PixelFormat::Nv12, PixelFormat::Yuv420p) => nv12_to_yuv420p(src, dst),
        (PixelFormat::Yuv420p, PixelFormat::Rgb24) => yuv420p_to_rgb24(src, dst),
        (from, to) => Err(unsupported(from, to)),
    }
}

fn unsupported(src: PixelFormat, dst: PixelFormat) -> BianmaError {
    BianmaError::Unsupported(format!("不支持的格式转换: {src} → {dst}"))
}

// ============================================================
// BT.601 颜色空间转换常量 (定点数, 缩放 256 倍)
// ============================================================

/// Y = 0.299*R + 0.587*G + 0.114*B
const Y_R: i32 = 77; // 0.299 * 256
const Y_G: i32 = 150; // 0.587 * 256
const Y_B: i32 = 29; // 0.114 * 256

/// Cb = -0.169*R - 0.331*G + 0.500*B + 128
const CB_R: i32 = -43; // -0.169 * 256
const CB_G: i32 = -85; // -0.331 * 256
const CB_B: i32 = 128; // 0.500 * 256

/// Cr = 0.500*R - 0.419*G - 0.081*B + 128
const CR_R: i32 = 128; // 0.500 * 256
const CR_G: i32 = -107; // -0.419 * 256
const CR_B: i32 = -21; // -0.081 * 256

#[inline]
fn luma(r: i32, g: i32, b: i32) -> u8 {
    ((Y_R * r + Y_G * g + Y_B * b + 128) >> 8).clamp(0, 255) as u8
}

#[inline]
fn chroma(r: i32, g: i32, b: i32) -> (u8, u8) {
    let cb = ((CB_R * r + CB_G * g + CB_B * b + 128) >> 8) + 128;
    let cr = ((CR_R * r + CR_G * g + CR_B * b + 128) >> 8) + 128;
    (cb.clamp(0, 255) as u8, cr.clamp(0, 255) as u8)
}

/// 对 (sx × sy) 块取平均后计算色度, 越界像素不参与
fn block_chroma(
    src: &ConvertInput,
    layout: RgbLayout,
    cx: usize,
    cy: usize,
    (sx, sy): (usize, usize),
) -> (u8, u8) {
    let w = src.width as usize;
    let h = src.height as usize;
    let stride = src.linesize[0];
    let (mut sum_r, mut sum_g, mut sum_b, mut count) = (0i32, 0i32, 0i32, 0i32);
    for row in cy * sy..((cy + 1) * sy).min(h) {
        let line = &src.planes[0][row * stride..];
        for col in cx * sx..((cx + 1) * sx).min(w) {
            let (r, g, b) = layout.rgb(line, col);
            sum_r += r;
            sum_g += g;
            sum_b += b;
            count += 1;
        }
    }
    chroma(sum_r / count, sum_g / count, sum_b / count)
}

/// 亮度平面 (也用于 gray8), 按行并行
fn write_luma(src: &ConvertInput, layout: RgbLayout, out: &mut [u8], out_stride: usize) {
    let w = src.width as usize;
    let h = src.height as usize;
    let stride = src.linesize[0];
    out.par_chunks_mut(out_stride)
        .take(h)
        .enumerate()
        .for_each(|(row, out_row)| {
            let line = &src.planes[0][row * stride..];
            for (col, y) in out_row[..w].iter_mut().enumerate() {
                let (r, g, b) = layout.rgb(line, col);
                *y = luma(r, g, b);
            }
        });
}

// ============================================================
// 打包 RGB → YUV
// ============================================================

/// 打包 RGB → 平面 YUV (色度按 sx × sy 下采样, 奇数尺寸向上取整)
fn rgb_to_yuv_planar(
    src: &ConvertInput,
    dst: &mut ConvertOutput,
    layout: RgbLayout,
    (sx, sy): (usize, usize),
) -> BianmaResult<()> {
    let w = src.width as usize;
    let h = src.height as usize;
    let chroma_w = w.div_ceil(sx);
    let chroma_h = h.div_ceil(sy);
    let (y_stride, u_stride, v_stride) = (dst.linesize[0], dst.linesize[1], dst.linesize[2]);

    let [y_plane, u_plane, v_plane] = dst.planes.as_mut_slice() else {
        return Err(BianmaError::InvalidArgument("平面 YUV 需要 3 个输出平面".into()));
    };

    write_luma(src, layout, y_plane, y_stride);

    u_plane
        .par_chunks_mut(u_stride)
        .zip(v_plane.par_chunks_mut(v_stride))
        .take(chroma_h)
        .enumerate()
        .for_each(|(cy, (u_row, v_row))| {
            for cx in 0..chroma_w {
                let (cb, cr) = block_chroma(src, layout, cx, cy, (sx, sy));
                u_row[cx] = cb;
                v_row[cx] = cr;
            }
        });
    Ok(())
}

/// 打包 RGB → NV12 (UV 交错, 2x2 下采样)
fn rgb_to_nv12(src: &ConvertInput, dst: &mut ConvertOutput, layout: RgbLayout) -> BianmaResult<()> {
    let w = src.width as usize;
    let h = src.height as usize;
    let (y_stride, uv_stride) = (dst.linesize[0], dst.linesize[1]);

    let [y_plane, uv_plane] = dst.planes.as_mut_slice() else {
        return Err(BianmaError::InvalidArgument("NV12 需要 2 个输出平面".into()));
    };

    write_luma(src, layout, y_plane, y_stride);

    uv_plane
        .par_chunks_mut(uv_stride)
        .take(h.div_ceil(2))
        .enumerate()
        .for_each(|(cy, uv_row)| {
            for cx in 0..w.div_ceil(2) {
                let (cb, cr) = block_chroma(src, layout, cx, cy, (2, 2));
                uv_row[cx * 2] = cb;
                uv_row[cx * 2 + 1] = cr;
            }
        });
    Ok(())
}

/// 打包 RGB → Gray8 (BT.601 亮度)
fn rgb_to_gray8(src: &ConvertInput, dst: &mut ConvertOutput, layout: RgbLayout) -> BianmaResult<()> {
    let stride = dst.linesize[0];
    write_luma(src, layout, &mut dst.planes[0], stride);
    Ok(())
}

/// 打包 RGB 之间的通道重排, 输出带 alpha 时填 255
fn rgb_to_rgb(
    src: &ConvertInput,
    dst: &mut ConvertOutput,
    from: RgbLayout,
    to: RgbLayout,
) -> BianmaResult<()> {
    let w = src.width as usize;
    let h = src.height as usize;
    let src_stride = src.linesize[0];
    let dst_stride = dst.linesize[0];
    dst.planes[0]
        .par_chunks_mut(dst_stride)
        .take(h)
        .enumerate()
        .for_each(|(row, out_row)| {
            let line = &src.planes[0][row * src_stride..];
            for col in 0..w {
                let (r, g, b) = from.rgb(line, col);
                let d = col * to.bpp;
                out_row[d + to.r] = r as u8;
                out_row[d + to.g] = g as u8;
                out_row[d + to.b] = b as u8;
                if to.bpp == 4 {
                    out_row[d + 3] = 255;
                }
            }
        });
    Ok(())
}

// ============================================================
// YUV 之间与 YUV → RGB
// ============================================================

/// YUV420P → NV12 (U/V 平面交错)
fn yuv420p_to_nv12(src: &ConvertInput, dst: &mut ConvertOutput) -> BianmaResult<()> {
    let w = src.width as usize;
    let h = src.height as usize;
    let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
    let (u_stride, v_stride) = (src.linesize[1], src.linesize[2]);
    let (y_dst_stride, uv_stride) = (dst.linesize[0], dst.linesize[1]);

    copy_plane(src.planes[0], src.linesize[0], &mut dst.planes[0], y_dst_stride, w, h);
    dst.planes[1]
        .par_chunks_mut(uv_stride)
        .take(ch)
        .enumerate()
        .for_each(|(row, uv_row)| {
            let u = &src.planes[1][row * u_stride..];
            let v = &src.planes[2][row * v_stride..];
            for col in 0..cw {
                uv_row[col * 2] = u[col];
                uv_row[col * 2 + 1] = v[col];
            }
        });
    Ok(())
}

/// NV12 → YUV420P (拆分交错的 UV 平面)
fn nv12_to_yuv420p(src: &ConvertInput, dst: &mut ConvertOutput) -> BianmaResult<()> {
    let w = src.width as usize;
    let h = src.height as usize;
    let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
    let uv_stride = src.linesize[1];
    let (y_stride, u_stride, v_stride) = (dst.linesize[0], dst.linesize[1], dst.linesize[2]);

    let [y_plane, u_plane, v_plane] = dst.planes.as_mut_slice() else {
        return Err(BianmaError::InvalidArgument("YUV420P 需要 3 个输出平面".into()));
    };
    copy_plane(src.planes[0], src.linesize[0], y_plane, y_stride, w, h);
    u_plane
        .par_chunks_mut(u_stride)
        .zip(v_plane.par_chunks_mut(v_stride))
        .take(ch)
        .enumerate()
        .for_each(|(row, (u_row, v_row))| {
            let uv = &src.planes[1][row * uv_stride..];
            for col in 0..cw {
                u_row[col] = uv[col * 2];
                v_row[col] = uv[col * 2 + 1];
            }
        });
    Ok(())
}

/// YUV420P → RGB24 (BT.601)
fn yuv420p_to_rgb24(src: &ConvertInput, dst: &mut ConvertOutput) -> BianmaResult<()> {
    let w = src.width as usize;
    let h = src.height as usize;
    let (y_stride, u_stride, v_stride) = (src.linesize[0], src.linesize[1], src.linesize[2]);
    let dst_stride = dst.linesize[0];

    dst.planes[0]
        .par_chunks_mut(dst_stride)
        .take(h)
        .enumerate()
        .for_each(|(row, rgb)| {
            for col in 0..w {
                let y = i32::from(src.planes[0][row * y_stride + col]);
                let u = i32::from(src.planes[1][(row / 2) * u_stride + col / 2]) - 128;
                let v = i32::from(src.planes[2][(row / 2) * v_stride + col / 2]) - 128;

                // BT.601 逆变换
                let r = (y + ((v * 359 + 128) >> 8)).clamp(0, 255);
                let g = (y - ((u * 88 + v * 183 + 128) >> 8)).clamp(0, 255);
                let b = (y + ((u * 454 + 128) >> 8)).clamp(0, 255);

                rgb[col * 3] = r as u8;
                rgb[col * 3 + 1] = g as u8;
                rgb[col * 3 + 2] = b as u8;
            }
        });
    Ok(())
}

// ============================================================
// 复制
// ============================================================

fn copy_plane(
    src: &[u8],
    src_stride: usize,
    dst: &mut [u8],
    dst_stride: usize,
    row_bytes: usize,
    rows: usize,
) {
    dst.par_chunks_mut(dst_stride)
        .take(rows)
        .enumerate()
        .for_each(|(row, out)| {
            let start = row * src_stride;
            out[..row_bytes].copy_from_slice(&src[start..start + row_bytes]);
        });
}

/// 同格式逐平面复制 (行跨度可以不同)
fn copy_planes(src: &ConvertInput, dst: &mut ConvertOutput) {
    let format = src.format;
    for (plane, out) in dst.planes.iter_mut().enumerate() {
        let row_bytes = format.plane_linesize(plane, src.width).unwrap_or(0);
        let rows = format.plane_height(plane, src.height).unwrap_or(0);
        copy_plane(
            src.planes[plane],
            src.linesize[plane],
            out,
            dst.linesize[plane],
            row_bytes,
            rows,
        );
    }
}
