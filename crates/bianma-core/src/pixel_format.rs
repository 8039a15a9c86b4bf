//! 像素格式定义.
//!
//! 对标 FFmpeg 的 `AVPixelFormat`, 定义了视频帧中像素的存储格式.

use std::fmt;
use std::str::FromStr;

use crate::error::BianmaError;

/// 像素格式
///
/// 定义了视频帧中每个像素的数据排列方式.
/// 命名规则与 FFmpeg 一致: 颜色空间 + 子采样 + 排列方式 (p=Planar).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 未指定
    None,

    // ========================
    // YUV 平面格式 (Planar)
    // ========================
    /// YUV 4:2:0 平面格式, 8 位 (最常用)
    Yuv420p,
    /// YUV 4:2:2 平面格式, 8 位
    Yuv422p,
    /// YUV 4:4:4 平面格式, 8 位
    Yuv444p,

    // ========================
    // YUV 半平面格式 (Semi-Planar / NV)
    // ========================
    /// NV12: Y 平面 + UV 交错, 4:2:0 (硬件编码器常用的上传格式)
    Nv12,
    /// NV21: Y 平面 + VU 交错, 4:2:0
    Nv21,

    // ========================
    // RGB 打包格式 (Packed)
    // ========================
    /// RGB 各 8 位, 打包
    Rgb24,
    /// BGR 各 8 位, 打包
    Bgr24,
    /// RGBA 各 8 位, 打包
    Rgba,
    /// BGRA 各 8 位, 打包
    Bgra,

    // ========================
    // 灰度格式
    // ========================
    /// 灰度 8 位
    Gray8,
}

impl PixelFormat {
    /// 全部已定义的像素格式 (不含 None)
    pub const ALL: &'static [PixelFormat] = &[
        Self::Yuv420p,
        Self::Yuv422p,
        Self::Yuv444p,
        Self::Nv12,
        Self::Nv21,
        Self::Rgb24,
        Self::Bgr24,
        Self::Rgba,
        Self::Bgra,
        Self::Gray8,
    ];

    /// 获取色度子采样 (水平, 垂直)
    ///
    /// 返回 (log2 水平子采样, log2 垂直子采样).
    /// 例如 YUV420 返回 (1, 1), 表示色度分辨率为亮度的 1/2 x 1/2.
    pub const fn chroma_subsampling(&self) -> (u32, u32) {
        match self {
            Self::Yuv420p | Self::Nv12 | Self::Nv21 => (1, 1),
            Self::Yuv422p => (1, 0),
            _ => (0, 0),
        }
    }

    /// 是否为 YUV 三平面格式 (Y/U/V 存储在不同平面)
    pub const fn is_planar(&self) -> bool {
        matches!(self, Self::Yuv420p | Self::Yuv422p | Self::Yuv444p)
    }

    /// 是否为 RGB 打包格式
    pub const fn is_rgb(&self) -> bool {
        matches!(self, Self::Rgb24 | Self::Bgr24 | Self::Rgba | Self::Bgra)
    }

    /// 打包格式每像素字节数, 非打包格式返回 None
    pub const fn packed_bytes_per_pixel(&self) -> Option<usize> {
        match self {
            Self::Rgb24 | Self::Bgr24 => Some(3),
            Self::Rgba | Self::Bgra => Some(4),
            Self::Gray8 => Some(1),
            _ => None,
        }
    }

    /// 平面数量
    pub const fn plane_count(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p => 3,
            Self::Nv12 | Self::Nv21 => 2,
            Self::Rgb24 | Self::Bgr24 | Self::Rgba | Self::Bgra | Self::Gray8 => 1,
        }
    }

    /// 计算指定平面每行的字节数 (linesize / stride)
    ///
    /// 奇数宽度时色度平面向上取整, 与 FFmpeg 的 `AV_CEIL_RSHIFT` 一致.
    ///
    /// # 返回
    /// - `Some(bytes)`: 该平面每行的字节数
    /// - `None`: 格式为 None 或平面索引超出范围
    pub fn plane_linesize(&self, plane: usize, width: u32) -> Option<usize> {
        if *self == Self::None || plane >= self.plane_count() as usize {
            return None;
        }
        let w = width as usize;
        let (sub_h, _) = self.chroma_subsampling();
        let chroma_w = ceil_rshift(w, sub_h);
        Some(match self {
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p => {
                if plane == 0 {
                    w
                } else {
                    chroma_w
                }
            }
            // 半平面: plane1 为 UV 交错, 每个色度样本 2 字节
            Self::Nv12 | Self::Nv21 => {
                if plane == 0 {
                    w
                } else {
                    chroma_w * 2
                }
            }
            Self::Rgb24 | Self::Bgr24 => w * 3,
            Self::Rgba | Self::Bgra => w * 4,
            Self::Gray8 => w,
            Self::None => return None,
        })
    }

    /// 计算指定平面的行数
    ///
    /// # 返回
    /// - `Some(rows)`: 该平面的行数
    /// - `None`: 格式为 None 或平面索引超出范围
    pub fn plane_height(&self, plane: usize, height: u32) -> Option<usize> {
        if *self == Self::None || plane >= self.plane_count() as usize {
            return None;
        }
        let (_, sub_v) = self.chroma_subsampling();
        let h = height as usize;
        Some(if plane == 0 { h } else { ceil_rshift(h, sub_v) })
    }

    /// 计算整帧的字节数
    ///
    /// # 返回
    /// - `Some(bytes)`: 整帧字节数
    /// - `None`: 格式为 None
    pub fn frame_size(&self, width: u32, height: u32) -> Option<usize> {
        if *self == Self::None {
            return None;
        }
        let mut total = 0usize;
        for plane in 0..self.plane_count() as usize {
            let linesize = self.plane_linesize(plane, width)?;
            let plane_h = self.plane_height(plane, height)?;
            total += linesize * plane_h;
        }
        Some(total)
    }

    /// FFmpeg 风格的格式名
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Yuv420p => "yuv420p",
            Self::Yuv422p => "yuv422p",
            Self::Yuv444p => "yuv444p",
            Self::Nv12 => "nv12",
            Self::Nv21 => "nv21",
            Self::Rgb24 => "rgb24",
            Self::Bgr24 => "bgr24",
            Self::Rgba => "rgba",
            Self::Bgra => "bgra",
            Self::Gray8 => "gray8",
        }
    }
}

fn ceil_rshift(v: usize, shift: u32) -> usize {
    (v + (1 << shift) - 1) >> shift
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = BianmaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        // gray 是 gray8 的常见别名
        if lower == "gray" {
            return Ok(Self::Gray8);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|pf| pf.name() == lower)
            .ok_or_else(|| BianmaError::InvalidArgument(format!("未知像素格式: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuv420p_frame_size() {
        let pf = PixelFormat::Yuv420p;
        // 1920x1080: Y=1920*1080 + U=960*540 + V=960*540 = 1920*1080*3/2
        assert_eq!(pf.frame_size(1920, 1080), Some(1920 * 1080 * 3 / 2));
        assert_eq!(pf.plane_linesize(0, 1920), Some(1920));
        assert_eq!(pf.plane_linesize(1, 1920), Some(960));
        assert_eq!(pf.plane_height(2, 1080), Some(540));
    }

    #[test]
    fn test_yuv420p_奇数尺寸向上取整() {
        let pf = PixelFormat::Yuv420p;
        assert_eq!(pf.plane_linesize(1, 33), Some(17));
        assert_eq!(pf.plane_height(1, 17), Some(9));
        assert_eq!(pf.frame_size(33, 17), Some(33 * 17 + 2 * 17 * 9));
    }

    #[test]
    fn test_nv12_frame_size() {
        let pf = PixelFormat::Nv12;
        assert_eq!(pf.plane_linesize(0, 1920), Some(1920));
        assert_eq!(pf.plane_linesize(1, 1920), Some(1920));
        assert_eq!(pf.plane_height(1, 1080), Some(540));
        assert_eq!(pf.frame_size(1920, 1080), Some(1920 * 1080 * 3 / 2));
        // 奇数宽度: UV 行 = ceil(w/2) * 2
        assert_eq!(pf.plane_linesize(1, 5), Some(6));
    }

    #[test]
    fn test_packed_frame_size() {
        assert_eq!(PixelFormat::Rgb24.frame_size(1920, 1080), Some(1920 * 1080 * 3));
        assert_eq!(PixelFormat::Bgra.plane_linesize(0, 1920), Some(7680));
        assert_eq!(PixelFormat::Gray8.frame_size(320, 240), Some(320 * 240));
    }

    #[test]
    fn test_yuv422p_frame_size() {
        let pf = PixelFormat::Yuv422p;
        assert_eq!(pf.plane_linesize(1, 1920), Some(960));
        assert_eq!(pf.plane_height(1, 1080), Some(1080));
        assert_eq!(pf.frame_size(1920, 1080), Some(1920 * 1080 * 2));
    }

    #[test]
    fn test_none_return_none() {
        assert_eq!(PixelFormat::None.frame_size(1920, 1080), None);
        assert_eq!(PixelFormat::None.plane_linesize(0, 1920), None);
        assert_eq!(PixelFormat::Rgb24.plane_linesize(1, 1920), None);
        assert_eq!(PixelFormat::Yuv420p.plane_height(3, 1080), None);
    }

    #[test]
    fn test_格式名解析() {
        for pf in PixelFormat::ALL {
            assert_eq!(pf.to_string().parse::<PixelFormat>().unwrap(), *pf);
        }
        assert_eq!("GRAY".parse::<PixelFormat>().unwrap(), PixelFormat::Gray8);
        assert!("yuv420p10le".parse::<PixelFormat>().is_err());
    }
}
