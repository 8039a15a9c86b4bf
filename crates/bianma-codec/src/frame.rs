//! 原始视频帧 (VideoFrame).
//!
//! 对标 FFmpeg 的 `AVFrame`, 表示编码器输入或解码器输出的原始像素数据.

use bianma_core::timestamp::NOPTS_VALUE;
use bianma_core::{BianmaError, BianmaResult, PixelFormat, Rational};

/// 视频帧
///
/// 包含原始像素数据, 支持多平面存储.
/// 例如 YUV420P 格式有 3 个平面: Y, U, V.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// 各平面的像素数据
    pub data: Vec<Vec<u8>>,
    /// 各平面每行的字节数 (linesize / stride)
    pub linesize: Vec<usize>,
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 像素格式
    pub pixel_format: PixelFormat,
    /// 显示时间戳 (PTS)
    pub pts: i64,
    /// 时间基
    pub time_base: Rational,
    /// 帧时长 (以 time_base 为单位)
    pub duration: i64,
    /// 是否为关键帧
    pub is_keyframe: bool,
    /// 图片类型
    pub picture_type: PictureType,
    /// 采样宽高比 (SAR)
    pub sample_aspect_ratio: Rational,
}

impl VideoFrame {
    /// 创建空的视频帧 (平面未分配)
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        let plane_count = pixel_format.plane_count() as usize;
        Self {
            data: vec![Vec::new(); plane_count],
            linesize: vec![0; plane_count],
            width,
            height,
            pixel_format,
            pts: NOPTS_VALUE,
            time_base: Rational::UNDEFINED,
            duration: 0,
            is_keyframe: false,
            picture_type: PictureType::None,
            sample_aspect_ratio: Rational::new(1, 1),
        }
    }

    /// 创建并分配平面缓冲 (清零, 紧凑 linesize)
    ///
    /// 对标 `av_frame_get_buffer`. 编码管线为每个会话分配一次, 之后每帧复用.
    pub fn alloc(width: u32, height: u32, pixel_format: PixelFormat) -> BianmaResult<Self> {
        if width == 0 || height == 0 {
            return Err(BianmaError::InvalidArgument("宽度和高度不能为 0".into()));
        }
        let mut frame = Self::new(width, height, pixel_format);
        for plane in 0..frame.data.len() {
            let linesize = pixel_format.plane_linesize(plane, width);
            let rows = pixel_format.plane_height(plane, height);
            let (Some(linesize), Some(rows)) = (linesize, rows) else {
                return Err(BianmaError::InvalidArgument(format!(
                    "无法为 {pixel_format} 分配平面 {plane}"
                )));
            };
            frame.data[plane] = vec![0u8; linesize * rows];
            frame.linesize[plane] = linesize;
        }
        if frame.data.is_empty() {
            return Err(BianmaError::InvalidArgument("像素格式不能为 None".into()));
        }
        Ok(frame)
    }

    /// 返回去掉行填充后的紧凑平面数据
    ///
    /// 校验每个平面的 linesize 与数据长度, 不满足时返回 `InvalidData`.
    pub fn packed_planes(&self) -> BianmaResult<Vec<Vec<u8>>> {
        let plane_count = self.pixel_format.plane_count() as usize;
        if self.data.len() != plane_count || self.linesize.len() != plane_count {
            return Err(BianmaError::InvalidData(format!(
                "{} 需要 {} 个平面, 实际 {}",
                self.pixel_format,
                plane_count,
                self.data.len()
            )));
        }
        let mut planes = Vec::with_capacity(plane_count);
        for (plane, (data, &stride)) in self.data.iter().zip(&self.linesize).enumerate() {
            let row_bytes = self
                .pixel_format
                .plane_linesize(plane, self.width)
                .unwrap_or(0);
            let rows = self
                .pixel_format
                .plane_height(plane, self.height)
                .unwrap_or(0);
            if stride < row_bytes || data.len() < stride * rows.saturating_sub(1) + row_bytes {
                return Err(BianmaError::InvalidData(format!(
                    "平面 {plane} 数据不足: 长度 {}, linesize {stride}, 需要 {rows} 行 x {row_bytes} 字节",
                    data.len()
                )));
            }
            if stride == row_bytes {
                planes.push(data[..row_bytes * rows].to_vec());
            } else {
                let mut packed = Vec::with_capacity(row_bytes * rows);
                for row in data.chunks(stride).take(rows) {
                    packed.extend_from_slice(&row[..row_bytes]);
                }
                planes.push(packed);
            }
        }
        Ok(planes)
    }
}

/// 图片类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PictureType {
    /// 未指定
    #[default]
    None,
    /// I 帧 (关键帧, 帧内编码)
    I,
    /// P 帧 (前向预测, 作为后续帧的参考)
    P,
    /// 非参考帧 (前向预测, 不作为参考, 对应 B 帧在无重排时的角色)
    B,
}
