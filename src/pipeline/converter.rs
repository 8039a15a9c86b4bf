//! 像素转换器: 把调用方的原始缓冲填充到编码器就绪的帧.

use bianma_codec::VideoFrame;
use bianma_core::{BianmaError, BianmaResult, PixelFormat};
use bianma_scale::{ScaleContext, split_packed};

/// 像素转换器
///
/// 目标帧的宽高和像素格式由编码会话决定, 转换器必须原样填充;
/// 形状或格式不匹配时返回错误.
pub trait FrameConverter: Send {
    /// 从不透明的源缓冲填充目标帧
    fn convert(&mut self, dst: &mut VideoFrame, src: &[u8]) -> BianmaResult<()>;

    /// 等待异步转换完成, 释放设备资源前调用
    fn synchronize(&mut self) -> BianmaResult<()> {
        Ok(())
    }
}

/// 基于 `bianma-scale` 的软件转换器
///
/// 源缓冲是紧凑排列的 `src_format` 帧. 转换上下文按目标帧的形状懒创建并缓存.
#[derive(Debug)]
pub struct ScaleConverter {
    src_format: PixelFormat,
    context: Option<ScaleContext>,
}

impl ScaleConverter {
    /// 创建转换器
    pub fn new(src_format: PixelFormat) -> Self {
        Self {
            src_format,
            context: None,
        }
    }

    /// 源像素格式
    pub fn src_format(&self) -> PixelFormat {
        self.src_format
    }

    fn context_for(&mut self, dst: &VideoFrame) -> BianmaResult<&ScaleContext> {
        let reusable = self.context.as_ref().is_some_and(|ctx| {
            ctx.width == dst.width && ctx.height == dst.height && ctx.dst_format == dst.pixel_format
        });
        if !reusable {
            self.context = Some(ScaleContext::new(
                dst.width,
                dst.height,
                self.src_format,
                dst.pixel_format,
            )?);
        }
        self.context
            .as_ref()
            .ok_or_else(|| BianmaError::Internal("转换上下文未创建".into()))
    }
}

impl FrameConverter for ScaleConverter {
    fn convert(&mut self, dst: &mut VideoFrame, src: &[u8]) -> BianmaResult<()> {
        let expected = self
            .src_format
            .frame_size(dst.width, dst.height)
            .ok_or_else(|| BianmaError::InvalidArgument(format!("源像素格式无效: {}", self.src_format)))?;
        if src.len() != expected {
            return Err(BianmaError::InvalidArgument(format!(
                "源缓冲大小不匹配: {} != {expected} ({}x{} {})",
                src.len(),
                dst.width,
                dst.height,
                self.src_format
            )));
        }

        let (src_planes, src_linesize) = split_packed(src, self.src_format, dst.width, dst.height)?;
        let ctx = self.context_for(dst)?;
        let mut dst_planes: Vec<&mut [u8]> = dst.data.iter_mut().map(Vec::as_mut_slice).collect();
        ctx.convert(&src_planes, &src_linesize, &mut dst_planes, &dst.linesize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb24_转_yuv420p() {
        let mut frame = VideoFrame::alloc(4, 2, PixelFormat::Yuv420p).unwrap();
        let mut conv = ScaleConverter::new(PixelFormat::Rgb24);
        let src = vec![255u8; 4 * 2 * 3];
        conv.convert(&mut frame, &src).unwrap();
        assert!(frame.data[0].iter().all(|&y| y == 255));
        assert!(frame.data[1].iter().all(|&u| u == 128));
        conv.synchronize().unwrap();
    }

    #[test]
    fn test_大小不匹配报错() {
        let mut frame = VideoFrame::alloc(4, 2, PixelFormat::Yuv420p).unwrap();
        let mut conv = ScaleConverter::new(PixelFormat::Rgb24);
        assert!(conv.convert(&mut frame, &[0u8; 5]).is_err());
    }

    #[test]
    fn test_同格式直接复制() {
        let mut frame = VideoFrame::alloc(2, 2, PixelFormat::Gray8).unwrap();
        let mut conv = ScaleConverter::new(PixelFormat::Gray8);
        conv.convert(&mut frame, &[1, 2, 3, 4]).unwrap();
        assert_eq!(frame.data[0], vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_不支持的转换() {
        let mut frame = VideoFrame::alloc(2, 2, PixelFormat::Rgba).unwrap();
        let mut conv = ScaleConverter::new(PixelFormat::Yuv444p);
        let err = conv.convert(&mut frame, &[0u8; 12]).unwrap_err();
        assert!(matches!(err, BianmaError::Unsupported(_)));
    }
}
