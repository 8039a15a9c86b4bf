//! 解码器实现模块.

pub mod rawvideo;
pub mod vdelta;

use bianma_core::{BianmaError, BianmaResult, PixelFormat};

use crate::codec_id::CodecId;
use crate::codec_parameters::{CodecParameters, VideoCodecParams};
use crate::registry::CodecRegistry;

/// 注册所有内置解码器
pub fn register_all_decoders(registry: &mut CodecRegistry) {
    registry.register_decoder(
        CodecId::RawVideo,
        "rawvideo",
        rawvideo::RawVideoDecoder::create,
    );
    registry.register_decoder(CodecId::Vdelta, "vdelta", vdelta::VdeltaDecoder::create);
}

/// 单个平面的紧凑布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PlaneLayout {
    pub linesize: usize,
    pub rows: usize,
}

impl PlaneLayout {
    pub fn size(&self) -> usize {
        self.linesize * self.rows
    }
}

/// 校验视频参数并计算平面布局
///
/// `fallback_format` 在参数未给出像素格式时使用 (如从 extradata 恢复).
pub(crate) fn open_video_params(
    params: &CodecParameters,
    fallback_format: Option<PixelFormat>,
) -> BianmaResult<(VideoCodecParams, Vec<PlaneLayout>)> {
    let mut video = params
        .video()
        .cloned()
        .ok_or_else(|| BianmaError::InvalidArgument(format!("{} 解码器需要视频参数", params.codec_id)))?;
    if video.width == 0 || video.height == 0 {
        return Err(BianmaError::InvalidArgument("宽度和高度不能为 0".into()));
    }
    if video.pixel_format == PixelFormat::None {
        video.pixel_format = fallback_format.unwrap_or(PixelFormat::None);
    }
    let pf = video.pixel_format;
    if pf == PixelFormat::None {
        return Err(BianmaError::InvalidArgument("像素格式不能为 None".into()));
    }
    let layout = (0..pf.plane_count() as usize)
        .map(|i| {
            let linesize = pf.plane_linesize(i, video.width);
            let rows = pf.plane_height(i, video.height);
            linesize
                .zip(rows)
                .map(|(linesize, rows)| PlaneLayout { linesize, rows })
                .ok_or_else(|| BianmaError::InvalidArgument(format!("无法计算平面 {i} 的布局")))
        })
        .collect::<BianmaResult<Vec<_>>>()?;
    Ok((video, layout))
}
