//! 流信息定义.
//!
//! 对标 FFmpeg 的 `AVStream`. 流的时间基独立于编码器时间基,
//! 数据包写入前必须换算到流时间基.

use bianma_codec::{CodecId, CodecParameters, CodecParamsType, VideoCodecParams};
use bianma_core::{BianmaError, BianmaResult, MediaType, PixelFormat, Rational};

/// 流信息
#[derive(Debug, Clone)]
pub struct Stream {
    /// 流索引 (在容器中的位置, 从 0 开始)
    pub index: usize,
    /// 媒体类型
    pub media_type: MediaType,
    /// 编解码器标识
    pub codec_id: CodecId,
    /// 时间基
    pub time_base: Rational,
    /// 流时长 (以 time_base 为单位, -1 表示未知)
    pub duration: i64,
    /// 起始时间 (以 time_base 为单位)
    pub start_time: i64,
    /// 总帧数 (0 表示未知)
    pub nb_frames: u64,
    /// 编解码器私有数据
    pub extra_data: Vec<u8>,
    /// 流特定参数
    pub params: StreamParams,
    /// 元数据
    pub metadata: Vec<(String, String)>,
}

/// 流特定参数
#[derive(Debug, Clone)]
pub enum StreamParams {
    /// 视频流参数
    Video(VideoStreamParams),
    /// 其他
    Other,
}

/// 视频流参数
#[derive(Debug, Clone)]
pub struct VideoStreamParams {
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 像素格式
    pub pixel_format: PixelFormat,
    /// 帧率
    pub frame_rate: Rational,
    /// 采样宽高比 (SAR)
    pub sample_aspect_ratio: Rational,
    /// 码率 (bps, 0 表示未知)
    pub bit_rate: u64,
}

impl Stream {
    /// 从编码器参数创建视频流 (对标 `avcodec_parameters_from_context`)
    ///
    /// 参数在此复制一次, 之后编码器参数的变化不会反映到流上.
    pub fn from_codec_parameters(
        index: usize,
        codec_params: &CodecParameters,
        time_base: Rational,
    ) -> BianmaResult<Self> {
        let video = codec_params.video().ok_or_else(|| {
            BianmaError::Unsupported(format!(
                "编解码器 {} 不是视频编码器, 无法创建视频流",
                codec_params.codec_id
            ))
        })?;
        if !time_base.is_positive() {
            return Err(BianmaError::InvalidArgument(format!(
                "流时间基无效: {time_base}"
            )));
        }
        Ok(Self {
            index,
            media_type: MediaType::Video,
            codec_id: codec_params.codec_id,
            time_base,
            duration: -1,
            start_time: 0,
            nb_frames: 0,
            extra_data: codec_params.extra_data.clone(),
            params: StreamParams::Video(VideoStreamParams {
                width: video.width,
                height: video.height,
                pixel_format: video.pixel_format,
                frame_rate: video.frame_rate,
                sample_aspect_ratio: video.sample_aspect_ratio,
                bit_rate: codec_params.bit_rate,
            }),
            metadata: Vec::new(),
        })
    }

    /// 重建解码器参数 (读取侧使用)
    pub fn codec_parameters(&self) -> CodecParameters {
        let params = match &self.params {
            StreamParams::Video(v) => CodecParamsType::Video(VideoCodecParams {
                width: v.width,
                height: v.height,
                pixel_format: v.pixel_format,
                frame_rate: v.frame_rate,
                sample_aspect_ratio: v.sample_aspect_ratio,
                video_delay: 0,
            }),
            StreamParams::Other => CodecParamsType::None,
        };
        let bit_rate = self.video().map_or(0, |v| v.bit_rate);
        CodecParameters {
            codec_id: self.codec_id,
            extra_data: self.extra_data.clone(),
            bit_rate,
            params,
        }
    }

    /// 获取视频参数 (如果是视频流)
    pub fn video(&self) -> Option<&VideoStreamParams> {
        match &self.params {
            StreamParams::Video(v) => Some(v),
            StreamParams::Other => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> CodecParameters {
        let mut params = CodecParameters::video_params(
            CodecId::Vdelta,
            VideoCodecParams {
                width: 64,
                height: 48,
                pixel_format: PixelFormat::Yuv420p,
                frame_rate: Rational::new(30, 1),
                sample_aspect_ratio: Rational::new(1, 1),
                video_delay: 3,
            },
        );
        params.extra_data = vec![1, 2, 3];
        params.bit_rate = 1000;
        params
    }

    #[test]
    fn test_从编码器参数创建流() {
        let params = sample_params();
        let stream = Stream::from_codec_parameters(0, &params, Rational::new(1, 90000)).unwrap();
        assert_eq!(stream.codec_id, CodecId::Vdelta);
        assert_eq!(stream.time_base, Rational::new(1, 90000));
        assert_eq!(stream.extra_data, vec![1, 2, 3]);
        let v = stream.video().unwrap();
        assert_eq!((v.width, v.height), (64, 48));
        assert_eq!(v.bit_rate, 1000);
    }

    #[test]
    fn test_参数只复制一次() {
        let mut params = sample_params();
        let stream = Stream::from_codec_parameters(0, &params, Rational::new(1, 30)).unwrap();
        params.extra_data.clear();
        if let CodecParamsType::Video(v) = &mut params.params {
            v.width = 1920;
        }
        assert_eq!(stream.extra_data.len(), 3);
        assert_eq!(stream.video().unwrap().width, 64);
    }

    #[test]
    fn test_非视频参数被拒绝() {
        let params = CodecParameters {
            codec_id: CodecId::None,
            extra_data: Vec::new(),
            bit_rate: 0,
            params: CodecParamsType::None,
        };
        let err = Stream::from_codec_parameters(0, &params, Rational::new(1, 30)).unwrap_err();
        assert!(matches!(err, BianmaError::Unsupported(_)));
    }

    #[test]
    fn test_重建解码参数() {
        let stream =
            Stream::from_codec_parameters(0, &sample_params(), Rational::new(1, 30)).unwrap();
        let rebuilt = stream.codec_parameters();
        let v = rebuilt.video().unwrap();
        assert_eq!(v.pixel_format, PixelFormat::Yuv420p);
        assert_eq!(v.video_delay, 0);
        assert_eq!(rebuilt.extra_data, vec![1, 2, 3]);
    }
}
