//! RAW 视频解码器.
//!
//! 将未压缩的原始像素数据从 Packet 转换为 VideoFrame.
//! 不做任何解压缩, 仅按像素格式拆分平面数据.

use bianma_core::{BianmaError, BianmaResult, PixelFormat};
use log::debug;

use super::{PlaneLayout, open_video_params};
use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::decoder::Decoder;
use crate::frame::{PictureType, VideoFrame};
use crate::packet::Packet;

/// RAW 视频解码器
pub struct RawVideoDecoder {
    /// 图像宽度
    width: u32,
    /// 图像高度
    height: u32,
    /// 像素格式
    pixel_format: PixelFormat,
    /// 各平面布局
    layout: Vec<PlaneLayout>,
    /// 已解码帧缓冲
    output_frame: Option<VideoFrame>,
    /// 是否已打开 (配置参数)
    opened: bool,
    /// 是否已收到刷新信号 (空包)
    flushing: bool,
}

impl RawVideoDecoder {
    pub fn create() -> BianmaResult<Box<dyn Decoder>> {
        Ok(Box::new(Self {
            width: 0,
            height: 0,
            pixel_format: PixelFormat::None,
            layout: Vec::new(),
            output_frame: None,
            opened: false,
            flushing: false,
        }))
    }

    fn frame_size(&self) -> usize {
        self.layout.iter().map(PlaneLayout::size).sum()
    }
}

impl Decoder for RawVideoDecoder {
    fn codec_id(&self) -> CodecId {
        CodecId::RawVideo
    }

    fn name(&self) -> &str {
        "rawvideo"
    }

    fn open(&mut self, params: &CodecParameters) -> BianmaResult<()> {
        let (video, layout) = open_video_params(params, None)?;
        self.width = video.width;
        self.height = video.height;
        self.pixel_format = video.pixel_format;
        self.layout = layout;
        self.output_frame = None;
        self.opened = true;
        self.flushing = false;

        debug!(
            "打开 rawvideo 解码器: {}x{}, 格式={}, 帧大小={}",
            self.width,
            self.height,
            self.pixel_format,
            self.frame_size(),
        );
        Ok(())
    }

    fn send_packet(&mut self, packet: &Packet) -> BianmaResult<()> {
        if !self.opened {
            return Err(BianmaError::Codec("解码器未打开, 请先调用 open()".into()));
        }
        if self.output_frame.is_some() {
            return Err(BianmaError::NeedMoreData);
        }

        // 空包 = flush
        if packet.is_empty() {
            self.flushing = true;
            return Ok(());
        }

        let frame_size = self.frame_size();
        if packet.data.len() != frame_size {
            return Err(BianmaError::InvalidData(format!(
                "数据大小 {} 与预期帧大小 {} 不匹配",
                packet.data.len(),
                frame_size,
            )));
        }

        let mut frame = VideoFrame::new(self.width, self.height, self.pixel_format);
        frame.pts = packet.pts;
        frame.time_base = packet.time_base;
        frame.duration = packet.duration;
        frame.is_keyframe = true;
        frame.picture_type = PictureType::I;

        // 按平面拆分数据
        let mut offset = 0usize;
        for (i, plane) in self.layout.iter().enumerate() {
            let plane_size = plane.size();
            frame.data[i] = packet.data[offset..offset + plane_size].to_vec();
            frame.linesize[i] = plane.linesize;
            offset += plane_size;
        }

        self.output_frame = Some(frame);
        Ok(())
    }

    fn receive_frame(&mut self) -> BianmaResult<VideoFrame> {
        if let Some(frame) = self.output_frame.take() {
            return Ok(frame);
        }
        if self.flushing {
            return Err(BianmaError::Eof);
        }
        Err(BianmaError::NeedMoreData)
    }

    fn flush(&mut self) {
        self.output_frame = None;
        self.flushing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec_parameters::VideoCodecParams;
    use bianma_core::Rational;
    use bytes::Bytes;

    fn make_video_params(w: u32, h: u32, pf: PixelFormat) -> CodecParameters {
        CodecParameters::video_params(
            CodecId::RawVideo,
            VideoCodecParams {
                width: w,
                height: h,
                pixel_format: pf,
                frame_rate: Rational::new(25, 1),
                sample_aspect_ratio: Rational::new(1, 1),
                video_delay: 0,
            },
        )
    }

    #[test]
    fn test_basic_decode_rgb24() {
        let mut dec = RawVideoDecoder::create().unwrap();
        dec.open(&make_video_params(2, 2, PixelFormat::Rgb24))
            .unwrap();

        // 2x2 RGB24 = 12 字节
        let data: Vec<u8> = (0..12).collect();
        let mut pkt = Packet::from_data(Bytes::from(data.clone()));
        pkt.pts = 100;
        pkt.time_base = Rational::new(1, 25);

        dec.send_packet(&pkt).unwrap();
        let vf = dec.receive_frame().unwrap();
        assert_eq!(vf.width, 2);
        assert_eq!(vf.pixel_format, PixelFormat::Rgb24);
        assert_eq!(vf.data[0], data);
        assert_eq!(vf.linesize[0], 6);
        assert!(vf.is_keyframe);
        assert_eq!(vf.picture_type, PictureType::I);
        assert_eq!(vf.pts, 100);
    }

    #[test]
    fn test_basic_decode_yuv420p() {
        let mut dec = RawVideoDecoder::create().unwrap();
        dec.open(&make_video_params(4, 4, PixelFormat::Yuv420p))
            .unwrap();

        // 4x4 YUV420P: Y=16, U=4, V=4 = 24 字节
        let data: Vec<u8> = (0..24).collect();
        dec.send_packet(&Packet::from_data(Bytes::from(data)))
            .unwrap();
        let vf = dec.receive_frame().unwrap();
        assert_eq!(vf.data.len(), 3);
        assert_eq!(vf.data[0].len(), 16);
        assert_eq!(vf.data[1].len(), 4);
        assert_eq!(vf.linesize, vec![4, 2, 2]);
    }

    #[test]
    fn test_not_open_error() {
        let mut dec = RawVideoDecoder::create().unwrap();
        let pkt = Packet::from_data(Bytes::from(vec![0u8; 12]));
        let err = dec.send_packet(&pkt).unwrap_err();
        assert!(matches!(err, BianmaError::Codec(_)));
    }

    #[test]
    fn test_data_size_mismatch() {
        let mut dec = RawVideoDecoder::create().unwrap();
        dec.open(&make_video_params(2, 2, PixelFormat::Rgb24))
            .unwrap();
        let pkt = Packet::from_data(Bytes::from(vec![0u8; 10])); // 期望 12
        let err = dec.send_packet(&pkt).unwrap_err();
        assert!(matches!(err, BianmaError::InvalidData(_)));
    }

    #[test]
    fn test_flush_and_eof() {
        let mut dec = RawVideoDecoder::create().unwrap();
        dec.open(&make_video_params(2, 2, PixelFormat::Rgb24))
            .unwrap();

        dec.send_packet(&Packet::from_data(Bytes::from(vec![0u8; 12])))
            .unwrap();
        dec.receive_frame().unwrap();

        // 发送空包 flush
        dec.send_packet(&Packet::empty()).unwrap();
        let err = dec.receive_frame().unwrap_err();
        assert!(matches!(err, BianmaError::Eof));
    }

    #[test]
    fn test_receive_before_send() {
        let mut dec = RawVideoDecoder::create().unwrap();
        dec.open(&make_video_params(2, 2, PixelFormat::Rgb24))
            .unwrap();
        let err = dec.receive_frame().unwrap_err();
        assert!(matches!(err, BianmaError::NeedMoreData));
    }
}
