//! vdelta 视频解码器.
//!
//! 逐包解压 PackBits 残差, 与上一个参考帧相加重建. 非参考帧解码后不替换参考帧.

use bianma_core::{BianmaError, BianmaResult, PixelFormat};
use log::debug;

use super::{PlaneLayout, open_video_params};
use crate::bitstream::{self, FrameKind};
use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::decoder::Decoder;
use crate::frame::{PictureType, VideoFrame};
use crate::packet::Packet;

/// vdelta 解码器
pub struct VdeltaDecoder {
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    layout: Vec<PlaneLayout>,
    reference: Option<Vec<Vec<u8>>>,
    output_frame: Option<VideoFrame>,
    opened: bool,
    flushing: bool,
}

impl VdeltaDecoder {
    pub fn create() -> BianmaResult<Box<dyn Decoder>> {
        Ok(Box::new(Self {
            width: 0,
            height: 0,
            pixel_format: PixelFormat::None,
            layout: Vec::new(),
            reference: None,
            output_frame: None,
            opened: false,
            flushing: false,
        }))
    }

    fn reconstruct(&self, kind: FrameKind, payloads: &[&[u8]]) -> BianmaResult<Vec<Vec<u8>>> {
        if payloads.len() != self.layout.len() {
            return Err(BianmaError::InvalidData(format!(
                "平面数 {} 与 {} 不符",
                payloads.len(),
                self.pixel_format
            )));
        }
        let reference = match kind {
            FrameKind::Intra => None,
            _ => Some(self.reference.as_ref().ok_or_else(|| {
                BianmaError::InvalidData("预测帧缺少参考帧, 码流需从关键帧开始".into())
            })?),
        };
        let mut planes = Vec::with_capacity(payloads.len());
        for (i, (payload, layout)) in payloads.iter().zip(&self.layout).enumerate() {
            let mut plane = bitstream::packbits_decode(payload, layout.size())?;
            if let Some(reference) = reference {
                for (value, prev) in plane.iter_mut().zip(&reference[i]) {
                    *value = value.wrapping_add(*prev);
                }
            }
            planes.push(plane);
        }
        Ok(planes)
    }
}

impl Decoder for VdeltaDecoder {
    fn codec_id(&self) -> CodecId {
        CodecId::Vdelta
    }

    fn name(&self) -> &str {
        "vdelta"
    }

    fn open(&mut self, params: &CodecParameters) -> BianmaResult<()> {
        let fallback = bitstream::parse_extradata(&params.extra_data)
            .ok()
            .map(|h| h.pixel_format);
        let (video, layout) = open_video_params(params, fallback)?;
        self.width = video.width;
        self.height = video.height;
        self.pixel_format = video.pixel_format;
        self.layout = layout;
        self.reference = None;
        self.output_frame = None;
        self.opened = true;
        self.flushing = false;
        debug!(
            "打开 vdelta 解码器: {}x{}, 格式={}",
            self.width, self.height, self.pixel_format
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
        if packet.is_empty() {
            self.flushing = true;
            return Ok(());
        }

        let (kind, payloads) = bitstream::read_packet(&packet.data)?;
        let planes = self.reconstruct(kind, &payloads)?;
        if kind.updates_reference() {
            self.reference = Some(planes.clone());
        }

        let mut frame = VideoFrame::new(self.width, self.height, self.pixel_format);
        frame.linesize = self.layout.iter().map(|l| l.linesize).collect();
        frame.data = planes;
        frame.pts = packet.pts;
        frame.time_base = packet.time_base;
        frame.duration = packet.duration;
        frame.is_keyframe = kind == FrameKind::Intra;
        frame.picture_type = match kind {
            FrameKind::Intra => PictureType::I,
            FrameKind::Reference => PictureType::P,
            FrameKind::NonReference => PictureType::B,
        };
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
        self.reference = None;
        self.output_frame = None;
        self.flushing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec_parameters::VideoCodecParams;
    use bianma_core::Rational;

    fn params_from_extradata() -> CodecParameters {
        let mut params = CodecParameters::video_params(
            CodecId::Vdelta,
            VideoCodecParams {
                width: 4,
                height: 2,
                pixel_format: PixelFormat::None,
                frame_rate: Rational::new(30, 1),
                sample_aspect_ratio: Rational::new(1, 1),
                video_delay: 0,
            },
        );
        params.extra_data = bitstream::write_extradata(&bitstream::StreamHeader {
            pixel_format: PixelFormat::Gray8,
            gop_size: 12,
            max_b_frames: 0,
        });
        params
    }

    #[test]
    fn test_从_extradata_恢复像素格式() {
        let mut dec = VdeltaDecoder::create().unwrap();
        dec.open(&params_from_extradata()).unwrap();
        let payload = bitstream::write_packet(
            FrameKind::Intra,
            &[bitstream::packbits_encode(&[1, 2, 3, 4, 5, 6, 7, 8])],
        );
        dec.send_packet(&Packet::from_data(payload)).unwrap();
        let frame = dec.receive_frame().unwrap();
        assert_eq!(frame.pixel_format, PixelFormat::Gray8);
        assert_eq!(frame.data[0], vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(frame.is_keyframe);
    }

    #[test]
    fn test_非参考帧不替换参考() {
        let mut dec = VdeltaDecoder::create().unwrap();
        dec.open(&params_from_extradata()).unwrap();
        let intra = bitstream::write_packet(
            FrameKind::Intra,
            &[bitstream::packbits_encode(&[10; 8])],
        );
        let delta = bitstream::write_packet(
            FrameKind::NonReference,
            &[bitstream::packbits_encode(&[1; 8])],
        );
        dec.send_packet(&Packet::from_data(intra)).unwrap();
        dec.receive_frame().unwrap();
        for _ in 0..2 {
            dec.send_packet(&Packet::from_data(delta.clone())).unwrap();
            let frame = dec.receive_frame().unwrap();
            // 两次都基于关键帧重建
            assert_eq!(frame.data[0], vec![11; 8]);
            assert_eq!(frame.picture_type, PictureType::B);
        }
    }

    #[test]
    fn test_缺少参考帧报错() {
        let mut dec = VdeltaDecoder::create().unwrap();
        dec.open(&params_from_extradata()).unwrap();
        let delta = bitstream::write_packet(
            FrameKind::Reference,
            &[bitstream::packbits_encode(&[0; 8])],
        );
        assert!(matches!(
            dec.send_packet(&Packet::from_data(delta)),
            Err(BianmaError::InvalidData(_))
        ));
    }
}
