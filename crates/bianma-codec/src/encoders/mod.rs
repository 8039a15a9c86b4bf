//! 编码器实现模块.

pub mod rawvideo;
pub mod vdelta;

use bianma_core::PixelFormat;

use crate::codec_id::CodecId;
use crate::registry::{CodecRegistry, EncoderDescriptor};

/// rawvideo 编码器描述
pub const RAWVIDEO: EncoderDescriptor = EncoderDescriptor {
    codec_id: CodecId::RawVideo,
    name: "rawvideo",
    long_name: "raw video",
    pixel_formats: PixelFormat::ALL,
};

/// vdelta 编码器描述
pub const VDELTA: EncoderDescriptor = EncoderDescriptor {
    codec_id: CodecId::Vdelta,
    name: "vdelta",
    long_name: "vdelta lossless inter-frame video",
    pixel_formats: vdelta::PIXEL_FORMATS,
};

/// 注册所有内置编码器
pub fn register_all_encoders(registry: &mut CodecRegistry) {
    registry.register_encoder(RAWVIDEO, rawvideo::RawVideoEncoder::create);
    registry.register_encoder(VDELTA, vdelta::VdeltaEncoder::create);
}
