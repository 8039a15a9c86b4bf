//! # bianma-codec
//!
//! bianma 编码框架编解码器库, 提供编解码器框架与 Packet/Frame 抽象.
//!
//! 本 crate 对标 FFmpeg 的 libavcodec, 定义了编解码器注册与
//! send/receive 编解码状态机的核心抽象.
//!
//! ## 支持的编解码器
//!
//! - **rawvideo**: 未压缩视频, 每帧一个关键帧数据包
//! - **vdelta**: 帧间差分 + 游程编码的无损视频, 支持 GOP、非参考帧与帧级/片级并行
//!
//! ## 使用示例
//!
//! ```rust
//! use bianma_codec::CodecRegistry;
//!
//! let registry = CodecRegistry::global();
//! let encoder = registry.create_encoder("vdelta").unwrap();
//! assert_eq!(encoder.name(), "vdelta");
//! for desc in registry.list_encoders() {
//!     println!("{desc}");
//! }
//! ```

pub mod bitstream;
pub mod codec_id;
pub mod codec_parameters;
pub mod decoder;
pub mod decoders;
pub mod encoder;
pub mod encoders;
pub mod frame;
pub mod packet;
pub mod registry;

// 重导出常用类型
pub use codec_id::CodecId;
pub use codec_parameters::{CodecParameters, CodecParamsType, VideoCodecParams};
pub use decoder::Decoder;
pub use encoder::{Encoder, EncoderConfig, ThreadType};
pub use frame::{PictureType, VideoFrame};
pub use packet::Packet;
pub use registry::{CodecRegistry, EncoderDescriptor};

/// 注册所有内置编解码器
pub fn register_all(registry: &mut CodecRegistry) {
    decoders::register_all_decoders(registry);
    encoders::register_all_encoders(registry);
}
