//! # bianma (编码)
//!
//! 纯 Rust 实现的视频编码管线, 结构对标 FFmpeg 的编码后端.
//!
//! 原始帧经像素转换后送入编码器的 send/receive 状态机, 产出的数据包
//! 换算到容器流时间基后交错写入容器文件.
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use bianma::core::{PixelFormat, Rational};
//! use bianma::pipeline::{EncodePipeline, ScaleConverter, VideoProperties};
//!
//! let mut pipeline = EncodePipeline::new(ScaleConverter::new(PixelFormat::Rgb24));
//! let props = VideoProperties::new(640, 360, Rational::new(30000, 1001), PixelFormat::Yuv420p, "vdelta");
//! pipeline.initialize("out.avi", props).unwrap();
//! pipeline.encode_frame(&vec![0u8; 640 * 360 * 3]).unwrap();
//! pipeline.close().unwrap();
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `bianma-core` | 核心类型, 错误, 时间基换算 |
//! | `bianma-codec` | 编解码器框架与内置编解码器 |
//! | `bianma-format` | 容器格式框架 (AVI, null) |
//! | `bianma-scale` | 像素格式转换 |

/// 核心类型与工具 (对标 libavutil)
pub use bianma_core as core;

/// 编解码器框架 (对标 libavcodec)
pub use bianma_codec as codec;

/// 容器格式框架 (对标 libavformat)
pub use bianma_format as format;

/// 像素格式转换 (对标 libswscale)
pub use bianma_scale as scale;

pub mod config;
pub mod logging;
pub mod pipeline;
pub mod probe;

pub use config::EncodeConfig;
pub use pipeline::{EncodePipeline, PipelineError};

/// 获取 bianma 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 进程级编码器列表, 每项显示为 "name - long_name"
pub fn list_supported_encoders() -> Vec<bianma_codec::EncoderDescriptor> {
    bianma_codec::CodecRegistry::global().list_encoders()
}
