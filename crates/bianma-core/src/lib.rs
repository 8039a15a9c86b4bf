//! # bianma-core
//!
//! bianma 编码框架核心库, 提供基础类型定义、错误处理和时间基换算.
//!
//! 本 crate 对标 FFmpeg 的 libavutil, 为编码管线提供底层基础设施.

pub mod error;
pub mod media_type;
pub mod pixel_format;
pub mod rational;
pub mod timestamp;

// 重导出常用类型
pub use error::{BianmaError, BianmaResult};
pub use media_type::MediaType;
pub use pixel_format::PixelFormat;
pub use rational::{Rational, rescale_q};
pub use timestamp::{NOPTS_VALUE, Timestamp};
