//! # bianma-format
//!
//! bianma 编码框架容器格式库, 提供封装/解封装框架.
//!
//! 本 crate 对标 FFmpeg 的 libavformat. 输出侧由 [`Muxer`] 写入容器,
//! [`Interleaver`] 负责多流交错; 读取侧的 [`Demuxer`] 用于重新探测编码结果.

pub mod demuxer;
pub mod demuxers;
pub mod format_id;
pub mod interleave;
pub mod io;
pub mod muxer;
pub mod muxers;
pub mod probe;
pub mod registry;
pub mod riff;
pub mod stream;

// 重导出常用类型
pub use demuxer::Demuxer;
pub use format_id::FormatId;
pub use interleave::Interleaver;
pub use io::{IoBackend, IoContext, MemoryBackend, MemoryHandle, NullBackend};
pub use muxer::{Muxer, MuxerFlags};
pub use probe::ProbeResult;
pub use registry::FormatRegistry;
pub use stream::{Stream, StreamParams, VideoStreamParams};

/// 注册所有内置容器格式
pub fn register_all(registry: &mut FormatRegistry) {
    demuxers::register_all_demuxers(registry);
    muxers::register_all_muxers(registry);
}
