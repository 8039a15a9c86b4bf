//! 封装器 (Muxer) trait 定义.
//!
//! 对标 FFmpeg 的 `AVOutputFormat`, 定义了将数据包写入容器格式的接口.

use bianma_codec::Packet;
use bianma_core::BianmaResult;

use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::stream::Stream;

bitflags::bitflags! {
    /// 封装器能力标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MuxerFlags: u32 {
        /// 格式自行管理 I/O, 不需要打开输出文件 (对标 `AVFMT_NOFILE`)
        const NOFILE = 0x1;
    }
}

/// 封装器 trait
///
/// 使用流程:
/// 1. 调用 `write_header()` 写入容器头部
/// 2. 循环调用 `write_packet()` 写入数据包
/// 3. 调用 `write_trailer()` 写入容器尾部
pub trait Muxer: Send {
    /// 获取格式标识
    fn format_id(&self) -> FormatId;

    /// 获取格式名称
    fn name(&self) -> &str;

    /// 能力标志
    fn flags(&self) -> MuxerFlags {
        MuxerFlags::empty()
    }

    /// 写入容器头部
    fn write_header(&mut self, io: &mut IoContext, streams: &[Stream]) -> BianmaResult<()>;

    /// 写入一个数据包 (时间戳已是流时间基)
    fn write_packet(&mut self, io: &mut IoContext, packet: &Packet) -> BianmaResult<()>;

    /// 写入容器尾部, 完成封装
    fn write_trailer(&mut self, io: &mut IoContext) -> BianmaResult<()>;
}
