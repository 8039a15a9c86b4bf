//! 空封装器.
//!
//! 对标 FFmpeg 的 `-f null`: 不产生任何输出, 只统计数据包. 用于测速和测试编码流程.

use bianma_codec::Packet;
use bianma_core::{BianmaError, BianmaResult};
use log::debug;

use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::muxer::{Muxer, MuxerFlags};
use crate::stream::Stream;

/// 空封装器
#[derive(Debug, Default)]
pub struct NullMuxer {
    stream_count: usize,
    packets: u64,
    bytes: u64,
}

impl NullMuxer {
    /// 创建空封装器实例 (工厂函数)
    pub fn create() -> BianmaResult<Box<dyn Muxer>> {
        Ok(Box::new(Self::default()))
    }
}

impl Muxer for NullMuxer {
    fn format_id(&self) -> FormatId {
        FormatId::Null
    }

    fn name(&self) -> &str {
        "null"
    }

    fn flags(&self) -> MuxerFlags {
        MuxerFlags::NOFILE
    }

    fn write_header(&mut self, _io: &mut IoContext, streams: &[Stream]) -> BianmaResult<()> {
        self.stream_count = streams.len();
        self.packets = 0;
        self.bytes = 0;
        Ok(())
    }

    fn write_packet(&mut self, _io: &mut IoContext, packet: &Packet) -> BianmaResult<()> {
        if packet.stream_index >= self.stream_count {
            return Err(BianmaError::StreamNotFound(packet.stream_index));
        }
        self.packets += 1;
        self.bytes += packet.data.len() as u64;
        Ok(())
    }

    fn write_trailer(&mut self, _io: &mut IoContext) -> BianmaResult<()> {
        debug!(
            "null 封装结束: {} 个数据包, {} 字节",
            self.packets, self.bytes
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_不写任何字节() {
        let mut io = IoContext::null();
        let mut muxer = NullMuxer::default();
        assert!(muxer.flags().contains(MuxerFlags::NOFILE));
        muxer.write_header(&mut io, &[]).unwrap();
        let err = muxer
            .write_packet(&mut io, &Packet::from_data(vec![1u8, 2]))
            .unwrap_err();
        assert!(matches!(err, BianmaError::StreamNotFound(0)));
        muxer.write_trailer(&mut io).unwrap();
        assert_eq!(muxer.packets, 0);
    }
}
