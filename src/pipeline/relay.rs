//! 数据包中转: 时间戳换算到流时间基后交错写入容器.

use bianma_codec::Packet;
use bianma_core::{BianmaResult, Rational, rescale_q};

use super::sink::FormatSink;

/// 数据包中转
///
/// 持有会话内复用的唯一数据包. 每次写入后 (无论成功与否) 都会释放负载引用,
/// 避免编码器复用内部缓冲时产生别名.
#[derive(Debug)]
pub struct PacketRelay {
    packet: Packet,
    codec_time_base: Rational,
    stream_time_base: Rational,
    stream_index: usize,
    relayed: u64,
}

impl PacketRelay {
    /// 创建中转
    pub fn new(codec_time_base: Rational, stream_time_base: Rational, stream_index: usize) -> Self {
        Self {
            packet: Packet::empty(),
            codec_time_base,
            stream_time_base,
            stream_index,
            relayed: 0,
        }
    }

    /// 供编码器填充的复用数据包
    pub fn packet_mut(&mut self) -> &mut Packet {
        &mut self.packet
    }

    /// 复用数据包 (只读)
    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    /// 换算时间戳并写入容器, 随后释放数据包
    pub fn relay(&mut self, sink: &mut FormatSink) -> BianmaResult<()> {
        self.rescale();
        let result = sink.write_interleaved(&mut self.packet);
        self.packet.unref();
        result?;
        self.relayed += 1;
        Ok(())
    }

    /// 把 pts/dts/duration 从编码器时间基换算到流时间基
    pub fn rescale(&mut self) {
        let (from, to) = (self.codec_time_base, self.stream_time_base);
        let pkt = &mut self.packet;
        pkt.pts = rescale_q(pkt.pts, from, to);
        pkt.dts = rescale_q(pkt.dts, from, to);
        if pkt.duration > 0 {
            pkt.duration = rescale_q(pkt.duration, from, to);
        }
        pkt.time_base = to;
        pkt.stream_index = self.stream_index;
    }

    /// 释放数据包
    pub fn release(&mut self) {
        self.packet.unref();
    }

    /// 成功写入的数据包数
    pub fn relayed(&self) -> u64 {
        self.relayed
    }

    /// 流时间基
    pub fn stream_time_base(&self) -> Rational {
        self.stream_time_base
    }
}
