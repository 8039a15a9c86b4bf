//! 压缩数据包 (Packet).
//!
//! 对标 FFmpeg 的 `AVPacket`, 表示编码器输出或容器中读取的一帧压缩数据.

use bianma_core::Rational;
use bianma_core::timestamp::NOPTS_VALUE;
use bytes::Bytes;

/// 压缩数据包
///
/// 编码管线中同一个 Packet 会被反复复用: 编码器通过 `receive_packet`
/// 填充它, 写入容器后调用 [`Packet::unref`] 释放负载, 再进入下一轮.
#[derive(Debug, Clone)]
pub struct Packet {
    /// 压缩数据
    pub data: Bytes,
    /// 显示时间戳 (PTS)
    pub pts: i64,
    /// 解码时间戳 (DTS)
    pub dts: i64,
    /// 数据包时长 (以 time_base 为单位)
    pub duration: i64,
    /// 时间基
    pub time_base: Rational,
    /// 所属流的索引
    pub stream_index: usize,
    /// 是否为关键帧
    pub is_keyframe: bool,
    /// 在容器中的字节偏移量 (-1 表示未知)
    pub pos: i64,
}

impl Packet {
    /// 创建空数据包
    pub fn empty() -> Self {
        Self {
            data: Bytes::new(),
            pts: NOPTS_VALUE,
            dts: NOPTS_VALUE,
            duration: 0,
            time_base: Rational::UNDEFINED,
            stream_index: 0,
            is_keyframe: false,
            pos: -1,
        }
    }

    /// 从数据创建数据包
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::empty()
        }
    }

    /// 释放负载引用并把所有字段恢复为空包状态
    ///
    /// 对标 `av_packet_unref`. 负载是 `Bytes`, 释放后编码器内部的共享缓冲
    /// 引用计数随之减少.
    pub fn unref(&mut self) {
        *self = Self::empty();
    }

    /// 是否处于未引用状态 (无负载, 时间戳未定义)
    pub fn is_unreferenced(&self) -> bool {
        self.data.is_empty() && self.pts == NOPTS_VALUE && self.dts == NOPTS_VALUE
    }

    /// 数据大小 (字节)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 是否为空包 (flush packet)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unref_恢复空包状态() {
        let mut pkt = Packet::from_data(vec![1u8, 2, 3]);
        pkt.pts = 7;
        pkt.dts = 7;
        pkt.duration = 1;
        pkt.stream_index = 2;
        pkt.is_keyframe = true;
        assert!(!pkt.is_unreferenced());

        pkt.unref();
        assert!(pkt.is_unreferenced());
        assert_eq!(pkt.size(), 0);
        assert_eq!(pkt.stream_index, 0);
        assert!(!pkt.is_keyframe);
    }

    #[test]
    fn test_unref_释放共享缓冲() {
        let shared = Bytes::from(vec![9u8; 64]);
        let mut pkt = Packet::from_data(shared.clone());
        assert!(!shared.is_unique());
        pkt.unref();
        assert!(shared.is_unique());
    }
}
