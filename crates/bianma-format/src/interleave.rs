//! 多流交错写入.
//!
//! 对标 FFmpeg 的 `av_interleaved_write_frame`: 每条流一个等待队列,
//! 只有当所有流都有待写数据包时才释放 dts 最小的一个. 单流时数据包直接通过.

use std::cmp::Ordering;
use std::collections::VecDeque;

use bianma_codec::Packet;
use bianma_core::{BianmaError, BianmaResult, NOPTS_VALUE};

/// 交错缓冲
#[derive(Debug, Default)]
pub struct Interleaver {
    queues: Vec<VecDeque<Packet>>,
}

impl Interleaver {
    /// 为 `stream_count` 条流创建交错缓冲
    pub fn new(stream_count: usize) -> Self {
        Self {
            queues: (0..stream_count).map(|_| VecDeque::new()).collect(),
        }
    }

    /// 流数量
    pub fn stream_count(&self) -> usize {
        self.queues.len()
    }

    /// 缓冲中的数据包总数
    pub fn pending(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    /// 放入一个数据包
    pub fn push(&mut self, packet: Packet) -> BianmaResult<()> {
        let queue = self
            .queues
            .get_mut(packet.stream_index)
            .ok_or(BianmaError::StreamNotFound(packet.stream_index))?;
        queue.push_back(packet);
        Ok(())
    }

    /// 取出一个可以写入的数据包
    ///
    /// 任意一条流的队列为空时返回 None, 因为该流后续的数据包可能更早.
    pub fn pop_ready(&mut self) -> Option<Packet> {
        if self.queues.is_empty() || self.queues.iter().any(VecDeque::is_empty) {
            return None;
        }
        self.pop_earliest()
    }

    /// 不再等待, 按 dts 顺序取出剩余数据包 (写尾部前使用)
    pub fn drain(&mut self) -> Option<Packet> {
        self.pop_earliest()
    }

    fn pop_earliest(&mut self) -> Option<Packet> {
        let mut best: Option<usize> = None;
        for (index, queue) in self.queues.iter().enumerate() {
            let Some(head) = queue.front() else {
                continue;
            };
            let is_earlier = match best {
                None => true,
                Some(b) => {
                    let current = self.queues[b].front();
                    current.is_none_or(|cur| compare_dts(head, cur) == Ordering::Less)
                }
            };
            if is_earlier {
                best = Some(index);
            }
        }
        best.and_then(|index| self.queues[index].pop_front())
    }
}

/// 跨时间基精确比较两个数据包的解码时间
///
/// 相等时保持原顺序 (低索引的流优先).
fn compare_dts(a: &Packet, b: &Packet) -> Ordering {
    let a_ts = effective_dts(a);
    let b_ts = effective_dts(b);
    match (a_ts, b_ts) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a_ts), Some(b_ts)) => {
            // a_ts * a.num / a.den 对比 b_ts * b.num / b.den, 分母均为正
            let lhs = i128::from(a_ts)
                * i128::from(a.time_base.num)
                * i128::from(b.time_base.den);
            let rhs = i128::from(b_ts)
                * i128::from(b.time_base.num)
                * i128::from(a.time_base.den);
            lhs.cmp(&rhs)
        }
    }
}

fn effective_dts(packet: &Packet) -> Option<i64> {
    if packet.dts != NOPTS_VALUE {
        Some(packet.dts)
    } else if packet.pts != NOPTS_VALUE {
        Some(packet.pts)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bianma_core::Rational;

    fn packet(stream_index: usize, dts: i64, time_base: Rational) -> Packet {
        let mut pkt = Packet::from_data(vec![stream_index as u8]);
        pkt.stream_index = stream_index;
        pkt.pts = dts;
        pkt.dts = dts;
        pkt.time_base = time_base;
        pkt
    }

    #[test]
    fn test_单流直接通过() {
        let mut il = Interleaver::new(1);
        il.push(packet(0, 0, Rational::new(1, 30))).unwrap();
        assert_eq!(il.pop_ready().unwrap().dts, 0);
        assert!(il.pop_ready().is_none());
    }

    #[test]
    fn test_多流等待所有流() {
        let mut il = Interleaver::new(2);
        il.push(packet(0, 0, Rational::new(1, 30))).unwrap();
        il.push(packet(0, 1, Rational::new(1, 30))).unwrap();
        assert!(il.pop_ready().is_none());

        // 流 1 的 1500/90000 = 1/60 秒, 早于流 0 的 1/30 秒
        il.push(packet(1, 1500, Rational::new(1, 90000))).unwrap();
        let first = il.pop_ready().unwrap();
        assert_eq!((first.stream_index, first.dts), (0, 0));
        let second = il.pop_ready().unwrap();
        assert_eq!((second.stream_index, second.dts), (1, 1500));
        // 流 1 已空, 等待
        assert!(il.pop_ready().is_none());
        assert_eq!(il.pending(), 1);
        assert_eq!(il.drain().unwrap().dts, 1);
        assert!(il.drain().is_none());
    }

    #[test]
    fn test_时间相等时低索引优先() {
        let mut il = Interleaver::new(2);
        il.push(packet(1, 3000, Rational::new(1, 90000))).unwrap();
        il.push(packet(0, 1, Rational::new(1, 30))).unwrap();
        assert_eq!(il.pop_ready().unwrap().stream_index, 0);
        // 流 0 已空, 流 1 必须等待
        assert!(il.pop_ready().is_none());
        il.push(packet(0, 2, Rational::new(1, 30))).unwrap();
        assert_eq!(il.pop_ready().unwrap().stream_index, 1);
        assert_eq!(il.drain().unwrap().stream_index, 0);
        assert!(il.drain().is_none());
    }

    #[test]
    fn test_未知流索引() {
        let mut il = Interleaver::new(1);
        let err = il.push(packet(3, 0, Rational::new(1, 30))).unwrap_err();
        assert!(matches!(err, BianmaError::StreamNotFound(3)));
    }
}
