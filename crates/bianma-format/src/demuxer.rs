//! 解封装器 (Demuxer) trait 定义.
//!
//! 读取侧仅用于重新探测输出文件和往返解码校验.

use bianma_codec::Packet;
use bianma_core::BianmaResult;

use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::stream::Stream;

/// 解封装器 trait
pub trait Demuxer: Send {
    /// 获取格式标识
    fn format_id(&self) -> FormatId;

    /// 获取格式名称
    fn name(&self) -> &str;

    /// 打开容器并解析头部信息
    fn open(&mut self, io: &mut IoContext) -> BianmaResult<()>;

    /// 获取所有流信息
    fn streams(&self) -> &[Stream];

    /// 读取下一个数据包
    ///
    /// # 返回
    /// - `Ok(packet)`: 成功读取一个数据包
    /// - `Err(BianmaError::Eof)`: 已到达文件末尾
    fn read_packet(&mut self, io: &mut IoContext) -> BianmaResult<Packet>;

    /// 获取容器时长 (秒), None 表示未知
    fn duration(&self) -> Option<f64>;
}
