//! 解码器 trait 定义.
//!
//! 编码管线只在校验输出时使用解码器 (往返测试, 探测工具).

use bianma_core::BianmaResult;

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::frame::VideoFrame;
use crate::packet::Packet;

/// 解码器 trait
///
/// 解码流程:
/// 1. 调用 `open()` 传入容器中记录的编解码器参数
/// 2. 调用 `send_packet()` 送入压缩数据
/// 3. 调用 `receive_frame()` 取出解码后的帧
/// 4. 送入空包 (flush) 后取出剩余帧, 直到返回 `Eof`
pub trait Decoder: Send {
    /// 获取解码器标识
    fn codec_id(&self) -> CodecId;

    /// 获取解码器名称
    fn name(&self) -> &str;

    /// 使用参数配置解码器
    fn open(&mut self, params: &CodecParameters) -> BianmaResult<()>;

    /// 送入一个压缩数据包进行解码, 空包表示刷新
    ///
    /// # 返回
    /// - `Ok(())`: 数据包已接受
    /// - `Err(BianmaError::NeedMoreData)`: 需要先取出已解码的帧
    fn send_packet(&mut self, packet: &Packet) -> BianmaResult<()>;

    /// 从解码器取出一帧解码数据
    ///
    /// # 返回
    /// - `Ok(frame)`: 成功取出一帧
    /// - `Err(BianmaError::NeedMoreData)`: 需要送入更多数据包
    /// - `Err(BianmaError::Eof)`: 所有帧已取出
    fn receive_frame(&mut self) -> BianmaResult<VideoFrame>;

    /// 刷新解码器, 清空内部状态
    fn flush(&mut self);
}
