//! 编码管线错误类型.
//!
//! 致命错误 (初始化, 刷新, 写尾部) 与单帧错误在类型上分开,
//! 调用方不需要靠捕获位置判断能否继续.

use std::fmt;

use bianma_core::BianmaError;
use thiserror::Error;

/// 单帧失败发生的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    /// 像素格式转换
    Convert,
    /// 送入编码器
    Submit,
    /// 从编码器取包
    Receive,
    /// 写入容器
    Write,
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Convert => "转换",
            Self::Submit => "送帧",
            Self::Receive => "取包",
            Self::Write => "写入",
        };
        write!(f, "{name}")
    }
}

/// 编码管线错误
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 会话未打开 (未初始化或已关闭)
    #[error("编码会话未打开")]
    NotOpen,

    /// 已刷新完成, 不再接受新帧
    #[error("编码会话已刷新完成, 不再接受新帧")]
    AlreadyFinalized,

    /// 初始化失败, 会话保持未打开
    #[error("编码会话初始化失败: {0}")]
    Init(#[source] BianmaError),

    /// 单帧失败, 会话仍可继续使用
    #[error("第 {index} 帧{stage}失败: {source}")]
    Frame {
        /// 帧序号 (按调用顺序, 从 0 开始)
        index: u64,
        /// 失败阶段
        stage: FrameStage,
        /// 底层错误
        #[source]
        source: BianmaError,
    },

    /// 刷新或写尾部失败, 输出文件可能不可读
    #[error("刷新编码器或写入尾部失败: {0}")]
    Drain(#[source] BianmaError),
}

impl PipelineError {
    /// 是否为致命错误
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Init(_) | Self::Drain(_))
    }

    /// 单帧失败的阶段
    pub fn frame_stage(&self) -> Option<FrameStage> {
        match self {
            Self::Frame { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
