//! 编解码器注册表.
//!
//! 对标 FFmpeg 的编解码器注册机制. 编码器按名称查找 (如 `avcodec_find_encoder_by_name`),
//! 解码器按 CodecId 查找.
//!
//! 进程级注册表通过 [`CodecRegistry::global`] 获取: 首次访问时注册所有内置编解码器,
//! 之后只读, 可在任意线程并发查询.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use bianma_core::{BianmaError, BianmaResult, PixelFormat};

use crate::codec_id::CodecId;
use crate::decoder::Decoder;
use crate::encoder::Encoder;

/// 解码器工厂函数类型
pub type DecoderFactory = fn() -> BianmaResult<Box<dyn Decoder>>;

/// 编码器工厂类型
///
/// 允许闭包, 便于注册携带配置的编码器实现.
pub type EncoderFactory = Box<dyn Fn() -> BianmaResult<Box<dyn Encoder>> + Send + Sync>;

/// 编码器描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderDescriptor {
    /// 编解码器标识
    pub codec_id: CodecId,
    /// 编码器名称 (查找键)
    pub name: &'static str,
    /// 可读的完整名称
    pub long_name: &'static str,
    /// 支持的输入像素格式, 按编码器偏好排序
    pub pixel_formats: &'static [PixelFormat],
}

impl EncoderDescriptor {
    /// 是否支持指定像素格式
    pub fn supports(&self, pixel_format: PixelFormat) -> bool {
        self.pixel_formats.contains(&pixel_format)
    }
}

impl fmt::Display for EncoderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.name, self.long_name)
    }
}

/// 编解码器注册表
pub struct CodecRegistry {
    /// 解码器工厂映射
    decoders: HashMap<CodecId, Vec<DecoderEntry>>,
    /// 编码器, 保持注册顺序
    encoders: Vec<EncoderEntry>,
}

/// 解码器注册条目
struct DecoderEntry {
    /// 解码器名称
    name: String,
    /// 工厂函数
    factory: DecoderFactory,
}

/// 编码器注册条目
struct EncoderEntry {
    descriptor: EncoderDescriptor,
    factory: EncoderFactory,
}

static GLOBAL_REGISTRY: OnceLock<Arc<CodecRegistry>> = OnceLock::new();

impl CodecRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
            encoders: Vec::new(),
        }
    }

    /// 创建包含所有内置编解码器的注册表
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        crate::register_all(&mut registry);
        registry
    }

    /// 进程级只读注册表
    pub fn global() -> Arc<CodecRegistry> {
        GLOBAL_REGISTRY
            .get_or_init(|| Arc::new(Self::with_builtin()))
            .clone()
    }

    /// 注册一个解码器
    pub fn register_decoder(
        &mut self,
        codec_id: CodecId,
        name: impl Into<String>,
        factory: DecoderFactory,
    ) {
        self.decoders
            .entry(codec_id)
            .or_default()
            .push(DecoderEntry {
                name: name.into(),
                factory,
            });
    }

    /// 注册一个编码器
    ///
    /// 同名编码器后注册的不会覆盖先注册的, 查找总是返回第一个.
    pub fn register_encoder<F>(&mut self, descriptor: EncoderDescriptor, factory: F)
    where
        F: Fn() -> BianmaResult<Box<dyn Encoder>> + Send + Sync + 'static,
    {
        self.encoders.push(EncoderEntry {
            descriptor,
            factory: Box::new(factory),
        });
    }

    /// 按名称查找编码器描述
    pub fn find_encoder(&self, name: &str) -> Option<&EncoderDescriptor> {
        self.encoders
            .iter()
            .map(|e| &e.descriptor)
            .find(|d| d.name == name)
    }

    /// 按名称创建编码器实例
    pub fn create_encoder(&self, name: &str) -> BianmaResult<Box<dyn Encoder>> {
        let entry = self
            .encoders
            .iter()
            .find(|e| e.descriptor.name == name)
            .ok_or_else(|| BianmaError::CodecNotFound(format!("未找到名为 {name} 的编码器")))?;
        (entry.factory)()
    }

    /// 创建指定编解码器 ID 的解码器实例
    pub fn create_decoder(&self, codec_id: CodecId) -> BianmaResult<Box<dyn Decoder>> {
        let entry = self
            .decoders
            .get(&codec_id)
            .and_then(|entries| entries.first())
            .ok_or_else(|| BianmaError::CodecNotFound(format!("未找到 {codec_id} 的解码器")))?;
        (entry.factory)()
    }

    /// 所有已注册编码器的描述, 按注册顺序
    pub fn list_encoders(&self) -> Vec<EncoderDescriptor> {
        self.encoders.iter().map(|e| e.descriptor.clone()).collect()
    }

    /// 获取所有已注册的解码器名称
    pub fn list_decoders(&self) -> Vec<(CodecId, &str)> {
        let mut result = Vec::new();
        for (id, entries) in &self.decoders {
            for entry in entries {
                result.push((*id, entry.name.as_str()));
            }
        }
        result.sort_by(|a, b| a.1.cmp(b.1));
        result
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("encoders", &self.list_encoders())
            .field("decoders", &self.list_decoders())
            .finish()
    }
}
