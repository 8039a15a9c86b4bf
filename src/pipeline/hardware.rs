//! 硬件加速扩展点.
//!
//! 会话打开时先调用 `init_context` 绑定设备上下文, 再打开编码器;
//! 编码器的候选像素格式交给 `select_format` 决定. 默认实现走软件路径.

use bianma_core::{BianmaError, BianmaResult, PixelFormat};
use log::debug;

use super::properties::VideoProperties;

/// 硬件策略
pub trait HardwareStrategy: Send {
    /// 策略名称
    fn name(&self) -> &str;

    /// 在编码器打开前初始化设备上下文
    fn init_context(&mut self, _props: &VideoProperties) -> BianmaResult<()> {
        Ok(())
    }

    /// 从编码器的候选像素格式中选择一个, 默认取第一个
    fn select_format(&self, candidates: &[PixelFormat]) -> BianmaResult<PixelFormat> {
        candidates
            .first()
            .copied()
            .ok_or_else(|| BianmaError::Unsupported("编码器没有可用的像素格式".into()))
    }

    /// 释放设备上下文与帧池, 会话关闭时在编码器和容器之后调用
    fn release(&mut self) {}
}

/// 软件路径: 不绑定设备, 选第一个候选格式
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareStrategy;

impl HardwareStrategy for SoftwareStrategy {
    fn name(&self) -> &str {
        "software"
    }
}

/// 按偏好列表选择格式的策略
///
/// 用于需要特定上传格式的设备 (如只接受 nv12 的编码硬件).
/// 设备上下文在 `init_context` 与 `release` 之间保持有效.
#[derive(Debug, Clone)]
pub struct PreferredFormatStrategy {
    name: String,
    preferred: Vec<PixelFormat>,
    context_ready: bool,
}

impl PreferredFormatStrategy {
    /// 创建策略, `preferred` 按优先级排序
    pub fn new(name: impl Into<String>, preferred: Vec<PixelFormat>) -> Self {
        Self {
            name: name.into(),
            preferred,
            context_ready: false,
        }
    }

    /// 设备上下文是否已初始化
    pub fn is_context_ready(&self) -> bool {
        self.context_ready
    }
}

impl HardwareStrategy for PreferredFormatStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn init_context(&mut self, props: &VideoProperties) -> BianmaResult<()> {
        if self.preferred.is_empty() {
            return Err(BianmaError::Hardware(format!(
                "{}: 偏好格式列表为空",
                self.name
            )));
        }
        debug!(
            "{}: 初始化设备上下文 {}x{}",
            self.name, props.width, props.height
        );
        self.context_ready = true;
        Ok(())
    }

    fn select_format(&self, candidates: &[PixelFormat]) -> BianmaResult<PixelFormat> {
        self.preferred
            .iter()
            .find(|fmt| candidates.contains(fmt))
            .copied()
            .ok_or_else(|| {
                BianmaError::Hardware(format!(
                    "{}: 候选格式 {:?} 中没有设备支持的格式",
                    self.name, candidates
                ))
            })
    }

    fn release(&mut self) {
        if self.context_ready {
            debug!("{}: 释放设备上下文", self.name);
            self.context_ready = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bianma_core::Rational;

    #[test]
    fn test_软件路径选第一个() {
        let s = SoftwareStrategy;
        let fmt = s
            .select_format(&[PixelFormat::Yuv420p, PixelFormat::Nv12])
            .unwrap();
        assert_eq!(fmt, PixelFormat::Yuv420p);
        assert!(s.select_format(&[]).is_err());
    }

    #[test]
    fn test_偏好格式() {
        let props = VideoProperties::new(64, 64, Rational::new(25, 1), PixelFormat::Yuv420p, "vdelta");
        let mut s = PreferredFormatStrategy::new("nv12-upload", vec![PixelFormat::Nv12]);
        s.init_context(&props).unwrap();
        assert!(s.is_context_ready());
        let fmt = s
            .select_format(&[PixelFormat::Yuv420p, PixelFormat::Nv12])
            .unwrap();
        assert_eq!(fmt, PixelFormat::Nv12);
        assert!(s.select_format(&[PixelFormat::Rgb24]).is_err());
        s.release();
        assert!(!s.is_context_ready());
    }
}
