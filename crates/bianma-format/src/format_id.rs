//! 容器格式标识符.
//!
//! 输出格式由文件扩展名推断, 不提供显式覆盖.

use std::fmt;
use std::path::Path;

/// 容器格式标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatId {
    /// Audio Video Interleave (AVI)
    Avi,
    /// 丢弃所有数据包的空容器, 自行管理 I/O
    Null,
}

impl FormatId {
    /// 所有已知格式
    pub const ALL: &[FormatId] = &[Self::Avi, Self::Null];

    /// 格式名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Avi => "avi",
            Self::Null => "null",
        }
    }

    /// 格式常用的文件扩展名
    pub const fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Avi => &["avi"],
            Self::Null => &["null"],
        }
    }

    /// 根据扩展名 (不含 `.`) 查找格式, 大小写不敏感
    pub fn from_extension(ext: &str) -> Option<FormatId> {
        let ext_lower = ext.to_ascii_lowercase();
        Self::ALL
            .iter()
            .find(|id| id.extensions().contains(&ext_lower.as_str()))
            .copied()
    }

    /// 从文件路径推断格式
    pub fn from_filename(path: impl AsRef<Path>) -> Option<FormatId> {
        let ext = path.as_ref().extension()?.to_str()?;
        Self::from_extension(ext)
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_从扩展名推断() {
        assert_eq!(FormatId::from_extension("avi"), Some(FormatId::Avi));
        assert_eq!(FormatId::from_extension("AVI"), Some(FormatId::Avi));
        assert_eq!(FormatId::from_extension("null"), Some(FormatId::Null));
        assert_eq!(FormatId::from_extension("mp4"), None);
    }

    #[test]
    fn test_从路径推断() {
        assert_eq!(FormatId::from_filename("/tmp/out.avi"), Some(FormatId::Avi));
        assert_eq!(FormatId::from_filename("clip.test.Avi"), Some(FormatId::Avi));
        assert_eq!(FormatId::from_filename("out"), None);
        assert_eq!(FormatId::from_filename("dir.avi/out"), None);
    }
}
