//! 容器格式注册表.
//!
//! 管理所有已注册的解封装器/封装器, 支持按格式标识查找和自动探测.
//! [`FormatRegistry::global`] 返回进程级只读注册表.

use std::collections::HashMap;
use std::fmt;
use std::io::SeekFrom;
use std::sync::{Arc, OnceLock};

use bianma_core::{BianmaError, BianmaResult};

use crate::demuxer::Demuxer;
use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::muxer::Muxer;
use crate::probe::{FormatProbe, ProbeResult};

/// 解封装器工厂函数类型
pub type DemuxerFactory = fn() -> BianmaResult<Box<dyn Demuxer>>;

/// 封装器工厂函数类型
pub type MuxerFactory = fn() -> BianmaResult<Box<dyn Muxer>>;

/// 探测时读取的最大字节数
const PROBE_SIZE: u64 = 8192;

/// 容器格式注册表
pub struct FormatRegistry {
    demuxers: HashMap<FormatId, FactoryEntry<DemuxerFactory>>,
    muxers: HashMap<FormatId, FactoryEntry<MuxerFactory>>,
    probes: Vec<Box<dyn FormatProbe>>,
}

/// 注册条目
struct FactoryEntry<F> {
    /// 格式名称
    name: String,
    factory: F,
}

static GLOBAL_REGISTRY: OnceLock<Arc<FormatRegistry>> = OnceLock::new();

impl FormatRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self {
            demuxers: HashMap::new(),
            muxers: HashMap::new(),
            probes: Vec::new(),
        }
    }

    /// 创建包含所有内置格式的注册表
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        crate::register_all(&mut registry);
        registry
    }

    /// 进程级只读注册表
    pub fn global() -> Arc<FormatRegistry> {
        GLOBAL_REGISTRY
            .get_or_init(|| Arc::new(Self::with_builtin()))
            .clone()
    }

    /// 注册一个解封装器
    pub fn register_demuxer(
        &mut self,
        format_id: FormatId,
        name: impl Into<String>,
        factory: DemuxerFactory,
    ) {
        self.demuxers.insert(
            format_id,
            FactoryEntry {
                name: name.into(),
                factory,
            },
        );
    }

    /// 注册一个封装器
    pub fn register_muxer(
        &mut self,
        format_id: FormatId,
        name: impl Into<String>,
        factory: MuxerFactory,
    ) {
        self.muxers.insert(
            format_id,
            FactoryEntry {
                name: name.into(),
                factory,
            },
        );
    }

    /// 注册一个格式探测器
    pub fn register_probe(&mut self, probe: Box<dyn FormatProbe>) {
        self.probes.push(probe);
    }

    /// 创建指定格式的解封装器实例
    pub fn create_demuxer(&self, format_id: FormatId) -> BianmaResult<Box<dyn Demuxer>> {
        let entry = self.demuxers.get(&format_id).ok_or_else(|| {
            BianmaError::FormatNotFound(format!("未找到 {format_id} 的解封装器"))
        })?;
        (entry.factory)()
    }

    /// 创建指定格式的封装器实例
    pub fn create_muxer(&self, format_id: FormatId) -> BianmaResult<Box<dyn Muxer>> {
        let entry = self.muxers.get(&format_id).ok_or_else(|| {
            BianmaError::FormatNotFound(format!("未找到 {format_id} 的封装器"))
        })?;
        (entry.factory)()
    }

    /// 探测数据的容器格式
    ///
    /// 遍历所有已注册的探测器, 返回置信度最高的结果.
    pub fn probe(&self, data: &[u8], filename: Option<&str>) -> Option<ProbeResult> {
        let mut best: Option<ProbeResult> = None;
        for probe in &self.probes {
            if let Some(score) = probe.probe(data, filename) {
                let is_better = best.as_ref().is_none_or(|b| score > b.score);
                if is_better {
                    best = Some(ProbeResult {
                        format_id: probe.format_id(),
                        score,
                    });
                }
            }
        }
        best
    }

    /// 探测输入格式 (不打开解封装器), 完成后 seek 回起始位置
    pub fn probe_input(
        &self,
        io: &mut IoContext,
        filename: Option<&str>,
    ) -> BianmaResult<ProbeResult> {
        let probe_size = io.size().unwrap_or(PROBE_SIZE).min(PROBE_SIZE) as usize;
        let probe_buf = io.read_bytes(probe_size)?;

        let result = self.probe(&probe_buf, filename).ok_or_else(|| {
            BianmaError::FormatNotFound("无法识别输入文件格式".to_string())
        })?;

        io.seek(SeekFrom::Start(0))?;
        Ok(result)
    }

    /// 自动探测格式, 创建对应的解封装器并解析头部
    pub fn open_input(
        &self,
        io: &mut IoContext,
        filename: Option<&str>,
    ) -> BianmaResult<Box<dyn Demuxer>> {
        let result = self.probe_input(io, filename)?;
        let mut demuxer = self.create_demuxer(result.format_id)?;
        demuxer.open(io)?;
        Ok(demuxer)
    }

    /// 获取所有已注册的解封装器名称, 按名称排序
    pub fn list_demuxers(&self) -> Vec<(FormatId, &str)> {
        let mut list: Vec<_> = self
            .demuxers
            .iter()
            .map(|(id, entry)| (*id, entry.name.as_str()))
            .collect();
        list.sort_by(|a, b| a.1.cmp(b.1));
        list
    }

    /// 获取所有已注册的封装器名称, 按名称排序
    pub fn list_muxers(&self) -> Vec<(FormatId, &str)> {
        let mut list: Vec<_> = self
            .muxers
            .iter()
            .map(|(id, entry)| (*id, entry.name.as_str()))
            .collect();
        list.sort_by(|a, b| a.1.cmp(b.1));
        list
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("muxers", &self.list_muxers())
            .field("demuxers", &self.list_demuxers())
            .field("probes", &self.probes.len())
            .finish()
    }
}
