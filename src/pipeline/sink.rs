//! 容器输出: 由输出路径推断格式, 负责头部, 交错写入和尾部.

use std::path::{Path, PathBuf};

use bianma_codec::Packet;
use bianma_core::{BianmaError, BianmaResult};
use bianma_format::{FormatId, FormatRegistry, Interleaver, IoContext, Muxer, MuxerFlags, Stream};
use log::{debug, info};

/// 容器输出
pub struct FormatSink {
    path: PathBuf,
    format_id: FormatId,
    muxer: Box<dyn Muxer>,
    io: IoContext,
    streams: Vec<Stream>,
    interleaver: Option<Interleaver>,
    trailer_written: bool,
    closed: bool,
    packets_written: u64,
}

impl FormatSink {
    /// 按扩展名推断容器格式并打开输出
    ///
    /// 自带 I/O 的格式 (`NOFILE`) 不创建文件.
    pub fn create(path: impl AsRef<Path>, registry: &FormatRegistry) -> BianmaResult<Self> {
        let path = path.as_ref();
        let format_id = FormatId::from_filename(path).ok_or_else(|| {
            BianmaError::FormatNotFound(format!("无法从输出路径推断容器格式: {}", path.display()))
        })?;
        let muxer = registry.create_muxer(format_id)?;
        let io = if muxer.flags().contains(MuxerFlags::NOFILE) {
            IoContext::null()
        } else {
            IoContext::open_write(path)?
        };
        debug!("容器输出已打开: {} ({})", path.display(), muxer.name());
        Ok(Self::with_parts(path, format_id, muxer, io))
    }

    /// 使用已创建的封装器和 I/O 上下文 (如内存输出)
    pub fn with_parts(
        path: impl Into<PathBuf>,
        format_id: FormatId,
        muxer: Box<dyn Muxer>,
        io: IoContext,
    ) -> Self {
        Self {
            path: path.into(),
            format_id,
            muxer,
            io,
            streams: Vec::new(),
            interleaver: None,
            trailer_written: false,
            closed: false,
            packets_written: 0,
        }
    }

    /// 添加一路流, 返回流索引. 头部写入后不再接受新流.
    pub fn add_stream(&mut self, mut stream: Stream) -> BianmaResult<usize> {
        if self.header_written() {
            return Err(BianmaError::InvalidArgument("头部已写入, 不能再添加流".into()));
        }
        let index = self.streams.len();
        stream.index = index;
        self.streams.push(stream);
        Ok(index)
    }

    /// 写入容器头部
    pub fn write_header(&mut self) -> BianmaResult<()> {
        if self.header_written() {
            return Err(BianmaError::InvalidArgument("头部已写入".into()));
        }
        self.muxer.write_header(&mut self.io, &self.streams)?;
        self.interleaver = Some(Interleaver::new(self.streams.len()));
        info!(
            "已写入 {} 头部: {}, {} 路流",
            self.muxer.name(),
            self.path.display(),
            self.streams.len()
        );
        Ok(())
    }

    /// 交错写入一个数据包
    ///
    /// 数据包的负载被移入交错队列, `packet` 返回时已为空包.
    /// 单路流时数据包立即写出.
    pub fn write_interleaved(&mut self, packet: &mut Packet) -> BianmaResult<()> {
        if self.trailer_written {
            return Err(BianmaError::InvalidArgument("尾部已写入, 不能再写数据包".into()));
        }
        let interleaver = self
            .interleaver
            .as_mut()
            .ok_or_else(|| BianmaError::InvalidArgument("头部尚未写入".into()))?;
        interleaver.push(std::mem::replace(packet, Packet::empty()))?;
        while let Some(ready) = interleaver.pop_ready() {
            self.muxer.write_packet(&mut self.io, &ready)?;
            self.packets_written += 1;
        }
        Ok(())
    }

    /// 写出交错队列中剩余的数据包, 再写入尾部
    pub fn write_trailer(&mut self) -> BianmaResult<()> {
        if self.trailer_written {
            return Ok(());
        }
        let interleaver = self
            .interleaver
            .as_mut()
            .ok_or_else(|| BianmaError::InvalidArgument("头部尚未写入".into()))?;
        while let Some(pending) = interleaver.drain() {
            self.muxer.write_packet(&mut self.io, &pending)?;
            self.packets_written += 1;
        }
        self.muxer.write_trailer(&mut self.io)?;
        self.io.flush()?;
        self.trailer_written = true;
        info!(
            "已写入 {} 尾部: {}, 共 {} 个数据包",
            self.muxer.name(),
            self.path.display(),
            self.packets_written
        );
        Ok(())
    }

    /// 关闭输出, 可重复调用
    pub fn close(&mut self) -> BianmaResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.io.flush()
    }

    /// 头部是否已写入
    pub fn header_written(&self) -> bool {
        self.interleaver.is_some()
    }

    /// 尾部是否已写入
    pub fn trailer_written(&self) -> bool {
        self.trailer_written
    }

    /// 容器格式
    pub fn format_id(&self) -> FormatId {
        self.format_id
    }

    /// 输出路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 已添加的流
    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    /// 已写入封装器的数据包数
    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bianma_codec::{CodecId, CodecParameters, VideoCodecParams};
    use bianma_core::{PixelFormat, Rational};
    use bianma_format::MemoryBackend;
    use bianma_format::muxers::avi::AviMuxer;

    fn stream() -> Stream {
        let params = CodecParameters::video_params(
            CodecId::RawVideo,
            VideoCodecParams {
                width: 2,
                height: 2,
                pixel_format: PixelFormat::Gray8,
                frame_rate: Rational::new(25, 1),
                sample_aspect_ratio: Rational::new(1, 1),
                video_delay: 0,
            },
        );
        Stream::from_codec_parameters(0, &params, Rational::new(1, 25)).unwrap()
    }

    #[test]
    fn test_扩展名推断失败() {
        let registry = FormatRegistry::global();
        let err = FormatSink::create("out.xyz", &registry).err().unwrap();
        assert!(matches!(err, BianmaError::FormatNotFound(_)));
    }

    #[test]
    fn test_null_不创建文件() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.null");
        let registry = FormatRegistry::global();
        let mut sink = FormatSink::create(&path, &registry).unwrap();
        sink.add_stream(stream()).unwrap();
        sink.write_header().unwrap();
        sink.write_trailer().unwrap();
        sink.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_写入流程() {
        let backend = MemoryBackend::new();
        let handle = backend.handle();
        let muxer = AviMuxer::create().unwrap();
        let mut sink = FormatSink::with_parts(
            "mem.avi",
            FormatId::Avi,
            muxer,
            IoContext::new(Box::new(backend)),
        );
        assert!(sink.write_interleaved(&mut Packet::from_data(vec![0u8; 4])).is_err());

        sink.add_stream(stream()).unwrap();
        sink.write_header().unwrap();
        assert!(sink.add_stream(stream()).is_err());

        let mut packet = Packet::from_data(vec![7u8; 4]);
        packet.pts = 0;
        packet.dts = 0;
        packet.is_keyframe = true;
        sink.write_interleaved(&mut packet).unwrap();
        assert!(packet.is_unreferenced());
        assert_eq!(sink.packets_written(), 1);

        sink.write_trailer().unwrap();
        sink.close().unwrap();
        sink.close().unwrap();
        assert!(sink.trailer_written());
        assert_eq!(sink.format_id(), FormatId::Avi);
        assert_eq!(sink.path(), Path::new("mem.avi"));
        assert_eq!(sink.streams().len(), 1);
        assert_eq!(&handle.contents()[..4], b"RIFF");
    }
}
