//! vdelta 码流格式.
//!
//! 数据包布局 (小端):
//!
//! | 偏移 | 长度 | 含义 |
//! |------|------|------|
//! | 0 | 1 | 帧类型 (0=I, 1=P, 2=非参考帧) |
//! | 1 | 1 | 平面数 |
//! | 2 | 4 * n + Σ | 每平面: u32 压缩长度 + PackBits 负载 |
//!
//! extradata 布局: `VDLT` + 版本 u8 + 像素格式码 u8 + GOP u16 + 最大非参考帧数 u16.

use std::io::{Cursor, Read};

use bianma_core::{BianmaError, BianmaResult, PixelFormat};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// extradata 魔数
pub const VDELTA_MAGIC: &[u8; 4] = b"VDLT";
/// 码流版本
pub const VDELTA_VERSION: u8 = 1;
/// extradata 总长度
pub const EXTRADATA_SIZE: usize = 10;

/// 帧类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// 帧内编码, 关键帧
    Intra,
    /// 参考帧, 预测自上一个参考帧
    Reference,
    /// 非参考帧, 预测自上一个参考帧, 自身不作参考
    NonReference,
}

impl FrameKind {
    fn code(self) -> u8 {
        match self {
            Self::Intra => 0,
            Self::Reference => 1,
            Self::NonReference => 2,
        }
    }

    fn from_code(code: u8) -> BianmaResult<Self> {
        match code {
            0 => Ok(Self::Intra),
            1 => Ok(Self::Reference),
            2 => Ok(Self::NonReference),
            _ => Err(BianmaError::InvalidData(format!("未知 vdelta 帧类型: {code}"))),
        }
    }

    /// 解码后是否更新参考帧
    pub fn updates_reference(self) -> bool {
        !matches!(self, Self::NonReference)
    }
}

/// vdelta 流头信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    pub pixel_format: PixelFormat,
    pub gop_size: u16,
    pub max_b_frames: u16,
}

/// 像素格式 <-> 码流中的格式码
fn pixel_format_code(pf: PixelFormat) -> u8 {
    PixelFormat::ALL
        .iter()
        .position(|p| *p == pf)
        .map_or(0, |i| i as u8 + 1)
}

fn pixel_format_from_code(code: u8) -> PixelFormat {
    match code {
        0 => PixelFormat::None,
        c => PixelFormat::ALL
            .get(usize::from(c) - 1)
            .copied()
            .unwrap_or(PixelFormat::None),
    }
}

/// 生成 extradata
pub fn write_extradata(header: &StreamHeader) -> Vec<u8> {
    let mut out = Vec::with_capacity(EXTRADATA_SIZE);
    out.extend_from_slice(VDELTA_MAGIC);
    out.push(VDELTA_VERSION);
    out.push(pixel_format_code(header.pixel_format));
    // 写入 Vec 不会失败
    let _ = out.write_u16::<LittleEndian>(header.gop_size);
    let _ = out.write_u16::<LittleEndian>(header.max_b_frames);
    out
}

/// 解析 extradata
pub fn parse_extradata(data: &[u8]) -> BianmaResult<StreamHeader> {
    if data.len() < EXTRADATA_SIZE || &data[..4] != VDELTA_MAGIC {
        return Err(BianmaError::InvalidData("vdelta extradata 缺失或魔数错误".into()));
    }
    if data[4] != VDELTA_VERSION {
        return Err(BianmaError::Unsupported(format!(
            "不支持的 vdelta 版本: {}",
            data[4]
        )));
    }
    let mut cursor = Cursor::new(&data[6..]);
    Ok(StreamHeader {
        pixel_format: pixel_format_from_code(data[5]),
        gop_size: cursor.read_u16::<LittleEndian>()?,
        max_b_frames: cursor.read_u16::<LittleEndian>()?,
    })
}

/// 组装数据包负载
pub fn write_packet(kind: FrameKind, planes: &[Vec<u8>]) -> Vec<u8> {
    let total: usize = planes.iter().map(|p| p.len() + 4).sum();
    let mut out = Vec::with_capacity(2 + total);
    out.push(kind.code());
    out.push(planes.len() as u8);
    for plane in planes {
        let _ = out.write_u32::<LittleEndian>(plane.len() as u32);
        out.extend_from_slice(plane);
    }
    out
}

/// 拆分数据包负载, 返回帧类型与各平面的压缩数据
pub fn read_packet(data: &[u8]) -> BianmaResult<(FrameKind, Vec<&[u8]>)> {
    if data.len() < 2 {
        return Err(BianmaError::InvalidData("vdelta 数据包过短".into()));
    }
    let kind = FrameKind::from_code(data[0])?;
    let plane_count = usize::from(data[1]);
    let mut cursor = Cursor::new(data);
    cursor.set_position(2);
    let mut planes = Vec::with_capacity(plane_count);
    for plane in 0..plane_count {
        let len = cursor.read_u32::<LittleEndian>()? as usize;
        let start = cursor.position() as usize;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| BianmaError::InvalidData(format!("平面 {plane} 长度 {len} 越界")))?;
        planes.push(&data[start..end]);
        cursor.set_position(end as u64);
    }
    if (cursor.position() as usize) != data.len() {
        return Err(BianmaError::InvalidData("vdelta 数据包尾部有多余数据".into()));
    }
    Ok((kind, planes))
}

/// PackBits 游程压缩
///
/// 控制字节 n: 0..=127 表示其后 n+1 个字面字节; -127..=-1 表示下一字节重复 1-n 次.
pub fn packbits_encode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() / 2 + 8);
    let mut i = 0;
    while i < input.len() {
        // 统计重复长度
        let mut run = 1;
        while i + run < input.len() && run < 128 && input[i + run] == input[i] {
            run += 1;
        }
        if run >= 3 {
            out.push((1i16 - run as i16) as i8 as u8);
            out.push(input[i]);
            i += run;
            continue;
        }
        // 字面段: 直到遇到长度 >= 3 的重复或达到 128 字节
        let start = i;
        while i < input.len() && i - start < 128 {
            if i + 2 < input.len() && input[i] == input[i + 1] && input[i] == input[i + 2] {
                break;
            }
            i += 1;
        }
        out.push((i - start - 1) as u8);
        out.extend_from_slice(&input[start..i]);
    }
    out
}

/// PackBits 解压, `expected` 为解压后的精确长度
pub fn packbits_decode(input: &[u8], expected: usize) -> BianmaResult<Vec<u8>> {
    let mut out = Vec::with_capacity(expected);
    let mut reader = Cursor::new(input);
    while (reader.position() as usize) < input.len() {
        let n = reader.read_i8()?;
        match n {
            0..=127 => {
                let count = n as usize + 1;
                let start = out.len();
                out.resize(start + count, 0);
                reader.read_exact(&mut out[start..])?;
            }
            -127..=-1 => {
                let value = reader.read_u8()?;
                let count = (1 - i16::from(n)) as usize;
                out.resize(out.len() + count, value);
            }
            // -128 保留为空操作
            _ => {}
        }
        if out.len() > expected {
            break;
        }
    }
    if out.len() != expected {
        return Err(BianmaError::InvalidData(format!(
            "PackBits 解压长度 {} 与预期 {} 不一致",
            out.len(),
            expected
        )));
    }
    Ok(out)
}
