//! 合成测试图案.
//!
//! 打包 RGB 格式生成随帧号平移的彩条, 其余格式在每个平面上生成渐变.

use anyhow::{Result, bail};
use bianma::core::PixelFormat;

/// 8 条彩条 (R, G, B)
const BARS: [(u8, u8, u8); 8] = [
    (235, 235, 235),
    (235, 235, 16),
    (16, 235, 235),
    (16, 235, 16),
    (235, 16, 235),
    (235, 16, 16),
    (16, 16, 235),
    (16, 16, 16),
];

/// 生成第 `index` 帧的紧凑缓冲
pub(crate) fn generate(format: PixelFormat, width: u32, height: u32, index: u64) -> Result<Vec<u8>> {
    let Some(size) = format.frame_size(width, height) else {
        bail!("无法为像素格式 {format} 生成图案");
    };
    let w = width as usize;
    let h = height as usize;
    let shift = (index as usize * 4) % w.max(1);

    let layout = match format {
        PixelFormat::Rgb24 => Some((0, 1, 2, 3)),
        PixelFormat::Bgr24 => Some((2, 1, 0, 3)),
        PixelFormat::Rgba => Some((0, 1, 2, 4)),
        PixelFormat::Bgra => Some((2, 1, 0, 4)),
        _ => None,
    };

    let mut buf = vec![0u8; size];
    match layout {
        Some((r, g, b, bpp)) => {
            for (row, line) in buf.chunks_exact_mut(w * bpp).take(h).enumerate() {
                for col in 0..w {
                    let bar = ((col + shift) * BARS.len() / w) % BARS.len();
                    let (cr, cg, cb) = BARS[bar];
                    let px = &mut line[col * bpp..(col + 1) * bpp];
                    px[r] = cr;
                    px[g] = cg;
                    // 底部 1/8 叠加灰阶, 便于肉眼确认行序
                    px[b] = if row >= h * 7 / 8 { (col * 255 / w.max(1)) as u8 } else { cb };
                    if bpp == 4 {
                        px[3] = 255;
                    }
                }
            }
        }
        None => {
            let mut offset = 0;
            for plane in 0..format.plane_count() as usize {
                let (Some(stride), Some(rows)) = (
                    format.plane_linesize(plane, width),
                    format.plane_height(plane, height),
                ) else {
                    break;
                };
                for row in 0..rows {
                    for col in 0..stride {
                        buf[offset + row * stride + col] =
                            ((col + row + shift + plane * 64) & 0xff) as u8;
                    }
                }
                offset += stride * rows;
            }
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_图案大小() {
        let buf = generate(PixelFormat::Rgb24, 16, 8, 0).unwrap();
        assert_eq!(buf.len(), 16 * 8 * 3);
        let buf = generate(PixelFormat::Yuv420p, 15, 9, 3).unwrap();
        assert_eq!(buf.len(), PixelFormat::Yuv420p.frame_size(15, 9).unwrap());
        assert!(generate(PixelFormat::None, 4, 4, 0).is_err());
    }

    #[test]
    fn test_相邻帧不同() {
        let a = generate(PixelFormat::Bgra, 32, 4, 0).unwrap();
        let b = generate(PixelFormat::Bgra, 32, 4, 1).unwrap();
        assert_ne!(a, b);
    }
}
