//! 编码管线端到端测试.
//!
//! 使用内置 vdelta/rawvideo 编码器与 AVI 封装器, 编码后重新探测并解码输出文件.

use std::path::{Path, PathBuf};

use bianma::codec::ThreadType;
use bianma::core::{PixelFormat, Rational};
use bianma::pipeline::{EncodePipeline, EncoderOptions, FrameStage, PipelineError, ScaleConverter, VideoProperties};
use bianma::probe::{decode_video, probe_output};
use tempfile::TempDir;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn output_in(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

/// 生成第 `index` 帧的紧凑 yuv420p 数据, 每帧内容不同
fn yuv420p_frame(width: u32, height: u32, index: u64) -> Vec<u8> {
    let size = PixelFormat::Yuv420p.frame_size(width, height).unwrap();
    (0..size)
        .map(|i| ((i as u64 * 7 + index * 31) % 251) as u8)
        .collect()
}

fn yuv_pipeline(options: EncoderOptions) -> EncodePipeline {
    EncodePipeline::new(ScaleConverter::new(PixelFormat::Yuv420p)).with_options(options)
}

fn props(width: u32, height: u32, fps: i32, codec: &str) -> VideoProperties {
    VideoProperties::new(width, height, Rational::new(fps, 1), PixelFormat::Yuv420p, codec)
}

/// 解码后的帧按平面拼接
fn decoded_planes(path: &Path) -> Vec<Vec<u8>> {
    decode_video(path)
        .unwrap()
        .iter()
        .map(|f| f.packed_planes().unwrap().concat())
        .collect()
}

#[test]
fn test_零帧编码产生合法文件() {
    init_logger();
    let dir = TempDir::new().unwrap();
    for codec in ["rawvideo", "vdelta"] {
        let path = output_in(&dir, &format!("empty_{codec}.avi"));
        let mut pipeline = yuv_pipeline(EncoderOptions::default());
        pipeline.initialize(&path, props(64, 48, 25, codec)).unwrap();
        pipeline.close().unwrap();

        let info = probe_output(&path).unwrap();
        let video = info.video().unwrap();
        assert_eq!((video.width, video.height), (64, 48));
        assert_eq!(video.nb_frames, 0);
        assert_eq!(video.packets_read, 0);
        assert!(decode_video(&path).unwrap().is_empty());
    }
}

#[test]
fn test_720p_四帧场景() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let path = output_in(&dir, "scenario.avi");
    let mut pipeline = yuv_pipeline(EncoderOptions::default());
    pipeline.initialize(&path, props(1280, 720, 30, "vdelta")).unwrap();
    for i in 0..4 {
        pipeline.encode_frame(&yuv420p_frame(1280, 720, i)).unwrap();
    }
    assert!(pipeline.finalize().unwrap());
    pipeline.close().unwrap();

    let info = probe_output(&path).unwrap();
    assert_eq!(info.format_name, "avi");
    let video = info.video().unwrap();
    assert_eq!(video.nb_frames, 4);
    assert_eq!(video.packets_read, 4);
    assert_eq!((video.width, video.height), (1280, 720));
    assert_eq!(video.pixel_format, PixelFormat::Yuv420p);
    assert!((video.frame_rate.to_f64() - 30.0).abs() < 1e-6);
}

#[test]
fn test_往返解码内容一致() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let path = output_in(&dir, "roundtrip.avi");
    let options = EncoderOptions {
        gop_size: 4,
        max_b_frames: 2,
        max_threads: 4,
        thread_type: ThreadType::FRAME | ThreadType::SLICE,
        ..EncoderOptions::default()
    };
    let mut pipeline = yuv_pipeline(options);
    pipeline.initialize(&path, props(48, 32, 25, "vdelta")).unwrap();

    let frames: Vec<Vec<u8>> = (0..11).map(|i| yuv420p_frame(48, 32, i)).collect();
    let mut written = 0;
    for frame in &frames {
        written += pipeline.encode_frame(frame).unwrap();
    }
    assert!(pipeline.finalize().unwrap());
    assert_eq!(pipeline.packets_written(), 11);
    assert!(written <= 11);
    pipeline.close().unwrap();

    let decoded = decoded_planes(&path);
    assert_eq!(decoded, frames);
}

#[test]
fn test_时间戳从零严格递增() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let path = output_in(&dir, "pts.avi");
    let options = EncoderOptions {
        max_threads: 3,
        ..EncoderOptions::default()
    };
    let mut pipeline = yuv_pipeline(options);
    pipeline.initialize(&path, props(16, 16, 30, "vdelta")).unwrap();
    for i in 0..7 {
        pipeline.encode_frame(&yuv420p_frame(16, 16, i)).unwrap();
        assert_eq!(pipeline.frames_submitted(), i + 1);
    }
    pipeline.close().unwrap();

    let pts: Vec<i64> = decode_video(&path).unwrap().iter().map(|f| f.pts).collect();
    assert_eq!(pts, (0..7).collect::<Vec<i64>>());
}

#[test]
fn test_转换失败不影响后续帧() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let path = output_in(&dir, "skip.avi");
    let mut pipeline = yuv_pipeline(EncoderOptions::default());
    pipeline.initialize(&path, props(32, 16, 25, "vdelta")).unwrap();

    let frames: Vec<Vec<u8>> = (0..6).map(|i| yuv420p_frame(32, 16, i)).collect();
    let bad_index = 2;
    let mut expected = Vec::new();
    for (i, frame) in frames.iter().enumerate() {
        if i == bad_index {
            let err = pipeline.encode_frame(&frame[..10]).unwrap_err();
            assert!(!err.is_fatal());
            assert_eq!(err.frame_stage(), Some(FrameStage::Convert));
            assert_eq!(pipeline.frames_submitted(), i as u64);
            assert!(pipeline.is_open());
            continue;
        }
        pipeline.encode_frame(frame).unwrap();
        expected.push(frame.clone());
    }
    pipeline.close().unwrap();

    assert_eq!(probe_output(&path).unwrap().video().unwrap().nb_frames, 5);
    let decoded = decode_video(&path).unwrap();
    let pts: Vec<i64> = decoded.iter().map(|f| f.pts).collect();
    assert_eq!(pts, vec![0, 1, 2, 3, 4]);
    assert_eq!(decoded_planes(&path), expected);
}

#[test]
fn test_刷新幂等() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let path = output_in(&dir, "finalize.avi");
    let mut pipeline = yuv_pipeline(EncoderOptions::default());
    pipeline.initialize(&path, props(16, 16, 25, "rawvideo")).unwrap();
    pipeline.encode_frame(&yuv420p_frame(16, 16, 0)).unwrap();

    assert!(pipeline.finalize().unwrap());
    let size_after_first = std::fs::metadata(&path).unwrap().len();
    assert!(!pipeline.finalize().unwrap());
    assert!(matches!(
        pipeline.encode_frame(&yuv420p_frame(16, 16, 1)),
        Err(PipelineError::AlreadyFinalized)
    ));
    pipeline.close().unwrap();
    pipeline.close().unwrap();
    assert!(!pipeline.finalize().unwrap());
    assert_eq!(std::fs::metadata(&path).unwrap().len(), size_after_first);
    assert_eq!(probe_output(&path).unwrap().video().unwrap().nb_frames, 1);
}

#[test]
fn test_rgb_输入转换后编码() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let path = output_in(&dir, "rgb.avi");
    let mut pipeline = EncodePipeline::new(ScaleConverter::new(PixelFormat::Bgra));
    let props = VideoProperties::new(20, 10, Rational::new(30000, 1001), PixelFormat::Nv12, "rawvideo");
    pipeline.initialize(&path, props).unwrap();
    let white = vec![255u8; 20 * 10 * 4];
    for _ in 0..3 {
        assert_eq!(pipeline.encode_frame(&white).unwrap(), 1);
    }
    pipeline.close().unwrap();

    let info = probe_output(&path).unwrap();
    let video = info.video().unwrap();
    assert_eq!(video.pixel_format, PixelFormat::Nv12);
    assert_eq!(video.frame_rate, Rational::new(30000, 1001));
    let decoded = decode_video(&path).unwrap();
    assert_eq!(decoded.len(), 3);
    assert!(decoded[0].data[0].iter().all(|&y| y == 255));
    assert!(decoded[0].data[1].iter().all(|&c| c == 128));
}

#[test]
fn test_初始化失败保持未打开() {
    init_logger();
    let dir = TempDir::new().unwrap();

    let mut pipeline = yuv_pipeline(EncoderOptions::default());
    let err = pipeline
        .initialize(output_in(&dir, "a.avi"), props(16, 16, 25, "h264"))
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(!pipeline.is_open());

    let err = pipeline
        .initialize(output_in(&dir, "a.mkv"), props(16, 16, 25, "vdelta"))
        .unwrap_err();
    assert!(matches!(err, PipelineError::Init(_)));
    assert!(!pipeline.is_open());
    assert!(matches!(
        pipeline.encode_frame(&yuv420p_frame(16, 16, 0)),
        Err(PipelineError::NotOpen)
    ));

    // 失败后仍可重新初始化
    pipeline
        .initialize(output_in(&dir, "ok.avi"), props(16, 16, 25, "vdelta"))
        .unwrap();
    assert!(pipeline.is_open());
}

#[test]
fn test_析构时自动关闭() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let path = output_in(&dir, "drop.avi");
    {
        let mut pipeline = yuv_pipeline(EncoderOptions::default());
        pipeline.initialize(&path, props(16, 16, 25, "vdelta")).unwrap();
        for i in 0..3 {
            pipeline.encode_frame(&yuv420p_frame(16, 16, i)).unwrap();
        }
        // 移动后由新的所有者负责关闭
        let moved = pipeline;
        assert!(moved.is_open());
    }
    let info = probe_output(&path).unwrap();
    assert_eq!(info.video().unwrap().nb_frames, 3);
    assert_eq!(info.video().unwrap().packets_read, 3);
}

#[test]
fn test_编码器列表() {
    let pipeline = yuv_pipeline(EncoderOptions::default());
    let names: Vec<String> = pipeline
        .list_supported_encoders()
        .iter()
        .map(|d| d.to_string())
        .collect();
    assert!(names.iter().any(|n| n.starts_with("rawvideo - ")));
    assert!(names.iter().any(|n| n.starts_with("vdelta - ")));
    assert_eq!(bianma::list_supported_encoders().len(), names.len());
}

#[test]
fn test_会话访问器() {
    let dir = TempDir::new().unwrap();
    let mut pipeline = yuv_pipeline(EncoderOptions {
        stream_time_base: Some(Rational::new(1, 90000)),
        ..EncoderOptions::default()
    });
    assert!(pipeline.properties().is_none());
    pipeline
        .initialize(output_in(&dir, "acc.null"), props(16, 16, 30, "vdelta"))
        .unwrap();
    assert_eq!(pipeline.properties().unwrap().width, 16);
    assert_eq!(pipeline.stream_time_base(), Some(Rational::new(1, 90000)));
    assert_eq!(pipeline.convert_timestamp(1.5).unwrap(), 135000);
    let params = pipeline.codec_parameters().unwrap();
    assert_eq!(params.video().unwrap().width, 16);
    assert!(params.extra_data.starts_with(b"VDLT"));
    pipeline.close().unwrap();
    assert!(pipeline.codec_parameters().is_none());
}
