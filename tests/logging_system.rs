use bianma::EncodeConfig;
use bianma::logging::{LOG_ENV, LoggingConfig, init};
use chrono::Datelike;
use std::fs;
use std::path::{Path, PathBuf};

// 注意: 全局订阅器只能初始化一次,
// 涉及 init() 的测试必须单独运行, 统一使用 #[ignore] 标记

fn test_config(directory: &Path, level: &str, prefix: &str) -> LoggingConfig {
    LoggingConfig {
        level: level.to_string(),
        directory: directory.to_string_lossy().to_string(),
        file_prefix: prefix.to_string(),
        retention_days: 7,
        compress_history: false,
        cleanup_interval_seconds: 3600,
    }
}

/// 当前日期的日志文件路径
fn today_log_path(directory: &Path, prefix: &str) -> PathBuf {
    let today = chrono::Local::now().date_naive();
    directory.join(format!("{}.{}.log", prefix, today.format("%Y-%m-%d")))
}

#[tokio::test]
#[ignore] // 需要单独运行: cargo test --test logging_system test_日志文件写入 -- --ignored
async fn test_日志文件写入() {
    let dir = tempfile::tempdir().unwrap();
    let log_dir = dir.path().join("nested").join("logs");
    assert!(!log_dir.exists());

    init(test_config(&log_dir, "info", "bianma-test")).expect("日志初始化失败");
    assert!(log_dir.exists(), "嵌套日志目录应该被创建");

    tracing::error!("错误日志_ERROR_MSG");
    tracing::warn!("文件打开失败: 路径={}", "/测试/路径.avi");
    tracing::info!("信息日志_INFO_MSG");
    tracing::debug!("调试日志_DEBUG_MSG");
    // 库内部经 log 门面输出
    log::info!("桥接日志_LOG_MSG");

    std::thread::sleep(std::time::Duration::from_millis(200));

    let log_file = today_log_path(&log_dir, "bianma-test");
    let content = fs::read_to_string(&log_file)
        .unwrap_or_else(|e| panic!("读取日志文件失败: {:?}, 错误: {}", log_file, e));

    assert!(content.contains("错误日志_ERROR_MSG"));
    assert!(content.contains("文件打开失败"));
    assert!(content.contains("信息日志_INFO_MSG"));
    assert!(content.contains("桥接日志_LOG_MSG"), "log 记录应该被桥接:\n{}", content);
    assert!(content.contains("INFO"), "日志应该包含 INFO 级别标记");
    if std::env::var_os(LOG_ENV).is_none() {
        assert!(!content.contains("调试日志_DEBUG_MSG"), "debug 日志应该被过滤掉");
    }

    // 重复初始化失败
    assert!(init(test_config(&log_dir, "info", "again")).is_err());
}

#[tokio::test]
#[ignore] // 需要单独运行: cargo test --test logging_system test_管线日志写入文件 -- --ignored
async fn test_管线日志写入文件() {
    use bianma::core::{PixelFormat, Rational};
    use bianma::pipeline::{EncodePipeline, ScaleConverter, VideoProperties};

    let dir = tempfile::tempdir().unwrap();
    init(test_config(dir.path(), "debug", "pipeline")).expect("日志初始化失败");

    let mut pipeline = EncodePipeline::new(ScaleConverter::new(PixelFormat::Gray8));
    let props = VideoProperties::new(8, 8, Rational::new(25, 1), PixelFormat::Gray8, "vdelta");
    pipeline.initialize(dir.path().join("out.null"), props).unwrap();
    // 长度不符, 单帧失败会被记录
    assert!(pipeline.encode_frame(&[0u8; 3]).is_err());
    pipeline.close().unwrap();

    std::thread::sleep(std::time::Duration::from_millis(200));

    let content = fs::read_to_string(today_log_path(dir.path(), "pipeline")).unwrap();
    assert!(content.contains("vdelta"), "应该记录编码器信息:\n{}", content);
    assert!(content.contains("ERROR") || content.contains("WARN"));
}

#[test]
fn test_日志文件命名格式() {
    let dir = tempfile::tempdir().unwrap();
    let today = chrono::Local::now().date_naive();

    for prefix in ["bianma", "bianma-cli", "encode-job"] {
        let path = today_log_path(dir.path(), prefix);
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(&format!("{prefix}.")));
        assert!(name.ends_with(".log"));
        assert!(name.contains(&today.year().to_string()), "文件名应该包含年份");
    }
}

#[test]
fn test_日志配置默认值() {
    let config = LoggingConfig::default();
    assert_eq!(config.level, "info");
    assert_eq!(config.directory, "logs");
    assert_eq!(config.file_prefix, "bianma");
    assert_eq!(config.retention_days, 30, "默认保留天数应该是 30");
    assert!(config.compress_history, "默认应该开启压缩");
    assert_eq!(config.cleanup_interval_seconds, 3600, "默认清理间隔应该是 3600 秒");
}

#[test]
fn test_编码配置中的日志段() {
    let json = r#"{
        "width": 64,
        "height": 32,
        "logging": { "level": "debug", "retention_days": 3 }
    }"#;
    let config = EncodeConfig::from_json_str(json).unwrap();
    let logging = config.logging.unwrap();
    assert_eq!(logging.level, "debug");
    assert_eq!(logging.retention_days, 3);
    assert_eq!(logging.file_prefix, "bianma");
    assert!(logging.compress_history);

    let config = EncodeConfig::from_json_str(r#"{"width": 8, "height": 8}"#).unwrap();
    assert!(config.logging.is_none());
}
