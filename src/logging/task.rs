//! 日志维护: 午夜翻滚, 压缩历史, 删除过期.

use super::{LoggingConfig, build_current_log_path};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate, TimeZone, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use tokio::time::Instant;
use tracing::error;

/// 在 tokio 运行时内启动后台维护任务, 否则同步清理一次
pub(super) fn start_log_maintenance(config: LoggingConfig, rotate_requested: Arc<AtomicBool>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(maintain(config, rotate_requested));
        }
        Err(_) => report(cleanup_logs(&config), "清理日志失败"),
    }
}

async fn maintain(config: LoggingConfig, rotate_requested: Arc<AtomicBool>) {
    let period = Duration::from_secs(config.cleanup_interval_seconds.max(1));
    let mut cleanup = tokio::time::interval(period);

    report(touch_today_log(&config), "初始化当前日志文件失败");
    let mut rollover_at = next_rollover(Local::now());

    loop {
        tokio::select! {
            _ = cleanup.tick() => report(cleanup_logs(&config), "清理日志失败"),
            _ = tokio::time::sleep_until(rollover_at) => {
                match touch_today_log(&config) {
                    Ok(()) => rotate_requested.store(true, Ordering::Release),
                    Err(err) => error!("日志翻滚失败: {err:#}"),
                }
                report(cleanup_logs(&config), "翻滚后清理日志失败");
                rollover_at = next_rollover(Local::now());
            }
        }
    }
}

fn report(result: Result<()>, what: &str) {
    if let Err(err) = result {
        error!("{what}: {err:#}");
    }
}

/// 确保当天的日志文件存在, 写入端在下一条记录时切换过去
fn touch_today_log(config: &LoggingConfig) -> Result<()> {
    let directory = Path::new(&config.directory);
    fs::create_dir_all(directory)
        .with_context(|| format!("创建日志目录失败, path={}", directory.display()))?;
    let path = build_current_log_path(directory, &config.file_prefix, Local::now().date_naive());
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("创建当天日志文件失败, path={}", path.display()))?;
    Ok(())
}

/// 删除超过保留期的日志, 压缩当天以前未压缩的日志
fn cleanup_logs(config: &LoggingConfig) -> Result<()> {
    let directory = Path::new(&config.directory);
    if !directory.exists() {
        return Ok(());
    }

    let today = Local::now().date_naive();
    let cutoff = today - ChronoDuration::days(config.retention_days);

    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some((date, compressed)) =
            parse_rotated_log_name(&name.to_string_lossy(), &config.file_prefix)
        else {
            continue;
        };

        let path = entry.path();
        if date < cutoff {
            let _ = fs::remove_file(&path);
        } else if config.compress_history && !compressed && date < today {
            report(compress_to_gz(&path), "压缩历史日志失败");
        }
    }

    Ok(())
}

fn compress_to_gz(path: &Path) -> Result<()> {
    let gz_path = PathBuf::from(format!("{}.gz", path.display()));
    if gz_path.exists() {
        return Ok(());
    }

    let mut input =
        File::open(path).with_context(|| format!("打开待压缩日志失败, path={}", path.display()))?;
    let output = File::create(&gz_path)
        .with_context(|| format!("创建压缩日志失败, path={}", gz_path.display()))?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;

    fs::remove_file(path)
        .with_context(|| format!("删除已压缩日志失败, path={}", path.display()))
}

/// 解析 `<prefix>.<YYYY-MM-DD>.log[.gz]`, 返回日期和是否已压缩
fn parse_rotated_log_name(file_name: &str, prefix: &str) -> Option<(NaiveDate, bool)> {
    let rest = file_name.strip_prefix(prefix)?.strip_prefix('.')?;
    let (date_part, compressed) = match rest.strip_suffix(".log.gz") {
        Some(date_part) => (date_part, true),
        None => (rest.strip_suffix(".log")?, false),
    };
    if date_part.len() != 10 {
        return None;
    }
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
    Some((date, compressed))
}

/// 下一个本地午夜; 无法计算时一秒后重试
fn next_rollover(now: DateTime<Local>) -> Instant {
    let midnight = (now.date_naive() + ChronoDuration::days(1))
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| Local.from_local_datetime(&naive).earliest());
    let Some(midnight) = midnight else {
        error!("计算下一次日志翻滚时间失败");
        return Instant::now() + Duration::from_secs(1);
    };
    let wait = SystemTime::from(midnight.with_timezone(&Utc))
        .duration_since(SystemTime::now())
        .unwrap_or_default();
    Instant::now() + wait
}
