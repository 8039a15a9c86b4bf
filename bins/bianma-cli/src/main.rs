//! bianma - 视频编码命令行工具
//!
//! 列出编码器, 把合成图案编码为容器文件, 探测编码产物.

mod pattern;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};

use bianma::EncodeConfig;
use bianma::codec::CodecRegistry;
use bianma::format::{FormatId, FormatRegistry};
use bianma::logging::{self, LoggingConfig};
use bianma::pipeline::{EncodePipeline, ScaleConverter};

#[derive(Parser, Debug)]
#[command(name = "bianma", version, about = "纯 Rust 视频编码工具")]
struct Cli {
    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// 日志目录
    #[arg(long, global = true, default_value = "logs")]
    log_dir: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 列出可用的编码器
    Encoders,
    /// 把合成图案编码为容器文件
    Encode(EncodeArgs),
    /// 探测编码产物
    Probe {
        /// 输入文件路径
        input: PathBuf,
        /// 同时解码全部帧并统计
        #[arg(long)]
        decode: bool,
    },
    /// 显示版本和已注册组件
    BuildInfo,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// 输出文件路径, 扩展名决定容器格式 (.avi / .null)
    #[arg(short, long)]
    output: Option<String>,

    /// JSON 任务配置, 命令行参数覆盖其中的值
    #[arg(long)]
    config: Option<PathBuf>,

    /// 视频分辨率 (如 "1280x720")
    #[arg(short = 's', long = "size")]
    size: Option<String>,

    /// 帧率 (如 "25" 或 "30000/1001")
    #[arg(short = 'r', long = "rate")]
    rate: Option<String>,

    /// 编码器名称
    #[arg(short = 'c', long = "codec")]
    codec: Option<String>,

    /// 编码器输入像素格式
    #[arg(long = "pix-fmt")]
    pix_fmt: Option<String>,

    /// 合成图案的像素格式
    #[arg(long = "src-fmt")]
    src_fmt: Option<String>,

    /// 编码帧数
    #[arg(short = 'n', long = "frames")]
    frames: Option<u64>,

    /// GOP 大小
    #[arg(short = 'g', long = "gop")]
    gop: Option<u32>,

    /// 最多连续非参考帧数
    #[arg(long = "bf")]
    max_b_frames: Option<u32>,

    /// 编码线程上限
    #[arg(long)]
    threads: Option<usize>,

    /// 容器流时间基 (如 "1/90000")
    #[arg(long = "stream-tb")]
    stream_time_base: Option<String>,

    /// 覆盖输出文件
    #[arg(short = 'y', long)]
    overwrite: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("错误: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        print_banner();
        return Ok(());
    };

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let mut log_config = LoggingConfig {
        level: level.to_string(),
        directory: cli.log_dir.clone(),
        file_prefix: "bianma".to_string(),
        ..LoggingConfig::default()
    };

    match command {
        Command::Encoders => {
            print_encoders();
            Ok(())
        }
        Command::BuildInfo => {
            print_build_info();
            Ok(())
        }
        Command::Probe { input, decode } => {
            logging::init(log_config)?;
            probe(&input, decode)
        }
        Command::Encode(args) => {
            let config = build_config(&args)?;
            if let Some(job_logging) = &config.logging {
                log_config = job_logging.clone();
            }
            logging::init(log_config)?;
            encode(config, args.overwrite).await
        }
    }
}

/// 合并 JSON 配置与命令行参数
fn build_config(args: &EncodeArgs) -> Result<EncodeConfig> {
    let mut config = match &args.config {
        Some(path) => EncodeConfig::from_json_file(path)?,
        None => EncodeConfig::default(),
    };
    if let Some(output) = &args.output {
        config.output = Some(output.clone());
    }
    if let Some(size) = &args.size {
        let (w, h) = parse_size(size).with_context(|| format!("分辨率格式错误: {size}"))?;
        config.width = w;
        config.height = h;
    }
    if let Some(rate) = &args.rate {
        config.frame_rate = rate.clone();
    }
    if let Some(codec) = &args.codec {
        config.codec = codec.clone();
    }
    if let Some(fmt) = &args.pix_fmt {
        config.pixel_format = fmt.clone();
    }
    if let Some(fmt) = &args.src_fmt {
        config.source_format = fmt.clone();
    }
    if let Some(frames) = args.frames {
        config.frames = frames;
    }
    if let Some(gop) = args.gop {
        config.gop_size = gop;
    }
    if let Some(bf) = args.max_b_frames {
        config.max_b_frames = bf;
    }
    if let Some(threads) = args.threads {
        config.max_threads = threads;
    }
    if let Some(tb) = &args.stream_time_base {
        config.stream_time_base = Some(tb.clone());
    }
    Ok(config)
}

/// 编码结果统计
struct EncodeSummary {
    submitted: u64,
    failed: u64,
    packets: u64,
    interrupted: bool,
}

async fn encode(config: EncodeConfig, overwrite: bool) -> Result<()> {
    let output = config
        .output
        .clone()
        .context("必须指定输出文件 (-o <输出文件>)")?;
    if !overwrite && Path::new(&output).exists() {
        bail!("输出文件已存在 '{output}', 使用 -y 覆盖");
    }

    eprintln!("bianma 版本 {} -- 纯 Rust 视频编码工具", bianma::version());
    eprintln!(
        "输出: {output} ({}x{} @ {} fps, {} 帧, 编码器 {})",
        config.width, config.height, config.frame_rate, config.frames, config.codec
    );

    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = Arc::clone(&stop);
    let worker_output = output.clone();
    let mut job =
        tokio::task::spawn_blocking(move || run_encode(&config, &worker_output, &worker_stop));

    let summary = tokio::select! {
        res = &mut job => res.context("编码线程异常退出")??,
        _ = tokio::signal::ctrl_c() => {
            warn!("收到 Ctrl-C, 当前帧完成后结束编码");
            stop.store(true, Ordering::Release);
            job.await.context("编码线程异常退出")??
        }
    };

    eprintln!(
        "完成: 送入 {} 帧, 失败 {} 帧, 写入 {} 个数据包{}",
        summary.submitted,
        summary.failed,
        summary.packets,
        if summary.interrupted { " (已中断)" } else { "" }
    );

    if FormatId::from_filename(&output) != Some(FormatId::Null) {
        let media = bianma::probe::probe_output(&output)
            .with_context(|| format!("探测输出失败: {output}"))?;
        eprintln!("{media}");
    }
    Ok(())
}

/// 在阻塞线程中驱动同步管线
fn run_encode(config: &EncodeConfig, output: &str, stop: &AtomicBool) -> Result<EncodeSummary> {
    let props = config.video_properties()?;
    let options = config.encoder_options()?;
    let src_format = config.source_pixel_format()?;
    let (width, height) = (props.width, props.height);

    let mut pipeline = EncodePipeline::new(ScaleConverter::new(src_format)).with_options(options);
    pipeline
        .initialize(output, props)
        .with_context(|| format!("打开编码会话失败: {output}"))?;

    let mut failed = 0;
    let mut interrupted = false;
    for index in 0..config.frames {
        if stop.load(Ordering::Acquire) {
            interrupted = true;
            break;
        }
        let raw = pattern::generate(src_format, width, height, index)?;
        if pipeline.encode_frame(&raw).is_err() {
            failed += 1;
        }
    }

    pipeline.finalize().context("刷新编码器失败")?;
    let summary = EncodeSummary {
        submitted: pipeline.frames_submitted(),
        failed,
        packets: pipeline.packets_written(),
        interrupted,
    };
    pipeline.close().context("关闭编码会话失败")?;
    info!("编码结束: {output}");
    Ok(summary)
}

fn probe(input: &Path, decode: bool) -> Result<()> {
    let media = bianma::probe::probe_output(input)
        .with_context(|| format!("探测失败: {}", input.display()))?;
    println!("{media}");
    if decode {
        let frames = bianma::probe::decode_video(input)
            .with_context(|| format!("解码失败: {}", input.display()))?;
        let last_pts = frames.last().map_or(-1, |f| f.pts);
        println!("解码帧数: {}, 最后 PTS: {last_pts}", frames.len());
    }
    Ok(())
}

/// 解析分辨率字符串 (如 "1280x720")
fn parse_size(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once('x')?;
    let w = w.parse().ok()?;
    let h = h.parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

// ============================================================
// UI
// ============================================================

fn print_banner() {
    println!(
        "bianma 版本 {} -- 纯 Rust 视频编码工具",
        bianma::version()
    );
    println!();
    println!("用法:");
    println!("  bianma encoders                         列出编码器");
    println!("  bianma encode -o <输出文件> [选项]      编码合成图案");
    println!("  bianma probe <文件> [--decode]          探测编码产物");
    println!("  bianma build-info                       显示构建信息");
    println!();
    println!("示例:");
    println!("  bianma encode -o out.avi -s 1280x720 -r 30 -n 4");
    println!("  bianma encode -o out.avi -c rawvideo --pix-fmt nv12 --src-fmt bgra");
    println!("  bianma encode --config job.json -y");
    println!("  bianma probe out.avi --decode");
    println!();
    println!("使用 --help 查看完整用法.");
}

fn print_encoders() {
    println!("编码器:");
    for desc in bianma::list_supported_encoders() {
        println!("  {desc}");
    }
}

fn print_build_info() {
    println!("bianma 版本 {}", bianma::version());
    println!("  构建目标: {}", std::env::consts::ARCH);
    println!("  操作系统: {}", std::env::consts::OS);
    println!();
    let codec_registry = CodecRegistry::global();
    let decoders = codec_registry.list_decoders();
    let encoders = codec_registry.list_encoders();
    println!("  解码器 ({}):", decoders.len());
    for (id, name) in &decoders {
        println!("    {name} ({id})");
    }
    println!("  编码器 ({}):", encoders.len());
    for desc in &encoders {
        println!("    {desc}");
    }
    let format_registry = FormatRegistry::global();
    let demuxers = format_registry.list_demuxers();
    let muxers = format_registry.list_muxers();
    println!("  解封装器 ({}):", demuxers.len());
    for (id, name) in &demuxers {
        println!("    {name} ({id})");
    }
    println!("  封装器 ({}):", muxers.len());
    for (id, name) in &muxers {
        println!("    {name} ({id})");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_解析分辨率() {
        assert_eq!(parse_size("1280x720"), Some((1280, 720)));
        assert_eq!(parse_size("0x720"), None);
        assert_eq!(parse_size("1280"), None);
    }

    #[test]
    fn test_参数覆盖配置() {
        let cli = Cli::parse_from([
            "bianma", "encode", "-o", "a.avi", "-s", "64x32", "-r", "25", "-n", "3", "--bf", "2",
        ]);
        let Some(Command::Encode(args)) = cli.command else {
            panic!("应解析为 encode 子命令");
        };
        let config = build_config(&args).unwrap();
        assert_eq!(config.output.as_deref(), Some("a.avi"));
        assert_eq!((config.width, config.height), (64, 32));
        assert_eq!(config.frame_rate, "25");
        assert_eq!(config.frames, 3);
        assert_eq!(config.max_b_frames, 2);
        assert_eq!(config.codec, "vdelta");
    }
}
