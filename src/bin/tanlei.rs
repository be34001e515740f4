// 该文件是 Tanlei （探雷） 项目的一部分。
// src/bin/tanlei.rs - 操作员控制台
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use url::Url;

use tanlei::{
  FromUrl, MineDetector,
  config::{PipelineConfig, WorkspaceConfig},
  input::ImageFileInput,
  model::ModelWrapper,
  output::{RunDirectoryOutput, draw::Draw},
  source::RenderedSource,
  workspace::Workspace,
};
use tracing::info;

/// Tanlei 地雷检测控制台
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测模型，例如 exec:///opt/detector/run?arg=best.pt 或 replay:///path/detections.json
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 检测源原始输出目录
  #[arg(long, default_value = tanlei::config::DEFAULT_RAW_ROOT, value_name = "DIR")]
  pub raw_root: PathBuf,

  /// 发布结果目录
  #[arg(long, default_value = tanlei::config::DEFAULT_PUBLISH_ROOT, value_name = "DIR")]
  pub publish_root: PathBuf,

  /// 审计日志文件
  #[arg(long, default_value = tanlei::config::DEFAULT_LOG_FILE, value_name = "FILE")]
  pub log_file: PathBuf,

  /// 等待检测输出的最长时间（毫秒）
  #[arg(long, default_value = "300", value_name = "MS")]
  pub settle_timeout_ms: u64,

  /// 轮询检测输出的间隔（毫秒）
  #[arg(long, default_value = "20", value_name = "MS")]
  pub poll_interval_ms: u64,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.0", value_name = "THRESHOLD")]
  pub min_confidence: f32,

  /// 标签字体文件（TTF/OTF），不指定时只绘制检测框
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}

const HELP: &str = "命令:
  detect <图像路径|image:///路径>  检测图像
  clear                            清理检测结果
  log                              显示检测日志路径
  help                             显示帮助
  quit                             退出";

fn load_image(arg: &str) -> Result<image::RgbImage> {
  let input = match Url::parse(arg) {
    Ok(url) if url.scheme() == "image" => ImageFileInput::from_url(&url)?,
    _ => ImageFileInput::open(arg)?,
  };
  Ok(input.into_image())
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测模型: {}", args.model);
  info!("原始输出目录: {}", args.raw_root.display());
  info!("发布目录: {}", args.publish_root.display());
  info!("检测日志: {}", args.log_file.display());

  let workspace_config = WorkspaceConfig {
    raw_root: args.raw_root,
    publish_root: args.publish_root,
    log_path: args.log_file,
    ..WorkspaceConfig::default()
  };
  let pipeline_config = PipelineConfig {
    settle_timeout: Duration::from_millis(args.settle_timeout_ms),
    poll_interval: Duration::from_millis(args.poll_interval_ms),
  };

  let draw = match &args.font {
    Some(font) => Draw::with_font_file(font)?,
    None => Draw::default(),
  };
  let model = ModelWrapper::from_url(&args.model)?;
  let render = RunDirectoryOutput::for_workspace(&workspace_config).with_draw(draw);
  let source = RenderedSource::new(model, render).with_min_confidence(args.min_confidence);

  let mut detector = MineDetector::start(
    source,
    Workspace::new(workspace_config),
    pipeline_config,
  )?;

  println!("Tanlei 地雷检测 (SATM / SAPEM)");
  println!("{}", HELP);

  let stdin = std::io::stdin();
  let mut stdout = std::io::stdout();
  for line in stdin.lock().lines() {
    let line = line?;
    let (command, rest) = match line.trim().split_once(char::is_whitespace) {
      Some((command, rest)) => (command, rest.trim()),
      None => (line.trim(), ""),
    };

    match command {
      "" => {}
      "detect" if rest.is_empty() => println!("用法: detect <图像路径>"),
      "detect" => match load_image(rest) {
        Ok(image) => {
          let outcome = detector.detect(&image)?;
          if let Some(path) = &outcome.result_path {
            println!("结果图像: {}", path.display());
          }
          println!("{}", outcome.summary);
        }
        Err(e) => println!("无法读取图像: {}", e),
      },
      "clear" => {
        detector.clear()?;
        println!("已清理检测结果");
      }
      "log" => match detector.fetch_log() {
        Some(path) => println!("检测日志: {}", path.display()),
        None => println!("暂无检测日志"),
      },
      "help" => println!("{}", HELP),
      "quit" | "exit" => break,
      other => println!("未知命令: {}\n{}", other, HELP),
    }
    stdout.flush()?;
  }

  info!("退出");
  Ok(())
}
