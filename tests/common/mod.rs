use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::RgbImage;
use tanlei::{
  MineDetector,
  config::{PipelineConfig, WorkspaceConfig},
  model::Detection,
  source::DetectionSource,
  workspace::Workspace,
};

/// 检测源在一次调用中的表现
#[derive(Debug, Clone)]
pub enum Step {
  /// 写出 `exp*/image0.jpg` 并返回这些检测结果
  Detect(Vec<Detection>),
  /// 什么也不写
  NoOutput,
  /// 只创建运行目录，不写图像
  DirectoryOnly,
  /// 检测源自身失败
  Fail,
}

/// 按脚本依次执行的检测源
pub struct ScriptedSource {
  raw_root: PathBuf,
  steps: RefCell<VecDeque<Step>>,
}

impl ScriptedSource {
  pub fn new(raw_root: &Path, steps: Vec<Step>) -> Self {
    Self {
      raw_root: raw_root.to_path_buf(),
      steps: RefCell::new(steps.into()),
    }
  }

  fn next_run_dir(&self) -> PathBuf {
    let first = self.raw_root.join("exp");
    if !first.exists() {
      return first;
    }
    (2..)
      .map(|n| self.raw_root.join(format!("exp{}", n)))
      .find(|dir| !dir.exists())
      .unwrap()
  }
}

impl DetectionSource for ScriptedSource {
  type Error = std::io::Error;

  fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, Self::Error> {
    let step = self
      .steps
      .borrow_mut()
      .pop_front()
      .unwrap_or(Step::Detect(Vec::new()));

    match step {
      Step::Detect(detections) => {
        let dir = self.next_run_dir();
        std::fs::create_dir_all(&dir)?;
        image
          .save(dir.join("image0.jpg"))
          .map_err(std::io::Error::other)?;
        Ok(detections)
      }
      Step::NoOutput => Ok(Vec::new()),
      Step::DirectoryOnly => {
        std::fs::create_dir_all(self.next_run_dir())?;
        Ok(Vec::new())
      }
      Step::Fail => Err(std::io::Error::other("model crashed")),
    }
  }
}

pub fn det(label: &str, confidence: f32) -> Detection {
  Detection {
    label: label.to_string(),
    confidence,
    bbox: [0.25, 0.25, 0.75, 0.75],
  }
}

pub fn image() -> RgbImage {
  RgbImage::from_pixel(32, 24, image::Rgb([40, 80, 120]))
}

pub fn fast_config() -> PipelineConfig {
  PipelineConfig {
    settle_timeout: Duration::from_millis(50),
    poll_interval: Duration::from_millis(5),
  }
}

pub fn start(base: &Path, steps: Vec<Step>) -> MineDetector<ScriptedSource> {
  let config = WorkspaceConfig::rooted_at(base);
  let source = ScriptedSource::new(&config.raw_root, steps);
  MineDetector::start(source, Workspace::new(config), fast_config()).unwrap()
}

pub fn log_lines(path: &Path) -> Vec<String> {
  std::fs::read_to_string(path)
    .unwrap()
    .lines()
    .map(str::to_string)
    .collect()
}

pub fn published_files(dir: &Path) -> Vec<PathBuf> {
  match std::fs::read_dir(dir) {
    Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
    Err(_) => Vec::new(),
  }
}
