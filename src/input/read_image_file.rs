// 该文件是 Xifeng （西风） 项目的一部分。
// src/input/read_image_file.rs - 图像文件与目录输入
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{
  collections::VecDeque,
  path::{Path, PathBuf},
};

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemaMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("目录中没有可读取的图像: {0}")]
  NoImages(String),
}

const READ_IMAGE_FILE_SCHEME: &str = "image";
const READ_FOLDER_SCHEME: &str = "folder";
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

fn is_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// 逐个读取图像文件的输入源
///
/// 解码失败的文件记录日志后跳过，不会中断后续帧。
#[derive(Debug)]
pub struct ImageFileInput {
  paths: VecDeque<PathBuf>,
  index: u64,
}

impl ImageFileInput {
  pub fn accepts(scheme: &str) -> bool {
    scheme == READ_IMAGE_FILE_SCHEME || scheme == READ_FOLDER_SCHEME
  }

  pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
    Self {
      paths: paths.into_iter().collect(),
      index: 0,
    }
  }

  /// 按文件名排序读取目录中的图像
  pub fn from_folder(dir: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let dir = dir.as_ref();
    let mut paths = std::fs::read_dir(dir)?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|path| path.is_file() && is_image(path))
      .collect::<Vec<_>>();
    paths.sort();

    if paths.is_empty() {
      return Err(ImageFileInputError::NoImages(dir.display().to_string()));
    }
    debug!("目录 {} 中共有 {} 张图像", dir.display(), paths.len());
    Ok(Self::from_paths(paths))
  }

  pub fn remaining(&self) -> usize {
    self.paths.len()
  }
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = READ_IMAGE_FILE_SCHEME;
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let path = PathBuf::from(url.path());
    match url.scheme() {
      READ_IMAGE_FILE_SCHEME => {
        // 提前检查文件是否存在
        std::fs::metadata(&path)?;
        Ok(Self::from_paths([path]))
      }
      READ_FOLDER_SCHEME => Self::from_folder(path),
      other => {
        error!(
          "URI 方案不匹配: 期望 '{}' 或 '{}', 实际为 '{}'",
          READ_IMAGE_FILE_SCHEME, READ_FOLDER_SCHEME, other
        );
        Err(ImageFileInputError::SchemaMismatch(other.to_string()))
      }
    }
  }
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(path) = self.paths.pop_front() {
      let decoded = ImageReader::open(&path)
        .map_err(image::ImageError::from)
        .and_then(|reader| reader.with_guessed_format().map_err(image::ImageError::from))
        .and_then(|reader| reader.decode());

      match decoded {
        Ok(image) => {
          let frame = Frame {
            image: image.into_rgb8(),
            index: self.index,
            source: path.display().to_string(),
          };
          self.index += 1;
          return Some(frame);
        }
        Err(e) => warn!("跳过无法解码的图像 {}: {}", path.display(), e),
      }
    }
    None
  }
}
