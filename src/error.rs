use std::path::{PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DataError>;

#[derive(Debug, Error)]
pub enum DataError {
  #[error("invalid format {input:?}: {expected}")]
  InvalidFormat { input: String, expected: &'static str },
  #[error("invalid config: {0}")]
  InvalidConfig(String),
  #[error("path must point to a directory or zip: {path}")]
  SourceNotFound { path: PathBuf },
  #[error("no image files found in {path}")]
  EmptyDataset { path: PathBuf },
  #[error("bad image {name}: {source}")]
  CorruptSample {
    name: String,
    #[source]
    source: image::ImageError,
  },
  #[error("invalid label {segment:?} in file path {name:?}")]
  InvalidLabel { name: String, segment: String },
  #[error("no decodable sample for index {index} after {attempts} attempts")]
  ExhaustedRetries { index: usize, attempts: usize },
  #[error("index {index} out of range for dataset of {len} samples")]
  IndexOutOfRange { index: usize, len: usize },
  #[error("sample source has been closed")]
  Closed,
  #[error("io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("zip error: {0}")]
  Zip(#[from] zip::result::ZipError),
}

impl DataError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    DataError::Io{path: path.into(), source}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_display() {
    let err = DataError::InvalidLabel{name: "cat/a.png".to_owned(), segment: "cat".to_owned()};
    assert_eq!(err.to_string(), "invalid label \"cat\" in file path \"cat/a.png\"");
    let err = DataError::ExhaustedRetries{index: 3, attempts: 16};
    assert_eq!(err.to_string(), "no decodable sample for index 3 after 16 attempts");
  }
}
