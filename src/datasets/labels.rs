use crate::datasets::folder::{DatasetIndex};
use crate::error::{DataError, Result};

use regex::Regex;

use std::convert::{TryFrom};
use std::sync::{OnceLock};

/// Largest one-hot vector `extract_labels` accepts.
pub const MAX_ONE_HOT_DIM: usize = 1 << 16;

fn digit_run() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"\d+").expect("static regex"))
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LabelKind {
  Categorical,
  /// One-hot float vectors of length `max_code + 1`.
  OneHot,
}

impl Default for LabelKind {
  fn default() -> Self {
    LabelKind::Categorical
  }
}

#[derive(Clone, PartialEq, Debug)]
pub enum Label {
  Categorical(i64),
  Vector(Vec<f32>),
}

pub fn first_segment(name: &str) -> &str {
  name.split(|c| c == '/' || c == '\\').next().unwrap_or(name)
}

/// Label code of one relative name: the first digit run of its first path
/// segment.
pub fn label_from_name(name: &str) -> Result<i64> {
  let segment = first_segment(name);
  let invalid = || DataError::InvalidLabel{name: name.to_owned(), segment: segment.to_owned()};
  match digit_run().find(segment) {
    None => Err(invalid()),
    Some(m) => m.as_str().parse::<i64>().map_err(|_| invalid()),
  }
}

#[derive(Clone, Debug)]
pub struct Labels {
  kind:     LabelKind,
  codes:    Vec<i64>,
  dim:      usize,
}

impl Labels {
  pub fn kind(&self) -> LabelKind {
    self.kind
  }

  pub fn codes(&self) -> &[i64] {
    &self.codes
  }

  /// Number of categories, `max_code + 1`.
  pub fn dim(&self) -> usize {
    self.dim
  }

  pub fn get(&self, raw_idx: usize) -> Label {
    let code = self.codes[raw_idx];
    match self.kind {
      LabelKind::Categorical => Label::Categorical(code),
      LabelKind::OneHot => {
        let mut onehot = vec![0.0; self.dim];
        onehot[code as usize] = 1.0;
        Label::Vector(onehot)
      }
    }
  }
}

/// Resolves a label for every indexed name; a single unparsable name fails
/// the whole extraction.
pub fn extract_labels(index: &DatasetIndex, kind: LabelKind) -> Result<Labels> {
  let mut codes = Vec::with_capacity(index.len());
  for name in index.names() {
    codes.push(label_from_name(name)?);
  }
  let max = codes.iter().cloned().enumerate().max_by_key(|&(_, code)| code);
  let max = match max {
    None => return Ok(Labels{kind, codes, dim: 0}),
    Some(max) => max,
  };
  let dim = usize::try_from(max.1).ok().and_then(|code| code.checked_add(1));
  let too_large = match (kind, dim) {
    (_, None) => true,
    (LabelKind::OneHot, Some(dim)) => dim > MAX_ONE_HOT_DIM,
    (LabelKind::Categorical, Some(_)) => false,
  };
  if too_large {
    let name = index.name(max.0);
    return Err(DataError::InvalidLabel{name: name.to_owned(), segment: first_segment(name).to_owned()});
  }
  Ok(Labels{kind, codes, dim: dim.unwrap_or(0)})
}
