//! Parsing of human-written resolutions such as `1024x1024`, `512,768` or
//! just `1024`.

use crate::error::{DataError, Result};

use regex::Regex;

use std::fmt;
use std::str::{FromStr};
use std::sync::{OnceLock};

const EXPECTED: &str = "resolution should be in format '1024x1024' or '1024'";

fn digit_runs() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"\d+").expect("static regex"))
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Resolution {
  pub width:    u32,
  pub height:   u32,
}

impl Resolution {
  pub fn new(width: u32, height: u32) -> Self {
    Resolution{width, height}
  }

  /// Takes the first two digit runs as width and height; a lone run means
  /// a square resolution.
  pub fn parse(input: &str) -> Result<Resolution> {
    let invalid = || DataError::InvalidFormat{input: input.to_owned(), expected: EXPECTED};
    let mut runs = digit_runs().find_iter(input);
    let width = match runs.next() {
      None => return Err(invalid()),
      Some(m) => m.as_str().parse::<u32>().map_err(|_| invalid())?,
    };
    let height = match runs.next() {
      None => width,
      Some(m) => m.as_str().parse::<u32>().map_err(|_| invalid())?,
    };
    if width == 0 || height == 0 {
      return Err(invalid());
    }
    Ok(Resolution{width, height})
  }

  pub fn ratio(&self) -> f64 {
    self.width as f64 / self.height as f64
  }

  pub fn dims(&self) -> (u32, u32) {
    (self.width, self.height)
  }
}

impl FromStr for Resolution {
  type Err = DataError;

  fn from_str(s: &str) -> Result<Resolution> {
    Resolution::parse(s)
  }
}

impl fmt::Display for Resolution {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}x{}", self.width, self.height)
  }
}
