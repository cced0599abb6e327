use crate::error::{DataError};
use crate::resolution::{Resolution};

use rand::{Rng};

use std::str::{FromStr};

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct CropBox {
  pub left:     f64,
  pub top:      f64,
  pub right:    f64,
  pub bottom:   f64,
}

impl CropBox {
  pub fn from_size(left: f64, top: f64, width: f64, height: f64) -> Self {
    CropBox{
      left:     left,
      top:      top,
      right:    left + width,
      bottom:   top + height,
    }
  }

  pub fn width(&self) -> f64 {
    self.right - self.left
  }

  pub fn height(&self) -> f64 {
    self.bottom - self.top
  }

  pub fn ratio(&self) -> f64 {
    self.width() / self.height()
  }

  pub fn center(&self) -> (f64, f64) {
    (0.5 * (self.left + self.right), 0.5 * (self.top + self.bottom))
  }

  /// Rounds the box to whole pixels `(x, y, w, h)` inside a `src_w x src_h`
  /// image; the result is never empty.
  pub fn to_pixels(&self, src_w: u32, src_h: u32) -> (u32, u32, u32, u32) {
    let round_axis = |lo: f64, hi: f64, len: u32| -> (u32, u32) {
      let len = len.max(1);
      let a = (lo.round().max(0.0) as u32).min(len - 1);
      let b = (hi.round().max(0.0) as u32).min(len).max(a + 1);
      (a, b - a)
    };
    let (x, w) = round_axis(self.left, self.right, src_w);
    let (y, h) = round_axis(self.top, self.bottom, src_h);
    (x, y, w, h)
  }

  fn clamp_to(mut self, src_w: f64, src_h: f64) -> Self {
    self.left = self.left.max(0.0);
    self.top = self.top.max(0.0);
    self.right = self.right.min(src_w);
    self.bottom = self.bottom.min(src_h);
    self
  }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct CropPlan {
  pub crop_box:     CropBox,
  pub target_size:  (u32, u32),
  /// Scale of the inscribed window when the zoom branch produced this plan.
  pub zoom:         Option<f64>,
}

impl CropPlan {
  pub fn with_target_size(mut self, size: (u32, u32)) -> Self {
    self.target_size = size;
    self
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CropMode {
  Center,
  Focus,
  /// Random inscribed-window zoom, falling back to a random fit for small
  /// sources.
  Zoom,
}

impl Default for CropMode {
  fn default() -> Self {
    CropMode::Center
  }
}

impl FromStr for CropMode {
  type Err = DataError;

  fn from_str(s: &str) -> Result<CropMode, DataError> {
    match s.trim().to_ascii_lowercase().as_str() {
      "center"            => Ok(CropMode::Center),
      "focus"             => Ok(CropMode::Focus),
      "random" | "zoom"   => Ok(CropMode::Zoom),
      _ => Err(DataError::InvalidFormat{
        input:    s.to_owned(),
        expected: "crop mode should be one of 'center', 'focus', 'random'",
      }),
    }
  }
}

impl CropMode {
  pub fn plan<R: Rng + ?Sized>(&self, src: (u32, u32), target: Resolution, max_bleed: f64, min_scale: f64, rng: &mut R) -> CropPlan {
    match *self {
      CropMode::Center => {
        plan_bleed_crop(src, target, max_bleed, (0.5, 0.5), rng)
      }
      CropMode::Focus => {
        let centering = random_centering(rng);
        plan_bleed_crop(src, target, max_bleed, centering, rng)
      }
      CropMode::Zoom => {
        plan_zoom_crop(src, target, min_scale, rng)
      }
    }
  }
}

pub fn random_centering<R: Rng + ?Sized>(rng: &mut R) -> (f64, f64) {
  (rng.random_range(0.0 ..= 1.0), rng.random_range(0.0 ..= 1.0))
}

/// Aspect-locks the region left after trimming `bleed` pixels from each
/// edge, and places it using `centering`: `slack * c` goes before the box
/// and the rest after it.
pub fn fit_box(src: (u32, u32), ratio: f64, bleed: (f64, f64), centering: (f64, f64)) -> CropBox {
  let (src_w, src_h) = (src.0 as f64, src.1 as f64);
  let live_w = src_w - 2.0 * bleed.0;
  let live_h = src_h - 2.0 * bleed.1;
  let live_ratio = live_w / live_h;
  let (crop_w, crop_h) = if live_ratio == ratio {
    (live_w, live_h)
  } else if live_ratio > ratio {
    (ratio * live_h, live_h)
  } else {
    (live_w, live_w / ratio)
  };
  let cx = centering.0.max(0.0).min(1.0);
  let cy = centering.1.max(0.0).min(1.0);
  let left = bleed.0 + (live_w - crop_w) * cx;
  let top = bleed.1 + (live_h - crop_h) * cy;
  CropBox::from_size(left, top, crop_w, crop_h).clamp_to(src_w, src_h)
}

fn draw_bleed<R: Rng + ?Sized>(max_bleed: f64, rng: &mut R) -> f64 {
  if max_bleed > 0.0 {
    rng.random_range(0.0 .. max_bleed)
  } else {
    0.0
  }
}

pub fn plan_bleed_crop<R: Rng + ?Sized>(src: (u32, u32), target: Resolution, max_bleed: f64, centering: (f64, f64), rng: &mut R) -> CropPlan {
  let bleed = (
    draw_bleed(max_bleed, rng) * src.0 as f64,
    draw_bleed(max_bleed, rng) * src.1 as f64,
  );
  CropPlan{
    crop_box:     fit_box(src, target.ratio(), bleed, centering),
    target_size:  target.dims(),
    zoom:         None,
  }
}

pub fn max_window_size(src: (u32, u32), ratio: f64) -> (u32, u32) {
  let (w, h) = src;
  let current = w as f64 / h as f64;
  if ratio == current {
    (w, h)
  } else if ratio > current {
    (w, ((w as f64 / ratio).round() as u32).max(1).min(h))
  } else {
    (((h as f64 * ratio).round() as u32).max(1).min(w), h)
  }
}

pub fn plan_zoom_crop<R: Rng + ?Sized>(src: (u32, u32), target: Resolution, min_scale: f64, rng: &mut R) -> CropPlan {
  let (src_w, src_h) = src;
  if src_w <= target.width || src_h <= target.height {
    // Too small to zoom into without upscaling.
    let centering = random_centering(rng);
    return plan_bleed_crop(src, target, 0.0, centering, rng);
  }
  let (max_w, max_h) = max_window_size(src, target.ratio());
  let floor = (target.width as f64 / max_w as f64).max(min_scale).min(1.0);
  let scale = rng.random_range(floor ..= 1.0);
  let window_w = ((scale * max_w as f64).round() as u32).max(target.width).min(max_w);
  let window_h = ((scale * max_h as f64).round() as u32).max(1).min(max_h);
  let left = rng.random_range(0 ..= src_w - window_w);
  let top = rng.random_range(0 ..= src_h - window_h);
  CropPlan{
    crop_box:     CropBox::from_size(left as f64, top as f64, window_w as f64, window_h as f64),
    target_size:  target.dims(),
    zoom:         Some(scale),
  }
}
