use image::{RgbImage};
use rand::{Rng};

/// Percentage of pixels to discard from the dark and bright ends of the
/// histogram before stretching.
#[derive(Clone, Copy, PartialEq, Default, Debug)]
pub struct Cutoff {
  pub low:  f64,
  pub high: f64,
}

impl Cutoff {
  pub fn new(low: f64, high: f64) -> Self {
    Cutoff{low, high}
  }

  pub fn is_zero(&self) -> bool {
    self.low <= 0.0 && self.high <= 0.0
  }
}

impl From<f64> for Cutoff {
  fn from(cutoff: f64) -> Self {
    Cutoff{low: cutoff, high: cutoff}
  }
}

impl From<(f64, f64)> for Cutoff {
  fn from((low, high): (f64, f64)) -> Self {
    Cutoff{low, high}
  }
}

#[inline]
pub fn luma(rgb: [u8; 3]) -> u8 {
  let l = rgb[0] as u32 * 19595 + rgb[1] as u32 * 38470 + rgb[2] as u32 * 7471 + 0x8000;
  (l >> 16) as u8
}

pub fn luma_histogram(image: &RgbImage) -> [u64; 256] {
  let mut hist = [0u64; 256];
  for px in image.pixels() {
    hist[luma(px.0) as usize] += 1;
  }
  hist
}

fn trim_low(hist: &mut [u64; 256], mut cut: u64) {
  for lo in 0 .. 256 {
    if cut > hist[lo] {
      cut -= hist[lo];
      hist[lo] = 0;
    } else {
      hist[lo] -= cut;
      cut = 0;
    }
    if cut == 0 {
      break;
    }
  }
}

fn trim_high(hist: &mut [u64; 256], mut cut: u64) {
  for hi in (0 .. 256).rev() {
    if cut > hist[hi] {
      cut -= hist[hi];
      hist[hi] = 0;
    } else {
      hist[hi] -= cut;
      cut = 0;
    }
    if cut == 0 {
      break;
    }
  }
}

fn identity_lut() -> [u8; 256] {
  let mut lut = [0u8; 256];
  for (ix, v) in lut.iter_mut().enumerate() {
    *v = ix as u8;
  }
  lut
}

pub fn contrast_lut(image: &RgbImage, cutoff: Cutoff) -> [u8; 256] {
  let mut hist = luma_histogram(image);
  if !cutoff.is_zero() {
    let n: u64 = hist.iter().sum();
    let quota = |pct: f64| (n as f64 * pct.max(0.0) / 100.0).floor() as u64;
    trim_low(&mut hist, quota(cutoff.low));
    trim_high(&mut hist, quota(cutoff.high));
  }
  let lo = hist.iter().position(|&c| c > 0);
  let hi = hist.iter().rposition(|&c| c > 0);
  let (lo, hi) = match (lo, hi) {
    (Some(lo), Some(hi)) if hi > lo => (lo, hi),
    // Flat (or fully trimmed) histogram.
    _ => return identity_lut(),
  };
  let span = (hi - lo) as f64;
  let mut lut = [0u8; 256];
  for (ix, v) in lut.iter_mut().enumerate() {
    let y = ((ix as f64 - lo as f64) * 255.0 / span).round();
    *v = y.max(0.0).min(255.0) as u8;
  }
  lut
}

pub fn apply_lut(image: &RgbImage, lut: &[u8; 256]) -> RgbImage {
  let mut out = image.clone();
  for px in out.pixels_mut() {
    for c in 0 .. 3 {
      px.0[c] = lut[px.0[c] as usize];
    }
  }
  out
}

pub fn autocontrast(image: &RgbImage, cutoff: Cutoff) -> RgbImage {
  let lut = contrast_lut(image, cutoff);
  apply_lut(image, &lut)
}

/// With probability `prob`, stretches the image using a cutoff drawn
/// uniformly from `[0, max_cutoff]`. Returns the cutoff that was used.
pub fn maybe_autocontrast<R: Rng + ?Sized>(image: &mut RgbImage, prob: f64, max_cutoff: f64, rng: &mut R) -> Option<f64> {
  if prob <= 0.0 {
    return None;
  }
  if rng.random::<f64>() >= prob {
    return None;
  }
  let cutoff = if max_cutoff > 0.0 {
    rng.random_range(0.0 ..= max_cutoff)
  } else {
    0.0
  };
  *image = autocontrast(image, Cutoff::from(cutoff));
  Some(cutoff)
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb};
  use rand::{SeedableRng};
  use rand::rngs::{StdRng};

  fn gradient(w: u32, h: u32, lo: u8, hi: u8) -> RgbImage {
    RgbImage::from_fn(w, h, |x, _| {
      let t = x as f64 / (w - 1) as f64;
      let v = (lo as f64 + t * (hi - lo) as f64).round() as u8;
      Rgb([v, v, v])
    })
  }

  #[test]
  fn flat_image_is_untouched() {
    let img = RgbImage::from_pixel(16, 9, Rgb([40, 120, 200]));
    let hist = luma_histogram(&img);
    assert_eq!(hist.iter().filter(|&&c| c > 0).count(), 1);
    let lut = contrast_lut(&img, Cutoff::from(5.0));
    assert_eq!(lut, identity_lut());
    assert_eq!(autocontrast(&img, Cutoff::from(5.0)), img);
  }

  #[test]
  fn gray_range_is_stretched_to_full_scale() {
    let img = gradient(101, 3, 50, 150);
    let out = autocontrast(&img, Cutoff::default());
    let min = out.pixels().map(|p| p.0[0]).min().unwrap();
    let max = out.pixels().map(|p| p.0[0]).max().unwrap();
    assert_eq!(min, 0);
    assert_eq!(max, 255);
    let lut = contrast_lut(&img, Cutoff::default());
    assert_eq!(lut[50], 0);
    assert_eq!(lut[100], 128);
    assert_eq!(lut[150], 255);
    assert_eq!(lut[10], 0);
    assert_eq!(lut[200], 255);
  }

  #[test]
  fn cutoff_drops_outliers() {
    // 98 mid-gray pixels plus one black and one white outlier.
    let mut img = RgbImage::from_pixel(10, 10, Rgb([100, 100, 100]));
    for x in 0 .. 5 {
      img.put_pixel(x, 0, Rgb([90, 90, 90]));
      img.put_pixel(x, 1, Rgb([110, 110, 110]));
    }
    img.put_pixel(9, 9, Rgb([0, 0, 0]));
    img.put_pixel(8, 9, Rgb([255, 255, 255]));
    let plain = contrast_lut(&img, Cutoff::default());
    assert_eq!(plain, identity_lut());
    let trimmed = contrast_lut(&img, Cutoff::from(1.0));
    assert_eq!(trimmed[90], 0);
    assert_eq!(trimmed[110], 255);
  }

  #[test]
  fn asymmetric_cutoff_trims_partial_bins() {
    let img = gradient(256, 1, 0, 255);
    // 256 pixels: 10% low cuts 25 levels, 0% high keeps the top.
    let lut = contrast_lut(&img, Cutoff::new(10.0, 0.0));
    assert_eq!(lut[25], 0);
    assert_eq!(lut[255], 255);
    assert!(lut[26] > 0);
  }

  #[test]
  fn last_trimmed_bin_keeps_its_remainder() {
    // 100 gray pixels: 5 at 10, 91 at 120, 4 at 240.
    let img = RgbImage::from_fn(10, 10, |x, y| {
      let v = match y * 10 + x {
        0 ..= 4 => 10,
        96 ..= 99 => 240,
        _ => 120,
      };
      Rgb([v, v, v])
    });
    // 3 of the 5 dark pixels go, so the 10 bin still anchors the low end.
    let lut = contrast_lut(&img, Cutoff::from(3.0));
    assert_eq!(lut[10], 0);
    assert_eq!(lut[120], 122);
    assert_eq!(lut[240], 255);
    // The bright bin is emptied exactly, one dark pixel survives.
    let lut = contrast_lut(&img, Cutoff::from(4.0));
    assert_eq!(lut[10], 0);
    assert_eq!(lut[120], 255);
    // The high trim runs into the 120 bin and leaves a single level.
    let lut = contrast_lut(&img, Cutoff::from(5.0));
    assert_eq!(lut, identity_lut());
    assert_eq!(lut[120], 120);
  }

  #[test]
  fn tone_is_shared_across_channels() {
    let img = RgbImage::from_fn(4, 1, |x, _| Rgb([60 + x as u8 * 20, 80, 100]));
    let lut = contrast_lut(&img, Cutoff::default());
    let out = autocontrast(&img, Cutoff::default());
    for (src, dst) in img.pixels().zip(out.pixels()) {
      for c in 0 .. 3 {
        assert_eq!(dst.0[c], lut[src.0[c] as usize]);
      }
    }
  }

  #[test]
  fn output_stays_in_range_for_any_cutoff() {
    let mut rng = StdRng::seed_from_u64(7);
    let img = RgbImage::from_fn(32, 32, |x, y| Rgb([(x * 7 + y) as u8, (y * 5) as u8, (x * y) as u8]));
    for cutoff in [0.0, 0.5, 10.0, 49.0, 50.0, 99.0, 100.0].iter() {
      let lut = contrast_lut(&img, Cutoff::from(*cutoff));
      let out = apply_lut(&img, &lut);
      assert_eq!(out.dimensions(), img.dimensions());
      for w in lut.windows(2) {
        assert!(w[0] <= w[1]);
      }
    }
    let mut copy = img.clone();
    assert!(maybe_autocontrast(&mut copy, 1.0, 5.0, &mut rng).map_or(false, |c| c >= 0.0 && c <= 5.0));
    let mut copy = img.clone();
    assert_eq!(maybe_autocontrast(&mut copy, 0.0, 5.0, &mut rng), None);
    assert_eq!(copy, img);
  }
}
