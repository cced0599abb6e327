use crate::resolution::{Resolution};

use image::{Rgb, RgbImage};
use image::imageops;

pub const EXTEND_FILL: Rgb<u8> = Rgb([0, 0, 0]);

/// Offset that centers a `inner` sized image on a `outer` sized canvas.
/// Negative when the image is the larger of the two.
pub fn center_offset(outer: (u32, u32), inner: (u32, u32)) -> (i64, i64) {
  (
    (outer.0 as i64 - inner.0 as i64).div_euclid(2),
    (outer.1 as i64 - inner.1 as i64).div_euclid(2),
  )
}

pub fn extend_canvas(image: &RgbImage, size: Resolution, fill: Rgb<u8>) -> RgbImage {
  let mut canvas = RgbImage::from_pixel(size.width, size.height, fill);
  let (x, y) = center_offset(size.dims(), image.dimensions());
  imageops::replace(&mut canvas, image, x, y);
  canvas
}
