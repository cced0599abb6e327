pub mod canvas;
pub mod contrast;
pub mod crop;

pub use self::canvas::*;
pub use self::contrast::*;
pub use self::crop::*;

use image::{RgbImage};
use image::imageops;
use image::imageops::{FilterType};
use ndarray::{Array3};

pub const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

pub fn resample(image: &RgbImage, plan: &CropPlan) -> RgbImage {
  let (x, y, w, h) = plan.crop_box.to_pixels(image.width(), image.height());
  let (target_w, target_h) = plan.target_size;
  let view = imageops::crop_imm(image, x, y, w, h);
  if (w, h) == (target_w, target_h) {
    return view.to_image();
  }
  imageops::resize(&*view, target_w, target_h, RESAMPLE_FILTER)
}

pub fn resize(image: &RgbImage, size: (u32, u32)) -> RgbImage {
  if image.dimensions() == size {
    return image.clone();
  }
  imageops::resize(image, size.0, size.1, RESAMPLE_FILTER)
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Flip {
  pub horizontal:   bool,
  pub vertical:     bool,
}

impl Flip {
  pub fn apply(&self, image: &mut RgbImage) {
    if self.horizontal {
      imageops::flip_horizontal_in_place(image);
    }
    if self.vertical {
      imageops::flip_vertical_in_place(image);
    }
  }
}

/// HWC => CHW.
pub fn to_chw(image: &RgbImage) -> Array3<u8> {
  let (w, h) = (image.width() as usize, image.height() as usize);
  let raw = image.as_raw();
  Array3::from_shape_fn((3, h, w), |(c, y, x)| raw[(y * w + x) * 3 + c])
}
