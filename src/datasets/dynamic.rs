use crate::*;
use crate::datasets::folder::{DatasetIndex, SampleSource, open_source};
use crate::datasets::labels::{Label, LabelKind, Labels, extract_labels};
use crate::imageproc::*;

use image::{ImageReader, Limits, RgbImage};
use ndarray::{Array3};
use rand::{Rng};
use tracing::{debug, info, warn};

use std::io::{Cursor};
use std::path::{PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone, Copy, Default, Debug)]
pub struct DecodeOptions {
  pub max_alloc:      Option<u64>,
  pub max_dimension:  Option<u32>,
}

impl DecodeOptions {
  pub fn limits(&self) -> Limits {
    let mut limits = Limits::default();
    if let Some(max_alloc) = self.max_alloc {
      limits.max_alloc = Some(max_alloc);
    }
    if let Some(max_dim) = self.max_dimension {
      limits.max_image_width = Some(max_dim);
      limits.max_image_height = Some(max_dim);
    }
    limits
  }

  pub fn decode(&self, bytes: &[u8]) -> std::result::Result<RgbImage, image::ImageError> {
    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    reader.limits(self.limits());
    Ok(reader.decode()?.to_rgb8())
  }
}

#[derive(Clone, Debug)]
pub struct DynamicConfig {
  pub path:                     Option<PathBuf>,
  /// Crop resolution, e.g. `1024x768`.
  pub resolution:               Option<String>,
  pub crop:                     CropMode,
  pub max_bleed:                f64,
  pub min_scale:                f64,
  pub autocontrast_probability: f64,
  pub autocontrast_max_cutoff:  f64,
  pub extend:                   Option<String>,
  /// Final output resolution, if different from the crop resolution.
  pub anamorphic:               Option<String>,
  pub use_labels:               bool,
  pub label_kind:               LabelKind,
  pub xflip:                    bool,
  pub yflip:                    bool,
  pub max_retries:              usize,
  pub decode:                   DecodeOptions,
}

impl Default for DynamicConfig {
  fn default() -> Self {
    DynamicConfig{
      path:                     None,
      resolution:               None,
      crop:                     CropMode::Center,
      max_bleed:                0.1,
      min_scale:                0.8,
      autocontrast_probability: 0.0,
      autocontrast_max_cutoff:  0.0,
      extend:                   None,
      anamorphic:               None,
      use_labels:               false,
      label_kind:               LabelKind::Categorical,
      xflip:                    false,
      yflip:                    false,
      max_retries:              16,
      decode:                   DecodeOptions::default(),
    }
  }
}

impl DynamicConfig {
  fn _validate(&self) -> Result<()> {
    let check = |ok: bool, msg: String| if ok { Ok(()) } else { Err(DataError::InvalidConfig(msg)) };
    check(self.max_bleed >= 0.0 && self.max_bleed < 0.5,
        format!("max_bleed must be in [0, 0.5), got {}", self.max_bleed))?;
    check(self.min_scale > 0.0 && self.min_scale <= 1.0,
        format!("min_scale must be in (0, 1], got {}", self.min_scale))?;
    check(self.autocontrast_probability >= 0.0 && self.autocontrast_probability <= 1.0,
        format!("autocontrast_probability must be in [0, 1], got {}", self.autocontrast_probability))?;
    check(self.autocontrast_max_cutoff >= 0.0 && self.autocontrast_max_cutoff <= 100.0,
        format!("autocontrast_max_cutoff must be in [0, 100], got {}", self.autocontrast_max_cutoff))?;
    Ok(())
  }
}

#[derive(Clone, Debug)]
pub struct Sample {
  pub tensor:       Array3<u8>,
  /// Raw index the pixels actually came from.
  pub raw_idx:      usize,
  /// Number of substitutions after decode failures.
  pub fallbacks:    usize,
  pub plan:         CropPlan,
  pub flip:         Flip,
}

pub struct DynamicData {
  cfg:          DynamicConfig,
  name:         String,
  source:       Box<dyn SampleSource>,
  index:        DatasetIndex,
  labels:       Option<Labels>,
  resolution:   Resolution,
  extend:       Option<Resolution>,
  anamorphic:   Option<Resolution>,
  raw_shape:    [usize; 4],
  closed:       AtomicBool,
}

impl DynamicData {
  pub fn open(cfg: DynamicConfig) -> Result<DynamicData> {
    let path = match cfg.path.as_ref() {
      None => return Err(DataError::InvalidConfig("path must be set".to_owned())),
      Some(path) => path.clone(),
    };
    let source = open_source(&path)?;
    Self::with_source(source, cfg)
  }

  pub fn with_source(source: Box<dyn SampleSource>, cfg: DynamicConfig) -> Result<DynamicData> {
    cfg._validate()?;
    let resolution = match cfg.resolution.as_ref() {
      None => return Err(DataError::InvalidConfig("resolution must be set explicitly, e.g. 1024".to_owned())),
      Some(s) => Resolution::parse(s)?,
    };
    let extend = match cfg.extend.as_ref() {
      None => None,
      Some(s) => Some(Resolution::parse(s)?),
    };
    if let Some(extend) = extend {
      if extend.width < resolution.width || extend.height < resolution.height {
        return Err(DataError::InvalidConfig(format!("extend {} is smaller than resolution {}", extend, resolution)));
      }
    }
    let anamorphic = match cfg.anamorphic.as_ref() {
      None => None,
      Some(s) => Some(Resolution::parse(s)?),
    };
    let index = DatasetIndex::build(&*source)?;
    let labels = if cfg.use_labels {
      Some(extract_labels(&index, cfg.label_kind)?)
    } else {
      None
    };
    let name = source.location().file_stem()
      .map(|stem| stem.to_string_lossy().into_owned())
      .unwrap_or_default();
    let mut data = DynamicData{
      cfg:          cfg,
      name:         name,
      source:       source,
      index:        index,
      labels:       labels,
      resolution:   resolution,
      extend:       extend,
      anamorphic:   anamorphic,
      raw_shape:    [0; 4],
      closed:       AtomicBool::new(false),
    };
    let probe = data._load_raw(0, &mut rand::rng())?;
    let shape = probe.tensor.shape();
    data.raw_shape = [data.index.len(), shape[0], shape[1], shape[2]];
    info!("dynamic dataset {:?}: {} images from {}, crop {:?} at {}, output {:?}",
        data.name, data.index.len(), data.source.location().display(),
        data.cfg.crop, data.resolution, data.output_size());
    Ok(data)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn config(&self) -> &DynamicConfig {
    &self.cfg
  }

  pub fn index(&self) -> &DatasetIndex {
    &self.index
  }

  pub fn resolution(&self) -> Resolution {
    self.resolution
  }

  pub fn output_size(&self) -> (u32, u32) {
    match (self.anamorphic, self.extend) {
      (Some(res), _) | (None, Some(res)) => res.dims(),
      (None, None) => self.resolution.dims(),
    }
  }

  /// `[raw_count, channels, height, width]`.
  pub fn raw_shape(&self) -> [usize; 4] {
    self.raw_shape
  }

  fn _copies(&self) -> usize {
    let mut copies = 1;
    if self.cfg.xflip {
      copies *= 2;
    }
    if self.cfg.yflip {
      copies *= 2;
    }
    copies
  }

  pub fn sample_count(&self) -> usize {
    self.index.len() * self._copies()
  }

  pub fn has_labels(&self) -> bool {
    self.labels.is_some()
  }

  pub fn label_dim(&self) -> usize {
    self.labels.as_ref().map_or(0, |labels| labels.dim())
  }

  fn _resolve(&self, idx: usize) -> Result<(usize, Flip)> {
    let len = self.sample_count();
    if idx >= len {
      return Err(DataError::IndexOutOfRange{index: idx, len});
    }
    let raw_len = self.index.len();
    let mut copy = idx / raw_len;
    let mut flip = Flip::default();
    if self.cfg.xflip {
      flip.horizontal = copy & 1 == 1;
      copy >>= 1;
    }
    if self.cfg.yflip {
      flip.vertical = copy & 1 == 1;
    }
    Ok((idx % raw_len, flip))
  }

  pub fn get_label(&self, idx: usize) -> Result<Option<Label>> {
    let (raw_idx, _) = self._resolve(idx)?;
    Ok(self.labels.as_ref().map(|labels| labels.get(raw_idx)))
  }

  pub fn get_sample_tensor(&self, idx: usize) -> Result<Array3<u8>> {
    self.sample_with_rng(idx, &mut rand::rng()).map(|sample| sample.tensor)
  }

  pub fn sample_with_rng<R: Rng + ?Sized>(&self, idx: usize, rng: &mut R) -> Result<Sample> {
    let (raw_idx, flip) = self._resolve(idx)?;
    let mut sample = self._load_raw(raw_idx, rng)?;
    if flip != Flip::default() {
      sample.tensor = _flip_chw(sample.tensor, flip);
    }
    sample.flip = flip;
    Ok(sample)
  }

  fn _decode(&self, raw_idx: usize) -> Result<RgbImage> {
    if self.closed.load(Ordering::Acquire) {
      return Err(DataError::Closed);
    }
    let fname = self.index.name(raw_idx);
    let bytes = self.source.read(fname)?;
    self.cfg.decode.decode(&bytes).map_err(|source| DataError::CorruptSample{
      name:   fname.to_owned(),
      source: source,
    })
  }

  fn _substitute<R: Rng + ?Sized>(&self, raw_idx: usize, rng: &mut R) -> usize {
    let other = rng.random_range(0 .. self.index.len() - 1);
    if other >= raw_idx { other + 1 } else { other }
  }

  fn _load_raw<R: Rng + ?Sized>(&self, raw_idx: usize, rng: &mut R) -> Result<Sample> {
    let attempts = self.cfg.max_retries + 1;
    let mut cur_idx = raw_idx;
    let mut fallbacks = 0;
    for attempt in 0 .. attempts {
      let image = match self._decode(cur_idx) {
        Ok(image) => image,
        Err(DataError::Closed) => return Err(DataError::Closed),
        Err(e) => {
          if attempt + 1 == attempts || self.index.len() < 2 {
            warn!("bad image: #{} {} - giving up: {}", cur_idx, self.index.name(cur_idx), e);
            break;
          }
          let new_idx = self._substitute(cur_idx, rng);
          warn!("bad image: #{} {} - using #{}: {}", cur_idx, self.index.name(cur_idx), new_idx, e);
          cur_idx = new_idx;
          fallbacks += 1;
          continue;
        }
      };
      let (image, plan) = self._augment(image, rng);
      debug!("sample #{}: crop {:?} -> {:?}", cur_idx, plan.crop_box, image.dimensions());
      return Ok(Sample{
        tensor:     to_chw(&image),
        raw_idx:    cur_idx,
        fallbacks:  fallbacks,
        plan:       plan,
        flip:       Flip::default(),
      });
    }
    Err(DataError::ExhaustedRetries{index: raw_idx, attempts: fallbacks + 1})
  }

  fn _augment<R: Rng + ?Sized>(&self, mut image: RgbImage, rng: &mut R) -> (RgbImage, CropPlan) {
    maybe_autocontrast(&mut image, self.cfg.autocontrast_probability, self.cfg.autocontrast_max_cutoff, rng);
    let plan = self.cfg.crop.plan(image.dimensions(), self.resolution, self.cfg.max_bleed, self.cfg.min_scale, rng);
    match self.extend {
      None => {
        let plan = plan.with_target_size(self.output_size());
        (resample(&image, &plan), plan)
      }
      Some(extend) => {
        let cropped = resample(&image, &plan);
        let canvas = extend_canvas(&cropped, extend, EXTEND_FILL);
        let out = match self.anamorphic {
          None => canvas,
          Some(res) => resize(&canvas, res.dims()),
        };
        (out, plan)
      }
    }
  }

  /// Releases the source handle; later reads fail with `Closed`.
  pub fn close(&self) {
    if !self.closed.swap(true, Ordering::AcqRel) {
      debug!("closing dynamic dataset {:?}", self.name);
    }
    self.source.close();
  }

  pub fn is_closed(&self) -> bool {
    self.closed.load(Ordering::Acquire)
  }
}

fn _flip_chw(tensor: Array3<u8>, flip: Flip) -> Array3<u8> {
  let mut view = tensor.view();
  if flip.horizontal {
    view.invert_axis(ndarray::Axis(2));
  }
  if flip.vertical {
    view.invert_axis(ndarray::Axis(1));
  }
  view.to_owned()
}

impl RandomAccess for DynamicData {
  type Item = Result<Array3<u8>>;

  fn len(&self) -> usize {
    self.sample_count()
  }

  fn at(&self, idx: usize) -> Result<Array3<u8>> {
    self.get_sample_tensor(idx)
  }
}
