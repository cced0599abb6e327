extern crate dyndata;

use dyndata::*;

use image::{Rgb, RgbImage};
use ndarray::{Array3};
use tracing::{Level, error, info};
use tracing_subscriber::{FmtSubscriber};

use std::env;
use std::path::{PathBuf};
use std::process;

fn init_logging() {
  let level = match env::var("DYNDATA_LOG").unwrap_or_default().to_ascii_lowercase().as_str() {
    "trace" => Level::TRACE,
    "debug" => Level::DEBUG,
    "warn"  => Level::WARN,
    "error" => Level::ERROR,
    _       => Level::INFO,
  };
  let subscriber = FmtSubscriber::builder()
    .with_max_level(level)
    .with_target(false)
    .compact()
    .finish();
  if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
    eprintln!("failed to initialize logging: {}", e);
  }
}

fn chw_to_image(tensor: &Array3<u8>) -> RgbImage {
  let (h, w) = (tensor.shape()[1], tensor.shape()[2]);
  RgbImage::from_fn(w as u32, h as u32, |x, y| {
    let (x, y) = (x as usize, y as usize);
    Rgb([tensor[[0, y, x]], tensor[[1, y, x]], tensor[[2, y, x]]])
  })
}

fn run(args: &[String]) -> Result<()> {
  let mut cfg = DynamicConfig::default();
  cfg.path = Some(PathBuf::from(&args[1]));
  cfg.resolution = Some(args[2].clone());
  if let Some(crop) = args.get(3) {
    cfg.crop = crop.parse()?;
  }
  let count: usize = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(8);
  let out_dir = args.get(5).map(PathBuf::from);
  cfg.use_labels = env::var("DYNDATA_LABELS").is_ok();
  cfg.autocontrast_probability = 0.5;
  cfg.autocontrast_max_cutoff = 2.0;

  let data = DynamicData::open(cfg)?;
  info!("raw shape: {:?} samples: {} label dim: {}", data.raw_shape(), data.sample_count(), data.label_dim());
  for (idx, tensor) in (&data).one_pass().enumerate().take(count) {
    let tensor = tensor?;
    let label = data.get_label(idx)?;
    info!("#{} {} shape {:?} label {:?}", idx, data.index().name(idx % data.index().len()), tensor.shape(), label);
    if let Some(dir) = out_dir.as_ref() {
      let path = dir.join(format!("{:06}.png", idx));
      if let Err(e) = chw_to_image(&tensor).save(&path) {
        error!("failed to write {}: {}", path.display(), e);
      }
    }
  }
  data.close();
  Ok(())
}

fn main() {
  init_logging();
  let args: Vec<_> = env::args().collect();
  if args.len() < 3 {
    eprintln!("usage: {} <dir-or-zip> <resolution> [center|focus|random] [count] [out-dir]", args[0]);
    process::exit(2);
  }
  if let Err(e) = run(&args) {
    error!("{}", e);
    process::exit(1);
  }
}
