use crate::error::{DataError, Result};

use tracing::{debug, warn};
use walkdir::{WalkDir};
use zip::{ZipArchive};

use std::collections::{BTreeSet};
use std::fs::{File};
use std::io::{Read};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};

pub const IMAGE_EXTENSIONS: &[&str] = &[
  "bmp", "dds", "exr", "ff", "gif", "hdr", "ico", "jpeg", "jpg", "pam",
  "pbm", "pgm", "png", "pnm", "ppm", "qoi", "tga", "tif", "tiff", "webp",
];

pub fn file_ext(name: &str) -> Option<String> {
  Path::new(name).extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| ext.to_ascii_lowercase())
}

pub fn is_image_name(name: &str) -> bool {
  match file_ext(name) {
    None => false,
    Some(ext) => IMAGE_EXTENSIONS.contains(&ext.as_str()),
  }
}

/// Something that can enumerate relative file names and hand out their
/// bytes. Names always use `/` as the separator.
pub trait SampleSource: Send + Sync {
  fn location(&self) -> &Path;
  fn list(&self) -> Result<Vec<String>>;
  fn read(&self, name: &str) -> Result<Vec<u8>>;

  /// Releases any held handle. Must be idempotent.
  fn close(&self) {}
}

pub struct DirSource {
  root: PathBuf,
}

impl DirSource {
  pub fn new(root: PathBuf) -> Self {
    DirSource{root}
  }
}

impl SampleSource for DirSource {
  fn location(&self) -> &Path {
    &self.root
  }

  fn list(&self) -> Result<Vec<String>> {
    let mut names = vec![];
    // Directory links are not descended into; links to files are listed.
    for entry in WalkDir::new(&self.root).follow_links(false) {
      let entry = entry.map_err(|e| DataError::io(&self.root, e.into()))?;
      let is_file = entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file());
      if !is_file {
        continue;
      }
      let rel = match entry.path().strip_prefix(&self.root) {
        Err(_) => continue,
        Ok(rel) => rel,
      };
      let toks: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
      match toks {
        None => warn!("skipping non-UTF-8 file name: {}", entry.path().display()),
        Some(toks) => names.push(toks.join("/")),
      }
    }
    Ok(names)
  }

  fn read(&self, name: &str) -> Result<Vec<u8>> {
    let path = self.root.join(name);
    std::fs::read(&path).map_err(|e| DataError::io(path, e))
  }
}

/// Zip archive opened lazily on first access and kept open until `close`.
pub struct ZipSource {
  path:     PathBuf,
  archive:  Mutex<Option<ZipArchive<File>>>,
  closed:   AtomicBool,
}

impl ZipSource {
  pub fn new(path: PathBuf) -> Self {
    ZipSource{
      path:     path,
      archive:  Mutex::new(None),
      closed:   AtomicBool::new(false),
    }
  }

  pub fn is_open(&self) -> bool {
    self._lock().is_some()
  }

  fn _lock(&self) -> MutexGuard<Option<ZipArchive<File>>> {
    self.archive.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn _with_archive<T, F>(&self, f: F) -> Result<T> where F: FnOnce(&mut ZipArchive<File>) -> Result<T> {
    let mut guard = self._lock();
    if self.closed.load(Ordering::Acquire) {
      return Err(DataError::Closed);
    }
    if guard.is_none() {
      debug!("opening zip archive {}", self.path.display());
      let file = File::open(&self.path).map_err(|e| DataError::io(&self.path, e))?;
      *guard = Some(ZipArchive::new(file)?);
    }
    match guard.as_mut() {
      None => Err(DataError::Closed),
      Some(archive) => f(archive),
    }
  }
}

impl SampleSource for ZipSource {
  fn location(&self) -> &Path {
    &self.path
  }

  fn list(&self) -> Result<Vec<String>> {
    self._with_archive(|archive| {
      Ok(archive.file_names()
        .filter(|name| !name.ends_with('/'))
        .map(|name| name.to_owned())
        .collect())
    })
  }

  fn read(&self, name: &str) -> Result<Vec<u8>> {
    self._with_archive(|archive| {
      let mut entry = archive.by_name(name)?;
      let mut buf = Vec::with_capacity(entry.size() as usize);
      entry.read_to_end(&mut buf).map_err(|e| DataError::io(name, e))?;
      Ok(buf)
    })
  }

  fn close(&self) {
    self.closed.store(true, Ordering::Release);
    if self._lock().take().is_some() {
      debug!("closed zip archive {}", self.path.display());
    }
  }
}

pub fn open_source(path: &Path) -> Result<Box<dyn SampleSource>> {
  if path.is_dir() {
    return Ok(Box::new(DirSource::new(path.to_owned())));
  }
  if path.is_file() && file_ext(&path.to_string_lossy()).map_or(false, |ext| ext == "zip") {
    return Ok(Box::new(ZipSource::new(path.to_owned())));
  }
  Err(DataError::SourceNotFound{path: path.to_owned()})
}

/// Sorted, deduplicated image names of a source. The position of a name is
/// its raw index.
#[derive(Clone, Debug)]
pub struct DatasetIndex {
  names:    Vec<String>,
}

impl DatasetIndex {
  pub fn build(source: &dyn SampleSource) -> Result<DatasetIndex> {
    Self::from_names(source.location(), source.list()?)
  }

  pub fn from_names<I>(location: &Path, names: I) -> Result<DatasetIndex> where I: IntoIterator<Item = String> {
    let names: BTreeSet<String> = names.into_iter()
      .map(|name| name.replace('\\', "/"))
      .filter(|name| is_image_name(name))
      .collect();
    if names.is_empty() {
      return Err(DataError::EmptyDataset{path: location.to_owned()});
    }
    Ok(DatasetIndex{names: names.into_iter().collect()})
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn name(&self, raw_idx: usize) -> &str {
    &self.names[raw_idx]
  }

  pub fn names(&self) -> &[String] {
    &self.names
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn filters_dedups_and_sorts() {
    let names = vec!["b/2.PNG", "a.txt", "a/1.jpg", "b/2.PNG", "c\\3.webp", "README"]
      .into_iter().map(|s| s.to_owned());
    let index = DatasetIndex::from_names(Path::new("mem"), names).unwrap();
    assert_eq!(index.names(), &["a/1.jpg".to_owned(), "b/2.PNG".to_owned(), "c/3.webp".to_owned()]);
    assert_eq!(index.name(1), "b/2.PNG");
  }

  #[test]
  fn no_images_is_an_error() {
    let names = vec!["notes.md".to_owned(), "data.bin".to_owned()];
    match DatasetIndex::from_names(Path::new("mem"), names) {
      Err(DataError::EmptyDataset{path}) => assert_eq!(path, PathBuf::from("mem")),
      other => panic!("unexpected: {:?}", other),
    }
  }

  #[test]
  fn extension_check_ignores_case() {
    assert!(is_image_name("x/y/z.JPeG"));
    assert!(!is_image_name("x/y/z"));
    assert!(!is_image_name("archive.zip"));
  }

  #[cfg(unix)]
  #[test]
  fn dir_listing_skips_link_loops() {
    use std::os::unix::fs::{symlink};

    let dir = tempfile::TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("a")).unwrap();
    std::fs::write(dir.path().join("a/1.png"), b"png").unwrap();
    symlink(dir.path().join("a"), dir.path().join("a/loop")).unwrap();
    symlink(dir.path().join("a/1.png"), dir.path().join("2.png")).unwrap();
    let src = DirSource::new(dir.path().to_owned());
    let mut names = src.list().unwrap();
    names.sort();
    assert_eq!(names, vec!["2.png".to_owned(), "a/1.png".to_owned()]);
  }

  #[cfg(unix)]
  #[test]
  fn dir_listing_skips_non_utf8_names() {
    use std::ffi::{OsStr};
    use std::os::unix::ffi::{OsStrExt};

    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("ok.png"), b"png").unwrap();
    let bad = OsStr::from_bytes(b"bad\xff.png");
    if std::fs::write(dir.path().join(bad), b"png").is_err() {
      // Some filesystems refuse invalid UTF-8 outright.
      return;
    }
    let src = DirSource::new(dir.path().to_owned());
    assert_eq!(src.list().unwrap(), vec!["ok.png".to_owned()]);
  }

  #[test]
  fn zip_read_after_close_does_not_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("x.zip");
    {
      let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
      zip.start_file("a.png", zip::write::SimpleFileOptions::default()).unwrap();
      std::io::Write::write_all(&mut zip, b"png").unwrap();
      zip.finish().unwrap();
    }
    let src = std::sync::Arc::new(ZipSource::new(path));
    assert_eq!(src.read("a.png").unwrap(), b"png".to_vec());
    let reader = {
      let src = src.clone();
      std::thread::spawn(move || {
        for _ in 0 .. 200 {
          match src.read("a.png") {
            Ok(_) | Err(DataError::Closed) => {}
            Err(e) => panic!("unexpected: {}", e),
          }
        }
      })
    };
    src.close();
    reader.join().unwrap();
    assert!(!src.is_open());
    assert!(matches!(src.read("a.png"), Err(DataError::Closed)));
  }

  #[test]
  fn unknown_path_is_not_a_source() {
    match open_source(Path::new("/definitely/not/here.tar")) {
      Err(DataError::SourceNotFound{..}) => {}
      Err(e) => panic!("unexpected: {}", e),
      Ok(_) => panic!("expected an error"),
    }
  }
}
