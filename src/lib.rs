pub mod datasets;
pub mod error;
pub mod imageproc;
pub mod resolution;

pub use crate::datasets::dynamic::{DecodeOptions, DynamicConfig, DynamicData, Sample};
pub use crate::datasets::folder::{DatasetIndex, DirSource, SampleSource, ZipSource, open_source};
pub use crate::datasets::labels::{Label, LabelKind, Labels};
pub use crate::error::{DataError, Result};
pub use crate::imageproc::{CropBox, CropMode, CropPlan, Cutoff, Flip};
pub use crate::resolution::{Resolution};

pub trait RandomAccess {
  type Item;

  fn len(&self) -> usize;
  fn at(&self, idx: usize) -> Self::Item;
}

impl<'a, R> RandomAccess for &'a R where R: RandomAccess + ?Sized {
  type Item = <R as RandomAccess>::Item;

  fn len(&self) -> usize {
    (**self).len()
  }

  fn at(&self, idx: usize) -> Self::Item {
    (**self).at(idx)
  }
}

pub trait RandomAccessExt: RandomAccess + Sized {
  fn one_pass(self) -> OnePassDataSrc<Self>;
}

impl<R> RandomAccessExt for R where R: RandomAccess {
  fn one_pass(self) -> OnePassDataSrc<R> {
    OnePassDataSrc{
      data:   self,
      count:  0,
    }
  }
}

pub trait DataIter: Iterator {
  fn reset(&mut self);
}

/// Visits every index once, in order.
pub struct OnePassDataSrc<R> where R: RandomAccess {
  data:     R,
  count:    usize,
}

impl<R> OnePassDataSrc<R> where R: RandomAccess {
  pub fn into_inner(self) -> R {
    self.data
  }
}

impl<R> Iterator for OnePassDataSrc<R> where R: RandomAccess {
  type Item = <R as RandomAccess>::Item;

  fn next(&mut self) -> Option<Self::Item> {
    if self.count < self.data.len() {
      let item = self.data.at(self.count);
      self.count += 1;
      Some(item)
    } else {
      None
    }
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    let rem = self.data.len().saturating_sub(self.count);
    (rem, Some(rem))
  }
}

impl<R> DataIter for OnePassDataSrc<R> where R: RandomAccess {
  fn reset(&mut self) {
    self.count = 0;
  }
}
