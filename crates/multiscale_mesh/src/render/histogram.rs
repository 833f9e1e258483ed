//! Render-scale histogram for progress and quality reporting.
//!
//! Samples are bucketed by `floor(log2(scale))` on two axes: the spatial
//! scale of the drawn LOD and the render scale the selection computed for
//! it. Meshes without a LOD axis report under [`INFINITE_BUCKET`].

use std::collections::BTreeMap;

/// Finite buckets per axis.
pub const BUCKET_COUNT: u8 = 64;

/// Sentinel bucket for infinite (or undefined) scales.
pub const INFINITE_BUCKET: u8 = u8::MAX;

/// Bucket of `scale = 2^-32` on each axis.
const BUCKET_OFFSET: i32 = 32;

/// Log2 bucket of `scale`.
pub fn scale_bucket(scale: f32) -> u8 {
  if scale.is_nan() || scale == f32::INFINITY {
    return INFINITE_BUCKET;
  }
  if scale <= 0.0 {
    return 0;
  }
  (scale.log2().floor() as i32 + BUCKET_OFFSET).clamp(0, BUCKET_COUNT as i32 - 1) as u8
}

/// Present and missing node counts of one bucket.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct ScaleCount {
  pub present: u32,
  pub missing: u32,
}

impl ScaleCount {
  #[inline]
  pub fn total(&self) -> u32 {
    self.present + self.missing
  }
}

/// Per-frame render-scale histogram of one layer.
#[derive(Clone, Debug, Default)]
pub struct RenderScaleHistogram {
  frame: u64,
  buckets: BTreeMap<(u8, u8), ScaleCount>,
  object_present: u32,
  object_total: u32,
}

impl RenderScaleHistogram {
  pub fn new() -> Self {
    Self::default()
  }

  /// Drop the previous frame's samples.
  pub fn begin_frame(&mut self) {
    self.frame += 1;
    self.buckets.clear();
    self.object_present = 0;
    self.object_total = 0;
  }

  /// Frames started so far.
  #[inline]
  pub fn frame(&self) -> u64 {
    self.frame
  }

  pub fn add(&mut self, spatial_scale: f32, render_scale: f32, present: u32, missing: u32) {
    let entry = self
      .buckets
      .entry((scale_bucket(spatial_scale), scale_bucket(render_scale)))
      .or_default();
    entry.present += present;
    entry.missing += missing;
  }

  /// Aggregate per-object counts used by [`progress`](Self::progress).
  pub fn add_object_totals(&mut self, present: u32, total: u32) {
    self.object_present += present;
    self.object_total += total;
  }

  pub fn count(&self, spatial_bucket: u8, render_bucket: u8) -> ScaleCount {
    self
      .buckets
      .get(&(spatial_bucket, render_bucket))
      .copied()
      .unwrap_or_default()
  }

  /// Non-empty buckets as `((spatial, render), count)`, in bucket order.
  pub fn iter(&self) -> impl Iterator<Item = ((u8, u8), ScaleCount)> + '_ {
    self.buckets.iter().map(|(key, count)| (*key, *count))
  }

  /// Sum over all buckets.
  pub fn totals(&self) -> ScaleCount {
    self.buckets.values().fold(ScaleCount::default(), |acc, c| ScaleCount {
      present: acc.present + c.present,
      missing: acc.missing + c.missing,
    })
  }

  /// Fraction of wanted fragments that were present this frame; 1 when
  /// nothing was wanted.
  pub fn progress(&self) -> f32 {
    if self.object_total == 0 {
      1.0
    } else {
      self.object_present as f32 / self.object_total as f32
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_bucket_boundaries() {
    assert_eq!(scale_bucket(1.0), 32);
    assert_eq!(scale_bucket(1.99), 32);
    assert_eq!(scale_bucket(2.0), 33);
    assert_eq!(scale_bucket(0.5), 31);
    assert_eq!(scale_bucket(0.0), 0);
    assert_eq!(scale_bucket(1e30), BUCKET_COUNT - 1);
    assert_eq!(scale_bucket(f32::INFINITY), INFINITE_BUCKET);
    assert_eq!(scale_bucket(f32::NAN), INFINITE_BUCKET);
  }

  #[test]
  fn test_samples_accumulate_per_bucket() {
    let mut histogram = RenderScaleHistogram::new();
    histogram.begin_frame();
    histogram.add(2.0, 3.0, 1, 0);
    histogram.add(2.5, 2.0, 0, 1);
    histogram.add(f32::INFINITY, f32::INFINITY, 4, 2);

    assert_eq!(histogram.count(33, 33), ScaleCount { present: 1, missing: 1 });
    assert_eq!(
      histogram.count(INFINITE_BUCKET, INFINITE_BUCKET),
      ScaleCount { present: 4, missing: 2 }
    );
    assert_eq!(histogram.totals().total(), 8);
    assert_eq!(histogram.iter().count(), 2);
  }

  #[test]
  fn test_progress_and_frame_reset() {
    let mut histogram = RenderScaleHistogram::new();
    assert_eq!(histogram.progress(), 1.0);

    histogram.begin_frame();
    histogram.add_object_totals(1, 2);
    histogram.add_object_totals(2, 2);
    histogram.add(1.0, 1.0, 3, 1);
    assert_eq!(histogram.progress(), 0.75);

    histogram.begin_frame();
    assert_eq!(histogram.frame(), 2);
    assert_eq!(histogram.progress(), 1.0);
    assert_eq!(histogram.iter().count(), 0);
  }
}
