//! Axis-aligned bounding box for octree nodes and clip regions.

use glam::Vec3;

/// Axis-aligned bounding box in model space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
  /// Minimum corner (inclusive).
  pub min: Vec3,
  /// Maximum corner (inclusive).
  pub max: Vec3,
}

impl Aabb {
  pub fn new(min: Vec3, max: Vec3) -> Self {
    Self { min, max }
  }

  pub fn from_origin_size(origin: Vec3, size: Vec3) -> Self {
    Self {
      min: origin,
      max: origin + size,
    }
  }

  /// Finite corners with `min <= max` on every axis.
  #[inline]
  pub fn is_valid(&self) -> bool {
    self.min.is_finite() && self.max.is_finite() && self.min.cmple(self.max).all()
  }

  /// Share any interior or boundary point.
  #[inline]
  pub fn overlaps(&self, other: &Aabb) -> bool {
    self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
  }

  #[inline]
  pub fn contains_point(&self, point: Vec3) -> bool {
    point.cmpge(self.min).all() && point.cmple(self.max).all()
  }

  /// Overlapping region, or `None` when the boxes are disjoint or degenerate.
  pub fn intersection(&self, other: &Aabb) -> Option<Aabb> {
    if !self.is_valid() || !other.is_valid() {
      return None;
    }
    let clipped = Aabb {
      min: self.min.max(other.min),
      max: self.max.min(other.max),
    };
    clipped.is_valid().then_some(clipped)
  }

  #[inline]
  pub fn size(&self) -> Vec3 {
    self.max - self.min
  }

  #[inline]
  pub fn center(&self) -> Vec3 {
    (self.min + self.max) * 0.5
  }
}
