//! View-frustum planes extracted from a clip-space matrix.

use glam::{Mat4, Vec3, Vec4};

use super::bounds::Aabb;

/// The six frustum planes of a model-view-projection matrix.
///
/// Order: left, right, bottom, top, near, far. Each plane is `(n, d)` with
/// a point inside when `n·p + d >= 0`. Depth follows the 0..1 convention.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipPlanes {
  pub planes: [Vec4; 6],
}

impl ClipPlanes {
  pub fn from_matrix(m: &Mat4) -> Self {
    let r0 = m.row(0);
    let r1 = m.row(1);
    let r2 = m.row(2);
    let r3 = m.row(3);
    Self {
      planes: [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2],
    }
  }

  /// Conservative box test: false only when the box lies fully outside
  /// one plane.
  pub fn intersects_box(&self, aabb: &Aabb) -> bool {
    self.planes.iter().all(|plane| {
      let normal = plane.truncate();
      let positive = Vec3::select(normal.cmpge(Vec3::ZERO), aabb.max, aabb.min);
      normal.dot(positive) + plane.w >= 0.0
    })
  }
}
