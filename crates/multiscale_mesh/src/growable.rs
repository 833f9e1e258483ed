//! Append-only numeric buffer with amortized doubling growth.
//!
//! Used to assemble variable-length encoded arrays (packed positions,
//! octahedron normals) without knowing the final length up front.

/// Growable typed buffer.
///
/// Capacity doubles whenever an append would overflow it, so a sequence of
/// `n` appends performs `O(log n)` reallocations.
#[derive(Clone, Debug, Default)]
pub struct GrowableArray<T> {
  data: Vec<T>,
  len: usize,
}

impl<T: Copy + Default> GrowableArray<T> {
  /// Create an empty buffer with the given initial capacity.
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      data: vec![T::default(); capacity],
      len: 0,
    }
  }

  /// Number of elements appended so far.
  #[inline]
  pub fn len(&self) -> usize {
    self.len
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Allocated element capacity.
  #[inline]
  pub fn capacity(&self) -> usize {
    self.data.len()
  }

  /// Make room for `additional` elements, doubling capacity as needed.
  pub fn reserve(&mut self, additional: usize) {
    let required = self.len + additional;
    if required <= self.data.len() {
      return;
    }
    let mut capacity = self.data.len().max(1);
    while capacity < required {
      capacity *= 2;
    }
    self.data.resize(capacity, T::default());
  }

  /// Append a single element.
  pub fn push(&mut self, value: T) {
    self.reserve(1);
    self.data[self.len] = value;
    self.len += 1;
  }

  /// Append a slice of elements.
  pub fn extend_from_slice(&mut self, values: &[T]) {
    self.reserve(values.len());
    self.data[self.len..self.len + values.len()].copy_from_slice(values);
    self.len += values.len();
  }

  /// View of the appended elements.
  pub fn as_slice(&self) -> &[T] {
    &self.data[..self.len]
  }

  /// Consume the buffer, returning exactly the appended elements.
  pub fn into_vec(mut self) -> Vec<T> {
    self.data.truncate(self.len);
    self.data
  }

  /// Drop all elements, keeping the allocation.
  pub fn clear(&mut self) {
    self.len = 0;
  }
}
