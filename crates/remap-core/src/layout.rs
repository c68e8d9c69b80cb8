use crate::error::{Error, Result};
use crate::shape::Shape;

// Layout: how a tensor's logical shape maps onto flat storage
//
// Views (transpose, narrow, reshape of contiguous data) only change the
// layout and share the storage. The evaluator never assumes its input is
// contiguous: every source coordinate it computes is turned into a storage
// offset with `Layout::source_offset`, which also performs the bounds check
// that reports `IndexOutOfRange`.
//
//   flat = offset + Σ coord[d] * strides[d]

/// Layout describes how a tensor's logical shape maps to flat storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    shape: Shape,
    strides: Vec<usize>,
    /// Offset into the storage buffer where this tensor's data starts.
    offset: usize,
}

impl Layout {
    /// Contiguous row-major layout for the given shape.
    pub fn contiguous(shape: Shape) -> Self {
        let strides = shape.stride_contiguous();
        Layout {
            shape,
            strides,
            offset: 0,
        }
    }

    /// Layout with explicit strides and offset (for views).
    pub fn new(shape: Shape, strides: Vec<usize>, offset: usize) -> Self {
        Layout {
            shape,
            strides,
            offset,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn elem_count(&self) -> usize {
        self.shape.elem_count()
    }

    /// Contiguous means row-major strides and no offset.
    pub fn is_contiguous(&self) -> bool {
        self.offset == 0 && self.strides == self.shape.stride_contiguous()
    }

    /// Swap two dimensions. No data is copied.
    ///
    /// Example: [2, 3, 4] transpose(0, 2) → [4, 3, 2]
    ///          strides [12, 4, 1]         → [1, 4, 12]
    pub fn transpose(&self, dim0: usize, dim1: usize) -> Result<Layout> {
        let rank = self.rank();
        if dim0 >= rank || dim1 >= rank {
            return Err(Error::DimOutOfRange {
                dim: dim0.max(dim1),
                rank,
            });
        }
        let mut dims = self.shape.dims().to_vec();
        let mut strides = self.strides.clone();
        dims.swap(dim0, dim1);
        strides.swap(dim0, dim1);
        Ok(Layout::new(Shape::new(dims), strides, self.offset))
    }

    /// Slice `len` entries starting at `start` along `dim`.
    pub fn narrow(&self, dim: usize, start: usize, len: usize) -> Result<Layout> {
        let rank = self.rank();
        if dim >= rank {
            return Err(Error::DimOutOfRange { dim, rank });
        }
        let dim_size = self.shape.dims()[dim];
        if start + len > dim_size {
            return Err(Error::NarrowOutOfBounds {
                dim,
                start,
                len,
                dim_size,
            });
        }
        let mut dims = self.shape.dims().to_vec();
        dims[dim] = len;
        Ok(Layout::new(
            Shape::new(dims),
            self.strides.clone(),
            self.offset + start * self.strides[dim],
        ))
    }

    /// Insert a size-1 axis at `dim`. Its stride is irrelevant; use the
    /// stride the following axis would need so contiguity is preserved.
    pub fn unsqueeze(&self, dim: usize) -> Result<Layout> {
        let rank = self.rank();
        if dim > rank {
            return Err(Error::DimOutOfRange {
                dim,
                rank: rank + 1,
            });
        }
        let stride = if dim < rank {
            self.strides[dim] * self.dims()[dim]
        } else {
            1
        };
        let mut dims = self.dims().to_vec();
        let mut strides = self.strides.clone();
        dims.insert(dim, 1);
        strides.insert(dim, stride);
        Ok(Layout::new(Shape::new(dims), strides, self.offset))
    }

    /// Storage offset of an in-bounds coordinate.
    pub fn flat_index(&self, index: &[usize]) -> usize {
        self.offset
            + index
                .iter()
                .zip(self.strides.iter())
                .map(|(i, s)| i * s)
                .sum::<usize>()
    }

    /// Storage offset of a computed (possibly negative) source coordinate.
    ///
    /// Fails with `IndexOutOfRange` naming the first offending axis; `coord`
    /// is the output coordinate that produced `source`, reported verbatim.
    pub fn source_offset(&self, source: &[i64], coord: &[usize]) -> Result<usize> {
        let mut flat = self.offset;
        for (axis, ((&s, &size), &stride)) in source
            .iter()
            .zip(self.dims().iter())
            .zip(self.strides.iter())
            .enumerate()
        {
            if s < 0 || s as u64 >= size as u64 {
                return Err(Error::IndexOutOfRange {
                    axis,
                    index: s,
                    size,
                    coord: coord.to_vec(),
                });
            }
            flat += s as usize * stride;
        }
        Ok(flat)
    }

    /// Storage offsets of every element in logical row-major order.
    pub fn strided_indices(&self) -> StridedIter {
        StridedIter::new(self)
    }
}

/// Iterator yielding the storage offset of each logical element of a layout.
pub struct StridedIter {
    current: Vec<usize>,
    dims: Vec<usize>,
    strides: Vec<usize>,
    next: usize,
    remaining: usize,
}

impl StridedIter {
    fn new(layout: &Layout) -> Self {
        StridedIter {
            current: vec![0; layout.rank()],
            dims: layout.dims().to_vec(),
            strides: layout.strides().to_vec(),
            next: layout.offset(),
            remaining: layout.elem_count(),
        }
    }

    // Odometer step on the rightmost axis, keeping `next` in sync.
    fn advance(&mut self) {
        for i in (0..self.dims.len()).rev() {
            self.current[i] += 1;
            self.next += self.strides[i];
            if self.current[i] < self.dims[i] {
                return;
            }
            self.next -= self.strides[i] * self.current[i];
            self.current[i] = 0;
        }
    }
}

impl Iterator for StridedIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let idx = self.next;
        self.remaining -= 1;
        if self.remaining > 0 {
            self.advance();
        }
        Some(idx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for StridedIter {}
