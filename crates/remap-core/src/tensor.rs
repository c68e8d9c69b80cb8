use std::sync::Arc;

use crate::backend::{Backend, BackendStorage, Source};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::shape::Shape;

// Tensor: handle over shared, immutable storage
//
// Tensor<B: Backend> is generic over the storage backend. The data lives in
// an `Arc<B::Storage>` that is never written after creation: views
// (transpose, narrow, unsqueeze, reshape of contiguous data) share it, and
// every operation that produces new values allocates new storage. This is
// what lets the reindex evaluator read its input from many threads at once
// without locking, and guarantees the input is left untouched.
//
// Cloning a Tensor is O(1) (one Arc increment).

struct TensorInner<B: Backend> {
    storage: Arc<B::Storage>,
    layout: Layout,
    dtype: DType,
    device: B::Device,
}

/// An n-dimensional array of numbers on a specific backend.
///
/// # Example
/// ```ignore
/// use remap_core::{DType, Tensor};
/// use remap_cpu::{CpuBackend, CpuDevice};
///
/// let a = Tensor::<CpuBackend>::from_f64_slice(&[1.0, 2.0, 3.0, 4.0], (2, 2), DType::F32, &CpuDevice)?;
/// assert_eq!(a.get(&[1, 0])?, 3.0);
/// ```
pub struct Tensor<B: Backend> {
    inner: Arc<TensorInner<B>>,
}

impl<B: Backend> Clone for Tensor<B> {
    fn clone(&self) -> Self {
        Tensor {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Backend> std::fmt::Debug for Tensor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tensor(shape={}, dtype={}, device={:?})",
            self.inner.layout.shape(),
            self.inner.dtype,
            self.inner.device,
        )
    }
}

impl<B: Backend> Tensor<B> {
    // Constructors

    /// Wrap freshly produced storage. The dtype is taken from the storage.
    pub fn from_storage(storage: B::Storage, layout: Layout, device: B::Device) -> Self {
        let dtype = storage.dtype();
        Tensor {
            inner: Arc::new(TensorInner {
                storage: Arc::new(storage),
                layout,
                dtype,
                device,
            }),
        }
    }

    /// A view sharing this tensor's storage under a different layout.
    fn view_with_layout(&self, layout: Layout) -> Self {
        Tensor {
            inner: Arc::new(TensorInner {
                storage: Arc::clone(&self.inner.storage),
                layout,
                dtype: self.inner.dtype,
                device: self.inner.device.clone(),
            }),
        }
    }

    fn contiguous_from(storage: B::Storage, shape: Shape, device: &B::Device) -> Self {
        Self::from_storage(storage, Layout::contiguous(shape), device.clone())
    }

    // Accessors

    pub fn shape(&self) -> &Shape {
        self.inner.layout.shape()
    }

    pub fn dims(&self) -> &[usize] {
        self.inner.layout.dims()
    }

    pub fn rank(&self) -> usize {
        self.inner.layout.rank()
    }

    pub fn elem_count(&self) -> usize {
        self.inner.layout.elem_count()
    }

    pub fn dtype(&self) -> DType {
        self.inner.dtype
    }

    pub fn device(&self) -> &B::Device {
        &self.inner.device
    }

    pub fn layout(&self) -> &Layout {
        &self.inner.layout
    }

    pub fn is_contiguous(&self) -> bool {
        self.inner.layout.is_contiguous()
    }

    /// The underlying storage. Read-only; it may be shared with other views.
    pub fn storage(&self) -> &B::Storage {
        &self.inner.storage
    }

    /// Whether two tensors share the same storage buffer.
    pub fn same_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner.storage, &other.inner.storage)
    }

    /// Read the element at `coord` as f64.
    pub fn get(&self, coord: &[usize]) -> Result<f64> {
        if coord.len() != self.rank() {
            return Err(Error::RankMismatch {
                expected: self.rank(),
                got: coord.len(),
            });
        }
        let source: Vec<i64> = coord.iter().map(|&c| c as i64).collect();
        let offset = self.inner.layout.source_offset(&source, coord)?;
        B::read(&self.inner.storage, offset)
    }

    // Creation methods

    pub fn zeros(shape: impl Into<Shape>, dtype: DType, device: &B::Device) -> Result<Self> {
        let shape = shape.into();
        let storage = B::zeros(&shape, dtype, device)?;
        Ok(Self::contiguous_from(storage, shape, device))
    }

    pub fn full(
        shape: impl Into<Shape>,
        val: f64,
        dtype: DType,
        device: &B::Device,
    ) -> Result<Self> {
        let shape = shape.into();
        let storage = B::full(&shape, val, dtype, device)?;
        Ok(Self::contiguous_from(storage, shape, device))
    }

    /// Create a tensor from row-major f64 data, converted to `dtype`.
    pub fn from_f64_slice(
        data: &[f64],
        shape: impl Into<Shape>,
        dtype: DType,
        device: &B::Device,
    ) -> Result<Self> {
        let shape = shape.into();
        if data.len() != shape.elem_count() {
            return Err(Error::ElementCountMismatch {
                shape: shape.clone(),
                expected: shape.elem_count(),
                got: data.len(),
            });
        }
        let storage = B::from_f64_slice(data, dtype, device)?;
        Ok(Self::contiguous_from(storage, shape, device))
    }

    /// Values `0, 1, …, n-1` reshaped to `shape` (handy for checking index maps).
    pub fn arange(shape: impl Into<Shape>, dtype: DType, device: &B::Device) -> Result<Self> {
        let shape = shape.into();
        let data: Vec<f64> = (0..shape.elem_count()).map(|i| i as f64).collect();
        Self::from_f64_slice(&data, shape, dtype, device)
    }

    /// Random uniform values in [0, 1).
    pub fn rand(shape: impl Into<Shape>, dtype: DType, device: &B::Device) -> Result<Self> {
        let shape = shape.into();
        let storage = B::rand_uniform(&shape, dtype, device)?;
        Ok(Self::contiguous_from(storage, shape, device))
    }

    /// Build a contiguous tensor of `shape` from a resolved reindex plan.
    ///
    /// `plan` holds one entry per output element in row-major order: a
    /// storage offset into `self`, or `None` for `fill`.
    pub fn take(&self, shape: impl Into<Shape>, plan: &[Source], fill: f64) -> Result<Self> {
        let shape = shape.into();
        if plan.len() != shape.elem_count() {
            return Err(Error::ElementCountMismatch {
                shape: shape.clone(),
                expected: shape.elem_count(),
                got: plan.len(),
            });
        }
        let storage = B::take(&self.inner.storage, plan, fill)?;
        Ok(Self::contiguous_from(storage, shape, self.device()))
    }

    // Views (no data copy)

    pub fn transpose(&self, dim0: usize, dim1: usize) -> Result<Self> {
        let layout = self.inner.layout.transpose(dim0, dim1)?;
        Ok(self.view_with_layout(layout))
    }

    pub fn narrow(&self, dim: usize, start: usize, len: usize) -> Result<Self> {
        let layout = self.inner.layout.narrow(dim, start, len)?;
        Ok(self.view_with_layout(layout))
    }

    /// unsqueeze(0) on [3, 4] → [1, 3, 4]
    pub fn unsqueeze(&self, dim: usize) -> Result<Self> {
        let layout = self.inner.layout.unsqueeze(dim)?;
        Ok(self.view_with_layout(layout))
    }

    /// Reshape to a shape with the same element count. Non-contiguous tensors
    /// are copied first.
    pub fn reshape(&self, new_shape: impl Into<Shape>) -> Result<Self> {
        let new_shape = new_shape.into();
        if self.elem_count() != new_shape.elem_count() {
            return Err(Error::ReshapeElementMismatch {
                src: self.elem_count(),
                dst: new_shape.elem_count(),
                dst_shape: new_shape,
            });
        }
        let tensor = self.contiguous()?;
        Ok(tensor.view_with_layout(Layout::contiguous(new_shape)))
    }

    /// Returns `self` if already contiguous, otherwise a contiguous copy.
    pub fn contiguous(&self) -> Result<Self> {
        if self.is_contiguous() {
            return Ok(self.clone());
        }
        let storage = B::to_contiguous(&self.inner.storage, &self.inner.layout)?;
        Ok(Self::contiguous_from(
            storage,
            self.shape().clone(),
            self.device(),
        ))
    }

    // Combining

    /// Concatenate tensors along `dim`. All other dims and the dtype must match.
    pub fn cat(tensors: &[Self], dim: usize) -> Result<Self> {
        let first = tensors
            .first()
            .ok_or_else(|| Error::msg("cat: empty tensor list"))?;
        let rank = first.rank();
        if dim >= rank {
            return Err(Error::DimOutOfRange { dim, rank });
        }
        for (i, t) in tensors.iter().enumerate().skip(1) {
            if t.dtype() != first.dtype() {
                return Err(Error::DTypeMismatch {
                    expected: first.dtype(),
                    got: t.dtype(),
                });
            }
            let compatible = t.rank() == rank
                && (0..rank).all(|d| d == dim || t.dims()[d] == first.dims()[d]);
            if !compatible {
                crate::bail!(
                    "cat: tensor {} has shape {} incompatible with {} along dim {}",
                    i,
                    t.shape(),
                    first.shape(),
                    dim
                );
            }
        }

        let mut out_dims = first.dims().to_vec();
        out_dims[dim] = tensors.iter().map(|t| t.dims()[dim]).sum();
        let out_shape = Shape::new(out_dims);

        let pairs: Vec<(&B::Storage, &Layout)> = tensors
            .iter()
            .map(|t| (t.storage(), t.layout()))
            .collect();
        let storage = B::cat(&pairs, &out_shape, dim)?;
        Ok(Self::contiguous_from(storage, out_shape, first.device()))
    }

    /// Stack same-shaped tensors along a new dimension.
    /// `stack([a, b], 0)` with a, b of shape [2, 3] gives [2, 2, 3].
    pub fn stack(tensors: &[Self], dim: usize) -> Result<Self> {
        let first = tensors
            .first()
            .ok_or_else(|| Error::msg("stack: empty tensor list"))?;
        for (i, t) in tensors.iter().enumerate().skip(1) {
            if t.shape() != first.shape() {
                crate::bail!(
                    "stack: tensor {} has shape {} but expected {}",
                    i,
                    t.shape(),
                    first.shape()
                );
            }
        }
        let unsqueezed = tensors
            .iter()
            .map(|t| t.unsqueeze(dim))
            .collect::<Result<Vec<_>>>()?;
        Self::cat(&unsqueezed, dim)
    }

    // Element-wise

    /// result[i] = self[i] * mul + add.
    pub fn affine(&self, mul: f64, add: f64) -> Result<Self> {
        let storage = B::affine(&self.inner.storage, &self.inner.layout, mul, add)?;
        Ok(Self::contiguous_from(
            storage,
            self.shape().clone(),
            self.device(),
        ))
    }

    /// Smallest element. Fails on an empty tensor.
    pub fn min_all(&self) -> Result<f64> {
        self.fold_all("min_all", f64::min)
    }

    /// Largest element. Fails on an empty tensor.
    pub fn max_all(&self) -> Result<f64> {
        self.fold_all("max_all", f64::max)
    }

    fn fold_all(&self, name: &str, f: fn(f64, f64) -> f64) -> Result<f64> {
        self.to_f64_vec()?
            .into_iter()
            .reduce(f)
            .ok_or_else(|| Error::msg(format!("{name}: tensor {} is empty", self.shape())))
    }

    // Data extraction

    /// All elements as a flat row-major Vec<f64>.
    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        B::to_f64_vec(&self.inner.storage, &self.inner.layout)
    }

    /// The single element of a one-element tensor.
    pub fn to_scalar_f64(&self) -> Result<f64> {
        if self.elem_count() != 1 {
            return Err(Error::NotAScalar {
                shape: self.shape().clone(),
            });
        }
        let vec = self.to_f64_vec()?;
        Ok(vec[0])
    }

    /// Convert to another dtype (returns `self` if it already matches).
    pub fn to_dtype(&self, dtype: DType) -> Result<Self> {
        if self.dtype() == dtype {
            return Ok(self.clone());
        }
        let storage = B::cast(&self.inner.storage, &self.inner.layout, dtype, self.device())?;
        Ok(Self::contiguous_from(
            storage,
            self.shape().clone(),
            self.device(),
        ))
    }
}
