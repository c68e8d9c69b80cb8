use crate::dtype::DType;
use crate::error::Result;
use crate::layout::Layout;
use crate::shape::Shape;
use std::fmt;

// Backend: Abstraction over tensor storage
//
// The reindex evaluator is generic over `B: Backend`. It never touches
// element values itself: it resolves, for every output position, either a
// storage offset into the input or "fill", and hands that plan to
// `Backend::take`, which builds the output storage in one typed pass. That
// keeps values bit-exact for every dtype (no f64 round trip) and lets a
// backend implement the copy however it likes.
//
// The remaining methods are the small capability set the tensor handle and
// the derived operations need: creation, host read-back, a cast, an affine
// rescale (make_grid normalisation) and concatenation (stacking images).

/// Identifies a storage device (e.g. "cpu").
pub trait BackendDevice: Clone + fmt::Debug + Send + Sync + 'static {
    fn name(&self) -> String;
}

/// A storage buffer holding tensor data on a specific device.
pub trait BackendStorage: Clone + Send + Sync + 'static {
    fn dtype(&self) -> DType;

    /// Total number of elements in this buffer.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One resolved output element: copy from a storage offset, or fill.
pub type Source = Option<usize>;

/// The storage capability set the evaluator and the tensor handle rely on.
///
/// All methods take storage + layout and return new storage; existing
/// storage is never mutated.
pub trait Backend: Clone + Send + Sync + fmt::Debug + 'static {
    type Device: BackendDevice;
    type Storage: BackendStorage;

    //  Creation

    /// Allocate storage filled with zeros.
    fn zeros(shape: &Shape, dtype: DType, device: &Self::Device) -> Result<Self::Storage>;

    /// Allocate storage filled with a constant value (cast to `dtype`).
    fn full(shape: &Shape, val: f64, dtype: DType, device: &Self::Device) -> Result<Self::Storage>;

    /// Create storage from a flat f64 slice, converting to the target dtype.
    fn from_f64_slice(data: &[f64], dtype: DType, device: &Self::Device) -> Result<Self::Storage>;

    /// Create storage with random uniform values in [0, 1).
    fn rand_uniform(shape: &Shape, dtype: DType, device: &Self::Device) -> Result<Self::Storage>;

    //  Reading

    /// Copy the elements addressed by `layout` to the host, in logical order.
    fn to_f64_vec(input: &Self::Storage, layout: &Layout) -> Result<Vec<f64>>;

    /// Read one element at a storage offset.
    fn read(input: &Self::Storage, offset: usize) -> Result<f64>;

    //  Data movement

    /// Contiguous copy of the elements addressed by `layout`.
    fn to_contiguous(input: &Self::Storage, layout: &Layout) -> Result<Self::Storage>;

    /// Materialise a reindex plan.
    ///
    /// `plan[k]` is the storage offset in `input` whose element becomes output
    /// element `k`, or `None` to write `fill` (cast to the input dtype). The
    /// returned storage is contiguous and has `plan.len()` elements.
    fn take(input: &Self::Storage, plan: &[Source], fill: f64) -> Result<Self::Storage>;

    /// Concatenate storages along `dim` into one contiguous storage.
    /// `out_shape` is the pre-validated output shape.
    fn cat(
        inputs: &[(&Self::Storage, &Layout)],
        out_shape: &Shape,
        dim: usize,
    ) -> Result<Self::Storage>;

    //  Element-wise

    /// result = input * mul + add, in the input dtype.
    fn affine(input: &Self::Storage, layout: &Layout, mul: f64, add: f64) -> Result<Self::Storage>;

    /// Cast storage to a different dtype.
    ///
    /// The default goes through the host as f64; backends can override it.
    fn cast(
        input: &Self::Storage,
        layout: &Layout,
        dtype: DType,
        device: &Self::Device,
    ) -> Result<Self::Storage> {
        let data = Self::to_f64_vec(input, layout)?;
        Self::from_f64_slice(&data, dtype, device)
    }
}
