//! # remap-cpu
//!
//! Host-memory implementation of the remap [`Backend`] trait.
//!
//! `CpuStorage` is an enum over one `Vec<T>` per supported dtype. Every
//! operation is written once, generically over [`CpuElem`], and dispatched on
//! the runtime dtype with the `dispatch!` macro, so copies made by the
//! reindex evaluator (`take`) stay bit-exact for every element type.

use half::{bf16, f16};
use rand::Rng;
use rayon::prelude::*;

use remap_core::backend::{Backend, BackendDevice, BackendStorage, Source};
use remap_core::dtype::{DType, WithDType};
use remap_core::error::{Error, Result};
use remap_core::layout::Layout;
use remap_core::shape::Shape;
use remap_core::tensor::Tensor;

/// Outputs with at least this many elements are copied with rayon.
const PARALLEL_TAKE_THRESHOLD: usize = 1 << 15;

// CpuDevice / CpuStorage

/// The host. There is only one, so the device carries no state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuDevice;

impl BackendDevice for CpuDevice {
    fn name(&self) -> String {
        "cpu".to_string()
    }
}

/// Typed host buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum CpuStorage {
    F16(Vec<f16>),
    BF16(Vec<bf16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    U8(Vec<u8>),
    U32(Vec<u32>),
    I64(Vec<i64>),
}

impl CpuStorage {
    /// The buffer as `&[T]`, if `T` is its element type.
    pub fn as_slice<T: CpuElem>(&self) -> Option<&[T]> {
        T::slice(self)
    }
}

impl BackendStorage for CpuStorage {
    fn dtype(&self) -> DType {
        match self {
            CpuStorage::F16(_) => DType::F16,
            CpuStorage::BF16(_) => DType::BF16,
            CpuStorage::F32(_) => DType::F32,
            CpuStorage::F64(_) => DType::F64,
            CpuStorage::U8(_) => DType::U8,
            CpuStorage::U32(_) => DType::U32,
            CpuStorage::I64(_) => DType::I64,
        }
    }

    fn len(&self) -> usize {
        match self {
            CpuStorage::F16(v) => v.len(),
            CpuStorage::BF16(v) => v.len(),
            CpuStorage::F32(v) => v.len(),
            CpuStorage::F64(v) => v.len(),
            CpuStorage::U8(v) => v.len(),
            CpuStorage::U32(v) => v.len(),
            CpuStorage::I64(v) => v.len(),
        }
    }
}

// CpuElem: ties each element type to its CpuStorage variant

/// Element types `CpuStorage` can hold.
pub trait CpuElem: WithDType {
    fn slice(storage: &CpuStorage) -> Option<&[Self]>;
    fn into_storage(data: Vec<Self>) -> CpuStorage;
}

macro_rules! cpu_elem {
    ($t:ty, $variant:ident) => {
        impl CpuElem for $t {
            fn slice(storage: &CpuStorage) -> Option<&[Self]> {
                match storage {
                    CpuStorage::$variant(v) => Some(v),
                    _ => None,
                }
            }
            fn into_storage(data: Vec<Self>) -> CpuStorage {
                CpuStorage::$variant(data)
            }
        }
    };
}

cpu_elem!(f16, F16);
cpu_elem!(bf16, BF16);
cpu_elem!(f32, F32);
cpu_elem!(f64, F64);
cpu_elem!(u8, U8);
cpu_elem!(u32, U32);
cpu_elem!(i64, I64);

/// Run `$body` with `$t` bound to the Rust type of `$dtype`.
macro_rules! dispatch {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            DType::F16 => {
                type $t = f16;
                $body
            }
            DType::BF16 => {
                type $t = bf16;
                $body
            }
            DType::F32 => {
                type $t = f32;
                $body
            }
            DType::F64 => {
                type $t = f64;
                $body
            }
            DType::U8 => {
                type $t = u8;
                $body
            }
            DType::U32 => {
                type $t = u32;
                $body
            }
            DType::I64 => {
                type $t = i64;
                $body
            }
        }
    };
}

// Typed helpers

fn typed<T: CpuElem>(storage: &CpuStorage) -> Result<&[T]> {
    T::slice(storage).ok_or(Error::DTypeMismatch {
        expected: T::DTYPE,
        got: storage.dtype(),
    })
}

fn out_of_storage(offset: usize, len: usize) -> Error {
    Error::msg(format!(
        "storage offset {offset} out of bounds for buffer of {len} elements"
    ))
}

/// Elements addressed by `layout`, in logical row-major order.
fn gather<T: CpuElem>(data: &[T], layout: &Layout) -> Result<Vec<T>> {
    layout
        .strided_indices()
        .map(|i| data.get(i).copied().ok_or_else(|| out_of_storage(i, data.len())))
        .collect()
}

fn take_typed<T: CpuElem>(data: &[T], plan: &[Source], fill: f64) -> Result<Vec<T>> {
    let fill = T::from_f64(fill);
    let pick = |source: &Source| match *source {
        Some(i) => data
            .get(i)
            .copied()
            .ok_or_else(|| out_of_storage(i, data.len())),
        None => Ok(fill),
    };
    if plan.len() >= PARALLEL_TAKE_THRESHOLD {
        plan.par_iter().map(pick).collect()
    } else {
        plan.iter().map(pick).collect()
    }
}

fn cat_typed<T: CpuElem>(
    inputs: &[(&CpuStorage, &Layout)],
    out_shape: &Shape,
    dim: usize,
) -> Result<Vec<T>> {
    let dims = out_shape.dims();
    let outer: usize = dims[..dim].iter().product();
    let inner: usize = dims[dim + 1..].iter().product();

    let parts = inputs
        .iter()
        .map(|(storage, layout)| {
            let data = gather(typed::<T>(storage)?, layout)?;
            Ok((data, layout.dims()[dim] * inner))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut out = Vec::with_capacity(out_shape.elem_count());
    for o in 0..outer {
        for (data, block) in &parts {
            out.extend_from_slice(&data[o * block..(o + 1) * block]);
        }
    }
    Ok(out)
}

// Backend implementation

/// The host-memory backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

/// A tensor stored in host memory.
pub type CpuTensor = Tensor<CpuBackend>;

impl Backend for CpuBackend {
    type Device = CpuDevice;
    type Storage = CpuStorage;

    fn zeros(shape: &Shape, dtype: DType, _device: &CpuDevice) -> Result<CpuStorage> {
        let n = shape.elem_count();
        Ok(dispatch!(dtype, T => T::into_storage(vec![T::zero(); n])))
    }

    fn full(shape: &Shape, val: f64, dtype: DType, _device: &CpuDevice) -> Result<CpuStorage> {
        let n = shape.elem_count();
        Ok(dispatch!(dtype, T => T::into_storage(vec![T::from_f64(val); n])))
    }

    fn from_f64_slice(data: &[f64], dtype: DType, _device: &CpuDevice) -> Result<CpuStorage> {
        Ok(dispatch!(dtype, T => T::into_storage(
            data.iter().map(|&v| T::from_f64(v)).collect()
        )))
    }

    fn rand_uniform(shape: &Shape, dtype: DType, device: &CpuDevice) -> Result<CpuStorage> {
        let mut rng = rand::thread_rng();
        let data: Vec<f64> = (0..shape.elem_count())
            .map(|_| rng.gen::<f64>())
            .collect();
        Self::from_f64_slice(&data, dtype, device)
    }

    fn to_f64_vec(input: &CpuStorage, layout: &Layout) -> Result<Vec<f64>> {
        dispatch!(input.dtype(), T => {
            let data = gather(typed::<T>(input)?, layout)?;
            Ok(data.into_iter().map(|v| v.to_f64()).collect())
        })
    }

    fn read(input: &CpuStorage, offset: usize) -> Result<f64> {
        dispatch!(input.dtype(), T => {
            let data = typed::<T>(input)?;
            data.get(offset)
                .map(|v| v.to_f64())
                .ok_or_else(|| out_of_storage(offset, data.len()))
        })
    }

    fn to_contiguous(input: &CpuStorage, layout: &Layout) -> Result<CpuStorage> {
        dispatch!(input.dtype(), T => Ok(T::into_storage(gather(typed::<T>(input)?, layout)?)))
    }

    fn take(input: &CpuStorage, plan: &[Source], fill: f64) -> Result<CpuStorage> {
        dispatch!(input.dtype(), T => Ok(T::into_storage(
            take_typed(typed::<T>(input)?, plan, fill)?
        )))
    }

    fn cat(inputs: &[(&CpuStorage, &Layout)], out_shape: &Shape, dim: usize) -> Result<CpuStorage> {
        let (first, _) = inputs
            .first()
            .ok_or_else(|| Error::msg("cat: no inputs"))?;
        dispatch!(first.dtype(), T => Ok(T::into_storage(cat_typed::<T>(inputs, out_shape, dim)?)))
    }

    fn affine(input: &CpuStorage, layout: &Layout, mul: f64, add: f64) -> Result<CpuStorage> {
        dispatch!(input.dtype(), T => {
            let data = gather(typed::<T>(input)?, layout)?;
            Ok(T::into_storage(
                data.into_iter()
                    .map(|v| T::from_f64(v.to_f64() * mul + add))
                    .collect(),
            ))
        })
    }
}
