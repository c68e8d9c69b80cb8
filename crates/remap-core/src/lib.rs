//! # remap-core
//!
//! Tensor primitives the reindex evaluator is built on.
//!
//! This crate provides:
//! - [`Tensor`]: n-dimensional array handle over immutable, shared storage
//! - [`Shape`] / [`Layout`]: shape, strides, offsets and row-major walking
//! - [`DType`]: element types (F16, BF16, F32, F64, U8, U32, I64)
//! - [`Backend`] trait: the storage capability set the evaluator consumes
//! - [`Error`]: the single error type shared by every remap crate

pub mod backend;
pub mod dtype;
pub mod error;
pub mod layout;
pub mod shape;
pub mod tensor;

pub use backend::{Backend, BackendDevice, BackendStorage, Source};
pub use dtype::{DType, WithDType};
pub use error::{Error, Result};
pub use layout::Layout;
pub use shape::Shape;
pub use tensor::Tensor;
