//! # remap-ops
//!
//! Tensor operations expressed as reindexes. None of them touches element
//! data directly: each one validates its arguments, builds the per-axis
//! expressions and overflow conditions, and hands them to
//! [`remap_expr::Reindex`].
//!
//! | op          | output                | source index on axis d            |
//! |-------------|-----------------------|-----------------------------------|
//! | repeat      | shape * reps          | `i_d % shape[d]`                  |
//! | flip        | shape                 | `shape[dim] - 1 - i_dim`          |
//! | expand      | target                | `i_d`, or `0` for size-1 axes     |
//! | index_fill  | shape                 | `i_d`, fill where `i_dim == idx`  |
//! | triu / tril | shape                 | `i_d`, fill off the triangle      |
//! | make_grid   | `[c, H, W]` canvas    | tile / offset arithmetic          |
//!
//! The [`TensorOps`] extension trait exposes all of them as methods.

pub mod expand;
pub mod fill;
pub mod flip;
pub mod grid;
pub mod repeat;
pub mod triangular;

pub use expand::{expand, expand_as};
pub use fill::index_fill;
pub use flip::flip;
pub use grid::{make_grid, make_grid_list, MakeGridConfig};
pub use repeat::repeat;
pub use triangular::{tril, triu};

use remap_core::{Backend, Result, Shape, Tensor};

/// Reindex-based operations as tensor methods.
pub trait TensorOps<B: Backend> {
    fn repeat(&self, reps: &[usize]) -> Result<Tensor<B>>;

    fn flip(&self, dim: isize) -> Result<Tensor<B>>;

    fn expand(&self, shape: impl Into<Shape>) -> Result<Tensor<B>>;

    fn expand_as(&self, other: &Tensor<B>) -> Result<Tensor<B>>;

    fn index_fill(&self, dim: usize, indices: &[usize], value: f64) -> Result<Tensor<B>>;

    fn triu(&self, diagonal: i64) -> Result<Tensor<B>>;

    fn tril(&self, diagonal: i64) -> Result<Tensor<B>>;

    /// `self` is a `[b, c, h, w]` batch.
    fn make_grid(&self, config: &MakeGridConfig) -> Result<Tensor<B>>;
}

impl<B: Backend> TensorOps<B> for Tensor<B> {
    fn repeat(&self, reps: &[usize]) -> Result<Tensor<B>> {
        repeat::repeat(self, reps)
    }

    fn flip(&self, dim: isize) -> Result<Tensor<B>> {
        flip::flip(self, dim)
    }

    fn expand(&self, shape: impl Into<Shape>) -> Result<Tensor<B>> {
        expand::expand(self, shape)
    }

    fn expand_as(&self, other: &Tensor<B>) -> Result<Tensor<B>> {
        expand::expand_as(self, other)
    }

    fn index_fill(&self, dim: usize, indices: &[usize], value: f64) -> Result<Tensor<B>> {
        fill::index_fill(self, dim, indices, value)
    }

    fn triu(&self, diagonal: i64) -> Result<Tensor<B>> {
        triangular::triu(self, diagonal)
    }

    fn tril(&self, diagonal: i64) -> Result<Tensor<B>> {
        triangular::tril(self, diagonal)
    }

    fn make_grid(&self, config: &MakeGridConfig) -> Result<Tensor<B>> {
        grid::make_grid(self, config)
    }
}
