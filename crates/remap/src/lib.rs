//! # remap
//!
//! A tensor evaluator driven by index expressions.
//!
//! This is the facade crate that re-exports everything you need.
//!
//! ## Usage
//!
//! ```rust
//! use remap::prelude::*;
//!
//! # fn main() -> remap::Result<()> {
//! let x = CpuTensor::arange((2, 3), DType::F32, &CpuDevice)?;
//! // tile along both axes
//! let y = Reindex::parse((4, 6), &["i0 % 2", "i1 % 3"])?.evaluate(&x)?;
//! assert_eq!(y.dims(), &[4, 6]);
//! // or use a derived operation
//! let z = x.repeat(&[2, 2])?;
//! assert_eq!(y.to_f64_vec()?, z.to_f64_vec()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | `remap-core` | Tensor, Shape, DType, Layout, Backend trait, Error |
//! | `remap-cpu` | Host-memory backend |
//! | `remap-expr` | Expr AST, text parser, Reindex evaluator, ReindexConfig |
//! | `remap-ops` | repeat, flip, expand, index_fill, triu/tril, make_grid |

/// Re-export core types.
pub use remap_core::{
    backend::{Backend, BackendDevice, BackendStorage, Source},
    DType, Error, Layout, Result, Shape, Tensor, WithDType,
};

/// Re-export CPU backend.
pub use remap_cpu::{CpuBackend, CpuDevice, CpuStorage, CpuTensor};

/// Re-export the expression layer.
pub mod expr {
    pub use remap_expr::*;
}

/// Re-export the derived operations.
pub mod ops {
    pub use remap_ops::*;
}

/// Prelude: import this for the most common types.
pub mod prelude {
    pub use crate::expr::{evaluate, Expr, Reindex, ReindexConfig, ReindexExt};
    pub use crate::ops::{MakeGridConfig, TensorOps};
    pub use crate::{CpuBackend, CpuDevice, CpuTensor, DType, Error, Shape, Tensor};
}
